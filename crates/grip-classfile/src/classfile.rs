use std::sync::Arc;

use crate::annotation::{Annotation, ElementValue};
use crate::constant_pool::{ConstantPool, CpInfo};
use crate::descriptor::{
    parse_field_descriptor, parse_method_descriptor, MethodType, ObjectType, Type,
};
use crate::error::{Error, Result};
use crate::reader::Reader;

const MAGIC: u32 = 0xCAFEBABE;

/// Fixed-position data at the start of a class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: ObjectType,
    /// `None` only for `java/lang/Object` (and `module-info`).
    pub super_class: Option<ObjectType>,
    pub interfaces: Vec<ObjectType>,
}

/// Two-phase class file reader.
///
/// [`ClassReader::new`] decodes the constant pool and the header and stops
/// there. [`ClassReader::read_body`] continues from the recorded offset and
/// visits fields, methods and class attributes in a single pass, skipping
/// `Code`, debug tables and every other attribute that carries no structural
/// information.
#[derive(Debug, Clone)]
pub struct ClassReader {
    bytes: Arc<[u8]>,
    cp: ConstantPool,
    header: ClassHeader,
    body_offset: usize,
}

impl ClassReader {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let bytes = bytes.into();
        let mut reader = Reader::new(&bytes);
        let magic = reader.read_u4()?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let cp = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = class_type(cp.get_class_name(reader.read_u2()?)?);
        let super_class = cp
            .get_optional_class_name(reader.read_u2()?)?
            .map(class_type);

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(class_type(cp.get_class_name(reader.read_u2()?)?));
        }

        let body_offset = reader.position();
        Ok(Self {
            header: ClassHeader {
                minor_version,
                major_version,
                access_flags,
                this_class,
                super_class,
                interfaces,
            },
            cp,
            bytes,
            body_offset,
        })
    }

    pub fn header(&self) -> &ClassHeader {
        &self.header
    }

    pub fn read_body(&self) -> Result<ClassBody> {
        let mut reader = Reader::at(&self.bytes, self.body_offset)?;
        let cp = &self.cp;

        let fields_count = reader.read_u2()? as usize;
        let mut fields = Vec::with_capacity(fields_count);
        for _ in 0..fields_count {
            fields.push(parse_field(&mut reader, cp)?);
        }

        let methods_count = reader.read_u2()? as usize;
        let mut methods = Vec::with_capacity(methods_count);
        for _ in 0..methods_count {
            methods.push(parse_method(&mut reader, cp)?);
        }

        let attrs = parse_attributes(&mut reader, cp, AttributeTarget::Class)?;
        reader.ensure_empty()?;

        Ok(ClassBody {
            fields,
            methods,
            signature: attrs.signature,
            annotations: attrs.annotations,
            inner_classes: attrs.inner_classes,
            enclosing_method: attrs.enclosing_method,
            source_file: attrs.source_file,
            source_debug_extension: attrs.source_debug_extension,
        })
    }
}

/// Everything past the header.
#[derive(Debug, Clone, Default)]
pub struct ClassBody {
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub signature: Option<String>,
    pub annotations: Vec<AnnotationEntry>,
    pub inner_classes: Vec<InnerClassInfo>,
    pub enclosing_method: Option<EnclosingMethodInfo>,
    pub source_file: Option<String>,
    pub source_debug_extension: Option<String>,
}

impl ClassBody {
    /// Whether the class or any of its members carries a `Signature`.
    pub fn has_generic_signatures(&self) -> bool {
        self.signature.is_some()
            || self.fields.iter().any(|f| f.signature.is_some())
            || self.methods.iter().any(|m| m.signature.is_some())
    }
}

/// An annotation together with the visibility of the attribute it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationEntry {
    pub annotation: Annotation,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name: String,
    pub ty: Type,
    pub signature: Option<String>,
    pub constant_value: Option<ConstantValue>,
    pub annotations: Vec<AnnotationEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name: String,
    pub ty: MethodType,
    pub signature: Option<String>,
    pub exceptions: Vec<ObjectType>,
    pub annotations: Vec<AnnotationEntry>,
    /// Indexed by parameter position as written in the attribute, which can
    /// be shorter than the descriptor's parameter list.
    pub parameter_annotations: Vec<Vec<AnnotationEntry>>,
    pub annotation_default: Option<ElementValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassInfo {
    pub inner_class: ObjectType,
    pub outer_class: Option<ObjectType>,
    pub inner_name: Option<String>,
    pub access_flags: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclosingMethodInfo {
    pub class: ObjectType,
    /// Name and descriptor; absent for classes declared in initializers.
    pub method: Option<(String, MethodType)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

fn class_type(name: &Arc<str>) -> ObjectType {
    ObjectType::from_arc(name.clone())
}

fn parse_field(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<FieldInfo> {
    let access_flags = reader.read_u2()?;
    let name = cp.get_utf8(reader.read_u2()?)?.to_string();
    let ty = parse_field_descriptor(cp.get_utf8(reader.read_u2()?)?)?;

    let attrs = parse_attributes(reader, cp, AttributeTarget::Field)?;
    Ok(FieldInfo {
        access_flags,
        name,
        ty,
        signature: attrs.signature,
        constant_value: attrs.constant_value,
        annotations: attrs.annotations,
    })
}

fn parse_method(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<MethodInfo> {
    let access_flags = reader.read_u2()?;
    let name = cp.get_utf8(reader.read_u2()?)?.to_string();
    let ty = parse_method_descriptor(cp.get_utf8(reader.read_u2()?)?)?;

    let attrs = parse_attributes(reader, cp, AttributeTarget::Method)?;
    Ok(MethodInfo {
        access_flags,
        name,
        ty,
        signature: attrs.signature,
        exceptions: attrs.exceptions,
        annotations: attrs.annotations,
        parameter_annotations: attrs.parameter_annotations,
        annotation_default: attrs.annotation_default,
    })
}

#[derive(Default)]
struct ParsedAttributes {
    signature: Option<String>,
    annotations: Vec<AnnotationEntry>,
    parameter_annotations: Vec<Vec<AnnotationEntry>>,
    annotation_default: Option<ElementValue>,
    exceptions: Vec<ObjectType>,
    constant_value: Option<ConstantValue>,
    inner_classes: Vec<InnerClassInfo>,
    enclosing_method: Option<EnclosingMethodInfo>,
    source_file: Option<String>,
    source_debug_extension: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum AttributeTarget {
    Class,
    Field,
    Method,
}

fn parse_attributes(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
    target: AttributeTarget,
) -> Result<ParsedAttributes> {
    let attributes_count = reader.read_u2()? as usize;
    let mut parsed = ParsedAttributes::default();
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        let name = cp.get_utf8(name_index)?;

        let mut sub = Reader::new(info);
        match (&**name, target) {
            ("Signature", _) => {
                parsed.signature = Some(cp.get_utf8(sub.read_u2()?)?.to_string());
            }
            ("RuntimeVisibleAnnotations", _) => {
                let annotations = Annotation::parse_list(&mut sub, cp)?;
                push_annotations(&mut parsed.annotations, annotations, true);
            }
            ("RuntimeInvisibleAnnotations", _) => {
                let annotations = Annotation::parse_list(&mut sub, cp)?;
                push_annotations(&mut parsed.annotations, annotations, false);
            }
            ("RuntimeVisibleParameterAnnotations", AttributeTarget::Method) => {
                let lists = Annotation::parse_parameter_lists(&mut sub, cp)?;
                push_parameter_annotations(&mut parsed.parameter_annotations, lists, true);
            }
            ("RuntimeInvisibleParameterAnnotations", AttributeTarget::Method) => {
                let lists = Annotation::parse_parameter_lists(&mut sub, cp)?;
                push_parameter_annotations(&mut parsed.parameter_annotations, lists, false);
            }
            ("AnnotationDefault", AttributeTarget::Method) => {
                parsed.annotation_default = Some(ElementValue::parse(&mut sub, cp)?);
            }
            ("Exceptions", AttributeTarget::Method) => {
                let count = sub.read_u2()? as usize;
                let mut exceptions = Vec::with_capacity(count);
                for _ in 0..count {
                    exceptions.push(class_type(cp.get_class_name(sub.read_u2()?)?));
                }
                parsed.exceptions = exceptions;
            }
            ("ConstantValue", AttributeTarget::Field) => {
                let index = sub.read_u2()?;
                parsed.constant_value = Some(match cp.get(index)? {
                    CpInfo::Integer(v) => ConstantValue::Int(*v),
                    CpInfo::Long(v) => ConstantValue::Long(*v),
                    CpInfo::Float(v) => ConstantValue::Float(*v),
                    CpInfo::Double(v) => ConstantValue::Double(*v),
                    CpInfo::String { .. } => {
                        ConstantValue::String(cp.get_string_constant(index)?.to_string())
                    }
                    _ => return Err(Error::MalformedAttribute("ConstantValue")),
                });
            }
            ("InnerClasses", AttributeTarget::Class) => {
                let num = sub.read_u2()? as usize;
                let mut inners = Vec::with_capacity(num);
                for _ in 0..num {
                    let inner_class = class_type(cp.get_class_name(sub.read_u2()?)?);
                    let outer_class = cp.get_optional_class_name(sub.read_u2()?)?.map(class_type);
                    let inner_name = cp.get_optional_utf8(sub.read_u2()?)?.map(|s| s.to_string());
                    let access_flags = sub.read_u2()?;
                    inners.push(InnerClassInfo {
                        inner_class,
                        outer_class,
                        inner_name,
                        access_flags,
                    });
                }
                parsed.inner_classes.extend(inners);
            }
            ("EnclosingMethod", AttributeTarget::Class) => {
                let class = class_type(cp.get_class_name(sub.read_u2()?)?);
                let method_index = sub.read_u2()?;
                let method = if method_index == 0 {
                    None
                } else {
                    let (name, descriptor) = cp.get_name_and_type(method_index)?;
                    Some((name.to_string(), parse_method_descriptor(descriptor)?))
                };
                parsed.enclosing_method = Some(EnclosingMethodInfo { class, method });
            }
            ("SourceFile", AttributeTarget::Class) => {
                parsed.source_file = Some(cp.get_utf8(sub.read_u2()?)?.to_string());
            }
            ("SourceDebugExtension", AttributeTarget::Class) => {
                parsed.source_debug_extension = Some(String::from_utf8_lossy(info).into_owned());
                continue;
            }
            _ => {
                // Code, LineNumberTable, StackMapTable and the rest: the
                // payload has already been stepped over.
                continue;
            }
        }
        sub.ensure_empty()?;
    }

    Ok(parsed)
}

fn push_annotations(out: &mut Vec<AnnotationEntry>, annotations: Vec<Annotation>, visible: bool) {
    out.extend(
        annotations
            .into_iter()
            .map(|annotation| AnnotationEntry { annotation, visible }),
    );
}

fn push_parameter_annotations(
    out: &mut Vec<Vec<AnnotationEntry>>,
    lists: Vec<Vec<Annotation>>,
    visible: bool,
) {
    if out.len() < lists.len() {
        out.resize_with(lists.len(), Vec::new);
    }
    for (slot, annotations) in out.iter_mut().zip(lists) {
        push_annotations(slot, annotations, visible);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0xCA, 0xFE, 0xD0, 0x0D, 0, 0, 0, 52];
        assert_eq!(
            ClassReader::new(bytes.to_vec()).unwrap_err(),
            Error::InvalidMagic(0xCAFED00D)
        );
    }

    #[test]
    fn truncated_header_is_an_error() {
        let bytes = [0xCA, 0xFE, 0xBA, 0xBE, 0, 0];
        assert_eq!(
            ClassReader::new(bytes.to_vec()).unwrap_err(),
            Error::UnexpectedEof
        );
    }
}
