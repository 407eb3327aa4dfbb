//! A small class file writer.
//!
//! Produces structurally valid class files for fixtures without needing
//! `javac`. Method bodies are written as opaque `Code` attributes (with a
//! nested `LineNumberTable`) so readers are exercised on the attributes they
//! are expected to skip.

use std::collections::HashMap;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;

pub const JAVA_8: u16 = 52;

#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    major_version: u16,
    minor_version: u16,
    access_flags: u16,
    name: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    signature: Option<String>,
    annotations: Vec<AnnotationSpec>,
    fields: Vec<FieldSpec>,
    methods: Vec<MethodSpec>,
    inner_classes: Vec<InnerClassSpec>,
    enclosing_method: Option<(String, Option<(String, String)>)>,
    source_file: Option<String>,
    source_debug_extension: Option<String>,
}

#[derive(Debug, Clone)]
struct InnerClassSpec {
    inner: String,
    outer: Option<String>,
    name: Option<String>,
    access_flags: u16,
}

impl ClassFileBuilder {
    /// A public class extending `java/lang/Object`.
    pub fn new(internal_name: &str) -> Self {
        Self {
            major_version: JAVA_8,
            minor_version: 0,
            access_flags: ACC_PUBLIC | ACC_SUPER,
            name: internal_name.to_string(),
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            signature: None,
            annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            inner_classes: Vec::new(),
            enclosing_method: None,
            source_file: None,
            source_debug_extension: None,
        }
    }

    /// A public annotation interface.
    pub fn annotation_type(internal_name: &str) -> Self {
        Self::new(internal_name)
            .access(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION)
            .interface("java/lang/annotation/Annotation")
    }

    pub fn version(mut self, major: u16, minor: u16) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    pub fn access(mut self, access_flags: u16) -> Self {
        self.access_flags = access_flags;
        self
    }

    pub fn super_class(mut self, super_class: Option<&str>) -> Self {
        self.super_class = super_class.map(str::to_string);
        self
    }

    pub fn interface(mut self, internal_name: &str) -> Self {
        self.interfaces.push(internal_name.to_string());
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn annotation(mut self, annotation: AnnotationSpec) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// `@Retention(RetentionPolicy.<policy>)`.
    pub fn retention(self, policy: &str) -> Self {
        self.annotation(
            AnnotationSpec::visible("Ljava/lang/annotation/Retention;").value(
                "value",
                ValueSpec::enum_value("Ljava/lang/annotation/RetentionPolicy;", policy),
            ),
        )
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    pub fn inner_class(
        mut self,
        inner: &str,
        outer: Option<&str>,
        inner_name: Option<&str>,
        access_flags: u16,
    ) -> Self {
        self.inner_classes.push(InnerClassSpec {
            inner: inner.to_string(),
            outer: outer.map(str::to_string),
            name: inner_name.map(str::to_string),
            access_flags,
        });
        self
    }

    /// `EnclosingMethod`; `method` is `(name, descriptor)`.
    pub fn enclosing_method(mut self, owner: &str, method: Option<(&str, &str)>) -> Self {
        self.enclosing_method = Some((
            owner.to_string(),
            method.map(|(name, desc)| (name.to_string(), desc.to_string())),
        ));
        self
    }

    pub fn source_file(mut self, source_file: &str) -> Self {
        self.source_file = Some(source_file.to_string());
        self
    }

    pub fn source_debug_extension(mut self, debug: &str) -> Self {
        self.source_debug_extension = Some(debug.to_string());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut cp = ConstantPoolWriter::default();

        let this_class = cp.class(&self.name);
        let super_class = self.super_class.as_deref().map(|s| cp.class(s)).unwrap_or(0);
        let interfaces: Vec<u16> = self.interfaces.iter().map(|i| cp.class(i)).collect();

        let mut body = Vec::new();
        push_u16(&mut body, self.access_flags);
        push_u16(&mut body, this_class);
        push_u16(&mut body, super_class);
        push_u16(&mut body, interfaces.len() as u16);
        for index in interfaces {
            push_u16(&mut body, index);
        }

        push_u16(&mut body, self.fields.len() as u16);
        for field in &self.fields {
            field.write(&mut cp, &mut body);
        }

        push_u16(&mut body, self.methods.len() as u16);
        for method in &self.methods {
            method.write(&mut cp, &mut body);
        }

        let mut attributes = Vec::new();
        if let Some(source_file) = &self.source_file {
            let index = cp.utf8(source_file);
            attributes.push(attribute(&mut cp, "SourceFile", &index.to_be_bytes()));
        }
        if let Some(signature) = &self.signature {
            let index = cp.utf8(signature);
            attributes.push(attribute(&mut cp, "Signature", &index.to_be_bytes()));
        }
        attributes.extend(annotation_attributes(&mut cp, &self.annotations));
        if !self.inner_classes.is_empty() {
            let mut info = Vec::new();
            push_u16(&mut info, self.inner_classes.len() as u16);
            for inner in &self.inner_classes {
                let inner_index = cp.class(&inner.inner);
                let outer_index = inner.outer.as_deref().map(|o| cp.class(o)).unwrap_or(0);
                let name_index = inner.name.as_deref().map(|n| cp.utf8(n)).unwrap_or(0);
                push_u16(&mut info, inner_index);
                push_u16(&mut info, outer_index);
                push_u16(&mut info, name_index);
                push_u16(&mut info, inner.access_flags);
            }
            attributes.push(attribute(&mut cp, "InnerClasses", &info));
        }
        if let Some((owner, method)) = &self.enclosing_method {
            let mut info = Vec::new();
            push_u16(&mut info, cp.class(owner));
            let method_index = method
                .as_ref()
                .map(|(name, desc)| cp.name_and_type(name, desc))
                .unwrap_or(0);
            push_u16(&mut info, method_index);
            attributes.push(attribute(&mut cp, "EnclosingMethod", &info));
        }
        if let Some(debug) = &self.source_debug_extension {
            attributes.push(attribute(&mut cp, "SourceDebugExtension", debug.as_bytes()));
        }
        // Something unknown to make sure it is skipped.
        attributes.push(attribute(&mut cp, "com.example.Custom", &[0xDE, 0xAD]));
        push_attributes(&mut body, &attributes);

        let mut out = Vec::new();
        push_u32(&mut out, 0xCAFEBABE);
        push_u16(&mut out, self.minor_version);
        push_u16(&mut out, self.major_version);
        cp.write(&mut out);
        out.extend_from_slice(&body);
        out
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    access_flags: u16,
    name: String,
    descriptor: String,
    signature: Option<String>,
    constant: Option<ConstantSpec>,
    annotations: Vec<AnnotationSpec>,
}

impl FieldSpec {
    pub fn new(access_flags: u16, name: &str, descriptor: &str) -> Self {
        Self {
            access_flags,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: None,
            constant: None,
            annotations: Vec::new(),
        }
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn constant(mut self, constant: ConstantSpec) -> Self {
        self.constant = Some(constant);
        self
    }

    pub fn annotation(mut self, annotation: AnnotationSpec) -> Self {
        self.annotations.push(annotation);
        self
    }

    fn write(&self, cp: &mut ConstantPoolWriter, out: &mut Vec<u8>) {
        push_u16(out, self.access_flags);
        push_u16(out, cp.utf8(&self.name));
        push_u16(out, cp.utf8(&self.descriptor));

        let mut attributes = Vec::new();
        if let Some(constant) = &self.constant {
            let index = cp.constant(constant);
            attributes.push(attribute(cp, "ConstantValue", &index.to_be_bytes()));
        }
        if let Some(signature) = &self.signature {
            let index = cp.utf8(signature);
            attributes.push(attribute(cp, "Signature", &index.to_be_bytes()));
        }
        attributes.extend(annotation_attributes(cp, &self.annotations));
        push_attributes(out, &attributes);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantSpec {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

#[derive(Debug, Clone)]
pub struct MethodSpec {
    access_flags: u16,
    name: String,
    descriptor: String,
    signature: Option<String>,
    exceptions: Vec<String>,
    annotations: Vec<AnnotationSpec>,
    parameter_annotations: Vec<Vec<AnnotationSpec>>,
    default_value: Option<ValueSpec>,
    code: bool,
}

impl MethodSpec {
    /// A concrete method with a trivial body.
    pub fn new(access_flags: u16, name: &str, descriptor: &str) -> Self {
        Self {
            access_flags,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: None,
            exceptions: Vec::new(),
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            default_value: None,
            code: access_flags & ACC_ABSTRACT == 0,
        }
    }

    /// An annotation element: `public abstract <descriptor>` with an
    /// optional default.
    pub fn element(name: &str, descriptor: &str, default_value: Option<ValueSpec>) -> Self {
        let mut spec = Self::new(ACC_PUBLIC | ACC_ABSTRACT, name, descriptor);
        spec.default_value = default_value;
        spec
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn exception(mut self, internal_name: &str) -> Self {
        self.exceptions.push(internal_name.to_string());
        self
    }

    pub fn annotation(mut self, annotation: AnnotationSpec) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn parameter_annotation(mut self, parameter: usize, annotation: AnnotationSpec) -> Self {
        if self.parameter_annotations.len() <= parameter {
            self.parameter_annotations.resize_with(parameter + 1, Vec::new);
        }
        self.parameter_annotations[parameter].push(annotation);
        self
    }

    pub fn default_value(mut self, value: ValueSpec) -> Self {
        self.default_value = Some(value);
        self
    }

    fn write(&self, cp: &mut ConstantPoolWriter, out: &mut Vec<u8>) {
        push_u16(out, self.access_flags);
        push_u16(out, cp.utf8(&self.name));
        push_u16(out, cp.utf8(&self.descriptor));

        let mut attributes = Vec::new();
        if self.code {
            attributes.push(code_attribute(cp));
        }
        if !self.exceptions.is_empty() {
            let mut info = Vec::new();
            push_u16(&mut info, self.exceptions.len() as u16);
            for exception in &self.exceptions {
                push_u16(&mut info, cp.class(exception));
            }
            attributes.push(attribute(cp, "Exceptions", &info));
        }
        if let Some(signature) = &self.signature {
            let index = cp.utf8(signature);
            attributes.push(attribute(cp, "Signature", &index.to_be_bytes()));
        }
        attributes.extend(annotation_attributes(cp, &self.annotations));
        for (name, visible) in [
            ("RuntimeVisibleParameterAnnotations", true),
            ("RuntimeInvisibleParameterAnnotations", false),
        ] {
            if !self
                .parameter_annotations
                .iter()
                .flatten()
                .any(|a| a.visible == visible)
            {
                continue;
            }
            let mut info = vec![self.parameter_annotations.len() as u8];
            for parameter in &self.parameter_annotations {
                let selected: Vec<&AnnotationSpec> =
                    parameter.iter().filter(|a| a.visible == visible).collect();
                push_u16(&mut info, selected.len() as u16);
                for annotation in selected {
                    annotation.write(cp, &mut info);
                }
            }
            attributes.push(attribute(cp, name, &info));
        }
        if let Some(default_value) = &self.default_value {
            let mut info = Vec::new();
            default_value.write(cp, &mut info);
            attributes.push(attribute(cp, "AnnotationDefault", &info));
        }
        push_attributes(out, &attributes);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationSpec {
    descriptor: String,
    visible: bool,
    elements: Vec<(String, ValueSpec)>,
}

impl AnnotationSpec {
    /// Written to `RuntimeVisibleAnnotations`. `descriptor` is `Lpkg/Name;`.
    pub fn visible(descriptor: &str) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            visible: true,
            elements: Vec::new(),
        }
    }

    /// Written to `RuntimeInvisibleAnnotations`.
    pub fn invisible(descriptor: &str) -> Self {
        Self {
            visible: false,
            ..Self::visible(descriptor)
        }
    }

    pub fn value(mut self, name: &str, value: ValueSpec) -> Self {
        self.elements.push((name.to_string(), value));
        self
    }

    fn write(&self, cp: &mut ConstantPoolWriter, out: &mut Vec<u8>) {
        push_u16(out, cp.utf8(&self.descriptor));
        push_u16(out, self.elements.len() as u16);
        for (name, value) in &self.elements {
            push_u16(out, cp.utf8(name));
            value.write(cp, out);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueSpec {
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Enum { descriptor: String, name: String },
    /// Field descriptor, or `V`.
    Class(String),
    Annotation(AnnotationSpec),
    Array(Vec<ValueSpec>),
}

impl ValueSpec {
    pub fn string(value: &str) -> Self {
        ValueSpec::String(value.to_string())
    }

    pub fn enum_value(descriptor: &str, name: &str) -> Self {
        ValueSpec::Enum {
            descriptor: descriptor.to_string(),
            name: name.to_string(),
        }
    }

    pub fn class(descriptor: &str) -> Self {
        ValueSpec::Class(descriptor.to_string())
    }

    fn write(&self, cp: &mut ConstantPoolWriter, out: &mut Vec<u8>) {
        match self {
            ValueSpec::Boolean(v) => push_const(out, b'Z', cp.integer(*v as i32)),
            ValueSpec::Byte(v) => push_const(out, b'B', cp.integer(*v as i32)),
            ValueSpec::Char(v) => push_const(out, b'C', cp.integer(*v as i32)),
            ValueSpec::Short(v) => push_const(out, b'S', cp.integer(*v as i32)),
            ValueSpec::Int(v) => push_const(out, b'I', cp.integer(*v)),
            ValueSpec::Long(v) => push_const(out, b'J', cp.constant(&ConstantSpec::Long(*v))),
            ValueSpec::Float(v) => push_const(out, b'F', cp.constant(&ConstantSpec::Float(*v))),
            ValueSpec::Double(v) => {
                push_const(out, b'D', cp.constant(&ConstantSpec::Double(*v)))
            }
            ValueSpec::String(v) => push_const(out, b's', cp.utf8(v)),
            ValueSpec::Enum { descriptor, name } => {
                out.push(b'e');
                push_u16(out, cp.utf8(descriptor));
                push_u16(out, cp.utf8(name));
            }
            ValueSpec::Class(descriptor) => push_const(out, b'c', cp.utf8(descriptor)),
            ValueSpec::Annotation(annotation) => {
                out.push(b'@');
                annotation.write(cp, out);
            }
            ValueSpec::Array(values) => {
                out.push(b'[');
                push_u16(out, values.len() as u16);
                for value in values {
                    value.write(cp, out);
                }
            }
        }
    }
}

fn push_const(out: &mut Vec<u8>, tag: u8, index: u16) {
    out.push(tag);
    push_u16(out, index);
}

fn annotation_attributes(
    cp: &mut ConstantPoolWriter,
    annotations: &[AnnotationSpec],
) -> Vec<Vec<u8>> {
    let mut attributes = Vec::new();
    for (name, visible) in [
        ("RuntimeVisibleAnnotations", true),
        ("RuntimeInvisibleAnnotations", false),
    ] {
        let selected: Vec<&AnnotationSpec> =
            annotations.iter().filter(|a| a.visible == visible).collect();
        if selected.is_empty() {
            continue;
        }
        let mut info = Vec::new();
        push_u16(&mut info, selected.len() as u16);
        for annotation in selected {
            annotation.write(cp, &mut info);
        }
        attributes.push(attribute(cp, name, &info));
    }
    attributes
}

/// `Code` with a single `return` and a `LineNumberTable`.
fn code_attribute(cp: &mut ConstantPoolWriter) -> Vec<u8> {
    let mut line_numbers = Vec::new();
    push_u16(&mut line_numbers, 1);
    push_u16(&mut line_numbers, 0);
    push_u16(&mut line_numbers, 42);
    let line_number_table = attribute(cp, "LineNumberTable", &line_numbers);

    let code = [0x00u8, 0x00, 0xB1]; // nop, nop, return
    let mut info = Vec::new();
    push_u16(&mut info, 1); // max_stack
    push_u16(&mut info, 4); // max_locals
    push_u32(&mut info, code.len() as u32);
    info.extend_from_slice(&code);
    push_u16(&mut info, 0); // exception_table_length
    push_attributes(&mut info, &[line_number_table]);
    attribute(cp, "Code", &info)
}

fn attribute(cp: &mut ConstantPoolWriter, name: &str, info: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(info.len() + 6);
    push_u16(&mut out, cp.utf8(name));
    push_u32(&mut out, info.len() as u32);
    out.extend_from_slice(info);
    out
}

fn push_attributes(out: &mut Vec<u8>, attributes: &[Vec<u8>]) {
    push_u16(out, attributes.len() as u16);
    for attribute in attributes {
        out.extend_from_slice(attribute);
    }
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CpKey {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    NameAndType(u16, u16),
}

#[derive(Debug, Default)]
struct ConstantPoolWriter {
    bytes: Vec<u8>,
    next: u16,
    indices: HashMap<CpKey, u16>,
}

impl ConstantPoolWriter {
    fn intern(&mut self, key: CpKey) -> u16 {
        if let Some(index) = self.indices.get(&key) {
            return *index;
        }
        if self.next == 0 {
            self.next = 1;
        }
        let index = self.next;
        let wide = matches!(key, CpKey::Long(_) | CpKey::Double(_));
        match &key {
            CpKey::Utf8(value) => {
                self.bytes.push(1);
                let encoded = encode_modified_utf8(value);
                push_u16(&mut self.bytes, encoded.len() as u16);
                self.bytes.extend_from_slice(&encoded);
            }
            CpKey::Integer(value) => {
                self.bytes.push(3);
                self.bytes.extend_from_slice(&value.to_be_bytes());
            }
            CpKey::Float(bits) => {
                self.bytes.push(4);
                push_u32(&mut self.bytes, *bits);
            }
            CpKey::Long(value) => {
                self.bytes.push(5);
                self.bytes.extend_from_slice(&value.to_be_bytes());
            }
            CpKey::Double(bits) => {
                self.bytes.push(6);
                self.bytes.extend_from_slice(&bits.to_be_bytes());
            }
            CpKey::Class(name_index) => {
                self.bytes.push(7);
                push_u16(&mut self.bytes, *name_index);
            }
            CpKey::String(utf8_index) => {
                self.bytes.push(8);
                push_u16(&mut self.bytes, *utf8_index);
            }
            CpKey::NameAndType(name_index, descriptor_index) => {
                self.bytes.push(12);
                push_u16(&mut self.bytes, *name_index);
                push_u16(&mut self.bytes, *descriptor_index);
            }
        }
        self.next += if wide { 2 } else { 1 };
        self.indices.insert(key, index);
        index
    }

    fn utf8(&mut self, value: &str) -> u16 {
        self.intern(CpKey::Utf8(value.to_string()))
    }

    fn integer(&mut self, value: i32) -> u16 {
        self.intern(CpKey::Integer(value))
    }

    fn class(&mut self, internal_name: &str) -> u16 {
        let name = self.utf8(internal_name);
        self.intern(CpKey::Class(name))
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.intern(CpKey::NameAndType(name, descriptor))
    }

    fn constant(&mut self, constant: &ConstantSpec) -> u16 {
        match constant {
            ConstantSpec::Int(v) => self.integer(*v),
            ConstantSpec::Long(v) => self.intern(CpKey::Long(*v)),
            ConstantSpec::Float(v) => self.intern(CpKey::Float(v.to_bits())),
            ConstantSpec::Double(v) => self.intern(CpKey::Double(v.to_bits())),
            ConstantSpec::String(v) => {
                let utf8 = self.utf8(v);
                self.intern(CpKey::String(utf8))
            }
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        push_u16(out, self.next.max(1));
        out.extend_from_slice(&self.bytes);
    }
}

fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_class_has_expected_header() {
        let bytes = ClassFileBuilder::new("com/example/Foo").build();
        assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), JAVA_8);
    }

    #[test]
    fn constants_are_interned() {
        let mut cp = ConstantPoolWriter::default();
        let a = cp.class("java/lang/Object");
        let b = cp.class("java/lang/Object");
        assert_eq!(a, b);
        let long = cp.constant(&ConstantSpec::Long(1));
        let next = cp.integer(7);
        assert_eq!(next, long + 2);
    }

    #[test]
    fn modified_utf8_encodes_nul_as_two_bytes() {
        assert_eq!(encode_modified_utf8("a\0"), vec![b'a', 0xC0, 0x80]);
        assert_eq!(encode_modified_utf8("\u{1F600}").len(), 6);
    }
}
