use crate::constant_pool::{ConstantPool, CpInfo};
use crate::descriptor::{parse_field_descriptor, parse_return_descriptor, ObjectType, Type};
use crate::error::{Error, Result};
use crate::reader::Reader;

/// One annotation instance as written in the class file, before any
/// registry lookups (defaults, retention) are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub ty: ObjectType,
    pub elements: Vec<(String, ElementValue)>,
}

impl Annotation {
    pub(crate) fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        let type_index = reader.read_u2()?;
        let ty = object_type_from_descriptor(cp.get_utf8(type_index)?)?;

        let num_element_value_pairs = reader.read_u2()? as usize;
        let mut elements = Vec::with_capacity(num_element_value_pairs);
        for _ in 0..num_element_value_pairs {
            let element_name_index = reader.read_u2()?;
            let name = cp.get_utf8(element_name_index)?.to_string();
            let value = ElementValue::parse(reader, cp)?;
            elements.push((name, value));
        }

        Ok(Self { ty, elements })
    }

    /// `RuntimeVisibleAnnotations` / `RuntimeInvisibleAnnotations` payload.
    pub(crate) fn parse_list(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Vec<Self>> {
        let count = reader.read_u2()? as usize;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(Annotation::parse(reader, cp)?);
        }
        Ok(out)
    }

    /// `Runtime*ParameterAnnotations` payload: one list per parameter.
    pub(crate) fn parse_parameter_lists(
        reader: &mut Reader<'_>,
        cp: &ConstantPool,
    ) -> Result<Vec<Vec<Self>>> {
        let count = reader.read_u1()? as usize;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(Annotation::parse_list(reader, cp)?);
        }
        Ok(out)
    }

    pub fn element(&self, name: &str) -> Option<&ElementValue> {
        self.elements
            .iter()
            .rev()
            .find(|(element, _)| element == name)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Const(ConstValue),
    Enum { ty: ObjectType, const_name: String },
    Class(Type),
    Annotation(Box<Annotation>),
    Array(Vec<ElementValue>),
}

impl ElementValue {
    pub(crate) fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        let tag = reader.read_u1()?;
        match tag {
            b'B' | b'C' | b'I' | b'S' | b'Z' => {
                let idx = reader.read_u2()?;
                let value = match cp.get(idx)? {
                    CpInfo::Integer(v) => *v,
                    other => return Err(mismatch(idx, "Integer", other)),
                };

                let cv = match tag {
                    b'B' => ConstValue::Byte(value as i8),
                    b'C' => ConstValue::Char(value as u16),
                    b'S' => ConstValue::Short(value as i16),
                    b'Z' => ConstValue::Boolean(value != 0),
                    _ => ConstValue::Int(value),
                };
                Ok(ElementValue::Const(cv))
            }
            b'D' => {
                let idx = reader.read_u2()?;
                match cp.get(idx)? {
                    CpInfo::Double(v) => Ok(ElementValue::Const(ConstValue::Double(*v))),
                    other => Err(mismatch(idx, "Double", other)),
                }
            }
            b'F' => {
                let idx = reader.read_u2()?;
                match cp.get(idx)? {
                    CpInfo::Float(v) => Ok(ElementValue::Const(ConstValue::Float(*v))),
                    other => Err(mismatch(idx, "Float", other)),
                }
            }
            b'J' => {
                let idx = reader.read_u2()?;
                match cp.get(idx)? {
                    CpInfo::Long(v) => Ok(ElementValue::Const(ConstValue::Long(*v))),
                    other => Err(mismatch(idx, "Long", other)),
                }
            }
            b's' => {
                // Element strings point straight at a Utf8 entry.
                let idx = reader.read_u2()?;
                Ok(ElementValue::Const(ConstValue::String(
                    cp.get_utf8(idx)?.to_string(),
                )))
            }
            b'e' => {
                let type_name_index = reader.read_u2()?;
                let const_name_index = reader.read_u2()?;
                Ok(ElementValue::Enum {
                    ty: object_type_from_descriptor(cp.get_utf8(type_name_index)?)?,
                    const_name: cp.get_utf8(const_name_index)?.to_string(),
                })
            }
            b'c' => {
                let class_info_index = reader.read_u2()?;
                Ok(ElementValue::Class(parse_return_descriptor(
                    cp.get_utf8(class_info_index)?,
                )?))
            }
            b'@' => Ok(ElementValue::Annotation(Box::new(Annotation::parse(
                reader, cp,
            )?))),
            b'[' => {
                let num_values = reader.read_u2()? as usize;
                let mut values = Vec::with_capacity(num_values);
                for _ in 0..num_values {
                    values.push(ElementValue::parse(reader, cp)?);
                }
                Ok(ElementValue::Array(values))
            }
            _ => Err(Error::MalformedAttribute("element_value")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Byte(i8),
    /// UTF-16 code unit; lone surrogates are legal here.
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
}

fn object_type_from_descriptor(desc: &str) -> Result<ObjectType> {
    match parse_field_descriptor(desc)? {
        Type::Object(ty) => Ok(ty),
        _ => Err(Error::InvalidDescriptor(desc.to_string())),
    }
}

fn mismatch(index: u16, expected: &'static str, found: &CpInfo) -> Error {
    Error::ConstantPoolTypeMismatch {
        index,
        expected,
        found: found.kind(),
    }
}
