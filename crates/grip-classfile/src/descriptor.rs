use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Internal name of the root object type.
pub const OBJECT_INTERNAL_NAME: &str = "java/lang/Object";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    Void,
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Float,
    Long,
    Double,
}

impl PrimitiveType {
    pub fn from_descriptor(c: char) -> Option<Self> {
        Some(match c {
            'V' => PrimitiveType::Void,
            'Z' => PrimitiveType::Boolean,
            'C' => PrimitiveType::Char,
            'B' => PrimitiveType::Byte,
            'S' => PrimitiveType::Short,
            'I' => PrimitiveType::Int,
            'F' => PrimitiveType::Float,
            'J' => PrimitiveType::Long,
            'D' => PrimitiveType::Double,
            _ => return None,
        })
    }

    pub fn descriptor(self) -> char {
        match self {
            PrimitiveType::Void => 'V',
            PrimitiveType::Boolean => 'Z',
            PrimitiveType::Char => 'C',
            PrimitiveType::Byte => 'B',
            PrimitiveType::Short => 'S',
            PrimitiveType::Int => 'I',
            PrimitiveType::Float => 'F',
            PrimitiveType::Long => 'J',
            PrimitiveType::Double => 'D',
        }
    }

    /// Source-level keyword, e.g. `int`.
    pub fn class_name(self) -> &'static str {
        match self {
            PrimitiveType::Void => "void",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Char => "char",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Float => "float",
            PrimitiveType::Long => "long",
            PrimitiveType::Double => "double",
        }
    }
}

/// A class or interface type, identified by its internal (slash-separated)
/// binary name.
///
/// Equality and hashing are by internal name only, which makes this the key
/// of every registry index.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectType {
    internal_name: Arc<str>,
}

impl ObjectType {
    /// `java/lang/String`. Backslashes are folded to `/` so paths coming from
    /// Windows directory walks produce the same key.
    pub fn from_internal_name(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        let internal_name: Arc<str> = if name.contains('\\') {
            name.replace('\\', "/").into()
        } else {
            name.into()
        };
        Self { internal_name }
    }

    /// `java.lang.String`.
    pub fn from_class_name(name: &str) -> Self {
        Self {
            internal_name: name.replace('.', "/").into(),
        }
    }

    pub(crate) fn from_arc(internal_name: Arc<str>) -> Self {
        Self { internal_name }
    }

    pub fn object() -> Self {
        Self::from_internal_name(OBJECT_INTERNAL_NAME)
    }

    pub fn internal_name(&self) -> &str {
        &self.internal_name
    }

    /// Dotted binary name, e.g. `java.util.Map$Entry`.
    pub fn class_name(&self) -> String {
        self.internal_name.replace('/', ".")
    }

    pub fn descriptor(&self) -> String {
        format!("L{};", self.internal_name)
    }

    pub fn package_name(&self) -> &str {
        self.internal_name
            .rsplit_once('/')
            .map(|(pkg, _)| pkg)
            .unwrap_or("")
    }

    pub fn is_object(&self) -> bool {
        &*self.internal_name == OBJECT_INTERNAL_NAME
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectType({})", self.internal_name)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.internal_name)
    }
}

/// Array type: a non-array element type plus a dimension count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayType {
    element: Box<Type>,
    dimensions: usize,
}

impl ArrayType {
    pub fn element_type(&self) -> &Type {
        &self.element
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveType),
    Object(ObjectType),
    Array(ArrayType),
}

impl Type {
    /// Wrap `element` into an array of `dimensions` more dimensions. Nested
    /// arrays are flattened so the element type is never itself an array.
    pub fn array_of(element: Type, dimensions: usize) -> Type {
        if dimensions == 0 {
            return element;
        }
        match element {
            Type::Array(inner) => Type::Array(ArrayType {
                element: inner.element,
                dimensions: inner.dimensions + dimensions,
            }),
            element => Type::Array(ArrayType {
                element: Box::new(element),
                dimensions,
            }),
        }
    }

    pub fn descriptor(&self) -> String {
        match self {
            Type::Primitive(p) => p.descriptor().to_string(),
            Type::Object(o) => o.descriptor(),
            Type::Array(a) => {
                let mut out = "[".repeat(a.dimensions);
                out.push_str(&a.element.descriptor());
                out
            }
        }
    }

    /// Source-style name, e.g. `int[][]` or `java.lang.String`.
    pub fn class_name(&self) -> String {
        match self {
            Type::Primitive(p) => p.class_name().to_string(),
            Type::Object(o) => o.class_name(),
            Type::Array(a) => {
                let mut out = a.element.class_name();
                for _ in 0..a.dimensions {
                    out.push_str("[]");
                }
                out
            }
        }
    }

    pub fn as_object(&self) -> Option<&ObjectType> {
        match self {
            Type::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl From<ObjectType> for Type {
    fn from(value: ObjectType) -> Self {
        Type::Object(value)
    }
}

impl From<PrimitiveType> for Type {
    fn from(value: PrimitiveType) -> Self {
        Type::Primitive(value)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodType {
    pub parameters: Vec<Type>,
    pub return_type: Type,
}

impl MethodType {
    pub fn descriptor(&self) -> String {
        let mut out = String::from("(");
        for param in &self.parameters {
            out.push_str(&param.descriptor());
        }
        out.push(')');
        out.push_str(&self.return_type.descriptor());
        out
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

pub fn parse_field_descriptor(desc: &str) -> Result<Type> {
    parse_whole(desc, false)
}

/// A field descriptor or `V`, as found in return position and in the
/// `class_info` of annotation element values (`void.class`).
pub fn parse_return_descriptor(desc: &str) -> Result<Type> {
    parse_whole(desc, true)
}

fn parse_whole(desc: &str, allow_void: bool) -> Result<Type> {
    let (ty, rest) = parse_type(desc, allow_void)?;
    if !rest.is_empty() {
        return Err(Error::InvalidDescriptor(desc.to_string()));
    }
    Ok(ty)
}

pub fn parse_method_descriptor(desc: &str) -> Result<MethodType> {
    let Some(mut rest) = desc.strip_prefix('(') else {
        return Err(Error::InvalidDescriptor(desc.to_string()));
    };

    let mut parameters = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }
        if rest.is_empty() {
            return Err(Error::InvalidDescriptor(desc.to_string()));
        }
        let (param, after) =
            parse_type(rest, false).map_err(|_| Error::InvalidDescriptor(desc.to_string()))?;
        parameters.push(param);
        rest = after;
    }

    let (return_type, rest) =
        parse_type(rest, true).map_err(|_| Error::InvalidDescriptor(desc.to_string()))?;
    if !rest.is_empty() {
        return Err(Error::InvalidDescriptor(desc.to_string()));
    }

    Ok(MethodType {
        parameters,
        return_type,
    })
}

fn parse_type(input: &str, allow_void: bool) -> Result<(Type, &str)> {
    let dimensions = input.bytes().take_while(|b| *b == b'[').count();
    let rest = &input[dimensions..];
    let Some(first) = rest.chars().next() else {
        return Err(Error::InvalidDescriptor(input.to_string()));
    };

    let (element, rest) = match first {
        'L' => {
            let end = rest
                .find(';')
                .ok_or_else(|| Error::InvalidDescriptor(input.to_string()))?;
            let name = &rest[1..end];
            if name.is_empty() {
                return Err(Error::InvalidDescriptor(input.to_string()));
            }
            (
                Type::Object(ObjectType::from_internal_name(name)),
                &rest[end + 1..],
            )
        }
        c => match PrimitiveType::from_descriptor(c) {
            Some(PrimitiveType::Void) if !allow_void || dimensions > 0 => {
                return Err(Error::InvalidDescriptor(input.to_string()))
            }
            Some(p) => (Type::Primitive(p), &rest[1..]),
            None => return Err(Error::InvalidDescriptor(input.to_string())),
        },
    };

    Ok((Type::array_of(element, dimensions), rest))
}
