use std::sync::Arc;

use grip_classfile::{ObjectType, Type};
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumMirror {
    pub ty: ObjectType,
    pub value: String,
}

/// A value of an annotation element.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Boolean(bool),
    Byte(i8),
    /// UTF-16 code unit.
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Type(Type),
    Enum(EnumMirror),
    Annotation(Arc<AnnotationMirror>),
    Array(Vec<AnnotationValue>),
}

impl AnnotationValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumMirror> {
        match self {
            AnnotationValue::Enum(value) => Some(value),
            _ => None,
        }
    }
}

/// An annotation as seen at one use site, or, for the mirror cached by a
/// class registry, the annotation type itself with its element defaults.
///
/// `resolved` is false when the annotation type's class file is not on the
/// classpath. Such placeholders carry only the values written at the use
/// site (none for the registry's own placeholder).
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationMirror {
    ty: ObjectType,
    values: IndexMap<String, AnnotationValue>,
    visible: bool,
    resolved: bool,
}

impl AnnotationMirror {
    pub fn new(
        ty: ObjectType,
        values: IndexMap<String, AnnotationValue>,
        visible: bool,
        resolved: bool,
    ) -> Self {
        Self {
            ty,
            values,
            visible,
            resolved,
        }
    }

    pub fn unresolved(ty: ObjectType) -> Self {
        Self::new(ty, IndexMap::new(), false, false)
    }

    pub fn ty(&self) -> &ObjectType {
        &self.ty
    }

    pub fn values(&self) -> &IndexMap<String, AnnotationValue> {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<&AnnotationValue> {
        self.values.get(name)
    }

    /// Whether the annotation is retained at run time.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
}

/// Annotations of one element, keyed by annotation type.
///
/// Iteration follows first appearance; a repeated type replaces the earlier
/// value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationCollection {
    annotations: IndexMap<ObjectType, Arc<AnnotationMirror>>,
}

impl AnnotationCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, annotation: Arc<AnnotationMirror>) {
        self.annotations.insert(annotation.ty().clone(), annotation);
    }

    pub fn get(&self, ty: &ObjectType) -> Option<&Arc<AnnotationMirror>> {
        self.annotations.get(ty)
    }

    pub fn contains(&self, ty: &ObjectType) -> bool {
        self.annotations.contains_key(ty)
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AnnotationMirror>> {
        self.annotations.values()
    }
}

impl FromIterator<Arc<AnnotationMirror>> for AnnotationCollection {
    fn from_iter<I: IntoIterator<Item = Arc<AnnotationMirror>>>(iter: I) -> Self {
        let mut collection = AnnotationCollection::new();
        for annotation in iter {
            collection.insert(annotation);
        }
        collection
    }
}
