use grip_classfile::access::{
    ACC_ABSTRACT, ACC_FINAL, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC, ACC_STATIC, ACC_SYNTHETIC,
    ACC_VARARGS,
};
use grip_classfile::{
    ConstantValue, GenericDeclaration, GenericType, MethodSignature, MethodType, ObjectType, Type,
};

use super::annotation::{AnnotationCollection, AnnotationValue};

pub const CONSTRUCTOR_NAME: &str = "<init>";
pub const STATIC_INITIALIZER_NAME: &str = "<clinit>";

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMirror {
    pub(crate) access: u16,
    pub(crate) name: String,
    pub(crate) ty: Type,
    pub(crate) signature: GenericType,
    pub(crate) value: Option<ConstantValue>,
    pub(crate) annotations: AnnotationCollection,
}

impl FieldMirror {
    pub fn access(&self) -> u16 {
        self.access
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Generic type of the field; the raw type when it has no signature.
    pub fn signature(&self) -> &GenericType {
        &self.signature
    }

    /// `ConstantValue` of a constant field.
    pub fn value(&self) -> Option<&ConstantValue> {
        self.value.as_ref()
    }

    pub fn annotations(&self) -> &AnnotationCollection {
        &self.annotations
    }

    pub fn is_public(&self) -> bool {
        self.access & ACC_PUBLIC != 0
    }

    pub fn is_static(&self) -> bool {
        self.access & ACC_STATIC != 0
    }

    pub fn is_final(&self) -> bool {
        self.access & ACC_FINAL != 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMirror {
    pub(crate) index: usize,
    pub(crate) annotations: AnnotationCollection,
}

impl ParameterMirror {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn annotations(&self) -> &AnnotationCollection {
        &self.annotations
    }
}

/// A method, constructor or static initializer.
#[derive(Debug, Clone)]
pub struct MethodMirror {
    pub(crate) access: u16,
    pub(crate) name: String,
    pub(crate) ty: MethodType,
    pub(crate) signature: MethodSignature,
    pub(crate) exceptions: Vec<ObjectType>,
    pub(crate) parameters: Vec<ParameterMirror>,
    pub(crate) default_value: Option<AnnotationValue>,
    pub(crate) generic_declaration: GenericDeclaration,
    pub(crate) annotations: AnnotationCollection,
}

impl MethodMirror {
    pub fn access(&self) -> u16 {
        self.access
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &MethodType {
        &self.ty
    }

    /// Generic signature; synthesised from the descriptor and `Exceptions`
    /// when the method has no `Signature` attribute.
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    pub fn exceptions(&self) -> &[ObjectType] {
        &self.exceptions
    }

    pub fn parameters(&self) -> &[ParameterMirror] {
        &self.parameters
    }

    /// Default of an annotation interface element.
    pub fn default_value(&self) -> Option<&AnnotationValue> {
        self.default_value.as_ref()
    }

    /// Type variables visible inside this method: its own on top of the
    /// declaring class's.
    pub fn generic_declaration(&self) -> &GenericDeclaration {
        &self.generic_declaration
    }

    pub fn annotations(&self) -> &AnnotationCollection {
        &self.annotations
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == STATIC_INITIALIZER_NAME
    }

    pub fn is_public(&self) -> bool {
        self.access & ACC_PUBLIC != 0
    }

    pub fn is_protected(&self) -> bool {
        self.access & ACC_PROTECTED != 0
    }

    pub fn is_private(&self) -> bool {
        self.access & ACC_PRIVATE != 0
    }

    pub fn is_static(&self) -> bool {
        self.access & ACC_STATIC != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access & ACC_ABSTRACT != 0
    }

    pub fn is_varargs(&self) -> bool {
        self.access & ACC_VARARGS != 0
    }

    pub fn is_synthetic(&self) -> bool {
        self.access & ACC_SYNTHETIC != 0
    }
}
