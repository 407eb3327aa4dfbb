#![forbid(unsafe_code)]

pub mod access;
mod annotation;
mod classfile;
mod constant_pool;
mod descriptor;
mod error;
mod reader;
mod signature;

pub use crate::annotation::{Annotation, ConstValue, ElementValue};
pub use crate::classfile::{
    AnnotationEntry, ClassBody, ClassHeader, ClassReader, ConstantValue, EnclosingMethodInfo,
    FieldInfo, InnerClassInfo, MethodInfo,
};
pub use crate::descriptor::{
    parse_field_descriptor, parse_method_descriptor, parse_return_descriptor, ArrayType,
    MethodType, ObjectType, PrimitiveType, Type, OBJECT_INTERNAL_NAME,
};
pub use crate::error::{Error, Result};
pub use crate::signature::{
    parse_class_signature, parse_field_signature, parse_method_signature, ClassSignature,
    GenericDeclaration, GenericType, MethodSignature, TypeParameter,
};
