//! Immutable views of parsed class files.

mod annotation;
mod class;
mod member;

pub use self::annotation::{AnnotationCollection, AnnotationMirror, AnnotationValue, EnumMirror};
pub(crate) use self::class::ClassDetails;
pub use self::class::{ClassMirror, ClassVersion, Enclosure};
pub use self::member::{
    FieldMirror, MethodMirror, ParameterMirror, CONSTRUCTOR_NAME, STATIC_INITIALIZER_NAME,
};
