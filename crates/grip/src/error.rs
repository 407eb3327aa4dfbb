use std::path::PathBuf;

use grip_classfile::ObjectType;
use grip_io::FileSourceError;
use thiserror::Error;

pub type Result<T, E = GripError> = std::result::Result<T, E>;

/// Coarse classification of a [`GripError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Raised while building a registry; the classpath itself is unusable.
    Configuration,
    /// A type or root that the registry does not know about.
    Lookup,
    /// Class bytes that could not be turned into a mirror.
    Parse,
    /// The component was already closed.
    State,
}

#[derive(Debug, Error)]
pub enum GripError {
    #[error("classpath is empty")]
    EmptyClasspath,
    #[error("cannot open classpath root {}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: FileSourceError,
    },
    #[error("type {0} is provided by more than one registry")]
    AmbiguousType(ObjectType),
    #[error("classpath root {} is provided by more than one registry", .0.display())]
    AmbiguousPath(PathBuf),
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("type {0} is not on the classpath")]
    UnknownType(ObjectType),
    #[error("{} is not a classpath root", .0.display())]
    UnknownPath(PathBuf),
    #[error("cannot read class file of {ty}: {source}")]
    ClassBytes {
        ty: ObjectType,
        #[source]
        source: FileSourceError,
    },

    #[error("cannot parse {ty}: {source}")]
    Parse {
        ty: ObjectType,
        #[source]
        source: ReflectError,
    },

    #[error("{0} is closed")]
    Closed(&'static str),
}

impl GripError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GripError::EmptyClasspath
            | GripError::Source { .. }
            | GripError::AmbiguousType(_)
            | GripError::AmbiguousPath(_)
            | GripError::Config(_) => ErrorKind::Configuration,
            GripError::UnknownType(_)
            | GripError::UnknownPath(_)
            | GripError::ClassBytes { .. } => ErrorKind::Lookup,
            GripError::Parse { .. } => ErrorKind::Parse,
            GripError::Closed(_) => ErrorKind::State,
        }
    }

    /// Wrap a reflection failure of `ty`. A registry that was closed while
    /// the mirror was being completed surfaces as the state error itself.
    pub(crate) fn parse(ty: &ObjectType, source: ReflectError) -> Self {
        match source {
            ReflectError::Lookup { source, .. } if source.kind() == ErrorKind::State => *source,
            source => GripError::Parse {
                ty: ty.clone(),
                source,
            },
        }
    }
}

/// Why a class file could not be reflected into a mirror.
#[derive(Debug, Error)]
pub enum ReflectError {
    #[error("malformed class file: {0}")]
    ClassFile(#[from] grip_classfile::Error),
    #[error("@Retention of {annotation} has unexpected value {found}")]
    UnexpectedRetention { annotation: ObjectType, found: String },
    #[error("enclosing class chain of {0} is cyclic")]
    EnclosureCycle(ObjectType),
    #[error("class registry was dropped")]
    RegistryDropped,
    #[error("lookup of {ty} failed: {source}")]
    Lookup {
        ty: ObjectType,
        #[source]
        source: Box<GripError>,
    },
}

impl ReflectError {
    pub(crate) fn lookup(ty: &ObjectType, source: GripError) -> Self {
        ReflectError::Lookup {
            ty: ty.clone(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_registry_is_not_reported_as_a_parse_error() {
        let ty = ObjectType::from_internal_name("a/A");
        let err = GripError::parse(
            &ty,
            ReflectError::lookup(&ty, GripError::Closed("class registry")),
        );
        assert_eq!(err.kind(), ErrorKind::State);

        let err = GripError::parse(&ty, ReflectError::EnclosureCycle(ty.clone()));
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(
            err.to_string(),
            "cannot parse a/A: enclosing class chain of a/A is cyclic"
        );
    }
}
