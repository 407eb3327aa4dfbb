use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = FileSourceError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum FileSourceError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read archive `{path}`: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("unknown classpath entry kind for `{0}`")]
    UnknownSourceKind(PathBuf),

    #[error("`{entry}` not found in `{root}`")]
    EntryNotFound { root: PathBuf, entry: String },

    #[error("`jrt:` needs a JDK but JAVA_HOME is not set")]
    JavaHomeUnset,

    #[error("no `jmods/` directory under JDK home `{0}`")]
    MissingJmods(PathBuf),

    #[error("file source `{0}` is closed")]
    Closed(PathBuf),
}

impl FileSourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FileSourceError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        FileSourceError::Zip {
            path: path.into(),
            source,
        }
    }

    /// Errors describing the shape of the classpath rather than a failed read.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FileSourceError::UnknownSourceKind(_)
                | FileSourceError::JavaHomeUnset
                | FileSourceError::MissingJmods(_)
        )
    }
}
