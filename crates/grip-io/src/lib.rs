//! Physical classpath entries.
//!
//! A [`FileSource`] exposes one root (class directory, jar, JDK module image)
//! as a flat set of logical `/`-separated paths. Which implementation backs a
//! root is decided once by a [`FileSourceFactory`] from the root's on-disk
//! shape.

#![forbid(unsafe_code)]

mod directory;
mod discovery;
mod empty;
mod error;
mod factory;
mod jar;
mod module_image;

use std::fmt;

pub use crate::directory::DirectoryFileSource;
pub use crate::discovery::runtime_jmods;
pub use crate::empty::EmptyFileSource;
pub use crate::error::{FileSourceError, Result};
pub use crate::factory::{
    is_runtime_image_path, FileSourceFactory, IoFactory, RUNTIME_IMAGE_PATH,
};
pub use crate::jar::JarFileSource;
pub use crate::module_image::ModuleImageFileSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Class,
    File,
    Directory,
}

impl EntryKind {
    /// Classify a non-directory entry by name.
    pub fn of_file(name: &str) -> Self {
        if has_class_suffix(name) {
            EntryKind::Class
        } else {
            EntryKind::File
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Empty,
    Directory,
    Archive,
    ModuleImage,
    /// Sources that do not live on disk, e.g. test fixtures.
    Memory,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Empty => "empty",
            SourceKind::Directory => "directory",
            SourceKind::Archive => "archive",
            SourceKind::ModuleImage => "module image",
            SourceKind::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// One classpath root.
///
/// Implementations are shared between threads; `close` releases the
/// underlying handles and is idempotent, after which every other call fails
/// with [`FileSourceError::Closed`].
pub trait FileSource: Send + Sync + fmt::Debug {
    fn kind(&self) -> SourceKind;

    /// Visit every entry with its logical path.
    fn list_entries(&self, visitor: &mut dyn FnMut(&str, EntryKind)) -> Result<()>;

    /// Read an entry previously reported by [`FileSource::list_entries`].
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    fn close(&self) -> Result<()>;
}

pub const CLASS_SUFFIX: &str = ".class";

/// `Foo.class`, `Foo.CLASS`, ...
pub fn has_class_suffix(name: &str) -> bool {
    name.len() > CLASS_SUFFIX.len()
        && name.is_char_boundary(name.len() - CLASS_SUFFIX.len())
        && name[name.len() - CLASS_SUFFIX.len()..].eq_ignore_ascii_case(CLASS_SUFFIX)
}

/// Binary name for a class entry path: separators normalised and the
/// suffix removed.
pub fn entry_to_internal_name(path: &str) -> Option<String> {
    if !has_class_suffix(path) {
        return None;
    }
    let stem = &path[..path.len() - CLASS_SUFFIX.len()];
    let stem = stem.trim_start_matches(['/', '\\']);
    Some(stem.replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_suffix_is_case_insensitive() {
        assert!(has_class_suffix("a/B.class"));
        assert!(has_class_suffix("a/B.CLASS"));
        assert!(!has_class_suffix(".class"));
        assert!(!has_class_suffix("a/B.classx"));
        assert_eq!(EntryKind::of_file("META-INF/MANIFEST.MF"), EntryKind::File);
    }

    #[test]
    fn entry_names_map_to_internal_names() {
        assert_eq!(
            entry_to_internal_name("com\\example\\Foo$Bar.class").as_deref(),
            Some("com/example/Foo$Bar")
        );
        assert_eq!(entry_to_internal_name("/Foo.CLASS").as_deref(), Some("Foo"));
        assert_eq!(entry_to_internal_name("Foo.java"), None);
    }
}
