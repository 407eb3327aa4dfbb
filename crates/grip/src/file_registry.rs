use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use grip_classfile::ObjectType;
use grip_io::{
    entry_to_internal_name, is_runtime_image_path, EntryKind, FileSource, FileSourceFactory,
};
use parking_lot::RwLock;

use crate::error::{GripError, Result};

/// Class files of a classpath, addressed by type.
pub trait FileRegistry: Send + Sync + fmt::Debug {
    /// Roots in registration order.
    fn classpath(&self) -> Result<Vec<PathBuf>>;

    fn contains_path(&self, path: &Path) -> Result<bool>;

    fn contains_type(&self, ty: &ObjectType) -> Result<bool>;

    fn read_class(&self, ty: &ObjectType) -> Result<Vec<u8>>;

    /// Types under the root `path`. Unknown roots are an error; a known root
    /// without classes yields an empty list.
    fn find_types_for_path(&self, path: &Path) -> Result<Vec<ObjectType>>;

    /// The root that provides `ty`, if any.
    fn find_path_for_type(&self, ty: &ObjectType) -> Result<Option<PathBuf>>;

    fn close(&self) -> Result<()>;
}

/// A [`FileRegistry`] over a fixed list of roots, indexed once at
/// construction.
///
/// When several roots contain the same class file, the first root provides
/// its bytes; every root still lists it.
pub struct FileRegistryImpl {
    index: RwLock<Option<Index>>,
}

struct Index {
    roots: Vec<Root>,
    root_by_path: HashMap<PathBuf, usize>,
    types: HashMap<ObjectType, TypeEntry>,
}

struct Root {
    path: PathBuf,
    source: Box<dyn FileSource>,
    types: Vec<ObjectType>,
}

struct TypeEntry {
    root: usize,
    entry: String,
}

impl FileRegistryImpl {
    pub fn new<I, P>(classpath: I, factory: &dyn FileSourceFactory) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut paths: Vec<PathBuf> = Vec::new();
        for path in classpath {
            let path = normalize_root(path.as_ref());
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(GripError::EmptyClasspath);
        }

        let mut index = Index {
            roots: Vec::with_capacity(paths.len()),
            root_by_path: HashMap::with_capacity(paths.len()),
            types: HashMap::new(),
        };
        for path in paths {
            if let Err(err) = index.add_root(path, factory) {
                index.release();
                return Err(err);
            }
        }

        Ok(Self {
            index: RwLock::new(Some(index)),
        })
    }

    fn with_index<T>(&self, f: impl FnOnce(&Index) -> Result<T>) -> Result<T> {
        match &*self.index.read() {
            Some(index) => f(index),
            None => Err(GripError::Closed("file registry")),
        }
    }
}

impl Index {
    fn add_root(&mut self, path: PathBuf, factory: &dyn FileSourceFactory) -> Result<()> {
        let source = factory
            .create_file_source(&path)
            .map_err(|source| GripError::Source {
                path: path.clone(),
                source,
            })?;

        let root = self.roots.len();
        let mut types = Vec::new();
        let mut shadowed = 0usize;
        let listed = source.list_entries(&mut |entry, kind| {
            if kind != EntryKind::Class {
                return;
            }
            let Some(internal_name) = entry_to_internal_name(entry) else {
                return;
            };
            if internal_name == "module-info" {
                return;
            }
            let ty = ObjectType::from_internal_name(&internal_name);
            if self.types.contains_key(&ty) {
                shadowed += 1;
            } else {
                self.types.insert(
                    ty.clone(),
                    TypeEntry {
                        root,
                        entry: entry.to_string(),
                    },
                );
            }
            types.push(ty);
        });

        if let Err(err) = listed {
            release_source(&path, source.as_ref());
            return Err(GripError::Source { path, source: err });
        }

        tracing::debug!(
            root = %path.display(),
            kind = %source.kind(),
            classes = types.len(),
            shadowed,
            "indexed classpath root"
        );
        self.root_by_path.insert(path.clone(), root);
        self.roots.push(Root {
            path,
            source,
            types,
        });
        Ok(())
    }

    fn release(&self) {
        for root in &self.roots {
            release_source(&root.path, root.source.as_ref());
        }
    }
}

fn release_source(path: &Path, source: &dyn FileSource) {
    if let Err(err) = source.close() {
        tracing::warn!(root = %path.display(), error = %err, "failed to release classpath root");
    }
}

impl FileRegistry for FileRegistryImpl {
    fn classpath(&self) -> Result<Vec<PathBuf>> {
        self.with_index(|index| Ok(index.roots.iter().map(|root| root.path.clone()).collect()))
    }

    fn contains_path(&self, path: &Path) -> Result<bool> {
        let path = normalize_root(path);
        self.with_index(|index| Ok(index.root_by_path.contains_key(&path)))
    }

    fn contains_type(&self, ty: &ObjectType) -> Result<bool> {
        self.with_index(|index| Ok(index.types.contains_key(ty)))
    }

    fn read_class(&self, ty: &ObjectType) -> Result<Vec<u8>> {
        self.with_index(|index| {
            let entry = index
                .types
                .get(ty)
                .ok_or_else(|| GripError::UnknownType(ty.clone()))?;
            index.roots[entry.root]
                .source
                .read_file(&entry.entry)
                .map_err(|source| GripError::ClassBytes {
                    ty: ty.clone(),
                    source,
                })
        })
    }

    fn find_types_for_path(&self, path: &Path) -> Result<Vec<ObjectType>> {
        let path = normalize_root(path);
        self.with_index(|index| match index.root_by_path.get(&path) {
            Some(&root) => Ok(index.roots[root].types.clone()),
            None => Err(GripError::UnknownPath(path)),
        })
    }

    fn find_path_for_type(&self, ty: &ObjectType) -> Result<Option<PathBuf>> {
        self.with_index(|index| {
            Ok(index
                .types
                .get(ty)
                .map(|entry| index.roots[entry.root].path.clone()))
        })
    }

    fn close(&self) -> Result<()> {
        let Some(index) = self.index.write().take() else {
            return Ok(());
        };
        index.release();
        Ok(())
    }
}

impl fmt::Debug for FileRegistryImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.index.read() {
            Some(index) => f
                .debug_struct("FileRegistryImpl")
                .field(
                    "roots",
                    &index.roots.iter().map(|root| &root.path).collect::<Vec<_>>(),
                )
                .field("types", &index.types.len())
                .finish(),
            None => f.write_str("FileRegistryImpl(closed)"),
        }
    }
}

/// Absolute, lexically normalised form of a root. The runtime image pseudo
/// path is kept as is.
pub(crate) fn normalize_root(path: &Path) -> PathBuf {
    if is_runtime_image_path(path) {
        return path.to_path_buf();
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use grip_test_utils::{ClassFileBuilder, InMemoryFileSource, InMemorySourceFactory};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorKind;

    fn ty(name: &str) -> ObjectType {
        ObjectType::from_internal_name(name)
    }

    #[test]
    fn roots_are_normalised_and_deduplicated() {
        assert_eq!(
            normalize_root(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_root(Path::new("jrt:")), PathBuf::from("jrt:"));

        let factory = InMemorySourceFactory::new()
            .with_source(InMemoryFileSource::new("/mem/one").build())
            .with_source(InMemoryFileSource::new("/mem/two").build());
        let registry =
            FileRegistryImpl::new(["/mem/two", "/mem/one", "/mem/./two"], &factory).unwrap();

        assert_eq!(
            registry.classpath().unwrap(),
            vec![PathBuf::from("/mem/two"), PathBuf::from("/mem/one")]
        );
        assert_eq!(factory.created(), 2);
    }

    #[test]
    fn duplicate_classes_are_read_from_the_first_root() {
        let first = InMemoryFileSource::new("/mem/first")
            .class("a/Dup", ClassFileBuilder::new("a/Dup").build())
            .build();
        let second = InMemoryFileSource::new("/mem/second")
            .class("a/Dup", ClassFileBuilder::new("a/Dup").build())
            .class("a/Only", ClassFileBuilder::new("a/Only").build())
            .file("a/notes.txt", "text")
            .build();
        let factory = InMemorySourceFactory::new()
            .with_source(first.clone())
            .with_source(second.clone());
        let registry = FileRegistryImpl::new(["/mem/first", "/mem/second"], &factory).unwrap();

        assert_eq!(
            registry.find_path_for_type(&ty("a/Dup")).unwrap(),
            Some(PathBuf::from("/mem/first"))
        );
        let mut listed = registry.find_types_for_path(Path::new("/mem/second")).unwrap();
        listed.sort_by(|a, b| a.internal_name().cmp(b.internal_name()));
        assert_eq!(listed, vec![ty("a/Dup"), ty("a/Only")]);
        assert_eq!(
            registry.find_types_for_path(Path::new("/mem/first")).unwrap(),
            vec![ty("a/Dup")]
        );

        registry.read_class(&ty("a/Dup")).unwrap();
        assert_eq!(first.read_count("a/Dup.class"), 1);
        assert_eq!(second.read_count("a/Dup.class"), 0);
    }

    #[test]
    fn unknown_roots_and_types_are_lookup_errors() {
        let factory = InMemorySourceFactory::new()
            .with_source(InMemoryFileSource::new("/mem/empty").build());
        let registry = FileRegistryImpl::new(["/mem/empty"], &factory).unwrap();

        assert_eq!(
            registry.find_types_for_path(Path::new("/mem/empty")).unwrap(),
            Vec::<ObjectType>::new()
        );
        let err = registry
            .find_types_for_path(Path::new("/mem/elsewhere"))
            .unwrap_err();
        assert!(matches!(err, GripError::UnknownPath(_)));

        assert_eq!(registry.find_path_for_type(&ty("a/Nope")).unwrap(), None);
        assert!(!registry.contains_type(&ty("a/Nope")).unwrap());
        let err = registry.read_class(&ty("a/Nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn construction_failures_are_configuration_errors() {
        let factory = InMemorySourceFactory::new();
        let err = FileRegistryImpl::new(Vec::<PathBuf>::new(), &factory).unwrap_err();
        assert!(matches!(err, GripError::EmptyClasspath));

        let opened = InMemoryFileSource::new("/mem/ok").build();
        let factory = InMemorySourceFactory::new().with_source(opened.clone());
        let err = FileRegistryImpl::new(["/mem/ok", "/mem/unknown"], &factory).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(opened.is_closed());
    }

    #[test]
    fn close_releases_sources_once() {
        let source = InMemoryFileSource::new("/mem/root")
            .class("a/A", ClassFileBuilder::new("a/A").build())
            .build();
        let factory = InMemorySourceFactory::new().with_source(source.clone());
        let registry = FileRegistryImpl::new(["/mem/root"], &factory).unwrap();

        registry.close().unwrap();
        registry.close().unwrap();
        assert_eq!(source.close_calls(), 1);

        let path = Path::new("/mem/root");
        let errors = [
            registry.classpath().map(drop).unwrap_err(),
            registry.contains_path(path).map(drop).unwrap_err(),
            registry.contains_type(&ty("a/A")).map(drop).unwrap_err(),
            registry.read_class(&ty("a/A")).map(drop).unwrap_err(),
            registry.find_types_for_path(path).map(drop).unwrap_err(),
            registry.find_path_for_type(&ty("a/A")).map(drop).unwrap_err(),
        ];
        for err in errors {
            assert_eq!(err.kind(), ErrorKind::State);
        }
    }
}
