use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{EntryKind, FileSource, FileSourceError, Result, SourceKind};

/// An exploded class directory.
#[derive(Debug)]
pub struct DirectoryFileSource {
    root: PathBuf,
    closed: AtomicBool,
}

impl DirectoryFileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(FileSourceError::Closed(self.root.clone()))
        } else {
            Ok(())
        }
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let mut resolved = self.root.clone();
        for segment in path.split(['/', '\\']).filter(|s| !s.is_empty()) {
            match Path::new(segment).components().next() {
                Some(Component::Normal(_)) => resolved.push(segment),
                _ => return None,
            }
        }
        Some(resolved)
    }
}

impl FileSource for DirectoryFileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Directory
    }

    fn list_entries(&self, visitor: &mut dyn FnMut(&str, EntryKind)) -> Result<()> {
        self.ensure_open()?;
        for entry in walkdir::WalkDir::new(&self.root)
            .follow_links(true)
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|err| {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone());
                FileSourceError::io(path, err.into())
            })?;

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let logical = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let kind = if entry.file_type().is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::of_file(&logical)
            };
            visitor(&logical, kind);
        }
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let not_found = || FileSourceError::EntryNotFound {
            root: self.root.clone(),
            entry: path.to_string(),
        };
        let file = self.resolve(path).ok_or_else(not_found)?;
        match std::fs::read(&file) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            Err(err) => Err(FileSourceError::io(file, err)),
        }
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_relative_paths_with_forward_slashes() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("com/example")).unwrap();
        std::fs::write(tmp.path().join("com/example/Foo.class"), b"foo").unwrap();
        std::fs::write(tmp.path().join("com/example/notes.txt"), b"txt").unwrap();

        let source = DirectoryFileSource::new(tmp.path());
        let mut entries = Vec::new();
        source
            .list_entries(&mut |path, kind| entries.push((path.to_string(), kind)))
            .unwrap();

        assert_eq!(
            entries,
            vec![
                ("com".to_string(), EntryKind::Directory),
                ("com/example".to_string(), EntryKind::Directory),
                ("com/example/Foo.class".to_string(), EntryKind::Class),
                ("com/example/notes.txt".to_string(), EntryKind::File),
            ]
        );
        assert_eq!(source.read_file("com/example/Foo.class").unwrap(), b"foo");
    }

    #[test]
    fn refuses_paths_outside_the_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = DirectoryFileSource::new(tmp.path().join("classes"));
        assert!(matches!(
            source.read_file("../secret.class"),
            Err(FileSourceError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn closed_source_rejects_calls() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = DirectoryFileSource::new(tmp.path());
        source.close().unwrap();
        source.close().unwrap();
        assert!(matches!(
            source.list_entries(&mut |_, _| {}),
            Err(FileSourceError::Closed(_))
        ));
        assert!(matches!(
            source.read_file("Foo.class"),
            Err(FileSourceError::Closed(_))
        ));
    }
}
