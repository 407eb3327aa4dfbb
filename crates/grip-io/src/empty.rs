use crate::{EntryKind, FileSource, FileSourceError, Result, SourceKind};

/// Stand-in for a classpath root that does not exist.
#[derive(Debug, Clone, Default)]
pub struct EmptyFileSource {
    root: std::path::PathBuf,
}

impl EmptyFileSource {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileSource for EmptyFileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Empty
    }

    fn list_entries(&self, _visitor: &mut dyn FnMut(&str, EntryKind)) -> Result<()> {
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        Err(FileSourceError::EntryNotFound {
            root: self.root.clone(),
            entry: path.to_string(),
        })
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
