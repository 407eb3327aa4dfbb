use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use zip::ZipArchive;

use crate::{EntryKind, FileSource, FileSourceError, Result, SourceKind};

/// A jar (or any zip) archive.
///
/// Class entries under `META-INF/` (multi-release overlays, versioned
/// `module-info`) are reported as plain files: they do not map to binary
/// names.
#[derive(Debug)]
pub struct JarFileSource {
    path: PathBuf,
    archive: Mutex<Option<ZipArchive<File>>>,
}

impl JarFileSource {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|err| FileSourceError::io(&path, err))?;
        let archive = ZipArchive::new(file).map_err(|err| FileSourceError::zip(&path, err))?;
        Ok(Self {
            path,
            archive: Mutex::new(Some(archive)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub(crate) fn classify_archive_entry(name: &str) -> EntryKind {
    if name.ends_with('/') {
        EntryKind::Directory
    } else if name.starts_with("META-INF/") {
        EntryKind::File
    } else {
        EntryKind::of_file(name)
    }
}

pub(crate) fn read_archive_entry(
    archive: &mut ZipArchive<File>,
    archive_path: &Path,
    name: &str,
) -> Result<Option<Vec<u8>>> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut bytes)
                .map_err(|err| FileSourceError::io(archive_path, err))?;
            Ok(Some(bytes))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(FileSourceError::zip(archive_path, err)),
    }
}

impl FileSource for JarFileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Archive
    }

    fn list_entries(&self, visitor: &mut dyn FnMut(&str, EntryKind)) -> Result<()> {
        let names: Vec<String> = {
            let guard = self.archive.lock();
            let archive = guard
                .as_ref()
                .ok_or_else(|| FileSourceError::Closed(self.path.clone()))?;
            archive.file_names().map(str::to_owned).collect()
        };
        let mut names = names;
        // Central directory order is arbitrary; keep listings stable.
        names.sort();
        for name in &names {
            visitor(name, classify_archive_entry(name));
        }
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let mut guard = self.archive.lock();
        let archive = guard
            .as_mut()
            .ok_or_else(|| FileSourceError::Closed(self.path.clone()))?;
        read_archive_entry(archive, &self.path, path)?.ok_or_else(|| {
            FileSourceError::EntryNotFound {
                root: self.path.clone(),
                entry: path.to_string(),
            }
        })
    }

    fn close(&self) -> Result<()> {
        self.archive.lock().take();
        Ok(())
    }
}
