use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use zip::ZipArchive;

use crate::jar::read_archive_entry;
use crate::{EntryKind, FileSource, FileSourceError, Result, SourceKind};

const CLASSES_PREFIX: &str = "classes/";

/// The platform classes of a JDK, read from its `jmods/` directory (or a
/// single `.jmod` file).
///
/// Only the `classes/` section of each module is exposed, with that prefix
/// stripped. When several modules carry the same entry the first module
/// wins; `java.base` is always first, the rest follow in file-name order.
#[derive(Debug)]
pub struct ModuleImageFileSource {
    root: PathBuf,
    state: Mutex<Option<ModuleImage>>,
}

#[derive(Debug)]
struct ModuleImage {
    modules: Vec<(PathBuf, ZipArchive<File>)>,
    entries: Vec<(String, EntryKind)>,
    owners: HashMap<String, usize>,
}

impl ModuleImageFileSource {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let module_paths = if root.is_dir() {
            list_jmods(&root)?
        } else {
            vec![root.clone()]
        };

        let mut image = ModuleImage {
            modules: Vec::with_capacity(module_paths.len()),
            entries: Vec::new(),
            owners: HashMap::new(),
        };
        for path in module_paths {
            let file = File::open(&path).map_err(|err| FileSourceError::io(&path, err))?;
            let archive =
                ZipArchive::new(file).map_err(|err| FileSourceError::zip(&path, err))?;

            let index = image.modules.len();
            let mut names: Vec<&str> = archive
                .file_names()
                .filter(|name| name.starts_with(CLASSES_PREFIX))
                .collect();
            names.sort_unstable();
            for name in names {
                let logical = &name[CLASSES_PREFIX.len()..];
                if logical.is_empty() || image.owners.contains_key(logical) {
                    continue;
                }
                let kind = if logical.ends_with('/') {
                    EntryKind::Directory
                } else {
                    EntryKind::of_file(logical)
                };
                image.owners.insert(logical.to_string(), index);
                image.entries.push((logical.to_string(), kind));
            }
            image.modules.push((path, archive));
        }

        Ok(Self {
            root,
            state: Mutex::new(Some(image)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn list_jmods(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_dir = std::fs::read_dir(dir).map_err(|err| FileSourceError::io(dir, err))?;
    let mut paths = Vec::new();
    for entry in read_dir {
        let path = entry.map_err(|err| FileSourceError::io(dir, err))?.path();
        if path.extension().is_some_and(|ext| ext == "jmod") {
            paths.push(path);
        }
    }

    // `java.base` first since it's where most lookups land.
    paths.sort_by_key(|path| {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        (file_name != "java.base.jmod", file_name)
    });
    Ok(paths)
}

impl FileSource for ModuleImageFileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::ModuleImage
    }

    fn list_entries(&self, visitor: &mut dyn FnMut(&str, EntryKind)) -> Result<()> {
        let entries = {
            let guard = self.state.lock();
            let image = guard
                .as_ref()
                .ok_or_else(|| FileSourceError::Closed(self.root.clone()))?;
            image.entries.clone()
        };
        for (path, kind) in &entries {
            visitor(path, *kind);
        }
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let not_found = || FileSourceError::EntryNotFound {
            root: self.root.clone(),
            entry: path.to_string(),
        };

        let mut guard = self.state.lock();
        let image = guard
            .as_mut()
            .ok_or_else(|| FileSourceError::Closed(self.root.clone()))?;
        let index = *image.owners.get(path).ok_or_else(not_found)?;
        let (module_path, archive) = &mut image.modules[index];
        let entry = format!("{CLASSES_PREFIX}{path}");
        read_archive_entry(archive, module_path, &entry)?.ok_or_else(not_found)
    }

    fn close(&self) -> Result<()> {
        self.state.lock().take();
        Ok(())
    }
}
