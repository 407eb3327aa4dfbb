use std::fmt;
use std::path::Path;

use crate::{
    runtime_jmods, DirectoryFileSource, EmptyFileSource, FileSource, FileSourceError,
    JarFileSource, ModuleImageFileSource, Result,
};

/// Pseudo path naming the running JDK's platform classes.
pub const RUNTIME_IMAGE_PATH: &str = "jrt:";

pub fn is_runtime_image_path(path: &Path) -> bool {
    path.to_str()
        .is_some_and(|s| s.starts_with(RUNTIME_IMAGE_PATH))
}

/// Decides which [`FileSource`] backs a classpath root.
pub trait FileSourceFactory: Send + Sync + fmt::Debug {
    fn create_file_source(&self, path: &Path) -> Result<Box<dyn FileSource>>;
}

/// The on-disk factory:
///
/// - `jrt:` resolves the JDK from `JAVA_HOME` and reads its `jmods/`;
/// - a missing path is an empty source;
/// - a directory holding `jmods/` or `.jmod` files is a module image;
/// - any other directory is a class directory;
/// - `.jar` / `.zip` files are archives, `.jmod` files single-module images.
///
/// Anything else is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct IoFactory;

impl FileSourceFactory for IoFactory {
    fn create_file_source(&self, path: &Path) -> Result<Box<dyn FileSource>> {
        if is_runtime_image_path(path) {
            return Ok(Box::new(ModuleImageFileSource::open(runtime_jmods()?)?));
        }

        if !path.exists() {
            return Ok(Box::new(EmptyFileSource::new(path)));
        }

        if path.is_dir() {
            let jmods = path.join("jmods");
            if jmods.is_dir() {
                return Ok(Box::new(ModuleImageFileSource::open(jmods)?));
            }
            if contains_jmod(path)? {
                return Ok(Box::new(ModuleImageFileSource::open(path)?));
            }
            return Ok(Box::new(DirectoryFileSource::new(path)));
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("jar" | "zip") => Ok(Box::new(JarFileSource::open(path)?)),
            Some("jmod") => Ok(Box::new(ModuleImageFileSource::open(path)?)),
            _ => Err(FileSourceError::UnknownSourceKind(path.to_path_buf())),
        }
    }
}

fn contains_jmod(dir: &Path) -> Result<bool> {
    let read_dir = std::fs::read_dir(dir).map_err(|err| FileSourceError::io(dir, err))?;
    for entry in read_dir {
        let entry = entry.map_err(|err| FileSourceError::io(dir, err))?;
        if entry.path().extension().is_some_and(|ext| ext == "jmod") {
            return Ok(true);
        }
    }
    Ok(false)
}
