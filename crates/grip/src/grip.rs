use std::path::Path;
use std::sync::Arc;

use grip_io::{FileSourceFactory, IoFactory};

use crate::class_registry::{ClassRegistry, ClassRegistryImpl};
use crate::combined::{CombinedClassRegistry, CombinedFileRegistry};
use crate::config::GripConfig;
use crate::error::{GripError, Result};
use crate::file_registry::{FileRegistry, FileRegistryImpl};
use crate::mirror::ClassMirror;
use crate::reflector::Reflector;

/// A file registry and the class registry built on top of it.
#[derive(Debug, Clone)]
pub struct Grip {
    file_registry: Arc<dyn FileRegistry>,
    class_registry: Arc<dyn ClassRegistry>,
}

impl Grip {
    pub fn new(
        file_registry: Arc<dyn FileRegistry>,
        class_registry: Arc<dyn ClassRegistry>,
    ) -> Self {
        Self {
            file_registry,
            class_registry,
        }
    }

    pub fn file_registry(&self) -> &Arc<dyn FileRegistry> {
        &self.file_registry
    }

    pub fn class_registry(&self) -> &Arc<dyn ClassRegistry> {
        &self.class_registry
    }

    /// Mirrors of every class under the given roots, root by root.
    pub fn class_mirrors<I, P>(&self, paths: I) -> Result<Vec<Arc<ClassMirror>>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut mirrors = Vec::new();
        for path in paths {
            for ty in self.file_registry.find_types_for_path(path.as_ref())? {
                mirrors.push(self.class_registry.class_mirror(&ty)?);
            }
        }
        Ok(mirrors)
    }

    /// Closes the class registry, then the file registry. Both are closed
    /// even if the first one fails.
    pub fn close(&self) -> Result<()> {
        let classes = self.class_registry.close();
        let files = self.file_registry.close();
        classes.and(files)
    }
}

/// Builds [`Grip`]s for classpaths.
#[derive(Debug, Clone)]
pub struct GripFactory {
    source_factory: Arc<dyn FileSourceFactory>,
    reflector: Reflector,
}

impl Default for GripFactory {
    fn default() -> Self {
        Self {
            source_factory: Arc::new(IoFactory),
            reflector: Reflector::new(),
        }
    }
}

impl GripFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_factory(mut self, source_factory: Arc<dyn FileSourceFactory>) -> Self {
        self.source_factory = source_factory;
        self
    }

    pub fn create<I, P>(&self, classpath: I) -> Result<Grip>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let file_registry = Arc::new(FileRegistryImpl::new(
            classpath,
            self.source_factory.as_ref(),
        )?);
        let class_registry = ClassRegistryImpl::new(file_registry.clone(), self.reflector);
        Ok(Grip::new(file_registry, class_registry))
    }

    pub fn create_from_config(&self, config: &GripConfig) -> Result<Grip> {
        self.create(config.roots())
    }
}

/// Builds one [`Grip`] out of several independent ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombinedGripFactory;

impl CombinedGripFactory {
    pub fn create(grips: Vec<Grip>) -> Result<Grip> {
        if grips.len() < 2 {
            return Err(GripError::Config(format!(
                "combining registries needs at least two, got {}",
                grips.len()
            )));
        }
        let (files, classes): (Vec<_>, Vec<_>) = grips
            .into_iter()
            .map(|grip| (grip.file_registry, grip.class_registry))
            .unzip();
        let files = Arc::new(CombinedFileRegistry::new(files));
        let classes = Arc::new(CombinedClassRegistry::new(files.clone(), classes));
        Ok(Grip::new(files, classes))
    }
}
