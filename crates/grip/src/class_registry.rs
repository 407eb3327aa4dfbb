use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use grip_classfile::ObjectType;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::{GripError, ReflectError, Result};
use crate::file_registry::FileRegistry;
use crate::mirror::{AnnotationMirror, AnnotationValue, ClassMirror};
use crate::reflector::Reflector;

const RETENTION: &str = "java/lang/annotation/Retention";
const RETENTION_POLICY: &str = "java/lang/annotation/RetentionPolicy";
const RUNTIME: &str = "RUNTIME";

/// Mirrors for the classes of one classpath.
pub trait ClassRegistry: Send + Sync + fmt::Debug {
    fn class_mirror(&self, ty: &ObjectType) -> Result<Arc<ClassMirror>>;

    /// Annotation type `ty` with its element defaults. Types that are not on
    /// the classpath yield an unresolved placeholder rather than an error.
    fn annotation_mirror(&self, ty: &ObjectType) -> Result<Arc<AnnotationMirror>>;

    fn close(&self) -> Result<()>;
}

/// One-time cells keyed by type. The map lock is only held to find the
/// cell, so computations for different keys run in parallel while those
/// for the same key collapse into one.
struct MirrorCache<V> {
    cells: Mutex<HashMap<ObjectType, Arc<OnceCell<V>>>>,
}

impl<V: Clone> MirrorCache<V> {
    fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    fn get_or_try_init(&self, ty: &ObjectType, init: impl FnOnce() -> Result<V>) -> Result<V> {
        let cell = self.cells.lock().entry(ty.clone()).or_default().clone();
        let result = cell.get_or_try_init(init).cloned();
        if result.is_err() {
            let mut cells = self.cells.lock();
            let stale = cells
                .get(ty)
                .is_some_and(|current| Arc::ptr_eq(current, &cell) && current.get().is_none());
            if stale {
                cells.remove(ty);
            }
        }
        result
    }

    fn len(&self) -> usize {
        self.cells.lock().values().filter(|cell| cell.get().is_some()).count()
    }

    fn clear(&self) {
        self.cells.lock().clear();
    }
}

/// Caches one [`ClassMirror`] and one [`AnnotationMirror`] per type for the
/// lifetime of the registry.
pub struct ClassRegistryImpl {
    file_registry: Arc<dyn FileRegistry>,
    reflector: Reflector,
    this: Weak<ClassRegistryImpl>,
    closed: AtomicBool,
    class_mirrors: MirrorCache<Arc<ClassMirror>>,
    annotation_mirrors: MirrorCache<Arc<AnnotationMirror>>,
}

impl ClassRegistryImpl {
    pub fn new(file_registry: Arc<dyn FileRegistry>, reflector: Reflector) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            file_registry,
            reflector,
            this: this.clone(),
            closed: AtomicBool::new(false),
            class_mirrors: MirrorCache::new(),
            annotation_mirrors: MirrorCache::new(),
        })
    }

    pub fn file_registry(&self) -> &Arc<dyn FileRegistry> {
        &self.file_registry
    }

    /// Number of class mirrors computed so far.
    pub fn cached_class_mirrors(&self) -> usize {
        self.class_mirrors.len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(GripError::Closed("class registry"));
        }
        Ok(())
    }

    fn registry_handle(&self) -> Weak<dyn ClassRegistry> {
        self.this.clone()
    }

    fn compute_annotation_mirror(&self, ty: &ObjectType) -> Result<Arc<AnnotationMirror>> {
        if !self.file_registry.contains_type(ty)? {
            tracing::trace!(ty = %ty, "annotation type is not on the classpath");
            return Ok(Arc::new(AnnotationMirror::unresolved(ty.clone())));
        }

        tracing::trace!(ty = %ty, "reflecting annotation type");
        let bytes = self.file_registry.read_class(ty)?;
        let class = self
            .reflector
            .reflect(bytes, self.registry_handle(), true)
            .map_err(|err| GripError::parse(ty, err))?;
        let visible = is_runtime_retained(&class)?;

        let mut values = IndexMap::new();
        for method in class.methods()? {
            if let Some(default) = method.default_value() {
                values.insert(method.name().to_string(), default.clone());
            }
        }
        Ok(Arc::new(AnnotationMirror::new(
            ty.clone(),
            values,
            visible,
            true,
        )))
    }
}

impl ClassRegistry for ClassRegistryImpl {
    fn class_mirror(&self, ty: &ObjectType) -> Result<Arc<ClassMirror>> {
        self.ensure_open()?;
        self.class_mirrors.get_or_try_init(ty, || {
            let bytes = self.file_registry.read_class(ty)?;
            tracing::trace!(ty = %ty, len = bytes.len(), "reflecting class");
            let mirror = self
                .reflector
                .reflect(bytes, self.registry_handle(), false)
                .map_err(|err| GripError::parse(ty, err))?;
            Ok(Arc::new(mirror))
        })
    }

    fn annotation_mirror(&self, ty: &ObjectType) -> Result<Arc<AnnotationMirror>> {
        self.ensure_open()?;
        self.annotation_mirrors
            .get_or_try_init(ty, || self.compute_annotation_mirror(ty))
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.class_mirrors.clear();
        self.annotation_mirrors.clear();
        Ok(())
    }
}

impl fmt::Debug for ClassRegistryImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistryImpl")
            .field("file_registry", &self.file_registry)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Whether annotation type `class` is retained at run time, according to
/// its own `@Retention`. No `@Retention` means class-file retention.
fn is_runtime_retained(class: &ClassMirror) -> Result<bool> {
    let retention = ObjectType::from_internal_name(RETENTION);
    let Some(retention) = class.annotations()?.get(&retention) else {
        return Ok(false);
    };
    match retention.value("value") {
        Some(AnnotationValue::Enum(policy)) if policy.ty.internal_name() == RETENTION_POLICY => {
            Ok(policy.value == RUNTIME)
        }
        other => Err(GripError::parse(
            class.ty(),
            ReflectError::UnexpectedRetention {
                annotation: class.ty().clone(),
                found: format!("{other:?}"),
            },
        )),
    }
}
