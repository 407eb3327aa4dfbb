//! Several independent registries behind one view.
//!
//! Every type and root must belong to exactly one underlying registry. The
//! owner of a key is looked up across all registries the first time the key
//! is queried; if more than one registry claims it the query fails with
//! [`GripError::AmbiguousType`] / [`GripError::AmbiguousPath`], and a unique
//! owner is remembered for the lifetime of the combined registry.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use grip_classfile::ObjectType;
use parking_lot::RwLock;

use crate::class_registry::ClassRegistry;
use crate::error::{GripError, Result};
use crate::file_registry::{normalize_root, FileRegistry};
use crate::mirror::{AnnotationMirror, ClassMirror};

struct Owners<K> {
    owners: RwLock<HashMap<K, usize>>,
}

impl<K: Hash + Eq + Clone> Owners<K> {
    fn new() -> Self {
        Self {
            owners: RwLock::new(HashMap::new()),
        }
    }

    /// Index of the single registry for which `claims` holds.
    fn find(
        &self,
        key: &K,
        registries: usize,
        mut claims: impl FnMut(usize) -> Result<bool>,
        ambiguous: impl FnOnce() -> GripError,
    ) -> Result<Option<usize>> {
        if let Some(&owner) = self.owners.read().get(key) {
            return Ok(Some(owner));
        }

        let mut owner = None;
        for index in 0..registries {
            if claims(index)? {
                if owner.is_some() {
                    return Err(ambiguous());
                }
                owner = Some(index);
            }
        }
        if let Some(owner) = owner {
            self.owners.write().insert(key.clone(), owner);
        }
        Ok(owner)
    }

    fn clear(&self) {
        self.owners.write().clear();
    }
}

pub struct CombinedFileRegistry {
    registries: Vec<Arc<dyn FileRegistry>>,
    type_owners: Owners<ObjectType>,
    path_owners: Owners<PathBuf>,
    closed: AtomicBool,
}

impl CombinedFileRegistry {
    pub fn new(registries: Vec<Arc<dyn FileRegistry>>) -> Self {
        Self {
            registries,
            type_owners: Owners::new(),
            path_owners: Owners::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(GripError::Closed("combined file registry"));
        }
        Ok(())
    }

    pub(crate) fn type_owner(&self, ty: &ObjectType) -> Result<Option<usize>> {
        self.ensure_open()?;
        self.type_owners.find(
            ty,
            self.registries.len(),
            |index| self.registries[index].contains_type(ty),
            || GripError::AmbiguousType(ty.clone()),
        )
    }

    fn path_owner(&self, path: &Path) -> Result<Option<(usize, PathBuf)>> {
        self.ensure_open()?;
        let path = normalize_root(path);
        let owner = self.path_owners.find(
            &path,
            self.registries.len(),
            |index| self.registries[index].contains_path(&path),
            || GripError::AmbiguousPath(path.clone()),
        )?;
        Ok(owner.map(|owner| (owner, path)))
    }
}

impl FileRegistry for CombinedFileRegistry {
    fn classpath(&self) -> Result<Vec<PathBuf>> {
        self.ensure_open()?;
        let mut classpath = Vec::new();
        for registry in &self.registries {
            classpath.extend(registry.classpath()?);
        }
        Ok(classpath)
    }

    fn contains_path(&self, path: &Path) -> Result<bool> {
        Ok(self.path_owner(path)?.is_some())
    }

    fn contains_type(&self, ty: &ObjectType) -> Result<bool> {
        Ok(self.type_owner(ty)?.is_some())
    }

    fn read_class(&self, ty: &ObjectType) -> Result<Vec<u8>> {
        match self.type_owner(ty)? {
            Some(owner) => self.registries[owner].read_class(ty),
            None => Err(GripError::UnknownType(ty.clone())),
        }
    }

    fn find_types_for_path(&self, path: &Path) -> Result<Vec<ObjectType>> {
        match self.path_owner(path)? {
            Some((owner, path)) => self.registries[owner].find_types_for_path(&path),
            None => Err(GripError::UnknownPath(normalize_root(path))),
        }
    }

    fn find_path_for_type(&self, ty: &ObjectType) -> Result<Option<PathBuf>> {
        match self.type_owner(ty)? {
            Some(owner) => self.registries[owner].find_path_for_type(ty),
            None => Ok(None),
        }
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.type_owners.clear();
        self.path_owners.clear();
        close_all(self.registries.iter().map(|registry| registry.close()))
    }
}

impl fmt::Debug for CombinedFileRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinedFileRegistry")
            .field("registries", &self.registries)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Routes each type to the class registry paired with the file registry
/// that owns it.
///
/// Mirrors are produced by the owning registry, so annotation types and
/// enclosing classes they refer to are resolved within that registry's
/// classpath.
pub struct CombinedClassRegistry {
    files: Arc<CombinedFileRegistry>,
    registries: Vec<Arc<dyn ClassRegistry>>,
    closed: AtomicBool,
}

impl CombinedClassRegistry {
    /// `registries[i]` must be backed by the `i`-th registry of `files`.
    pub fn new(files: Arc<CombinedFileRegistry>, registries: Vec<Arc<dyn ClassRegistry>>) -> Self {
        debug_assert_eq!(files.registries.len(), registries.len());
        Self {
            files,
            registries,
            closed: AtomicBool::new(false),
        }
    }

    fn owner(&self, ty: &ObjectType) -> Result<Option<&Arc<dyn ClassRegistry>>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(GripError::Closed("combined class registry"));
        }
        Ok(self
            .files
            .type_owner(ty)?
            .and_then(|owner| self.registries.get(owner)))
    }
}

impl ClassRegistry for CombinedClassRegistry {
    fn class_mirror(&self, ty: &ObjectType) -> Result<Arc<ClassMirror>> {
        match self.owner(ty)? {
            Some(registry) => registry.class_mirror(ty),
            None => Err(GripError::UnknownType(ty.clone())),
        }
    }

    fn annotation_mirror(&self, ty: &ObjectType) -> Result<Arc<AnnotationMirror>> {
        match self.owner(ty)? {
            Some(registry) => registry.annotation_mirror(ty),
            None => Ok(Arc::new(AnnotationMirror::unresolved(ty.clone()))),
        }
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        close_all(self.registries.iter().map(|registry| registry.close()))
    }
}

impl fmt::Debug for CombinedClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinedClassRegistry")
            .field("registries", &self.registries)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Runs every close and reports the first failure.
fn close_all(results: impl Iterator<Item = Result<()>>) -> Result<()> {
    let mut first = Ok(());
    for result in results {
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed to close registry");
            if first.is_ok() {
                first = Err(err);
            }
        }
    }
    first
}
