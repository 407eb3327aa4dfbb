use std::fmt;
use std::sync::Weak;

use grip_classfile::access::{
    ACC_ABSTRACT, ACC_ANNOTATION, ACC_ENUM, ACC_FINAL, ACC_INTERFACE, ACC_PUBLIC, ACC_SYNTHETIC,
};
use grip_classfile::{
    ClassHeader, ClassReader, ClassSignature, GenericDeclaration, MethodType, ObjectType,
};
use once_cell::sync::OnceCell;

use super::annotation::AnnotationCollection;
use super::member::{FieldMirror, MethodMirror};
use crate::class_registry::ClassRegistry;
use crate::error::{GripError, ReflectError, Result};
use crate::reflector::{LoadGuard, Reflector, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassVersion {
    pub major: u16,
    pub minor: u16,
}

/// What a local or anonymous class is declared in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enclosure {
    None,
    /// Declared in an initializer or field initializer of `owner`.
    Anonymous { owner: ObjectType },
    Method {
        owner: ObjectType,
        name: String,
        ty: MethodType,
    },
}

/// Everything that needs a full pass over the class file.
#[derive(Debug)]
pub(crate) struct ClassDetails {
    pub(crate) name: String,
    pub(crate) simple_name: String,
    pub(crate) signature: ClassSignature,
    pub(crate) generic_declaration: GenericDeclaration,
    pub(crate) nested_types: Vec<ObjectType>,
    pub(crate) enclosure: Enclosure,
    pub(crate) source: Option<String>,
    pub(crate) debug: Option<String>,
    pub(crate) annotations: AnnotationCollection,
    pub(crate) fields: Vec<FieldMirror>,
    pub(crate) constructors: Vec<MethodMirror>,
    pub(crate) methods: Vec<MethodMirror>,
}

enum Details {
    Eager(ClassDetails),
    Lazy {
        cell: OnceCell<ClassDetails>,
        reader: ClassReader,
        reflector: Reflector,
        registry: Weak<dyn ClassRegistry>,
    },
}

/// A parsed class.
///
/// The header (version, access, name, super type, interfaces) is available
/// immediately. The rest is read from the retained class bytes on first
/// access, at most once; annotation types it refers to are resolved through
/// the registry that created the mirror.
pub struct ClassMirror {
    version: ClassVersion,
    access: u16,
    ty: ObjectType,
    super_type: Option<ObjectType>,
    interfaces: Vec<ObjectType>,
    details: Details,
}

impl ClassMirror {
    pub(crate) fn eager(header: &ClassHeader, details: ClassDetails) -> Self {
        Self::from_header(header, Details::Eager(details))
    }

    pub(crate) fn lazy(
        reader: ClassReader,
        reflector: Reflector,
        registry: Weak<dyn ClassRegistry>,
    ) -> Self {
        let header = reader.header().clone();
        Self::from_header(
            &header,
            Details::Lazy {
                cell: OnceCell::new(),
                reader,
                reflector,
                registry,
            },
        )
    }

    fn from_header(header: &ClassHeader, details: Details) -> Self {
        Self {
            version: ClassVersion {
                major: header.major_version,
                minor: header.minor_version,
            },
            access: header.access_flags,
            ty: header.this_class.clone(),
            super_type: header.super_class.clone(),
            interfaces: header.interfaces.clone(),
            details,
        }
    }

    fn details(&self) -> Result<&ClassDetails> {
        let (cell, reader, reflector, registry) = match &self.details {
            Details::Eager(details) => return Ok(details),
            Details::Lazy {
                cell,
                reader,
                reflector,
                registry,
            } => (cell, reader, reflector, registry),
        };
        if let Some(details) = cell.get() {
            return Ok(details);
        }

        // Entering a cell this thread is already initializing would
        // deadlock; report the cycle instead.
        let _guard = LoadGuard::enter(&self.ty).map_err(|err| GripError::parse(&self.ty, err))?;
        cell.get_or_try_init(|| {
            let registry = registry.upgrade().ok_or(ReflectError::RegistryDropped)?;
            tracing::trace!(ty = %self.ty, "loading class details");
            reflector.read_details(reader, Resolution::Registry(registry.as_ref()))
        })
        .map_err(|err| GripError::parse(&self.ty, err))
    }

    /// Whether the lazily read part of the mirror is available without
    /// touching the class bytes again.
    pub fn is_loaded(&self) -> bool {
        match &self.details {
            Details::Eager(_) => true,
            Details::Lazy { cell, .. } => cell.get().is_some(),
        }
    }

    pub fn version(&self) -> ClassVersion {
        self.version
    }

    pub fn access(&self) -> u16 {
        self.access
    }

    pub fn ty(&self) -> &ObjectType {
        &self.ty
    }

    /// `None` only for `java/lang/Object` (and module descriptors).
    pub fn super_type(&self) -> Option<&ObjectType> {
        self.super_type.as_ref()
    }

    pub fn interfaces(&self) -> &[ObjectType] {
        &self.interfaces
    }

    /// Source-style qualified name, e.g. `java.util.Map.Entry`.
    pub fn name(&self) -> Result<&str> {
        Ok(&self.details()?.name)
    }

    /// Unqualified name; empty for anonymous classes.
    pub fn simple_name(&self) -> Result<&str> {
        Ok(&self.details()?.simple_name)
    }

    pub fn signature(&self) -> Result<&ClassSignature> {
        Ok(&self.details()?.signature)
    }

    /// Type variables visible inside the class body.
    pub fn generic_declaration(&self) -> Result<&GenericDeclaration> {
        Ok(&self.details()?.generic_declaration)
    }

    /// Member classes declared directly in this class.
    pub fn nested_types(&self) -> Result<&[ObjectType]> {
        Ok(&self.details()?.nested_types)
    }

    pub fn enclosure(&self) -> Result<&Enclosure> {
        Ok(&self.details()?.enclosure)
    }

    /// `SourceFile` attribute.
    pub fn source(&self) -> Result<Option<&str>> {
        Ok(self.details()?.source.as_deref())
    }

    /// `SourceDebugExtension` attribute.
    pub fn debug(&self) -> Result<Option<&str>> {
        Ok(self.details()?.debug.as_deref())
    }

    pub fn annotations(&self) -> Result<&AnnotationCollection> {
        Ok(&self.details()?.annotations)
    }

    pub fn fields(&self) -> Result<&[FieldMirror]> {
        Ok(&self.details()?.fields)
    }

    pub fn constructors(&self) -> Result<&[MethodMirror]> {
        Ok(&self.details()?.constructors)
    }

    /// All methods other than constructors, static initializer included.
    pub fn methods(&self) -> Result<&[MethodMirror]> {
        Ok(&self.details()?.methods)
    }

    pub fn is_public(&self) -> bool {
        self.access & ACC_PUBLIC != 0
    }

    pub fn is_final(&self) -> bool {
        self.access & ACC_FINAL != 0
    }

    pub fn is_interface(&self) -> bool {
        self.access & ACC_INTERFACE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access & ACC_ABSTRACT != 0
    }

    pub fn is_annotation(&self) -> bool {
        self.access & ACC_ANNOTATION != 0
    }

    pub fn is_enum(&self) -> bool {
        self.access & ACC_ENUM != 0
    }

    pub fn is_synthetic(&self) -> bool {
        self.access & ACC_SYNTHETIC != 0
    }
}

impl fmt::Debug for ClassMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassMirror")
            .field("ty", &self.ty)
            .field("version", &self.version)
            .field("access", &format_args!("{:#06x}", self.access))
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

