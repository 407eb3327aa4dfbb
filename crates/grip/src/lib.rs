//! Lazy metadata index over compiled class files.
//!
//! A [`FileRegistry`] indexes the class files of a classpath by type; a
//! [`ClassRegistry`] turns them into [`ClassMirror`]s and
//! [`AnnotationMirror`]s on demand, computing each at most once. Mirrors
//! read only the class header up front; members, annotations and generic
//! signatures are read the first time they are asked for.
//!
//! ```no_run
//! use grip::{ClassRegistry, GripFactory};
//! use grip_classfile::ObjectType;
//!
//! # fn main() -> grip::Result<()> {
//! let grip = GripFactory::new().create(["build/classes", "libs/dep.jar"])?;
//! let mirror = grip
//!     .class_registry()
//!     .class_mirror(&ObjectType::from_internal_name("com/example/Service"))?;
//! for method in mirror.methods()? {
//!     println!("{}{}", method.name(), method.ty());
//! }
//! grip.close()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod class_registry;
mod combined;
pub mod config;
mod error;
mod file_registry;
mod grip;
pub mod logging;
pub mod mirror;
mod reflector;

pub use crate::class_registry::{ClassRegistry, ClassRegistryImpl};
pub use crate::combined::{CombinedClassRegistry, CombinedFileRegistry};
pub use crate::config::GripConfig;
pub use crate::error::{ErrorKind, GripError, ReflectError, Result};
pub use crate::file_registry::{FileRegistry, FileRegistryImpl};
pub use crate::grip::{CombinedGripFactory, Grip, GripFactory};
pub use crate::logging::{init_logging, LoggingConfig};
pub use crate::mirror::{AnnotationMirror, AnnotationValue, ClassMirror};
pub use crate::reflector::Reflector;
