//! Utilities shared by grip tests.
//!
//! - [`ClassFileBuilder`] writes real class files without `javac`;
//! - [`write_jar`] / [`write_class_dir`] lay them out on disk;
//! - [`InMemoryFileSource`] / [`InMemorySourceFactory`] serve them from
//!   memory and count reads, for at-most-once assertions.

mod classfile;
mod jar;
mod memory;

pub use crate::classfile::*;
pub use crate::jar::{write_class_dir, write_jar};
pub use crate::memory::{InMemoryFileSource, InMemoryFileSourceBuilder, InMemorySourceFactory};
