mod combined;
mod generics;
mod on_disk;

use std::sync::Arc;

use grip::{Grip, GripFactory};
use grip_classfile::ObjectType;
use grip_test_utils::{InMemoryFileSource, InMemorySourceFactory};

pub fn ty(name: &str) -> ObjectType {
    ObjectType::from_internal_name(name)
}

/// A grip over in-memory roots.
pub fn memory_grip(sources: impl IntoIterator<Item = InMemoryFileSource>) -> Grip {
    let mut factory = InMemorySourceFactory::new();
    let mut roots = Vec::new();
    for source in sources {
        roots.push(source.root().to_path_buf());
        factory = factory.with_source(source);
    }
    GripFactory::new()
        .with_source_factory(Arc::new(factory))
        .create(roots)
        .unwrap()
}
