use std::path::{Path, PathBuf};
use std::sync::Arc;

use grip::{ClassRegistry, CombinedGripFactory, ErrorKind, FileRegistry, GripError, GripFactory};
use grip_test_utils::{
    AnnotationSpec, ClassFileBuilder, InMemoryFileSource, InMemorySourceFactory,
};
use pretty_assertions::assert_eq;

use crate::{memory_grip, ty};

fn source(root: &str, classes: &[&str]) -> InMemoryFileSource {
    classes
        .iter()
        .fold(InMemoryFileSource::new(root), |source, name| {
            source.class(name, ClassFileBuilder::new(name).build())
        })
        .build()
}

#[test]
fn disjoint_registries_route_to_their_owner() {
    let left = source("/mem/left", &["l/Left"]);
    let right = source("/mem/right", &["r/Right"]);
    let grip = CombinedGripFactory::create(vec![
        memory_grip([left.clone()]),
        memory_grip([right.clone()]),
    ])
    .unwrap();

    let mirror = grip.class_registry().class_mirror(&ty("r/Right")).unwrap();
    assert_eq!(mirror.ty(), &ty("r/Right"));
    assert_eq!(right.read_count("r/Right.class"), 1);
    assert_eq!(left.total_reads(), 0);

    let files = grip.file_registry();
    assert_eq!(
        files.classpath().unwrap(),
        vec![PathBuf::from("/mem/left"), PathBuf::from("/mem/right")]
    );
    assert_eq!(
        files.find_path_for_type(&ty("l/Left")).unwrap(),
        Some(PathBuf::from("/mem/left"))
    );
    assert_eq!(
        files.find_types_for_path(Path::new("/mem/right")).unwrap(),
        vec![ty("r/Right")]
    );
    assert_eq!(files.find_path_for_type(&ty("x/None")).unwrap(), None);
    assert_eq!(
        grip.class_registry()
            .class_mirror(&ty("x/None"))
            .unwrap_err()
            .kind(),
        ErrorKind::Lookup
    );
}

#[test]
fn annotation_types_outside_every_registry_are_unresolved() {
    let grip = CombinedGripFactory::create(vec![
        memory_grip([source("/mem/a", &["a/A"])]),
        memory_grip([source("/mem/b", &["b/B"])]),
    ])
    .unwrap();

    let mirror = grip
        .class_registry()
        .annotation_mirror(&ty("ext/Marker"))
        .unwrap();
    assert!(!mirror.is_resolved());
    assert!(mirror.values().is_empty());
}

#[test]
fn type_claimed_twice_is_ambiguous_at_first_query() {
    let grip = CombinedGripFactory::create(vec![
        memory_grip([source("/mem/one", &["dup/Shared", "one/Only"])]),
        memory_grip([source("/mem/two", &["dup/Shared"])]),
    ])
    .unwrap();

    // Unrelated keys still resolve.
    assert!(grip.file_registry().contains_type(&ty("one/Only")).unwrap());

    let err = grip
        .class_registry()
        .class_mirror(&ty("dup/Shared"))
        .unwrap_err();
    assert!(matches!(err, GripError::AmbiguousType(_)));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    // Deterministic: the same query fails the same way again.
    assert!(matches!(
        grip.file_registry().read_class(&ty("dup/Shared")),
        Err(GripError::AmbiguousType(_))
    ));
}

#[test]
fn root_claimed_twice_is_ambiguous() {
    let shared = source("/mem/shared", &[]);
    let factory = Arc::new(InMemorySourceFactory::new().with_source(shared));
    let make = || {
        GripFactory::new()
            .with_source_factory(factory.clone())
            .create(["/mem/shared"])
            .unwrap()
    };
    let grip = CombinedGripFactory::create(vec![make(), make()]).unwrap();

    let err = grip
        .file_registry()
        .find_types_for_path(Path::new("/mem/shared"))
        .unwrap_err();
    assert!(matches!(err, GripError::AmbiguousPath(_)));
}

#[test]
fn needs_at_least_two_grips() {
    let err = CombinedGripFactory::create(vec![memory_grip([source("/mem/solo", &[])])])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn close_reaches_every_underlying_grip() {
    let left = source("/mem/left", &["l/Left"]);
    let right = source("/mem/right", &["r/Right"]);
    let inner_left = memory_grip([left.clone()]);
    let grip = CombinedGripFactory::create(vec![inner_left.clone(), memory_grip([right.clone()])])
        .unwrap();

    grip.close().unwrap();
    grip.close().unwrap();

    assert!(left.is_closed());
    assert!(right.is_closed());
    assert_eq!(
        inner_left
            .class_registry()
            .class_mirror(&ty("l/Left"))
            .unwrap_err()
            .kind(),
        ErrorKind::State
    );
    assert_eq!(
        grip.file_registry()
            .contains_type(&ty("l/Left"))
            .unwrap_err()
            .kind(),
        ErrorKind::State
    );
}

#[test]
fn annotations_resolve_within_the_owning_registry() {
    let marker = ClassFileBuilder::annotation_type("m/Marker")
        .retention("RUNTIME")
        .build();
    let annotated = ClassFileBuilder::new("m/Annotated")
        .annotation(AnnotationSpec::visible("Lm/Marker;"))
        .build();
    let grip = CombinedGripFactory::create(vec![
        memory_grip([InMemoryFileSource::new("/mem/m")
            .class("m/Marker", marker)
            .class("m/Annotated", annotated)
            .build()]),
        memory_grip([source("/mem/other", &["o/Other"])]),
    ])
    .unwrap();

    let mirror = grip.class_registry().class_mirror(&ty("m/Annotated")).unwrap();
    let marker = mirror.annotations().unwrap().get(&ty("m/Marker")).unwrap();
    assert!(marker.is_resolved());
    assert!(marker.is_visible());
    assert!(grip
        .class_registry()
        .annotation_mirror(&ty("m/Marker"))
        .unwrap()
        .is_visible());
}
