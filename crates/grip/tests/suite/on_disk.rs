use std::path::Path;

use grip::{ClassRegistry, ErrorKind, FileRegistry, GripError, GripFactory};
use grip_classfile::ObjectType;
use grip_test_utils::{
    write_class_dir, write_jar, ClassFileBuilder, FieldSpec, ACC_PUBLIC, ACC_STATIC,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::ty;

#[test]
fn directory_and_jar_roots() {
    let tmp = TempDir::new().unwrap();
    let classes = tmp.path().join("classes");
    write_class_dir(
        &classes,
        &[
            ("com/example/App", ClassFileBuilder::new("com/example/App").build()),
            (
                "com/example/App$Config",
                ClassFileBuilder::new("com/example/App$Config")
                    .inner_class(
                        "com/example/App$Config",
                        Some("com/example/App"),
                        Some("Config"),
                        ACC_PUBLIC | ACC_STATIC,
                    )
                    .field(FieldSpec::new(ACC_PUBLIC, "name", "Ljava/lang/String;"))
                    .build(),
            ),
        ],
    )
    .unwrap();
    std::fs::write(classes.join("com/example/readme.txt"), "not a class").unwrap();

    let jar = tmp.path().join("dep.jar");
    let dep = ClassFileBuilder::new("org/dep/Lib").build();
    write_jar(
        &jar,
        &[
            ("META-INF/MANIFEST.MF", &b"Manifest-Version: 1.0\n"[..]),
            ("org/", &[]),
            ("org/dep/Lib.class", dep.as_slice()),
        ],
    )
    .unwrap();

    let grip = GripFactory::new().create([&classes, &jar]).unwrap();
    let files = grip.file_registry();

    assert_eq!(files.classpath().unwrap(), vec![classes.clone(), jar.clone()]);
    assert_eq!(
        files.find_types_for_path(&classes).unwrap(),
        vec![ty("com/example/App$Config"), ty("com/example/App")]
    );
    assert_eq!(files.find_path_for_type(&ty("org/dep/Lib")).unwrap(), Some(jar.clone()));

    let config = grip
        .class_registry()
        .class_mirror(&ty("com/example/App$Config"))
        .unwrap();
    assert_eq!(config.name().unwrap(), "com.example.App.Config");
    assert_eq!(config.simple_name().unwrap(), "Config");
    assert_eq!(config.fields().unwrap()[0].name(), "name");

    let mirrors = grip.class_mirrors([&jar]).unwrap();
    assert_eq!(mirrors.len(), 1);
    assert_eq!(mirrors[0].ty(), &ty("org/dep/Lib"));

    grip.close().unwrap();
    grip.close().unwrap();
    assert_eq!(files.classpath().unwrap_err().kind(), ErrorKind::State);
}

#[test]
fn missing_root_is_known_but_empty() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("not-built-yet");
    let grip = GripFactory::new().create([&missing]).unwrap();

    assert!(grip.file_registry().contains_path(&missing).unwrap());
    assert_eq!(
        grip.file_registry().find_types_for_path(&missing).unwrap(),
        Vec::<ObjectType>::new()
    );
    let err = grip
        .file_registry()
        .find_types_for_path(Path::new("/somewhere/else"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lookup);
}

#[test]
fn unrecognised_root_shape_fails_construction() {
    let tmp = TempDir::new().unwrap();
    let odd = tmp.path().join("classes.txt");
    std::fs::write(&odd, "nope").unwrap();

    let err = GripFactory::new().create([&odd]).unwrap_err();
    assert!(matches!(err, GripError::Source { .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let err = GripFactory::new().create(Vec::<&Path>::new()).unwrap_err();
    assert!(matches!(err, GripError::EmptyClasspath));
}

#[test]
fn malformed_class_is_a_parse_error_naming_the_type() {
    let tmp = TempDir::new().unwrap();
    write_class_dir(tmp.path(), &[("bad/Broken", vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0])]).unwrap();

    let grip = GripFactory::new().create([tmp.path()]).unwrap();
    let err = grip
        .class_registry()
        .class_mirror(&ty("bad/Broken"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(err.to_string().contains("bad/Broken"), "{err}");
}
