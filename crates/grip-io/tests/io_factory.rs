use grip_io::{EntryKind, FileSourceError, FileSourceFactory, IoFactory, SourceKind};
use grip_test_utils::write_jar;

fn class_entries(source: &dyn grip_io::FileSource) -> Vec<String> {
    let mut out = Vec::new();
    source
        .list_entries(&mut |path, kind| {
            if kind == EntryKind::Class {
                out.push(path.to_string());
            }
        })
        .unwrap();
    out
}

#[test]
fn missing_root_is_an_empty_source() {
    let tmp = tempfile::TempDir::new().unwrap();
    let source = IoFactory
        .create_file_source(&tmp.path().join("does-not-exist"))
        .unwrap();
    assert_eq!(source.kind(), SourceKind::Empty);
    assert!(class_entries(source.as_ref()).is_empty());
}

#[test]
fn shape_decides_the_source_kind() {
    let tmp = tempfile::TempDir::new().unwrap();

    let classes = tmp.path().join("classes");
    std::fs::create_dir_all(classes.join("a")).unwrap();
    std::fs::write(classes.join("a/A.class"), b"A").unwrap();
    let source = IoFactory.create_file_source(&classes).unwrap();
    assert_eq!(source.kind(), SourceKind::Directory);
    assert_eq!(class_entries(source.as_ref()), vec!["a/A.class".to_string()]);

    let jar = tmp.path().join("LIB.JAR");
    write_jar(&jar, &[("b/B.class", b"B")]).unwrap();
    let source = IoFactory.create_file_source(&jar).unwrap();
    assert_eq!(source.kind(), SourceKind::Archive);
    assert_eq!(source.read_file("b/B.class").unwrap(), b"B");

    let jdk = tmp.path().join("jdk");
    std::fs::create_dir_all(jdk.join("jmods")).unwrap();
    write_jar(
        &jdk.join("jmods/java.base.jmod"),
        &[("classes/java/lang/Object.class", b"O")],
    )
    .unwrap();
    let source = IoFactory.create_file_source(&jdk).unwrap();
    assert_eq!(source.kind(), SourceKind::ModuleImage);
    assert_eq!(
        class_entries(source.as_ref()),
        vec!["java/lang/Object.class".to_string()]
    );
}

#[test]
fn unknown_shape_is_a_configuration_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let file = tmp.path().join("notes.txt");
    std::fs::write(&file, b"hello").unwrap();

    let err = IoFactory.create_file_source(&file).unwrap_err();
    assert!(matches!(err, FileSourceError::UnknownSourceKind(_)));
    assert!(err.is_configuration());
}
