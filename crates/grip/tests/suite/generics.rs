use grip::{ClassRegistry, ErrorKind, GripError, ReflectError};
use grip_classfile::{
    parse_class_signature, parse_field_signature, GenericDeclaration, GenericType,
};
use grip_test_utils::{
    ClassFileBuilder, FieldSpec, InMemoryFileSource, MethodSpec, ACC_PUBLIC, ACC_STATIC,
};
use pretty_assertions::assert_eq;

use crate::{memory_grip, ty};

fn var(name: &str) -> GenericType {
    GenericType::TypeVariable(name.to_string())
}

fn outer() -> Vec<u8> {
    ClassFileBuilder::new("g/Outer")
        .signature("<T:Ljava/lang/Object;>Ljava/lang/Object;")
        .inner_class("g/Outer$Inner", Some("g/Outer"), Some("Inner"), ACC_PUBLIC)
        .inner_class("g/Outer$Nested", Some("g/Outer"), Some("Nested"), ACC_PUBLIC | ACC_STATIC)
        .method(
            MethodSpec::new(ACC_PUBLIC, "map", "(Ljava/lang/Object;)Ljava/lang/Object;")
                .signature("<R:Ljava/lang/Object;>(TR;)TR;"),
        )
        .build()
}

#[test]
fn entry_of_map_keeps_its_owner() {
    let class = parse_class_signature(
        "<K:Ljava/lang/Object;V:Ljava/lang/Object;>Ljava/lang/Object;",
        &GenericDeclaration::empty(),
    )
    .unwrap();
    let scope = GenericDeclaration::empty().inherit(class.type_parameters);

    let entry =
        parse_field_signature("Ljava/util/Map<TK;TV;>.Entry<TK;TV;>;", &scope).unwrap();
    let GenericType::Inner { name, owner, .. } = &entry else {
        panic!("expected an inner type, got {entry:?}");
    };
    assert_eq!(name, "Entry");
    assert_eq!(
        **owner,
        GenericType::Parameterized {
            ty: ty("java/util/Map"),
            type_arguments: vec![var("K"), var("V")],
        }
    );
}

#[test]
fn inner_class_sees_outer_type_variables() {
    let inner = ClassFileBuilder::new("g/Outer$Inner")
        .inner_class("g/Outer$Inner", Some("g/Outer"), Some("Inner"), ACC_PUBLIC)
        .field(FieldSpec::new(ACC_PUBLIC, "value", "Ljava/lang/Object;").signature("TT;"))
        .build();
    let grip = memory_grip([InMemoryFileSource::new("/mem/g")
        .class("g/Outer", outer())
        .class("g/Outer$Inner", inner)
        .build()]);

    let mirror = grip.class_registry().class_mirror(&ty("g/Outer$Inner")).unwrap();
    assert_eq!(mirror.fields().unwrap()[0].signature(), &var("T"));
    assert!(mirror.generic_declaration().unwrap().contains("T"));
    assert_eq!(mirror.name().unwrap(), "g.Outer.Inner");

    let outer = grip.class_registry().class_mirror(&ty("g/Outer")).unwrap();
    assert_eq!(
        outer.nested_types().unwrap(),
        &[ty("g/Outer$Inner"), ty("g/Outer$Nested")]
    );
}

#[test]
fn anonymous_class_sees_enclosing_method_variables() {
    let anonymous = ClassFileBuilder::new("g/Outer$1")
        .inner_class("g/Outer$1", None, None, 0)
        .enclosing_method("g/Outer", Some(("map", "(Ljava/lang/Object;)Ljava/lang/Object;")))
        .field(
            FieldSpec::new(0, "pair", "Ljava/util/Map;")
                .signature("Ljava/util/Map<TT;TR;>;"),
        )
        .build();
    let grip = memory_grip([InMemoryFileSource::new("/mem/g")
        .class("g/Outer", outer())
        .class("g/Outer$1", anonymous)
        .build()]);

    let mirror = grip.class_registry().class_mirror(&ty("g/Outer$1")).unwrap();
    assert_eq!(mirror.simple_name().unwrap(), "");
    let names: Vec<_> = mirror
        .generic_declaration()
        .unwrap()
        .type_parameters()
        .into_iter()
        .map(|p| p.name.clone())
        .collect();
    assert_eq!(names, vec!["T".to_string(), "R".to_string()]);
    assert!(matches!(
        mirror.enclosure().unwrap(),
        grip::mirror::Enclosure::Method { name, .. } if name == "map"
    ));
}

#[test]
fn static_nested_class_does_not_see_outer_variables() {
    let nested = ClassFileBuilder::new("g/Outer$Nested")
        .inner_class("g/Outer$Nested", Some("g/Outer"), Some("Nested"), ACC_PUBLIC | ACC_STATIC)
        .field(FieldSpec::new(ACC_PUBLIC, "value", "Ljava/lang/Object;").signature("TT;"))
        .build();
    let grip = memory_grip([InMemoryFileSource::new("/mem/g")
        .class("g/Outer", outer())
        .class("g/Outer$Nested", nested)
        .build()]);

    let mirror = grip.class_registry().class_mirror(&ty("g/Outer$Nested")).unwrap();
    let err = mirror.fields().unwrap_err();
    assert!(matches!(
        err,
        GripError::Parse {
            source: ReflectError::ClassFile(grip_classfile::Error::UndeclaredTypeVariable(_)),
            ..
        }
    ));
    // Failures are not cached; the same error comes back.
    assert_eq!(mirror.fields().unwrap_err().kind(), ErrorKind::Parse);
}

#[test]
fn cyclic_enclosing_chain_is_a_parse_error() {
    let x = ClassFileBuilder::new("c/X")
        .inner_class("c/X", Some("c/Y"), Some("X"), ACC_PUBLIC)
        .signature("<A:Ljava/lang/Object;>Ljava/lang/Object;")
        .build();
    let y = ClassFileBuilder::new("c/Y")
        .inner_class("c/Y", Some("c/X"), Some("Y"), ACC_PUBLIC)
        .signature("<B:Ljava/lang/Object;>Ljava/lang/Object;")
        .build();
    let grip = memory_grip([InMemoryFileSource::new("/mem/c")
        .class("c/X", x)
        .class("c/Y", y)
        .build()]);

    let registry = grip.class_registry();
    let mirror = registry.class_mirror(&ty("c/X")).unwrap();
    let err = mirror.signature().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn missing_outer_class_contributes_no_variables() {
    let inner = ClassFileBuilder::new("g/Gone$Inner")
        .inner_class("g/Gone$Inner", Some("g/Gone"), Some("Inner"), ACC_PUBLIC)
        .signature("<U:Ljava/lang/Object;>Ljava/lang/Object;")
        .build();
    let grip = memory_grip([InMemoryFileSource::new("/mem/g")
        .class("g/Gone$Inner", inner)
        .build()]);

    let mirror = grip.class_registry().class_mirror(&ty("g/Gone$Inner")).unwrap();
    let names: Vec<_> = mirror
        .generic_declaration()
        .unwrap()
        .type_parameters()
        .into_iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(names, vec!["U"]);
    assert_eq!(mirror.name().unwrap(), "g.Gone.Inner");
}
