//! Turns class bytes into [`ClassMirror`]s.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use grip_classfile::access::ACC_STATIC;
use grip_classfile::{
    parse_class_signature, parse_field_signature, parse_method_signature, Annotation,
    AnnotationEntry, ClassBody, ClassReader, ClassSignature, ConstValue, ElementValue, FieldInfo,
    GenericDeclaration, GenericType, InnerClassInfo, MethodInfo, MethodSignature, ObjectType,
};
use indexmap::IndexMap;

use crate::class_registry::ClassRegistry;
use crate::error::{GripError, ReflectError};
use crate::mirror::{
    AnnotationCollection, AnnotationMirror, AnnotationValue, ClassDetails, ClassMirror, Enclosure,
    EnumMirror, FieldMirror, MethodMirror, ParameterMirror, CONSTRUCTOR_NAME,
};

type Result<T, E = ReflectError> = std::result::Result<T, E>;

/// How annotation types met while reading a class are resolved.
#[derive(Clone, Copy)]
pub(crate) enum Resolution<'a> {
    /// Take use-site values only. Used for annotation types themselves, so
    /// computing an annotation mirror never recurses into the registry.
    Shallow,
    /// Seed values with the registry's annotation defaults and resolve the
    /// enclosing generic scope.
    Registry(&'a dyn ClassRegistry),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reflector;

impl Reflector {
    pub fn new() -> Self {
        Self
    }

    /// Parse the class header of `bytes`.
    ///
    /// With `for_annotation` the whole class is read right away, with
    /// annotations taken as written. Otherwise only the header is parsed and
    /// the remainder is read on first access, resolving annotation types and
    /// enclosing classes through `registry`.
    pub fn reflect(
        &self,
        bytes: impl Into<Arc<[u8]>>,
        registry: Weak<dyn ClassRegistry>,
        for_annotation: bool,
    ) -> Result<ClassMirror> {
        let reader = ClassReader::new(bytes)?;
        if for_annotation {
            let details = self.read_details(&reader, Resolution::Shallow)?;
            Ok(ClassMirror::eager(reader.header(), details))
        } else {
            Ok(ClassMirror::lazy(reader, *self, registry))
        }
    }

    pub(crate) fn read_details(
        &self,
        reader: &ClassReader,
        resolution: Resolution<'_>,
    ) -> Result<ClassDetails> {
        let header = reader.header();
        let body = reader.read_body()?;
        let ty = &header.this_class;

        let enclosing = match resolution {
            Resolution::Registry(registry) if body.has_generic_signatures() => {
                enclosing_declaration(ty, &body, registry)?
            }
            _ => GenericDeclaration::empty(),
        };
        let signature = match &body.signature {
            Some(signature) => parse_class_signature(signature, &enclosing)?,
            None => ClassSignature::from_raw(header.super_class.as_ref(), &header.interfaces),
        };
        let generic_declaration = enclosing.inherit(signature.type_parameters.clone());

        let fields = body
            .fields
            .iter()
            .map(|field| self.field(field, &generic_declaration, resolution))
            .collect::<Result<Vec<_>>>()?;

        let mut constructors = Vec::new();
        let mut methods = Vec::new();
        for method in &body.methods {
            let mirror = self.method(method, &generic_declaration, resolution)?;
            if method.name == CONSTRUCTOR_NAME {
                constructors.push(mirror);
            } else {
                methods.push(mirror);
            }
        }

        let (name, simple_name) = class_names(ty, &body.inner_classes);
        let nested_types = body
            .inner_classes
            .iter()
            .filter(|entry| entry.outer_class.as_ref() == Some(ty) && entry.inner_class != *ty)
            .map(|entry| entry.inner_class.clone())
            .collect();
        let enclosure = match &body.enclosing_method {
            None => Enclosure::None,
            Some(info) => match &info.method {
                None => Enclosure::Anonymous {
                    owner: info.class.clone(),
                },
                Some((name, method_type)) => Enclosure::Method {
                    owner: info.class.clone(),
                    name: name.clone(),
                    ty: method_type.clone(),
                },
            },
        };

        Ok(ClassDetails {
            name,
            simple_name,
            signature,
            generic_declaration,
            nested_types,
            enclosure,
            source: body.source_file.clone(),
            debug: body.source_debug_extension.clone(),
            annotations: self.annotations(&body.annotations, resolution)?,
            fields,
            constructors,
            methods,
        })
    }

    fn field(
        &self,
        field: &FieldInfo,
        declaration: &GenericDeclaration,
        resolution: Resolution<'_>,
    ) -> Result<FieldMirror> {
        let signature = match &field.signature {
            Some(signature) => parse_field_signature(signature, declaration)?,
            None => GenericType::Raw(field.ty.clone()),
        };
        Ok(FieldMirror {
            access: field.access_flags,
            name: field.name.clone(),
            ty: field.ty.clone(),
            signature,
            value: field.constant_value.clone(),
            annotations: self.annotations(&field.annotations, resolution)?,
        })
    }

    fn method(
        &self,
        method: &MethodInfo,
        declaration: &GenericDeclaration,
        resolution: Resolution<'_>,
    ) -> Result<MethodMirror> {
        let signature = match &method.signature {
            Some(signature) => parse_method_signature(signature, declaration)?,
            None => MethodSignature::from_raw(&method.ty, &method.exceptions),
        };
        let generic_declaration = declaration.inherit(signature.type_parameters.clone());

        let mut parameters = Vec::with_capacity(method.ty.parameters.len());
        for index in 0..method.ty.parameters.len() {
            let annotations = match method.parameter_annotations.get(index) {
                Some(entries) => self.annotations(entries, resolution)?,
                None => AnnotationCollection::new(),
            };
            parameters.push(ParameterMirror { index, annotations });
        }

        let default_value = method
            .annotation_default
            .as_ref()
            .map(|value| self.value(value, true, resolution))
            .transpose()?;

        Ok(MethodMirror {
            access: method.access_flags,
            name: method.name.clone(),
            ty: method.ty.clone(),
            signature,
            exceptions: method.exceptions.clone(),
            parameters,
            default_value,
            generic_declaration,
            annotations: self.annotations(&method.annotations, resolution)?,
        })
    }

    fn annotations(
        &self,
        entries: &[AnnotationEntry],
        resolution: Resolution<'_>,
    ) -> Result<AnnotationCollection> {
        let mut collection = AnnotationCollection::new();
        for entry in entries {
            let mirror = self.annotation(&entry.annotation, entry.visible, resolution)?;
            collection.insert(Arc::new(mirror));
        }
        Ok(collection)
    }

    fn annotation(
        &self,
        annotation: &Annotation,
        visible: bool,
        resolution: Resolution<'_>,
    ) -> Result<AnnotationMirror> {
        let (mut values, resolved) = match resolution {
            Resolution::Shallow => (IndexMap::new(), false),
            Resolution::Registry(registry) => {
                let defaults = registry
                    .annotation_mirror(&annotation.ty)
                    .map_err(|err| ReflectError::lookup(&annotation.ty, err))?;
                (defaults.values().clone(), defaults.is_resolved())
            }
        };
        for (name, value) in &annotation.elements {
            values.insert(name.clone(), self.value(value, visible, resolution)?);
        }
        Ok(AnnotationMirror::new(
            annotation.ty.clone(),
            values,
            visible,
            resolved,
        ))
    }

    fn value(
        &self,
        value: &ElementValue,
        visible: bool,
        resolution: Resolution<'_>,
    ) -> Result<AnnotationValue> {
        Ok(match value {
            ElementValue::Const(value) => match value {
                ConstValue::Boolean(v) => AnnotationValue::Boolean(*v),
                ConstValue::Byte(v) => AnnotationValue::Byte(*v),
                ConstValue::Char(v) => AnnotationValue::Char(*v),
                ConstValue::Short(v) => AnnotationValue::Short(*v),
                ConstValue::Int(v) => AnnotationValue::Int(*v),
                ConstValue::Long(v) => AnnotationValue::Long(*v),
                ConstValue::Float(v) => AnnotationValue::Float(*v),
                ConstValue::Double(v) => AnnotationValue::Double(*v),
                ConstValue::String(v) => AnnotationValue::String(v.clone()),
            },
            ElementValue::Enum { ty, const_name } => AnnotationValue::Enum(EnumMirror {
                ty: ty.clone(),
                value: const_name.clone(),
            }),
            ElementValue::Class(ty) => AnnotationValue::Type(ty.clone()),
            ElementValue::Annotation(annotation) => AnnotationValue::Annotation(Arc::new(
                self.annotation(annotation, visible, resolution)?,
            )),
            ElementValue::Array(values) => AnnotationValue::Array(
                values
                    .iter()
                    .map(|value| self.value(value, visible, resolution))
                    .collect::<Result<_>>()?,
            ),
        })
    }
}

/// Type variables a class inherits from the code around it.
///
/// A local or anonymous class sees its enclosing method's scope (or the
/// enclosing class's when declared in an initializer); a non-static member
/// class sees its outer class's. Classes outside the classpath contribute
/// nothing.
fn enclosing_declaration(
    ty: &ObjectType,
    body: &ClassBody,
    registry: &dyn ClassRegistry,
) -> Result<GenericDeclaration> {
    if let Some(info) = &body.enclosing_method {
        let Some(owner) = enclosing_mirror(ty, &info.class, registry)? else {
            return Ok(GenericDeclaration::empty());
        };
        if let Some((name, method_type)) = &info.method {
            let methods = if name == CONSTRUCTOR_NAME {
                owner.constructors()
            } else {
                owner.methods()
            }
            .map_err(|err| ReflectError::lookup(&info.class, err))?;
            if let Some(method) = methods
                .iter()
                .find(|method| method.name() == name && method.ty() == method_type)
            {
                return Ok(method.generic_declaration().clone());
            }
        }
        return owner
            .generic_declaration()
            .cloned()
            .map_err(|err| ReflectError::lookup(&info.class, err));
    }

    let outer = body
        .inner_classes
        .iter()
        .find(|entry| entry.inner_class == *ty && entry.access_flags & ACC_STATIC == 0)
        .and_then(|entry| entry.outer_class.as_ref());
    match outer {
        Some(outer) => match enclosing_mirror(ty, outer, registry)? {
            Some(owner) => owner
                .generic_declaration()
                .cloned()
                .map_err(|err| ReflectError::lookup(outer, err)),
            None => Ok(GenericDeclaration::empty()),
        },
        None => Ok(GenericDeclaration::empty()),
    }
}

fn enclosing_mirror(
    ty: &ObjectType,
    owner: &ObjectType,
    registry: &dyn ClassRegistry,
) -> Result<Option<Arc<ClassMirror>>> {
    match registry.class_mirror(owner) {
        Ok(mirror) => Ok(Some(mirror)),
        Err(GripError::UnknownType(_)) => {
            tracing::debug!(ty = %ty, owner = %owner, "enclosing class is not on the classpath");
            Ok(None)
        }
        Err(err) => Err(ReflectError::lookup(owner, err)),
    }
}

/// Qualified and simple name, following `InnerClasses` outwards rather than
/// splitting the binary name at `$`.
fn class_names(ty: &ObjectType, inner_classes: &[InnerClassInfo]) -> (String, String) {
    let entry = inner_classes.iter().find(|entry| entry.inner_class == *ty);
    match entry {
        Some(InnerClassInfo {
            outer_class: Some(_),
            inner_name: Some(inner_name),
            ..
        }) => (
            qualified_name(ty, inner_classes, &mut Vec::new()),
            inner_name.clone(),
        ),
        Some(entry) => (ty.class_name(), entry.inner_name.clone().unwrap_or_default()),
        None => {
            let internal_name = ty.internal_name();
            let simple_name = internal_name.rsplit('/').next().unwrap_or(internal_name);
            (ty.class_name(), simple_name.to_string())
        }
    }
}

fn qualified_name(
    ty: &ObjectType,
    inner_classes: &[InnerClassInfo],
    visiting: &mut Vec<ObjectType>,
) -> String {
    if visiting.contains(ty) {
        return ty.class_name();
    }
    visiting.push(ty.clone());
    let member = inner_classes.iter().find_map(|entry| match entry {
        InnerClassInfo {
            inner_class,
            outer_class: Some(outer),
            inner_name: Some(inner_name),
            ..
        } if inner_class == ty => Some((outer, inner_name)),
        _ => None,
    });
    match member {
        Some((outer, inner_name)) => {
            format!("{}.{inner_name}", qualified_name(outer, inner_classes, visiting))
        }
        None => ty.class_name(),
    }
}

thread_local! {
    static LOADING: RefCell<Vec<ObjectType>> = const { RefCell::new(Vec::new()) };
}

/// Marks a class as being loaded on the current thread for as long as the
/// guard lives.
pub(crate) struct LoadGuard {
    ty: ObjectType,
}

impl LoadGuard {
    pub(crate) fn enter(ty: &ObjectType) -> Result<Self> {
        LOADING.with(|loading| {
            let mut loading = loading.borrow_mut();
            if loading.contains(ty) {
                return Err(ReflectError::EnclosureCycle(ty.clone()));
            }
            loading.push(ty.clone());
            Ok(LoadGuard { ty: ty.clone() })
        })
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        LOADING.with(|loading| {
            let mut loading = loading.borrow_mut();
            if let Some(pos) = loading.iter().rposition(|ty| *ty == self.ty) {
                loading.remove(pos);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grip_test_utils::{
        AnnotationSpec, ClassFileBuilder, FieldSpec, MethodSpec, ValueSpec, ACC_PUBLIC, ACC_STATIC,
    };
    use pretty_assertions::assert_eq;

    fn no_registry() -> Weak<dyn ClassRegistry> {
        Weak::<crate::class_registry::ClassRegistryImpl>::new()
    }

    #[test]
    fn annotation_types_are_read_eagerly_with_defaults() {
        let bytes = ClassFileBuilder::annotation_type("a/Marker")
            .retention("RUNTIME")
            .method(MethodSpec::element(
                "name",
                "Ljava/lang/String;",
                Some(ValueSpec::string("none")),
            ))
            .method(MethodSpec::element("count", "I", None))
            .build();

        let mirror = Reflector::new().reflect(bytes, no_registry(), true).unwrap();
        assert!(mirror.is_loaded());
        assert!(mirror.is_annotation());

        let retention = mirror
            .annotations()
            .unwrap()
            .get(&ObjectType::from_internal_name("java/lang/annotation/Retention"))
            .unwrap();
        assert!(retention.is_visible());
        assert!(!retention.is_resolved());
        assert_eq!(
            retention.value("value"),
            Some(&AnnotationValue::Enum(EnumMirror {
                ty: ObjectType::from_internal_name("java/lang/annotation/RetentionPolicy"),
                value: "RUNTIME".to_string(),
            }))
        );

        let defaults: Vec<_> = mirror
            .methods()
            .unwrap()
            .iter()
            .map(|m| (m.name().to_string(), m.default_value().cloned()))
            .collect();
        assert_eq!(
            defaults,
            vec![
                (
                    "name".to_string(),
                    Some(AnnotationValue::String("none".to_string()))
                ),
                ("count".to_string(), None),
            ]
        );
    }

    #[test]
    fn lazy_mirror_defers_the_body() {
        let bytes = ClassFileBuilder::new("a/Plain")
            .interface("java/io/Serializable")
            .build();
        let mirror = Reflector::new().reflect(bytes, no_registry(), false).unwrap();

        assert!(!mirror.is_loaded());
        assert_eq!(mirror.ty().internal_name(), "a/Plain");
        assert_eq!(mirror.super_type(), Some(&ObjectType::object()));
        assert_eq!(
            mirror.interfaces(),
            &[ObjectType::from_internal_name("java/io/Serializable")]
        );

        // The registry is gone, so the body cannot be completed.
        let err = mirror.fields().unwrap_err();
        assert!(matches!(
            err,
            GripError::Parse {
                source: ReflectError::RegistryDropped,
                ..
            }
        ));
        assert!(!mirror.is_loaded());
    }

    #[test]
    fn shallow_read_keeps_members_and_attributes() {
        let bytes = ClassFileBuilder::new("a/Outer$Inner")
            .inner_class("a/Outer$Inner", Some("a/Outer"), Some("Inner"), ACC_PUBLIC | ACC_STATIC)
            .inner_class("a/Outer$Inner$Deep", Some("a/Outer$Inner"), Some("Deep"), ACC_PUBLIC)
            .source_file("Outer.java")
            .source_debug_extension("SMAP")
            .field(
                FieldSpec::new(ACC_PUBLIC, "items", "Ljava/util/List;")
                    .signature("Ljava/util/List<Ljava/lang/String;>;"),
            )
            .method(MethodSpec::new(ACC_PUBLIC, "<init>", "()V"))
            .method(
                MethodSpec::new(ACC_PUBLIC, "run", "(ILjava/lang/String;)V")
                    .exception("java/io/IOException")
                    .parameter_annotation(1, AnnotationSpec::invisible("La/Nullable;")),
            )
            .build();

        let reader = ClassReader::new(bytes).unwrap();
        let details = Reflector::new()
            .read_details(&reader, Resolution::Shallow)
            .unwrap();

        assert_eq!(details.name, "a.Outer.Inner");
        assert_eq!(details.simple_name, "Inner");
        assert_eq!(
            details.nested_types,
            vec![ObjectType::from_internal_name("a/Outer$Inner$Deep")]
        );
        assert_eq!(details.source.as_deref(), Some("Outer.java"));
        assert_eq!(details.debug.as_deref(), Some("SMAP"));
        assert_eq!(
            details.fields[0].signature().to_signature(),
            "Ljava/util/List<Ljava/lang/String;>;"
        );
        assert_eq!(details.constructors.len(), 1);
        assert!(details.constructors[0].is_constructor());

        let run = &details.methods[0];
        assert_eq!(
            run.signature().to_signature(),
            "(ILjava/lang/String;)V^Ljava/io/IOException;"
        );
        assert_eq!(run.parameters().len(), 2);
        assert!(run.parameters()[0].annotations().is_empty());
        let nullable = run.parameters()[1]
            .annotations()
            .get(&ObjectType::from_internal_name("a/Nullable"))
            .unwrap();
        assert!(!nullable.is_visible());
    }

    #[test]
    fn names_follow_the_inner_class_chain() {
        let inner_classes = vec![
            InnerClassInfo {
                inner_class: ObjectType::from_internal_name("p/A$B$C"),
                outer_class: Some(ObjectType::from_internal_name("p/A$B")),
                inner_name: Some("C".to_string()),
                access_flags: 0,
            },
            InnerClassInfo {
                inner_class: ObjectType::from_internal_name("p/A$B"),
                outer_class: Some(ObjectType::from_internal_name("p/A")),
                inner_name: Some("B".to_string()),
                access_flags: 0,
            },
            InnerClassInfo {
                inner_class: ObjectType::from_internal_name("p/A$1"),
                outer_class: None,
                inner_name: None,
                access_flags: 0,
            },
        ];

        let names = |name: &str| class_names(&ObjectType::from_internal_name(name), &inner_classes);
        assert_eq!(names("p/A$B$C"), ("p.A.B.C".to_string(), "C".to_string()));
        assert_eq!(names("p/A$1"), ("p.A$1".to_string(), String::new()));
        assert_eq!(names("p/Top$Level"), ("p.Top$Level".to_string(), "Top$Level".to_string()));
    }

    #[test]
    fn load_guard_detects_reentry_on_the_same_thread() {
        let ty = ObjectType::from_internal_name("a/A");
        let guard = LoadGuard::enter(&ty).unwrap();
        assert!(matches!(
            LoadGuard::enter(&ty),
            Err(ReflectError::EnclosureCycle(_))
        ));
        drop(guard);
        assert!(LoadGuard::enter(&ty).is_ok());
    }
}
