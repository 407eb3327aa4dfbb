//! Generic signatures (JVMS §4.7.9.1) and the type-variable scopes they are
//! resolved against.
//!
//! Parsing is purely syntactic; every type variable a signature mentions is
//! then checked against the [`GenericDeclaration`] in effect. A reference to a
//! variable that no enclosing declaration introduces is an error.

use std::sync::Arc;

use crate::descriptor::{MethodType, ObjectType, PrimitiveType, Type};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericType {
    Raw(Type),
    TypeVariable(String),
    /// Array of a non-raw component. Arrays of raw types stay `Raw`.
    Array(Box<GenericType>),
    Parameterized {
        ty: ObjectType,
        type_arguments: Vec<GenericType>,
    },
    /// `Outer<..>.Inner<..>`: `ty` is the inner class itself (binary name
    /// `Outer$Inner`), `owner` the qualifying outer type.
    Inner {
        name: String,
        ty: Box<GenericType>,
        owner: Box<GenericType>,
    },
    UpperBounded(Box<GenericType>),
    LowerBounded(Box<GenericType>),
}

impl GenericType {
    pub fn object() -> Self {
        GenericType::Raw(Type::Object(ObjectType::object()))
    }

    /// `?` is represented as `? extends Object`.
    pub fn unbounded_wildcard() -> Self {
        GenericType::UpperBounded(Box::new(GenericType::object()))
    }

    pub fn to_signature(&self) -> String {
        let mut out = String::new();
        self.write_signature(&mut out);
        out
    }

    fn write_signature(&self, out: &mut String) {
        match self {
            GenericType::Raw(ty) => out.push_str(&ty.descriptor()),
            GenericType::TypeVariable(name) => {
                out.push('T');
                out.push_str(name);
                out.push(';');
            }
            GenericType::Array(component) => {
                out.push('[');
                component.write_signature(out);
            }
            GenericType::Parameterized { .. } | GenericType::Inner { .. } => {
                out.push('L');
                self.write_class_type_body(out);
                out.push(';');
            }
            GenericType::UpperBounded(bound) => {
                if **bound == GenericType::object() {
                    out.push('*');
                } else {
                    out.push('+');
                    bound.write_signature(out);
                }
            }
            GenericType::LowerBounded(bound) => {
                out.push('-');
                bound.write_signature(out);
            }
        }
    }

    /// Class type signature without the leading `L` and trailing `;`.
    fn write_class_type_body(&self, out: &mut String) {
        match self {
            GenericType::Raw(Type::Object(ty)) => out.push_str(ty.internal_name()),
            GenericType::Parameterized { ty, type_arguments } => {
                out.push_str(ty.internal_name());
                write_type_arguments(type_arguments, out);
            }
            GenericType::Inner { name, ty, owner } => {
                owner.write_class_type_body(out);
                out.push('.');
                out.push_str(name);
                if let GenericType::Parameterized { type_arguments, .. } = &**ty {
                    write_type_arguments(type_arguments, out);
                }
            }
            other => {
                // Not a class type; only reachable for hand-built trees.
                let sig = other.to_signature();
                out.push_str(sig.trim_start_matches('L').trim_end_matches(';'));
            }
        }
    }
}

fn write_type_arguments(arguments: &[GenericType], out: &mut String) {
    if arguments.is_empty() {
        return;
    }
    out.push('<');
    for argument in arguments {
        argument.write_signature(out);
    }
    out.push('>');
}

/// A formal type parameter: `T:Ljava/lang/Object;` or `T::Ljava/lang/Comparable<TT;>;`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeParameter {
    pub name: String,
    /// Empty class bound (`T::I`) is `None`.
    pub class_bound: Option<GenericType>,
    pub interface_bounds: Vec<GenericType>,
}

impl TypeParameter {
    /// Declared bounds, or the root object type when none are given.
    pub fn upper_bounds(&self) -> Vec<GenericType> {
        let bounds: Vec<GenericType> = self
            .class_bound
            .iter()
            .chain(self.interface_bounds.iter())
            .cloned()
            .collect();
        if bounds.is_empty() {
            vec![GenericType::object()]
        } else {
            bounds
        }
    }

    pub fn to_signature(&self) -> String {
        let mut out = String::new();
        self.write_signature(&mut out);
        out
    }

    fn write_signature(&self, out: &mut String) {
        out.push_str(&self.name);
        out.push(':');
        if let Some(bound) = &self.class_bound {
            bound.write_signature(out);
        }
        for bound in &self.interface_bounds {
            out.push(':');
            bound.write_signature(out);
        }
    }
}

fn write_type_parameters(params: &[TypeParameter], out: &mut String) {
    if params.is_empty() {
        return;
    }
    out.push('<');
    for param in params {
        param.write_signature(out);
    }
    out.push('>');
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub super_class: GenericType,
    pub interfaces: Vec<GenericType>,
}

impl ClassSignature {
    /// Signature of a class that has no `Signature` attribute.
    pub fn from_raw(super_class: Option<&ObjectType>, interfaces: &[ObjectType]) -> Self {
        Self {
            type_parameters: Vec::new(),
            super_class: super_class
                .map(|ty| GenericType::Raw(Type::Object(ty.clone())))
                .unwrap_or_else(GenericType::object),
            interfaces: interfaces
                .iter()
                .map(|ty| GenericType::Raw(Type::Object(ty.clone())))
                .collect(),
        }
    }

    pub fn to_signature(&self) -> String {
        let mut out = String::new();
        write_type_parameters(&self.type_parameters, &mut out);
        self.super_class.write_signature(&mut out);
        for interface in &self.interfaces {
            interface.write_signature(&mut out);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: Vec<GenericType>,
    pub return_type: GenericType,
    pub exceptions: Vec<GenericType>,
}

impl MethodSignature {
    /// Signature of a method that has no `Signature` attribute.
    pub fn from_raw(ty: &MethodType, exceptions: &[ObjectType]) -> Self {
        Self {
            type_parameters: Vec::new(),
            parameters: ty.parameters.iter().cloned().map(GenericType::Raw).collect(),
            return_type: GenericType::Raw(ty.return_type.clone()),
            exceptions: exceptions
                .iter()
                .map(|ty| GenericType::Raw(Type::Object(ty.clone())))
                .collect(),
        }
    }

    pub fn to_signature(&self) -> String {
        let mut out = String::new();
        write_type_parameters(&self.type_parameters, &mut out);
        out.push('(');
        for param in &self.parameters {
            param.write_signature(&mut out);
        }
        out.push(')');
        self.return_type.write_signature(&mut out);
        for exception in &self.exceptions {
            out.push('^');
            exception.write_signature(&mut out);
        }
        out
    }
}

/// The type variables visible at some point of a class file: a chain of
/// scopes, innermost first. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct GenericDeclaration {
    scope: Option<Arc<Scope>>,
}

#[derive(Debug)]
struct Scope {
    type_parameters: Vec<TypeParameter>,
    parent: GenericDeclaration,
}

impl GenericDeclaration {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A nested scope declaring `type_parameters` on top of `self`.
    pub fn inherit(&self, type_parameters: Vec<TypeParameter>) -> Self {
        if type_parameters.is_empty() {
            return self.clone();
        }
        Self {
            scope: Some(Arc::new(Scope {
                type_parameters,
                parent: self.clone(),
            })),
        }
    }

    /// Resolve `name`, searching the innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&TypeParameter> {
        let mut current = self;
        while let Some(scope) = &current.scope {
            if let Some(param) = scope.type_parameters.iter().rev().find(|p| p.name == name) {
                return Some(param);
            }
            current = &scope.parent;
        }
        None
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.scope.is_none()
    }

    /// All visible type parameters, outermost scope first.
    pub fn type_parameters(&self) -> Vec<&TypeParameter> {
        let mut scopes = Vec::new();
        let mut current = self;
        while let Some(scope) = &current.scope {
            scopes.push(&scope.type_parameters);
            current = &scope.parent;
        }
        scopes.into_iter().rev().flatten().collect()
    }

    fn verify(&self, ty: &GenericType) -> Result<()> {
        match ty {
            GenericType::Raw(_) => Ok(()),
            GenericType::TypeVariable(name) => {
                if self.contains(name) {
                    Ok(())
                } else {
                    Err(Error::UndeclaredTypeVariable(name.clone()))
                }
            }
            GenericType::Array(inner)
            | GenericType::UpperBounded(inner)
            | GenericType::LowerBounded(inner) => self.verify(inner),
            GenericType::Parameterized { type_arguments, .. } => {
                type_arguments.iter().try_for_each(|arg| self.verify(arg))
            }
            GenericType::Inner { ty, owner, .. } => {
                self.verify(owner)?;
                self.verify(ty)
            }
        }
    }

    fn verify_type_parameters(&self, params: &[TypeParameter]) -> Result<()> {
        for param in params {
            if let Some(bound) = &param.class_bound {
                self.verify(bound)?;
            }
            for bound in &param.interface_bounds {
                self.verify(bound)?;
            }
        }
        Ok(())
    }
}

/// Parse a class `Signature` attribute. Type parameters are registered
/// before any bound is checked, so `<T extends Comparable<T>>` and forward
/// references between parameters resolve.
pub fn parse_class_signature(
    signature: &str,
    enclosing: &GenericDeclaration,
) -> Result<ClassSignature> {
    let mut parser = Parser::new(signature);
    let type_parameters = parser.type_parameters()?;
    let super_class = parser.class_type()?;
    let mut interfaces = Vec::new();
    while !parser.at_end() {
        interfaces.push(parser.class_type()?);
    }

    let scope = enclosing.inherit(type_parameters.clone());
    scope.verify_type_parameters(&type_parameters)?;
    scope.verify(&super_class)?;
    for interface in &interfaces {
        scope.verify(interface)?;
    }

    Ok(ClassSignature {
        type_parameters,
        super_class,
        interfaces,
    })
}

pub fn parse_method_signature(
    signature: &str,
    enclosing: &GenericDeclaration,
) -> Result<MethodSignature> {
    let mut parser = Parser::new(signature);
    let type_parameters = parser.type_parameters()?;
    parser.expect(b'(')?;
    let mut parameters = Vec::new();
    while parser.peek() != Some(b')') {
        parameters.push(parser.java_type(false)?);
    }
    parser.expect(b')')?;
    let return_type = parser.java_type(true)?;
    let mut exceptions = Vec::new();
    while parser.eat(b'^') {
        exceptions.push(parser.reference_type()?);
    }
    parser.finish()?;

    let scope = enclosing.inherit(type_parameters.clone());
    scope.verify_type_parameters(&type_parameters)?;
    for ty in parameters.iter().chain([&return_type]).chain(&exceptions) {
        scope.verify(ty)?;
    }

    Ok(MethodSignature {
        type_parameters,
        parameters,
        return_type,
        exceptions,
    })
}

pub fn parse_field_signature(
    signature: &str,
    enclosing: &GenericDeclaration,
) -> Result<GenericType> {
    let mut parser = Parser::new(signature);
    let ty = parser.reference_type()?;
    parser.finish()?;
    enclosing.verify(&ty)?;
    Ok(ty)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self) -> Error {
        Error::InvalidSignature(self.input.to_string())
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn finish(&self) -> Result<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    /// Identifier up to (not including) the first byte in `stops`.
    fn identifier(&mut self, stops: &[u8]) -> Result<&'a str> {
        let rest = &self.input[self.pos..];
        let len = rest
            .bytes()
            .position(|b| stops.contains(&b))
            .ok_or_else(|| self.error())?;
        if len == 0 {
            return Err(self.error());
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn type_parameters(&mut self) -> Result<Vec<TypeParameter>> {
        let mut params = Vec::new();
        if !self.eat(b'<') {
            return Ok(params);
        }
        loop {
            let name = self.identifier(b":;<>.[/")?.to_string();
            self.expect(b':')?;
            let class_bound = match self.peek() {
                Some(b'L' | b'T' | b'[') => Some(self.reference_type()?),
                _ => None,
            };
            let mut interface_bounds = Vec::new();
            while self.eat(b':') {
                interface_bounds.push(self.reference_type()?);
            }
            params.push(TypeParameter {
                name,
                class_bound,
                interface_bounds,
            });
            if self.eat(b'>') {
                break;
            }
        }
        Ok(params)
    }

    fn java_type(&mut self, allow_void: bool) -> Result<GenericType> {
        match self.peek() {
            Some(b'L' | b'T' | b'[') => self.reference_type(),
            Some(byte) => {
                let primitive =
                    PrimitiveType::from_descriptor(byte as char).ok_or_else(|| self.error())?;
                if primitive == PrimitiveType::Void && !allow_void {
                    return Err(self.error());
                }
                self.pos += 1;
                Ok(GenericType::Raw(Type::Primitive(primitive)))
            }
            None => Err(self.error()),
        }
    }

    fn reference_type(&mut self) -> Result<GenericType> {
        match self.peek() {
            Some(b'L') => self.class_type(),
            Some(b'T') => {
                self.pos += 1;
                let name = self.identifier(b";<>.:[/")?.to_string();
                self.expect(b';')?;
                Ok(GenericType::TypeVariable(name))
            }
            Some(b'[') => {
                let mut dimensions = 0;
                while self.eat(b'[') {
                    dimensions += 1;
                }
                Ok(match self.java_type(false)? {
                    GenericType::Raw(ty) => GenericType::Raw(Type::array_of(ty, dimensions)),
                    mut component => {
                        for _ in 0..dimensions {
                            component = GenericType::Array(Box::new(component));
                        }
                        component
                    }
                })
            }
            _ => Err(self.error()),
        }
    }

    fn class_type(&mut self) -> Result<GenericType> {
        self.expect(b'L')?;
        let mut internal_name = self.identifier(b"<.;")?.to_string();
        let mut current = self.simple_class_type(&internal_name)?;
        while self.eat(b'.') {
            let name = self.identifier(b"<.;/")?.to_string();
            internal_name.push('$');
            internal_name.push_str(&name);
            let ty = self.simple_class_type(&internal_name)?;
            current = GenericType::Inner {
                name,
                ty: Box::new(ty),
                owner: Box::new(current),
            };
        }
        self.expect(b';')?;
        Ok(current)
    }

    fn simple_class_type(&mut self, internal_name: &str) -> Result<GenericType> {
        let ty = ObjectType::from_internal_name(internal_name);
        if !self.eat(b'<') {
            return Ok(GenericType::Raw(Type::Object(ty)));
        }
        let mut type_arguments = Vec::new();
        while !self.eat(b'>') {
            let argument = match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    GenericType::unbounded_wildcard()
                }
                Some(b'+') => {
                    self.pos += 1;
                    GenericType::UpperBounded(Box::new(self.reference_type()?))
                }
                Some(b'-') => {
                    self.pos += 1;
                    GenericType::LowerBounded(Box::new(self.reference_type()?))
                }
                _ => self.reference_type()?,
            };
            type_arguments.push(argument);
        }
        if type_arguments.is_empty() {
            return Err(self.error());
        }
        Ok(GenericType::Parameterized { ty, type_arguments })
    }
}
