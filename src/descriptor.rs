//! Recursive-descent readers for JVM descriptors and generic signatures.
//!
//! Each grammar parses into a small closed AST; `referenced_types` walks the
//! AST and appends every object type it names, in reading order, as a
//! dot-separated class name. Primitives, `void` and type variables name no
//! class; arrays contribute their element type.

use crate::classfile::ClassFormatError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Base(char),
    Object(String),
    Array(Box<FieldType>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    /// `None` for `void`.
    pub return_type: Option<FieldType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSignature {
    Base(char),
    Class(ClassTypeSignature),
    TypeVariable(String),
    Array(Box<TypeSignature>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTypeSignature {
    /// Internal name of the outermost class, package included.
    pub name: String,
    pub type_arguments: Vec<TypeArgument>,
    pub inner: Vec<InnerClassType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassType {
    pub name: String,
    pub type_arguments: Vec<TypeArgument>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeArgument {
    Wildcard,
    Extends(TypeSignature),
    Super(TypeSignature),
    Exact(TypeSignature),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParameter {
    pub name: String,
    pub class_bound: Option<TypeSignature>,
    pub interface_bounds: Vec<TypeSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub superclass: ClassTypeSignature,
    pub interfaces: Vec<ClassTypeSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: Vec<TypeSignature>,
    /// `None` for `void`.
    pub return_type: Option<TypeSignature>,
    pub throws: Vec<TypeSignature>,
}

/// Converts an internal name (`javax/ejb/EJB`) to its dotted form.
pub fn dotted(internal: &str) -> String {
    internal.replace('/', ".")
}

pub fn parse_field_descriptor(text: &str) -> Result<FieldType, ClassFormatError> {
    let mut p = Parser::new(text, "field descriptor");
    let ty = p.field_type()?;
    p.finish()?;
    Ok(ty)
}

pub fn parse_method_descriptor(text: &str) -> Result<MethodDescriptor, ClassFormatError> {
    let mut p = Parser::new(text, "method descriptor");
    p.expect(b'(')?;
    let mut parameters = Vec::new();
    while p.peek() != Some(b')') {
        parameters.push(p.field_type()?);
    }
    p.expect(b')')?;
    let return_type = if p.eat(b'V') {
        None
    } else {
        Some(p.field_type()?)
    };
    p.finish()?;
    Ok(MethodDescriptor {
        parameters,
        return_type,
    })
}

/// Parses the `V`-or-field-type descriptor used by annotation class values.
pub fn parse_return_descriptor(text: &str) -> Result<Option<FieldType>, ClassFormatError> {
    if text == "V" {
        return Ok(None);
    }
    parse_field_descriptor(text).map(Some)
}

pub fn parse_class_signature(text: &str) -> Result<ClassSignature, ClassFormatError> {
    let mut p = Parser::new(text, "class signature");
    let type_parameters = p.type_parameters()?;
    p.expect(b'L')?;
    let superclass = p.class_type_body()?;
    let mut interfaces = Vec::new();
    while !p.at_end() {
        p.expect(b'L')?;
        interfaces.push(p.class_type_body()?);
    }
    Ok(ClassSignature {
        type_parameters,
        superclass,
        interfaces,
    })
}

pub fn parse_method_signature(text: &str) -> Result<MethodSignature, ClassFormatError> {
    let mut p = Parser::new(text, "method signature");
    let type_parameters = p.type_parameters()?;
    p.expect(b'(')?;
    let mut parameters = Vec::new();
    while p.peek() != Some(b')') {
        parameters.push(p.java_type()?);
    }
    p.expect(b')')?;
    let return_type = if p.eat(b'V') {
        None
    } else {
        Some(p.java_type()?)
    };
    let mut throws = Vec::new();
    while p.eat(b'^') {
        match p.peek() {
            Some(b'L') | Some(b'T') => throws.push(p.reference_type()?),
            _ => return Err(p.error()),
        }
    }
    p.finish()?;
    Ok(MethodSignature {
        type_parameters,
        parameters,
        return_type,
        throws,
    })
}

/// Field signatures are a single reference type signature.
pub fn parse_field_signature(text: &str) -> Result<TypeSignature, ClassFormatError> {
    let mut p = Parser::new(text, "field signature");
    let ty = p.reference_type()?;
    p.finish()?;
    Ok(ty)
}

/// Object types named by a `CONSTANT_Class` value, which is either an
/// internal name or, for array classes, a field descriptor.
pub fn class_constant_types(name: &str, out: &mut Vec<String>) -> Result<(), ClassFormatError> {
    if name.starts_with('[') {
        parse_field_descriptor(name)?.referenced_types(out);
    } else if name.is_empty() {
        return Err(ClassFormatError::BadSignature {
            kind: "class name",
            text: String::new(),
            offset: 0,
        });
    } else {
        out.push(dotted(name));
    }
    Ok(())
}

impl FieldType {
    pub fn referenced_types(&self, out: &mut Vec<String>) {
        match self {
            FieldType::Base(_) => {}
            FieldType::Object(name) => out.push(dotted(name)),
            FieldType::Array(element) => element.referenced_types(out),
        }
    }
}

impl MethodDescriptor {
    /// Return type first, then each parameter.
    pub fn referenced_types(&self, out: &mut Vec<String>) {
        if let Some(ret) = &self.return_type {
            ret.referenced_types(out);
        }
        for param in &self.parameters {
            param.referenced_types(out);
        }
    }
}

impl TypeSignature {
    pub fn referenced_types(&self, out: &mut Vec<String>) {
        match self {
            TypeSignature::Base(_) | TypeSignature::TypeVariable(_) => {}
            TypeSignature::Class(class) => class.referenced_types(out),
            TypeSignature::Array(element) => element.referenced_types(out),
        }
    }
}

impl ClassTypeSignature {
    /// The outer class, its type arguments, then each nested class as
    /// `Outer$Inner` followed by its own type arguments.
    pub fn referenced_types(&self, out: &mut Vec<String>) {
        out.push(dotted(&self.name));
        for arg in &self.type_arguments {
            arg.referenced_types(out);
        }
        let mut current = self.name.clone();
        for inner in &self.inner {
            current.push('$');
            current.push_str(&inner.name);
            out.push(dotted(&current));
            for arg in &inner.type_arguments {
                arg.referenced_types(out);
            }
        }
    }
}

impl TypeArgument {
    pub fn referenced_types(&self, out: &mut Vec<String>) {
        match self {
            TypeArgument::Wildcard => {}
            TypeArgument::Extends(ty) | TypeArgument::Super(ty) | TypeArgument::Exact(ty) => {
                ty.referenced_types(out)
            }
        }
    }
}

impl TypeParameter {
    pub fn referenced_types(&self, out: &mut Vec<String>) {
        if let Some(bound) = &self.class_bound {
            bound.referenced_types(out);
        }
        for bound in &self.interface_bounds {
            bound.referenced_types(out);
        }
    }
}

impl ClassSignature {
    pub fn referenced_types(&self, out: &mut Vec<String>) {
        for param in &self.type_parameters {
            param.referenced_types(out);
        }
        self.superclass.referenced_types(out);
        for interface in &self.interfaces {
            interface.referenced_types(out);
        }
    }
}

impl MethodSignature {
    pub fn referenced_types(&self, out: &mut Vec<String>) {
        self.referenced_types_except_throws(out);
        for thrown in &self.throws {
            thrown.referenced_types(out);
        }
    }

    /// Everything but the `throws` clause, which class files also carry in
    /// the `Exceptions` attribute.
    pub fn referenced_types_except_throws(&self, out: &mut Vec<String>) {
        for param in &self.type_parameters {
            param.referenced_types(out);
        }
        for param in &self.parameters {
            param.referenced_types(out);
        }
        if let Some(ret) = &self.return_type {
            ret.referenced_types(out);
        }
    }
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    kind: &'static str,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, kind: &'static str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            kind,
        }
    }

    fn error(&self) -> ClassFormatError {
        ClassFormatError::BadSignature {
            kind: self.kind,
            text: self.text.to_string(),
            offset: self.pos,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn bump(&mut self) -> Result<u8, ClassFormatError> {
        let b = self.peek().ok_or_else(|| self.error())?;
        self.pos += 1;
        Ok(b)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: u8) -> Result<(), ClassFormatError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn finish(&self) -> Result<(), ClassFormatError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    /// Reads a non-empty run of bytes up to (not including) any of `stops`.
    fn identifier(&mut self, stops: &[u8]) -> Result<&'a str, ClassFormatError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if stops.contains(&b) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start || self.at_end() {
            return Err(self.error());
        }
        Ok(&self.text[start..self.pos])
    }

    fn field_type(&mut self) -> Result<FieldType, ClassFormatError> {
        match self.bump()? {
            b @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => {
                Ok(FieldType::Base(char::from(b)))
            }
            b'L' => {
                let name = self.identifier(b";")?;
                self.expect(b';')?;
                Ok(FieldType::Object(name.to_string()))
            }
            b'[' => Ok(FieldType::Array(Box::new(self.field_type()?))),
            _ => {
                self.pos -= 1;
                Err(self.error())
            }
        }
    }

    fn java_type(&mut self) -> Result<TypeSignature, ClassFormatError> {
        match self.peek() {
            Some(b @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z')) => {
                self.pos += 1;
                Ok(TypeSignature::Base(char::from(b)))
            }
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Result<TypeSignature, ClassFormatError> {
        match self.bump()? {
            b'L' => Ok(TypeSignature::Class(self.class_type_body()?)),
            b'T' => {
                let name = self.identifier(b";")?;
                self.expect(b';')?;
                Ok(TypeSignature::TypeVariable(name.to_string()))
            }
            b'[' => Ok(TypeSignature::Array(Box::new(self.java_type()?))),
            _ => {
                self.pos -= 1;
                Err(self.error())
            }
        }
    }

    /// Everything after the leading `L` of a class type signature.
    fn class_type_body(&mut self) -> Result<ClassTypeSignature, ClassFormatError> {
        let name = self.identifier(b"<.;")?.to_string();
        let type_arguments = self.type_arguments()?;
        let mut inner = Vec::new();
        while self.eat(b'.') {
            let name = self.identifier(b"<.;")?.to_string();
            let type_arguments = self.type_arguments()?;
            inner.push(InnerClassType {
                name,
                type_arguments,
            });
        }
        self.expect(b';')?;
        Ok(ClassTypeSignature {
            name,
            type_arguments,
            inner,
        })
    }

    fn type_arguments(&mut self) -> Result<Vec<TypeArgument>, ClassFormatError> {
        let mut args = Vec::new();
        if !self.eat(b'<') {
            return Ok(args);
        }
        while !self.eat(b'>') {
            let arg = match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    TypeArgument::Wildcard
                }
                Some(b'+') => {
                    self.pos += 1;
                    TypeArgument::Extends(self.reference_type()?)
                }
                Some(b'-') => {
                    self.pos += 1;
                    TypeArgument::Super(self.reference_type()?)
                }
                Some(_) => TypeArgument::Exact(self.reference_type()?),
                None => return Err(self.error()),
            };
            args.push(arg);
        }
        if args.is_empty() {
            return Err(self.error());
        }
        Ok(args)
    }

    fn type_parameters(&mut self) -> Result<Vec<TypeParameter>, ClassFormatError> {
        let mut params = Vec::new();
        if !self.eat(b'<') {
            return Ok(params);
        }
        while !self.eat(b'>') {
            let name = self.identifier(b":")?.to_string();
            self.expect(b':')?;
            let class_bound = match self.peek() {
                Some(b'L') | Some(b'T') | Some(b'[') => Some(self.reference_type()?),
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
        }
        if params.is_empty() {
            return Err(self.error());
        }
        Ok(params)
    }
}
