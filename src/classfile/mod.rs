//! A tagged-variant model of the class-file format.
//!
//! Parsing resolves what the reference scanner needs up front (class names,
//! descriptors, annotation types) and keeps constant-pool indices only where
//! the meaning depends on the instruction that uses them.

pub mod attributes;
pub mod code;
pub mod constant_pool;
pub mod reader;

#[cfg(test)]
pub(crate) mod fixture;

use thiserror::Error;

pub use attributes::{
    Annotation, Attribute, BootstrapMethod, Code, ElementValue, ExceptionHandler, StackMapFrame,
    TypeAnnotation, VerificationType,
};
pub use constant_pool::{Constant, ConstantPool, Handle, MemberRef};
use reader::ByteReader;

const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassFormatError {
    #[error("not a class file (magic {0:#010x})")]
    BadMagic(u32),
    #[error("unexpected end of class data at offset {offset}")]
    Truncated { offset: usize },
    #[error("constant pool index {0} is out of range or unusable")]
    BadConstantIndex(u16),
    #[error("constant pool entry {index} has unknown tag {tag}")]
    UnknownConstantTag { index: u16, tag: u8 },
    #[error("expected {expected} at constant pool index {index}")]
    UnexpectedConstant { index: u16, expected: &'static str },
    #[error("invalid modified UTF-8 in constant pool entry {0}")]
    BadUtf8(u16),
    #[error("malformed {kind} `{text}` at offset {offset}")]
    BadSignature {
        kind: &'static str,
        text: String,
        offset: usize,
    },
    #[error("unknown opcode {opcode:#04x} at bytecode offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
    #[error("unknown annotation element tag {0:#04x}")]
    BadElementTag(u8),
    #[error("unknown type annotation target {0:#04x}")]
    BadTargetType(u8),
    #[error("reserved stack map frame type {0}")]
    BadFrameType(u8),
    #[error("unknown verification type tag {0}")]
    BadVerificationType(u8),
    #[error("attribute `{name}` does not match its declared length")]
    AttributeLength { name: String },
    #[error("annotation values nested too deeply")]
    NestingTooDeep,
    #[error("bootstrap method {0} is missing")]
    MissingBootstrapMethod(u16),
    #[error("trailing bytes after class structure")]
    TrailingBytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

/// A field or method.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFormatError> {
        let mut r = ByteReader::new(bytes);
        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(ClassFormatError::BadMagic(magic));
        }
        let minor_version = r.u16()?;
        let major_version = r.u16()?;
        let constant_pool = ConstantPool::parse(&mut r)?;
        let access_flags = r.u16()?;
        let this_class = constant_pool.class_name(r.u16()?)?.to_string();
        let super_class = constant_pool
            .optional_class_name(r.u16()?)?
            .map(str::to_string);

        let interface_count = r.u16()?;
        let mut interfaces = Vec::with_capacity(usize::from(interface_count));
        for _ in 0..interface_count {
            interfaces.push(constant_pool.class_name(r.u16()?)?.to_string());
        }

        let fields = parse_members(&mut r, &constant_pool)?;
        let methods = parse_members(&mut r, &constant_pool)?;
        let attributes = attributes::parse_attributes(&mut r, &constant_pool)?;
        if !r.is_empty() {
            return Err(ClassFormatError::TrailingBytes);
        }

        Ok(Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn bootstrap_methods(&self) -> &[BootstrapMethod] {
        self.attributes
            .iter()
            .find_map(|a| match a {
                Attribute::BootstrapMethods(methods) => Some(methods.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn signature(&self) -> Option<&str> {
        signature(&self.attributes)
    }
}

impl Member {
    pub fn signature(&self) -> Option<&str> {
        signature(&self.attributes)
    }
}

fn signature(attributes: &[Attribute]) -> Option<&str> {
    attributes.iter().find_map(|a| match a {
        Attribute::Signature(s) => Some(s.as_str()),
        _ => None,
    })
}

fn parse_members(
    r: &mut ByteReader<'_>,
    cp: &ConstantPool,
) -> Result<Vec<Member>, ClassFormatError> {
    let count = r.u16()?;
    let mut members = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let access_flags = r.u16()?;
        let name = cp.utf8(r.u16()?)?.to_string();
        let descriptor = cp.utf8(r.u16()?)?.to_string();
        let attributes = attributes::parse_attributes(r, cp)?;
        members.push(Member {
            access_flags,
            name,
            descriptor,
            attributes,
        });
    }
    Ok(members)
}
