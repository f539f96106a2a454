use super::ClassFormatError;
use super::constant_pool::ConstantPool;
use super::reader::ByteReader;

/// Deepest nesting of annotation values accepted before a class is
/// considered malformed.
const MAX_ELEMENT_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Signature(String),
    ConstantValue(u16),
    /// Checked exceptions, as internal names.
    Exceptions(Vec<String>),
    Code(Code),
    Annotations {
        visible: bool,
        annotations: Vec<Annotation>,
    },
    ParameterAnnotations {
        visible: bool,
        parameters: Vec<Vec<Annotation>>,
    },
    TypeAnnotations {
        visible: bool,
        annotations: Vec<TypeAnnotation>,
    },
    AnnotationDefault(ElementValue),
    BootstrapMethods(Vec<BootstrapMethod>),
    StackMapTable(Vec<StackMapFrame>),
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytecode: Vec<u8>,
    pub exception_table: Vec<ExceptionHandler>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// `None` for `finally` handlers.
    pub catch_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Field descriptor of the annotation interface.
    pub type_descriptor: String,
    pub elements: Vec<(String, ElementValue)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
    /// Primitive or string constant; `tag` is the element tag byte.
    Const { tag: u8, index: u16 },
    Enum {
        type_descriptor: String,
        const_name: String,
    },
    /// Return descriptor of a class literal (`V` for `void.class`).
    Class(String),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAnnotation {
    pub target_type: u8,
    pub target_path: Vec<(u8, u8)>,
    pub annotation: Annotation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethod {
    pub method_handle: u16,
    pub arguments: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapFrame {
    pub frame_type: u8,
    pub locals: Vec<VerificationType>,
    pub stack: Vec<VerificationType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    /// Internal name or array descriptor.
    Object(String),
    Uninitialized(u16),
}

pub fn parse_attributes(
    r: &mut ByteReader<'_>,
    cp: &ConstantPool,
) -> Result<Vec<Attribute>, ClassFormatError> {
    let count = r.u16()?;
    let mut attributes = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        attributes.push(parse_attribute(r, cp)?);
    }
    Ok(attributes)
}

fn parse_attribute(r: &mut ByteReader<'_>, cp: &ConstantPool) -> Result<Attribute, ClassFormatError> {
    let name = cp.utf8(r.u16()?)?;
    let body = r.sized()?;
    let mut b = ByteReader::new(body);

    let attribute = match name {
        "Signature" => Attribute::Signature(cp.utf8(b.u16()?)?.to_string()),
        "ConstantValue" => Attribute::ConstantValue(b.u16()?),
        "Exceptions" => {
            let count = b.u16()?;
            let mut names = Vec::with_capacity(usize::from(count));
            for _ in 0..count {
                names.push(cp.class_name(b.u16()?)?.to_string());
            }
            Attribute::Exceptions(names)
        }
        "Code" => Attribute::Code(parse_code(&mut b, cp)?),
        "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => Attribute::Annotations {
            visible: name == "RuntimeVisibleAnnotations",
            annotations: parse_annotations(&mut b, cp)?,
        },
        "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
            let count = b.u8()?;
            let mut parameters = Vec::with_capacity(usize::from(count));
            for _ in 0..count {
                parameters.push(parse_annotations(&mut b, cp)?);
            }
            Attribute::ParameterAnnotations {
                visible: name == "RuntimeVisibleParameterAnnotations",
                parameters,
            }
        }
        "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
            let count = b.u16()?;
            let mut annotations = Vec::with_capacity(usize::from(count));
            for _ in 0..count {
                annotations.push(parse_type_annotation(&mut b, cp)?);
            }
            Attribute::TypeAnnotations {
                visible: name == "RuntimeVisibleTypeAnnotations",
                annotations,
            }
        }
        "AnnotationDefault" => Attribute::AnnotationDefault(parse_element_value(&mut b, cp, 0)?),
        "BootstrapMethods" => {
            let count = b.u16()?;
            let mut methods = Vec::with_capacity(usize::from(count));
            for _ in 0..count {
                let method_handle = b.u16()?;
                let argc = b.u16()?;
                let mut arguments = Vec::with_capacity(usize::from(argc));
                for _ in 0..argc {
                    arguments.push(b.u16()?);
                }
                methods.push(BootstrapMethod {
                    method_handle,
                    arguments,
                });
            }
            Attribute::BootstrapMethods(methods)
        }
        "StackMapTable" => Attribute::StackMapTable(parse_stack_map(&mut b, cp)?),
        other => return Ok(Attribute::Other(other.to_string())),
    };

    if !b.is_empty() {
        return Err(ClassFormatError::AttributeLength {
            name: name.to_string(),
        });
    }
    Ok(attribute)
}

fn parse_code(r: &mut ByteReader<'_>, cp: &ConstantPool) -> Result<Code, ClassFormatError> {
    let max_stack = r.u16()?;
    let max_locals = r.u16()?;
    let bytecode = r.sized()?.to_vec();

    let handler_count = r.u16()?;
    let mut exception_table = Vec::with_capacity(usize::from(handler_count));
    for _ in 0..handler_count {
        let start_pc = r.u16()?;
        let end_pc = r.u16()?;
        let handler_pc = r.u16()?;
        let catch_type = cp.optional_class_name(r.u16()?)?.map(str::to_string);
        exception_table.push(ExceptionHandler {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        });
    }

    let attributes = parse_attributes(r, cp)?;
    Ok(Code {
        max_stack,
        max_locals,
        bytecode,
        exception_table,
        attributes,
    })
}

fn parse_annotations(
    r: &mut ByteReader<'_>,
    cp: &ConstantPool,
) -> Result<Vec<Annotation>, ClassFormatError> {
    let count = r.u16()?;
    let mut annotations = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        annotations.push(parse_annotation(r, cp, 0)?);
    }
    Ok(annotations)
}

fn parse_annotation(
    r: &mut ByteReader<'_>,
    cp: &ConstantPool,
    depth: usize,
) -> Result<Annotation, ClassFormatError> {
    let type_descriptor = cp.utf8(r.u16()?)?.to_string();
    let pairs = r.u16()?;
    let mut elements = Vec::with_capacity(usize::from(pairs));
    for _ in 0..pairs {
        let name = cp.utf8(r.u16()?)?.to_string();
        let value = parse_element_value(r, cp, depth + 1)?;
        elements.push((name, value));
    }
    Ok(Annotation {
        type_descriptor,
        elements,
    })
}

fn parse_element_value(
    r: &mut ByteReader<'_>,
    cp: &ConstantPool,
    depth: usize,
) -> Result<ElementValue, ClassFormatError> {
    if depth > MAX_ELEMENT_DEPTH {
        return Err(ClassFormatError::NestingTooDeep);
    }
    let tag = r.u8()?;
    let value = match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => ElementValue::Const {
            tag,
            index: r.u16()?,
        },
        b'e' => ElementValue::Enum {
            type_descriptor: cp.utf8(r.u16()?)?.to_string(),
            const_name: cp.utf8(r.u16()?)?.to_string(),
        },
        b'c' => ElementValue::Class(cp.utf8(r.u16()?)?.to_string()),
        b'@' => ElementValue::Annotation(parse_annotation(r, cp, depth + 1)?),
        b'[' => {
            let count = r.u16()?;
            let mut values = Vec::with_capacity(usize::from(count));
            for _ in 0..count {
                values.push(parse_element_value(r, cp, depth + 1)?);
            }
            ElementValue::Array(values)
        }
        other => return Err(ClassFormatError::BadElementTag(other)),
    };
    Ok(value)
}

fn parse_type_annotation(
    r: &mut ByteReader<'_>,
    cp: &ConstantPool,
) -> Result<TypeAnnotation, ClassFormatError> {
    let target_type = r.u8()?;
    match target_type {
        0x00 | 0x01 | 0x16 => r.skip(1)?,
        0x10 | 0x17 | 0x42 | 0x43..=0x46 => r.skip(2)?,
        0x11 | 0x12 => r.skip(2)?,
        0x13..=0x15 => {}
        0x40 | 0x41 => {
            let entries = usize::from(r.u16()?);
            r.skip(entries * 6)?;
        }
        0x47..=0x4B => r.skip(3)?,
        other => return Err(ClassFormatError::BadTargetType(other)),
    }

    let path_len = r.u8()?;
    let mut target_path = Vec::with_capacity(usize::from(path_len));
    for _ in 0..path_len {
        target_path.push((r.u8()?, r.u8()?));
    }

    let annotation = parse_annotation(r, cp, 0)?;
    Ok(TypeAnnotation {
        target_type,
        target_path,
        annotation,
    })
}

fn parse_stack_map(
    r: &mut ByteReader<'_>,
    cp: &ConstantPool,
) -> Result<Vec<StackMapFrame>, ClassFormatError> {
    let count = r.u16()?;
    let mut frames = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let frame_type = r.u8()?;
        let mut locals = Vec::new();
        let mut stack = Vec::new();
        match frame_type {
            0..=63 => {}
            64..=127 => stack.push(parse_verification_type(r, cp)?),
            247 => {
                r.skip(2)?;
                stack.push(parse_verification_type(r, cp)?);
            }
            248..=251 => r.skip(2)?,
            252..=254 => {
                r.skip(2)?;
                for _ in 0..(frame_type - 251) {
                    locals.push(parse_verification_type(r, cp)?);
                }
            }
            255 => {
                r.skip(2)?;
                let local_count = r.u16()?;
                for _ in 0..local_count {
                    locals.push(parse_verification_type(r, cp)?);
                }
                let stack_count = r.u16()?;
                for _ in 0..stack_count {
                    stack.push(parse_verification_type(r, cp)?);
                }
            }
            other => return Err(ClassFormatError::BadFrameType(other)),
        }
        frames.push(StackMapFrame {
            frame_type,
            locals,
            stack,
        });
    }
    Ok(frames)
}

fn parse_verification_type(
    r: &mut ByteReader<'_>,
    cp: &ConstantPool,
) -> Result<VerificationType, ClassFormatError> {
    Ok(match r.u8()? {
        0 => VerificationType::Top,
        1 => VerificationType::Integer,
        2 => VerificationType::Float,
        3 => VerificationType::Double,
        4 => VerificationType::Long,
        5 => VerificationType::Null,
        6 => VerificationType::UninitializedThis,
        7 => VerificationType::Object(cp.class_name(r.u16()?)?.to_string()),
        8 => VerificationType::Uninitialized(r.u16()?),
        other => return Err(ClassFormatError::BadVerificationType(other)),
    })
}
