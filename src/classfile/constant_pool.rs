use super::ClassFormatError;
use super::reader::ByteReader;

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
    /// Slot 0 and the phantom slot after every long or double.
    Unusable,
}

/// A resolved field, method or interface-method reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub owner: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}

/// A resolved `CONSTANT_MethodHandle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle<'a> {
    pub kind: u8,
    pub member: MemberRef<'a>,
}

impl Handle<'_> {
    /// Kinds 1 to 4 point at fields; the rest at methods.
    pub fn is_field(&self) -> bool {
        (1..=4).contains(&self.kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<Self, ClassFormatError> {
        let count = r.u16()?;
        let mut entries = Vec::with_capacity(usize::from(count));
        entries.push(Constant::Unusable);

        let mut index = 1u32;
        while index < u32::from(count) {
            let tag = r.u8()?;
            let entry = match tag {
                1 => {
                    let len = usize::from(r.u16()?);
                    Constant::Utf8(decode_modified_utf8(r.take(len)?, index as u16)?)
                }
                3 => Constant::Integer(r.i32()?),
                4 => Constant::Float(f32::from_bits(r.u32()?)),
                5 => Constant::Long(r.u64()? as i64),
                6 => Constant::Double(f64::from_bits(r.u64()?)),
                7 => Constant::Class {
                    name_index: r.u16()?,
                },
                8 => Constant::String {
                    string_index: r.u16()?,
                },
                9 => Constant::FieldRef {
                    class_index: r.u16()?,
                    name_and_type_index: r.u16()?,
                },
                10 => Constant::MethodRef {
                    class_index: r.u16()?,
                    name_and_type_index: r.u16()?,
                },
                11 => Constant::InterfaceMethodRef {
                    class_index: r.u16()?,
                    name_and_type_index: r.u16()?,
                },
                12 => Constant::NameAndType {
                    name_index: r.u16()?,
                    descriptor_index: r.u16()?,
                },
                15 => Constant::MethodHandle {
                    kind: r.u8()?,
                    reference_index: r.u16()?,
                },
                16 => Constant::MethodType {
                    descriptor_index: r.u16()?,
                },
                17 => Constant::Dynamic {
                    bootstrap_index: r.u16()?,
                    name_and_type_index: r.u16()?,
                },
                18 => Constant::InvokeDynamic {
                    bootstrap_index: r.u16()?,
                    name_and_type_index: r.u16()?,
                },
                19 => Constant::Module {
                    name_index: r.u16()?,
                },
                20 => Constant::Package {
                    name_index: r.u16()?,
                },
                _ => {
                    return Err(ClassFormatError::UnknownConstantTag {
                        index: index as u16,
                        tag,
                    });
                }
            };

            let wide = matches!(entry, Constant::Long(_) | Constant::Double(_));
            entries.push(entry);
            index += 1;
            if wide {
                entries.push(Constant::Unusable);
                index += 1;
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Result<&Constant, ClassFormatError> {
        match self.entries.get(usize::from(index)) {
            Some(Constant::Unusable) | None => Err(ClassFormatError::BadConstantIndex(index)),
            Some(entry) => Ok(entry),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<&str, ClassFormatError> {
        match self.get(index)? {
            Constant::Utf8(s) => Ok(s),
            _ => Err(unexpected(index, "Utf8")),
        }
    }

    /// Internal name (or array descriptor) of a `CONSTANT_Class`.
    pub fn class_name(&self, index: u16) -> Result<&str, ClassFormatError> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => Err(unexpected(index, "Class")),
        }
    }

    /// Like [`class_name`](Self::class_name) but index 0 means "none".
    pub fn optional_class_name(&self, index: u16) -> Result<Option<&str>, ClassFormatError> {
        if index == 0 {
            Ok(None)
        } else {
            self.class_name(index).map(Some)
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), ClassFormatError> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => Err(unexpected(index, "NameAndType")),
        }
    }

    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>, ClassFormatError> {
        match self.get(index)? {
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            }
            | Constant::MethodRef {
                class_index,
                name_and_type_index,
            }
            | Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => {
                let owner = self.class_name(*class_index)?;
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok(MemberRef {
                    owner,
                    name,
                    descriptor,
                })
            }
            _ => Err(unexpected(index, "member reference")),
        }
    }

    pub fn handle(&self, index: u16) -> Result<Handle<'_>, ClassFormatError> {
        match self.get(index)? {
            Constant::MethodHandle {
                kind,
                reference_index,
            } => Ok(Handle {
                kind: *kind,
                member: self.member_ref(*reference_index)?,
            }),
            _ => Err(unexpected(index, "MethodHandle")),
        }
    }
}

fn unexpected(index: u16, expected: &'static str) -> ClassFormatError {
    ClassFormatError::UnexpectedConstant { index, expected }
}

/// Decodes the JVM's modified UTF-8 (two-byte NUL, surrogate pairs for
/// supplementary characters).
fn decode_modified_utf8(bytes: &[u8], index: u16) -> Result<String, ClassFormatError> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Ok(s.to_string());
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        let continuation = |at: usize| -> Result<u16, ClassFormatError> {
            match bytes.get(at) {
                Some(c) if c & 0xC0 == 0x80 => Ok(u16::from(c & 0x3F)),
                _ => Err(ClassFormatError::BadUtf8(index)),
            }
        };
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            units.push((u16::from(b & 0x1F) << 6) | continuation(i + 1)?);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            units.push(
                (u16::from(b & 0x0F) << 12) | (continuation(i + 1)? << 6) | continuation(i + 2)?,
            );
            i += 3;
        } else {
            return Err(ClassFormatError::BadUtf8(index));
        }
    }

    Ok(String::from_utf16_lossy(&units))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(bytes: &[u8]) -> Result<ConstantPool, ClassFormatError> {
        ConstantPool::parse(&mut ByteReader::new(bytes))
    }

    #[test]
    fn long_constants_take_two_slots() {
        // count=5: #1 Long, #2 phantom, #3 Utf8 "A", #4 Class #3
        let bytes = [
            0x00, 0x05, //
            5, 0, 0, 0, 0, 0, 0, 0, 42, //
            1, 0, 1, b'A', //
            7, 0, 3,
        ];
        let cp = pool(&bytes).unwrap();
        assert_eq!(cp.get(1).unwrap(), &Constant::Long(42));
        assert_eq!(cp.get(2), Err(ClassFormatError::BadConstantIndex(2)));
        assert_eq!(cp.class_name(4).unwrap(), "A");
    }

    #[test]
    fn rejects_unknown_tag() {
        let bytes = [0x00, 0x02, 99];
        assert_eq!(
            pool(&bytes),
            Err(ClassFormatError::UnknownConstantTag { index: 1, tag: 99 })
        );
    }

    #[test]
    fn decodes_modified_utf8_nul() {
        assert_eq!(decode_modified_utf8(&[b'a', 0xC0, 0x80, b'b'], 1).unwrap(), "a\0b");
    }

    #[test]
    fn type_mismatch_is_reported() {
        let bytes = [0x00, 0x02, 1, 0, 1, b'A'];
        let cp = pool(&bytes).unwrap();
        assert_eq!(
            cp.class_name(1),
            Err(ClassFormatError::UnexpectedConstant {
                index: 1,
                expected: "Class"
            })
        );
    }
}
