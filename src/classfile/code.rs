use super::ClassFormatError;

/// The constant-pool operand of an instruction, classified by what the
/// referenced entry means. Instructions without such an operand decode to
/// [`Operand::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    /// `ldc`, `ldc_w`, `ldc2_w`.
    Constant(u16),
    /// `new`, `anewarray`, `checkcast`, `instanceof`.
    Class(u16),
    /// `getstatic`, `putstatic`, `getfield`, `putfield`.
    Field(u16),
    /// `invokevirtual`, `invokespecial`, `invokestatic`, `invokeinterface`.
    Method(u16),
    InvokeDynamic(u16),
    MultiANewArray { class: u16, dimensions: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: u8,
    pub operand: Operand,
}

/// Iterates the instructions of a method body in offset order.
pub fn instructions(bytecode: &[u8]) -> Instructions<'_> {
    Instructions {
        bytecode,
        pos: 0,
        failed: false,
    }
}

pub struct Instructions<'a> {
    bytecode: &'a [u8],
    pos: usize,
    failed: bool,
}

impl Iterator for Instructions<'_> {
    type Item = Result<Instruction, ClassFormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.bytecode.len() {
            return None;
        }
        match decode(self.bytecode, self.pos) {
            Ok((instruction, len)) => {
                self.pos += len;
                Some(Ok(instruction))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

fn decode(code: &[u8], offset: usize) -> Result<(Instruction, usize), ClassFormatError> {
    let opcode = code[offset];
    let u16_at = |at: usize| -> Result<u16, ClassFormatError> {
        match (code.get(at), code.get(at + 1)) {
            (Some(hi), Some(lo)) => Ok(u16::from_be_bytes([*hi, *lo])),
            _ => Err(ClassFormatError::Truncated { offset: at }),
        }
    };

    let (operand, len) = match opcode {
        0x12 => {
            let index = code
                .get(offset + 1)
                .ok_or(ClassFormatError::Truncated { offset: offset + 1 })?;
            (Operand::Constant(u16::from(*index)), 2)
        }
        0x13 | 0x14 => (Operand::Constant(u16_at(offset + 1)?), 3),
        0xbb | 0xbd | 0xc0 | 0xc1 => (Operand::Class(u16_at(offset + 1)?), 3),
        0xb2..=0xb5 => (Operand::Field(u16_at(offset + 1)?), 3),
        0xb6..=0xb8 => (Operand::Method(u16_at(offset + 1)?), 3),
        0xb9 => (Operand::Method(u16_at(offset + 1)?), 5),
        0xba => (Operand::InvokeDynamic(u16_at(offset + 1)?), 5),
        0xc5 => {
            let class = u16_at(offset + 1)?;
            let dimensions = *code
                .get(offset + 3)
                .ok_or(ClassFormatError::Truncated { offset: offset + 3 })?;
            (Operand::MultiANewArray { class, dimensions }, 4)
        }
        0xaa => (Operand::None, table_switch_len(code, offset)?),
        0xab => (Operand::None, lookup_switch_len(code, offset)?),
        0xc4 => {
            let widened = *code
                .get(offset + 1)
                .ok_or(ClassFormatError::Truncated { offset: offset + 1 })?;
            (Operand::None, if widened == 0x84 { 6 } else { 4 })
        }
        _ => (Operand::None, fixed_len(opcode, offset)?),
    };

    if offset + len > code.len() {
        return Err(ClassFormatError::Truncated { offset });
    }
    Ok((
        Instruction {
            offset,
            opcode,
            operand,
        },
        len,
    ))
}

fn fixed_len(opcode: u8, offset: usize) -> Result<usize, ClassFormatError> {
    Ok(match opcode {
        0x00..=0x0f => 1,
        0x10 => 2,
        0x11 => 3,
        0x15..=0x19 => 2,
        0x1a..=0x35 => 1,
        0x36..=0x3a => 2,
        0x3b..=0x83 => 1,
        0x84 => 3,
        0x85..=0x98 => 1,
        0x99..=0xa8 => 3,
        0xa9 => 2,
        0xac..=0xb1 => 1,
        0xbc => 2,
        0xbe | 0xbf | 0xc2 | 0xc3 => 1,
        0xc6 | 0xc7 => 3,
        0xc8 | 0xc9 => 5,
        _ => return Err(ClassFormatError::UnknownOpcode { opcode, offset }),
    })
}

/// Operands of the switch instructions start at the next 4-byte boundary
/// relative to the start of the method body.
fn switch_operands(offset: usize) -> usize {
    let next = offset + 1;
    next + (4 - next % 4) % 4
}

fn i32_at(code: &[u8], at: usize) -> Result<i32, ClassFormatError> {
    code.get(at..at + 4)
        .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(ClassFormatError::Truncated { offset: at })
}

fn table_switch_len(code: &[u8], offset: usize) -> Result<usize, ClassFormatError> {
    let start = switch_operands(offset);
    let low = i64::from(i32_at(code, start + 4)?);
    let high = i64::from(i32_at(code, start + 8)?);
    if high < low {
        return Err(ClassFormatError::Truncated { offset });
    }
    let entries = usize::try_from(high - low + 1).map_err(|_| ClassFormatError::Truncated { offset })?;
    Ok(start + 12 + entries * 4 - offset)
}

fn lookup_switch_len(code: &[u8], offset: usize) -> Result<usize, ClassFormatError> {
    let start = switch_operands(offset);
    let pairs = i32_at(code, start + 4)?;
    let pairs = usize::try_from(pairs).map_err(|_| ClassFormatError::Truncated { offset })?;
    Ok(start + 8 + pairs * 8 - offset)
}
