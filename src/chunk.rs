use std::{
    convert::{TryFrom, TryInto},
    fmt::Write,
};

use crate::{
    heap::Heap,
    value::{Value, ValueArray},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Return,
    Constant,
    Null,
    True,
    False,
    Pop,
    GetLocal,
    SetLocal,
    DefineGlobal,
    GetGlobal,
    SetGlobal,
    Equal,
    Add,
    Call,
    Print,
}

impl Opcode {
    pub fn to_str(self) -> &'static str {
        match self {
            Opcode::Return => "Return",
            Opcode::Constant => "Constant",
            Opcode::Null => "Null",
            Opcode::True => "True",
            Opcode::False => "False",
            Opcode::Pop => "Pop",
            Opcode::GetLocal => "GetLocal",
            Opcode::SetLocal => "SetLocal",
            Opcode::DefineGlobal => "DefineGlobal",
            Opcode::GetGlobal => "GetGlobal",
            Opcode::SetGlobal => "SetGlobal",
            Opcode::Equal => "Equal",
            Opcode::Add => "Add",
            Opcode::Call => "Call",
            Opcode::Print => "Print",
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as _
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Opcode::Return),
            1 => Ok(Opcode::Constant),
            2 => Ok(Opcode::Null),
            3 => Ok(Opcode::True),
            4 => Ok(Opcode::False),
            5 => Ok(Opcode::Pop),
            6 => Ok(Opcode::GetLocal),
            7 => Ok(Opcode::SetLocal),
            8 => Ok(Opcode::DefineGlobal),
            9 => Ok(Opcode::GetGlobal),
            10 => Ok(Opcode::SetGlobal),
            11 => Ok(Opcode::Equal),
            12 => Ok(Opcode::Add),
            13 => Ok(Opcode::Call),
            14 => Ok(Opcode::Print),
            n => Err(n),
        }
    }
}

#[derive(Debug, Default)]
pub struct Chunk {
    pub code: Vec<u8>,
    pub lines: Vec<usize>,
    pub constants: ValueArray,
}

impl Chunk {
    pub fn new() -> Chunk {
        Chunk {
            code: Vec::new(),
            lines: Vec::new(),
            constants: ValueArray::new(),
        }
    }

    pub fn write(&mut self, byte: impl Into<u8>, line: usize) {
        self.code.push(byte.into());
        self.lines.push(line);
    }

    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.write(value)
    }

    pub(crate) fn heap_size(&self) -> usize {
        self.code.capacity()
            + self.lines.capacity() * std::mem::size_of::<usize>()
            + self.constants.capacity() * std::mem::size_of::<Value>()
    }
}

// Debug helpers
impl Chunk {
    pub fn disassemble(&self, name: &str, heap: &Heap) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "== {} ==", name);

        let mut offset = 0;
        while offset < self.code.len() {
            offset = self.disassemble_instruction(offset, heap, &mut out);
        }

        out
    }

    pub fn disassemble_instruction(
        &self,
        offset: usize,
        heap: &Heap,
        out: &mut String,
    ) -> usize {
        let _ = write!(out, "{:04} ", offset);

        if offset > 0 && self.lines[offset] == self.lines[offset - 1] {
            out.push_str("   | ");
        } else {
            let _ = write!(out, "{:>4} ", self.lines[offset]);
        }

        let opcode: Result<Opcode, _> = self.code[offset].try_into();

        match opcode {
            Ok(
                op
                @
                (Opcode::Constant
                | Opcode::DefineGlobal
                | Opcode::GetGlobal
                | Opcode::SetGlobal),
            ) => self.constant_instruction(op, offset, heap, out),
            Ok(op @ (Opcode::GetLocal | Opcode::SetLocal | Opcode::Call)) => {
                self.byte_instruction(op, offset, out)
            }
            Ok(op) => {
                let _ = writeln!(out, "{}", op.to_str());
                offset + 1
            }
            Err(n) => {
                let _ = writeln!(out, "Unknown opcode {}", n);
                offset + 1
            }
        }
    }

    fn byte_instruction(&self, op: Opcode, offset: usize, out: &mut String) -> usize {
        let slot = self.code.get(offset + 1).copied().unwrap_or_default();
        let _ = writeln!(out, "{:<16} {:4}", op.to_str(), slot);
        offset + 2
    }

    fn constant_instruction(
        &self,
        op: Opcode,
        offset: usize,
        heap: &Heap,
        out: &mut String,
    ) -> usize {
        let constant = self.code.get(offset + 1).copied().unwrap_or_default();
        let value = self.constants.get(constant as usize).unwrap_or_default();
        let _ = writeln!(
            out,
            "{:<16} {:4} '{}'",
            op.to_str(),
            constant,
            value.display(heap)
        );
        offset + 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_round_trip_through_bytes() {
        for byte in 0..=14u8 {
            let op = Opcode::try_from(byte).unwrap();
            assert_eq!(u8::from(op), byte);
        }
        assert_eq!(Opcode::try_from(15), Err(15));
    }

    #[test]
    fn disassembly_lists_operands_and_lines() {
        let heap = Heap::new();
        let mut chunk = Chunk::new();
        let index = chunk.add_constant(Value::Integer(42));
        chunk.write(Opcode::Constant, 1);
        chunk.write(index as u8, 1);
        chunk.write(Opcode::GetLocal, 2);
        chunk.write(3, 2);
        chunk.write(Opcode::Return, 2);

        let listing = chunk.disassemble("test", &heap);
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines[0], "== test ==");
        assert_eq!(lines[1], "0000    1 Constant            0 '42'");
        assert_eq!(lines[2], "0002    2 GetLocal            3");
        assert_eq!(lines[3], "0004    | Return");
    }
}
