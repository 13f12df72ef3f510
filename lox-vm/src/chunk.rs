use std::{fmt::Display, io::Write};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::Value;

#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    Constant,
    Nil,
    True,
    False,
    Pop,
    GetLocal,
    SetLocal,
    GetGlobal,
    DefineGlobal,
    SetGlobal,
    Equal,
    Greater,
    Less,
    Add,
    Subtract,
    Multiply,
    Divide,
    Not,
    Negate,
    Print,
    Jump,
    JumpIfFalse,
    Loop,
    Return,
}

/// A sequence of bytecode with its constant pool.
///
/// `lines[i]` is the source line of `code[i]`, operand bytes share
/// the line of their opcode.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<u8>,
    constants: Vec<Value>,
    lines: Vec<u32>,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk::default()
    }

    pub fn line(&self, offset: usize) -> u32 {
        self.lines[offset]
    }

    pub fn code_size(&self) -> usize {
        self.code.len()
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn write_code(&mut self, code: OpCode, line: u32) {
        self.write_byte(code.into(), line);
    }

    pub fn write_byte(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        // return the index where the constant
        // was appended so that we can locate that same constant later
        self.constants.len() - 1
    }

    /// Overwrite the two placeholder bytes at `offset` with a big-endian jump.
    pub fn patch_short(&mut self, offset: usize, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.code[offset] = hi;
        self.code[offset + 1] = lo;
    }

    #[inline]
    pub fn read_short(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.code[offset], self.code[offset + 1]])
    }

    #[inline]
    pub fn read_constant(&self, byte: u8) -> &Value {
        &self.constants[byte as usize]
    }

    pub fn disassemble<W: Write>(&self, name: impl Display, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "== {name} ==")?;
        let mut offset = 0;
        while offset < self.code.len() {
            offset = self.disassemble_instruction(offset, out)?;
        }
        Ok(())
    }

    /// Write one instruction and return the offset of the next one.
    pub fn disassemble_instruction<W: Write>(
        &self,
        offset: usize,
        out: &mut W,
    ) -> std::io::Result<usize> {
        write!(out, "{:04} ", offset)?;
        if offset > 0 && self.lines[offset] == self.lines[offset - 1] {
            write!(out, "   | ")?;
        } else {
            write!(out, "{:4} ", self.lines[offset])?;
        }

        let byte = self.code[offset];
        let Ok(code) = OpCode::try_from(byte) else {
            writeln!(out, "Unknown opcode {byte}")?;
            return Ok(offset + 1);
        };
        match code {
            OpCode::Constant => self.constant_instruction("CONSTANT", offset, out),
            OpCode::Nil => simple_instruction("NIL", offset, out),
            OpCode::True => simple_instruction("TRUE", offset, out),
            OpCode::False => simple_instruction("FALSE", offset, out),
            OpCode::Pop => simple_instruction("POP", offset, out),
            OpCode::GetLocal => self.byte_instruction("GET_LOCAL", offset, out),
            OpCode::SetLocal => self.byte_instruction("SET_LOCAL", offset, out),
            OpCode::GetGlobal => self.constant_instruction("GET_GLOBAL", offset, out),
            OpCode::DefineGlobal => self.constant_instruction("DEFINE_GLOBAL", offset, out),
            OpCode::SetGlobal => self.constant_instruction("SET_GLOBAL", offset, out),
            OpCode::Equal => simple_instruction("EQUAL", offset, out),
            OpCode::Greater => simple_instruction("GREATER", offset, out),
            OpCode::Less => simple_instruction("LESS", offset, out),
            OpCode::Add => simple_instruction("ADD", offset, out),
            OpCode::Subtract => simple_instruction("SUBTRACT", offset, out),
            OpCode::Multiply => simple_instruction("MULTIPLY", offset, out),
            OpCode::Divide => simple_instruction("DIVIDE", offset, out),
            OpCode::Not => simple_instruction("NOT", offset, out),
            OpCode::Negate => simple_instruction("NEGATE", offset, out),
            OpCode::Print => simple_instruction("PRINT", offset, out),
            OpCode::Jump => self.jump_instruction("JUMP", 1, offset, out),
            OpCode::JumpIfFalse => self.jump_instruction("JUMP_IF_FALSE", 1, offset, out),
            OpCode::Loop => self.jump_instruction("LOOP", -1, offset, out),
            OpCode::Return => simple_instruction("RETURN", offset, out),
        }
    }

    fn constant_instruction<W: Write>(
        &self,
        name: &str,
        offset: usize,
        out: &mut W,
    ) -> std::io::Result<usize> {
        let name = format!("OP_{name}");
        let constant = self.code[offset + 1];
        writeln!(
            out,
            "{:-16} {:4} '{}'",
            name, constant, self.constants[constant as usize]
        )?;
        Ok(offset + 2)
    }

    fn byte_instruction<W: Write>(
        &self,
        name: &str,
        offset: usize,
        out: &mut W,
    ) -> std::io::Result<usize> {
        let name = format!("OP_{name}");
        writeln!(out, "{:-16} {:4}", name, self.code[offset + 1])?;
        Ok(offset + 2)
    }

    fn jump_instruction<W: Write>(
        &self,
        name: &str,
        sign: i8,
        offset: usize,
        out: &mut W,
    ) -> std::io::Result<usize> {
        let name = format!("OP_{name}");
        let jump = self.read_short(offset + 1) as usize;
        let next = offset + 3;
        let target = if sign < 0 {
            next.saturating_sub(jump)
        } else {
            next.saturating_add(jump)
        };
        writeln!(out, "{:-16} {:4} -> {}", name, offset, target)?;
        Ok(next)
    }
}

fn simple_instruction<W: Write>(name: &str, offset: usize, out: &mut W) -> std::io::Result<usize> {
    writeln!(out, "OP_{name}")?;
    Ok(offset + 1)
}
