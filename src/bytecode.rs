//! The instruction set: one opcode word followed by a fixed number of operand
//! words per opcode.

use std::fmt;

use itertools::Itertools;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    Halt = 0x00,
    Push = 0x01,
    Pop = 0x02,
    Dup = 0x03,
    Load = 0x04,
    Store = 0x05,
    Enter = 0x06,
    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Div = 0x13,
    Mod = 0x14,
    Neg = 0x15,
    Eq = 0x18,
    Ne = 0x19,
    Lt = 0x1a,
    Le = 0x1b,
    Gt = 0x1c,
    Ge = 0x1d,
    Not = 0x1e,
    Jump = 0x20,
    JumpIfZero = 0x21,
    JumpIfNotZero = 0x22,
    Call = 0x23,
    Return = 0x24,
}

const OPCODES: &[Opcode] = &[
    Opcode::Halt,
    Opcode::Push,
    Opcode::Pop,
    Opcode::Dup,
    Opcode::Load,
    Opcode::Store,
    Opcode::Enter,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::Mod,
    Opcode::Neg,
    Opcode::Eq,
    Opcode::Ne,
    Opcode::Lt,
    Opcode::Le,
    Opcode::Gt,
    Opcode::Ge,
    Opcode::Not,
    Opcode::Jump,
    Opcode::JumpIfZero,
    Opcode::JumpIfNotZero,
    Opcode::Call,
    Opcode::Return,
];

impl Opcode {
    pub fn from_word(word: u16) -> Option<Opcode> {
        OPCODES.iter().copied().find(|&opcode| opcode as u16 == word)
    }

    /// Number of operand words that follow the opcode word.
    pub fn operand_count(self) -> usize {
        match self {
            Opcode::Push
            | Opcode::Load
            | Opcode::Store
            | Opcode::Enter
            | Opcode::Jump
            | Opcode::JumpIfZero
            | Opcode::JumpIfNotZero => 1,
            Opcode::Call => 2,
            _ => 0,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Halt => "halt",
            Opcode::Push => "push",
            Opcode::Pop => "pop",
            Opcode::Dup => "dup",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Enter => "enter",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Mod => "mod",
            Opcode::Neg => "neg",
            Opcode::Eq => "eq",
            Opcode::Ne => "ne",
            Opcode::Lt => "lt",
            Opcode::Le => "le",
            Opcode::Gt => "gt",
            Opcode::Ge => "ge",
            Opcode::Not => "not",
            Opcode::Jump => "jmp",
            Opcode::JumpIfZero => "jz",
            Opcode::JumpIfNotZero => "jnz",
            Opcode::Call => "call",
            Opcode::Return => "return",
        }
    }

    pub fn has_target(self) -> bool {
        matches!(
            self,
            Opcode::Jump | Opcode::JumpIfZero | Opcode::JumpIfNotZero | Opcode::Call
        )
    }
}

/// A decoded instruction. `operands` holds exactly `opcode.operand_count()`
/// leading entries; the rest are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    operands: [u16; 2],
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: &[u16]) -> Self {
        debug_assert_eq!(operands.len(), opcode.operand_count());
        let mut words = [0; 2];
        words[..operands.len()].copy_from_slice(operands);
        Instruction {
            opcode,
            operands: words,
        }
    }

    pub fn operands(&self) -> &[u16] {
        &self.operands[..self.opcode.operand_count()]
    }

    pub fn operand(&self, index: usize) -> Option<u16> {
        self.operands().get(index).copied()
    }

    pub fn set_operand(&mut self, index: usize, value: u16) {
        self.operands[index] = value;
    }

    pub fn target(&self) -> Option<u16> {
        self.opcode.has_target().then_some(self.operands[0])
    }

    pub fn size(&self) -> usize {
        1 + self.opcode.operand_count()
    }

    pub fn encode_into(&self, words: &mut Vec<u16>) {
        words.push(self.opcode as u16);
        words.extend_from_slice(self.operands());
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.mnemonic())?;
        match self.opcode {
            opcode if opcode.has_target() => {
                write!(f, " @{:04x}", self.operands[0])?;
                self.operands()[1..]
                    .iter()
                    .try_for_each(|operand| write!(f, " {operand}"))
            }
            _ => self
                .operands()
                .iter()
                .try_for_each(|operand| write!(f, " {operand}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode {word:#06x} at @{address:04x}")]
    UnknownOpcode { word: u16, address: usize },
    #[error("`{}` at @{address:04x} is missing operands", .opcode.mnemonic())]
    Truncated { opcode: Opcode, address: usize },
}

pub fn decode(words: &[u16]) -> Result<Vec<(usize, Instruction)>, DecodeError> {
    let mut instructions = vec![];
    let mut address = 0;
    while address < words.len() {
        let word = words[address];
        let opcode =
            Opcode::from_word(word).ok_or(DecodeError::UnknownOpcode { word, address })?;
        let operands = words
            .get(address + 1..address + 1 + opcode.operand_count())
            .ok_or(DecodeError::Truncated { opcode, address })?;
        let instruction = Instruction::new(opcode, operands);
        instructions.push((address, instruction));
        address += instruction.size();
    }
    Ok(instructions)
}

/// One line per instruction: its address, then its mnemonic and operands.
pub fn disassemble(words: &[u16]) -> Result<String, DecodeError> {
    let lines = decode(words)?
        .into_iter()
        .map(|(address, instruction)| format!("{address:04x}  {instruction}"));
    Ok(Itertools::intersperse(lines, "\n".to_owned()).collect())
}

/// The byte image of a word stream: each word least-significant byte first,
/// with no header.
pub fn encode_image(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}
