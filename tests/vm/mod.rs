//! A small interpreter for compiled word streams.

use std::collections::HashMap;

use wordlang::bytecode::{decode, Instruction, Opcode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Halt,
    Return(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Decode(String),
    NoInstructionAt(usize),
    StackUnderflow(usize),
    BadSlot(usize),
    DivisionByZero(usize),
    StepLimit,
}

struct Frame {
    locals: Vec<u16>,
    return_to: Option<usize>,
}

pub fn run(words: &[u16], max_steps: usize) -> Result<Exit, Fault> {
    if words.is_empty() {
        return Ok(Exit::Halt);
    }
    let code: HashMap<usize, Instruction> = decode(words)
        .map_err(|err| Fault::Decode(err.to_string()))?
        .into_iter()
        .collect();

    let mut stack: Vec<u16> = vec![];
    let mut frames = vec![Frame {
        locals: vec![],
        return_to: None,
    }];
    let mut pc = 0;

    for _ in 0..max_steps {
        let instruction = *code.get(&pc).ok_or(Fault::NoInstructionAt(pc))?;
        let operand = |index| instruction.operand(index).unwrap_or_default();
        let pop = |stack: &mut Vec<u16>| stack.pop().ok_or(Fault::StackUnderflow(pc));
        let frame = frames.last_mut().ok_or(Fault::StackUnderflow(pc))?;
        let mut next = pc + instruction.size();

        match instruction.opcode {
            Opcode::Halt => return Ok(Exit::Halt),
            Opcode::Push => stack.push(operand(0)),
            Opcode::Pop => {
                pop(&mut stack)?;
            }
            Opcode::Dup => {
                let value = pop(&mut stack)?;
                stack.extend([value, value]);
            }
            Opcode::Load => {
                let slot = usize::from(operand(0));
                let value = *frame.locals.get(slot).ok_or(Fault::BadSlot(pc))?;
                stack.push(value);
            }
            Opcode::Store => {
                let slot = usize::from(operand(0));
                let value = pop(&mut stack)?;
                *frame.locals.get_mut(slot).ok_or(Fault::BadSlot(pc))? = value;
            }
            Opcode::Enter => frame.locals.resize(usize::from(operand(0)), 0),
            Opcode::Neg | Opcode::Not => {
                let value = pop(&mut stack)?;
                stack.push(match instruction.opcode {
                    Opcode::Neg => value.wrapping_neg(),
                    _ => u16::from(value == 0),
                });
            }
            Opcode::Jump => next = usize::from(operand(0)),
            Opcode::JumpIfZero | Opcode::JumpIfNotZero => {
                let value = pop(&mut stack)?;
                if (value == 0) == (instruction.opcode == Opcode::JumpIfZero) {
                    next = usize::from(operand(0));
                }
            }
            Opcode::Call => {
                let argc = usize::from(operand(1));
                let split = stack
                    .len()
                    .checked_sub(argc)
                    .ok_or(Fault::StackUnderflow(pc))?;
                let locals = stack.split_off(split);
                frames.push(Frame {
                    locals,
                    return_to: Some(next),
                });
                next = usize::from(operand(0));
            }
            Opcode::Return => {
                let value = pop(&mut stack)?;
                let frame = frames.pop().ok_or(Fault::StackUnderflow(pc))?;
                match frame.return_to {
                    Some(return_to) => {
                        stack.push(value);
                        next = return_to;
                    }
                    None => return Ok(Exit::Return(value)),
                }
            }
            opcode => {
                let rhs = pop(&mut stack)?;
                let lhs = pop(&mut stack)?;
                stack.push(binary(opcode, lhs, rhs).ok_or(Fault::DivisionByZero(pc))?);
            }
        }
        pc = next;
    }
    Err(Fault::StepLimit)
}

fn binary(opcode: Opcode, lhs: u16, rhs: u16) -> Option<u16> {
    let value = match opcode {
        Opcode::Add => lhs.wrapping_add(rhs),
        Opcode::Sub => lhs.wrapping_sub(rhs),
        Opcode::Mul => lhs.wrapping_mul(rhs),
        Opcode::Div => lhs.checked_div(rhs)?,
        Opcode::Mod => lhs.checked_rem(rhs)?,
        Opcode::Eq => u16::from(lhs == rhs),
        Opcode::Ne => u16::from(lhs != rhs),
        Opcode::Lt => u16::from(lhs < rhs),
        Opcode::Le => u16::from(lhs <= rhs),
        Opcode::Gt => u16::from(lhs > rhs),
        Opcode::Ge => u16::from(lhs >= rhs),
        _ => unreachable!("{opcode:?} is not a binary operator"),
    };
    Some(value)
}
