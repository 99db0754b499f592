use std::collections::{HashMap, HashSet};

use crate::bytecode::{Instruction, Opcode};

use super::{Error, Result};

pub type Rewrite = (usize, Vec<Instruction>);

pub fn rewrite(code: &[(usize, Instruction)]) -> Option<Vec<Rewrite>> {
    let targets: HashSet<usize> = code
        .iter()
        .filter_map(|(_, instruction)| instruction.target())
        .map(usize::from)
        .collect();

    let mut rewrites = Vec::with_capacity(code.len());
    let mut changed = false;
    let mut index = 0;
    while index < code.len() {
        let window = &code[index..];
        let origin = window[0].0;
        match match_rule(window, &targets) {
            Some((consumed, replacement)) => {
                rewrites.push((origin, replacement));
                index += consumed;
                changed = true;
            }
            None => {
                rewrites.push((origin, vec![window[0].1]));
                index += 1;
            }
        }
    }
    changed.then_some(rewrites)
}

// No instruction but the first in a match may be a jump or call target.
fn match_rule(
    window: &[(usize, Instruction)],
    targets: &HashSet<usize>,
) -> Option<(usize, Vec<Instruction>)> {
    let instructions: Vec<Instruction> = window
        .iter()
        .take(3)
        .map(|(_, instruction)| *instruction)
        .collect();
    let joinable = |count: usize| {
        window.len() >= count
            && window[1..count]
                .iter()
                .all(|(address, _)| !targets.contains(address))
    };

    match instructions[..] {
        [store, load, ..]
            if store.opcode == Opcode::Store
                && load.opcode == Opcode::Load
                && store.operand(0) == load.operand(0)
                && joinable(2) =>
        {
            Some((2, vec![Instruction::new(Opcode::Dup, &[]), store]))
        }
        [dup, store, pop]
            if dup.opcode == Opcode::Dup
                && store.opcode == Opcode::Store
                && pop.opcode == Opcode::Pop
                && joinable(3) =>
        {
            Some((3, vec![store]))
        }
        [push, jump, ..]
            if push.opcode == Opcode::Push
                && matches!(jump.opcode, Opcode::JumpIfZero | Opcode::JumpIfNotZero)
                && joinable(2) =>
        {
            let value = push.operand(0)?;
            let taken = (value == 0) == (jump.opcode == Opcode::JumpIfZero);
            let replacement = if taken {
                vec![Instruction::new(Opcode::Jump, jump.operands())]
            } else {
                vec![]
            };
            Some((2, replacement))
        }
        [push, pop, ..]
            if push.opcode == Opcode::Push && pop.opcode == Opcode::Pop && joinable(2) =>
        {
            Some((2, vec![]))
        }
        _ => None,
    }
}

// `end` is the old code length; a jump past the last instruction targets it.
pub fn relink(rewrites: Vec<Rewrite>, end: usize) -> Result<Vec<u16>> {
    let mut addresses = HashMap::with_capacity(rewrites.len() + 1);
    let mut next = 0;
    for (origin, instructions) in &rewrites {
        addresses.insert(*origin, next);
        next += instructions.iter().map(Instruction::size).sum::<usize>();
    }
    addresses.insert(end, next);

    let mut words = Vec::with_capacity(next);
    for mut instruction in rewrites.into_iter().flat_map(|(_, instructions)| instructions) {
        if let Some(target) = instruction.target() {
            let address = addresses
                .get(&usize::from(target))
                .ok_or(Error::DanglingTarget { address: target })?;
            let address = u16::try_from(*address).map_err(|_| Error::ProgramTooLarge)?;
            instruction.set_operand(0, address);
        }
        instruction.encode_into(&mut words);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::decode;

    fn optimize_once(words: &[u16]) -> Option<Vec<u16>> {
        let code = decode(words).unwrap();
        rewrite(&code).map(|rewrites| relink(rewrites, words.len()).unwrap())
    }

    #[test]
    fn store_then_load_becomes_dup_then_store() {
        assert_eq!(
            optimize_once(&[0x01, 4, 0x05, 2, 0x04, 2, 0x00]),
            Some(vec![0x01, 4, 0x03, 0x05, 2, 0x00])
        );
        assert_eq!(optimize_once(&[0x05, 2, 0x04, 3]), None);
    }

    #[test]
    fn dup_store_pop_becomes_store() {
        assert_eq!(
            optimize_once(&[0x03, 0x05, 1, 0x02, 0x00]),
            Some(vec![0x05, 1, 0x00])
        );
    }

    #[test]
    fn constant_conditional_jumps_resolve() {
        // push 0; jz 6; push 9; halt
        assert_eq!(
            optimize_once(&[0x01, 0, 0x21, 6, 0x01, 9, 0x00]),
            Some(vec![0x20, 4, 0x01, 9, 0x00])
        );
        // push 1; jz 6 never jumps
        assert_eq!(
            optimize_once(&[0x01, 1, 0x21, 6, 0x01, 9, 0x00]),
            Some(vec![0x01, 9, 0x00])
        );
        // push 1; jnz 6 always jumps
        assert_eq!(
            optimize_once(&[0x01, 1, 0x22, 6, 0x01, 9, 0x00]),
            Some(vec![0x20, 4, 0x01, 9, 0x00])
        );
    }

    #[test]
    fn pushed_then_popped_constants_vanish() {
        assert_eq!(
            optimize_once(&[0x06, 0, 0x01, 7, 0x02, 0x00]),
            Some(vec![0x06, 0, 0x00])
        );
    }

    #[test]
    fn patterns_do_not_span_jump_targets() {
        // load 0 at address 2 is the target of the jump at 4
        let words = [0x05, 0, 0x04, 0, 0x20, 2];
        assert_eq!(optimize_once(&words), None);
    }

    #[test]
    fn targets_are_relinked_after_shrinking() {
        // jmp 5; push 3; pop; halt becomes jmp 2; halt
        assert_eq!(
            optimize_once(&[0x20, 5, 0x01, 3, 0x02, 0x00]),
            Some(vec![0x20, 2, 0x00])
        );
        // a target at the end of the code stays valid
        assert_eq!(
            optimize_once(&[0x20, 5, 0x01, 3, 0x02]),
            Some(vec![0x20, 2])
        );
    }

    #[test]
    fn dangling_targets_are_rejected() {
        let code = decode(&[0x01, 1, 0x02, 0x20, 1]).unwrap();
        let rewrites = rewrite(&code).unwrap();
        assert_eq!(
            relink(rewrites, 5),
            Err(Error::DanglingTarget { address: 1 })
        );
    }
}
