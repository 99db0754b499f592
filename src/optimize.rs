mod branch;
mod fold;
mod peephole;

use log::trace;
use thiserror::Error;

use crate::ast::Program;
use crate::bytecode::{self, DecodeError};
use crate::error::{Category, Stage};
use crate::source::Span;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("jump target @{address:04x} is not an instruction")]
    DanglingTarget { address: u16 },
    #[error("program exceeds the 16-bit address space")]
    ProgramTooLarge,
}

impl Stage for Error {
    fn category(&self) -> Category {
        Category::CodeGeneration
    }

    fn span(&self) -> Option<Span> {
        None
    }
}

pub fn optimize_program(mut program: Program, max_passes: usize) -> Program {
    for pass in 1..=max_passes {
        let folded = fold::fold_program(&mut program);
        let pruned = branch::prune_program(&mut program);
        trace!("tree pass {pass}: folded {folded}, pruned {pruned}");
        if !folded && !pruned {
            break;
        }
    }
    program
}

pub fn optimize_words(mut words: Vec<u16>, max_passes: usize) -> Result<Vec<u16>> {
    for pass in 1..=max_passes {
        let code = bytecode::decode(&words)?;
        let Some(rewrites) = peephole::rewrite(&code) else {
            trace!("stream pass {pass}: no rewrites");
            break;
        };
        let before = words.len();
        words = peephole::relink(rewrites, before)?;
        trace!("stream pass {pass}: {before} -> {} words", words.len());
    }
    Ok(words)
}
