use crate::bytecode::Opcode;

use super::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug, Default)]
pub struct Emitter {
    words: Vec<u16>,
    labels: Vec<Option<u16>>,
    pending: Vec<(usize, Label)>,
}

impl Emitter {
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    pub fn address(&self) -> Result<u16> {
        u16::try_from(self.words.len()).map_err(|_| Error::ProgramTooLarge)
    }

    pub fn emit(&mut self, opcode: Opcode, operands: &[u16]) -> usize {
        debug_assert_eq!(operands.len(), opcode.operand_count());
        self.words.push(opcode as u16);
        let offset = self.words.len();
        self.words.extend_from_slice(operands);
        offset
    }

    pub fn emit_to(&mut self, opcode: Opcode, label: Label, rest: &[u16]) {
        let address = self.labels[label.0];
        let offset = self.words.len() + 1;
        let mut operands = vec![address.unwrap_or_default()];
        operands.extend_from_slice(rest);
        self.emit(opcode, &operands);
        if address.is_none() {
            self.pending.push((offset, label));
        }
    }

    pub fn bind(&mut self, label: Label) -> Result<()> {
        let address = self.address()?;
        self.labels[label.0] = Some(address);
        let words = &mut self.words;
        self.pending.retain(|&(offset, pending)| {
            if pending == label {
                words[offset] = address;
            }
            pending != label
        });
        Ok(())
    }

    pub fn patch_word(&mut self, offset: usize, value: u16) {
        self.words[offset] = value;
    }

    pub fn finish(self) -> Result<Vec<u16>> {
        if self.words.len() > usize::from(u16::MAX) + 1 {
            return Err(Error::ProgramTooLarge);
        }
        if !self.pending.is_empty() {
            return Err(Error::UnboundLabel {
                count: self.pending.len(),
            });
        }
        Ok(self.words)
    }
}
