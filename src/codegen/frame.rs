use std::collections::HashMap;

use crate::ast::declaration::LocalId;

use super::{Error, Result};

#[derive(Debug, Default)]
pub struct Frame {
    slots: HashMap<LocalId, u16>,
    next: u16,
    size: u16,
    scopes: Vec<u16>,
}

impl Frame {
    pub fn declare(&mut self, local: LocalId) -> Result<u16> {
        let slot = self.next;
        self.next = slot.checked_add(1).ok_or(Error::FrameTooLarge)?;
        self.size = self.size.max(self.next);
        self.slots.insert(local, slot);
        Ok(slot)
    }

    pub fn slot(&self, local: LocalId) -> Option<u16> {
        self.slots.get(&local).copied()
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(self.next);
    }

    pub fn exit_scope(&mut self) {
        if let Some(next) = self.scopes.pop() {
            self.next = next;
        }
    }

    pub fn size(&self) -> u16 {
        self.size
    }
}
