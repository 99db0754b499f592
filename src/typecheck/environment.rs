use std::collections::HashMap;

use crate::ast::expression::Binding;
use crate::ast::name::Name;

use super::r#type::Type;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub r#type: Type,
    pub depth: usize,
    pub binding: Binding,
}

#[derive(Debug, Default)]
pub struct Environment<'parent> {
    parent_env: Option<&'parent Self>,
    symbols: HashMap<Name, Symbol>,
    depth: usize,
}

impl<'parent> Environment<'parent> {
    pub fn derive(&self) -> Environment {
        Environment {
            parent_env: Some(self),
            symbols: HashMap::new(),
            depth: self.depth + 1,
        }
    }

    pub fn register(
        &mut self,
        name: Name,
        kind: SymbolKind,
        r#type: Type,
        binding: Binding,
    ) -> Option<&Symbol> {
        if self.symbols.contains_key(&name) {
            return self.symbols.get(&name);
        }
        let symbol = Symbol {
            kind,
            r#type,
            depth: self.depth,
            binding,
        };
        self.symbols.insert(name, symbol);
        None
    }

    pub fn lookup(&self, name: &Name) -> Option<&Symbol> {
        self.symbols
            .get(name)
            .or_else(|| self.parent_env.and_then(|parent_env| parent_env.lookup(name)))
    }
}
