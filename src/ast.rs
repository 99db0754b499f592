pub mod declaration;
pub mod expression;
pub mod literal;
pub mod name;
pub mod operator;
pub mod statement;
pub mod r#type;

use self::declaration::FunctionDecl;
use self::statement::Statement;

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub enum Item {
    Function(FunctionDecl),
    Statement(Statement),
}

impl Program {
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Function(func_decl) => Some(func_decl),
            Item::Statement(_) => None,
        })
    }

    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.items.iter().filter_map(|item| match item {
            Item::Statement(stmt) => Some(stmt),
            Item::Function(_) => None,
        })
    }
}
