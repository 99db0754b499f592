#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Literal {
    Number(String),
    Bool(bool),
}

impl Literal {
    pub fn word(&self) -> Option<u16> {
        match self {
            Literal::Number(lexeme) => lexeme.parse().ok(),
            Literal::Bool(b) => Some(u16::from(*b)),
        }
    }
}
