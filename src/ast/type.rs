use crate::source::Span;

use super::name::Name;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Type {
    pub name: Name,
    pub span: Span,
}
