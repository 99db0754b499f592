use crate::ast::name::Name;

use super::r#type::Type;

pub fn resolve(name: &Name) -> Option<Type> {
    match name.0.as_str() {
        "int" => Some(Type::Int),
        "bool" => Some(Type::Bool),
        _ => None,
    }
}

pub fn default() -> Type {
    Type::Int
}
