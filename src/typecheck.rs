mod builtin;
mod environment;
mod scope;
mod r#type;

use std::iter;

use log::trace;
use thiserror::Error;

use crate::ast::declaration::FunctionDecl;
use crate::ast::expression::{Binding, ExprKind, Expression};
use crate::ast::literal::Literal;
use crate::ast::name::Name;
use crate::ast::operator::{BinaryOp, UnaryOp};
use crate::ast::r#type::Type as Annotation;
use crate::ast::statement::{Block, ElseStmt, IfStmt, Statement, VarDecl, WhileStmt};
use crate::ast::{Item, Program};
use crate::error::{Category, Stage};
use crate::source::Span;
use crate::util::assert_or;

use self::environment::SymbolKind;
use self::scope::{FunctionContext, FunctionScope, TopLevelScope};

pub use self::r#type::Type;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("duplicate declaration of `{name}`")]
    DuplicateDeclaration { name: Name, span: Span },
    #[error("undefined reference to `{name}`")]
    UndefinedReference { name: Name, span: Span },
    #[error("arity mismatch: `{name}` takes {expected} argument(s) but {found} were given")]
    ArityMismatch {
        name: Name,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        expected: Type,
        found: Type,
        span: Span,
    },
    #[error("unknown type `{name}`")]
    UnknownType { name: Name, span: Span },
    #[error("`{name}` is not a function")]
    NotCallable { name: Name, span: Span },
    #[error("only named functions can be called")]
    InvalidCallee { span: Span },
    #[error("function `{name}` cannot be used as a value")]
    NotAValue { name: Name, span: Span },
    #[error("invalid assignment target")]
    InvalidAssignmentTarget { span: Span },
    #[error("syntax tree deeper than {limit} levels")]
    TooDeep { limit: usize, span: Span },
    #[error("more than {} locals in one function", u16::MAX)]
    TooManyLocals { span: Span },
}

impl Stage for Error {
    fn category(&self) -> Category {
        match self {
            Error::TooDeep { .. } | Error::TooManyLocals { .. } => Category::ResourceLimit,
            _ => Category::Semantic,
        }
    }

    fn span(&self) -> Option<Span> {
        let span = match self {
            Error::DuplicateDeclaration { span, .. }
            | Error::UndefinedReference { span, .. }
            | Error::ArityMismatch { span, .. }
            | Error::TypeMismatch { span, .. }
            | Error::UnknownType { span, .. }
            | Error::NotCallable { span, .. }
            | Error::InvalidCallee { span }
            | Error::NotAValue { span, .. }
            | Error::InvalidAssignmentTarget { span }
            | Error::TooDeep { span, .. }
            | Error::TooManyLocals { span } => span,
        };
        Some(span.clone())
    }
}

pub fn check(mut program: Program, max_depth: usize) -> Result<Program> {
    check_program(&mut program, max_depth)?;
    Ok(program)
}

fn check_program(program: &mut Program, max_depth: usize) -> Result<()> {
    let mut scope = TopLevelScope::default();
    register_function_decls(&mut scope, program)?;

    let main_context = FunctionContext::new(None, max_depth);
    let mut main_scope = scope.to_function_scope(&main_context);
    program.items.iter_mut().try_for_each(|item| match item {
        Item::Function(func_decl) => check_function_decl(&scope, func_decl, max_depth),
        Item::Statement(stmt) => check_statement(&mut main_scope, stmt),
    })
}

fn register_function_decls(scope: &mut TopLevelScope, program: &Program) -> Result<()> {
    program
        .functions()
        .enumerate()
        .try_for_each(|(index, func_decl)| register_function_decl(scope, index, func_decl))
}

fn register_function_decl(
    scope: &mut TopLevelScope,
    index: usize,
    func_decl: &FunctionDecl,
) -> Result<()> {
    let param_types = func_decl
        .params
        .iter()
        .map(|param| resolve_annotation(param.r#type.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    let return_type = resolve_annotation(func_decl.returns.as_ref())?;
    let func_type = Type::FunctionType(param_types, Box::new(return_type));

    let existing = scope.env_mut().register(
        func_decl.name.clone(),
        SymbolKind::Function,
        func_type,
        Binding::Function(index),
    );
    assert_or!(
        existing.is_none(),
        Error::DuplicateDeclaration {
            name: func_decl.name.clone(),
            span: func_decl.name_span.clone(),
        }
    )
}

fn resolve_annotation(annotation: Option<&Annotation>) -> Result<Type> {
    match annotation {
        None => Ok(builtin::default()),
        Some(annotation) => {
            builtin::resolve(&annotation.name).ok_or_else(|| Error::UnknownType {
                name: annotation.name.clone(),
                span: annotation.span.clone(),
            })
        }
    }
}

fn check_function_decl(
    scope: &TopLevelScope,
    func_decl: &mut FunctionDecl,
    max_depth: usize,
) -> Result<()> {
    let return_type = resolve_annotation(func_decl.returns.as_ref())?;
    let context = FunctionContext::new(Some(return_type), max_depth);
    let mut scope = scope.to_function_scope(&context);

    for param in &mut func_decl.params {
        let r#type = resolve_annotation(param.r#type.as_ref())?;
        let local = context.allocate_local(&param.span)?;
        let existing = scope.env_mut().register(
            param.name.clone(),
            SymbolKind::Parameter,
            r#type,
            Binding::Local(local),
        );
        assert_or!(
            existing.is_none(),
            Error::DuplicateDeclaration {
                name: param.name.clone(),
                span: param.span.clone(),
            }
        )?;
        param.local = Some(local);
    }

    // The body shares the parameters' scope.
    func_decl
        .block
        .statements
        .iter_mut()
        .try_for_each(|stmt| check_statement(&mut scope, stmt))
}

fn check_block(scope: &FunctionScope, block: &mut Block) -> Result<()> {
    let _depth = scope.descend(&block.span)?;
    let mut scope = scope.derive_env();
    block
        .statements
        .iter_mut()
        .try_for_each(|stmt| check_statement(&mut scope, stmt))
}

fn check_statement(scope: &mut FunctionScope, stmt: &mut Statement) -> Result<()> {
    match stmt {
        Statement::Block(block) => check_block(scope, block),
        Statement::VarDecl(var_decl) => check_var_decl(scope, var_decl),
        Statement::ReturnStmt(value) => check_return_stmt(scope, value.as_mut()),
        Statement::IfStmt(if_stmt) => check_if_stmt(scope, if_stmt),
        Statement::WhileStmt(while_stmt) => check_while_stmt(scope, while_stmt),
        Statement::ExpressionStmt(expr) => check_expression(scope, expr).map(|_| ()),
    }
}

fn check_var_decl(scope: &mut FunctionScope, var_decl: &mut VarDecl) -> Result<()> {
    // The initializer cannot see the name it initializes.
    let value_type = check_expression(scope, &mut var_decl.value)?;
    let r#type = match &var_decl.r#type {
        Some(annotation) => {
            let declared = resolve_annotation(Some(annotation))?;
            expect_type(&declared, value_type, &var_decl.value.span)?;
            declared
        }
        None => value_type,
    };

    let local = scope.context().allocate_local(&var_decl.name_span)?;
    let existing = scope.env_mut().register(
        var_decl.name.clone(),
        SymbolKind::Variable,
        r#type,
        Binding::Local(local),
    );
    assert_or!(
        existing.is_none(),
        Error::DuplicateDeclaration {
            name: var_decl.name.clone(),
            span: var_decl.name_span.clone(),
        }
    )?;
    var_decl.local = Some(local);
    Ok(())
}

fn check_return_stmt(scope: &FunctionScope, value: Option<&mut Expression>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    let value_type = check_expression(scope, value)?;
    match scope.return_type() {
        Some(return_type) => expect_type(return_type, value_type, &value.span),
        None => Ok(()),
    }
}

fn check_if_stmt(scope: &FunctionScope, if_stmt: &mut IfStmt) -> Result<()> {
    let _depth = scope.descend(&if_stmt.condition.span)?;
    check_expression(scope, &mut if_stmt.condition)?;
    check_block(scope, &mut if_stmt.block)?;

    match &mut if_stmt.else_stmt {
        Some(ElseStmt::ElseIf(else_if)) => check_if_stmt(scope, else_if),
        Some(ElseStmt::Else(block)) => check_block(scope, block),
        None => Ok(()),
    }
}

fn check_while_stmt(scope: &FunctionScope, while_stmt: &mut WhileStmt) -> Result<()> {
    check_expression(scope, &mut while_stmt.condition)?;
    check_block(scope, &mut while_stmt.block)
}

fn check_expression(scope: &FunctionScope, expr: &mut Expression) -> Result<Type> {
    let _depth = scope.descend(&expr.span)?;
    let span = expr.span.clone();
    match &mut expr.kind {
        ExprKind::Literal(lit) => Ok(check_literal(lit)),
        ExprKind::OperandName(name, binding) => check_name(scope, name, binding, &span),
        ExprKind::UnaryOp(op, operand) => check_unary_op(scope, *op, operand),
        ExprKind::BinaryOp(op, lhs, rhs) => check_binary_op(scope, *op, lhs, rhs),
        ExprKind::Assignment(target, value) => check_assignment(scope, target, value),
        ExprKind::Arguments(callee, args) => check_arguments(scope, callee, args, &span),
    }
}

fn check_literal(lit: &Literal) -> Type {
    match lit {
        Literal::Number(_) => Type::Int,
        Literal::Bool(_) => Type::Bool,
    }
}

fn check_name(
    scope: &FunctionScope,
    name: &Name,
    binding: &mut Option<Binding>,
    span: &Span,
) -> Result<Type> {
    let symbol = scope
        .env()
        .lookup(name)
        .ok_or_else(|| Error::UndefinedReference {
            name: name.clone(),
            span: span.clone(),
        })?;
    assert_or!(
        symbol.kind != SymbolKind::Function,
        Error::NotAValue {
            name: name.clone(),
            span: span.clone(),
        }
    )?;
    trace!("`{name}` resolves to {:?} at depth {}", symbol.binding, symbol.depth);
    *binding = Some(symbol.binding);
    Ok(symbol.r#type.clone())
}

fn check_unary_op(scope: &FunctionScope, op: UnaryOp, operand: &mut Expression) -> Result<Type> {
    let operand_type = check_expression(scope, operand)?;
    match op {
        UnaryOp::Neg => {
            expect_type(&Type::Int, operand_type, &operand.span)?;
            Ok(Type::Int)
        }
        UnaryOp::Not => Ok(Type::Bool),
    }
}

fn check_binary_op(
    scope: &FunctionScope,
    op: BinaryOp,
    lhs: &mut Expression,
    rhs: &mut Expression,
) -> Result<Type> {
    let lhs_type = check_expression(scope, lhs)?;
    let rhs_type = check_expression(scope, rhs)?;
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            expect_type(&Type::Int, lhs_type, &lhs.span)?;
            expect_type(&Type::Int, rhs_type, &rhs.span)?;
            Ok(Type::Int)
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            expect_type(&Type::Int, lhs_type, &lhs.span)?;
            expect_type(&Type::Int, rhs_type, &rhs.span)?;
            Ok(Type::Bool)
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            expect_type(&lhs_type, rhs_type, &rhs.span)?;
            Ok(Type::Bool)
        }
        BinaryOp::And | BinaryOp::Or => Ok(Type::Bool),
    }
}

fn check_assignment(
    scope: &FunctionScope,
    target: &mut Expression,
    value: &mut Expression,
) -> Result<Type> {
    assert_or!(
        matches!(target.kind, ExprKind::OperandName(..)),
        Error::InvalidAssignmentTarget {
            span: target.span.clone(),
        }
    )?;
    let target_type = check_expression(scope, target)?;
    let value_type = check_expression(scope, value)?;
    expect_type(&target_type, value_type, &value.span)?;
    Ok(target_type)
}

fn check_arguments(
    scope: &FunctionScope,
    callee: &mut Expression,
    args: &mut [Expression],
    span: &Span,
) -> Result<Type> {
    let ExprKind::OperandName(name, binding) = &mut callee.kind else {
        return Err(Error::InvalidCallee {
            span: callee.span.clone(),
        });
    };
    let symbol = scope
        .env()
        .lookup(name)
        .ok_or_else(|| Error::UndefinedReference {
            name: name.clone(),
            span: callee.span.clone(),
        })?;
    let Type::FunctionType(param_types, return_type) = &symbol.r#type else {
        return Err(Error::NotCallable {
            name: name.clone(),
            span: callee.span.clone(),
        });
    };
    *binding = Some(symbol.binding);

    assert_or!(
        args.len() == param_types.len(),
        Error::ArityMismatch {
            name: name.clone(),
            expected: param_types.len(),
            found: args.len(),
            span: span.clone(),
        }
    )?;
    iter::zip(param_types, args.iter_mut()).try_for_each(|(param_type, arg)| {
        let arg_type = check_expression(scope, arg)?;
        expect_type(param_type, arg_type, &arg.span)
    })?;

    Ok(Type::clone(return_type))
}

fn expect_type(expected: &Type, found: Type, span: &Span) -> Result<()> {
    assert_or!(
        *expected == found,
        Error::TypeMismatch {
            expected: expected.clone(),
            found,
            span: span.clone(),
        }
    )
}
