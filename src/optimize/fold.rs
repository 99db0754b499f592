use crate::ast::expression::{ExprKind, Expression};
use crate::ast::literal::Literal;
use crate::ast::operator::{BinaryOp, UnaryOp};
use crate::ast::statement::{Block, ElseStmt, IfStmt, Statement};
use crate::ast::{Item, Program};

pub fn fold_program(program: &mut Program) -> bool {
    program.items.iter_mut().fold(false, |folded, item| {
        let changed = match item {
            Item::Function(func_decl) => fold_block(&mut func_decl.block),
            Item::Statement(stmt) => fold_statement(stmt),
        };
        folded | changed
    })
}

fn fold_block(block: &mut Block) -> bool {
    block
        .statements
        .iter_mut()
        .fold(false, |folded, stmt| fold_statement(stmt) | folded)
}

fn fold_statement(stmt: &mut Statement) -> bool {
    match stmt {
        Statement::Block(block) => fold_block(block),
        Statement::VarDecl(var_decl) => fold_expression(&mut var_decl.value),
        Statement::ReturnStmt(Some(expr)) | Statement::ExpressionStmt(expr) => {
            fold_expression(expr)
        }
        Statement::ReturnStmt(None) => false,
        Statement::IfStmt(if_stmt) => fold_if_stmt(if_stmt),
        Statement::WhileStmt(while_stmt) => {
            fold_expression(&mut while_stmt.condition) | fold_block(&mut while_stmt.block)
        }
    }
}

fn fold_if_stmt(if_stmt: &mut IfStmt) -> bool {
    let folded = fold_expression(&mut if_stmt.condition) | fold_block(&mut if_stmt.block);
    folded
        | match &mut if_stmt.else_stmt {
            Some(ElseStmt::ElseIf(else_if)) => fold_if_stmt(else_if),
            Some(ElseStmt::Else(block)) => fold_block(block),
            None => false,
        }
}

fn fold_expression(expr: &mut Expression) -> bool {
    let folded = match &mut expr.kind {
        ExprKind::Literal(_) | ExprKind::OperandName(..) => false,
        ExprKind::UnaryOp(_, operand) => fold_expression(operand),
        ExprKind::BinaryOp(_, lhs, rhs) => fold_expression(lhs) | fold_expression(rhs),
        // The target is a name; only the value can fold.
        ExprKind::Assignment(_, value) => fold_expression(value),
        ExprKind::Arguments(_, args) => args
            .iter_mut()
            .fold(false, |folded, arg| fold_expression(arg) | folded),
    };
    match evaluate(&expr.kind) {
        Some(lit) => {
            expr.kind = ExprKind::Literal(lit);
            true
        }
        None => folded,
    }
}

fn evaluate(kind: &ExprKind) -> Option<Literal> {
    match kind {
        ExprKind::UnaryOp(op, operand) => {
            let value = operand.literal()?.word()?;
            Some(match op {
                UnaryOp::Neg => number(value.wrapping_neg()),
                UnaryOp::Not => Literal::Bool(value == 0),
            })
        }
        ExprKind::BinaryOp(op, lhs, rhs) => evaluate_binary(*op, lhs, rhs),
        _ => None,
    }
}

fn evaluate_binary(op: BinaryOp, lhs: &Expression, rhs: &Expression) -> Option<Literal> {
    let a = lhs.literal()?.word()?;
    // A deciding left operand means the right one is never evaluated.
    match op {
        BinaryOp::And if a == 0 => return Some(Literal::Bool(false)),
        BinaryOp::Or if a != 0 => return Some(Literal::Bool(true)),
        _ => {}
    }

    let b = rhs.literal()?.word()?;
    let lit = match op {
        BinaryOp::Add => number(a.wrapping_add(b)),
        BinaryOp::Sub => number(a.wrapping_sub(b)),
        BinaryOp::Mul => number(a.wrapping_mul(b)),
        BinaryOp::Div => number(a.checked_div(b)?),
        BinaryOp::Mod => number(a.checked_rem(b)?),
        BinaryOp::Eq => Literal::Bool(a == b),
        BinaryOp::Ne => Literal::Bool(a != b),
        BinaryOp::Lt => Literal::Bool(a < b),
        BinaryOp::Le => Literal::Bool(a <= b),
        BinaryOp::Gt => Literal::Bool(a > b),
        BinaryOp::Ge => Literal::Bool(a >= b),
        BinaryOp::And | BinaryOp::Or => Literal::Bool(b != 0),
    };
    Some(lit)
}

fn number(word: u16) -> Literal {
    Literal::Number(word.to_string())
}
