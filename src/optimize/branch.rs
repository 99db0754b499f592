use std::mem;

use crate::ast::expression::Expression;
use crate::ast::statement::{Block, ElseStmt, IfStmt, Statement};
use crate::ast::{Item, Program};

pub fn prune_program(program: &mut Program) -> bool {
    program.items.iter_mut().fold(false, |pruned, item| {
        let changed = match item {
            Item::Function(func_decl) => prune_block(&mut func_decl.block),
            Item::Statement(stmt) => prune_statement(stmt),
        };
        pruned | changed
    })
}

fn prune_block(block: &mut Block) -> bool {
    block
        .statements
        .iter_mut()
        .fold(false, |pruned, stmt| prune_statement(stmt) | pruned)
}

fn prune_statement(stmt: &mut Statement) -> bool {
    let taken = mem::replace(stmt, Statement::Block(Block::default()));
    match collapse(taken) {
        Ok(replacement) => {
            *stmt = replacement;
            prune_statement(stmt);
            true
        }
        Err(original) => {
            *stmt = original;
            prune_nested(stmt)
        }
    }
}

fn prune_nested(stmt: &mut Statement) -> bool {
    match stmt {
        Statement::Block(block) => prune_block(block),
        Statement::IfStmt(if_stmt) => prune_if_stmt(if_stmt),
        Statement::WhileStmt(while_stmt) => prune_block(&mut while_stmt.block),
        Statement::VarDecl(_) | Statement::ReturnStmt(..) | Statement::ExpressionStmt(_) => false,
    }
}

fn prune_if_stmt(if_stmt: &mut IfStmt) -> bool {
    let mut pruned = prune_block(&mut if_stmt.block);
    if let Some(else_stmt) = if_stmt.else_stmt.take() {
        let (else_stmt, changed) = prune_else_stmt(else_stmt);
        if_stmt.else_stmt = Some(else_stmt);
        pruned |= changed;
    }
    pruned
}

fn prune_else_stmt(else_stmt: ElseStmt) -> (ElseStmt, bool) {
    match else_stmt {
        ElseStmt::Else(mut block) => {
            let changed = prune_block(&mut block);
            (ElseStmt::Else(block), changed)
        }
        ElseStmt::ElseIf(else_if) => {
            let mut stmt = Statement::IfStmt(*else_if);
            let changed = prune_statement(&mut stmt);
            let else_stmt = match stmt {
                Statement::IfStmt(else_if) => ElseStmt::ElseIf(Box::new(else_if)),
                Statement::Block(block) => ElseStmt::Else(block),
                stmt => ElseStmt::Else(Block {
                    statements: vec![stmt],
                    span: Default::default(),
                }),
            };
            (else_stmt, changed)
        }
    }
}

fn collapse(stmt: Statement) -> Result<Statement, Statement> {
    match stmt {
        Statement::IfStmt(if_stmt) => match condition_value(&if_stmt.condition) {
            Some(true) => Ok(Statement::Block(if_stmt.block)),
            Some(false) => Ok(match if_stmt.else_stmt {
                Some(ElseStmt::ElseIf(else_if)) => Statement::IfStmt(*else_if),
                Some(ElseStmt::Else(block)) => Statement::Block(block),
                None => Statement::Block(Block::default()),
            }),
            None => Err(Statement::IfStmt(if_stmt)),
        },
        Statement::WhileStmt(while_stmt)
            if condition_value(&while_stmt.condition) == Some(false) =>
        {
            Ok(Statement::Block(Block::default()))
        }
        stmt => Err(stmt),
    }
}

fn condition_value(condition: &Expression) -> Option<bool> {
    condition.literal()?.word().map(|word| word != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{lex::tokenize, parse};

    fn pruned(source: &str) -> (bool, Program) {
        let tokens = tokenize(source).collect::<Result<_, _>>().unwrap();
        let mut program = parse(tokens, 64, 512).unwrap();
        let changed = prune_program(&mut program);
        (changed, program)
    }

    fn only_statement(program: &Program) -> &Statement {
        let statements: Vec<_> = program.statements().collect();
        assert_eq!(statements.len(), 1);
        statements[0]
    }

    fn is_empty_block(stmt: &Statement) -> bool {
        matches!(stmt, Statement::Block(block) if block.statements.is_empty())
    }

    #[test]
    fn true_condition_keeps_then_branch() {
        let (changed, program) = pruned("if (1) { return 2; } else { return 3; }");
        assert!(changed);
        let Statement::Block(block) = only_statement(&program) else {
            panic!("expected a block");
        };
        assert!(matches!(
            block.statements.as_slice(),
            [Statement::ReturnStmt(Some(expr))]
                if expr.literal().and_then(|lit| lit.word()) == Some(2)
        ));
    }

    #[test]
    fn false_condition_takes_else_chain() {
        let (changed, program) = pruned("if (0) { 1; } else if (true) { 2; } else { 3; }");
        assert!(changed);
        let Statement::Block(block) = only_statement(&program) else {
            panic!("expected a block");
        };
        assert!(matches!(
            block.statements.as_slice(),
            [Statement::ExpressionStmt(expr)]
                if expr.literal().and_then(|lit| lit.word()) == Some(2)
        ));
    }

    #[test]
    fn false_condition_without_else_disappears() {
        let (changed, program) = pruned("if (false) { 1; }");
        assert!(changed);
        assert!(is_empty_block(only_statement(&program)));
    }

    #[test]
    fn never_running_loops_disappear() {
        let (changed, program) = pruned("while (0) { 1; }");
        assert!(changed);
        assert!(is_empty_block(only_statement(&program)));

        let (changed, _) = pruned("while (1) { 1; }");
        assert!(!changed);
    }

    #[test]
    fn nested_else_if_with_literal_condition_collapses() {
        let (changed, program) = pruned("let x = 1; if (x) { 1; } else if (0) { 2; } else { 3; }");
        assert!(changed);
        let Some(Statement::IfStmt(if_stmt)) = program.statements().nth(1) else {
            panic!("expected the if to stay");
        };
        assert!(matches!(
            &if_stmt.else_stmt,
            Some(ElseStmt::Else(block)) if block.statements.len() == 1
        ));
    }

    #[test]
    fn non_literal_conditions_stay() {
        let (changed, _) = pruned("let x = 1; if (x) { 1; } while (x) { x = 0; }");
        assert!(!changed);
    }
}
