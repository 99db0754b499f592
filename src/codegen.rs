mod emitter;
mod frame;

use thiserror::Error;

use crate::ast::declaration::{FunctionDecl, LocalId};
use crate::ast::expression::{Binding, ExprKind, Expression};
use crate::ast::literal::Literal;
use crate::ast::name::Name;
use crate::ast::operator::{BinaryOp, UnaryOp};
use crate::ast::statement::{Block, ElseStmt, IfStmt, Statement, VarDecl, WhileStmt};
use crate::ast::{Item, Program};
use crate::bytecode::Opcode;
use crate::error::{Category, Stage};
use crate::source::Span;

use self::emitter::{Emitter, Label};
use self::frame::Frame;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("literal `{lexeme}` does not fit in 16 bits")]
    LiteralOutOfRange { lexeme: String, span: Span },
    #[error("fractional literal `{lexeme}` is not supported")]
    FractionalLiteral { lexeme: String, span: Span },
    #[error("`{name}` has no resolved binding")]
    Unresolved { name: Name, span: Span },
    #[error("program exceeds the 16-bit address space")]
    ProgramTooLarge,
    #[error("frame exceeds {} slots", u16::MAX)]
    FrameTooLarge,
    #[error("{count} jump target(s) were never bound")]
    UnboundLabel { count: usize },
}

impl Stage for Error {
    fn category(&self) -> Category {
        Category::CodeGeneration
    }

    fn span(&self) -> Option<Span> {
        match self {
            Error::LiteralOutOfRange { span, .. }
            | Error::FractionalLiteral { span, .. }
            | Error::Unresolved { span, .. } => Some(span.clone()),
            Error::ProgramTooLarge | Error::FrameTooLarge | Error::UnboundLabel { .. } => None,
        }
    }
}

pub fn generate(program: &Program) -> Result<Vec<u16>> {
    if program.items.is_empty() {
        return Ok(vec![]);
    }
    let mut generator = Generator::new(program);
    generator.gen_main(program)?;
    program
        .functions()
        .enumerate()
        .try_for_each(|(index, func_decl)| generator.gen_function_decl(index, func_decl))?;
    generator.emitter.finish()
}

pub fn check_literals(program: &Program) -> Result<()> {
    program.items.iter().try_for_each(|item| match item {
        Item::Function(func_decl) => check_block_literals(&func_decl.block),
        Item::Statement(stmt) => check_statement_literals(stmt),
    })
}

fn check_block_literals(block: &Block) -> Result<()> {
    block.statements.iter().try_for_each(check_statement_literals)
}

fn check_statement_literals(stmt: &Statement) -> Result<()> {
    match stmt {
        Statement::Block(block) => check_block_literals(block),
        Statement::VarDecl(var_decl) => check_expression_literals(&var_decl.value),
        Statement::ReturnStmt(Some(expr)) | Statement::ExpressionStmt(expr) => {
            check_expression_literals(expr)
        }
        Statement::ReturnStmt(None) => Ok(()),
        Statement::IfStmt(if_stmt) => check_if_stmt_literals(if_stmt),
        Statement::WhileStmt(while_stmt) => {
            check_expression_literals(&while_stmt.condition)?;
            check_block_literals(&while_stmt.block)
        }
    }
}

fn check_if_stmt_literals(if_stmt: &IfStmt) -> Result<()> {
    check_expression_literals(&if_stmt.condition)?;
    check_block_literals(&if_stmt.block)?;
    match &if_stmt.else_stmt {
        Some(ElseStmt::ElseIf(else_if)) => check_if_stmt_literals(else_if),
        Some(ElseStmt::Else(block)) => check_block_literals(block),
        None => Ok(()),
    }
}

fn check_expression_literals(expr: &Expression) -> Result<()> {
    match &expr.kind {
        ExprKind::Literal(lit) => literal_word(lit, &expr.span).map(|_| ()),
        ExprKind::OperandName(..) => Ok(()),
        ExprKind::UnaryOp(_, operand) => check_expression_literals(operand),
        ExprKind::BinaryOp(_, lhs, rhs) | ExprKind::Assignment(lhs, rhs) => {
            check_expression_literals(lhs)?;
            check_expression_literals(rhs)
        }
        ExprKind::Arguments(_, args) => args.iter().try_for_each(check_expression_literals),
    }
}

struct Generator {
    emitter: Emitter,
    functions: Vec<Label>,
    frame: Frame,
}

impl Generator {
    fn new(program: &Program) -> Self {
        let mut emitter = Emitter::default();
        let functions = program.functions().map(|_| emitter.new_label()).collect();
        Generator {
            emitter,
            functions,
            frame: Frame::default(),
        }
    }

    fn gen_main(&mut self, program: &Program) -> Result<()> {
        self.frame = Frame::default();
        let enter = self.emitter.emit(Opcode::Enter, &[0]);
        program
            .statements()
            .try_for_each(|stmt| self.gen_statement(stmt))?;
        self.emitter.emit(Opcode::Halt, &[]);
        self.emitter.patch_word(enter, self.frame.size());
        Ok(())
    }

    fn gen_function_decl(&mut self, index: usize, func_decl: &FunctionDecl) -> Result<()> {
        self.emitter.bind(self.functions[index])?;
        self.frame = Frame::default();
        for param in &func_decl.params {
            let local = resolved_local(param.local, &param.name, &param.span)?;
            self.frame.declare(local)?;
        }

        let enter = self.emitter.emit(Opcode::Enter, &[0]);
        func_decl
            .block
            .statements
            .iter()
            .try_for_each(|stmt| self.gen_statement(stmt))?;
        if !func_decl.block.returns() {
            self.emitter.emit(Opcode::Push, &[0]);
            self.emitter.emit(Opcode::Return, &[]);
        }
        self.emitter.patch_word(enter, self.frame.size());
        Ok(())
    }

    fn gen_block(&mut self, block: &Block) -> Result<()> {
        self.frame.enter_scope();
        let result = block
            .statements
            .iter()
            .try_for_each(|stmt| self.gen_statement(stmt));
        self.frame.exit_scope();
        result
    }

    fn gen_statement(&mut self, stmt: &Statement) -> Result<()> {
        match stmt {
            Statement::Block(block) => self.gen_block(block),
            Statement::VarDecl(var_decl) => self.gen_var_decl(var_decl),
            Statement::ReturnStmt(expr) => self.gen_return_stmt(expr.as_ref()),
            Statement::IfStmt(if_stmt) => self.gen_if_stmt(if_stmt),
            Statement::WhileStmt(while_stmt) => self.gen_while_stmt(while_stmt),
            Statement::ExpressionStmt(expr) => {
                self.gen_expression(expr)?;
                self.emitter.emit(Opcode::Pop, &[]);
                Ok(())
            }
        }
    }

    fn gen_var_decl(&mut self, var_decl: &VarDecl) -> Result<()> {
        // The value is evaluated before the name is in scope.
        self.gen_expression(&var_decl.value)?;
        let local = resolved_local(var_decl.local, &var_decl.name, &var_decl.name_span)?;
        let slot = self.frame.declare(local)?;
        self.emitter.emit(Opcode::Store, &[slot]);
        Ok(())
    }

    fn gen_return_stmt(&mut self, expr: Option<&Expression>) -> Result<()> {
        match expr {
            Some(expr) => self.gen_expression(expr)?,
            None => {
                self.emitter.emit(Opcode::Push, &[0]);
            }
        }
        self.emitter.emit(Opcode::Return, &[]);
        Ok(())
    }

    fn gen_if_stmt(&mut self, if_stmt: &IfStmt) -> Result<()> {
        let else_label = self.emitter.new_label();
        self.gen_expression(&if_stmt.condition)?;
        self.emitter.emit_to(Opcode::JumpIfZero, else_label, &[]);
        self.gen_block(&if_stmt.block)?;

        let Some(else_stmt) = &if_stmt.else_stmt else {
            return self.emitter.bind(else_label);
        };
        let end = self.emitter.new_label();
        self.emitter.emit_to(Opcode::Jump, end, &[]);
        self.emitter.bind(else_label)?;
        match else_stmt {
            ElseStmt::ElseIf(if_stmt) => self.gen_if_stmt(if_stmt)?,
            ElseStmt::Else(block) => self.gen_block(block)?,
        }
        self.emitter.bind(end)
    }

    fn gen_while_stmt(&mut self, while_stmt: &WhileStmt) -> Result<()> {
        let top = self.emitter.new_label();
        let end = self.emitter.new_label();
        self.emitter.bind(top)?;
        self.gen_expression(&while_stmt.condition)?;
        self.emitter.emit_to(Opcode::JumpIfZero, end, &[]);
        self.gen_block(&while_stmt.block)?;
        self.emitter.emit_to(Opcode::Jump, top, &[]);
        self.emitter.bind(end)
    }

    fn gen_expression(&mut self, expr: &Expression) -> Result<()> {
        match &expr.kind {
            ExprKind::Literal(lit) => {
                let word = literal_word(lit, &expr.span)?;
                self.emitter.emit(Opcode::Push, &[word]);
            }
            ExprKind::OperandName(name, binding) => {
                let slot = self.slot(name, *binding, &expr.span)?;
                self.emitter.emit(Opcode::Load, &[slot]);
            }
            ExprKind::UnaryOp(op, operand) => {
                self.gen_expression(operand)?;
                self.emitter.emit(unary_opcode(*op), &[]);
            }
            ExprKind::BinaryOp(op, lhs, rhs) => match binary_lowering(*op) {
                Lowering::Stack(opcode) => {
                    self.gen_expression(lhs)?;
                    self.gen_expression(rhs)?;
                    self.emitter.emit(opcode, &[]);
                }
                Lowering::ShortCircuit(jump) => self.gen_short_circuit(jump, lhs, rhs)?,
            },
            ExprKind::Assignment(target, value) => self.gen_assignment(target, value)?,
            ExprKind::Arguments(callee, args) => self.gen_arguments(callee, args)?,
        }
        Ok(())
    }

    fn gen_short_circuit(
        &mut self,
        jump: Opcode,
        lhs: &Expression,
        rhs: &Expression,
    ) -> Result<()> {
        let (decided, undecided) = match jump {
            Opcode::JumpIfZero => (0, 1),
            _ => (1, 0),
        };
        let decided_label = self.emitter.new_label();
        let end = self.emitter.new_label();

        self.gen_expression(lhs)?;
        self.emitter.emit_to(jump, decided_label, &[]);
        self.gen_expression(rhs)?;
        self.emitter.emit_to(jump, decided_label, &[]);
        self.emitter.emit(Opcode::Push, &[undecided]);
        self.emitter.emit_to(Opcode::Jump, end, &[]);
        self.emitter.bind(decided_label)?;
        self.emitter.emit(Opcode::Push, &[decided]);
        self.emitter.bind(end)
    }

    fn gen_assignment(&mut self, target: &Expression, value: &Expression) -> Result<()> {
        let ExprKind::OperandName(name, binding) = &target.kind else {
            return Err(Error::Unresolved {
                name: Name(String::new()),
                span: target.span.clone(),
            });
        };
        let slot = self.slot(name, *binding, &target.span)?;
        self.gen_expression(value)?;
        self.emitter.emit(Opcode::Dup, &[]);
        self.emitter.emit(Opcode::Store, &[slot]);
        Ok(())
    }

    fn gen_arguments(&mut self, callee: &Expression, args: &[Expression]) -> Result<()> {
        let label = match &callee.kind {
            ExprKind::OperandName(_, Some(Binding::Function(index))) => {
                self.functions.get(*index).copied()
            }
            _ => None,
        };
        let Some(label) = label else {
            let name = match &callee.kind {
                ExprKind::OperandName(name, _) => name.clone(),
                _ => Name(String::new()),
            };
            return Err(Error::Unresolved {
                name,
                span: callee.span.clone(),
            });
        };

        args.iter().try_for_each(|arg| self.gen_expression(arg))?;
        let argc = u16::try_from(args.len()).map_err(|_| Error::ProgramTooLarge)?;
        self.emitter.emit_to(Opcode::Call, label, &[argc]);
        Ok(())
    }

    fn slot(&self, name: &Name, binding: Option<Binding>, span: &Span) -> Result<u16> {
        match binding {
            Some(Binding::Local(local)) => self.frame.slot(local),
            _ => None,
        }
        .ok_or_else(|| Error::Unresolved {
            name: name.clone(),
            span: span.clone(),
        })
    }
}

fn resolved_local(local: Option<LocalId>, name: &Name, span: &Span) -> Result<LocalId> {
    local.ok_or_else(|| Error::Unresolved {
        name: name.clone(),
        span: span.clone(),
    })
}

fn literal_word(lit: &Literal, span: &Span) -> Result<u16> {
    if let Some(word) = lit.word() {
        return Ok(word);
    }
    let lexeme = match lit {
        Literal::Number(lexeme) => lexeme.clone(),
        Literal::Bool(b) => b.to_string(),
    };
    if lexeme.contains('.') {
        Err(Error::FractionalLiteral {
            lexeme,
            span: span.clone(),
        })
    } else {
        Err(Error::LiteralOutOfRange {
            lexeme,
            span: span.clone(),
        })
    }
}

fn unary_opcode(op: UnaryOp) -> Opcode {
    match op {
        UnaryOp::Neg => Opcode::Neg,
        UnaryOp::Not => Opcode::Not,
    }
}

enum Lowering {
    Stack(Opcode),
    // The jump taken when the left operand decides the result.
    ShortCircuit(Opcode),
}

fn binary_lowering(op: BinaryOp) -> Lowering {
    match op {
        BinaryOp::Add => Lowering::Stack(Opcode::Add),
        BinaryOp::Sub => Lowering::Stack(Opcode::Sub),
        BinaryOp::Mul => Lowering::Stack(Opcode::Mul),
        BinaryOp::Div => Lowering::Stack(Opcode::Div),
        BinaryOp::Mod => Lowering::Stack(Opcode::Mod),
        BinaryOp::Eq => Lowering::Stack(Opcode::Eq),
        BinaryOp::Ne => Lowering::Stack(Opcode::Ne),
        BinaryOp::Lt => Lowering::Stack(Opcode::Lt),
        BinaryOp::Le => Lowering::Stack(Opcode::Le),
        BinaryOp::Gt => Lowering::Stack(Opcode::Gt),
        BinaryOp::Ge => Lowering::Stack(Opcode::Ge),
        BinaryOp::And => Lowering::ShortCircuit(Opcode::JumpIfZero),
        BinaryOp::Or => Lowering::ShortCircuit(Opcode::JumpIfNotZero),
    }
}
