pub mod lex;

use chumsky::prelude::Simple;
use chumsky::primitive::{choice, just};
use chumsky::recursive::recursive;
use chumsky::stream::Stream;
use chumsky::{select, BoxedParser, Parser};
use itertools::Itertools;
use thiserror::Error;

use crate::ast::declaration::{FunctionDecl, Param};
use crate::ast::expression::{ExprKind, Expression};
use crate::ast::literal::Literal;
use crate::ast::name::Name;
use crate::ast::operator::{BinaryOp, UnaryOp};
use crate::ast::r#type::Type;
use crate::ast::statement::{Block, ElseStmt, IfStmt, Statement, VarDecl, WhileStmt};
use crate::ast::{Item, Program};
use crate::error::{Category, Stage};
use crate::source::Span;

use self::lex::{Keyword, Operator, Punctuation, Token, TokenKind};

type ParseError = Simple<TokenKind>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("expected {expected}, found {found}")]
    Unexpected {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("unexpected {found}")]
    UnexpectedToken { found: String, span: Span },
    #[error("nesting deeper than {limit} levels")]
    TooDeep { limit: usize, span: Span },
    #[error("expression chain longer than {limit} operators")]
    ChainTooLong { limit: usize, span: Span },
}

impl Stage for Error {
    fn category(&self) -> Category {
        match self {
            Error::Unexpected { .. } | Error::UnexpectedToken { .. } => Category::Syntax,
            Error::TooDeep { .. } | Error::ChainTooLong { .. } => Category::ResourceLimit,
        }
    }

    fn span(&self) -> Option<Span> {
        match self {
            Error::Unexpected { span, .. }
            | Error::UnexpectedToken { span, .. }
            | Error::TooDeep { span, .. }
            | Error::ChainTooLong { span, .. } => Some(span.clone()),
        }
    }
}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Self {
        let found = error
            .found()
            .map_or_else(|| TokenKind::EndOfInput.to_string(), ToString::to_string);
        let expected = error
            .expected()
            .map(|token| token.as_ref().unwrap_or(&TokenKind::EndOfInput).to_string())
            .sorted()
            .dedup()
            .join(" or ");
        let span = error.span();
        if expected.is_empty() {
            Error::UnexpectedToken { found, span }
        } else {
            Error::Unexpected {
                expected,
                found,
                span,
            }
        }
    }
}

pub fn parse(tokens: Vec<Token>, max_nesting: usize, max_chain: usize) -> Result<Program, Error> {
    check_nesting(&tokens, max_nesting, max_chain)?;

    let eoi = tokens.last().map_or(0..0, |token| token.span.clone());
    let stream = Stream::from_iter(eoi, tokens.into_iter().map(|token| (token.kind, token.span)));
    program()
        .parse(stream)
        .map_err(|errors| match errors.into_iter().next() {
            Some(error) => Error::from(error),
            None => Error::UnexpectedToken {
                found: TokenKind::EndOfInput.to_string(),
                span: 0..0,
            },
        })
}

#[derive(Debug, Default)]
struct Level {
    else_ifs: usize,
    assignments: usize,
    chain: usize,
}

// Brackets, runs of prefix operators, assignments and `else if` chains are
// what the parser recurses on, so they count as nesting. Infix operators and
// call suffixes fold into left-deep trees and count towards the chain.
fn check_nesting(tokens: &[Token], max_nesting: usize, max_chain: usize) -> Result<(), Error> {
    let mut levels = vec![Level::default()];
    let mut prefix_run = 0;
    let mut previous: Option<&TokenKind> = None;

    for token in tokens {
        let after_operand = ends_operand(previous);
        let level = levels.len() - 1;
        match &token.kind {
            TokenKind::Punctuation(Punctuation::LeftParen) => {
                if after_operand {
                    levels[level].chain += 1;
                }
                levels.push(Level::default());
            }
            TokenKind::Punctuation(Punctuation::LeftBrace) => {
                levels[level].chain = 0;
                levels[level].assignments = 0;
                levels.push(Level::default());
            }
            TokenKind::Punctuation(Punctuation::RightParen) => {
                if levels.len() > 1 {
                    levels.pop();
                }
            }
            TokenKind::Punctuation(Punctuation::RightBrace) => {
                if levels.len() > 1 {
                    levels.pop();
                }
                if let Some(outer) = levels.last_mut() {
                    outer.chain = 0;
                    outer.assignments = 0;
                }
            }
            TokenKind::Punctuation(Punctuation::Semicolon | Punctuation::Comma) => {
                levels[level].chain = 0;
                levels[level].assignments = 0;
            }
            TokenKind::Keyword(Keyword::If) => {
                let follows_else = previous == Some(&TokenKind::Keyword(Keyword::Else));
                let else_ifs = &mut levels[level].else_ifs;
                *else_ifs = if follows_else { *else_ifs + 1 } else { 0 };
            }
            TokenKind::Operator(Operator::Equal) => levels[level].assignments += 1,
            TokenKind::Operator(_) if !is_prefix_operator(&token.kind, previous) => {
                levels[level].chain += 1
            }
            _ => {}
        }

        prefix_run = if is_prefix_operator(&token.kind, previous) {
            prefix_run + 1
        } else {
            0
        };

        let nested: usize = levels
            .iter()
            .map(|level| level.else_ifs + level.assignments)
            .sum();
        if levels.len() - 1 + nested + prefix_run > max_nesting {
            return Err(Error::TooDeep {
                limit: max_nesting,
                span: token.span.clone(),
            });
        }
        if levels.iter().map(|level| level.chain).sum::<usize>() > max_chain {
            return Err(Error::ChainTooLong {
                limit: max_chain,
                span: token.span.clone(),
            });
        }
        previous = Some(&token.kind);
    }
    Ok(())
}

fn ends_operand(previous: Option<&TokenKind>) -> bool {
    matches!(
        previous,
        Some(
            TokenKind::Identifier(_)
                | TokenKind::Number(_)
                | TokenKind::Keyword(Keyword::True | Keyword::False)
                | TokenKind::Punctuation(Punctuation::RightParen)
        )
    )
}

fn is_prefix_operator(kind: &TokenKind, previous: Option<&TokenKind>) -> bool {
    match kind {
        TokenKind::Operator(Operator::Bang) => true,
        TokenKind::Operator(Operator::Minus) => !ends_operand(previous),
        _ => false,
    }
}

fn program() -> impl Parser<TokenKind, Program, Error = ParseError> {
    let item = choice((
        function_decl().map(Item::Function),
        statement().map(Item::Statement),
    ));

    item.repeated()
        .then_ignore(just(TokenKind::EndOfInput))
        .map(|items| Program { items })
}

fn keyword(keyword: Keyword) -> impl Parser<TokenKind, TokenKind, Error = ParseError> + Clone {
    just(TokenKind::Keyword(keyword))
}

fn op(op: Operator) -> impl Parser<TokenKind, TokenKind, Error = ParseError> + Clone {
    just(TokenKind::Operator(op))
}

fn punct(punct: Punctuation) -> impl Parser<TokenKind, TokenKind, Error = ParseError> + Clone {
    just(TokenKind::Punctuation(punct))
}

fn name() -> impl Parser<TokenKind, Name, Error = ParseError> + Clone {
    select! {
        TokenKind::Identifier(name) => Name(name)
    }
}

fn annotation() -> impl Parser<TokenKind, Type, Error = ParseError> + Clone {
    punct(Punctuation::Colon)
        .ignore_then(name())
        .map_with_span(|name, span| Type { name, span })
}

fn function_decl() -> impl Parser<TokenKind, FunctionDecl, Error = ParseError> {
    let param = name()
        .then(annotation().or_not())
        .map_with_span(|(name, r#type), span| Param {
            name,
            r#type,
            span,
            local: None,
        });
    let params = param.separated_by(punct(Punctuation::Comma)).delimited_by(
        punct(Punctuation::LeftParen),
        punct(Punctuation::RightParen),
    );

    keyword(Keyword::Function)
        .ignore_then(name().map_with_span(|name, span| (name, span)))
        .then(params)
        .then(annotation().or_not())
        .then(block(statement()))
        .map(|((((name, name_span), params), returns), block)| FunctionDecl {
            name,
            name_span,
            params,
            returns,
            block,
        })
}

fn block(
    statement: impl Parser<TokenKind, Statement, Error = ParseError> + Clone,
) -> impl Parser<TokenKind, Block, Error = ParseError> + Clone {
    statement
        .repeated()
        .delimited_by(
            punct(Punctuation::LeftBrace),
            punct(Punctuation::RightBrace),
        )
        .map_with_span(|statements, span| Block { statements, span })
}

pub fn statement() -> impl Parser<TokenKind, Statement, Error = ParseError> + Clone {
    recursive(|statement| {
        let block = block(statement);

        let var_decl = keyword(Keyword::Let)
            .ignore_then(name().map_with_span(|name, span| (name, span)))
            .then(annotation().or_not())
            .then_ignore(op(Operator::Equal))
            .then(expression())
            .then_ignore(punct(Punctuation::Semicolon))
            .map_with_span(|(((name, name_span), r#type), value), span| {
                Statement::VarDecl(VarDecl {
                    name,
                    name_span,
                    r#type,
                    value,
                    span,
                    local: None,
                })
            });

        let return_stmt = keyword(Keyword::Return)
            .ignore_then(expression().or_not())
            .then_ignore(punct(Punctuation::Semicolon))
            .map(Statement::ReturnStmt);

        let while_stmt = keyword(Keyword::While)
            .ignore_then(expression())
            .then(block.clone())
            .map(|(condition, block)| Statement::WhileStmt(WhileStmt { condition, block }));

        let expression_stmt = expression()
            .then_ignore(punct(Punctuation::Semicolon))
            .map(Statement::ExpressionStmt);

        choice((
            block.clone().map(Statement::Block),
            var_decl,
            return_stmt,
            if_stmt(block).map(Statement::IfStmt),
            while_stmt,
            expression_stmt,
        ))
    })
}

pub fn if_stmt(
    block: impl Parser<TokenKind, Block, Error = ParseError> + Clone + 'static,
) -> impl Parser<TokenKind, IfStmt, Error = ParseError> + Clone {
    recursive(|r#if| {
        let else_stmt = {
            let else_if = r#if.map(Box::new).map(ElseStmt::ElseIf);
            let r#else = block.clone().map(ElseStmt::Else);
            keyword(Keyword::Else).ignore_then(else_if.or(r#else))
        };

        keyword(Keyword::If)
            .ignore_then(expression())
            .then(block)
            .then(else_stmt.or_not())
            .map(|((condition, block), else_stmt)| IfStmt {
                condition,
                block,
                else_stmt,
            })
    })
}

type ExprParser = BoxedParser<'static, TokenKind, Expression, ParseError>;

pub fn expression() -> impl Parser<TokenKind, Expression, Error = ParseError> + Clone {
    recursive(|expression| {
        let unary = unary_expr(primary_expr(expression.clone()));

        let product = binary_level(
            unary,
            choice((
                op(Operator::Star).to(BinaryOp::Mul),
                op(Operator::Slash).to(BinaryOp::Div),
                op(Operator::Percent).to(BinaryOp::Mod),
            )),
        );
        let sum = binary_level(
            product,
            choice((
                op(Operator::Plus).to(BinaryOp::Add),
                op(Operator::Minus).to(BinaryOp::Sub),
            )),
        );
        let compare = binary_level(
            sum,
            choice((
                op(Operator::LessEqual).to(BinaryOp::Le),
                op(Operator::GreaterEqual).to(BinaryOp::Ge),
                op(Operator::Less).to(BinaryOp::Lt),
                op(Operator::Greater).to(BinaryOp::Gt),
            )),
        );
        let equality = binary_level(
            compare,
            choice((
                op(Operator::EqualEqual).to(BinaryOp::Eq),
                op(Operator::BangEqual).to(BinaryOp::Ne),
            )),
        );
        let and = binary_level(equality, op(Operator::AndAnd).to(BinaryOp::And));
        let or = binary_level(and, op(Operator::OrOr).to(BinaryOp::Or));

        or.then(op(Operator::Equal).ignore_then(expression).or_not())
            .map(|(target, value)| match value {
                Some(value) => {
                    let span = target.span.start..value.span.end;
                    Expression::new(
                        ExprKind::Assignment(Box::new(target), Box::new(value)),
                        span,
                    )
                }
                None => target,
            })
    })
}

fn binary_level(
    operand: ExprParser,
    operator: impl Parser<TokenKind, BinaryOp, Error = ParseError> + Clone + 'static,
) -> ExprParser {
    operand
        .clone()
        .then(operator.then(operand).repeated())
        .foldl(|lhs, (op, rhs)| {
            let span = lhs.span.start..rhs.span.end;
            Expression::new(ExprKind::BinaryOp(op, Box::new(lhs), Box::new(rhs)), span)
        })
        .boxed()
}

fn unary_expr(primary: ExprParser) -> ExprParser {
    recursive(|unary_expr| {
        unary_op()
            .map_with_span(|op, span: Span| (op, span))
            .then(unary_expr)
            .map(|((op, op_span), operand): ((UnaryOp, Span), Expression)| {
                let span = op_span.start..operand.span.end;
                Expression::new(ExprKind::UnaryOp(op, Box::new(operand)), span)
            })
            .or(primary)
    })
    .boxed()
}

fn primary_expr(
    expression: impl Parser<TokenKind, Expression, Error = ParseError> + Clone + 'static,
) -> ExprParser {
    let literal =
        literal().map_with_span(|lit, span| Expression::new(ExprKind::Literal(lit), span));

    let operand_name =
        name().map_with_span(|name, span| Expression::new(ExprKind::OperandName(name, None), span));

    let nested_expr = expression.clone().delimited_by(
        punct(Punctuation::LeftParen),
        punct(Punctuation::RightParen),
    );

    let arguments = expression
        .separated_by(punct(Punctuation::Comma))
        .delimited_by(
            punct(Punctuation::LeftParen),
            punct(Punctuation::RightParen),
        )
        .map_with_span(|args, span: Span| (args, span));

    choice((literal, operand_name, nested_expr))
        .then(arguments.repeated())
        .foldl(|callee, (args, span)| {
            let span = callee.span.start..span.end;
            Expression::new(ExprKind::Arguments(Box::new(callee), args), span)
        })
        .boxed()
}

fn literal() -> impl Parser<TokenKind, Literal, Error = ParseError> + Clone {
    select! {
        TokenKind::Number(n) => Literal::Number(n),
        TokenKind::Keyword(Keyword::True) => Literal::Bool(true),
        TokenKind::Keyword(Keyword::False) => Literal::Bool(false),
    }
}

fn unary_op() -> impl Parser<TokenKind, UnaryOp, Error = ParseError> + Clone {
    select! {
        TokenKind::Operator(Operator::Minus) => UnaryOp::Neg,
        TokenKind::Operator(Operator::Bang) => UnaryOp::Not,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::statement::Statement;

    fn parse_source(source: &str) -> Result<Program, Error> {
        let tokens = lex::tokenize(source).collect::<Result<Vec<_>, _>>().unwrap();
        parse(tokens, 64, 512)
    }

    fn expression_of(source: &str) -> Expression {
        let program = parse_source(source).unwrap();
        match program.items.into_iter().next() {
            Some(Item::Statement(Statement::ExpressionStmt(expr))) => expr,
            other => panic!("expected an expression statement, got {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = expression_of("1 + 2 * 3;");
        match expr.kind {
            ExprKind::BinaryOp(BinaryOp::Add, lhs, rhs) => {
                assert!(matches!(lhs.kind, ExprKind::Literal(_)));
                assert!(matches!(rhs.kind, ExprKind::BinaryOp(BinaryOp::Mul, _, _)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn subtraction_is_left_associative() {
        let expr = expression_of("1 - 2 - 3;");
        match expr.kind {
            ExprKind::BinaryOp(BinaryOp::Sub, lhs, _) => {
                assert!(matches!(lhs.kind, ExprKind::BinaryOp(BinaryOp::Sub, _, _)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = expression_of("a = b = 1;");
        match expr.kind {
            ExprKind::Assignment(target, value) => {
                assert!(matches!(target.kind, ExprKind::OperandName(..)));
                assert!(matches!(value.kind, ExprKind::Assignment(..)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn calls_are_postfix() {
        let expr = expression_of("-f(1, 2);");
        match expr.kind {
            ExprKind::UnaryOp(UnaryOp::Neg, operand) => match operand.kind {
                ExprKind::Arguments(callee, args) => {
                    assert!(matches!(callee.kind, ExprKind::OperandName(..)));
                    assert_eq!(args.len(), 2);
                }
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn spans_cover_the_whole_expression() {
        let expr = expression_of("alpha + 10;");
        assert_eq!(expr.span, 0..10);
    }

    #[test]
    fn else_if_chains() {
        let program = parse_source("if a { } else if b { } else { }").unwrap();
        match &program.items[0] {
            Item::Statement(Statement::IfStmt(if_stmt)) => match &if_stmt.else_stmt {
                Some(ElseStmt::ElseIf(else_if)) => {
                    assert!(matches!(else_if.else_stmt, Some(ElseStmt::Else(_))))
                }
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn functions_and_statements_mix_at_top_level() {
        let program = parse_source("function f(a: int, b) : bool { return a; } f(1, 2);").unwrap();
        assert_eq!(program.functions().count(), 1);
        assert_eq!(program.statements().count(), 1);
        let func = program.functions().next().unwrap();
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.name_span, 9..10);
        assert_eq!(func.returns.as_ref().map(|t| t.name.0.as_str()), Some("bool"));
    }

    #[test]
    fn missing_semicolon_reports_the_found_token() {
        let err = parse_source("let x = 1").unwrap_err();
        assert_eq!(err.category(), Category::Syntax);
        assert_eq!(err.span(), Some(9..9));
        assert!(err.to_string().contains("found end of input"), "{err}");
    }

    #[test]
    fn deep_nesting_is_a_resource_error() {
        let source = format!("{}1{};", "(".repeat(100), ")".repeat(100));
        let err = parse_source(&source).unwrap_err();
        assert_eq!(
            err,
            Error::TooDeep {
                limit: 64,
                span: 64..65
            }
        );
    }

    #[test]
    fn minus_after_an_operand_is_not_a_prefix() {
        let tokens = lex::tokenize("a - - - b;")
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert!(check_nesting(&tokens, 2, 512).is_ok());
        assert!(check_nesting(&tokens, 1, 512).is_err());
    }

    #[test]
    fn else_if_chains_count_as_nesting() {
        let source = format!("if (0) {{}}{} else {{}}", " else if (0) {}".repeat(8));
        let tokens = lex::tokenize(&source)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert!(check_nesting(&tokens, 9, 512).is_ok());
        assert!(matches!(
            check_nesting(&tokens, 7, 512),
            Err(Error::TooDeep { limit: 7, .. })
        ));
    }

    #[test]
    fn assignment_chains_count_as_nesting() {
        let err = parse_source(&format!("{}1;", "a = ".repeat(100))).unwrap_err();
        assert!(matches!(err, Error::TooDeep { limit: 64, .. }), "{err}");
    }

    #[test]
    fn long_operator_chains_are_rejected_before_parsing() {
        let source = format!("return {};", vec!["1"; 3_000].join(" + "));
        let err = parse_source(&source).unwrap_err();
        assert_eq!(err.category(), Category::ResourceLimit);
        assert!(matches!(err, Error::ChainTooLong { limit: 512, .. }), "{err}");

        let calls = format!("f{};", "()".repeat(1_000));
        assert!(matches!(
            parse_source(&calls),
            Err(Error::ChainTooLong { limit: 512, .. })
        ));
        assert!(parse_source(&format!("return {};", vec!["1"; 500].join(" + "))).is_ok());
    }
}
