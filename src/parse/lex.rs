use std::fmt;
use std::ops::Range;

use chumsky::prelude::Simple;
use chumsky::primitive::{any, choice, end, filter, just, take_until};
use chumsky::stream::Stream;
use chumsky::text;
use chumsky::Parser;
use thiserror::Error;

use crate::error::{Category, Stage};
use crate::source::{Position, Span};

pub fn tokenize(source: &str) -> Lexer<'_> {
    Lexer {
        source,
        offset: 0,
        line: 1,
        column: 1,
        finished: false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub position: Position,
    pub span: Span,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum TokenKind {
    Identifier(String),
    Number(String),
    Keyword(Keyword),
    Operator(Operator),
    Punctuation(Punctuation),
    EndOfInput,
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Lexeme {
    Token(TokenKind),
    Unexpected(char),
    UnterminatedComment,
    End,
}

// Spans are byte offsets into the scanned slice.
fn lexeme() -> impl Parser<char, (Lexeme, Range<usize>), Error = Simple<char>> {
    let whitespace = filter(|c: &char| c.is_whitespace()).repeated().at_least(1).ignored();
    let line_comment = just("//").then(filter(|c: &char| *c != '\n').repeated()).ignored();
    let block_comment = just("/*").then(take_until(just("*/"))).ignored();
    let trivia = choice((whitespace, line_comment, block_comment)).repeated();

    let unterminated = just("/*")
        .then(any().repeated())
        .to(Lexeme::UnterminatedComment);

    trivia.ignore_then(
        choice((
            unterminated,
            token().map(Lexeme::Token),
            end().to(Lexeme::End),
            any().map(Lexeme::Unexpected),
        ))
        .map_with_span(|lexeme, span: Range<usize>| (lexeme, span)),
    )
}

fn token() -> impl Parser<char, TokenKind, Error = Simple<char>> {
    let number = text::digits(10)
        .then(just('.').ignore_then(text::digits(10)).or_not())
        .map(|(int, fraction): (String, Option<String>)| match fraction {
            Some(fraction) => format!("{int}.{fraction}"),
            None => int,
        })
        .map(TokenKind::Number);

    let identifier = text::ident().map(TokenKind::Identifier);

    choice((
        number,
        operator().map(TokenKind::Operator),
        punctuation().map(TokenKind::Punctuation),
        keyword().map(TokenKind::Keyword),
        identifier,
    ))
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Keyword {
    Else,
    False,
    Function,
    If,
    Let,
    Return,
    True,
    While,
}

fn keyword() -> impl Parser<char, Keyword, Error = Simple<char>> {
    choice((
        text::keyword("else").to(Keyword::Else),
        text::keyword("false").to(Keyword::False),
        text::keyword("function").to(Keyword::Function),
        text::keyword("if").to(Keyword::If),
        text::keyword("let").to(Keyword::Let),
        text::keyword("return").to(Keyword::Return),
        text::keyword("true").to(Keyword::True),
        text::keyword("while").to(Keyword::While),
    ))
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Operator {
    EqualEqual,
    BangEqual,
    LessEqual,
    GreaterEqual,
    AndAnd,
    OrOr,
    Equal,
    Less,
    Greater,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
}

// Two-character operators come first so they win over their prefixes.
fn operator() -> impl Parser<char, Operator, Error = Simple<char>> {
    choice((
        just("==").to(Operator::EqualEqual),
        just("!=").to(Operator::BangEqual),
        just("<=").to(Operator::LessEqual),
        just(">=").to(Operator::GreaterEqual),
        just("&&").to(Operator::AndAnd),
        just("||").to(Operator::OrOr),
        just("=").to(Operator::Equal),
        just("<").to(Operator::Less),
        just(">").to(Operator::Greater),
        just("+").to(Operator::Plus),
        just("-").to(Operator::Minus),
        just("*").to(Operator::Star),
        just("/").to(Operator::Slash),
        just("%").to(Operator::Percent),
        just("!").to(Operator::Bang),
    ))
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Punctuation {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Semicolon,
    Colon,
}

fn punctuation() -> impl Parser<char, Punctuation, Error = Simple<char>> {
    choice((
        just("(").to(Punctuation::LeftParen),
        just(")").to(Punctuation::RightParen),
        just("{").to(Punctuation::LeftBrace),
        just("}").to(Punctuation::RightBrace),
        just(",").to(Punctuation::Comma),
        just(";").to(Punctuation::Semicolon),
        just(":").to(Punctuation::Colon),
    ))
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Keyword::Else => "else",
            Keyword::False => "false",
            Keyword::Function => "function",
            Keyword::If => "if",
            Keyword::Let => "let",
            Keyword::Return => "return",
            Keyword::True => "true",
            Keyword::While => "while",
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::EqualEqual => "==",
            Operator::BangEqual => "!=",
            Operator::LessEqual => "<=",
            Operator::GreaterEqual => ">=",
            Operator::AndAnd => "&&",
            Operator::OrOr => "||",
            Operator::Equal => "=",
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Star => "*",
            Operator::Slash => "/",
            Operator::Percent => "%",
            Operator::Bang => "!",
        })
    }
}

impl fmt::Display for Punctuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Punctuation::LeftParen => "(",
            Punctuation::RightParen => ")",
            Punctuation::LeftBrace => "{",
            Punctuation::RightBrace => "}",
            Punctuation::Comma => ",",
            Punctuation::Semicolon => ";",
            Punctuation::Colon => ":",
        })
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) => write!(f, "identifier `{name}`"),
            TokenKind::Number(number) => write!(f, "number `{number}`"),
            TokenKind::Keyword(keyword) => write!(f, "`{keyword}`"),
            TokenKind::Operator(op) => write!(f, "`{op}`"),
            TokenKind::Punctuation(punct) => write!(f, "`{punct}`"),
            TokenKind::EndOfInput => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unexpected character `{found}`")]
    UnexpectedCharacter { found: char, span: Span },
    #[error("unterminated block comment")]
    UnterminatedComment { span: Span },
}

impl Stage for Error {
    fn category(&self) -> Category {
        Category::Lexical
    }

    fn span(&self) -> Option<Span> {
        match self {
            Error::UnexpectedCharacter { span, .. } | Error::UnterminatedComment { span } => {
                Some(span.clone())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lexer<'src> {
    source: &'src str,
    offset: usize,
    line: usize,
    column: usize,
    finished: bool,
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Result<Token, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.scan();
        self.finished = match &token {
            Ok(token) => token.kind == TokenKind::EndOfInput,
            Err(_) => true,
        };
        Some(token)
    }
}

impl std::iter::FusedIterator for Lexer<'_> {}

impl<'src> Lexer<'src> {
    fn here(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.offset,
        }
    }

    fn advance_to(&mut self, end: usize) {
        for c in self.source.get(self.offset..end).unwrap_or_default().chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset = end.max(self.offset);
    }

    fn scan(&mut self) -> Result<Token, Error> {
        let rest = &self.source[self.offset..];
        let stream = Stream::from_iter(
            rest.len()..rest.len(),
            rest.char_indices().map(|(i, c)| (c, i..i + c.len_utf8())),
        );
        let (lexeme, span) = lexeme().parse(stream).unwrap_or_else(recover);
        let span = match lexeme {
            Lexeme::End => rest.len()..rest.len(),
            _ => span,
        };

        let start = self.offset + span.start;
        let end = self.offset + span.end;
        self.advance_to(start);
        let position = self.here();

        let kind = match lexeme {
            Lexeme::Token(kind) => kind,
            Lexeme::End => TokenKind::EndOfInput,
            Lexeme::Unexpected(found) => {
                self.advance_to(end);
                return Err(Error::UnexpectedCharacter {
                    found,
                    span: start..end,
                });
            }
            Lexeme::UnterminatedComment => {
                return Err(Error::UnterminatedComment {
                    span: start..self.source.len(),
                })
            }
        };
        self.advance_to(end);

        Ok(Token {
            kind,
            lexeme: self.source.get(start..end).unwrap_or_default().to_owned(),
            position,
            span: start..end,
        })
    }
}

fn recover(errors: Vec<Simple<char>>) -> (Lexeme, Range<usize>) {
    match errors.into_iter().next() {
        Some(error) => match error.found() {
            Some(&found) => (Lexeme::Unexpected(found), error.span()),
            None => (Lexeme::End, error.span()),
        },
        None => (Lexeme::End, 0..0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .map(|token| token.map(|token| token.kind))
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn longest_operator_wins() {
        assert_eq!(
            kinds("a == b = c"),
            vec![
                TokenKind::Identifier("a".to_owned()),
                TokenKind::Operator(Operator::EqualEqual),
                TokenKind::Identifier("b".to_owned()),
                TokenKind::Operator(Operator::Equal),
                TokenKind::Identifier("c".to_owned()),
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn keywords_need_a_word_boundary() {
        assert_eq!(
            kinds("if iffy"),
            vec![
                TokenKind::Keyword(Keyword::If),
                TokenKind::Identifier("iffy".to_owned()),
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn numbers_take_an_optional_fraction() {
        assert_eq!(
            kinds("12 3.25"),
            vec![
                TokenKind::Number("12".to_owned()),
                TokenKind::Number("3.25".to_owned()),
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        let tokens: Vec<_> = tokenize("// line\n  /* block\n */ x")
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].lexeme, "x");
        assert_eq!(
            tokens[0].position,
            Position {
                line: 3,
                column: 5,
                offset: 23
            }
        );
    }

    #[test]
    fn empty_source_is_just_end_of_input() {
        assert_eq!(kinds(""), vec![TokenKind::EndOfInput]);
    }

    #[test]
    fn first_bad_character_ends_the_sequence() {
        let items: Vec<_> = tokenize("a # b").collect();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[1],
            Err(Error::UnexpectedCharacter {
                found: '#',
                span: 2..3
            })
        );
    }

    #[test]
    fn spans_are_byte_offsets() {
        let items: Vec<_> = tokenize("/* é */ x é").collect();
        assert_eq!(items[0].as_ref().map(|token| token.span.clone()), Ok(9..10));
        assert_eq!(
            items[0].as_ref().map(|token| token.position.column),
            Ok(9)
        );
        assert_eq!(
            items[1],
            Err(Error::UnexpectedCharacter {
                found: 'é',
                span: 11..13
            })
        );
    }

    #[test]
    fn unterminated_comment_is_an_error() {
        let last = tokenize("x /* never closed").last();
        assert!(matches!(
            last,
            Some(Err(Error::UnterminatedComment { span })) if span == (2..17)
        ));
    }

    #[test]
    fn lexer_restarts_from_a_clone() {
        let mut lexer = tokenize("a b c");
        lexer.next();
        let rest: Vec<_> = lexer.clone().collect();
        let again: Vec<_> = lexer.collect();
        assert_eq!(rest, again);
    }
}
