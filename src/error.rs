use std::{error, fmt, iter};

use miette::{LabeledSpan, SourceSpan};

use crate::source::{Position, SourceMap, Span};

pub type CompileResult = Result<Vec<u16>, Diagnostic>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Lexical,
    Syntax,
    Semantic,
    CodeGeneration,
    ResourceLimit,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Lexical => "lexical error",
            Category::Syntax => "syntax error",
            Category::Semantic => "semantic error",
            Category::CodeGeneration => "code generation error",
            Category::ResourceLimit => "resource limit exceeded",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
        }
    }
}

pub trait Stage: error::Error {
    fn category(&self) -> Category;

    fn span(&self) -> Option<Span>;
}

/// The single failure a `compile` call reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: Category,
    pub message: String,
    pub position: Option<Position>,
    pub span: Option<Span>,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Diagnostic {
            category,
            message: message.into(),
            position: None,
            span: None,
            severity: Severity::Error,
        }
    }

    pub(crate) fn from_stage<E: Stage>(err: E, source: &SourceMap) -> Self {
        let span = err.span();
        Diagnostic {
            category: err.category(),
            message: err.to_string(),
            position: span.as_ref().map(|span| source.position(span.start)),
            span,
            severity: Severity::Error,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(position) = self.position {
            write!(f, " at {position}")?;
        }
        Ok(())
    }
}

impl error::Error for Diagnostic {}

impl miette::Diagnostic for Diagnostic {
    fn severity(&self) -> Option<miette::Severity> {
        match self.severity {
            Severity::Error => Some(miette::Severity::Error),
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span.clone()?;
        let label = LabeledSpan::new_with_span(
            Some(self.category.to_string()),
            SourceSpan::from(span),
        );
        Some(Box::new(iter::once(label)))
    }
}
