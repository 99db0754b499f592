mod ast;
pub mod bytecode;
mod codegen;
mod error;
mod optimize;
mod options;
mod parse;
mod source;
mod typecheck;
mod util;

use log::{debug, log_enabled, trace, Level};

use error::Stage;
use parse::lex::{tokenize, Token};
use source::SourceMap;

pub use bytecode::encode_image;
pub use error::{Category, CompileResult, Diagnostic, Severity};
pub use options::Options;
pub use source::Position;

/// Compiles `source` to a word stream with the default limits.
pub fn compile(source: &str, optimize: bool) -> CompileResult {
    compile_with(source, &Options::default().optimize(optimize))
}

/// Runs every stage in order and reports the first failure.
pub fn compile_with(source: &str, options: &Options) -> CompileResult {
    let source_map = SourceMap::new(source);

    let tokens = tokenize(source)
        .collect::<Result<Vec<Token>, _>>()
        .map_err(diagnose(&source_map))?;
    debug!("lexed {} tokens", tokens.len());
    if log_enabled!(Level::Trace) {
        for token in &tokens {
            trace!("{} `{}` at {}", token.kind, token.lexeme, token.position);
        }
    }

    let program = parse::parse(tokens, options.max_nesting, options.max_depth)
        .map_err(diagnose(&source_map))?;
    debug!("parsed {} items", program.items.len());

    let mut program = typecheck::check(program, options.max_depth).map_err(diagnose(&source_map))?;
    debug!("checked {} functions", program.functions().count());

    if options.optimize {
        codegen::check_literals(&program).map_err(diagnose(&source_map))?;
        program = optimize::optimize_program(program, options.max_passes);
    }

    let words = codegen::generate(&program).map_err(diagnose(&source_map))?;
    debug!("generated {} words", words.len());
    if !options.optimize {
        return Ok(words);
    }

    let optimized =
        optimize::optimize_words(words, options.max_passes).map_err(diagnose(&source_map))?;
    debug!("optimized to {} words", optimized.len());
    Ok(optimized)
}

fn diagnose<'a, E: Stage>(source_map: &'a SourceMap<'a>) -> impl Fn(E) -> Diagnostic + 'a {
    move |err| Diagnostic::from_stage(err, source_map)
}
