/// Settings for one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub optimize: bool,
    /// Bracket, prefix-operator, assignment and `else if` nesting accepted by
    /// the parser.
    pub max_nesting: usize,
    /// Syntax tree depth accepted by the checker. Also bounds operator chains
    /// in the parser.
    pub max_depth: usize,
    /// Upper bound on optimizer iterations per pass group.
    pub max_passes: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            optimize: false,
            max_nesting: 64,
            max_depth: 512,
            max_passes: 16,
        }
    }
}

impl Options {
    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }
}
