/// Source dialect. Switched at compile time with the `language` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// Division always produces a real, `print` ends the line unless a
    /// trailing `;` is given, single line `if` closes at end of line and
    /// functions returning values need brackets.
    Traditional,
    Basic4gl,
    /// Basic4GL rules except for `print`, which behaves as traditional.
    TraditionalPrint,
}

/// ## Machine and compiler limits
#[derive(Debug, Clone)]
pub struct Config {
    /// Cells in the variable data arena.
    pub max_data: usize,
    /// Nested `gosub` depth.
    pub max_calls: usize,
    /// Instructions per `execute` slice for hosts that don't choose.
    pub steps: usize,
    pub case_sensitive: bool,
    pub syntax: Syntax,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_data: 100_000_000,
            max_calls: 1_000_000,
            steps: 5000,
            case_sensitive: false,
            syntax: Syntax::Basic4gl,
        }
    }
}
