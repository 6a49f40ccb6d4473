//! Error types for the engine, the recipe store and the text importer

use thiserror::Error;

/// Failures raised while resolving the recipe graph
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalcError {
    /// A recipe reachable from the root can reach itself again
    #[error("cyclic catalog: {}", path.join(" -> "))]
    CyclicCatalog { path: Vec<String> },

    /// A recipe with zero output made it past validation
    #[error("recipe '{symbol}' has an output of 0")]
    InvalidOutput { symbol: String },

    #[error("quantity overflow while totalling '{symbol}'")]
    QuantityOverflow { symbol: String },

    #[error("no recipe named '{0}'")]
    UnknownRecipe(String),
}

/// Failures raised by the catalog and its SQLite-backed store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid recipe '{name}': {reason}")]
    InvalidRecipe { name: String, reason: String },

    #[error("no recipe named '{0}'")]
    UnknownRecipe(String),

    #[error("adding '{candidate}' to '{recipe}' would create a circular dependency")]
    CircularDependency { recipe: String, candidate: String },

    #[error(transparent)]
    Calc(#[from] CalcError),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to parse one line of a plain-text recipe list
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("line {line}: expected `<n> <input>, ... => <n> <output>`")]
    MissingArrow { line: usize },

    #[error("line {line}: malformed term '{term}'")]
    Term { line: usize, term: String },

    #[error("line {line}: output of '{name}' must be at least 1")]
    ZeroOutput { line: usize, name: String },

    #[error("line {line}: '{name}' is defined twice")]
    Duplicate { line: usize, name: String },

    #[error("line {line}: quantity overflow for '{term}'")]
    Overflow { line: usize, term: String },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}
