use std::io;

use thiserror::Error;

/// An error raised while lowering the syntax tree to Koopa IR.
///
/// Lowering stops at the first error; no IR text is produced afterwards.
#[derive(Error, Debug)]
pub enum LowerError {
    /// A name was declared twice in the same scope.
    #[error("redeclaration of `{0}`")]
    Redeclaration(String),

    /// A name was used without a visible declaration.
    #[error("undefined symbol `{0}`")]
    UndefinedSymbol(String),

    /// A construct was used with the wrong kind or type of operand,
    /// e.g. assigning to a constant or calling a variable.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// `break` or `continue` outside of a loop.
    #[error("`{0}` statement not within a loop")]
    ControlFlow(&'static str),

    /// Any other malformed construct, such as a non-constant array dimension.
    #[error("{0}")]
    Malformed(String),

    #[error("failed to print Koopa IR: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, LowerError>;
