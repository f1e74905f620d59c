use std::io;

use thiserror::Error;

/// An error raised while turning Koopa IR into RISC-V assembly.
///
/// These are structural violations of the IR and are not recoverable.
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("failed to parse Koopa IR: {0}")]
    IrParse(String),

    #[error("basic block `{0}` does not end with a terminator")]
    UnterminatedBlock(String),

    #[error("value referenced in `{0}` has no storage")]
    DanglingValue(String),

    #[error("unsupported IR construct: {0}")]
    Unsupported(String),

    #[error("failed to write assembly: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, CodegenError>;
