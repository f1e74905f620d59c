use std::io;

use thiserror::Error;

use crate::backend::CodegenError;
use crate::frontend::LowerError;

/// Any error that aborts a compilation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("syntax error: {0}")]
    Parse(String),

    #[error(transparent)]
    Lower(#[from] LowerError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Io(#[from] io::Error),
}
