mod array_init_helper;
mod call_order;
mod error;
mod koopa_context;
mod koopa_generator;
mod symbol_table;

#[cfg(test)]
mod tests_lowering;

use std::io;

use koopa::back::KoopaGenerator;
use koopa::ir::{Program, Type};

use crate::ast::CompUnit;
use koopa_context::KoopaContext;
use koopa_generator::GenerateKoopa;

pub use error::LowerError;

/// Lowers the syntax tree into an in-memory Koopa IR program.
///
/// Fails on the first semantic error; nothing of the partial program is
/// handed out in that case.
pub fn translate_to_koopa(cu: &CompUnit) -> Result<Program, LowerError> {
    Type::set_ptr_size(4);
    let mut prog = Program::new();
    let mut context = KoopaContext::new(&mut prog);
    cu.generate(&mut context)?;
    Ok(prog)
}

pub fn emit_ir(program: &Program, output: impl io::Write) -> io::Result<()> {
    KoopaGenerator::new(output).generate_on(program)
}

/// Lowers the syntax tree and prints the result as Koopa IR text
pub fn lower_to_ir(cu: &CompUnit) -> Result<String, LowerError> {
    let program = translate_to_koopa(cu)?;
    let mut buf = Vec::new();
    emit_ir(&program, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
