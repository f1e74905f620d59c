mod asm_writer;
mod error;
mod riscv_generator;
mod stack_frame;

#[cfg(test)]
mod tests_codegen;

use std::io;

use koopa::front::Driver;
use koopa::ir::{Program, Type};
use riscv_generator::RiscvGenerator;

pub use error::CodegenError;
use error::Result;

/// Re-reads Koopa IR text into the structural view the generator walks
pub fn parse_ir(text: &str) -> Result<Program> {
    Type::set_ptr_size(4);
    Driver::from(text.to_string())
        .generate_program()
        .map_err(|err| {
            // The parser reports positions on stderr only
            CodegenError::IrParse(format!(
                "{:?} error in IR defining [{}], see stderr for the location",
                err,
                defined_functions(text).join(", ")
            ))
        })
}

/// Names of the functions defined in Koopa IR text, in order
fn defined_functions(text: &str) -> Vec<&str> {
    text.lines()
        .filter_map(|line| line.trim_start().strip_prefix("fun "))
        .filter_map(|rest| rest.split('(').next())
        .map(str::trim)
        .collect()
}

pub fn emit_riscv(program: &Program, writer: impl io::Write) -> Result<()> {
    Type::set_ptr_size(4);
    let mut generator = RiscvGenerator::new(program, writer);
    generator.generate_program()
}

/// Generates the whole assembly file for `program` in memory, so that
/// nothing is written out when generation fails halfway
pub fn generate_assembly(program: &Program) -> Result<String> {
    let mut buf = Vec::new();
    emit_riscv(program, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
