use lalrpop_util::lalrpop_mod;

pub mod ast;
pub mod backend;
pub mod error;
pub mod frontend;


lalrpop_mod!(#[allow(clippy::all)] pub sysy);

pub use error::Error;

/// What the compiler writes out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Koopa IR text
    Koopa,
    /// RV32IM assembly
    Riscv,
}

pub fn parse(source: &str) -> Result<ast::CompUnit, Error> {
    sysy::CompUnitParser::new()
        .parse(source)
        .map_err(|err| Error::Parse(err.to_string()))
}

/// Compiles SysY source text into Koopa IR or RISC-V assembly.
///
/// The assembly is generated from the printed IR re-read by the Koopa
/// parser, not from the in-memory program of the lowering stage.
pub fn compile(source: &str, mode: Mode) -> Result<String, Error> {
    let ast = parse(source)?;
    let ir = frontend::lower_to_ir(&ast)?;
    match mode {
        Mode::Koopa => Ok(ir),
        Mode::Riscv => {
            let program = backend::parse_ir(&ir)?;
            Ok(backend::generate_assembly(&program)?)
        }
    }
}
