use clap::Parser;
use log::{error, info};
use std::fs;
use std::path::PathBuf;
use std::process::exit;
use sysyc::{Error, Mode, compile};

/// SysY compiler targeting Koopa IR and RISC-V
#[derive(Parser, Debug)]
#[command(name = "sysyc", version)]
struct Cli {
    /// Output kind: -koopa, -riscv or -perf
    #[arg(allow_hyphen_values = true, value_parser = parse_mode)]
    mode: Mode,

    /// SysY source file
    input: PathBuf,

    /// File to write the IR or assembly to
    #[arg(short, long)]
    output: PathBuf,
}

fn parse_mode(flag: &str) -> Result<Mode, String> {
    match flag {
        "-koopa" => Ok(Mode::Koopa),
        // No optimizations yet, so -perf emits the same assembly
        "-riscv" | "-perf" => Ok(Mode::Riscv),
        _ => Err(format!("unknown mode `{}`", flag)),
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    let source = fs::read_to_string(&cli.input)?;
    info!("compiling {} in {:?} mode", cli.input.display(), cli.mode);
    let output = compile(&source, cli.mode)?;
    fs::write(&cli.output, output)?;
    info!("wrote {}", cli.output.display());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        error!("{}", err);
        exit(1);
    }
}
