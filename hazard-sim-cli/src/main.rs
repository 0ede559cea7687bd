use clap::Parser;
use hazard_sim_core::board::{Board, BoardError, Config};
use hazard_sim_core::unit;
use log::{debug, info};
use std::io::{self, Write};
use std::num::ParseIntError;
use std::path::PathBuf;
use thiserror::Error;

/// Instruction-level simulator for Hazard3 test binaries.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Flat binary file loaded to the start of RAM.
    #[arg(long)]
    bin: Option<PathBuf>,
    /// Ignored, accepted for compatibility with the RTL testbench.
    #[arg(long, hide = true)]
    vcd: Option<String>,
    /// Print memory contents between START and END (exclusive) after execution finishes. Can be
    /// passed multiple times.
    #[arg(
        long,
        num_args = 2,
        value_names = ["START", "END"],
        value_parser = parse_c_u32,
        action = clap::ArgAction::Append,
    )]
    dump: Vec<u32>,
    /// Maximum number of cycles to run before exiting.
    #[arg(long, default_value = "100000", value_parser = parse_c_u64)]
    cycles: u64,
    /// Memory size in units of 1024 bytes.
    #[arg(long, default_value = "16384", value_parser = parse_c_u32)]
    memsize: u32,
    /// Print out execution tracing info.
    #[arg(long)]
    trace: bool,
    /// Exit with the code written to IO_EXIT by the guest, or -1 if it timed out.
    #[arg(long)]
    cpuret: bool,
    /// Number of harts sharing the memory.
    #[arg(long, default_value = "1", value_parser = parse_c_u32)]
    harts: u32,
    /// Increase log verbosity, can be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("failed to initialize logging: {0}")]
    Logger(#[from] log::SetLoggerError),
    #[error("failed to read {path:?}: {source}")]
    ReadBinary { path: PathBuf, source: io::Error },
    #[error("memory size of {0} KiB is too large")]
    MemSize(u32),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn main() {
    let args = Args::parse();
    let code = match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            -1
        }
    };
    std::process::exit(code);
}

/// Run the simulation, returning the process exit code.
fn run(args: Args) -> Result<i32, CliError> {
    stderrlog::new()
        .verbosity(args.verbose as usize + 1)
        .modules([module_path!(), "hazard_sim_core"])
        .init()?;

    let ram_size = args
        .memsize
        .checked_mul(unit::KIB)
        .ok_or(CliError::MemSize(args.memsize))?;
    let mut board = Board::new(
        Config {
            ram_size,
            harts: args.harts,
            ..Config::default()
        },
        io::stdout(),
        args.trace,
    )?;

    if let Some(path) = args.bin {
        let image = std::fs::read(&path).map_err(|source| CliError::ReadBinary {
            path: path.clone(),
            source,
        })?;
        board.load_binary(&image)?;
        debug!("Loaded {path:?}");
    }

    let mut stdout = io::stdout();
    let mut rc = if args.cpuret { -1 } else { 0 };
    for cycle in 0..args.cycles {
        let steps = board.step();
        if args.trace {
            for step in &steps {
                write!(stdout, "{step}")?;
            }
        }
        if let Some(exit_code) = board.exit_code() {
            info!("Halted after {} cycles", cycle + 1);
            writeln!(stdout, "CPU requested halt. Exit code {}", exit_code as i32)?;
            writeln!(stdout, "Ran for {} cycles", cycle + 1)?;
            rc = if args.cpuret { exit_code as i32 } else { 0 };
            break;
        }
    }

    for range in args.dump.chunks_exact(2) {
        board.dump(&mut stdout, range[0], range[1])?;
    }
    stdout.flush()?;

    Ok(rc)
}

/// Parse an integer the way `strtoul` does with base 0: `0x` selects hexadecimal, a leading `0`
/// octal, anything else decimal.
fn parse_c_u64(s: &str) -> Result<u64, ParseIntError> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if let Some(octal) = s.strip_prefix('0').filter(|rest| !rest.is_empty()) {
        u64::from_str_radix(octal, 8)
    } else {
        s.parse()
    }
}

fn parse_c_u32(s: &str) -> Result<u32, String> {
    let value = parse_c_u64(s).map_err(|err| err.to_string())?;
    u32::try_from(value).map_err(|_| format!("{s} does not fit in 32 bits"))
}
