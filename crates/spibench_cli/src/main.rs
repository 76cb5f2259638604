//! spibench: the command-line front end for the SPI bit-banging bench.
//!
//! Provides `spibench run` for a single scenario given on the command line,
//! `spibench sweep` for every scenario in a `spibench.toml` bench file, and
//! `spibench modes` to print the SPI mode table.

#![warn(missing_docs)]

mod modes;
mod pipeline;
mod run;
mod sweep;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use simple_logger::SimpleLogger;

/// spibench: SPI source/sink emulators on a simulated clock.
#[derive(Parser, Debug)]
#[command(name = "spibench", version, about = "SPI bit-banging bench")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `spibench.toml` file or the directory holding it.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one scenario described on the command line.
    Run(RunArgs),
    /// Run every scenario in the bench file.
    Sweep(SweepArgs),
    /// Print the SPI mode table.
    Modes,
}

/// Arguments for the `spibench run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// SPI mode (0-3).
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub mode: u8,

    /// Word width in bits (1-64).
    #[arg(short, long, default_value_t = 8, value_parser = clap::value_parser!(u32).range(1..=64))]
    pub bits: u32,

    /// Shift the least significant bit first.
    #[arg(long)]
    pub lsb_first: bool,

    /// System clock cycles per half serial clock period.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    pub sclk_div: u32,

    /// System clock period (e.g., "4ns", "10ns").
    #[arg(long, default_value = "4ns")]
    pub clock_period: String,

    /// Route the data through a loopback peer that echoes the previous word.
    #[arg(long)]
    pub echo: bool,

    /// Frame each burst with an active-low chip select.
    #[arg(long)]
    pub chip_select: bool,

    /// Payload length in words; repeatable. Defaults to 1-15 and 128.
    #[arg(short, long = "length")]
    pub lengths: Vec<usize>,

    /// Use seeded random payloads instead of incrementing words.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write a VCD waveform to this path.
    #[arg(long)]
    pub vcd: Option<PathBuf>,

    /// Output format for the report.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `spibench sweep` subcommand.
#[derive(Parser, Debug)]
pub struct SweepArgs {
    /// Substring filter for scenario labels.
    #[arg(long)]
    pub filter: Option<String>,

    /// Disable waveform recording even if the bench file requests it.
    #[arg(long)]
    pub no_waveform: bool,

    /// Output format for the reports.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom bench file.
    pub config: Option<String>,
}

impl GlobalArgs {
    /// The log level selected by `--quiet` / `--verbose`.
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    let _ = SimpleLogger::new().with_level(global.log_level()).init();

    let result = match cli.command {
        Command::Run(ref args) => run::run(args, &global),
        Command::Sweep(ref args) => sweep::run(args, &global),
        Command::Modes => modes::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
