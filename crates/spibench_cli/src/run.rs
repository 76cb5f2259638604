//! `spibench run`: one scenario described by command-line flags.

use spibench_bitbang::{standard_lengths, Payload, Scenario, Topology};
use spibench_common::{BitOrder, SpiMode};
use spibench_sim::parse_duration;

use crate::pipeline::{execute, print_reports};
use crate::{GlobalArgs, RunArgs};

/// Runs the `spibench run` command.
///
/// Returns exit code 0 if every payload came back intact, 1 otherwise.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let scenario = build_scenario(args)?;
    if !global.quiet {
        eprintln!("   Running {}", scenario.label());
    }

    let report = execute(&scenario, args.vcd.as_deref())?;
    if !global.quiet {
        print_reports(std::slice::from_ref(&report), args.format);
        if let Some(ref path) = args.vcd {
            eprintln!("   Waveform written to {}", path.display());
        }
    }

    Ok(if report.passed() { 0 } else { 1 })
}

/// Translates command-line flags into a scenario.
fn build_scenario(args: &RunArgs) -> Result<Scenario, Box<dyn std::error::Error>> {
    let clock_period_fs = parse_duration(&args.clock_period)?;
    let lengths = if args.lengths.is_empty() {
        standard_lengths()
    } else {
        args.lengths.clone()
    };
    Ok(Scenario {
        name: "run".to_string(),
        mode: SpiMode::from_number(args.mode)?,
        bits: args.bits,
        bit_order: if args.lsb_first {
            BitOrder::LsbFirst
        } else {
            BitOrder::MsbFirst
        },
        sclk_div: args.sclk_div,
        clock_period_fs,
        topology: if args.echo {
            Topology::Echo
        } else {
            Topology::Direct
        },
        payload: args
            .seed
            .map_or(Payload::Incrementing, |seed| Payload::Random { seed }),
        lengths,
        chip_select: args.chip_select,
        ..Default::default()
    })
}
