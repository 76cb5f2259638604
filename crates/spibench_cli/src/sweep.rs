//! `spibench sweep`: every scenario expansion in the bench file.
//!
//! Loads `spibench.toml`, expands its scenarios, optionally filters them by
//! label, then runs each one. A scenario that fails to run is reported and
//! counted as a failure; the sweep continues with the next one.

use log::error;
use spibench_bitbang::Scenario;
use spibench_config::{resolve_bench, waveform_path};

use crate::pipeline::{execute, print_reports, resolve_bench_root};
use crate::{GlobalArgs, ReportFormat, SweepArgs};

/// Runs the `spibench sweep` command.
///
/// Returns exit code 0 if every scenario passed, 1 if any failed or errored.
pub fn run(args: &SweepArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let bench_dir = resolve_bench_root(global)?;
    let config = spibench_config::load_config(&bench_dir)?;
    let bench = resolve_bench(&config)?;

    let scenarios = filter_scenarios(&bench.scenarios, args.filter.as_deref());
    if scenarios.is_empty() {
        if !global.quiet {
            eprintln!("warning: no scenarios match the given filter");
        }
        return Ok(0);
    }
    if !global.quiet {
        eprintln!(
            "   Sweeping {}: {} scenario(s)",
            bench.name,
            scenarios.len()
        );
    }

    let waveform = if args.no_waveform {
        None
    } else {
        bench.waveform.as_ref().map(|p| bench_dir.join(p))
    };

    let mut reports = Vec::new();
    let mut errored = 0;
    for (index, scenario) in scenarios.iter().enumerate() {
        let path = waveform
            .as_deref()
            .map(|base| waveform_path(base, index, scenarios.len()));
        match execute(scenario, path.as_deref()) {
            Ok(report) => {
                if !global.quiet && args.format == ReportFormat::Text {
                    print_reports(std::slice::from_ref(&report), args.format);
                }
                reports.push(report);
            }
            Err(e) => {
                error!("{}: {e}", scenario.label());
                errored += 1;
            }
        }
    }

    if args.format == ReportFormat::Json {
        print_reports(&reports, args.format);
    }

    let passed = reports.iter().filter(|r| r.passed()).count();
    let failed = scenarios.len() - passed;
    if !global.quiet {
        eprintln!();
        eprintln!(
            "   Result: {passed} passed, {failed} failed ({errored} errored) out of {} scenario(s)",
            scenarios.len()
        );
    }

    Ok(if failed > 0 { 1 } else { 0 })
}

/// Keeps scenarios whose label contains `filter`; all of them without one.
fn filter_scenarios(scenarios: &[Scenario], filter: Option<&str>) -> Vec<Scenario> {
    scenarios
        .iter()
        .filter(|s| filter.map_or(true, |f| s.label().contains(f)))
        .cloned()
        .collect()
}
