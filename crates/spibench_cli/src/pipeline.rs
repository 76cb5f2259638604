//! Shared helpers for CLI commands.
//!
//! Bench root resolution, waveform recorder setup and report rendering.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use spibench_bitbang::{run_scenario, Scenario, ScenarioReport};
use spibench_config::CONFIG_FILE;
use spibench_sim::{SimTime, VcdRecorder, WaveformRecorder};

use crate::{GlobalArgs, ReportFormat};

/// Walks up from `start` looking for the nearest directory containing `spibench.toml`.
pub fn find_bench_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the bench directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory.
pub fn resolve_bench_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        find_bench_root(&std::env::current_dir()?)
    }
}

/// Opens a VCD recorder writing to `path`, creating parent directories.
pub fn open_recorder(path: &Path) -> Result<Box<dyn WaveformRecorder>, Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    Ok(Box::new(VcdRecorder::new(BufWriter::new(file))))
}

/// Runs one scenario, recording to `waveform` when given.
pub fn execute(
    scenario: &Scenario,
    waveform: Option<&Path>,
) -> Result<ScenarioReport, Box<dyn std::error::Error>> {
    let recorder = waveform.map(open_recorder).transpose()?;
    Ok(run_scenario(scenario, recorder)?)
}

/// Renders a report as indented text, one line per payload length.
pub fn render_text(report: &ScenarioReport) -> String {
    let status = if report.passed() { "ok" } else { "FAILED" };
    let mut out = format!(
        "{} ... {status} ({} words, {} mismatches, {})\n",
        report.label,
        report.words_compared(),
        report.mismatch_count(),
        SimTime::from_fs(report.final_time_fs)
    );
    for outcome in &report.outcomes {
        let status = if outcome.passed() { "ok" } else { "FAILED" };
        out.push_str(&format!(
            "    length {:>4}: {status} ({}/{} words received)\n",
            outcome.length, outcome.words_received, outcome.length
        ));
        for m in &outcome.mismatches {
            let actual = m
                .actual
                .map_or("nothing".to_string(), |w| format!("0x{w:x}"));
            out.push_str(&format!(
                "        word {}: expected 0x{:x}, got {actual}\n",
                m.index, m.expected
            ));
        }
    }
    out
}

/// Prints reports to stdout in the selected format.
pub fn print_reports(reports: &[ScenarioReport], format: ReportFormat) {
    match format {
        ReportFormat::Text => {
            for report in reports {
                print!("{}", render_text(report));
            }
        }
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(reports).unwrap_or_else(|_| "[]".to_string());
            println!("{json}");
        }
    }
}
