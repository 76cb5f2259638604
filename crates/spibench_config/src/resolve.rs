//! Scenario resolution: applying bench defaults and expanding each
//! `[[scenario]]` entry over its modes, widths and bit orders.

use crate::error::ConfigError;
use crate::loader::duration_field;
use crate::types::BenchConfig;
use spibench_bitbang::Scenario;
use spibench_common::SpiMode;
use std::path::{Path, PathBuf};

/// A bench file turned into runnable scenarios.
#[derive(Debug)]
pub struct ResolvedBench {
    /// The bench name.
    pub name: String,
    /// Every scenario expansion, in file order.
    pub scenarios: Vec<Scenario>,
    /// VCD output path, if requested.
    pub waveform: Option<PathBuf>,
}

/// Expands every scenario entry of a validated configuration.
///
/// Per-scenario `sclk_div`, `payload` and `lengths` override the
/// `[defaults]` table; clock period and gap come from `[bench]`.
pub fn resolve_bench(config: &BenchConfig) -> Result<ResolvedBench, ConfigError> {
    let clock_period_fs = duration_field("bench.clock_period", &config.bench.clock_period)?;
    let gap_fs = duration_field("bench.gap", &config.bench.gap)?;

    let mut scenarios = Vec::new();
    for entry in &config.scenarios {
        let modes = entry
            .modes
            .iter()
            .map(|&n| SpiMode::from_number(n))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::ValidationError(format!("scenario '{}': {e}", entry.name)))?;
        let base = Scenario {
            name: entry.name.clone(),
            sclk_div: entry.sclk_div.unwrap_or(config.defaults.sclk_div),
            clock_period_fs,
            topology: entry.topology,
            payload: entry.payload.unwrap_or(config.defaults.payload).into(),
            lengths: entry
                .lengths
                .clone()
                .unwrap_or_else(|| config.defaults.lengths.clone()),
            gap_fs,
            chip_select: entry.chip_select,
            ..Default::default()
        };
        scenarios.extend(Scenario::matrix(&base, &modes, &entry.bits, &entry.bit_order));
    }

    Ok(ResolvedBench {
        name: config.bench.name.clone(),
        scenarios,
        waveform: config.bench.waveform.as_ref().map(PathBuf::from),
    })
}

/// The waveform file for scenario `index` of `total`.
///
/// A single scenario writes to `base` itself; otherwise the index is
/// appended to the file stem (`bench.vcd` becomes `bench-3.vcd`).
pub fn waveform_path(base: &Path, index: usize, total: usize) -> PathBuf {
    if total <= 1 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}-{index}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{index}"),
    };
    base.with_file_name(name)
}
