//! Bench file loading and validation.

use crate::error::ConfigError;
use crate::types::{BenchConfig, ScenarioConfig};
use spibench_common::MAX_WORD_BITS;
use spibench_sim::parse_duration;
use std::collections::HashSet;
use std::path::Path;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE: &str = "spibench.toml";

/// Loads and validates `spibench.toml` from a bench directory.
pub fn load_config(bench_dir: &Path) -> Result<BenchConfig, ConfigError> {
    let config_path = bench_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a bench configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<BenchConfig, ConfigError> {
    let config: BenchConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Parses a duration field into femtoseconds.
pub(crate) fn duration_field(field: &str, value: &str) -> Result<u64, ConfigError> {
    parse_duration(value).map_err(|e| ConfigError::ValidationError(format!("{field}: {e}")))
}

/// Checks required fields and value ranges.
pub fn validate_config(config: &BenchConfig) -> Result<(), ConfigError> {
    if config.bench.name.is_empty() {
        return Err(ConfigError::MissingField("bench.name".to_string()));
    }
    let period = duration_field("bench.clock_period", &config.bench.clock_period)?;
    if period < 2 || period % 2 != 0 {
        return Err(ConfigError::ValidationError(format!(
            "bench.clock_period: {period} fs is not a positive even number of femtoseconds"
        )));
    }
    duration_field("bench.gap", &config.bench.gap)?;
    if matches!(&config.bench.waveform, Some(path) if path.is_empty()) {
        return Err(ConfigError::ValidationError(
            "bench.waveform: empty path".to_string(),
        ));
    }

    check_sclk_div("defaults.sclk_div", config.defaults.sclk_div)?;
    check_lengths("defaults.lengths", &config.defaults.lengths)?;

    if config.scenarios.is_empty() {
        return Err(ConfigError::MissingField("scenario".to_string()));
    }
    let mut names = HashSet::new();
    for scenario in &config.scenarios {
        validate_scenario(scenario)?;
        if !names.insert(scenario.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate scenario name '{}'",
                scenario.name
            )));
        }
    }
    Ok(())
}

fn validate_scenario(scenario: &ScenarioConfig) -> Result<(), ConfigError> {
    if scenario.name.is_empty() {
        return Err(ConfigError::MissingField("scenario.name".to_string()));
    }
    let name = &scenario.name;
    let invalid = |msg: String| ConfigError::ValidationError(format!("scenario '{name}': {msg}"));

    if scenario.modes.is_empty() {
        return Err(invalid("modes is empty".to_string()));
    }
    if let Some(mode) = scenario.modes.iter().find(|&&m| m > 3) {
        return Err(invalid(format!("mode {mode} out of range (0..=3)")));
    }
    if scenario.bits.is_empty() {
        return Err(invalid("bits is empty".to_string()));
    }
    if let Some(bits) = scenario
        .bits
        .iter()
        .find(|&&b| b == 0 || b > MAX_WORD_BITS)
    {
        return Err(invalid(format!(
            "word width {bits} out of range (1..={MAX_WORD_BITS})"
        )));
    }
    if scenario.bit_order.is_empty() {
        return Err(invalid("bit_order is empty".to_string()));
    }
    if let Some(div) = scenario.sclk_div {
        check_sclk_div(&format!("scenario '{name}': sclk_div"), div)?;
    }
    if let Some(lengths) = &scenario.lengths {
        check_lengths(&format!("scenario '{name}': lengths"), lengths)?;
    }
    Ok(())
}

fn check_sclk_div(field: &str, div: u32) -> Result<(), ConfigError> {
    if div == 0 {
        return Err(ConfigError::ValidationError(format!(
            "{field} must be at least 1"
        )));
    }
    Ok(())
}

fn check_lengths(field: &str, lengths: &[usize]) -> Result<(), ConfigError> {
    if lengths.is_empty() {
        return Err(ConfigError::ValidationError(format!("{field} is empty")));
    }
    if lengths.contains(&0) {
        return Err(ConfigError::ValidationError(format!(
            "{field} contains a zero length"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PayloadSpec;
    use spibench_bitbang::Topology;
    use spibench_common::BitOrder;

    const MINIMAL: &str = r#"
[bench]
name = "loop"

[[scenario]]
name = "basic"
"#;

    fn with_scenario(body: &str) -> String {
        format!("[bench]\nname = \"b\"\n\n[[scenario]]\nname = \"s\"\n{body}\n")
    }

    #[test]
    fn parse_minimal_config() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.bench.name, "loop");
        assert_eq!(config.bench.clock_period, "4ns");
        assert_eq!(config.bench.gap, "2us");
        assert!(config.bench.waveform.is_none());
        assert_eq!(config.defaults.sclk_div, 4);
        assert_eq!(config.defaults.payload, PayloadSpec::Incrementing);
        assert_eq!(config.defaults.lengths.len(), 16);

        let s = &config.scenarios[0];
        assert_eq!(s.modes, vec![0, 1, 2, 3]);
        assert_eq!(s.bits, vec![8, 16, 32]);
        assert_eq!(s.bit_order, vec![BitOrder::MsbFirst]);
        assert_eq!(s.topology, Topology::Direct);
        assert!(!s.chip_select);
        assert!(s.sclk_div.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[bench]
name = "spi-loopback"
clock_period = "10ns"
gap = "500ns"
waveform = "out/bench.vcd"

[defaults]
sclk_div = 2
payload = { random = 7 }
lengths = [1, 2, 3, 128]

[[scenario]]
name = "all-modes"
modes = [0, 1, 2, 3]
bits = [8, 16, 32]
bit_order = ["msb", "lsb"]
topology = "direct"

[[scenario]]
name = "echo"
modes = [3]
bits = [12]
topology = "echo"
chip_select = true
sclk_div = 1
payload = "incrementing"
lengths = [5]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.bench.waveform.as_deref(), Some("out/bench.vcd"));
        assert_eq!(config.defaults.payload, PayloadSpec::Random(7));
        assert_eq!(config.defaults.lengths, vec![1, 2, 3, 128]);
        assert_eq!(config.scenarios.len(), 2);
        assert_eq!(
            config.scenarios[0].bit_order,
            vec![BitOrder::MsbFirst, BitOrder::LsbFirst]
        );
        let echo = &config.scenarios[1];
        assert_eq!(echo.topology, Topology::Echo);
        assert!(echo.chip_select);
        assert_eq!(echo.sclk_div, Some(1));
        assert_eq!(echo.payload, Some(PayloadSpec::Incrementing));
        assert_eq!(echo.lengths.as_deref(), Some(&[5][..]));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn unknown_topology_is_parse_error() {
        let err = load_config_from_str(&with_scenario("topology = \"ring\"")).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn missing_name_errors() {
        let err = load_config_from_str("[bench]\nname = \"\"\n[[scenario]]\nname = \"s\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "bench.name"));
    }

    #[test]
    fn missing_scenarios_errors() {
        let err = load_config_from_str("[bench]\nname = \"b\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "scenario"));
    }

    #[test]
    fn bad_durations_error() {
        let toml = "[bench]\nname = \"b\"\nclock_period = \"4 parsecs\"\n[[scenario]]\nname = \"s\"\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(err.to_string().contains("bench.clock_period"), "{err}");

        let toml = "[bench]\nname = \"b\"\nclock_period = \"3fs\"\n[[scenario]]\nname = \"s\"\n";
        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::ValidationError(_))
        ));

        let toml = "[bench]\nname = \"b\"\ngap = \"soon\"\n[[scenario]]\nname = \"s\"\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(err.to_string().contains("bench.gap"), "{err}");
    }

    #[test]
    fn out_of_range_values_error() {
        for (body, needle) in [
            ("modes = [0, 4]", "mode 4"),
            ("modes = []", "modes is empty"),
            ("bits = [0]", "word width 0"),
            ("bits = [65]", "word width 65"),
            ("bit_order = []", "bit_order is empty"),
            ("sclk_div = 0", "sclk_div"),
            ("lengths = []", "lengths is empty"),
            ("lengths = [3, 0]", "zero length"),
        ] {
            let err = load_config_from_str(&with_scenario(body)).unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError(_)), "{body}");
            assert!(err.to_string().contains(needle), "{body}: {err}");
        }
    }

    #[test]
    fn defaults_are_validated() {
        let toml = "[bench]\nname = \"b\"\n[defaults]\nsclk_div = 0\n[[scenario]]\nname = \"s\"\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(err.to_string().contains("defaults.sclk_div"), "{err}");
    }

    #[test]
    fn duplicate_scenario_names_error() {
        let toml = "[bench]\nname = \"b\"\n[[scenario]]\nname = \"s\"\n[[scenario]]\nname = \"s\"\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate"), "{err}");
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), MINIMAL).unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.bench.name, "loop");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
