//! Integration tests for complete scenarios: wiring, payload sweeps,
//! reports and waveform output.

use std::fs::{self, File};
use std::io::BufWriter;

use spibench_bitbang::{run_scenario, Payload, Scenario, Topology};
use spibench_common::{BitOrder, SpiMode};
use spibench_sim::{VcdRecorder, FS_PER_NS};

// ---------------------------------------------------------------------------
// Helper: short scenarios
// ---------------------------------------------------------------------------

fn quick(topology: Topology) -> Scenario {
    Scenario {
        name: "quick".into(),
        sclk_div: 1,
        topology,
        lengths: vec![1, 2, 5],
        gap_fs: 50 * FS_PER_NS,
        ..Default::default()
    }
}

// ===========================================================================
// Topologies
// ===========================================================================

#[test]
fn direct_matrix_passes() {
    let base = quick(Topology::Direct);
    let all = Scenario::matrix(
        &base,
        &SpiMode::ALL,
        &[8, 16],
        &[BitOrder::MsbFirst, BitOrder::LsbFirst],
    );
    for scenario in &all {
        let report = run_scenario(scenario, None).unwrap();
        assert!(report.passed(), "{report:?}");
        assert_eq!(report.words_compared(), 8, "{}", report.label);
        assert!(report.outcomes.iter().all(|o| o.words_received == o.length));
    }
}

#[test]
fn echo_matrix_passes() {
    let base = quick(Topology::Echo);
    let all = Scenario::matrix(&base, &SpiMode::ALL, &[8, 12], &[BitOrder::MsbFirst]);
    for scenario in &all {
        let report = run_scenario(scenario, None).unwrap();
        assert!(report.passed(), "{report:?}");
        // The first word of every payload only flushes the previous one
        assert_eq!(report.words_compared(), 5, "{}", report.label);
    }
}

#[test]
fn chip_select_in_both_topologies() {
    for topology in [Topology::Direct, Topology::Echo] {
        for mode in SpiMode::ALL {
            let scenario = Scenario {
                mode,
                chip_select: true,
                ..quick(topology)
            };
            let report = run_scenario(&scenario, None).unwrap();
            assert!(report.passed(), "{report:?}");
        }
    }
}

#[test]
fn random_payload_full_width() {
    let scenario = Scenario {
        bits: 64,
        payload: Payload::Random { seed: 42 },
        lengths: vec![3, 7],
        ..quick(Topology::Direct)
    };
    let report = run_scenario(&scenario, None).unwrap();
    assert!(report.passed(), "{report:?}");
    assert_eq!(report.words_compared(), 10);
}

#[test]
fn outcomes_advance_in_time() {
    let scenario = Scenario {
        lengths: vec![4, 4, 4],
        ..quick(Topology::Direct)
    };
    let report = run_scenario(&scenario, None).unwrap();
    for pair in report.outcomes.windows(2) {
        assert!(pair[0].start_fs < pair[0].end_fs);
        assert!(pair[1].start_fs >= pair[0].end_fs + scenario.gap_fs);
    }
    assert!(report.total_deltas > 0);
}

#[test]
fn report_json_shape() {
    let report = run_scenario(&quick(Topology::Echo), None).unwrap();
    let value: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["label"], "quick [mode 0, 8 bits, msb-first, echo]");
    assert_eq!(value["outcomes"].as_array().unwrap().len(), 3);
    assert_eq!(value["outcomes"][2]["length"], 5);
    assert!(value["outcomes"][2]["mismatches"].as_array().unwrap().is_empty());
}

// ===========================================================================
// Waveforms
// ===========================================================================

#[test]
fn vcd_written_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quick.vcd");
    let file = File::create(&path).unwrap();
    let recorder = VcdRecorder::new(BufWriter::new(file));

    let scenario = Scenario {
        chip_select: true,
        ..quick(Topology::Echo)
    };
    let report = run_scenario(&scenario, Some(Box::new(recorder))).unwrap();
    assert!(report.passed());

    let vcd = fs::read_to_string(&path).unwrap();
    assert!(vcd.contains("$timescale"));
    assert!(vcd.contains("$scope module bench $end"));
    for name in ["clk", "sclk", "mosi", "miso", "cs_n"] {
        assert!(vcd.contains(&format!(" {name} $end")), "missing {name}");
    }
    assert!(vcd.contains("$enddefinitions $end"));
    assert!(vcd.lines().filter(|l| l.starts_with('#')).count() > 10);
}
