//! `spibench modes`: print the SPI mode table.

use spibench_common::SpiMode;

use crate::GlobalArgs;

/// Runs the `spibench modes` command.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    if !global.quiet {
        print!("{}", render_table());
    }
    Ok(0)
}

/// One row per mode: polarity, phase, idle level and the two edges.
fn render_table() -> String {
    let mut out = format!(
        "{:<6} {:>4} {:>4} {:>4}  {:<8} {:<8} {}\n",
        "mode", "cpol", "cpha", "idle", "sample", "shift", "leading"
    );
    for mode in SpiMode::ALL {
        let leading = if mode.has_leading_shift() {
            "shift"
        } else {
            "sample"
        };
        out.push_str(&format!(
            "{:<6} {:>4} {:>4} {:>4}  {:<8} {:<8} {leading}\n",
            mode.number(),
            u8::from(mode.cpol),
            u8::from(mode.cpha),
            mode.idle_level().to_string(),
            mode.sample_edge().to_string(),
            mode.shift_edge().to_string(),
        ));
    }
    out
}
