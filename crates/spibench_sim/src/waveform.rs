//! Waveform dumps of the bench signals.
//!
//! The kernel reports every value change to a [`WaveformRecorder`]. [`VcdRecorder`]
//! writes the IEEE 1364 Value Change Dump (VCD) format, viewable in GTKWave
//! or Surfer.

use std::collections::HashMap;
use std::io::Write;

use spibench_common::Logic;

use crate::error::SimError;
use crate::signal::SignalId;

/// Sink for signal value changes, in simulation order.
pub trait WaveformRecorder {
    /// Declares a signal; only declared signals are dumped.
    fn register_signal(&mut self, id: SignalId, name: &str) -> Result<(), SimError>;

    /// Starts a named scope for the declarations that follow.
    fn begin_scope(&mut self, name: &str) -> Result<(), SimError>;

    /// Ends the innermost scope.
    fn end_scope(&mut self) -> Result<(), SimError>;

    /// Dumps `value` for `id` at `time_fs`. Times never decrease.
    fn record_change(&mut self, time_fs: u64, id: SignalId, value: Logic) -> Result<(), SimError>;

    /// Completes the output and flushes the writer.
    fn finalize(&mut self) -> Result<(), SimError>;
}

/// VCD recorder.
///
/// Identifier codes are printable ASCII starting at `!`; changes for
/// signals that were never registered are ignored. Values at the first
/// recorded timestamp form the `$dumpvars` block.
pub struct VcdRecorder<W: Write> {
    writer: W,
    id_codes: HashMap<SignalId, String>,
    next_id: u32,
    header_written: bool,
    current_time: Option<u64>,
    dumpvars_open: bool,
}

impl<W: Write> VcdRecorder<W> {
    /// Creates a recorder writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            id_codes: HashMap::new(),
            next_id: 0,
            header_written: false,
            current_time: None,
            dumpvars_open: false,
        }
    }

    /// Consumes the recorder and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> Result<(), SimError> {
        if self.header_written {
            return Ok(());
        }
        writeln!(self.writer, "$version spibench {} $end", env!("CARGO_PKG_VERSION"))?;
        writeln!(self.writer, "$timescale 1fs $end")?;
        self.header_written = true;
        Ok(())
    }

    fn close_dumpvars(&mut self) -> Result<(), SimError> {
        if self.dumpvars_open {
            writeln!(self.writer, "$end")?;
            self.dumpvars_open = false;
        }
        Ok(())
    }

    /// Base-94 identifier code over the printable ASCII range.
    fn make_id_code(index: u32) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            let c = (b'!' + (idx % 94) as u8) as char;
            result.push(c);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }
}

impl<W: Write> WaveformRecorder for VcdRecorder<W> {
    fn register_signal(&mut self, id: SignalId, name: &str) -> Result<(), SimError> {
        self.write_header()?;
        let id_code = Self::make_id_code(self.next_id);
        self.next_id += 1;
        writeln!(self.writer, "$var wire 1 {id_code} {name} $end")?;
        self.id_codes.insert(id, id_code);
        Ok(())
    }

    fn begin_scope(&mut self, name: &str) -> Result<(), SimError> {
        self.write_header()?;
        writeln!(self.writer, "$scope module {name} $end")?;
        Ok(())
    }

    fn end_scope(&mut self) -> Result<(), SimError> {
        writeln!(self.writer, "$upscope $end")?;
        Ok(())
    }

    fn record_change(&mut self, time_fs: u64, id: SignalId, value: Logic) -> Result<(), SimError> {
        let Some(id_code) = self.id_codes.get(&id).cloned() else {
            return Ok(());
        };
        self.write_header()?;
        if self.current_time != Some(time_fs) {
            if self.current_time.is_none() {
                writeln!(self.writer, "$enddefinitions $end")?;
                writeln!(self.writer, "#{time_fs}")?;
                writeln!(self.writer, "$dumpvars")?;
                self.dumpvars_open = true;
            } else {
                self.close_dumpvars()?;
                writeln!(self.writer, "#{time_fs}")?;
            }
            self.current_time = Some(time_fs);
        }
        writeln!(self.writer, "{}{id_code}", value.vcd_char())?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SimError> {
        if self.current_time.is_none() {
            self.write_header()?;
            writeln!(self.writer, "$enddefinitions $end")?;
        }
        self.close_dumpvars()?;
        self.writer.flush()?;
        Ok(())
    }
}
