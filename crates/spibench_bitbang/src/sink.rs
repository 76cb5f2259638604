//! The serial sink: samples a data line on serial clock edges and collects
//! the received words.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, info, warn};
use spibench_common::pack_words;
use spibench_sim::{Process, ProcessContext, SimError, SimKernel, Trigger};

use crate::config::{SinkConfig, SinkPins};
use crate::error::BitbangError;

struct SinkCore {
    name: String,
    pins: SinkPins,
    config: SinkConfig,
    queue: VecDeque<u64>,
    /// Word being assembled.
    shift: u64,
    /// Bits sampled into `shift` so far.
    bit_count: u32,
    words_received: u64,
}

impl SinkCore {
    fn reset_word(&mut self) {
        self.shift = 0;
        self.bit_count = 0;
    }

    fn sample(&mut self, ctx: &ProcessContext<'_>) -> Result<(), SimError> {
        let value = ctx.value(self.pins.din)?;
        let Some(bit) = value.to_bool() else {
            let time_fs = ctx.now().fs;
            return Err(SimError::ProcessFailed {
                process: self.name.clone(),
                time_fs,
                reason: BitbangError::UnknownDataBit { value, time_fs }.to_string(),
            });
        };
        if bit {
            let index = self.config.bit_order.bit_index(self.bit_count, self.config.bits);
            self.shift |= 1 << index;
        }
        self.bit_count += 1;

        if self.bit_count == self.config.bits {
            let word = self.shift;
            let digits = self.config.bits.div_ceil(4) as usize;
            info!("{}: Read word 0x{word:0digits$x}", self.name);
            self.queue.push_back(word);
            self.words_received += 1;
            self.reset_word();
        }
        Ok(())
    }
}

impl Process for SinkCore {
    fn name(&self) -> &str {
        &self.name
    }

    fn react(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), SimError> {
        let selected = match self.pins.cs {
            Some(cs) => cs.is_selected(ctx.value(cs.signal)?),
            None => true,
        };

        // Edges out of X/Z are initialisation, not clocking
        let sample_edge = ctx.edge(self.pins.sclk) == Some(self.config.mode.sample_edge())
            && ctx.previous(self.pins.sclk)?.is_known();
        if sample_edge && selected {
            self.sample(ctx)?;
        }

        if let Some(cs) = self.pins.cs {
            if ctx.changed(cs.signal) && !selected && self.bit_count > 0 {
                warn!(
                    "{}: deselected after {} of {} bits, word discarded",
                    self.name, self.bit_count, self.config.bits
                );
                self.reset_word();
            }
        }
        Ok(())
    }
}

/// Emulates the receiving side of a serial link.
///
/// Handles are cheap clones that share one emulator instance.
#[derive(Clone)]
pub struct BufferSink {
    core: Rc<RefCell<SinkCore>>,
}

impl BufferSink {
    /// Binds a new sink to `pins` and registers it with the kernel.
    pub fn attach(
        kernel: &mut SimKernel,
        name: impl Into<String>,
        pins: SinkPins,
        config: SinkConfig,
    ) -> Result<Self, BitbangError> {
        config.validate()?;
        let name = name.into();
        let core = Rc::new(RefCell::new(SinkCore {
            name: name.clone(),
            pins,
            config,
            queue: VecDeque::new(),
            shift: 0,
            bit_count: 0,
            words_received: 0,
        }));
        let mut triggers = vec![Trigger::any(pins.sclk)];
        if let Some(cs) = pins.cs {
            triggers.push(Trigger::any(cs.signal));
        }
        kernel.add_process(core.clone(), triggers)?;
        debug!(
            "{name}: attached ({}, {} bits, {}, sampling on {} edges)",
            config.mode,
            config.bits,
            config.bit_order,
            config.mode.sample_edge()
        );
        Ok(Self { core })
    }

    /// The active configuration.
    pub fn config(&self) -> SinkConfig {
        self.core.borrow().config
    }

    /// Waits for data, then drains up to `count` words (all when `None`).
    ///
    /// Returns an empty vector if nothing arrives before the timeout. Without
    /// a timeout this waits for as long as the simulation has events.
    pub fn read(
        &self,
        kernel: &mut SimKernel,
        count: Option<usize>,
        timeout_fs: Option<u64>,
    ) -> Result<Vec<u64>, BitbangError> {
        if !self.wait(kernel, timeout_fs)? {
            return Ok(Vec::new());
        }
        Ok(self.read_nowait(count))
    }

    /// Drains up to `count` words (all when `None`) without waiting.
    pub fn read_nowait(&self, count: Option<usize>) -> Vec<u64> {
        let mut core = self.core.borrow_mut();
        let n = count.map_or(core.queue.len(), |c| c.min(core.queue.len()));
        core.queue.drain(..n).collect()
    }

    /// Like [`read`](Self::read) with no count limit, packing each word
    /// little-endian into `bytes_per_word(bits)` bytes.
    pub fn read_bytes(&self, kernel: &mut SimKernel, timeout_fs: Option<u64>) -> Result<Vec<u8>, BitbangError> {
        let words = self.read(kernel, None, timeout_fs)?;
        Ok(pack_words(&words, self.config().bits))
    }

    /// Words received and not yet read.
    pub fn count(&self) -> usize {
        self.core.borrow().queue.len()
    }

    /// Whether no received words are waiting.
    pub fn empty(&self) -> bool {
        self.core.borrow().queue.is_empty()
    }

    /// Whether a word is partially received.
    pub fn busy(&self) -> bool {
        self.core.borrow().bit_count > 0
    }

    /// Drops received words. A partially received word is kept.
    pub fn clear(&self) {
        self.core.borrow_mut().queue.clear();
    }

    /// Waits until at least one word is available or the timeout elapses.
    ///
    /// Returns immediately when data is already queued. Returns whether data
    /// is available.
    pub fn wait(&self, kernel: &mut SimKernel, timeout_fs: Option<u64>) -> Result<bool, BitbangError> {
        if !self.empty() {
            return Ok(true);
        }
        let core = Rc::clone(&self.core);
        let ready = kernel.run_until(move |_| !core.borrow().queue.is_empty(), timeout_fs)?;
        Ok(ready)
    }

    /// Replaces the configuration between words.
    ///
    /// Rejected with [`BitbangError::Busy`] while a word is partially received.
    pub fn reconfigure(&self, config: SinkConfig) -> Result<(), BitbangError> {
        config.validate()?;
        let mut core = self.core.borrow_mut();
        if core.bit_count > 0 {
            return Err(BitbangError::Busy {
                emulator: core.name.clone(),
            });
        }
        core.config = config;
        debug!("{}: reconfigured to {}, {} bits", core.name, config.mode, config.bits);
        Ok(())
    }

    /// Words completely received so far.
    pub fn words_received(&self) -> u64 {
        self.core.borrow().words_received
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChipSelect;
    use spibench_common::{BitOrder, Logic, SpiMode};
    use spibench_sim::SignalId;

    struct Wires {
        kernel: SimKernel,
        sclk: SignalId,
        din: SignalId,
    }

    fn wires(idle: Logic) -> Wires {
        let mut kernel = SimKernel::new();
        let sclk = kernel.add_signal("sclk", idle);
        let din = kernel.add_signal("din", Logic::Zero);
        Wires { kernel, sclk, din }
    }

    /// Clocks `bits` out by hand: data at t, sample edge at t+10, back at t+20.
    fn clock_out(w: &mut Wires, mode: SpiMode, bits: &[bool]) {
        let idle = mode.idle_level();
        let sample_level = Logic::from_bool(mode.sample_edge().level_after());
        let mut t = 0;
        for &b in bits {
            w.kernel.drive_at(w.din, Logic::from_bool(b), t + 5).unwrap();
            w.kernel.drive_at(w.sclk, sample_level, t + 10).unwrap();
            w.kernel.drive_at(w.sclk, !sample_level, t + 20).unwrap();
            t += 20;
        }
        w.kernel.drive_at(w.sclk, idle, t + 30).unwrap();
    }

    #[test]
    fn samples_msb_first_on_rising_edges() {
        let mut w = wires(Logic::Zero);
        let pins = SinkPins {
            sclk: w.sclk,
            din: w.din,
            cs: None,
        };
        let sink = BufferSink::attach(&mut w.kernel, "sink", pins, SinkConfig::default()).unwrap();
        clock_out(&mut w, SpiMode::MODE_0, &[true, false, true, false, false, true, false, true]);
        let words = sink.read(&mut w.kernel, None, Some(1_000)).unwrap();
        assert_eq!(words, vec![0xa5]);
        assert_eq!(sink.words_received(), 1);
        assert!(sink.empty());
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn samples_lsb_first_on_falling_edges() {
        let mut w = wires(Logic::Zero);
        let pins = SinkPins {
            sclk: w.sclk,
            din: w.din,
            cs: None,
        };
        let cfg = SinkConfig {
            bits: 4,
            mode: SpiMode::MODE_1,
            bit_order: BitOrder::LsbFirst,
        };
        let sink = BufferSink::attach(&mut w.kernel, "sink", pins, cfg).unwrap();
        // Mode 1 samples on falling edges: 1, 1, 0, 0 lsb-first is 0x3
        let mut t = 0;
        for b in [true, true, false, false] {
            w.kernel.drive_at(w.din, Logic::from_bool(b), t + 5).unwrap();
            w.kernel.drive_at(w.sclk, Logic::One, t + 6).unwrap();
            w.kernel.drive_at(w.sclk, Logic::Zero, t + 10).unwrap();
            t += 20;
        }
        let words = sink.read(&mut w.kernel, None, Some(1_000)).unwrap();
        assert_eq!(words, vec![0x3]);
    }

    #[test]
    fn read_times_out_empty() {
        let mut w = wires(Logic::Zero);
        let pins = SinkPins {
            sclk: w.sclk,
            din: w.din,
            cs: None,
        };
        let sink = BufferSink::attach(&mut w.kernel, "sink", pins, SinkConfig::default()).unwrap();
        let words = sink.read(&mut w.kernel, Some(4), Some(2_000)).unwrap();
        assert!(words.is_empty());
        assert_eq!(w.kernel.current_time().fs, 2_000);
        assert!(!sink.wait(&mut w.kernel, Some(500)).unwrap());
        assert_eq!(w.kernel.current_time().fs, 2_500);
    }

    #[test]
    fn read_respects_count() {
        let mut w = wires(Logic::Zero);
        let pins = SinkPins {
            sclk: w.sclk,
            din: w.din,
            cs: None,
        };
        let cfg = SinkConfig {
            bits: 1,
            ..Default::default()
        };
        let sink = BufferSink::attach(&mut w.kernel, "sink", pins, cfg).unwrap();
        clock_out(&mut w, SpiMode::MODE_0, &[true, false, true]);
        w.kernel.run_for(1_000).unwrap();
        assert_eq!(sink.count(), 3);
        assert!(sink.wait(&mut w.kernel, Some(1)).unwrap());
        assert_eq!(sink.read_nowait(Some(2)), vec![1, 0]);
        assert_eq!(sink.read_nowait(Some(5)), vec![1]);
        assert!(sink.read_nowait(None).is_empty());
    }

    #[test]
    fn read_bytes_packs_words() {
        let mut w = wires(Logic::Zero);
        let pins = SinkPins {
            sclk: w.sclk,
            din: w.din,
            cs: None,
        };
        let cfg = SinkConfig {
            bits: 12,
            ..Default::default()
        };
        let sink = BufferSink::attach(&mut w.kernel, "sink", pins, cfg).unwrap();
        // 0x321 msb-first
        let bits: Vec<bool> = (0..12).rev().map(|i| (0x321 >> i) & 1 == 1).collect();
        clock_out(&mut w, SpiMode::MODE_0, &bits);
        let bytes = sink.read_bytes(&mut w.kernel, Some(1_000)).unwrap();
        assert_eq!(bytes, vec![0x21, 0x03]);
    }

    #[test]
    fn unknown_data_bit_fails() {
        let mut kernel = SimKernel::new();
        let sclk = kernel.add_signal("sclk", Logic::Zero);
        let din = kernel.add_signal("din", Logic::X);
        let pins = SinkPins { sclk, din, cs: None };
        let sink = BufferSink::attach(&mut kernel, "rx", pins, SinkConfig::default()).unwrap();
        kernel.drive_at(sclk, Logic::One, 10).unwrap();
        let err = sink.read(&mut kernel, None, Some(100)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "process 'rx' failed at 10 fs: sampled X on the data line at 10 fs"
        );
    }

    #[test]
    fn edge_out_of_unknown_is_ignored() {
        let mut w = wires(Logic::X);
        let pins = SinkPins {
            sclk: w.sclk,
            din: w.din,
            cs: None,
        };
        let cfg = SinkConfig {
            bits: 1,
            ..Default::default()
        };
        let sink = BufferSink::attach(&mut w.kernel, "sink", pins, cfg).unwrap();
        w.kernel.drive_at(w.sclk, Logic::One, 10).unwrap();
        w.kernel.run_for(100).unwrap();
        assert!(sink.empty());
    }

    #[test]
    fn deselect_discards_partial_word() {
        let mut kernel = SimKernel::new();
        let sclk = kernel.add_signal("sclk", Logic::Zero);
        let din = kernel.add_signal("din", Logic::One);
        let cs_n = kernel.add_signal("cs_n", Logic::Zero);
        let pins = SinkPins {
            sclk,
            din,
            cs: Some(ChipSelect::active_low(cs_n)),
        };
        let sink = BufferSink::attach(&mut kernel, "sink", pins, SinkConfig::default()).unwrap();
        for k in 0..3 {
            kernel.drive_at(sclk, Logic::One, 10 + 20 * k).unwrap();
            kernel.drive_at(sclk, Logic::Zero, 20 + 20 * k).unwrap();
        }
        kernel.run_for(65).unwrap();
        assert!(sink.busy());
        assert!(matches!(
            sink.reconfigure(SinkConfig::default()),
            Err(BitbangError::Busy { .. })
        ));

        kernel.drive(cs_n, Logic::One).unwrap();
        kernel.run_for(1).unwrap();
        assert!(!sink.busy());
        assert!(sink.empty());

        // Edges while deselected are ignored
        kernel.drive_at(sclk, Logic::One, 10).unwrap();
        kernel.run_for(20).unwrap();
        assert!(!sink.busy());
        sink.reconfigure(SinkConfig {
            bits: 16,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(sink.config().bits, 16);
    }

    #[test]
    fn clear_drops_queue() {
        let mut w = wires(Logic::Zero);
        let pins = SinkPins {
            sclk: w.sclk,
            din: w.din,
            cs: None,
        };
        let cfg = SinkConfig {
            bits: 1,
            ..Default::default()
        };
        let sink = BufferSink::attach(&mut w.kernel, "sink", pins, cfg).unwrap();
        clock_out(&mut w, SpiMode::MODE_0, &[true, true]);
        w.kernel.run_for(1_000).unwrap();
        assert_eq!(sink.count(), 2);
        sink.clear();
        assert!(sink.empty());
        assert_eq!(sink.words_received(), 2);
    }
}
