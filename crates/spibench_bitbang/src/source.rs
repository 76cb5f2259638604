//! The serial source: shifts queued words out on a data line and generates
//! the serial clock from the system clock.
//!
//! The source is clocked by rising edges of the system clock. Each bit takes
//! `2 * sclk_div` system clock cycles: the data bit is presented together
//! with the shift edge, the sample edge follows `sclk_div` cycles later and
//! the next shift edge `sclk_div` cycles after that. Queued words are sent
//! back to back; when the queue runs dry the serial clock returns to its
//! idle level and the optional chip select is released.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, info};
use spibench_common::{unpack_words, word_mask, Logic};
use spibench_sim::{Process, ProcessContext, SimError, SimKernel, Trigger};

use crate::config::{SourceConfig, SourcePins};
use crate::error::BitbangError;

/// Which half of a bit period the source is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Half {
    /// Data presented, waiting for the sample edge.
    Lead,
    /// Sample edge driven, waiting for the end of the bit.
    Trail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SourceState {
    Idle,
    Shifting {
        word: u64,
        /// Serial position of the bit on the wire.
        bit: u32,
        half: Half,
        /// System clock edges seen in this half.
        count: u32,
    },
}

struct SourceCore {
    name: String,
    pins: SourcePins,
    config: SourceConfig,
    queue: VecDeque<u64>,
    state: SourceState,
    words_sent: u64,
}

impl SourceCore {
    fn in_flight(&self) -> bool {
        matches!(self.state, SourceState::Shifting { .. })
    }

    fn sample_level(&self) -> Logic {
        Logic::from_bool(self.config.mode.sample_edge().level_after())
    }

    fn shift_level(&self) -> Logic {
        !self.sample_level()
    }

    fn bit_value(&self, word: u64, k: u32) -> Logic {
        let index = self.config.bit_order.bit_index(k, self.config.bits);
        Logic::from_bool((word >> index) & 1 == 1)
    }

    fn room(&self, requested: usize) -> Result<(), BitbangError> {
        match self.config.queue_limit {
            Some(limit) if self.queue.len() + requested > limit => Err(BitbangError::QueueFull {
                limit,
                pending: self.queue.len(),
                requested,
            }),
            _ => Ok(()),
        }
    }

    fn enqueue(&mut self, words: &[u64]) -> Result<(), BitbangError> {
        self.room(words.len())?;
        let mask = word_mask(self.config.bits);
        self.queue.extend(words.iter().map(|w| w & mask));
        Ok(())
    }

    /// Pops the next word and presents its first bit with a shift edge.
    fn start_word(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), SimError> {
        let Some(word) = self.queue.pop_front() else {
            return Ok(());
        };
        let digits = self.config.bits.div_ceil(4) as usize;
        info!("{}: Write word 0x{word:0digits$x}", self.name);

        // For CPHA=1 this is the leading edge; otherwise sclk is already there
        ctx.drive(self.pins.sclk, self.shift_level())?;
        ctx.drive(self.pins.dout, self.bit_value(word, 0))?;
        if let Some(cs) = self.pins.cs {
            ctx.drive(cs.signal, cs.active_level())?;
        }
        self.state = SourceState::Shifting {
            word,
            bit: 0,
            half: Half::Lead,
            count: 0,
        };
        Ok(())
    }

    fn finish_word(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), SimError> {
        self.words_sent += 1;
        if !self.queue.is_empty() {
            return self.start_word(ctx);
        }
        ctx.drive(self.pins.sclk, self.config.mode.idle_level())?;
        if let Some(cs) = self.pins.cs {
            ctx.drive(cs.signal, cs.inactive_level())?;
        }
        self.state = SourceState::Idle;
        debug!("{}: idle at {} after {} words", self.name, ctx.now(), self.words_sent);
        Ok(())
    }
}

impl Process for SourceCore {
    fn name(&self) -> &str {
        &self.name
    }

    fn react(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), SimError> {
        let SourceState::Shifting {
            word,
            bit,
            half,
            count,
        } = self.state
        else {
            return self.start_word(ctx);
        };

        let count = count + 1;
        if count < self.config.sclk_div {
            self.state = SourceState::Shifting {
                word,
                bit,
                half,
                count,
            };
            return Ok(());
        }

        match half {
            Half::Lead => {
                ctx.drive(self.pins.sclk, self.sample_level())?;
                self.state = SourceState::Shifting {
                    word,
                    bit,
                    half: Half::Trail,
                    count: 0,
                };
                Ok(())
            }
            Half::Trail if bit + 1 < self.config.bits => {
                ctx.drive(self.pins.sclk, self.shift_level())?;
                ctx.drive(self.pins.dout, self.bit_value(word, bit + 1))?;
                self.state = SourceState::Shifting {
                    word,
                    bit: bit + 1,
                    half: Half::Lead,
                    count: 0,
                };
                Ok(())
            }
            Half::Trail => self.finish_word(ctx),
        }
    }
}

/// Emulates the transmitting side of a serial link.
///
/// Handles are cheap clones that share one emulator instance.
#[derive(Clone)]
pub struct BufferSource {
    core: Rc<RefCell<SourceCore>>,
}

impl BufferSource {
    /// Binds a new source to `pins` and registers it with the kernel.
    ///
    /// The serial clock is driven to its idle level, the data line high and
    /// the chip select (if any) inactive.
    pub fn attach(
        kernel: &mut SimKernel,
        name: impl Into<String>,
        pins: SourcePins,
        config: SourceConfig,
    ) -> Result<Self, BitbangError> {
        config.validate()?;
        let name = name.into();

        kernel.drive(pins.sclk, config.mode.idle_level())?;
        kernel.drive(pins.dout, Logic::One)?;
        if let Some(cs) = pins.cs {
            kernel.drive(cs.signal, cs.inactive_level())?;
        }

        let core = Rc::new(RefCell::new(SourceCore {
            name: name.clone(),
            pins,
            config,
            queue: VecDeque::new(),
            state: SourceState::Idle,
            words_sent: 0,
        }));
        kernel.add_process(core.clone(), vec![Trigger::rising(pins.clk)])?;
        debug!(
            "{name}: attached ({}, {} bits, {}, sclk_div {})",
            config.mode, config.bits, config.bit_order, config.sclk_div
        );
        Ok(Self { core })
    }

    /// The active configuration.
    pub fn config(&self) -> SourceConfig {
        self.core.borrow().config
    }

    /// Queues words without advancing the simulation.
    ///
    /// Bits above the word width are dropped. Fails with
    /// [`BitbangError::QueueFull`] if the words do not all fit under the queue
    /// limit, in which case none are queued.
    pub fn write_nowait(&self, words: &[u64]) -> Result<(), BitbangError> {
        self.core.borrow_mut().enqueue(words)
    }

    /// Queues words, advancing the simulation whenever the queue is full.
    ///
    /// Identical to [`write_nowait`](Self::write_nowait) without a queue limit.
    pub fn write(&self, kernel: &mut SimKernel, words: &[u64]) -> Result<(), BitbangError> {
        let limit = self.core.borrow().config.queue_limit;
        let Some(limit) = limit else {
            return self.write_nowait(words);
        };
        for &word in words {
            let core = Rc::clone(&self.core);
            let has_room = kernel.run_until(move |_| core.borrow().queue.len() < limit, None)?;
            if !has_room {
                return Err(BitbangError::QueueFull {
                    limit,
                    pending: self.count(),
                    requested: 1,
                });
            }
            self.core.borrow_mut().enqueue(&[word])?;
        }
        Ok(())
    }

    /// Queues a little-endian byte buffer, `bytes_per_word(bits)` bytes per word.
    pub fn write_bytes(&self, data: &[u8]) -> Result<(), BitbangError> {
        let bits = self.core.borrow().config.bits;
        let words = unpack_words(data, bits).ok_or(BitbangError::UnalignedBuffer {
            len: data.len(),
            bits,
        })?;
        self.write_nowait(&words)
    }

    /// Words queued but not yet started.
    pub fn count(&self) -> usize {
        self.core.borrow().queue.len()
    }

    /// Whether no words are queued. A word may still be on the wire.
    pub fn empty(&self) -> bool {
        self.core.borrow().queue.is_empty()
    }

    /// Whether a word is currently being shifted out.
    pub fn busy(&self) -> bool {
        self.core.borrow().in_flight()
    }

    /// Whether the queue is empty and nothing is on the wire.
    pub fn idle(&self) -> bool {
        let core = self.core.borrow();
        core.queue.is_empty() && !core.in_flight()
    }

    /// Drops queued words. A word already on the wire completes.
    pub fn clear(&self) {
        self.core.borrow_mut().queue.clear();
    }

    /// Advances until the source is idle or the timeout elapses.
    ///
    /// Returns whether the source became idle.
    pub fn wait(&self, kernel: &mut SimKernel, timeout_fs: Option<u64>) -> Result<bool, BitbangError> {
        let core = Rc::clone(&self.core);
        let idle = kernel.run_until(
            move |_| {
                let core = core.borrow();
                core.queue.is_empty() && !core.in_flight()
            },
            timeout_fs,
        )?;
        Ok(idle)
    }

    /// Replaces the configuration between words.
    ///
    /// Rejected with [`BitbangError::Busy`] while a word is on the wire.
    /// Queued words are kept and sent with the new configuration. The serial
    /// clock moves to the new idle level in the next delta cycle.
    pub fn reconfigure(&self, kernel: &mut SimKernel, config: SourceConfig) -> Result<(), BitbangError> {
        config.validate()?;
        let mut core = self.core.borrow_mut();
        if core.in_flight() {
            return Err(BitbangError::Busy {
                emulator: core.name.clone(),
            });
        }
        if let Some(limit) = config.queue_limit {
            if core.queue.len() > limit {
                return Err(BitbangError::QueueFull {
                    limit,
                    pending: core.queue.len(),
                    requested: 0,
                });
            }
        }
        kernel.drive(core.pins.sclk, config.mode.idle_level())?;
        core.config = config;
        debug!("{}: reconfigured to {}, {} bits", core.name, config.mode, config.bits);
        Ok(())
    }

    /// Words completely shifted out so far.
    pub fn words_sent(&self) -> u64 {
        self.core.borrow().words_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChipSelect;
    use spibench_common::{BitOrder, Edge, SpiMode};
    use spibench_sim::SignalId;

    const PERIOD: u64 = 4_000;

    struct Bench {
        kernel: SimKernel,
        pins: SourcePins,
    }

    fn bench(cs: bool) -> Bench {
        let mut kernel = SimKernel::new();
        let clk = kernel.add_signal("clk", Logic::X);
        let sclk = kernel.add_signal("sclk", Logic::X);
        let dout = kernel.add_signal("dout", Logic::X);
        let cs = cs.then(|| ChipSelect::active_low(kernel.add_signal("cs_n", Logic::X)));
        kernel.add_clock(clk, PERIOD).unwrap();
        Bench {
            kernel,
            pins: SourcePins {
                clk,
                sclk,
                dout,
                cs,
            },
        }
    }

    /// Logs every change of the serial clock and data line.
    struct Scope {
        sclk: SignalId,
        dout: SignalId,
        events: Vec<(u64, Option<Edge>, Option<Logic>)>,
    }

    impl Process for Scope {
        fn name(&self) -> &str {
            "scope"
        }

        fn react(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), SimError> {
            let data = if ctx.changed(self.dout) {
                Some(ctx.value(self.dout)?)
            } else {
                None
            };
            self.events.push((ctx.now().fs, ctx.edge(self.sclk), data));
            Ok(())
        }
    }

    #[test]
    fn attach_drives_idle_levels() {
        let mut b = bench(true);
        let cfg = SourceConfig {
            mode: SpiMode::MODE_2,
            ..Default::default()
        };
        BufferSource::attach(&mut b.kernel, "src", b.pins, cfg).unwrap();
        b.kernel.run_for(1).unwrap();
        assert_eq!(b.kernel.value(b.pins.sclk).unwrap(), Logic::One);
        assert_eq!(b.kernel.value(b.pins.dout).unwrap(), Logic::One);
        assert_eq!(b.kernel.value(b.pins.cs.unwrap().signal).unwrap(), Logic::One);
    }

    #[test]
    fn attach_rejects_bad_config() {
        let mut b = bench(false);
        let cfg = SourceConfig {
            bits: 0,
            ..Default::default()
        };
        assert!(matches!(
            BufferSource::attach(&mut b.kernel, "src", b.pins, cfg),
            Err(BitbangError::InvalidWordWidth { bits: 0 })
        ));
    }

    #[test]
    fn mode0_waveform() {
        let mut b = bench(false);
        let cfg = SourceConfig {
            bits: 2,
            sclk_div: 1,
            ..Default::default()
        };
        let src = BufferSource::attach(&mut b.kernel, "src", b.pins, cfg).unwrap();
        let scope = Rc::new(RefCell::new(Scope {
            sclk: b.pins.sclk,
            dout: b.pins.dout,
            events: Vec::new(),
        }));
        b.kernel
            .add_process(
                scope.clone(),
                vec![Trigger::any(b.pins.sclk), Trigger::any(b.pins.dout)],
            )
            .unwrap();
        b.kernel.run_for(1).unwrap();
        scope.borrow_mut().events.clear();

        src.write_nowait(&[0b01]).unwrap();
        assert!(src.wait(&mut b.kernel, Some(100 * PERIOD)).unwrap());

        // Rising clk edges at 2, 6, 10, 14, 18 ns
        let events = scope.borrow().events.clone();
        assert_eq!(
            events,
            vec![
                (2_000, None, Some(Logic::Zero)),
                (6_000, Some(Edge::Rising), None),
                (10_000, Some(Edge::Falling), Some(Logic::One)),
                (14_000, Some(Edge::Rising), None),
                (18_000, Some(Edge::Falling), None),
            ]
        );
        assert_eq!(src.words_sent(), 1);
    }

    #[test]
    fn mode1_leading_shift_edge() {
        let mut b = bench(false);
        let cfg = SourceConfig {
            bits: 1,
            sclk_div: 1,
            mode: SpiMode::MODE_1,
            ..Default::default()
        };
        let src = BufferSource::attach(&mut b.kernel, "src", b.pins, cfg).unwrap();
        let scope = Rc::new(RefCell::new(Scope {
            sclk: b.pins.sclk,
            dout: b.pins.dout,
            events: Vec::new(),
        }));
        b.kernel
            .add_process(scope.clone(), vec![Trigger::any(b.pins.sclk)])
            .unwrap();
        b.kernel.run_for(1).unwrap();
        scope.borrow_mut().events.clear();

        src.write_nowait(&[0]).unwrap();
        assert!(src.wait(&mut b.kernel, Some(100 * PERIOD)).unwrap());
        let edges: Vec<Option<Edge>> = scope.borrow().events.iter().map(|e| e.1).collect();
        // Leading shift edge, then the sample edge; sclk is back at idle afterwards
        assert_eq!(edges, vec![Some(Edge::Rising), Some(Edge::Falling)]);
        assert_eq!(b.kernel.value(b.pins.sclk).unwrap(), Logic::Zero);
    }

    #[test]
    fn chip_select_spans_burst() {
        let mut b = bench(true);
        let cfg = SourceConfig {
            bits: 4,
            sclk_div: 2,
            ..Default::default()
        };
        let src = BufferSource::attach(&mut b.kernel, "src", b.pins, cfg).unwrap();
        let cs = b.pins.cs.unwrap().signal;
        src.write_nowait(&[0xa, 0x5]).unwrap();

        b.kernel.run_for(3 * PERIOD).unwrap();
        assert!(src.busy());
        assert_eq!(b.kernel.value(cs).unwrap(), Logic::Zero);
        assert_eq!(src.count(), 1);

        assert!(src.wait(&mut b.kernel, Some(1_000 * PERIOD)).unwrap());
        assert_eq!(b.kernel.value(cs).unwrap(), Logic::One);
        assert_eq!(src.words_sent(), 2);
    }

    #[test]
    fn empty_is_weaker_than_idle() {
        let mut b = bench(false);
        let src = BufferSource::attach(&mut b.kernel, "src", b.pins, SourceConfig::default()).unwrap();
        assert!(src.idle());
        src.write_nowait(&[0x42]).unwrap();
        assert!(!src.empty());
        assert!(!src.idle());

        b.kernel.run_for(3 * PERIOD).unwrap();
        assert!(src.empty());
        assert!(src.busy());
        assert!(!src.idle());

        assert!(src.wait(&mut b.kernel, Some(1_000 * PERIOD)).unwrap());
        assert!(src.idle());
    }

    #[test]
    fn wait_times_out() {
        let mut b = bench(false);
        let src = BufferSource::attach(&mut b.kernel, "src", b.pins, SourceConfig::default()).unwrap();
        src.write_nowait(&[1, 2, 3]).unwrap();
        let start = b.kernel.current_time().fs;
        assert!(!src.wait(&mut b.kernel, Some(10 * PERIOD)).unwrap());
        assert_eq!(b.kernel.current_time().fs, start + 10 * PERIOD);
    }

    #[test]
    fn clear_keeps_word_in_flight() {
        let mut b = bench(false);
        let src = BufferSource::attach(&mut b.kernel, "src", b.pins, SourceConfig::default()).unwrap();
        src.write_nowait(&[1, 2, 3]).unwrap();
        b.kernel.run_for(3 * PERIOD).unwrap();
        src.clear();
        assert_eq!(src.count(), 0);
        assert!(src.busy());
        assert!(src.wait(&mut b.kernel, Some(1_000 * PERIOD)).unwrap());
        assert_eq!(src.words_sent(), 1);
    }

    #[test]
    fn queue_limit_rejects_nowait_overflow() {
        let mut b = bench(false);
        let cfg = SourceConfig {
            queue_limit: Some(2),
            ..Default::default()
        };
        let src = BufferSource::attach(&mut b.kernel, "src", b.pins, cfg).unwrap();
        src.write_nowait(&[1]).unwrap();
        let err = src.write_nowait(&[2, 3]).unwrap_err();
        assert!(matches!(
            err,
            BitbangError::QueueFull {
                limit: 2,
                pending: 1,
                requested: 2
            }
        ));
        assert_eq!(src.count(), 1);
    }

    #[test]
    fn blocking_write_waits_for_room() {
        let mut b = bench(false);
        let cfg = SourceConfig {
            queue_limit: Some(1),
            sclk_div: 1,
            ..Default::default()
        };
        let src = BufferSource::attach(&mut b.kernel, "src", b.pins, cfg).unwrap();
        src.write(&mut b.kernel, &[1, 2, 3, 4]).unwrap();
        assert!(src.count() <= 1);
        assert!(src.words_sent() >= 2);
        assert!(b.kernel.current_time().fs > 0);
    }

    #[test]
    fn blocking_write_without_clock_fails() {
        let mut kernel = SimKernel::new();
        let pins = SourcePins {
            clk: kernel.add_signal("clk", Logic::Zero),
            sclk: kernel.add_signal("sclk", Logic::X),
            dout: kernel.add_signal("dout", Logic::X),
            cs: None,
        };
        let cfg = SourceConfig {
            queue_limit: Some(1),
            ..Default::default()
        };
        let src = BufferSource::attach(&mut kernel, "src", pins, cfg).unwrap();
        let err = src.write(&mut kernel, &[1, 2]).unwrap_err();
        assert!(matches!(err, BitbangError::QueueFull { .. }));
        assert_eq!(src.count(), 1);
    }

    #[test]
    fn write_bytes_unpacks_words() {
        let mut b = bench(false);
        let cfg = SourceConfig {
            bits: 16,
            ..Default::default()
        };
        let src = BufferSource::attach(&mut b.kernel, "src", b.pins, cfg).unwrap();
        src.write_bytes(&[0x34, 0x12, 0xcd, 0xab]).unwrap();
        assert_eq!(src.count(), 2);
        assert!(matches!(
            src.write_bytes(&[1, 2, 3]),
            Err(BitbangError::UnalignedBuffer { len: 3, bits: 16 })
        ));
    }

    #[test]
    fn reconfigure_rejected_mid_word() {
        let mut b = bench(false);
        let src = BufferSource::attach(&mut b.kernel, "src", b.pins, SourceConfig::default()).unwrap();
        src.write_nowait(&[0xff]).unwrap();
        b.kernel.run_for(3 * PERIOD).unwrap();
        let new_cfg = SourceConfig {
            bits: 16,
            ..Default::default()
        };
        assert!(matches!(
            src.reconfigure(&mut b.kernel, new_cfg),
            Err(BitbangError::Busy { .. })
        ));
        assert!(src.wait(&mut b.kernel, Some(1_000 * PERIOD)).unwrap());
        src.reconfigure(&mut b.kernel, new_cfg).unwrap();
        assert_eq!(src.config().bits, 16);
    }

    #[test]
    fn reconfigure_moves_idle_level() {
        let mut b = bench(false);
        let src = BufferSource::attach(&mut b.kernel, "src", b.pins, SourceConfig::default()).unwrap();
        b.kernel.run_for(1).unwrap();
        assert_eq!(b.kernel.value(b.pins.sclk).unwrap(), Logic::Zero);
        let cfg = SourceConfig {
            mode: SpiMode::MODE_3,
            bit_order: BitOrder::LsbFirst,
            ..Default::default()
        };
        src.reconfigure(&mut b.kernel, cfg).unwrap();
        b.kernel.run_for(1).unwrap();
        assert_eq!(b.kernel.value(b.pins.sclk).unwrap(), Logic::One);
    }

    #[test]
    fn words_are_masked_to_width() {
        let mut b = bench(false);
        let cfg = SourceConfig {
            bits: 4,
            ..Default::default()
        };
        let src = BufferSource::attach(&mut b.kernel, "src", b.pins, cfg).unwrap();
        src.write_nowait(&[0xff]).unwrap();
        assert_eq!(src.core.borrow().queue.front(), Some(&0xf));
    }
}
