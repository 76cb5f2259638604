//! A loopback peer: answers every word with the word it received before.
//!
//! The peer samples MOSI on the mode's sample edge and shifts MISO on the
//! shift edge, so the stream it sends back is the received stream delayed by
//! one word. The first word it sends is a configurable initial word.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use spibench_common::{word_mask, Logic};
use spibench_sim::{Process, ProcessContext, SignalId, SimError, SimKernel, Trigger};

use crate::config::{ChipSelect, SinkConfig};
use crate::error::BitbangError;

/// Signals a [`LoopbackSlave`] is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopbackPins {
    /// Serial clock input.
    pub sclk: SignalId,
    /// Data input from the master.
    pub mosi: SignalId,
    /// Data output to the master.
    pub miso: SignalId,
    /// Optional chip-select input; MISO floats while deselected.
    pub cs: Option<ChipSelect>,
}

struct LoopbackCore {
    name: String,
    pins: LoopbackPins,
    config: SinkConfig,
    /// Word currently on MISO.
    out_word: u64,
    /// Serial position presented on MISO; `bits` means no word is loaded yet.
    out_index: u32,
    /// Word to send next: the last one received.
    staged: u64,
    rx_shift: u64,
    rx_count: u32,
    words_echoed: u64,
}

impl LoopbackCore {
    fn bits(&self) -> u32 {
        self.config.bits
    }

    fn out_bit(&self) -> Logic {
        let index = self.config.bit_order.bit_index(self.out_index, self.bits());
        Logic::from_bool((self.out_word >> index) & 1 == 1)
    }

    /// Resets the transmit side to the start of a word.
    fn rewind(&mut self) {
        if self.config.mode.has_leading_shift() {
            self.out_index = self.bits();
        } else {
            self.out_word = self.staged;
            self.out_index = 0;
        }
    }

    fn shift(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), SimError> {
        if self.config.mode.has_leading_shift() {
            if self.out_index >= self.bits() {
                self.out_word = self.staged;
                self.out_index = 0;
            }
            ctx.drive(self.pins.miso, self.out_bit())?;
            self.out_index += 1;
        } else {
            self.out_index += 1;
            if self.out_index >= self.bits() {
                self.out_word = self.staged;
                self.out_index = 0;
            }
            ctx.drive(self.pins.miso, self.out_bit())?;
        }
        Ok(())
    }

    fn sample(&mut self, ctx: &ProcessContext<'_>) -> Result<(), SimError> {
        let value = ctx.value(self.pins.mosi)?;
        let Some(bit) = value.to_bool() else {
            let time_fs = ctx.now().fs;
            return Err(SimError::ProcessFailed {
                process: self.name.clone(),
                time_fs,
                reason: BitbangError::UnknownDataBit { value, time_fs }.to_string(),
            });
        };
        if bit {
            self.rx_shift |= 1 << self.config.bit_order.bit_index(self.rx_count, self.bits());
        }
        self.rx_count += 1;
        if self.rx_count == self.bits() {
            debug!("{}: received 0x{:x}, echoing next word", self.name, self.rx_shift);
            self.staged = self.rx_shift;
            self.words_echoed += 1;
            self.rx_shift = 0;
            self.rx_count = 0;
        }
        Ok(())
    }
}

impl Process for LoopbackCore {
    fn name(&self) -> &str {
        &self.name
    }

    fn react(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), SimError> {
        let (was_selected, selected) = match self.pins.cs {
            Some(cs) => (
                cs.is_selected(ctx.previous(cs.signal)?),
                cs.is_selected(ctx.value(cs.signal)?),
            ),
            None => (true, true),
        };

        // An edge coinciding with a select change still belongs to the frame
        if (was_selected || selected) && ctx.previous(self.pins.sclk)?.is_known() {
            let mode = self.config.mode;
            match ctx.edge(self.pins.sclk) {
                Some(edge) if edge == mode.sample_edge() => self.sample(ctx)?,
                Some(edge) if edge == mode.shift_edge() => self.shift(ctx)?,
                _ => {}
            }
        }

        if let Some(cs) = self.pins.cs {
            if ctx.changed(cs.signal) && was_selected != selected {
                if selected {
                    if !self.config.mode.has_leading_shift() {
                        ctx.drive(self.pins.miso, self.out_bit())?;
                    }
                } else {
                    self.rx_shift = 0;
                    self.rx_count = 0;
                    self.rewind();
                    ctx.drive(self.pins.miso, Logic::Z)?;
                }
            }
        }
        Ok(())
    }
}

/// Emulates a loopback SPI peripheral.
#[derive(Clone)]
pub struct LoopbackSlave {
    core: Rc<RefCell<LoopbackCore>>,
}

impl LoopbackSlave {
    /// Binds a new loopback peer to `pins` and registers it with the kernel.
    ///
    /// `initial_word` is sent during the first received word.
    pub fn attach(
        kernel: &mut SimKernel,
        name: impl Into<String>,
        pins: LoopbackPins,
        config: SinkConfig,
        initial_word: u64,
    ) -> Result<Self, BitbangError> {
        config.validate()?;
        let staged = initial_word & word_mask(config.bits);
        let mut core = LoopbackCore {
            name: name.into(),
            pins,
            config,
            out_word: staged,
            out_index: 0,
            staged,
            rx_shift: 0,
            rx_count: 0,
            words_echoed: 0,
        };
        core.rewind();
        let initial = match pins.cs {
            Some(_) => Logic::Z,
            None if config.mode.has_leading_shift() => Logic::One,
            None => core.out_bit(),
        };
        kernel.drive(pins.miso, initial)?;

        let mut triggers = vec![Trigger::any(pins.sclk)];
        if let Some(cs) = pins.cs {
            triggers.push(Trigger::any(cs.signal));
        }
        let core = Rc::new(RefCell::new(core));
        kernel.add_process(core.clone(), triggers)?;
        Ok(Self { core })
    }

    /// Words received (and therefore staged for echo) so far.
    pub fn words_echoed(&self) -> u64 {
        self.core.borrow().words_echoed
    }

    /// The word that will be sent back next.
    pub fn staged_word(&self) -> u64 {
        self.core.borrow().staged
    }
}
