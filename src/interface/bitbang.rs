//! Clock-driven bus backend that shifts bits through plain GPIO pins.
//!
//! Each bit is clocked at a fixed rate derived from
//! [`BusConfig::clock_hz`], independent of per-byte software timing. All four
//! SPI modes are supported; bits leave and arrive most significant first.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};

use super::AdcBus;
use crate::config::BusConfig;
use crate::params::{Phase, Polarity};

/// Pin that failed during a bit-banged transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitBangError {
    /// Driving SCK failed.
    Clock,
    /// Driving MOSI failed.
    DataOut,
    /// Sampling MISO failed.
    DataIn,
}

/// Bit-banged bus owned by a single consumer.
pub struct BitBangSpi<SCK, MOSI, MISO, D> {
    sck: SCK,
    mosi: MOSI,
    miso: MISO,
    delay: D,
    config: BusConfig,
    locked: bool,
}

impl<SCK, MOSI, MISO, D> BitBangSpi<SCK, MOSI, MISO, D>
where
    SCK: OutputPin,
    MOSI: OutputPin,
    MISO: InputPin,
    D: DelayNs,
{
    /// Creates the backend; pins are not touched until [`AdcBus::configure`].
    pub fn new(sck: SCK, mosi: MOSI, miso: MISO, delay: D) -> Self {
        Self {
            sck,
            mosi,
            miso,
            delay,
            config: BusConfig::default(),
            locked: false,
        }
    }

    /// Consumes the backend and returns the owned pins and delay.
    pub fn release(self) -> (SCK, MOSI, MISO, D) {
        (self.sck, self.mosi, self.miso, self.delay)
    }

    fn idle_level(&self) -> PinState {
        match self.config.polarity {
            Polarity::IdleLow => PinState::Low,
            Polarity::IdleHigh => PinState::High,
        }
    }

    fn clock(&mut self, state: PinState) -> core::result::Result<(), BitBangError> {
        self.sck.set_state(state).map_err(|_| BitBangError::Clock)
    }

    fn drive(&mut self, bit: bool) -> core::result::Result<(), BitBangError> {
        self.mosi
            .set_state(PinState::from(bit))
            .map_err(|_| BitBangError::DataOut)
    }

    fn sample(&mut self) -> core::result::Result<bool, BitBangError> {
        self.miso.is_high().map_err(|_| BitBangError::DataIn)
    }

    fn exchange_byte(&mut self, out: u8) -> core::result::Result<u8, BitBangError> {
        let half = self.config.half_period_ns();
        let idle = self.idle_level();
        let active = !idle;
        let mut input = 0u8;

        for bit in (0..8).rev() {
            let level = (out >> bit) & 1 == 1;
            let sampled = match self.config.phase {
                Phase::CaptureOnFirstTransition => {
                    self.drive(level)?;
                    self.delay.delay_ns(half);
                    self.clock(active)?;
                    let sampled = self.sample()?;
                    self.delay.delay_ns(half);
                    self.clock(idle)?;
                    sampled
                }
                Phase::CaptureOnSecondTransition => {
                    self.clock(active)?;
                    self.drive(level)?;
                    self.delay.delay_ns(half);
                    self.clock(idle)?;
                    let sampled = self.sample()?;
                    self.delay.delay_ns(half);
                    sampled
                }
            };
            input = (input << 1) | u8::from(sampled);
        }

        Ok(input)
    }
}

impl<SCK, MOSI, MISO, D> AdcBus for BitBangSpi<SCK, MOSI, MISO, D>
where
    SCK: OutputPin,
    MOSI: OutputPin,
    MISO: InputPin,
    D: DelayNs,
{
    type Error = BitBangError;

    fn try_lock(&mut self) -> bool {
        if self.locked {
            return false;
        }
        self.locked = true;
        true
    }

    fn unlock(&mut self) {
        self.locked = false;
    }

    fn configure(&mut self, config: &BusConfig) -> core::result::Result<(), Self::Error> {
        self.config = *config;
        let idle = self.idle_level();
        self.clock(idle)
    }

    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> core::result::Result<(), Self::Error> {
        for (tx, rx) in write.iter().zip(read.iter_mut()) {
            *rx = self.exchange_byte(*tx)?;
        }
        Ok(())
    }
}
