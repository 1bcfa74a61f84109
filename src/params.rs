//! Strongly typed parameter enumerations for the acquisition driver.
//!
//! These enums describe the bus wire format and the conversion behaviour of
//! the external ADC. They are used across [`Config`](crate::config::Config)
//! and [`BusConfig`](crate::config::BusConfig); prefer them over raw integers
//! so that every configuration value is explicit and valid by construction.
//!
//! # Examples
//!
//! ```rust
//! use mixadc::params::{Phase, Polarity, Resolution, Strategy};
//!
//! let polarity = Polarity::IdleLow;
//! let phase = Phase::CaptureOnFirstTransition;
//! let resolution = Resolution::Bits10;
//! let strategy = Strategy::Pipelined;
//! let _ = (polarity, phase, resolution, strategy);
//! ```

use embedded_hal::spi;
use modular_bitfield::prelude::Specifier;

use crate::frame::{Frame8, Frame10, FRAME_LEN};

/// Clock polarity (CPOL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 1]
pub enum Polarity {
    /// Clock idles low (CPOL = 0).
    IdleLow = 0,
    /// Clock idles high (CPOL = 1).
    IdleHigh = 1,
}

/// Clock phase (CPHA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 1]
pub enum Phase {
    /// Data sampled on the first clock transition (CPHA = 0).
    CaptureOnFirstTransition = 0,
    /// Data sampled on the second clock transition (CPHA = 1).
    CaptureOnSecondTransition = 1,
}

impl From<Polarity> for spi::Polarity {
    fn from(value: Polarity) -> Self {
        match value {
            Polarity::IdleLow => spi::Polarity::IdleLow,
            Polarity::IdleHigh => spi::Polarity::IdleHigh,
        }
    }
}

impl From<Phase> for spi::Phase {
    fn from(value: Phase) -> Self {
        match value {
            Phase::CaptureOnFirstTransition => spi::Phase::CaptureOnFirstTransition,
            Phase::CaptureOnSecondTransition => spi::Phase::CaptureOnSecondTransition,
        }
    }
}

/// Bus word size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WordSize {
    /// One byte per word; a frame is two words.
    Bits8,
    /// Two bytes per word; a frame is a single word, command in the high byte.
    Bits16,
}

impl WordSize {
    /// Returns the word width in bits.
    pub const fn bits(self) -> u8 {
        match self {
            Self::Bits8 => 8,
            Self::Bits16 => 16,
        }
    }
}

/// Effective resolution of the external converter.
///
/// Selects how the raw sample is pulled out of a two-byte reply frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    /// `raw = (b0 & 0x0F) << 4 | b1 >> 4`.
    Bits8,
    /// `raw = (b0 & 0x03) << 8 | b1`.
    Bits10,
}

impl Resolution {
    /// Returns the sample width in bits.
    pub const fn bits(self) -> u8 {
        match self {
            Self::Bits8 => 8,
            Self::Bits10 => 10,
        }
    }

    /// Largest code the converter can report at this resolution.
    pub const fn max_code(self) -> u16 {
        ((1u32 << self.bits()) - 1) as u16
    }

    /// Extracts the raw sample from a reply frame.
    pub fn extract(self, frame: [u8; FRAME_LEN]) -> u16 {
        match self {
            Self::Bits8 => Frame8::from_bytes(frame).sample(),
            Self::Bits10 => Frame10::from_bytes(frame).sample(),
        }
    }
}

/// Strategy used to compensate for the one-transaction result latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Strategy {
    /// Warm-up frame followed by one frame per channel; N+1 frames for N
    /// channels. Each frame carries the next channel's command.
    Pipelined,
    /// Every command is sent twice and the first reply dropped; 2N frames.
    Repeated,
}

impl Strategy {
    /// Number of physical transactions needed to read `channels` channels.
    pub const fn transactions(self, channels: usize) -> usize {
        if channels == 0 {
            return 0;
        }
        match self {
            Self::Pipelined => channels + 1,
            Self::Repeated => channels * 2,
        }
    }
}

/// Policy applied while waiting for the bus lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LockTimeout {
    /// Spin until the lock is free. Only sound with a single cooperative consumer.
    Forever,
    /// Give up after this many microseconds.
    Micros(u32),
}
