//! Bit layouts of the two-byte transfer frames exchanged with the external ADC.
#![allow(unused_parens)]

use modular_bitfield::prelude::*;

use crate::params::{Phase, Polarity};

/// Number of bytes clocked in each direction per transaction.
pub const FRAME_LEN: usize = 2;
/// Filler byte clocked out after the command byte.
pub const FILLER: u8 = 0x00;

/// Builds the outgoing frame for a channel-select command.
pub const fn command_frame(command: u8) -> [u8; FRAME_LEN] {
    [command, FILLER]
}

/// Reply frame of the 8-bit effective resolution mode.
///
/// The sample straddles the byte boundary: its high nibble is the low nibble
/// of the first byte and its low nibble is the high nibble of the second.
#[allow(unused_parens)]
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame8 {
    // Sample bits 7:4 (byte 0, bits 3:0).
    pub high: B4,
    #[skip]
    __: B4,
    #[skip]
    __: B4,
    // Sample bits 3:0 (byte 1, bits 7:4).
    pub low: B4,
}

impl Frame8 {
    /// Reassembles the 8-bit sample.
    pub fn sample(self) -> u16 {
        (u16::from(self.high()) << 4) | u16::from(self.low())
    }
}

/// Reply frame of the 10-bit resolution mode.
///
/// Bits 9:8 sit in the two low bits of the first byte, bits 7:0 fill the second.
#[allow(unused_parens)]
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame10 {
    // Sample bits 9:8 (byte 0, bits 1:0).
    pub high: B2,
    #[skip]
    __: B6,
    // Sample bits 7:0 (byte 1).
    pub low: B8,
}

impl Frame10 {
    /// Reassembles the 10-bit sample.
    pub fn sample(self) -> u16 {
        (u16::from(self.high()) << 8) | u16::from(self.low())
    }
}

/// Conventional SPI mode number (`CPOL << 1 | CPHA`).
#[allow(unused_parens)]
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeNumber {
    // Clock phase (bit 0).
    pub phase: Phase,
    // Clock polarity (bit 1).
    pub polarity: Polarity,
    #[skip]
    __: B6,
}

impl From<u8> for ModeNumber {
    fn from(value: u8) -> Self {
        Self::from_bytes([value])
    }
}

impl From<ModeNumber> for u8 {
    fn from(value: ModeNumber) -> Self {
        value.into_bytes()[0]
    }
}
