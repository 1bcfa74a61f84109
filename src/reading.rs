//! Converted readings and their textual rendering.

use core::fmt;

use crate::channel::ChannelId;

/// Scales `raw` against the full-scale code of a `resolution_bits` converter.
///
/// `resolution_bits` is clamped to `1..=16`. Zero maps to 0 V and the largest
/// code maps to `reference`; values in between scale linearly.
pub fn voltage(raw: u16, resolution_bits: u8, reference: f64) -> f64 {
    let full_scale = full_scale(resolution_bits);
    f64::from(raw.min(full_scale)) / f64::from(full_scale) * reference
}

fn full_scale(resolution_bits: u8) -> u16 {
    let bits = resolution_bits.clamp(1, 16);
    ((1u32 << bits) - 1) as u16
}

/// One converted analog sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdcReading {
    /// Channel the sample was taken from.
    pub channel: ChannelId,
    /// Raw code, always below `2^resolution_bits`.
    pub raw: u16,
    /// Converter resolution.
    pub resolution_bits: u8,
    /// Raw code scaled to volts.
    pub voltage: f64,
}

impl AdcReading {
    /// Builds a reading, masking `raw` to the resolution.
    pub fn new(channel: ChannelId, raw: u16, resolution_bits: u8, reference: f64) -> Self {
        let resolution_bits = resolution_bits.clamp(1, 16);
        let raw = raw & full_scale(resolution_bits);
        Self {
            channel,
            raw,
            resolution_bits,
            voltage: voltage(raw, resolution_bits, reference),
        }
    }

    fn hex_digits(&self) -> usize {
        usize::from(self.resolution_bits).div_ceil(4)
    }
}

impl fmt::Display for AdcReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Channel {}: Hex: 0x{:0hex$X}, Binary: {:0bin$b}, Decimal: {}, Voltage: {:.3}V",
            self.channel.get(),
            self.raw,
            self.raw,
            self.raw,
            self.voltage,
            hex = self.hex_digits(),
            bin = usize::from(self.resolution_bits),
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AdcReading {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Channel {=u8}: Hex: {=u16:#x}, Decimal: {=u16}, Voltage: {=f64}V",
            self.channel.get(),
            self.raw,
            self.raw,
            self.voltage
        );
    }
}

/// Die temperature in both scales.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureReading {
    /// Degrees Celsius.
    pub celsius: f64,
    /// Degrees Fahrenheit, always `celsius * 9 / 5 + 32`.
    pub fahrenheit: f64,
}

impl TemperatureReading {
    /// Derives the Fahrenheit value from `celsius`.
    pub fn from_celsius(celsius: f64) -> Self {
        Self {
            celsius,
            fahrenheit: celsius * 9.0 / 5.0 + 32.0,
        }
    }
}

impl fmt::Display for TemperatureReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CPU Temperature: {:.1}°C / {:.1}°F",
            self.celsius, self.fahrenheit
        )
    }
}

/// Renders an optional channel entry, printing `ERROR` for an absent one.
pub struct ChannelLine<'a> {
    /// Channel index printed for absent entries.
    pub channel: ChannelId,
    /// Reading, if the channel produced one.
    pub reading: Option<&'a AdcReading>,
}

impl fmt::Display for ChannelLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reading {
            Some(reading) => fmt::Display::fmt(reading, f),
            None => write!(f, "Channel {}: ERROR", self.channel.get()),
        }
    }
}

/// Renders an optional temperature, printing `ERROR` when absent.
pub struct TemperatureLine(pub Option<TemperatureReading>);

impl fmt::Display for TemperatureLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(reading) => fmt::Display::fmt(reading, f),
            None => f.write_str("Temperature: ERROR"),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::format;

    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.001
    }

    #[test]
    fn voltage_endpoints() {
        for bits in [8u8, 10, 16] {
            assert_eq!(voltage(0, bits, 3.3), 0.0);
            let max = ((1u32 << bits) - 1) as u16;
            assert!(close(voltage(max, bits, 3.3), 3.3));
        }
    }

    #[test]
    fn voltage_is_monotonic() {
        let mut previous = -1.0;
        for raw in 0..=1023u16 {
            let v = voltage(raw, 10, 3.3);
            assert!(v >= previous);
            previous = v;
        }
    }

    #[test]
    fn reading_masks_out_of_range_codes() {
        let reading = AdcReading::new(ChannelId::ALL[0], 0x1FF, 8, 3.3);
        assert_eq!(reading.raw, 0xFF);
        assert!(close(reading.voltage, 3.3));
    }

    #[test]
    fn fahrenheit_tracks_celsius() {
        let reading = TemperatureReading::from_celsius(25.0);
        assert!(close(reading.fahrenheit, 77.0));
        let reading = TemperatureReading::from_celsius(-40.0);
        assert!(close(reading.fahrenheit, -40.0));
    }

    #[test]
    fn display_pads_to_resolution() {
        let reading = AdcReading::new(ChannelId::ALL[0], 12, 10, 3.3);
        assert_eq!(
            format!("{reading}"),
            "Channel 0: Hex: 0x00C, Binary: 0000001100, Decimal: 12, Voltage: 0.039V"
        );

        let internal = AdcReading::new(ChannelId::ALL[3], 0xABCD, 16, 3.3);
        assert_eq!(
            format!("{internal}"),
            "Channel 3: Hex: 0xABCD, Binary: 1010101111001101, Decimal: 43981, Voltage: 2.215V"
        );
    }

    #[test]
    fn absent_entries_render_as_error() {
        let line = ChannelLine {
            channel: ChannelId::ALL[2],
            reading: None,
        };
        assert_eq!(format!("{line}"), "Channel 2: ERROR");
        assert_eq!(format!("{}", TemperatureLine(None)), "Temperature: ERROR");
        assert_eq!(
            format!("{}", TemperatureLine(Some(TemperatureReading::from_celsius(25.0)))),
            "CPU Temperature: 25.0°C / 77.0°F"
        );
    }
}
