//! One acquisition cycle across every analog source.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::channel::{CHANNEL_COUNT, ChannelId};
use crate::config::DEFAULT_REFERENCE_VOLTAGE;
use crate::error::Error;
use crate::external::ExternalAdc;
use crate::interface::{AdcBus, AnalogInput};
use crate::internal::InternalAdc;
use crate::reading::{AdcReading, ChannelLine, TemperatureLine, TemperatureReading};
use crate::temperature::{TemperatureSensor, TemperatureSource};

// Width reported for internal channels when none is active.
const DEFAULT_INTERNAL_BITS: u8 = 16;

/// Scaling a group of readings was converted with.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SourceScale {
    /// Voltage of the maximum code.
    pub reference_voltage: f64,
    /// Converter width in bits.
    pub resolution_bits: u8,
}

impl Default for SourceScale {
    fn default() -> Self {
        Self {
            reference_voltage: DEFAULT_REFERENCE_VOLTAGE,
            resolution_bits: DEFAULT_INTERNAL_BITS,
        }
    }
}

impl fmt::Display for SourceScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1}V reference, {}-bit",
            self.reference_voltage, self.resolution_bits
        )
    }
}

/// Readings of one cycle; `None` marks an entry that could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    /// External converter channels in logical order.
    pub external: [Option<AdcReading>; CHANNEL_COUNT],
    /// On-die channels in logical order; excluded channels stay `None`.
    pub internal: [Option<AdcReading>; CHANNEL_COUNT],
    /// Die temperature, if the sensor is fitted and answered.
    pub temperature: Option<TemperatureReading>,
    /// Scaling of the external entries.
    pub external_scale: SourceScale,
    /// Scaling of the internal entries.
    pub internal_scale: SourceScale,
}

impl Snapshot {
    /// Number of external channels that produced a reading.
    pub fn external_count(&self) -> usize {
        self.external.iter().flatten().count()
    }

    /// Number of internal channels that produced a reading.
    pub fn internal_count(&self) -> usize {
        self.internal.iter().flatten().count()
    }

    /// Whether every entry, temperature included, is present.
    pub fn is_complete(&self) -> bool {
        self.external_count() == CHANNEL_COUNT
            && self.internal_count() == CHANNEL_COUNT
            && self.temperature.is_some()
    }
}

fn write_group(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    scale: &SourceScale,
    readings: &[Option<AdcReading>; CHANNEL_COUNT],
) -> fmt::Result {
    writeln!(f, "{title} ({scale}):")?;
    for channel in ChannelId::ALL {
        let reading = readings[channel.index()].as_ref();
        writeln!(f, "{}", ChannelLine { channel, reading })?;
    }
    Ok(())
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_group(f, "External ADC Readings", &self.external_scale, &self.external)?;
        write_group(f, "Internal ADC Readings", &self.internal_scale, &self.internal)?;
        writeln!(f, "Temperature Reading:")?;
        write!(f, "{}", TemperatureLine(self.temperature))
    }
}

/// Drives every source once per [`snapshot`](Self::snapshot) call.
pub struct Acquisition<BUS, CS, A, T> {
    external: ExternalAdc<BUS, CS>,
    internal: InternalAdc<A>,
    temperature: TemperatureSensor<T>,
    internal_reference: f64,
    external_retries: u8,
}

impl<BUS, CS, A, T> Acquisition<BUS, CS, A, T>
where
    BUS: AdcBus,
    CS: OutputPin,
    A: AnalogInput,
    T: TemperatureSource,
{
    /// Combines the sources; internal readings scale against 3.3 V and a
    /// failed external sequence is not retried.
    pub fn new(
        external: ExternalAdc<BUS, CS>,
        internal: InternalAdc<A>,
        temperature: TemperatureSensor<T>,
    ) -> Self {
        Self {
            external,
            internal,
            temperature,
            internal_reference: DEFAULT_REFERENCE_VOLTAGE,
            external_retries: 0,
        }
    }

    /// Sets the reference voltage used to scale internal samples.
    pub fn internal_reference(mut self, volts: f64) -> Self {
        self.internal_reference = volts;
        self
    }

    /// Sets how many times a failed external sequence is restarted.
    pub fn external_retries(mut self, retries: u8) -> Self {
        self.external_retries = retries;
        self
    }

    /// Provides mutable access to the external driver, e.g. for `init`.
    pub fn external_mut(&mut self) -> &mut ExternalAdc<BUS, CS> {
        &mut self.external
    }

    /// Provides mutable access to the internal driver.
    pub fn internal_mut(&mut self) -> &mut InternalAdc<A> {
        &mut self.internal
    }

    /// Reads external, then internal channels, then temperature.
    ///
    /// Never fails: every entry that cannot be read is left `None`. When the
    /// full external sequence keeps failing on the wire, each external
    /// channel is read again in its own fresh sequence, so one faulty
    /// channel does not take the others with it.
    pub fn snapshot(&mut self, delay: &mut impl DelayNs) -> Snapshot {
        Snapshot {
            external: self.read_external(delay),
            internal: self.read_internal(),
            temperature: self.temperature.read(),
            external_scale: self.external_scale(),
            internal_scale: self.internal_scale(),
        }
    }

    fn read_external(&mut self, delay: &mut impl DelayNs) -> [Option<AdcReading>; CHANNEL_COUNT] {
        let mut wire_fault = false;
        for attempt in 0..=self.external_retries {
            match self.external.read_all_readings(delay) {
                Ok(readings) => return readings.map(Some),
                Err(err) => {
                    wire_fault = matches!(err, Error::Transfer(_) | Error::ChipSelect);
                    warn!(
                        "external sequence failed, attempt {=u8} of {=u8}",
                        attempt.saturating_add(1),
                        self.external_retries.saturating_add(1)
                    );
                }
            }
        }

        // Lock timeouts and configuration errors would hit every channel alike.
        if !wire_fault {
            return [None; CHANNEL_COUNT];
        }

        ChannelId::ALL.map(|channel| match self.external.read_reading(channel, delay) {
            Ok(reading) => Some(reading),
            Err(_) => {
                warn!("external channel {=u8} read failed", channel.get());
                None
            }
        })
    }

    fn read_internal(&mut self) -> [Option<AdcReading>; CHANNEL_COUNT] {
        ChannelId::ALL.map(|channel| {
            if !self.internal.is_active(channel) {
                return None;
            }

            match self.internal.read_reading(channel, self.internal_reference) {
                Ok(reading) => Some(reading),
                Err(_) => {
                    warn!("internal channel {=u8} read failed", channel.get());
                    None
                }
            }
        })
    }

    fn external_scale(&self) -> SourceScale {
        let config = self.external.config();
        SourceScale {
            reference_voltage: config.reference_voltage,
            resolution_bits: config.resolution.bits(),
        }
    }

    fn internal_scale(&self) -> SourceScale {
        let resolution_bits = ChannelId::ALL
            .iter()
            .find_map(|&channel| self.internal.resolution_bits(channel))
            .unwrap_or(DEFAULT_INTERNAL_BITS);
        SourceScale {
            reference_voltage: self.internal_reference,
            resolution_bits,
        }
    }

    /// Consumes the aggregator and returns its sources.
    pub fn release(self) -> (ExternalAdc<BUS, CS>, InternalAdc<A>, TemperatureSensor<T>) {
        (self.external, self.internal, self.temperature)
    }
}
