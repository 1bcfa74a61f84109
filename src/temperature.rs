//! Die temperature telemetry.
//!
//! Temperature is auxiliary: a sensor that is missing or fails to read yields
//! no reading instead of an error.

use crate::config::DEFAULT_REFERENCE_VOLTAGE;
use crate::interface::AnalogInput;
use crate::reading::{TemperatureReading, voltage};

/// Anything that can report a temperature in degrees Celsius.
pub trait TemperatureSource {
    /// Error type produced while reading.
    type Error;

    /// Reads the current temperature.
    fn read_celsius(&mut self) -> core::result::Result<f64, Self::Error>;
}

/// Linear mapping from sensor voltage to degrees Celsius:
/// `celsius = voltage * slope + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureCalibration {
    /// Degrees per volt.
    pub slope: f64,
    /// Degrees at 0 V.
    pub offset: f64,
}

impl TemperatureCalibration {
    /// RP2040 sensor: `27 - (voltage - 0.706) / 0.001721`.
    pub const RP2040: Self = Self::from_reference_point(27.0, 0.706, -0.001721);

    /// Creates a calibration from raw coefficients.
    pub const fn new(slope: f64, offset: f64) -> Self {
        Self { slope, offset }
    }

    /// Creates a calibration passing through `(volts, celsius)` with a sensor
    /// gradient of `volts_per_degree`.
    pub const fn from_reference_point(celsius: f64, volts: f64, volts_per_degree: f64) -> Self {
        let slope = 1.0 / volts_per_degree;
        Self {
            slope,
            offset: celsius - volts * slope,
        }
    }

    /// Fits a calibration through two measured `(volts, celsius)` points.
    ///
    /// Returns `None` if both points share the same voltage.
    pub fn from_two_points(v1: f64, t1: f64, v2: f64, t2: f64) -> Option<Self> {
        let span = v2 - v1;
        if span == 0.0 || !span.is_finite() {
            return None;
        }

        let slope = (t2 - t1) / span;
        Some(Self {
            slope,
            offset: t1 - slope * v1,
        })
    }

    /// Converts a sensor voltage to degrees Celsius.
    #[inline]
    pub fn celsius(&self, volts: f64) -> f64 {
        volts * self.slope + self.offset
    }
}

impl Default for TemperatureCalibration {
    fn default() -> Self {
        Self::RP2040
    }
}

/// On-die temperature diode sampled through an [`AnalogInput`].
pub struct DieTemperature<A> {
    input: A,
    calibration: TemperatureCalibration,
    reference: f64,
}

impl<A: AnalogInput> DieTemperature<A> {
    /// Uses the RP2040 calibration against a 3.3 V reference.
    pub fn new(input: A) -> Self {
        Self::with_calibration(input, TemperatureCalibration::default(), DEFAULT_REFERENCE_VOLTAGE)
    }

    /// Uses a custom calibration and reference voltage.
    pub fn with_calibration(input: A, calibration: TemperatureCalibration, reference: f64) -> Self {
        Self {
            input,
            calibration,
            reference,
        }
    }

    /// Returns the active calibration.
    pub fn calibration(&self) -> TemperatureCalibration {
        self.calibration
    }

    /// Replaces the calibration, e.g. after a two-point fit.
    pub fn set_calibration(&mut self, calibration: TemperatureCalibration) {
        self.calibration = calibration;
    }

    /// Consumes the adapter and returns the analog input.
    pub fn release(self) -> A {
        self.input
    }
}

impl<A: AnalogInput> TemperatureSource for DieTemperature<A> {
    type Error = A::Error;

    fn read_celsius(&mut self) -> core::result::Result<f64, A::Error> {
        let raw = self.input.read_raw()?;
        let volts = voltage(raw, self.input.resolution_bits(), self.reference);
        Ok(self.calibration.celsius(volts))
    }
}

/// Optional temperature source whose failures degrade to absence.
pub struct TemperatureSensor<T> {
    source: Option<T>,
}

impl<T: TemperatureSource> TemperatureSensor<T> {
    /// Wraps a fitted temperature source.
    pub fn new(source: T) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// A sensor that is not fitted; every read yields `None`.
    pub fn absent() -> Self {
        Self { source: None }
    }

    /// Whether a source is fitted.
    pub fn is_present(&self) -> bool {
        self.source.is_some()
    }

    /// Reads the temperature, or `None` if the sensor is absent or failed.
    pub fn read(&mut self) -> Option<TemperatureReading> {
        let source = self.source.as_mut()?;
        match source.read_celsius() {
            Ok(celsius) if celsius.is_finite() => Some(TemperatureReading::from_celsius(celsius)),
            Ok(_) => {
                warn!("temperature source returned a non-finite value");
                None
            }
            Err(_) => {
                warn!("temperature read failed");
                None
            }
        }
    }

    /// Consumes the sensor and returns the source, if any.
    pub fn release(self) -> Option<T> {
        self.source
    }
}
