//! Configuration primitives for the acquisition driver.

use embedded_hal::spi::Mode;

use crate::channel::CommandTable;
use crate::frame::ModeNumber;
use crate::params::{LockTimeout, Phase, Polarity, Resolution, Strategy, WordSize};

/// Shortest chip-select high time between frames the converter tolerates.
pub const MIN_SETTLE_US: u32 = 1;
/// Default reference voltage of both converters.
pub const DEFAULT_REFERENCE_VOLTAGE: f64 = 3.3;

/// Serial bus settings reapplied after every bus acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// SCK frequency in hertz.
    pub clock_hz: u32,
    /// Clock polarity.
    pub polarity: Polarity,
    /// Clock phase.
    pub phase: Phase,
    /// Word size.
    pub word_size: WordSize,
}

impl BusConfig {
    /// Conventional SPI mode number (0..=3).
    pub fn mode_number(&self) -> u8 {
        ModeNumber::new()
            .with_polarity(self.polarity)
            .with_phase(self.phase)
            .into()
    }

    /// The same mode expressed as an `embedded-hal` [`Mode`].
    pub fn mode(&self) -> Mode {
        Mode {
            polarity: self.polarity.into(),
            phase: self.phase.into(),
        }
    }

    /// Half of one SCK period in nanoseconds, rounded up.
    pub fn half_period_ns(&self) -> u32 {
        let hz = self.clock_hz.max(1);
        1_000_000_000u32.div_ceil(hz.saturating_mul(2))
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            clock_hz: 800_000,
            polarity: Polarity::IdleLow,
            phase: Phase::CaptureOnFirstTransition,
            word_size: WordSize::Bits8,
        }
    }
}

/// User-facing configuration of the external ADC driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Bus settings.
    pub bus: BusConfig,
    /// Channel-select commands.
    pub commands: CommandTable,
    /// Reply extraction mode.
    pub resolution: Resolution,
    /// Latency compensation strategy.
    pub strategy: Strategy,
    /// Chip-select high time between frames, in microseconds.
    pub settle_us: u32,
    /// Voltage of the maximum code.
    pub reference_voltage: f64,
    /// Bus lock wait policy.
    pub lock_timeout: LockTimeout,
}

impl Config {
    /// Begins building a [`Config`] around a mandatory command table.
    pub fn new(commands: CommandTable) -> ConfigBuilder {
        ConfigBuilder::new(commands)
    }

    /// Checks whether this configuration can drive the converter.
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.settle_us < MIN_SETTLE_US {
            return Err(ConfigError::SettleTooShort);
        }

        if self.bus.clock_hz == 0 {
            return Err(ConfigError::ClockRate);
        }

        if !self.reference_voltage.is_finite() || self.reference_voltage <= 0.0 {
            return Err(ConfigError::ReferenceVoltage);
        }

        Ok(())
    }
}

/// Builder for [`Config`] allowing piecemeal construction.
#[derive(Debug, Clone, Copy)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Creates a new builder with defaults for everything but the commands.
    pub fn new(commands: CommandTable) -> Self {
        Self {
            config: Config {
                bus: BusConfig::default(),
                commands,
                resolution: Resolution::Bits10,
                strategy: Strategy::Pipelined,
                settle_us: MIN_SETTLE_US,
                reference_voltage: DEFAULT_REFERENCE_VOLTAGE,
                lock_timeout: LockTimeout::Forever,
            },
        }
    }

    /// Overrides the whole bus configuration.
    pub fn bus(mut self, bus: BusConfig) -> Self {
        self.config.bus = bus;
        self
    }

    /// Overrides the SCK frequency.
    pub fn clock_hz(mut self, clock_hz: u32) -> Self {
        self.config.bus.clock_hz = clock_hz;
        self
    }

    /// Overrides the bus word size.
    pub fn word_size(mut self, word_size: WordSize) -> Self {
        self.config.bus.word_size = word_size;
        self
    }

    /// Selects the reply extraction mode.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.config.resolution = resolution;
        self
    }

    /// Selects the latency compensation strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Sets the chip-select high time between frames.
    pub fn settle_us(mut self, settle_us: u32) -> Self {
        self.config.settle_us = settle_us;
        self
    }

    /// Sets the reference voltage.
    pub fn reference_voltage(mut self, volts: f64) -> Self {
        self.config.reference_voltage = volts;
        self
    }

    /// Sets the bus lock wait policy.
    pub fn lock_timeout(mut self, timeout: LockTimeout) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    /// Finalizes the builder and returns the [`Config`].
    pub fn build(self) -> Config {
        self.config
    }
}

/// Validation errors generated while verifying a [`Config`] or its command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Two channels map to the same command byte.
    DuplicateCommand,
    /// A channel has no command, or more than one.
    IncompleteCommandTable,
    /// A table entry names a channel outside `0..4`.
    ChannelOutOfRange,
    /// Settle time below [`MIN_SETTLE_US`].
    SettleTooShort,
    /// Zero clock frequency.
    ClockRate,
    /// Reference voltage not a positive finite number.
    ReferenceVoltage,
}
