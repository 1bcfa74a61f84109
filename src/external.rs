//! Driver for the external four-channel converter on the shared bus.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::arbiter::BusArbiter;
use crate::channel::{CHANNEL_COUNT, ChannelId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::frame::{FRAME_LEN, command_frame};
use crate::interface::AdcBus;
use crate::pipeline::PipelinedConverter;
use crate::reading::AdcReading;

// Pause after the warm-up frame issued by `init` (microseconds).
const POST_INIT_DELAY_US: u32 = 1_000;

/// High-level synchronous driver for the external converter.
pub struct ExternalAdc<BUS, CS> {
    arbiter: BusArbiter<BUS, CS>,
    config: Config,
    converter: PipelinedConverter,
}

impl<BUS, CS> ExternalAdc<BUS, CS> {
    // ==================================================================
    // == Driver Construction & Ownership ===============================
    // ==================================================================
    /// Creates a driver; an invalid configuration is rejected here and only here.
    pub fn new(bus: BUS, cs: CS, config: Config) -> Result<Self, BUS::Error>
    where
        BUS: AdcBus,
    {
        config.validate().map_err(|_| Error::InvalidConfig)?;

        Ok(Self {
            arbiter: BusArbiter::new(bus, cs),
            converter: PipelinedConverter::new(config.strategy, config.settle_us),
            config,
        })
    }

    /// Consumes the driver and returns the bus, chip-select pin and configuration.
    pub fn release(self) -> (BUS, CS, Config) {
        let (bus, cs) = self.arbiter.release();
        (bus, cs, self.config)
    }

    /// Returns a shared reference to the active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Provides mutable access to the bus arbiter.
    pub fn arbiter_mut(&mut self) -> &mut BusArbiter<BUS, CS> {
        &mut self.arbiter
    }
}

impl<BUS, CS, CommE> ExternalAdc<BUS, CS>
where
    BUS: AdcBus<Error = CommE>,
    CS: OutputPin,
{
    // ==================================================================
    // == Initialization ================================================
    // ==================================================================
    /// Idles chip-select and primes the converter with one discarded frame.
    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<(), CommE> {
        self.arbiter.init()?;

        let command = self.config.commands.encode(ChannelId::ALL[0]);
        {
            let mut guard = self.arbiter.acquire(self.config.lock_timeout, delay)?;
            guard.configure(&self.config.bus)?;
            let mut discard = [0u8; FRAME_LEN];
            guard.transact(&command_frame(command), &mut discard)?;
        }

        delay.delay_us(POST_INIT_DELAY_US);
        debug!("external adc primed, mode {=u8}", self.config.bus.mode_number());
        Ok(())
    }

    // ==================================================================
    // == Data Acquisition ==============================================
    // ==================================================================
    /// Reads all four channels in one bus acquisition.
    pub fn read_all(&mut self, delay: &mut impl DelayNs) -> Result<[u16; CHANNEL_COUNT], CommE> {
        let mut samples = [0u16; CHANNEL_COUNT];
        self.read_sequence(&ChannelId::ALL, &mut samples, delay)?;
        Ok(samples)
    }

    /// Reads all four channels and scales them to volts.
    pub fn read_all_readings(
        &mut self,
        delay: &mut impl DelayNs,
    ) -> Result<[AdcReading; CHANNEL_COUNT], CommE> {
        let samples = self.read_all(delay)?;
        Ok(ChannelId::ALL.map(|channel| self.reading(channel, samples[channel.index()])))
    }

    /// Reads a single channel by raw id.
    ///
    /// An id outside `0..4` fails with [`Error::ChannelOutOfRange`] before
    /// the bus is touched.
    pub fn read_channel(&mut self, channel: u8, delay: &mut impl DelayNs) -> Result<u16, CommE> {
        let id = ChannelId::new(channel).ok_or(Error::ChannelOutOfRange(channel))?;
        let mut sample = [0u16; 1];
        self.read_sequence(&[id], &mut sample, delay)?;
        Ok(sample[0])
    }

    /// Reads one channel in its own sequence and scales it to volts.
    pub fn read_reading(
        &mut self,
        channel: ChannelId,
        delay: &mut impl DelayNs,
    ) -> Result<AdcReading, CommE> {
        let raw = self.read_channel(channel.get(), delay)?;
        Ok(self.reading(channel, raw))
    }

    /// Reads `channels` in order into `samples`.
    ///
    /// At most four channels per sequence; `samples` must be at least as long
    /// as `channels`. Each call starts a fresh sequence, so retrying after an
    /// error never reuses replies from the failed attempt.
    pub fn read_sequence(
        &mut self,
        channels: &[ChannelId],
        samples: &mut [u16],
        delay: &mut impl DelayNs,
    ) -> Result<(), CommE> {
        if channels.len() > CHANNEL_COUNT || samples.len() < channels.len() {
            return Err(Error::BufferLength);
        }
        if channels.is_empty() {
            return Ok(());
        }

        let mut replies = [[0u8; FRAME_LEN]; CHANNEL_COUNT];
        {
            let mut guard = self.arbiter.acquire(self.config.lock_timeout, delay)?;
            guard.configure(&self.config.bus)?;
            self.converter.convert(
                channels,
                &self.config.commands,
                &mut replies,
                delay,
                |command| {
                    let mut reply = [0u8; FRAME_LEN];
                    guard.transact(&command_frame(command), &mut reply)?;
                    Ok::<_, Error<CommE>>(reply)
                },
            )?;
        }

        let resolution = self.config.resolution;
        for (sample, reply) in samples.iter_mut().zip(&replies[..channels.len()]) {
            *sample = resolution.extract(*reply);
        }

        trace!(
            "external sequence of {=usize} channels, {=usize} frames",
            channels.len(),
            self.converter.transactions(channels.len())
        );
        Ok(())
    }

    fn reading(&self, channel: ChannelId, raw: u16) -> AdcReading {
        AdcReading::new(
            channel,
            raw,
            self.config.resolution.bits(),
            self.config.reference_voltage,
        )
    }
}
