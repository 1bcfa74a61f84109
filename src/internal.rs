//! Driver for the on-die analog inputs.

use crate::channel::{CHANNEL_COUNT, ChannelId};
use crate::error::{Error, Result};
use crate::interface::AnalogInput;
use crate::reading::AdcReading;

/// On-die channels sampled directly, without bus or pipeline.
///
/// Channels that fail to come up at construction stay excluded for the
/// lifetime of the driver.
pub struct InternalAdc<A> {
    channels: [Option<A>; CHANNEL_COUNT],
}

impl<A> InternalAdc<A>
where
    A: AnalogInput,
{
    /// Brings up every channel through `init`, excluding the ones that fail.
    pub fn new<E>(mut init: impl FnMut(ChannelId) -> core::result::Result<A, E>) -> Self {
        let channels = ChannelId::ALL.map(|id| match init(id) {
            Ok(input) => Some(input),
            Err(_) => {
                warn!("internal channel {=u8} failed to initialize, excluded", id.get());
                None
            }
        });

        Self { channels }
    }

    /// Uses already initialized inputs; `None` marks an excluded channel.
    pub fn from_channels(channels: [Option<A>; CHANNEL_COUNT]) -> Self {
        Self { channels }
    }

    /// Whether `channel` initialized successfully.
    pub fn is_active(&self, channel: ChannelId) -> bool {
        self.channels[channel.index()].is_some()
    }

    /// Number of channels that initialized successfully.
    pub fn active_channels(&self) -> usize {
        self.channels.iter().filter(|input| input.is_some()).count()
    }

    /// Reported width of `channel`, if active.
    pub fn resolution_bits(&self, channel: ChannelId) -> Option<u8> {
        self.channels[channel.index()]
            .as_ref()
            .map(AnalogInput::resolution_bits)
    }

    /// Samples one channel.
    pub fn read_channel(&mut self, channel: u8) -> Result<u16, A::Error> {
        let id = ChannelId::new(channel).ok_or(Error::InvalidChannel(channel))?;
        let input = self.channels[id.index()]
            .as_mut()
            .ok_or(Error::ChannelUnavailable(channel))?;

        input.read_raw().map_err(Error::from)
    }

    /// Samples one channel and scales it against `reference` volts.
    pub fn read_reading(&mut self, channel: ChannelId, reference: f64) -> Result<AdcReading, A::Error> {
        let raw = self.read_channel(channel.get())?;
        let bits = self.resolution_bits(channel).unwrap_or(16);
        Ok(AdcReading::new(channel, raw, bits, reference))
    }

    /// Consumes the driver and returns the channel inputs.
    pub fn release(self) -> [Option<A>; CHANNEL_COUNT] {
        self.channels
    }
}
