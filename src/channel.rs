//! Channel identifiers and the channel-select command table.

use crate::config::ConfigError;

/// Number of channels exposed by each analog source.
pub const CHANNEL_COUNT: usize = 4;

/// Validated channel index in `0..CHANNEL_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(u8);

impl ChannelId {
    /// All channels in logical order.
    pub const ALL: [ChannelId; CHANNEL_COUNT] =
        [ChannelId(0), ChannelId(1), ChannelId(2), ChannelId(3)];

    /// Returns `None` when `id` is outside `0..CHANNEL_COUNT`.
    pub const fn new(id: u8) -> Option<Self> {
        if (id as usize) < CHANNEL_COUNT {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Raw channel number.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Channel number as an array index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<ChannelId> for u8 {
    fn from(value: ChannelId) -> Self {
        value.0
    }
}

/// Device-specific mapping from channel to channel-select command byte.
///
/// Observed parts disagree on the bit layout of these commands, so no table
/// is built in; the caller must supply one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandTable {
    commands: [u8; CHANNEL_COUNT],
}

impl CommandTable {
    /// Builds a table from commands listed in channel order.
    ///
    /// Two channels sharing a command byte would make their readings
    /// indistinguishable, so duplicates are rejected.
    pub fn new(commands: [u8; CHANNEL_COUNT]) -> Result<Self, ConfigError> {
        for (i, command) in commands.iter().enumerate() {
            if commands[i + 1..].contains(command) {
                return Err(ConfigError::DuplicateCommand);
            }
        }

        Ok(Self { commands })
    }

    /// Builds a table from `(channel, command)` pairs in any order.
    ///
    /// Every channel must appear exactly once.
    pub fn from_pairs(pairs: &[(u8, u8)]) -> Result<Self, ConfigError> {
        let mut commands = [None; CHANNEL_COUNT];
        for &(channel, command) in pairs {
            let id = ChannelId::new(channel).ok_or(ConfigError::ChannelOutOfRange)?;
            let slot = &mut commands[id.index()];
            if slot.is_some() {
                return Err(ConfigError::IncompleteCommandTable);
            }
            *slot = Some(command);
        }

        let mut table = [0u8; CHANNEL_COUNT];
        for (dst, src) in table.iter_mut().zip(commands) {
            *dst = src.ok_or(ConfigError::IncompleteCommandTable)?;
        }

        Self::new(table)
    }

    /// Command byte selecting `channel`.
    pub const fn encode(&self, channel: ChannelId) -> u8 {
        self.commands[channel.index()]
    }

    /// Commands in channel order.
    pub const fn commands(&self) -> [u8; CHANNEL_COUNT] {
        self.commands
    }
}
