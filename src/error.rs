//! Error handling primitives for the acquisition driver.

/// Crate-wide result type alias.
pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Error variants produced by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The bus or analog source reported a failed transfer.
    Transfer(E),
    /// Driving the chip-select line failed.
    ChipSelect,
    /// External channel id outside `0..4`; rejected before any bus activity.
    ChannelOutOfRange(u8),
    /// Internal channel id outside the configured channel list.
    InvalidChannel(u8),
    /// Internal channel excluded after failing to initialize.
    ChannelUnavailable(u8),
    /// The bus lock was not released within the configured timeout.
    LockTimeout,
    /// Transmit and receive buffers differ in length, or an output buffer is too short.
    BufferLength,
    /// The provided configuration parameters are invalid.
    InvalidConfig,
}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Self::Transfer(err)
    }
}
