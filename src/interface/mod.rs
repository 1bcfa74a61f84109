//! Hardware abstraction seams used by the drivers.

pub mod bitbang;
pub mod spi;

use crate::config::BusConfig;

/// Abstraction over a serial bus that other consumers may share.
///
/// Chip-select is not part of this trait; the
/// [`BusArbiter`](crate::arbiter::BusArbiter) drives it around each transfer.
pub trait AdcBus {
    /// Error type produced by the concrete bus implementation.
    type Error;

    /// Attempts to take the bus lock without blocking.
    fn try_lock(&mut self) -> bool;

    /// Releases a lock taken with [`try_lock`](Self::try_lock).
    fn unlock(&mut self);

    /// Whether this backend can run with `config` at all.
    fn supports(&self, config: &BusConfig) -> bool {
        let _ = config;
        true
    }

    /// Applies clock rate, mode and word size. Called after every lock.
    fn configure(&mut self, config: &BusConfig) -> core::result::Result<(), Self::Error>;

    /// Full-duplex exchange of equally sized buffers, most significant bit first.
    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> core::result::Result<(), Self::Error>;
}

/// A single on-die analog input sampled directly.
pub trait AnalogInput {
    /// Error type produced while sampling.
    type Error;

    /// Samples the input once.
    fn read_raw(&mut self) -> core::result::Result<u16, Self::Error>;

    /// Width of the values returned by [`read_raw`](Self::read_raw).
    fn resolution_bits(&self) -> u8 {
        16
    }
}

impl<T: AdcBus + ?Sized> AdcBus for &mut T {
    type Error = T::Error;

    fn try_lock(&mut self) -> bool {
        T::try_lock(self)
    }

    fn unlock(&mut self) {
        T::unlock(self)
    }

    fn supports(&self, config: &BusConfig) -> bool {
        T::supports(self, config)
    }

    fn configure(&mut self, config: &BusConfig) -> core::result::Result<(), Self::Error> {
        T::configure(self, config)
    }

    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> core::result::Result<(), Self::Error> {
        T::transfer(self, write, read)
    }
}
