//! Shared SPI bus backends built on top of `embedded-hal` `SpiBus`.
//!
//! [`SharedSpi`] owns the bus peripheral and a lock flag, both behind
//! critical-section mutexes, so it can sit in a `static` and hand out
//! handles to consumers running in different contexts, interrupts included.
//! [`SpiHandle`] talks 8-bit words, [`Spi16Handle`] packs each two-byte frame
//! into one 16-bit word.

use core::cell::{Cell, RefCell};

use critical_section::Mutex;
use embedded_hal::spi::{ErrorType, SpiBus};

use super::AdcBus;
use crate::config::BusConfig;
use crate::params::WordSize;

/// Hook applying a [`BusConfig`] to the concrete peripheral.
///
/// `embedded-hal` has no runtime reconfiguration API, so HAL specific calls
/// such as setting the baud rate go here.
pub type ConfigureFn<SPI> =
    fn(&mut SPI, &BusConfig) -> core::result::Result<(), <SPI as ErrorType>::Error>;

fn keep_settings<SPI: ErrorType>(
    _spi: &mut SPI,
    _config: &BusConfig,
) -> core::result::Result<(), SPI::Error> {
    Ok(())
}

/// An SPI bus shared between consumers through a try-lock.
///
/// `Sync` whenever the peripheral is `Send`.
pub struct SharedSpi<SPI: ErrorType> {
    bus: Mutex<RefCell<SPI>>,
    locked: Mutex<Cell<bool>>,
    configure: ConfigureFn<SPI>,
}

impl<SPI: ErrorType> SharedSpi<SPI> {
    /// Wraps a bus whose settings are fixed at construction.
    pub fn new(spi: SPI) -> Self {
        Self::with_configure(spi, keep_settings::<SPI>)
    }

    /// Wraps a bus and a hook reapplying settings after every lock.
    pub fn with_configure(spi: SPI, configure: ConfigureFn<SPI>) -> Self {
        Self {
            bus: Mutex::new(RefCell::new(spi)),
            locked: Mutex::new(Cell::new(false)),
            configure,
        }
    }

    /// Takes the lock if it is free.
    pub fn try_lock(&self) -> bool {
        critical_section::with(|cs| {
            let locked = self.locked.borrow(cs);
            if locked.get() {
                false
            } else {
                locked.set(true);
                true
            }
        })
    }

    /// Releases the lock.
    pub fn unlock(&self) {
        critical_section::with(|cs| self.locked.borrow(cs).set(false));
    }

    /// Whether some consumer currently holds the lock.
    pub fn is_locked(&self) -> bool {
        critical_section::with(|cs| self.locked.borrow(cs).get())
    }

    /// Handle exchanging 8-bit words.
    pub fn handle(&self) -> SpiHandle<'_, SPI> {
        SpiHandle { shared: self }
    }

    /// Handle exchanging 16-bit words.
    pub fn handle16(&self) -> Spi16Handle<'_, SPI> {
        Spi16Handle { shared: self }
    }

    /// Consumes the wrapper and returns the owned SPI bus.
    pub fn release(self) -> SPI {
        self.bus.into_inner().into_inner()
    }

    fn apply(&self, config: &BusConfig) -> core::result::Result<(), SPI::Error> {
        critical_section::with(|cs| (self.configure)(&mut *self.bus.borrow_ref_mut(cs), config))
    }

    fn with_bus<R>(&self, f: impl FnOnce(&mut SPI) -> R) -> R {
        critical_section::with(|cs| f(&mut *self.bus.borrow_ref_mut(cs)))
    }
}

/// 8-bit word view of a [`SharedSpi`].
pub struct SpiHandle<'a, SPI: ErrorType> {
    shared: &'a SharedSpi<SPI>,
}

impl<SPI> AdcBus for SpiHandle<'_, SPI>
where
    SPI: SpiBus<u8>,
{
    type Error = SPI::Error;

    fn try_lock(&mut self) -> bool {
        self.shared.try_lock()
    }

    fn unlock(&mut self) {
        self.shared.unlock()
    }

    fn supports(&self, config: &BusConfig) -> bool {
        config.word_size == WordSize::Bits8
    }

    fn configure(&mut self, config: &BusConfig) -> core::result::Result<(), Self::Error> {
        self.shared.apply(config)
    }

    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> core::result::Result<(), Self::Error> {
        if write.is_empty() {
            return Ok(());
        }

        self.shared.with_bus(|spi| {
            spi.transfer(read, write)?;
            spi.flush()
        })
    }
}

/// 16-bit word view of a [`SharedSpi`].
///
/// Byte pairs map to words big-endian, so the first byte of a frame is the
/// high byte of the word and leaves the wire first.
pub struct Spi16Handle<'a, SPI: ErrorType> {
    shared: &'a SharedSpi<SPI>,
}

impl<SPI> AdcBus for Spi16Handle<'_, SPI>
where
    SPI: SpiBus<u16>,
{
    type Error = SPI::Error;

    fn try_lock(&mut self) -> bool {
        self.shared.try_lock()
    }

    fn unlock(&mut self) {
        self.shared.unlock()
    }

    fn supports(&self, config: &BusConfig) -> bool {
        config.word_size == WordSize::Bits16
    }

    fn configure(&mut self, config: &BusConfig) -> core::result::Result<(), Self::Error> {
        self.shared.apply(config)
    }

    fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> core::result::Result<(), Self::Error> {
        if write.is_empty() {
            return Ok(());
        }

        self.shared.with_bus(|spi| {
            for (tx, rx) in write.chunks_exact(2).zip(read.chunks_exact_mut(2)) {
                let mut word = [u16::from_be_bytes([tx[0], tx[1]])];
                spi.transfer_in_place(&mut word)?;
                rx.copy_from_slice(&word[0].to_be_bytes());
            }
            spi.flush()
        })
    }
}
