//! Exclusive, scoped access to the shared bus plus chip-select framing.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::BusConfig;
use crate::error::{Error, Result};
use crate::interface::AdcBus;
use crate::params::{LockTimeout, WordSize};

// Interval between lock polls under a bounded timeout (microseconds).
const LOCK_POLL_INTERVAL_US: u32 = 1;

/// Owns the bus backend and the converter's chip-select line.
pub struct BusArbiter<BUS, CS> {
    bus: BUS,
    cs: CS,
}

impl<BUS, CS> BusArbiter<BUS, CS> {
    /// Creates an arbiter; neither the bus nor the pin is touched.
    pub const fn new(bus: BUS, cs: CS) -> Self {
        Self { bus, cs }
    }

    /// Consumes the arbiter and returns the bus and chip-select pin.
    pub fn release(self) -> (BUS, CS) {
        (self.bus, self.cs)
    }

    /// Provides mutable access to the underlying bus.
    pub fn bus_mut(&mut self) -> &mut BUS {
        &mut self.bus
    }
}

impl<BUS, CS> BusArbiter<BUS, CS>
where
    BUS: AdcBus,
    CS: OutputPin,
{
    /// Drives chip-select to its idle (high) level.
    pub fn init(&mut self) -> Result<(), BUS::Error> {
        self.cs.set_high().map_err(|_| Error::ChipSelect)
    }

    /// Busy-polls for the bus lock and returns a guard releasing it on drop.
    ///
    /// With [`LockTimeout::Micros`] the lock is polled once per microsecond and
    /// [`Error::LockTimeout`] is returned once the budget is spent.
    pub fn acquire(
        &mut self,
        timeout: LockTimeout,
        delay: &mut impl DelayNs,
    ) -> Result<BusGuard<'_, BUS, CS>, BUS::Error> {
        let mut waited_us: u32 = 0;
        while !self.bus.try_lock() {
            match timeout {
                LockTimeout::Forever => core::hint::spin_loop(),
                LockTimeout::Micros(limit) => {
                    if waited_us >= limit {
                        warn!("bus lock not released after {=u32} us", limit);
                        return Err(Error::LockTimeout);
                    }
                    delay.delay_us(LOCK_POLL_INTERVAL_US);
                    waited_us = waited_us.saturating_add(LOCK_POLL_INTERVAL_US);
                }
            }
        }

        trace!("bus lock taken after {=u32} us", waited_us);
        Ok(BusGuard {
            arbiter: self,
            configured: None,
        })
    }
}

/// Scoped bus ownership; dropping it deasserts chip-select and unlocks.
pub struct BusGuard<'a, BUS, CS>
where
    BUS: AdcBus,
    CS: OutputPin,
{
    arbiter: &'a mut BusArbiter<BUS, CS>,
    configured: Option<BusConfig>,
}

impl<BUS, CS> BusGuard<'_, BUS, CS>
where
    BUS: AdcBus,
    CS: OutputPin,
{
    /// Applies `config`; must precede the first [`transact`](Self::transact).
    pub fn configure(&mut self, config: &BusConfig) -> Result<(), BUS::Error> {
        if !self.arbiter.bus.supports(config) {
            return Err(Error::InvalidConfig);
        }

        self.arbiter.bus.configure(config)?;
        self.configured = Some(*config);
        Ok(())
    }

    /// Full-duplex exchange of `tx` into `rx` with chip-select held low.
    ///
    /// Chip-select is driven high again even when the transfer fails.
    pub fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), BUS::Error> {
        let config = self.configured.ok_or(Error::InvalidConfig)?;
        if tx.len() != rx.len() {
            return Err(Error::BufferLength);
        }
        if config.word_size == WordSize::Bits16 && tx.len() % 2 != 0 {
            return Err(Error::BufferLength);
        }

        self.arbiter.cs.set_low().map_err(|_| Error::ChipSelect)?;
        let transferred = self.arbiter.bus.transfer(tx, rx);
        let deasserted = self.arbiter.cs.set_high();

        transferred?;
        deasserted.map_err(|_| Error::ChipSelect)
    }
}

impl<BUS, CS> Drop for BusGuard<'_, BUS, CS>
where
    BUS: AdcBus,
    CS: OutputPin,
{
    fn drop(&mut self) {
        if self.arbiter.cs.set_high().is_err() {
            error!("chip-select stuck while releasing bus");
        }
        self.arbiter.bus.unlock();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::BusArbiter;
    use crate::config::BusConfig;
    use crate::error::Error;
    use crate::interface::AdcBus;
    use crate::params::{LockTimeout, WordSize};
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    /// Bus double that replays scripted replies and records every frame.
    ///
    /// Each entry of `failures` fails the transfer of that frame index once.
    pub(crate) struct ScriptedBus {
        pub replies: Vec<[u8; 2]>,
        pub sent: Vec<[u8; 2]>,
        pub failures: Vec<usize>,
        pub stuck: bool,
        pub locked: bool,
        pub lock_attempts: usize,
        pub configures: usize,
        pub unlocks: usize,
    }

    impl ScriptedBus {
        pub(crate) fn new(replies: &[[u8; 2]]) -> Self {
            Self {
                replies: replies.to_vec(),
                sent: Vec::new(),
                failures: Vec::new(),
                stuck: false,
                locked: false,
                lock_attempts: 0,
                configures: 0,
                unlocks: 0,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct BusFault;

    impl AdcBus for ScriptedBus {
        type Error = BusFault;

        fn try_lock(&mut self) -> bool {
            self.lock_attempts += 1;
            if self.stuck || self.locked {
                return false;
            }
            self.locked = true;
            true
        }

        fn unlock(&mut self) {
            self.locked = false;
            self.unlocks += 1;
        }

        fn supports(&self, config: &BusConfig) -> bool {
            config.word_size == WordSize::Bits8
        }

        fn configure(&mut self, _config: &BusConfig) -> Result<(), BusFault> {
            self.configures += 1;
            Ok(())
        }

        fn transfer(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), BusFault> {
            let index = self.sent.len();
            if let Some(pos) = self.failures.iter().position(|&frame| frame == index) {
                self.failures.remove(pos);
                return Err(BusFault);
            }
            self.sent.push([write[0], write[1]]);
            let reply = self.replies.get(index).copied().unwrap_or([0, 0]);
            read.copy_from_slice(&reply);
            Ok(())
        }
    }

    pub(crate) fn cs_frames(frames: usize) -> Vec<PinTransaction> {
        let mut transactions = Vec::new();
        for _ in 0..frames {
            transactions.push(PinTransaction::set(PinState::Low));
            transactions.push(PinTransaction::set(PinState::High));
        }
        transactions.push(PinTransaction::set(PinState::High));
        transactions
    }

    #[test]
    fn transact_frames_exchange_with_chip_select() {
        let cs_expect = cs_frames(1);
        let mut cs = PinMock::new(&cs_expect);
        let mut arbiter = BusArbiter::new(ScriptedBus::new(&[[0x12, 0x34]]), cs.clone());

        {
            let mut guard = arbiter.acquire(LockTimeout::Forever, &mut NoopDelay::new()).unwrap();
            guard.configure(&BusConfig::default()).unwrap();
            let mut rx = [0u8; 2];
            guard.transact(&[0x80, 0x00], &mut rx).unwrap();
            assert_eq!(rx, [0x12, 0x34]);
        }

        let (bus, _) = arbiter.release();
        assert_eq!(bus.sent, [[0x80, 0x00]]);
        assert!(!bus.locked);
        assert_eq!(bus.unlocks, 1);
        cs.done();
    }

    #[test]
    fn failed_transfer_still_deasserts_and_unlocks() {
        let cs_expect = cs_frames(1);
        let mut cs = PinMock::new(&cs_expect);
        let mut bus = ScriptedBus::new(&[]);
        bus.failures.push(0);
        let mut arbiter = BusArbiter::new(bus, cs.clone());

        {
            let mut guard = arbiter.acquire(LockTimeout::Forever, &mut NoopDelay::new()).unwrap();
            guard.configure(&BusConfig::default()).unwrap();
            let mut rx = [0u8; 2];
            assert_eq!(
                guard.transact(&[0x80, 0x00], &mut rx),
                Err(Error::Transfer(BusFault))
            );
        }

        let (bus, _) = arbiter.release();
        assert!(!bus.locked);
        cs.done();
    }

    #[test]
    fn transact_requires_configuration_and_equal_buffers() {
        let cs_expect = cs_frames(0);
        let mut cs = PinMock::new(&cs_expect);
        let mut arbiter = BusArbiter::new(ScriptedBus::new(&[]), cs.clone());

        {
            let mut guard = arbiter.acquire(LockTimeout::Forever, &mut NoopDelay::new()).unwrap();
            let mut rx = [0u8; 2];
            assert_eq!(
                guard.transact(&[0x80, 0x00], &mut rx),
                Err(Error::InvalidConfig)
            );

            guard.configure(&BusConfig::default()).unwrap();
            let mut short = [0u8; 1];
            assert_eq!(
                guard.transact(&[0x80, 0x00], &mut short),
                Err(Error::BufferLength)
            );
        }

        let (bus, _) = arbiter.release();
        assert!(bus.sent.is_empty());
        cs.done();
    }

    #[test]
    fn unsupported_word_size_is_rejected() {
        let cs_expect = cs_frames(0);
        let mut cs = PinMock::new(&cs_expect);
        let mut arbiter = BusArbiter::new(ScriptedBus::new(&[]), cs.clone());

        {
            let mut guard = arbiter.acquire(LockTimeout::Forever, &mut NoopDelay::new()).unwrap();
            let sixteen = BusConfig {
                word_size: WordSize::Bits16,
                ..BusConfig::default()
            };
            assert_eq!(guard.configure(&sixteen), Err(Error::InvalidConfig));
        }

        let (bus, _) = arbiter.release();
        assert_eq!(bus.configures, 0);
        cs.done();
    }

    #[test]
    fn stuck_lock_times_out_instead_of_hanging() {
        let mut cs = PinMock::new(&[]);
        let mut bus = ScriptedBus::new(&[]);
        bus.stuck = true;
        let mut arbiter = BusArbiter::new(bus, cs.clone());

        assert!(matches!(
            arbiter.acquire(LockTimeout::Micros(50), &mut NoopDelay::new()),
            Err(Error::LockTimeout)
        ));

        let (bus, _) = arbiter.release();
        assert_eq!(bus.lock_attempts, 51);
        assert!(bus.sent.is_empty());
        assert_eq!(bus.unlocks, 0);
        cs.done();
    }

    #[test]
    fn init_drives_chip_select_idle() {
        let cs_expect = [PinTransaction::set(PinState::High)];
        let mut cs = PinMock::new(&cs_expect);
        let mut arbiter = BusArbiter::new(ScriptedBus::new(&[]), cs.clone());

        arbiter.init().unwrap();
        cs.done();
    }
}
