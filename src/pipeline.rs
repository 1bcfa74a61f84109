//! Latency compensation for converters that answer one frame late.
//!
//! The converter clocks out the result of the *previous* command while it
//! receives the next one. Reading channels `c0..cN` therefore needs an extra
//! frame: a warm-up frame carrying `c0`'s command whose reply is meaningless,
//! then one frame per channel, each carrying the *next* channel's command
//! while returning the current channel's result.
//!
//! ```text
//! frame   sends      receives
//!   0     cmd(c0)    (discarded)
//!   1     cmd(c1)    result(c0)
//!   2     cmd(c2)    result(c1)
//!   ..
//!   N     cmd(c0)    result(cN-1)
//! ```

use embedded_hal::delay::DelayNs;

use crate::channel::{ChannelId, CommandTable};
use crate::frame::FRAME_LEN;
use crate::params::Strategy;

/// Runs one channel sequence with a fixed strategy and settle time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipelinedConverter {
    strategy: Strategy,
    settle_us: u32,
}

impl PipelinedConverter {
    /// Creates a converter; `settle_us` separates consecutive frames.
    pub const fn new(strategy: Strategy, settle_us: u32) -> Self {
        Self {
            strategy,
            settle_us,
        }
    }

    /// Strategy used by this converter.
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Physical frames needed for `channels` logical reads.
    pub const fn transactions(&self, channels: usize) -> usize {
        self.strategy.transactions(channels)
    }

    /// Reads `channels` and stores the reply frame of `channels[i]` in
    /// `replies[i]`.
    ///
    /// `exchange` performs one complete frame: it sends the command byte and
    /// returns the bytes clocked back. The first error aborts the sequence;
    /// replies already stored are left in place, but a caller retrying must
    /// start a fresh sequence because the converter's pending command is
    /// unknown.
    ///
    /// Callers check that `replies` is at least as long as `channels`.
    pub(crate) fn convert<E, F>(
        &self,
        channels: &[ChannelId],
        commands: &CommandTable,
        replies: &mut [[u8; FRAME_LEN]],
        delay: &mut impl DelayNs,
        mut exchange: F,
    ) -> core::result::Result<(), E>
    where
        F: FnMut(u8) -> core::result::Result<[u8; FRAME_LEN], E>,
    {
        let Some(&first) = channels.first() else {
            return Ok(());
        };
        let replies = &mut replies[..channels.len()];

        match self.strategy {
            Strategy::Pipelined => {
                let _warm_up = exchange(commands.encode(first))?;
                for (i, reply) in replies.iter_mut().enumerate() {
                    delay.delay_us(self.settle_us);
                    let next = channels[(i + 1) % channels.len()];
                    *reply = exchange(commands.encode(next))?;
                }
            }
            Strategy::Repeated => {
                for (i, (&channel, reply)) in channels.iter().zip(replies.iter_mut()).enumerate() {
                    if i > 0 {
                        delay.delay_us(self.settle_us);
                    }
                    let command = commands.encode(channel);
                    let _stale = exchange(command)?;
                    delay.delay_us(self.settle_us);
                    *reply = exchange(command)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::cell::RefCell;
    use std::vec::Vec;

    use super::PipelinedConverter;
    use crate::channel::{ChannelId, CommandTable};
    use crate::params::Strategy;
    use embedded_hal::delay::DelayNs;
    use embedded_hal_mock::eh1::delay::NoopDelay;

    const COMMANDS: [u8; 4] = [0x00, 0x08, 0x10, 0x18];

    /// Simulated converter answering each frame with the previous command.
    fn lagging_device(sent: &mut Vec<u8>) -> impl FnMut(u8) -> Result<[u8; 2], ()> + '_ {
        let mut pending: Option<u8> = None;
        move |command| {
            sent.push(command);
            let reply = match pending {
                Some(previous) => [0xA0 | (previous >> 3), previous],
                None => [0xEE, 0xEE],
            };
            pending = Some(command);
            Ok(reply)
        }
    }

    #[test]
    fn pipelined_uses_n_plus_one_frames_in_logical_order() {
        let table = CommandTable::new(COMMANDS).unwrap();
        let converter = PipelinedConverter::new(Strategy::Pipelined, 1);
        let mut sent = Vec::new();
        let mut replies = [[0u8; 2]; 4];

        converter
            .convert(
                &ChannelId::ALL,
                &table,
                &mut replies,
                &mut NoopDelay::new(),
                lagging_device(&mut sent),
            )
            .unwrap();

        assert_eq!(sent, [0x00, 0x08, 0x10, 0x18, 0x00]);
        assert_eq!(sent.len(), converter.transactions(4));
        for (i, reply) in replies.iter().enumerate() {
            assert_eq!(reply[1], COMMANDS[i], "reply {i} belongs to channel {i}");
        }
    }

    #[test]
    fn repeated_uses_two_frames_per_channel() {
        let table = CommandTable::new(COMMANDS).unwrap();
        let converter = PipelinedConverter::new(Strategy::Repeated, 1);
        let mut sent = Vec::new();
        let mut replies = [[0u8; 2]; 4];

        converter
            .convert(
                &ChannelId::ALL,
                &table,
                &mut replies,
                &mut NoopDelay::new(),
                lagging_device(&mut sent),
            )
            .unwrap();

        assert_eq!(sent, [0x00, 0x00, 0x08, 0x08, 0x10, 0x10, 0x18, 0x18]);
        assert_eq!(sent.len(), converter.transactions(4));
        for (i, reply) in replies.iter().enumerate() {
            assert_eq!(reply[1], COMMANDS[i]);
        }
    }

    #[test]
    fn subsequence_wraps_back_to_its_own_first_channel() {
        let table = CommandTable::new(COMMANDS).unwrap();
        let converter = PipelinedConverter::new(Strategy::Pipelined, 1);
        let channels = [ChannelId::ALL[3], ChannelId::ALL[1]];
        let mut sent = Vec::new();
        let mut replies = [[0u8; 2]; 4];

        converter
            .convert(
                &channels,
                &table,
                &mut replies,
                &mut NoopDelay::new(),
                lagging_device(&mut sent),
            )
            .unwrap();

        assert_eq!(sent, [0x18, 0x08, 0x18]);
        assert_eq!(replies[0][1], 0x18);
        assert_eq!(replies[1][1], 0x08);
        assert_eq!(replies[2], [0, 0]);
    }

    #[test]
    fn empty_sequence_sends_nothing() {
        let table = CommandTable::new(COMMANDS).unwrap();
        let converter = PipelinedConverter::new(Strategy::Pipelined, 1);
        let mut sent = Vec::new();
        let mut replies = [[0u8; 2]; 0];

        converter
            .convert(
                &[],
                &table,
                &mut replies,
                &mut NoopDelay::new(),
                lagging_device(&mut sent),
            )
            .unwrap();

        assert!(sent.is_empty());
        assert_eq!(converter.transactions(0), 0);
    }

    #[test]
    fn first_error_stops_the_sequence() {
        let table = CommandTable::new(COMMANDS).unwrap();
        let converter = PipelinedConverter::new(Strategy::Pipelined, 1);
        let mut frames = 0;
        let mut replies = [[0u8; 2]; 4];

        let result = converter.convert(
            &ChannelId::ALL,
            &table,
            &mut replies,
            &mut NoopDelay::new(),
            |_| {
                frames += 1;
                if frames == 3 { Err("bus fault") } else { Ok([0, 0]) }
            },
        );

        assert_eq!(result, Err("bus fault"));
        assert_eq!(frames, 3);
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Frame(u8),
        Settle(u32),
    }

    /// Delay that records every wait into a shared event log.
    struct RecordingDelay<'a>(&'a RefCell<Vec<Event>>);

    impl DelayNs for RecordingDelay<'_> {
        fn delay_ns(&mut self, ns: u32) {
            self.0.borrow_mut().push(Event::Settle(ns.div_ceil(1_000)));
        }

        fn delay_us(&mut self, us: u32) {
            self.0.borrow_mut().push(Event::Settle(us));
        }
    }

    fn record(strategy: Strategy, settle_us: u32) -> Vec<Event> {
        let table = CommandTable::new(COMMANDS).unwrap();
        let converter = PipelinedConverter::new(strategy, settle_us);
        let events = RefCell::new(Vec::new());
        let mut replies = [[0u8; 2]; 4];

        converter
            .convert(
                &ChannelId::ALL,
                &table,
                &mut replies,
                &mut RecordingDelay(&events),
                |command| {
                    events.borrow_mut().push(Event::Frame(command));
                    Ok::<_, ()>([0, 0])
                },
            )
            .unwrap();

        events.into_inner()
    }

    #[test]
    fn pipelined_settles_between_every_pair_of_frames() {
        use Event::{Frame, Settle};

        let events = record(Strategy::Pipelined, 5);
        assert_eq!(
            events,
            [
                Frame(0x00),
                Settle(5),
                Frame(0x08),
                Settle(5),
                Frame(0x10),
                Settle(5),
                Frame(0x18),
                Settle(5),
                Frame(0x00),
            ]
        );
    }

    #[test]
    fn repeated_settles_between_every_pair_of_frames() {
        let events = record(Strategy::Repeated, 7);

        let settles: Vec<u32> = events
            .iter()
            .filter_map(|event| match event {
                Event::Settle(us) => Some(*us),
                Event::Frame(_) => None,
            })
            .collect();
        assert_eq!(settles, [7; 7]);

        // Frames and settle delays strictly alternate, starting and ending on a frame.
        for (i, event) in events.iter().enumerate() {
            assert_eq!(matches!(event, Event::Frame(_)), i % 2 == 0, "event {i}");
        }
        assert_eq!(events.len(), 15);
    }
}
