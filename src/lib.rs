//! `#![no_std]` acquisition driver for a pipelined four-channel SPI ADC, the
//! on-die analog channels and the die temperature sensor.
#![no_std]
#![warn(missing_docs)]

#[macro_use]
mod log;

mod error;

pub mod arbiter;
pub mod channel;
pub mod config;
pub mod external;
pub mod frame;
pub mod interface;
pub mod internal;
pub mod params;
pub mod pipeline;
pub mod reading;
pub mod snapshot;
pub mod temperature;

pub use crate::error::{Error, Result};
pub use crate::external::ExternalAdc;
pub use crate::internal::InternalAdc;
pub use crate::snapshot::{Acquisition, Snapshot, SourceScale};
