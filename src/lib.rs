#![cfg_attr(not(test), no_std)]
#![allow(clippy::unnecessary_lazy_evaluations)]
#![allow(clippy::single_component_path_imports)]
// large enum variants are unavoidable in no_std, since we can't box things
#![allow(clippy::large_enum_variant, clippy::result_large_err)]

//! A non-blocking engine for AT command GSM/GPRS modems.
//!
//! The [Modem](modem::Modem) owns a small receive buffer and a transmit queue and never touches
//! the serial port itself. Commands are multi-step state machines that advance every time
//! [Modem::poll](modem::Modem::poll) is called, while unsolicited result codes (incoming calls,
//! dropped calls, closed sockets) are recognised on the same byte stream.
//!
//! [pump::IoPump] moves bytes between the engine and an `embedded-io-async` serial port.

pub mod at_command;
pub mod buffer;
pub mod client;
mod error;
pub mod modem;
pub mod pump;
pub mod server;
mod slot;
pub mod sms;
pub mod tcp;
mod util;
pub mod voice;

#[cfg(test)]
mod test;

pub use util::Lagged;

#[cfg(all(feature = "log", feature = "defmt"))]
compile_error!("'log' and 'defmt' features are mutually exclusive");
#[cfg(not(any(feature = "log", feature = "defmt")))]
compile_error!("please enable a logging feature, e.g. 'log' or 'defmt'");
#[cfg(feature = "defmt")]
pub(crate) use defmt as log;
#[cfg(feature = "log")]
pub(crate) use log;

pub use error::{CommandError, Error};
pub use modem::{Modem, ModemConfig};
pub use slot::{SocketId, MAX_SOCKETS};
