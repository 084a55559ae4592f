//! 1-Wire bus discovery and addressing in Rust
//!
//! This crate implements the network layer of a 1-Wire bus master: ROM search
//! singulation, ROM function commands and a session manager that sequences
//! bus ownership and power around them.
//!
//! # Features
//! - Binary tree ROM search (normal and alarm)
//! - READ ROM, MATCH ROM, SKIP ROM and RESUME commands
//! - Session acquire/scan/release with per-family sleep handling
//! - DS2484 I2C bridge transport on top of `embedded-hal`
//! - Optional `defmt` logging
//! - No unsafe code
//!
//! # Example
//! ```no_run
//! use w1net::{
//!     bus::{Ds2484, Ds2484Config, NoPin},
//!     config::SessionConfig,
//!     session::Session,
//! };
//! # fn run<I2C, D>(i2c: I2C, delay: D)
//! # where
//! #     I2C: embedded_hal::blocking::i2c::Read + embedded_hal::blocking::i2c::Write,
//! #     D: embedded_hal::blocking::delay::DelayMs<u8>,
//! # {
//!
//! // Bring up the bridge
//! let bridge = Ds2484::new(i2c, None::<NoPin>, Ds2484Config::default()).unwrap();
//! let mut session = Session::new(bridge, delay, SessionConfig::default());
//!
//! // Enumerate the bus
//! session.acquire().unwrap();
//! let report = session.scan(|rom| -> Result<(), ()> {
//!     let _family = rom.family;
//!     Ok(())
//! });
//! let _count = report.into_result().unwrap();
//! session.release().into_result().unwrap();
//! # }
//! ```

#![warn(missing_docs)]
#![no_std]

// This must go first so the logging macros are visible to every module
#[macro_use]
mod fmt;

/// Bus master abstraction and drivers
pub mod bus;

/// ROM function commands
pub mod command;

/// Session configuration
pub mod config;

/// Error types
pub mod error;

/// ROM identifiers and CRC-8
pub mod rom;

/// ROM search
pub mod search;

/// Bus session manager
pub mod session;

pub use error::{Error, ErrorKind, Report, Warning};
pub use rom::Rom;
