//! Bus session configuration
//!
//! This module contains the knobs of the session manager:
//! - Settle delay after powering the bus master
//! - Device family that needs an explicit sleep request before power down
//! - Search flavour used by scans

/// Session configuration
pub mod session;

pub use session::SessionConfig;
