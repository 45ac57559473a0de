// src/lib.rs
//! GGA Monitor Library
//!
//! Reads NMEA GGA sentences from a GPS receiver over TCP, validates them and
//! hands position fixes to subscribers. The connection heals itself when the
//! receiver stalls, hangs up or is not there yet.

pub mod config;
pub mod display;
pub mod error;
pub mod gps;
pub mod link;
pub mod logging;
pub mod monitor;

// Re-export main types for convenience
pub use error::{GgaError, Result};
pub use gps::{parse_gga, Fix, LinkData, ParseError};
pub use link::{Endpoint, GgaClient, LinkEvent, LinkSettings};
pub use monitor::GgaMonitor;
