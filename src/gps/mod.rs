// src/gps/mod.rs
//! GPS data handling and parsing

pub mod data;
pub mod fix;
pub mod nmea;

pub use data::LinkData;
pub use fix::Fix;
pub use nmea::{parse_gga, ParseError};
