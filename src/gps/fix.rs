// src/gps/fix.rs
//! Position fix decoded from a GGA sentence

use std::fmt;

/// A single position report.
///
/// When `is_determined` is false the receiver had no solution yet; the
/// coordinates are zero and must not be used. Prefer [`Fix::position`],
/// which hides them in that case.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fix {
    pub is_determined: bool,
    pub latitude: f64,
    pub longitude: f64,
}

impl Fix {
    /// Fix with a valid position
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            is_determined: true,
            latitude,
            longitude,
        }
    }

    /// Report from a receiver that has no position yet
    pub fn undetermined() -> Self {
        Self::default()
    }

    /// Latitude and longitude, if the receiver had a solution
    pub fn position(&self) -> Option<(f64, f64)> {
        self.is_determined.then_some((self.latitude, self.longitude))
    }
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position() {
            Some((lat, lon)) => write!(f, "{:.6}, {:.6}", lat, lon),
            None => write!(f, "no fix"),
        }
    }
}
