// src/gps/data.rs
//! Link snapshot built from the event stream

use super::fix::Fix;
use crate::link::LinkEvent;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct LinkData {
    pub endpoint: Option<String>,
    pub connected: bool,
    pub connected_since: Option<DateTime<Utc>>,
    pub last_fix: Option<Fix>,
    pub timestamp: Option<DateTime<Utc>>,   // when the last fix arrived
    pub last_position: Option<(f64, f64)>,  // survives later no-fix reports
    pub fixes: u64,                         // reports with a position
    pub no_fix_reports: u64,
    pub connects: u64,
    pub disconnects: u64,
}

impl LinkData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: Some(endpoint.to_string()),
            ..Self::default()
        }
    }

    /// Fold one event into the snapshot
    pub fn apply(&mut self, event: &LinkEvent) {
        match event {
            LinkEvent::Connected => {
                self.connected = true;
                self.connected_since = Some(Utc::now());
                self.connects += 1;
            }
            LinkEvent::Disconnected => {
                self.connected = false;
                self.connected_since = None;
                self.disconnects += 1;
            }
            LinkEvent::Fix(fix) => {
                self.last_fix = Some(*fix);
                self.update_timestamp();
                match fix.position() {
                    Some(position) => {
                        self.fixes += 1;
                        self.last_position = Some(position);
                    }
                    None => self.no_fix_reports += 1,
                }
            }
        }
    }

    /// Whether the latest report carried a position
    pub fn has_fix(&self) -> bool {
        self.last_fix.map_or(false, |fix| fix.is_determined)
    }

    /// Get the age of the last report in seconds
    pub fn age_seconds(&self) -> Option<i64> {
        self.timestamp.map(|ts| Utc::now().signed_duration_since(ts).num_seconds())
    }

    /// Check if the last report is recent (within 10 seconds)
    pub fn is_recent(&self) -> bool {
        self.age_seconds().map_or(false, |age| age < 10)
    }

    pub fn update_timestamp(&mut self) {
        self.timestamp = Some(Utc::now());
    }

    pub fn get_status_description(&self) -> String {
        match (self.connected, self.last_fix) {
            (false, _) => "Disconnected".to_string(),
            (true, None) => "Connected, waiting for data".to_string(),
            (true, Some(fix)) if fix.is_determined => "Connected, position fix".to_string(),
            (true, Some(_)) => "Connected, no fix".to_string(),
        }
    }

    /// Format coordinate for display
    pub fn format_coordinate(coord: Option<f64>) -> String {
        match coord {
            Some(val) => format!("{:>12.6}°", val),
            None => "No fix".to_string(),
        }
    }

    /// Format value with unit for display
    pub fn format_value<T: std::fmt::Display>(value: Option<T>, unit: &str) -> String {
        match value {
            Some(val) if unit.is_empty() => format!("{:>12}", val),
            Some(val) => format!("{:>12} {}", val, unit),
            None => "Unknown".to_string(),
        }
    }
}
