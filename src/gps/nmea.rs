// src/gps/nmea.rs
//! NMEA GGA sentence decoding
//!
//! Decoding is strict: a sentence either yields a complete [`Fix`] or is
//! rejected as a whole. The checksum is verified before any field is looked
//! at, so a corrupted line can never produce a position.

use super::fix::Fix;
use std::str::FromStr;
use thiserror::Error;

/// Fields in a GGA body, sentence identifier included
const GGA_FIELD_COUNT: usize = 15;
const FIX_QUALITY_FIELD: usize = 6;
const NO_FIX: &str = "0";

/// Width of the degrees part once latitude is padded to the longitude layout
const DEGREE_DIGITS: usize = 3;

/// Why a line was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed sentence: {0}")]
    Format(String),
    #[error("checksum mismatch: computed {expected:02X}, sentence says {found:02X}")]
    Checksum { expected: u32, found: u32 },
}

impl ParseError {
    fn format(msg: impl Into<String>) -> Self {
        ParseError::Format(msg.into())
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Latitude,
    Longitude,
}

/// Parse a single `$GPGGA` / `$GNGGA` sentence.
///
/// The line must not carry its terminator. A fix-quality of `0` is a
/// successful parse returning [`Fix::undetermined`].
pub fn parse_gga(line: &str) -> Result<Fix, ParseError> {
    if !line.starts_with("$GPGGA") && !line.starts_with("$GNGGA") {
        return Err(ParseError::format("not a GPGGA/GNGGA sentence"));
    }

    let (body, checksum_hex) = split_checksum(line)?;
    let found = parse_checksum(checksum_hex)?;
    let expected = checksum(body);
    if expected != found {
        return Err(ParseError::Checksum { expected, found });
    }

    let fields: Vec<&str> = body.split(',').collect();
    if fields.len() != GGA_FIELD_COUNT {
        return Err(ParseError::format(format!(
            "expected {} fields, got {}",
            GGA_FIELD_COUNT,
            fields.len()
        )));
    }

    if fields[FIX_QUALITY_FIELD] == NO_FIX {
        return Ok(Fix::undetermined());
    }

    let latitude = parse_coordinate(fields[2], fields[3], Axis::Latitude)?;
    let longitude = parse_coordinate(fields[4], fields[5], Axis::Longitude)?;

    Ok(Fix::new(latitude, longitude))
}

/// XOR of every character code in a sentence body (between `$` and `*`)
pub fn checksum(body: &str) -> u32 {
    body.chars().fold(0, |acc, ch| acc ^ ch as u32)
}

impl FromStr for Fix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_gga(s)
    }
}

/// Split `$body*CS` into body and checksum text
fn split_checksum(line: &str) -> Result<(&str, &str), ParseError> {
    let parts: Vec<&str> = line.split(&['$', '*'][..]).collect();
    match parts.as_slice() {
        [prefix, body, checksum] if prefix.is_empty() => Ok((body, checksum)),
        _ => Err(ParseError::format(format!(
            "expected `$body*checksum`, got {} segments",
            parts.len()
        ))),
    }
}

fn parse_checksum(hex: &str) -> Result<u32, ParseError> {
    if hex.len() != 2 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseError::format(format!("bad checksum `{}`", hex)));
    }
    u32::from_str_radix(hex, 16).map_err(|e| ParseError::format(format!("bad checksum `{}`: {}", hex, e)))
}

/// Decode `dddmm.mmmm` (latitude arrives as `ddmm.mmmm`) into signed degrees
fn parse_coordinate(value: &str, hemisphere: &str, axis: Axis) -> Result<f64, ParseError> {
    let padded;
    let value = match axis {
        // latitude has one degree digit less than longitude
        Axis::Latitude => {
            padded = format!("0{}", value);
            padded.as_str()
        }
        Axis::Longitude => value,
    };

    if !value.is_ascii() || value.len() <= DEGREE_DIGITS {
        return Err(ParseError::format(format!("bad {:?} `{}`", axis, value)));
    }
    let (degrees, minutes) = value.split_at(DEGREE_DIGITS);

    if !degrees.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::format(format!("bad {:?} degrees `{}`", axis, degrees)));
    }
    if !is_decimal(minutes) {
        return Err(ParseError::format(format!("bad {:?} minutes `{}`", axis, minutes)));
    }

    let degrees: u32 = degrees
        .parse()
        .map_err(|e| ParseError::format(format!("bad {:?} degrees: {}", axis, e)))?;
    let minutes: f64 = minutes
        .parse()
        .map_err(|e| ParseError::format(format!("bad {:?} minutes: {}", axis, e)))?;

    let coordinate = degrees as f64 + minutes / 60.0;

    match (axis, hemisphere) {
        (Axis::Latitude, "N") | (Axis::Longitude, "E") => Ok(coordinate),
        (Axis::Latitude, "S") | (Axis::Longitude, "W") => Ok(-coordinate),
        _ => Err(ParseError::format(format!(
            "bad {:?} hemisphere `{}`",
            axis, hemisphere
        ))),
    }
}

/// Digits with exactly one `.`, nothing else. Keeps `f64::from_str` away from
/// `inf`, `NaN`, exponents and signs.
fn is_decimal(s: &str) -> bool {
    let mut dots = 0;
    let mut digits = 0;
    for b in s.bytes() {
        match b {
            b'.' => dots += 1,
            b'0'..=b'9' => digits += 1,
            _ => return false,
        }
    }
    dots == 1 && digits > 0
}
