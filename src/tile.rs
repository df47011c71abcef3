//! Provider tile codes and Julian day-of-year codes.

use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate};
use geo::{coord, Rect};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Side length of a tile in degrees.
pub const TILE_SIZE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
/// A DFO grid cell identifier such as `080e030n`: three digits of longitude,
/// `e`/`w`, three digits of latitude, `n`/`s`.
pub struct TileCode(String);

impl TileCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extent of the tile in degrees. The code names the north-west corner:
    /// `080e030n` covers 80°E to 90°E and 20°N to 30°N.
    pub fn footprint(&self) -> Rect<f64> {
        let bytes = self.0.as_bytes();
        let degrees = |digits: &[u8]| {
            digits
                .iter()
                .fold(0.0, |acc, d| acc * 10.0 + f64::from(d - b'0'))
        };

        let west = match bytes[3] {
            b'w' => -degrees(&bytes[0..3]),
            _ => degrees(&bytes[0..3]),
        };
        let north = match bytes[7] {
            b's' => -degrees(&bytes[4..7]),
            _ => degrees(&bytes[4..7]),
        };

        Rect::new(
            coord! { x: west, y: north - TILE_SIZE },
            coord! { x: west + TILE_SIZE, y: north },
        )
    }
}

impl FromStr for TileCode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_lowercase();
        let bytes = code.as_bytes();

        let valid = bytes.len() == 8
            && bytes[0..3].iter().all(u8::is_ascii_digit)
            && matches!(bytes[3], b'e' | b'w')
            && bytes[4..7].iter().all(u8::is_ascii_digit)
            && matches!(bytes[7], b'n' | b's');

        if valid {
            Ok(TileCode(code))
        } else {
            Err(ConfigError::InvalidTile(s.to_string()))
        }
    }
}

impl TryFrom<String> for TileCode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for TileCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Formats a date as the provider's `YYYYDDD` code.
pub fn julian_code(date: NaiveDate) -> String {
    format!("{:04}{:03}", date.year(), date.ordinal())
}

/// Parses a `YYYYDDD` code. Returns `None` unless the input is exactly seven
/// digits naming a real day.
pub fn parse_julian(code: &str) -> Option<NaiveDate> {
    if code.len() != 7 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = code[0..4].parse().ok()?;
    let ordinal: u32 = code[4..7].parse().ok()?;

    NaiveDate::from_yo_opt(year, ordinal)
}

// -- Tests -------------------------------------------------------------------
