//! Identifiers, geodesy and simulation time.

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::{Result, ScopeError};

/// Transponder beacon code: four octal digits, 0000-7777.
///
/// Serialized as its four-digit display form so plans read naturally in JSON.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Squawk(pub u16);

impl Squawk {
    /// Placeholder code carried by plans that have no assignment yet.
    pub const PLACEHOLDER: Squawk = Squawk(0);

    /// Parse base-8 text. An empty string parses to 0000.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Squawk::PLACEHOLDER);
        }
        if text.len() > 4 || !text.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            return Err(ScopeError::InvalidSquawk(text.to_string()));
        }
        let code = u16::from_str_radix(text, 8)
            .map_err(|_| ScopeError::InvalidSquawk(text.to_string()))?;
        if code > BEACON_MAX {
            return Err(ScopeError::InvalidSquawk(text.to_string()));
        }
        Ok(Squawk(code))
    }

    pub fn is_placeholder(&self) -> bool {
        self.0 == 0
    }

    /// True when the two low octal digits are zero (1100, 2300, ...).
    pub fn ends_in_00(&self) -> bool {
        self.0 % BEACON_BANK_SIZE == 0
    }
}

impl fmt::Display for Squawk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}

impl TryFrom<String> for Squawk {
    type Error = ScopeError;

    fn try_from(value: String) -> Result<Self> {
        Squawk::parse(&value)
    }
}

impl From<Squawk> for String {
    fn from(value: Squawk) -> Self {
        value.to_string()
    }
}

/// Three-digit computer ID shown on a flight strip.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cid(pub u16);

impl Cid {
    /// Parse exactly three decimal digits.
    pub fn parse(text: &str) -> Option<Self> {
        if text.len() != 3 || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        text.parse().ok().map(Cid)
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

/// Aircraft identifier used by controllers: starts with a letter, at most seven characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acid(String);

impl Acid {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim().to_ascii_uppercase();
        let starts_with_letter = text
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic());
        if !starts_with_letter
            || text.len() > ACID_MAX_LEN
            || !text.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ScopeError::IllegalAcid(text));
        }
        Ok(Acid(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Acid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Acid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Three-character facility identifier (ZNY, N90, PHL).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacilityId(String);

impl FacilityId {
    pub fn new(id: impl Into<String>) -> Self {
        FacilityId(id.into().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Well-formed ids are three ASCII alphanumerics.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == FACILITY_ID_LEN && self.0.bytes().all(|b| b.is_ascii_alphanumeric())
    }
}

impl fmt::Display for FacilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for FacilityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FacilityId {
    fn from(value: &str) -> Self {
        FacilityId::new(value)
    }
}

/// Message source: sending facility followed by the HHMM it was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(facility: &FacilityId, time: &SimTime) -> Self {
        SourceId(format!("{}{}", facility, time.hhmm()))
    }

    /// Wrap raw text received off the wire without validation.
    pub fn raw(text: impl Into<String>) -> Self {
        SourceId(text.into())
    }

    /// Sending facility, or `None` when the id is too short to carry one.
    pub fn facility(&self) -> Option<&str> {
        self.0.get(..FACILITY_ID_LEN)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Latitude/longitude in decimal degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2LL {
    pub lat: f64,
    pub lon: f64,
}

impl Point2LL {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in nautical miles (haversine).
    pub fn nm_distance_to(&self, other: &Point2LL) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_NM * a.sqrt().min(1.0).asin()
    }
}

/// Simulation time tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimTime {
    /// Current tick number (increments by 1 each tick).
    pub tick: u64,
    /// Simulated UTC wall clock.
    pub now: DateTime<Utc>,
}

impl SimTime {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self { tick: 0, now }
    }

    /// Advance by one tick of `secs` simulated seconds.
    pub fn advance(&mut self, secs: u32) {
        self.tick += 1;
        self.now += TimeDelta::seconds(i64::from(secs));
    }

    /// `HHMMZ`, as printed on strips and source-IDs.
    pub fn zulu(&self) -> String {
        self.now.format("%H%MZ").to_string()
    }

    pub fn hhmm(&self) -> String {
        self.now.format("%H%M").to_string()
    }
}
