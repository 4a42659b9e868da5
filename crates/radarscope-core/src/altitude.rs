//! Altitude strings as they appear in flight plans and messages.
//!
//! Accepted forms: `NNN` (hundreds of feet), `FLNNN`, `VFR`, `VFR/NNN` and
//! blocks `NNNBNNN`.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ScopeError};

/// Normalized altitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Altitude {
    /// A single altitude in feet.
    Feet { feet: u32 },
    /// VFR with no altitude.
    Vfr,
    /// VFR at an altitude in feet.
    VfrAt { feet: u32 },
    /// Block altitude in feet, floor to ceiling.
    Block { floor: u32, ceiling: u32 },
}

/// A parsed altitude together with the text it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAltitude {
    pub altitude: Altitude,
    pub original: String,
}

impl Altitude {
    /// Hundreds of feet used to pick an adaptation entry. Blocks select on their floor.
    pub fn selection_hundreds(&self) -> Option<u32> {
        match self {
            Altitude::Feet { feet } | Altitude::VfrAt { feet } => Some(feet / 100),
            Altitude::Block { floor, .. } => Some(floor / 100),
            Altitude::Vfr => None,
        }
    }

    pub fn is_vfr(&self) -> bool {
        matches!(self, Altitude::Vfr | Altitude::VfrAt { .. })
    }
}

/// Parse an altitude string.
pub fn parse_altitude(text: &str) -> Result<ParsedAltitude> {
    let original = text.trim().to_string();
    let upper = original.to_ascii_uppercase();
    let illegal = || ScopeError::IllegalAltitude(original.clone());

    let altitude = if upper == "VFR" {
        Altitude::Vfr
    } else if let Some(rest) = upper.strip_prefix("VFR/") {
        Altitude::VfrAt {
            feet: hundreds(rest).ok_or_else(illegal)? * 100,
        }
    } else if let Some(rest) = upper.strip_prefix("FL") {
        Altitude::Feet {
            feet: hundreds(rest).ok_or_else(illegal)? * 100,
        }
    } else if let Some((lo, hi)) = upper.split_once('B') {
        let floor = hundreds(lo).ok_or_else(illegal)? * 100;
        let ceiling = hundreds(hi).ok_or_else(illegal)? * 100;
        if floor > ceiling {
            return Err(illegal());
        }
        Altitude::Block { floor, ceiling }
    } else {
        Altitude::Feet {
            feet: hundreds(&upper).ok_or_else(illegal)? * 100,
        }
    };

    Ok(ParsedAltitude { altitude, original })
}

/// Exactly three decimal digits, read as hundreds of feet.
pub fn hundreds(text: &str) -> Option<u32> {
    if text.len() == 3 && text.bytes().all(|b| b.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}
