//! Radar-track records held by terminal facilities.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::enums::TransponderMode;
use crate::message::RadarReturn;
use crate::types::{Acid, Point2LL, Squawk};

/// Live radar-track view of one flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Call-sign broadcast by the aircraft.
    pub callsign: String,
    pub beacon: Squawk,
    pub position: Point2LL,
    /// Transponder altitude (feet).
    pub altitude: u32,
    /// Ground speed (knots).
    pub groundspeed: u32,
    pub mode: TransponderMode,
    pub ident: bool,
    /// Previous positions, newest first.
    pub history: VecDeque<Point2LL>,
    pub last_history_sample: DateTime<Utc>,
    pub last_alternation: DateTime<Utc>,
    /// Flips at the alternation cadence; the display alternates datablock fields on it.
    pub alternate: bool,
    /// Flight plan this track is associated with.
    pub associated: Option<Acid>,
}

impl TrackInfo {
    /// Create a track from its first radar return.
    pub fn from_return(ret: &RadarReturn, now: DateTime<Utc>) -> Self {
        Self {
            callsign: ret.callsign.clone(),
            beacon: ret.beacon,
            position: ret.position,
            altitude: ret.altitude,
            groundspeed: ret.groundspeed,
            mode: ret.mode,
            ident: ret.ident,
            history: VecDeque::with_capacity(TRACK_HISTORY_LEN),
            last_history_sample: now,
            last_alternation: now,
            alternate: false,
            associated: None,
        }
    }

    /// Apply a new return, advancing the history ring and the alternation flag
    /// when their intervals have elapsed.
    pub fn apply_return(&mut self, ret: &RadarReturn, now: DateTime<Utc>) {
        if (now - self.last_history_sample).num_seconds() >= TRACK_HISTORY_INTERVAL_SECS {
            self.history.push_front(self.position);
            self.history.truncate(TRACK_HISTORY_LEN);
            self.last_history_sample = now;
        }
        if (now - self.last_alternation).num_seconds() >= DISPLAY_ALTERNATION_SECS {
            self.alternate = !self.alternate;
            self.last_alternation = now;
        }

        self.beacon = ret.beacon;
        self.position = ret.position;
        self.altitude = ret.altitude;
        self.groundspeed = ret.groundspeed;
        self.mode = ret.mode;
        self.ident = ret.ident;
    }
}

/// Per-flight display toggles owned by the scope, not by the flight plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDisplayState {
    pub jring: bool,
    pub reduced_jring: bool,
    /// Voice-communication indicator (on frequency).
    pub on_frequency: bool,
    pub forced_datablock: bool,
    pub route_lines: bool,
}
