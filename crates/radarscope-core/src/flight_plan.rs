//! The canonical flight-plan record, its sparse amendment specifier and the
//! transfer record created when a plan changes ownership across facilities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::altitude::{parse_altitude, ParsedAltitude};
use crate::constants::*;
use crate::enums::*;
use crate::errors::{Result, ScopeError};
use crate::types::{Acid, FacilityId, Squawk};

/// Interim altitude with its qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterimAltitude {
    pub feet: u32,
    pub kind: InterimAltitudeKind,
}

/// Time at the coordination fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationTime {
    pub time: DateTime<Utc>,
    pub kind: CoordinationTimeKind,
}

/// Chain of positions an offered handoff has been redirected through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectedHandoff {
    pub original_owner: Option<String>,
    pub redirectors: Vec<String>,
    pub redirected_to: Option<String>,
}

impl RedirectedHandoff {
    pub fn last_redirector(&self) -> Option<&str> {
        self.redirectors.last().map(String::as_str)
    }

    /// True when the second redirector sends the handoff back to the first one.
    pub fn should_fallback_to_handoff(&self, position: &str, target: &str) -> bool {
        let back_to_first = self.redirectors.first().is_some_and(|first| first == target);
        let second_is_caller =
            self.redirectors.len() == 1 || self.redirectors.get(1).is_some_and(|p| p == position);
        back_to_first && second_is_caller
    }

    /// Append a redirector unless it is already the last one.
    pub fn add_redirector(&mut self, position: &str) {
        if self.last_redirector() != Some(position) {
            self.redirectors.push(position.to_string());
        }
    }

    pub fn is_active(&self) -> bool {
        self.redirected_to.is_some()
    }

    pub fn clear(&mut self) {
        *self = RedirectedHandoff::default();
    }
}

/// Canonical flight-plan record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    pub acid: Acid,
    pub beacon: Squawk,

    // --- Aircraft ---
    pub aircraft_type: String,
    pub equipment_suffix: String,
    /// Formation size.
    pub aircraft_count: u32,
    pub cwt_category: String,

    // --- Classification ---
    pub rules: FlightRules,
    pub type_of_flight: TypeOfFlight,
    pub plan_type: PlanType,

    // --- Altitudes ---
    /// Filed altitude as it travels on the wire (`350`, `FL350`, `VFR/170`, `170B210`).
    pub filed_altitude: String,
    pub assigned_altitude: Option<u32>,
    pub interim_altitude: Option<InterimAltitude>,
    pub requested_altitude: Option<u32>,
    pub pilot_reported_altitude: Option<u32>,

    // --- Route ---
    pub departure_airport: String,
    pub arrival_airport: String,
    pub entry_fix: String,
    pub exit_fix: String,
    pub route: String,
    pub coordination_fix: String,
    pub coordination_time: Option<CoordinationTime>,

    // --- Control ---
    pub tracking_controller: Option<String>,
    pub handoff_target: Option<String>,
    pub redirected_handoff: RedirectedHandoff,
    pub point_out: Option<String>,
    /// Acknowledged point-outs, newest first.
    pub point_out_history: Vec<String>,
    pub scratchpad: String,
    pub secondary_scratchpad: String,
    pub hold_for_release: bool,
    pub released: bool,

    /// Facilities already holding a copy, in the order they received it.
    pub contained_facilities: Vec<FacilityId>,
}

impl FlightPlan {
    pub fn new(acid: Acid, beacon: Squawk) -> Self {
        Self {
            acid,
            beacon,
            aircraft_type: String::new(),
            equipment_suffix: String::new(),
            aircraft_count: 1,
            cwt_category: String::new(),
            rules: FlightRules::default(),
            type_of_flight: TypeOfFlight::default(),
            plan_type: PlanType::default(),
            filed_altitude: String::new(),
            assigned_altitude: None,
            interim_altitude: None,
            requested_altitude: None,
            pilot_reported_altitude: None,
            departure_airport: String::new(),
            arrival_airport: String::new(),
            entry_fix: String::new(),
            exit_fix: String::new(),
            route: String::new(),
            coordination_fix: String::new(),
            coordination_time: None,
            tracking_controller: None,
            handoff_target: None,
            redirected_handoff: RedirectedHandoff::default(),
            point_out: None,
            point_out_history: Vec::new(),
            scratchpad: String::new(),
            secondary_scratchpad: String::new(),
            hold_for_release: false,
            released: false,
            contained_facilities: Vec::new(),
        }
    }

    /// Parsed filed altitude.
    pub fn altitude(&self) -> Result<ParsedAltitude> {
        parse_altitude(&self.filed_altitude)
    }

    pub fn contains_facility(&self, facility: &str) -> bool {
        self.contained_facilities.iter().any(|f| f.as_str() == facility)
    }

    /// Record that `facility` holds a copy. The set only grows.
    pub fn add_contained_facility(&mut self, facility: &FacilityId) {
        if !self.contains_facility(facility.as_str()) {
            self.contained_facilities.push(facility.clone());
        }
    }

    /// Current owner and handoff target are cleared together on acceptance.
    pub fn set_owner(&mut self, owner: &str) {
        self.tracking_controller = Some(owner.to_string());
        self.handoff_target = None;
        self.redirected_handoff.clear();
    }

    /// Release a departure held for release.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Err(ScopeError::AlreadyReleased(self.acid.to_string()));
        }
        self.released = true;
        self.hold_for_release = false;
        Ok(())
    }

    /// Record an acknowledged point-out, newest first.
    pub fn acknowledge_point_out(&mut self, position: &str) {
        self.point_out = None;
        self.point_out_history.insert(0, position.to_string());
        self.point_out_history.truncate(POINT_OUT_HISTORY_LEN);
    }

    /// Apply a sparse specifier atomically: on error the plan is untouched.
    pub fn amend(&mut self, amendment: &FlightPlanSpecifier) -> Result<()> {
        amendment.validate()?;
        let mut amended = self.clone();
        amendment.apply(&mut amended);
        *self = amended;
        Ok(())
    }
}

/// Sparse update of a flight plan: absent fields are left alone.
///
/// Clearable fields use `Option<Option<_>>`: `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightPlanSpecifier {
    pub beacon: Option<Squawk>,
    pub aircraft_type: Option<String>,
    pub equipment_suffix: Option<String>,
    pub aircraft_count: Option<u32>,
    pub cwt_category: Option<String>,
    pub rules: Option<FlightRules>,
    pub type_of_flight: Option<TypeOfFlight>,
    pub filed_altitude: Option<String>,
    pub assigned_altitude: Option<Option<u32>>,
    pub interim_altitude: Option<Option<InterimAltitude>>,
    pub requested_altitude: Option<Option<u32>>,
    pub pilot_reported_altitude: Option<Option<u32>>,
    pub entry_fix: Option<String>,
    pub exit_fix: Option<String>,
    pub route: Option<String>,
    pub coordination_fix: Option<String>,
    pub coordination_time: Option<CoordinationTime>,
    pub scratchpad: Option<String>,
    pub secondary_scratchpad: Option<String>,
    pub hold_for_release: Option<bool>,
}

impl FlightPlanSpecifier {
    pub fn is_empty(&self) -> bool {
        *self == FlightPlanSpecifier::default()
    }

    fn validate(&self) -> Result<()> {
        if let Some(alt) = &self.filed_altitude {
            parse_altitude(alt)?;
        }
        if let Some(sp) = &self.scratchpad {
            check_scratchpad(sp, SCRATCHPAD_MAX_LEN)?;
        }
        if let Some(sp) = &self.secondary_scratchpad {
            check_scratchpad(sp, SECONDARY_SCRATCHPAD_MAX_LEN)?;
        }
        if let Some(suffix) = &self.equipment_suffix {
            if suffix.len() > 1 || !suffix.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ScopeError::IllegalAircraftType(suffix.clone()));
            }
        }
        if self.aircraft_count == Some(0) {
            return Err(ScopeError::IllegalValue);
        }
        Ok(())
    }

    fn apply(&self, plan: &mut FlightPlan) {
        if let Some(v) = self.beacon {
            plan.beacon = v;
        }
        if let Some(v) = &self.aircraft_type {
            plan.aircraft_type = v.clone();
        }
        if let Some(v) = &self.equipment_suffix {
            plan.equipment_suffix = v.clone();
        }
        if let Some(v) = self.aircraft_count {
            plan.aircraft_count = v;
        }
        if let Some(v) = &self.cwt_category {
            plan.cwt_category = v.clone();
        }
        if let Some(v) = self.rules {
            plan.rules = v;
        }
        if let Some(v) = self.type_of_flight {
            plan.type_of_flight = v;
        }
        if let Some(v) = &self.filed_altitude {
            plan.filed_altitude = v.clone();
        }
        if let Some(v) = self.assigned_altitude {
            plan.assigned_altitude = v;
        }
        if let Some(v) = self.interim_altitude {
            plan.interim_altitude = v;
        }
        if let Some(v) = self.requested_altitude {
            plan.requested_altitude = v;
        }
        if let Some(v) = self.pilot_reported_altitude {
            plan.pilot_reported_altitude = v;
        }
        if let Some(v) = &self.entry_fix {
            plan.entry_fix = v.clone();
        }
        if let Some(v) = &self.exit_fix {
            plan.exit_fix = v.clone();
        }
        if let Some(v) = &self.route {
            if *v != plan.route {
                // A new route invalidates the chosen coordination fix.
                plan.coordination_fix.clear();
            }
            plan.route = v.clone();
        }
        if let Some(v) = &self.coordination_fix {
            plan.coordination_fix = v.clone();
        }
        if let Some(v) = self.coordination_time {
            plan.coordination_time = Some(v);
        }
        if let Some(v) = &self.scratchpad {
            plan.scratchpad = v.clone();
        }
        if let Some(v) = &self.secondary_scratchpad {
            plan.secondary_scratchpad = v.clone();
        }
        if let Some(v) = self.hold_for_release {
            plan.hold_for_release = v;
        }
    }
}

/// Validate scratchpad contents. Empty clears the scratchpad.
pub fn check_scratchpad(contents: &str, max_len: usize) -> Result<()> {
    if contents.is_empty() {
        return Ok(());
    }
    let illegal = || Err(ScopeError::IllegalScratchpad(contents.to_string()));
    if contents.len() > max_len || RESERVED_SCRATCHPADS.contains(&contents) {
        return illegal();
    }
    if contents.bytes().all(|b| b.is_ascii_digit()) {
        return illegal();
    }
    Ok(())
}

/// Transfer record: who owns a flight that has been handed into or out of a facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInformation {
    pub acid: Acid,
    pub track_owner: String,
    pub handoff_target: Option<String>,
    /// `None` marks a stale entry; it is deleted on the next push cycle.
    pub flight_plan: Option<FlightPlan>,
    /// Facility the record was received from, if any.
    pub received_from: Option<FacilityId>,
}

impl TrackInformation {
    pub fn new(acid: Acid, track_owner: &str) -> Self {
        Self {
            acid,
            track_owner: track_owner.to_string(),
            handoff_target: None,
            flight_plan: None,
            received_from: None,
        }
    }

    /// Keep the embedded plan's control fields in step with the record.
    pub fn sync_plan(&mut self) {
        if let Some(plan) = self.flight_plan.as_mut() {
            plan.tracking_controller = Some(self.track_owner.clone());
            plan.handoff_target = self.handoff_target.clone();
        }
    }
}
