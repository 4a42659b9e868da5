//! Snapshot views: the read-only state handed to the scope after each tick.

use serde::{Deserialize, Serialize};

use crate::components::TrackDisplayState;
use crate::enums::*;
use crate::events::Event;
use crate::flight_plan::{CoordinationTime, InterimAltitude};
use crate::types::{Acid, Cid, FacilityId, Point2LL, SimTime, Squawk};

/// Complete coordination state broadcast after each tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeSnapshot {
    pub time: SimTime,
    pub phase: EnginePhase,
    pub facilities: Vec<FacilityView>,
    pub events: Vec<Event>,
}

/// One facility's plans, transfer records and tracks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacilityView {
    pub id: FacilityId,
    pub kind: FacilityKind,
    pub parent: Option<FacilityId>,
    pub plans: Vec<PlanView>,
    pub transfers: Vec<TransferView>,
    pub tracks: Vec<TrackView>,
    /// Messages waiting in the facility's inbox.
    pub pending_messages: usize,
}

/// Flight-plan fields the scope needs to build datablocks and strips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanView {
    pub acid: Acid,
    pub cid: Option<Cid>,
    pub beacon: Squawk,
    pub state: Option<PlanState>,
    pub aircraft_type: String,
    pub rules: FlightRules,
    pub type_of_flight: TypeOfFlight,
    pub filed_altitude: String,
    pub assigned_altitude: Option<u32>,
    pub interim_altitude: Option<InterimAltitude>,
    pub exit_fix: String,
    pub coordination_fix: String,
    pub coordination_time: Option<CoordinationTime>,
    pub tracking_controller: Option<String>,
    pub handoff_target: Option<String>,
    pub scratchpad: String,
    pub secondary_scratchpad: String,
    pub contained_facilities: Vec<FacilityId>,
}

/// A pending or settled transfer record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferView {
    pub acid: Acid,
    pub track_owner: String,
    pub handoff_target: Option<String>,
}

/// A radar track on the scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackView {
    pub callsign: String,
    pub beacon: Squawk,
    pub position: Point2LL,
    pub altitude: u32,
    pub groundspeed: u32,
    pub mode: TransponderMode,
    pub ident: bool,
    /// Position history for trail dots, newest first.
    pub history: Vec<Point2LL>,
    pub alternate: bool,
    pub associated: Option<Acid>,
    /// Position a handoff for this track is offered to.
    pub handoff_offer: Option<String>,
    pub display: TrackDisplayState,
}
