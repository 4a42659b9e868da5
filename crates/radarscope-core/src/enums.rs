//! Enumeration types used throughout the coordination core.

use serde::{Deserialize, Serialize};

/// Flight rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlightRules {
    #[default]
    Ifr,
    Vfr,
}

/// Type of flight relative to the facility's airspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeOfFlight {
    Arrival,
    Departure,
    #[default]
    Overflight,
}

/// Interim altitude qualifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterimAltitudeKind {
    #[default]
    Normal,
    /// `P` prefix: procedure altitude.
    Procedure,
    /// `L` prefix: local altitude.
    Local,
}

/// Coordination time qualifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordinationTimeKind {
    /// Proposed (departure) time.
    P,
    /// Actual time.
    A,
    /// Estimated time over the coordination fix.
    #[default]
    E,
}

/// Where a flight plan came from and whether it is enroute-managed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanType {
    #[default]
    RemoteEnroute,
    RemoteNonEnroute,
    LocalEnroute,
    LocalNonEnroute,
}

/// Wire message kinds exchanged between facility computers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    #[default]
    Plan,
    Amendment,
    Cancellation,
    RequestFlightPlan,
    DepartureDM,
    BeaconTerminate,
    InitiateTransfer,
    AcceptRecallTransfer,
    TrackUpdate,
}

/// How an adaptation fix decides which facility takes a flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixKind {
    #[default]
    Route,
    Zone,
    Procedure,
}

/// Facility tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityKind {
    /// Center (ERAM).
    #[default]
    Enroute,
    /// Approach control (STARS).
    Terminal,
}

/// Transponder mode reported by the radar feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransponderMode {
    Standby,
    #[default]
    Altitude,
}

/// Per-ACID lifecycle at a terminal facility. Absence means no plan (or dropped).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanState {
    /// Plan held but not yet tracked.
    #[default]
    Proposed,
    /// Tracked by a position of this facility.
    TrackedLocally,
    /// A handoff is outstanding.
    HandoffOffered,
    /// Tracked by a position of another facility.
    TrackedByPeer,
}

/// Whether the engine is advancing time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnginePhase {
    #[default]
    Running,
    Paused,
}
