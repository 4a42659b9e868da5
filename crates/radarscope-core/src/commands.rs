//! Controller commands sent from the scope to the coordination core.
//!
//! Commands either run immediately (returning a typed error) or are queued
//! for processing at the next tick boundary.

use serde::{Deserialize, Serialize};

use crate::enums::*;
use crate::types::Squawk;

/// All possible controller actions. `flid` is a beacon code, CID or ACID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControllerCommand {
    // --- Track ownership ---
    /// Start tracking a proposed flight plan.
    StartTrack { flid: String },
    /// Offer a handoff to another position.
    InitiateHandoff { flid: String, to_position: String },
    /// Accept a handoff offered to this position.
    AcceptHandoff { flid: String },
    /// Accept if a handoff is offered, otherwise toggle the forced data block.
    AcceptOrForceDatablock { flid: String },
    /// Take back a handoff this position offered.
    RecallHandoff { flid: String },
    /// Pass an offered handoff on to another local position.
    RedirectHandoff { flid: String, to_position: String },
    /// Stop tracking.
    DropTrack { flid: String },
    PointOut { flid: String, to_position: String },
    AcknowledgePointOut { flid: String },
    RejectPointOut { flid: String },

    // --- Flight data ---
    AmendInterimAltitude {
        flid: String,
        feet: u32,
        kind: InterimAltitudeKind,
    },
    AmendAssignedAltitude { flid: String, feet: u32 },
    /// Route direct to a fix, replacing the exit fix.
    DirectTo { flid: String, fix: String },
    /// Abbreviated flight-plan entry.
    EnterFlightPlan { text: String },
    /// Ask the overlying enroute facility for the plan with this beacon.
    RequestFlightPlan { beacon: Squawk },
    ReleaseDeparture { flid: String },

    // --- Display ---
    ToggleJRing { flid: String },
    ToggleReducedJRing { flid: String },
    ShowRouteLines { flid: String },
    ClearRouteLines,
    ToggleOnFrequency { flid: String },

    // --- Aircraft ---
    /// Relay pilot commands to the aircraft whose call-sign ends in `suffix`.
    RelayToAircraft { suffix: String, commands: String },

    // --- Simulation control ---
    Pause,
    Resume,
    TogglePause,
}

/// What a successful command shows the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Text for the big-output area; the previous error text is cleared.
    pub big_output: String,
}

impl CommandOutput {
    pub fn accept(action: &str, flight: &str) -> Self {
        Self {
            big_output: format!("ACCEPT\n{action}\n{flight}"),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}
