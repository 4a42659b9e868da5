//! Events emitted by the coordination core for the scope and strip bay.

use serde::{Deserialize, Serialize};

use crate::types::{Acid, FacilityId, Point2LL};

/// Outbound event stream, drained into every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A new strip appeared in a facility's strip bay.
    PushedFlightStrip { facility: FacilityId, acid: Acid },
    /// A radar track was linked to its flight plan.
    FlightPlanAssociated { facility: FacilityId, acid: Acid },
    OfferedHandoff {
        facility: FacilityId,
        acid: Acid,
        from: String,
        to: String,
    },
    AcceptedHandoff {
        facility: FacilityId,
        acid: Acid,
        from: String,
        to: String,
    },
    AcceptedRedirectedHandoff {
        facility: FacilityId,
        acid: Acid,
        from: String,
        to: String,
    },
    CanceledHandoff {
        facility: FacilityId,
        acid: Acid,
        from: String,
        to: String,
    },
    /// Control moved to another position without a handoff handshake.
    HandoffControl {
        facility: FacilityId,
        acid: Acid,
        to: String,
    },
    PointOut {
        facility: FacilityId,
        acid: Acid,
        from: String,
        to: String,
    },
    AcknowledgedPointOut {
        facility: FacilityId,
        acid: Acid,
        position: String,
    },
    RejectedPointOut {
        facility: FacilityId,
        acid: Acid,
        position: String,
    },
    /// An inbound transfer found its plan.
    TransferAccepted { facility: FacilityId, acid: Acid },
    /// An inbound transfer named a flight the facility has no plan for.
    TransferRejected { facility: FacilityId, acid: String },
    DroppedTrack { facility: FacilityId, acid: Acid },
    /// A pilot-directed instruction for the aircraft (`C170`, `DJFK`, ...).
    AircraftCommand { callsign: String, command: String },
    RadioTransmission { callsign: String, text: String },
    StatusMessage { facility: FacilityId, text: String },
    GlobalMessage { text: String },
    TrackClicked { facility: FacilityId, acid: Acid },
    /// Route fixes to draw for a flight.
    FixCoordinates {
        acid: Acid,
        fixes: Vec<(String, Point2LL)>,
    },
    /// A queued command succeeded.
    CommandAccepted { position: String, big_output: String },
    /// A queued command failed.
    CommandRejected { position: String, big_output: String },
}
