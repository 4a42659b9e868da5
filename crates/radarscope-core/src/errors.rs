//! Error taxonomy shared by the coordination core and the controller surface.

use thiserror::Error;

use crate::types::Squawk;

/// Everything that can go wrong inside a facility computer or a controller command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    // --- Controller surface ---
    #[error("command format")]
    CommandFormat,

    #[error("illegal ACID {0:?}")]
    IllegalAcid(String),

    #[error("ambiguous ACID {0:?}")]
    AmbiguousAcid(String),

    #[error("illegal value")]
    IllegalValue,

    #[error("illegal position {0:?}")]
    IllegalPosition(String),

    #[error("illegal airport {0:?}")]
    IllegalAirport(String),

    #[error("no flight plan for {0:?}")]
    NoFlightPlan(String),

    #[error("{acid} is not tracked by {position}")]
    NoControl { acid: String, position: String },

    #[error("{0} is not being handed off to this position")]
    NotHandedOffToMe(String),

    #[error("illegal user action")]
    IllegalUserAction,

    // --- Flight data ---
    #[error("illegal altitude {0:?}")]
    IllegalAltitude(String),

    #[error("illegal scratchpad {0:?}")]
    IllegalScratchpad(String),

    #[error("illegal aircraft type {0:?}")]
    IllegalAircraftType(String),

    #[error("invalid abbreviated flight plan")]
    InvalidAbbreviatedPlan,

    #[error("invalid beacon code {0:?}")]
    InvalidSquawk(String),

    #[error("{0} has already been released")]
    AlreadyReleased(String),

    #[error("no coordination fix for {0}")]
    NoCoordinationFix(String),

    // --- Beacon codes ---
    #[error("no beacon codes available")]
    NoBeaconAvailable,

    #[error("beacon code {0} is not managed by this pool")]
    BeaconNotManaged(Squawk),

    #[error("beacon code {0} is already assigned")]
    BeaconAlreadyAssigned(Squawk),

    #[error("beacon code {0} is not assigned")]
    BeaconUnassigned(Squawk),

    // --- Routing ---
    #[error("no such facility {0:?}")]
    NoSuchFacility(String),

    #[error("no such enroute facility {0:?}")]
    NoSuchEnrouteFacility(String),

    #[error("no such terminal facility {0:?}")]
    NoSuchTerminalFacility(String),

    // --- Configuration ---
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ScopeError>;

impl ScopeError {
    /// Short uppercase text shown in the scope's big-output area.
    pub fn big_output(&self) -> &'static str {
        match self {
            ScopeError::CommandFormat
            | ScopeError::InvalidAbbreviatedPlan
            | ScopeError::InvalidSquawk(_) => "FORMAT",
            ScopeError::IllegalAcid(_)
            | ScopeError::NoFlightPlan(_)
            | ScopeError::NoControl { .. }
            | ScopeError::NotHandedOffToMe(_) => "ILLEGAL ACID",
            ScopeError::AmbiguousAcid(_) => "AMB ACID",
            ScopeError::IllegalValue | ScopeError::IllegalAltitude(_) => "ILLEGAL VALUE",
            ScopeError::IllegalPosition(_) => "ILLEGAL POSITION",
            ScopeError::IllegalAirport(_) => "ILLEGAL AIRPORT",
            ScopeError::IllegalUserAction | ScopeError::AlreadyReleased(_) => {
                "ILLEGAL USER ACTION"
            }
            ScopeError::IllegalScratchpad(_) => "ILLEGAL SCRATCHPAD",
            ScopeError::IllegalAircraftType(_) => "ILLEGAL AIRCRAFT TYPE",
            ScopeError::NoCoordinationFix(_) => "NO COORDINATION FIX",
            ScopeError::NoBeaconAvailable
            | ScopeError::BeaconNotManaged(_)
            | ScopeError::BeaconAlreadyAssigned(_)
            | ScopeError::BeaconUnassigned(_) => "NO BEACON CODE",
            ScopeError::NoSuchFacility(_)
            | ScopeError::NoSuchEnrouteFacility(_)
            | ScopeError::NoSuchTerminalFacility(_) => "SECTOR NOT ACTIVE",
            ScopeError::InvalidConfig(_) => "MAP UNAVAILABLE",
        }
    }
}
