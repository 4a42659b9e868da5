//! Facility computers. Each runs to completion inside its slot of the tick;
//! everything it touches outside itself is lent through `TickContext`.

pub mod enroute;
pub mod terminal;

use rand_chacha::ChaCha8Rng;

use radarscope_core::events::Event;
use radarscope_core::types::{FacilityId, SimTime, SourceId};

use crate::bus::MessageBus;

pub use enroute::EnrouteComputer;
pub use terminal::TerminalComputer;

/// Shared state a computer may touch while it runs.
pub struct TickContext<'a> {
    pub bus: &'a mut MessageBus,
    pub time: SimTime,
    pub events: &'a mut Vec<Event>,
    pub rng: &'a mut ChaCha8Rng,
}

impl TickContext<'_> {
    /// Source-ID for a message sent now by `facility`.
    pub fn source_id(&self, facility: &FacilityId) -> SourceId {
        SourceId::new(facility, &self.time)
    }
}
