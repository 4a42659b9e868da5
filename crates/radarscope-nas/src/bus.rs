//! In-process message bus: one FIFO inbox per facility plus the facility topology.
//!
//! Facilities refer to each other by id only; every send goes through this
//! registry.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use radarscope_core::errors::{Result, ScopeError};
use radarscope_core::message::Message;
use radarscope_core::types::FacilityId;

#[derive(Debug, Clone, Default)]
pub struct MessageBus {
    inboxes: BTreeMap<FacilityId, VecDeque<Message>>,
    enroute: BTreeSet<FacilityId>,
    /// Terminal facility to its overlying enroute facility.
    parents: BTreeMap<FacilityId, FacilityId>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_enroute(&mut self, id: FacilityId) {
        self.inboxes.entry(id.clone()).or_default();
        self.enroute.insert(id);
    }

    /// Register a terminal under an already registered enroute facility.
    pub fn add_terminal(&mut self, id: FacilityId, parent: FacilityId) -> Result<()> {
        if !self.enroute.contains(&parent) {
            return Err(ScopeError::NoSuchEnrouteFacility(parent.to_string()));
        }
        self.inboxes.entry(id.clone()).or_default();
        self.parents.insert(id, parent);
        Ok(())
    }

    pub fn is_enroute(&self, id: &str) -> bool {
        self.enroute.contains(id)
    }

    pub fn is_terminal(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }

    pub fn parent_of(&self, terminal: &str) -> Option<&FacilityId> {
        self.parents.get(terminal)
    }

    /// Terminals parented by `enroute`, in id order.
    pub fn children<'a>(&'a self, enroute: &'a str) -> impl Iterator<Item = &'a FacilityId> + 'a {
        self.parents
            .iter()
            .filter(move |(_, parent)| parent.as_str() == enroute)
            .map(|(child, _)| child)
    }

    /// Enroute-to-enroute send. The target must be a peer of `from`.
    pub fn send_to_enroute(&mut self, from: &FacilityId, target: &str, msg: Message) -> Result<()> {
        if target == from.as_str() || !self.enroute.contains(target) {
            return Err(ScopeError::NoSuchEnrouteFacility(target.to_string()));
        }
        self.enqueue(target, msg)
    }

    /// Enroute-to-child send.
    pub fn send_to_terminal(&mut self, parent: &FacilityId, child: &str, msg: Message) -> Result<()> {
        if self.parents.get(child) != Some(parent) {
            return Err(ScopeError::NoSuchTerminalFacility(child.to_string()));
        }
        self.enqueue(child, msg)
    }

    /// Terminal uplink to its parent.
    pub fn send_to_overlying_enroute(&mut self, terminal: &FacilityId, msg: Message) -> Result<()> {
        let parent = self
            .parents
            .get(terminal)
            .cloned()
            .ok_or_else(|| ScopeError::NoSuchTerminalFacility(terminal.to_string()))?;
        self.enqueue(parent.as_str(), msg)
    }

    /// Direct delivery from outside the facility graph (radar feed, flight data entry).
    pub fn deliver(&mut self, facility: &str, msg: Message) -> Result<()> {
        self.enqueue(facility, msg)
    }

    /// Take everything queued for `facility`, in arrival order.
    pub fn drain(&mut self, facility: &str) -> Vec<Message> {
        self.inboxes
            .get_mut(facility)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn pending(&self, facility: &str) -> usize {
        self.inboxes.get(facility).map_or(0, VecDeque::len)
    }

    pub fn peek(&self, facility: &str) -> impl Iterator<Item = &Message> {
        self.inboxes.get(facility).into_iter().flatten()
    }

    pub fn total_pending(&self) -> usize {
        self.inboxes.values().map(VecDeque::len).sum()
    }

    fn enqueue(&mut self, facility: &str, msg: Message) -> Result<()> {
        let inbox = self
            .inboxes
            .get_mut(facility)
            .ok_or_else(|| ScopeError::NoSuchFacility(facility.to_string()))?;
        debug!(facility, kind = ?msg.kind, acid = msg.acid_str(), "enqueue");
        inbox.push_back(msg);
        Ok(())
    }
}
