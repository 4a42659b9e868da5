//! Terminal (STARS) facility computer.
//!
//! Holds the proposed plans waiting in the strip bay, transfer records for
//! flights tracked or offered here, the radar tracks it sees and the local
//! beacon bank and CID allocator. Controller operations act on this state
//! and uplink the resulting messages to the overlying enroute facility.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use radarscope_core::components::{TrackDisplayState, TrackInfo};
use radarscope_core::constants::REDUCED_JRING_CEILING_FT;
use radarscope_core::enums::*;
use radarscope_core::errors::{Result, ScopeError};
use radarscope_core::events::Event;
use radarscope_core::flight_plan::{
    CoordinationTime, FlightPlan, FlightPlanSpecifier, TrackInformation,
};
use radarscope_core::message::Message;
use radarscope_core::types::{Acid, Cid, FacilityId, Squawk};

use super::enroute::sender_facility;
use super::TickContext;
use crate::id_alloc::{BeaconPool, CidAllocator};
use crate::store::FlightPlanStore;

pub struct TerminalComputer {
    id: FacilityId,
    parent: FacilityId,
    positions: BTreeSet<String>,
    /// Positions that may hand off flights they do not track.
    supervisors: BTreeSet<String>,
    /// Proposed plans, not yet tracked here.
    plans: FlightPlanStore,
    track_information: BTreeMap<Acid, TrackInformation>,
    /// Radar tracks by call-sign.
    tracks: BTreeMap<String, TrackInfo>,
    display: BTreeMap<Acid, TrackDisplayState>,
    beacons: BeaconPool,
    cids: CidAllocator,
}

impl TerminalComputer {
    pub fn new(
        id: FacilityId,
        parent: FacilityId,
        positions: impl IntoIterator<Item = String>,
        beacon_bank: u8,
    ) -> Result<Self> {
        Ok(Self {
            id,
            parent,
            positions: positions.into_iter().collect(),
            supervisors: BTreeSet::new(),
            plans: FlightPlanStore::new(),
            track_information: BTreeMap::new(),
            tracks: BTreeMap::new(),
            display: BTreeMap::new(),
            beacons: BeaconPool::bank(beacon_bank)?,
            cids: CidAllocator::new(),
        })
    }

    pub fn with_supervisors(mut self, positions: impl IntoIterator<Item = String>) -> Self {
        self.supervisors = positions.into_iter().collect();
        self
    }

    // ---- Accessors ----

    pub fn id(&self) -> &FacilityId {
        &self.id
    }

    pub fn parent(&self) -> &FacilityId {
        &self.parent
    }

    pub fn positions(&self) -> impl Iterator<Item = &str> {
        self.positions.iter().map(String::as_str)
    }

    pub fn is_local(&self, position: &str) -> bool {
        self.positions.contains(position)
    }

    pub fn plans(&self) -> &FlightPlanStore {
        &self.plans
    }

    pub fn track_information(&self) -> &BTreeMap<Acid, TrackInformation> {
        &self.track_information
    }

    pub fn tracks(&self) -> &BTreeMap<String, TrackInfo> {
        &self.tracks
    }

    pub fn beacons(&self) -> &BeaconPool {
        &self.beacons
    }

    pub fn cid(&self, acid: &Acid) -> Option<Cid> {
        self.cids.get(acid)
    }

    pub fn display(&self, acid: &Acid) -> TrackDisplayState {
        self.display.get(acid).copied().unwrap_or_default()
    }

    /// Plan of a tracked flight first, then the strip bay.
    pub fn plan(&self, acid: &str) -> Option<&FlightPlan> {
        self.track_information
            .get(acid)
            .and_then(|info| info.flight_plan.as_ref())
            .or_else(|| self.plans.get(acid))
    }

    pub fn plan_by_beacon(&self, code: Squawk) -> Option<&FlightPlan> {
        self.track_information
            .values()
            .filter_map(|info| info.flight_plan.as_ref())
            .find(|plan| plan.beacon == code)
            .or_else(|| self.plans.by_beacon(code))
    }

    pub fn plan_state(&self, acid: &str) -> Option<PlanState> {
        if let Some(info) = self.track_information.get(acid) {
            let redirected = info
                .flight_plan
                .as_ref()
                .is_some_and(|p| p.redirected_handoff.is_active());
            return Some(if info.handoff_target.is_some() || redirected {
                PlanState::HandoffOffered
            } else if self.is_local(&info.track_owner) {
                PlanState::TrackedLocally
            } else {
                PlanState::TrackedByPeer
            });
        }
        self.plans.contains(acid).then_some(PlanState::Proposed)
    }

    /// Radar track associated with `acid`, or one squawking its beacon.
    pub fn track_for(&self, acid: &Acid) -> Option<&TrackInfo> {
        let beacon = self.plan(acid.as_str()).map(|p| p.beacon);
        self.tracks
            .values()
            .find(|t| t.associated.as_ref() == Some(acid))
            .or_else(|| {
                let beacon = beacon.filter(|b| !b.is_placeholder())?;
                self.tracks.values().find(|t| t.beacon == beacon)
            })
    }

    /// Resolve a flight identifier: beacon code, then CID, then ACID.
    pub fn resolve_flid(&self, flid: &str) -> Result<Acid> {
        let flid = flid.trim();
        if flid.len() == 4 && flid.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            if let Some(plan) = Squawk::parse(flid).ok().and_then(|c| self.plan_by_beacon(c)) {
                return Ok(plan.acid.clone());
            }
        }
        if let Some(acid) = Cid::parse(flid).and_then(|cid| self.cids.holder(cid)) {
            return Ok(acid.clone());
        }
        if let Ok(acid) = Acid::parse(flid) {
            if self.plan(acid.as_str()).is_some() {
                return Ok(acid);
            }
        }
        Err(ScopeError::IllegalAcid(flid.to_string()))
    }

    /// Tracks whose call-sign ends in `suffix`.
    pub fn tracks_with_suffix<'a>(&'a self, suffix: &'a str) -> impl Iterator<Item = &'a TrackInfo> + 'a {
        self.tracks.values().filter(move |t| t.callsign.ends_with(suffix))
    }

    // ---- Inbound messages ----

    /// Drain the inbox once, in arrival order.
    pub fn sort_received_messages(&mut self, ctx: &mut TickContext) {
        for msg in ctx.bus.drain(self.id.as_str()) {
            debug!(facility = %self.id, kind = ?msg.kind, acid = msg.acid_str(), source = %msg.source_id, "sort");
            match msg.kind {
                MessageKind::Plan => self.receive_plan(msg, ctx),
                MessageKind::Amendment => self.receive_amendment(msg, ctx),
                MessageKind::Cancellation => self.receive_cancellation(msg, ctx),
                MessageKind::InitiateTransfer => self.receive_initiate_transfer(msg, ctx),
                MessageKind::AcceptRecallTransfer => self.receive_accept_recall(msg, ctx),
                MessageKind::TrackUpdate => self.receive_track_update(msg, ctx),
                MessageKind::RequestFlightPlan
                | MessageKind::DepartureDM
                | MessageKind::BeaconTerminate => {
                    warn!(facility = %self.id, kind = ?msg.kind, "message kind not handled at a terminal")
                }
            }
        }
    }

    fn receive_plan(&mut self, msg: Message, ctx: &mut TickContext) {
        if msg.bcn.is_placeholder() {
            debug!(facility = %self.id, acid = msg.acid_str(), "plan with placeholder beacon ignored");
            return;
        }
        let plan = match msg.to_flight_plan() {
            Ok(plan) => plan,
            Err(err) => {
                warn!(facility = %self.id, source = %msg.source_id, %err, "undecodable plan");
                return;
            }
        };
        if !self.merge_message(&msg, &plan.acid) {
            self.add_proposed(plan, ctx);
        }
    }

    fn receive_amendment(&mut self, msg: Message, ctx: &mut TickContext) {
        let acid = msg.acid.clone().or_else(|| {
            (!msg.bcn.is_placeholder())
                .then(|| self.plan_by_beacon(msg.bcn).map(|p| p.acid.clone()))
                .flatten()
        });
        let Some(acid) = acid else {
            warn!(facility = %self.id, bcn = %msg.bcn, "amendment for unknown flight");
            return;
        };
        if self.merge_message(&msg, &acid) {
            return;
        }
        match msg.to_flight_plan() {
            Ok(plan) => self.add_proposed(plan, ctx),
            Err(err) => warn!(facility = %self.id, %err, "undecodable amendment"),
        }
    }

    /// Merge into whichever copy exists. False when there is none.
    fn merge_message(&mut self, msg: &Message, acid: &Acid) -> bool {
        if let Some(plan) = self
            .track_information
            .get_mut(acid.as_str())
            .and_then(|info| info.flight_plan.as_mut())
        {
            msg.merge_into(plan);
            return true;
        }
        self.plans
            .update(acid.as_str(), |plan| msg.merge_into(plan))
            .is_some()
    }

    fn add_proposed(&mut self, mut plan: FlightPlan, ctx: &mut TickContext) {
        plan.tracking_controller = None;
        plan.handoff_target = None;
        let acid = plan.acid.clone();
        let cid = self.cids.allocate(&acid, ctx.rng);
        info!(facility = %self.id, acid = %acid, cid = %cid, "flight strip pushed");
        self.plans.insert(plan);
        ctx.events.push(Event::PushedFlightStrip {
            facility: self.id.clone(),
            acid,
        });
    }

    fn receive_cancellation(&mut self, msg: Message, ctx: &mut TickContext) {
        let acid = msg.acid.clone().or_else(|| {
            (!msg.bcn.is_placeholder())
                .then(|| self.plan_by_beacon(msg.bcn).map(|p| p.acid.clone()))
                .flatten()
        });
        let Some(acid) = acid else {
            debug!(facility = %self.id, bcn = %msg.bcn, "cancellation for unknown flight");
            return;
        };
        if self.remove_flight(&acid).is_some() {
            info!(facility = %self.id, acid = %acid, "flight plan cancelled");
            ctx.events.push(Event::DroppedTrack {
                facility: self.id.clone(),
                acid,
            });
        }
    }

    /// Remove every trace of a flight, freeing its CID and local beacon.
    fn remove_flight(&mut self, acid: &Acid) -> Option<FlightPlan> {
        let plan = self
            .track_information
            .remove(acid.as_str())
            .and_then(|info| info.flight_plan)
            .or_else(|| self.plans.remove(acid.as_str()))?;
        self.cids.release(acid);
        self.display.remove(acid);
        if self.beacons.holder(plan.beacon) == Some(acid) {
            if let Err(err) = self.beacons.release(plan.beacon) {
                warn!(facility = %self.id, acid = %acid, %err, "beacon release failed");
            }
        }
        for track in self.tracks.values_mut() {
            if track.associated.as_ref() == Some(acid) {
                track.associated = None;
            }
        }
        Some(plan)
    }

    fn receive_initiate_transfer(&mut self, msg: Message, ctx: &mut TickContext) {
        let Some(acid) = msg.acid.clone() else {
            warn!(facility = %self.id, source = %msg.source_id, "transfer without ACID");
            return;
        };
        let owner = msg.track_owner.clone().unwrap_or_default();
        let target = msg.handoff_target.clone();

        let plan = self
            .plans
            .remove(acid.as_str())
            .or_else(|| {
                self.track_information
                    .get(acid.as_str())
                    .and_then(|info| info.flight_plan.clone())
            })
            .or_else(|| msg.plan.as_deref().cloned());
        let Some(mut plan) = plan else {
            warn!(facility = %self.id, acid = %acid, "transfer for unknown flight rejected");
            ctx.events.push(Event::TransferRejected {
                facility: self.id.clone(),
                acid: acid.to_string(),
            });
            return;
        };
        plan.redirected_handoff.clear();

        let mut record = TrackInformation::new(acid.clone(), &owner);
        record.handoff_target = target.clone();
        record.flight_plan = Some(plan);
        record.received_from = sender_facility(&msg);
        record.sync_plan();
        self.track_information.insert(acid.clone(), record);
        self.cids.allocate(&acid, ctx.rng);

        info!(facility = %self.id, acid = %acid, from = %owner, "transfer accepted");
        ctx.events.push(Event::TransferAccepted {
            facility: self.id.clone(),
            acid: acid.clone(),
        });
        if let Some(target) = target.filter(|t| self.is_local(t)) {
            ctx.events.push(Event::OfferedHandoff {
                facility: self.id.clone(),
                acid,
                from: owner,
                to: target,
            });
        }
    }

    fn receive_accept_recall(&mut self, msg: Message, ctx: &mut TickContext) {
        let Some(acid) = msg.acid.clone() else {
            warn!(facility = %self.id, source = %msg.source_id, "accept/recall without ACID");
            return;
        };
        let owner = msg.track_owner.clone().unwrap_or_default();
        let Some(info) = self.track_information.get_mut(acid.as_str()) else {
            debug!(facility = %self.id, acid = %acid, "accept/recall for flight not tracked here");
            return;
        };

        if info.track_owner != owner {
            let from = std::mem::replace(&mut info.track_owner, owner.clone());
            info.handoff_target = None;
            info.sync_plan();
            if let Some(plan) = info.flight_plan.as_mut() {
                plan.redirected_handoff.clear();
            }
            info!(facility = %self.id, acid = %acid, from = %from, to = %owner, "handoff accepted remotely");
            ctx.events.push(Event::AcceptedHandoff {
                facility: self.id.clone(),
                acid,
                from,
                to: owner,
            });
            return;
        }

        // Same owner: the offer was recalled. The plan goes back to the strip bay.
        let target = info.handoff_target.clone().unwrap_or_default();
        if let Some(mut plan) = self
            .track_information
            .remove(acid.as_str())
            .and_then(|info| info.flight_plan)
        {
            plan.tracking_controller = None;
            plan.handoff_target = None;
            plan.redirected_handoff.clear();
            self.plans.insert(plan);
        }
        info!(facility = %self.id, acid = %acid, by = %owner, "handoff recalled remotely");
        ctx.events.push(Event::CanceledHandoff {
            facility: self.id.clone(),
            acid,
            from: owner,
            to: target,
        });
    }

    fn receive_track_update(&mut self, msg: Message, ctx: &mut TickContext) {
        let Some(ret) = msg.radar.as_ref() else {
            warn!(facility = %self.id, "track update without radar return");
            return;
        };
        let now = ctx.time.now;
        let candidate = (!ret.beacon.is_placeholder())
            .then(|| self.plan_by_beacon(ret.beacon).map(|p| p.acid.clone()))
            .flatten();

        let track = self
            .tracks
            .entry(ret.callsign.clone())
            .and_modify(|t| t.apply_return(ret, now))
            .or_insert_with(|| TrackInfo::from_return(ret, now));

        if track.associated.is_none() {
            if let Some(acid) = candidate {
                track.associated = Some(acid.clone());
                debug!(facility = %self.id, acid = %acid, callsign = %ret.callsign, "track associated");
                ctx.events.push(Event::FlightPlanAssociated {
                    facility: self.id.clone(),
                    acid,
                });
            }
        }
    }

    // ---- Controller operations ----

    fn uplink(&self, ctx: &mut TickContext, msg: Message) -> Result<()> {
        ctx.bus.send_to_overlying_enroute(&self.id, msg)
    }

    fn record_mut(&mut self, acid: &Acid) -> Option<&mut TrackInformation> {
        self.track_information.get_mut(acid.as_str())
    }

    /// Mutable plan of a tracked or proposed flight.
    fn with_plan_mut<R>(&mut self, acid: &Acid, f: impl FnOnce(&mut FlightPlan) -> R) -> Result<R> {
        if let Some(plan) = self
            .track_information
            .get_mut(acid.as_str())
            .and_then(|info| info.flight_plan.as_mut())
        {
            return Ok(f(plan));
        }
        self.plans
            .update(acid.as_str(), f)
            .ok_or_else(|| ScopeError::NoFlightPlan(acid.to_string()))
    }

    /// Enter a locally created plan. A placeholder beacon is drawn from the
    /// local bank. The plan is also sent up so the enroute copy exists.
    pub fn enter_flight_plan(&mut self, mut plan: FlightPlan, ctx: &mut TickContext) -> Result<Acid> {
        if self.plan(plan.acid.as_str()).is_some() {
            return Err(ScopeError::IllegalUserAction);
        }
        if plan.beacon.is_placeholder() {
            plan.beacon = self.beacons.allocate(&plan.acid, ctx.rng)?;
        } else if self.beacons.manages(plan.beacon) {
            self.beacons.claim(plan.beacon, &plan.acid)?;
        }
        plan.plan_type = PlanType::LocalNonEnroute;

        let msg = Message::from_plan(MessageKind::Plan, ctx.source_id(&self.id), &plan);
        if let Err(err) = self.uplink(ctx, msg) {
            warn!(facility = %self.id, acid = %plan.acid, %err, "plan uplink failed");
        }
        let acid = plan.acid.clone();
        self.add_proposed(plan, ctx);
        Ok(acid)
    }

    /// Take control of a proposed flight.
    pub fn start_track(&mut self, acid: &Acid, position: &str, ctx: &mut TickContext) -> Result<()> {
        if !self.is_local(position) {
            return Err(ScopeError::IllegalPosition(position.to_string()));
        }
        if self.track_information.contains_key(acid.as_str()) {
            return Err(ScopeError::IllegalUserAction);
        }
        let mut plan = self
            .plans
            .remove(acid.as_str())
            .ok_or_else(|| ScopeError::NoFlightPlan(acid.to_string()))?;
        plan.set_owner(position);

        if plan.type_of_flight == TypeOfFlight::Departure {
            let departed = CoordinationTime {
                time: ctx.time.now,
                kind: CoordinationTimeKind::P,
            };
            plan.coordination_time = Some(departed);
            let mut msg = Message::new(MessageKind::DepartureDM, ctx.source_id(&self.id));
            msg.acid = Some(acid.clone());
            msg.bcn = plan.beacon;
            msg.coordination_time = Some(departed);
            if let Err(err) = self.uplink(ctx, msg) {
                warn!(facility = %self.id, acid = %acid, %err, "departure message uplink failed");
            }
        }

        let mut record = TrackInformation::new(acid.clone(), position);
        record.flight_plan = Some(plan);
        record.sync_plan();
        self.track_information.insert(acid.clone(), record);
        self.cids.allocate(acid, ctx.rng);

        info!(facility = %self.id, acid = %acid, position, "track started");
        ctx.events.push(Event::HandoffControl {
            facility: self.id.clone(),
            acid: acid.clone(),
            to: position.to_string(),
        });
        Ok(())
    }

    /// Offer a flight to `to_position` at `to_facility` on behalf of
    /// `position`, which must own the track or be a controlling position.
    /// Positions at other facilities get an `InitiateTransfer` through the
    /// enroute network.
    pub fn initiate_handoff(
        &mut self,
        acid: &Acid,
        position: &str,
        to_position: &str,
        to_facility: &FacilityId,
        ctx: &mut TickContext,
    ) -> Result<()> {
        let location = self.track_for(acid).map(|t| t.position);
        let facility = self.id.clone();
        let supervisor = self.supervisors.contains(position);
        let no_control = || ScopeError::NoControl {
            acid: acid.to_string(),
            position: position.to_string(),
        };
        let record = self.record_mut(acid).ok_or_else(no_control)?;
        if record.track_owner != position && !supervisor {
            return Err(no_control());
        }
        if record.track_owner == to_position {
            return Err(ScopeError::IllegalPosition(to_position.to_string()));
        }
        let from = record.track_owner.clone();
        let previous = record.handoff_target.replace(to_position.to_string());
        record.sync_plan();

        if *to_facility != facility {
            let plan = record.flight_plan.clone();
            let mut msg = match plan.as_ref() {
                Some(plan) => Message::from_plan(MessageKind::InitiateTransfer, ctx.source_id(&facility), plan),
                None => Message::new(MessageKind::InitiateTransfer, ctx.source_id(&facility)),
            };
            msg.acid = Some(acid.clone());
            msg.track_owner = Some(from.clone());
            msg.handoff_target = Some(to_position.to_string());
            msg.facility_destination = Some(to_facility.clone());
            msg.location = location;
            msg.plan = plan.map(Box::new);

            if let Err(err) = ctx.bus.send_to_overlying_enroute(&facility, msg) {
                if let Some(record) = self.record_mut(acid) {
                    record.handoff_target = previous;
                    record.sync_plan();
                }
                return Err(err);
            }
        }

        info!(facility = %facility, acid = %acid, from = %from, to = to_position, "handoff initiated");
        ctx.events.push(Event::OfferedHandoff {
            facility,
            acid: acid.clone(),
            from,
            to: to_position.to_string(),
        });
        Ok(())
    }

    /// Accept a handoff offered (or redirected) to `position`. When the
    /// previous owner sits elsewhere, `owner_facility` is told.
    pub fn accept_handoff(
        &mut self,
        acid: &Acid,
        position: &str,
        owner_facility: Option<FacilityId>,
        ctx: &mut TickContext,
    ) -> Result<()> {
        let facility = self.id.clone();
        let local_owner = self
            .track_information
            .get(acid.as_str())
            .map(|info| self.is_local(&info.track_owner));
        let not_mine = || ScopeError::NotHandedOffToMe(acid.to_string());
        let record = self.track_information.get_mut(acid.as_str()).ok_or_else(not_mine)?;

        let redirected = record
            .flight_plan
            .as_ref()
            .is_some_and(|p| p.redirected_handoff.redirected_to.as_deref() == Some(position));
        if record.handoff_target.as_deref() != Some(position) && !redirected {
            return Err(not_mine());
        }

        let from = std::mem::replace(&mut record.track_owner, position.to_string());
        record.handoff_target = None;
        if let Some(plan) = record.flight_plan.as_mut() {
            plan.redirected_handoff.clear();
        }
        record.sync_plan();
        let plan = record.flight_plan.clone();
        self.cids.allocate(acid, ctx.rng);

        if local_owner == Some(false) {
            let mut msg = match plan.as_ref() {
                Some(plan) => Message::from_plan(MessageKind::AcceptRecallTransfer, ctx.source_id(&facility), plan),
                None => Message::new(MessageKind::AcceptRecallTransfer, ctx.source_id(&facility)),
            };
            msg.acid = Some(acid.clone());
            msg.track_owner = Some(position.to_string());
            msg.handoff_target = None;
            msg.facility_destination = owner_facility;
            if let Err(err) = self.uplink(ctx, msg) {
                warn!(facility = %facility, acid = %acid, %err, "accept uplink failed");
            }
        }

        info!(facility = %facility, acid = %acid, from = %from, to = position, "handoff accepted");
        let event = if redirected {
            Event::AcceptedRedirectedHandoff {
                facility,
                acid: acid.clone(),
                from,
                to: position.to_string(),
            }
        } else {
            Event::AcceptedHandoff {
                facility,
                acid: acid.clone(),
                from,
                to: position.to_string(),
            }
        };
        ctx.events.push(event);
        Ok(())
    }

    /// Withdraw an offer made by `position`.
    pub fn recall_handoff(
        &mut self,
        acid: &Acid,
        position: &str,
        target_facility: Option<FacilityId>,
        ctx: &mut TickContext,
    ) -> Result<()> {
        let facility = self.id.clone();
        let no_control = || ScopeError::NoControl {
            acid: acid.to_string(),
            position: position.to_string(),
        };
        let record = self.track_information.get_mut(acid.as_str()).ok_or_else(no_control)?;
        if record.track_owner != position {
            return Err(no_control());
        }
        let target = record.handoff_target.take().ok_or(ScopeError::IllegalUserAction)?;
        if let Some(plan) = record.flight_plan.as_mut() {
            plan.redirected_handoff.clear();
        }
        record.sync_plan();
        let plan = record.flight_plan.clone();

        if !self.is_local(&target) {
            let mut msg = match plan.as_ref() {
                Some(plan) => Message::from_plan(MessageKind::AcceptRecallTransfer, ctx.source_id(&facility), plan),
                None => Message::new(MessageKind::AcceptRecallTransfer, ctx.source_id(&facility)),
            };
            msg.acid = Some(acid.clone());
            msg.track_owner = Some(position.to_string());
            msg.handoff_target = None;
            msg.facility_destination = target_facility;
            if let Err(err) = self.uplink(ctx, msg) {
                warn!(facility = %facility, acid = %acid, %err, "recall uplink failed");
            }
        }

        info!(facility = %facility, acid = %acid, to = %target, "handoff recalled");
        ctx.events.push(Event::CanceledHandoff {
            facility,
            acid: acid.clone(),
            from: position.to_string(),
            to: target,
        });
        Ok(())
    }

    /// Pass an offer received by `position` on to another local position.
    pub fn redirect_handoff(
        &mut self,
        acid: &Acid,
        position: &str,
        to_position: &str,
        ctx: &mut TickContext,
    ) -> Result<()> {
        if !self.is_local(to_position) {
            return Err(ScopeError::IllegalPosition(to_position.to_string()));
        }
        let facility = self.id.clone();
        let not_mine = || ScopeError::NotHandedOffToMe(acid.to_string());
        let record = self.track_information.get_mut(acid.as_str()).ok_or_else(not_mine)?;
        let owner = record.track_owner.clone();
        let offered_to_me = record.handoff_target.as_deref() == Some(position);
        let plan = record.flight_plan.as_mut().ok_or_else(not_mine)?;
        let rd = &mut plan.redirected_handoff;
        if !offered_to_me && rd.redirected_to.as_deref() != Some(position) {
            return Err(not_mine());
        }

        if rd.should_fallback_to_handoff(position, to_position) {
            rd.clear();
            record.handoff_target = Some(to_position.to_string());
            record.sync_plan();
        } else {
            if rd.original_owner.is_none() {
                rd.original_owner = Some(owner);
            }
            rd.add_redirector(position);
            rd.redirected_to = Some(to_position.to_string());
        }

        info!(facility = %facility, acid = %acid, from = position, to = to_position, "handoff redirected");
        ctx.events.push(Event::OfferedHandoff {
            facility,
            acid: acid.clone(),
            from: position.to_string(),
            to: to_position.to_string(),
        });
        Ok(())
    }

    /// Drop a track owned by `position` and cancel the plan upstream.
    pub fn drop_track(&mut self, acid: &Acid, position: &str, ctx: &mut TickContext) -> Result<()> {
        let owned = self
            .track_information
            .get(acid.as_str())
            .is_some_and(|info| info.track_owner == position);
        if !owned {
            return Err(ScopeError::NoControl {
                acid: acid.to_string(),
                position: position.to_string(),
            });
        }
        let plan = self
            .plan(acid.as_str())
            .ok_or_else(|| ScopeError::NoFlightPlan(acid.to_string()))?;

        // The enroute copy goes first; a failed uplink leaves the track in place.
        let msg = Message::from_plan(MessageKind::Cancellation, ctx.source_id(&self.id), plan);
        self.uplink(ctx, msg)?;
        self.remove_flight(acid);

        info!(facility = %self.id, acid = %acid, position, "track dropped");
        ctx.events.push(Event::DroppedTrack {
            facility: self.id.clone(),
            acid: acid.clone(),
        });
        Ok(())
    }

    /// Apply an amendment locally, then send it up.
    pub fn amend(
        &mut self,
        acid: &Acid,
        amendment: &FlightPlanSpecifier,
        ctx: &mut TickContext,
    ) -> Result<FlightPlan> {
        let amended = self.with_plan_mut(acid, |plan| plan.amend(amendment).map(|()| plan.clone()))??;
        let msg = Message::from_plan(MessageKind::Amendment, ctx.source_id(&self.id), &amended);
        if let Err(err) = self.uplink(ctx, msg) {
            warn!(facility = %self.id, acid = %acid, %err, "amendment uplink failed");
        }
        Ok(amended)
    }

    pub fn point_out(
        &mut self,
        acid: &Acid,
        position: &str,
        to_position: &str,
        ctx: &mut TickContext,
    ) -> Result<()> {
        if !self.is_local(to_position) || to_position == position {
            return Err(ScopeError::IllegalPosition(to_position.to_string()));
        }
        self.with_plan_mut(acid, |plan| plan.point_out = Some(to_position.to_string()))?;
        ctx.events.push(Event::PointOut {
            facility: self.id.clone(),
            acid: acid.clone(),
            from: position.to_string(),
            to: to_position.to_string(),
        });
        Ok(())
    }

    pub fn acknowledge_point_out(&mut self, acid: &Acid, position: &str, ctx: &mut TickContext) -> Result<()> {
        self.with_plan_mut(acid, |plan| {
            if plan.point_out.as_deref() != Some(position) {
                return Err(ScopeError::IllegalUserAction);
            }
            plan.acknowledge_point_out(position);
            Ok(())
        })??;
        ctx.events.push(Event::AcknowledgedPointOut {
            facility: self.id.clone(),
            acid: acid.clone(),
            position: position.to_string(),
        });
        Ok(())
    }

    pub fn reject_point_out(&mut self, acid: &Acid, position: &str, ctx: &mut TickContext) -> Result<()> {
        self.with_plan_mut(acid, |plan| {
            if plan.point_out.as_deref() != Some(position) {
                return Err(ScopeError::IllegalUserAction);
            }
            plan.point_out = None;
            Ok(())
        })??;
        ctx.events.push(Event::RejectedPointOut {
            facility: self.id.clone(),
            acid: acid.clone(),
            position: position.to_string(),
        });
        Ok(())
    }

    pub fn release_departure(&mut self, acid: &Acid) -> Result<()> {
        self.with_plan_mut(acid, FlightPlan::release)?
    }

    /// Ask the overlying enroute facility for the plan squawking `beacon`.
    pub fn request_flight_plan(&self, beacon: Squawk, ctx: &mut TickContext) -> Result<()> {
        let mut msg = Message::new(MessageKind::RequestFlightPlan, ctx.source_id(&self.id));
        msg.bcn = beacon;
        self.uplink(ctx, msg)
    }

    // ---- Display toggles ----

    fn display_mut(&mut self, acid: &Acid) -> &mut TrackDisplayState {
        self.display.entry(acid.clone()).or_default()
    }

    pub fn toggle_jring(&mut self, acid: &Acid) -> bool {
        let display = self.display_mut(acid);
        display.jring = !display.jring;
        display.reduced_jring = false;
        display.jring
    }

    pub fn toggle_reduced_jring(&mut self, acid: &Acid) -> Result<bool> {
        if self
            .track_for(acid)
            .is_some_and(|t| t.altitude > REDUCED_JRING_CEILING_FT)
        {
            return Err(ScopeError::IllegalValue);
        }
        let display = self.display_mut(acid);
        display.reduced_jring = !display.reduced_jring;
        display.jring = false;
        Ok(display.reduced_jring)
    }

    pub fn toggle_on_frequency(&mut self, acid: &Acid) -> bool {
        let display = self.display_mut(acid);
        display.on_frequency = !display.on_frequency;
        display.on_frequency
    }

    /// Force the datablock of a flight `position` does not own.
    pub fn toggle_forced_datablock(&mut self, acid: &Acid, position: &str) -> Result<bool> {
        let owned = self
            .track_information
            .get(acid.as_str())
            .is_some_and(|info| info.track_owner == position);
        if owned {
            return Err(ScopeError::IllegalUserAction);
        }
        let display = self.display_mut(acid);
        display.forced_datablock = !display.forced_datablock;
        Ok(display.forced_datablock)
    }

    pub fn set_route_lines(&mut self, acid: &Acid, on: bool) {
        self.display_mut(acid).route_lines = on;
    }

    pub fn clear_route_lines(&mut self) {
        for display in self.display.values_mut() {
            display.route_lines = false;
        }
    }

    /// Whether a handoff of `acid` is currently offered to `position`.
    pub fn offered_to(&self, acid: &Acid, position: &str) -> bool {
        self.track_information.get(acid.as_str()).is_some_and(|info| {
            info.handoff_target.as_deref() == Some(position)
                || info
                    .flight_plan
                    .as_ref()
                    .is_some_and(|p| p.redirected_handoff.redirected_to.as_deref() == Some(position))
        })
    }

    pub fn owner(&self, acid: &Acid) -> Option<&str> {
        self.track_information
            .get(acid.as_str())
            .map(|info| info.track_owner.as_str())
    }
}
