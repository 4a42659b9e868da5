//! Enroute (ERAM) facility computer.
//!
//! Holds the authoritative plan map for its airspace, transfer records for
//! flights handed through it and the relay hops of transfers in flight.
//! Each tick it sorts its inbox, then pushes plans that are coming due to the
//! facility that will receive them.

use std::collections::BTreeMap;

use chrono::TimeDelta;
use tracing::{debug, info, warn};

use radarscope_core::constants::PLAN_PUSH_LEAD_MINS;
use radarscope_core::enums::*;
use radarscope_core::errors::{Result, ScopeError};
use radarscope_core::flight_plan::{CoordinationTime, FlightPlan, TrackInformation};
use radarscope_core::message::Message;
use radarscope_core::types::{Acid, FacilityId, Point2LL, Squawk};

use super::TickContext;
use crate::adaptation::Adaptation;
use crate::bus::MessageBus;
use crate::id_alloc::BeaconPool;
use crate::resolver::resolve_coordination_fix;
use crate::store::FlightPlanStore;

pub struct EnrouteComputer {
    id: FacilityId,
    adaptation: Adaptation,
    plans: FlightPlanStore,
    track_information: BTreeMap<Acid, TrackInformation>,
    /// Hop each relayed transfer arrived from, so answers can retrace the path.
    pending_relays: BTreeMap<Acid, FacilityId>,
}

impl EnrouteComputer {
    pub fn new(id: FacilityId, adaptation: Adaptation) -> Self {
        Self {
            id,
            adaptation,
            plans: FlightPlanStore::new(),
            track_information: BTreeMap::new(),
            pending_relays: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &FacilityId {
        &self.id
    }

    pub fn adaptation(&self) -> &Adaptation {
        &self.adaptation
    }

    pub fn plans(&self) -> &FlightPlanStore {
        &self.plans
    }

    pub fn track_information(&self) -> &BTreeMap<Acid, TrackInformation> {
        &self.track_information
    }

    pub fn pending_relays(&self) -> &BTreeMap<Acid, FacilityId> {
        &self.pending_relays
    }

    /// Plan map copy first, then any transfer record.
    pub fn plan(&self, acid: &str) -> Option<&FlightPlan> {
        self.plans.get(acid).or_else(|| {
            self.track_information
                .get(acid)
                .and_then(|info| info.flight_plan.as_ref())
        })
    }

    pub fn plan_by_beacon(&self, code: Squawk) -> Option<&FlightPlan> {
        self.plans.by_beacon(code).or_else(|| {
            self.track_information
                .values()
                .filter_map(|info| info.flight_plan.as_ref())
                .find(|plan| plan.beacon == code)
        })
    }

    /// Enter a plan at this facility. A placeholder beacon is replaced from the
    /// NAS pool. The plan goes out with the regular push cycle.
    pub fn file_flight_plan(
        &mut self,
        mut plan: FlightPlan,
        location: Option<Point2LL>,
        ctx: &mut TickContext,
        pool: &mut BeaconPool,
    ) -> Result<Squawk> {
        if self.plan(plan.acid.as_str()).is_some() {
            return Err(ScopeError::IllegalAcid(plan.acid.to_string()));
        }
        if plan.beacon.is_placeholder() {
            plan.beacon = pool.allocate(&plan.acid, ctx.rng)?;
        } else if pool.manages(plan.beacon) {
            pool.claim(plan.beacon, &plan.acid)?;
        }
        plan.plan_type = PlanType::LocalEnroute;
        let beacon = plan.beacon;
        info!(facility = %self.id, acid = %plan.acid, beacon = %beacon, "flight plan filed");
        self.install(plan, location, None, None, false, ctx);
        Ok(beacon)
    }

    /// Drain the inbox once, in arrival order.
    pub fn sort_messages(&mut self, ctx: &mut TickContext, pool: &mut BeaconPool) {
        for msg in ctx.bus.drain(self.id.as_str()) {
            debug!(facility = %self.id, kind = ?msg.kind, acid = msg.acid_str(), source = %msg.source_id, "sort");
            match msg.kind {
                MessageKind::Plan => self.receive_plan(msg, ctx, pool),
                MessageKind::Amendment => self.receive_amendment(msg, ctx, pool),
                MessageKind::Cancellation => self.receive_cancellation(msg, ctx, pool),
                MessageKind::RequestFlightPlan => self.receive_plan_request(msg, ctx),
                MessageKind::DepartureDM => self.receive_departure(msg, ctx),
                MessageKind::BeaconTerminate => self.receive_beacon_terminate(msg, pool),
                MessageKind::InitiateTransfer => self.receive_initiate_transfer(msg, ctx, pool),
                MessageKind::AcceptRecallTransfer => self.receive_accept_recall(msg, ctx),
                MessageKind::TrackUpdate => {
                    debug!(facility = %self.id, "track update ignored at enroute")
                }
            }
        }
    }

    /// Send every plan whose coordination time is within the push lead to
    /// the facility its coordination fix hands it to, once per facility.
    pub fn send_flight_plans(&mut self, ctx: &mut TickContext) {
        self.track_information.retain(|acid, info| {
            let keep = info.flight_plan.is_some();
            if !keep {
                warn!(acid = %acid, "dropping transfer record without a flight plan");
            }
            keep
        });

        let acids: Vec<Acid> = self.track_information.keys().cloned().collect();
        for acid in acids {
            let delivered = self
                .track_information
                .get(&acid)
                .and_then(|info| info.flight_plan.as_ref())
                .and_then(|plan| self.deliver_if_due(plan, ctx));
            if let Some(target) = delivered {
                if let Some(plan) = self
                    .track_information
                    .get_mut(&acid)
                    .and_then(|info| info.flight_plan.as_mut())
                {
                    plan.add_contained_facility(&target);
                }
            }
        }

        for acid in self.plans.acids() {
            let delivered = self
                .plans
                .get(acid.as_str())
                .and_then(|plan| self.deliver_if_due(plan, ctx));
            if let Some(target) = delivered {
                self.plans
                    .update(acid.as_str(), |plan| plan.add_contained_facility(&target));
            }
        }
    }

    fn deliver_if_due(&self, plan: &FlightPlan, ctx: &mut TickContext) -> Option<FacilityId> {
        let target = self.target_facility(plan)?;
        if target == self.id || plan.contains_facility(target.as_str()) {
            return None;
        }
        let lead = TimeDelta::minutes(PLAN_PUSH_LEAD_MINS);
        let due = plan
            .coordination_time
            .map_or(true, |ct| ctx.time.now + lead >= ct.time);
        if !due {
            return None;
        }

        let msg = Message::from_plan(MessageKind::Plan, ctx.source_id(&self.id), plan);
        match self.route_toward(ctx.bus, target.as_str(), msg) {
            Ok(()) => {
                info!(facility = %self.id, acid = %plan.acid, target = %target, "flight plan sent");
                Some(target)
            }
            Err(err) => {
                warn!(facility = %self.id, acid = %plan.acid, target = %target, %err, "flight plan send failed");
                None
            }
        }
    }

    /// Facility the plan's coordination fix hands it to.
    fn target_facility(&self, plan: &FlightPlan) -> Option<FacilityId> {
        if plan.coordination_fix.is_empty() {
            return None;
        }
        self.adaptation
            .fix(&plan.coordination_fix, &plan.filed_altitude)
            .map(|entry| entry.to_facility.clone())
    }

    /// Next-hop routing: own children directly, peers directly, terminals
    /// under a peer through that peer with the final destination attached.
    fn route_toward(&self, bus: &mut MessageBus, dest: &str, mut msg: Message) -> Result<()> {
        if bus.parent_of(dest) == Some(&self.id) {
            return bus.send_to_terminal(&self.id, dest, msg);
        }
        if bus.is_enroute(dest) {
            return bus.send_to_enroute(&self.id, dest, msg);
        }
        match bus.parent_of(dest).cloned() {
            Some(parent) => {
                msg.facility_destination.get_or_insert_with(|| FacilityId::new(dest));
                bus.send_to_enroute(&self.id, parent.as_str(), msg)
            }
            None => Err(ScopeError::NoSuchFacility(dest.to_string())),
        }
    }

    /// Store a plan, resolve its coordination fix if it has none and, when
    /// `push_now`, hand a copy to the facility the fix names.
    fn install(
        &mut self,
        mut plan: FlightPlan,
        location: Option<Point2LL>,
        sender: Option<FacilityId>,
        destination: Option<FacilityId>,
        push_now: bool,
        ctx: &mut TickContext,
    ) {
        if let Some(existing) = self.plans.get(plan.acid.as_str()) {
            for facility in &existing.contained_facilities {
                plan.add_contained_facility(facility);
            }
            if plan.coordination_fix.is_empty() {
                plan.coordination_fix = existing.coordination_fix.clone();
            }
        }
        if let Some(sender) = sender.filter(|s| ctx.bus.is_terminal(s.as_str())) {
            plan.add_contained_facility(&sender);
        }
        if plan.coordination_fix.is_empty() {
            if let Some(fix) = resolve_coordination_fix(&self.adaptation, &plan, location) {
                debug!(facility = %self.id, acid = %plan.acid, fix = %fix, "coordination fix resolved");
                plan.coordination_fix = fix;
            }
        }

        if push_now {
            let mut targets: Vec<FacilityId> = self.target_facility(&plan).into_iter().collect();
            targets.extend(destination);
            for target in targets {
                if target == self.id || plan.contains_facility(target.as_str()) {
                    continue;
                }
                let msg = Message::from_plan(MessageKind::Plan, ctx.source_id(&self.id), &plan);
                match self.route_toward(ctx.bus, target.as_str(), msg) {
                    Ok(()) => plan.add_contained_facility(&target),
                    Err(err) => {
                        warn!(facility = %self.id, acid = %plan.acid, target = %target, %err, "flight plan send failed")
                    }
                }
            }
        }

        self.plans.insert(plan);
    }

    fn receive_plan(&mut self, msg: Message, ctx: &mut TickContext, pool: &mut BeaconPool) {
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
        if !self.admit_beacon(&plan.acid, plan.beacon, pool) {
            return;
        }
        if let Some(info) = self.track_information.get_mut(plan.acid.as_str()) {
            if let Some(existing) = info.flight_plan.as_mut() {
                msg.merge_into(existing);
            }
        }
        let sender = sender_facility(&msg);
        self.install(
            plan,
            msg.location,
            sender,
            msg.facility_destination.clone(),
            true,
            ctx,
        );
    }

    fn receive_amendment(&mut self, msg: Message, ctx: &mut TickContext, pool: &mut BeaconPool) {
        let Some(acid) = self.acid_for(&msg) else {
            warn!(facility = %self.id, bcn = %msg.bcn, "amendment for unknown flight");
            return;
        };
        if !msg.bcn.is_placeholder() && !self.admit_beacon(&acid, msg.bcn, pool) {
            return;
        }

        let mut contained = self
            .plans
            .update(acid.as_str(), |plan| {
                msg.merge_into(plan);
                plan.contained_facilities.clone()
            })
            .unwrap_or_default();
        let mut known = self.plans.contains(acid.as_str());
        if let Some(plan) = self
            .track_information
            .get_mut(acid.as_str())
            .and_then(|info| info.flight_plan.as_mut())
        {
            msg.merge_into(plan);
            contained.extend(plan.contained_facilities.iter().cloned());
            known = true;
        }

        if !known {
            // Unknown here: treat it as a new plan.
            match msg.to_flight_plan() {
                Ok(plan) => {
                    let sender = sender_facility(&msg);
                    self.install(plan, msg.location, sender, None, true, ctx);
                }
                Err(err) => warn!(facility = %self.id, %err, "undecodable amendment"),
            }
            return;
        }
        self.forward_to_contained(&msg, contained, ctx);
    }

    fn receive_cancellation(&mut self, msg: Message, ctx: &mut TickContext, pool: &mut BeaconPool) {
        let Some(acid) = self.acid_for(&msg) else {
            debug!(facility = %self.id, bcn = %msg.bcn, "cancellation for unknown flight");
            return;
        };

        let plan = self.plans.remove(acid.as_str());
        let record_plan = self
            .track_information
            .remove(acid.as_str())
            .and_then(|info| info.flight_plan);
        self.pending_relays.remove(acid.as_str());

        let mut contained = Vec::new();
        let mut beacon = msg.bcn;
        for p in plan.iter().chain(record_plan.iter()) {
            contained.extend(p.contained_facilities.iter().cloned());
            beacon = p.beacon;
        }
        if pool.holder(beacon) == Some(&acid) {
            if let Err(err) = pool.release(beacon) {
                warn!(facility = %self.id, acid = %acid, %err, "beacon release failed");
            }
        }
        info!(facility = %self.id, acid = %acid, "flight plan cancelled");
        self.forward_to_contained(&msg, contained, ctx);
    }

    /// Pass an amendment or cancellation on to every facility holding a copy,
    /// except the sender. Messages from a peer only fan out to own terminals.
    fn forward_to_contained(&self, msg: &Message, contained: Vec<FacilityId>, ctx: &mut TickContext) {
        let sender = sender_facility(msg);
        let from_peer = sender
            .as_ref()
            .is_some_and(|s| ctx.bus.is_enroute(s.as_str()));

        let mut targets: Vec<FacilityId> = Vec::new();
        for facility in contained.into_iter().chain(msg.facility_destination.clone()) {
            let is_child = ctx.bus.parent_of(facility.as_str()) == Some(&self.id);
            if facility == self.id
                || sender.as_ref() == Some(&facility)
                || (from_peer && !is_child)
                || targets.contains(&facility)
            {
                continue;
            }
            targets.push(facility);
        }

        for target in targets {
            let mut relay = msg.clone().relayed_by(ctx.source_id(&self.id));
            relay.facility_destination = None;
            if let Err(err) = self.route_toward(ctx.bus, target.as_str(), relay) {
                warn!(facility = %self.id, acid = msg.acid_str(), target = %target, %err, "forward failed");
            }
        }
    }

    fn receive_plan_request(&mut self, msg: Message, ctx: &mut TickContext) {
        let Some(requester) = sender_facility(&msg) else {
            warn!(facility = %self.id, source = %msg.source_id, "malformed source on plan request");
            return;
        };
        let Some(plan) = self.plans.by_beacon(msg.bcn) else {
            warn!(facility = %self.id, bcn = %msg.bcn, requester = %requester, "no plan for requested beacon");
            return;
        };

        let mut reply = Message::from_plan(MessageKind::Plan, ctx.source_id(&self.id), plan);
        reply.type_of_flight = TypeOfFlight::Departure;
        reply.coordination_fix = plan.exit_fix.clone();
        if plan.rules == FlightRules::Vfr && !plan.filed_altitude.starts_with("VFR") {
            reply.altitude = format!("VFR/{}", plan.filed_altitude);
        }
        let acid = plan.acid.clone();

        match self.route_toward(ctx.bus, requester.as_str(), reply) {
            Ok(()) => {
                self.plans
                    .update(acid.as_str(), |p| p.add_contained_facility(&requester));
            }
            Err(err) => warn!(facility = %self.id, acid = %acid, %err, "plan reply failed"),
        }
    }

    fn receive_departure(&mut self, msg: Message, ctx: &mut TickContext) {
        let Some(acid) = self.acid_for(&msg) else {
            warn!(facility = %self.id, bcn = %msg.bcn, "departure message for unknown flight");
            return;
        };
        let time = msg
            .coordination_time
            .map_or(ctx.time.now, |ct| ct.time);
        let departed = CoordinationTime {
            time,
            kind: CoordinationTimeKind::P,
        };
        self.plans
            .update(acid.as_str(), |plan| plan.coordination_time = Some(departed));
        if let Some(plan) = self
            .track_information
            .get_mut(acid.as_str())
            .and_then(|info| info.flight_plan.as_mut())
        {
            plan.coordination_time = Some(departed);
        }
    }

    fn receive_beacon_terminate(&mut self, msg: Message, pool: &mut BeaconPool) {
        match pool.release(msg.bcn) {
            Ok(acid) => info!(facility = %self.id, acid = %acid, bcn = %msg.bcn, "beacon terminated"),
            Err(err) => debug!(facility = %self.id, bcn = %msg.bcn, %err, "beacon terminate ignored"),
        }
    }

    fn receive_initiate_transfer(&mut self, msg: Message, ctx: &mut TickContext, pool: &mut BeaconPool) {
        let Some(acid) = msg.acid.clone() else {
            warn!(facility = %self.id, source = %msg.source_id, "transfer without ACID");
            return;
        };
        let owner = msg.track_owner.clone().unwrap_or_default();
        let sender = sender_facility(&msg);

        let plan = msg
            .plan
            .as_deref()
            .cloned()
            .or_else(|| self.plan(acid.as_str()).cloned());
        if let Some(code) = plan.as_ref().map(|p| p.beacon).filter(|c| !c.is_placeholder()) {
            if !self.admit_beacon(&acid, code, pool) {
                return;
            }
        }
        let dest = msg
            .facility_destination
            .clone()
            .or_else(|| plan.as_ref().and_then(|p| self.target_facility(p)));

        let record = self
            .track_information
            .entry(acid.clone())
            .or_insert_with(|| TrackInformation::new(acid.clone(), &owner));
        record.track_owner = owner;
        record.handoff_target = msg.handoff_target.clone();
        if plan.is_some() {
            record.flight_plan = plan;
        }
        record.received_from = sender.clone();
        record.sync_plan();

        let Some(dest) = dest.filter(|d| *d != self.id) else {
            debug!(facility = %self.id, acid = %acid, "transfer terminates here");
            return;
        };

        let relay = msg.relayed_by(ctx.source_id(&self.id));
        match self.route_toward(ctx.bus, dest.as_str(), relay) {
            Ok(()) => {
                debug!(facility = %self.id, acid = %acid, dest = %dest, "transfer relayed");
                if let Some(sender) = sender {
                    self.pending_relays.insert(acid.clone(), sender);
                }
                if let Some(plan) = self
                    .track_information
                    .get_mut(acid.as_str())
                    .and_then(|info| info.flight_plan.as_mut())
                {
                    plan.add_contained_facility(&dest);
                }
                self.plans
                    .update(acid.as_str(), |plan| plan.add_contained_facility(&dest));
            }
            Err(err) => warn!(facility = %self.id, acid = %acid, dest = %dest, %err, "transfer relay failed"),
        }
    }

    fn receive_accept_recall(&mut self, msg: Message, ctx: &mut TickContext) {
        let Some(acid) = msg.acid.clone() else {
            warn!(facility = %self.id, source = %msg.source_id, "accept/recall without ACID");
            return;
        };

        if let Some(owner) = msg.track_owner.as_deref() {
            if let Some(info) = self.track_information.get_mut(acid.as_str()) {
                if info.track_owner != owner {
                    debug!(facility = %self.id, acid = %acid, from = %info.track_owner, to = owner, "transfer accepted");
                    info.track_owner = owner.to_string();
                } else {
                    debug!(facility = %self.id, acid = %acid, "transfer recalled");
                }
                info.handoff_target = None;
                info.sync_plan();
            }
            self.plans.update(acid.as_str(), |plan| plan.set_owner(owner));
        }

        let relay_hop = self.pending_relays.remove(acid.as_str());
        let next = match msg.facility_destination.clone() {
            Some(dest) if dest == self.id => None,
            Some(dest) => Some(dest),
            None => relay_hop.or_else(|| {
                self.plan(acid.as_str())
                    .and_then(|plan| {
                        self.adaptation
                            .fix(&plan.coordination_fix, &plan.filed_altitude)
                    })
                    .map(|entry| entry.from_facility.clone())
                    .filter(|from| *from != self.id)
            }),
        };

        if let Some(next) = next {
            let relay = msg.relayed_by(ctx.source_id(&self.id));
            if let Err(err) = self.route_toward(ctx.bus, next.as_str(), relay) {
                warn!(facility = %self.id, acid = %acid, next = %next, %err, "accept/recall relay failed");
            }
        }
    }

    /// Whether `acid` may carry `code` here. A code held by another live
    /// flight, in this facility or in the NAS pool, is refused.
    fn admit_beacon(&self, acid: &Acid, code: Squawk, pool: &mut BeaconPool) -> bool {
        if let Some(other) = self.plan_by_beacon(code).filter(|p| p.acid != *acid) {
            warn!(facility = %self.id, acid = %acid, bcn = %code, holder = %other.acid, "beacon held by another flight, message dropped");
            return false;
        }
        if pool.manages(code) {
            if let Err(err) = pool.claim(code, acid) {
                warn!(facility = %self.id, acid = %acid, holder = ?pool.holder(code), %err, "beacon conflict, message dropped");
                return false;
            }
        }
        true
    }

    fn acid_for(&self, msg: &Message) -> Option<Acid> {
        msg.acid.clone().or_else(|| {
            self.plan_by_beacon(msg.bcn)
                .filter(|_| !msg.bcn.is_placeholder())
                .map(|plan| plan.acid.clone())
        })
    }
}

/// Facility named by a message's source-ID, if it is long enough to name one.
pub(crate) fn sender_facility(msg: &Message) -> Option<FacilityId> {
    msg.source_id.facility().map(FacilityId::new)
}
