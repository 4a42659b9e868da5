//! Snapshot builder: reads every facility and builds a complete ScopeSnapshot.
//!
//! Read-only; it never modifies the engine.

use radarscope_core::components::TrackInfo;
use radarscope_core::enums::*;
use radarscope_core::events::Event;
use radarscope_core::flight_plan::{FlightPlan, TrackInformation};
use radarscope_core::state::*;
use radarscope_core::types::Cid;

use crate::computers::{EnrouteComputer, TerminalComputer};
use crate::engine::NasEngine;

/// Build a complete ScopeSnapshot from the current engine state.
pub fn build_snapshot(engine: &NasEngine, events: Vec<Event>) -> ScopeSnapshot {
    let mut facilities: Vec<FacilityView> = engine
        .enroutes
        .values()
        .map(|e| build_enroute(engine, e))
        .collect();
    facilities.extend(engine.terminals.values().map(|t| build_terminal(engine, t)));

    ScopeSnapshot {
        time: engine.time,
        phase: engine.phase,
        facilities,
        events,
    }
}

fn build_enroute(engine: &NasEngine, enroute: &EnrouteComputer) -> FacilityView {
    let mut plans: Vec<PlanView> = enroute
        .plans()
        .iter()
        .map(|p| plan_view(p, None, None))
        .collect();
    // Transfer records whose plan is not also in the plan map.
    plans.extend(
        enroute
            .track_information()
            .values()
            .filter_map(|info| info.flight_plan.as_ref())
            .filter(|p| !enroute.plans().contains(p.acid.as_str()))
            .map(|p| plan_view(p, None, None)),
    );

    FacilityView {
        id: enroute.id().clone(),
        kind: FacilityKind::Enroute,
        parent: None,
        plans,
        transfers: build_transfers(enroute.track_information().values()),
        tracks: Vec::new(),
        pending_messages: engine.bus.pending(enroute.id().as_str()),
    }
}

fn build_terminal(engine: &NasEngine, terminal: &TerminalComputer) -> FacilityView {
    let tracked = terminal
        .track_information()
        .values()
        .filter_map(|info| info.flight_plan.as_ref());
    let plans = tracked
        .chain(terminal.plans().iter())
        .map(|p| {
            plan_view(
                p,
                terminal.cid(&p.acid),
                terminal.plan_state(p.acid.as_str()),
            )
        })
        .collect();

    FacilityView {
        id: terminal.id().clone(),
        kind: FacilityKind::Terminal,
        parent: Some(terminal.parent().clone()),
        plans,
        transfers: build_transfers(terminal.track_information().values()),
        tracks: terminal
            .tracks()
            .values()
            .map(|t| track_view(terminal, t))
            .collect(),
        pending_messages: engine.bus.pending(terminal.id().as_str()),
    }
}

fn build_transfers<'a>(records: impl Iterator<Item = &'a TrackInformation>) -> Vec<TransferView> {
    records
        .map(|info| TransferView {
            acid: info.acid.clone(),
            track_owner: info.track_owner.clone(),
            handoff_target: info.handoff_target.clone(),
        })
        .collect()
}

fn plan_view(plan: &FlightPlan, cid: Option<Cid>, state: Option<PlanState>) -> PlanView {
    PlanView {
        acid: plan.acid.clone(),
        cid,
        beacon: plan.beacon,
        state,
        aircraft_type: plan.aircraft_type.clone(),
        rules: plan.rules,
        type_of_flight: plan.type_of_flight,
        filed_altitude: plan.filed_altitude.clone(),
        assigned_altitude: plan.assigned_altitude,
        interim_altitude: plan.interim_altitude,
        exit_fix: plan.exit_fix.clone(),
        coordination_fix: plan.coordination_fix.clone(),
        coordination_time: plan.coordination_time,
        tracking_controller: plan.tracking_controller.clone(),
        handoff_target: plan.handoff_target.clone(),
        scratchpad: plan.scratchpad.clone(),
        secondary_scratchpad: plan.secondary_scratchpad.clone(),
        contained_facilities: plan.contained_facilities.clone(),
    }
}

fn track_view(terminal: &TerminalComputer, track: &TrackInfo) -> TrackView {
    let handoff_offer = track.associated.as_ref().and_then(|acid| {
        let plan = terminal.plan(acid.as_str())?;
        plan.redirected_handoff
            .redirected_to
            .clone()
            .or_else(|| plan.handoff_target.clone())
    });
    let display = track
        .associated
        .as_ref()
        .map(|acid| terminal.display(acid))
        .unwrap_or_default();

    TrackView {
        callsign: track.callsign.clone(),
        beacon: track.beacon,
        position: track.position,
        altitude: track.altitude,
        groundspeed: track.groundspeed,
        mode: track.mode,
        ident: track.ident,
        history: track.history.iter().copied().collect(),
        alternate: track.alternate,
        associated: track.associated.clone(),
        handoff_offer,
        display,
    }
}
