//! Tests for allocators, routing, the facility computers, the controller
//! surface and the tick driver.

use std::collections::{HashMap, HashSet};

use chrono::TimeDelta;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use radarscope_core::commands::ControllerCommand;
use radarscope_core::constants::FORBIDDEN_BEACONS;
use radarscope_core::enums::*;
use radarscope_core::errors::ScopeError;
use radarscope_core::events::Event;
use radarscope_core::flight_plan::{CoordinationTime, FlightPlan, InterimAltitude};
use radarscope_core::message::{Message, RadarReturn};
use radarscope_core::types::*;

use crate::adaptation::{Adaptation, AdaptationFix, CoordinationFix};
use crate::bus::MessageBus;
use crate::computers::{TerminalComputer, TickContext};
use crate::config::{ControllerConfig, FacilityConfig, NasConfig};
use crate::controller::{parse_abbreviated_plan, parse_command};
use crate::engine::NasEngine;
use crate::id_alloc::{BeaconPool, CidAllocator};
use crate::resolver::resolve_for_route;
use crate::store::FlightPlanStore;

fn engine() -> NasEngine {
    NasEngine::new(NasConfig::default()).unwrap()
}

fn acid(text: &str) -> Acid {
    Acid::parse(text).unwrap()
}

fn enroute_plan(id: &str, route: &str) -> FlightPlan {
    let mut plan = FlightPlan::new(acid(id), Squawk::PLACEHOLDER);
    plan.aircraft_type = "B738".into();
    plan.filed_altitude = "FL350".into();
    plan.route = route.into();
    plan
}

fn radar(callsign: &str, beacon: u16, altitude: u32) -> RadarReturn {
    RadarReturn {
        callsign: callsign.into(),
        position: Point2LL::new(40.7, -74.0),
        altitude,
        groundspeed: 250,
        mode: TransponderMode::Altitude,
        ident: false,
        beacon: Squawk(beacon),
    }
}

/// Run `n` ticks and collect every event they produced.
fn run(engine: &mut NasEngine, n: usize) -> Vec<Event> {
    (0..n).flat_map(|_| engine.tick().events).collect()
}

/// DAL99 entered at N90 with beacon 1234 and tracked by 41.
fn tracked_dal99(engine: &mut NasEngine) {
    engine
        .execute_text("41", "FP DAL99 1234 41 B738/L 350")
        .unwrap();
}

/// Every beacon held by a live enroute plan or transfer record belongs to one ACID.
fn assert_unique_enroute_beacons(engine: &NasEngine) {
    let mut holders: HashMap<Squawk, Acid> = HashMap::new();
    for enroute in engine.enroutes() {
        let records = enroute
            .track_information()
            .values()
            .filter_map(|info| info.flight_plan.as_ref());
        for plan in enroute.plans().iter().chain(records) {
            if plan.beacon.is_placeholder() {
                continue;
            }
            if let Some(other) = holders.insert(plan.beacon, plan.acid.clone()) {
                assert_eq!(other, plan.acid, "beacon {} held by two flights", plan.beacon);
            }
        }
    }
}

// ---- Allocation ----

#[test]
fn test_s1_beacon_allocation_respects_exclusions() {
    let mut pool = BeaconPool::nas();
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let mut seen = HashSet::new();
    for i in 0..6 {
        let code = pool.allocate(&acid(&format!("TST{i}")), &mut rng).unwrap();
        assert!(!FORBIDDEN_BEACONS.contains(&code.0), "forbidden code {code}");
        assert!(!code.ends_in_00(), "code {code} ends in 00");
        assert!(code.to_string().chars().all(|c| ('0'..='7').contains(&c)));
        assert!((0o1001..=0o7777).contains(&code.0));
        assert!(seen.insert(code), "code {code} handed out twice");
    }
}

#[test]
fn test_beacon_allocation_idempotent_per_acid() {
    let mut pool = BeaconPool::nas();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let a = pool.allocate(&acid("AAL1"), &mut rng).unwrap();
    let b = pool.allocate(&acid("AAL1"), &mut rng).unwrap();
    assert_eq!(a, b);
    assert_eq!(pool.code_for(&acid("AAL1")), Some(a));
}

#[test]
fn test_beacon_release_never_leaves_two_holders() {
    let mut pool = BeaconPool::nas();
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let code = pool.allocate(&acid("AAL1"), &mut rng).unwrap();
    assert_eq!(pool.release(code).unwrap(), acid("AAL1"));
    assert!(!pool.is_assigned(code));

    pool.claim(code, &acid("UAL2")).unwrap();
    assert_eq!(pool.holder(code), Some(&acid("UAL2")));
    assert_eq!(pool.code_for(&acid("AAL1")), None);
}

#[test]
fn test_bank_pool_range_and_exhaustion() {
    let mut pool = BeaconPool::bank(1).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    assert_eq!(pool.num_available(), 63);
    for i in 0..63 {
        let code = pool.allocate(&acid(&format!("B{i}")), &mut rng).unwrap();
        assert!((0o101..=0o177).contains(&code.0));
    }
    assert_eq!(pool.num_available(), 0);
    assert_eq!(
        pool.allocate(&acid("LATE1"), &mut rng),
        Err(ScopeError::NoBeaconAvailable)
    );
    assert_eq!(BeaconPool::bank(8).err(), Some(ScopeError::IllegalValue));
}

#[test]
fn test_beacon_claim_and_release_errors() {
    let mut pool = BeaconPool::nas();
    pool.claim(Squawk(0o1234), &acid("AAL1")).unwrap();
    assert_eq!(
        pool.claim(Squawk(0o1234), &acid("UAL2")),
        Err(ScopeError::BeaconAlreadyAssigned(Squawk(0o1234)))
    );
    assert_eq!(
        pool.claim(Squawk(0o1200), &acid("UAL2")),
        Err(ScopeError::BeaconNotManaged(Squawk(0o1200)))
    );
    assert_eq!(
        pool.claim(Squawk(0o2300), &acid("UAL2")),
        Err(ScopeError::BeaconNotManaged(Squawk(0o2300)))
    );
    assert_eq!(
        pool.release(Squawk(0o2345)),
        Err(ScopeError::BeaconUnassigned(Squawk(0o2345)))
    );
}

#[test]
fn test_cid_allocation_unique_and_idempotent() {
    let mut cids = CidAllocator::new();
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let mut seen = HashSet::new();
    for i in 0..50 {
        let cid = cids.allocate(&acid(&format!("C{i}")), &mut rng);
        assert!(cid.0 < 1000);
        assert!(seen.insert(cid));
    }
    let again = cids.allocate(&acid("C7"), &mut rng);
    assert_eq!(cids.get(&acid("C7")), Some(again));
    assert_eq!(cids.in_use(), 50);

    cids.release(&acid("C7"));
    assert_eq!(cids.get(&acid("C7")), None);
    assert_eq!(cids.in_use(), 49);
}

#[test]
fn test_cid_overflow_reuses_start_slot() {
    let mut cids = CidAllocator::new();
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    for i in 0..1000 {
        cids.allocate(&acid(&format!("A{i}")), &mut rng);
    }
    assert_eq!(cids.in_use(), 1000);

    let cid = cids.allocate(&acid("LATE1"), &mut rng);
    assert_eq!(cids.holder(cid), Some(&acid("LATE1")));
    assert_eq!(cids.in_use(), 1000);
}

// ---- Flight-plan store ----

#[test]
fn test_store_beacon_index_follows_update() {
    let mut store = FlightPlanStore::new();
    store.insert(FlightPlan::new(acid("AAL1"), Squawk(0o1234)));
    assert!(store.by_beacon(Squawk(0o1234)).is_some());

    store.update("AAL1", |plan| plan.beacon = Squawk(0o2345));
    assert!(store.by_beacon(Squawk(0o1234)).is_none());
    assert_eq!(
        store.acid_for_beacon(Squawk(0o2345)),
        Some(&acid("AAL1"))
    );

    assert!(store.remove_by_beacon(Squawk(0o2345)).is_some());
    assert!(store.is_empty());
}

#[test]
fn test_store_amend_missing_plan() {
    let mut store = FlightPlanStore::new();
    let err = store.amend("NOPE1", &Default::default()).unwrap_err();
    assert_eq!(err, ScopeError::NoFlightPlan("NOPE1".into()));
}

// ---- Coordination resolver ----

#[test]
fn test_resolver_prefers_route_fix() {
    let config = NasConfig::default();
    let zny = config.adaptation_for(&FacilityId::new("ZNY"));
    let near_sax = Some(Point2LL::new(41.07, -74.54));
    assert_eq!(
        resolve_for_route(&zny, "COATE J80 BAF", "FL350", near_sax),
        Some("COATE".to_string())
    );
}

#[test]
fn test_adaptation_band_selects_entry() {
    let config = NasConfig::default();
    let zny = config.adaptation_for(&FacilityId::new("ZNY"));
    assert_eq!(zny.fix("DIXIE", "200").unwrap().to_facility.as_str(), "N90");
    assert_eq!(zny.fix("DIXIE", "FL350").unwrap().to_facility.as_str(), "ZDC");
    // Block altitudes select on their floor.
    assert_eq!(zny.fix("DIXIE", "170B250").unwrap().to_facility.as_str(), "N90");
    // Single-entry fixes apply at any altitude.
    assert_eq!(zny.fix("COATE", "VFR").unwrap().to_facility.as_str(), "N90");
}

#[test]
fn test_resolver_zone_fallback_nearest() {
    let config = NasConfig::default();
    let zny = config.adaptation_for(&FacilityId::new("ZNY"));
    assert_eq!(
        resolve_for_route(&zny, "J80", "FL350", Some(Point2LL::new(41.07, -74.54))),
        Some("SAX".to_string())
    );
    assert_eq!(
        resolve_for_route(&zny, "J80", "FL350", Some(Point2LL::new(40.23, -73.40))),
        Some("WAVEY".to_string())
    );
    assert_eq!(resolve_for_route(&zny, "J80", "FL350", None), None);
}

#[test]
fn test_resolver_zone_tie_breaks_by_name() {
    let zone = |name: &str| CoordinationFix {
        name: name.into(),
        location: Some(Point2LL::new(40.0, -74.0)),
        entries: vec![AdaptationFix {
            kind: FixKind::Zone,
            altitude: [0, 600],
            from_facility: FacilityId::new("ZNY"),
            to_facility: FacilityId::new("N90"),
        }],
    };
    let adaptation = Adaptation {
        coordination_fixes: vec![zone("BBB"), zone("AAA")],
    };
    assert_eq!(
        resolve_for_route(&adaptation, "J80", "350", Some(Point2LL::new(40.5, -74.0))),
        Some("AAA".to_string())
    );
}

// ---- Message bus ----

#[test]
fn test_bus_routing_errors() {
    let mut bus = MessageBus::new();
    let zny = FacilityId::new("ZNY");
    let zdc = FacilityId::new("ZDC");
    bus.add_enroute(zny.clone());
    bus.add_enroute(zdc.clone());
    bus.add_terminal(FacilityId::new("N90"), zny.clone()).unwrap();

    let msg = Message::default();
    assert_eq!(
        bus.send_to_enroute(&zny, "ZZZ", msg.clone()),
        Err(ScopeError::NoSuchEnrouteFacility("ZZZ".into()))
    );
    assert!(bus.send_to_enroute(&zny, "ZNY", msg.clone()).is_err());
    assert_eq!(
        bus.send_to_terminal(&zdc, "N90", msg.clone()),
        Err(ScopeError::NoSuchTerminalFacility("N90".into()))
    );
    assert_eq!(
        bus.add_terminal(FacilityId::new("PHL"), FacilityId::new("N90")),
        Err(ScopeError::NoSuchEnrouteFacility("N90".into()))
    );
    assert_eq!(
        bus.deliver("XXX", msg.clone()),
        Err(ScopeError::NoSuchFacility("XXX".into()))
    );
    assert_eq!(bus.total_pending(), 0);
}

#[test]
fn test_bus_fifo_per_inbox() {
    let mut bus = MessageBus::new();
    let zny = FacilityId::new("ZNY");
    let n90 = FacilityId::new("N90");
    bus.add_enroute(zny.clone());
    bus.add_terminal(n90.clone(), zny.clone()).unwrap();

    for kind in [MessageKind::Plan, MessageKind::Amendment, MessageKind::Cancellation] {
        bus.send_to_overlying_enroute(&n90, Message::new(kind, SourceId::raw("N901504")))
            .unwrap();
    }
    assert_eq!(bus.pending("ZNY"), 3);
    let kinds: Vec<MessageKind> = bus.drain("ZNY").into_iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![MessageKind::Plan, MessageKind::Amendment, MessageKind::Cancellation]
    );
    assert_eq!(bus.pending("ZNY"), 0);
    assert_eq!(bus.children("ZNY").count(), 1);
}

// ---- Enroute plan forwarding ----

#[test]
fn test_s2_plan_forwarded_to_terminal() {
    let mut engine = engine();
    let mut plan = enroute_plan("UAL123", "COATE J80 BAF");
    plan.beacon = Squawk(0o1234);
    let msg = Message::from_plan(MessageKind::Plan, SourceId::raw("ZBW1504"), &plan);
    engine.deliver("ZNY", msg).unwrap();

    let events = run(&mut engine, 1);

    let zny = engine.enroute("ZNY").unwrap();
    let stored = zny.plan("UAL123").unwrap();
    assert_eq!(stored.coordination_fix, "COATE");
    assert_eq!(stored.contained_facilities, vec![FacilityId::new("N90")]);

    let n90 = engine.terminal("N90").unwrap();
    assert_eq!(n90.plan_state("UAL123"), Some(PlanState::Proposed));
    assert!(n90.cid(&acid("UAL123")).is_some());
    assert!(events.contains(&Event::PushedFlightStrip {
        facility: FacilityId::new("N90"),
        acid: acid("UAL123"),
    }));
    assert_eq!(engine.nas_beacons().holder(Squawk(0o1234)), Some(&acid("UAL123")));
    assert_eq!(engine.bus().total_pending(), 0);
}

#[test]
fn test_plan_delivered_once_per_facility() {
    let mut engine = engine();
    let mut plan = enroute_plan("UAL123", "COATE J80 BAF");
    plan.beacon = Squawk(0o1234);
    engine
        .deliver("ZNY", Message::from_plan(MessageKind::Plan, SourceId::raw("ZBW1504"), &plan))
        .unwrap();

    let events = run(&mut engine, 5);
    let strips = events
        .iter()
        .filter(|e| matches!(e, Event::PushedFlightStrip { acid, .. } if acid.as_str() == "UAL123"))
        .count();
    assert_eq!(strips, 1);

    // Every facility in the contained set holds a copy, and only those.
    let stored = engine.enroute("ZNY").unwrap().plan("UAL123").unwrap();
    let holders: Vec<&str> = engine
        .terminals()
        .filter(|t| t.plan("UAL123").is_some())
        .map(|t| t.id().as_str())
        .collect();
    assert_eq!(holders.len(), stored.contained_facilities.len());
    assert_eq!(holders, vec!["N90"]);
}

#[test]
fn test_placeholder_beacon_plan_ignored() {
    let mut engine = engine();
    let plan = enroute_plan("UAL123", "COATE J80 BAF");
    engine
        .deliver("ZNY", Message::from_plan(MessageKind::Plan, SourceId::raw("ZBW1504"), &plan))
        .unwrap();
    engine.tick();
    assert!(engine.enroute("ZNY").unwrap().plan("UAL123").is_none());
    assert!(engine.terminal("N90").unwrap().plan("UAL123").is_none());
}

#[test]
fn test_push_waits_for_coordination_time() {
    let config = NasConfig {
        tick_secs: 600,
        ..Default::default()
    };
    let start = config.start_time;
    let mut engine = NasEngine::new(config).unwrap();

    let mut plan = enroute_plan("JBU5", "COATE J80");
    plan.coordination_fix = "COATE".into();
    plan.coordination_time = Some(CoordinationTime {
        time: start + TimeDelta::minutes(60),
        kind: CoordinationTimeKind::E,
    });
    let code = engine.file_flight_plan("ZNY", plan, None).unwrap();
    assert!(engine.nas_beacons().manages(code));
    assert_eq!(engine.nas_beacons().holder(code), Some(&acid("JBU5")));

    run(&mut engine, 3);
    assert!(engine.terminal("N90").unwrap().plan("JBU5").is_none());

    run(&mut engine, 1);
    assert!(engine.terminal("N90").unwrap().plan("JBU5").is_some());
    let stored = engine.enroute("ZNY").unwrap().plan("JBU5").unwrap();
    assert!(stored.contains_facility("N90"));
}

#[test]
fn test_plan_without_coordination_time_pushed_first_tick() {
    let mut engine = engine();
    engine
        .file_flight_plan("ZNY", enroute_plan("JBU6", "COATE J80"), None)
        .unwrap();
    run(&mut engine, 1);
    let n90 = engine.terminal("N90").unwrap();
    assert_eq!(n90.plan("JBU6").unwrap().coordination_fix, "COATE");
}

#[test]
fn test_push_to_terminal_under_peer_enroute() {
    let mut engine = engine();
    engine
        .file_flight_plan("ZNY", enroute_plan("AAL7", "ARD J48"), None)
        .unwrap();

    run(&mut engine, 1);
    let zny_copy = engine.enroute("ZNY").unwrap().plan("AAL7").unwrap();
    assert_eq!(zny_copy.coordination_fix, "ARD");
    assert!(zny_copy.contains_facility("PHL"));
    assert!(engine.terminal("PHL").unwrap().plan("AAL7").is_none());

    run(&mut engine, 1);
    assert!(engine.terminal("PHL").unwrap().plan("AAL7").is_some());
    assert!(engine.enroute("ZDC").unwrap().plan("AAL7").is_some());
}

#[test]
fn test_filed_beacons_unique_across_enroute() {
    let mut engine = engine();
    let mut codes = HashSet::new();
    for i in 0..20 {
        let code = engine
            .file_flight_plan("ZNY", enroute_plan(&format!("N{i}AB"), "J80"), None)
            .unwrap();
        assert!(codes.insert(code));
    }
    let err = engine
        .file_flight_plan("ZNY", enroute_plan("N3AB", "J80"), None)
        .unwrap_err();
    assert_eq!(err, ScopeError::IllegalAcid("N3AB".into()));
    assert_eq!(
        engine.file_flight_plan("N90", enroute_plan("N99AB", "J80"), None),
        Err(ScopeError::NoSuchEnrouteFacility("N90".into()))
    );
}

#[test]
fn test_cancellation_forwarded_and_beacon_released() {
    let mut engine = engine();
    let code = engine
        .file_flight_plan("ZNY", enroute_plan("JBU6", "COATE J80"), None)
        .unwrap();
    run(&mut engine, 1);
    assert!(engine.terminal("N90").unwrap().plan("JBU6").is_some());

    let mut cancel = Message::new(MessageKind::Cancellation, SourceId::raw("ZBW1600"));
    cancel.acid = Some(acid("JBU6"));
    engine.deliver("ZNY", cancel).unwrap();
    let events = run(&mut engine, 1);

    assert!(engine.enroute("ZNY").unwrap().plan("JBU6").is_none());
    assert!(engine.terminal("N90").unwrap().plan("JBU6").is_none());
    assert!(!engine.nas_beacons().is_assigned(code));
    assert!(events.contains(&Event::DroppedTrack {
        facility: FacilityId::new("N90"),
        acid: acid("JBU6"),
    }));
}

#[test]
fn test_amendment_forwarded_to_contained_facilities() {
    let mut engine = engine();
    engine
        .file_flight_plan("ZNY", enroute_plan("JBU6", "COATE J80"), None)
        .unwrap();
    run(&mut engine, 1);

    let mut amended = engine.enroute("ZNY").unwrap().plan("JBU6").unwrap().clone();
    amended.scratchpad = "ABC".into();
    amended.assigned_altitude = Some(27_000);
    engine
        .deliver(
            "ZNY",
            Message::from_plan(MessageKind::Amendment, SourceId::raw("ZBW1600"), &amended),
        )
        .unwrap();
    run(&mut engine, 1);

    let n90_copy = engine.terminal("N90").unwrap().plan("JBU6").unwrap();
    assert_eq!(n90_copy.scratchpad, "ABC");
    assert_eq!(n90_copy.assigned_altitude, Some(27_000));
    assert_eq!(
        engine.enroute("ZNY").unwrap().plan("JBU6").unwrap().scratchpad,
        "ABC"
    );
}

#[test]
fn test_beacon_terminate_releases_code() {
    let mut engine = engine();
    let code = engine
        .file_flight_plan("ZNY", enroute_plan("JBU6", "J80"), None)
        .unwrap();
    let mut msg = Message::new(MessageKind::BeaconTerminate, SourceId::raw("ZBW1600"));
    msg.bcn = code;
    engine.deliver("ZNY", msg).unwrap();
    run(&mut engine, 1);
    assert!(!engine.nas_beacons().is_assigned(code));
}

#[test]
fn test_request_flight_plan_replies_as_departure() {
    let mut engine = engine();
    let mut plan = enroute_plan("N123AB", "BAF");
    plan.rules = FlightRules::Vfr;
    plan.filed_altitude = "170".into();
    plan.exit_fix = "PHL".into();
    let code = engine.file_flight_plan("ZNY", plan, None).unwrap();

    engine
        .execute_text("41", &format!("QB {code}"))
        .unwrap();
    run(&mut engine, 1);

    let copy = engine.terminal("N90").unwrap().plan("N123AB").unwrap();
    assert_eq!(copy.filed_altitude, "VFR/170");
    assert_eq!(copy.rules, FlightRules::Vfr);
    assert_eq!(copy.type_of_flight, TypeOfFlight::Departure);
    assert_eq!(copy.coordination_fix, "PHL");
    assert!(engine
        .enroute("ZNY")
        .unwrap()
        .plan("N123AB")
        .unwrap()
        .contains_facility("N90"));
}

#[test]
fn test_departure_message_sets_coordination_time() {
    let mut engine = engine();
    engine.execute_text("41", "FP AAL7 P 41 B738 350").unwrap();
    run(&mut engine, 1);

    let copy = engine.enroute("ZNY").unwrap().plan("AAL7").unwrap();
    let ct = copy.coordination_time.unwrap();
    assert_eq!(ct.kind, CoordinationTimeKind::P);
    assert_eq!(ct.time, NasConfig::default().start_time);
}

#[test]
fn test_plan_with_beacon_of_another_flight_rejected() {
    let mut engine = engine();
    for id in ["UAL123", "DAL456"] {
        let mut plan = enroute_plan(id, "COATE J80 BAF");
        plan.beacon = Squawk(0o1234);
        engine
            .deliver("ZNY", Message::from_plan(MessageKind::Plan, SourceId::raw("ZBW1504"), &plan))
            .unwrap();
    }
    run(&mut engine, 2);

    let zny = engine.enroute("ZNY").unwrap();
    assert!(zny.plan("UAL123").is_some());
    assert!(zny.plan("DAL456").is_none());
    assert_eq!(zny.plan_by_beacon(Squawk(0o1234)).unwrap().acid, acid("UAL123"));
    assert_eq!(engine.nas_beacons().holder(Squawk(0o1234)), Some(&acid("UAL123")));
    assert!(engine.terminal("N90").unwrap().plan("DAL456").is_none());
    assert_unique_enroute_beacons(&engine);
}

#[test]
fn test_amendment_cannot_take_beacon_of_another_flight() {
    let mut engine = engine();
    let taken = engine
        .file_flight_plan("ZNY", enroute_plan("JBU6", "J80"), None)
        .unwrap();
    engine
        .file_flight_plan("ZNY", enroute_plan("JBU7", "J80"), None)
        .unwrap();

    let mut amended = engine.enroute("ZNY").unwrap().plan("JBU7").unwrap().clone();
    amended.beacon = taken;
    amended.scratchpad = "ABC".into();
    engine
        .deliver(
            "ZNY",
            Message::from_plan(MessageKind::Amendment, SourceId::raw("ZBW1600"), &amended),
        )
        .unwrap();
    run(&mut engine, 1);

    let jbu7 = engine.enroute("ZNY").unwrap().plan("JBU7").unwrap();
    assert_ne!(jbu7.beacon, taken);
    assert_eq!(jbu7.scratchpad, "");
    assert_eq!(engine.nas_beacons().holder(taken), Some(&acid("JBU6")));
    assert_unique_enroute_beacons(&engine);
}

// ---- Transfers and handoffs ----

#[test]
fn test_s3_handoff_across_enroute_facilities() {
    let mut engine = engine();
    tracked_dal99(&mut engine);

    let out = engine.execute_text("31", "27 DAL99").unwrap();
    assert!(out.big_output.starts_with("ACCEPT\nINITIATE H/O\nDAL99/"));
    let n90 = engine.terminal("N90").unwrap();
    assert_eq!(n90.plan_state("DAL99"), Some(PlanState::HandoffOffered));

    let events = run(&mut engine, 2);
    let record = &engine.terminal("PHL").unwrap().track_information()["DAL99"];
    assert_eq!(record.track_owner, "41");
    assert_eq!(record.handoff_target.as_deref(), Some("27"));
    assert!(events.contains(&Event::OfferedHandoff {
        facility: FacilityId::new("PHL"),
        acid: acid("DAL99"),
        from: "41".into(),
        to: "27".into(),
    }));

    let out = engine.execute_text("27", "DAL99").unwrap();
    assert!(out.big_output.starts_with("ACCEPT\nACCEPT H/O\nDAL99/"));
    let events = run(&mut engine, 1);

    for facility in ["N90", "PHL"] {
        let record = &engine.terminal(facility).unwrap().track_information()["DAL99"];
        assert_eq!(record.track_owner, "27", "owner at {facility}");
        assert_eq!(record.handoff_target, None);
        let plan = record.flight_plan.as_ref().unwrap();
        assert_eq!(plan.tracking_controller.as_deref(), Some("27"));
    }
    for facility in ["ZNY", "ZDC"] {
        let record = &engine.enroute(facility).unwrap().track_information()["DAL99"];
        assert_eq!(record.track_owner, "27", "owner at {facility}");
        assert_eq!(record.handoff_target, None);
        assert!(engine.enroute(facility).unwrap().pending_relays().is_empty());
    }
    assert_eq!(
        engine.enroute("ZNY").unwrap().plans().get("DAL99").unwrap().tracking_controller.as_deref(),
        Some("27")
    );
    assert_eq!(
        engine.terminal("N90").unwrap().plan_state("DAL99"),
        Some(PlanState::TrackedByPeer)
    );
    assert!(events.contains(&Event::AcceptedHandoff {
        facility: FacilityId::new("N90"),
        acid: acid("DAL99"),
        from: "41".into(),
        to: "27".into(),
    }));
}

#[test]
fn test_s4_drop_rejected_without_control() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    engine.execute_text("31", "27 DAL99").unwrap();
    run(&mut engine, 2);

    let err = engine.execute_text("27", "QX DAL99").unwrap_err();
    assert!(matches!(err, ScopeError::NoControl { .. }));
    assert_eq!(err.big_output(), "ILLEGAL ACID");

    let record = &engine.terminal("PHL").unwrap().track_information()["DAL99"];
    assert_eq!(record.track_owner, "41");
    assert_eq!(record.handoff_target.as_deref(), Some("27"));
}

#[test]
fn test_recall_retraces_relay_path() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    engine.execute_text("31", "27 DAL99").unwrap();
    run(&mut engine, 2);

    let out = engine.execute_text("41", "RC DAL99").unwrap();
    assert!(out.big_output.starts_with("ACCEPT\nRECALL H/O\n"));
    let events = run(&mut engine, 2);

    let phl = engine.terminal("PHL").unwrap();
    assert!(!phl.track_information().contains_key("DAL99"));
    assert_eq!(phl.plan_state("DAL99"), Some(PlanState::Proposed));
    assert!(events.contains(&Event::CanceledHandoff {
        facility: FacilityId::new("PHL"),
        acid: acid("DAL99"),
        from: "41".into(),
        to: "27".into(),
    }));
    assert_eq!(
        engine.terminal("N90").unwrap().plan_state("DAL99"),
        Some(PlanState::TrackedLocally)
    );
    assert_eq!(
        engine.enroute("ZDC").unwrap().track_information()["DAL99"].handoff_target,
        None
    );
}

#[test]
fn test_accept_requires_offer_to_position() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    engine.execute_text("41", "31 DAL99").unwrap();

    let err = engine.execute_text("4A", "AC DAL99").unwrap_err();
    assert_eq!(err, ScopeError::NotHandedOffToMe("DAL99".into()));
    assert_eq!(err.big_output(), "ILLEGAL ACID");

    engine.execute_text("31", "AC DAL99").unwrap();
    let n90 = engine.terminal("N90").unwrap();
    assert_eq!(n90.owner(&acid("DAL99")), Some("31"));
    // Intra-facility handoffs stay local: only the plan entry went up.
    assert_eq!(engine.bus().pending("ZNY"), 1);
}

#[test]
fn test_handoff_to_unknown_position() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    assert_eq!(
        engine.execute_text("41", "99 DAL99"),
        Err(ScopeError::IllegalPosition("99".into()))
    );
    assert_eq!(
        engine.execute_text("41", "41 DAL99"),
        Err(ScopeError::IllegalPosition("41".into()))
    );
}

#[test]
fn test_redirected_handoff_accepted() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    engine.execute_text("41", "31 DAL99").unwrap();
    engine.execute_text("31", "RH 4A DAL99").unwrap();
    assert!(engine.terminal("N90").unwrap().offered_to(&acid("DAL99"), "4A"));

    engine.execute_text("4A", "DAL99").unwrap();
    let events = run(&mut engine, 1);
    assert_eq!(engine.terminal("N90").unwrap().owner(&acid("DAL99")), Some("4A"));
    assert!(events.contains(&Event::AcceptedRedirectedHandoff {
        facility: FacilityId::new("N90"),
        acid: acid("DAL99"),
        from: "41".into(),
        to: "4A".into(),
    }));
}

#[test]
fn test_redirect_back_to_first_redirector_falls_back() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    engine.execute_text("41", "31 DAL99").unwrap();
    engine.execute_text("31", "RH 4A DAL99").unwrap();
    engine.execute_text("4A", "RH 31 DAL99").unwrap();

    let n90 = engine.terminal("N90").unwrap();
    let record = &n90.track_information()["DAL99"];
    assert_eq!(record.handoff_target.as_deref(), Some("31"));
    assert!(!record.flight_plan.as_ref().unwrap().redirected_handoff.is_active());
}

#[test]
fn test_transfer_for_unknown_flight_rejected() {
    let mut engine = engine();
    let mut msg = Message::new(MessageKind::InitiateTransfer, SourceId::raw("ZNY1504"));
    msg.acid = Some(acid("NOPE1"));
    msg.track_owner = Some("27".into());
    msg.handoff_target = Some("41".into());
    engine.deliver("N90", msg).unwrap();

    let events = run(&mut engine, 1);
    assert!(events.contains(&Event::TransferRejected {
        facility: FacilityId::new("N90"),
        acid: "NOPE1".into(),
    }));
}

#[test]
fn test_malformed_source_does_not_crash_relay() {
    let mut engine = engine();
    let mut plan = enroute_plan("DAL5", "J80");
    plan.beacon = Squawk(0o4321);
    let mut msg = Message::from_plan(MessageKind::InitiateTransfer, SourceId::raw("ZN"), &plan);
    msg.track_owner = Some("41".into());
    msg.handoff_target = Some("27".into());
    msg.facility_destination = Some(FacilityId::new("PHL"));
    msg.plan = Some(Box::new(plan));
    engine.deliver("ZNY", msg).unwrap();

    run(&mut engine, 1);
    let zny = engine.enroute("ZNY").unwrap();
    assert!(zny.track_information().contains_key("DAL5"));
    assert!(!zny.pending_relays().contains_key("DAL5"));
    assert_eq!(engine.bus().pending("ZDC"), 1);
}

#[test]
fn test_replan_of_transferred_flight_keeps_one_beacon_holder() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    engine.execute_text("31", "27 DAL99").unwrap();
    run(&mut engine, 2);
    assert!(engine.enroute("ZNY").unwrap().track_information().contains_key("DAL99"));

    let mut again = enroute_plan("DAL99", "J80");
    again.beacon = Squawk(0o1234);
    let mut intruder = enroute_plan("AAL7", "J80");
    intruder.beacon = Squawk(0o1234);
    for plan in [&again, &intruder] {
        engine
            .deliver("ZNY", Message::from_plan(MessageKind::Plan, SourceId::raw("ZBW1504"), plan))
            .unwrap();
    }
    run(&mut engine, 1);

    let zny = engine.enroute("ZNY").unwrap();
    assert!(zny.plan("AAL7").is_none());
    assert_eq!(zny.plan_by_beacon(Squawk(0o1234)).unwrap().acid, acid("DAL99"));
    assert_eq!(engine.nas_beacons().holder(Squawk(0o1234)), Some(&acid("DAL99")));
    assert_unique_enroute_beacons(&engine);
}

#[test]
fn test_handoff_requires_owner_or_controlling_position() {
    let mut engine = engine();
    tracked_dal99(&mut engine);

    let err = engine.execute_text("4A", "27 DAL99").unwrap_err();
    assert_eq!(
        err,
        ScopeError::NoControl {
            acid: "DAL99".into(),
            position: "4A".into(),
        }
    );
    assert_eq!(err.big_output(), "ILLEGAL ACID");
    let n90 = engine.terminal("N90").unwrap();
    assert_eq!(n90.track_information()["DAL99"].handoff_target, None);

    engine.execute_text("41", "4A DAL99").unwrap();
    assert_eq!(
        engine.terminal("N90").unwrap().track_information()["DAL99"].handoff_target.as_deref(),
        Some("4A")
    );
}

// ---- Terminal operations ----

#[test]
fn test_drop_track_releases_ids_and_cancels_upstream() {
    let mut engine = engine();
    engine.execute_text("41", "FP DAL99 41 B738 350").unwrap();
    let n90 = engine.terminal("N90").unwrap();
    let code = n90.plan("DAL99").unwrap().beacon;
    assert!((0o201..=0o277).contains(&code.0));
    assert!(n90.beacons().is_assigned(code));

    let out = engine.execute_text("41", "QX DAL99").unwrap();
    assert!(out.big_output.starts_with("ACCEPT\nDROP TRACK\nDAL99/"));
    let n90 = engine.terminal("N90").unwrap();
    assert!(n90.plan("DAL99").is_none());
    assert!(!n90.beacons().is_assigned(code));
    assert_eq!(n90.cid(&acid("DAL99")), None);

    run(&mut engine, 1);
    assert!(engine.enroute("ZNY").unwrap().plan("DAL99").is_none());
}

#[test]
fn test_terminal_amendment_reaches_enroute() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    let out = engine.execute_text("41", "QZ 240 DAL99").unwrap();
    assert!(out.big_output.starts_with("ACCEPT\nASSIGNED ALT\nDAL99/"));
    run(&mut engine, 1);
    assert_eq!(
        engine.enroute("ZNY").unwrap().plan("DAL99").unwrap().assigned_altitude,
        Some(24_000)
    );
}

#[test]
fn test_s5_interim_altitude_by_beacon() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    engine.radar_return("N90", radar("DAL99", 0o1234, 23_000)).unwrap();
    let events = run(&mut engine, 1);
    assert!(events.contains(&Event::FlightPlanAssociated {
        facility: FacilityId::new("N90"),
        acid: acid("DAL99"),
    }));

    let cid = engine.terminal("N90").unwrap().cid(&acid("DAL99")).unwrap();
    let out = engine.execute_text("41", "QQ 170 1234").unwrap();
    assert_eq!(out.big_output, format!("ACCEPT\nINTERIM ALT\nDAL99/{cid}"));
    let plan = engine.terminal("N90").unwrap().plan("DAL99").unwrap();
    assert_eq!(
        plan.interim_altitude,
        Some(InterimAltitude {
            feet: 17_000,
            kind: InterimAltitudeKind::Normal,
        })
    );
    let events = run(&mut engine, 1);
    assert!(events.contains(&Event::AircraftCommand {
        callsign: "DAL99".into(),
        command: "D170".into(),
    }));

    engine.radar_return("N90", radar("DAL99", 0o1234, 12_000)).unwrap();
    run(&mut engine, 1);
    engine.execute_text("41", "QQ 170 1234").unwrap();
    let events = run(&mut engine, 1);
    assert!(events.contains(&Event::AircraftCommand {
        callsign: "DAL99".into(),
        command: "C170".into(),
    }));
}

#[test]
fn test_s6_direct_to_fix() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    let out = engine.execute_text("41", "QU JFK 1234").unwrap();
    assert!(out.big_output.starts_with("ACCEPT\nREROUTE\nDAL99/"));

    let n90 = engine.terminal("N90").unwrap();
    assert_eq!(n90.plan("DAL99").unwrap().exit_fix, "JFK");
    assert!(n90.display(&acid("DAL99")).route_lines);

    let events = run(&mut engine, 1);
    assert!(events.contains(&Event::AircraftCommand {
        callsign: "DAL99".into(),
        command: "DJFK".into(),
    }));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::FixCoordinates { fixes, .. } if fixes[0].0 == "JFK")));

    assert_eq!(
        engine.execute_text("41", "QU XYZZY 1234"),
        Err(ScopeError::IllegalAcid("XYZZY".into()))
    );
}

#[test]
fn test_route_lines_show_and_clear() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    let out = engine.execute_text("41", "QU /M DAL99").unwrap();
    assert!(out.big_output.starts_with("ACCEPT\nROUTE DISPLAY\n"));
    assert!(engine.terminal("N90").unwrap().display(&acid("DAL99")).route_lines);
    engine.execute_text("41", "QU").unwrap();
    assert!(!engine.terminal("N90").unwrap().display(&acid("DAL99")).route_lines);
}

#[test]
fn test_reduced_jring_refused_above_ceiling() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    engine.radar_return("N90", radar("DAL99", 0o1234, 24_000)).unwrap();
    run(&mut engine, 1);
    assert_eq!(
        engine.execute_text("41", "QP T DAL99"),
        Err(ScopeError::IllegalValue)
    );

    engine.radar_return("N90", radar("DAL99", 0o1234, 23_000)).unwrap();
    run(&mut engine, 1);
    engine.execute_text("41", "QP T DAL99").unwrap();
    assert!(engine.terminal("N90").unwrap().display(&acid("DAL99")).reduced_jring);

    engine.execute_text("41", "QP J DAL99").unwrap();
    let display = engine.terminal("N90").unwrap().display(&acid("DAL99"));
    assert!(display.jring);
    assert!(!display.reduced_jring);
}

#[test]
fn test_forced_datablock_and_vci() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    assert_eq!(
        engine.execute_text("41", "DAL99"),
        Err(ScopeError::IllegalUserAction)
    );
    let out = engine.execute_text("31", "DAL99").unwrap();
    assert!(out.big_output.starts_with("ACCEPT\nFORCED DATA BLOCK\n"));
    assert!(engine.terminal("N90").unwrap().display(&acid("DAL99")).forced_datablock);

    engine.execute_text("41", "//DAL99").unwrap();
    assert!(engine.terminal("N90").unwrap().display(&acid("DAL99")).on_frequency);
}

#[test]
fn test_flid_resolution_order() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    let n90 = engine.terminal("N90").unwrap();
    let cid = n90.cid(&acid("DAL99")).unwrap();
    assert_eq!(n90.resolve_flid("1234").unwrap(), acid("DAL99"));
    assert_eq!(n90.resolve_flid(&cid.to_string()).unwrap(), acid("DAL99"));
    assert_eq!(n90.resolve_flid("DAL99").unwrap(), acid("DAL99"));
    assert_eq!(
        n90.resolve_flid("ZZZ999"),
        Err(ScopeError::IllegalAcid("ZZZ999".into()))
    );
}

#[test]
fn test_relay_to_aircraft_by_suffix() {
    let mut engine = engine();
    engine.radar_return("N90", radar("DAL99", 0o4411, 9_000)).unwrap();
    engine.radar_return("N90", radar("UAL99", 0o4412, 9_000)).unwrap();
    run(&mut engine, 1);

    assert_eq!(
        engine.execute_text("41", "TG 99 C170"),
        Err(ScopeError::AmbiguousAcid("99".into()))
    );
    assert_eq!(
        engine.execute_text("41", "TG Q12 C170"),
        Err(ScopeError::IllegalAcid("Q12".into()))
    );
    engine.execute_text("41", "TG L99 C170 DJFK").unwrap();
    let events = run(&mut engine, 1);
    assert!(events.contains(&Event::RadioTransmission {
        callsign: "DAL99".into(),
        text: "C170 DJFK".into(),
    }));
    assert!(events.contains(&Event::AircraftCommand {
        callsign: "DAL99".into(),
        command: "DJFK".into(),
    }));
}

#[test]
fn test_point_out_acknowledge_and_reject() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    engine.execute_text("41", "PO 31 DAL99").unwrap();
    assert_eq!(
        engine.execute_text("4A", "PA DAL99"),
        Err(ScopeError::IllegalUserAction)
    );
    engine.execute_text("31", "PA DAL99").unwrap();
    let plan = engine.terminal("N90").unwrap().plan("DAL99").unwrap();
    assert_eq!(plan.point_out, None);
    assert_eq!(plan.point_out_history, vec!["31".to_string()]);

    engine.execute_text("41", "PO 4A DAL99").unwrap();
    engine.execute_text("4A", "PR DAL99").unwrap();
    assert_eq!(engine.terminal("N90").unwrap().plan("DAL99").unwrap().point_out, None);
    assert_eq!(
        engine.execute_text("4A", "PR DAL99"),
        Err(ScopeError::IllegalUserAction)
    );
}

#[test]
fn test_release_departure_once() {
    let mut engine = engine();
    engine.execute_text("41", "FP AAL7 P 1234 B738 350").unwrap();
    engine.execute_text("41", "RD AAL7").unwrap();
    assert_eq!(
        engine.execute_text("41", "RD AAL7"),
        Err(ScopeError::AlreadyReleased("AAL7".into()))
    );
}

#[test]
fn test_start_track_moves_plan_to_local_control() {
    let mut engine = engine();
    engine.execute_text("41", "FP AAL7 1234 B738 350").unwrap();
    assert_eq!(
        engine.terminal("N90").unwrap().plan_state("AAL7"),
        Some(PlanState::Proposed)
    );
    engine.execute_text("31", "ST AAL7").unwrap();
    let n90 = engine.terminal("N90").unwrap();
    assert_eq!(n90.plan_state("AAL7"), Some(PlanState::TrackedLocally));
    assert_eq!(n90.owner(&acid("AAL7")), Some("31"));
    assert_eq!(
        engine.execute_text("41", "ST AAL7"),
        Err(ScopeError::IllegalUserAction)
    );
}

#[test]
fn test_duplicate_flight_plan_entry_rejected() {
    let mut engine = engine();
    engine.execute_text("41", "FP AAL7 B738 350").unwrap();
    assert_eq!(
        engine.execute_text("41", "FP AAL7 B738 350"),
        Err(ScopeError::IllegalUserAction)
    );
    assert_eq!(
        engine.execute_text("41", "FP AAL8 27 B738"),
        Err(ScopeError::IllegalPosition("27".into()))
    );
}

#[test]
fn test_drop_track_kept_when_cancellation_cannot_be_sent() {
    // The terminal is not registered on this bus, so every uplink fails.
    let mut bus = MessageBus::new();
    let mut events = Vec::new();
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let mut ctx = TickContext {
        bus: &mut bus,
        time: SimTime::default(),
        events: &mut events,
        rng: &mut rng,
    };
    let mut n90 =
        TerminalComputer::new(FacilityId::new("N90"), FacilityId::new("ZNY"), vec!["41".to_string()], 2)
            .unwrap();
    let dal99 = n90.enter_flight_plan(enroute_plan("DAL99", "J80"), &mut ctx).unwrap();
    n90.start_track(&dal99, "41", &mut ctx).unwrap();
    let code = n90.plan("DAL99").unwrap().beacon;

    assert_eq!(
        n90.drop_track(&dal99, "41", &mut ctx),
        Err(ScopeError::NoSuchTerminalFacility("N90".into()))
    );
    assert_eq!(n90.owner(&dal99), Some("41"));
    assert!(n90.cid(&dal99).is_some());
    assert!(n90.beacons().is_assigned(code));
    assert!(!ctx.events.iter().any(|e| matches!(e, Event::DroppedTrack { .. })));
}

// ---- Radar tracks ----

#[test]
fn test_track_update_associates_once() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    engine.radar_return("N90", radar("DAL99", 0o1234, 10_000)).unwrap();
    engine.radar_return("N90", radar("DAL99", 0o1234, 10_100)).unwrap();
    let events = run(&mut engine, 1);
    let associations = events
        .iter()
        .filter(|e| matches!(e, Event::FlightPlanAssociated { .. }))
        .count();
    assert_eq!(associations, 1);

    let track = engine.terminal("N90").unwrap().track_for(&acid("DAL99")).unwrap();
    assert_eq!(track.altitude, 10_100);
    assert_eq!(track.associated, Some(acid("DAL99")));
}

#[test]
fn test_radar_return_to_unknown_terminal() {
    let mut engine = engine();
    assert_eq!(
        engine.radar_return("ZNY", radar("DAL99", 0o1234, 10_000)),
        Err(ScopeError::NoSuchTerminalFacility("ZNY".into()))
    );
}

// ---- Controller grammar ----

#[test]
fn test_parse_command_forms() {
    use ControllerCommand::*;

    assert_eq!(
        parse_command("QQ P170 DAL99").unwrap(),
        AmendInterimAltitude {
            flid: "DAL99".into(),
            feet: 17_000,
            kind: InterimAltitudeKind::Procedure,
        }
    );
    assert_eq!(
        parse_command("QZ 240 1234").unwrap(),
        AmendAssignedAltitude {
            flid: "1234".into(),
            feet: 24_000,
        }
    );
    assert_eq!(parse_command("QU").unwrap(), ClearRouteLines);
    assert_eq!(
        parse_command("QU /M DAL99").unwrap(),
        ShowRouteLines { flid: "DAL99".into() }
    );
    assert_eq!(
        parse_command("QU JFK 1234").unwrap(),
        DirectTo {
            flid: "1234".into(),
            fix: "JFK".into(),
        }
    );
    assert_eq!(parse_command("qx dal99").unwrap(), DropTrack { flid: "DAL99".into() });
    assert_eq!(
        parse_command("//DAL99").unwrap(),
        ToggleOnFrequency { flid: "DAL99".into() }
    );
    assert_eq!(parse_command("TG P").unwrap(), TogglePause);
    assert_eq!(
        parse_command("TG 99 C170 DJFK").unwrap(),
        RelayToAircraft {
            suffix: "99".into(),
            commands: "C170 DJFK".into(),
        }
    );
    assert_eq!(
        parse_command("27 DAL99").unwrap(),
        InitiateHandoff {
            flid: "DAL99".into(),
            to_position: "27".into(),
        }
    );
    assert_eq!(
        parse_command("DAL99").unwrap(),
        AcceptOrForceDatablock { flid: "DAL99".into() }
    );
    assert_eq!(
        parse_command("QB 1234").unwrap(),
        RequestFlightPlan { beacon: Squawk(0o1234) }
    );
}

#[test]
fn test_parse_command_rejects() {
    assert_eq!(parse_command(""), Err(ScopeError::CommandFormat));
    assert_eq!(parse_command("//"), Err(ScopeError::CommandFormat));
    assert_eq!(parse_command("QQ 170"), Err(ScopeError::CommandFormat));
    assert_eq!(parse_command("QP X DAL99"), Err(ScopeError::CommandFormat));
    assert_eq!(
        parse_command("QQ 17 DAL99"),
        Err(ScopeError::IllegalAltitude("17".into()))
    );
    assert_eq!(
        parse_command("QB 1289"),
        Err(ScopeError::InvalidSquawk("1289".into()))
    );
}

// ---- Abbreviated flight plans ----

#[test]
fn test_abbreviated_plan_fields() {
    let entry =
        parse_abbreviated_plan("AAL12 1234 41 PJFK 2/F16/G 350 XY +AB .V", |apt| apt == "JFK").unwrap();
    let plan = &entry.plan;
    assert_eq!(plan.acid, acid("AAL12"));
    assert_eq!(plan.beacon, Squawk(0o1234));
    assert_eq!(entry.position.as_deref(), Some("41"));
    assert_eq!(plan.type_of_flight, TypeOfFlight::Departure);
    assert_eq!(plan.departure_airport, "JFK");
    assert_eq!(plan.aircraft_count, 2);
    assert_eq!(plan.aircraft_type, "F16");
    assert_eq!(plan.equipment_suffix, "G");
    assert_eq!(plan.requested_altitude, Some(35_000));
    assert_eq!(plan.scratchpad, "XY");
    assert_eq!(plan.secondary_scratchpad, "AB");
    assert_eq!(plan.rules, FlightRules::Vfr);
    assert_eq!(plan.plan_type, PlanType::LocalNonEnroute);
}

#[test]
fn test_abbreviated_plan_rejects() {
    let any = |_: &str| true;
    let none = |_: &str| false;
    assert_eq!(
        parse_abbreviated_plan("A 1234", any).unwrap_err(),
        ScopeError::IllegalAcid("A".into())
    );
    assert!(matches!(
        parse_abbreviated_plan("1AB", any),
        Err(ScopeError::IllegalAcid(_))
    ));
    assert!(matches!(
        parse_abbreviated_plan("ABCDEFGH", any),
        Err(ScopeError::IllegalAcid(_))
    ));
    assert_eq!(
        parse_abbreviated_plan("AAL12 PXYZ", none).unwrap_err(),
        ScopeError::IllegalAirport("XYZ".into())
    );
    assert_eq!(
        parse_abbreviated_plan("AAL12 NAT", any).unwrap_err(),
        ScopeError::IllegalScratchpad("NAT".into())
    );
    assert_eq!(
        parse_abbreviated_plan("AAL12 B7/38/L/X", any).unwrap_err(),
        ScopeError::IllegalAircraftType("B7/38/L/X".into())
    );
    assert_eq!(
        parse_abbreviated_plan("AAL12 ABCDE", any).unwrap_err(),
        ScopeError::InvalidAbbreviatedPlan
    );
    assert_eq!(
        parse_abbreviated_plan("AAL12 .X", any).unwrap_err(),
        ScopeError::InvalidAbbreviatedPlan
    );
    assert_eq!(
        parse_abbreviated_plan("", any).unwrap_err(),
        ScopeError::InvalidAbbreviatedPlan
    );
}

// ---- Configuration ----

#[test]
fn test_default_config_round_trips() {
    let config = NasConfig::default();
    config.validate().unwrap();
    let json = config.to_json().unwrap();
    let back = NasConfig::from_json(&json).unwrap();
    assert_eq!(config, back);

    let zny = config.adaptation_for(&FacilityId::new("ZNY"));
    assert!(zny.coordination_fix("SAX").unwrap().location.is_some());
}

#[test]
fn test_invalid_configs_rejected() {
    let mut bad_parent = NasConfig::default();
    bad_parent.facilities.push(FacilityConfig {
        id: FacilityId::new("BOS"),
        kind: FacilityKind::Terminal,
        parent: Some(FacilityId::new("ZZZ")),
        beacon_bank: 1,
    });
    assert!(matches!(bad_parent.validate(), Err(ScopeError::InvalidConfig(_))));

    let mut enroute_position = NasConfig::default();
    enroute_position.controllers.push(ControllerConfig {
        position: "99".into(),
        facility: FacilityId::new("ZNY"),
        supervisor: false,
    });
    assert!(matches!(
        NasEngine::new(enroute_position),
        Err(ScopeError::InvalidConfig(_))
    ));

    let mut short_id = NasConfig::default();
    short_id.facilities[0].id = FacilityId::new("ZN");
    assert!(matches!(short_id.validate(), Err(ScopeError::InvalidConfig(_))));

    let mut unknown_target = NasConfig::default();
    if let Some(zny) = unknown_target.adaptations.get_mut("ZNY") {
        zny.coordination_fixes[0].entries[0].to_facility = FacilityId::new("XXX");
    }
    assert!(matches!(unknown_target.validate(), Err(ScopeError::InvalidConfig(_))));

    assert!(matches!(
        NasConfig::from_json("not json"),
        Err(ScopeError::InvalidConfig(_))
    ));
}

// ---- Engine ----

#[test]
fn test_engine_topology_from_config() {
    let engine = engine();
    assert_eq!(engine.facility_of("41").unwrap().as_str(), "N90");
    assert_eq!(engine.facility_of("27").unwrap().as_str(), "PHL");
    assert_eq!(
        engine.facility_of("99"),
        Err(ScopeError::IllegalPosition("99".into()))
    );
    assert_eq!(engine.terminal("N90").unwrap().positions().count(), 3);
    assert_eq!(engine.terminal("PHL").unwrap().parent().as_str(), "ZDC");

    let ids: Vec<String> = engine
        .snapshot()
        .facilities
        .iter()
        .map(|f| f.id.to_string())
        .collect();
    assert_eq!(ids, vec!["ZDC", "ZNY", "N90", "PHL"]);
}

#[test]
fn test_unknown_position_rejected() {
    let mut engine = engine();
    assert_eq!(
        engine.execute_text("99", "QX DAL99"),
        Err(ScopeError::IllegalPosition("99".into()))
    );
}

#[test]
fn test_pause_stops_clock_and_computers() {
    let mut engine = engine();
    engine.execute_text("41", "TG P").unwrap();
    assert_eq!(engine.phase(), EnginePhase::Paused);

    engine
        .file_flight_plan("ZNY", enroute_plan("JBU6", "COATE J80"), None)
        .unwrap();
    let before = engine.time();
    let snap = engine.tick();
    assert_eq!(snap.phase, EnginePhase::Paused);
    assert_eq!(engine.time(), before);
    assert!(engine.terminal("N90").unwrap().plan("JBU6").is_none());

    engine.queue_text("41", "TG P").unwrap();
    engine.tick();
    assert_eq!(engine.phase(), EnginePhase::Running);
    assert_eq!(engine.time().tick, before.tick + 1);
    assert!(engine.terminal("N90").unwrap().plan("JBU6").is_some());
}

#[test]
fn test_queued_command_results_become_events() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    engine.queue_text("31", "QX DAL99").unwrap();
    engine.queue_command("41", ControllerCommand::ToggleJRing { flid: "DAL99".into() });
    let snap = engine.tick();

    assert!(snap.events.contains(&Event::CommandRejected {
        position: "31".into(),
        big_output: "ILLEGAL ACID".into(),
    }));
    assert!(snap.events.iter().any(|e| matches!(
        e,
        Event::CommandAccepted { position, big_output } if position == "41" && big_output.starts_with("ACCEPT\nJ-RING\n")
    )));
    assert_eq!(engine.queue_text("31", "QQ 1 DAL99"), Err(ScopeError::IllegalAltitude("1".into())));
}

#[test]
fn test_snapshot_views_reflect_state() {
    let mut engine = engine();
    tracked_dal99(&mut engine);
    engine.radar_return("N90", radar("DAL99", 0o1234, 10_000)).unwrap();
    let snap = engine.tick();

    let n90 = snap.facilities.iter().find(|f| f.id.as_str() == "N90").unwrap();
    assert_eq!(n90.kind, FacilityKind::Terminal);
    assert_eq!(n90.parent.as_ref().map(|p| p.as_str()), Some("ZNY"));
    let plan = n90.plans.iter().find(|p| p.acid.as_str() == "DAL99").unwrap();
    assert_eq!(plan.state, Some(PlanState::TrackedLocally));
    assert!(plan.cid.is_some());
    assert_eq!(n90.transfers.len(), 1);
    assert_eq!(n90.tracks[0].associated, Some(acid("DAL99")));

    let zny = snap.facilities.iter().find(|f| f.id.as_str() == "ZNY").unwrap();
    assert!(zny.plans.iter().any(|p| p.acid.as_str() == "DAL99"));
    assert!(serde_json::to_string(&snap).is_ok());
}

// ---- Determinism ----

fn scripted_run(seed: u64, ticks: usize) -> Vec<String> {
    let mut engine = NasEngine::new(NasConfig {
        seed,
        ..Default::default()
    })
    .unwrap();
    for i in 0..5 {
        engine
            .file_flight_plan("ZNY", enroute_plan(&format!("JBU{i}"), "COATE J80"), None)
            .unwrap();
        engine
            .execute_text("41", &format!("FP AAL{i} 41 B738 350"))
            .unwrap();
    }
    engine
        .file_flight_plan("ZNY", enroute_plan("DAL7", "ARD J48"), None)
        .unwrap();
    (0..ticks)
        .map(|_| serde_json::to_string(&engine.tick()).unwrap())
        .collect()
}

#[test]
fn test_determinism_same_seed() {
    assert_eq!(scripted_run(12345, 10), scripted_run(12345, 10));
}

#[test]
fn test_determinism_different_seeds() {
    assert_ne!(scripted_run(111, 3), scripted_run(222, 3));
}
