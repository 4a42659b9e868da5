//! Wire records exchanged between facility computers.

use serde::{Deserialize, Serialize};

use crate::enums::*;
use crate::errors::{Result, ScopeError};
use crate::flight_plan::{CoordinationTime, FlightPlan, InterimAltitude};
use crate::types::{Acid, FacilityId, Point2LL, SourceId, Squawk};

/// Aircraft description carried by plan messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftData {
    pub aircraft_type: String,
    pub equipment_suffix: String,
    pub count: u32,
    pub cwt_category: String,
    pub departure: String,
    pub arrival: String,
}

/// One radar return as delivered by the radar feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadarReturn {
    /// Call-sign broadcast by the aircraft.
    pub callsign: String,
    pub position: Point2LL,
    /// Transponder altitude (feet).
    pub altitude: u32,
    /// Ground speed (knots).
    pub groundspeed: u32,
    pub mode: TransponderMode,
    pub ident: bool,
    pub beacon: Squawk,
}

/// A message between computers. Consumed exactly once by its destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub source_id: SourceId,
    pub kind: MessageKind,
    pub acid: Option<Acid>,
    pub bcn: Squawk,
    pub aircraft: AircraftData,
    pub rules: FlightRules,
    pub type_of_flight: TypeOfFlight,
    pub altitude: String,
    pub assigned_altitude: Option<u32>,
    pub interim_altitude: Option<InterimAltitude>,
    pub requested_altitude: Option<u32>,
    pub route: String,
    pub entry_fix: String,
    pub exit_fix: String,
    pub coordination_fix: String,
    pub coordination_time: Option<CoordinationTime>,
    pub scratchpad: String,
    pub secondary_scratchpad: String,
    /// Final destination of a transfer, when it is not the next hop.
    pub facility_destination: Option<FacilityId>,
    pub track_owner: Option<String>,
    pub handoff_target: Option<String>,
    /// Track position when the sender knows it.
    pub location: Option<Point2LL>,
    pub plan: Option<Box<FlightPlan>>,
    pub radar: Option<RadarReturn>,
}

impl Message {
    pub fn new(kind: MessageKind, source_id: SourceId) -> Self {
        Self {
            kind,
            source_id,
            ..Default::default()
        }
    }

    /// Encode the carried fields of `plan`.
    pub fn from_plan(kind: MessageKind, source_id: SourceId, plan: &FlightPlan) -> Self {
        Self {
            source_id,
            kind,
            acid: Some(plan.acid.clone()),
            bcn: plan.beacon,
            aircraft: AircraftData {
                aircraft_type: plan.aircraft_type.clone(),
                equipment_suffix: plan.equipment_suffix.clone(),
                count: plan.aircraft_count,
                cwt_category: plan.cwt_category.clone(),
                departure: plan.departure_airport.clone(),
                arrival: plan.arrival_airport.clone(),
            },
            rules: plan.rules,
            type_of_flight: plan.type_of_flight,
            altitude: plan.filed_altitude.clone(),
            assigned_altitude: plan.assigned_altitude,
            interim_altitude: plan.interim_altitude,
            requested_altitude: plan.requested_altitude,
            route: plan.route.clone(),
            entry_fix: plan.entry_fix.clone(),
            exit_fix: plan.exit_fix.clone(),
            coordination_fix: plan.coordination_fix.clone(),
            coordination_time: plan.coordination_time,
            scratchpad: plan.scratchpad.clone(),
            secondary_scratchpad: plan.secondary_scratchpad.clone(),
            ..Default::default()
        }
    }

    /// Decode a plan from the carried fields. Rules follow the altitude string
    /// when it names VFR.
    pub fn to_flight_plan(&self) -> Result<FlightPlan> {
        let acid = self
            .acid
            .clone()
            .ok_or_else(|| ScopeError::IllegalAcid(String::new()))?;
        let mut plan = FlightPlan::new(acid, self.bcn);
        plan.aircraft_type = self.aircraft.aircraft_type.clone();
        plan.equipment_suffix = self.aircraft.equipment_suffix.clone();
        plan.aircraft_count = self.aircraft.count.max(1);
        plan.cwt_category = self.aircraft.cwt_category.clone();
        plan.departure_airport = self.aircraft.departure.clone();
        plan.arrival_airport = self.aircraft.arrival.clone();
        plan.rules = if self.altitude.contains("VFR") {
            FlightRules::Vfr
        } else {
            self.rules
        };
        plan.type_of_flight = self.type_of_flight;
        plan.plan_type = PlanType::RemoteEnroute;
        plan.filed_altitude = self.altitude.clone();
        plan.assigned_altitude = self.assigned_altitude;
        plan.interim_altitude = self.interim_altitude;
        plan.requested_altitude = self.requested_altitude;
        plan.route = self.route.clone();
        plan.entry_fix = self.entry_fix.clone();
        plan.exit_fix = self.exit_fix.clone();
        plan.coordination_fix = self.coordination_fix.clone();
        plan.coordination_time = self.coordination_time;
        plan.scratchpad = self.scratchpad.clone();
        plan.secondary_scratchpad = self.secondary_scratchpad.clone();
        plan.tracking_controller = self.track_owner.clone();
        plan.handoff_target = self.handoff_target.clone();
        Ok(plan)
    }

    /// Merge the non-empty fields into an existing plan.
    pub fn merge_into(&self, plan: &mut FlightPlan) {
        fn merge(dst: &mut String, src: &str) {
            if !src.is_empty() {
                *dst = src.to_string();
            }
        }

        if !self.bcn.is_placeholder() {
            plan.beacon = self.bcn;
        }
        merge(&mut plan.aircraft_type, &self.aircraft.aircraft_type);
        merge(&mut plan.equipment_suffix, &self.aircraft.equipment_suffix);
        merge(&mut plan.cwt_category, &self.aircraft.cwt_category);
        merge(&mut plan.departure_airport, &self.aircraft.departure);
        merge(&mut plan.arrival_airport, &self.aircraft.arrival);
        if self.aircraft.count > 0 {
            plan.aircraft_count = self.aircraft.count;
        }
        if !self.altitude.is_empty() {
            plan.filed_altitude = self.altitude.clone();
            plan.rules = if self.altitude.contains("VFR") {
                FlightRules::Vfr
            } else {
                self.rules
            };
        }
        merge(&mut plan.entry_fix, &self.entry_fix);
        merge(&mut plan.exit_fix, &self.exit_fix);
        merge(&mut plan.coordination_fix, &self.coordination_fix);
        merge(&mut plan.scratchpad, &self.scratchpad);
        merge(&mut plan.secondary_scratchpad, &self.secondary_scratchpad);
        if !self.route.is_empty() && self.route != plan.route {
            plan.route = self.route.clone();
            if self.coordination_fix.is_empty() {
                plan.coordination_fix.clear();
            }
        }
        if self.assigned_altitude.is_some() {
            plan.assigned_altitude = self.assigned_altitude;
        }
        if self.interim_altitude.is_some() {
            plan.interim_altitude = self.interim_altitude;
        }
        if self.requested_altitude.is_some() {
            plan.requested_altitude = self.requested_altitude;
        }
        if self.coordination_time.is_some() {
            plan.coordination_time = self.coordination_time;
        }
    }

    /// Rewrite the source for the next hop.
    pub fn relayed_by(mut self, source_id: SourceId) -> Self {
        self.source_id = source_id;
        self
    }

    pub fn acid_str(&self) -> &str {
        self.acid.as_ref().map(Acid::as_str).unwrap_or("")
    }
}
