//! Abbreviated flight-plan entry:
//! `ACID [BCN] [POS] [A|P|E[APT]] [SP1] [+SP2] [TYPE] [RALT] [.V|.P|.E]`.
//!
//! Fields after the ACID may come in any order; each is recognized by shape.

use radarscope_core::altitude::hundreds;
use radarscope_core::constants::{SCRATCHPAD_MAX_LEN, SECONDARY_SCRATCHPAD_MAX_LEN};
use radarscope_core::enums::*;
use radarscope_core::errors::{Result, ScopeError};
use radarscope_core::flight_plan::{check_scratchpad, FlightPlan};
use radarscope_core::types::{Acid, Squawk};

/// A parsed entry: the plan and the position that should track it, if named.
#[derive(Debug, Clone, PartialEq)]
pub struct AbbreviatedPlan {
    pub plan: FlightPlan,
    pub position: Option<String>,
}

/// Parse an abbreviated plan. `is_airport` decides whether a three-letter
/// code after A/P/E names a known airport.
pub fn parse_abbreviated_plan(text: &str, is_airport: impl Fn(&str) -> bool) -> Result<AbbreviatedPlan> {
    let text = text.trim().to_ascii_uppercase();
    let mut fields = text.split_whitespace();
    let acid_field = fields.next().ok_or(ScopeError::InvalidAbbreviatedPlan)?;
    if acid_field.len() < 2 {
        return Err(ScopeError::IllegalAcid(acid_field.to_string()));
    }
    let mut plan = FlightPlan::new(Acid::parse(acid_field)?, Squawk::PLACEHOLDER);
    plan.plan_type = PlanType::LocalNonEnroute;
    let mut position = None;

    for field in fields {
        let bytes = field.as_bytes();
        if let Some(rules) = field.strip_prefix('.') {
            match rules {
                "V" => plan.rules = FlightRules::Vfr,
                "P" => plan.rules = FlightRules::Ifr,
                "E" => {
                    plan.rules = FlightRules::Ifr;
                    plan.plan_type = PlanType::LocalEnroute;
                }
                _ => return Err(ScopeError::InvalidAbbreviatedPlan),
            }
        } else if let Some(sp) = field.strip_prefix('+') {
            check_scratchpad(sp, SECONDARY_SCRATCHPAD_MAX_LEN)?;
            plan.secondary_scratchpad = sp.to_string();
        } else if bytes.len() == 4 && bytes.iter().all(|b| (b'0'..=b'7').contains(b)) {
            plan.beacon = Squawk::parse(field)?;
        } else if let Some(h) = hundreds(field) {
            plan.requested_altitude = Some(h * 100);
            plan.filed_altitude = field.to_string();
        } else if bytes.len() == 2 && bytes[0].is_ascii_digit() {
            position = Some(field.to_string());
        } else if field.contains('/') || looks_like_type(field) {
            parse_aircraft_type(field, &mut plan)?;
        } else if let Some(kind) = type_of_flight(bytes[0]).filter(|_| bytes.len() == 1 || bytes.len() == 4) {
            plan.type_of_flight = kind;
            if bytes.len() == 4 {
                let airport = &field[1..];
                if !airport.bytes().all(|b| b.is_ascii_alphabetic()) || !is_airport(airport) {
                    return Err(ScopeError::IllegalAirport(airport.to_string()));
                }
                match kind {
                    TypeOfFlight::Departure => plan.departure_airport = airport.to_string(),
                    _ => plan.arrival_airport = airport.to_string(),
                }
            }
        } else if field.len() <= SCRATCHPAD_MAX_LEN {
            check_scratchpad(field, SCRATCHPAD_MAX_LEN)?;
            plan.scratchpad = field.to_string();
        } else {
            return Err(ScopeError::InvalidAbbreviatedPlan);
        }
    }

    if plan.rules == FlightRules::Vfr && plan.filed_altitude.is_empty() {
        plan.filed_altitude = "VFR".to_string();
    }
    Ok(AbbreviatedPlan { plan, position })
}

fn type_of_flight(letter: u8) -> Option<TypeOfFlight> {
    match letter {
        b'A' => Some(TypeOfFlight::Arrival),
        b'P' => Some(TypeOfFlight::Departure),
        b'E' => Some(TypeOfFlight::Overflight),
        _ => None,
    }
}

/// Four alphanumerics starting with a letter and carrying a digit (B738, C172).
fn looks_like_type(field: &str) -> bool {
    field.len() == 4
        && field.as_bytes()[0].is_ascii_alphabetic()
        && field.bytes().any(|b| b.is_ascii_digit())
        && field.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// `TYPE`, `TYPE/E`, `N/TYPE` or `N/TYPE/E`.
fn parse_aircraft_type(field: &str, plan: &mut FlightPlan) -> Result<()> {
    let illegal = || ScopeError::IllegalAircraftType(field.to_string());
    let parts: Vec<&str> = field.split('/').collect();
    let is_count = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let is_suffix = |s: &str| s.len() == 1 && s.as_bytes()[0].is_ascii_alphabetic();

    let (count, aircraft_type, suffix) = match parts.as_slice() {
        [t] => (None, *t, None),
        [n, t] if is_count(n) => (Some(*n), *t, None),
        [t, e] if is_suffix(e) => (None, *t, Some(*e)),
        [n, t, e] if is_count(n) && is_suffix(e) => (Some(*n), *t, Some(*e)),
        _ => return Err(illegal()),
    };

    let type_ok = (2..=4).contains(&aircraft_type.len())
        && aircraft_type.as_bytes()[0].is_ascii_alphabetic()
        && aircraft_type.bytes().all(|b| b.is_ascii_alphanumeric());
    if !type_ok {
        return Err(illegal());
    }

    if let Some(n) = count {
        let n: u32 = n.parse().map_err(|_| illegal())?;
        if n == 0 {
            return Err(illegal());
        }
        plan.aircraft_count = n;
    }
    plan.aircraft_type = aircraft_type.to_string();
    if let Some(e) = suffix {
        plan.equipment_suffix = e.to_string();
    }
    Ok(())
}
