//! Coordination-fix resolution.
//!
//! Route fixes win: the first adaptation fix (in table order) whose band
//! matches the altitude and whose name appears as a route token. Failing
//! that, the zone fix nearest the aircraft.

use tracing::{debug, warn};

use radarscope_core::enums::FixKind;
use radarscope_core::flight_plan::FlightPlan;
use radarscope_core::types::Point2LL;

use crate::adaptation::Adaptation;

/// Coordination fix for `plan`, or `None` when the adaptation has no candidate.
pub fn resolve_coordination_fix(
    adaptation: &Adaptation,
    plan: &FlightPlan,
    position: Option<Point2LL>,
) -> Option<String> {
    let fix = resolve_for_route(adaptation, &plan.route, &plan.filed_altitude, position);
    if fix.is_none() {
        warn!(acid = %plan.acid, route = %plan.route, altitude = %plan.filed_altitude, "no coordination fix");
    }
    fix
}

/// Resolution on raw route and altitude strings.
pub fn resolve_for_route(
    adaptation: &Adaptation,
    route: &str,
    altitude: &str,
    position: Option<Point2LL>,
) -> Option<String> {
    let on_route = adaptation.iter().find(|fix| {
        fix.fix(altitude).is_some_and(|e| e.kind != FixKind::Zone)
            && route.split_whitespace().any(|token| token == fix.name)
    });
    if let Some(fix) = on_route {
        debug!(fix = %fix.name, "coordination fix on route");
        return Some(fix.name.clone());
    }

    let position = position?;
    adaptation
        .iter()
        .filter(|fix| fix.is_zone())
        .filter_map(|fix| Some((position.nm_distance_to(&fix.location?), &fix.name)))
        .min_by(|(da, na), (db, nb)| da.total_cmp(db).then_with(|| na.cmp(nb)))
        .map(|(_, name)| name.clone())
}
