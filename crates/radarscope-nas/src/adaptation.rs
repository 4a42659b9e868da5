//! Per-facility adaptation: which facility takes a flight at each coordination fix.

use serde::{Deserialize, Serialize};

use radarscope_core::altitude::parse_altitude;
use radarscope_core::enums::FixKind;
use radarscope_core::types::{FacilityId, Point2LL};

/// One altitude band of a coordination fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationFix {
    pub kind: FixKind,
    /// Floor and ceiling in hundreds of feet, inclusive.
    pub altitude: [u32; 2],
    pub from_facility: FacilityId,
    pub to_facility: FacilityId,
}

impl AdaptationFix {
    pub fn contains(&self, hundreds: u32) -> bool {
        (self.altitude[0]..=self.altitude[1]).contains(&hundreds)
    }
}

/// A named coordination fix and its altitude bands, in adaptation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationFix {
    pub name: String,
    /// Filled from the fix table when the adaptation omits it.
    #[serde(default)]
    pub location: Option<Point2LL>,
    pub entries: Vec<AdaptationFix>,
}

impl CoordinationFix {
    /// Entry for an altitude string. A fix with a single entry applies at every
    /// altitude; otherwise the band must contain the altitude.
    pub fn fix(&self, altitude: &str) -> Option<&AdaptationFix> {
        if let [only] = self.entries.as_slice() {
            return Some(only);
        }
        let hundreds = parse_altitude(altitude).ok()?.altitude.selection_hundreds()?;
        self.entries.iter().find(|e| e.contains(hundreds))
    }

    pub fn is_zone(&self) -> bool {
        self.entries.iter().any(|e| e.kind == FixKind::Zone)
    }
}

/// Read-only adaptation table of one enroute facility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Adaptation {
    #[serde(default)]
    pub coordination_fixes: Vec<CoordinationFix>,
}

impl Adaptation {
    pub fn coordination_fix(&self, name: &str) -> Option<&CoordinationFix> {
        self.coordination_fixes.iter().find(|f| f.name == name)
    }

    /// Entry of fix `name` for `altitude`.
    pub fn fix(&self, name: &str, altitude: &str) -> Option<&AdaptationFix> {
        self.coordination_fix(name)?.fix(altitude)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoordinationFix> {
        self.coordination_fixes.iter()
    }
}
