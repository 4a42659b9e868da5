//! NAS configuration: facilities, controller positions, the fix table and
//! per-enroute adaptation. Loaded from JSON or taken from the built-in demo.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use radarscope_core::constants::DEFAULT_TICK_SECS;
use radarscope_core::enums::{FacilityKind, FixKind};
use radarscope_core::errors::{Result, ScopeError};
use radarscope_core::types::{FacilityId, Point2LL};

use crate::adaptation::{Adaptation, AdaptationFix, CoordinationFix};

/// One enroute or terminal facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityConfig {
    pub id: FacilityId,
    pub kind: FacilityKind,
    /// Overlying enroute facility. Terminals only.
    #[serde(default)]
    pub parent: Option<FacilityId>,
    /// Local beacon bank digit (X01-X77). Terminals only.
    #[serde(default)]
    pub beacon_bank: u8,
}

/// A controller position and the terminal facility it works in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub position: String,
    pub facility: FacilityId,
    /// Controlling position: may hand off flights tracked by other local positions.
    #[serde(default)]
    pub supervisor: bool,
}

/// Configuration for starting a new NAS engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NasConfig {
    /// RNG seed for determinism. Same seed = same run.
    pub seed: u64,
    /// Simulated seconds per tick.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u32,
    pub start_time: DateTime<Utc>,
    pub facilities: Vec<FacilityConfig>,
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,
    /// Named fix locations.
    #[serde(default)]
    pub fixes: BTreeMap<String, Point2LL>,
    /// Adaptation per enroute facility.
    #[serde(default)]
    pub adaptations: BTreeMap<FacilityId, Adaptation>,
}

fn default_tick_secs() -> u32 {
    DEFAULT_TICK_SECS
}

impl NasConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: NasConfig =
            serde_json::from_str(text).map_err(|e| ScopeError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScopeError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ScopeError::InvalidConfig(e.to_string()))
    }

    pub fn facility(&self, id: &str) -> Option<&FacilityConfig> {
        self.facilities.iter().find(|f| f.id.as_str() == id)
    }

    pub fn enroute_ids(&self) -> impl Iterator<Item = &FacilityId> {
        self.facilities
            .iter()
            .filter(|f| f.kind == FacilityKind::Enroute)
            .map(|f| &f.id)
    }

    pub fn terminals(&self) -> impl Iterator<Item = &FacilityConfig> {
        self.facilities
            .iter()
            .filter(|f| f.kind == FacilityKind::Terminal)
    }

    /// Positions that work in `facility`.
    pub fn positions_of<'a>(&'a self, facility: &'a FacilityId) -> impl Iterator<Item = String> + 'a {
        self.controllers
            .iter()
            .filter(move |c| c.facility == *facility)
            .map(|c| c.position.clone())
    }

    /// Controlling positions of `facility`.
    pub fn supervisors_of<'a>(&'a self, facility: &'a FacilityId) -> impl Iterator<Item = String> + 'a {
        self.controllers
            .iter()
            .filter(move |c| c.facility == *facility && c.supervisor)
            .map(|c| c.position.clone())
    }

    /// Adaptation of `facility` with missing fix locations filled from the fix table.
    pub fn adaptation_for(&self, facility: &FacilityId) -> Adaptation {
        let mut adaptation = self.adaptations.get(facility).cloned().unwrap_or_default();
        for fix in &mut adaptation.coordination_fixes {
            if fix.location.is_none() {
                fix.location = self.fixes.get(&fix.name).copied();
            }
        }
        adaptation
    }

    /// Reject configurations the engine cannot be built from.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ScopeError::InvalidConfig(msg));

        if self.tick_secs == 0 {
            return invalid("tick_secs must be positive".into());
        }

        let mut ids = BTreeSet::new();
        for facility in &self.facilities {
            if !facility.id.is_well_formed() {
                return invalid(format!("malformed facility id {:?}", facility.id.as_str()));
            }
            if !ids.insert(facility.id.clone()) {
                return invalid(format!("duplicate facility {}", facility.id));
            }
        }

        for facility in &self.facilities {
            match (facility.kind, &facility.parent) {
                (FacilityKind::Enroute, Some(_)) => {
                    return invalid(format!("enroute facility {} has a parent", facility.id));
                }
                (FacilityKind::Terminal, None) => {
                    return invalid(format!("terminal facility {} has no parent", facility.id));
                }
                (FacilityKind::Terminal, Some(parent)) => {
                    let parent_is_enroute = self
                        .facility(parent.as_str())
                        .is_some_and(|p| p.kind == FacilityKind::Enroute);
                    if !parent_is_enroute {
                        return invalid(format!(
                            "parent {parent} of {} is not an enroute facility",
                            facility.id
                        ));
                    }
                    if facility.beacon_bank > 7 {
                        return invalid(format!("beacon bank of {} is not an octal digit", facility.id));
                    }
                }
                (FacilityKind::Enroute, None) => {}
            }
        }

        let mut positions = BTreeSet::new();
        for controller in &self.controllers {
            let at_terminal = self
                .facility(controller.facility.as_str())
                .is_some_and(|f| f.kind == FacilityKind::Terminal);
            if !at_terminal {
                return invalid(format!(
                    "position {} is not at a terminal facility",
                    controller.position
                ));
            }
            if controller.position.is_empty() || controller.position.contains(char::is_whitespace) {
                return invalid(format!("malformed position {:?}", controller.position));
            }
            if !positions.insert(controller.position.as_str()) {
                return invalid(format!("duplicate position {}", controller.position));
            }
        }

        for (facility, adaptation) in &self.adaptations {
            let is_enroute = self
                .facility(facility.as_str())
                .is_some_and(|f| f.kind == FacilityKind::Enroute);
            if !is_enroute {
                return invalid(format!("adaptation for non-enroute facility {facility}"));
            }
            for fix in adaptation.iter() {
                if fix.entries.is_empty() {
                    return invalid(format!("fix {} at {facility} has no entries", fix.name));
                }
                for entry in &fix.entries {
                    for named in [&entry.from_facility, &entry.to_facility] {
                        if !ids.contains(named) {
                            return invalid(format!(
                                "fix {} at {facility} names unknown facility {named}",
                                fix.name
                            ));
                        }
                    }
                    if entry.altitude[0] > entry.altitude[1] {
                        return invalid(format!("fix {} at {facility} has an inverted band", fix.name));
                    }
                }
                if fix.is_zone() && fix.location.is_none() && !self.fixes.contains_key(&fix.name) {
                    return invalid(format!("zone fix {} at {facility} has no location", fix.name));
                }
            }
        }
        Ok(())
    }
}

fn entry(kind: FixKind, band: [u32; 2], from: &str, to: &str) -> AdaptationFix {
    AdaptationFix {
        kind,
        altitude: band,
        from_facility: FacilityId::new(from),
        to_facility: FacilityId::new(to),
    }
}

fn coordination_fix(name: &str, entries: Vec<AdaptationFix>) -> CoordinationFix {
    CoordinationFix {
        name: name.to_string(),
        location: None,
        entries,
    }
}

impl Default for NasConfig {
    /// Demo airspace: New York center over N90, Washington center over PHL.
    fn default() -> Self {
        use FixKind::*;

        let facility = |id: &str, kind, parent: Option<&str>, bank| FacilityConfig {
            id: FacilityId::new(id),
            kind,
            parent: parent.map(FacilityId::new),
            beacon_bank: bank,
        };
        let controller = |position: &str, facility: &str| ControllerConfig {
            position: position.to_string(),
            facility: FacilityId::new(facility),
            supervisor: false,
        };
        let supervisor = |position: &str, facility: &str| ControllerConfig {
            supervisor: true,
            ..controller(position, facility)
        };

        let fixes = [
            ("COATE", 41.1367, -74.6967),
            ("JFK", 40.6398, -73.7789),
            ("BAF", 42.1617, -72.7161),
            ("PHL", 39.8721, -75.2407),
            ("ARD", 40.2533, -74.9078),
            ("DIXIE", 39.9944, -74.1647),
            ("RBV", 40.2025, -74.4950),
            ("SAX", 41.0675, -74.5383),
            ("WAVEY", 40.2349, -73.3934),
        ]
        .into_iter()
        .map(|(name, lat, lon)| (name.to_string(), Point2LL::new(lat, lon)))
        .collect();

        let zny = Adaptation {
            coordination_fixes: vec![
                coordination_fix("COATE", vec![entry(Route, [0, 600], "ZNY", "N90")]),
                coordination_fix("ARD", vec![entry(Route, [0, 600], "ZNY", "PHL")]),
                coordination_fix(
                    "DIXIE",
                    vec![
                        entry(Route, [0, 230], "ZNY", "N90"),
                        entry(Route, [240, 600], "ZNY", "ZDC"),
                    ],
                ),
                coordination_fix("SAX", vec![entry(Zone, [0, 600], "ZNY", "N90")]),
                coordination_fix("WAVEY", vec![entry(Zone, [0, 600], "ZNY", "N90")]),
            ],
        };
        let zdc = Adaptation {
            coordination_fixes: vec![
                coordination_fix("ARD", vec![entry(Route, [0, 600], "ZDC", "PHL")]),
                coordination_fix("RBV", vec![entry(Route, [0, 600], "ZDC", "N90")]),
            ],
        };

        Self {
            seed: 42,
            tick_secs: DEFAULT_TICK_SECS,
            start_time: DateTime::from_timestamp(1_717_254_240, 0).unwrap_or_default(),
            facilities: vec![
                facility("ZNY", FacilityKind::Enroute, None, 0),
                facility("ZDC", FacilityKind::Enroute, None, 0),
                facility("N90", FacilityKind::Terminal, Some("ZNY"), 2),
                facility("PHL", FacilityKind::Terminal, Some("ZDC"), 3),
            ],
            controllers: vec![
                controller("41", "N90"),
                supervisor("31", "N90"),
                controller("4A", "N90"),
                controller("27", "PHL"),
                controller("2B", "PHL"),
            ],
            fixes,
            adaptations: BTreeMap::from([
                (FacilityId::new("ZNY"), zny),
                (FacilityId::new("ZDC"), zdc),
            ]),
        }
    }
}
