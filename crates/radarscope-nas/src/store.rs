//! Flight-plan store: plans by ACID with a secondary index by beacon code.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use radarscope_core::errors::{Result, ScopeError};
use radarscope_core::flight_plan::{FlightPlan, FlightPlanSpecifier};
use radarscope_core::types::{Acid, Squawk};

/// Plans owned by one facility. Placeholder beacons are not indexed.
#[derive(Debug, Clone, Default)]
pub struct FlightPlanStore {
    plans: BTreeMap<Acid, FlightPlan>,
    by_beacon: HashMap<Squawk, Acid>,
}

impl FlightPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the plan for its ACID, returning the previous one.
    pub fn insert(&mut self, plan: FlightPlan) -> Option<FlightPlan> {
        let previous = self.remove(plan.acid.as_str());
        self.index(&plan);
        self.plans.insert(plan.acid.clone(), plan);
        previous
    }

    pub fn get(&self, acid: &str) -> Option<&FlightPlan> {
        self.plans.get(acid)
    }

    pub fn by_beacon(&self, code: Squawk) -> Option<&FlightPlan> {
        self.by_beacon.get(&code).and_then(|acid| self.plans.get(acid))
    }

    pub fn acid_for_beacon(&self, code: Squawk) -> Option<&Acid> {
        self.by_beacon.get(&code)
    }

    pub fn contains(&self, acid: &str) -> bool {
        self.plans.contains_key(acid)
    }

    /// Mutate a plan in place, keeping the beacon index consistent.
    pub fn update<R>(&mut self, acid: &str, f: impl FnOnce(&mut FlightPlan) -> R) -> Option<R> {
        let plan = self.plans.get_mut(acid)?;
        let old_beacon = plan.beacon;
        let result = f(plan);
        let new_beacon = plan.beacon;
        if old_beacon != new_beacon {
            if self.by_beacon.get(&old_beacon).is_some_and(|a| a.as_str() == acid) {
                self.by_beacon.remove(&old_beacon);
            }
            if let Some(plan) = self.plans.get(acid) {
                let plan = plan.clone();
                self.index(&plan);
            }
        }
        Some(result)
    }

    /// Apply a specifier atomically.
    pub fn amend(&mut self, acid: &str, amendment: &FlightPlanSpecifier) -> Result<()> {
        self.update(acid, |plan| plan.amend(amendment))
            .ok_or_else(|| ScopeError::NoFlightPlan(acid.to_string()))?
    }

    pub fn remove(&mut self, acid: &str) -> Option<FlightPlan> {
        let plan = self.plans.remove(acid)?;
        if self.by_beacon.get(&plan.beacon) == Some(&plan.acid) {
            self.by_beacon.remove(&plan.beacon);
        }
        Some(plan)
    }

    pub fn remove_by_beacon(&mut self, code: Squawk) -> Option<FlightPlan> {
        let acid = self.by_beacon.get(&code)?.clone();
        self.remove(acid.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlightPlan> {
        self.plans.values()
    }

    pub fn acids(&self) -> Vec<Acid> {
        self.plans.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    fn index(&mut self, plan: &FlightPlan) {
        if plan.beacon.is_placeholder() {
            return;
        }
        if let Some(other) = self.by_beacon.get(&plan.beacon) {
            if *other != plan.acid {
                warn!(beacon = %plan.beacon, acid = %plan.acid, other = %other, "beacon code already indexed for another plan");
            }
        }
        self.by_beacon.insert(plan.beacon, plan.acid.clone());
    }
}
