//! Beacon code and computer-ID allocation.
//!
//! Both allocators are keyed by ACID: asking again for an ACID that already
//! holds an id returns the same id.

use std::collections::HashMap;

use rand::Rng;
use tracing::warn;

use radarscope_core::constants::*;
use radarscope_core::errors::{Result, ScopeError};
use radarscope_core::types::{Acid, Cid, Squawk};

/// A contiguous range of beacon codes with the exclusion rules applied.
#[derive(Debug, Clone)]
pub struct BeaconPool {
    first: u16,
    last: u16,
    holders: HashMap<Squawk, Acid>,
    by_acid: HashMap<Acid, Squawk>,
}

impl BeaconPool {
    /// NAS-wide enroute pool, 1001-7777.
    pub fn nas() -> Self {
        Self::with_range(NAS_BEACON_FIRST, NAS_BEACON_LAST)
    }

    /// Terminal local bank X01-X77.
    pub fn bank(block: u8) -> Result<Self> {
        if block > 7 {
            return Err(ScopeError::IllegalValue);
        }
        let base = u16::from(block) * BEACON_BANK_SIZE;
        Ok(Self::with_range(base + 1, base + BEACON_BANK_SIZE - 1))
    }

    fn with_range(first: u16, last: u16) -> Self {
        Self {
            first,
            last,
            holders: HashMap::new(),
            by_acid: HashMap::new(),
        }
    }

    /// Whether `code` lies in this pool and may ever be handed out.
    pub fn manages(&self, code: Squawk) -> bool {
        (self.first..=self.last).contains(&code.0)
            && !code.ends_in_00()
            && !FORBIDDEN_BEACONS.contains(&code.0)
    }

    /// Assign a free code to `acid`, drawing uniformly among free codes.
    pub fn allocate<R: Rng>(&mut self, acid: &Acid, rng: &mut R) -> Result<Squawk> {
        if let Some(code) = self.by_acid.get(acid) {
            return Ok(*code);
        }

        for _ in 0..BEACON_RANDOM_DRAWS {
            let code = Squawk(rng.gen_range(self.first..=self.last));
            if self.manages(code) && !self.holders.contains_key(&code) {
                self.assign(code, acid);
                return Ok(code);
            }
        }

        // Sparse pool: probe linearly from a random start.
        let span = self.last - self.first + 1;
        let start = rng.gen_range(0..span);
        for i in 0..span {
            let code = Squawk(self.first + (start + i) % span);
            if self.manages(code) && !self.holders.contains_key(&code) {
                self.assign(code, acid);
                return Ok(code);
            }
        }
        Err(ScopeError::NoBeaconAvailable)
    }

    /// Assign a specific code to `acid`.
    pub fn claim(&mut self, code: Squawk, acid: &Acid) -> Result<()> {
        if !self.manages(code) {
            return Err(ScopeError::BeaconNotManaged(code));
        }
        match self.holders.get(&code) {
            Some(holder) if holder == acid => Ok(()),
            Some(_) => Err(ScopeError::BeaconAlreadyAssigned(code)),
            None => {
                if let Some(old) = self.by_acid.get(acid).copied() {
                    self.holders.remove(&old);
                }
                self.assign(code, acid);
                Ok(())
            }
        }
    }

    /// Return `code` to the pool, yielding its former holder.
    pub fn release(&mut self, code: Squawk) -> Result<Acid> {
        if !self.manages(code) {
            return Err(ScopeError::BeaconNotManaged(code));
        }
        let acid = self
            .holders
            .remove(&code)
            .ok_or(ScopeError::BeaconUnassigned(code))?;
        self.by_acid.remove(&acid);
        Ok(acid)
    }

    /// Return whatever code `acid` holds.
    pub fn release_acid(&mut self, acid: &Acid) -> Option<Squawk> {
        let code = self.by_acid.remove(acid)?;
        self.holders.remove(&code);
        Some(code)
    }

    pub fn is_assigned(&self, code: Squawk) -> bool {
        self.holders.contains_key(&code)
    }

    pub fn holder(&self, code: Squawk) -> Option<&Acid> {
        self.holders.get(&code)
    }

    pub fn code_for(&self, acid: &Acid) -> Option<Squawk> {
        self.by_acid.get(acid).copied()
    }

    pub fn num_available(&self) -> usize {
        let eligible = (self.first..=self.last)
            .filter(|c| self.manages(Squawk(*c)))
            .count();
        eligible - self.holders.len()
    }

    fn assign(&mut self, code: Squawk, acid: &Acid) {
        self.holders.insert(code, acid.clone());
        self.by_acid.insert(acid.clone(), code);
    }
}

/// Three-digit computer IDs, 000-999.
#[derive(Debug, Clone)]
pub struct CidAllocator {
    slots: Vec<Option<Acid>>,
    by_acid: HashMap<Acid, Cid>,
}

impl Default for CidAllocator {
    fn default() -> Self {
        Self {
            slots: vec![None; usize::from(CID_SLOTS)],
            by_acid: HashMap::new(),
        }
    }
}

impl CidAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// CID for `acid`: random start, linear probe. When every slot is taken
    /// the start slot is reused and its previous holder loses it.
    pub fn allocate<R: Rng>(&mut self, acid: &Acid, rng: &mut R) -> Cid {
        if let Some(cid) = self.by_acid.get(acid) {
            return *cid;
        }

        let start = rng.gen_range(0..CID_SLOTS);
        let free = (0..CID_SLOTS)
            .map(|i| (start + i) % CID_SLOTS)
            .find(|slot| self.slots[usize::from(*slot)].is_none());

        let slot = match free {
            Some(slot) => slot,
            None => {
                warn!(cid = start, acid = %acid, "all CIDs in use, reusing start slot");
                if let Some(previous) = self.slots[usize::from(start)].take() {
                    self.by_acid.remove(&previous);
                }
                start
            }
        };

        let cid = Cid(slot);
        self.slots[usize::from(slot)] = Some(acid.clone());
        self.by_acid.insert(acid.clone(), cid);
        cid
    }

    pub fn release(&mut self, acid: &Acid) -> Option<Cid> {
        let cid = self.by_acid.remove(acid)?;
        self.slots[usize::from(cid.0)] = None;
        Some(cid)
    }

    pub fn get(&self, acid: &Acid) -> Option<Cid> {
        self.by_acid.get(acid).copied()
    }

    pub fn holder(&self, cid: Cid) -> Option<&Acid> {
        self.slots.get(usize::from(cid.0))?.as_ref()
    }

    pub fn in_use(&self) -> usize {
        self.by_acid.len()
    }
}
