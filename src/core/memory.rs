// core/memory.rs

// Per-run bookkeeping for the mission: which pickup bays have been visited and which
// dropoff bays already hold a reel. Nothing here survives a restart.

// Dependencies
use log::info;
use std::collections::HashSet;

// Pickup bays in a fixed order with a free flag each
#[derive(Clone, Debug)]
pub struct PickupBayRegistry {
    bays: Vec<(String, bool)>, // (bay id, free)
    reset_used: bool,          // Bays already recycled once
}

impl PickupBayRegistry {
    /// All bays start free
    pub fn new<S: AsRef<str>>(bays: &[S]) -> Self {
        PickupBayRegistry {
            bays: bays.iter().map(|b| (b.as_ref().to_string(), true)).collect(),
            reset_used: false,
        }
    }

    /// Mark a bay as used; false if the bay is unknown
    pub fn mark_used(&mut self, bay: &str) -> bool {
        match self.bays.iter_mut().find(|(id, _)| id == bay) {
            Some((_, free)) => {
                *free = false;
                true
            }
            None => false,
        }
    }

    pub fn is_free(&self, bay: &str) -> bool {
        self.bays.iter().any(|(id, free)| id == bay && *free)
    }

    /// Free bays in registry order
    pub fn free_bays(&self) -> impl Iterator<Item = &str> {
        self.bays
            .iter()
            .filter(|(_, free)| *free)
            .map(|(id, _)| id.as_str())
    }

    /// True once the single recycle has been spent
    pub fn second_pass_exhausted(&self) -> bool {
        self.reset_used && self.free_bays().next().is_none()
    }

    /// Free every bay for the second pass
    fn recycle(&mut self) {
        for (_, free) in &mut self.bays {
            *free = true;
        }
        self.reset_used = true;
    }

    /// Claim the free bay with the fewest hops according to `hops`.
    ///
    /// Ties go to the earlier bay in registry order. Bays `hops` cannot reach are skipped.
    /// When every bay is used the registry is recycled once; after that `None` ends the run.
    pub fn claim_nearest<F, E>(&mut self, mut hops: F) -> Option<String>
    where
        F: FnMut(&str) -> Result<usize, E>,
        E: std::fmt::Display,
    {
        if self.free_bays().next().is_none() {
            if self.reset_used {
                info!("Registry: every bay used twice");
                return None;
            }
            info!("Registry: no free bays, recycling");
            self.recycle();
        }

        let mut best: Option<(&str, usize)> = None;
        for bay in self.free_bays() {
            match hops(bay) {
                Ok(count) if best.map_or(true, |(_, shortest)| count < shortest) => {
                    best = Some((bay, count));
                }
                Ok(_) => {}
                Err(e) => log::warn!("Registry: cannot reach {}: {}", bay, e),
            }
        }

        let bay = best.map(|(bay, _)| bay.to_string())?;
        self.mark_used(&bay);
        Some(bay)
    }
}

// Dropoff junctions whose bay already holds a reel; only ever grows
#[derive(Clone, Debug, Default)]
pub struct DeliveredBaySet {
    bays: HashSet<String>,
}

impl DeliveredBaySet {
    pub fn new() -> Self {
        DeliveredBaySet::default()
    }

    /// Record a delivery at `node`
    pub fn insert(&mut self, node: &str) {
        if self.bays.insert(node.to_string()) {
            info!("Delivered bays: added {} ({} total)", node, self.bays.len());
        }
    }

    pub fn contains(&self, node: &str) -> bool {
        self.bays.contains(node)
    }

    pub fn len(&self) -> usize {
        self.bays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bays.is_empty()
    }
}
