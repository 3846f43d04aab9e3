//! Fixed-capacity per-track storage with least-recently-updated reclaim.

use std::collections::HashMap;

use tracing::debug;

#[derive(Debug, Clone)]
struct Slot<T> {
    track_id: u64,
    last_touched: u64,
    value: T,
}

/// Upper bound on slots reserved up front; larger tables grow on demand.
const PREALLOCATE_LIMIT: usize = 1024;

/// Slot table keyed by track id.
///
/// Holds at most `capacity` tracks. Inserting a new track into a full table
/// reclaims the slot that was updated least recently, so memory stays bounded
/// even when the upstream tracker never reports lost tracks.
#[derive(Debug, Clone)]
pub struct TrackArena<T> {
    slots: Vec<Slot<T>>,
    index: HashMap<u64, usize>,
    capacity: usize,
    tick: u64,
}

impl<T> TrackArena<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let reserve = capacity.min(PREALLOCATE_LIMIT);
        Self {
            slots: Vec::with_capacity(reserve),
            index: HashMap::with_capacity(reserve),
            capacity,
            tick: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, track_id: u64) -> bool {
        self.index.contains_key(&track_id)
    }

    pub fn get(&self, track_id: u64) -> Option<&T> {
        self.index.get(&track_id).map(|&i| &self.slots[i].value)
    }

    /// Fetch the entry for `track_id`, creating it with `init` if absent.
    /// Either way the entry becomes the most recently updated one.
    pub fn get_or_insert_with(&mut self, track_id: u64, init: impl FnOnce() -> T) -> &mut T {
        self.tick += 1;
        let tick = self.tick;

        let existing = self.index.get(&track_id).copied();
        let i = match existing {
            Some(i) => i,
            None => self.allocate(track_id, init(), tick),
        };

        let slot = &mut self.slots[i];
        slot.last_touched = tick;
        &mut slot.value
    }

    /// Drop the entry for `track_id`. Unknown ids are ignored.
    pub fn remove(&mut self, track_id: u64) -> Option<T> {
        let i = self.index.remove(&track_id)?;
        let slot = self.slots.swap_remove(i);
        if let Some(moved) = self.slots.get(i) {
            self.index.insert(moved.track_id, i);
        }
        Some(slot.value)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    pub fn track_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.slots.iter().map(|s| s.track_id)
    }

    fn allocate(&mut self, track_id: u64, value: T, tick: u64) -> usize {
        let slot = Slot {
            track_id,
            last_touched: tick,
            value,
        };

        if self.slots.len() < self.capacity {
            self.slots.push(slot);
            let i = self.slots.len() - 1;
            self.index.insert(track_id, i);
            return i;
        }

        let victim = self
            .slots
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.last_touched)
            .map(|(i, _)| i)
            .unwrap_or(0);

        let evicted = std::mem::replace(&mut self.slots[victim], slot);
        self.index.remove(&evicted.track_id);
        self.index.insert(track_id, victim);
        debug!(
            evicted_track = evicted.track_id,
            track_id,
            capacity = self.capacity,
            "track arena full, reclaimed least recently updated slot"
        );
        victim
    }
}
