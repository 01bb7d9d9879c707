//! SlotTable - Fixed-capacity slot storage
//!
//! Entries keep their index for as long as they are stored, so the index can
//! be handed to the GPU as a stable address. The table never grows; free
//! slots are found by a linear scan from index 0.

use alloc::vec::Vec;

/// Fixed-capacity table of optional entries
#[derive(Clone, Debug)]
pub struct SlotTable<T> {
    entries: Vec<Option<T>>,
    num_stored: usize,
    /// Highest occupied index, None when empty
    max_index: Option<usize>,
}

impl<T> SlotTable<T> {
    /// Create a table with `capacity` empty slots
    pub fn new(capacity: usize) -> Self {
        let mut entries = Vec::with_capacity(capacity);
        entries.resize_with(capacity, || None);
        Self {
            entries,
            num_stored: 0,
            max_index: None,
        }
    }

    /// Total number of slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of occupied slots
    #[inline]
    pub fn num_stored(&self) -> usize {
        self.num_stored
    }

    /// Highest occupied slot index, 0 when empty
    #[inline]
    pub fn max_index(&self) -> usize {
        self.max_index.unwrap_or(0)
    }

    /// Check whether every slot is occupied
    #[inline]
    pub fn is_full(&self) -> bool {
        self.num_stored == self.entries.len()
    }

    /// Check whether no slot is occupied
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_stored == 0
    }

    /// Find the first empty slot
    pub fn find_free_slot(&self) -> Option<usize> {
        self.entries.iter().position(Option::is_none)
    }

    /// Store a value in the first empty slot
    ///
    /// Returns the value back if the table is full.
    pub fn insert(&mut self, value: T) -> Result<usize, T> {
        let Some(slot) = self.find_free_slot() else {
            return Err(value);
        };
        self.insert_at(slot, value)?;
        Ok(slot)
    }

    /// Store a value in an empty slot
    ///
    /// Returns the value back if the slot is out of range or occupied.
    pub fn insert_at(&mut self, slot: usize, value: T) -> Result<(), T> {
        let Some(entry) = self.entries.get_mut(slot) else {
            return Err(value);
        };
        if entry.is_some() {
            return Err(value);
        }

        *entry = Some(value);
        self.num_stored += 1;
        self.max_index = Some(self.max_index.map_or(slot, |max| max.max(slot)));
        Ok(())
    }

    /// Vacate a slot, returning its previous value
    pub fn remove(&mut self, slot: usize) -> Option<T> {
        let value = self.entries.get_mut(slot)?.take()?;
        self.num_stored -= 1;
        if self.max_index == Some(slot) {
            self.recompute_max_index(slot);
        }
        Some(value)
    }

    /// Get the entry at a slot
    #[inline]
    pub fn get(&self, slot: usize) -> Option<&T> {
        self.entries.get(slot)?.as_ref()
    }

    /// Check whether a slot is occupied
    #[inline]
    pub fn is_occupied(&self, slot: usize) -> bool {
        self.get(slot).is_some()
    }

    /// Iterate occupied slots in index order, bounded by the max index
    pub fn iter_occupied(&self) -> impl Iterator<Item = (usize, &T)> {
        let end = self.max_index.map_or(0, |max| max + 1);
        self.entries[..end]
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|value| (slot, value)))
    }

    fn recompute_max_index(&mut self, vacated: usize) {
        self.max_index = self.entries[..vacated].iter().rposition(Option::is_some);
    }
}
