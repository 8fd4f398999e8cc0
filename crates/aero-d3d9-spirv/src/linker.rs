use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::instruction::Semantic;
use crate::shader_limits::LINKER_SLOT_CAPACITY;

/// Shared semantic -> interface slot table.
///
/// Vertex outputs and pixel inputs are numbered through this table so that two independently
/// compiled shaders agree on the location of every semantic they both use, without either
/// compilation seeing the other. Entries are only ever appended, so a slot handed out once stays
/// valid for the lifetime of the table.
///
/// Whoever pairs shaders into pipelines owns the table and passes it to every compilation that has
/// to link against the others.
#[derive(Debug)]
pub struct LinkerSlotTable {
    slots: Mutex<Vec<Semantic>>,
    capacity: usize,
}

impl LinkerSlotTable {
    pub fn new() -> Self {
        Self::with_capacity(LINKER_SLOT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the slot of `semantic`, appending it if it has not been seen yet.
    ///
    /// The lookup and the insert happen under one lock acquisition. A full table is left
    /// untouched.
    pub fn slot_for(&self, semantic: Semantic) -> Result<u32, LinkerError> {
        // Entries are only appended after the capacity check, so a poisoned lock still guards a
        // consistent list.
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(slot) = slots.iter().position(|s| *s == semantic) {
            return Ok(slot as u32);
        }

        if slots.len() >= self.capacity {
            return Err(LinkerError::Exhausted {
                semantic,
                capacity: self.capacity,
            });
        }

        slots.push(semantic);
        let slot = (slots.len() - 1) as u32;
        debug!(%semantic, slot, "allocated linker slot");
        Ok(slot)
    }

    /// Looks up `semantic` without allocating.
    pub fn find(&self, semantic: Semantic) -> Option<u32> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.iter().position(|s| *s == semantic).map(|s| s as u32)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LinkerSlotTable {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkerError {
    #[error("no interface slot left for semantic {semantic} (linker table holds {capacity} entries)")]
    Exhausted { semantic: Semantic, capacity: usize },
}
