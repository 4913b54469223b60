//! The process-local handle table.
//!
//! A fixed-capacity registry of open queues. Callers hold [`QueueHandle`]
//! values — `{slot, generation}` pairs — never references into the table,
//! so a handle that outlives its row fails generation validation instead
//! of aliasing whatever queue reused the slot.

use spoolq_error::{QueueError, Result};
use spoolq_types::limits::HANDLE_LIST_MAX;
use spoolq_types::{AccessMode, AccessType, QueueHandle};

/// One open queue as the table sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleEntry {
    /// The queue's directory name.
    pub name: String,
    /// Access the handle was opened with.
    pub access: AccessType,
    /// Mode the handle was opened with.
    pub mode: AccessMode,
}

#[derive(Debug, Default)]
struct Slot {
    /// Bumped on every release so stale handles never validate again.
    generation: u64,
    entry: Option<HandleEntry>,
}

/// Fixed-capacity table of open queues; capacity is
/// [`HANDLE_LIST_MAX`](spoolq_types::limits::HANDLE_LIST_MAX).
#[derive(Debug)]
pub struct HandleTable {
    slots: [Slot; HANDLE_LIST_MAX],
}

impl HandleTable {
    /// An empty table; every slot reads as free.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot::default()),
        }
    }

    /// The live entry for a queue name, with its handle.
    pub fn find_by_name(&self, name: &str) -> Option<(QueueHandle, &HandleEntry)> {
        self.slots.iter().enumerate().find_map(|(i, slot)| {
            slot.entry
                .as_ref()
                .filter(|e| e.name == name)
                .map(|e| (QueueHandle::new(i, slot.generation), e))
        })
    }

    /// Whether any live row names this queue.
    pub fn contains_name(&self, name: &str) -> bool {
        self.find_by_name(name).is_some()
    }

    /// Bind `entry` to the first free row. `None` when the table is full.
    pub fn reserve(&mut self, entry: HandleEntry) -> Option<QueueHandle> {
        let (i, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.entry.is_none())?;
        slot.entry = Some(entry);
        Some(QueueHandle::new(i, slot.generation))
    }

    /// The entry a handle refers to, after validating slot and generation.
    pub fn get(&self, handle: QueueHandle) -> Result<&HandleEntry> {
        self.slots
            .get(handle.slot())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(QueueError::InvalidHandle)
    }

    /// Free a handle's row, invalidating the handle and every copy of it.
    pub fn release(&mut self, handle: QueueHandle) -> Result<HandleEntry> {
        let slot = self
            .slots
            .get_mut(handle.slot())
            .filter(|slot| slot.generation == handle.generation())
            .ok_or(QueueError::InvalidHandle)?;
        let entry = slot.entry.take().ok_or(QueueError::InvalidHandle)?;
        slot.generation += 1;
        Ok(entry)
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
