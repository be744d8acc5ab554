//! Worker registry.
//!
//! A bidirectional index between logical worker id and allocation id. This
//! type holds no lock of its own — the coordinator owns a single `Mutex`
//! guarding both this registry and the planned-worker set together, and
//! calls these `&mut self` methods while holding it, so the two maps can
//! never be observed in an inconsistent intermediate state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::resource_manager::AllocationHandle;
use crate::worker::{AllocationId, LogicalWorker, WorkerState};

/// Bidirectional worker index. No internal synchronization — see module docs.
#[derive(Default)]
pub struct WorkerRegistry {
    by_id: HashMap<u32, LogicalWorker>,
    id_by_allocation: HashMap<AllocationId, u32>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `worker` bound to `allocation`, updating both indices and the
    /// worker's state as one step so neither index — nor a reader racing the
    /// transition — ever observes only half of the bind.
    pub fn assign(&mut self, mut worker: LogicalWorker, allocation: Arc<dyn AllocationHandle>) {
        let allocation_id = allocation.allocation_id().to_string();
        worker.allocation_id = Some(allocation_id.clone());
        worker.allocation = Some(allocation);
        worker.state = WorkerState::Bound;
        self.id_by_allocation.insert(allocation_id, worker.id);
        self.by_id.insert(worker.id, worker);
    }

    /// Replaces the stored record for an id that is already present,
    /// e.g. after a local (non-allocation) state transition.
    pub fn update(&mut self, worker: LogicalWorker) {
        self.by_id.insert(worker.id, worker);
    }

    pub fn lookup_by_id(&self, id: u32) -> Option<&LogicalWorker> {
        self.by_id.get(&id)
    }

    pub fn lookup_by_allocation_id(&self, allocation_id: &str) -> Option<&LogicalWorker> {
        let id = *self.id_by_allocation.get(allocation_id)?;
        self.by_id.get(&id)
    }

    /// Removes `id` from both indices, returning the allocation handle it
    /// was bound to so the caller can close it. Programmer error (panics)
    /// if the worker is not bound — callers must check `is_bound()` first.
    pub fn detach(&mut self, id: u32) -> Arc<dyn AllocationHandle> {
        let worker = self
            .by_id
            .get_mut(&id)
            .unwrap_or_else(|| panic!("detach: worker {id} not present in registry"));
        let allocation_id = worker
            .allocation_id
            .take()
            .unwrap_or_else(|| panic!("detach: worker {id} is not bound"));
        let handle = worker
            .allocation
            .take()
            .unwrap_or_else(|| panic!("detach: worker {id} is not bound"));
        worker.context_id = None;
        self.id_by_allocation.remove(&allocation_id);
        handle
    }

    /// Removes `id` entirely from the registry (used by kill paths).
    pub fn remove(&mut self, id: u32) -> Option<LogicalWorker> {
        let worker = self.by_id.remove(&id)?;
        if let Some(allocation_id) = &worker.allocation_id {
            self.id_by_allocation.remove(allocation_id);
        }
        Some(worker)
    }

    /// Stable copy of every registered worker, for iteration.
    pub fn snapshot(&self) -> Vec<LogicalWorker> {
        self.by_id.values().cloned().collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &u32> {
        self.by_id.keys()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
