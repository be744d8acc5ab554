//! Per-logical-worker lifecycle.
//!
//! The state machine is expressed as a pure fold: `advance` takes the
//! current [`LogicalWorker`] and a [`WorkerEvent`] and returns an
//! [`Outcome`] describing what the caller (the allocation coordinator) must
//! do. The transition function itself performs no I/O — it only mutates
//! `state`/`allocation`/`context` and reports the side effect.

use std::sync::Arc;

use crate::plan::RequiredResource;
use crate::resource_manager::AllocationHandle;

/// Lifecycle state of a logical worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Pending,
    Requested,
    Bound,
    ContextReady,
    Running,
    /// Reserved for a future health-check source — no transition in this
    /// crate currently produces it.
    Failed,
    Gone,
}

/// An opaque allocation identifier, as carried by the registry's
/// allocation-keyed index.
pub type AllocationId = String;
/// A context identifier, always the worker id rendered as decimal.
pub type ContextId = String;

/// The authoritative record for a container the coordinator wants running.
///
/// `allocation_id` and `allocation` are set and cleared together by the
/// registry (`assign`/`detach`/`remove`) — `allocation_id` is the index key,
/// `allocation` is the live handle a teardown path closes.
#[derive(Clone)]
pub struct LogicalWorker {
    pub id: u32,
    pub required_cores: u32,
    pub required_mem: u64,
    pub state: WorkerState,
    pub allocation_id: Option<AllocationId>,
    pub allocation: Option<Arc<dyn AllocationHandle>>,
    pub context_id: Option<ContextId>,
}

impl std::fmt::Debug for LogicalWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalWorker")
            .field("id", &self.id)
            .field("required_cores", &self.required_cores)
            .field("required_mem", &self.required_mem)
            .field("state", &self.state)
            .field("allocation_id", &self.allocation_id)
            .field("context_id", &self.context_id)
            .finish()
    }
}

impl LogicalWorker {
    pub fn pending(id: u32, resource: RequiredResource) -> Self {
        Self {
            id,
            required_cores: resource.required_cores(),
            required_mem: resource.ram,
            state: WorkerState::Pending,
            allocation_id: None,
            allocation: None,
            context_id: None,
        }
    }

    pub fn requested(id: u32, resource: RequiredResource) -> Self {
        let mut w = Self::pending(id, resource);
        w.state = WorkerState::Requested;
        w
    }

    pub fn is_bound(&self) -> bool {
        self.allocation_id.is_some()
    }
}

/// External events the resource manager or an operator delivers.
#[derive(Debug)]
pub enum WorkerEvent {
    /// A granted allocation was fit to this worker.
    AllocationGranted { allocation_id: AllocationId },
    /// The bound container died.
    AllocationFailed,
    /// The in-container bootstrap reported ready.
    ContextActive { context_id: ContextId },
    /// The submitted task died or exited; both are treated identically.
    TaskFault,
    /// An operator- or topology-kill requested teardown.
    Kill,
}

/// Side effect the coordinator must perform after a transition.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No externally visible effect (e.g. a stale event was ignored).
    None,
    /// Submit a context to the now-bound allocation.
    SubmitContext,
    /// Submit (or resubmit) the executor task on the active context.
    SubmitTask,
    /// Issue a fresh container request for this worker's id.
    RequestContainer,
    /// Close the worker's current allocation/context handles.
    CloseHandles,
}

/// Advance `worker`'s state machine by one event, returning the side effect
/// the caller must perform. `killed` reflects the topology-killed flag: once
/// set, every state collapses to `Gone` and no further container requests
/// or context/task submissions are issued.
pub fn advance(worker: &mut LogicalWorker, event: WorkerEvent, killed: bool) -> Outcome {
    if killed {
        let was_bound = worker.is_bound();
        worker.state = WorkerState::Gone;
        worker.allocation_id = None;
        worker.allocation = None;
        worker.context_id = None;
        return if was_bound || matches!(event, WorkerEvent::ContextActive { .. }) {
            Outcome::CloseHandles
        } else {
            Outcome::None
        };
    }

    match (worker.state, event) {
        (WorkerState::Requested, WorkerEvent::AllocationGranted { allocation_id }) => {
            worker.allocation_id = Some(allocation_id);
            worker.state = WorkerState::Bound;
            Outcome::SubmitContext
        }
        (_, WorkerEvent::AllocationGranted { .. }) => {
            // Fit policy only ever calls advance with AllocationGranted on a
            // Requested worker; any other state here would be a caller bug.
            Outcome::None
        }
        (WorkerState::Bound, WorkerEvent::ContextActive { context_id }) => {
            worker.context_id = Some(context_id);
            worker.state = WorkerState::ContextReady;
            Outcome::SubmitTask
        }
        (_, WorkerEvent::ContextActive { .. }) => {
            // Stale context activation for a worker no longer awaiting one.
            Outcome::CloseHandles
        }
        (WorkerState::ContextReady | WorkerState::Running, WorkerEvent::TaskFault) => {
            worker.state = WorkerState::Running;
            Outcome::SubmitTask
        }
        (_, WorkerEvent::TaskFault) => Outcome::None,
        (WorkerState::Bound | WorkerState::ContextReady | WorkerState::Running, WorkerEvent::AllocationFailed) => {
            worker.allocation_id = None;
            worker.allocation = None;
            worker.context_id = None;
            worker.state = WorkerState::Requested;
            Outcome::RequestContainer
        }
        (_, WorkerEvent::AllocationFailed) => Outcome::None,
        (_, WorkerEvent::Kill) => {
            let was_bound = worker.is_bound();
            worker.allocation_id = None;
            worker.allocation = None;
            worker.context_id = None;
            worker.state = WorkerState::Gone;
            if was_bound {
                Outcome::CloseHandles
            } else {
                Outcome::None
            }
        }
    }
}
