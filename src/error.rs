use thiserror::Error;

/// Errors surfaced across the public boundary.
///
/// Several of these are never returned to a caller in practice — they are
/// raised, logged at the point of local recovery, and swallowed (see the
/// `AllocationFitMiss`, `TaskFault`, `ContainerFault` variants). They remain
/// part of this enum so the recovery path has a concrete value to log and so
/// tests can assert on what kind of fault was handled.
#[derive(Debug, Error)]
pub enum TamError {
    #[error("container plan {id} is already scheduled")]
    DuplicateAllocation { id: u32 },

    #[error("worker {id} is not known to the planned set or the registry")]
    UnknownWorker { id: u32 },

    #[error("container allocation request failed: {0}")]
    ContainerAllocation(#[source] anyhow::Error),

    #[error("no pending worker fits the granted allocation")]
    AllocationFitMiss,

    #[error("task on an active context faulted")]
    TaskFault,

    #[error("an allocated container died")]
    ContainerFault,

    #[error("the topology master exited and exhausted its retry budget")]
    TmFault,
}

pub type TamResult<T> = std::result::Result<T, TamError>;
