//! External interfaces consumed by the application master.
//!
//! These traits are the only I/O boundary in the crate. A concrete
//! resource-manager client is supplied by the embedder; this crate only
//! ever holds a `dyn ResourceManagerClient` and the `dyn
//! AllocationHandle`/`dyn ContextHandle` objects it hands back.

use serde::{Deserialize, Serialize};

use crate::error::TamResult;

/// A container request, as submitted via [`ResourceManagerClient::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorRequest {
    pub count: u32,
    pub memory_mb: u64,
    pub cores: u32,
}

impl EvaluatorRequest {
    pub fn single(memory_mb: u64, cores: u32) -> Self {
        Self {
            count: 1,
            memory_mb,
            cores,
        }
    }
}

/// The task-config schema handed to a worker on context/task submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub topology_name: String,
    pub topology_jar_path: String,
    pub topology_package_name: String,
    pub core_package_name: String,
    pub role: String,
    pub environment: String,
    pub cluster: String,
    pub component_ram_map: String,
    pub container_id: String,
    pub verbose: bool,
}

/// The cluster resource manager's submission surface.
pub trait ResourceManagerClient: Send + Sync {
    fn submit(&self, request: EvaluatorRequest) -> TamResult<()>;
}

/// A physical container granted by the resource manager.
pub trait AllocationHandle: Send + Sync {
    fn allocation_id(&self) -> &str;
    fn granted_mem(&self) -> u64;
    fn granted_cores(&self) -> u32;
    fn submit_context(&self, config: TaskConfig) -> TamResult<()>;
    fn close(&self);
}

/// The in-container bootstrap environment a task is submitted into.
pub trait ContextHandle: Send + Sync {
    fn context_id(&self) -> &str;
    fn submit_task(&self, config: TaskConfig) -> TamResult<()>;
}
