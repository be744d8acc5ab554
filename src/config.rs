//! In-memory construction parameters.
//!
//! Built programmatically by the embedding scheduler plugin and handed to
//! the application master at construction; no file parsing happens in this
//! crate.

use serde::{Deserialize, Serialize};

/// Static fields of the task-config template that do not vary per worker —
/// `container_id` and `component_ram_map` are filled in per submission by
/// [`crate::coordinator::AllocationCoordinator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TamConfig {
    pub topology_name: String,
    pub topology_jar_path: String,
    pub topology_package_name: String,
    pub core_package_name: String,
    pub role: String,
    pub environment: String,
    pub cluster: String,
    pub verbose: bool,
    /// Number of times the supervisor retries a dead topology master
    /// before giving up.
    pub tm_retry_budget: u32,
}

impl TamConfig {
    pub fn new(
        topology_name: impl Into<String>,
        topology_jar_path: impl Into<String>,
        topology_package_name: impl Into<String>,
        core_package_name: impl Into<String>,
        role: impl Into<String>,
        environment: impl Into<String>,
        cluster: impl Into<String>,
    ) -> Self {
        Self {
            topology_name: topology_name.into(),
            topology_jar_path: topology_jar_path.into(),
            topology_package_name: topology_package_name.into(),
            core_package_name: core_package_name.into(),
            role: role.into(),
            environment: environment.into(),
            cluster: cluster.into(),
            verbose: false,
            tm_retry_budget: 3,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
