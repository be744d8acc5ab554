//! Packing plan input types.
//!
//! A `PackingPlan` is produced upstream and consumed by the
//! [`crate::lifecycle::Lifecycle`] controller. It carries one
//! [`ContainerPlan`] per worker the topology needs plus an opaque
//! component-ram map string forwarded to every worker's task config
//! untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// CPU and memory requirement for a single container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequiredResource {
    /// Requested RAM in bytes.
    pub ram: u64,
    /// Requested CPU, fractional cores.
    pub cpu: f64,
}

impl RequiredResource {
    pub fn new(ram: u64, cpu: f64) -> Self {
        Self { ram, cpu }
    }

    /// `ceil(cpu)`, the unit the resource manager schedules in.
    pub fn required_cores(&self) -> u32 {
        self.cpu.ceil() as u32
    }

    pub fn required_mb(&self) -> u64 {
        self.ram.div_ceil(1024 * 1024)
    }
}

/// A single planned container. Worker id `0` is reserved for the topology
/// master and never appears in a `PackingPlan`'s container set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerPlan {
    pub id: u32,
    pub resource: RequiredResource,
}

impl ContainerPlan {
    pub fn new(id: u32, resource: RequiredResource) -> Self {
        assert!(id >= 1, "container plan id 0 is reserved for the TM");
        Self { id, resource }
    }
}

/// The declarative input to [`crate::lifecycle::Lifecycle::schedule_workers`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackingPlan {
    pub containers: Vec<ContainerPlan>,
    /// Opaque, carried verbatim into every worker's task config.
    pub component_ram_map: String,
}

impl PackingPlan {
    pub fn new(containers: Vec<ContainerPlan>, component_ram_map: impl Into<String>) -> Self {
        Self {
            containers,
            component_ram_map: component_ram_map.into(),
        }
    }

    /// Containers in ascending id order.
    pub fn containers_by_id(&self) -> BTreeMap<u32, ContainerPlan> {
        self.containers.iter().cloned().map(|c| (c.id, c)).collect()
    }
}
