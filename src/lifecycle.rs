//! Lifecycle controller.
//!
//! The only surface the embedding scheduler plugin calls directly —
//! explicit dependency injection, no process-wide singleton. Delegates
//! container procurement to the [`AllocationCoordinator`] and topology
//! master supervision to the [`TmSupervisor`].

use std::sync::Arc;

use tracing::info;

use crate::config::TamConfig;
use crate::coordinator::{self, AllocationCoordinator};
use crate::error::{TamError, TamResult};
use crate::plan::{ContainerPlan, PackingPlan};
use crate::resource_manager::ResourceManagerClient;
use crate::tm_supervisor::{TmSupervisor, TopologyMaster};

pub struct Lifecycle {
    coordinator: Arc<AllocationCoordinator>,
    tm: TmSupervisor,
}

impl Lifecycle {
    pub fn new(client: Arc<dyn ResourceManagerClient>, config: TamConfig) -> Self {
        let tm_retry_budget = config.tm_retry_budget;
        Self {
            coordinator: Arc::new(AllocationCoordinator::new(client, config)),
            tm: TmSupervisor::new(tm_retry_budget),
        }
    }

    pub fn coordinator(&self) -> &Arc<AllocationCoordinator> {
        &self.coordinator
    }

    /// Stores `plan.component_ram_map`, admits every container in ascending
    /// id order, and issues one request per worker.
    pub fn schedule_workers(&self, plan: PackingPlan) -> TamResult<()> {
        let by_id = plan.containers_by_id();
        for id in by_id.keys() {
            if self.coordinator.planned_contains(*id) {
                return Err(TamError::DuplicateAllocation { id: *id });
            }
        }
        self.coordinator.adopt_plan(by_id, plan.component_ram_map);
        Ok(())
    }

    /// Launches the topology master (logical id 0) — must be called after
    /// `schedule_workers` so the component-ram map is already captured.
    /// A no-op once the topology has been killed.
    pub fn launch_tm<F, T>(&self, make_tm: F)
    where
        F: FnMut() -> T + Send + 'static,
        T: TopologyMaster,
    {
        if self.tm.is_killed() {
            info!("launch_tm called after kill; ignoring");
            return;
        }
        self.tm.launch(make_tm);
    }

    /// Detaches and closes the allocation of any bound worker among `plans`,
    /// then unconditionally removes each id from the planned-worker set.
    pub fn kill_workers(&self, plans: impl IntoIterator<Item = ContainerPlan>) {
        for plan in plans {
            if let Some(handle) = self.coordinator.registry_detach(plan.id) {
                handle.close();
            }
            self.coordinator.registry_remove(plan.id);
            self.coordinator.planned_remove(plan.id);
        }
    }

    /// Sets the killed flag, kills the topology master, and detaches+closes
    /// every bound allocation in the registry. Idempotent: a second call
    /// finds an empty registry and closes nothing.
    pub fn kill_topology(&self) {
        let first_time = self.coordinator.mark_killed();
        self.tm.kill();

        if !first_time {
            return;
        }

        for worker in self.coordinator.registry_snapshot() {
            if worker.is_bound() {
                if let Some(handle) = self.coordinator.registry_detach(worker.id) {
                    handle.close();
                }
            }
            self.coordinator.registry_remove(worker.id);
        }
    }

    /// Recycles `id`'s container (if bound) and issues a fresh request,
    /// building a brand-new `LogicalWorker` when the id was only planned.
    /// No attempt is made to cancel any stale outstanding request; the
    /// fitting policy simply ignores it once it arrives.
    pub fn restart_worker(&self, id: u32) -> TamResult<()> {
        if let Some(handle) = self.coordinator.registry_detach(id) {
            handle.close();
            self.coordinator.registry_remove(id);
        } else if self.coordinator.registry_lookup(id).is_none() && !self.coordinator.planned_contains(id) {
            return Err(TamError::UnknownWorker { id });
        }

        let (mem, cores) = self
            .coordinator
            .resource_for(id)
            .ok_or(TamError::UnknownWorker { id })?;

        coordinator::request_single(self.coordinator.client(), mem, cores)
            .map_err(|err| TamError::ContainerAllocation(anyhow::anyhow!(err.to_string())))
    }

    /// Calls `restart_worker` for every worker currently in the registry
    /// snapshot.
    pub fn restart_topology(&self) -> TamResult<()> {
        for worker in self.coordinator.registry_snapshot() {
            self.restart_worker(worker.id)?;
        }
        Ok(())
    }

    /// A planned request is still outstanding for exactly the ids with no
    /// registry entry.
    pub fn ids_awaiting_allocation(&self) -> Vec<u32> {
        let registered: std::collections::HashSet<u32> =
            self.coordinator.registry_snapshot().into_iter().map(|w| w.id).collect();
        self.coordinator
            .planned_ids()
            .into_iter()
            .filter(|id| !registered.contains(id))
            .collect()
    }
}
