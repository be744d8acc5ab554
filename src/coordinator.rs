//! Allocation coordinator.
//!
//! Owns the single mutex guarding the planned-worker set and the registry
//! together, plus the topology-killed flag. Every resource-manager callback
//! and every operator-invoked lifecycle call funnels through this one lock,
//! so they are all serialised against each other. No method here blocks
//! indefinitely — the only blocking calls are the allocation-handle trait
//! methods, assumed bounded.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::config::TamConfig;
use crate::error::{TamError, TamResult};
use crate::fitting::{self, Granted};
use crate::plan::ContainerPlan;
use crate::registry::WorkerRegistry;
use crate::resource_manager::{
    AllocationHandle, ContextHandle, EvaluatorRequest, ResourceManagerClient, TaskConfig,
};
use crate::worker::{LogicalWorker, Outcome, WorkerEvent, advance};

struct CoordinatorState {
    planned: BTreeMap<u32, ContainerPlan>,
    registry: WorkerRegistry,
    component_ram_map: String,
}

/// Serialises outstanding requests, consumes allocation/failure/context/task
/// events, and drives the per-worker state machine via the fitting policy
/// and the registry.
pub struct AllocationCoordinator {
    state: Mutex<CoordinatorState>,
    killed: Arc<AtomicBool>,
    client: Arc<dyn ResourceManagerClient>,
    config: TamConfig,
}

impl AllocationCoordinator {
    pub fn new(client: Arc<dyn ResourceManagerClient>, config: TamConfig) -> Self {
        Self {
            state: Mutex::new(CoordinatorState {
                planned: BTreeMap::new(),
                registry: WorkerRegistry::new(),
                component_ram_map: String::new(),
            }),
            killed: Arc::new(AtomicBool::new(false)),
            client,
            config,
        }
    }

    pub fn killed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.killed)
    }

    fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    fn task_config(&self, container_id: u32, component_ram_map: &str) -> TaskConfig {
        TaskConfig {
            topology_name: self.config.topology_name.clone(),
            topology_jar_path: self.config.topology_jar_path.clone(),
            topology_package_name: self.config.topology_package_name.clone(),
            core_package_name: self.config.core_package_name.clone(),
            role: self.config.role.clone(),
            environment: self.config.environment.clone(),
            cluster: self.config.cluster.clone(),
            component_ram_map: component_ram_map.to_string(),
            container_id: container_id.to_string(),
            verbose: self.config.verbose,
        }
    }

    /// Adopts `plan` into the planned-worker set (the lifecycle controller
    /// validates for duplicates before calling this) and requests one
    /// container per entry.
    pub(crate) fn adopt_plan(
        &self,
        containers: BTreeMap<u32, ContainerPlan>,
        component_ram_map: String,
    ) {
        let mut state = self.state.lock().expect("coordinator mutex poisoned");
        state.component_ram_map = component_ram_map;
        state.planned.extend(containers.clone());
        drop(state);
        self.request_workers(containers.into_values());
    }

    /// Submits one container request per plan entry, serially and in
    /// ascending id order, so the resource manager cannot coalesce requests
    /// issued in the same tick.
    pub fn request_workers(&self, containers: impl IntoIterator<Item = ContainerPlan>) {
        for plan in containers {
            let request = EvaluatorRequest::single(plan.resource.required_mb(), plan.resource.required_cores());
            match self.client.submit(request) {
                Ok(()) => debug!(id = plan.id, "container request submitted"),
                Err(err) => warn!(id = plan.id, %err, "container request failed"),
            }
        }
    }

    /// Hot path run whenever the resource manager grants a container. Takes
    /// ownership of the handle so a winning fit can store it in the registry
    /// for a later teardown path to close.
    pub fn on_allocation_granted(&self, allocation: Arc<dyn AllocationHandle>) {
        if self.is_killed() {
            allocation.close();
            return;
        }

        let mut state = self.state.lock().expect("coordinator mutex poisoned");

        // Step 1: the awaiting set is every planned id with no registry entry.
        let awaiting: Vec<LogicalWorker> = state
            .planned
            .values()
            .filter(|plan| state.registry.lookup_by_id(plan.id).is_none())
            .map(|plan| LogicalWorker::requested(plan.id, plan.resource))
            .collect();

        if awaiting.is_empty() {
            drop(state);
            info!(
                allocation_id = allocation.allocation_id(),
                "no pending worker; closing allocation"
            );
            allocation.close();
            return;
        }

        let granted = Granted {
            mem: allocation.granted_mem(),
            cores: allocation.granted_cores(),
        };

        let Some(winner) = fitting::fit(granted, &awaiting, true) else {
            drop(state);
            warn!(
                allocation_id = allocation.allocation_id(),
                error = %TamError::AllocationFitMiss,
                "closing allocation, outstanding request remains"
            );
            allocation.close();
            return;
        };

        let winner_id = winner.id;
        state.registry.assign(winner, Arc::clone(&allocation));
        let component_ram_map = state.component_ram_map.clone();
        drop(state);

        let config = self.task_config(winner_id, &component_ram_map);
        if let Err(err) = allocation.submit_context(config) {
            warn!(id = winner_id, %err, "failed to submit context");
        }
    }

    /// Run when a bound container dies before its context ever became
    /// active.
    pub fn on_allocation_failed(&self, allocation: &dyn AllocationHandle) {
        let mut state = self.state.lock().expect("coordinator mutex poisoned");
        let Some(mut worker) = state
            .registry
            .lookup_by_allocation_id(allocation.allocation_id())
            .cloned()
        else {
            drop(state);
            return;
        };

        let killed = self.is_killed();
        let outcome = advance(&mut worker, WorkerEvent::AllocationFailed, killed);
        let id = worker.id;
        let resource_for_retry = (worker.required_mem, worker.required_cores);

        match outcome {
            Outcome::RequestContainer => {
                state.registry.remove(id);
                drop(state);
                warn!(id, error = %TamError::ContainerFault, "container failed, re-requesting");
                let request = EvaluatorRequest::single(
                    resource_for_retry.0.div_ceil(1024 * 1024),
                    resource_for_retry.1,
                );
                if let Err(err) = self.client.submit(request) {
                    warn!(id, %err, "re-request after container failure failed");
                }
            }
            Outcome::CloseHandles => {
                let removed = state.registry.remove(id);
                drop(state);
                close_allocation(removed);
            }
            _ => drop(state),
        }
    }

    /// Run when an in-container bootstrap environment reports ready.
    pub fn on_context_active(&self, context: &dyn ContextHandle) {
        let id: u32 = match context.context_id().parse() {
            Ok(id) => id,
            Err(_) => {
                warn!(context_id = context.context_id(), "unparseable context id; closing");
                return;
            }
        };

        let mut state = self.state.lock().expect("coordinator mutex poisoned");
        let Some(mut worker) = state.registry.lookup_by_id(id).cloned() else {
            drop(state);
            warn!(id, "onContextActive for unknown worker; closing stale context");
            return;
        };

        let killed = self.is_killed();
        let outcome = advance(
            &mut worker,
            WorkerEvent::ContextActive {
                context_id: context.context_id().to_string(),
            },
            killed,
        );

        match outcome {
            Outcome::SubmitTask => {
                let component_ram_map = state.component_ram_map.clone();
                state.registry.update(worker.clone());
                drop(state);
                let config = self.task_config(id, &component_ram_map);
                if let Err(err) = context.submit_task(config) {
                    warn!(id, %err, "failed to submit task");
                }
            }
            Outcome::CloseHandles => {
                if killed {
                    let removed = state.registry.remove(id);
                    drop(state);
                    close_allocation(removed);
                } else {
                    state.registry.update(worker);
                    drop(state);
                }
            }
            _ => drop(state),
        }
    }

    /// A submitted task reported itself started. Purely informational — no
    /// transition in §4.3 is keyed on this event, so there is nothing to
    /// mutate; it exists as a first-class callback so the dispatcher has
    /// somewhere to route it.
    pub fn on_task_running(&self, context: &dyn ContextHandle) {
        debug!(context_id = context.context_id(), "task reported running");
    }

    /// The task died abnormally. Identical handling to [`Self::on_task_completed`].
    pub fn on_task_failed(&self, context: &dyn ContextHandle) {
        self.on_task_fault(context);
    }

    /// The task exited normally — unexpected for a long-lived worker, so it
    /// is handled the same way as a failure: resubmitted on the same context.
    pub fn on_task_completed(&self, context: &dyn ContextHandle) {
        self.on_task_fault(context);
    }

    /// Run on task failure or completion, treated identically: the task is
    /// resubmitted on the same context without touching the allocation.
    pub fn on_task_fault(&self, context: &dyn ContextHandle) {
        let id: u32 = match context.context_id().parse() {
            Ok(id) => id,
            Err(_) => return,
        };

        let mut state = self.state.lock().expect("coordinator mutex poisoned");
        let Some(mut worker) = state.registry.lookup_by_id(id).cloned() else {
            drop(state);
            return;
        };

        let killed = self.is_killed();
        let outcome = advance(&mut worker, WorkerEvent::TaskFault, killed);

        match outcome {
            Outcome::SubmitTask => {
                let component_ram_map = state.component_ram_map.clone();
                state.registry.update(worker);
                drop(state);
                let config = self.task_config(id, &component_ram_map);
                if let Err(err) = context.submit_task(config) {
                    warn!(id, %err, "failed to resubmit task");
                }
            }
            Outcome::CloseHandles => {
                let removed = state.registry.remove(id);
                drop(state);
                close_allocation(removed);
            }
            _ => drop(state),
        }
    }

    pub(crate) fn registry_snapshot(&self) -> Vec<LogicalWorker> {
        self.state
            .lock()
            .expect("coordinator mutex poisoned")
            .registry
            .snapshot()
    }

    pub(crate) fn planned_ids(&self) -> Vec<u32> {
        self.state
            .lock()
            .expect("coordinator mutex poisoned")
            .planned
            .keys()
            .copied()
            .collect()
    }

    pub(crate) fn planned_contains(&self, id: u32) -> bool {
        self.state
            .lock()
            .expect("coordinator mutex poisoned")
            .planned
            .contains_key(&id)
    }

    pub(crate) fn planned_remove(&self, id: u32) {
        self.state
            .lock()
            .expect("coordinator mutex poisoned")
            .planned
            .remove(&id);
    }

    pub(crate) fn registry_detach(&self, id: u32) -> Option<Arc<dyn AllocationHandle>> {
        let mut state = self.state.lock().expect("coordinator mutex poisoned");
        if state.registry.lookup_by_id(id).map(|w| w.is_bound()) == Some(true) {
            Some(state.registry.detach(id))
        } else {
            None
        }
    }

    pub(crate) fn registry_remove(&self, id: u32) -> Option<LogicalWorker> {
        self.state
            .lock()
            .expect("coordinator mutex poisoned")
            .registry
            .remove(id)
    }

    pub(crate) fn registry_lookup(&self, id: u32) -> Option<LogicalWorker> {
        self.state
            .lock()
            .expect("coordinator mutex poisoned")
            .registry
            .lookup_by_id(id)
            .cloned()
    }

    pub(crate) fn registry_update(&self, worker: LogicalWorker) {
        self.state
            .lock()
            .expect("coordinator mutex poisoned")
            .registry
            .update(worker);
    }

    pub(crate) fn mark_killed(&self) -> bool {
        !self.killed.swap(true, Ordering::SeqCst)
    }

    /// Used by `restartWorker`/`restartTopology` to reissue a request for an
    /// id with no binding at all (neither bound nor present in registry).
    pub(crate) fn resource_for(&self, id: u32) -> Option<(u64, u32)> {
        let state = self.state.lock().expect("coordinator mutex poisoned");
        state
            .registry
            .lookup_by_id(id)
            .map(|w| (w.required_mem, w.required_cores))
            .or_else(|| {
                state
                    .planned
                    .get(&id)
                    .map(|p| (p.resource.ram, p.resource.required_cores()))
            })
    }

    pub fn client(&self) -> &Arc<dyn ResourceManagerClient> {
        &self.client
    }

    /// Number of workers currently bound in the registry. Useful for
    /// embedding-side health checks and assertions in integration tests.
    pub fn active_worker_count(&self) -> usize {
        self.state.lock().expect("coordinator mutex poisoned").registry.len()
    }
}

/// Closes the allocation handle carried by a worker just removed from the
/// registry, if it had one. A no-op for a worker whose handle was already
/// cleared by `advance` (e.g. an `AllocationFailed` transition).
fn close_allocation(worker: Option<LogicalWorker>) {
    if let Some(handle) = worker.and_then(|w| w.allocation) {
        handle.close();
    }
}

pub(crate) fn request_single(
    client: &Arc<dyn ResourceManagerClient>,
    mem: u64,
    cores: u32,
) -> TamResult<()> {
    client.submit(EvaluatorRequest::single(mem.div_ceil(1024 * 1024), cores))
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
