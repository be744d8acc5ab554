//! Cross-component scenarios driven entirely through the public
//! `Lifecycle` and `AllocationCoordinator` surface against the fake
//! resource-manager collaborators in `tam::testkit`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tam::config::TamConfig;
use tam::error::TamError;
use tam::lifecycle::Lifecycle;
use tam::plan::{ContainerPlan, PackingPlan, RequiredResource};
use tam::testkit::{FakeAllocation, FakeContext, FakeResourceManager};
use tam::tm_supervisor::TopologyMaster;

fn config() -> TamConfig {
    TamConfig::new("topo", "topo.jar", "pkg", "core-pkg", "role", "env", "cluster")
}

fn gb_plan(id: u32, gb: u64, cores: f64) -> ContainerPlan {
    ContainerPlan::new(id, RequiredResource::new(gb * (1 << 30), cores))
}

struct AlwaysUpTm {
    ran: Arc<AtomicU32>,
}

impl TopologyMaster for AlwaysUpTm {
    fn run(&mut self) -> Result<(), TamError> {
        self.ran.fetch_add(1, Ordering::SeqCst);
        // Block until cancelled by kill(), simulating a running TM process.
        std::thread::sleep(std::time::Duration::from_secs(3600));
        Ok(())
    }
}

#[test]
fn duplicate_schedule_is_rejected_and_mutates_nothing() {
    let client = FakeResourceManager::new();
    let lifecycle = Lifecycle::new(client.clone(), config());
    let plan = PackingPlan::new(vec![gb_plan(1, 1, 1.0)], "ram-map".into());
    lifecycle.schedule_workers(plan.clone()).expect("first schedule succeeds");

    let err = lifecycle.schedule_workers(plan).unwrap_err();
    assert!(matches!(err, TamError::DuplicateAllocation { id: 1 }));
    assert_eq!(client.requests().len(), 1, "no extra request from the rejected call");
}

#[test]
fn restart_worker_on_unknown_id_is_rejected() {
    let client = FakeResourceManager::new();
    let lifecycle = Lifecycle::new(client, config());
    let err = lifecycle.restart_worker(42).unwrap_err();
    assert!(matches!(err, TamError::UnknownWorker { id: 42 }));
}

#[test]
fn kill_topology_cancels_tm_closes_allocations_and_ignores_later_events() {
    let client = FakeResourceManager::new();
    let lifecycle = Lifecycle::new(client.clone(), config());
    let plan = PackingPlan::new(
        vec![gb_plan(1, 1, 1.0), gb_plan(2, 2, 2.0)],
        "ram-map".into(),
    );
    lifecycle.schedule_workers(plan).unwrap();

    let alloc1 = Arc::new(FakeAllocation::new("a1", 1 << 30, 1));
    lifecycle.coordinator().on_allocation_granted(alloc1.clone());
    let ctx1 = FakeContext::new("1");
    lifecycle.coordinator().on_context_active(&ctx1);

    let alloc2 = Arc::new(FakeAllocation::new("a2", 2 << 30, 2));
    lifecycle.coordinator().on_allocation_granted(alloc2.clone());
    let ctx2 = FakeContext::new("2");
    lifecycle.coordinator().on_context_active(&ctx2);

    let tm_ran = Arc::new(AtomicU32::new(0));
    let ran_for_tm = Arc::clone(&tm_ran);
    lifecycle.launch_tm(move || AlwaysUpTm { ran: Arc::clone(&ran_for_tm) });
    std::thread::sleep(std::time::Duration::from_millis(50));
    assert!(tm_ran.load(Ordering::SeqCst) >= 1, "TM should have started");

    lifecycle.kill_topology();

    assert!(alloc1.is_closed());
    assert!(alloc2.is_closed());

    // Subsequent events are ignored: no further task submissions.
    lifecycle.coordinator().on_task_fault(&ctx1);
    lifecycle.coordinator().on_context_active(&ctx2);
    assert_eq!(ctx1.task_submission_count(), 1, "no resubmission after kill");
    assert_eq!(ctx2.task_submission_count(), 1, "no resubmission after kill");
}

#[test]
fn kill_topology_twice_is_idempotent() {
    let client = FakeResourceManager::new();
    let lifecycle = Lifecycle::new(client, config());
    let plan = PackingPlan::new(vec![gb_plan(1, 1, 1.0)], String::new());
    lifecycle.schedule_workers(plan).unwrap();

    let alloc = Arc::new(FakeAllocation::new("a1", 1 << 30, 1));
    lifecycle.coordinator().on_allocation_granted(alloc.clone());

    lifecycle.kill_topology();
    assert_eq!(alloc.close_count(), 1);

    lifecycle.kill_topology();
    assert_eq!(alloc.close_count(), 1, "second call closes nothing new");
}

#[test]
fn round_trip_schedule_run_kill_returns_to_empty_registry() {
    let client = FakeResourceManager::new();
    let lifecycle = Lifecycle::new(client.clone(), config());
    let plan = PackingPlan::new(
        vec![gb_plan(1, 1, 1.0), gb_plan(2, 2, 2.0)],
        "ram-map".into(),
    );
    lifecycle.schedule_workers(plan).unwrap();

    let alloc1 = Arc::new(FakeAllocation::new("a1", 1 << 30, 1));
    lifecycle.coordinator().on_allocation_granted(alloc1.clone());
    lifecycle.coordinator().on_context_active(&FakeContext::new("1"));

    let alloc2 = Arc::new(FakeAllocation::new("a2", 2 << 30, 2));
    lifecycle.coordinator().on_allocation_granted(alloc2.clone());
    lifecycle.coordinator().on_context_active(&FakeContext::new("2"));

    assert_eq!(lifecycle.coordinator().active_worker_count(), 2);

    lifecycle.kill_topology();
    assert_eq!(lifecycle.coordinator().active_worker_count(), 0);
    assert!(alloc1.is_closed());
    assert!(alloc2.is_closed());
}

#[test]
fn kill_workers_removes_from_planned_and_registry() {
    let client = FakeResourceManager::new();
    let lifecycle = Lifecycle::new(client, config());
    let plan = PackingPlan::new(vec![gb_plan(1, 1, 1.0)], String::new());
    lifecycle.schedule_workers(plan.clone()).unwrap();

    let alloc = Arc::new(FakeAllocation::new("a1", 1 << 30, 1));
    lifecycle.coordinator().on_allocation_granted(alloc.clone());

    lifecycle.kill_workers(plan.containers);

    assert!(alloc.is_closed());
    assert!(lifecycle.ids_awaiting_allocation().is_empty());
}
