//! Fake resource-manager collaborators for exercising the coordinator and
//! lifecycle controller without a real cluster client.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::TamResult;
use crate::resource_manager::{
    AllocationHandle, ContextHandle, EvaluatorRequest, ResourceManagerClient, TaskConfig,
};

/// Records every request submitted to it; never actually grants anything —
/// tests drive grants explicitly via [`FakeAllocation`].
#[derive(Default)]
pub struct FakeResourceManager {
    pub requests: Mutex<Vec<EvaluatorRequest>>,
}

impl FakeResourceManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<EvaluatorRequest> {
        self.requests.lock().expect("poisoned").clone()
    }
}

impl ResourceManagerClient for FakeResourceManager {
    fn submit(&self, request: EvaluatorRequest) -> TamResult<()> {
        self.requests.lock().expect("poisoned").push(request);
        Ok(())
    }
}

/// A fake granted container. `submitted_context` records the one context
/// config submitted to it, if any; `closed` records whether `close()` ran.
pub struct FakeAllocation {
    pub id: String,
    pub mem: u64,
    pub cores: u32,
    pub closed: AtomicBool,
    pub close_count: AtomicU32,
    pub submitted_context: Mutex<Option<TaskConfig>>,
}

impl FakeAllocation {
    pub fn new(id: impl Into<String>, mem: u64, cores: u32) -> Self {
        Self {
            id: id.into(),
            mem,
            cores,
            closed: AtomicBool::new(false),
            close_count: AtomicU32::new(0),
            submitted_context: Mutex::new(None),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> u32 {
        self.close_count.load(Ordering::SeqCst)
    }
}

impl AllocationHandle for FakeAllocation {
    fn allocation_id(&self) -> &str {
        &self.id
    }

    fn granted_mem(&self) -> u64 {
        self.mem
    }

    fn granted_cores(&self) -> u32 {
        self.cores
    }

    fn submit_context(&self, config: TaskConfig) -> TamResult<()> {
        *self.submitted_context.lock().expect("poisoned") = Some(config);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// A fake active context. `task_submissions` counts how many times
/// `submit_task` was called, for asserting resubmission on task faults.
pub struct FakeContext {
    pub id: String,
    pub task_submissions: AtomicU32,
}

impl FakeContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_submissions: AtomicU32::new(0),
        }
    }

    pub fn task_submission_count(&self) -> u32 {
        self.task_submissions.load(Ordering::SeqCst)
    }
}

impl ContextHandle for FakeContext {
    fn context_id(&self) -> &str {
        &self.id
    }

    fn submit_task(&self, _config: TaskConfig) -> TamResult<()> {
        self.task_submissions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
