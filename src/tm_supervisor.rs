//! Topology master supervisor.
//!
//! Runs the topology master as a bounded-retry task on its own dedicated
//! single-thread runtime — the topology master shares the application
//! master's own container and is never requested through the resource
//! manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::TamError;

/// A topology master executor, run synchronously to completion inside the
/// supervisor's dedicated thread. A real implementation spawns and waits on
/// the topology master's OS process; this crate does not construct that
/// process itself.
pub trait TopologyMaster: Send + 'static {
    /// Runs to completion (or until cancelled), returning an error if the
    /// topology master process exited abnormally.
    fn run(&mut self) -> Result<(), TamError>;
}

struct Inner {
    handle: Option<JoinHandle<()>>,
}

/// Supervises a single [`TopologyMaster`] with up to `retry_budget` restarts
/// after it exits, on a dedicated current-thread runtime.
pub struct TmSupervisor {
    runtime: Runtime,
    killed: Arc<AtomicBool>,
    retry_budget: u32,
    inner: Mutex<Inner>,
}

impl TmSupervisor {
    pub fn new(retry_budget: u32) -> Self {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build TM supervisor runtime");
        Self {
            runtime,
            killed: Arc::new(AtomicBool::new(false)),
            retry_budget,
            inner: Mutex::new(Inner { handle: None }),
        }
    }

    /// Submits the retry loop: run the topology master; when it returns,
    /// check the kill flag; otherwise decrement the retry counter and
    /// relaunch while it remains positive.
    pub fn launch<F, T>(&self, mut make_tm: F)
    where
        F: FnMut() -> T + Send + 'static,
        T: TopologyMaster,
    {
        let killed = Arc::clone(&self.killed);
        let mut remaining = self.retry_budget;

        let handle = self.runtime.spawn(async move {
            loop {
                let mut tm = make_tm();
                let result = tokio::task::spawn_blocking(move || {
                    let outcome = tm.run();
                    (tm, outcome)
                })
                .await;

                let ran_ok = match result {
                    Ok((_, Ok(()))) => true,
                    Ok((_, Err(err))) => {
                        warn!(%err, "topology master task returned with an error");
                        false
                    }
                    Err(join_err) => {
                        if join_err.is_cancelled() {
                            info!("topology master task cancelled");
                            return;
                        }
                        error!(%join_err, "topology master task panicked");
                        false
                    }
                };
                let _ = ran_ok;

                if killed.load(Ordering::SeqCst) {
                    info!("topology killed; supervisor exiting");
                    return;
                }

                if remaining == 0 {
                    error!("topology master exhausted its retry budget; staying down");
                    return;
                }
                remaining -= 1;
                info!(remaining, "relaunching topology master");
            }
        });

        let mut inner = self.inner.lock().expect("tm supervisor mutex poisoned");
        if let Some(old) = inner.handle.replace(handle) {
            old.abort();
        }
    }

    /// Sets the kill flag, cancels the in-flight task, and shuts the
    /// executor down forcibly.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
        let handle = self.inner.lock().expect("tm supervisor mutex poisoned").handle.take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
    use std::time::Duration;

    use super::*;

    struct FlakyTm {
        attempts: Arc<AtomicU32>,
        fail_times: u32,
    }

    impl TopologyMaster for FlakyTm {
        fn run(&mut self) -> Result<(), TamError> {
            let attempt = self.attempts.fetch_add(1, AtomicOrdering::SeqCst);
            if attempt < self.fail_times {
                Err(TamError::TmFault)
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn retries_up_to_budget_then_stays_down() {
        let supervisor = TmSupervisor::new(3);
        let attempts = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&attempts);

        supervisor.launch(move || FlakyTm {
            attempts: Arc::clone(&counted),
            fail_times: 100,
        });

        std::thread::sleep(Duration::from_millis(200));
        // 1 initial attempt + 3 retries = 4 total, then it stays down.
        assert!(attempts.load(AtomicOrdering::SeqCst) >= 4);
    }

    #[test]
    fn kill_stops_further_retries() {
        let supervisor = TmSupervisor::new(3);
        let attempts = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&attempts);

        supervisor.launch(move || FlakyTm {
            attempts: Arc::clone(&counted),
            fail_times: 100,
        });
        std::thread::sleep(Duration::from_millis(20));
        supervisor.kill();
        assert!(supervisor.is_killed());

        let seen_after_kill = attempts.load(AtomicOrdering::SeqCst);
        std::thread::sleep(Duration::from_millis(100));
        // No further progress once aborted.
        assert_eq!(attempts.load(AtomicOrdering::SeqCst), seen_after_kill);
    }
}
