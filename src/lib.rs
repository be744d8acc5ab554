//! Topology Application Master.
//!
//! A long-lived coordinator that runs inside a cluster-resource-manager
//! allocation and translates a declarative packing plan into live worker
//! processes: container procurement, fitting of logical workers to
//! physically allocated containers, launch, supervision, controlled
//! teardown, and lifecycle management of a singleton topology master.
//!
//! The embedding scheduler plugin owns one [`lifecycle::Lifecycle`] per
//! topology (explicit dependency injection — no process-wide singleton).
//!
//! ```no_run
//! use std::sync::Arc;
//! use tam::config::TamConfig;
//! use tam::lifecycle::Lifecycle;
//! use tam::resource_manager::{EvaluatorRequest, ResourceManagerClient};
//! use tam::error::TamResult;
//!
//! struct MyClient;
//! impl ResourceManagerClient for MyClient {
//!     fn submit(&self, _req: EvaluatorRequest) -> TamResult<()> { Ok(()) }
//! }
//!
//! let config = TamConfig::new("topo", "topo.jar", "pkg", "core", "role", "env", "cluster");
//! let lifecycle = Lifecycle::new(Arc::new(MyClient), config);
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod fitting;
pub mod lifecycle;
pub mod plan;
pub mod registry;
pub mod resource_manager;
pub mod testkit;
pub mod tm_supervisor;
pub mod worker;

pub use config::TamConfig;
pub use error::{TamError, TamResult};
pub use lifecycle::Lifecycle;
pub use plan::{ContainerPlan, PackingPlan, RequiredResource};
