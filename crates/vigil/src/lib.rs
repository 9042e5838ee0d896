//! # vigil
//!
//! Declarative process supervisor engine.
//!
//! A directory of per-process TOML files describes what to run; the engine
//! spawns each command in its own process group, captures merged
//! stdout/stderr through a non-blocking pull-based pump, and keeps a
//! registry of named handles with replace-on-restart semantics. A
//! background sampler publishes an aggregate health snapshot.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use vigil::{Supervisor, SupervisorConfig};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sup = Supervisor::new(SupervisorConfig {
//!     config_dir: "/tmp/vigil/conf".into(),
//!     legacy_config: None,
//!     scrollback: None,
//!     sample_period: Duration::from_secs(3),
//! });
//!
//! sup.reload().await;
//! let _sampler = sup.spawn_sampler();
//! println!("{:?}", sup.status());
//! # }
//! ```
//!
//! Commands are trusted local configuration: they run under `sh -c` with
//! the supervisor's full privileges, no sandboxing.

pub mod config;
pub mod error;
pub mod handle;
pub mod reconcile;
pub mod registry;
pub mod status;
pub mod supervisor;
pub mod types;

pub use config::ConfigStore;
pub use error::SupervisorError;
pub use handle::ProcessHandle;
pub use registry::Registry;
pub use status::{Bucket, StatusFeed};
pub use supervisor::{Supervisor, SupervisorConfig};
pub use types::{ProcSummary, ProcState, ProcessSpec, StatusSnapshot, PENDING_EXIT};
