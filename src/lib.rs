//! Provisioning and lifecycle engine for multi-environment Drupal hosting.
//!
//! Every project exists simultaneously in three deployment environments
//! (`dev`, `test`, `live`), each with its own virtual host, database, solr
//! index, cron job, and filesystem permission profile. This crate keeps
//! those resources consistent:
//!
//! - **Resource locator** - pure derivation of every path/identifier for a
//!   `(project, environment)` pair
//! - **Lifecycle orchestrator** - drives vhost, database, solr, drush, and
//!   cron provisioning across the environment subset a handler acts on
//! - **Permission reconciliation** - the handler/environment/installed
//!   decision table for ownership and modes, computed as a plan and then
//!   applied
//! - **Backup coordinator** - per-environment snapshots, database dumps,
//!   and a repository mirror bundled into one archive
//!
//! # Architecture
//!
//! ```text
//! PlatformProfile (immutable, detected once)
//!     │
//!     ├── locator ──────── ResourceDescriptor (pure, per call)
//!     │
//!     ├── provision::Orchestrator
//!     │       ├── vhost / database / settings / solr / drush / cron
//!     │       └── Emitter + Cmd collaborators
//!     │
//!     ├── permissions ──── PermissionPlan → apply
//!     │       └── InstallProbe collaborator
//!     │
//!     └── backup::BackupJob ── staging → archive → drop location
//! ```
//!
//! Execution is single-threaded and sequential: one environment at a time,
//! one step at a time, in registry order. Concurrent operations on the
//! same project are refused via the project lock.

pub mod backup;
pub mod environment;
pub mod error;
pub mod filesystem;
pub mod handler;
pub mod locator;
pub mod lock;
pub mod permissions;
pub mod platform;
pub mod preflight;
pub mod process;
pub mod provision;
pub mod template;

pub use backup::BackupJob;
pub use environment::Environment;
pub use error::Error;
pub use handler::Handler;
pub use locator::{locate, ResourceDescriptor};
pub use permissions::{DrushProbe, InstallProbe, PermissionOp, PermissionPlan};
pub use platform::{Distro, PlatformProfile};
pub use provision::{Orchestrator, ProvisionOptions};
pub use template::{DiskTemplates, Emitter};
