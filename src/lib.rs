//! **Structured network-scan results and a hierarchical diff between scans.**
//!
//! `scan-diff` models one scan run as a three-level tree: a [`Report`] owns
//! [`Host`]s, and each host owns the [`Service`]s (ports) probed on it. Every
//! host and service has a stable identity key, so two scans of the same
//! network can be compared to answer "what changed?": which hosts appeared or
//! vanished, which ports opened or closed, which banners changed.
//!
//! ## Core Concepts & Modules
//!
//! - **[`model`]**: the entity tree, identity keys ([`HostId`], [`ServiceId`])
//!   and content hashing. Entities are immutable once built; builders consume
//!   `self`.
//! - **[`diff`]**: per-level comparison ([`EntityDiff`]) and the recursive
//!   [`DiffEngine`] producing a [`ScanDelta`].
//! - **[`storage`]**: the [`ReportBackend`] trait with in-memory and JSON
//!   directory backends.
//! - **[`config`]**: [`EngineConfig`], loaded from YAML.
//!
//! ## Diffing Two Scans
//!
//! ```no_run
//! use scan_diff::{DiffEngine, Report};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let old = Report::from_json(&std::fs::read_to_string("monday.json")?)?;
//!     let new = Report::from_json(&std::fs::read_to_string("tuesday.json")?)?;
//!
//!     match DiffEngine::new().diff_reports(&old, &new)?.into_compared() {
//!         Some(delta) => {
//!             for host in delta.report.added_hosts() {
//!                 println!("+ {host}");
//!             }
//!             for (host, detail) in &delta.hosts {
//!                 for service in detail.diff.added_services() {
//!                     println!("  {host}: opened {service}");
//!                 }
//!             }
//!         }
//!         None => println!("one of the reports is incomplete"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Comparing Single Entities
//!
//! ```
//! use scan_diff::{PortState, Service};
//!
//! let before = Service::new(22, "tcp").with_state(PortState::new("open"));
//! let after = Service::new(22, "tcp").with_state(PortState::new("filtered"));
//!
//! let diff = before.diff(&after);
//! assert_eq!(diff.changed_fields().collect::<Vec<_>>(), vec!["state"]);
//! assert_eq!(before.changed(&after), 1);
//! ```

#![warn(clippy::unwrap_used)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    // `old`/`new` pairs are clear in context
    clippy::similar_names
)]

pub mod config;
pub mod diff;
pub mod error;
pub mod model;
pub mod storage;

pub use config::{ConfigError, EngineConfig, Validatable};
pub use diff::{
    DeltaSummary, DiffEngine, DiffKey, DiffOutcome, Diffable, EntityDiff, HostDelta, ScanDelta,
    SkipReason,
};
pub use error::{ErrorContext, OptionContext, Result, ScanDiffError};
pub use model::{
    ContentHash, Host, HostId, Identified, PortState, Report, ReportSection, Service, ServiceId,
};
pub use storage::{JsonDirBackend, MemoryBackend, ReportBackend};
