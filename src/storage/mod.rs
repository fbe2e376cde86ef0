//! Report persistence.
//!
//! A [`ReportBackend`] stores whole reports and hands back an opaque string
//! identifier. Reports are stored in their raw form, so a report read back is
//! equal to the one saved.

mod json_dir;
mod memory;

pub use json_dir::JsonDirBackend;
pub use memory::MemoryBackend;

use crate::error::Result;
use crate::model::Report;

/// Storage for complete reports.
pub trait ReportBackend: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Store a report and return its identifier
    fn insert(&self, report: &Report) -> Result<String>;

    /// Fetch a report by identifier
    fn get(&self, id: &str) -> Result<Option<Report>>;

    /// Remove a report; returns whether it existed
    fn delete(&self, id: &str) -> Result<bool>;

    /// Identifiers of every stored report
    fn list(&self) -> Result<Vec<String>>;
}
