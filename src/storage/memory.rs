use super::ReportBackend;
use crate::error::{Result, ScanDiffError};
use crate::model::{RawReport, Report};
use indexmap::IndexMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

const NAME: &str = "memory";

/// In-process backend with sequential identifiers.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    reports: RwLock<IndexMap<String, RawReport>>,
    next_id: AtomicU64,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored reports
    pub fn len(&self) -> Result<usize> {
        Ok(self.reports.read().map_err(|_| poisoned())?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn poisoned() -> ScanDiffError {
    ScanDiffError::backend(NAME, "lock poisoned")
}

impl ReportBackend for MemoryBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn insert(&self, report: &Report) -> Result<String> {
        let id = (self.next_id.fetch_add(1, Ordering::Relaxed) + 1).to_string();
        self.reports
            .write()
            .map_err(|_| poisoned())?
            .insert(id.clone(), report.raw_data());
        tracing::debug!(id = %id, "Stored report in memory");
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<Report>> {
        let reports = self.reports.read().map_err(|_| poisoned())?;
        Ok(reports.get(id).cloned().map(Report::from_raw))
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut reports = self.reports.write().map_err(|_| poisoned())?;
        Ok(reports.shift_remove(id).is_some())
    }

    fn list(&self) -> Result<Vec<String>> {
        let reports = self.reports.read().map_err(|_| poisoned())?;
        Ok(reports.keys().cloned().collect())
    }
}
