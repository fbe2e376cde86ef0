//! Diff result structures.

use super::key::DiffKey;
use crate::model::{HostId, ReportSection, ServiceId};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Classified keys from comparing two entities of the same kind.
///
/// Sets hold identity keys and field names, not entities: callers needing the
/// underlying host or service resolve the key against the original trees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[must_use]
pub struct EntityDiff {
    pub(crate) added: BTreeSet<DiffKey>,
    pub(crate) removed: BTreeSet<DiffKey>,
    pub(crate) changed: BTreeSet<DiffKey>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub(crate) unchanged: BTreeSet<DiffKey>,
}

impl EntityDiff {
    /// Create an empty diff
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys present only in the new entity
    #[must_use]
    pub const fn added(&self) -> &BTreeSet<DiffKey> {
        &self.added
    }

    /// Keys present only in the old entity
    #[must_use]
    pub const fn removed(&self) -> &BTreeSet<DiffKey> {
        &self.removed
    }

    /// Keys present in both with a different value
    #[must_use]
    pub const fn changed(&self) -> &BTreeSet<DiffKey> {
        &self.changed
    }

    /// Keys present in both with the same value
    #[must_use]
    pub const fn unchanged(&self) -> &BTreeSet<DiffKey> {
        &self.unchanged
    }

    /// Number of changed keys; zero for equal entities of the same identity
    #[must_use]
    pub fn changed_count(&self) -> usize {
        self.changed.len()
    }

    /// Any key added, removed or changed
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty())
    }

    /// Total number of added, removed and changed keys
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }

    /// Drop the unchanged set
    pub fn clear_unchanged(&mut self) {
        self.unchanged.clear();
    }

    pub fn added_hosts(&self) -> impl Iterator<Item = &HostId> {
        self.added.iter().filter_map(DiffKey::as_host)
    }

    pub fn removed_hosts(&self) -> impl Iterator<Item = &HostId> {
        self.removed.iter().filter_map(DiffKey::as_host)
    }

    pub fn changed_hosts(&self) -> impl Iterator<Item = &HostId> {
        self.changed.iter().filter_map(DiffKey::as_host)
    }

    pub fn added_services(&self) -> impl Iterator<Item = &ServiceId> {
        self.added.iter().filter_map(DiffKey::as_service)
    }

    pub fn removed_services(&self) -> impl Iterator<Item = &ServiceId> {
        self.removed.iter().filter_map(DiffKey::as_service)
    }

    pub fn changed_services(&self) -> impl Iterator<Item = &ServiceId> {
        self.changed.iter().filter_map(DiffKey::as_service)
    }

    /// Names of changed scalar fields
    pub fn changed_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.changed.iter().filter_map(DiffKey::as_field)
    }
}

/// Why a comparison was not performed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipReason {
    /// Sections missing from the old report
    pub old_missing: Vec<ReportSection>,
    /// Sections missing from the new report
    pub new_missing: Vec<ReportSection>,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |sections: &[ReportSection]| {
            sections
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "inconsistent report (old missing: [{}], new missing: [{}])",
            list(&self.old_missing),
            list(&self.new_missing)
        )
    }
}

/// Result of a guarded comparison: either performed, or skipped with a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "result", rename_all = "lowercase")]
#[must_use]
pub enum DiffOutcome<T> {
    Compared(T),
    Skipped(SkipReason),
}

impl<T> DiffOutcome<T> {
    #[must_use]
    pub const fn is_compared(&self) -> bool {
        matches!(self, Self::Compared(_))
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    #[must_use]
    pub const fn as_compared(&self) -> Option<&T> {
        match self {
            Self::Compared(v) => Some(v),
            Self::Skipped(_) => None,
        }
    }

    #[must_use]
    pub fn into_compared(self) -> Option<T> {
        match self {
            Self::Compared(v) => Some(v),
            Self::Skipped(_) => None,
        }
    }

    #[must_use]
    pub const fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Self::Compared(_) => None,
            Self::Skipped(reason) => Some(reason),
        }
    }

    /// Transform the compared value
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> DiffOutcome<U> {
        match self {
            Self::Compared(v) => DiffOutcome::Compared(f(v)),
            Self::Skipped(reason) => DiffOutcome::Skipped(reason),
        }
    }
}

impl<T: Default> DiffOutcome<T> {
    /// Collapse a skipped comparison into an empty result
    #[must_use]
    pub fn into_diff_or_empty(self) -> T {
        self.into_compared().unwrap_or_default()
    }
}
