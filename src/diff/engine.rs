//! Recursive diff engine over report, host and service trees.

use super::result::{DiffOutcome, EntityDiff, SkipReason};
use super::traits::Diffable;
use crate::config::EngineConfig;
use crate::error::{DiffErrorKind, ErrorContext, Result, ScanDiffError};
use crate::model::{Host, HostId, Identified, Report, Service, ServiceId};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;

/// Diff of one host present in both reports, with per-service detail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostDelta {
    /// Host-level classification: services by identity, plus host fields
    pub diff: EntityDiff,
    /// Field-level diff of every service whose digest changed
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub services: IndexMap<ServiceId, EntityDiff>,
}

impl HostDelta {
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.diff.has_changes()
    }
}

/// Aggregate counts over a whole report comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeltaSummary {
    pub hosts_added: usize,
    pub hosts_removed: usize,
    pub hosts_changed: usize,
    pub hosts_unchanged: usize,
    pub services_added: usize,
    pub services_removed: usize,
    pub services_changed: usize,
    /// Report-level fields (host counters) that changed
    pub fields_changed: usize,
}

impl DeltaSummary {
    /// Total number of host and service level changes
    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.hosts_added
            + self.hosts_removed
            + self.hosts_changed
            + self.services_added
            + self.services_removed
            + self.services_changed
            + self.fields_changed
    }
}

/// Full result of comparing two reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[must_use]
pub struct ScanDelta {
    /// Report-level classification: hosts by address, plus counters
    pub report: EntityDiff,
    /// Per-host detail for every host whose digest changed
    pub hosts: IndexMap<HostId, HostDelta>,
    pub summary: DeltaSummary,
}

impl ScanDelta {
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.report.has_changes()
    }

    /// Detail for one changed host
    #[must_use]
    pub fn host(&self, id: &HostId) -> Option<&HostDelta> {
        self.hosts.get(id)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }
}

/// Diff engine for scan reports.
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    config: EngineConfig,
}

impl DiffEngine {
    /// Create a new diff engine with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a diff engine with the given configuration
    #[must_use]
    pub const fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Include unchanged keys in results
    #[must_use]
    pub const fn include_unchanged(mut self, include: bool) -> Self {
        self.config.include_unchanged = include;
        self
    }

    /// Descend into changed hosts and services
    #[must_use]
    pub const fn descend(mut self, descend: bool) -> Self {
        self.config.descend = descend;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compare two services of the same identity.
    pub fn diff_services(&self, old: &Service, new: &Service) -> Result<EntityDiff> {
        ensure_same_identity("service", old, new)?;
        Ok(self.finish(old.structural_diff(new)))
    }

    /// Compare two hosts of the same address, descending into changed services.
    pub fn diff_hosts(&self, old: &Host, new: &Host) -> Result<HostDelta> {
        ensure_same_identity("host", old, new)?;
        self.host_delta(old, new)
    }

    /// Compare two reports.
    ///
    /// Reports missing any section are not compared; the outcome names the
    /// missing sections instead.
    pub fn diff_reports(&self, old: &Report, new: &Report) -> Result<DiffOutcome<ScanDelta>> {
        if !(old.is_consistent() && new.is_consistent()) {
            let reason = SkipReason {
                old_missing: old.missing_sections(),
                new_missing: new.missing_sections(),
            };
            tracing::warn!("Skipping report diff: {reason}");
            return Ok(DiffOutcome::Skipped(reason));
        }

        let mut report = old.structural_diff(new);
        tracing::debug!(
            old_hosts = old.hosts().len(),
            new_hosts = new.hosts().len(),
            changed = report.changed().len(),
            "Report-level diff computed"
        );

        let hosts = if self.config.descend {
            self.changed_host_deltas(old, new, &report)?
        } else {
            IndexMap::new()
        };

        let summary = summarize(&report, &hosts);
        if !self.config.include_unchanged {
            report.clear_unchanged();
        }

        tracing::info!(
            hosts_added = summary.hosts_added,
            hosts_removed = summary.hosts_removed,
            hosts_changed = summary.hosts_changed,
            "Report diff complete"
        );

        Ok(DiffOutcome::Compared(ScanDelta {
            report,
            hosts,
            summary,
        }))
    }

    fn changed_host_deltas(
        &self,
        old: &Report,
        new: &Report,
        report: &EntityDiff,
    ) -> Result<IndexMap<HostId, HostDelta>> {
        let changed: Vec<&HostId> = report.changed_hosts().collect();

        let pair = |id: &HostId| -> Result<Option<(HostId, HostDelta)>> {
            match (
                old.get_host_by_id(id).context("old scan")?,
                new.get_host_by_id(id).context("new scan")?,
            ) {
                (Some(old_host), Some(new_host)) => {
                    let delta = self
                        .host_delta(old_host, new_host)
                        .with_context(|| format!("host {id}"))?;
                    Ok(Some((id.clone(), delta)))
                }
                _ => Ok(None),
            }
        };

        let deltas: Vec<Option<(HostId, HostDelta)>> =
            if changed.len() >= self.config.parallel_threshold {
                tracing::debug!(hosts = changed.len(), "Diffing changed hosts in parallel");
                changed.par_iter().map(|id| pair(id)).collect::<Result<_>>()?
            } else {
                changed.iter().map(|id| pair(id)).collect::<Result<_>>()?
            };

        Ok(deltas.into_iter().flatten().collect())
    }

    fn host_delta(&self, old: &Host, new: &Host) -> Result<HostDelta> {
        let diff = old.structural_diff(new);
        let mut services = IndexMap::new();

        if self.config.descend {
            for id in diff.changed_services() {
                let pair = (
                    old.get_service_by_id(id).context("old scan")?,
                    new.get_service_by_id(id).context("new scan")?,
                );
                if let (Some(old_svc), Some(new_svc)) = pair {
                    services.insert(id.clone(), self.finish(old_svc.structural_diff(new_svc)));
                }
            }
        }

        Ok(HostDelta {
            diff: self.finish(diff),
            services,
        })
    }

    fn finish(&self, mut diff: EntityDiff) -> EntityDiff {
        if !self.config.include_unchanged {
            diff.clear_unchanged();
        }
        diff
    }
}

fn ensure_same_identity<T: Identified>(kind: &'static str, old: &T, new: &T) -> Result<()> {
    let (old_id, new_id) = (old.id(), new.id());
    if old_id == new_id {
        Ok(())
    } else {
        Err(ScanDiffError::diff(
            format!("comparing {kind}s"),
            DiffErrorKind::IdentityMismatch {
                kind,
                old: old_id.to_string(),
                new: new_id.to_string(),
            },
        ))
    }
}

fn summarize(report: &EntityDiff, hosts: &IndexMap<HostId, HostDelta>) -> DeltaSummary {
    let mut summary = DeltaSummary {
        hosts_added: report.added_hosts().count(),
        hosts_removed: report.removed_hosts().count(),
        hosts_changed: report.changed_hosts().count(),
        hosts_unchanged: report.unchanged().iter().filter(|k| k.as_host().is_some()).count(),
        fields_changed: report.changed_fields().count(),
        ..DeltaSummary::default()
    };

    for delta in hosts.values() {
        summary.services_added += delta.diff.added_services().count();
        summary.services_removed += delta.diff.removed_services().count();
        summary.services_changed += delta.diff.changed_services().count();
    }

    summary
}
