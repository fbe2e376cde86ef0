//! Full scan run: metadata, hosts and run statistics.

use super::host::{parse_unix_time, Host};
use super::identity::{unordered_eq, ContentHash, FieldHasher, HostId, Identified};
use super::lenient;
use crate::diff::{
    ComparisonMap, DiffKey, DiffOutcome, DiffValue, Diffable, EntityDiff, SkipReason,
};
use crate::error::{LookupErrorKind, PersistenceErrorKind, Result, ScanDiffError};
use crate::storage::ReportBackend;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The four top-level sections a consistent report carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSection {
    #[serde(rename = "nmaprun")]
    RunInfo,
    ScanInfo,
    Hosts,
    RunStats,
}

impl ReportSection {
    pub const ALL: [Self; 4] = [Self::RunInfo, Self::ScanInfo, Self::Hosts, Self::RunStats];

    /// Key of this section in the raw form
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::RunInfo => "nmaprun",
            Self::ScanInfo => "scaninfo",
            Self::Hosts => "hosts",
            Self::RunStats => "runstats",
        }
    }
}

impl fmt::Display for ReportSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Scanner invocation metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunInfo {
    #[serde(deserialize_with = "lenient::text")]
    pub scanner: String,
    /// Full command line
    #[serde(deserialize_with = "lenient::text")]
    pub args: String,
    /// Start time as a unix timestamp string
    #[serde(deserialize_with = "lenient::text")]
    pub start: String,
    #[serde(deserialize_with = "lenient::text")]
    pub startstr: String,
    #[serde(deserialize_with = "lenient::text")]
    pub version: String,
    #[serde(flatten)]
    pub extras: IndexMap<String, Value>,
}

/// Scan type metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanInfo {
    /// `syn`, `connect`, `udp`, ...
    #[serde(rename = "type", deserialize_with = "lenient::text")]
    pub scan_type: String,
    #[serde(deserialize_with = "lenient::text")]
    pub protocol: String,
    #[serde(deserialize_with = "lenient::text")]
    pub numservices: String,
    #[serde(deserialize_with = "lenient::text")]
    pub services: String,
}

/// Completion record of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinishedStats {
    #[serde(deserialize_with = "lenient::text")]
    pub time: String,
    #[serde(deserialize_with = "lenient::text")]
    pub timestr: String,
    #[serde(deserialize_with = "lenient::text")]
    pub elapsed: String,
    #[serde(deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(deserialize_with = "lenient::text")]
    pub exit: String,
}

/// Host up/down/total counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCounts {
    #[serde(default, deserialize_with = "lenient::count")]
    pub up: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub down: u32,
    #[serde(default, deserialize_with = "lenient::count")]
    pub total: u32,
}

/// Run statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunStats {
    #[serde(deserialize_with = "lenient::or_default")]
    pub finished: FinishedStats,
    #[serde(
        deserialize_with = "lenient::or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub hosts: Option<HostCounts>,
}

/// Raw nested form of a report: the four sections, each possibly absent.
///
/// This is what the report loader produces and what
/// [`Report::raw_data`] hands back for persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawReport {
    #[serde(default, rename = "nmaprun")]
    pub run_info: Option<RunInfo>,
    #[serde(default, rename = "scaninfo")]
    pub scan_info: Option<ScanInfo>,
    #[serde(default)]
    pub hosts: Option<Vec<Host>>,
    #[serde(default, rename = "runstats")]
    pub run_stats: Option<RunStats>,
}

/// One complete scan run.
///
/// A report has no identity of its own: two reports are only ever compared
/// explicitly through [`Report::diff`]. A report missing any of its four
/// sections is inconsistent; it can still be read (accessors default) but is
/// never diffed or persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "RawReport", into = "RawReport")]
pub struct Report {
    run_info: Option<RunInfo>,
    scan_info: Option<ScanInfo>,
    hosts: Option<Vec<Host>>,
    run_stats: Option<RunStats>,
}

impl Report {
    /// Create an empty report with every section absent
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstruct a report from its raw form
    #[must_use]
    pub fn from_raw(raw: RawReport) -> Self {
        Self {
            run_info: raw.run_info,
            scan_info: raw.scan_info,
            hosts: raw.hosts,
            run_stats: raw.run_stats,
        }
    }

    /// Get the raw form of this report
    #[must_use]
    pub fn raw_data(&self) -> RawReport {
        RawReport::from(self.clone())
    }

    /// Parse a report from the JSON encoding of its raw form
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawReport = serde_json::from_str(json)?;
        Ok(Self::from_raw(raw))
    }

    /// Encode the raw form as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.raw_data())?)
    }

    #[must_use]
    pub fn with_run_info(mut self, run_info: RunInfo) -> Self {
        self.run_info = Some(run_info);
        self
    }

    #[must_use]
    pub fn with_scan_info(mut self, scan_info: ScanInfo) -> Self {
        self.scan_info = Some(scan_info);
        self
    }

    /// Set the host list (possibly empty, which still counts as present)
    #[must_use]
    pub fn with_hosts(mut self, hosts: impl IntoIterator<Item = Host>) -> Self {
        self.hosts = Some(hosts.into_iter().collect());
        self
    }

    /// Append one host, creating the host list if absent
    #[must_use]
    pub fn with_host(mut self, host: Host) -> Self {
        self.hosts.get_or_insert_with(Vec::new).push(host);
        self
    }

    #[must_use]
    pub fn with_run_stats(mut self, run_stats: RunStats) -> Self {
        self.run_stats = Some(run_stats);
        self
    }

    /// Sections this report does not carry
    #[must_use]
    pub fn missing_sections(&self) -> Vec<ReportSection> {
        ReportSection::ALL
            .into_iter()
            .filter(|section| !self.has_section(*section))
            .collect()
    }

    /// Whether the given section is present
    #[must_use]
    pub const fn has_section(&self, section: ReportSection) -> bool {
        match section {
            ReportSection::RunInfo => self.run_info.is_some(),
            ReportSection::ScanInfo => self.scan_info.is_some(),
            ReportSection::Hosts => self.hosts.is_some(),
            ReportSection::RunStats => self.run_stats.is_some(),
        }
    }

    /// Whether all four sections are present
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        ReportSection::ALL.into_iter().all(|s| self.has_section(s))
    }

    #[must_use]
    pub const fn run_info(&self) -> Option<&RunInfo> {
        self.run_info.as_ref()
    }

    #[must_use]
    pub const fn scan_info(&self) -> Option<&ScanInfo> {
        self.scan_info.as_ref()
    }

    #[must_use]
    pub const fn run_stats(&self) -> Option<&RunStats> {
        self.run_stats.as_ref()
    }

    /// Start time as a unix timestamp string
    #[must_use]
    pub fn started(&self) -> &str {
        self.run_info.as_ref().map_or("", |r| r.start.as_str())
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        parse_unix_time(self.started())
    }

    #[must_use]
    pub fn commandline(&self) -> &str {
        self.run_info.as_ref().map_or("", |r| r.args.as_str())
    }

    #[must_use]
    pub fn version(&self) -> &str {
        self.run_info.as_ref().map_or("", |r| r.version.as_str())
    }

    #[must_use]
    pub fn scanner(&self) -> &str {
        self.run_info.as_ref().map_or("", |r| r.scanner.as_str())
    }

    #[must_use]
    pub fn scan_type(&self) -> &str {
        self.scan_info.as_ref().map_or("", |s| s.scan_type.as_str())
    }

    /// Hosts, empty when the host section is absent
    #[must_use]
    pub fn hosts(&self) -> &[Host] {
        self.hosts.as_deref().unwrap_or_default()
    }

    /// Finish time as a unix timestamp string
    #[must_use]
    pub fn endtime(&self) -> &str {
        self.finished().map_or("", |f| f.time.as_str())
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        parse_unix_time(self.endtime())
    }

    #[must_use]
    pub fn summary(&self) -> &str {
        self.finished().map_or("", |f| f.summary.as_str())
    }

    /// Elapsed seconds as reported
    #[must_use]
    pub fn elapsed(&self) -> &str {
        self.finished().map_or("", |f| f.elapsed.as_str())
    }

    #[must_use]
    pub fn hosts_up(&self) -> u32 {
        self.host_counts().map_or(0, |c| c.up)
    }

    #[must_use]
    pub fn hosts_down(&self) -> u32 {
        self.host_counts().map_or(0, |c| c.down)
    }

    #[must_use]
    pub fn hosts_total(&self) -> u32 {
        self.host_counts().map_or(0, |c| c.total)
    }

    fn finished(&self) -> Option<&FinishedStats> {
        self.run_stats.as_ref().map(|r| &r.finished)
    }

    fn host_counts(&self) -> Option<&HostCounts> {
        self.run_stats.as_ref().and_then(|r| r.hosts.as_ref())
    }

    /// Look up a host by address.
    pub fn get_host(&self, address: &str) -> Result<Option<&Host>> {
        self.get_host_by_id(&HostId::new(address))
    }

    /// Look up a host by identity.
    ///
    /// Fails with a lookup error when more than one host carries `id`.
    pub fn get_host_by_id(&self, id: &HostId) -> Result<Option<&Host>> {
        let mut matches = self.hosts().iter().filter(|h| h.address() == id.as_str());
        let first = matches.next();
        let extra = matches.count();
        if extra > 0 {
            return Err(ScanDiffError::lookup(
                "host lookup",
                LookupErrorKind::DuplicateHost {
                    address: id.to_string(),
                    count: extra + 1,
                },
            ));
        }
        Ok(first)
    }

    /// Diff against another report.
    ///
    /// Both reports must be consistent; otherwise the comparison is skipped
    /// and the outcome names the missing sections of each side.
    pub fn diff(&self, other: &Self) -> DiffOutcome<EntityDiff> {
        if self.is_consistent() && other.is_consistent() {
            DiffOutcome::Compared(self.structural_diff(other))
        } else {
            DiffOutcome::Skipped(SkipReason {
                old_missing: self.missing_sections(),
                new_missing: other.missing_sections(),
            })
        }
    }

    /// Number of changed entries against `other`, 0 when the comparison is skipped
    #[must_use]
    pub fn changed(&self, other: &Self) -> usize {
        self.diff(other)
            .as_compared()
            .map_or(0, EntityDiff::changed_count)
    }

    /// Hand this report to a storage backend and return its identifier.
    pub fn save(&self, backend: &dyn ReportBackend) -> Result<String> {
        let missing = self.missing_sections();
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
            return Err(ScanDiffError::persistence(
                format!("saving to {}", backend.name()),
                PersistenceErrorKind::InconsistentReport(names.join(", ")),
            ));
        }
        let id = backend.insert(self)?;
        tracing::info!(backend = backend.name(), id = %id, hosts = self.hosts().len(), "Report saved");
        Ok(id)
    }

    fn counter_value(&self, pick: impl Fn(&HostCounts) -> u32) -> DiffValue {
        self.host_counts()
            .map_or(DiffValue::Absent, |c| DiffValue::text(pick(c).to_string()))
    }
}

impl From<RawReport> for Report {
    fn from(raw: RawReport) -> Self {
        Self::from_raw(raw)
    }
}

impl From<Report> for RawReport {
    fn from(report: Report) -> Self {
        Self {
            run_info: report.run_info,
            scan_info: report.scan_info,
            hosts: report.hosts,
            run_stats: report.run_stats,
        }
    }
}

impl ContentHash for Report {
    fn content_hash(&self) -> u64 {
        FieldHasher::new("report")
            .unordered("hosts", self.hosts().iter().map(ContentHash::content_hash))
            .field("hosts_up", &self.hosts_up().to_string())
            .field("hosts_down", &self.hosts_down().to_string())
            .field("hosts_total", &self.hosts_total().to_string())
            .finish()
    }
}

impl Diffable for Report {
    fn comparison_map(&self) -> ComparisonMap {
        let mut map: ComparisonMap = self
            .hosts()
            .iter()
            .map(|h| (DiffKey::Host(h.id()), DiffValue::Digest(h.content_hash())))
            .collect();
        map.insert(DiffKey::Field("hosts_up"), self.counter_value(|c| c.up));
        map.insert(DiffKey::Field("hosts_down"), self.counter_value(|c| c.down));
        map.insert(DiffKey::Field("hosts_total"), self.counter_value(|c| c.total));
        map
    }
}

/// Same hosts (compared one by one under their addresses) and the same host
/// counters. Run metadata is not part of a report's structure.
impl PartialEq for Report {
    fn eq(&self, other: &Self) -> bool {
        self.host_counts() == other.host_counts() && unordered_eq(self.hosts(), other.hosts())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Report: [{} {} - {} hosts, {} up]",
            self.scanner(),
            self.scan_type(),
            self.hosts().len(),
            self.hosts_up()
        )
    }
}
