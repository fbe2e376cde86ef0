//! Scanned endpoint and its services.

use super::identity::{unordered_eq, ContentHash, FieldHasher, HostId, Identified, ServiceId};
use super::lenient;
use super::service::Service;
use crate::diff::{ComparisonMap, DiffKey, DiffValue, Diffable, EntityDiff};
use crate::error::{LookupErrorKind, OptionContext, Result, ScanDiffError};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use xxhash_rust::xxh3::xxh3_64;

/// Network address of a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub addr: String,
    /// `ipv4`, `ipv6` or `mac`
    #[serde(default = "default_addrtype")]
    pub addrtype: String,
}

fn default_addrtype() -> String {
    "ipv4".to_string()
}

impl Address {
    /// Create an address, inferring `ipv6` for literals containing a colon
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        let addrtype = if addr.contains(':') { "ipv6" } else { "ipv4" };
        Self {
            addr,
            addrtype: addrtype.to_string(),
        }
    }
}

/// Host reachability status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStatus {
    #[serde(
        default,
        deserialize_with = "lenient::opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub state: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub reason: Option<String>,
}

impl HostStatus {
    pub fn new(state: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
            reason: Some(reason.into()),
        }
    }
}

/// Status given as a record or as a bare state; anything else is unknown.
fn de_status<'de, D>(deserializer: D) -> std::result::Result<HostStatus, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(state) => Ok(HostStatus {
            state: Some(state),
            reason: None,
        }),
        other => Ok(serde_json::from_value(other).unwrap_or_default()),
    }
}

/// Optional host attributes read defensively through [`Host`] accessors.
///
/// This is the complete set of extras with a typed view. Any other key in
/// [`HostExtras`] is carried along untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtraField {
    OsClass,
    OsMatch,
    OsFingerprint,
    PortsUsed,
    TcpSequence,
    IpIdSequence,
    Uptime,
    Distance,
}

impl ExtraField {
    /// Every field with a typed accessor
    pub const ALL: [Self; 8] = [
        Self::OsClass,
        Self::OsMatch,
        Self::OsFingerprint,
        Self::PortsUsed,
        Self::TcpSequence,
        Self::IpIdSequence,
        Self::Uptime,
        Self::Distance,
    ];

    /// Key of this field in the extras mapping
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::OsClass => "osclass",
            Self::OsMatch => "osmatch",
            Self::OsFingerprint => "osfingerprint",
            Self::PortsUsed => "ports_used",
            Self::TcpSequence => "tcpsequence",
            Self::IpIdSequence => "ipidsequence",
            Self::Uptime => "uptime",
            Self::Distance => "distance",
        }
    }
}

/// Open-ended side channel for optional scan data (OS detection, uptime,
/// distance, sequence prediction, and anything newer scanners add).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostExtras(IndexMap<String, Value>);

impl HostExtras {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a known extra
    #[must_use]
    pub fn get(&self, field: ExtraField) -> Option<&Value> {
        self.0.get(field.key())
    }

    /// Get any extra by raw key
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert a known extra
    pub fn insert(&mut self, field: ExtraField, value: Value) {
        self.0.insert(field.key().to_string(), value);
    }

    /// Insert an extra by raw key
    pub fn insert_raw(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    fn nested(&self, field: ExtraField, key: &str) -> Option<&Value> {
        self.get(field).and_then(|v| v.get(key))
    }

    fn nested_str(&self, field: ExtraField, key: &str) -> String {
        self.nested(field, key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    fn list<T: serde::de::DeserializeOwned>(&self, field: ExtraField) -> Vec<T> {
        self.get(field)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

/// Numeric value that scanners emit either as a number or as text.
fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// OS family guess with its accuracy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsClass {
    #[serde(rename = "type")]
    pub class_type: String,
    pub vendor: String,
    pub osfamily: String,
    pub osgen: String,
    pub accuracy: String,
}

/// Named OS match with its accuracy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsMatch {
    pub name: String,
    pub accuracy: String,
    pub line: String,
}

/// Port used during OS detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortUsed {
    pub state: String,
    pub proto: String,
    pub portid: String,
}

/// Raw nested form of a host, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHost {
    #[serde(default, deserialize_with = "lenient::text")]
    pub starttime: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub endtime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, deserialize_with = "de_status")]
    pub status: HostStatus,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default, skip_serializing_if = "HostExtras::is_empty")]
    pub extras: HostExtras,
}

/// One scanned endpoint.
///
/// Owns its services exclusively. Hostname order carries no meaning for
/// hashing or equality. At most one service per `(protocol, port)` is
/// expected; lookups report duplicates instead of picking one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawHost", into = "RawHost")]
pub struct Host {
    starttime: String,
    endtime: String,
    address: Address,
    status: HostStatus,
    hostnames: Vec<String>,
    services: Vec<Service>,
    extras: HostExtras,
}

impl Host {
    /// Create a host with no status, hostnames or services
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            starttime: String::new(),
            endtime: String::new(),
            address: Address::new(address),
            status: HostStatus::default(),
            hostnames: Vec::new(),
            services: Vec::new(),
            extras: HostExtras::default(),
        }
    }

    /// Build a host from its raw form; the address is required.
    pub fn from_raw(raw: RawHost) -> Result<Self> {
        let address = raw.address.context_none("address", "host")?;
        Ok(Self {
            starttime: raw.starttime,
            endtime: raw.endtime,
            address,
            status: raw.status,
            hostnames: raw.hostnames,
            services: raw.services,
            extras: raw.extras,
        })
    }

    /// Get the raw form of this host
    #[must_use]
    pub fn raw_data(&self) -> RawHost {
        RawHost::from(self.clone())
    }

    #[must_use]
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: HostStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_times(mut self, starttime: impl Into<String>, endtime: impl Into<String>) -> Self {
        self.starttime = starttime.into();
        self.endtime = endtime.into();
        self
    }

    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostnames.push(hostname.into());
        self
    }

    #[must_use]
    pub fn with_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    #[must_use]
    pub fn with_services(mut self, services: impl IntoIterator<Item = Service>) -> Self {
        self.services.extend(services);
        self
    }

    #[must_use]
    pub fn with_extra(mut self, field: ExtraField, value: Value) -> Self {
        self.extras.insert(field, value);
        self
    }

    /// Scan start as a unix timestamp string
    #[must_use]
    pub fn starttime(&self) -> &str {
        &self.starttime
    }

    /// Scan end as a unix timestamp string
    #[must_use]
    pub fn endtime(&self) -> &str {
        &self.endtime
    }

    /// Scan start, if the timestamp is a valid unix time
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        parse_unix_time(&self.starttime)
    }

    /// Scan end, if the timestamp is a valid unix time
    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        parse_unix_time(&self.endtime)
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address.addr
    }

    #[must_use]
    pub fn address_type(&self) -> &str {
        &self.address.addrtype
    }

    /// Host state (`up`, `down`, ...)
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.status.state.as_deref()
    }

    #[must_use]
    pub fn status_reason(&self) -> Option<&str> {
        self.status.reason.as_deref()
    }

    #[must_use]
    pub fn is_up(&self) -> bool {
        self.status() == Some("up")
    }

    /// Hostnames in reported order
    #[must_use]
    pub fn hostnames(&self) -> &[String] {
        &self.hostnames
    }

    /// Hostnames sorted and deduplicated
    #[must_use]
    pub fn normalized_hostnames(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.hostnames.iter().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    #[must_use]
    pub const fn extras(&self) -> &HostExtras {
        &self.extras
    }

    /// `(port, protocol)` of every service
    #[must_use]
    pub fn get_ports(&self) -> Vec<(u16, String)> {
        self.services
            .iter()
            .map(|s| (s.port(), s.protocol().to_string()))
            .collect()
    }

    /// `(port, protocol)` of every open service
    #[must_use]
    pub fn get_open_ports(&self) -> Vec<(u16, String)> {
        self.services
            .iter()
            .filter(|s| s.is_open())
            .map(|s| (s.port(), s.protocol().to_string()))
            .collect()
    }

    /// Look up a service by port and protocol.
    pub fn get_service(&self, port: u16, protocol: &str) -> Result<Option<&Service>> {
        self.get_service_by_id(&ServiceId::new(protocol, port))
    }

    /// Look up a service by identity.
    ///
    /// Fails with a lookup error when more than one service carries `id`.
    pub fn get_service_by_id(&self, id: &ServiceId) -> Result<Option<&Service>> {
        let mut matches = self
            .services
            .iter()
            .filter(|s| s.port() == id.port && s.protocol() == id.protocol);
        let first = matches.next();
        let extra = matches.count();
        if extra > 0 {
            return Err(ScanDiffError::lookup(
                "service lookup",
                LookupErrorKind::DuplicateService {
                    host: self.address().to_string(),
                    protocol: id.protocol.clone(),
                    port: id.port,
                    count: extra + 1,
                },
            ));
        }
        Ok(first)
    }

    /// Service identities that occur more than once
    #[must_use]
    pub fn duplicate_service_ids(&self) -> Vec<ServiceId> {
        let mut counts: BTreeMap<ServiceId, usize> = BTreeMap::new();
        for service in &self.services {
            *counts.entry(service.id()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter_map(|(id, n)| (n > 1).then_some(id))
            .collect()
    }

    /// OS class guesses, empty when absent or malformed
    #[must_use]
    pub fn os_class_probabilities(&self) -> Vec<OsClass> {
        self.extras.list(ExtraField::OsClass)
    }

    /// OS match guesses, empty when absent or malformed
    #[must_use]
    pub fn os_match_probabilities(&self) -> Vec<OsMatch> {
        self.extras.list(ExtraField::OsMatch)
    }

    #[must_use]
    pub fn os_fingerprint(&self) -> String {
        self.extras
            .get(ExtraField::OsFingerprint)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    #[must_use]
    pub fn os_ports_used(&self) -> Vec<PortUsed> {
        self.extras.list(ExtraField::PortsUsed)
    }

    /// TCP sequence prediction difficulty
    #[must_use]
    pub fn tcpsequence(&self) -> String {
        self.extras.nested_str(ExtraField::TcpSequence, "difficulty")
    }

    /// IP ID sequence class
    #[must_use]
    pub fn ipsequence(&self) -> String {
        self.extras.nested_str(ExtraField::IpIdSequence, "class")
    }

    /// Uptime in seconds, 0 when unknown
    #[must_use]
    pub fn uptime(&self) -> u64 {
        self.extras
            .nested(ExtraField::Uptime, "seconds")
            .and_then(value_as_u64)
            .unwrap_or(0)
    }

    #[must_use]
    pub fn lastboot(&self) -> String {
        self.extras.nested_str(ExtraField::Uptime, "lastboot")
    }

    /// Network distance in hops, 0 when unknown
    #[must_use]
    pub fn distance(&self) -> u32 {
        self.extras
            .nested(ExtraField::Distance, "value")
            .and_then(value_as_u64)
            .and_then(|d| u32::try_from(d).ok())
            .unwrap_or(0)
    }

    /// Diff against another host with the same address.
    ///
    /// Services are compared by digest under their identity key. The identity
    /// precondition is not checked here; use
    /// [`DiffEngine::diff_hosts`](crate::diff::DiffEngine::diff_hosts) for a
    /// checked, recursive comparison.
    pub fn diff(&self, other: &Self) -> EntityDiff {
        self.structural_diff(other)
    }

    /// Number of entries that differ from `other`
    #[must_use]
    pub fn changed(&self, other: &Self) -> usize {
        self.diff(other).changed_count()
    }

    fn hostnames_text(&self) -> String {
        self.normalized_hostnames().join(" ")
    }
}

pub(crate) fn parse_unix_time(value: &str) -> Option<DateTime<Utc>> {
    let secs = value.trim().parse::<i64>().ok()?;
    DateTime::from_timestamp(secs, 0)
}

impl TryFrom<RawHost> for Host {
    type Error = ScanDiffError;

    fn try_from(raw: RawHost) -> Result<Self> {
        Self::from_raw(raw)
    }
}

impl From<Host> for RawHost {
    fn from(host: Host) -> Self {
        Self {
            starttime: host.starttime,
            endtime: host.endtime,
            address: Some(host.address),
            status: host.status,
            hostnames: host.hostnames,
            services: host.services,
            extras: host.extras,
        }
    }
}

impl Identified for Host {
    type Id = HostId;

    fn id(&self) -> HostId {
        HostId::new(self.address.addr.clone())
    }
}

impl ContentHash for Host {
    fn content_hash(&self) -> u64 {
        FieldHasher::new("host")
            .field("address", self.address())
            .opt_field("status", self.status())
            .unordered(
                "hostnames",
                self.normalized_hostnames()
                    .into_iter()
                    .map(|h| xxh3_64(h.as_bytes())),
            )
            .unordered("services", self.services.iter().map(ContentHash::content_hash))
            .finish()
    }
}

impl Diffable for Host {
    fn comparison_map(&self) -> ComparisonMap {
        let mut map: ComparisonMap = self
            .services
            .iter()
            .map(|s| (DiffKey::Service(s.id()), DiffValue::Digest(s.content_hash())))
            .collect();
        map.insert(DiffKey::Field("address"), DiffValue::text(self.address()));
        map.insert(DiffKey::Field("status"), DiffValue::from(self.status()));
        map.insert(DiffKey::Field("hostnames"), DiffValue::text(self.hostnames_text()));
        map
    }
}

/// Same address, status and hostnames, and the same services compared one
/// by one under their identity keys.
///
/// An added or removed service breaks equality even though it leaves
/// [`EntityDiff::changed_count`] at zero; use [`EntityDiff::has_changes`] to
/// match `==`.
impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
            && self.status() == other.status()
            && self.normalized_hostnames() == other.normalized_hostnames()
            && unordered_eq(&self.services, &other.services)
    }
}

impl Eq for Host {}

impl Hash for Host {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.content_hash());
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Host: [{} ({}) - {}]",
            self.address(),
            self.hostnames.join(" "),
            self.status().unwrap_or("unknown")
        )
    }
}
