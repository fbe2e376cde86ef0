//! Scanned port on a host.

use super::identity::{ContentHash, FieldHasher, Identified, ServiceId};
use super::lenient;
use crate::diff::{ComparisonMap, DiffKey, DiffValue, Diffable, EntityDiff};
use crate::error::{OptionContext, Result, ScanDiffError, ValidationErrorKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Default transport protocol for services
pub const DEFAULT_PROTOCOL: &str = "tcp";

/// Detection method that makes fingerprint fields part of the banner
const PROBED_METHOD: &str = "probed";

fn default_protocol() -> String {
    DEFAULT_PROTOCOL.to_string()
}

/// Port state as reported by the scanner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortState {
    /// `open`, `closed`, `filtered`, `open|filtered`, ...
    #[serde(
        default,
        deserialize_with = "lenient::opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub state: Option<String>,
    /// Why the scanner concluded the state (e.g. `syn-ack`)
    #[serde(
        default,
        deserialize_with = "lenient::opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub reason: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub reason_ttl: Option<String>,
}

impl PortState {
    /// Create a port state without a reason
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
            reason: None,
            reason_ttl: None,
        }
    }

    /// Set the reason
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Service detection result for a port.
///
/// `name`, `method` and `conf` are the detection metadata; every other
/// attribute the scanner reported (product, version, extrainfo, ostype, ...)
/// lives in `fields` in the order it was reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFingerprint {
    #[serde(
        default,
        deserialize_with = "lenient::opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    /// Detection method, `probed` or `table`
    #[serde(
        default,
        deserialize_with = "lenient::opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub method: Option<String>,
    /// Detection confidence
    #[serde(
        default,
        deserialize_with = "lenient::opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub conf: Option<String>,
    #[serde(flatten, deserialize_with = "lenient::text_map")]
    pub fields: IndexMap<String, String>,
}

impl ServiceFingerprint {
    /// Create a fingerprint with only a service name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the detection method
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Mark the fingerprint as coming from active probing
    #[must_use]
    pub fn probed(self) -> Self {
        self.with_method(PROBED_METHOD)
    }

    /// Add a reported attribute
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Whether the fingerprint came from active probing
    #[must_use]
    pub fn is_probed(&self) -> bool {
        self.method.as_deref() == Some(PROBED_METHOD)
    }

    /// Banner text: `"key: value"` pairs joined by spaces when probed,
    /// empty otherwise.
    #[must_use]
    pub fn banner(&self) -> String {
        if !self.is_probed() {
            return String::new();
        }
        self.fields
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output of one NSE script run against a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptResult {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub output: String,
}

/// Raw port number as found in scan data: either numeric or text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPort {
    Number(i64),
    Text(String),
}

impl RawPort {
    /// Validate into a port number in `0..=65535`.
    pub fn validate(&self) -> Result<u16> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                ScanDiffError::validation(
                    "service port",
                    ValidationErrorKind::InvalidPort(s.clone()),
                )
            })?,
        };
        u16::try_from(value).map_err(|_| {
            ScanDiffError::validation("service port", ValidationErrorKind::PortOutOfRange(value))
        })
    }
}

/// Raw nested form of a service, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portid: Option<RawPort>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub state: PortState,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub service: ServiceFingerprint,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub scripts: Vec<ScriptResult>,
}

/// One scanned port on a host.
///
/// Constructed once from scan data and read-only afterwards. The port is
/// validated at construction; everything else is optional and read through
/// defaulting accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawService", into = "RawService")]
pub struct Service {
    port: u16,
    protocol: String,
    state: PortState,
    fingerprint: ServiceFingerprint,
    scripts: Vec<ScriptResult>,
}

impl Service {
    /// Create a service for an already-typed port number
    pub fn new(port: u16, protocol: impl Into<String>) -> Self {
        Self {
            port,
            protocol: protocol.into(),
            state: PortState::default(),
            fingerprint: ServiceFingerprint::default(),
            scripts: Vec::new(),
        }
    }

    /// Create a service from an untyped port number, failing outside `0..=65535`
    pub fn try_new(port: i64, protocol: impl Into<String>) -> Result<Self> {
        let port = RawPort::Number(port).validate()?;
        Ok(Self::new(port, protocol))
    }

    /// Build a service from its raw form.
    pub fn from_raw(raw: RawService) -> Result<Self> {
        let port = raw.portid.as_ref().context_none("portid", "service")?.validate()?;
        Ok(Self {
            port,
            protocol: raw.protocol,
            state: raw.state,
            fingerprint: raw.service,
            scripts: raw.scripts,
        })
    }

    /// Get the raw form of this service
    #[must_use]
    pub fn raw_data(&self) -> RawService {
        RawService::from(self.clone())
    }

    /// Set the port state
    #[must_use]
    pub fn with_state(mut self, state: PortState) -> Self {
        self.state = state;
        self
    }

    /// Set the service fingerprint
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: ServiceFingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Append a script result
    #[must_use]
    pub fn with_script(mut self, id: impl Into<String>, output: impl Into<String>) -> Self {
        self.scripts.push(ScriptResult {
            id: id.into(),
            output: output.into(),
        });
        self
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Port state, `None` when the scanner reported none
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.state.state.as_deref()
    }

    /// Full port state record
    #[must_use]
    pub const fn port_state(&self) -> &PortState {
        &self.state
    }

    /// Detected service name
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        self.fingerprint.name.as_deref()
    }

    #[must_use]
    pub const fn fingerprint(&self) -> &ServiceFingerprint {
        &self.fingerprint
    }

    /// Whether the port is open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == Some("open")
    }

    /// Banner derived from probed fingerprint fields
    #[must_use]
    pub fn banner(&self) -> String {
        self.fingerprint.banner()
    }

    /// Script results keyed by script id
    #[must_use]
    pub fn scripts_results(&self) -> IndexMap<String, String> {
        self.scripts
            .iter()
            .map(|s| (s.id.clone(), s.output.clone()))
            .collect()
    }

    /// Field-level diff against another service with the same identity.
    ///
    /// The identity precondition is not checked here; use
    /// [`DiffEngine::diff_services`](crate::diff::DiffEngine::diff_services)
    /// for a checked comparison.
    pub fn diff(&self, other: &Self) -> EntityDiff {
        self.structural_diff(other)
    }

    /// Number of fields that differ from `other`
    #[must_use]
    pub fn changed(&self, other: &Self) -> usize {
        self.diff(other).changed_count()
    }
}

impl TryFrom<RawService> for Service {
    type Error = ScanDiffError;

    fn try_from(raw: RawService) -> Result<Self> {
        Self::from_raw(raw)
    }
}

impl From<Service> for RawService {
    fn from(service: Service) -> Self {
        Self {
            portid: Some(RawPort::Number(i64::from(service.port))),
            protocol: service.protocol,
            state: service.state,
            service: service.fingerprint,
            scripts: service.scripts,
        }
    }
}

impl Identified for Service {
    type Id = ServiceId;

    fn id(&self) -> ServiceId {
        ServiceId::new(self.protocol.clone(), self.port)
    }
}

impl ContentHash for Service {
    fn content_hash(&self) -> u64 {
        FieldHasher::new("service")
            .field("port", &self.port.to_string())
            .field("protocol", &self.protocol)
            .opt_field("state", self.state())
            .opt_field("service", self.service())
            .field("banner", &self.banner())
            .finish()
    }
}

impl Diffable for Service {
    fn comparison_map(&self) -> ComparisonMap {
        let mut map = ComparisonMap::new();
        map.insert(DiffKey::Field("id"), DiffValue::text(self.id().to_string()));
        map.insert(DiffKey::Field("port"), DiffValue::text(self.port.to_string()));
        map.insert(DiffKey::Field("protocol"), DiffValue::text(&self.protocol));
        map.insert(DiffKey::Field("banner"), DiffValue::text(self.banner()));
        map.insert(DiffKey::Field("service"), DiffValue::from(self.service()));
        map.insert(DiffKey::Field("state"), DiffValue::from(self.state()));
        map
    }
}

/// Same identity and no differing field.
impl PartialEq for Service {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id() && self.comparison_map() == other.comparison_map()
    }
}

impl Eq for Service {}

impl Hash for Service {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.content_hash());
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Service: [{} {}/{} {} ({})]",
            self.state().unwrap_or("unknown"),
            self.port,
            self.protocol,
            self.service().unwrap_or(""),
            self.banner()
        )
    }
}
