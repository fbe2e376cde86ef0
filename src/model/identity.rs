//! Identity keys and structural hashing for scan entities.
//!
//! Every entity that can be matched across two scans exposes an identity key
//! ([`Identified`]) and a structural fingerprint ([`ContentHash`]):
//!
//! - **Service** is identified by `(protocol, port)`, unique within its host
//! - **Host** is identified by its address, unique within its report
//! - **Report** has no identity; reports are only ever compared explicitly
//!
//! Fingerprints fold tagged field bytes into an xxh3 digest. Owned child
//! collections are folded as a sorted list of child digests, so permuting
//! services or hosts never changes the parent digest.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use xxhash_rust::xxh3::xxh3_64;

/// Identity of a service within a host: `(protocol, port)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ServiceId {
    /// Transport protocol (`tcp`, `udp`, `sctp`, ...)
    pub protocol: String,
    /// Port number
    pub port: u16,
}

impl ServiceId {
    /// Create a service identity
    pub fn new(protocol: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            port,
        }
    }

    /// Shorthand for a TCP service identity
    #[must_use]
    pub fn tcp(port: u16) -> Self {
        Self::new("tcp", port)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protocol, self.port)
    }
}

impl FromStr for ServiceId {
    type Err = String;

    /// Parse the `protocol/port` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (protocol, port) = s
            .rsplit_once('/')
            .ok_or_else(|| format!("expected protocol/port, got '{s}'"))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port in '{s}': {e}"))?;
        Ok(Self::new(protocol, port))
    }
}

impl From<ServiceId> for String {
    fn from(id: ServiceId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ServiceId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Identity of a host within a report: its network address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    /// Create a host identity from an address literal
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Get the address string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HostId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for HostId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Entities that can be matched across two scans by a stable key.
pub trait Identified {
    /// The identity key type
    type Id: Clone + Eq + Ord + fmt::Display;

    /// Get the identity key of this entity
    fn id(&self) -> Self::Id;
}

/// Entities with a structural fingerprint.
///
/// Two structurally identical entities always produce the same digest. The
/// converse is only overwhelmingly likely, so the digest is a pre-filter:
/// `PartialEq` on the entity types is the ground truth.
pub trait ContentHash {
    /// Compute the structural digest of this entity
    fn content_hash(&self) -> u64;

    /// Cheap equality pre-filter based on digests only.
    ///
    /// `false` proves the entities differ; `true` means they are equal up to
    /// a hash collision.
    fn hash_eq(&self, other: &Self) -> bool
    where
        Self: Sized,
    {
        self.content_hash() == other.content_hash()
    }
}

/// Fold a set of digests into one, independent of iteration order.
#[must_use]
pub fn combine_unordered<I>(digests: I) -> u64
where
    I: IntoIterator<Item = u64>,
{
    let mut sorted: Vec<u64> = digests.into_iter().collect();
    sorted.sort_unstable();
    let mut input = Vec::with_capacity(sorted.len() * 8);
    for digest in sorted {
        input.extend(digest.to_le_bytes());
    }
    xxh3_64(&input)
}

const FIELD_SEP: u8 = 0x1f;
const RECORD_SEP: u8 = 0x1e;
const ABSENT: u8 = 0x1d;

/// Accumulates tagged field bytes for an entity digest.
pub(crate) struct FieldHasher {
    input: Vec<u8>,
}

impl FieldHasher {
    pub(crate) fn new(kind: &str) -> Self {
        let mut input = Vec::with_capacity(128);
        input.extend(kind.as_bytes());
        input.push(RECORD_SEP);
        Self { input }
    }

    pub(crate) fn field(mut self, name: &str, value: &str) -> Self {
        self.input.extend(name.as_bytes());
        self.input.push(FIELD_SEP);
        self.input.extend(value.as_bytes());
        self.input.push(RECORD_SEP);
        self
    }

    pub(crate) fn opt_field(mut self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.field(name, v),
            None => {
                self.input.extend(name.as_bytes());
                self.input.push(ABSENT);
                self.input.push(RECORD_SEP);
                self
            }
        }
    }

    pub(crate) fn unordered<I>(mut self, name: &str, digests: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        self.input.extend(name.as_bytes());
        self.input.push(FIELD_SEP);
        self.input.extend(combine_unordered(digests).to_le_bytes());
        self.input.push(RECORD_SEP);
        self
    }

    pub(crate) fn finish(self) -> u64 {
        xxh3_64(&self.input)
    }
}

/// Multiset equality of two child collections, ignoring order.
///
/// Children are paired by identity key (ties broken by digest) and compared
/// with their own `PartialEq`, never by digest alone.
pub(crate) fn unordered_eq<T>(left: &[T], right: &[T]) -> bool
where
    T: Identified + ContentHash + PartialEq,
{
    if left.len() != right.len() {
        return false;
    }
    let sort_key = |item: &&T| (item.id(), item.content_hash());
    let mut left: Vec<&T> = left.iter().collect();
    let mut right: Vec<&T> = right.iter().collect();
    left.sort_by_key(sort_key);
    right.sort_by_key(sort_key);
    left.iter().zip(right.iter()).all(|(a, b)| a == b)
}
