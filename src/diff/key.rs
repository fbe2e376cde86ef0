//! Flat comparison view of an entity.
//!
//! Each entity renders itself as a [`ComparisonMap`]: owned children appear
//! under their identity key with their content digest as value, and the
//! entity's own fields appear under a field name with their text value. The
//! map exists only as the diff engine's comparison substrate; it is not a
//! serialization format.

use crate::model::{HostId, ServiceId};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Key of a comparison map entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiffKey {
    /// A scalar field of the entity itself
    Field(&'static str),
    /// An owned host, by address
    Host(HostId),
    /// An owned service, by `(protocol, port)`
    Service(ServiceId),
}

impl DiffKey {
    #[must_use]
    pub const fn as_host(&self) -> Option<&HostId> {
        match self {
            Self::Host(id) => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_service(&self) -> Option<&ServiceId> {
        match self {
            Self::Service(id) => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_field(&self) -> Option<&'static str> {
        match self {
            Self::Field(name) => Some(*name),
            _ => None,
        }
    }

    /// Whether this key names an owned child rather than a field
    #[must_use]
    pub const fn is_child(&self) -> bool {
        !matches!(self, Self::Field(_))
    }
}

impl fmt::Display for DiffKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Host(id) => write!(f, "Host.{id}"),
            Self::Service(id) => write!(f, "Service.{id}"),
        }
    }
}

impl Serialize for DiffKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Value of a comparison map entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DiffValue {
    /// Content digest of an owned child
    Digest(u64),
    /// Normalized text of a field
    Text(String),
    /// Field not reported
    Absent,
}

impl DiffValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

impl From<Option<&str>> for DiffValue {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Self::Absent, Self::text)
    }
}

impl fmt::Display for DiffValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digest(d) => write!(f, "{d:016x}"),
            Self::Text(s) => f.write_str(s),
            Self::Absent => f.write_str("-"),
        }
    }
}

/// Flat key/value view of an entity, in insertion order
pub type ComparisonMap = IndexMap<DiffKey, DiffValue>;
