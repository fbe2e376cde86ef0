//! Scan result model: reports, hosts and services.
//!
//! The entity tree is `Report -> Host -> Service`. Each level owns its
//! children exclusively and is read-only once constructed. Raw nested forms
//! ([`RawReport`], [`RawHost`], [`RawService`]) are the boundary with report
//! loaders and storage backends; the entity types validate identity-bearing
//! fields when built from them and expose defaulting accessors for
//! everything optional.
//!
//! # Identity and hashing
//!
//! See [`identity`] for the identity keys used to match entities across two
//! scans and the order-independent content hash used as a change pre-filter.

pub mod identity;
mod host;
mod lenient;
mod report;
mod service;

pub use host::*;
pub use identity::{combine_unordered, ContentHash, HostId, Identified, ServiceId};
pub use report::*;
pub use service::*;
