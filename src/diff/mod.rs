//! Hierarchical diff of scan reports.
//!
//! Comparison works one level at a time. A report compares its hosts by
//! address and its host counters by value; a host compares its services by
//! `(protocol, port)` and its own fields; a service compares its fields. Child
//! entries carry only a content digest, so a changed host or service is
//! flagged at the parent and explained by descending into it.
//!
//! [`DiffEngine`] runs that descent over a whole report pair. The
//! `diff`/`changed` methods on the model types compare a single level.

mod engine;
mod key;
mod result;
mod traits;

pub use engine::{DeltaSummary, DiffEngine, HostDelta, ScanDelta};
pub use key::{ComparisonMap, DiffKey, DiffValue};
pub use result::{DiffOutcome, EntityDiff, SkipReason};
pub use traits::{diff_maps, Diffable};
