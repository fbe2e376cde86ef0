//! Trait definitions for structural diffing.
//!
//! Every diffable entity exposes the same flat comparison view, so one
//! comparison routine serves services, hosts and reports alike.

use super::key::ComparisonMap;
use super::result::EntityDiff;

/// An entity that can be compared structurally to another of its kind.
pub trait Diffable {
    /// Flat key/value view used for comparison.
    ///
    /// Owned children appear under their identity key with their content
    /// digest; scalar fields appear under their field name. When two children
    /// share an identity the later one overwrites the earlier.
    fn comparison_map(&self) -> ComparisonMap;

    /// Classify every key of both comparison maps.
    ///
    /// This performs no identity check: comparing entities of different
    /// identities yields a diff whose identity fields are changed.
    fn structural_diff(&self, other: &Self) -> EntityDiff
    where
        Self: Sized,
    {
        diff_maps(&self.comparison_map(), &other.comparison_map())
    }
}

/// Classify keys of `old` and `new` into added, removed, changed and unchanged.
///
/// The four sets are pairwise disjoint and their union is the union of both
/// key sets.
pub fn diff_maps(old: &ComparisonMap, new: &ComparisonMap) -> EntityDiff {
    let mut diff = EntityDiff::new();

    for (key, old_value) in old {
        match new.get(key) {
            None => {
                diff.removed.insert(key.clone());
            }
            Some(new_value) if new_value == old_value => {
                diff.unchanged.insert(key.clone());
            }
            Some(_) => {
                diff.changed.insert(key.clone());
            }
        }
    }

    diff.added.extend(
        new.keys()
            .filter(|key| !old.contains_key(*key))
            .cloned(),
    );

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffKey, DiffValue};
    use crate::model::ServiceId;

    fn map(entries: &[(DiffKey, DiffValue)]) -> ComparisonMap {
        entries.iter().cloned().collect()
    }

    #[test]
    fn test_diff_maps_classifies_every_key() {
        let old = map(&[
            (DiffKey::Field("state"), DiffValue::text("open")),
            (DiffKey::Field("service"), DiffValue::text("ssh")),
            (DiffKey::Service(ServiceId::tcp(22)), DiffValue::Digest(1)),
        ]);
        let new = map(&[
            (DiffKey::Field("state"), DiffValue::text("closed")),
            (DiffKey::Field("service"), DiffValue::text("ssh")),
            (DiffKey::Service(ServiceId::tcp(80)), DiffValue::Digest(2)),
        ]);

        let diff = diff_maps(&old, &new);
        assert!(diff.changed().contains(&DiffKey::Field("state")));
        assert!(diff.unchanged().contains(&DiffKey::Field("service")));
        assert!(diff.removed().contains(&DiffKey::Service(ServiceId::tcp(22))));
        assert!(diff.added().contains(&DiffKey::Service(ServiceId::tcp(80))));
        assert_eq!(diff.total_changes(), 3);
    }

    #[test]
    fn test_diff_maps_absent_to_present_is_change() {
        let old = map(&[(DiffKey::Field("banner"), DiffValue::Absent)]);
        let new = map(&[(DiffKey::Field("banner"), DiffValue::text("product: OpenSSH"))]);

        let diff = diff_maps(&old, &new);
        assert_eq!(diff.changed_fields().collect::<Vec<_>>(), vec!["banner"]);
        assert!(diff.added().is_empty());
    }

    #[test]
    fn test_diff_maps_empty() {
        let diff = diff_maps(&ComparisonMap::new(), &ComparisonMap::new());
        assert_eq!(diff, EntityDiff::new());
    }
}
