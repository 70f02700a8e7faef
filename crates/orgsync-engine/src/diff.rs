//! Set-diff primitive for keyed entity collections.
//!
//! Compares a declared and a live view of the same entity class and emits
//! one event per diverging key. The per-class reconcilers build comparable
//! projections, pick a domain equality, and translate events into mutations.

use std::collections::BTreeMap;

/// One divergence between the declared and live views.
///
/// For every key in the union of the two maps, at most one event is
/// emitted: `Added` when the key only exists declared, `Removed` when it
/// only exists live, `Changed` when it exists in both but the equality
/// predicate rejects the pair. Keys whose values compare equal emit
/// nothing.
#[derive(Debug)]
pub enum DiffEvent<'a, K, D, L> {
    /// Key present in the declared view only.
    Added(&'a K, &'a D),
    /// Key present in the live view only.
    Removed(&'a K, &'a L),
    /// Key present in both views with diverging values.
    Changed(&'a K, &'a D, &'a L),
}

/// Diff two keyed collections and emit one [`DiffEvent`] per diverging key.
///
/// Events are emitted synchronously and serialized, in key order. The
/// first error returned by `emit` aborts the pass and is propagated.
pub fn compare_entities<K, D, L, E>(
    declared: &BTreeMap<K, D>,
    live: &BTreeMap<K, L>,
    equal: impl Fn(&D, &L) -> bool,
    mut emit: impl FnMut(DiffEvent<'_, K, D, L>) -> Result<(), E>,
) -> Result<(), E>
where
    K: Ord,
{
    for (key, declared_value) in declared {
        match live.get(key) {
            None => emit(DiffEvent::Added(key, declared_value))?,
            Some(live_value) if !equal(declared_value, live_value) => {
                emit(DiffEvent::Changed(key, declared_value, live_value))?;
            }
            Some(_) => {}
        }
    }

    for (key, live_value) in live {
        if !declared.contains_key(key) {
            emit(DiffEvent::Removed(key, live_value))?;
        }
    }

    Ok(())
}

/// Compare two string collections as multisets.
///
/// Returns `(equal, to_add, to_remove)` where `to_add` holds the distinct
/// values present declared-side only and `to_remove` the distinct values
/// present live-side only.
#[must_use]
pub fn string_multiset_diff(
    declared: &[String],
    live: &[String],
) -> (bool, Vec<String>, Vec<String>) {
    let mut declared_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in declared {
        *declared_counts.entry(value.as_str()).or_insert(0) += 1;
    }

    let mut live_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in live {
        *live_counts.entry(value.as_str()).or_insert(0) += 1;
    }

    let equal = declared_counts == live_counts;

    let to_add = declared_counts
        .keys()
        .filter(|value| !live_counts.contains_key(*value))
        .map(|value| (*value).to_string())
        .collect();
    let to_remove = live_counts
        .keys()
        .filter(|value| !declared_counts.contains_key(*value))
        .map(|value| (*value).to_string())
        .collect();

    (equal, to_add, to_remove)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn collect_events(
        declared: &BTreeMap<String, i32>,
        live: &BTreeMap<String, i32>,
    ) -> Vec<String> {
        let mut events = Vec::new();
        let result: Result<(), Infallible> =
            compare_entities(declared, live, |d, l| d == l, |event| {
                events.push(match event {
                    DiffEvent::Added(key, _) => format!("added:{key}"),
                    DiffEvent::Removed(key, _) => format!("removed:{key}"),
                    DiffEvent::Changed(key, _, _) => format!("changed:{key}"),
                });
                Ok(())
            });
        result.unwrap();
        events
    }

    #[test]
    fn test_compare_entities_classifies_keys() {
        let declared: BTreeMap<String, i32> =
            [("a".into(), 1), ("b".into(), 2), ("c".into(), 3)].into();
        let live: BTreeMap<String, i32> =
            [("b".into(), 2), ("c".into(), 9), ("d".into(), 4)].into();

        let events = collect_events(&declared, &live);
        assert_eq!(events, vec!["added:a", "changed:c", "removed:d"]);
    }

    #[test]
    fn test_compare_entities_equal_maps_emit_nothing() {
        let declared: BTreeMap<String, i32> = [("a".into(), 1)].into();
        let live = declared.clone();
        assert!(collect_events(&declared, &live).is_empty());
    }

    #[test]
    fn test_compare_entities_empty_declared_removes_all() {
        let declared = BTreeMap::new();
        let live: BTreeMap<String, i32> = [("x".into(), 1), ("y".into(), 2)].into();
        let events = collect_events(&declared, &live);
        assert_eq!(events, vec!["removed:x", "removed:y"]);
    }

    #[test]
    fn test_compare_entities_propagates_errors() {
        let declared: BTreeMap<String, i32> = [("a".into(), 1), ("b".into(), 2)].into();
        let live: BTreeMap<String, i32> = BTreeMap::new();

        let mut seen = 0;
        let result = compare_entities(&declared, &live, |d, l| d == l, |_event| {
            seen += 1;
            Err("boom")
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(seen, 1, "the first error aborts the pass");
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_string_multiset_diff_equal() {
        let (equal, to_add, to_remove) =
            string_multiset_diff(&strings(&["a", "b"]), &strings(&["b", "a"]));
        assert!(equal);
        assert!(to_add.is_empty());
        assert!(to_remove.is_empty());
    }

    #[test]
    fn test_string_multiset_diff_disjoint_sides() {
        let (equal, to_add, to_remove) =
            string_multiset_diff(&strings(&["a", "b"]), &strings(&["b", "c"]));
        assert!(!equal);
        assert_eq!(to_add, strings(&["a"]));
        assert_eq!(to_remove, strings(&["c"]));
    }

    #[test]
    fn test_string_multiset_diff_counts_duplicates() {
        // Same distinct values but diverging multiplicity: not equal, yet
        // neither side has anything to add or remove.
        let (equal, to_add, to_remove) =
            string_multiset_diff(&strings(&["a", "a"]), &strings(&["a"]));
        assert!(!equal);
        assert!(to_add.is_empty());
        assert!(to_remove.is_empty());
    }

    #[test]
    fn test_string_multiset_diff_empty_sides() {
        let (equal, to_add, to_remove) = string_multiset_diff(&[], &strings(&["x"]));
        assert!(!equal);
        assert!(to_add.is_empty());
        assert_eq!(to_remove, strings(&["x"]));
    }
}
