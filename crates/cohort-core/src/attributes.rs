//! Attribute maps and the merge rules applied to them

use std::collections::BTreeMap;

/// Customer attributes, keyed by attribute name
pub type Attributes = BTreeMap<String, String>;

/// Event counts, keyed by event name
pub type EventCounts = BTreeMap<String, u64>;

/// Union of two attribute maps where `preferred` wins on overlapping keys.
pub fn merge_preferring(preferred: &Attributes, fallback: &Attributes) -> Attributes {
    let mut merged = fallback.clone();
    merged.extend(preferred.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Insert every key of `source` that `target` does not have yet.
///
/// Existing values in `target` are never replaced.
pub fn fill_gaps(target: &mut Attributes, source: &Attributes) {
    for (key, value) in source {
        target
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}

/// Overwrite `target` with every key of `incoming`.
pub fn overlay(target: &mut Attributes, incoming: Attributes) {
    target.extend(incoming);
}
