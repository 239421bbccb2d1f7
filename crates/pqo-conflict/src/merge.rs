//! Three-way document merge (spec §4.9): for each non-metadata key, apply
//! the standard rules — neither side changed ⇒ base; one side changed ⇒
//! that side; both changed identically ⇒ that value; both changed
//! differently ⇒ an unresolved conflict, base's value wins in `merged` but
//! is reported.

use serde_json::Value;

use pqo_schemas::version_vector::VersionVector;

const METADATA_FIELDS: &[&str] = &["version", "versionVector", "updatedAt", "createdAt"];

#[derive(Clone, Debug, PartialEq)]
pub struct MergeResult {
    pub success: bool,
    pub merged: Value,
    pub unresolved_conflicts: Vec<String>,
    pub applied_changes: Vec<String>,
}

pub fn three_way_merge(base: &Value, local: &Value, remote: &Value) -> MergeResult {
    let (Value::Object(base_obj), Value::Object(local_obj), Value::Object(remote_obj)) = (base, local, remote) else {
        return MergeResult { success: local == remote, merged: local.clone(), unresolved_conflicts: vec![], applied_changes: vec![] };
    };

    let mut keys: Vec<&String> = base_obj.keys().chain(local_obj.keys()).chain(remote_obj.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut merged = serde_json::Map::new();
    let mut unresolved = Vec::new();
    let mut applied = Vec::new();

    for key in keys {
        if METADATA_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let b = base_obj.get(key);
        let l = local_obj.get(key);
        let r = remote_obj.get(key);

        let local_changed = l != b;
        let remote_changed = r != b;

        let resolved = match (local_changed, remote_changed) {
            (false, false) => b.cloned(),
            (true, false) => {
                applied.push(key.clone());
                l.cloned()
            }
            (false, true) => {
                applied.push(key.clone());
                r.cloned()
            }
            (true, true) if l == r => {
                applied.push(key.clone());
                l.cloned()
            }
            (true, true) => {
                unresolved.push(key.clone());
                b.cloned()
            }
        };

        if let Some(value) = resolved {
            merged.insert(key.clone(), value);
        }
    }

    MergeResult { success: unresolved.is_empty(), merged: Value::Object(merged), unresolved_conflicts: unresolved, applied_changes: applied }
}

/// Version vector of a merge result: component-wise max of the inputs,
/// incremented at `local_device`.
pub fn merge_version_vectors(local_device: &str, local: &VersionVector, remote: &VersionVector) -> VersionVector {
    let mut merged = local.merged_max(remote);
    merged.increment(local_device);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn unchanged_field_keeps_base_value() {
        let base = json!({"a": 1});
        let result = three_way_merge(&base, &base, &base);
        assert_eq!(result.merged, json!({"a": 1}));
        assert!(result.success);
    }

    #[test]
    fn single_side_change_wins() {
        let base = json!({"a": 1});
        let local = json!({"a": 2});
        let result = three_way_merge(&base, &local, &base);
        assert_eq!(result.merged, json!({"a": 2}));
        assert_eq!(result.applied_changes, vec!["a".to_string()]);
    }

    #[test]
    fn identical_changes_on_both_sides_apply_cleanly() {
        let base = json!({"a": 1});
        let local = json!({"a": 2});
        let remote = json!({"a": 2});
        let result = three_way_merge(&base, &local, &remote);
        assert_eq!(result.merged, json!({"a": 2}));
        assert!(result.success);
    }

    #[test]
    fn divergent_changes_are_unresolved_and_keep_base() {
        let base = json!({"a": 1});
        let local = json!({"a": 2});
        let remote = json!({"a": 3});
        let result = three_way_merge(&base, &local, &remote);
        assert!(!result.success);
        assert_eq!(result.unresolved_conflicts, vec!["a".to_string()]);
        assert_eq!(result.merged, json!({"a": 1}));
    }

    #[test]
    fn merged_version_vector_is_componentwise_max_plus_local_increment() {
        let local = VersionVector(BTreeMap::from([("d1".to_string(), 2)]));
        let remote = VersionVector(BTreeMap::from([("d1".to_string(), 1), ("d2".to_string(), 3)]));
        let merged = merge_version_vectors("d1", &local, &remote);
        assert_eq!(merged.get("d1"), 3);
        assert_eq!(merged.get("d2"), 3);
    }
}
