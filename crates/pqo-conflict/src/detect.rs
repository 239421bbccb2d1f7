//! `Detect(local, remote)` (spec §4.9): classifies whether two divergent
//! documents represent a real conflict, and if so, which fields disagree.

use serde_json::Value;

use pqo_schemas::version_vector::{VectorOrdering, VersionVector};

/// Fields excluded from conflict comparison: storage bookkeeping, not
/// domain state.
const METADATA_FIELDS: &[&str] = &["version", "versionVector", "updatedAt", "createdAt"];

/// Fields whose disagreement blocks automatic resolution.
const CRITICAL_FIELDS: &[&str] = &["status", "quotedTotal", "items", "orderId", "confirmedAt"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldConflictKind {
    AddedLocal,
    AddedRemote,
    TypeChange,
    ArrayConflict,
    ObjectConflict,
    ValueConflict,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldConflict {
    pub field: String,
    pub kind: FieldConflictKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DetectOutcome {
    NoConflict,
    PushLocal,
    AcceptRemote,
    Conflict { fields: Vec<FieldConflict>, can_auto_resolve: bool },
}

pub fn detect(local: &Value, remote: &Value, local_vv: &VersionVector, remote_vv: &VersionVector) -> DetectOutcome {
    if local == remote {
        return DetectOutcome::NoConflict;
    }

    match local_vv.compare(remote_vv) {
        VectorOrdering::Equal => DetectOutcome::NoConflict,
        VectorOrdering::Greater => DetectOutcome::PushLocal,
        VectorOrdering::Less => DetectOutcome::AcceptRemote,
        VectorOrdering::Concurrent => {
            let fields = diff_fields(local, remote);
            let can_auto_resolve = !fields.iter().any(|f| CRITICAL_FIELDS.contains(&f.field.as_str()));
            DetectOutcome::Conflict { fields, can_auto_resolve }
        }
    }
}

fn diff_fields(local: &Value, remote: &Value) -> Vec<FieldConflict> {
    let (Value::Object(local_obj), Value::Object(remote_obj)) = (local, remote) else {
        return vec![FieldConflict { field: String::new(), kind: classify(local, remote) }];
    };

    let mut keys: Vec<&String> = local_obj.keys().chain(remote_obj.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter(|k| !METADATA_FIELDS.contains(&k.as_str()))
        .filter_map(|key| {
            let l = local_obj.get(key);
            let r = remote_obj.get(key);
            match (l, r) {
                (Some(l), Some(r)) if l == r => None,
                (Some(_), None) => Some(FieldConflict { field: key.clone(), kind: FieldConflictKind::AddedLocal }),
                (None, Some(_)) => Some(FieldConflict { field: key.clone(), kind: FieldConflictKind::AddedRemote }),
                (Some(l), Some(r)) => Some(FieldConflict { field: key.clone(), kind: classify(l, r) }),
                (None, None) => None,
            }
        })
        .collect()
}

fn classify(local: &Value, remote: &Value) -> FieldConflictKind {
    match (local, remote) {
        (Value::Array(_), Value::Array(_)) => FieldConflictKind::ArrayConflict,
        (Value::Object(_), Value::Object(_)) => FieldConflictKind::ObjectConflict,
        (l, r) if std::mem::discriminant(l) != std::mem::discriminant(r) => FieldConflictKind::TypeChange,
        _ => FieldConflictKind::ValueConflict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vv(pairs: &[(&str, u64)]) -> VersionVector {
        VersionVector(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }

    #[test]
    fn identical_documents_are_not_a_conflict_even_with_divergent_vectors() {
        let doc = json!({"status": "open"});
        let outcome = detect(&doc, &doc, &vv(&[("a", 1)]), &vv(&[("b", 1)]));
        assert_eq!(outcome, DetectOutcome::NoConflict);
    }

    #[test]
    fn dominating_local_vector_pushes_local() {
        let outcome = detect(&json!({"a": 1}), &json!({"a": 2}), &vv(&[("d1", 2)]), &vv(&[("d1", 1)]));
        assert_eq!(outcome, DetectOutcome::PushLocal);
    }

    #[test]
    fn concurrent_vectors_with_noncritical_diff_can_auto_resolve() {
        let local = json!({"status": "open", "notes": "a"});
        let remote = json!({"status": "open", "notes": "b"});
        let outcome = detect(&local, &remote, &vv(&[("d1", 1)]), &vv(&[("d2", 1)]));
        match outcome {
            DetectOutcome::Conflict { fields, can_auto_resolve } => {
                assert_eq!(fields, vec![FieldConflict { field: "notes".into(), kind: FieldConflictKind::ValueConflict }]);
                assert!(can_auto_resolve);
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn concurrent_vectors_with_critical_field_diff_cannot_auto_resolve() {
        let local = json!({"status": "open"});
        let remote = json!({"status": "cancelled"});
        let outcome = detect(&local, &remote, &vv(&[("d1", 1)]), &vv(&[("d2", 1)]));
        match outcome {
            DetectOutcome::Conflict { can_auto_resolve, .. } => assert!(!can_auto_resolve),
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn metadata_fields_are_excluded_from_the_diff() {
        let local = json!({"status": "open", "version": 1});
        let remote = json!({"status": "open", "version": 2});
        let outcome = detect(&local, &remote, &vv(&[("d1", 1)]), &vv(&[("d2", 1)]));
        assert_eq!(outcome, DetectOutcome::Conflict { fields: vec![], can_auto_resolve: true });
    }
}
