//! `applyChangesToArray` (spec §4.10): the deterministic fold callers use to
//! keep a locally cached array in sync with a batch of change events.

use serde_json::Value;

use pqo_db::store::ChangeKind;

#[derive(Clone, Debug)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub id: String,
    pub doc: Option<Value>,
}

pub fn apply_changes_to_array(mut current: Vec<Value>, changes: &[ChangeRecord]) -> Vec<Value> {
    for change in changes {
        match change.kind {
            ChangeKind::Added => {
                if !current.iter().any(|v| doc_id(v) == Some(change.id.as_str())) {
                    if let Some(doc) = &change.doc {
                        current.insert(0, doc.clone());
                    }
                }
            }
            ChangeKind::Modified => {
                if let Some(pos) = current.iter().position(|v| doc_id(v) == Some(change.id.as_str())) {
                    if let Some(doc) = &change.doc {
                        current[pos] = doc.clone();
                    }
                }
            }
            ChangeKind::Removed => {
                current.retain(|v| doc_id(v) != Some(change.id.as_str()));
            }
        }
    }
    current
}

fn doc_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn added(id: &str) -> ChangeRecord {
        ChangeRecord { kind: ChangeKind::Added, id: id.to_string(), doc: Some(json!({"id": id})) }
    }

    #[test]
    fn added_prepends_when_id_absent() {
        let current = vec![json!({"id": "a"})];
        let result = apply_changes_to_array(current, &[added("b")]);
        assert_eq!(result, vec![json!({"id": "b"}), json!({"id": "a"})]);
    }

    #[test]
    fn added_is_a_no_op_when_id_already_present() {
        let current = vec![json!({"id": "a"})];
        let result = apply_changes_to_array(current.clone(), &[added("a")]);
        assert_eq!(result, current);
    }

    #[test]
    fn modified_replaces_by_id() {
        let current = vec![json!({"id": "a", "v": 1})];
        let change = ChangeRecord { kind: ChangeKind::Modified, id: "a".into(), doc: Some(json!({"id": "a", "v": 2})) };
        let result = apply_changes_to_array(current, &[change]);
        assert_eq!(result, vec![json!({"id": "a", "v": 2})]);
    }

    #[test]
    fn removed_drops_by_id() {
        let current = vec![json!({"id": "a"}), json!({"id": "b"})];
        let change = ChangeRecord { kind: ChangeKind::Removed, id: "a".into(), doc: None };
        let result = apply_changes_to_array(current, &[change]);
        assert_eq!(result, vec![json!({"id": "b"})]);
    }

    #[test]
    fn changes_apply_in_order() {
        let current = vec![];
        let changes = vec![added("a"), ChangeRecord { kind: ChangeKind::Removed, id: "a".into(), doc: None }];
        let result = apply_changes_to_array(current, &changes);
        assert!(result.is_empty());
    }
}
