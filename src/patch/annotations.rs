//! Annotation bookkeeping for mutated pods
//!
//! After injection the pod is stamped with a status annotation so a
//! resubmitted pod is recognized and left alone. The update walks the
//! desired annotations against the pod's current ones, emitting one
//! operation per key.

use std::collections::BTreeMap;

use json_patch::{AddOperation, PatchOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use serde_json::{Map, Value};

/// Emit the operations that write `desired` annotations onto a pod whose
/// current annotations are `existing`.
///
/// Three cases per key, checked in order: with no annotation map at all,
/// the first key adds the whole map; a key that is absent or holds an empty
/// value is added individually; a key with a non-empty value is replaced.
/// Once either add branch runs, the remaining keys are diffed against a
/// blank map, so a single call never mixes adds and replaces after the
/// first add.
pub fn update_annotations(
    existing: Option<&BTreeMap<String, String>>,
    desired: &BTreeMap<String, String>,
) -> Vec<PatchOperation> {
    let blank = BTreeMap::new();
    let mut existing = existing;
    let mut ops = Vec::new();

    for (key, value) in desired {
        match existing {
            None => {
                existing = Some(&blank);
                let mut map = Map::new();
                map.insert(key.clone(), Value::String(value.clone()));
                ops.push(PatchOperation::Add(AddOperation {
                    path: PointerBuf::from_tokens(["metadata", "annotations"]),
                    value: Value::Object(map),
                }));
            }
            Some(current)
                if current
                    .get(key)
                    .map(String::as_str)
                    .unwrap_or_default()
                    .is_empty() =>
            {
                existing = Some(&blank);
                ops.push(PatchOperation::Add(AddOperation {
                    path: PointerBuf::from_tokens(["metadata", "annotations", key.as_str()]),
                    value: Value::String(value.clone()),
                }));
            }
            Some(_) => {
                ops.push(PatchOperation::Replace(ReplaceOperation {
                    path: PointerBuf::from_tokens(["metadata", "annotations", key.as_str()]),
                    value: Value::String(value.clone()),
                }));
            }
        }
    }

    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn add(path: PointerBuf, value: Value) -> PatchOperation {
        PatchOperation::Add(AddOperation { path, value })
    }

    fn replace(path: PointerBuf, value: Value) -> PatchOperation {
        PatchOperation::Replace(ReplaceOperation { path, value })
    }

    // =========================================================================
    // Unit Tests
    // =========================================================================

    #[test]
    fn missing_map_adds_the_whole_map() {
        let desired = annotations(&[("env-injector-webhook-status", "injected")]);

        let ops = update_annotations(None, &desired);

        assert_eq!(
            ops,
            vec![add(
                PointerBuf::from_tokens(["metadata", "annotations"]),
                json!({"env-injector-webhook-status": "injected"}),
            )]
        );
    }

    #[test]
    fn absent_key_adds_just_that_key() {
        let existing = annotations(&[("unrelated", "kept")]);
        let desired = annotations(&[("env-injector-webhook-status", "injected")]);

        let ops = update_annotations(Some(&existing), &desired);

        assert_eq!(
            ops,
            vec![add(
                PointerBuf::from_tokens([
                    "metadata",
                    "annotations",
                    "env-injector-webhook-status",
                ]),
                json!("injected"),
            )]
        );
    }

    #[test]
    fn empty_value_counts_as_absent() {
        let existing = annotations(&[("env-injector-webhook-status", "")]);
        let desired = annotations(&[("env-injector-webhook-status", "injected")]);

        let ops = update_annotations(Some(&existing), &desired);

        assert_eq!(
            ops,
            vec![add(
                PointerBuf::from_tokens([
                    "metadata",
                    "annotations",
                    "env-injector-webhook-status",
                ]),
                json!("injected"),
            )]
        );
    }

    #[test]
    fn populated_key_is_replaced() {
        let existing = annotations(&[("env-injector-webhook-status", "stale")]);
        let desired = annotations(&[("env-injector-webhook-status", "injected")]);

        let ops = update_annotations(Some(&existing), &desired);

        assert_eq!(
            ops,
            vec![replace(
                PointerBuf::from_tokens([
                    "metadata",
                    "annotations",
                    "env-injector-webhook-status",
                ]),
                json!("injected"),
            )]
        );
    }

    // =========================================================================
    // Story Tests
    // =========================================================================

    /// Story: after the whole-map add, later keys go through the add branch
    ///
    /// The first key on an annotation-less pod adds the map; the keys after
    /// it are diffed against a blank map and become individual adds.
    #[test]
    fn story_keys_after_the_map_add_become_individual_adds() {
        let desired = annotations(&[("alpha", "1"), ("beta", "2")]);

        let ops = update_annotations(None, &desired);

        assert_eq!(
            ops,
            vec![
                add(
                    PointerBuf::from_tokens(["metadata", "annotations"]),
                    json!({"alpha": "1"}),
                ),
                add(
                    PointerBuf::from_tokens(["metadata", "annotations", "beta"]),
                    json!("2"),
                ),
            ]
        );
    }

    /// Story: one add flips every later key to an add, even populated ones
    ///
    /// With existing {beta: old} and desired {alpha, beta}, alpha's add
    /// blanks the comparison map, so beta is added rather than replaced.
    /// This pins down the as-shipped behavior.
    #[test]
    fn story_add_branch_blanks_the_comparison_map() {
        let existing = annotations(&[("beta", "old")]);
        let desired = annotations(&[("alpha", "1"), ("beta", "2")]);

        let ops = update_annotations(Some(&existing), &desired);

        assert_eq!(
            ops,
            vec![
                add(
                    PointerBuf::from_tokens(["metadata", "annotations", "alpha"]),
                    json!("1"),
                ),
                add(
                    PointerBuf::from_tokens(["metadata", "annotations", "beta"]),
                    json!("2"),
                ),
            ]
        );
    }
}
