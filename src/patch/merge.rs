//! Generic list-merge patch synthesis
//!
//! One algorithm reconciles every injectable list field: walk the desired
//! entries in order, find each one's counterpart in the existing list via
//! the field's [`MergePolicy`], and emit the single patch operation (add,
//! append or replace) that entry needs. The per-field policies live in
//! [`super::policy`]; this module owns the shared decision logic and path
//! synthesis.

use json_patch::{AddOperation, PatchOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use tracing::{debug, info};

use super::policy::MergePolicy;
use crate::Result;

/// Merge decision for one desired entry, computed once per entry by
/// scanning the full target list
#[derive(Clone, Copy, Debug, PartialEq)]
enum Decision {
    /// No list exists at the base path yet; create it around this entry
    CreateArray,
    /// No existing entry shares this identity; append to the list
    Append,
    /// The last matching entry differs in some attribute; overwrite it
    Replace(usize),
    /// The matching entry already carries the desired content
    Skip,
}

/// Operations accumulated during one merge call.
///
/// A Skip decision discards every operation accumulated earlier in the same
/// call, so the emitted set is exactly the operations generated after the
/// last Skip in desired-entry order.
#[derive(Debug, Default)]
struct PendingPatchSet {
    ops: Vec<PatchOperation>,
}

impl PendingPatchSet {
    fn push(&mut self, op: PatchOperation) {
        self.ops.push(op);
    }

    fn reset(&mut self) {
        self.ops.clear();
    }

    fn into_ops(self) -> Vec<PatchOperation> {
        self.ops
    }
}

/// Reconcile `desired` entries against the `target` list, emitting the
/// patch operations that bring the list up to date.
///
/// `base` holds the pointer tokens addressing the list on the pod, e.g.
/// `["spec", "tolerations"]`. Per desired entry, in order: the first entry
/// against a missing or empty list seeds it with a whole-array `add`; an
/// entry with no identity match appends at `base/-`; an entry whose match
/// differs in some attribute replaces at `base/<index>`; an entry whose
/// match is already up to date resets the pending set (see
/// [`PendingPatchSet`]). If the target carries duplicate identities, the
/// last match decides.
pub fn merge_list<P: MergePolicy>(
    target: &[P::Entry],
    desired: &[P::Entry],
    base: &[&str],
) -> Result<Vec<PatchOperation>> {
    let mut pending = PendingPatchSet::default();
    let mut creating = target.is_empty();
    if creating {
        debug!(field = P::FIELD, "no existing entries, will create new array");
    } else {
        debug!(
            field = P::FIELD,
            existing = target.len(),
            "found existing entries"
        );
    }

    for entry in desired {
        let decision = if creating {
            creating = false;
            Decision::CreateArray
        } else {
            decide::<P>(target, entry)
        };

        match decision {
            Decision::CreateArray => {
                debug!(
                    field = P::FIELD,
                    name = P::identity(entry),
                    "seeding new array"
                );
                pending.push(PatchOperation::Add(AddOperation {
                    path: PointerBuf::from_tokens(base.iter().copied()),
                    value: serde_json::to_value(std::slice::from_ref(entry))?,
                }));
            }
            Decision::Append => {
                info!(field = P::FIELD, name = P::identity(entry), "adding new entry");
                pending.push(PatchOperation::Add(AddOperation {
                    path: PointerBuf::from_tokens(base.iter().copied().chain(["-"])),
                    value: serde_json::to_value(entry)?,
                }));
            }
            Decision::Replace(index) => {
                info!(
                    field = P::FIELD,
                    name = P::identity(entry),
                    index,
                    "updating existing entry"
                );
                let index = index.to_string();
                pending.push(PatchOperation::Replace(ReplaceOperation {
                    path: PointerBuf::from_tokens(base.iter().copied().chain([index.as_str()])),
                    value: serde_json::to_value(entry)?,
                }));
            }
            Decision::Skip => {
                debug!(
                    field = P::FIELD,
                    name = P::identity(entry),
                    "entry already up to date"
                );
                pending.reset();
            }
        }
    }

    Ok(pending.into_ops())
}

/// Scan the whole target list for the desired entry's identity and decide
/// what to do with it. Later matches overwrite earlier ones.
fn decide<P: MergePolicy>(target: &[P::Entry], desired: &P::Entry) -> Decision {
    let mut last_match = None;
    for (index, existing) in target.iter().enumerate() {
        if P::identity(existing) == P::identity(desired) {
            last_match = Some(index);
        }
    }

    match last_match {
        None => Decision::Append,
        Some(index) => {
            if P::attributes_equal(&target[index], desired)
                .iter()
                .all(|equal| *equal)
            {
                Decision::Skip
            } else {
                Decision::Replace(index)
            }
        }
    }
}
