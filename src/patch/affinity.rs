//! Node affinity injection and pod anti-affinity removal
//!
//! Affinity terms carry no identity key, so they do not go through the
//! list-merge engine: a desired term either already exists on the pod (by
//! whole-entry equality) or is appended. When the surrounding object is
//! missing entirely, one `add` creates the deepest absent parent with the
//! desired content inside it.

use json_patch::{AddOperation, PatchOperation, RemoveOperation};
use jsonptr::PointerBuf;
use k8s_openapi::api::core::v1::{
    Affinity, NodeAffinity, NodeSelector, NodeSelectorTerm, PreferredSchedulingTerm,
};
use tracing::{debug, info};

use crate::Result;

/// Emit the operations that install the configured required and preferred
/// node affinity terms on a pod whose current affinity is `current`.
///
/// Both term lists are handled together: when `/spec/affinity` (or
/// `nodeAffinity` beneath it) is absent, a single `add` creates it carrying
/// every configured term at once. When the respective term container
/// exists, each configured term missing from it (by equality) is appended
/// at the end; terms already present emit nothing.
pub fn merge_node_affinity(
    current: Option<&Affinity>,
    required: &[NodeSelectorTerm],
    preferred: &[PreferredSchedulingTerm],
) -> Result<Vec<PatchOperation>> {
    if required.is_empty() && preferred.is_empty() {
        return Ok(Vec::new());
    }

    let node_affinity = match current {
        None => {
            debug!("pod has no affinity, adding whole object");
            let affinity = Affinity {
                node_affinity: Some(desired_node_affinity(required, preferred)),
                ..Affinity::default()
            };
            return Ok(vec![PatchOperation::Add(AddOperation {
                path: PointerBuf::from_tokens(["spec", "affinity"]),
                value: serde_json::to_value(&affinity)?,
            })]);
        }
        Some(affinity) => match affinity.node_affinity.as_ref() {
            None => {
                debug!("pod has no node affinity, adding whole object");
                return Ok(vec![PatchOperation::Add(AddOperation {
                    path: PointerBuf::from_tokens(["spec", "affinity", "nodeAffinity"]),
                    value: serde_json::to_value(desired_node_affinity(required, preferred))?,
                })]);
            }
            Some(node_affinity) => node_affinity,
        },
    };

    let mut ops = Vec::new();

    if !required.is_empty() {
        match node_affinity
            .required_during_scheduling_ignored_during_execution
            .as_ref()
        {
            None => {
                debug!("pod has no required node affinity terms, adding selector");
                ops.push(PatchOperation::Add(AddOperation {
                    path: PointerBuf::from_tokens([
                        "spec",
                        "affinity",
                        "nodeAffinity",
                        "requiredDuringSchedulingIgnoredDuringExecution",
                    ]),
                    value: serde_json::to_value(NodeSelector {
                        node_selector_terms: required.to_vec(),
                    })?,
                }));
            }
            Some(selector) => {
                for term in required {
                    if selector.node_selector_terms.contains(term) {
                        debug!("required node affinity term already present");
                        continue;
                    }
                    info!("appending required node affinity term");
                    ops.push(PatchOperation::Add(AddOperation {
                        path: PointerBuf::from_tokens([
                            "spec",
                            "affinity",
                            "nodeAffinity",
                            "requiredDuringSchedulingIgnoredDuringExecution",
                            "nodeSelectorTerms",
                            "-",
                        ]),
                        value: serde_json::to_value(term)?,
                    }));
                }
            }
        }
    }

    if !preferred.is_empty() {
        match node_affinity
            .preferred_during_scheduling_ignored_during_execution
            .as_ref()
        {
            None => {
                debug!("pod has no preferred node affinity terms, adding list");
                ops.push(PatchOperation::Add(AddOperation {
                    path: PointerBuf::from_tokens([
                        "spec",
                        "affinity",
                        "nodeAffinity",
                        "preferredDuringSchedulingIgnoredDuringExecution",
                    ]),
                    value: serde_json::to_value(preferred)?,
                }));
            }
            Some(existing) => {
                for term in preferred {
                    if existing.contains(term) {
                        debug!("preferred node affinity term already present");
                        continue;
                    }
                    info!("appending preferred node affinity term");
                    ops.push(PatchOperation::Add(AddOperation {
                        path: PointerBuf::from_tokens([
                            "spec",
                            "affinity",
                            "nodeAffinity",
                            "preferredDuringSchedulingIgnoredDuringExecution",
                            "-",
                        ]),
                        value: serde_json::to_value(term)?,
                    }));
                }
            }
        }
    }

    Ok(ops)
}

/// Drop the pod's anti-affinity block when it carries one.
pub fn remove_pod_anti_affinity(current: Option<&Affinity>) -> Vec<PatchOperation> {
    match current.and_then(|affinity| affinity.pod_anti_affinity.as_ref()) {
        Some(_) => {
            info!("removing pod anti-affinity");
            vec![PatchOperation::Remove(RemoveOperation {
                path: PointerBuf::from_tokens(["spec", "affinity", "podAntiAffinity"]),
            })]
        }
        None => Vec::new(),
    }
}

fn desired_node_affinity(
    required: &[NodeSelectorTerm],
    preferred: &[PreferredSchedulingTerm],
) -> NodeAffinity {
    NodeAffinity {
        required_during_scheduling_ignored_during_execution: (!required.is_empty()).then(|| {
            NodeSelector {
                node_selector_terms: required.to_vec(),
            }
        }),
        preferred_during_scheduling_ignored_during_execution: (!preferred.is_empty())
            .then(|| preferred.to_vec()),
    }
}
