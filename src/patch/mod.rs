//! Patch synthesis for pod mutation
//!
//! Builds the JSON patch document that injects the configured fields into
//! one pod. Each list-typed field goes through the generic merge engine in
//! [`merge`] with its own identity and equality rules from [`policy`];
//! affinity and annotations have their own shapes and live in [`affinity`]
//! and [`annotations`].

pub mod affinity;
pub mod annotations;
pub mod merge;
pub mod policy;

use std::collections::BTreeMap;

use json_patch::{AddOperation, Patch, PatchOperation};
use jsonptr::PointerBuf;
use k8s_openapi::api::core::v1::{Pod, PodDNSConfig, PodSpec};
use tracing::debug;

use crate::config::Config;
use crate::Result;

use affinity::{merge_node_affinity, remove_pod_anti_affinity};
use annotations::update_annotations;
use merge::merge_list;
use policy::{DnsOptionPolicy, EnvVarPolicy, TolerationPolicy, TopologyConstraintPolicy};

/// Build the full patch for one pod from the injection config plus the
/// annotations to stamp on it.
///
/// Operations are emitted in a fixed field order: container env vars, DNS
/// options, tolerations, topology spread constraints, node affinity, pod
/// anti-affinity removal, annotations. Env vars are merged per container at
/// `/spec/containers/<i>/env`. A pod with no `dnsConfig` at all receives
/// one `add` of the whole object; an existing `dnsConfig` has its options
/// list merged in place.
pub fn create_patch(
    pod: &Pod,
    config: &Config,
    annotations: &BTreeMap<String, String>,
) -> Result<Patch> {
    let empty_spec = PodSpec::default();
    let spec = pod.spec.as_ref().unwrap_or(&empty_spec);

    let mut ops = Vec::new();

    if !config.env.is_empty() {
        for (index, container) in spec.containers.iter().enumerate() {
            let index = index.to_string();
            let base = ["spec", "containers", index.as_str(), "env"];
            let target = container.env.as_deref().unwrap_or_default();
            ops.extend(merge_list::<EnvVarPolicy>(target, &config.env, &base)?);
        }
    }

    if !config.dns_options.is_empty() {
        match spec.dns_config.as_ref() {
            None => {
                debug!("pod has no dnsConfig, adding whole object");
                ops.push(PatchOperation::Add(AddOperation {
                    path: PointerBuf::from_tokens(["spec", "dnsConfig"]),
                    value: serde_json::to_value(PodDNSConfig {
                        options: Some(config.dns_options.clone()),
                        ..PodDNSConfig::default()
                    })?,
                }));
            }
            Some(dns_config) => {
                let target = dns_config.options.as_deref().unwrap_or_default();
                ops.extend(merge_list::<DnsOptionPolicy>(
                    target,
                    &config.dns_options,
                    &["spec", "dnsConfig", "options"],
                )?);
            }
        }
    }

    if !config.tolerations.is_empty() {
        let target = spec.tolerations.as_deref().unwrap_or_default();
        ops.extend(merge_list::<TolerationPolicy>(
            target,
            &config.tolerations,
            &["spec", "tolerations"],
        )?);
    }

    if !config.topology_constraints.is_empty() {
        let target = spec.topology_spread_constraints.as_deref().unwrap_or_default();
        ops.extend(merge_list::<TopologyConstraintPolicy>(
            target,
            &config.topology_constraints,
            &["spec", "topologySpreadConstraints"],
        )?);
    }

    ops.extend(merge_node_affinity(
        spec.affinity.as_ref(),
        &config.required_node_affinity_terms,
        &config.preferred_node_affinity_terms,
    )?);

    if config.remove_pod_anti_affinity {
        ops.extend(remove_pod_anti_affinity(spec.affinity.as_ref()));
    }

    ops.extend(update_annotations(
        pod.metadata.annotations.as_ref(),
        annotations,
    ));

    debug!(operations = ops.len(), "assembled pod patch");
    Ok(Patch(ops))
}
