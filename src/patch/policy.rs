//! Per-field identity and equality policies
//!
//! Every injectable list field answers two questions about its entries:
//! which existing entry is "the same one" as a desired entry, and whether
//! that entry already carries the desired content. The answers differ per
//! field kind; everything else about list merging is shared and lives in
//! [`super::merge`].

use k8s_openapi::api::core::v1::{
    EnvVar, PodDNSConfigOption, Toleration, TopologySpreadConstraint,
};
use serde::Serialize;

/// How one injectable list field matches and compares its entries.
///
/// `identity` projects an entry to the key used to find its existing
/// counterpart. `attributes_equal` compares two entries attribute by
/// attribute in a fixed, field-specific order; an entry is up to date only
/// when every attribute compares equal, and the first unequal attribute is
/// what triggers a replace.
pub trait MergePolicy {
    /// Entry type of the list being merged
    type Entry: Serialize;

    /// Field name used in log output
    const FIELD: &'static str;

    /// Key used to match a desired entry against existing ones
    fn identity(entry: &Self::Entry) -> &str;

    /// Per-attribute equality between an existing and a desired entry
    fn attributes_equal(existing: &Self::Entry, desired: &Self::Entry) -> Vec<bool>;
}

/// Environment variables match by name; value and value source must agree.
pub struct EnvVarPolicy;

impl MergePolicy for EnvVarPolicy {
    type Entry = EnvVar;
    const FIELD: &'static str = "env";

    fn identity(entry: &EnvVar) -> &str {
        &entry.name
    }

    fn attributes_equal(existing: &EnvVar, desired: &EnvVar) -> Vec<bool> {
        // value is serialized with omitempty upstream, so absent and ""
        // are the same value; valueFrom is a genuine pointer and is not
        vec![
            existing.value.as_deref().unwrap_or_default()
                == desired.value.as_deref().unwrap_or_default(),
            existing.value_from == desired.value_from,
        ]
    }
}

/// DNS resolver options match by option name; only the value is compared.
pub struct DnsOptionPolicy;

impl MergePolicy for DnsOptionPolicy {
    type Entry = PodDNSConfigOption;
    const FIELD: &'static str = "dnsOptions";

    fn identity(entry: &PodDNSConfigOption) -> &str {
        entry.name.as_deref().unwrap_or_default()
    }

    fn attributes_equal(existing: &PodDNSConfigOption, desired: &PodDNSConfigOption) -> Vec<bool> {
        vec![existing.value == desired.value]
    }
}

/// Tolerations match by taint key; operator, effect and value must agree.
/// tolerationSeconds is deliberately left out of the comparison.
pub struct TolerationPolicy;

impl MergePolicy for TolerationPolicy {
    type Entry = Toleration;
    const FIELD: &'static str = "tolerations";

    fn identity(entry: &Toleration) -> &str {
        entry.key.as_deref().unwrap_or_default()
    }

    fn attributes_equal(existing: &Toleration, desired: &Toleration) -> Vec<bool> {
        vec![
            existing.operator.as_deref().unwrap_or_default()
                == desired.operator.as_deref().unwrap_or_default(),
            existing.effect.as_deref().unwrap_or_default()
                == desired.effect.as_deref().unwrap_or_default(),
            existing.value.as_deref().unwrap_or_default()
                == desired.value.as_deref().unwrap_or_default(),
        ]
    }
}

/// Topology spread constraints match by topology key and compare the
/// scheduling-relevant attributes deeply. minDomains is not compared.
pub struct TopologyConstraintPolicy;

impl MergePolicy for TopologyConstraintPolicy {
    type Entry = TopologySpreadConstraint;
    const FIELD: &'static str = "topologyConstraints";

    fn identity(entry: &TopologySpreadConstraint) -> &str {
        &entry.topology_key
    }

    fn attributes_equal(
        existing: &TopologySpreadConstraint,
        desired: &TopologySpreadConstraint,
    ) -> Vec<bool> {
        vec![
            existing.max_skew == desired.max_skew,
            existing.node_affinity_policy == desired.node_affinity_policy,
            existing.node_taints_policy == desired.node_taints_policy,
            existing.when_unsatisfiable == desired.when_unsatisfiable,
            existing.label_selector == desired.label_selector,
            existing.match_label_keys == desired.match_label_keys,
        ]
    }
}
