//! Injection configuration
//!
//! The webhook is driven by a single YAML file mounted into the container.
//! It declares the fields to inject into eligible pods and an optional label
//! selector narrowing which pods are eligible. The file is read once at
//! startup and shared read-only across requests.

use std::path::Path;

use k8s_openapi::api::core::v1::{
    EnvVar, NodeSelectorTerm, PodDNSConfigOption, PreferredSchedulingTerm, Toleration,
    TopologySpreadConstraint,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::{Error, Result};

/// Fields injected into eligible pods, as declared in the configuration file
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Environment variables merged into every container of the pod
    #[serde(default)]
    pub env: Vec<EnvVar>,

    /// DNS resolver options merged into the pod's dnsConfig
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_options: Vec<PodDNSConfigOption>,

    /// Node selector terms added to the pod's required node affinity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_node_affinity_terms: Vec<NodeSelectorTerm>,

    /// Weighted scheduling terms added to the pod's preferred node affinity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_node_affinity_terms: Vec<PreferredSchedulingTerm>,

    /// Tolerations merged into the pod spec
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    /// Topology spread constraints merged into the pod spec
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topology_constraints: Vec<TopologySpreadConstraint>,

    /// Drop any podAntiAffinity the pod carries
    #[serde(default)]
    pub remove_pod_anti_affinity: bool,

    /// Restrict injection to pods whose labels match this selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_selector: Option<LabelSelector>,
}

impl Config {
    /// Load the injection configuration from a YAML file.
    ///
    /// The SHA-256 checksum of the raw file is logged so operators can
    /// correlate a running webhook with the ConfigMap revision it was
    /// started from.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
        info!(
            path = %path.display(),
            sha256 = %format!("{:x}", Sha256::digest(&data)),
            "loading injection config"
        );

        let config: Config = serde_yaml::from_slice(&data)
            .map_err(|e| Error::config(format!("failed to parse {}: {}", path.display(), e)))?;
        debug!(?config, "parsed injection config");

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
env:
  - name: DEPLOY_ENV
    value: production
  - name: NODE_NAME
    valueFrom:
      fieldRef:
        fieldPath: spec.nodeName
dnsOptions:
  - name: ndots
    value: "2"
requiredNodeAffinityTerms:
  - matchExpressions:
      - key: kubernetes.io/arch
        operator: In
        values: ["amd64"]
preferredNodeAffinityTerms:
  - weight: 10
    preference:
      matchExpressions:
        - key: topology.kubernetes.io/zone
          operator: In
          values: ["us-east-1a"]
tolerations:
  - key: dedicated
    operator: Equal
    value: batch
    effect: NoSchedule
topologyConstraints:
  - maxSkew: 1
    topologyKey: kubernetes.io/hostname
    whenUnsatisfiable: ScheduleAnyway
    labelSelector:
      matchLabels:
        app: demo
removePodAntiAffinity: true
podSelector:
  matchLabels:
    inject: enabled
  matchExpressions:
    - key: tier
      operator: In
      values: ["web", "worker"]
"#;

    #[test]
    fn parses_full_config() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();

        assert_eq!(config.env.len(), 2);
        assert_eq!(config.env[0].name, "DEPLOY_ENV");
        assert_eq!(config.env[0].value.as_deref(), Some("production"));
        let value_from = config.env[1].value_from.as_ref().unwrap();
        assert_eq!(
            value_from.field_ref.as_ref().unwrap().field_path,
            "spec.nodeName"
        );

        assert_eq!(config.dns_options.len(), 1);
        assert_eq!(config.dns_options[0].name.as_deref(), Some("ndots"));
        assert_eq!(config.dns_options[0].value.as_deref(), Some("2"));

        assert_eq!(config.required_node_affinity_terms.len(), 1);
        assert_eq!(config.preferred_node_affinity_terms.len(), 1);
        assert_eq!(config.preferred_node_affinity_terms[0].weight, 10);

        assert_eq!(config.tolerations.len(), 1);
        assert_eq!(config.tolerations[0].key.as_deref(), Some("dedicated"));

        assert_eq!(config.topology_constraints.len(), 1);
        assert_eq!(config.topology_constraints[0].max_skew, 1);
        assert_eq!(
            config.topology_constraints[0].topology_key,
            "kubernetes.io/hostname"
        );

        assert!(config.remove_pod_anti_affinity);

        let selector = config.pod_selector.as_ref().unwrap();
        let labels = selector.match_labels.as_ref().unwrap();
        assert_eq!(labels.get("inject").map(String::as_str), Some("enabled"));
        let exprs = selector.match_expressions.as_ref().unwrap();
        assert_eq!(exprs[0].key, "tier");
        assert_eq!(exprs[0].operator, "In");
    }

    #[test]
    fn missing_keys_default_to_empty() {
        let config: Config = serde_yaml::from_str("env: []").unwrap();

        assert!(config.env.is_empty());
        assert!(config.dns_options.is_empty());
        assert!(config.tolerations.is_empty());
        assert!(config.topology_constraints.is_empty());
        assert!(config.required_node_affinity_terms.is_empty());
        assert!(config.preferred_node_affinity_terms.is_empty());
        assert!(!config.remove_pod_anti_affinity);
        assert!(config.pod_selector.is_none());
    }

    #[test]
    fn load_reads_and_parses_file() {
        let path = std::env::temp_dir().join(format!(
            "env-injector-config-test-{}.yaml",
            std::process::id()
        ));
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.env.len(), 2);
        assert!(config.pod_selector.is_some());
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = Config::load(Path::new("/nonexistent/envconfig.yaml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("envconfig.yaml"));
    }

    #[test]
    fn load_rejects_malformed_yaml() {
        let path = std::env::temp_dir().join(format!(
            "env-injector-config-bad-{}.yaml",
            std::process::id()
        ));
        std::fs::write(&path, "env: [- broken").unwrap();

        let err = Config::load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("failed to parse"));
    }
}
