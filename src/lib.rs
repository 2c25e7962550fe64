//! env-injector - Kubernetes mutating admission webhook for pod field injection
//!
//! The webhook intercepts Pod create/update requests and injects a configured
//! set of fields (environment variables, DNS options, tolerations, topology
//! spread constraints, node affinity, annotations) without disturbing values
//! the pod already carries. Injection is driven entirely by a YAML
//! configuration file loaded at startup; pods opt out per-namespace, per
//! annotation, or via a label selector.
//!
//! # Modules
//!
//! - [`config`] - Injection configuration schema and YAML loading
//! - [`gate`] - Eligibility policy deciding whether a pod is mutated at all
//! - [`patch`] - JSON patch synthesis (list merging, annotations, affinity)
//! - [`webhook`] - Admission review HTTP endpoint
//! - [`error`] - Error types for the webhook

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod gate;
pub mod patch;
pub mod webhook;

pub use config::Config;
pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Well-Known Names
// =============================================================================
// Namespaces and annotation keys the webhook treats specially. Deployment
// manifests and the MutatingWebhookConfiguration reference the same strings,
// so they are centralized here.

/// Namespaces whose pods are never mutated
pub const IGNORED_NAMESPACES: [&str; 2] = ["kube-system", "kube-public"];

/// Annotation that opts a pod out of injection when set to "no", "false" or
/// "off" (case-insensitive)
pub const INJECT_ANNOTATION: &str = "env-injector-webhook-inject";

/// Annotation recording that a pod has already been injected
pub const STATUS_ANNOTATION: &str = "env-injector-webhook-status";

/// Value written to the status annotation once a pod has been mutated
pub const INJECTED_VALUE: &str = "injected";
