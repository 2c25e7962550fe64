//! Mutation eligibility policy
//!
//! Decides whether a pod should be mutated at all, before any patch is
//! computed. The checks short-circuit in a fixed order: system namespaces,
//! the already-injected status annotation, the explicit opt-out annotation,
//! and finally the configured pod selector. A malformed selector makes the
//! pod ineligible rather than failing the request.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    LabelSelector, LabelSelectorRequirement, ObjectMeta,
};
use tracing::{error, info};

use crate::{Config, Error, Result, INJECT_ANNOTATION, INJECTED_VALUE, STATUS_ANNOTATION};

/// Check whether the pod described by `metadata` should be mutated.
///
/// Mutation is enabled by default unless explicitly disabled.
pub fn mutation_required(
    ignored_namespaces: &[&str],
    metadata: &ObjectMeta,
    config: &Config,
) -> bool {
    let namespace = metadata.namespace.as_deref().unwrap_or_default();
    let name = metadata.name.as_deref().unwrap_or_default();

    // skip excluded kubernetes system namespaces
    for ignored in ignored_namespaces {
        if namespace == *ignored {
            info!(namespace, name, "skipping mutation in ignored namespace");
            return false;
        }
    }

    let annotations = metadata.annotations.as_ref();
    let annotation = |key: &str| -> &str {
        annotations
            .and_then(|a| a.get(key))
            .map(String::as_str)
            .unwrap_or_default()
    };

    if annotation(STATUS_ANNOTATION).eq_ignore_ascii_case(INJECTED_VALUE) {
        info!(namespace, name, "skipping mutation: already injected");
        return false;
    }

    let inject = annotation(INJECT_ANNOTATION).to_ascii_lowercase();
    if matches!(inject.as_str(), "no" | "false" | "off") {
        info!(namespace, name, "skipping mutation: explicitly disabled");
        return false;
    }

    if let Some(selector) = config.pod_selector.as_ref() {
        match selector_matches(selector, metadata.labels.as_ref()) {
            Ok(true) => {}
            Ok(false) => {
                info!(namespace, name, "skipping mutation: pod selector does not match");
                return false;
            }
            Err(e) => {
                error!(namespace, name, error = %e, "invalid pod selector, skipping mutation");
                return false;
            }
        }
    }

    info!(namespace, name, "mutation required");
    true
}

/// Evaluate a label selector against a pod's labels.
///
/// Implements the standard matchLabels/matchExpressions semantics: an empty
/// selector matches everything, every term must match, and In/NotIn require
/// a non-empty values list while Exists/DoesNotExist forbid one. Keys must
/// be valid qualified names and values valid label values. Evaluation does
/// not short-circuit on a mismatch so a malformed requirement is always
/// reported.
pub fn selector_matches(
    selector: &LabelSelector,
    labels: Option<&BTreeMap<String, String>>,
) -> Result<bool> {
    let empty = BTreeMap::new();
    let labels = labels.unwrap_or(&empty);

    let mut matched = true;

    if let Some(match_labels) = selector.match_labels.as_ref() {
        for (key, value) in match_labels {
            validate_label_key(key)?;
            validate_label_value(value)?;
            matched &= labels.get(key) == Some(value);
        }
    }

    if let Some(expressions) = selector.match_expressions.as_ref() {
        for requirement in expressions {
            matched &= requirement_matches(requirement, labels)?;
        }
    }

    Ok(matched)
}

fn requirement_matches(
    requirement: &LabelSelectorRequirement,
    labels: &BTreeMap<String, String>,
) -> Result<bool> {
    let key = &requirement.key;
    let values = requirement.values.as_deref().unwrap_or_default();

    validate_label_key(key)?;

    match requirement.operator.as_str() {
        "In" => {
            if values.is_empty() {
                return Err(Error::selector(format!(
                    "values must be non-empty for operator In on key {:?}",
                    key
                )));
            }
            for value in values {
                validate_label_value(value)?;
            }
            Ok(labels
                .get(key)
                .is_some_and(|actual| values.iter().any(|v| v == actual)))
        }
        "NotIn" => {
            if values.is_empty() {
                return Err(Error::selector(format!(
                    "values must be non-empty for operator NotIn on key {:?}",
                    key
                )));
            }
            for value in values {
                validate_label_value(value)?;
            }
            Ok(labels
                .get(key)
                .map_or(true, |actual| !values.iter().any(|v| v == actual)))
        }
        "Exists" => {
            if !values.is_empty() {
                return Err(Error::selector(format!(
                    "values must be empty for operator Exists on key {:?}",
                    key
                )));
            }
            Ok(labels.contains_key(key))
        }
        "DoesNotExist" => {
            if !values.is_empty() {
                return Err(Error::selector(format!(
                    "values must be empty for operator DoesNotExist on key {:?}",
                    key
                )));
            }
            Ok(!labels.contains_key(key))
        }
        other => Err(Error::selector(format!(
            "{:?} is not a valid label selector operator",
            other
        ))),
    }
}

/// Validate a label key as a qualified name: an optional DNS subdomain
/// prefix followed by `/`, then a name of at most 63 characters that starts
/// and ends alphanumeric with `-`, `_` and `.` allowed in between.
fn validate_label_key(key: &str) -> Result<()> {
    let valid = match key.split_once('/') {
        Some((prefix, name)) => is_dns_subdomain(prefix) && is_name_segment(name),
        None => is_name_segment(key),
    };
    if valid {
        Ok(())
    } else {
        Err(Error::selector(format!(
            "{:?} is not a valid label key",
            key
        )))
    }
}

/// Validate a label value: empty, or at most 63 characters with the same
/// character rules as a label key's name segment.
fn validate_label_value(value: &str) -> Result<()> {
    if value.is_empty() || is_name_segment(value) {
        Ok(())
    } else {
        Err(Error::selector(format!(
            "{:?} is not a valid label value",
            value
        )))
    }
}

fn is_name_segment(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 63
        && s.starts_with(|c: char| c.is_ascii_alphanumeric())
        && s.ends_with(|c: char| c.is_ascii_alphanumeric())
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn is_dns_subdomain(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 253
        && s.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && label.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
                && label.ends_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        })
}
