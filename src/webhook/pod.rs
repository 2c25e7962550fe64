//! Pod Mutation Webhook
//!
//! Handles AdmissionReview requests for Pod resources, injecting the
//! configured environment variables, DNS options, tolerations, topology
//! spread constraints and affinity settings into eligible pods.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, Json};
use k8s_openapi::api::core::v1::Pod;
use kube::core::{
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
    DynamicObject,
};
use tracing::{debug, error, info};

use crate::{
    gate::mutation_required, patch::create_patch, Config, IGNORED_NAMESPACES, INJECTED_VALUE,
    STATUS_ANNOTATION,
};

use super::WebhookState;

/// Handle mutating admission review for Pods
///
/// This handler:
/// 1. Extracts the Pod from the admission review
/// 2. Runs the eligibility gate (namespaces, annotations, pod selector)
/// 3. If eligible, synthesizes the JSON patch for the configured fields
/// 4. Returns the mutated admission response
pub async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<Pod>>,
) -> Json<AdmissionReview<DynamicObject>> {
    // Convert review to request
    let req: AdmissionRequest<Pod> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let response = mutate_pod(&state.config, &req);
    Json(response.into_review())
}

/// Process a single pod mutation request
fn mutate_pod(config: &Config, request: &AdmissionRequest<Pod>) -> AdmissionResponse {
    let uid = &request.uid;

    // Get the pod object
    let pod = match &request.object {
        Some(pod) => pod,
        None => {
            debug!(uid = %uid, "no pod object in request, allowing unchanged");
            return allow_with_message(request, "no pod object in request");
        }
    };

    let name = pod.metadata.name.as_deref().unwrap_or_default();
    let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();

    info!(
        uid = %uid,
        kind = ?request.kind,
        namespace = %namespace,
        name = %name,
        operation = ?request.operation,
        "received admission review request"
    );

    // Determine whether to perform mutation
    if !mutation_required(&IGNORED_NAMESPACES, &pod.metadata, config) {
        info!(
            namespace = %namespace,
            name = %name,
            "skipping mutation per policy check"
        );
        return AdmissionResponse::from(request);
    }

    let annotations = BTreeMap::from([(
        STATUS_ANNOTATION.to_string(),
        INJECTED_VALUE.to_string(),
    )]);

    let patch = match create_patch(pod, config, &annotations) {
        Ok(patch) => patch,
        Err(error) => {
            error!(uid = %uid, error = %error, "failed to build patch");
            return allow_with_message(request, error.to_string());
        }
    };

    info!(
        uid = %uid,
        namespace = %namespace,
        name = %name,
        operations = patch.0.len(),
        "mutating pod"
    );

    match AdmissionResponse::from(request).with_patch(patch) {
        Ok(response) => response,
        Err(error) => {
            error!(uid = %uid, error = %error, "failed to serialize patch");
            allow_with_message(request, format!("patch serialization error: {error}"))
        }
    }
}

/// Build an allowed response that carries an error message in its result.
///
/// Mutation failures are reported to the caller while the pod is admitted
/// unchanged; the webhook never blocks a pod over its own inability to
/// patch it.
fn allow_with_message(request: &AdmissionRequest<Pod>, message: impl ToString) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request).deny(message);
    response.allowed = true;
    response
}
