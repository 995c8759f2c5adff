use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use kube::core::{
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation},
    DynamicObject,
};
use ops_admission::{
    dispatcher::Warnings,
    util::errors::{Result, StdError},
    OpsRequest, OpsRequestValidator,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub validator: OpsRequestValidator,
    pub metrics: Metrics,
    pub timeout: Duration,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/validate", post(validate_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn validate_handler(
    State(state): State<Arc<AppState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> Result<Json<AdmissionReview<DynamicObject>>, StatusCode> {
    let request: AdmissionRequest<DynamicObject> = review.try_into().map_err(|e| {
        warn!("Malformed admission review: {}", e);
        StatusCode::BAD_REQUEST
    })?;
    Ok(Json(review_request(&state, &request).await.into_review()))
}

fn operation_label(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "create",
        Operation::Update => "update",
        Operation::Delete => "delete",
        Operation::Connect => "connect",
    }
}

/// Answers one admission request. The review is denied when validation
/// fails, errors, or does not finish within the configured timeout.
pub async fn review_request(state: &AppState, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    let operation = operation_label(&request.operation);
    let kind = request.kind.kind.as_str();
    let _timer = state.metrics.measure(operation);
    let response = AdmissionResponse::from(request);

    if !kind.ends_with("OpsRequest") {
        debug!(kind, "Ignoring non OpsRequest kind");
        return response;
    }

    let (result, response) = match tokio::time::timeout(state.timeout, dispatch(state, request)).await {
        Ok(Ok(warnings)) => {
            info!(operation, kind, name = %request.name, "Admitted");
            let mut response = response;
            if !warnings.is_empty() {
                response.warnings = Some(warnings);
            }
            ("allowed".to_string(), response)
        }
        Ok(Err(e)) => {
            if e.is_infrastructure() {
                warn!(operation, kind, name = %request.name, error = %e, "Admission failed");
            } else {
                info!(operation, kind, name = %request.name, error = %e, "Denied");
            }
            (e.metric_label(), response.deny(e.to_string()))
        }
        Err(_) => {
            warn!(operation, kind, name = %request.name, "Admission review timed out");
            (
                "timeout".to_string(),
                response.deny(format!("admission review timed out after {:?}", state.timeout)),
            )
        }
    };
    state.metrics.count(operation, kind, &result);
    response
}

fn decode(obj: Option<&DynamicObject>, field: &str) -> Result<OpsRequest> {
    let obj = obj.ok_or_else(|| StdError::MetadataMissing(format!("admission request has no {field}")))?;
    Ok(OpsRequest::try_from(obj)?)
}

async fn dispatch(state: &AppState, request: &AdmissionRequest<DynamicObject>) -> Result<Warnings> {
    match request.operation {
        Operation::Create => {
            let new = decode(request.object.as_ref(), "object")?;
            state.validator.validate_create(&new).await
        }
        Operation::Update => {
            let old = decode(request.old_object.as_ref(), "oldObject")?;
            let new = decode(request.object.as_ref(), "object")?;
            state.validator.validate_update(&old, &new).await
        }
        Operation::Delete => match decode(request.old_object.as_ref(), "oldObject") {
            Ok(old) => state.validator.validate_delete(&old).await,
            Err(_) => Ok(Warnings::new()),
        },
        Operation::Connect => Ok(Warnings::new()),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use ops_admission::fixtures::{self, InMemoryStore};
    use ops_admission::profile::profile;
    use ops_admission::{DatabaseKind, DatabaseResumer, ObjectKey, ObjectStore, ResourceKind};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    struct NoopResumer;

    #[async_trait]
    impl DatabaseResumer for NoopResumer {
        async fn resume(&self, _: DatabaseKind, _: &ObjectKey) -> Result<()> {
            Ok(())
        }
    }

    /// A store whose reads never complete.
    struct StalledStore;

    #[async_trait]
    impl ObjectStore for StalledStore {
        async fn get(&self, _: &ResourceKind, _: &ObjectKey) -> Result<Option<DynamicObject>> {
            futures::future::pending().await
        }

        async fn list(&self, _: &ResourceKind, _: Option<&str>, _: Option<&str>) -> Result<Vec<DynamicObject>> {
            futures::future::pending().await
        }
    }

    fn state(timeout: Duration) -> Arc<AppState> {
        let store = InMemoryStore::new().with(
            &profile(DatabaseKind::MySQL).database_resource(),
            fixtures::database(
                DatabaseKind::MySQL,
                "demo",
                "my-group",
                json!({ "version": "8.0.35", "replicas": 3, "mode": "GroupReplication" }),
            ),
        );
        Arc::new(AppState {
            validator: OpsRequestValidator::new(Arc::new(store), Arc::new(NoopResumer)),
            metrics: Metrics::new().unwrap(),
            timeout,
        })
    }

    fn scale_request(replicas: i32, apply: &str) -> Value {
        json!({
            "apiVersion": "ops.kubedb.com/v1alpha1",
            "kind": "MySQLOpsRequest",
            "metadata": { "name": "my-scale", "namespace": "demo" },
            "spec": {
                "type": "HorizontalScaling",
                "databaseRef": { "name": "my-group" },
                "horizontalScaling": { "replicas": replicas },
                "apply": apply,
            },
        })
    }

    fn review(operation: &str, object: Value, old_object: Option<Value>) -> Value {
        json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": { "group": "ops.kubedb.com", "version": "v1alpha1", "kind": "MySQLOpsRequest" },
                "resource": { "group": "ops.kubedb.com", "version": "v1alpha1", "resource": "mysqlopsrequests" },
                "name": "my-scale",
                "namespace": "demo",
                "operation": operation,
                "userInfo": { "username": "admin" },
                "object": object,
                "oldObject": old_object,
                "dryRun": false,
            },
        })
    }

    async fn post(state: Arc<AppState>, body: Value) -> (StatusCode, Value) {
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/validate")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn admits_valid_create_with_warning() {
        let state = state(Duration::from_secs(5));
        let (status, body) = post(state.clone(), review("CREATE", scale_request(3, "Always"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"]["uid"], "705ab4f5-6393-11e8-b7cc-42010a800002");
        assert_eq!(body["response"]["allowed"], true);
        assert!(body["response"]["warnings"][0]
            .as_str()
            .unwrap()
            .contains("apply is Always"));
        assert_eq!(
            state
                .metrics
                .requests
                .with_label_values(&["create", "MySQLOpsRequest", "allowed"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn denies_zero_replicas() {
        let state = state(Duration::from_secs(5));
        let (status, body) = post(state.clone(), review("CREATE", scale_request(0, "IfReady"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"]["allowed"], false);
        assert!(body.to_string().contains("replicas count can not be 0"));
        assert_eq!(
            state
                .metrics
                .requests
                .with_label_values(&["create", "MySQLOpsRequest", "invalid"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn denies_immutable_change() {
        let state = state(Duration::from_secs(5));
        let mut new = scale_request(3, "IfReady");
        new["spec"]["databaseRef"]["name"] = json!("my-other");
        let (_, body) = post(state, review("UPDATE", new, Some(scale_request(3, "IfReady")))).await;
        assert_eq!(body["response"]["allowed"], false);
        assert!(body.to_string().contains("spec.databaseRef"));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_review_is_denied_after_timeout() {
        let state = Arc::new(AppState {
            validator: OpsRequestValidator::new(Arc::new(StalledStore), Arc::new(NoopResumer)),
            metrics: Metrics::new().unwrap(),
            timeout: Duration::from_secs(2),
        });
        let (status, body) = post(state.clone(), review("CREATE", scale_request(3, "IfReady"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"]["allowed"], false);
        assert!(body.to_string().contains("admission review timed out after 2s"));
        assert_eq!(
            state
                .metrics
                .requests
                .with_label_values(&["create", "MySQLOpsRequest", "timeout"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn admits_delete() {
        let state = state(Duration::from_secs(5));
        let (_, body) = post(state, review("DELETE", Value::Null, Some(scale_request(0, "IfReady")))).await;
        assert_eq!(body["response"]["allowed"], true);
    }

    #[tokio::test]
    async fn rejects_reviews_without_request() {
        let state = state(Duration::from_secs(5));
        let (status, _) = post(
            state,
            json!({ "apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
