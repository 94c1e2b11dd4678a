//! # HTTP Server
//!
//! HTTP server for metrics, health checks and the platform API.
//!
//! Provides endpoints:
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness check (always returns 200)
//! - `/readyz` - Readiness check (returns 200 once startup completed)
//! - `/api/platform/...` - workflows and scaffolder actions
//! - `/api/platform/aws/...` - audited calls against a provider account
//!
//! When an automation key is configured, every `/api/platform` route except
//! `health` requires it as a bearer token.

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument};
use zeroize::Zeroizing;

use crate::actions::{ActionContext, ActionRegistry};
use crate::catalog::Entity;
use crate::aws::ServiceUpdate;
use crate::error::{ActionError, AwsError, CatalogError, PlatformError};
use crate::platform::{
    AppPromoParams, BindResourceParams, EnvironmentProviderRecord, OperationOutcome,
    PlatformService, ProviderAction, ProviderTarget, Requester, StackParams, WorkflowStatus,
};
use crate::scm::{util, RepositoryInfo};

pub struct ServerState {
    pub is_ready: Arc<AtomicBool>,
    pub platform: PlatformService,
    pub actions: Arc<ActionRegistry>,
    pub automation_key: Option<Zeroizing<String>>,
    /// Parent directory of per-invocation action workspaces, each removed
    /// once its action returns
    pub workspace_root: PathBuf,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("is_ready", &self.is_ready.load(Ordering::Relaxed))
            .field("actions", &self.actions)
            .field("workspace_root", &self.workspace_root)
            .finish_non_exhaustive()
    }
}

pub fn router(state: Arc<ServerState>) -> Router {
    let api = Router::new()
        .route("/actions/{id}", post(action_handler))
        .route("/promote", post(promote_handler))
        .route("/bind", post(bind_handler))
        .route("/unbind", post(unbind_handler))
        .route("/providers/attach", post(attach_handler))
        .route("/providers/detach", post(detach_handler))
        .route("/providers/delete", post(delete_provider_handler))
        .nest("/aws", aws_router())
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_automation_key,
        ))
        .route("/health", get(api_health_handler));

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .nest("/api/platform", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the process stops; marks the state ready once bound
pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<(), anyhow::Error> {
    let ready = Arc::clone(&state.is_ready);
    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {}", addr);
    ready.store(true, Ordering::Relaxed);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn require_automation_key(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.automation_key.as_deref() else {
        return next.run(request).await;
    };
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if provided.is_some_and(|key| keys_match(key, expected)) {
        next.run(request).await
    } else {
        warn!("Rejected platform API call without a valid automation key");
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "missing or invalid automation key"})),
        )
            .into_response()
    }
}

/// Compare digests so the time taken does not depend on where the keys differ
fn keys_match(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    provided
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn gather() -> Vec<prometheus::proto::MetricFamily> {
    use crate::observability::metrics::REGISTRY;
    REGISTRY.gather()
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn api_health_handler() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// HTTP status for a failed workflow
fn platform_status(err: &PlatformError) -> StatusCode {
    match err {
        PlatformError::InvalidInput(_)
        | PlatformError::Aws(
            AwsError::InvalidAccount(_) | AwsError::InvalidRegion(_) | AwsError::InvalidArn { .. },
        ) => StatusCode::BAD_REQUEST,
        PlatformError::Catalog(CatalogError::NotFound(_)) => StatusCode::NOT_FOUND,
        PlatformError::ProviderInUse { .. } | PlatformError::AlreadyScheduled(_) => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn workflow_response(result: Result<WorkflowStatus, PlatformError>) -> Response {
    match result {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => (platform_status(&e), Json(WorkflowStatus::failure(e.to_string()))).into_response(),
    }
}

fn action_status(err: &ActionError) -> StatusCode {
    match err {
        ActionError::UnknownAction(_) => StatusCode::NOT_FOUND,
        ActionError::InvalidInput { .. } | ActionError::PathOutsideWorkspace(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionRequest {
    #[serde(default)]
    input: Value,
    #[serde(default)]
    dry_run: bool,
    user: Option<Requester>,
}

async fn action_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(request): Json<ActionRequest>,
) -> Response {
    let invocation = uuid::Uuid::new_v4().to_string();
    let span = info_span!("http.action", action = %id, invocation = %invocation, dry_run = request.dry_run);
    async move {
        let workspace = match create_workspace(&state.workspace_root).await {
            Ok(workspace) => workspace,
            Err(e) => {
                error!("Failed to create action workspace in {}: {}", state.workspace_root.display(), e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": format!("Failed to create workspace: {e}")})),
                )
                    .into_response();
            }
        };
        let ctx = ActionContext::new(request.input, workspace.path().to_path_buf())
            .with_dry_run(request.dry_run)
            .with_user(request.user);
        let result = state.actions.execute(&id, ctx).await;
        if let Err(e) = workspace.close() {
            warn!("Failed to remove action workspace: {}", e);
        }
        match result {
            Ok(output) => (
                StatusCode::OK,
                Json(json!({"output": output, "invocationId": invocation})),
            )
                .into_response(),
            Err(e) => (action_status(&e), Json(json!({"error": e.to_string()}))).into_response(),
        }
    }
    .instrument(span)
    .await
}

/// Scratch directory under `root`, deleted when dropped
async fn create_workspace(root: &std::path::Path) -> std::io::Result<tempfile::TempDir> {
    tokio::fs::create_dir_all(root).await?;
    tempfile::Builder::new().prefix("action-").tempdir_in(root)
}

/// Credentials secret for `repo`, unless the caller named one
fn secret_for(repo: &RepositoryInfo, secret_name: Option<String>) -> Result<String, PlatformError> {
    match secret_name {
        Some(name) => Ok(name),
        None => Ok(util::get_git_credentials_secret(repo.git_provider)?.to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromoteRequest {
    repo: RepositoryInfo,
    input: AppPromoParams,
    secret_name: Option<String>,
}

async fn promote_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<PromoteRequest>,
) -> Response {
    let result: Result<WorkflowStatus, PlatformError> = async {
        let secret = secret_for(&request.repo, request.secret_name)?;
        state
            .platform
            .promote_app_to_git(&request.input, &request.repo, &secret)
            .await
    }
    .await;
    workflow_response(result)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BindRequest {
    repo: RepositoryInfo,
    input: BindResourceParams,
    secret_name: Option<String>,
}

async fn bind_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<BindRequest>,
) -> Response {
    let result: Result<WorkflowStatus, PlatformError> = async {
        let secret = secret_for(&request.repo, request.secret_name)?;
        state
            .platform
            .bind_resource(&request.repo, &request.input, &secret)
            .await
    }
    .await;
    workflow_response(result)
}

async fn unbind_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<BindRequest>,
) -> Response {
    let result: Result<WorkflowStatus, PlatformError> = async {
        let secret = secret_for(&request.repo, request.secret_name)?;
        state
            .platform
            .unbind_resource(&request.repo, &request.input, &secret)
            .await
    }
    .await;
    workflow_response(result)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderChangeRequest {
    environment_ref: String,
    provider: EnvironmentProviderRecord,
}

async fn attach_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ProviderChangeRequest>,
) -> Response {
    workflow_response(
        state
            .platform
            .change_environment_provider(
                &request.environment_ref,
                &request.provider,
                ProviderAction::Add,
            )
            .await,
    )
}

async fn detach_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ProviderChangeRequest>,
) -> Response {
    workflow_response(
        state
            .platform
            .change_environment_provider(
                &request.environment_ref,
                &request.provider,
                ProviderAction::Remove,
            )
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteProviderRequest {
    provider_ref: String,
    user: Option<Requester>,
}

async fn delete_provider_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DeleteProviderRequest>,
) -> Response {
    let result: Result<WorkflowStatus, PlatformError> = async {
        let provider: Entity = state
            .platform
            .catalog()
            .get_entity_by_ref(&request.provider_ref)
            .await?
            .ok_or_else(|| CatalogError::NotFound(request.provider_ref.clone()))?;
        let requester = request.user.unwrap_or_else(|| Requester {
            user_name: crate::constants::AUTOMATION_USER.to_string(),
            ownership_refs: Vec::new(),
        });
        state.platform.delete_provider(&provider, &requester).await
    }
    .await;
    workflow_response(result)
}

// ---------------------------------------------------------------------------
// Provider account operations
// ---------------------------------------------------------------------------

fn aws_router() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/ecs", post(ecs_task_handler))
        .route("/ecs/update-service", post(ecs_update_handler))
        .route("/secrets", post(secret_handler))
        .route("/ssm-parameter", post(parameter_handler))
        .route("/cloudformation/describe-stack", post(describe_stack_handler))
        .route("/cloudformation/describe-stack-events", post(stack_events_handler))
        .route("/cloudformation/create-stack", post(create_stack_handler))
        .route("/cloudformation/update-stack", post(update_stack_handler))
        .route("/cloudformation/delete-stack", post(delete_stack_handler))
        .route("/dynamo-db/query", post(audit_query_handler))
        .route("/eks/describe-cluster", post(eks_cluster_handler))
        .route("/lambda/invoke", post(lambda_handler))
        .route("/s3/create-bucket", post(create_bucket_handler))
        .route("/s3/does-file-exist", post(file_exists_handler))
}

/// Provider target and requester shared by every operation body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationRequest<P> {
    #[serde(flatten)]
    target: ProviderTarget,
    user: Option<Requester>,
    #[serde(flatten)]
    params: P,
}

impl<P> OperationRequest<P> {
    fn requester(&self) -> Requester {
        self.user.clone().unwrap_or_else(|| Requester {
            user_name: crate::constants::AUTOMATION_USER.to_string(),
            ownership_refs: Vec::new(),
        })
    }
}

fn operation_response<T: Serialize>(
    result: Result<OperationOutcome<T>, PlatformError>,
) -> Response {
    match result {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => (platform_status(&e), Json(json!({"error": e.to_string()}))).into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EcsServiceParams {
    cluster_name: String,
    service_name: String,
}

async fn ecs_task_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OperationRequest<EcsServiceParams>>,
) -> Response {
    let requester = request.requester();
    let p = &request.params;
    operation_response(
        state
            .platform
            .get_ecs_service_task(&request.target, &requester, &p.cluster_name, &p.service_name)
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EcsUpdateParams {
    cluster_name: String,
    service_name: String,
    task_definition: Option<String>,
    #[serde(default)]
    restart: bool,
    desired_count: Option<i32>,
}

async fn ecs_update_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OperationRequest<EcsUpdateParams>>,
) -> Response {
    let requester = request.requester();
    let p = &request.params;
    let update = ServiceUpdate {
        cluster: p.cluster_name.clone(),
        service: p.service_name.clone(),
        desired_count: p.desired_count,
        force_new_deployment: p.restart,
        task_definition: p.task_definition.clone(),
    };
    operation_response(
        state
            .platform
            .update_ecs_service(&request.target, &requester, &update)
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretParams {
    secret_arn: String,
}

async fn secret_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OperationRequest<SecretParams>>,
) -> Response {
    let requester = request.requester();
    operation_response(
        state
            .platform
            .get_provider_secret(&request.target, &requester, &request.params.secret_arn)
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParameterParams {
    ssm_param_name: String,
}

async fn parameter_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OperationRequest<ParameterParams>>,
) -> Response {
    let requester = request.requester();
    operation_response(
        state
            .platform
            .get_provider_parameter(&request.target, &requester, &request.params.ssm_param_name)
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StackNameParams {
    stack_name: String,
    #[serde(default)]
    component_name: String,
}

async fn describe_stack_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OperationRequest<StackNameParams>>,
) -> Response {
    let requester = request.requester();
    operation_response(
        state
            .platform
            .describe_provider_stack(&request.target, &requester, &request.params.stack_name)
            .await,
    )
}

async fn stack_events_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OperationRequest<StackNameParams>>,
) -> Response {
    let requester = request.requester();
    operation_response(
        state
            .platform
            .describe_provider_stack_events(&request.target, &requester, &request.params.stack_name)
            .await,
    )
}

async fn create_stack_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OperationRequest<StackParams>>,
) -> Response {
    let requester = request.requester();
    operation_response(
        state
            .platform
            .create_provider_stack(&request.target, &requester, &request.params)
            .await,
    )
}

async fn update_stack_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OperationRequest<StackParams>>,
) -> Response {
    let requester = request.requester();
    operation_response(
        state
            .platform
            .update_provider_stack(&request.target, &requester, &request.params)
            .await,
    )
}

async fn delete_stack_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OperationRequest<StackNameParams>>,
) -> Response {
    let requester = request.requester();
    let p = &request.params;
    operation_response(
        state
            .platform
            .delete_provider_component_stack(&request.target, &requester, &p.component_name, &p.stack_name)
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppParams {
    app_name: String,
}

async fn audit_query_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OperationRequest<AppParams>>,
) -> Response {
    let requester = request.requester();
    operation_response(
        state
            .platform
            .query_audit_records(&request.target, &requester, &request.params.app_name)
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterParams {
    cluster_name: String,
}

async fn eks_cluster_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OperationRequest<ClusterParams>>,
) -> Response {
    let requester = request.requester();
    operation_response(
        state
            .platform
            .describe_provider_cluster(&request.target, &requester, &request.params.cluster_name)
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LambdaParams {
    function_name: String,
    #[serde(default)]
    payload: Value,
}

async fn lambda_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OperationRequest<LambdaParams>>,
) -> Response {
    let requester = request.requester();
    let p = &request.params;
    operation_response(
        state
            .platform
            .invoke_provider_lambda(&request.target, &requester, &p.function_name, &p.payload.to_string())
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketParams {
    bucket_name: String,
}

async fn create_bucket_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OperationRequest<BucketParams>>,
) -> Response {
    let requester = request.requester();
    operation_response(
        state
            .platform
            .create_provider_bucket(&request.target, &requester, &request.params.bucket_name)
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileParams {
    bucket_name: String,
    file_name: String,
}

async fn file_exists_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<OperationRequest<FileParams>>,
) -> Response {
    let requester = request.requester();
    let p = &request.params;
    operation_response(
        state
            .platform
            .does_provider_file_exist(&request.target, &requester, &p.bucket_name, &p.file_name)
            .await,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GitError;

    #[test]
    fn test_platform_error_status_codes() {
        assert_eq!(
            platform_status(&PlatformError::InvalidInput("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            platform_status(&PlatformError::AlreadyScheduled("dup".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            platform_status(&CatalogError::NotFound("e".to_string()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            platform_status(&GitError::Unset.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_keys_match() {
        assert!(keys_match("automation-key", "automation-key"));
        assert!(!keys_match("automation-kez", "automation-key"));
        assert!(!keys_match("automation", "automation-key"));
        assert!(!keys_match("", "automation-key"));
    }

    #[test]
    fn test_invalid_account_is_bad_request() {
        assert_eq!(
            platform_status(&AwsError::InvalidAccount("12".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_action_error_status_codes() {
        assert_eq!(
            action_status(&ActionError::UnknownAction("nope".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            action_status(&ActionError::PathOutsideWorkspace("../x".to_string())),
            StatusCode::BAD_REQUEST
        );
    }
}
