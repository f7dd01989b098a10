#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! HTTP surface over the review operations.
//!
//! Routes under `/api` act on the default assignment; the same routes under
//! `/api/assignments/{assignment}` act on an imported one. Every store
//! operation runs on the blocking pool and re-reads its files.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{Method, Request, StatusCode, header},
    middleware::{Next, from_fn},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::{
    autocheck::{AutoCheckEngine, CheckStatus, CheckSummary},
    config::{AssignmentContext, AssignmentSummary, Settings},
    error::{Result, ReviewError},
    formatter::format_source,
    import::import_assignment,
    reconcile::{RosterReconciler, StudentDetail, StudentRecord},
};

/// Largest accepted upload (roster plus archive).
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Process settings.
    settings: Arc<Settings>,
}

/// A [`ReviewError`] rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(ReviewError);

impl From<ReviewError> for ApiError {
    fn from(e: ReviewError) -> Self {
        Self(e)
    }
}

impl ApiError {
    /// HTTP status for the wrapped error.
    fn status(&self) -> StatusCode {
        match &self.0 {
            ReviewError::StudentNotFound(_)
            | ReviewError::AssignmentNotFound(_)
            | ReviewError::FolderNotFound(_)
            | ReviewError::FileNotFound { .. } => StatusCode::NOT_FOUND,
            ReviewError::InvalidInput(_)
            | ReviewError::UnsafeArchivePath(_)
            | ReviewError::Archive(_)
            | ReviewError::Encoding(_) => StatusCode::BAD_REQUEST,
            ReviewError::AssignmentExists(_) => StatusCode::CONFLICT,
            ReviewError::FormatterFailed { .. } => StatusCode::BAD_GATEWAY,
            ReviewError::FormatterUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ReviewError::FormatterTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ReviewError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{:#}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Handler result.
type ApiResult<T> = std::result::Result<T, ApiError>;

/// Body of a feedback save.
#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
    /// Comment to store; may be empty.
    feedback: String,
}

/// Resolves the assignment and runs `op` on the blocking pool.
async fn blocking<T, F>(state: &AppState, assignment: Option<String>, op: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&AssignmentContext) -> Result<T> + Send + 'static,
{
    let registry = state.settings.registry();
    tokio::task::spawn_blocking(move || {
        let ctx = registry.resolve(assignment.as_deref())?;
        op(&ctx)
    })
    .await
    .map_err(|e| ReviewError::Storage(anyhow::anyhow!("worker task failed: {e}")))?
    .map_err(ApiError)
}

/// Characters escaped in an RFC 5987 `filename*` parameter.
const RFC5987: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes `value` for an RFC 5987 `filename*` parameter.
fn encode_rfc5987(value: &str) -> String {
    utf8_percent_encode(value, RFC5987).to_string()
}

/// Logs method, path, status and latency of every request.
async fn log_request(req: Request<Body>, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = std::time::Instant::now();

    let response = next.run(req).await;
    tracing::info!(
        "{method} {path} -> {} in {:?}",
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

/// Submitted students.
async fn students_in(
    state: AppState,
    assignment: Option<String>,
) -> ApiResult<Json<Vec<StudentRecord>>> {
    blocking(&state, assignment, |ctx| RosterReconciler::new(ctx).list_students())
        .await
        .map(Json)
}

/// One student's record and files.
async fn student_in(
    state: AppState,
    assignment: Option<String>,
    id: String,
) -> ApiResult<Json<StudentDetail>> {
    blocking(&state, assignment, move |ctx| RosterReconciler::new(ctx).get_student(&id))
        .await
        .map(Json)
}

/// Re-checks one student and stores the result.
async fn auto_check_in(
    state: AppState,
    assignment: Option<String>,
    id: String,
) -> ApiResult<Json<serde_json::Value>> {
    let diagnostic =
        blocking(&state, assignment, move |ctx| AutoCheckEngine::new(ctx).check_student(&id))
            .await?;
    Ok(Json(json!({ "auto_feedback": diagnostic })))
}

/// Saves feedback and marks the student reviewed.
async fn feedback_in(
    state: AppState,
    assignment: Option<String>,
    id: String,
    body: FeedbackBody,
) -> ApiResult<Json<serde_json::Value>> {
    blocking(&state, assignment, move |ctx| {
        RosterReconciler::new(ctx).save_feedback(&id, &body.feedback)
    })
    .await?;
    Ok(Json(json!({ "status": "success" })))
}

/// Formats one student's source.
async fn formatted_in(
    state: AppState,
    assignment: Option<String>,
    id: String,
) -> ApiResult<Json<serde_json::Value>> {
    let ctx = blocking(&state, assignment, |ctx| Ok(ctx.clone())).await?;
    let formatted = format_source(&ctx, &id, state.settings.formatter()).await?;
    Ok(Json(json!({ "formatted": formatted })))
}

/// Checks every submitted student.
async fn auto_check_all_in(
    state: AppState,
    assignment: Option<String>,
) -> ApiResult<Json<CheckSummary>> {
    blocking(&state, assignment, |ctx| AutoCheckEngine::new(ctx).check_all())
        .await
        .map(Json)
}

/// Whether a result set exists.
async fn auto_check_status_in(
    state: AppState,
    assignment: Option<String>,
) -> ApiResult<Json<CheckStatus>> {
    blocking(&state, assignment, |ctx| AutoCheckEngine::new(ctx).status())
        .await
        .map(Json)
}

/// The working roster as a CSV download.
async fn export_csv_in(state: AppState, assignment: Option<String>) -> ApiResult<Response> {
    let (bytes, file_name) = blocking(&state, assignment, |ctx| {
        let reconciler = RosterReconciler::new(ctx);
        Ok((reconciler.export_csv()?, reconciler.export_file_name()))
    })
    .await?;

    let disposition = format!(
        "attachment; filename=\"feedback.csv\"; filename*=UTF-8''{}",
        encode_rfc5987(&file_name)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Default-assignment `GET /api/students`.
async fn students(State(state): State<AppState>) -> ApiResult<Json<Vec<StudentRecord>>> {
    students_in(state, None).await
}

/// `GET /api/assignments/{assignment}/students`.
async fn scoped_students(
    State(state): State<AppState>,
    Path(assignment): Path<String>,
) -> ApiResult<Json<Vec<StudentRecord>>> {
    students_in(state, Some(assignment)).await
}

/// Default-assignment `GET /api/student/{id}`.
async fn student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StudentDetail>> {
    student_in(state, None, id).await
}

/// `GET /api/assignments/{assignment}/student/{id}`.
async fn scoped_student(
    State(state): State<AppState>,
    Path((assignment, id)): Path<(String, String)>,
) -> ApiResult<Json<StudentDetail>> {
    student_in(state, Some(assignment), id).await
}

/// Default-assignment `GET /api/student/{id}/auto-check`.
async fn auto_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    auto_check_in(state, None, id).await
}

/// `GET /api/assignments/{assignment}/student/{id}/auto-check`.
async fn scoped_auto_check(
    State(state): State<AppState>,
    Path((assignment, id)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    auto_check_in(state, Some(assignment), id).await
}

/// Default-assignment `POST /api/student/{id}/feedback`.
async fn feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<FeedbackBody>,
) -> ApiResult<Json<serde_json::Value>> {
    feedback_in(state, None, id, body).await
}

/// `POST /api/assignments/{assignment}/student/{id}/feedback`.
async fn scoped_feedback(
    State(state): State<AppState>,
    Path((assignment, id)): Path<(String, String)>,
    Json(body): Json<FeedbackBody>,
) -> ApiResult<Json<serde_json::Value>> {
    feedback_in(state, Some(assignment), id, body).await
}

/// Default-assignment `GET /api/student/{id}/formatted`.
async fn formatted(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    formatted_in(state, None, id).await
}

/// `GET /api/assignments/{assignment}/student/{id}/formatted`.
async fn scoped_formatted(
    State(state): State<AppState>,
    Path((assignment, id)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    formatted_in(state, Some(assignment), id).await
}

/// Default-assignment `POST /api/auto-check-all`.
async fn auto_check_all(State(state): State<AppState>) -> ApiResult<Json<CheckSummary>> {
    auto_check_all_in(state, None).await
}

/// `POST /api/assignments/{assignment}/auto-check-all`.
async fn scoped_auto_check_all(
    State(state): State<AppState>,
    Path(assignment): Path<String>,
) -> ApiResult<Json<CheckSummary>> {
    auto_check_all_in(state, Some(assignment)).await
}

/// Default-assignment `GET /api/auto-check-status`.
async fn auto_check_status(State(state): State<AppState>) -> ApiResult<Json<CheckStatus>> {
    auto_check_status_in(state, None).await
}

/// `GET /api/assignments/{assignment}/auto-check-status`.
async fn scoped_auto_check_status(
    State(state): State<AppState>,
    Path(assignment): Path<String>,
) -> ApiResult<Json<CheckStatus>> {
    auto_check_status_in(state, Some(assignment)).await
}

/// Default-assignment `GET /api/export/csv`.
async fn export_csv(State(state): State<AppState>) -> ApiResult<Response> {
    export_csv_in(state, None).await
}

/// `GET /api/assignments/{assignment}/export/csv`.
async fn scoped_export_csv(
    State(state): State<AppState>,
    Path(assignment): Path<String>,
) -> ApiResult<Response> {
    export_csv_in(state, Some(assignment)).await
}

/// `GET /api/assignments`.
async fn assignments(State(state): State<AppState>) -> ApiResult<Json<Vec<AssignmentSummary>>> {
    let registry = state.settings.registry();
    let list = tokio::task::spawn_blocking(move || registry.list())
        .await
        .map_err(|e| ReviewError::Storage(anyhow::anyhow!("worker task failed: {e}")))??;
    Ok(Json(list))
}

/// `POST /api/assignments/upload`, multipart with `assignment_name`,
/// `source_file_name`, `csv_file` and `zip_file`.
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        ReviewError::InvalidInput(format!("malformed upload: {e}"))
    };

    let mut name = None;
    let mut source_base = None;
    let mut roster = None;
    let mut archive = None;
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "assignment_name" => name = Some(field.text().await.map_err(invalid)?),
            "source_file_name" => source_base = Some(field.text().await.map_err(invalid)?),
            "csv_file" => roster = Some(field.bytes().await.map_err(invalid)?),
            "zip_file" => archive = Some(field.bytes().await.map_err(invalid)?),
            _ => continue,
        }
    }

    let (Some(name), Some(source_base), Some(roster), Some(archive)) =
        (name, source_base, roster, archive)
    else {
        return Err(ReviewError::InvalidInput(
            "assignment_name, source_file_name, csv_file and zip_file are all required"
                .to_string(),
        )
        .into());
    };

    let root = state.settings.registry().root().to_path_buf();
    let ctx = tokio::task::spawn_blocking(move || {
        import_assignment(&root, &name, &source_base, &roster, &archive)
    })
    .await
    .map_err(|e| ReviewError::Storage(anyhow::anyhow!("worker task failed: {e}")))??;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Imported assignment {}", ctx.name()),
            "assignment_id": ctx.name(),
            "source_file": ctx.source_file_name(),
        })),
    ))
}

/// Builds the application router.
pub fn router(settings: Settings) -> Router {
    let state = AppState {
        settings: Arc::new(settings),
    };
    let scoped = "/api/assignments/{assignment}";

    Router::new()
        .route("/api/students", get(students))
        .route("/api/student/{id}", get(student))
        .route("/api/student/{id}/auto-check", get(auto_check))
        .route("/api/student/{id}/feedback", post(feedback))
        .route("/api/student/{id}/formatted", get(formatted))
        .route("/api/auto-check-all", post(auto_check_all))
        .route("/api/auto-check-status", get(auto_check_status))
        .route("/api/export/csv", get(export_csv))
        .route("/api/assignments", get(assignments))
        .route(
            "/api/assignments/upload",
            post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(&format!("{scoped}/students"), get(scoped_students))
        .route(&format!("{scoped}/student/{{id}}"), get(scoped_student))
        .route(&format!("{scoped}/student/{{id}}/auto-check"), get(scoped_auto_check))
        .route(&format!("{scoped}/student/{{id}}/feedback"), post(scoped_feedback))
        .route(&format!("{scoped}/student/{{id}}/formatted"), get(scoped_formatted))
        .route(&format!("{scoped}/auto-check-all"), post(scoped_auto_check_all))
        .route(&format!("{scoped}/auto-check-status"), get(scoped_auto_check_status))
        .route(&format!("{scoped}/export/csv"), get(scoped_export_csv))
        .layer(from_fn(log_request))
        .layer(
            CorsLayer::very_permissive()
                .expose_headers([header::CONTENT_DISPOSITION, header::CONTENT_TYPE]),
        )
        .with_state(state)
}

/// Serves the API until the process is stopped.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    use anyhow::Context;

    let addr = settings.bind_addr().to_string();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Could not bind {addr}"))?;
    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, router(settings))
        .await
        .context("Server stopped unexpectedly")
}

#[cfg(test)]
mod tests {
    use super::encode_rfc5987;

    #[test]
    fn rfc5987_keeps_unreserved_and_escapes_the_rest() {
        assert_eq!(encode_rfc5987("feedback_k1.csv"), "feedback_k1.csv");
        assert_eq!(encode_rfc5987("課題 1"), "%E8%AA%B2%E9%A1%8C%201");
    }
}
