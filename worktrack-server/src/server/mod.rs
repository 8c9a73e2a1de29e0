mod acl;
pub mod auth;
pub mod config;
mod convert;

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use crate::error::CoreError;
use crate::identity::Identity;
use crate::metrics::MetricsAggregator;
use crate::notify::Dispatcher;
use crate::qr::QrManager;
use crate::server::auth::AuthCtx;
use crate::storage::{ScanFilter, Store, TaskFilter};
use crate::workflow::{Submission, WorkflowEngine};
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware;
use axum::response::Response as AxumResponse;
use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::{Method, StatusCode, header},
    routing::{get, post},
};
use chrono::Utc;
pub use config::{AppConfig, ConfigError};
use convert::{
    attendance_dto, breakdown_dto, credential_dto, credential_summary, metrics_dto,
    notification_dto, rfc3339, scan_record_dto, task_dto, user_dto, workflow_ack,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Span, info, info_span};
use uuid::Uuid;
use worktrack_shared::api;
use worktrack_shared::auth::Role;
use worktrack_shared::domain::{ApprovalStatus, TaskStatus};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Store,
    pub identity: Identity,
    pub qr: QrManager,
    pub metrics: MetricsAggregator,
    pub workflow: WorkflowEngine,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig, store: Store) -> Self {
        let dispatcher = Dispatcher::from_config(&config.notifications, &store);
        Self::with_dispatcher(config, store, dispatcher)
    }

    pub fn with_dispatcher(config: AppConfig, store: Store, dispatcher: Dispatcher) -> Self {
        let identity = Identity::new(store.clone(), &config.jwt_secret, config.bcrypt_cost);
        let qr = QrManager::new(store.clone(), &config.jwt_secret);
        let metrics = MetricsAggregator::new(store.clone());
        let workflow = WorkflowEngine::new(store.clone(), metrics.clone(), dispatcher);
        Self {
            config,
            store,
            identity,
            qr,
            metrics,
            workflow,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Creates configured admin accounts whose email is not yet registered.
    pub async fn seed_admins(&self) -> Result<usize, CoreError> {
        let mut created = 0;
        for admin in &self.config.admins {
            if self
                .identity
                .ensure_user_with_hash(&admin.name, &admin.email, &admin.password_hash, Role::Admin)
                .await?
            {
                info!(email = %admin.email, "seed: admin created");
                created += 1;
            }
        }
        Ok(created)
    }
}

#[derive(Clone, Debug)]
struct ReqId(pub String);

pub fn router(state: AppState) -> Router {
    let private = Router::new()
        .route("/api/v1/users", get(api_list_users).post(api_create_user))
        .route("/api/v1/users/{id}/performance", get(api_user_performance))
        .route(
            "/api/v1/users/{id}/qr",
            get(api_get_user_qr).post(api_issue_user_qr),
        )
        .route("/api/v1/users/{id}/qr/scans", get(api_user_qr_scans))
        .route(
            "/api/v1/users/{id}/attendance",
            get(api_list_attendance).post(api_record_attendance),
        )
        .route("/api/v1/tasks", get(api_list_tasks).post(api_create_task))
        .route("/api/v1/tasks/{id}", get(api_get_task))
        .route("/api/v1/tasks/{id}/start", post(api_start_task))
        .route("/api/v1/tasks/{id}/submit-report", post(api_submit_report))
        .route("/api/v1/tasks/{id}/approve", post(api_approve_task))
        .route("/api/v1/tasks/{id}/reject", post(api_reject_task))
        .route(
            "/api/v1/admin/pending-approvals",
            get(api_pending_approvals),
        )
        .route(
            "/api/v1/admin/performance-metrics",
            get(api_performance_metrics),
        )
        .route(
            "/api/v1/admin/performance-metrics/rebuild",
            post(api_rebuild_metrics),
        )
        .route("/api/v1/admin/qr-scans", get(api_admin_qr_scans))
        .route("/api/v1/notifications", get(api_list_notifications))
        .route("/api/v1/notifications/count", get(api_notifications_count))
        .route(
            "/api/v1/notifications/{id}/read",
            post(api_mark_notification_read),
        )
        .route("/api/v1/push/subscriptions", post(api_push_subscribe))
        .route(
            "/api/v1/push/subscriptions/unsubscribe",
            post(api_push_unsubscribe),
        )
        .with_state(state.clone())
        .layer(middleware::from_fn(set_auth_span_fields))
        .layer(middleware::from_fn(acl::enforce_acl))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    // Trace with request context (method, path, request_id)
    let trace = TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
        let request_id = req
            .extensions()
            .get::<ReqId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
            user_id = tracing::field::Empty,
            role = tracing::field::Empty
        )
    });

    let app = Router::new()
        .route("/healthz", get(health))
        .route("/api/v1/version", get(api_version))
        .route("/api/v1/auth/signup", post(api_auth_signup))
        .route("/api/v1/auth/login", post(api_auth_login))
        .route("/api/v1/auth/refresh", post(api_auth_refresh))
        .route("/api/v1/qr/scan", post(api_qr_scan))
        .merge(private)
        .fallback(api_not_found)
        .with_state(state.clone())
        .layer(trace)
        .layer(middleware::from_fn(add_security_headers))
        .layer(middleware::from_fn(add_request_id));

    // Optionally add CORS for dev if configured

    if let Some(origin) = &state.config.dev_cors_origin {
        let hv = header::HeaderValue::from_str(origin)
            .unwrap_or(header::HeaderValue::from_static("http://localhost:5173"));
        let cors = CorsLayer::new()
            .allow_origin(hv)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
        app.layer(cors)
    } else {
        app
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn api_not_found() -> AppError {
    AppError::not_found("not found")
}

async fn api_version() -> Json<api::VersionDto> {
    Json(api::VersionDto {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn add_request_id(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let hdr = HeaderName::from_static("x-request-id");
    // Use provided x-request-id if present, else generate
    let rid = req
        .headers()
        .get(&hdr)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(ReqId(rid.clone()));
    let mut resp = next.run(req).await;
    if let Ok(hv) = HeaderValue::from_str(&rid) {
        resp.headers_mut().insert(hdr, hv);
    }
    Ok(resp)
}

async fn add_security_headers(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let mut resp = next.run(req).await;

    let headers = resp.headers_mut();
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );
    // API responses carry personal data; never cache them
    headers.insert(
        HeaderName::from_static("cache-control"),
        HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
    );

    Ok(resp)
}

async fn set_auth_span_fields(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    if let Some(auth) = req.extensions().get::<AuthCtx>() {
        let span = Span::current();
        span.record("user_id", tracing::field::display(&auth.claims.sub));
        span.record("role", tracing::field::display(&auth.claims.role));
    }
    Ok(next.run(req).await)
}

/// JSON body extractor whose rejections use the `{ok: false, error}` shape.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(
        req: axum::http::Request<axum::body::Body>,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(v)) => Ok(ApiJson(v)),
            Err(rej) => Err(AppError::bad_request(rej.body_text())),
        }
    }
}

/// Query string extractor whose rejections use the `{ok: false, error}` shape.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(v)) => Ok(ApiQuery(v)),
            Err(rej) => Err(AppError::bad_request(rej.body_text())),
        }
    }
}

/// Path parameter extractor whose rejections use the `{ok: false, error}` shape.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(v)) => Ok(ApiPath(v)),
            Err(rej) => Err(AppError::bad_request(rej.body_text())),
        }
    }
}

/// Parses an optional JSON body; an empty body yields `T::default()`.
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::bad_request(e.to_string()))
}

/// Caller address. The first `x-forwarded-for` hop is used only when the
/// socket peer is a configured trusted proxy.
pub struct ClientIp(pub String);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip());
        Ok(ClientIp(resolve_client_ip(
            &parts.headers,
            peer,
            &state.config.trusted_proxies,
        )))
    }
}

fn resolve_client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trusted: &[IpAddr]) -> String {
    let Some(peer) = peer else {
        return "unknown".to_string();
    };
    if !trusted.contains(&peer) {
        return peer.to_string();
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .unwrap_or(peer)
        .to_string()
}

// Auth

async fn api_auth_signup(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<api::SignupReq>,
) -> Result<Json<api::SignupResp>, AppError> {
    // Public signup only ever creates workers
    let user_id = state
        .identity
        .register_user(&body.name, &body.email, &body.password, Role::Worker)
        .await?;
    Ok(Json(api::SignupResp { ok: true, user_id }))
}

async fn api_auth_login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<api::LoginReq>,
) -> Result<Json<api::LoginResp>, AppError> {
    let session = state
        .identity
        .authenticate(&body.email, &body.password)
        .await?;
    Ok(Json(api::LoginResp {
        ok: true,
        user: user_dto(&session.user)?,
        token: session.access_token,
        refresh_token: session.refresh_token,
        expires_in: session.expires_in,
    }))
}

async fn api_auth_refresh(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<api::RefreshReq>,
) -> Result<Json<api::RefreshResp>, AppError> {
    let (token, expires_in) = state.identity.refresh(&body.refresh_token).await?;
    Ok(Json(api::RefreshResp {
        ok: true,
        token,
        expires_in,
    }))
}

// Users

async fn api_list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<api::UserDto>>, AppError> {
    let rows = state.store.list_users().await.map_err(AppError::internal)?;
    let items = rows.iter().map(user_dto).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

async fn api_create_user(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<api::CreateUserReq>,
) -> Result<Json<api::SignupResp>, AppError> {
    let role = body.role.unwrap_or(Role::Worker);
    let user_id = state
        .identity
        .register_user(&body.name, &body.email, &body.password, role)
        .await?;
    Ok(Json(api::SignupResp { ok: true, user_id }))
}

async fn api_user_performance(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<api::EmployeePerformanceDto>, AppError> {
    let (user, breakdown) = state.metrics.employee_performance(&id).await?;
    Ok(Json(api::EmployeePerformanceDto {
        ok: true,
        user: user_dto(&user)?,
        performance: breakdown_dto(&breakdown),
    }))
}

// Tasks

#[derive(Deserialize)]
struct TaskQuery {
    assigned_to: Option<String>,
    status: Option<TaskStatus>,
    approval_status: Option<ApprovalStatus>,
}

async fn api_list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    ApiQuery(q): ApiQuery<TaskQuery>,
) -> Result<Json<Vec<api::TaskDto>>, AppError> {
    // Workers only ever see their own tasks
    let assigned_to = if auth.is_admin() {
        q.assigned_to
    } else {
        Some(auth.user_id().to_string())
    };
    let rows = state
        .store
        .list_tasks(TaskFilter {
            assigned_to,
            status: q.status,
            approval_status: q.approval_status,
        })
        .await
        .map_err(AppError::internal)?;
    let items = rows.iter().map(task_dto).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

async fn api_create_task(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<api::CreateTaskReq>,
) -> Result<Json<api::CreateTaskResp>, AppError> {
    let task = state
        .workflow
        .create_task(&body.title, body.description.as_deref(), &body.assigned_to)
        .await?;
    Ok(Json(api::CreateTaskResp {
        ok: true,
        task_id: task.id,
    }))
}

async fn api_get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<api::TaskDto>, AppError> {
    let task = state
        .store
        .get_task(id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(format!("task not found: {}", id)))?;
    if !auth.is_admin() && task.assigned_to.as_deref() != Some(auth.user_id()) {
        return Err(AppError::forbidden());
    }
    Ok(Json(task_dto(&task)?))
}

async fn api_start_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<api::WorkflowAck>, AppError> {
    let actor = auth.load_user(&state).await?;
    let task = state.workflow.start(id, &actor).await?;
    Ok(Json(workflow_ack(&task)?))
}

async fn api_submit_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(body): ApiJson<api::SubmitReportReq>,
) -> Result<Json<api::WorkflowAck>, AppError> {
    let actor = auth.load_user(&state).await?;
    let task = state
        .workflow
        .submit_report(
            id,
            &actor,
            Submission {
                report: body.daily_report,
                reported_status: body.status,
                hours_spent: body.hours_spent,
            },
        )
        .await?;
    Ok(Json(workflow_ack(&task)?))
}

async fn api_approve_task(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    body: Bytes,
) -> Result<Json<api::WorkflowAck>, AppError> {
    let req: api::ReviewReq = optional_json(&body)?;
    let task = state.workflow.approve(id, req.feedback.as_deref()).await?;
    Ok(Json(workflow_ack(&task)?))
}

async fn api_reject_task(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    body: Bytes,
) -> Result<Json<api::WorkflowAck>, AppError> {
    let req: api::ReviewReq = optional_json(&body)?;
    let task = state
        .workflow
        .reject(id, req.feedback.as_deref().unwrap_or(""))
        .await?;
    Ok(Json(workflow_ack(&task)?))
}

async fn api_pending_approvals(
    State(state): State<AppState>,
) -> Result<Json<Vec<api::PendingApprovalDto>>, AppError> {
    let rows = state
        .store
        .list_pending_approvals()
        .await
        .map_err(AppError::internal)?;
    let items = rows
        .iter()
        .map(|(task, name)| {
            Ok(api::PendingApprovalDto {
                task: task_dto(task)?,
                submitted_by_name: name.clone(),
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;
    Ok(Json(items))
}

// Metrics

async fn api_performance_metrics(
    State(state): State<AppState>,
) -> Result<Json<Vec<api::PerformanceMetricsDto>>, AppError> {
    let views = state.metrics.all_metrics().await?;
    Ok(Json(views.iter().map(metrics_dto).collect()))
}

async fn api_rebuild_metrics(
    State(state): State<AppState>,
) -> Result<Json<api::RebuildMetricsResp>, AppError> {
    let rebuilt = state.metrics.rebuild_all().await?;
    Ok(Json(api::RebuildMetricsResp { ok: true, rebuilt }))
}

// QR credentials

#[derive(Deserialize)]
struct PageOpts {
    page: Option<usize>,
    per_page: Option<usize>,
}

#[derive(Deserialize)]
struct ScanQuery {
    user_id: Option<String>,
    page: Option<usize>,
    per_page: Option<usize>,
}

async fn api_get_user_qr(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<api::QrCredentialDto>, AppError> {
    let credential = state
        .store
        .get_credential(&id)
        .await
        .map_err(AppError::internal)?
        .ok_or(CoreError::CredentialNotFound)?;
    Ok(Json(credential_dto(&credential)))
}

async fn api_issue_user_qr(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<api::QrCredentialDto>, AppError> {
    let credential = state.qr.issue_credential(&id).await?;
    Ok(Json(credential_dto(&credential)))
}

async fn api_qr_scan(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(body): ApiJson<api::ScanReq>,
) -> Result<Json<api::ScanResp>, AppError> {
    let receipt = match (body.payload, body.user_id, body.qr_token) {
        (Some(payload), _, _) => state.qr.scan_payload(&payload, &ip).await?,
        (None, Some(user_id), Some(token)) => state.qr.record_scan(&user_id, &token, &ip).await?,
        _ => {
            return Err(AppError::bad_request(
                "either payload or user_id and qr_token are required",
            ));
        }
    };
    Ok(Json(api::ScanResp {
        ok: true,
        user_id: receipt.user_id,
        scanned_at: receipt.scanned_at.to_rfc3339(),
        scan_count: receipt.scan_count,
    }))
}

async fn api_user_qr_scans(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(opts): ApiQuery<PageOpts>,
) -> Result<Json<api::UserQrScansResp>, AppError> {
    let (credential, scans) = state
        .qr
        .user_scans(
            &id,
            ScanFilter {
                user_id: None,
                page: opts.page.unwrap_or(1),
                per_page: opts.per_page.unwrap_or(100),
            },
        )
        .await?;
    Ok(Json(api::UserQrScansResp {
        ok: true,
        credential: credential.as_ref().map(credential_summary),
        scans: scans
            .iter()
            .map(|r| api::QrScanDto {
                id: r.scan.id,
                scanned_at: rfc3339(r.scan.scanned_at),
                scanner_ip: r.scan.scanner_ip.clone(),
            })
            .collect(),
    }))
}

async fn api_admin_qr_scans(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<ScanQuery>,
) -> Result<Json<api::QrScanRecordsResp>, AppError> {
    let records = state
        .qr
        .list_scans(ScanFilter {
            user_id: q.user_id,
            page: q.page.unwrap_or(1),
            per_page: q.per_page.unwrap_or(100),
        })
        .await?;
    Ok(Json(api::QrScanRecordsResp {
        ok: true,
        records: records.iter().map(scan_record_dto).collect(),
    }))
}

// Attendance

async fn api_record_attendance(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<api::AttendanceReq>,
) -> Result<Json<api::AttendanceResp>, AppError> {
    let row = state
        .store
        .record_attendance(&id, body.action, Utc::now().naive_utc())
        .await
        .map_err(AppError::internal)?;
    info!(user_id = %id, action = %body.action, "attendance: recorded");
    Ok(Json(api::AttendanceResp {
        ok: true,
        id: row.id,
        recorded_at: rfc3339(row.recorded_at),
    }))
}

async fn api_list_attendance(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Vec<api::AttendanceDto>>, AppError> {
    let rows = state
        .store
        .list_attendance(&id)
        .await
        .map_err(AppError::internal)?;
    let items = rows
        .iter()
        .map(attendance_dto)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

// Notifications

#[derive(Deserialize)]
struct NotificationQuery {
    #[serde(default)]
    unread_only: bool,
    limit: Option<i64>,
}

async fn api_list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    ApiQuery(q): ApiQuery<NotificationQuery>,
) -> Result<Json<Vec<api::NotificationDto>>, AppError> {
    let rows = state
        .store
        .list_notifications(auth.user_id(), q.unread_only, q.limit.unwrap_or(50))
        .await
        .map_err(AppError::internal)?;
    let items = rows
        .iter()
        .map(notification_dto)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

async fn api_notifications_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<api::NotificationCountDto>, AppError> {
    let count = state
        .store
        .unread_notification_count(auth.user_id())
        .await
        .map_err(AppError::internal)?;
    Ok(Json(api::NotificationCountDto { count }))
}

async fn api_mark_notification_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<api::OkResp>, AppError> {
    let found = state
        .store
        .mark_notification_read(auth.user_id(), id)
        .await
        .map_err(AppError::internal)?;
    if !found {
        return Err(AppError::not_found(format!(
            "notification not found: {}",
            id
        )));
    }
    Ok(Json(api::OkResp { ok: true }))
}

async fn api_push_subscribe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    ApiJson(body): ApiJson<api::PushSubscribeReq>,
) -> Result<Json<api::OkResp>, AppError> {
    if body.endpoint.trim().is_empty() || body.p256dh.is_empty() || body.auth.is_empty() {
        return Err(AppError::bad_request("endpoint, p256dh and auth are required"));
    }
    state
        .store
        .upsert_push_subscription(auth.user_id(), &body.endpoint, &body.p256dh, &body.auth)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(api::OkResp { ok: true }))
}

async fn api_push_unsubscribe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    ApiJson(body): ApiJson<api::PushUnsubscribeReq>,
) -> Result<Json<api::OkResp>, AppError> {
    state
        .store
        .delete_push_subscription(auth.user_id(), &body.endpoint)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(api::OkResp { ok: true }))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden,
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl AppError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        Self::BadRequest(msg.into())
    }
    fn unauthorized() -> Self {
        Self::Unauthorized("unauthorized".into())
    }
    fn forbidden() -> Self {
        Self::Forbidden
    }
    fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }
    fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(m) => AppError::BadRequest(m),
            CoreError::DuplicateEmail | CoreError::InvalidStateTransition { .. } => {
                AppError::Conflict(e.to_string())
            }
            CoreError::InvalidCredentials | CoreError::InvalidRefreshToken => {
                AppError::Unauthorized(e.to_string())
            }
            CoreError::Forbidden => AppError::Forbidden,
            CoreError::NotFound(m) => AppError::NotFound(m),
            CoreError::CredentialNotFound => AppError::NotFound(e.to_string()),
            CoreError::Storage(_)
            | CoreError::Token(_)
            | CoreError::Qr(_)
            | CoreError::Hash(_)
            | CoreError::Join(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, msg, kind, detail) = match self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m, "bad_request", None),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m, "unauthorized", None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".into(), "forbidden", None),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m, "not_found", None),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m, "conflict", None),
            // Do not leak internal error details to clients, but log them
            AppError::Internal(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".into(),
                "internal",
                Some(m),
            ),
        };
        if let Some(detail) = detail {
            tracing::error!(status = %status, kind = kind, message = %msg, detail = %detail, "request failed");
        } else {
            tracing::warn!(status = %status, kind = kind, message = %msg, "request failed");
        }
        let body = axum::Json(ErrorBody {
            ok: false,
            error: msg,
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarded(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn forwarded_for_is_ignored_from_untrusted_peers() {
        let peer: IpAddr = "203.0.113.7".parse().unwrap();
        let headers = forwarded("10.9.9.9");
        assert_eq!(resolve_client_ip(&headers, Some(peer), &[]), "203.0.113.7");
    }

    #[test]
    fn forwarded_for_is_used_behind_trusted_proxy() {
        let proxy: IpAddr = "127.0.0.1".parse().unwrap();
        let headers = forwarded("198.51.100.4, 10.0.0.1");
        assert_eq!(
            resolve_client_ip(&headers, Some(proxy), &[proxy]),
            "198.51.100.4"
        );
        let garbage = forwarded("not-an-ip");
        assert_eq!(resolve_client_ip(&garbage, Some(proxy), &[proxy]), "127.0.0.1");
        assert_eq!(resolve_client_ip(&HeaderMap::new(), None, &[proxy]), "unknown");
    }
}
