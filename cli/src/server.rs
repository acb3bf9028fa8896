use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info};

use fitplan_core::PlanError;
use fitplan_core::models::{
    NewProgressLog, NewUser, OnboardingAnswers, OnboardingStatus, PlanRecord, Profile,
    ProgressLog, ProgressSummary, Task, User,
};
use fitplan_core::service::FitService;
use fitplan_core::templates::TemplateLibrary;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB
const DEFAULT_SUMMARY_DAYS: u32 = 7;

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<FitService>>,
}

impl AppState {
    fn svc(&self) -> MutexGuard<'_, FitService> {
        self.svc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The user resolved from the bearer token by `require_auth`.
#[derive(Clone, Debug)]
struct AuthUser(String);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct CreateUserRequest {
    #[serde(default)]
    display_name: String,
}

#[derive(Deserialize)]
struct UpdateTaskRequest {
    completed: bool,
}

#[derive(Deserialize)]
struct SummaryQuery {
    days: Option<u32>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unauthorized,
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Invalid or missing access token".to_string(),
            ),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<PlanError> for ApiError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::Validation(_) => Self::BadRequest(err.to_string()),
            PlanError::NotFound(_) => Self::NotFound(err.to_string()),
            PlanError::Conflict(_) => Self::Conflict(err.to_string()),
            other => Self::Internal(other.into()),
        }
    }
}

fn parse_path_date(s: &str) -> Result<NaiveDate, ApiError> {
    if s == "today" {
        return Ok(today());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD")))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    let user = match token {
        Some(t) => state.svc().authenticate(&t),
        None => Ok(None),
    };

    match user {
        Ok(Some(user)) => {
            request.extensions_mut().insert(AuthUser(user.id));
            next.run(request).await
        }
        Ok(None) => ApiError::Unauthorized.into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<NewUser>), ApiError> {
    let created = state.svc().create_user(&req.display_name)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.svc().get_user(&user_id)?))
}

async fn rotate_token(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<NewUser>, ApiError> {
    Ok(Json(state.svc().rotate_token(&user_id)?))
}

async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<StatusCode, ApiError> {
    state.svc().delete_user(&user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn submit_onboarding(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(answers): Json<OnboardingAnswers>,
) -> Result<(StatusCode, Json<Profile>), ApiError> {
    let profile = state
        .svc()
        .submit_onboarding(&user_id, &answers, today())?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn onboarding_status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<OnboardingStatus>, ApiError> {
    Ok(Json(state.svc().onboarding_status(&user_id)?))
}

async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(state.svc().get_profile(&user_id)?))
}

async fn get_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(date): Path<String>,
) -> Result<Json<PlanRecord>, ApiError> {
    let date = parse_path_date(&date)?;
    Ok(Json(state.svc().plan_for_date(&user_id, date)?))
}

async fn get_plan_today(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PlanRecord>, ApiError> {
    Ok(Json(state.svc().plan_for_date(&user_id, today())?))
}

async fn get_tasks(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(date): Path<String>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let date = parse_path_date(&date)?;
    Ok(Json(state.svc().tasks_for_date(&user_id, date)?))
}

async fn get_tasks_today(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.svc().tasks_for_date(&user_id, today())?))
}

async fn update_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid task id '{id}'")))?;
    Ok(Json(
        state
            .svc()
            .set_task_completed(&user_id, id, req.completed)?,
    ))
}

async fn log_progress(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<NewProgressLog>,
) -> Result<(StatusCode, Json<ProgressLog>), ApiError> {
    let log = state.svc().log_progress(&user_id, &req, today())?;
    Ok((StatusCode::CREATED, Json(log)))
}

async fn progress_summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<ProgressSummary>, ApiError> {
    let days = q.days.unwrap_or(DEFAULT_SUMMARY_DAYS);
    Ok(Json(
        state.svc().progress_summary(&user_id, days, today())?,
    ))
}

async fn get_templates(State(state): State<AppState>, _user: AuthUser) -> Json<TemplateLibrary> {
    Json(state.svc().templates().clone())
}

// --- Router ---

fn build_router(state: AppState) -> Router {
    let authed = Router::new()
        .route("/api/users/me", get(get_me).delete(delete_me))
        .route("/api/users/me/token", post(rotate_token))
        .route("/api/onboarding", post(submit_onboarding))
        .route("/api/onboarding/status", get(onboarding_status))
        .route("/api/profile", get(get_profile))
        .route("/api/plans/today", get(get_plan_today))
        .route("/api/plans/{date}", get(get_plan))
        .route("/api/tasks/today", get(get_tasks_today))
        // GET takes a date, PUT a task id; both share one path segment.
        .route("/api/tasks/{key}", get(get_tasks).put(update_task))
        .route("/api/progress", post(log_progress))
        .route("/api/progress/summary", get(progress_summary))
        .route("/api/templates", get(get_templates))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/users", post(create_user))
        .merge(authed)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: FitService,
    port: u16,
    bind: &str,
    local_token: &str,
) -> anyhow::Result<()> {
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
    };
    let app = build_router(state);

    if local_token.len() > 8 {
        eprintln!(
            "Local user token: {}...{} (see local_user file in data directory)",
            &local_token[..4],
            &local_token[local_token.len() - 4..],
        );
    }
    if bind != "127.0.0.1" && bind != "localhost" {
        eprintln!(
            "Warning: Listening on {bind}. Anyone on your network can create users on this server."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    info!(%bind, port, "server started");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            svc: Arc::new(Mutex::new(FitService::new_in_memory().unwrap())),
        }
    }

    fn token_for(state: &AppState) -> String {
        state.svc().create_user("Sam").unwrap().token
    }

    fn answers() -> serde_json::Value {
        serde_json::json!({
            "full_name": "Sam Rivera",
            "age_group": "26-35",
            "gender": "Male",
            "height_cm": 175.0,
            "weight_kg": 75.0,
            "activity_level": "Moderate",
            "diet_type": "Balanced",
            "allergies": [],
            "primary_goal": "Maintain",
            "equipment_access": "None"
        })
    }

    async fn send(
        state: &AppState,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    async fn onboarded() -> (AppState, String) {
        let state = test_state();
        let token = token_for(&state);
        let (status, _) = send(
            &state,
            "POST",
            "/api/onboarding",
            Some(&token),
            Some(answers()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        (state, token)
    }

    #[tokio::test]
    async fn health_needs_no_auth() {
        let state = test_state();
        let (status, json) = send(&state, "GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn missing_token_returns_401() {
        let state = test_state();
        let (status, json) = send(&state, "GET", "/api/profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "Invalid or missing access token");
    }

    #[tokio::test]
    async fn wrong_token_returns_401() {
        let state = test_state();
        token_for(&state);
        let (status, _) = send(&state, "GET", "/api/profile", Some("nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn every_user_route_requires_auth() {
        let state = test_state();
        for (method, uri) in [
            ("GET", "/api/users/me"),
            ("POST", "/api/users/me/token"),
            ("DELETE", "/api/users/me"),
            ("POST", "/api/onboarding"),
            ("GET", "/api/onboarding/status"),
            ("GET", "/api/profile"),
            ("GET", "/api/plans/today"),
            ("GET", "/api/plans/2024-05-01"),
            ("GET", "/api/tasks/today"),
            ("GET", "/api/tasks/2024-05-01"),
            ("PUT", "/api/tasks/1"),
            ("POST", "/api/progress"),
            ("GET", "/api/progress/summary"),
            ("GET", "/api/templates"),
        ] {
            let (status, _) = send(&state, method, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn create_user_returns_token() {
        let state = test_state();
        let (status, json) = send(
            &state,
            "POST",
            "/api/users",
            None,
            Some(serde_json::json!({ "display_name": "Sam" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let token = json["token"].as_str().unwrap();
        let (status, json) =
            send(&state, "GET", "/api/onboarding/status", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["completed"], false);
    }

    #[tokio::test]
    async fn profile_before_onboarding_is_404() {
        let state = test_state();
        let token = token_for(&state);
        let (status, _) = send(&state, "GET", "/api/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&state, "GET", "/api/plans/today", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_onboarding_is_400() {
        let state = test_state();
        let token = token_for(&state);
        let mut bad = answers();
        bad["activity_level"] = serde_json::json!("couch");
        let (status, json) =
            send(&state, "POST", "/api/onboarding", Some(&token), Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("activity level"));
    }

    #[tokio::test]
    async fn onboarding_then_profile_and_plan() {
        let (state, token) = onboarded().await;

        let (status, profile) = send(&state, "GET", "/api/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["full_name"], "Sam Rivera");
        assert!((profile["metrics"]["bmr"].as_f64().unwrap() - 1698.75).abs() < 1e-9);

        let (status, plan) = send(&state, "GET", "/api/plans/today", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(plan["meals"].as_array().unwrap().len(), 4);

        let (status, again) = send(&state, "GET", "/api/plans/today", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(plan["id"], again["id"]);

        let (status, _) =
            send(&state, "GET", "/api/plans/2024-13-01", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tasks_are_idempotent_and_toggle() {
        let (state, token) = onboarded().await;

        let (status, tasks) = send(&state, "GET", "/api/tasks/today", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let tasks = tasks.as_array().unwrap().clone();
        assert_eq!(tasks.len(), 7);

        let (_, again) = send(&state, "GET", "/api/tasks/today", Some(&token), None).await;
        assert_eq!(again.as_array().unwrap().len(), 7);

        let id = tasks[0]["id"].as_i64().unwrap();
        let uri = format!("/api/tasks/{id}");
        let (status, task) = send(
            &state,
            "PUT",
            &uri,
            Some(&token),
            Some(serde_json::json!({ "completed": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(task["completed"], true);
        assert!(task["completed_at"].is_string());

        let (_, task) = send(
            &state,
            "PUT",
            &uri,
            Some(&token),
            Some(serde_json::json!({ "completed": false })),
        )
        .await;
        assert_eq!(task["completed"], false);
        assert!(task["completed_at"].is_null());
    }

    #[tokio::test]
    async fn other_users_task_is_404() {
        let (state, token) = onboarded().await;
        let (_, tasks) = send(&state, "GET", "/api/tasks/today", Some(&token), None).await;
        let id = tasks[0]["id"].as_i64().unwrap();

        let intruder = token_for(&state);
        let (status, _) = send(
            &state,
            "PUT",
            &format!("/api/tasks/{id}"),
            Some(&intruder),
            Some(serde_json::json!({ "completed": true })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn progress_log_and_summary() {
        let (state, token) = onboarded().await;

        let (status, log) = send(
            &state,
            "POST",
            "/api/progress",
            Some(&token),
            Some(serde_json::json!({ "weight_kg": 74.5, "steps": 8000 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(log["steps"], 8000);

        let (status, _) = send(
            &state,
            "POST",
            "/api/progress",
            Some(&token),
            Some(serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, summary) = send(
            &state,
            "GET",
            "/api/progress/summary?days=7",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["days"].as_array().unwrap().len(), 7);
        assert_eq!(summary["totals"]["total_steps"], 8000);

        let (status, _) = send(
            &state,
            "GET",
            "/api/progress/summary?days=5000",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_me_revokes_token() {
        let (state, token) = onboarded().await;
        let (status, _) = send(&state, "DELETE", "/api/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&state, "GET", "/api/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_returns_token_owner() {
        let state = test_state();
        let created = state.svc().create_user("Sam").unwrap();
        let (status, json) =
            send(&state, "GET", "/api/users/me", Some(&created.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["id"], created.user.id.as_str());
        assert_eq!(json["display_name"], "Sam");

        let (status, _) = send(&state, "GET", "/api/users/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn token_rotation_replaces_old_token() {
        let (state, old) = onboarded().await;
        let (status, json) = send(&state, "POST", "/api/users/me/token", Some(&old), None).await;
        assert_eq!(status, StatusCode::OK);
        let new = json["token"].as_str().unwrap().to_string();
        assert_ne!(new, old);

        let (status, _) = send(&state, "GET", "/api/profile", Some(&old), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, profile) = send(&state, "GET", "/api/profile", Some(&new), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["full_name"], "Sam Rivera");
    }

    #[tokio::test]
    async fn templates_listed() {
        let state = test_state();
        let token = token_for(&state);
        let (status, json) = send(&state, "GET", "/api/templates", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!json["meals"].as_array().unwrap().is_empty());
        assert!(!json["workouts"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn security_headers_present() {
        let state = test_state();
        let response = build_router(state)
            .oneshot(
                axum::http::Request::get("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[tokio::test]
    async fn security_headers_on_auth_failure() {
        let state = test_state();
        let response = build_router(state)
            .oneshot(
                axum::http::Request::get("/api/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    }
}
