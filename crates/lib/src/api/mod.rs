//! HTTP surface.
//!
//! | Route            | Handler                                  |
//! |------------------|------------------------------------------|
//! | `POST /register` | create an identity                       |
//! | `POST /signin`   | exchange credentials for a bearer token  |
//! | `GET /me`        | resolve the bearer token to its email    |
//! | `POST /image-ai` | upload an image and detect one object    |
//! | `GET /health`    | liveness plus store summary              |
//!
//! Auth failures answer with an error status and `{"detail": ...}`; the image
//! endpoint always answers 200, with `{"success": false}` on any failure.

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Query, State,
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::{
    auth::{AuthService, SessionToken},
    pipeline::{Detected, ImageAiResponse, ImagePipeline, PipelineFailure},
};

mod error;

pub use error::ApiError;

/// Largest accepted request body, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Multipart field carrying the image.
const FILE_FIELD: &str = "file";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub pipeline: ImagePipeline,
}

impl AppState {
    pub fn new(auth: AuthService, pipeline: ImagePipeline) -> Self {
        Self { auth, pipeline }
    }
}

/// Build the router with every route and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(handle_register))
        .route("/signin", post(handle_signin))
        .route("/me", get(handle_me))
        .route("/image-ai", post(handle_image_ai))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Authentication Handlers
// ============================================================================

/// Credentials submitted to `/register` and `/signin`.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisteredResponse {
    pub msg: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub email: String,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Handler for POST /register
async fn handle_register(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisteredResponse>), ApiError> {
    let Json(credentials) = body?;
    state
        .auth
        .register(&credentials.email, &credentials.password)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisteredResponse {
            msg: "User registered successfully".to_string(),
        }),
    ))
}

/// Handler for POST /signin
async fn handle_signin(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<SessionToken>, ApiError> {
    let Json(credentials) = body?;
    let token = state
        .auth
        .login(&credentials.email, &credentials.password)
        .await?;
    Ok(Json(token))
}

/// Pull the token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
}

/// Handler for GET /me
///
/// The header wins over the `token` query parameter when both are present.
/// A query string that does not parse counts as no token.
async fn handle_me(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<TokenQuery>, QueryRejection>,
) -> Result<Json<MeResponse>, ApiError> {
    let query_token = match query {
        Ok(Query(query)) => query.token,
        Err(rejection) => {
            tracing::debug!("Ignoring malformed query: {rejection}");
            None
        }
    };
    let token = bearer_token(&headers).or(query_token.as_deref());
    let email = state.auth.who_am_i(token)?;
    Ok(Json(MeResponse { email }))
}

// ============================================================================
// Image Handlers
// ============================================================================

/// Read the first `file` part of a multipart body.
async fn read_file_part(mut multipart: Multipart) -> Result<(Vec<u8>, String), PipelineFailure> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(PipelineFailure::MissingImage),
            Err(e) => {
                tracing::debug!("Malformed multipart body: {e}");
                return Err(PipelineFailure::MissingImage);
            }
        };
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        return match field.bytes().await {
            Ok(bytes) => Ok((bytes.to_vec(), filename)),
            Err(e) => {
                tracing::debug!("Failed to read upload: {e}");
                Err(PipelineFailure::MissingImage)
            }
        };
    }
}

/// Handler for POST /image-ai
async fn handle_image_ai(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Json<ImageAiResponse> {
    let result = match multipart {
        Ok(multipart) => match read_file_part(multipart).await {
            Ok((bytes, filename)) => state.pipeline.handle(bytes, &filename).await,
            Err(failure) => Err(failure),
        },
        Err(rejection) => {
            tracing::debug!("Rejected image request: {rejection}");
            Err(PipelineFailure::MissingImage)
        }
    };

    log_outcome(&result);
    Json(ImageAiResponse::from(result))
}

/// Successes at `info`; every failure kind at `warn`.
fn log_outcome(result: &Result<Detected, PipelineFailure>) {
    match result {
        Ok(found) => tracing::info!(
            url = %found.secure_url,
            object = %found.detection.class_name,
            "Image request succeeded"
        ),
        Err(failure) => tracing::warn!(kind = failure.kind(), "Image request failed: {failure}"),
    }
}

// ============================================================================
// Health
// ============================================================================

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub identities: usize,
}

/// Handler for GET /health
async fn handle_health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let store = state.auth.store();
    let identities = store.count().await?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        store: store.kind().to_string(),
        identities,
    }))
}
