use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::errors::AppError;
use crate::models::moderation::ModerationResult;
use crate::models::token::Token;
use crate::AppState;

// ── Request DTOs ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateTokenParams {
    #[serde(default)]
    pub is_admin: bool,
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /auth/tokens — mint a new bearer token (admin only)
pub async fn create_token(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<Token>,
    Query(params): Query<CreateTokenParams>,
) -> Result<(StatusCode, Json<Token>), AppError> {
    let token = state.auth.create_token(params.is_admin).await?;
    state.auth.log_usage(&admin.token, "/auth/tokens");

    Ok((StatusCode::CREATED, Json(token)))
}

/// GET /auth/tokens — list all tokens (admin only)
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<Token>,
) -> Result<Json<Vec<Token>>, AppError> {
    let tokens = state.auth.list_tokens().await?;
    state.auth.log_usage(&admin.token, "/auth/tokens");

    Ok(Json(tokens))
}

/// DELETE /auth/tokens/:token — delete a token by exact string (admin only)
pub async fn delete_token(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<Token>,
    Path(token_to_delete): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = state.auth.delete_token(&token_to_delete).await?;
    state
        .auth
        .log_usage(&admin.token, &format!("/auth/tokens/{}", token_to_delete));

    if !deleted {
        return Err(AppError::TokenNotFound);
    }

    Ok(Json(json!({ "message": "token deleted successfully" })))
}

/// POST /moderate — analyze an uploaded image for harmful content
pub async fn moderate_image(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<Token>,
    mut multipart: Multipart,
) -> Result<Json<ModerationResult>, AppError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("failed to read upload: {}", e)))?;
            upload = Some((content_type, data.to_vec()));
            break;
        }
    }

    let (content_type, data) =
        upload.ok_or_else(|| AppError::BadRequest("no file uploaded".to_string()))?;

    if !content_type.starts_with("image/") {
        return Err(AppError::BadRequest("file must be an image".to_string()));
    }

    let result = state.analyzer.analyze(data).await?;
    state.auth.log_usage(&token.token, "/moderate");

    Ok(Json(result))
}

/// GET /health — unauthenticated liveness probe
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "timestamp": Utc::now() }))
}
