use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};

use crate::errors::AppError;
use crate::models::token::Token;
use crate::AppState;

pub mod handlers;

/// Build the service router. Token-management routes require an admin
/// token, `/moderate` any valid token, `/health` none.
pub fn router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route(
            "/auth/tokens",
            get(handlers::list_tokens).post(handlers::create_token),
        )
        .route("/auth/tokens/:token", delete(handlers::delete_token))
        .route_layer(middleware::from_fn(require_admin));

    Router::new()
        .merge(admin_routes)
        .route("/moderate", post(handlers::moderate_image))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Pull the bearer token out of the Authorization header.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Middleware: validates the bearer token against the store and stashes the
/// resolved `Token` in request extensions. Every authenticated request also
/// gets a `validate_token` usage record, business outcome notwithstanding.
async fn require_token(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = extract_bearer(req.headers()).ok_or(AppError::Unauthorized)?;

    let token = state
        .auth
        .validate_token(bearer)
        .await?
        .ok_or(AppError::Unauthorized)?;

    state.auth.log_usage(&token.token, "validate_token");
    req.extensions_mut().insert(token);

    Ok(next.run(req).await)
}

/// Middleware: rejects valid non-admin tokens with 403. Runs inside
/// `require_token`, which put the token in extensions.
async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    match req.extensions().get::<Token>() {
        Some(token) if token.is_admin => Ok(next.run(req).await),
        Some(_) => Err(AppError::Forbidden),
        None => Err(AppError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderValue, StatusCode};
    use axum::Extension;
    use tower::ServiceExt;

    fn test_token(is_admin: bool) -> Token {
        Token {
            token: "modgate_tok_test".into(),
            is_admin,
            created_at: chrono::Utc::now(),
        }
    }

    /// Minimal router with just the admin gate, so the tier check can be
    /// exercised without a database behind `require_token`.
    fn admin_only_router() -> Router {
        Router::new()
            .route("/auth/tokens", get(|| async { "ok" }))
            .route_layer(middleware::from_fn(require_admin))
    }

    #[tokio::test]
    async fn test_admin_route_rejects_non_admin_token() {
        let app = admin_only_router().layer(Extension(test_token(false)));

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/auth/tokens")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_route_allows_admin_token() {
        let app = admin_only_router().layer(Extension(test_token(true)));

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/auth/tokens")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_route_without_validated_token_is_unauthorized() {
        // no Extension layer: the request never passed require_token
        let resp = admin_only_router()
            .oneshot(
                Request::builder()
                    .uri("/auth/tokens")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_reports_healthy() {
        let axum::Json(body) = handlers::health().await;
        assert_eq!(body["status"], "healthy");
        assert!(body["timestamp"].is_string());
    }

    #[test]
    fn test_extract_bearer_strips_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer modgate_tok_abc123"),
        );
        assert_eq!(extract_bearer(&headers), Some("modgate_tok_abc123"));
    }

    #[test]
    fn test_extract_bearer_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(extract_bearer(&headers), None);
    }

    #[test]
    fn test_extract_bearer_missing_header() {
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    #[test]
    fn test_extract_bearer_trims_whitespace() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer  tok  "),
        );
        assert_eq!(extract_bearer(&headers), Some("tok"));
    }
}
