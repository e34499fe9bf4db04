use crate::AppState;
use crate::utils::auth::{Claims, validate_jwt};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

#[derive(Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

/// Bearer header first, then the `token` query parameter.
fn token_from(req: &Request) -> Option<String> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    if auth_header.is_some() {
        return auth_header;
    }

    let query = req.uri().query().unwrap_or_default();
    serde_urlencoded::from_str::<AuthQuery>(query)
        .ok()
        .and_then(|q| q.token)
}

fn claims_from(state: &AppState, req: &Request) -> Option<Claims> {
    let token = token_from(req)?;
    match validate_jwt(&token, &state.config.jwt_secret) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!("Rejected token: {}", e);
            None
        }
    }
}

/// Requires a valid token and exposes its [`Claims`] to the handler.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    match claims_from(&state, &req) {
        Some(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Attaches [`Claims`] when a valid token is present, and lets anonymous
/// requests through.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(claims) = claims_from(&state, &req) {
        req.extensions_mut().insert(claims);
    }
    next.run(req).await
}
