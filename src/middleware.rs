use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD as base64, Engine};

use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    /// Reads `DASHBOARD_USERNAME` / `DASHBOARD_PASSWORD`; both must be set.
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("DASHBOARD_USERNAME").ok()?;
        let password = std::env::var("DASHBOARD_PASSWORD").ok()?;
        Some(Self { username, password })
    }

    fn matches_header(&self, header: Option<&str>) -> bool {
        let encoded = match header.and_then(|h| h.strip_prefix("Basic ")) {
            Some(encoded) => encoded.trim(),
            None => return false,
        };
        let decoded = match base64.decode(encoded) {
            Ok(decoded) => decoded,
            Err(_) => return false,
        };
        let credentials = match String::from_utf8(decoded) {
            Ok(credentials) => credentials,
            Err(_) => return false,
        };

        let mut parts = credentials.splitn(2, ':');
        let username = parts.next().unwrap_or("");
        let password = parts.next().unwrap_or("");
        username == self.username && password == self.password
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(
            header::WWW_AUTHENTICATE,
            "Basic realm=\"Please enter your credentials\"",
        )],
    )
        .into_response()
}

pub async fn basic_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Response {
    let expected = match &state.auth {
        Some(expected) => expected,
        None => return next.run(request).await,
    };

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok());

    if expected.matches_header(auth_header) {
        next.run(request).await
    } else {
        unauthorized()
    }
}
