//! Service account credentials for the reporting API.
//!
//! A key file is read once at construction; access tokens are obtained by
//! exchanging a signed JWT assertion at the key's token endpoint and cached
//! until shortly before they expire.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::{BackendError, PageViewError};

pub const ANALYTICS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, PageViewError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PageViewError::InvalidConfiguration(format!(
                "cannot read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&contents).map_err(|e| match e {
            PageViewError::InvalidConfiguration(msg) => PageViewError::InvalidConfiguration(
                format!("{}: {}", path.display(), msg),
            ),
            other => other,
        })
    }

    pub fn parse(json: &str) -> Result<Self, PageViewError> {
        let key: ServiceAccountKey = serde_json::from_str(json).map_err(|e| {
            PageViewError::InvalidConfiguration(format!("invalid credentials file: {}", e))
        })?;

        if key.key_type != "service_account" {
            return Err(PageViewError::InvalidConfiguration(format!(
                "unsupported credential type {:?}, expected \"service_account\"",
                key.key_type
            )));
        }
        if key.client_email.is_empty() || key.private_key.is_empty() {
            return Err(PageViewError::InvalidConfiguration(
                "credentials file is missing client_email or private_key".to_string(),
            ));
        }
        Ok(key)
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at - Duration::minutes(5)
    }
}

fn fresh(cached: &Option<AccessToken>) -> Option<String> {
    cached
        .as_ref()
        .filter(|token| !token.is_expired())
        .map(|token| token.token.clone())
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    http: reqwest::Client,
    cache: RwLock<Option<AccessToken>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, http: reqwest::Client) -> Self {
        Self {
            key,
            http,
            cache: RwLock::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String, BackendError> {
        if let Some(token) = fresh(&*self.cache.read().await) {
            return Ok(token);
        }

        // one refresh at a time; waiters pick up the token it stored
        let mut cache = self.cache.write().await;
        if let Some(token) = fresh(&cache) {
            return Ok(token);
        }
        let token = self.fetch_token().await?;
        let value = token.token.clone();
        *cache = Some(token);
        Ok(value)
    }

    fn assertion(&self) -> Result<String, BackendError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: ANALYTICS_READONLY_SCOPE,
            aud: &self.key.token_uri,
            exp: now + 3600,
            iat: now,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| BackendError::Auth(format!("invalid private key: {}", e)))?;
        encode(&header, &claims, &encoding_key)
            .map_err(|e| BackendError::Auth(format!("cannot sign assertion: {}", e)))
    }

    async fn fetch_token(&self) -> Result<AccessToken, BackendError> {
        let assertion = self.assertion()?;
        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ];

        debug!("Requesting access token for {}", self.key.client_email);
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| BackendError::Auth(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Auth(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Auth(format!("unreadable token response: {}", e)))?;

        Ok(AccessToken {
            token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }
}
