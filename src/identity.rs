//! Bearer-token resolution against the hosted identity service.
//!
//! Tokens are never verified locally: every request asks the identity
//! service who the token belongs to.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Resolve a bearer token. `Ok(None)` means the token is unknown,
    /// expired or revoked.
    async fn user_for_token(&self, token: &str) -> AppResult<Option<Identity>>;
}

/// Client for the identity service's `GET /auth/v1/user` endpoint.
#[derive(Clone)]
pub struct HttpIdentityGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl std::fmt::Debug for HttpIdentityGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIdentityGateway")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: Uuid,
    email: Option<String>,
}

impl HttpIdentityGateway {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl IdentityGateway for HttpIdentityGateway {
    #[tracing::instrument(skip_all)]
    async fn user_for_token(&self, token: &str) -> AppResult<Option<Identity>> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("identity service unreachable: {e}")))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                tracing::debug!(status = %response.status(), "token rejected by identity service");
                Ok(None)
            }
            status if status.is_success() => {
                let user: UserResponse = response
                    .json()
                    .await
                    .map_err(|e| AppError::Upstream(format!("identity response: {e}")))?;
                Ok(Some(Identity {
                    id: user.id,
                    email: user.email,
                }))
            }
            status => Err(AppError::Upstream(format!(
                "identity service returned {status}"
            ))),
        }
    }
}
