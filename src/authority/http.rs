//! authority::http
//!
//! Authority client over the internal HTTP API.
//!
//! # Design
//!
//! Every call is one request with the internal bearer token. Requests use a
//! fixed timeout and are never retried: an unreachable authority fails the
//! invocation at once.
//!
//! | Operation | Request |
//! |---|---|
//! | repository | `GET /api/internal/repos/{owner}/{name}` |
//! | key | `GET /api/internal/keys/{id}` |
//! | key owner | `GET /api/internal/keys/{id}/user` |
//! | permission | `GET /api/internal/repos/{repo}/users/{user}/permission` |
//! | deploy binding | `GET /api/internal/repos/{repo}/deploy-keys/{key}` |
//! | touch deploy key | `POST /api/internal/repos/{repo}/deploy-keys/{key}/touch` |
//! | touch user key | `POST /api/internal/keys/{id}/touch` |
//! | init wiki | `POST /api/internal/repos/{repo}/wiki/init` |
//!
//! # Example
//!
//! ```ignore
//! use gitward::authority::http::HttpAuthority;
//! use std::time::Duration;
//!
//! let authority = HttpAuthority::new("http://127.0.0.1:3000", Some("token"), Duration::from_secs(60))?;
//! let repo = authority.get_repository("owner", "repo").await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::traits::{AuthorityClient, AuthorityError, Key, Repository, User};
use crate::core::types::{AccessMode, UnitKind};

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = concat!("gitward/", env!("CARGO_PKG_VERSION"));

/// Authority client speaking the internal HTTP API.
pub struct HttpAuthority {
    client: Client,
    /// Base URL without the `/api/internal` suffix
    base_url: String,
    token: Option<String>,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for HttpAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAuthority")
            .field("base_url", &self.base_url)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct PermissionResponse {
    mode: AccessMode,
}

#[derive(Debug, Deserialize)]
struct BindingResponse {
    bound: bool,
}

impl HttpAuthority {
    /// Create a client for the authority at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `AuthorityError::Transport` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, AuthorityError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthorityError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/internal/{}", self.base_url, path)
    }

    fn headers(&self) -> Result<HeaderMap, AuthorityError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                AuthorityError::Transport("internal token is not a valid header value".into())
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        Ok(headers)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AuthorityError> {
        request
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| AuthorityError::Transport(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        what: &str,
    ) -> Result<T, AuthorityError> {
        let response = self.send(self.client.get(self.url(path))).await?;
        let response = check_status(response, what).await?;
        response
            .json()
            .await
            .map_err(|e| AuthorityError::Decode(format!("{}: {}", what, e)))
    }

    async fn post(&self, path: &str, what: &str) -> Result<(), AuthorityError> {
        let response = self.send(self.client.post(self.url(path))).await?;
        check_status(response, what).await?;
        Ok(())
    }
}

/// Map a non-success response to an error.
async fn check_status(response: Response, what: &str) -> Result<Response, AuthorityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(AuthorityError::NotFound(what.to_string()));
    }

    let message = response.text().await.unwrap_or_default();
    Err(AuthorityError::Api {
        status: status.as_u16(),
        message: if message.is_empty() {
            status.canonical_reason().unwrap_or("unknown").to_string()
        } else {
            message
        },
    })
}

#[async_trait]
impl AuthorityClient for HttpAuthority {
    async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, AuthorityError> {
        self.get_json(
            &format!("repos/{}/{}", owner, name),
            &format!("repository {}/{}", owner, name),
        )
        .await
    }

    async fn get_key_by_id(&self, key_id: i64) -> Result<Key, AuthorityError> {
        self.get_json(&format!("keys/{}", key_id), &format!("key {}", key_id))
            .await
    }

    async fn get_user_by_key_id(&self, key_id: i64) -> Result<User, AuthorityError> {
        self.get_json(
            &format!("keys/{}/user", key_id),
            &format!("user for key {}", key_id),
        )
        .await
    }

    async fn check_unit_permission(
        &self,
        user_id: i64,
        repo_id: i64,
        is_admin: bool,
        unit: UnitKind,
    ) -> Result<AccessMode, AuthorityError> {
        let path = format!(
            "repos/{}/users/{}/permission?is_admin={}&unit={}",
            repo_id, user_id, is_admin, unit
        );
        let response: PermissionResponse = self
            .get_json(&path, &format!("permission of user {}", user_id))
            .await?;
        Ok(response.mode)
    }

    async fn has_deploy_key_binding(
        &self,
        key_id: i64,
        repo_id: i64,
    ) -> Result<bool, AuthorityError> {
        let response: BindingResponse = self
            .get_json(
                &format!("repos/{}/deploy-keys/{}", repo_id, key_id),
                &format!("deploy key {} on repository {}", key_id, repo_id),
            )
            .await?;
        Ok(response.bound)
    }

    async fn touch_deploy_key(&self, key_id: i64, repo_id: i64) -> Result<(), AuthorityError> {
        self.post(
            &format!("repos/{}/deploy-keys/{}/touch", repo_id, key_id),
            &format!("deploy key {} on repository {}", key_id, repo_id),
        )
        .await
    }

    async fn touch_user_key(&self, key_id: i64) -> Result<(), AuthorityError> {
        self.post(&format!("keys/{}/touch", key_id), &format!("key {}", key_id))
            .await
    }

    async fn init_wiki_storage(&self, repo_id: i64) -> Result<(), AuthorityError> {
        self.post(
            &format!("repos/{}/wiki/init", repo_id),
            &format!("repository {}", repo_id),
        )
        .await
    }
}
