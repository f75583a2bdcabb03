use derive_more::{Display, Error, From};
use http::StatusCode;
use model::{NewTodo, Todo, TodoId, TodoPatch};
use reqwest::header::COOKIE;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::idp::CookieRelay;

/// Header naming the acting account on task API calls. The task backend
/// widens the visible set to every account's tasks when the named account
/// is an administrator.
pub const USER_ID_HEADER: &str = "X-User-Id";

const GENERIC_SERVER_ERROR: &str = "Something went wrong on the server. Please try again.";

/// Client for the task backend's resource API. Same cookie relay discipline
/// as the identity provider client: browser cookies go out with every call,
/// Set-Cookie answers are collected for the browser.
#[derive(Debug, Clone)]
pub struct TodoClient {
    http: reqwest::Client,
    base: Url,
}

#[derive(Debug, Display, Error, From)]
pub enum BackendError {
    #[display("{message}")]
    #[from(ignore)]
    Api { status: StatusCode, message: String },
    #[display("{_0}")]
    Network(#[error(source)] reqwest::Error),
    #[display("{_0}")]
    Decode(#[error(source)] serde_json::Error),
}

impl BackendError {
    pub fn is_network(&self) -> bool {
        match self {
            BackendError::Network(err) => err.is_connect() || err.is_timeout() || err.is_request(),
            _ => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            BackendError::Network(err) => err.status(),
            BackendError::Decode(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(StatusCode::FORBIDDEN)
    }
}

impl TodoClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(base_url.trim_end_matches('/'))?;
        Ok(Self { http, base })
    }

    pub async fn list(
        &self,
        relay: &mut CookieRelay,
        user_id: Option<&str>,
    ) -> Result<Vec<Todo>, BackendError> {
        let url = self.endpoint(&["api", "todos"]);
        debug!("listing tasks from {url}");
        let request = self.http.get(url);
        self.read_json(relay, user_id, request).await
    }

    pub async fn create(
        &self,
        relay: &mut CookieRelay,
        user_id: Option<&str>,
        title: &str,
    ) -> Result<Todo, BackendError> {
        let url = self.endpoint(&["api", "todos"]);
        let request = self.http.post(url).json(&NewTodo {
            title: title.to_string(),
        });
        self.read_json(relay, user_id, request).await
    }

    pub async fn update(
        &self,
        relay: &mut CookieRelay,
        user_id: Option<&str>,
        id: &TodoId,
        patch: &TodoPatch,
    ) -> Result<Todo, BackendError> {
        let url = self.endpoint(&["api", "todos", &id.to_string()]);
        let request = self.http.patch(url).json(patch);
        self.read_json(relay, user_id, request).await
    }

    pub async fn delete(
        &self,
        relay: &mut CookieRelay,
        user_id: Option<&str>,
        id: &TodoId,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(&["api", "todos", &id.to_string()]);
        let request = self.http.delete(url);
        let response = self.send(relay, user_id, request).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status,
                message: extract_message(status, &text),
            });
        }
        Ok(())
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        relay: &mut CookieRelay,
        user_id: Option<&str>,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = self.send(relay, user_id, request).await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Api {
                status,
                message: extract_message(status, &text),
            });
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn send(
        &self,
        relay: &mut CookieRelay,
        user_id: Option<&str>,
        mut request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BackendError> {
        if let Some(cookie) = relay.cookie() {
            request = request.header(COOKIE, cookie.clone());
        }
        if let Some(user_id) = user_id {
            request = request.header(USER_ID_HEADER, user_id);
        }
        let response = request.send().await?;
        relay.absorb(response.headers());
        Ok(response)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Human-readable message out of a failed backend payload, in the order
/// `message`, `error`, `detail`, `reason`. Plain 500s never leak their body.
fn extract_message(status: StatusCode, body: &str) -> String {
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        return GENERIC_SERVER_ERROR.to_string();
    }
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error", "detail", "reason"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                if !text.is_empty() {
                    return text.to_string();
                }
            }
        }
    }
    format!("Request failed with status {}", status.as_u16())
}
