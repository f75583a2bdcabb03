use http::StatusCode;
use model::{ErrorEnvelope, Flow, FlowAnswer, FlowType, LogoutTarget, Session};
use reqwest::{
    header::{ACCEPT, COOKIE},
    Method,
};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::debug;
use url::Url;

use super::{CookieRelay, FlowError};

/// HTTP client for the identity provider's self-service endpoints.
///
/// All calls carry the browser's cookies through a [`CookieRelay`] and ask
/// for JSON answers. URLs the provider hands back are normalized so that a
/// provider reachable under an internal hostname (its container name, say)
/// still produces browser-usable links.
#[derive(Debug, Clone)]
pub struct FlowClient {
    http: reqwest::Client,
    base: Url,
}

/// Result of submitting a flow. Only hard failures are errors; a non-2xx
/// answer that carries UI is the flow's next revision and flows back into
/// rendering.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The provider demands a full browser navigation (second factor,
    /// external identity provider, ...).
    BrowserRedirect(String),
    /// Non-2xx answer that still carries UI: validation errors or a step
    /// transition.
    Flow(Box<Flow>),
    /// 2xx answer. What counts as "done" is for the submitting page to
    /// decide.
    Answer(Box<FlowAnswer>),
}

#[derive(Debug)]
pub enum WhoamiOutcome {
    Active(Box<Session>),
    Denied {
        message: String,
        redirect_to: Option<String>,
    },
}

impl FlowClient {
    pub fn new(http: reqwest::Client, public_url: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(public_url.trim_end_matches('/'))?;
        Ok(Self { http, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Issue a new browser flow, or resume an existing one when `flow_id` is
    /// given (logout flows cannot be resumed). `refresh` forces
    /// re-authentication and only applies to login.
    pub async fn fetch_flow(
        &self,
        relay: &mut CookieRelay,
        flow_type: FlowType,
        flow_id: Option<&str>,
        return_to: Option<&str>,
        refresh: bool,
    ) -> Result<Flow, FlowError> {
        let resumes = flow_id.is_some() && flow_type != FlowType::Logout;
        let url = match flow_id {
            Some(id) if flow_type != FlowType::Logout => {
                let mut url = self.endpoint(&["self-service", flow_type.as_str(), "flows"]);
                url.query_pairs_mut().append_pair("id", id);
                url
            }
            _ => {
                let mut url = self.endpoint(&["self-service", flow_type.as_str(), "browser"]);
                {
                    let mut query = url.query_pairs_mut();
                    if let Some(return_to) = return_to {
                        query.append_pair("return_to", return_to);
                    }
                    if flow_type == FlowType::Login && refresh {
                        query.append_pair("refresh", "true");
                    }
                }
                url
            }
        };
        debug!("fetching {flow_type} flow from {url}");

        let response = self.get(relay, url).await?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::GONE {
            return Err(FlowError::Expired {
                flow: flow_type.as_str(),
            });
        }
        if !status.is_success() {
            let envelope: ErrorEnvelope = serde_json::from_str(&text).unwrap_or_default();
            let error_id = envelope.error.as_ref().and_then(|error| error.id.as_deref());
            if error_id == Some("self_service_flow_expired") {
                return Err(FlowError::Expired {
                    flow: flow_type.as_str(),
                });
            }
            if error_id == Some("session_already_available") {
                // The provider's own phrasing varies; pin one the pages can
                // recognize.
                return Err(FlowError::Provider {
                    status: status.as_u16(),
                    message: "You are already logged in.".to_string(),
                });
            }
            let message = envelope
                .error
                .and_then(|error| error.message)
                .or(envelope.message)
                .unwrap_or_else(|| format!("Failed to fetch {flow_type} flow"));
            return Err(FlowError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let mut flow: Flow = serde_json::from_str(&text)?;
        if resumes && flow.is_expired(OffsetDateTime::now_utc()) {
            return Err(FlowError::Expired {
                flow: flow_type.as_str(),
            });
        }
        self.normalize_flow(&mut flow);
        Ok(flow)
    }

    /// Submit a completed form to the flow's action URL. `flow_label` names
    /// the flow in expiry errors.
    pub async fn submit_flow(
        &self,
        relay: &mut CookieRelay,
        action: &str,
        method: &str,
        body: &Map<String, Value>,
        flow_label: &'static str,
    ) -> Result<SubmitOutcome, FlowError> {
        let method =
            Method::from_bytes(method.to_ascii_uppercase().as_bytes()).unwrap_or(Method::POST);
        debug!("submitting flow via {method} {action}");
        let mut request = self
            .http
            .request(method, action)
            .header(ACCEPT, "application/json")
            .json(body);
        if let Some(cookie) = relay.cookie() {
            request = request.header(COOKIE, cookie.clone());
        }
        let response = request.send().await?;
        relay.absorb(response.headers());
        let status = response.status();
        let text = response.text().await?;
        self.triage_submission(status, &text, flow_label)
    }

    fn triage_submission(
        &self,
        status: StatusCode,
        text: &str,
        flow_label: &'static str,
    ) -> Result<SubmitOutcome, FlowError> {
        if status == StatusCode::GONE {
            return Err(FlowError::Expired { flow: flow_label });
        }
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(err) if status.is_success() => return Err(FlowError::Decode(err)),
            Err(_) => {
                return Err(FlowError::Provider {
                    status: status.as_u16(),
                    message: extract_error_message(&Value::Null),
                })
            }
        };

        if !status.is_success() {
            if value
                .get("error")
                .and_then(|error| error.get("id"))
                .and_then(Value::as_str)
                == Some("self_service_flow_expired")
            {
                return Err(FlowError::Expired { flow: flow_label });
            }
            let wants_navigation = value
                .get("error")
                .and_then(|error| error.get("id"))
                .and_then(Value::as_str)
                == Some("browser_location_change_required");
            if wants_navigation {
                if let Some(target) = value.get("redirect_browser_to").and_then(Value::as_str) {
                    return Ok(SubmitOutcome::BrowserRedirect(self.normalize_url(target)));
                }
            }

            let has_ui = value
                .get("ui")
                .map_or(false, |ui| ui.get("nodes").is_some() || ui.get("messages").is_some());
            if has_ui {
                let mut flow: Flow = serde_json::from_value(value)?;
                self.normalize_flow(&mut flow);
                return Ok(SubmitOutcome::Flow(Box::new(flow)));
            }

            return Err(FlowError::Provider {
                status: status.as_u16(),
                message: extract_error_message(&value),
            });
        }

        let mut answer: FlowAnswer = serde_json::from_value(value)?;
        if let Some(ui) = answer.ui.as_mut() {
            ui.action = self.normalize_url(&ui.action);
        }
        Ok(SubmitOutcome::Answer(Box::new(answer)))
    }

    /// Current session, if the browser's cookies still hold one. Denials are
    /// ordinary outcomes, not errors; only transport trouble errors out.
    pub async fn whoami(&self, relay: &mut CookieRelay) -> Result<WhoamiOutcome, FlowError> {
        let url = self.endpoint(&["sessions", "whoami"]);
        let response = self.get(relay, url).await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(WhoamiOutcome::Denied {
                message: "Not authenticated".to_string(),
                redirect_to: None,
            });
        }
        let text = response.text().await?;
        if !status.is_success() {
            let envelope: ErrorEnvelope = serde_json::from_str(&text).unwrap_or_default();
            let redirect_to = envelope
                .redirect_browser_to
                .clone()
                .or_else(|| {
                    envelope
                        .error
                        .as_ref()
                        .and_then(|error| error.details.as_ref())
                        .and_then(|details| details.redirect_browser_to.clone())
                })
                .map(|target| self.normalize_url(&target));
            let message = envelope
                .error
                .and_then(|error| error.message)
                .unwrap_or_else(|| "Session check failed".to_string());
            return Ok(WhoamiOutcome::Denied {
                message,
                redirect_to,
            });
        }
        let session: Session = serde_json::from_str(&text)?;
        Ok(WhoamiOutcome::Active(Box::new(session)))
    }

    /// URL the browser must visit to terminate its session. Never fails: when
    /// the provider cannot be asked, the browser logout endpoint itself is
    /// the fallback target.
    pub async fn logout_url(&self, relay: &mut CookieRelay, return_to: Option<&str>) -> String {
        let mut url = self.endpoint(&["self-service", "logout", "browser"]);
        if let Some(return_to) = return_to {
            url.query_pairs_mut().append_pair("return_to", return_to);
        }
        let fallback = url.to_string();
        let Ok(response) = self.get(relay, url).await else {
            return fallback;
        };
        if !response.status().is_success() {
            return fallback;
        }
        match response.json::<LogoutTarget>().await {
            Ok(target) => self.normalize_url(&target.logout_url),
            Err(_) => fallback,
        }
    }

    /// Rewrite absolute URLs that point at the provider's internal hostname
    /// (same port, different host) to the externally reachable base host.
    /// Unparseable input is passed through untouched.
    pub fn normalize_url(&self, raw: &str) -> String {
        let Ok(mut url) = Url::parse(raw) else {
            return raw.to_string();
        };
        let host = url.host_str().unwrap_or_default().to_string();
        let loopback = host == "localhost" || host == "127.0.0.1";
        let base_host = self.base.host_str().unwrap_or_default();
        if !loopback && host != base_host && url.port() == self.base.port() {
            let base_host = base_host.to_string();
            if url.set_host(Some(base_host.as_str())).is_ok() {
                return url.to_string();
            }
        }
        raw.to_string()
    }

    fn normalize_flow(&self, flow: &mut Flow) {
        flow.ui.action = self.normalize_url(&flow.ui.action);
        if let Some(request_url) = flow.request_url.take() {
            flow.request_url = Some(self.normalize_url(&request_url));
        }
    }

    async fn get(
        &self,
        relay: &mut CookieRelay,
        url: Url,
    ) -> Result<reqwest::Response, FlowError> {
        let mut request = self.http.get(url).header(ACCEPT, "application/json");
        if let Some(cookie) = relay.cookie() {
            request = request.header(COOKIE, cookie.clone());
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

/// Best human-readable message in a failed provider payload: first
/// error-typed flow or node message, then the error body's message and
/// reason, then a top-level message, then a generic fallback.
fn extract_error_message(value: &Value) -> String {
    if let Some(text) = first_error_text(value) {
        return text;
    }
    value
        .get("error")
        .and_then(|error| {
            error
                .get("message")
                .or_else(|| error.get("reason"))
                .and_then(Value::as_str)
        })
        .or_else(|| value.get("message").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| "Identity provider error".to_string())
}

fn first_error_text(value: &Value) -> Option<String> {
    let ui = value.get("ui")?;
    let pick = |messages: &Value| {
        messages.as_array().and_then(|messages| {
            messages
                .iter()
                .find(|message| message.get("type").and_then(Value::as_str) == Some("error"))
                .and_then(|message| message.get("text").and_then(Value::as_str))
                .map(str::to_string)
        })
    };
    if let Some(text) = ui.get("messages").and_then(|messages| pick(messages)) {
        return Some(text);
    }
    ui.get("nodes")
        .and_then(Value::as_array)
        .and_then(|nodes| {
            nodes
                .iter()
                .find_map(|node| node.get("messages").and_then(|messages| pick(messages)))
        })
}

#[cfg(test)]
mod test {
    use super::*;

    fn client(base: &str) -> FlowClient {
        FlowClient::new(reqwest::Client::new(), base).unwrap()
    }

    #[test]
    fn internal_hostname_is_rewritten_when_port_matches() {
        let client = client("http://localhost:4433");
        assert_eq!(
            client.normalize_url("http://kratos:4433/self-service/login?flow=1"),
            "http://localhost:4433/self-service/login?flow=1"
        );
    }

    #[test]
    fn port_mismatch_is_left_alone() {
        let client = client("http://localhost:4433");
        let raw = "http://kratos:4455/self-service/login";
        assert_eq!(client.normalize_url(raw), raw);
    }

    #[test]
    fn loopback_hosts_are_left_alone() {
        let client = client("http://localhost:4433");
        let raw = "http://127.0.0.1:4433/sessions/whoami";
        assert_eq!(client.normalize_url(raw), raw);
    }

    #[test]
    fn unparseable_urls_pass_through() {
        let client = client("http://localhost:4433");
        assert_eq!(client.normalize_url("/relative/path"), "/relative/path");
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let client = client("http://idp.internal/kratos/");
        let url = client.endpoint(&["self-service", "login", "browser"]);
        assert_eq!(
            url.as_str(),
            "http://idp.internal/kratos/self-service/login/browser"
        );
    }

    #[test]
    fn error_message_prefers_node_errors() {
        let value: Value = serde_json::json!({
            "ui": {
                "nodes": [
                    { "messages": [ { "type": "info", "text": "hint" } ] },
                    { "messages": [ { "type": "error", "text": "password too short" } ] }
                ]
            },
            "error": { "message": "outer" }
        });
        assert_eq!(extract_error_message(&value), "password too short");
    }

    #[test]
    fn error_message_falls_back_to_reason_then_generic() {
        let value: Value = serde_json::json!({ "error": { "reason": "because" } });
        assert_eq!(extract_error_message(&value), "because");
        assert_eq!(
            extract_error_message(&Value::Null),
            "Identity provider error"
        );
    }
}
