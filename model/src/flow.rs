use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{InputAttributes, InputKind, MessageKind, Session, UiNode, UiText};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    Login,
    Registration,
    Settings,
    Recovery,
    Verification,
    Logout,
}

impl FlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Login => "login",
            FlowType::Registration => "registration",
            FlowType::Settings => "settings",
            FlowType::Recovery => "recovery",
            FlowType::Verification => "verification",
            FlowType::Logout => "logout",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One self-service operation instance as issued by the identity provider.
/// The `id` stays stable across resubmissions until the operation concludes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    #[serde(rename = "type")]
    pub flow_type: FlowType,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub issued_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_to: Option<String>,
    /// Step discriminator ("choose_method", "sent_email", "success", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub ui: FlowUi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowUi {
    pub action: String,
    pub method: String,
    #[serde(default)]
    pub nodes: Vec<UiNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<UiText>,
}

impl Flow {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    /// Input nodes paired with their attribute bags, in node order.
    pub fn input_nodes(&self) -> impl Iterator<Item = (&UiNode, &InputAttributes)> {
        self.ui
            .nodes
            .iter()
            .filter_map(|node| node.input().map(|attrs| (node, attrs)))
    }

    /// Name of the first password-typed input, if any.
    pub fn first_password_field(&self) -> Option<&str> {
        self.input_nodes()
            .find(|(_, attrs)| attrs.kind == InputKind::Password)
            .map(|(_, attrs)| attrs.name.as_str())
    }

    pub fn has_error_messages(&self) -> bool {
        self.ui
            .messages
            .iter()
            .any(|message| message.kind == MessageKind::Error)
            || self.ui.nodes.iter().any(UiNode::has_error_message)
    }

    /// True when any flow- or node-level message contains `needle`
    /// (case-insensitive).
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        let matches = |message: &UiText| message.text.to_lowercase().contains(&needle);
        self.ui.messages.iter().any(matches)
            || self
                .ui
                .nodes
                .iter()
                .any(|node| node.messages.iter().any(matches))
    }
}

/// Body of a 2xx submission response. The provider answers with whatever is
/// relevant to the outcome: the next flow revision, a fresh session, a plain
/// redirect hint, or a combination. Everything is optional by construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub flow_type: Option<FlowType>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<FlowUi>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<crate::Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_with: Option<Vec<ContinueWith>>,
}

impl FlowAnswer {
    /// First navigation target the provider asks the browser to follow.
    pub fn redirect_hint(&self) -> Option<&str> {
        if let Some(target) = self.redirect_to.as_deref() {
            return Some(target);
        }
        self.continue_with
            .iter()
            .flatten()
            .find_map(|step| step.redirect_browser_to.as_deref())
    }

    pub fn is_success(&self) -> bool {
        self.state.as_deref() == Some("success")
    }

    pub fn has_error_messages(&self) -> bool {
        let Some(ui) = &self.ui else { return false };
        ui.messages
            .iter()
            .any(|message| message.kind == MessageKind::Error)
            || ui.nodes.iter().any(UiNode::has_error_message)
    }

    /// Reinterpret the answer as a full flow when it carries one.
    pub fn into_flow(self) -> Option<Flow> {
        match (self.id, self.flow_type, self.ui) {
            (Some(id), Some(flow_type), Some(ui)) => Some(Flow {
                id,
                flow_type,
                expires_at: self.expires_at,
                issued_at: None,
                request_url: self.request_url,
                return_to: None,
                state: self.state,
                ui,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinueWith {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_browser_to: Option<String>,
}

/// Error payload shape the provider uses on failed requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ErrorBody>,
    #[serde(default)]
    pub redirect_browser_to: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub details: Option<ErrorDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetails {
    #[serde(default)]
    pub redirect_browser_to: Option<String>,
}
