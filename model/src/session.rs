use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Provider session as returned by the whoami endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default = "active_default")]
    pub active: bool,
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
    pub authenticated_at: Option<OffsetDateTime>,
    pub identity: Identity,
}

// A session returned with a 200 is live unless the provider says otherwise.
fn active_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
    #[serde(default)]
    pub traits: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verifiable_addresses: Vec<VerifiableAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_public: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiableAddress {
    pub value: String,
    #[serde(default)]
    pub verified: bool,
}

impl Identity {
    pub fn email(&self) -> Option<&str> {
        self.traits.get("email").and_then(Value::as_str)
    }

    /// What to call the account holder: the email trait, else the first
    /// verifiable address, else a generic label.
    pub fn display_label(&self) -> &str {
        self.email()
            .or_else(|| {
                self.verifiable_addresses
                    .first()
                    .map(|address| address.value.as_str())
            })
            .unwrap_or("User")
    }

    /// Administrators are marked with `role: "admin"` in the identity's
    /// public metadata.
    pub fn is_admin(&self) -> bool {
        self.metadata_public
            .as_ref()
            .and_then(|meta| meta.get("role"))
            .and_then(Value::as_str)
            == Some("admin")
    }
}

/// Payload of the logout browser endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LogoutTarget {
    pub logout_url: String,
    #[serde(default)]
    pub logout_token: Option<String>,
}
