use derive_more::{Display, Error, From};

/// Failures talking to the identity provider that cannot be expressed as a
/// re-rendered flow. Validation failures never end up here; they come back
/// as the flow's next revision instead.
#[derive(Debug, Display, Error, From)]
pub enum FlowError {
    /// Non-2xx answer without a usable UI payload.
    #[display("{message}")]
    #[from(ignore)]
    Provider { status: u16, message: String },
    /// A flow was resumed past its lifetime.
    #[display("Your {flow} session has expired. Please start over.")]
    #[from(ignore)]
    Expired { flow: &'static str },
    #[display("{_0}")]
    Network(#[error(source)] reqwest::Error),
    #[display("{_0}")]
    Decode(#[error(source)] serde_json::Error),
}

impl FlowError {
    pub fn is_network(&self) -> bool {
        match self {
            FlowError::Network(err) => {
                err.is_connect() || err.is_timeout() || err.is_request()
            }
            _ => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, FlowError::Expired { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FlowError::Provider { status, .. } => Some(*status),
            FlowError::Expired { .. } => Some(410),
            FlowError::Network(err) => err.status().map(|status| status.as_u16()),
            FlowError::Decode(_) => None,
        }
    }
}
