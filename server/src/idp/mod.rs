mod client;
mod cookies;
mod error;

pub use client::{FlowClient, SubmitOutcome, WhoamiOutcome};
pub use cookies::CookieRelay;
pub use error::FlowError;
