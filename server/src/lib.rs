pub mod backend;
pub mod config;
pub mod error;
pub mod form;
pub mod idp;
pub mod routes;
pub mod session;
mod state;
use axum::BoxError;
use http::StatusCode;
pub use state::*;
pub mod setup;
pub mod tracing_setup;

#[doc(hidden)]
pub mod test_util;

async fn handle_timeout_error(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            "Request took too long".to_string(),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Unhandled internal error: {}", err),
        )
    }
}
