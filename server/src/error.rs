use std::{borrow::Cow, fmt::Debug};

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use derive_more::{Display, Error, From};
use handlebars::{html_escape, RenderError};
use tracing_error::SpanTrace;

use crate::{backend::BackendError, idp::FlowError};

/// Error carried out of a page handler. Renders as a self-contained HTML
/// error page; the span trace is captured for server-side failures only.
pub struct PageError {
    kind: PageErrorKind,
    page: ErrorPage,
    trace: Option<SpanTrace>,
}

impl Debug for PageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageError")
            .field("kind", &self.kind)
            .field("trace", &self.trace)
            .finish()
    }
}

impl PageError {
    pub fn kind(&self) -> &PageErrorKind {
        &self.kind
    }

    pub fn trace(&self) -> Option<&SpanTrace> {
        self.trace.as_ref()
    }

    pub fn format_trace(&self) -> Option<String> {
        self.trace
            .as_ref()
            .map(|trace| WrappedTrace(trace).to_string())
    }
}

struct WrappedTrace<'a>(&'a SpanTrace);

macro_rules! try_bool {
    ($e:expr, $dest:ident) => {{
        let ret = $e.unwrap_or_else(|e| $dest = Err(e));

        if $dest.is_err() {
            return false;
        }

        ret
    }};
}

impl<'a> std::fmt::Display for WrappedTrace<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut err = Ok(());
        self.0.with_spans(|metadata, _| {
            if let Some((file, line)) = metadata
                .file()
                .and_then(|file| metadata.line().map(|line| (file, line)))
            {
                try_bool!(write!(f, "\nat {}:{}", file, line), err);
            }
            true
        });
        err
    }
}

#[derive(Debug, Display, Error, From)]
pub enum PageErrorKind {
    #[display("Status: {}", _0)]
    Status(#[error(not(source))] StatusCode),
    #[display("Flow: {}", _0)]
    Flow(FlowError),
    #[display("Backend: {}", _0)]
    Backend(BackendError),
    #[display("Template: {}", _0)]
    Template(RenderError),
}

impl PageErrorKind {
    pub fn not_found() -> Self {
        Self::Status(StatusCode::NOT_FOUND)
    }

    pub fn internal() -> Self {
        Self::Status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn page(&self) -> ErrorPage {
        match self {
            PageErrorKind::Status(status) => (*status).into(),
            PageErrorKind::Flow(err) if err.is_network() => ErrorPage {
                status: StatusCode::BAD_GATEWAY,
                heading: Cow::Borrowed("Connection Error"),
                message: Cow::Borrowed(
                    "Unable to reach the identity provider. Please try again.",
                ),
            },
            PageErrorKind::Flow(err) => ErrorPage {
                status: err
                    .status()
                    .and_then(|status| StatusCode::from_u16(status).ok())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                heading: Cow::Borrowed("Something went wrong"),
                message: Cow::Owned(err.to_string()),
            },
            PageErrorKind::Backend(err) if err.is_network() => ErrorPage {
                status: StatusCode::BAD_GATEWAY,
                heading: Cow::Borrowed("Connection Error"),
                message: Cow::Borrowed(
                    "Unable to connect to the server. Please make sure the backend is running.",
                ),
            },
            PageErrorKind::Backend(err) => ErrorPage {
                status: err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                heading: Cow::Borrowed("Something went wrong"),
                message: Cow::Owned(err.to_string()),
            },
            PageErrorKind::Template(_) => StatusCode::INTERNAL_SERVER_ERROR.into(),
        }
    }
}

impl<T: Into<PageErrorKind>> From<T> for PageError {
    fn from(value: T) -> Self {
        let kind: PageErrorKind = value.into();
        let page = kind.page();
        if page.status.is_server_error() {
            Self {
                kind,
                page,
                trace: Some(SpanTrace::capture()),
            }
        } else {
            Self {
                kind,
                page,
                trace: None,
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ErrorPage {
    status: StatusCode,
    heading: Cow<'static, str>,
    message: Cow<'static, str>,
}

impl From<StatusCode> for ErrorPage {
    fn from(status: StatusCode) -> Self {
        let message = match status {
            StatusCode::NOT_FOUND => Cow::Borrowed("This page does not exist."),
            _ => Cow::Borrowed("An unexpected error occurred. Please try again."),
        };
        Self {
            status,
            heading: Cow::Borrowed("Something went wrong"),
            message,
        }
    }
}

impl IntoResponse for ErrorPage {
    fn into_response(self) -> Response {
        let body = format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
             <title>{heading}</title>\
             <link rel=\"stylesheet\" href=\"/assets/app.css\">\
             </head><body><main class=\"card error-card\">\
             <h1>{heading}</h1><p>{message}</p>\
             <a class=\"button\" href=\"javascript:location.reload()\">Retry</a>\
             </main></body></html>",
            heading = html_escape(&self.heading),
            message = html_escape(&self.message),
        );
        (
            self.status,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        if self.page.status.is_server_error() {
            match self.format_trace() {
                Some(trace) => tracing::error!("{}{}", self.kind, trace),
                None => tracing::error!("{}", self.kind),
            }
        }
        let mut response = self.page.clone().into_response();
        response.extensions_mut().insert(self);
        response
    }
}
