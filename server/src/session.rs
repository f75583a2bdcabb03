use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use http::{header::LOCATION, StatusCode};
use model::Session;
use tracing::warn;

use crate::{
    idp::{CookieRelay, WhoamiOutcome},
    state::AppState,
};

/// The signed-in account behind the current request, checked against the
/// provider on every extraction. Carries the request's cookie relay so the
/// session-check Set-Cookie answers reach the browser through whatever
/// response the handler builds.
pub struct CurrentUser {
    pub session: Box<Session>,
    pub relay: CookieRelay,
}

impl CurrentUser {
    pub fn user_id(&self) -> &str {
        &self.session.identity.id
    }

    pub fn is_admin(&self) -> bool {
        self.session.identity.is_admin()
    }
}

/// Rejection of the session gate: send the browser to the login page,
/// remembering where it wanted to go.
pub struct GateRedirect {
    target: String,
    relay: CookieRelay,
}

impl GateRedirect {
    fn to_login(parts: &Parts, relay: CookieRelay) -> Self {
        let wanted = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("return_to", wanted)
            .finish();
        Self {
            target: format!("/login?{query}"),
            relay,
        }
    }
}

impl IntoResponse for GateRedirect {
    fn into_response(self) -> Response {
        let GateRedirect { target, relay } = self;
        relay.wrap((StatusCode::SEE_OTHER, [(LOCATION, target)]))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = GateRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let mut relay = CookieRelay::from_headers(&parts.headers);
        match state.flows().whoami(&mut relay).await {
            Ok(WhoamiOutcome::Active(session)) => Ok(CurrentUser { session, relay }),
            Ok(WhoamiOutcome::Denied { .. }) => Err(GateRedirect::to_login(parts, relay)),
            Err(err) => {
                warn!("session check failed: {err}");
                Err(GateRedirect::to_login(parts, relay))
            }
        }
    }
}

/// Session check that never rejects, for pages that adapt to signed-in and
/// anonymous visitors alike.
pub struct OptionalUser {
    pub session: Option<Box<Session>>,
    pub relay: CookieRelay,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let mut relay = CookieRelay::from_headers(&parts.headers);
        let session = match state.flows().whoami(&mut relay).await {
            Ok(WhoamiOutcome::Active(session)) => Some(session),
            Ok(WhoamiOutcome::Denied { .. }) => None,
            Err(err) => {
                warn!("session check failed: {err}");
                None
            }
        };
        Ok(OptionalUser { session, relay })
    }
}
