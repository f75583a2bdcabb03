use std::convert::Infallible;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    response::{IntoResponse, Response},
};
use http::{
    header::{COOKIE, SET_COOKIE},
    request::Parts,
    HeaderMap, HeaderValue,
};

/// Carries the browser's Cookie header into upstream calls and collects every
/// Set-Cookie those calls produce, so the whole exchange stays transparent to
/// the browser. The provider's CSRF and session cookies depend on this.
#[derive(Debug, Clone, Default)]
pub struct CookieRelay {
    cookie: Option<HeaderValue>,
    set_cookies: Vec<HeaderValue>,
}

impl CookieRelay {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            cookie: headers.get(COOKIE).cloned(),
            set_cookies: Vec::new(),
        }
    }

    pub fn cookie(&self) -> Option<&HeaderValue> {
        self.cookie.as_ref()
    }

    /// Record Set-Cookie headers from an upstream response.
    pub fn absorb(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            self.set_cookies.push(value.clone());
        }
    }

    /// Replay every collected cookie onto outgoing response headers.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for value in &self.set_cookies {
            headers.append(SET_COOKIE, value.clone());
        }
    }

    /// Finish a handler: turn `body` into a response carrying the cookies.
    pub fn wrap(self, body: impl IntoResponse) -> Response {
        let mut response = body.into_response();
        self.apply(response.headers_mut());
        response
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CookieRelay
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn collects_and_replays_set_cookies() {
        let mut upstream = HeaderMap::new();
        upstream.append(SET_COOKIE, HeaderValue::from_static("csrf=a; Path=/"));
        upstream.append(SET_COOKIE, HeaderValue::from_static("session=b; Path=/"));

        let mut request = HeaderMap::new();
        request.insert(COOKIE, HeaderValue::from_static("session=old"));

        let mut relay = CookieRelay::from_headers(&request);
        assert_eq!(relay.cookie().unwrap(), "session=old");
        relay.absorb(&upstream);

        let mut out = HeaderMap::new();
        relay.apply(&mut out);
        let replayed: Vec<_> = out.get_all(SET_COOKIE).iter().collect();
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0], "csrf=a; Path=/");
    }
}
