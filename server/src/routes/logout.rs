use axum::{extract::State, response::Response, routing::get, Router};

use crate::{idp::CookieRelay, routes::support, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/logout", get(logout))
}

/// Hand the browser to the provider's logout endpoint; the provider returns
/// it to the login page afterwards. Logging out without a session still
/// redirects, there is nothing to fail.
async fn logout(State(state): State<AppState>, mut relay: CookieRelay) -> Response {
    let target = state.flows().logout_url(&mut relay, Some("/login")).await;
    support::see_other(relay, &target)
}
