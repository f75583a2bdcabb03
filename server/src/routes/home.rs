use axum::{response::Response, routing::get, Router};

use crate::{routes::support, session::OptionalUser, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(home))
}

async fn home(user: OptionalUser) -> Response {
    let OptionalUser { session, relay } = user;
    let target = if session.is_some() { "/todos" } else { "/login" };
    support::see_other(relay, target)
}
