use axum::Router;

use crate::state::AppState;

mod dashboard;
mod home;
mod login;
mod logout;
mod mfa;
mod recovery;
mod register;
mod settings;
pub(crate) mod support;
mod todos;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(home::router())
        .merge(login::router())
        .merge(register::router())
        .merge(settings::router())
        .merge(mfa::router())
        .merge(recovery::router())
        .merge(logout::router())
        .merge(todos::router())
        .merge(dashboard::router())
}
