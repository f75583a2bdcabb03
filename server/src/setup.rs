use std::time::Duration;

use axum::{error_handling::HandleErrorLayer, routing::get_service, Router};
use handlebars::Handlebars;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    backend::TodoClient, config::TaskportConfiguration, handle_timeout_error, idp::FlowClient,
    routes, AppState,
};

pub fn create_state(config: &TaskportConfiguration) -> AppState {
    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to build HTTP client");
    let flows =
        FlowClient::new(http.clone(), &config.idp.public_url).expect("Invalid idp.public_url");
    let todos =
        TodoClient::new(http, &config.backend.base_url).expect("Invalid backend.base_url");
    AppState::new(flows, todos, templates())
}

/// Template registry. All templates ship inside the binary.
pub fn templates() -> Handlebars<'static> {
    let mut registry = Handlebars::new();
    for (name, source) in [
        ("head", include_str!("../templates/head.hbs")),
        ("foot", include_str!("../templates/foot.hbs")),
        ("flow", include_str!("../templates/flow.hbs")),
        ("todos", include_str!("../templates/todos.hbs")),
        ("dashboard", include_str!("../templates/dashboard.hbs")),
    ] {
        registry
            .register_template_string(name, source)
            .expect("Failed to register template");
    }
    registry
}

pub fn router(state: AppState) -> Router<()> {
    let service = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(HandleErrorLayer::new(handle_timeout_error))
        .timeout(Duration::from_secs(15));

    Router::new()
        .merge(routes::router())
        .nest_service("/assets", get_service(ServeDir::new("assets")))
        .layer(service)
        .with_state(state)
}
