use axum::{
    extract::{Query, State},
    response::Response,
    routing::get,
    Form, Router,
};
use model::{Flow, FlowType, InputKind};
use serde::Deserialize;

use crate::{
    error::PageError,
    form::{build_form, render_form, FormPolicy, FormState, SubmitEnd, FORM_ERROR_KEY},
    idp::CookieRelay,
    routes::support::{self, FlowPageData, PageLink},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/register", get(register_page).post(submit_register))
}

#[derive(Debug, Deserialize)]
struct RegisterQuery {
    flow: Option<String>,
}

async fn register_page(
    State(state): State<AppState>,
    Query(query): Query<RegisterQuery>,
    mut relay: CookieRelay,
) -> Result<Response, PageError> {
    let flow = state
        .flows()
        .fetch_flow(
            &mut relay,
            FlowType::Registration,
            query.flow.as_deref(),
            None,
            false,
        )
        .await?;
    if query.flow.is_none() {
        // Pin the flow id in the address bar so a refresh resumes instead of
        // starting over.
        let target = support::page_action("/register", &flow.id, &[]);
        return Ok(support::see_other(relay, &target));
    }
    render_register(&state, relay, &flow, &FormState::seed(&flow))
}

async fn submit_register(
    State(state): State<AppState>,
    Query(query): Query<RegisterQuery>,
    mut relay: CookieRelay,
    Form(posted): Form<Vec<(String, String)>>,
) -> Result<Response, PageError> {
    let Some(flow_id) = query.flow.as_deref() else {
        return Ok(support::see_other(relay, "/register"));
    };

    let flow = state
        .flows()
        .fetch_flow(&mut relay, FlowType::Registration, Some(flow_id), None, false)
        .await?;
    let (mut form, end) = support::drive_submission(
        state.flows(),
        &mut relay,
        &flow,
        FormPolicy::default(),
        &posted,
    )
    .await;

    let Some(end) = end else {
        return render_register(&state, relay, &flow, &form);
    };
    match end {
        SubmitEnd::Redirect(target) => {
            let target = state.flows().normalize_url(&target);
            Ok(support::see_other(relay, &target))
        }
        SubmitEnd::Flow(new_flow) => {
            form.reseed(&new_flow);
            render_register(&state, relay, &new_flow, &form)
        }
        SubmitEnd::Answer(answer) => {
            let registered = answer.is_success()
                || answer.session.is_some()
                || answer
                    .continue_with
                    .as_ref()
                    .map_or(false, |steps| !steps.is_empty());
            if registered {
                return Ok(support::see_other(relay, "/login"));
            }
            match answer.into_flow() {
                Some(new_flow) => {
                    form.reseed(&new_flow);
                    render_register(&state, relay, &new_flow, &form)
                }
                None => Ok(support::see_other(
                    relay,
                    &support::page_action("/register", flow_id, &[]),
                )),
            }
        }
        SubmitEnd::Failed(err) if err.is_expired() => Err(err.into()),
        SubmitEnd::Failed(err) => {
            if err.is_network() {
                form.set_error(FORM_ERROR_KEY, support::IDP_OFFLINE_MESSAGE);
            }
            render_register(&state, relay, &flow, &form)
        }
        SubmitEnd::AlreadyRunning => render_register(&state, relay, &flow, &form),
    }
}

fn render_register(
    state: &AppState,
    relay: CookieRelay,
    flow: &Flow,
    form: &FormState,
) -> Result<Response, PageError> {
    // Code-first schemas open with an email-only step; password schemas show
    // the whole account form at once. Only the copy changes.
    let email_only = flow.first_password_field().is_none()
        && flow.input_nodes().any(|(_, attrs)| {
            attrs.name == "traits.email" || attrs.kind == InputKind::Email
        });
    let intro = if email_only {
        "Enter your email to continue."
    } else {
        "Create a new account."
    };
    let action = support::page_action("/register", &flow.id, &[]);
    let model = build_form(flow, form, FormPolicy::default(), &action);
    let page = FlowPageData {
        title: "Sign Up".to_string(),
        kicker: "Get started".to_string(),
        intro: Some(intro.to_string()),
        diagnostic: None,
        form: render_form(&model),
        links: vec![PageLink::new(
            Some("Already have an account?"),
            "/login",
            "Sign in",
        )],
    };
    support::render_flow_page(state, relay, page)
}
