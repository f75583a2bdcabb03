use axum::{
    extract::{Query, State},
    response::Response,
    routing::get,
    Form, Router,
};
use model::{Flow, FlowType, UiNode};
use serde::Deserialize;

use crate::{
    error::PageError,
    form::{build_form, render_form, FormPolicy, FormState, SubmitEnd, FORM_ERROR_KEY},
    idp::CookieRelay,
    routes::support::{self, FlowPageData, PageLink},
    session::CurrentUser,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(settings_page).post(submit_settings))
}

#[derive(Debug, Deserialize)]
struct SettingsQuery {
    flow: Option<String>,
}

/// Profile and password material only; everything second-factor lives on its
/// own page.
fn keep_primary(node: &UiNode) -> bool {
    !support::is_second_factor(node)
}

async fn settings_page(
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
    user: CurrentUser,
) -> Result<Response, PageError> {
    let CurrentUser { mut relay, .. } = user;
    let flow = state
        .flows()
        .fetch_flow(
            &mut relay,
            FlowType::Settings,
            query.flow.as_deref(),
            None,
            false,
        )
        .await?;
    let flow = support::filtered(&flow, keep_primary);
    render_settings(&state, relay, &flow, &FormState::seed(&flow))
}

async fn submit_settings(
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
    user: CurrentUser,
    Form(posted): Form<Vec<(String, String)>>,
) -> Result<Response, PageError> {
    let CurrentUser { mut relay, .. } = user;
    let Some(flow_id) = query.flow.as_deref() else {
        return Ok(support::see_other(relay, "/settings"));
    };

    let flow = state
        .flows()
        .fetch_flow(&mut relay, FlowType::Settings, Some(flow_id), None, false)
        .await?;
    let flow = support::filtered(&flow, keep_primary);
    let (mut form, end) =
        support::drive_submission(state.flows(), &mut relay, &flow, FormPolicy::STRICT, &posted)
            .await;

    let Some(end) = end else {
        return render_settings(&state, relay, &flow, &form);
    };
    match end {
        SubmitEnd::Redirect(target) => {
            let target = state.flows().normalize_url(&target);
            Ok(support::see_other(relay, &target))
        }
        SubmitEnd::Flow(new_flow) => {
            let new_flow = support::filtered(&new_flow, keep_primary);
            form.reseed(&new_flow);
            render_settings(&state, relay, &new_flow, &form)
        }
        SubmitEnd::Answer(answer) => match answer.into_flow() {
            // A saved settings flow comes back whole, success banner
            // included.
            Some(new_flow) => {
                let new_flow = support::filtered(&new_flow, keep_primary);
                form.reseed(&new_flow);
                render_settings(&state, relay, &new_flow, &form)
            }
            None => Ok(support::see_other(relay, "/settings")),
        },
        SubmitEnd::Failed(err) if err.is_expired() => Err(err.into()),
        SubmitEnd::Failed(err) => {
            if err.is_network() {
                form.set_error(FORM_ERROR_KEY, support::IDP_OFFLINE_MESSAGE);
            }
            render_settings(&state, relay, &flow, &form)
        }
        SubmitEnd::AlreadyRunning => render_settings(&state, relay, &flow, &form),
    }
}

fn render_settings(
    state: &AppState,
    relay: CookieRelay,
    flow: &Flow,
    form: &FormState,
) -> Result<Response, PageError> {
    let action = support::page_action("/settings", &flow.id, &[]);
    let model = build_form(flow, form, FormPolicy::STRICT, &action);
    let page = FlowPageData {
        title: "Account Settings".to_string(),
        kicker: "Your account".to_string(),
        intro: Some("Update your profile or change your password.".to_string()),
        diagnostic: None,
        form: render_form(&model),
        links: vec![
            PageLink::new(None, "/mfa", "Two-factor authentication"),
            PageLink::new(None, "/dashboard", "Back to dashboard"),
        ],
    };
    support::render_flow_page(state, relay, page)
}
