use axum::{
    extract::{Query, State},
    response::Response,
    routing::get,
    Form, Router,
};
use model::{Flow, FlowType};
use serde::Deserialize;

use crate::{
    error::PageError,
    form::{build_form, render_form, FormPolicy, FormState, SubmitEnd, FORM_ERROR_KEY},
    idp::CookieRelay,
    routes::support::{self, FlowPageData, PageLink},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/recovery", get(recovery_page).post(submit_recovery))
}

#[derive(Debug, Deserialize)]
struct RecoveryQuery {
    flow: Option<String>,
}

async fn recovery_page(
    State(state): State<AppState>,
    Query(query): Query<RecoveryQuery>,
    mut relay: CookieRelay,
) -> Result<Response, PageError> {
    let flow = state
        .flows()
        .fetch_flow(
            &mut relay,
            FlowType::Recovery,
            query.flow.as_deref(),
            None,
            false,
        )
        .await?;
    if query.flow.is_none() {
        let target = support::page_action("/recovery", &flow.id, &[]);
        return Ok(support::see_other(relay, &target));
    }
    render_recovery(&state, relay, &flow, &FormState::seed(&flow))
}

async fn submit_recovery(
    State(state): State<AppState>,
    Query(query): Query<RecoveryQuery>,
    mut relay: CookieRelay,
    Form(posted): Form<Vec<(String, String)>>,
) -> Result<Response, PageError> {
    let Some(flow_id) = query.flow.as_deref() else {
        return Ok(support::see_other(relay, "/recovery"));
    };

    let flow = state
        .flows()
        .fetch_flow(&mut relay, FlowType::Recovery, Some(flow_id), None, false)
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
        return render_recovery(&state, relay, &flow, &form);
    };
    match end {
        // Successful recovery ends in a navigation into the settings flow.
        SubmitEnd::Redirect(target) => {
            let target = state.flows().normalize_url(&target);
            Ok(support::see_other(relay, &target))
        }
        SubmitEnd::Flow(new_flow) => {
            form.reseed(&new_flow);
            render_recovery(&state, relay, &new_flow, &form)
        }
        SubmitEnd::Answer(answer) => match answer.into_flow() {
            Some(new_flow) => {
                form.reseed(&new_flow);
                render_recovery(&state, relay, &new_flow, &form)
            }
            None => Ok(support::see_other(
                relay,
                &support::page_action("/recovery", flow_id, &[]),
            )),
        },
        SubmitEnd::Failed(err) if err.is_expired() => Err(err.into()),
        SubmitEnd::Failed(err) => {
            if err.is_network() {
                form.set_error(FORM_ERROR_KEY, support::IDP_OFFLINE_MESSAGE);
            }
            render_recovery(&state, relay, &flow, &form)
        }
        SubmitEnd::AlreadyRunning => render_recovery(&state, relay, &flow, &form),
    }
}

fn render_recovery(
    state: &AppState,
    relay: CookieRelay,
    flow: &Flow,
    form: &FormState,
) -> Result<Response, PageError> {
    let action = support::page_action("/recovery", &flow.id, &[]);
    let model = build_form(flow, form, FormPolicy::default(), &action);
    let page = FlowPageData {
        title: "Account Recovery".to_string(),
        kicker: "Reset your password".to_string(),
        intro: Some("Enter your email address and we'll send you a recovery code.".to_string()),
        diagnostic: None,
        form: render_form(&model),
        links: vec![PageLink::new(
            Some("Remembered it after all?"),
            "/login",
            "Back to sign in",
        )],
    };
    support::render_flow_page(state, relay, page)
}
