use axum::{
    extract::{Query, State},
    response::Response,
    routing::get,
    Form, Router,
};
use model::{Flow, FlowType};
use serde::Deserialize;
use tracing::warn;

use crate::{
    error::PageError,
    form::{build_form, render_form, FormPolicy, FormState, SubmitEnd, FORM_ERROR_KEY},
    idp::{CookieRelay, FlowError, WhoamiOutcome},
    routes::support::{self, FlowPageData, PageLink},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/login", get(login_page).post(submit_login))
}

#[derive(Debug, Deserialize)]
struct LoginQuery {
    flow: Option<String>,
    return_to: Option<String>,
    #[serde(default)]
    refresh: bool,
}

async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    mut relay: CookieRelay,
) -> Result<Response, PageError> {
    let return_to = support::sanitize_return_to(query.return_to.as_deref());

    // Fresh visits check the session first; a signed-in browser goes straight
    // where it wanted to go. Resumed flows skip the check so a second factor
    // or forced re-authentication can finish.
    if query.flow.is_none() {
        match state.flows().whoami(&mut relay).await {
            Ok(WhoamiOutcome::Active(_)) => return Ok(support::see_other(relay, &return_to)),
            Ok(WhoamiOutcome::Denied {
                redirect_to: Some(target),
                ..
            }) => {
                return Ok(support::see_other(relay, &target));
            }
            Ok(WhoamiOutcome::Denied { .. }) => {}
            Err(err) => warn!("session check failed: {err}"),
        }
    }

    let flow = match state
        .flows()
        .fetch_flow(
            &mut relay,
            FlowType::Login,
            query.flow.as_deref(),
            query.return_to.as_deref(),
            query.refresh,
        )
        .await
    {
        Ok(flow) => flow,
        Err(err) => {
            if already_logged_in(&err) {
                return Ok(support::see_other(relay, &return_to));
            }
            return Err(err.into());
        }
    };
    if flow.mentions("already logged in") {
        return Ok(support::see_other(relay, &return_to));
    }

    let form = FormState::seed(&flow);
    render_login(&state, relay, &flow, &form, query.return_to.as_deref())
}

async fn submit_login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    mut relay: CookieRelay,
    Form(posted): Form<Vec<(String, String)>>,
) -> Result<Response, PageError> {
    let Some(flow_id) = query.flow.as_deref() else {
        return Ok(support::see_other(relay, "/login"));
    };
    let return_to = support::sanitize_return_to(query.return_to.as_deref());

    let flow = state
        .flows()
        .fetch_flow(&mut relay, FlowType::Login, Some(flow_id), None, false)
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
        return render_login(&state, relay, &flow, &form, query.return_to.as_deref());
    };
    match end {
        SubmitEnd::Redirect(target) => {
            let target = state.flows().normalize_url(&target);
            Ok(support::see_other(relay, &target))
        }
        SubmitEnd::Flow(new_flow) => {
            form.reseed(&new_flow);
            render_login(&state, relay, &new_flow, &form, query.return_to.as_deref())
        }
        SubmitEnd::Answer(answer) => {
            if answer.session.is_some() {
                return Ok(support::see_other(relay, &return_to));
            }
            match answer.into_flow() {
                Some(new_flow) => {
                    form.reseed(&new_flow);
                    render_login(&state, relay, &new_flow, &form, query.return_to.as_deref())
                }
                None => Ok(support::see_other(
                    relay,
                    &support::page_action("/login", flow_id, &[]),
                )),
            }
        }
        SubmitEnd::Failed(err) if err.is_expired() => Err(err.into()),
        SubmitEnd::Failed(err) => {
            if err.is_network() {
                form.set_error(FORM_ERROR_KEY, support::IDP_OFFLINE_MESSAGE);
            }
            render_login(&state, relay, &flow, &form, query.return_to.as_deref())
        }
        SubmitEnd::AlreadyRunning => {
            render_login(&state, relay, &flow, &form, query.return_to.as_deref())
        }
    }
}

fn already_logged_in(err: &FlowError) -> bool {
    matches!(err, FlowError::Provider { message, .. }
        if message.to_lowercase().contains("already logged in"))
}

fn render_login(
    state: &AppState,
    relay: CookieRelay,
    flow: &Flow,
    form: &FormState,
    return_to: Option<&str>,
) -> Result<Response, PageError> {
    let mut extra = Vec::new();
    if let Some(return_to) = return_to {
        extra.push(("return_to", return_to));
    }
    let action = support::page_action("/login", &flow.id, &extra);
    let model = build_form(flow, form, FormPolicy::default(), &action);
    let page = FlowPageData {
        title: "Sign In".to_string(),
        kicker: "Welcome back".to_string(),
        intro: None,
        diagnostic: None,
        form: render_form(&model),
        links: vec![
            PageLink::new(None, "/recovery", "Forgot password?"),
            PageLink::new(Some("Don't have an account?"), "/register", "Sign up"),
        ],
    };
    support::render_flow_page(state, relay, page)
}
