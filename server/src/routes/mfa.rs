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
    session::CurrentUser,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/mfa", get(mfa_page).post(submit_mfa))
}

#[derive(Debug, Deserialize)]
struct MfaQuery {
    flow: Option<String>,
}

/// The second-factor slice of a settings flow. When the provider offers no
/// second-factor material at all, the whole flow renders with a diagnostic
/// naming the groups that were present.
struct MfaView {
    flow: Flow,
    diagnostic: Option<String>,
}

fn mfa_view(flow: Flow) -> MfaView {
    let filtered = support::filtered(&flow, support::is_second_factor);
    let has_visible = filtered.ui.nodes.iter().any(|node| !node.is_hidden());
    if has_visible {
        return MfaView {
            flow: filtered,
            diagnostic: None,
        };
    }
    let mut groups: Vec<&str> = Vec::new();
    for node in &flow.ui.nodes {
        if !groups.contains(&node.group.as_str()) {
            groups.push(node.group.as_str());
        }
    }
    let diagnostic = if groups.is_empty() {
        "No second-factor methods were found in this flow.".to_string()
    } else {
        format!(
            "No second-factor methods were found in this flow. Groups present: {}.",
            groups.join(", ")
        )
    };
    MfaView {
        flow,
        diagnostic: Some(diagnostic),
    }
}

async fn mfa_page(
    State(state): State<AppState>,
    Query(query): Query<MfaQuery>,
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
    let view = mfa_view(flow);
    let form = FormState::seed(&view.flow);
    render_mfa(&state, relay, &view, &form)
}

async fn submit_mfa(
    State(state): State<AppState>,
    Query(query): Query<MfaQuery>,
    user: CurrentUser,
    Form(posted): Form<Vec<(String, String)>>,
) -> Result<Response, PageError> {
    let CurrentUser { mut relay, .. } = user;
    let Some(flow_id) = query.flow.as_deref() else {
        return Ok(support::see_other(relay, "/mfa"));
    };

    let flow = state
        .flows()
        .fetch_flow(&mut relay, FlowType::Settings, Some(flow_id), None, false)
        .await?;
    let view = mfa_view(flow);
    let (mut form, end) = support::drive_submission(
        state.flows(),
        &mut relay,
        &view.flow,
        FormPolicy::default(),
        &posted,
    )
    .await;

    let Some(end) = end else {
        return render_mfa(&state, relay, &view, &form);
    };
    match end {
        SubmitEnd::Redirect(target) => {
            let target = state.flows().normalize_url(&target);
            Ok(support::see_other(relay, &target))
        }
        SubmitEnd::Flow(new_flow) => {
            // Enrolling or dropping a factor changes the session's assurance
            // level; refresh it so the cookies the browser gets back match.
            if !new_flow.has_error_messages() {
                let _ = state.flows().whoami(&mut relay).await;
            }
            let view = mfa_view(*new_flow);
            form.reseed(&view.flow);
            render_mfa(&state, relay, &view, &form)
        }
        SubmitEnd::Answer(answer) => {
            if !answer.has_error_messages() {
                let _ = state.flows().whoami(&mut relay).await;
            }
            match answer.into_flow() {
                Some(new_flow) => {
                    let view = mfa_view(new_flow);
                    form.reseed(&view.flow);
                    render_mfa(&state, relay, &view, &form)
                }
                None => Ok(support::see_other(relay, "/mfa")),
            }
        }
        SubmitEnd::Failed(err) if err.is_expired() => Err(err.into()),
        SubmitEnd::Failed(err) => {
            if err.is_network() {
                form.set_error(FORM_ERROR_KEY, support::IDP_OFFLINE_MESSAGE);
            }
            render_mfa(&state, relay, &view, &form)
        }
        SubmitEnd::AlreadyRunning => render_mfa(&state, relay, &view, &form),
    }
}

fn render_mfa(
    state: &AppState,
    relay: CookieRelay,
    view: &MfaView,
    form: &FormState,
) -> Result<Response, PageError> {
    let action = support::page_action("/mfa", &view.flow.id, &[]);
    let model = build_form(&view.flow, form, FormPolicy::default(), &action);
    let page = FlowPageData {
        title: "Two-Factor Authentication".to_string(),
        kicker: "Protect your account".to_string(),
        intro: Some("Add a second factor to your sign-in.".to_string()),
        diagnostic: view.diagnostic.clone(),
        form: render_form(&model),
        links: vec![
            PageLink::new(None, "/settings", "Account settings"),
            PageLink::new(None, "/dashboard", "Back to dashboard"),
        ],
    };
    support::render_flow_page(state, relay, page)
}
