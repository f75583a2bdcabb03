//! Shared plumbing for the self-service pages.

use axum::response::Response;
use http::{header::LOCATION, StatusCode};
use model::{Flow, InputKind, UiNode};
use once_cell::sync::Lazy;
use serde::Serialize;
use url::Url;

use crate::{
    error::PageError,
    form::{
        plan_submission, refresh_password_strength, run_submission, FormPolicy, FormState,
        SubmitEnd,
    },
    idp::{CookieRelay, FlowClient},
    state::AppState,
};

/// Form-level copy when the identity provider cannot be reached.
pub const IDP_OFFLINE_MESSAGE: &str =
    "Unable to reach the identity provider. Please try again.";

/// Inline copy when the task backend cannot be reached.
pub const BACKEND_OFFLINE_MESSAGE: &str =
    "Unable to connect to the server. Please make sure the backend is running.";

/// Base the return target resolver joins relative paths against. Only its
/// path and query survive, the host never leaks into output.
static STAND_IN_ORIGIN: Lazy<Url> =
    Lazy::new(|| Url::parse("http://origin.invalid").expect("static origin"));

/// Context handed to the `flow` template.
#[derive(Debug, Serialize)]
pub struct FlowPageData {
    pub title: String,
    pub kicker: String,
    pub intro: Option<String>,
    pub diagnostic: Option<String>,
    /// Pre-rendered form markup, inserted unescaped.
    pub form: String,
    pub links: Vec<PageLink>,
}

#[derive(Debug, Serialize)]
pub struct PageLink {
    pub lead: Option<String>,
    pub href: String,
    pub label: String,
}

impl PageLink {
    pub fn new(lead: Option<&str>, href: &str, label: &str) -> Self {
        Self {
            lead: lead.map(str::to_string),
            href: href.to_string(),
            label: label.to_string(),
        }
    }
}

/// 303 with the relay's collected cookies attached.
pub fn see_other(relay: CookieRelay, target: &str) -> Response {
    relay.wrap((StatusCode::SEE_OTHER, [(LOCATION, target.to_string())]))
}

/// Page URL a flow form posts back to: the page path plus the flow id and
/// any extra query pairs.
pub fn page_action(path: &str, flow_id: &str, extra: &[(&str, &str)]) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("flow", flow_id);
    for (name, value) in extra {
        query.append_pair(name, value);
    }
    format!("{path}?{}", query.finish())
}

/// Reduce a return target to a local path plus query, dropping any `flow`
/// parameter. Absolute URLs lose their origin, unparseable input keeps only
/// what precedes a query, and no target at all means the dashboard.
pub fn sanitize_return_to(raw: Option<&str>) -> String {
    const FALLBACK: &str = "/dashboard";
    let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
        return FALLBACK.to_string();
    };
    match STAND_IN_ORIGIN.join(raw) {
        Ok(mut url) => {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| key != "flow")
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            if kept.is_empty() {
                url.set_query(None);
            } else {
                let mut query = url.query_pairs_mut();
                query.clear();
                for (key, value) in &kept {
                    query.append_pair(key, value);
                }
            }
            match url.query() {
                Some(query) => format!("{}?{query}", url.path()),
                None => url.path().to_string(),
            }
        }
        Err(_) => raw.split('?').next().unwrap_or(FALLBACK).to_string(),
    }
}

/// Copy of the flow keeping hidden inputs plus whatever nodes the page
/// wants. Hidden inputs always survive so token echoes stay intact.
pub fn filtered(flow: &Flow, keep: fn(&UiNode) -> bool) -> Flow {
    let mut filtered = flow.clone();
    filtered.ui.nodes.retain(|node| node.is_hidden() || keep(node));
    filtered
}

/// Whether a node belongs to second-factor material: its group or input name
/// mentions an MFA method, or it is a submit control whose value names one.
pub fn is_second_factor(node: &UiNode) -> bool {
    const MARKERS: [&str; 4] = ["totp", "otp", "mfa", "webauthn"];
    let mentions = |text: &str| {
        let text = text.to_lowercase();
        MARKERS.iter().any(|marker| text.contains(marker))
    };
    if mentions(&node.group) {
        return true;
    }
    if let Some(attrs) = node.input() {
        if mentions(&attrs.name) {
            return true;
        }
        if attrs.kind == InputKind::Submit {
            if let Some(value) = attrs.value.as_deref() {
                if mentions(value) {
                    return true;
                }
            }
        }
    }
    false
}

/// One POST pass over a flow page: merge the posted fields into fresh state,
/// run the gates and submit. `None` for the end means a gate blocked the
/// attempt and the recorded field errors are all there is to show.
pub async fn drive_submission(
    flows: &FlowClient,
    relay: &mut CookieRelay,
    flow: &Flow,
    policy: FormPolicy,
    posted: &[(String, String)],
) -> (FormState, Option<SubmitEnd>) {
    let mut form = FormState::seed(flow);
    form.apply_posted(flow, posted);
    refresh_password_strength(flow, &mut form, policy);

    let Some(plan) = plan_submission(flow, &mut form, policy, posted) else {
        return (form, None);
    };
    let end = run_submission(flows, relay, &mut form, &plan).await;
    (form, Some(end))
}

pub fn render_flow_page(
    state: &AppState,
    relay: CookieRelay,
    page: FlowPageData,
) -> Result<Response, PageError> {
    let body = state.render("flow", &page)?;
    Ok(relay.wrap(body))
}
