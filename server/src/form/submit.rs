use model::{Flow, FlowAnswer, InputKind};
use serde_json::{Map, Value};
use url::Url;

use super::{validate, FormPolicy, FormState, FORM_ERROR_KEY};
use crate::idp::{CookieRelay, FlowClient, FlowError, SubmitOutcome};

/// A submission ready to hand to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPlan {
    pub url: String,
    pub method: String,
    pub body: Map<String, Value>,
    /// Flow name for expiry errors ("login", "settings", ...).
    pub flow: &'static str,
}

/// How one submit attempt ended.
#[derive(Debug)]
pub enum SubmitEnd {
    /// Navigate the browser to this target; the flow is out of our hands.
    Redirect(String),
    /// The provider reissued the flow: validation errors or the next step.
    Flow(Box<Flow>),
    /// 2xx answer without a navigation hint; what it means is page-specific.
    Answer(Box<FlowAnswer>),
    /// Hard failure. The message is already on the form state under
    /// [`FORM_ERROR_KEY`].
    Failed(FlowError),
    /// Another submission was still in flight; nothing was sent.
    AlreadyRunning,
}

/// Validate and assemble one submission. `posted` is the raw form body in
/// document order; the first posted pair whose name belongs to a submit node
/// identifies the triggering control.
///
/// Returns `None` when a gate check failed; the failure is recorded on the
/// state and nothing must be sent.
pub fn plan_submission(
    flow: &Flow,
    state: &mut FormState,
    policy: FormPolicy,
    posted: &[(String, String)],
) -> Option<SubmissionPlan> {
    state.clear_errors();

    if !validate::check_before_submit(flow, state, policy) {
        return None;
    }

    let trigger = find_trigger(flow, posted);

    // Payload covers every named schema input, rendered or not. Submit nodes
    // contribute only the trigger; everything else takes the stored value if
    // one exists (an empty string is a real value), else the provider value,
    // else empty.
    let mut body = Map::new();
    for (_, attrs) in flow.input_nodes() {
        if attrs.name.is_empty() {
            continue;
        }
        if attrs.kind == InputKind::Submit {
            if let Some((name, value)) = &trigger {
                if name == &attrs.name {
                    body.insert(name.clone(), Value::String(value.clone()));
                }
            }
            continue;
        }
        let value = state
            .value(&attrs.name)
            .map(str::to_string)
            .or_else(|| attrs.value.clone())
            .unwrap_or_default();
        body.insert(attrs.name.clone(), Value::String(value));
    }

    // Keyboard-initiated submits carry no submitter; fall back to the first
    // submit node's own declared value.
    if trigger.is_none() {
        let first_submit = flow
            .input_nodes()
            .find(|(_, attrs)| attrs.kind == InputKind::Submit && !attrs.name.is_empty());
        if let Some((_, attrs)) = first_submit {
            if !body.contains_key(&attrs.name) {
                body.insert(
                    attrs.name.clone(),
                    Value::String(attrs.value.clone().unwrap_or_default()),
                );
            }
        }
    }

    Some(SubmissionPlan {
        url: action_with_flow(&flow.ui.action, &flow.id),
        method: flow.ui.method.clone(),
        body,
        flow: flow.flow_type.as_str(),
    })
}

/// Run a planned submission through the transport, translating the outcome
/// for the page. The in-flight flag is released on every path out.
pub async fn run_submission(
    client: &FlowClient,
    relay: &mut CookieRelay,
    state: &mut FormState,
    plan: &SubmissionPlan,
) -> SubmitEnd {
    if !state.begin_submission() {
        return SubmitEnd::AlreadyRunning;
    }
    let outcome = client
        .submit_flow(relay, &plan.url, &plan.method, &plan.body, plan.flow)
        .await;
    state.finish_submission();

    match outcome {
        Ok(SubmitOutcome::BrowserRedirect(target)) => SubmitEnd::Redirect(target),
        Ok(SubmitOutcome::Flow(flow)) => SubmitEnd::Flow(flow),
        Ok(SubmitOutcome::Answer(answer)) => {
            match answer.redirect_hint().map(str::to_string) {
                Some(target) => SubmitEnd::Redirect(target),
                None => SubmitEnd::Answer(answer),
            }
        }
        Err(err) => {
            state.set_error(FORM_ERROR_KEY, err.to_string());
            SubmitEnd::Failed(err)
        }
    }
}

fn find_trigger(flow: &Flow, posted: &[(String, String)]) -> Option<(String, String)> {
    posted
        .iter()
        .find(|(name, _)| {
            flow.input_nodes()
                .any(|(_, attrs)| attrs.kind == InputKind::Submit && &attrs.name == name)
        })
        .cloned()
}

/// Replace (never append to) any `flow` query parameter on the action URL.
fn action_with_flow(action: &str, flow_id: &str) -> String {
    match Url::parse(action) {
        Ok(mut url) => {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| key != "flow")
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            {
                let mut query = url.query_pairs_mut();
                query.clear();
                for (key, value) in &kept {
                    query.append_pair(key, value);
                }
                query.append_pair("flow", flow_id);
            }
            url.to_string()
        }
        Err(_) => {
            let separator = if action.contains('?') { '&' } else { '?' };
            format!("{action}{separator}flow={flow_id}")
        }
    }
}
