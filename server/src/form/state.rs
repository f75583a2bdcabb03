use std::collections::{BTreeMap, BTreeSet};

use model::Flow;

use super::FORM_ERROR_KEY;

/// Field values and errors for one rendered flow.
///
/// Lives as long as the flow does and is re-derived with [`reseed`] whenever
/// the provider reissues the flow with fresh nodes.
///
/// [`reseed`]: FormState::reseed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    values: BTreeMap<String, String>,
    field_errors: BTreeMap<String, String>,
    in_flight: bool,
}

impl FormState {
    /// Seed values from the flow's input nodes. Only named inputs carrying a
    /// non-empty provider value contribute an entry.
    pub fn seed(flow: &Flow) -> Self {
        let mut state = Self::default();
        for (_, attrs) in flow.input_nodes() {
            if attrs.name.is_empty() {
                continue;
            }
            if let Some(value) = attrs.value.as_deref().filter(|value| !value.is_empty()) {
                state.values.insert(attrs.name.clone(), value.to_string());
            }
        }
        state
    }

    /// Re-derive from a replacement flow. Fresh provider values come in, but
    /// non-empty values the user already entered win over them. Hidden and
    /// submit node values always take the fresh schema value, so tokens keep
    /// echoing the current flow. Errors and the in-flight flag reset.
    pub fn reseed(&mut self, flow: &Flow) {
        let mut next = Self::seed(flow);
        let reserved: BTreeSet<&str> = flow
            .ui
            .nodes
            .iter()
            .filter(|node| node.is_hidden() || node.is_submit())
            .filter_map(|node| node.input())
            .map(|attrs| attrs.name.as_str())
            .collect();
        for (name, value) in std::mem::take(&mut self.values) {
            if value.is_empty() || reserved.contains(name.as_str()) {
                continue;
            }
            next.values.insert(name, value);
        }
        *self = next;
    }

    /// Record an edit. Clears any error for exactly this field, nothing else.
    pub fn set_value(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_string(), value.into());
        self.field_errors.remove(name);
    }

    /// The stored value for a field, if one was ever set. An empty string is
    /// a real value here, distinct from "never touched".
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set_error(&mut self, name: &str, message: impl Into<String>) {
        self.field_errors.insert(name.to_string(), message.into());
    }

    pub fn error(&self, name: &str) -> Option<&str> {
        self.field_errors.get(name).map(String::as_str)
    }

    /// The whole-form error, if any.
    pub fn form_error(&self) -> Option<&str> {
        self.error(FORM_ERROR_KEY)
    }

    pub fn clear_errors(&mut self) {
        self.field_errors.clear();
    }

    pub fn clear_error(&mut self, name: &str) {
        self.field_errors.remove(name);
    }

    /// Claim the single submission slot. Returns false when a submission is
    /// already running, in which case nothing may be sent.
    pub fn begin_submission(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub fn finish_submission(&mut self) {
        self.in_flight = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Absorb posted form fields as edits. Names belonging to hidden or
    /// submit nodes are skipped: hidden values must keep echoing the schema,
    /// and the submitter is the submission planner's business.
    pub fn apply_posted(&mut self, flow: &Flow, posted: &[(String, String)]) {
        let reserved: BTreeSet<&str> = flow
            .ui
            .nodes
            .iter()
            .filter(|node| node.is_hidden() || node.is_submit())
            .filter_map(|node| node.input())
            .map(|attrs| attrs.name.as_str())
            .collect();
        for (name, value) in posted {
            if reserved.contains(name.as_str()) {
                continue;
            }
            self.set_value(name, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use model::Flow;
    use serde_json::json;

    use super::*;

    fn login_flow() -> Flow {
        serde_json::from_value(json!({
            "id": "f-1",
            "type": "login",
            "ui": {
                "action": "http://idp.test/self-service/login?flow=f-1",
                "method": "POST",
                "nodes": [
                    {"type": "input", "group": "default", "attributes": {
                        "name": "csrf_token", "type": "hidden", "value": "tok-1"}},
                    {"type": "input", "group": "password", "attributes": {
                        "name": "identifier", "type": "email", "value": "seed@example.com"}},
                    {"type": "input", "group": "password", "attributes": {
                        "name": "password", "type": "password"}},
                    {"type": "input", "group": "password", "attributes": {
                        "name": "method", "type": "submit", "value": "password"}}
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn seed_skips_empty_values() {
        let state = FormState::seed(&login_flow());
        assert_eq!(state.value("csrf_token"), Some("tok-1"));
        assert_eq!(state.value("identifier"), Some("seed@example.com"));
        assert_eq!(state.value("password"), None);
    }

    #[test]
    fn reseed_keeps_user_edits_and_takes_fresh_tokens() {
        let flow = login_flow();
        let mut state = FormState::seed(&flow);
        state.set_value("identifier", "typed@example.com");
        state.set_error("identifier", "boom");

        let mut refreshed = flow.clone();
        refreshed.ui.nodes[0].input_mut().unwrap().value = Some("tok-2".into());
        state.reseed(&refreshed);

        assert_eq!(state.value("csrf_token"), Some("tok-2"));
        assert_eq!(state.value("identifier"), Some("typed@example.com"));
        assert_eq!(state.error("identifier"), None);
    }

    #[test]
    fn set_value_clears_only_that_fields_error() {
        let mut state = FormState::default();
        state.set_error("password", "weak");
        state.set_error("identifier", "missing");
        state.set_value("password", "hunter2!");
        assert_eq!(state.error("password"), None);
        assert_eq!(state.error("identifier"), Some("missing"));
    }

    #[test]
    fn posted_hidden_and_submit_names_are_ignored() {
        let flow = login_flow();
        let mut state = FormState::seed(&flow);
        state.apply_posted(
            &flow,
            &[
                ("csrf_token".to_string(), "forged".to_string()),
                ("method".to_string(), "totp".to_string()),
                ("password".to_string(), "hunter2!".to_string()),
            ],
        );
        assert_eq!(state.value("csrf_token"), Some("tok-1"));
        assert_eq!(state.value("method"), None);
        assert_eq!(state.value("password"), Some("hunter2!"));
    }

    #[test]
    fn submission_slot_is_single_occupancy() {
        let mut state = FormState::default();
        assert!(state.begin_submission());
        assert!(!state.begin_submission());
        state.finish_submission();
        assert!(state.begin_submission());
    }
}
