use model::{Flow, FlowType, InputAttributes, InputKind, MessageKind, NodeKind, UiNode};

use super::{FormPolicy, FormState, CONFIRM_FIELD};

/// A flow rendered down to concrete controls, ready for markup.
#[derive(Debug, Clone, PartialEq)]
pub struct FormModel {
    /// Where the page posts back to (our side, not the provider).
    pub action: String,
    pub busy: bool,
    pub messages: Vec<FormMessage>,
    /// Hidden schema values, echoed verbatim ahead of everything visible.
    pub hidden: Vec<(String, String)>,
    pub groups: Vec<FormGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormMessage {
    pub kind: MessageKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormGroup {
    pub name: String,
    pub controls: Vec<FormControl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormControl {
    Field(FieldControl),
    Submit {
        name: String,
        value: String,
        label: String,
    },
    Link {
        href: String,
        label: String,
    },
    Image {
        src: String,
        caption: Option<String>,
    },
    Caption {
        text: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldControl {
    pub name: String,
    pub kind: ControlKind,
    pub label: String,
    pub value: String,
    pub required: bool,
    pub disabled: bool,
    pub placeholder: Option<String>,
    pub autocomplete: Option<String>,
    pub pattern: Option<String>,
    pub max_length: Option<u32>,
    pub error: Option<String>,
    pub messages: Vec<FormMessage>,
    pub strength_hint: bool,
}

/// What the markup layer turns a field into. Tel and number inputs render as
/// plain text fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControlKind {
    #[default]
    Text,
    Email,
    Password,
    Code,
}

/// Build the renderable model for a flow: hidden echoes first, then visible
/// controls grouped by the schema's `group` in first-seen order.
pub fn build_form(flow: &Flow, state: &FormState, policy: FormPolicy, action: &str) -> FormModel {
    let first_password = flow.first_password_field().map(str::to_string);
    let chosen_submit = if policy.collapse_to_single_submit {
        choose_submit(flow)
    } else {
        None
    };

    let mut messages = Vec::new();
    if let Some(error) = state.form_error() {
        messages.push(FormMessage {
            kind: MessageKind::Error,
            text: error.to_string(),
        });
    }
    for message in &flow.ui.messages {
        messages.push(FormMessage {
            kind: message.kind,
            text: message.text.clone(),
        });
    }

    let mut hidden = Vec::new();
    for (_, attrs) in flow.input_nodes() {
        if attrs.kind == InputKind::Hidden && !attrs.name.is_empty() {
            hidden.push((attrs.name.clone(), attrs.value.clone().unwrap_or_default()));
        }
    }

    // Group slots in first-seen order over the full node list, so a group
    // whose first member is hidden still keeps its place.
    let mut groups: Vec<FormGroup> = Vec::new();
    for node in &flow.ui.nodes {
        if !groups.iter().any(|group| group.name == node.group) {
            groups.push(FormGroup {
                name: node.group.clone(),
                controls: Vec::new(),
            });
        }
    }

    for (index, node) in flow.ui.nodes.iter().enumerate() {
        let Some(control) = map_node(
            flow,
            state,
            policy,
            node,
            index,
            first_password.as_deref(),
            chosen_submit,
        ) else {
            continue;
        };
        let confirm = matches!(&control, FormControl::Field(field)
            if policy.require_password_confirmation
                && field.kind == ControlKind::Password
                && Some(field.name.as_str()) == first_password.as_deref());
        let slot = match groups.iter().position(|group| group.name == node.group) {
            Some(slot) => slot,
            None => continue,
        };
        groups[slot].controls.push(control);
        if confirm {
            groups[slot].controls.push(confirm_control(state));
        }
    }
    groups.retain(|group| !group.controls.is_empty());

    FormModel {
        action: action.to_string(),
        busy: state.in_flight(),
        messages,
        hidden,
        groups,
    }
}

fn map_node(
    flow: &Flow,
    state: &FormState,
    policy: FormPolicy,
    node: &UiNode,
    index: usize,
    first_password: Option<&str>,
    chosen_submit: Option<usize>,
) -> Option<FormControl> {
    if let Some(attrs) = node.input() {
        if attrs.kind == InputKind::Hidden {
            return None;
        }
        // The name wins over the declared subtype for verification codes.
        if attrs.name == "totp_code" || attrs.name == "code" {
            return Some(code_field(flow, state, node, attrs, first_password));
        }
        if matches!(
            attrs.kind,
            InputKind::Text
                | InputKind::Email
                | InputKind::Password
                | InputKind::Tel
                | InputKind::Number
        ) {
            return Some(labeled_field(state, policy, node, attrs, first_password));
        }
        if attrs.kind == InputKind::Submit {
            if policy.collapse_to_single_submit && chosen_submit != Some(index) {
                return None;
            }
            let label = attrs
                .label
                .as_ref()
                .map(|label| label.text.clone())
                .or_else(|| node.meta_label().map(str::to_string))
                .or_else(|| attrs.value.clone().filter(|value| !value.is_empty()))
                .unwrap_or_else(|| "Submit".to_string());
            return Some(FormControl::Submit {
                name: attrs.name.clone(),
                value: attrs.value.clone().unwrap_or_default(),
                label,
            });
        }
        return None;
    }

    match &node.kind {
        NodeKind::A { attributes } => Some(FormControl::Link {
            href: attributes.href.clone(),
            label: attributes
                .title
                .as_ref()
                .map(|title| title.text.clone())
                .or_else(|| node.meta_label().map(str::to_string))
                .unwrap_or_else(|| attributes.href.clone()),
        }),
        NodeKind::Img { attributes } => Some(FormControl::Image {
            src: attributes.src.clone(),
            caption: node.meta_label().map(str::to_string),
        }),
        NodeKind::Text { attributes } => {
            let text = node
                .meta_label()
                .map(str::to_string)
                .or_else(|| attributes.text.as_ref().map(|text| text.text.clone()))?;
            Some(FormControl::Caption { text })
        }
        _ => None,
    }
}

fn labeled_field(
    state: &FormState,
    policy: FormPolicy,
    node: &UiNode,
    attrs: &InputAttributes,
    first_password: Option<&str>,
) -> FormControl {
    let name = attrs.name.clone();
    let label = attrs
        .label
        .as_ref()
        .map(|label| label.text.clone())
        .or_else(|| node.meta_label().map(str::to_string))
        .unwrap_or_else(|| name.clone());

    let required = attrs.required;

    let kind = match attrs.kind {
        InputKind::Password => ControlKind::Password,
        InputKind::Email => ControlKind::Email,
        _ => ControlKind::Text,
    };

    FormControl::Field(FieldControl {
        value: display_value(state, &name, attrs.value.as_deref()),
        kind,
        label,
        required,
        disabled: attrs.disabled,
        placeholder: attrs.title.clone(),
        autocomplete: attrs.autocomplete.clone(),
        pattern: attrs.pattern.clone(),
        max_length: attrs.maxlength,
        error: state.error(&name).map(str::to_string),
        messages: node_messages(node),
        strength_hint: kind == ControlKind::Password
            && policy.require_password_strength
            && Some(name.as_str()) == first_password,
        name,
    })
}

fn code_field(
    flow: &Flow,
    state: &FormState,
    node: &UiNode,
    attrs: &InputAttributes,
    first_password: Option<&str>,
) -> FormControl {
    let name = attrs.name.clone();
    let label = attrs
        .label
        .as_ref()
        .map(|label| label.text.clone())
        .or_else(|| node.meta_label().map(str::to_string))
        .unwrap_or_else(|| "Verification Code".to_string());

    // A recovery flow that already offers a password field treats the reset
    // code as optional.
    let required = attrs.required
        && !(flow.flow_type == FlowType::Recovery && first_password.is_some());

    FormControl::Field(FieldControl {
        value: state
            .value(&name)
            .filter(|value| !value.is_empty())
            .unwrap_or_default()
            .to_string(),
        kind: ControlKind::Code,
        label,
        required,
        disabled: attrs.disabled,
        placeholder: Some("Enter code".to_string()),
        pattern: attrs.pattern.clone(),
        max_length: Some(6),
        error: state.error(&name).map(str::to_string),
        messages: node_messages(node),
        name,
        ..FieldControl::default()
    })
}

fn confirm_control(state: &FormState) -> FormControl {
    FormControl::Field(FieldControl {
        name: CONFIRM_FIELD.to_string(),
        kind: ControlKind::Password,
        label: "Confirm password".to_string(),
        value: state.value(CONFIRM_FIELD).unwrap_or_default().to_string(),
        required: true,
        autocomplete: Some("new-password".to_string()),
        error: state.error(CONFIRM_FIELD).map(str::to_string),
        ..FieldControl::default()
    })
}

/// Display precedence: a non-empty stored value, else the provider value,
/// else empty. Distinct from the payload rule, where a stored empty string
/// wins over the provider value.
fn display_value(state: &FormState, name: &str, provider: Option<&str>) -> String {
    state
        .value(name)
        .filter(|value| !value.is_empty())
        .or(provider)
        .unwrap_or_default()
        .to_string()
}

fn node_messages(node: &UiNode) -> Vec<FormMessage> {
    node.messages
        .iter()
        .map(|message| FormMessage {
            kind: message.kind,
            text: message.text.clone(),
        })
        .collect()
}

/// When collapsing, prefer the last submit whose label or value mentions
/// "save", else the last submit overall.
fn choose_submit(flow: &Flow) -> Option<usize> {
    let mut submits: Vec<(usize, String)> = Vec::new();
    for (index, node) in flow.ui.nodes.iter().enumerate() {
        let Some(attrs) = node.input() else { continue };
        if attrs.kind != InputKind::Submit {
            continue;
        }
        let label = attrs
            .label
            .as_ref()
            .map(|label| label.text.clone())
            .or_else(|| node.meta_label().map(str::to_string))
            .unwrap_or_default();
        let value = attrs.value.clone().unwrap_or_default();
        submits.push((index, format!("{label} {value}").to_lowercase()));
    }
    submits
        .iter()
        .rev()
        .find(|(_, haystack)| haystack.contains("save"))
        .map(|(index, _)| *index)
        .or_else(|| submits.last().map(|(index, _)| *index))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn settings_flow() -> Flow {
        serde_json::from_value(json!({
            "id": "f-2",
            "type": "settings",
            "ui": {
                "action": "http://idp.test/self-service/settings?flow=f-2",
                "method": "POST",
                "nodes": [
                    {"type": "input", "group": "default", "attributes": {
                        "name": "csrf_token", "type": "hidden", "value": "tok"}},
                    {"type": "input", "group": "profile", "attributes": {
                        "name": "traits.email", "type": "email", "value": "a@b.c"},
                     "meta": {"label": {"id": 1, "text": "E-Mail", "type": "info"}}},
                    {"type": "input", "group": "profile", "attributes": {
                        "name": "method", "type": "submit", "value": "profile"},
                     "meta": {"label": {"id": 2, "text": "Save profile", "type": "info"}}},
                    {"type": "input", "group": "password", "attributes": {
                        "name": "password", "type": "password", "required": true}},
                    {"type": "input", "group": "password", "attributes": {
                        "name": "method", "type": "submit", "value": "password"},
                     "meta": {"label": {"id": 3, "text": "Save password", "type": "info"}}}
                ]
            }
        }))
        .unwrap()
    }

    fn controls_by_name(model: &FormModel) -> Vec<String> {
        model
            .groups
            .iter()
            .flat_map(|group| group.controls.iter())
            .map(|control| match control {
                FormControl::Field(field) => format!("field:{}", field.name),
                FormControl::Submit { value, .. } => format!("submit:{value}"),
                FormControl::Link { href, .. } => format!("link:{href}"),
                FormControl::Image { src, .. } => format!("image:{src}"),
                FormControl::Caption { .. } => "caption".to_string(),
            })
            .collect()
    }

    #[test]
    fn hidden_nodes_echo_schema_values() {
        let flow = settings_flow();
        let state = FormState::seed(&flow);
        let model = build_form(&flow, &state, FormPolicy::default(), "/settings");
        assert_eq!(model.hidden, vec![("csrf_token".to_string(), "tok".to_string())]);
        assert!(!controls_by_name(&model).contains(&"field:csrf_token".to_string()));
    }

    #[test]
    fn collapse_keeps_last_save_submit() {
        let flow = settings_flow();
        let state = FormState::seed(&flow);
        let model = build_form(&flow, &state, FormPolicy::STRICT, "/settings");
        let names = controls_by_name(&model);
        assert!(names.contains(&"submit:password".to_string()));
        assert!(!names.contains(&"submit:profile".to_string()));
    }

    #[test]
    fn collapse_falls_back_to_last_submit_without_save_label() {
        let mut flow = settings_flow();
        for node in &mut flow.ui.nodes {
            if let Some(meta) = node.meta.as_mut() {
                meta.label = None;
            }
        }
        let state = FormState::seed(&flow);
        let model = build_form(&flow, &state, FormPolicy::STRICT, "/settings");
        let names = controls_by_name(&model);
        assert!(names.contains(&"submit:password".to_string()));
        assert!(!names.contains(&"submit:profile".to_string()));
    }

    #[test]
    fn collapse_prefers_save_even_when_not_last() {
        let mut flow = settings_flow();
        // Strip the password submit's label so only the profile one says save.
        flow.ui.nodes[4].meta = None;
        let state = FormState::seed(&flow);
        let model = build_form(&flow, &state, FormPolicy::STRICT, "/settings");
        let names = controls_by_name(&model);
        assert!(names.contains(&"submit:profile".to_string()));
        assert!(!names.contains(&"submit:password".to_string()));
    }

    #[test]
    fn confirmation_field_renders_after_first_password() {
        let flow = settings_flow();
        let state = FormState::seed(&flow);
        let model = build_form(&flow, &state, FormPolicy::STRICT, "/settings");
        let names = controls_by_name(&model);
        let password = names.iter().position(|name| name == "field:password");
        let confirm = names.iter().position(|name| name == "field:confirm_password");
        assert!(password.is_some());
        assert_eq!(confirm, password.map(|index| index + 1));
    }

    #[test]
    fn strength_hint_only_on_primary_password() {
        let flow = settings_flow();
        let state = FormState::seed(&flow);
        let model = build_form(&flow, &state, FormPolicy::STRICT, "/settings");
        let hints: Vec<bool> = model
            .groups
            .iter()
            .flat_map(|group| group.controls.iter())
            .filter_map(|control| match control {
                FormControl::Field(field) if field.kind == ControlKind::Password => {
                    Some(field.strength_hint)
                }
                _ => None,
            })
            .collect();
        assert_eq!(hints, vec![true, false]);
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let flow = settings_flow();
        let state = FormState::seed(&flow);
        let model = build_form(&flow, &state, FormPolicy::default(), "/settings");
        let order: Vec<&str> = model.groups.iter().map(|group| group.name.as_str()).collect();
        assert_eq!(order, vec!["profile", "password"]);
    }

    #[test]
    fn recovery_code_not_required_when_password_present() {
        let flow: Flow = serde_json::from_value(json!({
            "id": "f-3",
            "type": "recovery",
            "ui": {
                "action": "http://idp.test/self-service/recovery?flow=f-3",
                "method": "POST",
                "nodes": [
                    {"type": "input", "group": "code", "attributes": {
                        "name": "code", "type": "text", "required": true}},
                    {"type": "input", "group": "password", "attributes": {
                        "name": "password", "type": "password", "required": true}},
                    {"type": "input", "group": "code", "attributes": {
                        "name": "method", "type": "submit", "value": "code"}}
                ]
            }
        }))
        .unwrap();
        let state = FormState::seed(&flow);
        let model = build_form(&flow, &state, FormPolicy::default(), "/recovery");
        let code = model
            .groups
            .iter()
            .flat_map(|group| group.controls.iter())
            .find_map(|control| match control {
                FormControl::Field(field) if field.name == "code" => Some(field.clone()),
                _ => None,
            })
            .unwrap();
        // Name beats the declared text subtype.
        assert_eq!(code.kind, ControlKind::Code);
        assert!(!code.required);
    }

    #[test]
    fn code_named_submit_value_becomes_code_field() {
        let flow: Flow = serde_json::from_value(json!({
            "id": "f-4",
            "type": "login",
            "ui": {
                "action": "http://idp.test/self-service/login?flow=f-4",
                "method": "POST",
                "nodes": [
                    {"type": "input", "group": "totp", "attributes": {
                        "name": "totp_code", "type": "checkbox"}},
                    {"type": "input", "group": "totp", "attributes": {
                        "name": "method", "type": "submit", "value": "totp"}}
                ]
            }
        }))
        .unwrap();
        let state = FormState::default();
        let model = build_form(&flow, &state, FormPolicy::default(), "/mfa");
        let field = model
            .groups
            .iter()
            .flat_map(|group| group.controls.iter())
            .find_map(|control| match control {
                FormControl::Field(field) if field.name == "totp_code" => Some(field.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(field.kind, ControlKind::Code);
        assert_eq!(field.label, "Verification Code");
        assert_eq!(field.max_length, Some(6));
        assert_eq!(field.placeholder.as_deref(), Some("Enter code"));
    }

    #[test]
    fn form_error_renders_before_flow_messages() {
        let flow: Flow = serde_json::from_value(json!({
            "id": "f-5",
            "type": "login",
            "ui": {
                "action": "http://idp.test/self-service/login?flow=f-5",
                "method": "POST",
                "nodes": [],
                "messages": [
                    {"id": 4000006, "text": "Invalid credentials.", "type": "error"}
                ]
            }
        }))
        .unwrap();
        let mut state = FormState::default();
        state.set_error(super::super::FORM_ERROR_KEY, "Something went sideways.");
        let model = build_form(&flow, &state, FormPolicy::default(), "/login");
        assert_eq!(model.messages.len(), 2);
        assert_eq!(model.messages[0].text, "Something went sideways.");
        assert_eq!(model.messages[0].kind, MessageKind::Error);
        assert_eq!(model.messages[1].text, "Invalid credentials.");
    }

    #[test]
    fn image_and_link_nodes_render() {
        let flow: Flow = serde_json::from_value(json!({
            "id": "f-6",
            "type": "settings",
            "ui": {
                "action": "http://idp.test/self-service/settings?flow=f-6",
                "method": "POST",
                "nodes": [
                    {"type": "img", "group": "totp", "attributes": {
                        "src": "data:image/png;base64,AAAA"},
                     "meta": {"label": {"id": 5, "text": "Scan this QR code", "type": "info"}}},
                    {"type": "a", "group": "default", "attributes": {
                        "href": "https://idp.test/help",
                        "title": {"id": 6, "text": "Need help?", "type": "info"}}},
                    {"type": "text", "group": "totp", "attributes": {
                        "text": {"id": 7, "text": "Your backup codes", "type": "info"}}}
                ]
            }
        }))
        .unwrap();
        let state = FormState::default();
        let model = build_form(&flow, &state, FormPolicy::default(), "/mfa");
        let names = controls_by_name(&model);
        assert_eq!(
            names,
            vec![
                "image:data:image/png;base64,AAAA".to_string(),
                "caption".to_string(),
                "link:https://idp.test/help".to_string(),
            ]
        );
        assert_eq!(
            model.groups.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
            vec!["totp", "default"]
        );
    }

    #[test]
    fn display_value_prefers_nonempty_state() {
        let flow = settings_flow();
        let mut state = FormState::seed(&flow);
        state.set_value("traits.email", "");
        let model = build_form(&flow, &state, FormPolicy::default(), "/settings");
        let email = model
            .groups
            .iter()
            .flat_map(|group| group.controls.iter())
            .find_map(|control| match control {
                FormControl::Field(field) if field.name == "traits.email" => {
                    Some(field.value.clone())
                }
                _ => None,
            })
            .unwrap();
        // An emptied field falls back to the provider value for display only.
        assert_eq!(email, "a@b.c");
    }
}
