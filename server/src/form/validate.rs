use model::Flow;

use super::{FormPolicy, FormState, CONFIRM_FIELD};

pub const WEAK_PASSWORD_MESSAGE: &str =
    "Password must contain at least one letter, one number, and one symbol.";
pub const CONFIRM_MISSING_MESSAGE: &str = "Please confirm your password.";
pub const CONFIRM_MISMATCH_MESSAGE: &str = "Passwords do not match.";

/// At least one letter, one digit and one symbol, where a symbol is any
/// character that is neither.
pub fn password_is_strong(value: &str) -> bool {
    let mut letter = false;
    let mut digit = false;
    let mut symbol = false;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            letter = true;
        } else if ch.is_numeric() {
            digit = true;
        } else {
            symbol = true;
        }
    }
    letter && digit && symbol
}

/// The live strength check, run after every edit of the primary password
/// field: an empty value clears the error, a weak one sets it, a strong one
/// clears it again.
pub fn refresh_password_strength(flow: &Flow, state: &mut FormState, policy: FormPolicy) {
    if !policy.require_password_strength {
        return;
    }
    let Some(field) = flow.first_password_field().map(str::to_string) else {
        return;
    };
    let value = state.value(&field).unwrap_or_default().to_string();
    if value.is_empty() || password_is_strong(&value) {
        state.clear_error(&field);
    } else {
        state.set_error(&field, WEAK_PASSWORD_MESSAGE);
    }
}

/// Gate checks before a submission may leave the client. Returns false and
/// records a field error when the submission must not happen.
///
/// The strength gate stays neutral on an empty password; the confirmation
/// gate demands a non-empty match whenever the schema carries a password
/// field at all. Flows without a password field pass untouched.
pub(super) fn check_before_submit(
    flow: &Flow,
    state: &mut FormState,
    policy: FormPolicy,
) -> bool {
    let password_field = flow.first_password_field().map(str::to_string);
    let password = password_field
        .as_deref()
        .and_then(|field| state.value(field))
        .unwrap_or_default()
        .to_string();

    if policy.require_password_strength {
        if let Some(field) = password_field.as_deref() {
            if !password.is_empty() && !password_is_strong(&password) {
                state.set_error(field, WEAK_PASSWORD_MESSAGE);
                return false;
            }
        }
    }

    if policy.require_password_confirmation && password_field.is_some() {
        let confirmation = state.value(CONFIRM_FIELD).unwrap_or_default().to_string();
        if confirmation.is_empty() {
            state.set_error(CONFIRM_FIELD, CONFIRM_MISSING_MESSAGE);
            return false;
        }
        if confirmation != password {
            state.set_error(CONFIRM_FIELD, CONFIRM_MISMATCH_MESSAGE);
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn password_flow() -> Flow {
        serde_json::from_value(json!({
            "id": "f-9",
            "type": "settings",
            "ui": {
                "action": "http://idp.test/self-service/settings?flow=f-9",
                "method": "POST",
                "nodes": [
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
    fn strength_requires_all_three_classes() {
        assert!(!password_is_strong(""));
        assert!(!password_is_strong("abc"));
        assert!(!password_is_strong("abc1"));
        assert!(!password_is_strong("1234!"));
        assert!(password_is_strong("abc1!"));
        assert!(password_is_strong("pa55 word"));
    }

    #[test]
    fn live_check_tracks_edits() {
        let flow = password_flow();
        let mut state = FormState::default();
        let policy = FormPolicy {
            require_password_strength: true,
            ..FormPolicy::default()
        };

        state.set_value("password", "abc");
        refresh_password_strength(&flow, &mut state, policy);
        assert_eq!(state.error("password"), Some(WEAK_PASSWORD_MESSAGE));

        state.set_value("password", "abc1!");
        refresh_password_strength(&flow, &mut state, policy);
        assert_eq!(state.error("password"), None);

        state.set_value("password", "");
        refresh_password_strength(&flow, &mut state, policy);
        assert_eq!(state.error("password"), None);
    }

    #[test]
    fn empty_password_still_requires_confirmation() {
        let flow = password_flow();
        let mut state = FormState::default();
        assert!(!check_before_submit(&flow, &mut state, FormPolicy::STRICT));
        assert_eq!(state.error("password"), None);
        assert_eq!(state.error(CONFIRM_FIELD), Some(CONFIRM_MISSING_MESSAGE));
    }

    #[test]
    fn empty_password_passes_without_confirmation_policy() {
        let flow = password_flow();
        let mut state = FormState::default();
        let policy = FormPolicy {
            require_password_strength: true,
            ..FormPolicy::default()
        };
        assert!(check_before_submit(&flow, &mut state, policy));
        assert_eq!(state.error("password"), None);
    }

    #[test]
    fn missing_confirmation_blocks_submit() {
        let flow = password_flow();
        let mut state = FormState::default();
        state.set_value("password", "abc1!");
        assert!(!check_before_submit(&flow, &mut state, FormPolicy::STRICT));
        assert_eq!(state.error(CONFIRM_FIELD), Some(CONFIRM_MISSING_MESSAGE));
    }

    #[test]
    fn mismatched_confirmation_blocks_submit() {
        let flow = password_flow();
        let mut state = FormState::default();
        state.set_value("password", "abc1!");
        state.set_value(CONFIRM_FIELD, "abc2!");
        assert!(!check_before_submit(&flow, &mut state, FormPolicy::STRICT));
        assert_eq!(state.error(CONFIRM_FIELD), Some(CONFIRM_MISMATCH_MESSAGE));
    }

    #[test]
    fn weak_password_reported_before_confirmation() {
        let flow = password_flow();
        let mut state = FormState::default();
        state.set_value("password", "abc");
        assert!(!check_before_submit(&flow, &mut state, FormPolicy::STRICT));
        assert_eq!(state.error("password"), Some(WEAK_PASSWORD_MESSAGE));
        assert_eq!(state.error(CONFIRM_FIELD), None);
    }

    #[test]
    fn flows_without_password_fields_always_pass() {
        let flow: Flow = serde_json::from_value(json!({
            "id": "f-8",
            "type": "recovery",
            "ui": {
                "action": "http://idp.test/self-service/recovery?flow=f-8",
                "method": "POST",
                "nodes": [
                    {"type": "input", "group": "code", "attributes": {
                        "name": "email", "type": "email"}},
                    {"type": "input", "group": "code", "attributes": {
                        "name": "method", "type": "submit", "value": "code"}}
                ]
            }
        }))
        .unwrap();
        let mut state = FormState::default();
        assert!(check_before_submit(&flow, &mut state, FormPolicy::STRICT));
    }
}
