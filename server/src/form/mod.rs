//! Headless form engine for provider-described flows.
//!
//! Three stages: [`FormState`] tracks per-field values and errors for one
//! flow, [`build_form`] turns a flow plus the page's [`FormPolicy`] into a
//! renderable [`FormModel`], and [`plan_submission`] / [`run_submission`]
//! drive a single submit attempt end to end.

mod html;
mod render;
mod state;
mod submit;
mod validate;

pub use html::render_form;
pub use render::{
    build_form, ControlKind, FieldControl, FormControl, FormGroup, FormMessage, FormModel,
};
pub use state::FormState;
pub use submit::{plan_submission, run_submission, SubmissionPlan, SubmitEnd};
pub use validate::{password_is_strong, refresh_password_strength, WEAK_PASSWORD_MESSAGE};

/// Key under which whole-form errors live in [`FormState`].
pub const FORM_ERROR_KEY: &str = "_form";

/// Name of the synthetic confirmation field. Never part of the provider
/// schema and never part of the submission payload.
pub const CONFIRM_FIELD: &str = "confirm_password";

/// Per-page rendering and validation switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormPolicy {
    /// Render a confirmation input after the flow's first password field and
    /// require both to match before submitting.
    pub require_password_confirmation: bool,
    /// Enforce letter+digit+symbol on the first password field, live and at
    /// submit time.
    pub require_password_strength: bool,
    /// Render a single submit control, preferring a "save"-labeled one.
    pub collapse_to_single_submit: bool,
}

impl FormPolicy {
    /// Everything on. What the settings page uses.
    pub const STRICT: Self = Self {
        require_password_confirmation: true,
        require_password_strength: true,
        collapse_to_single_submit: true,
    };
}
