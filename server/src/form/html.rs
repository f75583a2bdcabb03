use std::fmt::Write;

use handlebars::html_escape;
use model::MessageKind;

use super::{ControlKind, FieldControl, FormControl, FormModel};

/// Render a form model to markup. Every provider- or user-supplied string
/// passes through `html_escape` on the way out.
pub fn render_form(model: &FormModel) -> String {
    let mut out = String::with_capacity(2048);
    let _ = write!(
        out,
        "<form method=\"post\" action=\"{}\" class=\"flow-form\">",
        html_escape(&model.action)
    );

    for message in &model.messages {
        let _ = write!(
            out,
            "<p class=\"{}\">{}</p>",
            message_class(message.kind),
            html_escape(&message.text)
        );
    }

    for (name, value) in &model.hidden {
        let _ = write!(
            out,
            "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
            html_escape(name),
            html_escape(value)
        );
    }

    for group in &model.groups {
        let _ = write!(
            out,
            "<div class=\"form-group\" data-group=\"{}\">",
            html_escape(&group.name)
        );
        for control in &group.controls {
            render_control(&mut out, control, model.busy);
        }
        out.push_str("</div>");
    }

    out.push_str("</form>");
    out
}

fn render_control(out: &mut String, control: &FormControl, busy: bool) {
    match control {
        FormControl::Field(field) => render_field(out, field, busy),
        FormControl::Submit { name, value, label } => {
            let mut button = String::from("<button type=\"submit\" class=\"submit-button\"");
            if !name.is_empty() {
                let _ = write!(
                    button,
                    " name=\"{}\" value=\"{}\"",
                    html_escape(name),
                    html_escape(value)
                );
            }
            if busy {
                button.push_str(" disabled");
            }
            let _ = write!(
                button,
                ">{}</button>",
                if busy {
                    "Processing...".to_string()
                } else {
                    html_escape(label)
                }
            );
            out.push_str(&button);
        }
        FormControl::Link { href, label } => {
            let _ = write!(
                out,
                "<a class=\"form-link\" href=\"{}\">{}</a>",
                html_escape(href),
                html_escape(label)
            );
        }
        FormControl::Image { src, caption } => {
            out.push_str("<figure class=\"form-image\">");
            let _ = write!(out, "<img src=\"{}\" alt=\"\">", html_escape(src));
            if let Some(caption) = caption {
                let _ = write!(out, "<figcaption>{}</figcaption>", html_escape(caption));
            }
            out.push_str("</figure>");
        }
        FormControl::Caption { text } => {
            let _ = write!(
                out,
                "<p class=\"form-caption\">{}</p>",
                html_escape(text)
            );
        }
    }
}

fn render_field(out: &mut String, field: &FieldControl, busy: bool) {
    out.push_str("<div class=\"form-field\">");
    let _ = write!(
        out,
        "<label for=\"{}\">{}{}</label>",
        html_escape(&field.name),
        html_escape(&field.label),
        if field.required {
            "<span class=\"required-mark\">*</span>"
        } else {
            ""
        }
    );

    let mut input = String::from("<input class=\"text-input\"");
    let _ = write!(
        input,
        " type=\"{}\" id=\"{}\" name=\"{}\" value=\"{}\"",
        input_type(field.kind),
        html_escape(&field.name),
        html_escape(&field.name),
        html_escape(&field.value)
    );
    if let Some(placeholder) = &field.placeholder {
        let _ = write!(input, " placeholder=\"{}\"", html_escape(placeholder));
    }
    if let Some(autocomplete) = &field.autocomplete {
        let _ = write!(input, " autocomplete=\"{}\"", html_escape(autocomplete));
    }
    if let Some(pattern) = &field.pattern {
        let _ = write!(input, " pattern=\"{}\"", html_escape(pattern));
    }
    if let Some(max_length) = field.max_length {
        let _ = write!(input, " maxlength=\"{max_length}\"");
    }
    if field.required {
        input.push_str(" required");
    }
    if field.disabled || busy {
        input.push_str(" disabled");
    }
    input.push('>');
    out.push_str(&input);

    if let Some(error) = &field.error {
        let _ = write!(out, "<p class=\"field-error\">{}</p>", html_escape(error));
    }
    if field.strength_hint {
        out.push_str(
            "<p class=\"field-hint\">Use at least one letter, one number, and one symbol.</p>",
        );
    }
    for message in &field.messages {
        let _ = write!(
            out,
            "<p class=\"{}\">{}</p>",
            field_message_class(message.kind),
            html_escape(&message.text)
        );
    }
    out.push_str("</div>");
}

fn input_type(kind: ControlKind) -> &'static str {
    match kind {
        ControlKind::Text | ControlKind::Code => "text",
        ControlKind::Email => "email",
        ControlKind::Password => "password",
    }
}

fn message_class(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Error => "message message-error",
        MessageKind::Info => "message message-info",
        MessageKind::Success => "message message-success",
    }
}

fn field_message_class(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Error => "field-message field-message-error",
        MessageKind::Info => "field-message field-message-info",
        MessageKind::Success => "field-message field-message-success",
    }
}
