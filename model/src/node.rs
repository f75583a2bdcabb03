use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One element of a flow's rendered UI. The provider describes every control
/// as a node; the `type` tag decides what the attribute bag looks like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiNode {
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<UiText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<NodeMeta>,
}

fn default_group() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    Input { attributes: InputAttributes },
    Text { attributes: TextAttributes },
    Img { attributes: ImageAttributes },
    A { attributes: AnchorAttributes },
    /// Node types without a rendering (scripts and similar).
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<UiText>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputAttributes {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: InputKind,
    /// Providers send string, number and boolean values here; everything is
    /// carried as a string since the submission body is flat string-valued.
    #[serde(
        default,
        deserialize_with = "scalar_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autocomplete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxlength: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<UiText>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Hidden,
    #[default]
    Text,
    Email,
    Password,
    Tel,
    Number,
    Checkbox,
    Button,
    Submit,
    Other,
}

// Hand-rolled so unrecognized subtypes (date, url, ...) land on `Other`
// instead of failing the whole flow deserialization.
impl<'de> Deserialize<'de> for InputKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "hidden" => Self::Hidden,
            "text" => Self::Text,
            "email" => Self::Email,
            "password" => Self::Password,
            "tel" => Self::Tel,
            "number" => Self::Number,
            "checkbox" => Self::Checkbox,
            "button" => Self::Button,
            "submit" => Self::Submit,
            _ => Self::Other,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<UiText>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAttributes {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorAttributes {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<UiText>,
}

/// Provider message, attached either to a whole flow or to a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiText {
    #[serde(default)]
    pub id: i64,
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl UiText {
    pub fn new(text: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            id: 0,
            text: text.into(),
            kind,
            context: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Error,
    #[default]
    Info,
    Success,
}

impl UiNode {
    pub fn input(&self) -> Option<&InputAttributes> {
        match &self.kind {
            NodeKind::Input { attributes } => Some(attributes),
            _ => None,
        }
    }

    pub fn input_mut(&mut self) -> Option<&mut InputAttributes> {
        match &mut self.kind {
            NodeKind::Input { attributes } => Some(attributes),
            _ => None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self.input(), Some(attrs) if attrs.kind == InputKind::Hidden)
    }

    pub fn is_submit(&self) -> bool {
        matches!(self.input(), Some(attrs) if attrs.kind == InputKind::Submit)
    }

    pub fn meta_label(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|meta| meta.label.as_ref())
            .map(|label| label.text.as_str())
    }

    pub fn has_error_message(&self) -> bool {
        self.messages
            .iter()
            .any(|message| message.kind == MessageKind::Error)
    }
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }))
}
