use std::fmt;

use serde::{Deserialize, Serialize};

/// Task record as served by the todo API. The API is inconsistent about
/// camelCase versus snake_case depending on the handler, so both spellings
/// are accepted on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, alias = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, alias = "userEmail", skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default, alias = "ownerId", skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, alias = "ownerEmail", skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
}

impl Todo {
    /// Best owner description available for admin listings.
    pub fn owner_label(&self) -> &str {
        self.owner_email
            .as_deref()
            .or(self.user_email.as_deref())
            .or(self.owner_id.as_deref())
            .or(self.user_id.as_deref())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TodoId {
    Text(String),
    Number(i64),
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TodoId::Text(id) => f.write_str(id),
            TodoId::Number(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTodo {
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TodoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}
