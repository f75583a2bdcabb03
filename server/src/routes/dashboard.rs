use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Router,
};
use http::StatusCode;
use model::TodoId;
use serde::Serialize;

use crate::{
    error::{PageError, PageErrorKind},
    routes::support,
    session::CurrentUser,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard_page))
        .route("/dashboard/todos/:id/delete", post(delete_any_todo))
}

#[derive(Debug, Serialize)]
struct DashboardPage {
    title: String,
    label: String,
    email: Option<String>,
    admin: Option<AdminPanel>,
}

/// Administrator's view over every account's tasks.
#[derive(Debug, Serialize)]
struct AdminPanel {
    offline: bool,
    error: Option<String>,
    todos: Vec<AdminRow>,
    total: usize,
}

#[derive(Debug, Serialize)]
struct AdminRow {
    id: String,
    title: String,
    completed: bool,
    owner: String,
}

async fn dashboard_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response, PageError> {
    render_dashboard(&state, user, None).await
}

async fn delete_any_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut user: CurrentUser,
) -> Result<Response, PageError> {
    if !user.is_admin() {
        return Err(PageErrorKind::Status(StatusCode::FORBIDDEN).into());
    }
    let user_id = user.user_id().to_string();
    match state
        .todos()
        .delete(&mut user.relay, Some(&user_id), &TodoId::Text(id))
        .await
    {
        Ok(()) => Ok(support::see_other(user.relay, "/dashboard")),
        Err(err) if err.is_unauthorized() => Ok(support::see_other(user.relay, "/login")),
        Err(err) => {
            let message = if err.is_network() {
                support::BACKEND_OFFLINE_MESSAGE.to_string()
            } else {
                err.to_string()
            };
            render_dashboard(&state, user, Some(message)).await
        }
    }
}

async fn render_dashboard(
    state: &AppState,
    user: CurrentUser,
    action_error: Option<String>,
) -> Result<Response, PageError> {
    let CurrentUser { session, mut relay } = user;

    let admin = if session.identity.is_admin() {
        match state
            .todos()
            .list(&mut relay, Some(&session.identity.id))
            .await
        {
            Ok(todos) => {
                let total = todos.len();
                let rows = todos
                    .into_iter()
                    .map(|todo| AdminRow {
                        id: todo.id.to_string(),
                        owner: todo.owner_label().to_string(),
                        title: todo.title,
                        completed: todo.completed,
                    })
                    .collect();
                Some(AdminPanel {
                    offline: false,
                    error: action_error,
                    todos: rows,
                    total,
                })
            }
            Err(err) if err.is_unauthorized() => {
                return Ok(support::see_other(relay, "/login"));
            }
            Err(err) if err.is_network() => Some(AdminPanel {
                offline: true,
                error: action_error,
                todos: Vec::new(),
                total: 0,
            }),
            Err(err) => Some(AdminPanel {
                offline: false,
                error: Some(action_error.unwrap_or_else(|| err.to_string())),
                todos: Vec::new(),
                total: 0,
            }),
        }
    } else {
        None
    };

    let page = DashboardPage {
        title: "Dashboard".to_string(),
        label: session.identity.display_label().to_string(),
        email: session.identity.email().map(str::to_string),
        admin,
    };
    let body = state.render("dashboard", &page)?;
    Ok(relay.wrap(body))
}
