use axum::{
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Form, Router,
};
use model::{TodoId, TodoPatch};
use serde::{Deserialize, Serialize};

use crate::{
    backend::BackendError, error::PageError, routes::support, session::CurrentUser,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/todos", get(todos_page).post(add_todo))
        .route("/todos/:id/toggle", post(toggle_todo))
        .route("/todos/:id/delete", post(delete_todo))
}

#[derive(Debug, Serialize)]
struct TodosPage {
    title: String,
    email: String,
    offline: bool,
    error: Option<String>,
    todos: Vec<TodoRow>,
    open: usize,
    total: usize,
}

#[derive(Debug, Serialize)]
struct TodoRow {
    id: String,
    title: String,
    completed: bool,
    /// Target state the toggle form posts.
    toggle_to: bool,
}

async fn todos_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response, PageError> {
    render_todos(&state, user, None).await
}

#[derive(Debug, Deserialize)]
struct AddTodoForm {
    title: String,
}

async fn add_todo(
    State(state): State<AppState>,
    mut user: CurrentUser,
    Form(form): Form<AddTodoForm>,
) -> Result<Response, PageError> {
    let title = form.title.trim().to_string();
    if title.is_empty() {
        return Ok(support::see_other(user.relay, "/todos"));
    }
    let user_id = user.user_id().to_string();
    match state
        .todos()
        .create(&mut user.relay, Some(&user_id), &title)
        .await
    {
        Ok(_) => Ok(support::see_other(user.relay, "/todos")),
        Err(err) => fail_action(&state, user, err).await,
    }
}

#[derive(Debug, Deserialize)]
struct ToggleForm {
    completed: bool,
}

async fn toggle_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut user: CurrentUser,
    Form(form): Form<ToggleForm>,
) -> Result<Response, PageError> {
    let user_id = user.user_id().to_string();
    let patch = TodoPatch {
        title: None,
        completed: Some(form.completed),
    };
    match state
        .todos()
        .update(&mut user.relay, Some(&user_id), &TodoId::Text(id), &patch)
        .await
    {
        Ok(_) => Ok(support::see_other(user.relay, "/todos")),
        Err(err) => fail_action(&state, user, err).await,
    }
}

async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut user: CurrentUser,
) -> Result<Response, PageError> {
    let user_id = user.user_id().to_string();
    match state
        .todos()
        .delete(&mut user.relay, Some(&user_id), &TodoId::Text(id))
        .await
    {
        Ok(()) => Ok(support::see_other(user.relay, "/todos")),
        Err(err) => fail_action(&state, user, err).await,
    }
}

/// A failed mutation: a lost session goes back through login, anything else
/// renders the list with the failure inline.
async fn fail_action(
    state: &AppState,
    user: CurrentUser,
    err: BackendError,
) -> Result<Response, PageError> {
    if err.is_unauthorized() {
        return Ok(support::see_other(user.relay, "/login"));
    }
    let message = if err.is_network() {
        support::BACKEND_OFFLINE_MESSAGE.to_string()
    } else {
        err.to_string()
    };
    render_todos(state, user, Some(message)).await
}

async fn render_todos(
    state: &AppState,
    user: CurrentUser,
    action_error: Option<String>,
) -> Result<Response, PageError> {
    let CurrentUser { session, mut relay } = user;
    let mut offline = false;
    let mut error = action_error;
    let todos = match state
        .todos()
        .list(&mut relay, Some(&session.identity.id))
        .await
    {
        Ok(todos) => todos,
        Err(err) if err.is_unauthorized() => {
            return Ok(support::see_other(relay, "/login"));
        }
        Err(err) if err.is_network() => {
            offline = true;
            Vec::new()
        }
        Err(err) => {
            error.get_or_insert(err.to_string());
            Vec::new()
        }
    };

    let open = todos.iter().filter(|todo| !todo.completed).count();
    let total = todos.len();
    let rows = todos
        .into_iter()
        .map(|todo| TodoRow {
            id: todo.id.to_string(),
            toggle_to: !todo.completed,
            title: todo.title,
            completed: todo.completed,
        })
        .collect();

    let page = TodosPage {
        title: "My Tasks".to_string(),
        email: session
            .identity
            .email()
            .unwrap_or("unknown account")
            .to_string(),
        offline,
        error,
        todos: rows,
        open,
        total,
    };
    let body = state.render("todos", &page)?;
    Ok(relay.wrap(body))
}
