//! Helpers for exercising the full router against live mock upstreams.
//!
//! The mocks bind ephemeral loopback ports. Canned payloads may reference
//! the placeholder origin `http://self.test`; it is rewritten to the mock's
//! live address on the way out, so fixtures can carry absolute action and
//! redirect URLs without knowing their port up front.

use std::fmt::Debug;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

use axum::body::{Body, HttpBody};
use axum::extract::{Host, Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use futures::Future;
use http::header::{CONTENT_TYPE, HOST, SET_COOKIE};
use http::{HeaderValue, Method, Request, StatusCode};
use serde_json::{json, Value};

use crate::{backend::TodoClient, idp::FlowClient, setup, AppState};

/// Serve a router on an ephemeral loopback port, returning its base URL.
/// The server lives until the test process exits.
pub async fn serve_upstream(router: Router) -> String {
    let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
        .serve(router.into_make_service());
    let addr = server.local_addr();
    tokio::spawn(server);
    format!("http://{addr}")
}

/// A loopback URL nothing listens on, for connection-refused scenarios.
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

pub fn state_for(idp_url: &str, backend_url: &str) -> AppState {
    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("HTTP client");
    let flows = FlowClient::new(http.clone(), idp_url).expect("idp url");
    let todos = TodoClient::new(http, backend_url).expect("backend url");
    AppState::new(flows, todos, setup::templates())
}

/// The full application wired to the given upstream mocks.
pub async fn app(idp: Router, backend: Router) -> Router {
    let idp_url = serve_upstream(idp).await;
    let backend_url = serve_upstream(backend).await;
    setup::router(state_for(&idp_url, &backend_url))
}

pub async fn run_test<F, T>(idp: Router, backend: Router, func: F) -> T::Output
where
    T: Future + Send + 'static,
    T::Output: Send + 'static,
    F: FnOnce(Router) -> T,
{
    let _ = tracing_subscriber::fmt().try_init();
    let router = app(idp, backend).await;
    let future = func(router);
    future.await
}

pub fn request(method: Method, path: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header(HOST, "127.0.0.1")
        .body(Body::empty())
        .unwrap()
}

/// Browser-style form POST.
pub fn form_request(path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(HOST, "127.0.0.1")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_to_string<B>(body: B) -> String
where
    B: HttpBody,
    B::Error: Debug,
{
    let body = hyper::body::to_bytes(body).await.unwrap();
    String::from_utf8_lossy(&body).to_string()
}

/// Canned identity provider.
#[derive(Debug, Clone, Default)]
pub struct MockIdp {
    /// Flow JSON served for every flow GET, fresh or resumed.
    pub flow: Option<Value>,
    /// Status and body answering flow submissions.
    pub submit: Option<(u16, Value)>,
    /// Session JSON for whoami; `None` answers 401.
    pub session: Option<Value>,
    /// Logout target; defaults to a provider logout URL with a token.
    pub logout_url: Option<String>,
}

pub fn mock_idp(mock: MockIdp) -> Router {
    Router::new()
        .route("/self-service/:flow/flows", get(idp_flow))
        .route("/self-service/:flow/browser", get(idp_flow))
        .route("/self-service/logout/browser", get(idp_logout))
        .route("/self-service/:flow", post(idp_submit))
        .route("/sessions/whoami", get(idp_whoami))
        .with_state(Arc::new(mock))
}

/// Canned task backend.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    /// Task list answered on GET; `Null` means an empty list.
    pub todos: Value,
    /// When set, every call fails with this status and body.
    pub fail: Option<(u16, Value)>,
}

pub fn mock_backend(mock: MockBackend) -> Router {
    Router::new()
        .route("/api/todos", get(backend_list).post(backend_create))
        .route("/api/todos/:id", patch(backend_update).delete(backend_delete))
        .with_state(Arc::new(mock))
}

/// Rewrite the placeholder origin in a canned payload to the live host.
pub fn materialize(value: &Value, host: &str) -> Value {
    let text = value
        .to_string()
        .replace("http://self.test", &format!("http://{host}"));
    serde_json::from_str(&text).unwrap()
}

async fn idp_flow(State(mock): State<Arc<MockIdp>>, Host(host): Host) -> Response {
    match &mock.flow {
        Some(flow) => {
            let mut response = Json(materialize(flow, &host)).into_response();
            response.headers_mut().append(
                SET_COOKIE,
                HeaderValue::from_static("mock_csrf=token-1; Path=/"),
            );
            response
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn idp_submit(State(mock): State<Arc<MockIdp>>, Host(host): Host) -> Response {
    match &mock.submit {
        Some((status, body)) => {
            let status = StatusCode::from_u16(*status).expect("mock status");
            (status, Json(materialize(body, &host))).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn idp_whoami(State(mock): State<Arc<MockIdp>>) -> Response {
    match &mock.session {
        Some(session) => Json(session.clone()).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"code": 401, "message": "no session"}})),
        )
            .into_response(),
    }
}

async fn idp_logout(State(mock): State<Arc<MockIdp>>, Host(host): Host) -> Response {
    let target = mock
        .logout_url
        .clone()
        .unwrap_or_else(|| "http://self.test/self-service/logout?token=t-1".to_string())
        .replace("http://self.test", &format!("http://{host}"));
    Json(json!({"logout_token": "t-1", "logout_url": target})).into_response()
}

impl MockBackend {
    fn failure(&self) -> Option<Response> {
        self.fail.as_ref().map(|(status, body)| {
            let status = StatusCode::from_u16(*status).expect("mock status");
            (status, Json(body.clone())).into_response()
        })
    }
}

async fn backend_list(State(mock): State<Arc<MockBackend>>) -> Response {
    if let Some(response) = mock.failure() {
        return response;
    }
    let todos = if mock.todos.is_null() {
        json!([])
    } else {
        mock.todos.clone()
    };
    Json(todos).into_response()
}

async fn backend_create(State(mock): State<Arc<MockBackend>>, Json(body): Json<Value>) -> Response {
    if let Some(response) = mock.failure() {
        return response;
    }
    let title = body.get("title").and_then(Value::as_str).unwrap_or_default();
    Json(json!({"id": "t-new", "title": title, "completed": false})).into_response()
}

async fn backend_update(
    State(mock): State<Arc<MockBackend>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if let Some(response) = mock.failure() {
        return response;
    }
    let completed = body.get("completed").and_then(Value::as_bool).unwrap_or(false);
    Json(json!({"id": id, "title": "task", "completed": completed})).into_response()
}

async fn backend_delete(State(mock): State<Arc<MockBackend>>, Path(_id): Path<String>) -> Response {
    if let Some(response) = mock.failure() {
        return response;
    }
    StatusCode::NO_CONTENT.into_response()
}
