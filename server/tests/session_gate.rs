use http::{header::LOCATION, Method, StatusCode};
use serde_json::{json, Value};
use taskport_server::test_util::*;
use tower::ServiceExt;

fn session() -> Value {
    json!({
        "id": "sess-1",
        "active": true,
        "identity": {"id": "user-1", "traits": {"email": "me@example.com"}}
    })
}

#[tokio::test]
async fn anonymous_browsers_are_sent_to_login() {
    let idp = mock_idp(MockIdp::default());
    run_test(idp, mock_backend(MockBackend::default()), |app| async move {
        for (path, target) in [
            ("/todos", "/login?return_to=%2Ftodos"),
            ("/dashboard", "/login?return_to=%2Fdashboard"),
        ] {
            let response = app
                .clone()
                .oneshot(request(Method::GET, path))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(response.headers()[LOCATION], target);
        }
    })
    .await;
}

#[tokio::test]
async fn the_root_redirects_by_session() {
    let signed_in = mock_idp(MockIdp {
        session: Some(session()),
        ..Default::default()
    });
    run_test(
        signed_in,
        mock_backend(MockBackend::default()),
        |app| async move {
            let response = app.oneshot(request(Method::GET, "/")).await.unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(response.headers()[LOCATION], "/todos");
        },
    )
    .await;

    let anonymous = mock_idp(MockIdp::default());
    run_test(
        anonymous,
        mock_backend(MockBackend::default()),
        |app| async move {
            let response = app.oneshot(request(Method::GET, "/")).await.unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(response.headers()[LOCATION], "/login");
        },
    )
    .await;
}

#[tokio::test]
async fn logout_hands_the_browser_to_the_provider() {
    let idp = mock_idp(MockIdp {
        session: Some(session()),
        ..Default::default()
    });
    run_test(idp, mock_backend(MockBackend::default()), |app| async move {
        let response = app.oneshot(request(Method::GET, "/logout")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[LOCATION].to_str().unwrap();
        assert!(location.starts_with("http://127.0.0.1"));
        assert!(location.ends_with("/self-service/logout?token=t-1"));
    })
    .await;
}

#[tokio::test]
async fn logout_still_redirects_without_a_provider() {
    // When the provider cannot be asked for a logout URL, the browser is
    // sent to the logout endpoint itself.
    let app = taskport_server::setup::router(state_for(&unreachable_url(), &unreachable_url()));
    let response = app.oneshot(request(Method::GET, "/logout")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[LOCATION].to_str().unwrap();
    assert!(location.contains("/self-service/logout/browser"));
    assert!(location.contains("return_to=%2Flogin"));
}
