use http::{Method, StatusCode};
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

/// Settings flow mixing profile, password and TOTP material.
fn settings_flow() -> Value {
    json!({
        "id": "s-1",
        "type": "settings",
        "ui": {
            "action": "http://self.test/self-service/settings?flow=s-1",
            "method": "POST",
            "nodes": [
                {"type": "input", "group": "default", "attributes": {
                    "name": "csrf_token", "type": "hidden", "value": "tok-s"}},
                {"type": "input", "group": "profile", "attributes": {
                    "name": "traits.email", "type": "email", "value": "me@example.com"},
                 "meta": {"label": {"id": 1, "text": "Email", "type": "info"}}},
                {"type": "input", "group": "profile", "attributes": {
                    "name": "method", "type": "submit", "value": "profile"},
                 "meta": {"label": {"id": 2, "text": "Save profile", "type": "info"}}},
                {"type": "input", "group": "password", "attributes": {
                    "name": "password", "type": "password"},
                 "meta": {"label": {"id": 3, "text": "New password", "type": "info"}}},
                {"type": "input", "group": "password", "attributes": {
                    "name": "method", "type": "submit", "value": "password"},
                 "meta": {"label": {"id": 4, "text": "Save password", "type": "info"}}},
                {"type": "input", "group": "totp", "attributes": {
                    "name": "totp_code", "type": "text"},
                 "meta": {"label": {"id": 5, "text": "Authenticator code", "type": "info"}}},
                {"type": "input", "group": "totp", "attributes": {
                    "name": "method", "type": "submit", "value": "totp"},
                 "meta": {"label": {"id": 6, "text": "Confirm code", "type": "info"}}}
            ]
        }
    })
}

/// Settings flow with no second-factor material at all.
fn bare_settings_flow() -> Value {
    json!({
        "id": "s-2",
        "type": "settings",
        "ui": {
            "action": "http://self.test/self-service/settings?flow=s-2",
            "method": "POST",
            "nodes": [
                {"type": "input", "group": "default", "attributes": {
                    "name": "csrf_token", "type": "hidden", "value": "tok-s"}},
                {"type": "input", "group": "profile", "attributes": {
                    "name": "traits.email", "type": "email", "value": "me@example.com"}},
                {"type": "input", "group": "password", "attributes": {
                    "name": "password", "type": "password"}},
                {"type": "input", "group": "password", "attributes": {
                    "name": "method", "type": "submit", "value": "password"}}
            ]
        }
    })
}

fn recovery_flow() -> Value {
    json!({
        "id": "rc-1",
        "type": "recovery",
        "ui": {
            "action": "http://self.test/self-service/recovery?flow=rc-1",
            "method": "POST",
            "nodes": [
                {"type": "input", "group": "default", "attributes": {
                    "name": "csrf_token", "type": "hidden", "value": "tok-rc"}},
                {"type": "input", "group": "code", "attributes": {
                    "name": "email", "type": "email", "required": true},
                 "meta": {"label": {"id": 1, "text": "Email", "type": "info"}}},
                {"type": "input", "group": "code", "attributes": {
                    "name": "method", "type": "submit", "value": "code"},
                 "meta": {"label": {"id": 2, "text": "Send recovery code", "type": "info"}}}
            ]
        }
    })
}

#[tokio::test]
async fn settings_page_shows_profile_and_password_only() {
    let idp = mock_idp(MockIdp {
        flow: Some(settings_flow()),
        session: Some(session()),
        ..Default::default()
    });
    run_test(idp, mock_backend(MockBackend::default()), |app| async move {
        let response = app
            .oneshot(request(Method::GET, "/settings?flow=s-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response).await;
        assert!(body.contains("Account Settings"));
        assert!(body.contains("name=\"traits.email\""));
        assert!(body.contains("name=\"password\""));
        assert!(body.contains("name=\"csrf_token\" value=\"tok-s\""));
        assert!(!body.contains("name=\"totp_code\""));
        // The strict policy folds the submit buttons into one.
        assert_eq!(body.matches("submit-button").count(), 1);
        assert!(body.contains("Save password"));
    })
    .await;
}

#[tokio::test]
async fn settings_demand_a_confirmation_before_transport() {
    // A canned success answer would turn into a redirect; staying on the
    // page proves the submission never left.
    let idp = mock_idp(MockIdp {
        flow: Some(settings_flow()),
        session: Some(session()),
        submit: Some((200, json!({"state": "success"}))),
        ..Default::default()
    });
    run_test(idp, mock_backend(MockBackend::default()), |app| async move {
        let response = app
            .oneshot(form_request(
                "/settings?flow=s-1",
                "csrf_token=tok-s&traits.email=me%40example.com\
                 &password=Str0ng%21pass&method=password",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response).await;
        assert!(body.contains("Please confirm your password."));
    })
    .await;
}

#[tokio::test]
async fn saved_settings_redirect_back_to_the_page() {
    let idp = mock_idp(MockIdp {
        flow: Some(settings_flow()),
        session: Some(session()),
        submit: Some((200, json!({"state": "success"}))),
        ..Default::default()
    });
    run_test(idp, mock_backend(MockBackend::default()), |app| async move {
        let response = app
            .oneshot(form_request(
                "/settings?flow=s-1",
                "csrf_token=tok-s&traits.email=new%40example.com\
                 &password=Str0ng%21pass&confirm_password=Str0ng%21pass&method=password",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[http::header::LOCATION], "/settings");
    })
    .await;
}

#[tokio::test]
async fn saved_settings_flow_comes_back_with_its_banner() {
    let mut saved = settings_flow();
    saved["state"] = json!("success");
    saved["ui"]["messages"] = json!([
        {"id": 1050001, "text": "Your changes have been saved!", "type": "success"}
    ]);
    let idp = mock_idp(MockIdp {
        flow: Some(settings_flow()),
        session: Some(session()),
        submit: Some((200, saved)),
        ..Default::default()
    });
    run_test(idp, mock_backend(MockBackend::default()), |app| async move {
        let response = app
            .oneshot(form_request(
                "/settings?flow=s-1",
                "csrf_token=tok-s&traits.email=new%40example.com\
                 &password=Str0ng%21pass&confirm_password=Str0ng%21pass&method=profile",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response).await;
        assert!(body.contains("Your changes have been saved!"));
        assert!(body.contains("message-success"));
    })
    .await;
}

#[tokio::test]
async fn two_factor_page_inverts_the_settings_filter() {
    let idp = mock_idp(MockIdp {
        flow: Some(settings_flow()),
        session: Some(session()),
        ..Default::default()
    });
    run_test(idp, mock_backend(MockBackend::default()), |app| async move {
        let response = app
            .oneshot(request(Method::GET, "/mfa?flow=s-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response).await;
        assert!(body.contains("Two-Factor Authentication"));
        assert!(body.contains("name=\"totp_code\""));
        assert!(body.contains("name=\"csrf_token\" value=\"tok-s\""));
        assert!(!body.contains("name=\"traits.email\""));
    })
    .await;
}

#[tokio::test]
async fn missing_factors_fall_back_with_a_diagnostic() {
    let idp = mock_idp(MockIdp {
        flow: Some(bare_settings_flow()),
        session: Some(session()),
        ..Default::default()
    });
    run_test(idp, mock_backend(MockBackend::default()), |app| async move {
        let response = app
            .oneshot(request(Method::GET, "/mfa?flow=s-2"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response).await;
        assert!(body.contains("No second-factor methods were found"));
        assert!(body.contains("Groups present: default, profile, password."));
        // The fallback shows the full flow rather than an empty form.
        assert!(body.contains("name=\"password\""));
    })
    .await;
}

#[tokio::test]
async fn settings_pages_require_a_session() {
    let idp = mock_idp(MockIdp {
        flow: Some(settings_flow()),
        ..Default::default()
    });
    run_test(idp, mock_backend(MockBackend::default()), |app| async move {
        let response = app
            .clone()
            .oneshot(request(Method::GET, "/settings"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[http::header::LOCATION],
            "/login?return_to=%2Fsettings"
        );

        let response = app.oneshot(request(Method::GET, "/mfa")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[http::header::LOCATION],
            "/login?return_to=%2Fmfa"
        );
    })
    .await;
}

#[tokio::test]
async fn recovery_page_renders_for_anonymous_visitors() {
    let idp = mock_idp(MockIdp {
        flow: Some(recovery_flow()),
        ..Default::default()
    });
    run_test(idp, mock_backend(MockBackend::default()), |app| async move {
        let response = app
            .oneshot(request(Method::GET, "/recovery?flow=rc-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response).await;
        assert!(body.contains("Account Recovery"));
        assert!(body.contains("we&#x27;ll send you a recovery code"));
        assert!(body.contains("name=\"email\""));
        assert!(body.contains("Send recovery code"));
    })
    .await;
}

#[tokio::test]
async fn recovery_success_navigates_into_settings() {
    let idp = mock_idp(MockIdp {
        flow: Some(recovery_flow()),
        submit: Some((
            422,
            json!({
                "error": {"id": "browser_location_change_required"},
                "redirect_browser_to": "http://self.test/self-service/settings/browser?flow=s-9"
            }),
        )),
        ..Default::default()
    });
    run_test(idp, mock_backend(MockBackend::default()), |app| async move {
        let response = app
            .oneshot(form_request(
                "/recovery?flow=rc-1",
                "csrf_token=tok-rc&email=me%40example.com&method=code",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[http::header::LOCATION]
            .to_str()
            .unwrap();
        assert!(location.contains("/self-service/settings/browser?flow=s-9"));
    })
    .await;
}
