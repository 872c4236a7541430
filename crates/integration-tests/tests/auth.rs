//! Integration tests for registration, login and bearer-token handling.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::json;

use shopfront_integration_tests::{PASSWORD, TestApp, assert_not_authorized, body};

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::spawn().await;

    let resp = app.get("/health", None).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    let resp = app.get("/health/ready", None).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = app
        .get("/health", None)
        .header("x-request-id", "trace-me-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "trace-me-123");
}

#[tokio::test]
async fn test_register_returns_customer_session() {
    let app = TestApp::spawn().await;

    let resp = app
        .post("/auth/register", None)
        .json(&json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "Ada@Example.com",
            "password": PASSWORD,
            "role": "admin",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let session = body(resp).await;
    assert_eq!(session["tokenType"], "Bearer");
    assert_eq!(session["impersonating"], false);
    assert_eq!(session["user"]["role"], "customer");
    assert!(session["user"].get("passwordHash").is_none());

    let token = session["token"].as_str().unwrap();
    let me = body(app.get("/auth/me", Some(token)).send().await.unwrap()).await;
    assert_eq!(me["id"], session["user"]["id"]);
    assert_eq!(me["role"], "customer");
    assert_eq!(me["impersonating"], false);
}

#[tokio::test]
async fn test_register_rejects_duplicate_email_in_any_case() {
    let app = TestApp::spawn().await;
    app.register_customer("grace@example.com").await;

    let resp = app
        .post("/auth/register", None)
        .json(&json!({
            "firstName": "Grace",
            "lastName": "Hopper",
            "email": "GRACE@example.com",
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validates_input() {
    let app = TestApp::spawn().await;

    let resp = app
        .post("/auth/register", None)
        .json(&json!({
            "firstName": "Short",
            "lastName": "Password",
            "email": "short@example.com",
            "password": "abc",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .post("/auth/register", None)
        .json(&json!({
            "firstName": "No",
            "lastName": "Email",
            "email": "not-an-email",
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::spawn().await;
    app.register_customer("linus@example.com").await;

    let wrong_password = app
        .post("/auth/login", None)
        .json(&json!({ "email": "linus@example.com", "password": "not the password" }))
        .send()
        .await
        .unwrap();
    assert_not_authorized(wrong_password).await;

    let unknown_email = app
        .post("/auth/login", None)
        .json(&json!({ "email": "nobody@example.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_not_authorized(unknown_email).await;
}

#[tokio::test]
async fn test_login_matches_email_case_insensitively() {
    let app = TestApp::spawn().await;
    let registered = app.register_customer("barbara@example.com").await;

    let login = app.login("Barbara@EXAMPLE.com", PASSWORD).await;
    assert_eq!(login.user_id, registered.user_id);
}

#[tokio::test]
async fn test_bad_bearer_tokens_are_rejected() {
    let app = TestApp::spawn().await;

    assert_not_authorized(app.get("/auth/me", None).send().await.unwrap()).await;
    assert_not_authorized(
        app.get("/auth/me", Some("not.a.token"))
            .send()
            .await
            .unwrap(),
    )
    .await;

    let basic = app
        .client
        .get(app.url("/auth/me"))
        .header("Authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await
        .unwrap();
    assert_not_authorized(basic).await;
}

#[tokio::test]
async fn test_spliced_token_is_rejected() {
    let app = TestApp::spawn().await;
    let victim = app.register_customer("victim@example.com").await;
    let attacker = app.register_customer("attacker@example.com").await;

    // Victim's header and claims with the attacker's signature
    let (victim_unsigned, _) = victim.token.rsplit_once('.').unwrap();
    let (_, attacker_signature) = attacker.token.rsplit_once('.').unwrap();
    let spliced = format!("{victim_unsigned}.{attacker_signature}");

    assert_not_authorized(app.get("/auth/me", Some(&spliced)).send().await.unwrap()).await;
}

#[tokio::test]
async fn test_deactivated_principal_loses_access_immediately() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin("admin@example.com").await;
    let customer = app.register_customer("leaving@example.com").await;

    let resp = app
        .put(
            &format!("/admin/customers/{}/status", customer.user_id),
            Some(&admin.token),
        )
        .json(&json!({ "isActive": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // The token is still well-formed and unexpired
    assert_not_authorized(
        app.get("/auth/me", Some(&customer.token))
            .send()
            .await
            .unwrap(),
    )
    .await;

    let login = app
        .post("/auth/login", None)
        .json(&json!({ "email": "leaving@example.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_not_authorized(login).await;
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::spawn().await;
    let customer = app.register_customer("rotate@example.com").await;

    let wrong_current = app
        .put("/auth/password", Some(&customer.token))
        .json(&json!({ "currentPassword": "guess guess", "newPassword": "a brand new secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_current.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .put("/auth/password", Some(&customer.token))
        .json(&json!({ "currentPassword": PASSWORD, "newPassword": "a brand new secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    app.login("rotate@example.com", "a brand new secret").await;
    let old = app
        .post("/auth/login", None)
        .json(&json!({ "email": "rotate@example.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_not_authorized(old).await;
}
