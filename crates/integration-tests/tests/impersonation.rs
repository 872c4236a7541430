//! Integration tests for admins acting as customers.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::json;

use shopfront_integration_tests::{TestApp, body};

#[tokio::test]
async fn test_impersonation_round_trip() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin("admin@example.com").await;
    let customer = app.register_customer("shopper@example.com").await;

    let resp = app
        .post(
            &format!("/admin/impersonate/{}", customer.user_id),
            Some(&admin.token),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let session = body(resp).await;
    assert_eq!(session["impersonating"], true);
    assert_eq!(session["originalPrincipalId"], admin.user_id.as_str());
    assert_eq!(session["user"]["id"], customer.user_id.as_str());
    let derived = session["token"].as_str().unwrap().to_owned();

    // The derived token acts as the customer
    let me = body(app.get("/auth/me", Some(&derived)).send().await.unwrap()).await;
    assert_eq!(me["id"], customer.user_id.as_str());
    assert_eq!(me["role"], "customer");
    assert_eq!(me["impersonating"], true);
    assert_eq!(me["originalPrincipalId"], admin.user_id.as_str());

    // ...and has no admin rights
    let resp = app
        .get("/admin/customers", Some(&derived))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .post("/admin/exit-impersonation", Some(&derived))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let restored = body(resp).await;
    assert_eq!(restored["impersonating"], false);
    assert!(restored.get("originalPrincipalId").is_none());
    assert_eq!(restored["user"]["id"], admin.user_id.as_str());

    let token = restored["token"].as_str().unwrap();
    let me = body(app.get("/auth/me", Some(token)).send().await.unwrap()).await;
    assert_eq!(me["role"], "admin");
    assert_eq!(me["impersonating"], false);
}

#[tokio::test]
async fn test_orders_placed_while_impersonating_belong_to_customer() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin("admin@example.com").await;
    let customer = app.register_customer("shopper@example.com").await;
    let product = app.create_product(&admin, "Canvas Tote", "18.50", 10).await;

    let session = body(
        app.post(
            &format!("/admin/impersonate/{}", customer.user_id),
            Some(&admin.token),
        )
        .send()
        .await
        .unwrap(),
    )
    .await;
    let acting = shopfront_integration_tests::Login {
        token: session["token"].as_str().unwrap().to_owned(),
        user_id: customer.user_id.clone(),
    };

    let resp = app.place_order(&acting, &[(product.as_str(), 2)]).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order = body(resp).await;
    assert_eq!(order["userId"], customer.user_id.as_str());

    let mine = body(
        app.get("/orders/myorders", Some(&customer.token))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_customers_cannot_impersonate() {
    let app = TestApp::spawn().await;
    let mallory = app.register_customer("mallory@example.com").await;
    let victim = app.register_customer("victim@example.com").await;

    let resp = app
        .post(
            &format!("/admin/impersonate/{}", victim.user_id),
            Some(&mallory.token),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_only_active_customers_can_be_impersonated() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin("admin@example.com").await;
    let other_admin = app.create_admin("other@example.com").await;
    let customer = app.register_customer("dormant@example.com").await;

    let resp = app
        .post(
            &format!("/admin/impersonate/{}", other_admin.user_id),
            Some(&admin.token),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    app.put(
        &format!("/admin/customers/{}/status", customer.user_id),
        Some(&admin.token),
    )
    .json(&json!({ "isActive": false }))
    .send()
    .await
    .unwrap();
    let resp = app
        .post(
            &format!("/admin/impersonate/{}", customer.user_id),
            Some(&admin.token),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .post(
            "/admin/impersonate/00000000-0000-4000-8000-000000000000",
            Some(&admin.token),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_exit_requires_an_impersonation_session() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin("admin@example.com").await;

    let resp = app
        .post("/admin/exit-impersonation", Some(&admin.token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_exit_fails_closed_when_admin_was_demoted() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin("admin@example.com").await;
    let other_admin = app.create_admin("other@example.com").await;
    let customer = app.register_customer("shopper@example.com").await;

    let session = body(
        app.post(
            &format!("/admin/impersonate/{}", customer.user_id),
            Some(&admin.token),
        )
        .send()
        .await
        .unwrap(),
    )
    .await;
    let derived = session["token"].as_str().unwrap().to_owned();

    let resp = app
        .put(
            &format!("/admin/customers/{}/role", admin.user_id),
            Some(&other_admin.token),
        )
        .json(&json!({ "role": "customer" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .post("/admin/exit-impersonation", Some(&derived))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_password_change_is_blocked_while_impersonating() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin("admin@example.com").await;
    let customer = app.register_customer("shopper@example.com").await;

    let session = body(
        app.post(
            &format!("/admin/impersonate/{}", customer.user_id),
            Some(&admin.token),
        )
        .send()
        .await
        .unwrap(),
    )
    .await;
    let derived = session["token"].as_str().unwrap();

    let resp = app
        .put("/auth/password", Some(derived))
        .json(&json!({
            "currentPassword": shopfront_integration_tests::PASSWORD,
            "newPassword": "hijacked password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
