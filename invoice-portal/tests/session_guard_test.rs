mod common;

use common::*;
use reqwest::header::LOCATION;
use serde_json::{json, Value};

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = reqwest::get(app.url("/health")).await.unwrap();

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn metrics_are_public() {
    let app = TestApp::spawn().await;

    let response = reqwest::get(app.url("/metrics")).await.unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn login_lands_each_role_on_its_dashboard() {
    let app = TestApp::spawn().await;

    for (email, landing) in [
        (VENDOR_EMAIL, "/vendor-dashboard"),
        (FINANCE_EMAIL, "/finance-dashboard"),
        (ADMIN_EMAIL, "/admin-dashboard"),
    ] {
        let response = app
            .browser()
            .post(app.url("/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["redirect"], landing);
        assert_eq!(body["user"]["email"], email);
    }
}

#[tokio::test]
async fn wrong_password_shows_backend_message() {
    let app = TestApp::spawn().await;

    let response = app
        .browser()
        .post(app.url("/login"))
        .json(&json!({ "email": VENDOR_EMAIL, "password": "nope" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid email or password");
}

#[tokio::test]
async fn no_session_redirects_to_login() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    for path in ["/vendor/draft", "/finance/invoices", "/admin/vendors"] {
        let response = browser.get(app.url(path)).send().await.unwrap();
        assert_eq!(response.status(), 303, "{path}");
        assert_eq!(response.headers()[LOCATION], "/login");
    }
}

#[tokio::test]
async fn wrong_role_is_sent_to_unauthorized() {
    let app = TestApp::spawn().await;
    let vendor = app.login(VENDOR_EMAIL).await;

    let response = vendor
        .get(app.url("/finance/invoices"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(response.headers()[LOCATION], "/unauthorized");

    let response = vendor.get(app.url("/unauthorized")).send().await.unwrap();
    assert_eq!(response.status(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized Access");

    let finance = app.login(FINANCE_EMAIL).await;
    let response = finance
        .get(app.url("/admin/audit-logs"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()[LOCATION], "/unauthorized");
}

#[tokio::test]
async fn rejected_token_clears_the_session() {
    let app = TestApp::spawn().await;
    let vendor = app.login(VENDOR_EMAIL).await;
    vendor
        .put(app.url("/vendor/draft/fields"))
        .json(&json!({ "po_number": "PO-5" }))
        .send()
        .await
        .unwrap();

    app.backend.revoke_tokens();
    let response = vendor.get(app.url("/vendor/draft")).send().await.unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(response.headers()[LOCATION], "/login");

    // Signing in again with the same browser starts from an empty draft.
    vendor
        .post(app.url("/login"))
        .json(&json!({ "email": VENDOR_EMAIL, "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    let draft: Value = vendor
        .get(app.url("/vendor/draft"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(draft["fields"]["po_number"], "");
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::spawn().await;
    let admin = app.login(ADMIN_EMAIL).await;
    assert_eq!(
        admin.get(app.url("/admin/vendors")).send().await.unwrap().status(),
        200
    );

    let response = admin.post(app.url("/logout")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["redirect"], "/login");

    let response = admin.get(app.url("/admin/vendors")).send().await.unwrap();
    assert_eq!(response.headers()[LOCATION], "/login");
}

#[tokio::test]
async fn signup_creates_an_account_that_can_log_in() {
    let app = TestApp::spawn().await;

    let response = app
        .browser()
        .post(app.url("/signup"))
        .json(&json!({ "email": "new@acme.in", "password": PASSWORD, "role": "finance" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["redirect"], "/login");

    let finance = app.login("new@acme.in").await;
    let response = finance
        .get(app.url("/finance/invoices"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn signup_rejects_unknown_roles_and_bad_emails() {
    let app = TestApp::spawn().await;

    let response = app
        .browser()
        .post(app.url("/signup"))
        .json(&json!({ "email": "x@acme.in", "password": PASSWORD, "role": "auditor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = app
        .browser()
        .post(app.url("/signup"))
        .json(&json!({ "email": "not-an-email", "password": PASSWORD, "role": "vendor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);

    let response = app
        .browser()
        .post(app.url("/signup"))
        .json(&json!({ "email": VENDOR_EMAIL, "password": PASSWORD, "role": "vendor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "User already exists");
}
