use actix_web::{test, web, App};
use phone_auth_server::{configure_routes, AppState, MemoryAuditSink, MemoryStore, Settings};
use serde_json::{json, Value};
use std::sync::Arc;

fn test_state() -> (web::Data<AppState>, Arc<MemoryAuditSink>) {
    let config = Settings::new_for_test().expect("Failed to load test config");
    let audit = Arc::new(MemoryAuditSink::new());
    let state = AppState::with_store(config, Arc::new(MemoryStore::new()), audit.clone());
    (web::Data::new(state), audit)
}

/// Registers `phone` through the OTP flow and returns its token and user id.
async fn register(state: &AppState, audit: &MemoryAuditSink, phone: &str) -> (String, String) {
    state.otp_service.send_otp(phone).await.unwrap();
    let code = audit.latest_otp_code_for(phone).unwrap();
    let user = state.otp_service.verify_otp(phone, &code).await.unwrap();
    let token = state.token_issuer.issue(user.id, &user.phone_number).unwrap();
    (token, user.id.to_string())
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

#[actix_web::test]
async fn test_users_routes_require_authentication() {
    let (state, _audit) = test_state();
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

    for uri in ["/api/v1/users", "/api/v1/users/stats", "/api/v1/users/not-a-uuid"] {
        let resp = test::TestRequest::get().uri(uri).send_request(&app).await;
        assert_eq!(resp.status(), 401, "{}", uri);
    }
}

#[actix_web::test]
async fn test_get_user() {
    let (state, audit) = test_state();
    let (token, user_id) = register(&state, &audit, "+1234567890").await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

    let resp = test::TestRequest::get()
        .uri(&format!("/api/v1/users/{}", user_id))
        .insert_header(bearer(&token))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["id"], user_id);
    assert_eq!(body["user"]["phone_number"], "+1234567890");

    let resp = test::TestRequest::get()
        .uri(&format!("/api/v1/users/{}", uuid::Uuid::new_v4()))
        .insert_header(bearer(&token))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 404);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "USER_NOT_FOUND");

    let resp = test::TestRequest::get()
        .uri("/api/v1/users/not-a-uuid")
        .insert_header(bearer(&token))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_list_and_search_users() {
    let (state, audit) = test_state();
    let (token, _) = register(&state, &audit, "+1234567890").await;
    register(&state, &audit, "+1987654321").await;
    register(&state, &audit, "+4412345678").await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

    let resp = test::TestRequest::get()
        .uri("/api/v1/users")
        .insert_header(bearer(&token))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["limit"], 10);
    assert_eq!(body["data"]["total_pages"], 1);

    let resp = test::TestRequest::get()
        .uri("/api/v1/users?page=1&limit=2&search=%2B44")
        .insert_header(bearer(&token))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["users"][0]["phone_number"], "+4412345678");

    let resp = test::TestRequest::get()
        .uri("/api/v1/users?limit=2")
        .insert_header(bearer(&token))
        .send_request(&app)
        .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["users"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["total_pages"], 2);
}

#[actix_web::test]
async fn test_list_users_rejects_bad_parameters() {
    let (state, audit) = test_state();
    let (token, _) = register(&state, &audit, "+1234567890").await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

    for uri in [
        "/api/v1/users?page=0",
        "/api/v1/users?limit=101",
        "/api/v1/users?page=4294967297",
        "/api/v1/users?search=admin%27%29%3B%20DROP%20TABLE",
        "/api/v1/users?search=1",
    ] {
        let resp = test::TestRequest::get()
            .uri(uri)
            .insert_header(bearer(&token))
            .send_request(&app)
            .await;
        assert_eq!(resp.status(), 400, "{}", uri);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    }
}

#[actix_web::test]
async fn test_user_stats() {
    let (state, audit) = test_state();
    let (token, _) = register(&state, &audit, "+1234567890").await;
    register(&state, &audit, "+1987654321").await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure_routes)).await;

    let resp = test::TestRequest::get()
        .uri("/api/v1/users/stats")
        .insert_header(bearer(&token))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["data"]["total_users"],
        json!(2),
        "unexpected stats body: {}",
        body
    );
    assert_eq!(body["data"]["users_this_month"], 2);
    assert!(body["data"]["timestamp"].is_string());
}
