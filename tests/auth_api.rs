use actix_web::{test, web, App};
use phone_auth_server::{configure_routes, AppState, MemoryAuditSink, MemoryStore, Settings};
use serde_json::{json, Value};
use std::sync::Arc;

const PHONE: &str = "+1234567890";

fn test_state() -> (web::Data<AppState>, Arc<MemoryAuditSink>) {
    let config = Settings::new_for_test().expect("Failed to load test config");
    let audit = Arc::new(MemoryAuditSink::new());
    let state = AppState::with_store(config, Arc::new(MemoryStore::new()), audit.clone());
    (web::Data::new(state), audit)
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(App::new().app_data($state.clone()).configure(configure_routes)).await
    };
}

#[actix_web::test]
async fn test_send_and_verify_otp() {
    let (state, audit) = test_state();
    let app = app!(state);

    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/send-otp")
        .set_json(json!({ "phone_number": PHONE }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    // The code is delivered out of band, never in the response
    assert!(body.get("code").is_none());

    let code = audit.latest_otp_code_for(PHONE).expect("OTP was not issued");
    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/verify-otp")
        .set_json(json!({ "phone_number": PHONE, "code": code }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["phone_number"], PHONE);

    let token = body["token"].as_str().unwrap();
    let claims = state.token_issuer.validate(token).unwrap();
    assert_eq!(claims.phone_number, PHONE);
    assert_eq!(claims.sub, body["user"]["id"].as_str().unwrap());
}

#[actix_web::test]
async fn test_code_cannot_be_reused() {
    let (state, audit) = test_state();
    let app = app!(state);

    test::TestRequest::post()
        .uri("/api/v1/auth/send-otp")
        .set_json(json!({ "phone_number": PHONE }))
        .send_request(&app)
        .await;
    let code = audit.latest_otp_code_for(PHONE).unwrap();

    let verify = || {
        test::TestRequest::post()
            .uri("/api/v1/auth/verify-otp")
            .set_json(json!({ "phone_number": PHONE, "code": code }))
    };

    assert_eq!(verify().send_request(&app).await.status(), 200);

    let resp = verify().send_request(&app).await;
    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "INVALID_OTP");
}

#[actix_web::test]
async fn test_send_is_rate_limited() {
    let (state, _audit) = test_state();
    let app = app!(state);

    for _ in 0..3 {
        let resp = test::TestRequest::post()
            .uri("/api/v1/auth/send-otp")
            .set_json(json!({ "phone_number": PHONE }))
            .send_request(&app)
            .await;
        assert_eq!(resp.status(), 200);
    }

    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/send-otp")
        .set_json(json!({ "phone_number": PHONE }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 429);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");

    // Other numbers are unaffected
    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/send-otp")
        .set_json(json!({ "phone_number": "+1987654321" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_invalid_input_is_rejected() {
    let (state, audit) = test_state();
    let app = app!(state);

    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/send-otp")
        .set_json(json!({ "phone_number": "12345" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    assert!(audit.latest_otp_code_for("12345").is_none());

    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/verify-otp")
        .set_json(json!({ "phone_number": PHONE, "code": "12ab56" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 400);

    let resp = test::TestRequest::post()
        .uri("/api/v1/auth/send-otp")
        .set_json(json!({ "phone": PHONE }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_profile_requires_bearer_token() {
    let (state, _audit) = test_state();
    let app = app!(state);

    let resp = test::TestRequest::get()
        .uri("/api/v1/auth/profile")
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = test::TestRequest::get()
        .uri("/api/v1/auth/profile")
        .insert_header(("Authorization", "Bearer not-a-token"))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");

    let user_id = uuid::Uuid::new_v4();
    let token = state.token_issuer.issue(user_id, PHONE).unwrap();
    let resp = test::TestRequest::get()
        .uri("/api/v1/auth/profile")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["id"], user_id.to_string());
    assert_eq!(body["user"]["phone_number"], PHONE);
}
