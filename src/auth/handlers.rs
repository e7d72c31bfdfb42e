use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::mask_phone_number;
use crate::auth::AuthenticatedUser;
use crate::db::User;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    pub phone_number: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendOtpResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub phone_number: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyOtpResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: User,
}

pub async fn send_otp(
    req: web::Json<SendOtpRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let phone = mask_phone_number(&req.phone_number);
    info!(phone_number = %phone, "Received send-otp request");

    match state.otp_service.send_otp(&req.phone_number).await {
        Ok(()) => Ok(HttpResponse::Ok().json(SendOtpResponse {
            success: true,
            message: "OTP sent successfully".to_string(),
        })),
        Err(e) => {
            warn!(phone_number = %phone, error = %e, "Send OTP failed");
            Err(e)
        }
    }
}

pub async fn verify_otp(
    req: web::Json<VerifyOtpRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let phone = mask_phone_number(&req.phone_number);
    info!(phone_number = %phone, "Received verify-otp request");

    let user = match state.otp_service.verify_otp(&req.phone_number, &req.code).await {
        Ok(user) => user,
        Err(e) => {
            warn!(phone_number = %phone, error = %e, "OTP verification failed");
            return Err(e);
        }
    };

    let token = state.token_issuer.issue(user.id, &user.phone_number)?;
    info!(user_id = %user.id, "Authentication successful");

    Ok(HttpResponse::Ok().json(VerifyOtpResponse {
        success: true,
        message: "Authentication successful".to_string(),
        token,
        user,
    }))
}

pub async fn profile(principal: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "user": {
            "id": principal.user_id,
            "phone_number": principal.phone_number,
        }
    }))
}
