use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::validation::parse_user_id;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub search: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

pub async fn get_user(
    principal: AuthenticatedUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = parse_user_id(&path)?;
    info!(requested_by = %principal.user_id, user_id = %user_id, "Fetching user");

    let user = state.user_service.get_user_by_id(user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": user,
    })))
}

pub async fn list_users(
    principal: AuthenticatedUser,
    query: web::Query<ListUsersQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!(
        requested_by = %principal.user_id,
        page = query.page,
        limit = query.limit,
        "Listing users"
    );

    let page = state
        .user_service
        .list_users(query.page, query.limit, query.search.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": page,
    })))
}

pub async fn user_stats(
    principal: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!(requested_by = %principal.user_id, "Computing user stats");

    let stats = state.user_service.get_user_stats().await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": stats,
    })))
}
