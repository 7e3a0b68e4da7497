use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use chrono::Utc;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::handlers::require_admin;
use crate::models::*;
use crate::services::{AccountService, LotteryService};

#[utoipa::path(
    get,
    path = "/api/v1/admin/lotteries",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取彩票管理概览成功", body = AdminLotteryOverview),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn lottery_overview(
    lottery_service: web::Data<LotteryService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    let overview = lottery_service.admin_overview(Utc::now().date_naive()).await;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": overview
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取用户列表成功", body = [UserResponse]),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn list_users(
    account_service: web::Data<AccountService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    let users = account_service.list_users().await;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": users
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/lotteries/{id}/draw",
    tag = "admin",
    params(
        ("id" = String, Path, description = "彩票ID")
    ),
    request_body = DeclareWinnerRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "开奖成功", body = DrawOutcome),
        (status = 400, description = "请求体格式错误"),
        (status = 403, description = "需要管理员权限"),
        (status = 404, description = "彩票不存在"),
        (status = 409, description = "彩票已开奖")
    )
)]
pub async fn declare_winner(
    lottery_service: web::Data<LotteryService>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let admin = match require_admin(&req) {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };
    let request = match parse_declare_request(&body) {
        Ok(request) => request,
        Err(e) => return Ok(e.error_response()),
    };

    match lottery_service
        .declare_winner(&path, request.winning_number)
        .await
    {
        Ok(outcome) => {
            log::info!("Admin {} declared winner of lottery {}", admin.user_id, path);
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": outcome,
                "message": "Winner declared"
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

// 请求体可省略，省略时随机生成中奖号码
fn parse_declare_request(body: &[u8]) -> AppResult<DeclareWinnerRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(DeclareWinnerRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::ValidationError(format!("Invalid request body: {e}")))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/lotteries/{id}/activate",
    tag = "admin",
    params(
        ("id" = String, Path, description = "彩票ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "彩票已开放购买", body = Lottery),
        (status = 403, description = "需要管理员权限"),
        (status = 409, description = "状态不允许")
    )
)]
pub async fn activate_lottery(
    lottery_service: web::Data<LotteryService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin(&req) {
        return Ok(e.error_response());
    }

    match lottery_service.activate_lottery(&path).await {
        Ok(lottery) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": lottery
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/lotteries", web::get().to(lottery_overview))
            .route("/users", web::get().to(list_users))
            .route("/lotteries/{id}/draw", web::post().to(declare_winner))
            .route("/lotteries/{id}/activate", web::post().to(activate_lottery)),
    );
}
