use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::handlers::bearer_token;
use crate::models::*;
use crate::services::AccountService;

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "注册成功", body = UserResponse),
        (status = 400, description = "请求参数错误"),
        (status = 409, description = "邮箱已被注册")
    )
)]
pub async fn register(
    account_service: web::Data<AccountService>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    match account_service.register(request.into_inner()).await {
        Ok(user) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": user
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "登录成功", body = AuthResponse),
        (status = 401, description = "邮箱或密码错误")
    )
)]
pub async fn login(
    account_service: web::Data<AccountService>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    match account_service.login(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "刷新令牌成功", body = AuthResponse),
        (status = 401, description = "无效的刷新令牌或会话已过期")
    )
)]
pub async fn refresh(
    account_service: web::Data<AccountService>,
    request: web::Json<RefreshRequest>,
) -> Result<HttpResponse> {
    match account_service.refresh(&request.refresh_token).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "登出成功")
    )
)]
pub async fn logout(
    account_service: web::Data<AccountService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    // 无令牌或令牌无效时同样视为成功
    account_service.logout(bearer_token(&req)).await;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Logged out"
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/password-reset/request",
    tag = "auth",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "重置链接已发送", body = PasswordResetResponse),
        (status = 404, description = "账户不存在"),
        (status = 502, description = "通知服务不可用")
    )
)]
pub async fn request_password_reset(
    account_service: web::Data<AccountService>,
    request: web::Json<PasswordResetRequest>,
) -> Result<HttpResponse> {
    match account_service.request_password_reset(&request.email).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response,
            "message": "Password reset link sent"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/password-reset/complete",
    tag = "auth",
    request_body = CompletePasswordResetRequest,
    responses(
        (status = 200, description = "密码已重置"),
        (status = 400, description = "无重置请求、令牌无效或已过期")
    )
)]
pub async fn complete_password_reset(
    account_service: web::Data<AccountService>,
    request: web::Json<CompletePasswordResetRequest>,
) -> Result<HttpResponse> {
    match account_service
        .complete_password_reset(request.into_inner())
        .await
    {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Password has been reset"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh))
            .route("/logout", web::post().to(logout))
            .route(
                "/password-reset/request",
                web::post().to(request_password_reset),
            )
            .route(
                "/password-reset/complete",
                web::post().to(complete_password_reset),
            ),
    );
}
