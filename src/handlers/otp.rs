use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::models::*;
use crate::services::OtpService;

#[utoipa::path(
    post,
    path = "/send-otp",
    tag = "otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "验证码发送成功", body = SendOtpResponse),
        (status = 404, description = "账户不存在"),
        (status = 502, description = "通知服务不可用")
    )
)]
pub async fn send_otp(
    otp_service: web::Data<OtpService>,
    request: web::Json<SendOtpRequest>,
) -> Result<HttpResponse> {
    match otp_service.send_otp(&request.email).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response,
            "message": "OTP sent"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/verify-otp",
    tag = "otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "密码已重置"),
        (status = 400, description = "验证码无效或已过期")
    )
)]
pub async fn verify_otp(
    otp_service: web::Data<OtpService>,
    request: web::Json<VerifyOtpRequest>,
) -> Result<HttpResponse> {
    match otp_service.verify_otp(request.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Password has been reset"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// Mounted at the root, outside `/api/v1`.
pub fn otp_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/send-otp", web::post().to(send_otp))
        .route("/verify-otp", web::post().to(verify_otp));
}
