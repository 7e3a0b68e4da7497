pub mod admin;
pub mod auth;
pub mod lottery;
pub mod otp;
pub mod ticket;
pub mod user;

pub use admin::admin_config;
pub use auth::auth_config;
pub use lottery::lottery_config;
pub use otp::otp_config;
pub use ticket::ticket_config;
pub use user::user_config;

use actix_web::{HttpMessage, HttpRequest};

use crate::error::{AppError, AppResult};
use crate::models::AuthenticatedUser;

/// 获取认证中间件写入的当前用户
pub fn current_user(req: &HttpRequest) -> AppResult<AuthenticatedUser> {
    req.extensions()
        .get::<AuthenticatedUser>()
        .cloned()
        .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))
}

pub fn require_admin(req: &HttpRequest) -> AppResult<AuthenticatedUser> {
    let user = current_user(req)?;
    if !user.is_admin() {
        return Err(AppError::PermissionDenied);
    }
    Ok(user)
}

/// Bearer token from the `Authorization` header, if present and well formed.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
