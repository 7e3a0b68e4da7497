use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendOtpRequest {
    #[schema(example = "user@example.com")]
    pub email: String,
}

/// Wire format kept compatible with the standalone reset page (`newPassword`).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "123456")]
    pub otp: String,
    #[serde(rename = "newPassword", alias = "new_password")]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendOtpResponse {
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct OtpEntry {
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
}
