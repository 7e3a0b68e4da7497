use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of the `error` field in a failed response envelope.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}
