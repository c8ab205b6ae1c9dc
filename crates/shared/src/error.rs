use serde::{Deserialize, Serialize};

/// Machine-readable reason attached to some user endpoint failures. Codes
/// this client does not know decode as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Conflict,
    #[serde(other)]
    Other,
}

/// Error body returned by the user endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    pub message: String,
}
