use serde::{Deserialize, Serialize};

/// Request path of the login endpoint, relative to the API base URL.
pub const USER_LOGIN_PATH: &str = "api/users/login";
/// Request path of the registration endpoint, relative to the API base URL.
pub const USER_REGISTER_PATH: &str = "api/users/register";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub address: String,
}
