//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::role::Role;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PrincipalResponse {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    pub organization_id: String,
    pub current_organization_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    /// When true, a challenge session was issued and the client must call
    /// the MFA verify endpoint before receiving credentials.
    pub mfa_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<PrincipalResponse>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AssumeOrganizationRequest {
    pub organization_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MfaCodeRequest {
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MfaSetupResponse {
    pub secret: String,
    pub otpauth_url: String,
    pub qr_code: String,
    /// Single-use backup codes, shown exactly once.
    pub backup_codes: Vec<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MfaVerifyResponse {
    pub valid: bool,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BackupCodesResponse {
    pub codes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn login_request_round_trips() -> Result<()> {
        let request = LoginRequest {
            username: "ade".to_string(),
            password: "admin123".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let username = value
            .get("username")
            .and_then(serde_json::Value::as_str)
            .context("missing username")?;
        assert_eq!(username, "ade");
        let decoded: LoginRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.password, "admin123");
        Ok(())
    }

    #[test]
    fn login_response_omits_absent_credentials() -> Result<()> {
        let response = LoginResponse {
            mfa_required: true,
            token: None,
            expires_in: None,
            principal: None,
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(value.get("mfa_required"), Some(&serde_json::json!(true)));
        assert!(value.get("token").is_none());
        assert!(value.get("principal").is_none());
        Ok(())
    }

    #[test]
    fn principal_response_serializes_role_canonically() -> Result<()> {
        let response = PrincipalResponse {
            user_id: "id".to_string(),
            username: "ade".to_string(),
            role: Role::SuperAdmin,
            organization_id: "org".to_string(),
            current_organization_id: "org".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(value.get("role"), Some(&serde_json::json!("super_admin")));
        Ok(())
    }
}
