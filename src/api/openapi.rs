//! OpenAPI document for the HTTP surface.

use utoipa::OpenApi;

use crate::api::handlers::{auth, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "gardisto",
        description = "Authentication and access control for multi-tenant clinics"
    ),
    paths(
        health::health,
        auth::login,
        auth::logout,
        auth::session,
        auth::assume_organization,
        auth::mfa::setup,
        auth::mfa::verify_setup,
        auth::mfa::verify,
        auth::mfa::disable,
        auth::mfa::regenerate_backup_codes,
    ),
    components(schemas(
        health::Health,
        auth::role::Role,
        auth::types::LoginRequest,
        auth::types::LoginResponse,
        auth::types::PrincipalResponse,
        auth::types::AssumeOrganizationRequest,
        auth::types::MfaCodeRequest,
        auth::types::MfaSetupResponse,
        auth::types::MfaVerifyResponse,
        auth::types::BackupCodesResponse,
    )),
    tags(
        (name = "auth", description = "Authentication and sessions"),
        (name = "mfa", description = "Second-factor verification"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

/// The OpenAPI document as built from handler annotations.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
