use keygate_application::{
    AccessAdminService, AuthorizationService, CredentialService, TokenService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub credential_service: CredentialService,
    pub token_service: TokenService,
    pub authorization_service: AuthorizationService,
    pub access_admin_service: AccessAdminService,
}
