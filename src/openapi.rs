use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    error::ErrorResponse,
    handler::{
        self,
        accounts::{UnlinkAllResponse, UnlinkResponse},
        auth::password::{
            AccessResponse, RefreshRequest, RegisterRequest, RegisterResponse, TokenPairResponse,
            TokenRequest,
        },
        health::Health,
        plaid::{ExchangeTokenRequest, ExchangeTokenResponse, LinkTokenResponse},
        profile::{UpdateProfileRequest, UserResponse},
    },
    service::{
        linking::LinkCompleteness,
        query::{AccountView, TransactionView},
    },
};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handler::health::health,
        handler::auth::password::register,
        handler::auth::password::token,
        handler::auth::password::refresh,
        handler::profile::get_profile,
        handler::profile::update_profile,
        handler::plaid::link_token,
        handler::plaid::exchange_token,
        handler::accounts::list_accounts,
        handler::accounts::unlink_account,
        handler::accounts::unlink_all,
        handler::transactions::list_transactions
    ),
    components(schemas(
        ErrorResponse,
        Health,
        RegisterRequest,
        RegisterResponse,
        TokenRequest,
        TokenPairResponse,
        RefreshRequest,
        AccessResponse,
        UserResponse,
        UpdateProfileRequest,
        LinkTokenResponse,
        ExchangeTokenRequest,
        ExchangeTokenResponse,
        LinkCompleteness,
        AccountView,
        TransactionView,
        UnlinkResponse,
        UnlinkAllResponse
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check"),
        (name = "auth", description = "Registration and tokens"),
        (name = "profile", description = "Current user"),
        (name = "linking", description = "Institution linking"),
        (name = "accounts", description = "Linked accounts"),
        (name = "transactions", description = "Imported transactions")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route_and_the_bearer_scheme() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/health",
            "/api/v1/register",
            "/api/v1/token",
            "/api/v1/token/refresh",
            "/api/v1/profile",
            "/api/v1/link-token",
            "/api/v1/exchange-token",
            "/api/v1/accounts",
            "/api/v1/accounts/{id}/unlink",
            "/api/v1/accounts/unlink-all",
            "/api/v1/transactions",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
