//! Caller identity.
//!
//! Authentication happens upstream; the gateway forwards the verified user as
//! headers. A request without a user is unauthenticated, and a user whose
//! tenant cannot be resolved has no organisation to allocate tags in.

use axum::{extract::FromRequestParts, http::request::Parts};
use tagseq::{
    TenantId,
    policy::{AccountType, Capabilities, Capability, Role, capabilities},
};

use crate::server::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const ROLE_HEADER: &str = "x-user-role";
pub const ACCOUNT_TYPE_HEADER: &str = "x-account-type";

/// The authenticated caller of a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub tenant_id: TenantId,
    pub role: Role,
    pub account_type: AccountType,
}

impl Principal {
    pub const fn capabilities(&self) -> Capabilities {
        capabilities(self.role, self.account_type)
    }

    pub fn require(&self, capability: Capability) -> Result<(), ApiError> {
        if self.capabilities().contains(capability) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(capability))
        }
    }

    fn from_parts(parts: &Parts) -> Result<Self, ApiError> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let user_id = header(USER_ID_HEADER).ok_or(ApiError::AuthenticationRequired)?;
        let tenant_id = header(TENANT_ID_HEADER)
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(TenantId)
            .ok_or(ApiError::OrganisationNotFound)?;

        Ok(Self {
            user_id: user_id.to_string(),
            tenant_id,
            role: header(ROLE_HEADER).map(Role::parse_lenient).unwrap_or_default(),
            account_type: header(ACCOUNT_TYPE_HEADER)
                .map(AccountType::parse_lenient)
                .unwrap_or_default(),
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_parts(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn missing_user_is_unauthenticated() {
        let err = Principal::from_parts(&parts(&[(TENANT_ID_HEADER, "1")])).unwrap_err();
        assert!(matches!(err, ApiError::AuthenticationRequired));
    }

    #[test]
    fn missing_or_malformed_tenant_is_not_found() {
        for headers in [
            &[(USER_ID_HEADER, "u1")][..],
            &[(USER_ID_HEADER, "u1"), (TENANT_ID_HEADER, "acme")][..],
        ] {
            let err = Principal::from_parts(&parts(headers)).unwrap_err();
            assert!(matches!(err, ApiError::OrganisationNotFound));
        }
    }

    #[test]
    fn role_defaults_to_user() {
        let principal =
            Principal::from_parts(&parts(&[(USER_ID_HEADER, "u1"), (TENANT_ID_HEADER, "7")]))
                .unwrap();
        assert_eq!(principal.tenant_id, TenantId(7));
        assert_eq!(principal.role, Role::User);
        assert!(principal.require(Capability::ViewAssets).is_ok());
        assert!(matches!(
            principal.require(Capability::GenerateTags),
            Err(ApiError::Forbidden(Capability::GenerateTags))
        ));
    }

    #[test]
    fn reads_role_and_account_type() {
        let principal = Principal::from_parts(&parts(&[
            (USER_ID_HEADER, "u1"),
            (TENANT_ID_HEADER, "7"),
            (ROLE_HEADER, "technician"),
            (ACCOUNT_TYPE_HEADER, "individual"),
        ]))
        .unwrap();
        assert_eq!(principal.role, Role::Technician);
        assert_eq!(principal.account_type, AccountType::Individual);
        assert!(principal.require(Capability::ConfigureTagFormats).is_ok());
    }
}
