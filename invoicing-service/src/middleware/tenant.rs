//! Tenant scope extraction.
//!
//! The authenticating front end resolves the acting user and forwards their
//! tenant in `X-Tenant-ID`. Users without a tenant are only accepted as
//! superadmins (`X-User-Role: superadmin`) and get the unfiltered view.

use crate::models::TenantScope;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const SUPERADMIN_ROLE: &str = "superadmin";

#[async_trait]
impl<S> FromRequestParts<S> for TenantScope
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_header = parts
            .headers
            .get(TENANT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(raw) = tenant_header {
            let tenant_id = Uuid::parse_str(raw).map_err(|_| {
                AppError::BadRequest(anyhow::anyhow!("Invalid X-Tenant-ID header"))
            })?;
            tracing::Span::current().record("tenant_id", tracing::field::display(tenant_id));
            return Ok(TenantScope::Tenant(tenant_id));
        }

        let is_superadmin = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|role| role.trim().eq_ignore_ascii_case(SUPERADMIN_ROLE));

        if is_superadmin {
            Ok(TenantScope::Global)
        } else {
            Err(AppError::Unauthorized(anyhow::anyhow!(
                "Missing X-Tenant-ID header"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(headers: &[(&str, &str)]) -> Result<TenantScope, AppError> {
        let mut builder = Request::builder().uri("/invoices");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        TenantScope::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_tenant_header_scopes_request() {
        let tenant = Uuid::new_v4();
        let scope = extract(&[(TENANT_ID_HEADER, &tenant.to_string())])
            .await
            .unwrap();
        assert_eq!(scope, TenantScope::Tenant(tenant));
    }

    #[tokio::test]
    async fn test_tenant_header_wins_over_role() {
        let tenant = Uuid::new_v4();
        let scope = extract(&[
            (TENANT_ID_HEADER, &tenant.to_string()),
            (USER_ROLE_HEADER, SUPERADMIN_ROLE),
        ])
        .await
        .unwrap();
        assert_eq!(scope, TenantScope::Tenant(tenant));
    }

    #[tokio::test]
    async fn test_superadmin_without_tenant_is_global() {
        let scope = extract(&[(USER_ROLE_HEADER, "SuperAdmin")]).await.unwrap();
        assert_eq!(scope, TenantScope::Global);
    }

    #[tokio::test]
    async fn test_missing_tenant_is_rejected() {
        assert!(matches!(
            extract(&[]).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            extract(&[(USER_ROLE_HEADER, "accountant")]).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            extract(&[(TENANT_ID_HEADER, "not-a-uuid")]).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
