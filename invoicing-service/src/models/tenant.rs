//! Tenant scoping for every data access.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Visibility boundary carried into every store call.
///
/// `Global` is the superadmin view (no filter). `Tenant(id)` only ever sees
/// and touches rows whose `tenant_id` equals `id`; rows without a tenant are
/// invisible to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantScope {
    Global,
    Tenant(Uuid),
}

impl TenantScope {
    /// Scope of a nullable tenant; no tenant means the global view.
    pub fn from_tenant_id(tenant_id: Option<Uuid>) -> Self {
        match tenant_id {
            Some(id) => TenantScope::Tenant(id),
            None => TenantScope::Global,
        }
    }

    /// The tenant filter value, `None` meaning "no filter".
    pub fn tenant_id(&self) -> Option<Uuid> {
        match self {
            TenantScope::Global => None,
            TenantScope::Tenant(id) => Some(*id),
        }
    }

    /// Whether a row owned by `row_tenant` is visible in this scope.
    pub fn permits(&self, row_tenant: Option<Uuid>) -> bool {
        match self {
            TenantScope::Global => true,
            TenantScope::Tenant(id) => row_tenant == Some(*id),
        }
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantScope::Global => f.write_str("global"),
            TenantScope::Tenant(id) => write!(f, "{}", id),
        }
    }
}
