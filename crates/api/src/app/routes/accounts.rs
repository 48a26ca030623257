use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    Json,
};

use arledger_accounting::{Account, AccountRole};
use arledger_infra::ports::AccountCatalog;

use crate::app::dto::AccountsQuery;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::context::TenantContext;

/// `GET /accounts?role=receivable|income|credit_clearing|other`
///
/// Feeds the account dropdowns of the discount form; without `role` every account
/// is returned.
pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<AccountsQuery>,
) -> ApiResult<Json<Vec<Account>>> {
    let tenant_id = tenant.tenant_id();
    let accounts = match query.role.as_deref() {
        Some(raw) => {
            let role = AccountRole::parse(raw).ok_or_else(|| {
                ApiError::bad_request(
                    "invalid_role",
                    "role must be one of: receivable, income, credit_clearing, other",
                )
            })?;
            services.accounts.accounts_with_role(tenant_id, role).await
        }
        None => services.accounts.list_accounts(tenant_id).await,
    }
    .map_err(|e| ApiError::Allocation(e.into()))?;

    Ok(Json(accounts))
}
