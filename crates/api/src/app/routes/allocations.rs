use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{delete, get},
    Json, Router,
};

use arledger_allocation::{AppliedCreditId, AppliedDiscountId};
use arledger_infra::store::PostedSplitSet;

use crate::app::dto::{self, AppliedCreditView, AppliedDiscountView};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/applied-credits/:id", delete(reverse_applied_credit))
        .route("/applied-credits/:id/splits", get(applied_credit_splits))
        .route("/applied-discounts/:id", delete(reverse_applied_discount))
        .route("/applied-discounts/:id/splits", get(applied_discount_splits))
}

/// Reversal, not deletion: the record stays listed as inactive and a mirrored
/// split set is posted.
pub async fn reverse_applied_credit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<AppliedCreditView>> {
    let id: AppliedCreditId = dto::parse_id(&id, "applied credit")?;
    let credit = services
        .allocations
        .reverse_applied_credit(tenant.tenant_id(), id)
        .await?;
    Ok(Json(AppliedCreditView::from(&credit)))
}

pub async fn reverse_applied_discount(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<AppliedDiscountView>> {
    let id: AppliedDiscountId = dto::parse_id(&id, "applied discount")?;
    let discount = services
        .allocations
        .reverse_applied_discount(tenant.tenant_id(), id)
        .await?;
    Ok(Json(AppliedDiscountView::from(&discount)))
}

pub async fn applied_credit_splits(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<PostedSplitSet>>> {
    let id: AppliedCreditId = dto::parse_id(&id, "applied credit")?;
    Ok(Json(services.allocations.credit_splits(tenant.tenant_id(), id).await?))
}

pub async fn applied_discount_splits(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<PostedSplitSet>>> {
    let id: AppliedDiscountId = dto::parse_id(&id, "applied discount")?;
    Ok(Json(services.allocations.discount_splits(tenant.tenant_id(), id).await?))
}
