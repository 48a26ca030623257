use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use arledger_allocation::{CreditMemo, InvoiceSummary};
use arledger_infra::preview::{PreviewCreditRequest, PreviewDiscountRequest};
use arledger_infra::service::{ApplyCreditRequest, ApplyDiscountRequest};
use arledger_infra::SplitPreview;

use crate::app::dto::{
    self, AppliedCreditView, AppliedDiscountView, ApplyCreditBody, ApplyDiscountBody,
    SplitPreviewBody,
};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/:id/available-credits", get(available_credits))
        .route("/:id/applied-credits", get(list_applied_credits).post(apply_credit))
        .route("/:id/applied-discounts", get(list_applied_discounts).post(apply_discount))
        .route("/:id/split-preview", post(preview_splits))
        .route("/:id/summary", get(summary))
}

pub async fn available_credits(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<CreditMemo>>> {
    let invoice_id = dto::parse_invoice_id(&id)?;
    let memos = services
        .allocations
        .list_available_credits(tenant.tenant_id(), invoice_id)
        .await?;
    Ok(Json(memos))
}

pub async fn list_applied_credits(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<AppliedCreditView>>> {
    let invoice_id = dto::parse_invoice_id(&id)?;
    let credits = services
        .allocations
        .applied_credits(tenant.tenant_id(), invoice_id)
        .await?;
    Ok(Json(credits.iter().map(AppliedCreditView::from).collect()))
}

pub async fn apply_credit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<ApplyCreditBody>,
) -> ApiResult<(StatusCode, Json<AppliedCreditView>)> {
    let request = ApplyCreditRequest {
        invoice_id: dto::parse_invoice_id(&id)?,
        credit_memo_id: dto::parse_id(&body.credit_memo_id, "credit memo")?,
        amount: body.amount.to_money()?,
        description: body.description,
        date: dto::require_date(body.date)?,
    };

    let credit = services
        .allocations
        .apply_credit(tenant.tenant_id(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(AppliedCreditView::from(&credit))))
}

pub async fn list_applied_discounts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<AppliedDiscountView>>> {
    let invoice_id = dto::parse_invoice_id(&id)?;
    let discounts = services
        .allocations
        .applied_discounts(tenant.tenant_id(), invoice_id)
        .await?;
    Ok(Json(discounts.iter().map(AppliedDiscountView::from).collect()))
}

pub async fn apply_discount(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<ApplyDiscountBody>,
) -> ApiResult<(StatusCode, Json<AppliedDiscountView>)> {
    let request = ApplyDiscountRequest {
        invoice_id: dto::parse_invoice_id(&id)?,
        amount: body.amount.to_money()?,
        description: body.description,
        date: dto::require_date(body.date)?,
        ar_account_id: dto::parse_account_id(&body.ar_account_id)?,
        income_account_id: dto::parse_account_id(&body.income_account_id)?,
        reference: body.reference,
    };

    let discount = services
        .allocations
        .apply_discount(tenant.tenant_id(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(AppliedDiscountView::from(&discount))))
}

/// Dry run for the confirmation dialog. Problems come back as warnings with a 200;
/// only an unknown invoice (or malformed ids) fails the request.
pub async fn preview_splits(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<SplitPreviewBody>,
) -> ApiResult<Json<SplitPreview>> {
    let invoice_id = dto::parse_invoice_id(&id)?;
    let tenant_id = tenant.tenant_id();

    let preview = match body {
        SplitPreviewBody::Credit {
            credit_memo_id,
            amount,
            description,
        } => {
            let request = PreviewCreditRequest {
                invoice_id,
                credit_memo_id: dto::parse_id(&credit_memo_id, "credit memo")?,
                amount: amount.to_money()?,
                description,
            };
            services.previews.preview_credit_splits(tenant_id, &request).await?
        }
        SplitPreviewBody::Discount {
            amount,
            description,
            ar_account_id,
            income_account_id,
        } => {
            let request = PreviewDiscountRequest {
                invoice_id,
                amount: amount.to_money()?,
                description,
                ar_account_id: dto::parse_account_id(&ar_account_id)?,
                income_account_id: dto::parse_account_id(&income_account_id)?,
            };
            services.previews.preview_discount_splits(tenant_id, &request).await?
        }
    };
    Ok(Json(preview))
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceSummary>> {
    let invoice_id = dto::parse_invoice_id(&id)?;
    let summary = services
        .summaries
        .summarize(tenant.tenant_id(), invoice_id)
        .await?;
    Ok(Json(summary))
}
