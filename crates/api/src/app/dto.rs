use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use arledger_accounting::AccountId;
use arledger_allocation::{
    AllocationError, AllocationStatus, AppliedCredit, AppliedCreditId, AppliedDiscount,
    AppliedDiscountId, CreditMemoId, InvoiceId,
};
use arledger_core::Money;

use crate::app::errors::{ApiError, ApiResult};

// -------------------------
// Request DTOs
// -------------------------

/// Amount as typed by the user: a decimal string (`"25.00"`) or a JSON number.
///
/// Numbers are rounded half-up to cents; strings must already be cent-exact.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(f64),
}

impl AmountInput {
    pub fn to_money(&self) -> Result<Money, AllocationError> {
        let parsed = match self {
            AmountInput::Text(raw) => raw.parse::<Money>(),
            AmountInput::Number(value) => Money::round_to_cents(*value),
        };
        parsed.map_err(AllocationError::from)
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplyCreditBody {
    pub credit_memo_id: String,
    pub amount: AmountInput,
    #[serde(default)]
    pub description: String,
    /// Required; absent is rejected by `require_date` as a validation error.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyDiscountBody {
    pub amount: AmountInput,
    #[serde(default)]
    pub description: String,
    pub date: Option<NaiveDate>,
    pub ar_account_id: String,
    pub income_account_id: String,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitPreviewBody {
    Credit {
        credit_memo_id: String,
        amount: AmountInput,
        #[serde(default)]
        description: String,
    },
    Discount {
        amount: AmountInput,
        #[serde(default)]
        description: String,
        ar_account_id: String,
        income_account_id: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct AccountsQuery {
    pub role: Option<String>,
}

pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> ApiResult<T> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("invalid_id", format!("invalid {what} id")))
}

pub fn parse_account_id(raw: &str) -> ApiResult<AccountId> {
    parse_id(raw, "account")
}

pub fn parse_invoice_id(raw: &str) -> ApiResult<InvoiceId> {
    parse_id(raw, "invoice")
}

/// Allocation dates are part of the posting; there is no implicit "today".
pub fn require_date(date: Option<NaiveDate>) -> Result<NaiveDate, AllocationError> {
    date.ok_or_else(|| AllocationError::validation("date is required"))
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct AppliedCreditView {
    pub id: AppliedCreditId,
    pub invoice_id: InvoiceId,
    pub credit_memo_id: CreditMemoId,
    pub amount: Money,
    pub description: String,
    pub date: NaiveDate,
    pub status: AllocationStatus,
    pub created_at: DateTime<Utc>,
    pub reversed_at: Option<DateTime<Utc>>,
}

impl From<&AppliedCredit> for AppliedCreditView {
    fn from(c: &AppliedCredit) -> Self {
        Self {
            id: c.id,
            invoice_id: c.invoice_id,
            credit_memo_id: c.credit_memo_id,
            amount: c.amount,
            description: c.description.clone(),
            date: c.date,
            status: c.status,
            created_at: c.created_at,
            reversed_at: c.reversed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AppliedDiscountView {
    pub id: AppliedDiscountId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub description: String,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub ar_account_id: AccountId,
    pub income_account_id: AccountId,
    pub status: AllocationStatus,
    pub created_at: DateTime<Utc>,
    pub reversed_at: Option<DateTime<Utc>>,
}

impl From<&AppliedDiscount> for AppliedDiscountView {
    fn from(d: &AppliedDiscount) -> Self {
        Self {
            id: d.id,
            invoice_id: d.invoice_id,
            amount: d.amount,
            description: d.description.clone(),
            date: d.date,
            reference: d.reference.clone(),
            ar_account_id: d.ar_account_id,
            income_account_id: d.income_account_id,
            status: d.status,
            created_at: d.created_at,
            reversed_at: d.reversed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_accept_strings_and_numbers() {
        let text: AmountInput = serde_json::from_str(r#""25.00""#).unwrap();
        assert_eq!(text.to_money().unwrap(), Money::from_cents(2_500));

        let number: AmountInput = serde_json::from_str("10.125").unwrap();
        assert_eq!(number.to_money().unwrap(), Money::from_cents(1_013));

        let finer: AmountInput = serde_json::from_str(r#""1.005""#).unwrap();
        assert_eq!(finer.to_money().unwrap_err().code(), "invalid_amount");
    }

    #[test]
    fn preview_body_is_tagged_by_kind() {
        let body: SplitPreviewBody = serde_json::from_str(
            r#"{ "kind": "credit", "credit_memo_id": "x", "amount": 0 }"#,
        )
        .unwrap();
        match body {
            SplitPreviewBody::Credit {
                amount, description, ..
            } => {
                assert_eq!(amount.to_money().unwrap(), Money::ZERO);
                assert!(description.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_date_is_a_validation_error() {
        let body: ApplyCreditBody = serde_json::from_str(
            r#"{ "credit_memo_id": "x", "amount": "25.00", "description": "x" }"#,
        )
        .unwrap();
        let err = require_date(body.date).unwrap_err();
        assert_eq!(err.code(), "validation_error");

        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(require_date(Some(date)).unwrap(), date);
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err = parse_invoice_id("not-a-uuid").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { code: "invalid_id", .. }));
    }
}
