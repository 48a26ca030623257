//! Chart-of-accounts entries as seen by the allocation engine.
//!
//! The account catalog itself lives outside this system; the engine only needs an
//! account's id, display name, and the role it plays in a posting.

use serde::{Deserialize, Serialize};

use arledger_core::domain_id;

domain_id!(
    /// Identifier of a general-ledger account.
    AccountId
);

/// Role an account plays in credit/discount postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    /// Accounts receivable: credited when an invoice's balance is reduced.
    Receivable,
    /// Income/revenue: debited when a discount is granted.
    Income,
    /// Credit memo liability/clearing: debited when a credit memo is consumed.
    CreditClearing,
    Other,
}

impl AccountRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountRole::Receivable => "receivable",
            AccountRole::Income => "income",
            AccountRole::CreditClearing => "credit_clearing",
            AccountRole::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "receivable" | "ar" => Some(AccountRole::Receivable),
            "income" | "revenue" => Some(AccountRole::Income),
            "credit_clearing" | "clearing" => Some(AccountRole::CreditClearing),
            "other" => Some(AccountRole::Other),
            _ => None,
        }
    }

    /// Best-effort role from a free-text account type name.
    ///
    /// Only used for catalog entries that carry no explicit role. "ar" must be a
    /// whole word so "Shareholder Equity" is not mistaken for receivables.
    pub fn classify_type_name(type_name: &str) -> AccountRole {
        let lower = type_name.to_lowercase();
        let has_word = |w: &str| {
            lower
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|token| token == w)
        };

        if lower.contains("receivable") || has_word("ar") {
            AccountRole::Receivable
        } else if lower.contains("income") || lower.contains("revenue") {
            AccountRole::Income
        } else if lower.contains("credit memo")
            || lower.contains("clearing")
            || lower.contains("unapplied")
        {
            AccountRole::CreditClearing
        } else {
            AccountRole::Other
        }
    }
}

impl core::fmt::Display for AccountRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub account_name: String,
    /// Free-text account type from the catalog (e.g. "Accounts Receivable").
    pub type_name: String,
    /// Explicit role; `None` for catalog rows migrated without one.
    #[serde(default)]
    pub role: Option<AccountRole>,
}

impl Account {
    pub fn new(account_name: impl Into<String>, type_name: impl Into<String>, role: AccountRole) -> Self {
        Self {
            id: AccountId::new(),
            account_name: account_name.into(),
            type_name: type_name.into(),
            role: Some(role),
        }
    }

    /// Explicit role if present, else the type-name classification.
    pub fn effective_role(&self) -> AccountRole {
        self.role
            .unwrap_or_else(|| AccountRole::classify_type_name(&self.type_name))
    }

    pub fn has_role(&self, role: AccountRole) -> bool {
        self.effective_role() == role
    }
}
