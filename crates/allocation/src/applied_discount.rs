use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use arledger_accounting::AccountId;
use arledger_core::{domain_id, Aggregate, AggregateRoot, Money, TenantId};
use arledger_events::Event;

use crate::error::AllocationError;
use crate::invoice::InvoiceId;
use crate::status::AllocationStatus;

domain_id!(
    /// Applied discount identifier.
    AppliedDiscountId
);

/// Aggregate root: a discount granted on one invoice.
///
/// Posts AR (credit) against an income account (debit). Same lifecycle as
/// [`crate::AppliedCredit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub id: AppliedDiscountId,
    pub tenant_id: Option<TenantId>,
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
    pub version: u64,
}

impl AppliedDiscount {
    pub fn empty(id: AppliedDiscountId) -> Self {
        Self {
            id,
            tenant_id: None,
            invoice_id: InvoiceId::from(Uuid::nil()),
            amount: Money::ZERO,
            description: String::new(),
            date: NaiveDate::default(),
            reference: None,
            ar_account_id: AccountId::from(Uuid::nil()),
            income_account_id: AccountId::from(Uuid::nil()),
            status: AllocationStatus::Active,
            created_at: DateTime::<Utc>::default(),
            reversed_at: None,
            version: 0,
        }
    }

    pub fn is_created(&self) -> bool {
        self.version > 0
    }

    pub fn is_active(&self) -> bool {
        self.is_created() && self.status.is_active()
    }
}

impl AggregateRoot for AppliedDiscount {
    type Id = AppliedDiscountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ApplyDiscount.
///
/// Account roles are checked against the catalog by the service before this
/// command is built; the aggregate only sees the ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyDiscount {
    pub tenant_id: TenantId,
    pub applied_discount_id: AppliedDiscountId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub description: String,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub ar_account_id: AccountId,
    pub income_account_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseDiscount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseDiscount {
    pub tenant_id: TenantId,
    pub applied_discount_id: AppliedDiscountId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppliedDiscountCommand {
    Apply(ApplyDiscount),
    Reverse(ReverseDiscount),
}

/// Event: DiscountApplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountApplied {
    pub tenant_id: TenantId,
    pub applied_discount_id: AppliedDiscountId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub description: String,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub ar_account_id: AccountId,
    pub income_account_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DiscountReversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountReversed {
    pub tenant_id: TenantId,
    pub applied_discount_id: AppliedDiscountId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppliedDiscountEvent {
    Applied(DiscountApplied),
    Reversed(DiscountReversed),
}

impl Event for AppliedDiscountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AppliedDiscountEvent::Applied(_) => "allocation.discount.applied",
            AppliedDiscountEvent::Reversed(_) => "allocation.discount.reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AppliedDiscountEvent::Applied(e) => e.occurred_at,
            AppliedDiscountEvent::Reversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for AppliedDiscount {
    type Command = AppliedDiscountCommand;
    type Event = AppliedDiscountEvent;
    type Error = AllocationError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AppliedDiscountEvent::Applied(e) => {
                self.id = e.applied_discount_id;
                self.tenant_id = Some(e.tenant_id);
                self.invoice_id = e.invoice_id;
                self.amount = e.amount;
                self.description = e.description.clone();
                self.date = e.date;
                self.reference = e.reference.clone();
                self.ar_account_id = e.ar_account_id;
                self.income_account_id = e.income_account_id;
                self.status = AllocationStatus::Active;
                self.created_at = e.occurred_at;
                self.reversed_at = None;
            }
            AppliedDiscountEvent::Reversed(e) => {
                self.status = AllocationStatus::Inactive;
                self.reversed_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AppliedDiscountCommand::Apply(cmd) => self.handle_apply(cmd),
            AppliedDiscountCommand::Reverse(cmd) => self.handle_reverse(cmd),
        }
    }
}

impl AppliedDiscount {
    fn label(&self) -> String {
        format!("applied discount {}", self.id)
    }

    fn handle_apply(
        &self,
        cmd: &ApplyDiscount,
    ) -> Result<Vec<AppliedDiscountEvent>, AllocationError> {
        if self.is_created() {
            return Err(AllocationError::validation(format!(
                "{} already exists",
                self.label()
            )));
        }
        cmd.amount.ensure_positive()?;
        if cmd.description.trim().is_empty() {
            return Err(AllocationError::validation("description is required"));
        }
        if cmd.ar_account_id == cmd.income_account_id {
            return Err(AllocationError::validation(
                "AR and income accounts must differ",
            ));
        }

        let reference = cmd
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        Ok(vec![AppliedDiscountEvent::Applied(DiscountApplied {
            tenant_id: cmd.tenant_id,
            applied_discount_id: cmd.applied_discount_id,
            invoice_id: cmd.invoice_id,
            amount: cmd.amount,
            description: cmd.description.trim().to_string(),
            date: cmd.date,
            reference,
            ar_account_id: cmd.ar_account_id,
            income_account_id: cmd.income_account_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse(
        &self,
        cmd: &ReverseDiscount,
    ) -> Result<Vec<AppliedDiscountEvent>, AllocationError> {
        if !self.is_created()
            || self.id != cmd.applied_discount_id
            || self.tenant_id != Some(cmd.tenant_id)
        {
            return Err(AllocationError::not_found(format!(
                "applied discount {}",
                cmd.applied_discount_id
            )));
        }
        if !self.status.is_active() {
            return Err(AllocationError::AlreadyReversed(self.label()));
        }

        Ok(vec![AppliedDiscountEvent::Reversed(DiscountReversed {
            tenant_id: cmd.tenant_id,
            applied_discount_id: self.id,
            invoice_id: self.invoice_id,
            amount: self.amount,
            occurred_at: cmd.occurred_at,
        })])
    }
}
