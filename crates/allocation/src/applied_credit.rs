use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use arledger_core::{domain_id, Aggregate, AggregateRoot, Money, TenantId};
use arledger_events::Event;

use crate::credit_memo::CreditMemoId;
use crate::error::AllocationError;
use crate::invoice::InvoiceId;
use crate::status::AllocationStatus;

domain_id!(
    /// Applied credit identifier (tenant-scoped via `tenant_id` fields in events/commands).
    AppliedCreditId
);

/// Aggregate root: a portion of a credit memo applied to one invoice.
///
/// Owned by the invoice, references the credit memo. Never deleted: reversal moves
/// it to `Inactive` and records `reversed_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCredit {
    pub id: AppliedCreditId,
    pub tenant_id: Option<TenantId>,
    pub invoice_id: InvoiceId,
    pub credit_memo_id: CreditMemoId,
    pub amount: Money,
    pub description: String,
    pub date: NaiveDate,
    pub status: AllocationStatus,
    pub created_at: DateTime<Utc>,
    pub reversed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl AppliedCredit {
    /// Create an empty, not-yet-applied aggregate instance for rehydration.
    pub fn empty(id: AppliedCreditId) -> Self {
        Self {
            id,
            tenant_id: None,
            invoice_id: InvoiceId::from(Uuid::nil()),
            credit_memo_id: CreditMemoId::from(Uuid::nil()),
            amount: Money::ZERO,
            description: String::new(),
            date: NaiveDate::default(),
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

impl AggregateRoot for AppliedCredit {
    type Id = AppliedCreditId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ApplyCredit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyCredit {
    pub tenant_id: TenantId,
    pub applied_credit_id: AppliedCreditId,
    pub invoice_id: InvoiceId,
    pub credit_memo_id: CreditMemoId,
    pub amount: Money,
    pub description: String,
    pub date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseCredit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseCredit {
    pub tenant_id: TenantId,
    pub applied_credit_id: AppliedCreditId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppliedCreditCommand {
    Apply(ApplyCredit),
    Reverse(ReverseCredit),
}

/// Event: CreditApplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditApplied {
    pub tenant_id: TenantId,
    pub applied_credit_id: AppliedCreditId,
    pub invoice_id: InvoiceId,
    pub credit_memo_id: CreditMemoId,
    pub amount: Money,
    pub description: String,
    pub date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CreditReversed. Carries the amount handed back to the credit memo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditReversed {
    pub tenant_id: TenantId,
    pub applied_credit_id: AppliedCreditId,
    pub invoice_id: InvoiceId,
    pub credit_memo_id: CreditMemoId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppliedCreditEvent {
    Applied(CreditApplied),
    Reversed(CreditReversed),
}

impl Event for AppliedCreditEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AppliedCreditEvent::Applied(_) => "allocation.credit.applied",
            AppliedCreditEvent::Reversed(_) => "allocation.credit.reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AppliedCreditEvent::Applied(e) => e.occurred_at,
            AppliedCreditEvent::Reversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for AppliedCredit {
    type Command = AppliedCreditCommand;
    type Event = AppliedCreditEvent;
    type Error = AllocationError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AppliedCreditEvent::Applied(e) => {
                self.id = e.applied_credit_id;
                self.tenant_id = Some(e.tenant_id);
                self.invoice_id = e.invoice_id;
                self.credit_memo_id = e.credit_memo_id;
                self.amount = e.amount;
                self.description = e.description.clone();
                self.date = e.date;
                self.status = AllocationStatus::Active;
                self.created_at = e.occurred_at;
                self.reversed_at = None;
            }
            AppliedCreditEvent::Reversed(e) => {
                self.status = AllocationStatus::Inactive;
                self.reversed_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AppliedCreditCommand::Apply(cmd) => self.handle_apply(cmd),
            AppliedCreditCommand::Reverse(cmd) => self.handle_reverse(cmd),
        }
    }
}

impl AppliedCredit {
    fn label(&self) -> String {
        format!("applied credit {}", self.id)
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), AllocationError> {
        // Another tenant's record is indistinguishable from a missing one.
        if self.tenant_id != Some(tenant_id) {
            return Err(AllocationError::not_found(self.label()));
        }
        Ok(())
    }

    fn handle_apply(&self, cmd: &ApplyCredit) -> Result<Vec<AppliedCreditEvent>, AllocationError> {
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

        Ok(vec![AppliedCreditEvent::Applied(CreditApplied {
            tenant_id: cmd.tenant_id,
            applied_credit_id: cmd.applied_credit_id,
            invoice_id: cmd.invoice_id,
            credit_memo_id: cmd.credit_memo_id,
            amount: cmd.amount,
            description: cmd.description.trim().to_string(),
            date: cmd.date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse(
        &self,
        cmd: &ReverseCredit,
    ) -> Result<Vec<AppliedCreditEvent>, AllocationError> {
        if !self.is_created() || self.id != cmd.applied_credit_id {
            return Err(AllocationError::not_found(format!(
                "applied credit {}",
                cmd.applied_credit_id
            )));
        }
        self.ensure_tenant(cmd.tenant_id)?;

        if !self.status.is_active() {
            return Err(AllocationError::AlreadyReversed(self.label()));
        }

        Ok(vec![AppliedCreditEvent::Reversed(CreditReversed {
            tenant_id: cmd.tenant_id,
            applied_credit_id: self.id,
            invoice_id: self.invoice_id,
            credit_memo_id: self.credit_memo_id,
            amount: self.amount,
            occurred_at: cmd.occurred_at,
        })])
    }
}
