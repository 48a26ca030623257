//! Double-entry split lines and split sets.
//!
//! A `SplitSet` is the ledger posting for one financial event. Totals and the
//! balanced flag are derived from the lines at construction and never stored
//! independently.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use arledger_core::{DomainError, Money, ValueObject};

use crate::account::{Account, AccountId};

/// Ledger-level failure while building or validating a split set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("split set is unbalanced (debits {total_debit}, credits {total_credit})")]
    Unbalanced { total_debit: Money, total_credit: Money },

    #[error("split set must have lines")]
    Empty,

    #[error("invalid split line {index}: {reason}")]
    InvalidLine { index: usize, reason: String },
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidAmount(msg) => LedgerError::InvalidAmount(msg),
            other => LedgerError::InvalidAmount(other.to_string()),
        }
    }
}

/// Which column of the ledger a line posts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

/// Customer/unit a line is attributed to (sub-ledger dimensions).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineParty {
    pub people_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
}

/// One side of a posting. Exactly one of `debit`/`credit` is nonzero on a valid line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitLine {
    pub account_id: AccountId,
    pub account_name: String,
    pub people_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub debit: Money,
    pub credit: Money,
}

impl ValueObject for SplitLine {}

impl SplitLine {
    pub fn new(account: &Account, side: Side, amount: Money, party: LineParty) -> Self {
        let (debit, credit) = match side {
            Side::Debit => (amount, Money::ZERO),
            Side::Credit => (Money::ZERO, amount),
        };
        Self {
            account_id: account.id,
            account_name: account.account_name.clone(),
            people_id: party.people_id,
            unit_id: party.unit_id,
            debit,
            credit,
        }
    }

    /// Side this line posts to; `None` when both columns are zero (draft lines only).
    pub fn side(&self) -> Option<Side> {
        if self.debit.is_positive() {
            Some(Side::Debit)
        } else if self.credit.is_positive() {
            Some(Side::Credit)
        } else {
            None
        }
    }

    /// Same account and dimensions, debit and credit swapped.
    pub fn reversed(&self) -> Self {
        Self {
            debit: self.credit,
            credit: self.debit,
            ..self.clone()
        }
    }

    fn check(&self, index: usize) -> Result<(), LedgerError> {
        let reason = if self.debit.is_negative() || self.credit.is_negative() {
            Some("amounts must not be negative")
        } else if self.debit.is_positive() && self.credit.is_positive() {
            Some("a line must post to exactly one side")
        } else if self.debit.is_zero() && self.credit.is_zero() {
            Some("a line must carry a nonzero amount")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(LedgerError::InvalidLine {
                index,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Ordered posting lines plus derived totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitSet {
    description: String,
    lines: Vec<SplitLine>,
    total_debit: Money,
    total_credit: Money,
    is_balanced: bool,
    /// A column total left the money range; such a set never validates.
    #[serde(skip)]
    overflowed: bool,
}

impl ValueObject for SplitSet {}

impl SplitSet {
    pub fn new(description: impl Into<String>, lines: Vec<SplitLine>) -> Self {
        let total_debit = Money::try_sum(lines.iter().map(|l| l.debit));
        let total_credit = Money::try_sum(lines.iter().map(|l| l.credit));
        let overflowed = total_debit.is_err() || total_credit.is_err();
        let total_debit = total_debit.unwrap_or(Money::ZERO);
        let total_credit = total_credit.unwrap_or(Money::ZERO);
        Self {
            description: description.into(),
            lines,
            total_debit,
            total_credit,
            is_balanced: !overflowed && total_debit == total_credit,
            overflowed,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn lines(&self) -> &[SplitLine] {
        &self.lines
    }

    pub fn total_debit(&self) -> Money {
        self.total_debit
    }

    pub fn total_credit(&self) -> Money {
        self.total_credit
    }

    pub fn is_balanced(&self) -> bool {
        self.is_balanced
    }

    /// Everything a persisted split set must satisfy: non-empty, one-sided
    /// non-negative lines, debits equal credits.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.lines.is_empty() {
            return Err(LedgerError::Empty);
        }
        for (index, line) in self.lines.iter().enumerate() {
            line.check(index)?;
        }
        self.ensure_balanced()
    }

    pub fn ensure_balanced(&self) -> Result<(), LedgerError> {
        if self.overflowed {
            return Err(LedgerError::InvalidAmount(
                "split totals exceed the representable range".to_string(),
            ));
        }
        if self.total_debit != self.total_credit {
            return Err(LedgerError::Unbalanced {
                total_debit: self.total_debit,
                total_credit: self.total_credit,
            });
        }
        Ok(())
    }

    /// Offsetting posting: every line with debit and credit swapped.
    pub fn reversed(&self, description: impl Into<String>) -> SplitSet {
        SplitSet::new(
            description,
            self.lines.iter().map(SplitLine::reversed).collect(),
        )
    }
}

/// Incremental construction of a split set.
///
/// `draft()` returns whatever was added (preview path); `build()` additionally
/// validates the result (commit path).
#[derive(Debug, Default)]
pub struct SplitSetBuilder {
    description: String,
    lines: Vec<SplitLine>,
}

impl SplitSetBuilder {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            lines: Vec::new(),
        }
    }

    pub fn debit(mut self, account: &Account, amount: Money, party: LineParty) -> Self {
        self.lines.push(SplitLine::new(account, Side::Debit, amount, party));
        self
    }

    pub fn credit(mut self, account: &Account, amount: Money, party: LineParty) -> Self {
        self.lines.push(SplitLine::new(account, Side::Credit, amount, party));
        self
    }

    /// Spread `amount` over several accounts on one side, by weight.
    ///
    /// The sub-cent remainder of the proportional split lands on the first line.
    pub fn spread(
        mut self,
        side: Side,
        targets: &[(&Account, u64)],
        amount: Money,
        party: LineParty,
    ) -> Result<Self, LedgerError> {
        let weights: Vec<u64> = targets.iter().map(|(_, w)| *w).collect();
        let shares = amount.allocate(&weights)?;
        for ((account, _), share) in targets.iter().zip(shares) {
            self.lines.push(SplitLine::new(account, side, share, party));
        }
        Ok(self)
    }

    pub fn draft(self) -> SplitSet {
        SplitSet::new(self.description, self.lines)
    }

    pub fn build(self) -> Result<SplitSet, LedgerError> {
        let set = self.draft();
        set.validate()?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountRole;
    use proptest::prelude::*;

    fn account(name: &str, role: AccountRole) -> Account {
        Account::new(name, name, role)
    }

    #[test]
    fn totals_past_the_money_range_never_validate() {
        let ar = account("AR", AccountRole::Receivable);
        let income = account("Income", AccountRole::Income);
        let half = Money::from_cents(i64::MAX / 2 + 1);

        let set = SplitSetBuilder::new("too large")
            .debit(&income, half, LineParty::default())
            .debit(&income, half, LineParty::default())
            .credit(&ar, half, LineParty::default())
            .credit(&ar, half, LineParty::default())
            .draft();

        assert!(!set.is_balanced());
        assert!(matches!(set.validate(), Err(LedgerError::InvalidAmount(_))));
    }

    #[test]
    fn balanced_two_line_set_validates() {
        let ar = account("1200 Accounts Receivable", AccountRole::Receivable);
        let income = account("4000 Sales", AccountRole::Income);

        let set = SplitSetBuilder::new("discount")
            .credit(&ar, Money::from_cents(1000), LineParty::default())
            .debit(&income, Money::from_cents(1000), LineParty::default())
            .build()
            .unwrap();

        assert!(set.is_balanced());
        assert_eq!(set.total_debit(), Money::from_cents(1000));
        assert_eq!(set.total_credit(), Money::from_cents(1000));
        assert_eq!(set.lines()[0].side(), Some(Side::Credit));
        assert_eq!(set.lines()[1].side(), Some(Side::Debit));
    }

    #[test]
    fn unbalanced_set_is_rejected_but_can_be_drafted() {
        let ar = account("AR", AccountRole::Receivable);
        let income = account("Income", AccountRole::Income);

        let builder = || {
            SplitSetBuilder::new("bad")
                .credit(&ar, Money::from_cents(1000), LineParty::default())
                .debit(&income, Money::from_cents(900), LineParty::default())
        };

        let draft = builder().draft();
        assert!(!draft.is_balanced());

        let err = builder().build().unwrap_err();
        assert_eq!(
            err,
            LedgerError::Unbalanced {
                total_debit: Money::from_cents(900),
                total_credit: Money::from_cents(1000),
            }
        );
    }

    #[test]
    fn zero_lines_fail_validation_even_when_balanced() {
        let ar = account("AR", AccountRole::Receivable);
        let income = account("Income", AccountRole::Income);

        let set = SplitSetBuilder::new("zero")
            .credit(&ar, Money::ZERO, LineParty::default())
            .debit(&income, Money::ZERO, LineParty::default())
            .draft();

        assert!(set.is_balanced());
        assert!(matches!(set.validate(), Err(LedgerError::InvalidLine { index: 0, .. })));
    }

    #[test]
    fn empty_set_is_rejected() {
        assert_eq!(SplitSetBuilder::new("nothing").build().unwrap_err(), LedgerError::Empty);
    }

    #[test]
    fn reversal_swaps_sides_and_keeps_dimensions() {
        let ar = account("AR", AccountRole::Receivable);
        let clearing = account("Clearing", AccountRole::CreditClearing);
        let party = LineParty {
            people_id: Some(Uuid::now_v7()),
            unit_id: None,
        };

        let set = SplitSetBuilder::new("apply")
            .credit(&ar, Money::from_cents(2500), party)
            .debit(&clearing, Money::from_cents(2500), LineParty::default())
            .build()
            .unwrap();
        let reversal = set.reversed("reverse");

        assert_eq!(reversal.description(), "reverse");
        assert_eq!(reversal.lines()[0].debit, Money::from_cents(2500));
        assert_eq!(reversal.lines()[0].people_id, party.people_id);
        assert_eq!(reversal.lines()[1].credit, Money::from_cents(2500));
        assert!(reversal.validate().is_ok());
    }

    #[test]
    fn spread_puts_remainder_on_first_line() {
        let ar = account("AR", AccountRole::Receivable);
        let a = account("Income A", AccountRole::Income);
        let b = account("Income B", AccountRole::Income);
        let c = account("Income C", AccountRole::Income);

        let set = SplitSetBuilder::new("three-way discount")
            .credit(&ar, Money::from_cents(100), LineParty::default())
            .spread(Side::Debit, &[(&a, 1), (&b, 1), (&c, 1)], Money::from_cents(100), LineParty::default())
            .unwrap()
            .build()
            .unwrap();

        let debits: Vec<i64> = set.lines()[1..].iter().map(|l| l.debit.cents()).collect();
        assert_eq!(debits, vec![34, 33, 33]);
        assert!(set.is_balanced());
    }

    #[test]
    fn serializes_derived_totals() {
        let ar = account("AR", AccountRole::Receivable);
        let income = account("Income", AccountRole::Income);
        let set = SplitSetBuilder::new("d")
            .credit(&ar, Money::from_cents(1000), LineParty::default())
            .debit(&income, Money::from_cents(1000), LineParty::default())
            .draft();

        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["total_debit"], "10.00");
        assert_eq!(json["is_balanced"], true);
        assert_eq!(json["lines"][0]["credit"], "10.00");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Any amount spread over any weights on the debit side balances a single
        /// credit of the same amount, cent for cent.
        #[test]
        fn spread_always_balances(
            cents in 1i64..100_000_000,
            weights in prop::collection::vec(1u64..10_000, 1..6),
        ) {
            let ar = account("AR", AccountRole::Receivable);
            let targets: Vec<Account> = (0..weights.len())
                .map(|i| account(&format!("Income {i}"), AccountRole::Income))
                .collect();
            let weighted: Vec<(&Account, u64)> =
                targets.iter().zip(weights.iter().copied()).collect();

            let amount = Money::from_cents(cents);
            let set = SplitSetBuilder::new("p")
                .credit(&ar, amount, LineParty::default())
                .spread(Side::Debit, &weighted, amount, LineParty::default())
                .unwrap()
                .draft();

            prop_assert_eq!(set.total_debit(), set.total_credit());
            prop_assert!(set.is_balanced());
        }

        #[test]
        fn reversal_of_balanced_set_is_balanced(cents in 1i64..1_000_000_000) {
            let ar = account("AR", AccountRole::Receivable);
            let clearing = account("Clearing", AccountRole::CreditClearing);
            let amount = Money::from_cents(cents);
            let set = SplitSetBuilder::new("x")
                .credit(&ar, amount, LineParty::default())
                .debit(&clearing, amount, LineParty::default())
                .build()
                .unwrap();
            let rev = set.reversed("y");
            prop_assert_eq!(rev.total_debit(), set.total_credit());
            prop_assert_eq!(rev.total_credit(), set.total_debit());
        }
    }
}
