//! Postgres-backed allocation store.
//!
//! Schema: `migrations/0001_allocations.sql`. Amounts are BIGINT cents.
//!
//! ## Atomicity
//!
//! Each commit runs in one transaction. Credit applications lock the credit memo
//! row (`SELECT … FOR UPDATE`) and decrement it with a conditional `UPDATE … WHERE
//! available_amount_cents >= $amount`, so two processes racing on one memo cannot
//! both draw the last of it. Reversals flip status with `WHERE status = 'active'`,
//! which makes a second reversal a no-op that is reported as `NotActive`.
//!
//! ## Error mapping
//!
//! | SQLx error | Code | StoreError |
//! |------------|------|------------|
//! | Database (unique violation) | `23505` | `Constraint` |
//! | Database (check violation) | `23514` | `Constraint` |
//! | Database (other) | any | `Backend` |
//! | PoolClosed / Io / other | n/a | `Backend` |

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use arledger_accounting::{AccountId, SplitLine, SplitSet};
use arledger_allocation::{
    AllocationKind, AllocationStatus, AppliedCredit, AppliedCreditId, AppliedDiscount,
    AppliedDiscountId, CreditMemo, CreditMemoId, CustomerId, InvoiceId,
};
use arledger_core::{Money, TenantId};

use super::{AllocationStore, InvoiceAllocations, PostedSplitSet, SplitSetKind, StoreError};

const SCHEMA: &str = include_str!("../../../../migrations/0001_allocations.sql");

#[derive(Debug, Clone)]
pub struct PostgresAllocationStore {
    pool: PgPool,
}

impl PostgresAllocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

#[async_trait]
impl AllocationStore for PostgresAllocationStore {
    #[instrument(skip(self, memo), fields(tenant_id = %tenant_id, credit_memo_id = %memo.id), err)]
    async fn register_credit_memo(
        &self,
        tenant_id: TenantId,
        memo: CreditMemo,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO credit_memos (
                tenant_id,
                credit_memo_id,
                customer_id,
                description,
                total_amount_cents,
                available_amount_cents,
                clearing_account_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (tenant_id, credit_memo_id)
            DO UPDATE SET
                description = EXCLUDED.description,
                clearing_account_id = EXCLUDED.clearing_account_id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(memo.id.as_uuid())
        .bind(memo.customer_id.as_uuid())
        .bind(&memo.description)
        .bind(memo.total_amount.cents())
        .bind(memo.available_amount.cents())
        .bind(memo.clearing_account_id.map(|a| *a.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("register_credit_memo", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, credit_memo_id = %credit_memo_id), err)]
    async fn credit_memo(
        &self,
        tenant_id: TenantId,
        credit_memo_id: CreditMemoId,
    ) -> Result<Option<CreditMemo>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {MEMO_COLUMNS} FROM credit_memos WHERE tenant_id = $1 AND credit_memo_id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(credit_memo_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("credit_memo", e))?;

        row.as_ref().map(credit_memo_from_row).transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, customer_id = %customer_id), err)]
    async fn list_available_credits(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
    ) -> Result<Vec<CreditMemo>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {MEMO_COLUMNS}
            FROM credit_memos
            WHERE tenant_id = $1 AND customer_id = $2 AND available_amount_cents > 0
            ORDER BY credit_memo_id
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_available_credits", e))?;

        rows.iter().map(credit_memo_from_row).collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, applied_credit_id = %id), err)]
    async fn applied_credit(
        &self,
        tenant_id: TenantId,
        id: AppliedCreditId,
    ) -> Result<Option<AppliedCredit>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {CREDIT_COLUMNS} FROM applied_credits WHERE tenant_id = $1 AND applied_credit_id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("applied_credit", e))?;

        row.as_ref()
            .map(|r| applied_credit_from_row(tenant_id, r))
            .transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, applied_discount_id = %id), err)]
    async fn applied_discount(
        &self,
        tenant_id: TenantId,
        id: AppliedDiscountId,
    ) -> Result<Option<AppliedDiscount>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM applied_discounts WHERE tenant_id = $1 AND applied_discount_id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("applied_discount", e))?;

        row.as_ref()
            .map(|r| applied_discount_from_row(tenant_id, r))
            .transpose()
    }

    /// Both lists come from one REPEATABLE READ snapshot.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, invoice_id = %invoice_id), err)]
    async fn invoice_allocations(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<InvoiceAllocations, StoreError> {
        let mut tx = self.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        let credit_rows = sqlx::query(&format!(
            r#"
            SELECT {CREDIT_COLUMNS}
            FROM applied_credits
            WHERE tenant_id = $1 AND invoice_id = $2
            ORDER BY applied_on ASC, created_at ASC
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(invoice_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("list_applied_credits", e))?;

        let discount_rows = sqlx::query(&format!(
            r#"
            SELECT {DISCOUNT_COLUMNS}
            FROM applied_discounts
            WHERE tenant_id = $1 AND invoice_id = $2
            ORDER BY applied_on ASC, created_at ASC
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(invoice_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("list_applied_discounts", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(InvoiceAllocations {
            credits: credit_rows
                .iter()
                .map(|r| applied_credit_from_row(tenant_id, r))
                .collect::<Result<_, _>>()?,
            discounts: discount_rows
                .iter()
                .map(|r| applied_discount_from_row(tenant_id, r))
                .collect::<Result<_, _>>()?,
        })
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, allocation_id = %allocation_id), err)]
    async fn splits_for(
        &self,
        tenant_id: TenantId,
        allocation_id: Uuid,
    ) -> Result<Vec<PostedSplitSet>, StoreError> {
        let set_rows = sqlx::query(
            r#"
            SELECT
                split_set_id,
                allocation_id,
                allocation_kind,
                kind,
                description,
                posted_on,
                posted_at
            FROM split_sets
            WHERE tenant_id = $1 AND allocation_id = $2
            ORDER BY posted_at ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(allocation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_split_sets", e))?;

        if set_rows.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<Uuid> = set_rows
            .iter()
            .map(|r| r.try_get::<Uuid, _>("split_set_id"))
            .collect::<Result<_, _>>()
            .map_err(|e| map_sqlx_error("decode_split_set", e))?;

        let line_rows = sqlx::query(
            r#"
            SELECT
                split_set_id,
                account_id,
                account_name,
                people_id,
                unit_id,
                debit_cents,
                credit_cents
            FROM split_lines
            WHERE tenant_id = $1 AND split_set_id = ANY($2)
            ORDER BY split_set_id, line_no ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_split_lines", e))?;

        let mut lines: Vec<(Uuid, SplitLine)> = Vec::with_capacity(line_rows.len());
        for row in &line_rows {
            lines.push(split_line_from_row(row)?);
        }

        set_rows
            .iter()
            .map(|row| {
                let id: Uuid = row.try_get("split_set_id").map_err(decode_error)?;
                let set_lines = lines
                    .iter()
                    .filter(|(set_id, _)| *set_id == id)
                    .map(|(_, line)| line.clone())
                    .collect();
                posted_split_set_from_row(row, set_lines)
            })
            .collect()
    }

    #[instrument(
        skip(self, credit, splits),
        fields(
            tenant_id = %tenant_id,
            applied_credit_id = %credit.id,
            credit_memo_id = %credit.credit_memo_id,
            amount = %credit.amount
        ),
        err
    )]
    async fn commit_credit_application(
        &self,
        tenant_id: TenantId,
        credit: &AppliedCredit,
        splits: &PostedSplitSet,
    ) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;

        let available: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT available_amount_cents
            FROM credit_memos
            WHERE tenant_id = $1 AND credit_memo_id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(credit.credit_memo_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_credit_memo", e))?;

        let available = match available {
            Some(cents) => Money::from_cents(cents),
            None => {
                rollback(tx).await?;
                return Err(StoreError::NotFound(format!(
                    "credit memo {}",
                    credit.credit_memo_id
                )));
            }
        };

        let decremented = sqlx::query(
            r#"
            UPDATE credit_memos
            SET available_amount_cents = available_amount_cents - $3
            WHERE tenant_id = $1 AND credit_memo_id = $2 AND available_amount_cents >= $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(credit.credit_memo_id.as_uuid())
        .bind(credit.amount.cents())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("decrement_credit_memo", e))?;

        if decremented.rows_affected() != 1 {
            rollback(tx).await?;
            return Err(StoreError::InsufficientCredit {
                credit_memo_id: credit.credit_memo_id,
                requested: credit.amount,
                available,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO applied_credits (
                tenant_id,
                applied_credit_id,
                invoice_id,
                credit_memo_id,
                amount_cents,
                description,
                applied_on,
                status,
                created_at,
                reversed_at,
                version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(credit.id.as_uuid())
        .bind(credit.invoice_id.as_uuid())
        .bind(credit.credit_memo_id.as_uuid())
        .bind(credit.amount.cents())
        .bind(&credit.description)
        .bind(credit.date)
        .bind(credit.status.as_str())
        .bind(credit.created_at)
        .bind(credit.reversed_at)
        .bind(credit.version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_applied_credit", e))?;

        insert_split_set(&mut tx, tenant_id, splits).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(
        skip(self, credit, splits),
        fields(tenant_id = %tenant_id, applied_credit_id = %credit.id, amount = %credit.amount),
        err
    )]
    async fn commit_credit_reversal(
        &self,
        tenant_id: TenantId,
        credit: &AppliedCredit,
        splits: &PostedSplitSet,
    ) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE applied_credits
            SET status = $3, reversed_at = $4, version = $5
            WHERE tenant_id = $1 AND applied_credit_id = $2 AND status = 'active'
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(credit.id.as_uuid())
        .bind(credit.status.as_str())
        .bind(credit.reversed_at)
        .bind(credit.version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("reverse_applied_credit", e))?;

        if flipped.rows_affected() != 1 {
            rollback(tx).await?;
            return Err(StoreError::NotActive(format!("applied credit {}", credit.id)));
        }

        let restored = sqlx::query(
            r#"
            UPDATE credit_memos
            SET available_amount_cents = available_amount_cents + $3
            WHERE tenant_id = $1
              AND credit_memo_id = $2
              AND available_amount_cents + $3 <= total_amount_cents
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(credit.credit_memo_id.as_uuid())
        .bind(credit.amount.cents())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("restore_credit_memo", e))?;

        if restored.rows_affected() != 1 {
            rollback(tx).await?;
            return Err(StoreError::Backend(format!(
                "credit memo {} could not take back {}",
                credit.credit_memo_id, credit.amount
            )));
        }

        insert_split_set(&mut tx, tenant_id, splits).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(
        skip(self, discount, splits),
        fields(tenant_id = %tenant_id, applied_discount_id = %discount.id, amount = %discount.amount),
        err
    )]
    async fn commit_discount_application(
        &self,
        tenant_id: TenantId,
        discount: &AppliedDiscount,
        splits: &PostedSplitSet,
    ) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO applied_discounts (
                tenant_id,
                applied_discount_id,
                invoice_id,
                amount_cents,
                description,
                applied_on,
                reference,
                ar_account_id,
                income_account_id,
                status,
                created_at,
                reversed_at,
                version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(discount.id.as_uuid())
        .bind(discount.invoice_id.as_uuid())
        .bind(discount.amount.cents())
        .bind(&discount.description)
        .bind(discount.date)
        .bind(discount.reference.as_deref())
        .bind(discount.ar_account_id.as_uuid())
        .bind(discount.income_account_id.as_uuid())
        .bind(discount.status.as_str())
        .bind(discount.created_at)
        .bind(discount.reversed_at)
        .bind(discount.version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_applied_discount", e))?;

        insert_split_set(&mut tx, tenant_id, splits).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(
        skip(self, discount, splits),
        fields(tenant_id = %tenant_id, applied_discount_id = %discount.id),
        err
    )]
    async fn commit_discount_reversal(
        &self,
        tenant_id: TenantId,
        discount: &AppliedDiscount,
        splits: &PostedSplitSet,
    ) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE applied_discounts
            SET status = $3, reversed_at = $4, version = $5
            WHERE tenant_id = $1 AND applied_discount_id = $2 AND status = 'active'
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(discount.id.as_uuid())
        .bind(discount.status.as_str())
        .bind(discount.reversed_at)
        .bind(discount.version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("reverse_applied_discount", e))?;

        if flipped.rows_affected() != 1 {
            rollback(tx).await?;
            return Err(StoreError::NotActive(format!(
                "applied discount {}",
                discount.id
            )));
        }

        insert_split_set(&mut tx, tenant_id, splits).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

const MEMO_COLUMNS: &str = "credit_memo_id, customer_id, description, total_amount_cents, \
     available_amount_cents, clearing_account_id";

const CREDIT_COLUMNS: &str = "applied_credit_id, invoice_id, credit_memo_id, amount_cents, \
     description, applied_on, status, created_at, reversed_at, version";

const DISCOUNT_COLUMNS: &str = "applied_discount_id, invoice_id, amount_cents, description, \
     applied_on, reference, ar_account_id, income_account_id, status, created_at, reversed_at, \
     version";

async fn insert_split_set(
    tx: &mut Transaction<'static, Postgres>,
    tenant_id: TenantId,
    posted: &PostedSplitSet,
) -> Result<(), StoreError> {
    let set = &posted.split_set;
    if !set.is_balanced() {
        return Err(StoreError::Backend(format!(
            "refusing to persist unbalanced split set {}",
            posted.id
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO split_sets (
            tenant_id,
            split_set_id,
            allocation_id,
            allocation_kind,
            kind,
            description,
            posted_on,
            posted_at,
            total_debit_cents,
            total_credit_cents
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(posted.id)
    .bind(posted.allocation_id)
    .bind(posted.allocation_kind.as_str())
    .bind(posted.kind.as_str())
    .bind(set.description())
    .bind(posted.date)
    .bind(posted.posted_at)
    .bind(set.total_debit().cents())
    .bind(set.total_credit().cents())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_split_set", e))?;

    for (line_no, line) in set.lines().iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO split_lines (
                tenant_id,
                split_set_id,
                line_no,
                account_id,
                account_name,
                people_id,
                unit_id,
                debit_cents,
                credit_cents
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(posted.id)
        .bind(line_no as i32)
        .bind(line.account_id.as_uuid())
        .bind(&line.account_name)
        .bind(line.people_id)
        .bind(line.unit_id)
        .bind(line.debit.cents())
        .bind(line.credit.cents())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_split_line", e))?;
    }

    Ok(())
}

async fn rollback(tx: Transaction<'static, Postgres>) -> Result<(), StoreError> {
    tx.rollback()
        .await
        .map_err(|e| map_sqlx_error("rollback", e))
}

fn credit_memo_from_row(row: &PgRow) -> Result<CreditMemo, StoreError> {
    Ok(CreditMemo {
        id: CreditMemoId::from(row.try_get::<Uuid, _>("credit_memo_id").map_err(decode_error)?),
        customer_id: CustomerId::from(row.try_get::<Uuid, _>("customer_id").map_err(decode_error)?),
        description: row.try_get("description").map_err(decode_error)?,
        total_amount: Money::from_cents(row.try_get("total_amount_cents").map_err(decode_error)?),
        available_amount: Money::from_cents(
            row.try_get("available_amount_cents").map_err(decode_error)?,
        ),
        clearing_account_id: row
            .try_get::<Option<Uuid>, _>("clearing_account_id")
            .map_err(decode_error)?
            .map(AccountId::from),
    })
}

fn status_from_row(row: &PgRow) -> Result<AllocationStatus, StoreError> {
    let raw: String = row.try_get("status").map_err(decode_error)?;
    AllocationStatus::parse(&raw)
        .ok_or_else(|| StoreError::Backend(format!("unknown allocation status '{raw}'")))
}

fn applied_credit_from_row(tenant_id: TenantId, row: &PgRow) -> Result<AppliedCredit, StoreError> {
    Ok(AppliedCredit {
        id: AppliedCreditId::from(row.try_get::<Uuid, _>("applied_credit_id").map_err(decode_error)?),
        tenant_id: Some(tenant_id),
        invoice_id: InvoiceId::from(row.try_get::<Uuid, _>("invoice_id").map_err(decode_error)?),
        credit_memo_id: CreditMemoId::from(
            row.try_get::<Uuid, _>("credit_memo_id").map_err(decode_error)?,
        ),
        amount: Money::from_cents(row.try_get("amount_cents").map_err(decode_error)?),
        description: row.try_get("description").map_err(decode_error)?,
        date: row.try_get::<NaiveDate, _>("applied_on").map_err(decode_error)?,
        status: status_from_row(row)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode_error)?,
        reversed_at: row.try_get("reversed_at").map_err(decode_error)?,
        version: row.try_get::<i64, _>("version").map_err(decode_error)? as u64,
    })
}

fn applied_discount_from_row(
    tenant_id: TenantId,
    row: &PgRow,
) -> Result<AppliedDiscount, StoreError> {
    Ok(AppliedDiscount {
        id: AppliedDiscountId::from(
            row.try_get::<Uuid, _>("applied_discount_id").map_err(decode_error)?,
        ),
        tenant_id: Some(tenant_id),
        invoice_id: InvoiceId::from(row.try_get::<Uuid, _>("invoice_id").map_err(decode_error)?),
        amount: Money::from_cents(row.try_get("amount_cents").map_err(decode_error)?),
        description: row.try_get("description").map_err(decode_error)?,
        date: row.try_get::<NaiveDate, _>("applied_on").map_err(decode_error)?,
        reference: row.try_get("reference").map_err(decode_error)?,
        ar_account_id: AccountId::from(row.try_get::<Uuid, _>("ar_account_id").map_err(decode_error)?),
        income_account_id: AccountId::from(
            row.try_get::<Uuid, _>("income_account_id").map_err(decode_error)?,
        ),
        status: status_from_row(row)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode_error)?,
        reversed_at: row.try_get("reversed_at").map_err(decode_error)?,
        version: row.try_get::<i64, _>("version").map_err(decode_error)? as u64,
    })
}

fn split_line_from_row(row: &PgRow) -> Result<(Uuid, SplitLine), StoreError> {
    let set_id: Uuid = row.try_get("split_set_id").map_err(decode_error)?;
    Ok((
        set_id,
        SplitLine {
            account_id: AccountId::from(row.try_get::<Uuid, _>("account_id").map_err(decode_error)?),
            account_name: row.try_get("account_name").map_err(decode_error)?,
            people_id: row.try_get("people_id").map_err(decode_error)?,
            unit_id: row.try_get("unit_id").map_err(decode_error)?,
            debit: Money::from_cents(row.try_get("debit_cents").map_err(decode_error)?),
            credit: Money::from_cents(row.try_get("credit_cents").map_err(decode_error)?),
        },
    ))
}

fn posted_split_set_from_row(
    row: &PgRow,
    lines: Vec<SplitLine>,
) -> Result<PostedSplitSet, StoreError> {
    let allocation_kind: String = row.try_get("allocation_kind").map_err(decode_error)?;
    let kind: String = row.try_get("kind").map_err(decode_error)?;
    let description: String = row.try_get("description").map_err(decode_error)?;

    Ok(PostedSplitSet {
        id: row.try_get("split_set_id").map_err(decode_error)?,
        allocation_id: row.try_get("allocation_id").map_err(decode_error)?,
        allocation_kind: AllocationKind::parse(&allocation_kind).ok_or_else(|| {
            StoreError::Backend(format!("unknown allocation kind '{allocation_kind}'"))
        })?,
        kind: SplitSetKind::parse(&kind)
            .ok_or_else(|| StoreError::Backend(format!("unknown split set kind '{kind}'")))?,
        date: row.try_get("posted_on").map_err(decode_error)?,
        posted_at: row.try_get("posted_at").map_err(decode_error)?,
        split_set: SplitSet::new(description, lines),
    })
}

fn decode_error(err: sqlx::Error) -> StoreError {
    map_sqlx_error("decode_row", err)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23514") => StoreError::Constraint(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::RowNotFound => {
            StoreError::Backend(format!("unexpected row not found in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
