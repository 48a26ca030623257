use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::{json, Value};

use arledger_accounting::{Account, AccountRole};
use arledger_allocation::{CreditMemo, CustomerId, Invoice, InvoiceId};
use arledger_api::app::services::AppServices;
use arledger_core::{Money, TenantId};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(services: AppServices) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = arledger_api::app::build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A 100.00 invoice with a 40.00 credit memo, AR/income/clearing accounts, one tenant.
struct Fixture {
    srv: TestServer,
    client: reqwest::Client,
    tenant: TenantId,
    receivable: Account,
    income: Account,
    invoice_id: InvoiceId,
    memo: CreditMemo,
}

impl Fixture {
    async fn new() -> Self {
        let tenant = TenantId::new();
        let receivable = Account::new("Accounts Receivable", "AR", AccountRole::Receivable);
        let income = Account::new("Sales Discounts", "Income", AccountRole::Income);
        let clearing = Account::new("Customer Credits", "Liability", AccountRole::CreditClearing);

        let services = AppServices::in_memory(Some(clearing.id));
        for account in [&receivable, &income, &clearing] {
            services.accounts.insert(tenant, account.clone());
        }

        let customer = CustomerId::new();
        let invoice = Invoice {
            id: InvoiceId::new(),
            customer_id: customer,
            unit_id: None,
            number: "INV-3001".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            amount: Money::from_cents(10_000),
            previous_balance: Money::ZERO,
            ar_account_id: receivable.id,
        };
        services.invoices.insert(tenant, invoice.clone());

        let memo = CreditMemo::issue(customer, "Returned goods", Money::from_cents(4_000), None)
            .unwrap();
        services
            .allocations
            .register_credit_memo(tenant, memo.clone())
            .await
            .unwrap();

        Self {
            srv: TestServer::spawn(services).await,
            client: reqwest::Client::new(),
            tenant,
            receivable,
            income,
            invoice_id: invoice.id,
            memo,
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(self.srv.url(path))
            .header("x-tenant-id", self.tenant.to_string())
            .send()
            .await
            .unwrap();
        (res.status(), res.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.srv.url(path))
            .header("x-tenant-id", self.tenant.to_string())
            .json(&body)
            .send()
            .await
            .unwrap();
        (res.status(), res.json().await.unwrap())
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .delete(self.srv.url(path))
            .header("x-tenant-id", self.tenant.to_string())
            .send()
            .await
            .unwrap();
        (res.status(), res.json().await.unwrap())
    }

    fn invoice_path(&self, suffix: &str) -> String {
        format!("/invoices/{}/{}", self.invoice_id, suffix)
    }
}

#[tokio::test]
async fn health_is_public_but_tenant_routes_need_the_header() {
    let fx = Fixture::new().await;

    let res = fx.client.get(fx.srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = fx
        .client
        .get(fx.srv.url(&fx.invoice_path("summary")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing_tenant");
}

#[tokio::test]
async fn credit_lifecycle_apply_summarize_reverse() {
    let fx = Fixture::new().await;

    let (status, credit) = fx
        .post(
            &fx.invoice_path("applied-credits"),
            json!({
                "credit_memo_id": fx.memo.id.to_string(),
                "amount": "25.00",
                "description": "Apply return credit",
                "date": "2024-05-10",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(credit["amount"], "25.00");
    assert_eq!(credit["status"], "active");
    let credit_id = credit["id"].as_str().unwrap().to_string();

    let (_, summary) = fx.get(&fx.invoice_path("summary")).await;
    assert_eq!(summary["applied_credits_total"], "25.00");
    assert_eq!(summary["due_amount"], "75.00");

    let (_, memos) = fx.get(&fx.invoice_path("available-credits")).await;
    assert_eq!(memos[0]["available_amount"], "15.00");

    let (status, splits) = fx.get(&format!("/applied-credits/{credit_id}/splits")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(splits[0]["split_set"]["is_balanced"], true);
    assert_eq!(splits[0]["split_set"]["lines"][0]["account_id"], fx.receivable.id.to_string());
    assert_eq!(splits[0]["split_set"]["lines"][0]["credit"], "25.00");

    let (status, reversed) = fx.delete(&format!("/applied-credits/{credit_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reversed["status"], "inactive");

    let (status, err) = fx.delete(&format!("/applied-credits/{credit_id}")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "already_reversed");

    let (_, summary) = fx.get(&fx.invoice_path("summary")).await;
    assert_eq!(summary["due_amount"], "100.00");
    let (_, memos) = fx.get(&fx.invoice_path("available-credits")).await;
    assert_eq!(memos[0]["available_amount"], "40.00");
    let (_, splits) = fx.get(&format!("/applied-credits/{credit_id}/splits")).await;
    assert_eq!(splits.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn over_application_is_a_conflict() {
    let fx = Fixture::new().await;

    let (status, err) = fx
        .post(
            &fx.invoice_path("applied-credits"),
            json!({
                "credit_memo_id": fx.memo.id.to_string(),
                "amount": "50.00",
                "description": "Too much",
                "date": "2024-05-10",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "insufficient_credit");

    let (_, credits) = fx.get(&fx.invoice_path("applied-credits")).await;
    assert!(credits.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn discount_accepts_numeric_amounts_and_checks_roles() {
    let fx = Fixture::new().await;

    let (status, discount) = fx
        .post(
            &fx.invoice_path("applied-discounts"),
            json!({
                "amount": 10,
                "description": "Early payment",
                "date": "2024-05-10",
                "ar_account_id": fx.receivable.id.to_string(),
                "income_account_id": fx.income.id.to_string(),
                "reference": "EP-10",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(discount["amount"], "10.00");

    let (_, summary) = fx.get(&fx.invoice_path("summary")).await;
    assert_eq!(summary["due_amount"], "90.00");

    let (status, err) = fx
        .post(
            &fx.invoice_path("applied-discounts"),
            json!({
                "amount": "5.00",
                "description": "Swapped accounts",
                "date": "2024-05-10",
                "ar_account_id": fx.income.id.to_string(),
                "income_account_id": fx.receivable.id.to_string(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["error"], "invalid_account_role");

    let (_, discounts) = fx.get(&fx.invoice_path("applied-discounts")).await;
    assert_eq!(discounts.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn applications_without_a_date_are_rejected() {
    let fx = Fixture::new().await;

    let (status, err) = fx
        .post(
            &fx.invoice_path("applied-credits"),
            json!({
                "credit_memo_id": fx.memo.id.to_string(),
                "amount": "25.00",
                "description": "No date given",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");

    let (status, err) = fx
        .post(
            &fx.invoice_path("applied-discounts"),
            json!({
                "amount": "5.00",
                "description": "No date given",
                "ar_account_id": fx.receivable.id.to_string(),
                "income_account_id": fx.income.id.to_string(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");

    let (_, memos) = fx.get(&fx.invoice_path("available-credits")).await;
    assert_eq!(memos[0]["available_amount"], "40.00");
    let (_, credits) = fx.get(&fx.invoice_path("applied-credits")).await;
    assert!(credits.as_array().unwrap().is_empty());
    let (_, discounts) = fx.get(&fx.invoice_path("applied-discounts")).await;
    assert!(discounts.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn zero_preview_returns_warnings_and_changes_nothing() {
    let fx = Fixture::new().await;

    let (status, preview) = fx
        .post(
            &fx.invoice_path("split-preview"),
            json!({
                "kind": "credit",
                "credit_memo_id": fx.memo.id.to_string(),
                "amount": 0,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = preview["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["code"].as_str().unwrap())
        .collect();
    assert!(codes.contains(&"invalid_amount"));
    assert_eq!(preview["split_set"]["lines"].as_array().unwrap().len(), 2);

    let (_, memos) = fx.get(&fx.invoice_path("available-credits")).await;
    assert_eq!(memos[0]["available_amount"], "40.00");
    let (_, credits) = fx.get(&fx.invoice_path("applied-credits")).await;
    assert!(credits.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn accounts_filter_by_role() {
    let fx = Fixture::new().await;

    let (status, accounts) = fx.get("/accounts?role=income").await;
    assert_eq!(status, StatusCode::OK);
    let accounts = accounts.as_array().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["account_name"], "Sales Discounts");

    let (status, err) = fx.get("/accounts?role=equity").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_role");
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let fx = Fixture::new().await;

    let (status, err) = fx
        .get(&format!("/invoices/{}/summary", InvoiceId::new()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");

    let (status, err) = fx.get("/invoices/not-a-uuid/summary").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_id");
}

#[tokio::test]
async fn tenants_do_not_see_each_other() {
    let fx = Fixture::new().await;

    let res = fx
        .client
        .get(fx.srv.url(&fx.invoice_path("summary")))
        .header("x-tenant-id", TenantId::new().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
