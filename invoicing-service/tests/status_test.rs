//! Invoice status tests for invoicing-service.

mod common;

use common::{invoice_input, item, tenant, TestHarness};
use invoicing_service::models::{InvoiceStatus, TenantScope};
use service_core::error::AppError;
use uuid::Uuid;

#[tokio::test]
async fn test_any_status_may_follow_any_other() {
    let app = TestHarness::new("2025-03-01").await;
    let invoice = app
        .invoices
        .create_invoice(&invoice_input(Some(tenant()), vec![item("A", "1", "10")]))
        .await
        .unwrap();
    let scope = TenantScope::Tenant(tenant());

    for from in InvoiceStatus::ALL {
        for to in InvoiceStatus::ALL {
            app.invoices
                .update_status(scope, invoice.invoice_id, from.as_str())
                .await
                .unwrap();
            app.invoices
                .update_status(scope, invoice.invoice_id, to.as_str())
                .await
                .unwrap_or_else(|e| panic!("{:?} -> {:?} rejected: {}", from, to, e));

            let detail = app
                .invoices
                .get_invoice(scope, invoice.invoice_id)
                .await
                .unwrap();
            assert_eq!(detail.invoice.status, to.as_str());
        }
    }
}

#[tokio::test]
async fn test_paid_invoice_can_return_to_draft() {
    let app = TestHarness::new("2025-03-01").await;
    let invoice = app
        .invoices
        .create_invoice(&invoice_input(Some(tenant()), vec![item("A", "1", "10")]))
        .await
        .unwrap();
    let scope = TenantScope::Tenant(tenant());

    app.invoices
        .update_status(scope, invoice.invoice_id, "paid")
        .await
        .unwrap();
    app.invoices
        .update_status(scope, invoice.invoice_id, "draft")
        .await
        .unwrap();

    let detail = app
        .invoices
        .get_invoice(scope, invoice.invoice_id)
        .await
        .unwrap();
    assert_eq!(detail.invoice.status(), Some(InvoiceStatus::Draft));
}

#[tokio::test]
async fn test_unknown_status_is_rejected_and_nothing_changes() {
    let app = TestHarness::new("2025-03-01").await;
    let invoice = app
        .invoices
        .create_invoice(&invoice_input(Some(tenant()), vec![item("A", "1", "10")]))
        .await
        .unwrap();
    let scope = TenantScope::Tenant(tenant());

    for status in ["overdue", "", "PAID!"] {
        let result = app
            .invoices
            .update_status(scope, invoice.invoice_id, status)
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    let detail = app
        .invoices
        .get_invoice(scope, invoice.invoice_id)
        .await
        .unwrap();
    assert_eq!(detail.invoice.status, "open");
}

#[tokio::test]
async fn test_status_update_of_unknown_invoice_is_not_found() {
    let app = TestHarness::new("2025-03-01").await;

    let result = app
        .invoices
        .update_status(TenantScope::Global, Uuid::new_v4(), "paid")
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_create_with_explicit_status() {
    let app = TestHarness::new("2025-03-01").await;

    let mut input = invoice_input(Some(tenant()), vec![item("A", "1", "10")]);
    input.status = Some("draft".to_string());
    let invoice = app.invoices.create_invoice(&input).await.unwrap();
    assert_eq!(invoice.status, "draft");

    input.status = Some("void".to_string());
    let result = app.invoices.create_invoice(&input).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}
