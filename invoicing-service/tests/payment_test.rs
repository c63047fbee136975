//! Payment integration tests for invoicing-service.

mod common;

use common::{d, date, invoice_input, item, tenant, TestHarness};
use invoicing_service::models::{Invoice, RecordPayment, TenantScope};
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

/// Invoice totalling 119.00 (100.00 net at 19%).
async fn create_invoice_of_119(app: &TestHarness) -> Invoice {
    let invoice = app
        .invoices
        .create_invoice(&invoice_input(Some(tenant()), vec![item("Consulting", "1", "100")]))
        .await
        .expect("Failed to create invoice");
    assert_eq!(invoice.total, d("119.00"));
    invoice
}

fn payment(invoice_id: Uuid, amount: &str, payment_date: &str) -> RecordPayment {
    RecordPayment {
        invoice_id,
        amount: d(amount),
        payment_date: date(payment_date),
        method: Some("bank_transfer".to_string()),
        reference: None,
        notes: None,
    }
}

#[tokio::test]
async fn test_partial_payments_reduce_balance() {
    let app = TestHarness::new("2025-03-01").await;
    let invoice = create_invoice_of_119(&app).await;
    let scope = TenantScope::Tenant(tenant());

    app.invoices
        .record_payment(scope, &payment(invoice.invoice_id, "50", "2025-03-05"))
        .await
        .expect("Failed to record first payment");
    app.invoices
        .record_payment(scope, &payment(invoice.invoice_id, "30", "2025-03-20"))
        .await
        .expect("Failed to record second payment");

    let detail = app
        .invoices
        .get_invoice(scope, invoice.invoice_id)
        .await
        .unwrap();

    assert_eq!(detail.paid_total, d("80.00"));
    assert_eq!(detail.balance_due, d("39.00"));
    // Newest payment first.
    assert_eq!(detail.payments[0].amount, d("30.00"));
    assert_eq!(detail.payments[1].amount, d("50.00"));
    // Recording payments never changes status.
    assert_eq!(detail.invoice.status, "open");
}

#[tokio::test]
async fn test_payment_inherits_invoice_tenant() {
    let app = TestHarness::new("2025-03-01").await;
    let invoice = create_invoice_of_119(&app).await;

    let recorded = app
        .invoices
        .record_payment(
            TenantScope::Global,
            &payment(invoice.invoice_id, "10", "2025-03-02"),
        )
        .await
        .unwrap();

    assert_eq!(recorded.tenant_id, Some(tenant()));
}

#[tokio::test]
async fn test_payment_on_cancelled_invoice_is_accepted() {
    let app = TestHarness::new("2025-03-01").await;
    let invoice = create_invoice_of_119(&app).await;
    let scope = TenantScope::Tenant(tenant());

    app.invoices
        .update_status(scope, invoice.invoice_id, "cancelled")
        .await
        .unwrap();
    app.invoices
        .record_payment(scope, &payment(invoice.invoice_id, "119", "2025-03-10"))
        .await
        .expect("Payments are accepted in every status");

    let detail = app
        .invoices
        .get_invoice(scope, invoice.invoice_id)
        .await
        .unwrap();
    assert_eq!(detail.invoice.status, "cancelled");
    assert_eq!(detail.balance_due, Decimal::ZERO);
}

#[tokio::test]
async fn test_overpayment_gives_negative_balance() {
    let app = TestHarness::new("2025-03-01").await;
    let invoice = create_invoice_of_119(&app).await;
    let scope = TenantScope::Tenant(tenant());

    app.invoices
        .record_payment(scope, &payment(invoice.invoice_id, "150", "2025-03-10"))
        .await
        .unwrap();

    let detail = app
        .invoices
        .get_invoice(scope, invoice.invoice_id)
        .await
        .unwrap();
    assert_eq!(detail.balance_due, d("-31.00"));
}

#[tokio::test]
async fn test_non_positive_amounts_are_rejected() {
    let app = TestHarness::new("2025-03-01").await;
    let invoice = create_invoice_of_119(&app).await;
    let scope = TenantScope::Tenant(tenant());

    for amount in ["0", "-5", "0.004"] {
        let result = app
            .invoices
            .record_payment(scope, &payment(invoice.invoice_id, amount, "2025-03-10"))
            .await;
        assert!(
            matches!(result, Err(AppError::BadRequest(_))),
            "amount {} should be rejected",
            amount
        );
    }

    let detail = app
        .invoices
        .get_invoice(scope, invoice.invoice_id)
        .await
        .unwrap();
    assert!(detail.payments.is_empty());
}

#[tokio::test]
async fn test_amounts_beyond_storage_are_rejected() {
    let app = TestHarness::new("2025-03-01").await;
    let invoice = create_invoice_of_119(&app).await;
    let scope = TenantScope::Tenant(tenant());

    for amount in ["1000000000000", "79228162514264337593543950335"] {
        let result = app
            .invoices
            .record_payment(scope, &payment(invoice.invoice_id, amount, "2025-03-05"))
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    // Several payments at the limit still produce a balance.
    for _ in 0..3 {
        app.invoices
            .record_payment(
                scope,
                &payment(invoice.invoice_id, "999999999999.99", "2025-03-05"),
            )
            .await
            .unwrap();
    }

    let detail = app
        .invoices
        .get_invoice(scope, invoice.invoice_id)
        .await
        .unwrap();
    assert_eq!(detail.paid_total, d("2999999999999.97"));
    assert_eq!(detail.balance_due, d("-2999999999880.97"));
}

#[tokio::test]
async fn test_payment_against_unknown_invoice_is_not_found() {
    let app = TestHarness::new("2025-03-01").await;

    let result = app
        .invoices
        .record_payment(
            TenantScope::Global,
            &payment(Uuid::new_v4(), "10", "2025-03-10"),
        )
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_payment_text_fields_are_trimmed() {
    let app = TestHarness::new("2025-03-01").await;
    let invoice = create_invoice_of_119(&app).await;

    let mut input = payment(invoice.invoice_id, "12.345", "2025-03-10");
    input.method = Some("  cash ".to_string());
    input.reference = Some("   ".to_string());
    input.notes = Some(" paid at counter ".to_string());

    let recorded = app
        .invoices
        .record_payment(TenantScope::Tenant(tenant()), &input)
        .await
        .unwrap();

    assert_eq!(recorded.amount, d("12.35"));
    assert_eq!(recorded.method.as_deref(), Some("cash"));
    assert_eq!(recorded.reference, None);
    assert_eq!(recorded.notes.as_deref(), Some("paid at counter"));
}
