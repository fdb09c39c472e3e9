//! Client example demonstrating a full payment lifecycle against a running server.
//!
//! Run with: cargo run -p payflow-app --example client_example

use payflow_client::PayflowClient;
use payflow_core::{AuthorizeRequest, CardDetails, Currency, PaymentFilter, PaymentMethod};
use payflow_engine::{PaymentEngine, inbound::HttpServer};
use payflow_ledger::build_ledger;
use rust_decimal_macros::dec;
use std::net::SocketAddr;
use tempfile::tempdir;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_env_filter("info").init();

    // Find an available port
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    let port = addr.port();
    drop(listener);

    // Use a temp file-backed SQLite ledger
    let tmp = tempdir()?;
    let db_path = tmp.path().join("payflow.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    println!("🚀 Starting server on port {port}...");
    println!("   Ledger: {db_url}");

    // Build ledger (handles connection and migration)
    let ledger = build_ledger(&db_url).await?;

    // Start server in background
    let engine = PaymentEngine::new(ledger, gateway_sim::SimGateway::new());
    let server = HttpServer::new(engine);
    let router = server.router();

    let server_addr = format!("127.0.0.1:{port}");
    tokio::spawn(async move {
        axum::serve(
            TcpListener::bind(&server_addr).await.unwrap(),
            router.into_make_service(),
        )
        .await
        .unwrap();
    });

    // Wait for server to start
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    // Create client
    let base_url = format!("http://127.0.0.1:{port}");
    let client = PayflowClient::new(&base_url);

    // ─────────────────────────────────────────────────────────────────────────
    // Demo: Full payment lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    // Health check
    let healthy = client.healthz().await?;
    println!("✅ Server healthy: {healthy}");

    // Authorize a payment
    let request = AuthorizeRequest {
        order_id: "ORD-1001".into(),
        customer_id: "CUST-2002".into(),
        amount: dec!(100.50),
        currency: Currency::USD,
        payment_method: PaymentMethod::CreditCard,
        card_details: Some(CardDetails {
            card_token: "tok_visa_4242".into(),
            last_four: "4242".into(),
            brand: "visa".into(),
            exp_month: 12,
            exp_year: 2030,
        }),
        idempotency_key: "order-1001-auth".into(),
    };
    let payment = client.authorize(&request).await?;
    println!(
        "✅ Authorized {} {} (id={})",
        payment.authorized_amount, payment.currency, payment.id
    );

    // Retrying with the same key replays the stored outcome
    let replay = client.authorize(&request).await?;
    assert_eq!(replay.id, payment.id);
    println!("✅ Replay returned the same payment (id={})", replay.id);

    // Capture in two parts
    let partial = client
        .capture(&payment.id, dec!(40.00), "order-1001-cap-1")
        .await?;
    println!(
        "✅ Captured 40.00 (status={}, captured={})",
        partial.status, partial.captured_total
    );

    let settled = client
        .capture(&payment.id, dec!(60.50), "order-1001-cap-2")
        .await?;
    println!(
        "✅ Captured 60.50 (status={}, captured={})",
        settled.status, settled.captured_total
    );

    // Receipt is available once funds have settled
    let receipt = client.receipt(&payment.id).await?;
    println!(
        "🧾 Receipt {} over {} {} ({})",
        receipt.receipt_id,
        receipt.amount,
        receipt.currency,
        receipt.card_last_four.as_deref().unwrap_or("-")
    );

    // Refund part of it
    let refunded = client
        .refund(
            &payment.id,
            Some(dec!(25.00)),
            "customer_request",
            "order-1001-ref-1",
        )
        .await?;
    println!(
        "✅ Refunded 25.00 (status={}, refunded={})",
        refunded.status, refunded.refunded_total
    );

    // A declining card records a failed payment
    let mut declining = request.clone();
    declining.order_id = "ORD-1002".into();
    declining.idempotency_key = "order-1002-auth".into();
    if let Some(card) = declining.card_details.as_mut() {
        card.card_token = "tok_decline".into();
    }
    let declined = client.authorize(&declining).await;
    assert!(declined.is_err());
    println!("✅ Declined as expected: {}", declined.unwrap_err());

    // Void a fresh authorization to release the hold
    let mut holding = request.clone();
    holding.order_id = "ORD-1003".into();
    holding.idempotency_key = "order-1003-auth".into();
    let held = client.authorize(&holding).await?;
    let voided = client.void(&held.id, None).await?;
    println!("✅ Voided hold {} (status={})", voided.id, voided.status);

    // List everything for the customer
    let filter = PaymentFilter {
        customer_id: Some("CUST-2002".into()),
        ..Default::default()
    };
    let payments = client.list_payments(&filter).await?;
    println!("\n📋 Payments for CUST-2002:");
    for p in payments {
        println!(
            "   - {} {} {} ({})",
            p.id, p.authorized_amount, p.currency, p.status
        );
    }

    println!("\n🎉 Example completed successfully!");

    Ok(())
}
