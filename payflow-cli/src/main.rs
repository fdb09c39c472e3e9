//! Payflow CLI
//!
//! Command-line interface for the payflow payments API.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use payflow_client::PayflowClient;
use payflow_core::{
    AuthorizeRequest, CardDetails, Currency, PaymentFilter, PaymentId, PaymentMethod,
    PaymentStatus,
};

#[derive(Parser)]
#[command(name = "payflow")]
#[command(author, version, about = "Payflow API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the payflow API
    #[arg(long, env = "PAYFLOW_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize a new payment
    Authorize {
        /// Merchant order ID
        #[arg(long)]
        order: String,
        /// Customer ID
        #[arg(long)]
        customer: String,
        /// Amount to place on hold, e.g. 100.50
        #[arg(long)]
        amount: Decimal,
        /// Currency (USD, EUR, GBP, INR)
        #[arg(long, default_value = "USD")]
        currency: String,
        /// Payment method (credit_card, debit_card, bank_transfer, digital_wallet)
        #[arg(long, default_value = "credit_card")]
        method: String,
        /// Tokenized card, required for card methods
        #[arg(long)]
        card_token: Option<String>,
        /// Last four digits of the card
        #[arg(long, default_value = "4242")]
        last_four: String,
        /// Card brand
        #[arg(long, default_value = "visa")]
        brand: String,
        /// Card expiration month
        #[arg(long, default_value = "12")]
        exp_month: u32,
        /// Card expiration year
        #[arg(long, default_value = "2030")]
        exp_year: i32,
        /// Idempotency key
        #[arg(long)]
        key: String,
    },
    /// Capture part or all of an authorized payment
    Capture {
        /// Payment ID
        id: String,
        /// Amount to capture
        #[arg(long)]
        amount: Decimal,
        /// Idempotency key
        #[arg(long)]
        key: String,
    },
    /// Refund captured funds
    Refund {
        /// Payment ID
        id: String,
        /// Amount to refund; omit to refund everything refundable
        #[arg(long)]
        amount: Option<Decimal>,
        /// Reason recorded with the refund
        #[arg(long, default_value = "customer_request")]
        reason: String,
        /// Idempotency key
        #[arg(long)]
        key: String,
    },
    /// Void an authorization
    Void {
        /// Payment ID
        id: String,
        /// Optional idempotency key
        #[arg(long)]
        key: Option<String>,
    },
    /// Get payment details
    Get {
        /// Payment ID
        id: String,
    },
    /// List payments
    List {
        /// Filter by merchant order
        #[arg(long)]
        order: Option<String>,
        /// Filter by customer
        #[arg(long)]
        customer: Option<String>,
        /// Filter by status (authorized, captured, refunded, ...)
        #[arg(long)]
        status: Option<String>,
        /// Page size
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Fetch the receipt for a payment with settled funds
    Receipt {
        /// Payment ID
        id: String,
    },
    /// Check API health
    Health,
}

fn parse_currency(s: &str) -> Result<Currency> {
    match s.to_uppercase().as_str() {
        "USD" => Ok(Currency::USD),
        "EUR" => Ok(Currency::EUR),
        "GBP" => Ok(Currency::GBP),
        "INR" => Ok(Currency::INR),
        _ => anyhow::bail!("Unknown currency: {}. Supported: USD, EUR, GBP, INR", s),
    }
}

fn parse_method(s: &str) -> Result<PaymentMethod> {
    s.to_lowercase()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid payment method: {}", s))
}

fn parse_status(s: &str) -> Result<PaymentStatus> {
    s.to_lowercase()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid payment status: {}", s))
}

fn parse_payment_id(s: &str) -> Result<PaymentId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid payment ID: {}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let client = PayflowClient::new(&cli.api_url);

    match cli.command {
        Commands::Health => {
            let healthy = client.healthz().await?;
            if healthy {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Authorize {
            order,
            customer,
            amount,
            currency,
            method,
            card_token,
            last_four,
            brand,
            exp_month,
            exp_year,
            key,
        } => {
            let payment_method = parse_method(&method)?;
            let card_details = card_token.map(|card_token| CardDetails {
                card_token,
                last_four,
                brand,
                exp_month,
                exp_year,
            });
            if payment_method.is_card() && card_details.is_none() {
                anyhow::bail!("--card-token is required for card payment methods");
            }
            let req = AuthorizeRequest {
                order_id: order,
                customer_id: customer,
                amount,
                currency: parse_currency(&currency)?,
                payment_method,
                card_details,
                idempotency_key: key,
            };
            let view = client.authorize(&req).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }

        Commands::Capture { id, amount, key } => {
            let id = parse_payment_id(&id)?;
            let view = client.capture(&id, amount, &key).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }

        Commands::Refund {
            id,
            amount,
            reason,
            key,
        } => {
            let id = parse_payment_id(&id)?;
            let view = client.refund(&id, amount, &reason, &key).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }

        Commands::Void { id, key } => {
            let id = parse_payment_id(&id)?;
            let view = client.void(&id, key).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }

        Commands::Get { id } => {
            let id = parse_payment_id(&id)?;
            let view = client.get_payment(&id).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }

        Commands::List {
            order,
            customer,
            status,
            limit,
        } => {
            let filter = PaymentFilter {
                order_id: order,
                customer_id: customer,
                status: status.as_deref().map(parse_status).transpose()?,
                limit,
            };
            let views = client.list_payments(&filter).await?;
            println!("{}", serde_json::to_string_pretty(&views)?);
        }

        Commands::Receipt { id } => {
            let id = parse_payment_id(&id)?;
            let receipt = client.receipt(&id).await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
    }

    Ok(())
}
