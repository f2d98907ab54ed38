//! Demo runner: seeds the product catalogue, starts the consumer groups,
//! pushes a couple of checkouts through the pipeline and prints the result.
//!
//! `RUST_LOG=fanout_core=debug cargo run -p fanout-cli` for per-message logs.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fanout_core::app::{Pipeline, PipelineBuilder};
use fanout_core::config::PipelineConfig;
use fanout_core::domain::{
    BasketLine, CheckoutRequest, InventoryRecord, OrderRecord, PaymentRecord, ShippingDetails,
};
use fanout_core::impls::InMemoryInventoryStore;

/// `(product id, available stock)` of the catalogue.
const CATALOGUE: [(&str, u32); 12] = [
    ("prod001", 45),
    ("prod002", 12),
    ("prod003", 88),
    ("prod004", 34),
    ("prod005", 67),
    ("prod006", 23),
    ("prod007", 15),
    ("prod008", 8),
    ("prod009", 50),
    ("prod010", 20),
    ("prod011", 150),
    ("prod012", 42),
];

/// How long the consumers get before the demo reads the stores.
const SETTLE_TIME: Duration = Duration::from_secs(3);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DemoReport {
    inventory: Vec<InventoryRecord>,
    orders: Vec<OrderRecord>,
    payments: Vec<PaymentRecord>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fanout_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn demo_checkouts() -> Vec<CheckoutRequest> {
    let mut alice = CheckoutRequest::new(
        "alice",
        vec![
            BasketLine::new("prod001", 2, 999.0),
            BasketLine::new("prod011", 3, 29.0),
        ],
    );
    alice.shipping_details = Some(ShippingDetails {
        first_name: "Alice".into(),
        last_name: "Example".into(),
        email: "alice@example.com".into(),
        address: "1 Main Street".into(),
    });

    // More than the 8 in stock: the inventory leg fails, order and payment still land.
    let bob = CheckoutRequest::new("bob", vec![BasketLine::new("prod008", 10, 349.0)]);

    vec![alice, bob]
}

async fn report(
    pipeline: &Pipeline,
    inventory: &InMemoryInventoryStore,
) -> Result<DemoReport, Box<dyn std::error::Error>> {
    Ok(DemoReport {
        inventory: inventory.list().await,
        orders: pipeline.orders().list().await?,
        payments: pipeline.list_payments().await?,
    })
}

async fn run(config: PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let inventory = InMemoryInventoryStore::new();
    inventory
        .seed(
            CATALOGUE
                .iter()
                .map(|(id, stock)| InventoryRecord::new(*id, *stock).with_reorder_level(config.reorder_level)),
        )
        .await;
    info!(products = CATALOGUE.len(), "catalogue seeded");

    let pipeline = PipelineBuilder::new(config)
        .inventory_store(Arc::new(inventory.clone()))
        .build()?;
    let running = pipeline.start();

    for request in demo_checkouts() {
        match pipeline.checkout(request).await {
            Ok(receipt) => info!(
                customer_id = %receipt.customer_id,
                correlation_id = %receipt.correlation_id,
                total_price = %receipt.total_price,
                targets = receipt.report.delivered().count(),
                "checkout accepted"
            ),
            Err(err) => warn!(error = %err, "checkout rejected"),
        }
    }

    tokio::select! {
        _ = tokio::time::sleep(SETTLE_TIME) => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!(error = %err, "could not listen for ctrl-c");
            }
        }
    }
    running.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&report(&pipeline, &inventory).await?)?);
    println!("{}", pipeline.status().await?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "demo failed");
            ExitCode::FAILURE
        }
    }
}
