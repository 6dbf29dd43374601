//! swapflow demo - Submits a few orders and streams their lifecycle

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing_subscriber::{EnvFilter, fmt};

use swapflow::core::{Config, OrderKind, OrderRequest};
use swapflow::service::SwapService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,swapflow=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    tracing::info!("🦀 swapflow starting...");

    let config = Config::from_env()?;
    let service = Arc::new(SwapService::from_config(&config)?);

    let requests = vec![
        OrderRequest {
            kind: OrderKind::Market,
            token_in: "SOL".into(),
            token_out: "USDC".into(),
            amount_in: Decimal::from(100),
            slippage_tolerance: None,
        },
        OrderRequest {
            kind: OrderKind::Market,
            token_in: "ETH".into(),
            token_out: "USDC".into(),
            amount_in: Decimal::from(5),
            slippage_tolerance: Some(dec!(0.01)),
        },
        OrderRequest {
            kind: OrderKind::Market,
            token_in: "USDC".into(),
            token_out: "SOL".into(),
            amount_in: Decimal::from(2_500),
            slippage_tolerance: None,
        },
    ];

    let mut watchers = Vec::new();
    for request in requests {
        let submission = service.submit(request).await?;
        tracing::info!("✅ accepted order {}", submission.order_id);

        let service = service.clone();
        watchers.push(tokio::spawn(async move {
            let order_id = submission.order_id;
            let mut events = submission.events;
            while let Some(event) = events.next().await {
                tracing::info!(
                    "order {} [{}] {}",
                    order_id,
                    event.sequence,
                    event.status.label()
                );
                if event.status.is_terminal() {
                    break;
                }
            }
            service.release(order_id);
        }));
    }

    tokio::select! {
        _ = futures::future::join_all(watchers) => {
            tracing::info!("all demo orders reached a terminal status");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
        }
    }

    service.shutdown().await;
    tracing::info!("🛑 swapflow done");

    Ok(())
}
