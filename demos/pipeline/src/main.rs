//! Pipeline Demo
//!
//! A tiny inventory service wired through Herald:
//!
//! ```text
//! ReserveStock ──▶ Validate (pre) ──▶ Timing ──▶ Logging ──▶ ReserveStockHandler ──▶ Audit (post)
//!                                                                   │
//!                                                                   └── publish StockLow
//!                                                                          ├── Restocker
//!                                                                          └── Alerter
//! ```
//!
//! The inventory store is a singleton and the request handler is scoped, so
//! every unit of work (`runtime.scoped(&mediator)`) gets its own handler.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package pipeline-demo
//! HERALD_LOGGING__LEVEL=debug cargo run --package pipeline-demo
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use herald::prelude::*;
use tokio::sync::Mutex;
use tracing::{info, warn};

// ============================================================================
// Domain
// ============================================================================

const LOW_WATERMARK: u32 = 3;

/// Shared stock levels.
#[derive(Default)]
struct Inventory {
    stock: Mutex<HashMap<String, u32>>,
}

impl Inventory {
    async fn seed(&self, sku: &str, quantity: u32) {
        self.stock.lock().await.insert(sku.to_string(), quantity);
    }

    async fn take(&self, sku: &str, quantity: u32) -> Result<u32, String> {
        let mut stock = self.stock.lock().await;
        let available = stock
            .get_mut(sku)
            .ok_or_else(|| format!("unknown sku {sku}"))?;
        if *available < quantity {
            return Err(format!("only {available} of {sku} left"));
        }
        *available -= quantity;
        Ok(*available)
    }
}

#[derive(Debug)]
struct ReserveStock {
    sku: String,
    quantity: u32,
}

impl Request for ReserveStock {
    type Response = u32;
}

#[derive(Debug, Clone)]
struct StockLow {
    sku: String,
    remaining: u32,
}

impl Notification for StockLow {}

// ============================================================================
// Handlers
// ============================================================================

struct ReserveStockHandler {
    inventory: Arc<Inventory>,
}

#[async_trait]
impl RequestHandler<ReserveStock> for ReserveStockHandler {
    async fn handle(&self, request: &ReserveStock, ctx: &CallContext) -> HandlerResult<u32> {
        let remaining = self.inventory.take(&request.sku, request.quantity).await?;

        if remaining < LOW_WATERMARK {
            // Nested publish through the same unit of work; the envelope chain
            // records this call as the cause.
            let publisher = ctx.publisher().ok_or("not dispatched by a mediator")?;
            let notification = StockLow {
                sku: request.sku.clone(),
                remaining,
            };
            publisher
                .publish(notification, PublishStrategy::SequentialContinue)
                .await?;
        }

        Ok(remaining)
    }
}

struct Restocker;

#[async_trait]
impl NotificationHandler<StockLow> for Restocker {
    async fn handle(&self, notification: &StockLow, ctx: &CallContext) -> HandlerResult<()> {
        info!(
            sku = %notification.sku,
            causation = ?ctx.envelope().extensions.causation_id,
            "Ordering more stock"
        );
        Ok(())
    }
}

struct Alerter;

#[async_trait]
impl NotificationHandler<StockLow> for Alerter {
    async fn handle(&self, notification: &StockLow, _ctx: &CallContext) -> HandlerResult<()> {
        warn!(sku = %notification.sku, remaining = notification.remaining, "Stock is low");
        Ok(())
    }
}

// ============================================================================
// Pipeline stages
// ============================================================================

struct Validate;

#[async_trait]
impl RequestPreProcessor<ReserveStock> for Validate {
    async fn process(&self, request: &ReserveStock, _ctx: &CallContext) -> HandlerResult<()> {
        if request.quantity == 0 {
            return Err("quantity must be positive".into());
        }
        Ok(())
    }
}

/// Logs every request type it wraps.
struct Logging;

#[async_trait]
impl<R: Request> PipelineBehavior<R> for Logging {
    async fn handle(
        &self,
        _request: &R,
        ctx: &CallContext,
        next: Next<'_, R::Response>,
    ) -> MediatorResult<R::Response> {
        let envelope = ctx.envelope();
        info!(id = %envelope.id, kind = %envelope.kind, "Handling request");
        let result = next.run().await;
        if let Err(e) = &result {
            warn!(id = %envelope.id, error = %e, "Request failed");
        }
        result
    }
}

struct Timing;

#[async_trait]
impl<R: Request> PipelineBehavior<R> for Timing {
    async fn handle(
        &self,
        _request: &R,
        _ctx: &CallContext,
        next: Next<'_, R::Response>,
    ) -> MediatorResult<R::Response> {
        let started = Instant::now();
        let result = next.run().await;
        info!(elapsed_us = started.elapsed().as_micros() as u64, "Request timed");
        result
    }
}

struct Audit;

#[async_trait]
impl RequestPostProcessor<ReserveStock> for Audit {
    async fn process(
        &self,
        request: &ReserveStock,
        remaining: &u32,
        ctx: &CallContext,
    ) -> HandlerResult<()> {
        info!(
            id = %ctx.envelope().id,
            sku = %request.sku,
            reserved = request.quantity,
            remaining,
            "Reservation recorded"
        );
        Ok(())
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let inventory = Arc::new(Inventory::default());
    inventory.seed("widget", 5).await;

    let runtime = HeraldRuntime::builder()
        .configure(|c| {
            c.add_instance(Arc::clone(&inventory));
            c.add_request_handler::<ReserveStock, _, _>(Lifetime::Scoped, |r| {
                Ok(ReserveStockHandler {
                    inventory: r.require::<Inventory>()?,
                })
            });
            c.add_notification_handler::<StockLow, _, _>(Lifetime::Singleton, |_| Ok(Restocker));
            c.add_notification_handler::<StockLow, _, _>(Lifetime::Singleton, |_| Ok(Alerter));
            c.add_pre_processor::<ReserveStock, _, _>(Lifetime::Singleton, |_| Ok(Validate));
            c.add_behavior::<ReserveStock, _, _>(Lifetime::Singleton, |_| Ok(Timing));
            c.add_behavior::<ReserveStock, _, _>(Lifetime::Singleton, |_| Ok(Logging));
            c.add_post_processor::<ReserveStock, _, _>(Lifetime::Singleton, |_| Ok(Audit));
        })
        .build()?;

    let mediator = runtime.build_mediator(
        runtime
            .mediator_builder()
            .request_handler::<ReserveStock, ReserveStockHandler>()
            .notification_handler::<StockLow, Restocker>()
            .notification_handler::<StockLow, Alerter>(),
    );

    for quantity in [1, 2, 0, 9] {
        let unit = runtime.scoped(&mediator);
        let request = ReserveStock {
            sku: "widget".to_string(),
            quantity,
        };
        match unit.send(request).await {
            Ok(remaining) => info!(quantity, remaining, "Reserved"),
            Err(e) => warn!(quantity, error = %e, "Reservation rejected"),
        }
    }

    // Publish directly under every strategy.
    for strategy in PublishStrategy::ALL {
        let notification = StockLow {
            sku: "gadget".to_string(),
            remaining: 0,
        };
        mediator
            .publish_with(notification, strategy, CancellationToken::new())
            .await?;
        info!(strategy = strategy.as_str(), "Published");
    }

    Ok(())
}
