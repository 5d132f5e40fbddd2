//! Periodic driver for the Sync Loop and the ten Action Dispatchers (spec
//! §9 "Global mutex for each dispatcher"): each dispatcher kind gets its own
//! `tokio::sync::Mutex<()>`, so if one cycle overruns its interval the next
//! tick skips it instead of running two instances concurrently against the
//! same payment source. The façade's own locking (`try_begin_sync`,
//! `try_lock_wallet`) is the real correctness boundary; this is only a
//! courtesy to avoid redundant work and log noise.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use escrow_engine::dispatchers::{
    authorize_refund, cancel_refund, deregister, lock_funds, register, request_refund,
    submit_result, withdraw, withdraw_disputed, withdraw_refund,
};
use escrow_engine::{run_sync_cycle, DispatcherContext};
use escrow_persistence::EntityId;

use crate::config::Config;

type DispatcherFn = for<'a> fn(
    &'a DispatcherContext,
    EntityId,
    i64,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<usize, escrow_engine::EngineError>> + Send + 'a>>;

const DISPATCHERS: &[(&str, DispatcherFn)] = &[
    ("submit_result", |ctx, src, now| Box::pin(submit_result::run_cycle(ctx, src, now))),
    ("request_refund", |ctx, src, now| Box::pin(request_refund::run_cycle(ctx, src, now))),
    ("cancel_refund", |ctx, src, now| Box::pin(cancel_refund::run_cycle(ctx, src, now))),
    ("authorize_refund", |ctx, src, now| Box::pin(authorize_refund::run_cycle(ctx, src, now))),
    ("withdraw", |ctx, src, now| Box::pin(withdraw::run_cycle(ctx, src, now))),
    ("withdraw_refund", |ctx, src, now| Box::pin(withdraw_refund::run_cycle(ctx, src, now))),
    ("withdraw_disputed", |ctx, src, now| Box::pin(withdraw_disputed::run_cycle(ctx, src, now))),
    ("lock_funds", |ctx, src, now| Box::pin(lock_funds::run_cycle(ctx, src, now))),
    ("register", |ctx, src, now| Box::pin(register::run_cycle(ctx, src, now))),
    ("deregister", |ctx, src, now| Box::pin(deregister::run_cycle(ctx, src, now))),
];

struct DispatcherLocks {
    locks: Vec<(&'static str, Mutex<()>)>,
}

impl DispatcherLocks {
    fn new() -> Self {
        Self {
            locks: DISPATCHERS.iter().map(|(name, _)| (*name, Mutex::new(()))).collect(),
        }
    }
}

/// Runs forever: every `sync_interval_secs` ticks the Sync Loop over every
/// active payment source, every `dispatch_interval_secs` ticks every
/// dispatcher over every active payment source. Both loops re-fetch the
/// active source list on each tick, so newly onboarded or disabled sources
/// are picked up without a restart.
pub async fn run(ctx: Arc<DispatcherContext>, config: &Config) -> anyhow::Result<()> {
    let locks = Arc::new(DispatcherLocks::new());
    let mut sync_tick = tokio::time::interval(Duration::from_secs(config.sync_interval_secs));
    let mut dispatch_tick = tokio::time::interval(Duration::from_secs(config.dispatch_interval_secs));

    loop {
        tokio::select! {
            _ = sync_tick.tick() => {
                if let Err(e) = run_sync_tick(&ctx).await {
                    error!("sync tick failed: {e}");
                }
            }
            _ = dispatch_tick.tick() => {
                if let Err(e) = run_dispatch_tick(&ctx, &locks).await {
                    error!("dispatch tick failed: {e}");
                }
            }
        }
    }
}

async fn run_sync_tick(ctx: &Arc<DispatcherContext>) -> anyhow::Result<()> {
    let sources = ctx.store.list_active_payment_sources().await?;
    let now_ms = escrow_common::time::now_ms() as i64;

    let mut joins = JoinSet::new();
    for source in sources {
        let ctx = Arc::clone(ctx);
        joins.spawn(async move {
            if let Err(e) = run_sync_cycle(&ctx, &source, now_ms).await {
                error!("sync cycle failed for payment source {}: {e}", source.id);
            }
        });
    }
    while joins.join_next().await.is_some() {}
    Ok(())
}

async fn run_dispatch_tick(ctx: &Arc<DispatcherContext>, locks: &Arc<DispatcherLocks>) -> anyhow::Result<()> {
    let sources = ctx.store.list_active_payment_sources().await?;
    let now_ms = escrow_common::time::now_ms() as i64;

    let mut joins = JoinSet::new();
    for (name, run) in DISPATCHERS {
        let ctx = Arc::clone(ctx);
        let locks = Arc::clone(locks);
        let sources = sources.clone();
        let name = *name;
        let run = *run;
        joins.spawn(async move {
            let Some((_, mutex)) = locks.locks.iter().find(|(n, _)| *n == name) else {
                return;
            };
            let Ok(_guard) = mutex.try_lock() else {
                warn!("dispatcher {name} still running from the previous tick, skipping");
                return;
            };
            for source in &sources {
                match run(&ctx, source.id, now_ms).await {
                    Ok(0) => {}
                    Ok(n) => info!("dispatcher {name} processed {n} row(s) for payment source {}", source.id),
                    Err(e) => error!("dispatcher {name} failed for payment source {}: {e}", source.id),
                }
            }
        });
    }
    while joins.join_next().await.is_some() {}
    Ok(())
}
