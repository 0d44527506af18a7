mod collect;
mod config;
mod send;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use collect::Collectors;
use config::AgentConfig;
use send::Senders;
use std::future::Future;
use std::time::Duration;
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &AgentConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(config.log_directive().parse()?))
        .with_file(config.debug)
        .with_line_number(config.debug)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AgentConfig::parse();
    init_tracing(&config)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cloudsec-agent starting");

    let mut collectors = Collectors::prepare(&config)
        .await
        .context("can't initialise collectors")?;
    let mut senders = Senders::prepare(&config)
        .await
        .context("can't initialise senders")?;
    if collectors.is_empty() {
        tracing::warn!("No collectors enabled, nothing will be collected");
    }
    if senders.is_empty() {
        tracing::warn!("No metrics sink enabled, collected values are discarded");
    }

    tracing::info!(
        period_secs = config.collect_period_secs,
        "Starting collection loop"
    );
    run(&mut collectors, &mut senders, config.collect_period(), signal::ctrl_c()).await;
    tracing::info!("Shutting down gracefully");

    Ok(())
}

/// Collect and send once per `period` until `shutdown` resolves. A shutdown
/// requested during a cycle ends the loop once that cycle is done.
async fn run<F: Future>(
    collectors: &mut Collectors,
    senders: &mut Senders,
    period: Duration,
    shutdown: F,
) {
    tokio::pin!(shutdown);
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let snapshot = collectors.collect().await;
                senders.send(&snapshot, Utc::now().timestamp()).await;
            }
            _ = &mut shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    #[tokio::test]
    async fn should_stop_when_shutdown_already_requested() {
        let mut collectors = Collectors::default();
        let mut senders = Senders::prepare(&parse(&[])).await.unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tx.send(()).unwrap();

        let stopped = timeout(
            Duration::from_secs(5),
            run(&mut collectors, &mut senders, Duration::from_secs(3600), rx),
        )
        .await;
        assert!(stopped.is_ok());
    }

    #[tokio::test]
    async fn should_keep_shutdown_requested_between_cycles() {
        let mut collectors = Collectors::default();
        let mut senders = Senders::prepare(&parse(&[])).await.unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let requester = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(());
        });

        let stopped = timeout(
            Duration::from_secs(5),
            run(&mut collectors, &mut senders, Duration::from_millis(5), rx),
        )
        .await;
        assert!(stopped.is_ok());
        requester.await.unwrap();
    }
}
