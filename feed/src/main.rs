//! TickerFeed Binary
//!
//! Polls bid/ask tickers for a set of currency pairs from one rate provider.

mod config;
mod metrics;
mod poller;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use tickerfeed_common::Currency;
use tickerfeed_exchanges::{ExchangeCaches, ReqwestUpstream};

use crate::config::FeedConfig;
use crate::poller::Feed;

#[derive(Parser, Debug)]
#[command(name = "tickerfeed")]
#[command(about = "Poll currency tickers through the exchange coordinators")]
struct Args {
    /// Rate provider (openexchangerates, currencybeacon, exchangeratehost, yadio)
    #[arg(short, long)]
    exchange: Option<String>,

    /// Base currency
    #[arg(short, long)]
    base: Option<String>,

    /// Quote currency, repeatable
    #[arg(short, long = "quote")]
    quotes: Vec<String>,

    /// Seconds between rounds
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Rounds to run (0 = until Ctrl+C)
    #[arg(long)]
    rounds: Option<u64>,

    /// Concurrent callers per pair per round
    #[arg(long)]
    concurrency: Option<usize>,

    /// Extra provider query parameter as name=value, repeatable
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Emit JSON logs
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply(self, config: &mut FeedConfig) -> anyhow::Result<()> {
        if let Some(exchange) = self.exchange {
            config.exchange = exchange.parse()?;
        }
        if let Some(base) = self.base {
            config.base = Currency::new(base);
        }
        if !self.quotes.is_empty() {
            config.quotes = self.quotes.into_iter().map(Currency::new).collect();
        }
        if let Some(secs) = self.interval_secs {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        for (name, value) in self.params {
            config.set_param(name, value);
        }
        Ok(())
    }
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected name=value, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let fmt_layer = if args.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(fmt_layer)
        .init();

    let mut config = FeedConfig::from_env();
    args.apply(&mut config)?;
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let instance_id = format!("tickerfeed-{}", uuid::Uuid::new_v4());
    info!(
        instance_id = %instance_id,
        exchange = %config.exchange,
        base = %config.base,
        quotes = config.quotes.len(),
        interval_secs = config.poll_interval.as_secs(),
        "Starting TickerFeed"
    );

    let mut feed = Feed::new(
        &config,
        Arc::new(ReqwestUpstream::new()),
        ExchangeCaches::in_memory(),
    )?;

    let mut round = 0u64;
    loop {
        round += 1;
        let summary = feed.run_round().await;
        info!(
            round,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Round complete"
        );

        if config.rounds > 0 && round >= config.rounds {
            break;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(config.poll_interval) => {}
        }
    }

    feed.log_summary();
    info!(instance_id = %instance_id, rounds = round, "TickerFeed stopped");
    Ok(())
}
