// src/bin/risk_probe.rs
use alloy::primitives::I256;
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use equation_risk::{
    config::{EngineConfig, ProtocolVariant},
    depth::DepthEngine,
    funding::FundingRateEngine,
    premium::PremiumRateEngine,
    providers::{file::JsonFileProvider, SnapshotProvider},
    snapshot::MarketSnapshot,
};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Calc {
    Funding,
    Premium,
    Depth,
    All,
}

/// Print funding rate, premium rate and depth for a saved pool or market.
#[derive(Debug, Parser)]
struct Args {
    /// Snapshot JSON (v1 subgraph pool or v2 API market)
    #[arg(long)]
    snapshot: PathBuf,
    #[arg(long, value_enum)]
    variant: ProtocolVariant,
    /// TOML engine config; its `variant` is replaced by `--variant`
    #[arg(long)]
    config: Option<PathBuf>,
    /// Unix seconds, defaults to now
    #[arg(long)]
    as_of: Option<i64>,
    #[arg(long)]
    index_price_x96: Option<String>,
    #[arg(value_enum, default_value = "all")]
    calc: Calc,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    cfg.variant = args.variant;

    let as_of = match args.as_of {
        Some(secs) => DateTime::<Utc>::from_timestamp(secs, 0).context("--as-of out of range")?,
        None => Utc::now(),
    };
    let index_price = args
        .index_price_x96
        .as_deref()
        .map(I256::from_dec_str)
        .transpose()
        .context("--index-price-x96 is not an integer")?;

    let provider = JsonFileProvider::default();
    let key = args.snapshot.to_string_lossy();
    let snapshot: Box<dyn MarketSnapshot> = match cfg.variant {
        ProtocolVariant::Prototype | ProtocolVariant::V1 => Box::new(provider.load_pool(&key).await?),
        ProtocolVariant::V2 => Box::new(provider.load_market(&key).await?),
    };

    let wants = |c: Calc| args.calc == c || args.calc == Calc::All;
    let mut out = Map::new();
    if wants(Calc::Funding) {
        let rate = FundingRateEngine::new(cfg.clone()).compute(&*snapshot, as_of)?;
        out.insert("funding".into(), serde_json::to_value(rate)?);
    }
    if wants(Calc::Premium) {
        let rate = PremiumRateEngine::new(cfg.clone()).compute(&*snapshot, index_price)?;
        out.insert("premium".into(), serde_json::to_value(rate)?);
    }
    if wants(Calc::Depth) {
        match index_price {
            Some(price) => {
                let depth = DepthEngine::new(cfg.clone()).compute(&*snapshot, price)?;
                out.insert("depth".into(), serde_json::to_value(depth)?);
            }
            None if args.calc == Calc::Depth => bail!("depth needs --index-price-x96"),
            None => tracing::warn!("no --index-price-x96, skipping depth"),
        }
    }

    println!("{}", serde_json::to_string_pretty(&json!({
        "variant": cfg.variant,
        "as_of": as_of.timestamp(),
        "results": Value::Object(out),
    }))?);
    Ok(())
}
