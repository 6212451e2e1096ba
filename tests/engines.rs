use alloy::primitives::I256;
use chrono::{DateTime, Utc};
use equation_risk::{
    config::{EngineConfig, ProtocolVariant},
    fixed_point::{from_u64, Q96},
    providers::{file::JsonFileProvider, SnapshotProvider},
    snapshot::MarketSnapshot,
    DepthEngine, FundingRateEngine, PremiumRateEngine, RiskError, Side,
};
use std::path::PathBuf;

fn fixtures() -> JsonFileProvider {
    JsonFileProvider::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures"))
}

fn config(variant: ProtocolVariant) -> EngineConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/engine.toml");
    let mut cfg = EngineConfig::load(path).unwrap();
    cfg.variant = variant;
    cfg
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn i(v: &str) -> I256 {
    I256::from_dec_str(v).unwrap()
}

#[tokio::test]
async fn v1_pool_end_to_end() {
    let pool = fixtures().load_pool("pool_v1").await.unwrap();
    let cfg = config(ProtocolVariant::V1);
    let state = pool.to_state(&cfg.constants).unwrap();
    assert_eq!(state.side, Side::Long);
    assert_eq!(state.net_size, from_u64(50));

    let funding = FundingRateEngine::new(cfg.clone()).compute(&pool, at(4600)).unwrap();
    assert_eq!(funding.sample_count, 1);
    assert_eq!(funding.premium_rate_avg_x96, i("-4951760157141521099596497"));
    assert_eq!(funding.funding_rate_x96, i("7922816251426433759354396"));

    let premium = PremiumRateEngine::new(cfg.clone()).compute(&pool, None).unwrap();
    assert_eq!(premium.premium_rate_x96, i("-39614081257132168796771975"));

    let depth = DepthEngine::new(cfg).compute(&pool, Q96 * from_u64(2)).unwrap();
    let bids: Vec<_> = depth.bids.iter().map(|l| l.size_scaled).collect();
    let asks: Vec<_> = depth.asks.iter().map(|l| l.total_scaled).collect();
    assert_eq!(bids, vec![from_u64(50), from_u64(200)]);
    assert_eq!(asks, vec![from_u64(7), from_u64(57), from_u64(157), from_u64(357)]);
    assert_eq!(depth.bids[0].trade_price_x96, i("158337482784757278680697584747"));
}

#[tokio::test]
async fn v2_market_end_to_end() {
    let market = fixtures().load_market("market_v2.json").await.unwrap();
    let cfg = config(ProtocolVariant::V2);

    let funding = FundingRateEngine::new(cfg.clone()).compute(&market, at(5400)).unwrap();
    assert_eq!(funding.sample_count, 2);
    assert_eq!(funding.premium_rate_avg_x96, i("19807040628566084398385988"));
    assert_eq!(funding.funding_rate_x96, i("39614081257132168796771976"));

    let premium = PremiumRateEngine::new(cfg.clone()).compute(&market, Some(Q96 * from_u64(2))).unwrap();
    assert_eq!(premium.premium_rate_x96, i("79228162514264337593543950"));
    let none = PremiumRateEngine::new(cfg.clone()).compute(&market, None).unwrap();
    assert_eq!(none.premium_rate_x96, I256::ZERO);

    let depth = DepthEngine::new(cfg).compute(&market, Q96 * from_u64(2)).unwrap();
    let asks: Vec<_> = depth.asks.iter().map(|l| l.size_scaled).collect();
    let bids: Vec<_> = depth.bids.iter().map(|l| l.total_scaled).collect();
    assert_eq!(asks, vec![from_u64(150)]);
    assert_eq!(bids, vec![from_u64(50), from_u64(150), from_u64(549), from_u64(1149)]);
    assert_eq!(depth.asks[0].trade_price_x96, i("158852465841099996875055620423"));
}

#[tokio::test]
async fn variant_is_chosen_by_caller() {
    let pool = fixtures().load_pool("pool_v1").await.unwrap();
    // same pool read with the v2 convention has no basis price
    let err = PremiumRateEngine::new(config(ProtocolVariant::V2)).compute(&pool, Some(Q96)).unwrap_err();
    assert!(matches!(err, RiskError::MalformedSnapshot { .. }));

    let proto = FundingRateEngine::new(config(ProtocolVariant::Prototype)).compute(&pool, at(4600)).unwrap();
    let v1 = FundingRateEngine::new(config(ProtocolVariant::V1)).compute(&pool, at(4600)).unwrap();
    assert_eq!(proto.sample_count, 4);
    assert_ne!(proto.premium_rate_avg_x96, v1.premium_rate_avg_x96);
}

#[tokio::test]
async fn outputs_serialize_as_strings() {
    let market = fixtures().load_market("market_v2").await.unwrap();
    let depth = DepthEngine::new(config(ProtocolVariant::V2)).compute(&market, Q96).unwrap();
    let json = serde_json::to_value(&depth).unwrap();
    assert_eq!(json["asks"][0]["size_scaled"], "150");
    assert!(json["asks"][0]["trade_price_x96"].is_string());
}
