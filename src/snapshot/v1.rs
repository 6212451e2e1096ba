// src/snapshot/v1.rs
//! Pool payload as served by the v1 subgraph (camelCase GraphQL).
use serde::{Deserialize, Serialize};

use super::{funding_inputs, ordinal, required, FundingInputs, MarketSnapshot, MarketState, WireNumber};
use crate::config::ProtocolConstants;
use crate::error::{Result, RiskError};
use crate::types::{PriceVertex, VertexConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    #[serde(default)]
    pub id: String,
    pub token: Token,
    pub price_state: PriceState,
    pub global_liquidity_position: GlobalLiquidityPosition,
    #[serde(default)]
    pub global_position: Option<GlobalPosition>,
    #[serde(default)]
    pub global_funding_rate_sample: Option<GlobalFundingRateSample>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    pub interest_rate: WireNumber,
    pub max_funding_rate: WireNumber,
    pub max_price_impact_liquidity: WireNumber,
    #[serde(default)]
    pub vertices: Vec<TokenVertex>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenVertex {
    pub id: String,
    pub balance_rate: WireNumber,
    pub premium_rate: WireNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceState {
    pub premium_rate_x96: WireNumber,
    pub index_price_used_x96: WireNumber,
    pub pending_vertex_index: WireNumber,
    #[serde(default)]
    pub liquidation_buffer_net_sizes: Vec<WireNumber>,
    #[serde(default)]
    pub price_vertices: Vec<PoolPriceVertex>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolPriceVertex {
    pub id: String,
    pub size: WireNumber,
    pub premium_rate_x96: WireNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalLiquidityPosition {
    pub side: WireNumber,
    pub net_size: WireNumber,
    pub liquidity: WireNumber,
    #[serde(default)]
    pub margin: Option<WireNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalPosition {
    pub last_adjust_funding_rate_time: WireNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalFundingRateSample {
    pub cumulative_premium_rate_x96: WireNumber,
    pub sample_count: WireNumber,
}

impl Pool {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| RiskError::malformed("pool", e.to_string()))
    }
}

impl MarketSnapshot for Pool {
    fn to_state(&self, constants: &ProtocolConstants) -> Result<MarketState> {
        let token = &self.token;
        let ps = &self.price_state;
        let pos = &self.global_liquidity_position;

        let mut price_vertices = ps
            .price_vertices
            .iter()
            .map(|v| {
                Ok(PriceVertex {
                    index: ordinal("priceVertices.id", &v.id)?,
                    size: v.size.scaled("priceVertices.size", constants.token_decimals)?,
                    premium_rate_x96: v.premium_rate_x96.int("priceVertices.premiumRateX96")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        price_vertices.sort_by_key(|v| v.index);

        let mut vertex_configs = token
            .vertices
            .iter()
            .map(|v| {
                Ok(VertexConfig {
                    id: ordinal("vertices.id", &v.id)?,
                    balance_rate: v.balance_rate.int("vertices.balanceRate")?,
                    premium_rate: v.premium_rate.int("vertices.premiumRate")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        vertex_configs.sort_by_key(|v| v.id);

        let funding = funding_inputs(
            &[
                (self.global_position.is_some(), "globalPosition"),
                (self.global_funding_rate_sample.is_some(), "globalFundingRateSample"),
            ],
            || {
                let gp = required(&self.global_position, "globalPosition")?;
                let sample = required(&self.global_funding_rate_sample, "globalFundingRateSample")?;
                Ok(FundingInputs {
                    interest_rate: token.interest_rate.int("token.interestRate")?,
                    max_funding_rate: token.max_funding_rate.int("token.maxFundingRate")?,
                    last_adjust_funding_rate_time: gp
                        .last_adjust_funding_rate_time
                        .u64("globalPosition.lastAdjustFundingRateTime")?,
                    cumulative_premium_rate_x96: sample
                        .cumulative_premium_rate_x96
                        .int("globalFundingRateSample.cumulativePremiumRateX96")?,
                    sample_count: sample.sample_count.u64("globalFundingRateSample.sampleCount")?,
                })
            },
        )?;

        let state = MarketState {
            side: pos.side.side("globalLiquidityPosition.side")?,
            net_size: pos.net_size.scaled("globalLiquidityPosition.netSize", constants.token_decimals)?,
            liquidity: pos.liquidity.scaled("globalLiquidityPosition.liquidity", constants.usd_decimals)?,
            margin: pos
                .margin
                .as_ref()
                .map(|m| m.scaled("globalLiquidityPosition.margin", constants.usd_decimals))
                .transpose()?,
            max_price_impact_liquidity: token.max_price_impact_liquidity.int("token.maxPriceImpactLiquidity")?,
            vertex_configs,
            premium_rate_x96: ps.premium_rate_x96.int("priceState.premiumRateX96")?,
            basis_index_price_x96: None,
            index_price_used_x96: ps.index_price_used_x96.int("priceState.indexPriceUsedX96")?,
            price_vertices,
            pending_vertex_index: ps.pending_vertex_index.usize("priceState.pendingVertexIndex")?,
            liquidation_buffer_net_sizes: ps
                .liquidation_buffer_net_sizes
                .iter()
                .map(|s| s.int("priceState.liquidationBufferNetSizes"))
                .collect::<Result<Vec<_>>>()?,
            funding,
        };
        state.validate()?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;
    use alloy::primitives::I256;

    const POOL: &str = r#"{
        "id": "0xpool",
        "token": {
            "id": "0xtoken",
            "symbol": "ETH",
            "interestRate": 5,
            "maxFundingRate": "100",
            "maxPriceImpactLiquidity": "1000000000000",
            "vertices": [
                {"id": "0xpool:0", "balanceRate": 0, "premiumRate": 0},
                {"id": "0xpool:1", "balanceRate": 100, "premiumRate": 10}
            ]
        },
        "priceState": {
            "premiumRateX96": "1000",
            "indexPriceUsedX96": "79228162514264337593543950336",
            "pendingVertexIndex": 0,
            "liquidationBufferNetSizes": ["0", "7"],
            "priceVertices": [
                {"id": "0xpool:1", "size": "0.5", "premiumRateX96": "2000"},
                {"id": "0xpool:0", "size": "0", "premiumRateX96": "0"}
            ]
        },
        "globalLiquidityPosition": {"side": 1, "netSize": "0.25", "liquidity": "1500.5", "margin": "10"},
        "globalPosition": {"lastAdjustFundingRateTime": "3600"},
        "globalFundingRateSample": {"cumulativePremiumRateX96": "-42", "sampleCount": 3}
    }"#;

    fn i(v: i128) -> I256 {
        I256::try_from(v).unwrap()
    }

    #[test]
    fn parses_subgraph_pool() {
        let pool = Pool::from_json(POOL).unwrap();
        let state = pool.to_state(&ProtocolConstants::default()).unwrap();
        assert_eq!(state.side, Side::Long);
        assert_eq!(state.net_size, i(250_000_000_000_000_000));
        assert_eq!(state.liquidity, i(1_500_500_000));
        assert_eq!(state.margin, Some(i(10_000_000)));
        assert_eq!(state.price_vertices.len(), 2);
        assert_eq!(state.price_vertices[1].size, i(500_000_000_000_000_000));
        assert_eq!(state.price_vertices[1].premium_rate_x96, i(2000));
        assert_eq!(state.vertex_configs[1].balance_rate, i(100));
        assert_eq!(state.liquidation_buffer_net_sizes, vec![i(0), i(7)]);

        let funding = state.funding.unwrap();
        assert_eq!(funding.interest_rate, i(5));
        assert_eq!(funding.last_adjust_funding_rate_time, 3600);
        assert_eq!(funding.cumulative_premium_rate_x96, i(-42));
        assert_eq!(funding.sample_count, 3);
    }

    #[test]
    fn parsing_leaves_snapshot_untouched() {
        let pool = Pool::from_json(POOL).unwrap();
        let before = pool.clone();
        let _ = pool.to_state(&ProtocolConstants::default()).unwrap();
        assert_eq!(pool, before);
    }

    #[test]
    fn reports_malformed_fields() {
        let mut pool = Pool::from_json(POOL).unwrap();
        pool.price_state.premium_rate_x96 = WireNumber::from("not-a-number");
        let err = pool.to_state(&ProtocolConstants::default()).unwrap_err();
        assert!(matches!(err, RiskError::MalformedSnapshot { ref field, .. } if field == "priceState.premiumRateX96"));

        let mut pool = Pool::from_json(POOL).unwrap();
        pool.global_funding_rate_sample = None;
        let err = pool.to_state(&ProtocolConstants::default()).unwrap_err();
        assert_eq!(err, RiskError::malformed("globalFundingRateSample", "missing"));

        let broken = POOL.replace("\"side\": 1", "\"side\": 1.5");
        assert!(matches!(Pool::from_json(&broken), Err(RiskError::MalformedSnapshot { .. })));
    }
}
