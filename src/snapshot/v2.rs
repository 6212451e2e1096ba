// src/snapshot/v2.rs
//! Market payload as served by the v2 API server (snake_case REST).
use serde::{Deserialize, Serialize};

use super::{funding_inputs, ordinal, required, FundingInputs, MarketSnapshot, MarketState, WireNumber};
use crate::config::ProtocolConstants;
use crate::error::{Result, RiskError};
use crate::types::{PriceVertex, VertexConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    #[serde(default)]
    pub address: String,
    pub market_config: MarketConfig,
    pub price_state: PriceState,
    pub global_liquidity_position: GlobalLiquidityPosition,
    #[serde(default)]
    pub global_position: Option<GlobalPosition>,
    #[serde(default)]
    pub global_funding_rate_sample: Option<GlobalFundingRateSample>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub price_config: PriceConfig,
    #[serde(default)]
    pub base_config: Option<BaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceConfig {
    pub max_price_impact_liquidity: WireNumber,
    #[serde(default)]
    pub vertices: Vec<ConfigVertex>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigVertex {
    #[serde(default)]
    pub id: Option<String>,
    pub balance_rate: WireNumber,
    pub premium_rate: WireNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseConfig {
    pub interest_rate: WireNumber,
    pub max_funding_rate: WireNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceState {
    pub premium_rate_x96: WireNumber,
    #[serde(default)]
    pub basis_index_price_x96: Option<WireNumber>,
    pub index_price_used_x96: WireNumber,
    pub pending_vertex_index: WireNumber,
    #[serde(default)]
    pub liquidation_buffer_net_sizes: Vec<WireNumber>,
    #[serde(default)]
    pub price_vertices: Vec<MarketPriceVertex>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPriceVertex {
    pub size: WireNumber,
    pub premium_rate_x96: WireNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalLiquidityPosition {
    pub side: WireNumber,
    pub net_size: WireNumber,
    pub liquidity: WireNumber,
    #[serde(default)]
    pub margin: Option<WireNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPosition {
    pub last_adjust_funding_rate_time: WireNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalFundingRateSample {
    pub cumulative_premium_rate_x96: WireNumber,
    pub sample_count: WireNumber,
}

impl Market {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| RiskError::malformed("market", e.to_string()))
    }
}

impl MarketSnapshot for Market {
    fn to_state(&self, constants: &ProtocolConstants) -> Result<MarketState> {
        let price_config = &self.market_config.price_config;
        let ps = &self.price_state;
        let pos = &self.global_liquidity_position;

        // price vertices carry no id, their position is the ordinal
        let price_vertices = ps
            .price_vertices
            .iter()
            .enumerate()
            .map(|(index, v)| {
                Ok(PriceVertex {
                    index,
                    size: v.size.scaled("price_vertices.size", constants.token_decimals)?,
                    premium_rate_x96: v.premium_rate_x96.int("price_vertices.premium_rate_x96")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut vertex_configs = price_config
            .vertices
            .iter()
            .enumerate()
            .map(|(pos, v)| {
                Ok(VertexConfig {
                    id: match &v.id {
                        Some(id) => ordinal("price_config.vertices.id", id)?,
                        None => pos,
                    },
                    balance_rate: v.balance_rate.int("price_config.vertices.balance_rate")?,
                    premium_rate: v.premium_rate.int("price_config.vertices.premium_rate")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        vertex_configs.sort_by_key(|v| v.id);

        let base_config = &self.market_config.base_config;
        let funding = funding_inputs(
            &[
                (base_config.is_some(), "market_config.base_config"),
                (self.global_position.is_some(), "global_position"),
                (self.global_funding_rate_sample.is_some(), "global_funding_rate_sample"),
            ],
            || {
                let base = required(base_config, "market_config.base_config")?;
                let gp = required(&self.global_position, "global_position")?;
                let sample = required(&self.global_funding_rate_sample, "global_funding_rate_sample")?;
                Ok(FundingInputs {
                    interest_rate: base.interest_rate.int("base_config.interest_rate")?,
                    max_funding_rate: base.max_funding_rate.int("base_config.max_funding_rate")?,
                    last_adjust_funding_rate_time: gp
                        .last_adjust_funding_rate_time
                        .u64("global_position.last_adjust_funding_rate_time")?,
                    cumulative_premium_rate_x96: sample
                        .cumulative_premium_rate_x96
                        .int("global_funding_rate_sample.cumulative_premium_rate_x96")?,
                    sample_count: sample.sample_count.u64("global_funding_rate_sample.sample_count")?,
                })
            },
        )?;

        let state = MarketState {
            side: pos.side.side("global_liquidity_position.side")?,
            net_size: pos.net_size.scaled("global_liquidity_position.net_size", constants.token_decimals)?,
            liquidity: pos.liquidity.scaled("global_liquidity_position.liquidity", constants.usd_decimals)?,
            margin: pos
                .margin
                .as_ref()
                .map(|m| m.scaled("global_liquidity_position.margin", constants.usd_decimals))
                .transpose()?,
            max_price_impact_liquidity: price_config
                .max_price_impact_liquidity
                .int("price_config.max_price_impact_liquidity")?,
            vertex_configs,
            premium_rate_x96: ps.premium_rate_x96.int("price_state.premium_rate_x96")?,
            basis_index_price_x96: ps
                .basis_index_price_x96
                .as_ref()
                .map(|p| p.int("price_state.basis_index_price_x96"))
                .transpose()?,
            index_price_used_x96: ps.index_price_used_x96.int("price_state.index_price_used_x96")?,
            price_vertices,
            pending_vertex_index: ps.pending_vertex_index.usize("price_state.pending_vertex_index")?,
            liquidation_buffer_net_sizes: ps
                .liquidation_buffer_net_sizes
                .iter()
                .map(|s| s.int("price_state.liquidation_buffer_net_sizes"))
                .collect::<Result<Vec<_>>>()?,
            funding,
        };
        state.validate()?;
        Ok(state)
    }
}
