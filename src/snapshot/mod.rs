// src/snapshot/mod.rs
//! Point-in-time views of a pool (v1) or market (v2), and the typed
//! [`MarketState`] every engine reads.
use alloy::primitives::I256;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::config::ProtocolConstants;
use crate::error::{Result, RiskError};
use crate::fixed_point::to_scaled_int;
use crate::types::{PriceVertex, Side, VertexConfig};

pub mod v1;
pub mod v2;

/// Anything that can be turned into a [`MarketState`].
pub trait MarketSnapshot {
    /// Parses every field the engines need. Fails on the first field that is
    /// missing or not a number; the snapshot itself is left untouched.
    fn to_state(&self, constants: &ProtocolConstants) -> Result<MarketState>;
}

/// Funding sampler inputs. Absent from v2 payloads that do not carry them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingInputs {
    pub interest_rate: I256,
    pub max_funding_rate: I256,
    pub last_adjust_funding_rate_time: u64,
    pub cumulative_premium_rate_x96: I256,
    pub sample_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketState {
    pub side: Side,
    pub net_size: I256,   // token decimals
    pub liquidity: I256,  // usd decimals
    pub margin: Option<I256>,
    pub max_price_impact_liquidity: I256,
    pub vertex_configs: Vec<VertexConfig>,
    pub premium_rate_x96: I256,
    pub basis_index_price_x96: Option<I256>,
    pub index_price_used_x96: I256,
    pub price_vertices: Vec<PriceVertex>,
    pub pending_vertex_index: usize,
    pub liquidation_buffer_net_sizes: Vec<I256>,
    pub funding: Option<FundingInputs>,
}

impl MarketState {
    /// Structural checks shared by both snapshot generations.
    pub fn validate(&self) -> Result<()> {
        for (pos, v) in self.price_vertices.iter().enumerate() {
            if v.index != pos {
                return Err(RiskError::malformed("priceVertices", format!("missing vertex {pos}")));
            }
        }
        if let Some(first) = self.price_vertices.first() {
            if !first.size.is_zero() || !first.premium_rate_x96.is_zero() {
                return Err(RiskError::malformed("priceVertices", "vertex 0 must be (0, 0)"));
            }
        }
        for (pos, v) in self.vertex_configs.iter().enumerate() {
            if v.id != pos {
                return Err(RiskError::malformed("vertices", format!("missing vertex config {pos}")));
            }
        }
        if self.pending_vertex_index > 0 && self.pending_vertex_index >= self.price_vertices.len() {
            return Err(RiskError::malformed(
                "pendingVertexIndex",
                format!("{} beyond {} vertices", self.pending_vertex_index, self.price_vertices.len()),
            ));
        }
        if self.liquidity.is_negative() || self.net_size.is_negative() {
            return Err(RiskError::malformed("globalLiquidityPosition", "negative liquidity or net size"));
        }
        Ok(())
    }
}

impl MarketSnapshot for MarketState {
    fn to_state(&self, _constants: &ProtocolConstants) -> Result<MarketState> {
        self.validate()?;
        Ok(self.clone())
    }
}

/// A numeric field as it arrives on the wire: a JSON string or a JSON
/// integer. Floats are rejected at deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireNumber {
    Integer(i64),
    Text(String),
}

impl WireNumber {
    fn text(&self) -> Cow<'_, str> {
        match self {
            WireNumber::Integer(v) => Cow::Owned(v.to_string()),
            WireNumber::Text(s) => Cow::Borrowed(s.trim()),
        }
    }

    /// Integer already in its final scale (`*X96`, rates, raw sizes).
    pub fn int(&self, field: &str) -> Result<I256> {
        I256::from_dec_str(&self.text()).map_err(|e| RiskError::malformed(field, e.to_string()))
    }

    /// Decimal string scaled by `10^decimals`.
    pub fn scaled(&self, field: &str, decimals: u32) -> Result<I256> {
        to_scaled_int(&self.text(), decimals).map_err(|e| RiskError::malformed(field, e.to_string()))
    }

    pub fn u64(&self, field: &str) -> Result<u64> {
        self.text().parse::<u64>().map_err(|e| RiskError::malformed(field, e.to_string()))
    }

    pub fn usize(&self, field: &str) -> Result<usize> {
        self.text().parse::<usize>().map_err(|e| RiskError::malformed(field, e.to_string()))
    }

    pub fn side(&self, field: &str) -> Result<Side> {
        let code = self.text().parse::<u8>().map_err(|e| RiskError::malformed(field, e.to_string()))?;
        Side::try_from(code).map_err(|c| RiskError::malformed(field, format!("unknown side {c}")))
    }
}

impl From<&str> for WireNumber {
    fn from(s: &str) -> Self {
        WireNumber::Text(s.to_string())
    }
}

impl From<i64> for WireNumber {
    fn from(v: i64) -> Self {
        WireNumber::Integer(v)
    }
}

/// Vertex ids look like `"<pool or market address>:<ordinal>"`.
pub(crate) fn ordinal(field: &str, id: &str) -> Result<usize> {
    let tail = id.rsplit_once(':').map_or(id, |(_, n)| n);
    tail.parse::<usize>()
        .map_err(|_| RiskError::malformed(field, format!("bad vertex id {id:?}")))
}

pub(crate) fn required<'a, T>(value: &'a Option<T>, field: &str) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| RiskError::malformed(field, "missing"))
}

/// Collects funding inputs when the payload has all of them, and none when it
/// has none. A partial set is malformed.
pub(crate) fn funding_inputs(
    parts: &[(bool, &str)],
    build: impl FnOnce() -> Result<FundingInputs>,
) -> Result<Option<FundingInputs>> {
    match parts.iter().filter(|(present, _)| *present).count() {
        0 => Ok(None),
        n if n == parts.len() => build().map(Some),
        _ => {
            let (_, missing) = parts.iter().find(|(present, _)| !*present).copied().unwrap_or((false, "funding"));
            Err(RiskError::malformed(missing, "missing"))
        }
    }
}
