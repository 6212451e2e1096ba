// src/types.rs
use alloy::primitives::I256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

pub const SIDE_LONG: u8 = 1;
pub const SIDE_SHORT: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn flip(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    pub fn is_long(self) -> bool {
        self == Side::Long
    }

    pub fn is_short(self) -> bool {
        !self.is_long()
    }
}

impl TryFrom<u8> for Side {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            SIDE_LONG => Ok(Side::Long),
            SIDE_SHORT => Ok(Side::Short),
            other => Err(other),
        }
    }
}

/// One breakpoint of the price impact curve. Vertex 0 is always `(0, 0)`.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceVertex {
    pub index: usize,
    #[serde_as(as = "DisplayFromStr")]
    pub size: I256,           // token decimals
    #[serde_as(as = "DisplayFromStr")]
    pub premium_rate_x96: I256,
}

impl PriceVertex {
    pub const ORIGIN: PriceVertex = PriceVertex { index: 0, size: I256::ZERO, premium_rate_x96: I256::ZERO };
}

/// Configured vertex, rates in basis points of the divisor.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VertexConfig {
    pub id: usize,
    #[serde_as(as = "DisplayFromStr")]
    pub balance_rate: I256,
    #[serde_as(as = "DisplayFromStr")]
    pub premium_rate: I256,
}

#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceRange {
    #[serde_as(as = "DisplayFromStr")]
    pub left: I256,
    #[serde_as(as = "DisplayFromStr")]
    pub right: I256,
}

/// One rung of the synthesized order book.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepthLevel {
    pub premium_rate_range_x96: PriceRange,
    pub market_price_range_x96: PriceRange,
    #[serde_as(as = "DisplayFromStr")]
    pub trade_price_x96: I256,
    pub trade_price: Decimal,
    #[serde_as(as = "DisplayFromStr")]
    pub size_scaled: I256,
    pub size: Decimal,
    #[serde_as(as = "DisplayFromStr")]
    pub total_scaled: I256, // cumulative size up to and including this level
    pub total: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Depth {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundingRate {
    #[serde_as(as = "DisplayFromStr")]
    pub funding_rate_x96: I256,
    pub funding_rate: Decimal,    // per adjustment interval
    #[serde_as(as = "DisplayFromStr")]
    pub premium_rate_avg_x96: I256,
    pub sample_count: u64,        // samples counted in the average
    pub epoch_start: u64,         // unix secs of the epoch the samples belong to
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PremiumRate {
    #[serde_as(as = "DisplayFromStr")]
    pub premium_rate_x96: I256,
    pub premium_rate: Decimal,
}
