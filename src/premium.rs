// src/premium.rs
use alloy::primitives::I256;

use crate::config::{EngineConfig, PremiumConvention};
use crate::error::{Result, RiskError};
use crate::fixed_point as fp;
use crate::metrics;
use crate::snapshot::{MarketSnapshot, MarketState};
use crate::types::{PremiumRate, Side};

pub struct PremiumRateEngine {
    pub cfg: EngineConfig,
}

impl PremiumRateEngine {
    pub fn new(cfg: EngineConfig) -> Self { Self { cfg } }

    /// Instantaneous premium rate. `index_price_x96` is only read by the
    /// index-relative convention.
    pub fn compute<S: MarketSnapshot + ?Sized>(
        &self,
        snapshot: &S,
        index_price_x96: Option<I256>,
    ) -> Result<PremiumRate> {
        let res = snapshot
            .to_state(&self.cfg.constants)
            .and_then(|state| self.compute_state(&state, index_price_x96));
        metrics::observe("premium", self.cfg.variant.as_str(), &res);
        res
    }

    pub fn compute_state(&self, state: &MarketState, index_price_x96: Option<I256>) -> Result<PremiumRate> {
        let stored = state.premium_rate_x96;
        let premium = match self.cfg.premium_convention() {
            PremiumConvention::SideSigned => match state.side {
                Side::Long => fp::neg(stored)?,
                Side::Short => stored,
            },
            PremiumConvention::IndexRelative => {
                let basis = state
                    .basis_index_price_x96
                    .ok_or_else(|| RiskError::malformed("price_state.basis_index_price_x96", "missing"))?;
                match index_price_x96 {
                    Some(index) if !index.is_zero() && !stored.is_zero() => fp::mul_div_up(stored, basis, index)?,
                    _ => I256::ZERO,
                }
            }
        };
        tracing::trace!(variant = self.cfg.variant.as_str(), %stored, %premium, "premium rate");
        Ok(PremiumRate { premium_rate_x96: premium, premium_rate: fp::x96_to_decimal(premium)? })
    }
}
