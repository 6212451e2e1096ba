// src/funding.rs
//! Predicted funding rate from the premium samples of the current epoch.
use alloy::primitives::I256;
use chrono::{DateTime, Utc};

use crate::config::{AvgDenominator, EngineConfig, LiquidityScale, PremiumConvention, SamplingHorizon};
use crate::error::{Result, RiskError};
use crate::fixed_point::{self as fp, Q96};
use crate::metrics;
use crate::snapshot::{MarketSnapshot, MarketState};
use crate::types::{FundingRate, Side};

pub struct FundingRateEngine {
    pub cfg: EngineConfig,
}

impl FundingRateEngine {
    pub fn new(cfg: EngineConfig) -> Self { Self { cfg } }

    pub fn compute<S: MarketSnapshot + ?Sized>(&self, snapshot: &S, as_of: DateTime<Utc>) -> Result<FundingRate> {
        let res = snapshot
            .to_state(&self.cfg.constants)
            .and_then(|state| self.compute_state(&state, as_of));
        metrics::observe("funding", self.cfg.variant.as_str(), &res);
        res
    }

    pub fn compute_state(&self, state: &MarketState, as_of: DateTime<Utc>) -> Result<FundingRate> {
        let now = u64::try_from(as_of.timestamp())
            .map_err(|_| RiskError::InvalidInput(format!("as-of {as_of} is before the unix epoch")))?;
        let inputs = state
            .funding
            .as_ref()
            .ok_or_else(|| RiskError::malformed("globalFundingRateSample", "missing"))?;
        let k = &self.cfg.constants;

        // stale epochs are skipped, not replayed
        let mut last_adjust = inputs.last_adjust_funding_rate_time;
        let mut cumulative = inputs.cumulative_premium_rate_x96;
        let mut sample_count = inputs.sample_count;
        if last_adjust.saturating_add(k.adjust_funding_rate_interval) < now {
            last_adjust = now - now % k.adjust_funding_rate_interval;
            cumulative = I256::ZERO;
            sample_count = 0;
        }
        let horizon = match self.cfg.horizon() {
            SamplingHorizon::EpochEnd => last_adjust.saturating_add(k.adjust_funding_rate_interval),
            SamplingHorizon::AsOf => now,
        };

        let last_sampling = sample_count
            .checked_mul(k.sample_premium_rate_interval)
            .and_then(|t| t.checked_add(last_adjust))
            .ok_or_else(|| RiskError::malformed("globalFundingRateSample.sampleCount", "sampling time overflows"))?;
        let time_delta = horizon.saturating_sub(last_sampling);

        let premium = self.sampled_premium(state)?;
        let delta = time_delta / k.sample_premium_rate_interval;
        let too_many = || RiskError::malformed("globalFundingRateSample.sampleCount", "sample count overflows");
        let after = sample_count.checked_add(delta).ok_or_else(too_many)?;
        let weight = sample_count.checked_add(1).and_then(|c| c.checked_add(after)).ok_or_else(too_many)?;

        // arithmetic series over the new samples, weighted by position
        let series = fp::mul(fp::from_u64(weight), fp::from_u64(delta))? >> 1usize;
        cumulative = fp::add(cumulative, fp::mul(premium, series)?)?;

        let avg = match self.cfg.denominator() {
            AvgDenominator::Formula if after == 0 => I256::ZERO,
            AvgDenominator::Formula => {
                let n = fp::from_u64(after);
                let d = fp::mul(fp::from_u64(8), fp::mul(n, fp::add(n, I256::ONE)?)? >> 1usize)?;
                fp::signed_ceil_div(cumulative, d)?
            }
            AvgDenominator::Fixed => fp::signed_ceil_div(cumulative, fp::from_u64(k.premium_rate_avg_denominator))?,
        };

        let bpd = k.basis_points_divisor_i256();
        let boundary = k.premium_rate_clamp_boundary_x96;
        let interest_x96 = fp::mul_div_up(inputs.interest_rate, Q96, bpd)?;
        let rate_delta = clamp(fp::sub(interest_x96, avg)?, boundary)?;
        let mut funding = fp::add(avg, rate_delta)?;

        if self.cfg.clamps_max_funding_rate() {
            let max_x96 = fp::mul_div_up(inputs.max_funding_rate, Q96, bpd)?;
            funding = clamp(funding, max_x96)?;
        }

        tracing::debug!(
            variant = self.cfg.variant.as_str(),
            epoch_start = last_adjust,
            samples = after,
            %premium,
            %avg,
            %funding,
            "funding rate"
        );

        Ok(FundingRate {
            funding_rate_x96: funding,
            funding_rate: fp::x96_to_decimal(funding)?,
            premium_rate_avg_x96: avg,
            sample_count: after,
            epoch_start: last_adjust,
        })
    }

    /// Premium of one sample: capped by the max price impact liquidity, and
    /// signed against the long side when the stored value is a magnitude.
    fn sampled_premium(&self, state: &MarketState) -> Result<I256> {
        let k = &self.cfg.constants;
        let liquidity = match self.cfg.liquidity_scale() {
            LiquidityScale::Usd => state.liquidity,
            LiquidityScale::Token => fp::rescale(state.liquidity, k.usd_decimals, k.token_decimals)?,
        };
        let mut premium = state.premium_rate_x96;
        if liquidity > state.max_price_impact_liquidity {
            premium = fp::mul_div_up(premium, state.max_price_impact_liquidity, liquidity)?;
        }
        if self.cfg.premium_convention() == PremiumConvention::SideSigned && state.side == Side::Long {
            premium = fp::neg(premium)?;
        }
        Ok(premium)
    }
}

/// Clamps `v` into `[-bound, bound]`. A negative bound pins to it.
fn clamp(v: I256, bound: I256) -> Result<I256> {
    Ok(fp::max(fp::min(v, bound), fp::neg(bound)?))
}
