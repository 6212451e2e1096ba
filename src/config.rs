// src/config.rs
use alloy::primitives::I256;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use std::path::Path;

use crate::error::{Result, RiskError};
use crate::fixed_point;

/// Contract generation a snapshot comes from. Selected explicitly by the
/// caller, never guessed from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVariant {
    /// Earliest pool SDK: fixed average denominator, no max funding clamp.
    Prototype,
    /// Pool contracts.
    #[default]
    V1,
    /// Market contracts, premium quoted against a basis index price.
    V2,
}

/// Where the funding average's denominator comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvgDenominator {
    /// `8 * n * (n + 1) / 2` for the `n` samples taken so far.
    Formula,
    /// `ProtocolConstants::premium_rate_avg_denominator`.
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumConvention {
    /// Stored premium is a magnitude; negate it when the net side is long.
    SideSigned,
    /// Stored premium is already signed and is rescaled by basis/index price.
    IndexRelative,
}

/// How far forward premium samples are projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingHorizon {
    /// Up to the end of the current funding epoch.
    EpochEnd,
    /// Up to the as-of time.
    AsOf,
}

/// Decimal scale the funding engine reads liquidity in when capping the premium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityScale {
    /// `usd_decimals`, as the pool and market contracts store it.
    Usd,
    /// `token_decimals`, as the earliest SDK parsed it.
    Token,
}

impl ProtocolVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolVariant::Prototype => "prototype",
            ProtocolVariant::V1 => "v1",
            ProtocolVariant::V2 => "v2",
        }
    }

    pub fn denominator(self) -> AvgDenominator {
        match self {
            ProtocolVariant::Prototype => AvgDenominator::Fixed,
            ProtocolVariant::V1 | ProtocolVariant::V2 => AvgDenominator::Formula,
        }
    }

    pub fn clamps_max_funding_rate(self) -> bool {
        !matches!(self, ProtocolVariant::Prototype)
    }

    pub fn premium_convention(self) -> PremiumConvention {
        match self {
            ProtocolVariant::V2 => PremiumConvention::IndexRelative,
            _ => PremiumConvention::SideSigned,
        }
    }

    pub fn horizon(self) -> SamplingHorizon {
        match self {
            ProtocolVariant::Prototype => SamplingHorizon::EpochEnd,
            _ => SamplingHorizon::AsOf,
        }
    }

    pub fn liquidity_scale(self) -> LiquidityScale {
        match self {
            ProtocolVariant::Prototype => LiquidityScale::Token,
            _ => LiquidityScale::Usd,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConstants {
    #[serde(default = "d_bps_divisor")]          pub basis_points_divisor: u64,
    #[serde(default = "d_adjust_interval")]      pub adjust_funding_rate_interval: u64,
    #[serde(default = "d_sample_interval")]      pub sample_premium_rate_interval: u64,
    #[serde(default = "d_avg_denominator")]      pub premium_rate_avg_denominator: u64,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "d_clamp_boundary")]       pub premium_rate_clamp_boundary_x96: I256,
    #[serde(default = "d_token_decimals")]       pub token_decimals: u32,
    #[serde(default = "d_usd_decimals")]         pub usd_decimals: u32,
}
fn d_bps_divisor() -> u64 { 10_000 }
fn d_adjust_interval() -> u64 { 3600 }
fn d_sample_interval() -> u64 { 5 }
fn d_avg_denominator() -> u64 { 8 * (720 * 721 / 2) }
fn d_clamp_boundary() -> I256 {
    // 0.05% of Q96, rounded down
    I256::from_raw(alloy::primitives::U256::from(39_614_081_257_132_168_796_771_975u128))
}
fn d_token_decimals() -> u32 { 18 }
fn d_usd_decimals() -> u32 { 6 }

impl Default for ProtocolConstants {
    fn default() -> Self {
        Self {
            basis_points_divisor: d_bps_divisor(),
            adjust_funding_rate_interval: d_adjust_interval(),
            sample_premium_rate_interval: d_sample_interval(),
            premium_rate_avg_denominator: d_avg_denominator(),
            premium_rate_clamp_boundary_x96: d_clamp_boundary(),
            token_decimals: d_token_decimals(),
            usd_decimals: d_usd_decimals(),
        }
    }
}

impl ProtocolConstants {
    pub fn basis_points_divisor_i256(&self) -> I256 {
        fixed_point::from_u64(self.basis_points_divisor)
    }

    pub fn validate(&self) -> Result<()> {
        if self.basis_points_divisor == 0 {
            return Err(RiskError::Config("basis_points_divisor must be > 0".into()));
        }
        if self.adjust_funding_rate_interval == 0 || self.sample_premium_rate_interval == 0 {
            return Err(RiskError::Config("funding intervals must be > 0".into()));
        }
        if self.premium_rate_avg_denominator == 0 {
            return Err(RiskError::Config("premium_rate_avg_denominator must be > 0".into()));
        }
        if self.premium_rate_clamp_boundary_x96.is_negative() {
            return Err(RiskError::Config("premium_rate_clamp_boundary_x96 must be >= 0".into()));
        }
        Ok(())
    }
}

/// Engine settings. Unset overrides fall back to the variant's behavior.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]                            pub variant: ProtocolVariant,
    #[serde(default)]                            pub constants: ProtocolConstants,
    #[serde(default)]                            pub denominator: Option<AvgDenominator>,
    #[serde(default)]                            pub clamp_max_funding_rate: Option<bool>,
    #[serde(default)]                            pub horizon: Option<SamplingHorizon>,
    #[serde(default)]                            pub liquidity_scale: Option<LiquidityScale>,
}

impl EngineConfig {
    pub fn new(variant: ProtocolVariant) -> Self {
        Self { variant, ..Self::default() }
    }

    pub fn with_constants(mut self, constants: ProtocolConstants) -> Self {
        self.constants = constants;
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: EngineConfig = toml::from_str(s).map_err(|e| RiskError::Config(e.to_string()))?;
        cfg.constants.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RiskError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn denominator(&self) -> AvgDenominator {
        self.denominator.unwrap_or_else(|| self.variant.denominator())
    }

    pub fn clamps_max_funding_rate(&self) -> bool {
        self.clamp_max_funding_rate.unwrap_or_else(|| self.variant.clamps_max_funding_rate())
    }

    pub fn horizon(&self) -> SamplingHorizon {
        self.horizon.unwrap_or_else(|| self.variant.horizon())
    }

    pub fn liquidity_scale(&self) -> LiquidityScale {
        self.liquidity_scale.unwrap_or_else(|| self.variant.liquidity_scale())
    }

    pub fn premium_convention(&self) -> PremiumConvention {
        self.variant.premium_convention()
    }
}
