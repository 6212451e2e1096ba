// src/lib.rs
pub mod types;
pub mod error;
pub mod fixed_point;
pub mod config;
pub mod metrics;
pub mod snapshot;
pub mod providers;
pub mod funding;
pub mod premium;
pub mod depth;

pub use config::{EngineConfig, ProtocolConstants, ProtocolVariant};
pub use depth::DepthEngine;
pub use error::{Result, RiskError};
pub use funding::FundingRateEngine;
pub use premium::PremiumRateEngine;
pub use snapshot::{MarketSnapshot, MarketState};
pub use types::{Depth, DepthLevel, FundingRate, PremiumRate, Side};
