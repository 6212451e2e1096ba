// src/depth.rs
//! Order book depth reconstructed from the price impact curve.
//!
//! The curve is a list of price vertices `(size, premium)` starting at
//! `(0, 0)`. The net position sits somewhere on it. Walking forward from the
//! net size gives the depth still available on the position's own side.
//! Walking back to the origin gives the size the other side can take out of
//! the position, and past the origin the other side continues on its own
//! curve, which may have to be recomputed against current liquidity.
use alloy::primitives::I256;
use std::borrow::Cow;

use crate::config::{EngineConfig, ProtocolConstants};
use crate::error::{Result, RiskError};
use crate::fixed_point::{self as fp, Q96};
use crate::metrics;
use crate::snapshot::{MarketSnapshot, MarketState};
use crate::types::{Depth, DepthLevel, PriceRange, PriceVertex, Side, VertexConfig};

pub struct DepthEngine {
    pub cfg: EngineConfig,
}

impl DepthEngine {
    pub fn new(cfg: EngineConfig) -> Self { Self { cfg } }

    pub fn compute<S: MarketSnapshot + ?Sized>(&self, snapshot: &S, index_price_x96: I256) -> Result<Depth> {
        let res = snapshot
            .to_state(&self.cfg.constants)
            .and_then(|state| self.compute_state(&state, index_price_x96));
        metrics::observe("depth", self.cfg.variant.as_str(), &res);
        res
    }

    pub fn compute_state(&self, state: &MarketState, index_price_x96: I256) -> Result<Depth> {
        let k = &self.cfg.constants;
        let vertices = &state.price_vertices;
        let current_index = search_current_index(vertices, state.premium_rate_x96);
        let opposite = opposite_side_vertices(state, current_index, k)?;

        let mut own = Walk::new(k, index_price_x96, state.side);
        own.forward(vertices, current_index.max(1), state.net_size, state.premium_rate_x96)?;

        let mut other = Walk::new(k, index_price_x96, state.side);
        other.used(vertices, current_index, state.net_size, state.premium_rate_x96, &state.liquidation_buffer_net_sizes)?;
        other.side = state.side.flip();
        other.forward(&opposite, 0, I256::ZERO, I256::ZERO)?;

        tracing::debug!(
            variant = self.cfg.variant.as_str(),
            current_index,
            pending = state.pending_vertex_index,
            recomputed = matches!(opposite, Cow::Owned(_)),
            own = own.levels.len(),
            opposite = other.levels.len(),
            "depth"
        );

        Ok(match state.side {
            Side::Long => Depth { bids: own.levels, asks: other.levels },
            Side::Short => Depth { bids: other.levels, asks: own.levels },
        })
    }
}

/// First `i >= 1` with `v[i-1].premium < premium <= v[i].premium`, else 0.
pub fn search_current_index(vertices: &[PriceVertex], premium_rate_x96: I256) -> usize {
    vertices
        .windows(2)
        .position(|w| w[0].premium_rate_x96 < premium_rate_x96 && premium_rate_x96 <= w[1].premium_rate_x96)
        .map_or(0, |i| i + 1)
}

/// Vertex of the curve for the given liquidity and index price.
pub fn price_vertex(
    config: &VertexConfig,
    liquidity: I256,
    index_price_x96: I256,
    basis_points_divisor: I256,
) -> Result<PriceVertex> {
    let balance_rate_x96 = fp::mul_div_down(Q96, config.balance_rate, basis_points_divisor)?;
    Ok(PriceVertex {
        index: config.id,
        size: fp::mul_div_down(balance_rate_x96, liquidity, index_price_x96)?,
        premium_rate_x96: fp::mul_div_down(Q96, config.premium_rate, basis_points_divisor)?,
    })
}

/// Curve seen by the other side of the book. Vertices up to the pending index
/// are rebuilt from the current liquidity; the rest are kept unless keeping
/// them would break monotonicity.
fn opposite_side_vertices<'a>(
    state: &'a MarketState,
    current_index: usize,
    k: &ProtocolConstants,
) -> Result<Cow<'a, [PriceVertex]>> {
    let vertices = &state.price_vertices;
    let pending = state.pending_vertex_index;
    if current_index == 0 || pending == 0 {
        return Ok(Cow::Borrowed(vertices));
    }
    if pending >= vertices.len() {
        return Err(RiskError::malformed("pendingVertexIndex", format!("{pending} beyond {} vertices", vertices.len())));
    }

    let bpd = k.basis_points_divisor_i256();
    let liquidity = fp::min(state.liquidity, state.max_price_impact_liquidity);
    let rebuild = |i: usize| -> Result<PriceVertex> {
        let config = state
            .vertex_configs
            .get(i)
            .ok_or_else(|| RiskError::malformed("vertices", format!("no config for vertex {i}")))?;
        price_vertex(config, liquidity, state.index_price_used_x96, bpd)
    };

    let mut out = Vec::with_capacity(vertices.len());
    out.push(vertices[0]);
    for i in 1..=pending {
        out.push(rebuild(i)?);
    }
    if let (Some(prev), Some(next)) = (out.last().copied(), vertices.get(pending + 1)) {
        if next.size <= prev.size || next.premium_rate_x96 <= prev.premium_rate_x96 {
            tracing::trace!(pending, "carried vertex not monotonic, rebuilding the rest");
            for i in pending + 1..vertices.len() {
                out.push(rebuild(i)?);
            }
        }
    }
    out.extend_from_slice(&vertices[out.len()..]);
    Ok(Cow::Owned(out))
}

/// Accumulates the levels of one side of the book.
struct Walk<'k> {
    k: &'k ProtocolConstants,
    index_price_x96: I256,
    side: Side,
    total: I256,
    levels: Vec<DepthLevel>,
}

impl<'k> Walk<'k> {
    fn new(k: &'k ProtocolConstants, index_price_x96: I256, side: Side) -> Self {
        Self { k, index_price_x96, side, total: I256::ZERO, levels: Vec::new() }
    }

    /// Depth from `start` to the end of the curve.
    fn forward(&mut self, vertices: &[PriceVertex], start: usize, mut net_size: I256, mut premium: I256) -> Result<()> {
        for right in vertices.iter().skip(start) {
            self.push(premium, right.premium_rate_x96, fp::sub(right.size, net_size)?)?;
            premium = right.premium_rate_x96;
            net_size = right.size;
        }
        Ok(())
    }

    /// Size already taken by the net position, from `current_index` back to
    /// the origin. Buffered liquidation size sits flat at each left vertex.
    fn used(
        &mut self,
        vertices: &[PriceVertex],
        current_index: usize,
        mut net_size: I256,
        mut premium: I256,
        buffers: &[I256],
    ) -> Result<()> {
        for i in (1..=current_index).rev() {
            let left = vertices[i - 1];
            let buffered = buffers.get(i).copied().unwrap_or(I256::ZERO);
            self.push(left.premium_rate_x96, left.premium_rate_x96, buffered)?;
            self.push(premium, left.premium_rate_x96, fp::sub(net_size, left.size)?)?;
            premium = left.premium_rate_x96;
            net_size = left.size;
        }
        Ok(())
    }

    fn push(&mut self, left: I256, right: I256, size: I256) -> Result<()> {
        if size <= I256::ZERO {
            return Ok(());
        }
        self.total = fp::add(self.total, size)?;
        let market_left = self.market_price(left)?;
        let market_right = self.market_price(right)?;
        let trade_price_x96 = fp::add(market_left, market_right)? / fp::from_u64(2);
        let level = DepthLevel {
            premium_rate_range_x96: PriceRange { left: self.normalize(left)?, right: self.normalize(right)? },
            market_price_range_x96: PriceRange { left: market_left, right: market_right },
            trade_price_x96,
            trade_price: fp::to_price_decimal(trade_price_x96, self.k.token_decimals, self.k.usd_decimals)?,
            size_scaled: size,
            size: fp::to_human_decimal(size, self.k.token_decimals)?,
            total_scaled: self.total,
            total: fp::to_human_decimal(self.total, self.k.token_decimals)?,
        };
        self.levels.push(level);
        Ok(())
    }

    /// Premium pushes longs below the index price and shorts above it.
    fn market_price(&self, premium: I256) -> Result<I256> {
        let factor = match self.side {
            Side::Long => fp::sub(Q96, premium)?,
            Side::Short => fp::add(Q96, premium)?,
        };
        fp::mul_div_down(self.index_price_x96, factor, Q96)
    }

    fn normalize(&self, premium: I256) -> Result<I256> {
        match self.side {
            Side::Long => fp::neg(premium),
            Side::Short => Ok(premium),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolVariant;
    use crate::fixed_point::from_u64;
    use proptest::prelude::*;

    fn i(v: &str) -> I256 {
        I256::from_dec_str(v).unwrap()
    }

    fn bps(rate: u64) -> I256 {
        Q96 * from_u64(rate) / from_u64(10_000)
    }

    fn vertex(index: usize, size: u64, premium: I256) -> PriceVertex {
        PriceVertex { index, size: from_u64(size), premium_rate_x96: premium }
    }

    fn config(id: usize, balance_rate: u64, premium_rate: u64) -> VertexConfig {
        VertexConfig { id, balance_rate: from_u64(balance_rate), premium_rate: from_u64(premium_rate) }
    }

    fn curve() -> Vec<PriceVertex> {
        vec![PriceVertex::ORIGIN, vertex(1, 100, bps(10)), vertex(2, 300, bps(30))]
    }

    fn state(side: Side, net_size: u64, premium: I256) -> MarketState {
        MarketState {
            side,
            net_size: from_u64(net_size),
            liquidity: I256::ZERO,
            margin: None,
            max_price_impact_liquidity: from_u64(1_000_000_000),
            vertex_configs: vec![],
            premium_rate_x96: premium,
            basis_index_price_x96: None,
            index_price_used_x96: Q96,
            price_vertices: curve(),
            pending_vertex_index: 0,
            liquidation_buffer_net_sizes: vec![],
            funding: None,
        }
    }

    fn engine() -> DepthEngine {
        DepthEngine::new(EngineConfig::new(ProtocolVariant::V1))
    }

    fn sizes(levels: &[DepthLevel]) -> Vec<(I256, I256)> {
        levels.iter().map(|l| (l.size_scaled, l.total_scaled)).collect()
    }

    fn pairs(v: &[(u64, u64)]) -> Vec<(I256, I256)> {
        v.iter().map(|(s, t)| (from_u64(*s), from_u64(*t))).collect()
    }

    #[test]
    fn current_index_is_left_open_right_closed() {
        let v = curve();
        let p1 = bps(10);
        assert_eq!(p1.to_string(), "79228162514264337593543950");
        assert_eq!(search_current_index(&v, I256::ZERO), 0);
        assert_eq!(search_current_index(&v, p1), 1);
        assert_eq!(search_current_index(&v, p1 + I256::ONE), 2);
        assert_eq!(search_current_index(&v, bps(30) + I256::ONE), 0);
        assert_eq!(search_current_index(&v, p1 / from_u64(2)), 1);
        assert_eq!(search_current_index(&[], p1), 0);
    }

    #[test]
    fn long_position_mid_curve() {
        let mut s = state(Side::Long, 50, bps(10) / from_u64(2));
        s.liquidation_buffer_net_sizes = vec![I256::ZERO, from_u64(7), I256::ZERO];
        let index = Q96 * from_u64(2);
        let depth = engine().compute(&s, index).unwrap();

        assert_eq!(sizes(&depth.bids), pairs(&[(50, 50), (200, 250)]));
        let first = &depth.bids[0];
        assert_eq!(first.premium_rate_range_x96.left, i("-39614081257132168796771975"));
        assert_eq!(first.premium_rate_range_x96.right, -bps(10));
        assert_eq!(first.market_price_range_x96.left, i("158377096866014410849494356722"));
        assert_eq!(first.market_price_range_x96.right, i("158297868703500146511900812772"));
        assert_eq!(first.trade_price_x96, i("158337482784757278680697584747"));
        assert_eq!(depth.bids[1].market_price_range_x96.right, i("157980956053443089161526636970"));
        assert_eq!(depth.bids[1].trade_price_x96, i("158139412378471617836713724871"));

        assert_eq!(sizes(&depth.asks), pairs(&[(7, 7), (50, 57), (100, 157), (200, 357)]));
        let buffered = &depth.asks[0];
        assert_eq!(buffered.premium_rate_range_x96, PriceRange { left: I256::ZERO, right: I256::ZERO });
        assert_eq!(buffered.trade_price_x96, index);
        assert_eq!(depth.asks[1].premium_rate_range_x96.left, i("-39614081257132168796771975"));
        assert_eq!(depth.asks[1].trade_price_x96, i("158416710947271543018291128697"));
        assert_eq!(depth.asks[2].premium_rate_range_x96, PriceRange { left: I256::ZERO, right: bps(10) });
        assert_eq!(depth.asks[2].trade_price_x96, i("158535553191042939524681444622"));
        assert_eq!(depth.asks[3].trade_price_x96, i("158773237678585732537462076473"));
    }

    #[test]
    fn rebuilds_opposite_curve_up_to_pending() {
        let mut s = state(Side::Short, 150, bps(20));
        s.pending_vertex_index = 1;
        s.liquidity = from_u64(20_000);
        s.vertex_configs = vec![config(0, 0, 0), config(1, 200, 10), config(2, 500, 30)];
        let k = ProtocolConstants::default();

        // carried vertex 2 (300) is not above the rebuilt vertex 1 (399)
        let out = opposite_side_vertices(&s, 2, &k).unwrap();
        assert_eq!(&out[..], &[PriceVertex::ORIGIN, vertex(1, 399, bps(10)), vertex(2, 999, bps(30))]);

        s.liquidity = from_u64(50_000);
        s.max_price_impact_liquidity = from_u64(20_000);
        assert_eq!(opposite_side_vertices(&s, 2, &k).unwrap()[2], vertex(2, 999, bps(30)));

        s.liquidity = from_u64(10_000);
        s.vertex_configs[1] = config(1, 100, 10);
        let out = opposite_side_vertices(&s, 2, &k).unwrap();
        assert_eq!(&out[..], &[PriceVertex::ORIGIN, vertex(1, 99, bps(10)), vertex(2, 300, bps(30))]);

        assert!(matches!(opposite_side_vertices(&s, 0, &k).unwrap(), Cow::Borrowed(_)));
        s.vertex_configs.truncate(1);
        assert!(matches!(opposite_side_vertices(&s, 2, &k), Err(RiskError::MalformedSnapshot { .. })));
    }

    #[test]
    fn short_position_with_pending_vertex() {
        let mut s = state(Side::Short, 150, bps(20));
        s.pending_vertex_index = 1;
        s.liquidity = from_u64(20_000);
        s.vertex_configs = vec![config(0, 0, 0), config(1, 200, 10), config(2, 500, 30)];
        let depth = engine().compute(&s, Q96 * from_u64(2)).unwrap();

        assert_eq!(sizes(&depth.asks), pairs(&[(150, 150)]));
        let ask = &depth.asks[0];
        assert_eq!(ask.premium_rate_range_x96, PriceRange { left: bps(20), right: bps(30) });
        assert_eq!(ask.market_price_range_x96.left, i("158773237678585732537462076472"));
        assert_eq!(ask.market_price_range_x96.right, i("158931694003614261212649164374"));
        assert_eq!(ask.trade_price_x96, i("158852465841099996875055620423"));

        assert_eq!(sizes(&depth.bids), pairs(&[(50, 50), (100, 150), (399, 549), (600, 1149)]));
        assert_eq!(depth.bids[0].premium_rate_range_x96, PriceRange { left: bps(20), right: bps(10) });
        assert_eq!(depth.bids[0].trade_price_x96, i("158694009516071468199868532522"));
        assert_eq!(depth.bids[1].trade_price_x96, i("158535553191042939524681444622"));
        assert_eq!(depth.bids[2].premium_rate_range_x96, PriceRange { left: I256::ZERO, right: -bps(10) });
        assert_eq!(depth.bids[2].trade_price_x96, i("158377096866014410849494356722"));
        assert_eq!(depth.bids[3].trade_price_x96, i("158139412378471617836713724871"));
    }

    #[test]
    fn empty_curve_has_no_depth() {
        let mut s = state(Side::Long, 0, I256::ZERO);
        s.price_vertices.clear();
        assert_eq!(engine().compute(&s, Q96).unwrap(), Depth::default());
        s.price_vertices = vec![PriceVertex::ORIGIN];
        assert_eq!(engine().compute(&s, Q96).unwrap(), Depth::default());
    }

    #[test]
    fn human_projection_of_levels() {
        let mut s = state(Side::Long, 0, I256::ZERO);
        s.price_vertices = vec![
            PriceVertex::ORIGIN,
            PriceVertex { index: 1, size: i("1500000000000000000"), premium_rate_x96: bps(10) },
        ];
        let depth = engine().compute(&s, Q96).unwrap();
        assert_eq!(depth.bids.len(), 1);
        assert_eq!(depth.bids[0].size.to_string(), "1.5");
        assert_eq!(depth.asks[0].total.to_string(), "1.5");
    }

    fn arb_state() -> impl Strategy<Value = MarketState> {
        (
            prop::collection::vec((1u64..1_000, 1u64..50), 1..6),
            any::<bool>(),
            0u64..5_000,
            0u64..1_000,
            prop::collection::vec(0u64..10, 0..6),
        )
            .prop_map(|(steps, long, net, premium_bps, buffers)| {
                let mut vertices = vec![PriceVertex::ORIGIN];
                let (mut size, mut rate) = (0u64, 0u64);
                for (n, (ds, dr)) in steps.into_iter().enumerate() {
                    size += ds;
                    rate += dr;
                    vertices.push(vertex(n + 1, size, bps(rate)));
                }
                let mut s = state(if long { Side::Long } else { Side::Short }, net, bps(premium_bps));
                s.price_vertices = vertices;
                s.liquidation_buffer_net_sizes = buffers.into_iter().map(from_u64).collect();
                s
            })
    }

    proptest! {
        #[test]
        fn totals_strictly_increase(s in arb_state()) {
            let depth = engine().compute(&s, Q96 * from_u64(1500)).unwrap();
            for side in [&depth.bids, &depth.asks] {
                let mut last = I256::ZERO;
                for level in side.iter() {
                    prop_assert!(level.size_scaled > I256::ZERO);
                    prop_assert!(level.total_scaled > last);
                    prop_assert_eq!(level.total_scaled, last + level.size_scaled);
                    last = level.total_scaled;
                }
            }
        }
    }
}
