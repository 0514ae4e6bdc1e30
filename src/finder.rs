//! Arbitrage opportunity detection.
//!
//! For each pair of live quotes, both leg combinations are evaluated:
//!
//!   Strategy A: buy YES on venue A + NO on venue B
//!   Strategy B: buy NO on venue A + YES on venue B
//!
//! A strategy is a candidate iff both costs are present and
//! `100 − (k_cost + p_cost) ≥ MIN_SPREAD_CENTS`. Both strategies may fire for
//! the same pair in the same tick - they are independent positions.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::types::{AssetClass, LadderLevel, Opportunity, PairQuotes, Strategy, Tier};

// === Match-schedule gate ===

/// Verdict from an external match-schedule verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    /// Both teams found on the upcoming schedule.
    Scheduled,
    /// The match could not be found - skip the pair.
    NotFound,
    /// Verifier unreachable or sport unsupported - allow with a warning.
    Unavailable,
}

/// Optional gate consulted for sports pairs before an opportunity is emitted.
/// The default implementation allows everything.
pub trait MatchGate: Send + Sync {
    fn is_scheduled(&self, team: &str, opponent: &str, sport: &str) -> GateVerdict;
}

/// Pass-through gate.
pub struct AllowAll;

impl MatchGate for AllowAll {
    fn is_scheduled(&self, _team: &str, _opponent: &str, _sport: &str) -> GateVerdict {
        GateVerdict::Scheduled
    }
}

// === Finder ===

pub struct OpportunityFinder {
    min_spread_cents: f64,
    gate: Arc<dyn MatchGate>,
}

impl OpportunityFinder {
    pub fn new(cfg: &Config) -> Self {
        Self {
            min_spread_cents: cfg.min_spread_cents,
            gate: Arc::new(AllowAll),
        }
    }

    pub fn with_gate(cfg: &Config, gate: Arc<dyn MatchGate>) -> Self {
        Self {
            min_spread_cents: cfg.min_spread_cents,
            gate,
        }
    }

    /// Evaluate both strategies for every quoted pair. Returns opportunities
    /// sorted by spread descending (best first).
    pub fn find(&self, quotes: &[PairQuotes]) -> Vec<Opportunity> {
        let mut opportunities = Vec::new();

        for pq in quotes {
            if !self.gate_allows(pq) {
                continue;
            }

            // Strategy A: venue-A YES + venue-B NO
            if let Some(opp) = self.evaluate(
                pq,
                Strategy::A,
                pq.kalshi.yes_ask_cents,
                pq.poly.no_ask_cents,
                pq.kalshi.yes_depth,
                pq.poly.no_depth,
                &pq.poly.no_ladder,
            ) {
                opportunities.push(opp);
            }

            // Strategy B: venue-A NO + venue-B YES
            if let Some(opp) = self.evaluate(
                pq,
                Strategy::B,
                pq.kalshi.no_ask_cents,
                pq.poly.yes_ask_cents,
                pq.kalshi.no_depth,
                pq.poly.yes_depth,
                &pq.poly.yes_ladder,
            ) {
                opportunities.push(opp);
            }
        }

        opportunities.sort_by(|a, b| b.spread_cents.total_cmp(&a.spread_cents));
        opportunities
    }

    fn gate_allows(&self, pq: &PairQuotes) -> bool {
        let km = &pq.pair.kalshi;
        if km.asset_class != AssetClass::Sports {
            return true;
        }
        let (Some(team), Some(opponent), Some(sport)) =
            (km.team.as_deref(), km.opponent.as_deref(), km.sport.as_deref())
        else {
            return true;
        };
        match self.gate.is_scheduled(team, opponent, sport) {
            GateVerdict::Scheduled => true,
            GateVerdict::NotFound => {
                debug!("[FINDER] {} vs {opponent} ({sport}) not on schedule - pair skipped", team);
                false
            }
            GateVerdict::Unavailable => {
                warn!(
                    "[FINDER] could not verify {team} vs {opponent} ({sport}) - allowing",
                );
                true
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate(
        &self,
        pq: &PairQuotes,
        strategy: Strategy,
        k_cost: Option<f64>,
        p_cost: Option<f64>,
        k_depth: Option<f64>,
        p_depth: Option<f64>,
        p_ladder: &[LadderLevel],
    ) -> Option<Opportunity> {
        // Null price = empty side = infinite cost
        let k_cost = k_cost?;
        let p_cost = p_cost?;

        let spread_cents = round4(100.0 - (k_cost + p_cost));
        let tier = Tier::classify(spread_cents, self.min_spread_cents)?;

        let tradeable_units = match (k_depth, p_depth) {
            (Some(k), Some(p)) => Some(k.min(p) as i64),
            (Some(k), None) => Some(k as i64),
            (None, Some(p)) => Some(p as i64),
            (None, None) => None,
        };
        let max_locked_profit_usd = tradeable_units.map(|u| u as f64 * spread_cents / 100.0);

        let now = Utc::now();
        let earlier_close = pq.pair.kalshi.resolution_dt.min(pq.pair.poly.resolution_dt);
        let hours_to_close = ((earlier_close - now).num_seconds() as f64 / 3600.0).max(0.0);

        Some(Opportunity {
            pair: pq.pair.clone(),
            strategy,
            k_cost_cents: k_cost,
            p_cost_cents: p_cost,
            spread_cents,
            tier,
            k_depth,
            p_depth,
            tradeable_units,
            max_locked_profit_usd,
            p_ladder: p_ladder.to_vec(),
            hours_to_close,
            detected_at: now,
        })
    }
}

/// Round to 4 decimal places; cent arithmetic otherwise accumulates float
/// noise right at the tier boundaries.
fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Multi-line log block for a detected opportunity.
pub fn format_opportunity_log(opp: &Opportunity) -> String {
    let km = &opp.pair.kalshi;
    let (k_side, p_side) = match opp.strategy {
        Strategy::A => ("YES", "NO"),
        Strategy::B => ("NO", "YES"),
    };
    let k_depth = opp
        .k_depth
        .map(|d| format!("{d:.0} contracts"))
        .unwrap_or_else(|| "no book data".to_string());
    let p_depth = opp
        .p_depth
        .map(|d| format!("{d:.0} shares"))
        .unwrap_or_else(|| "?".to_string());

    format!(
        "ARB OPPORTUNITY | {} | {} | spread={:.2}c | {:.1}h to close\n\
         \x20 Strategy {}: A-{k_side} + B-{p_side}\n\
         \x20 Cost: A-{k_side}={:.1}c [{k_depth}] + B-{p_side}={:.1}c [{p_depth}] = {:.1}c → profit={:.2}c per $1",
        opp.tier,
        km.label(),
        opp.spread_cents,
        opp.hours_to_close,
        opp.strategy,
        opp.k_cost_cents,
        opp.p_cost_cents,
        opp.k_cost_cents + opp.p_cost_cents,
        opp.spread_cents,
    )
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchedPair, NormalizedMarket, Quote, SportSubtype, Venue};
    use chrono::Duration as ChronoDuration;

    fn market(venue: Venue, id: &str) -> NormalizedMarket {
        NormalizedMarket {
            venue,
            platform_id: id.to_string(),
            asset_class: AssetClass::Sports,
            sport: Some("CS2".to_string()),
            team: Some("m80".to_string()),
            opponent: Some("voca".to_string()),
            sport_subtype: Some(SportSubtype::Series),
            map_number: None,
            crypto_asset: None,
            direction: None,
            threshold: None,
            resolution_dt: Utc::now() + ChronoDuration::hours(3),
            yes_token: format!("{id}-y"),
            no_token: format!("{id}-n"),
            raw_title: "Will M80 win the M80 vs. Voca CS2 match?".to_string(),
        }
    }

    fn pair_quotes(kalshi: Quote, poly: Quote) -> PairQuotes {
        PairQuotes {
            pair: Arc::new(MatchedPair {
                kalshi: market(Venue::Kalshi, "K1"),
                poly: market(Venue::Polymarket, "P1"),
            }),
            kalshi,
            poly,
        }
    }

    fn quote(yes_ask: Option<f64>, no_ask: Option<f64>, depth: f64) -> Quote {
        Quote {
            yes_ask_cents: yes_ask,
            no_ask_cents: no_ask,
            yes_depth: yes_ask.map(|_| depth),
            no_depth: no_ask.map(|_| depth),
            yes_ladder: vec![],
            no_ladder: vec![],
        }
    }

    fn finder(min_spread: f64) -> OpportunityFinder {
        let cfg = Config {
            min_spread_cents: min_spread,
            ..Config::default()
        };
        OpportunityFinder::new(&cfg)
    }

    // =========================================================================
    // Exact arb scenario: A.yes=48, B.no=49, depths (100, 100)
    // =========================================================================

    #[test]
    fn test_exact_arb() {
        let f = finder(0.8);
        let pq = pair_quotes(quote(Some(48.0), Some(60.0), 100.0), quote(Some(60.0), Some(49.0), 100.0));
        let opps = f.find(&[pq]);

        assert_eq!(opps.len(), 1);
        let opp = &opps[0];
        assert_eq!(opp.strategy, Strategy::A);
        assert!((opp.spread_cents - 3.0).abs() < 1e-9);
        assert_eq!(opp.tier, Tier::Low);
        assert_eq!(opp.tradeable_units, Some(100));
        assert!((opp.max_locked_profit_usd.unwrap() - 3.0).abs() < 1e-9);
    }

    // =========================================================================
    // Opportunity invariant: emitted ⇔ k + p + MIN_SPREAD ≤ 100
    // =========================================================================

    #[test]
    fn test_opportunity_invariant_boundary() {
        let f = finder(3.3);

        // k + p = 96.7 → spread exactly 3.3 → emitted
        let pq = pair_quotes(quote(Some(48.0), None, 50.0), quote(None, Some(48.7), 50.0));
        assert_eq!(f.find(&[pq]).len(), 1);

        // k + p = 96.8 → spread 3.2 → not emitted
        let pq = pair_quotes(quote(Some(48.0), None, 50.0), quote(None, Some(48.8), 50.0));
        assert!(f.find(&[pq]).is_empty());
    }

    #[test]
    fn test_null_price_is_infinite_cost() {
        let f = finder(0.8);
        // Venue-B NO side empty: strategy A impossible even at A.yes = 1¢
        let pq = pair_quotes(quote(Some(1.0), None, 10.0), quote(None, None, 0.0));
        assert!(f.find(&[pq]).is_empty());
    }

    #[test]
    fn test_both_strategies_can_fire_same_tick() {
        let f = finder(0.8);
        // Both directions priced to arb simultaneously
        let pq = pair_quotes(
            quote(Some(45.0), Some(45.0), 10.0),
            quote(Some(45.0), Some(45.0), 10.0),
        );
        let opps = f.find(&[pq]);
        assert_eq!(opps.len(), 2);
        let strategies: Vec<Strategy> = opps.iter().map(|o| o.strategy).collect();
        assert!(strategies.contains(&Strategy::A));
        assert!(strategies.contains(&Strategy::B));
    }

    #[test]
    fn test_sorted_by_spread_descending() {
        let f = finder(0.8);
        let small = pair_quotes(quote(Some(49.0), None, 10.0), quote(None, Some(49.0), 10.0));
        let big = pair_quotes(quote(Some(40.0), None, 10.0), quote(None, Some(40.0), 10.0));
        let opps = f.find(&[small, big]);
        assert_eq!(opps.len(), 2);
        assert!(opps[0].spread_cents > opps[1].spread_cents);
    }

    #[test]
    fn test_tradeable_units_min_of_depths() {
        let f = finder(0.8);
        let pq = pair_quotes(quote(Some(40.0), None, 30.0), quote(None, Some(40.0), 12.0));
        let opps = f.find(&[pq]);
        assert_eq!(opps[0].tradeable_units, Some(12));
    }

    // =========================================================================
    // Match gate
    // =========================================================================

    struct DenyAll;
    impl MatchGate for DenyAll {
        fn is_scheduled(&self, _: &str, _: &str, _: &str) -> GateVerdict {
            GateVerdict::NotFound
        }
    }

    #[test]
    fn test_gate_not_found_skips_pair() {
        let cfg = Config {
            min_spread_cents: 0.8,
            ..Config::default()
        };
        let f = OpportunityFinder::with_gate(&cfg, Arc::new(DenyAll));
        let pq = pair_quotes(quote(Some(40.0), None, 10.0), quote(None, Some(40.0), 10.0));
        assert!(f.find(&[pq]).is_empty());
    }

    struct Unavailable;
    impl MatchGate for Unavailable {
        fn is_scheduled(&self, _: &str, _: &str, _: &str) -> GateVerdict {
            GateVerdict::Unavailable
        }
    }

    #[test]
    fn test_gate_unavailable_allows() {
        let cfg = Config {
            min_spread_cents: 0.8,
            ..Config::default()
        };
        let f = OpportunityFinder::with_gate(&cfg, Arc::new(Unavailable));
        let pq = pair_quotes(quote(Some(40.0), None, 10.0), quote(None, Some(40.0), 10.0));
        assert_eq!(f.find(&[pq]).len(), 1);
    }
}
