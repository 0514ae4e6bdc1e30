//! Core domain types: normalized markets, matched pairs, quotes, and
//! opportunities.
//!
//! All prices are in cents (0-100). Quote prices are `Option<f64>` - `None`
//! means an empty book side and is treated as infinite cost, never as zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// === Venue and classification enums ===

/// The two exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    Kalshi,
    Polymarket,
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Venue::Kalshi => write!(f, "KALSHI"),
            Venue::Polymarket => write!(f, "POLYMARKET"),
        }
    }
}

/// Market classification driving which matching criteria apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    Sports,
    Crypto,
}

/// Whether a sports market settles on a single map/game or a full series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SportSubtype {
    Map,
    Series,
}

impl std::fmt::Display for SportSubtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SportSubtype::Map => write!(f, "map"),
            SportSubtype::Series => write!(f, "series"),
        }
    }
}

/// Crypto threshold direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Above,
    Below,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Above => write!(f, "ABOVE"),
            Direction::Below => write!(f, "BELOW"),
        }
    }
}

// === NormalizedMarket ===

/// One tradable binary contract on one venue, reduced to the common model.
///
/// SPORTS rows carry `sport`, `team`, `opponent`, `sport_subtype` (and maybe
/// `map_number`); CRYPTO rows carry `crypto_asset`, `direction`, `threshold`.
/// `(venue, platform_id)` is jointly unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedMarket {
    pub venue: Venue,
    /// Opaque venue-native identifier (venue-A ticker; venue-B condition id,
    /// suffixed per-team for expanded sports rows).
    pub platform_id: String,
    pub asset_class: AssetClass,

    // Sports matching fields
    pub sport: Option<String>,
    pub team: Option<String>,
    pub opponent: Option<String>,
    pub sport_subtype: Option<SportSubtype>,
    pub map_number: Option<u32>,

    // Crypto matching fields
    pub crypto_asset: Option<String>,
    pub direction: Option<Direction>,
    pub threshold: Option<f64>,

    /// UTC instant at which the contract resolves.
    pub resolution_dt: DateTime<Utc>,

    /// Venue-specific handles for the YES and NO sides. On venue A both
    /// collapse to the ticker (one contract, two sides); on venue B they are
    /// two distinct token ids.
    pub yes_token: String,
    pub no_token: String,

    /// Original question text, logging only.
    pub raw_title: String,
}

impl NormalizedMarket {
    /// Short label for log lines.
    pub fn label(&self) -> String {
        match self.asset_class {
            AssetClass::Sports => format!(
                "{} | {} vs {}",
                self.sport.as_deref().unwrap_or("?"),
                self.team.as_deref().unwrap_or("?"),
                self.opponent.as_deref().unwrap_or("?"),
            ),
            AssetClass::Crypto => format!(
                "{} {} ${:.0}",
                self.crypto_asset.as_deref().unwrap_or("?"),
                self.direction.map(|d| d.to_string()).unwrap_or_default(),
                self.threshold.unwrap_or(0.0),
            ),
        }
    }
}

// === MatchedPair ===

/// Exclusive pairing of one venue-A market to one venue-B market confirmed to
/// refer to the same real-world event. Each market appears in at most one pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedPair {
    pub kalshi: NormalizedMarket,
    pub poly: NormalizedMarket,
}

impl MatchedPair {
    /// Cooldown/persistence key: both platform ids joined. Indexed by pair,
    /// not by strategy.
    pub fn key(&self) -> String {
        format!("{}|{}", self.kalshi.platform_id, self.poly.platform_id)
    }
}

// === Quotes ===

/// One ask-ladder level: `(price_cents, size)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LadderLevel {
    pub price_cents: f64,
    pub size: f64,
}

/// Top-of-book plus ask ladder for both sides of one market on one venue.
///
/// Ladders are canonical best-first (ascending price), whatever order the
/// venue returned them in.
#[derive(Debug, Clone, Default)]
pub struct Quote {
    pub yes_ask_cents: Option<f64>,
    pub no_ask_cents: Option<f64>,
    /// Size available at the best ask, per side.
    pub yes_depth: Option<f64>,
    pub no_depth: Option<f64>,
    pub yes_ladder: Vec<LadderLevel>,
    pub no_ladder: Vec<LadderLevel>,
}

/// Both venues' quotes for one matched pair, one tick.
#[derive(Debug, Clone)]
pub struct PairQuotes {
    pub pair: Arc<MatchedPair>,
    pub kalshi: Quote,
    pub poly: Quote,
}

// === Opportunities ===

/// The two leg combinations.
///
/// Strategy A: buy YES on venue A + NO on venue B.
/// Strategy B: buy NO on venue A + YES on venue B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    A,
    B,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::A => write!(f, "A"),
            Strategy::B => write!(f, "B"),
        }
    }
}

/// Spread tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    UltraHigh,
    High,
    Mid,
    Low,
}

impl Tier {
    /// Classify a spread. Returns `None` below the configured minimum.
    pub fn classify(spread_cents: f64, min_spread_cents: f64) -> Option<Tier> {
        if spread_cents < min_spread_cents {
            None
        } else if spread_cents >= 8.0 {
            Some(Tier::UltraHigh)
        } else if spread_cents >= 5.0 {
            Some(Tier::High)
        } else if spread_cents >= 4.0 {
            Some(Tier::Mid)
        } else {
            Some(Tier::Low)
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::UltraHigh => write!(f, "Ultra High"),
            Tier::High => write!(f, "High"),
            Tier::Mid => write!(f, "Mid"),
            Tier::Low => write!(f, "Low"),
        }
    }
}

/// A confirmed cross-venue arbitrage opportunity for one strategy.
///
/// Derived per-tick from [`PairQuotes`]; never stored across ticks.
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub pair: Arc<MatchedPair>,
    pub strategy: Strategy,
    /// Venue-A leg cost in cents.
    pub k_cost_cents: f64,
    /// Venue-B leg cost in cents.
    pub p_cost_cents: f64,
    /// `100 − (k_cost + p_cost)`: locked profit per share in cents.
    pub spread_cents: f64,
    pub tier: Tier,
    /// Depth at best ask on the venue-A leg (contracts), when known.
    pub k_depth: Option<f64>,
    /// Depth at best ask on the venue-B leg (shares), when known.
    pub p_depth: Option<f64>,
    /// `min(k_depth, p_depth)` where both are known.
    pub tradeable_units: Option<i64>,
    /// `tradeable_units × spread / 100`.
    pub max_locked_profit_usd: Option<f64>,
    /// Venue-B ask ladder for the leg being bought, best-first.
    pub p_ladder: Vec<LadderLevel>,
    /// Hours until the earlier of the two close times.
    pub hours_to_close: f64,
    pub detected_at: DateTime<Utc>,
}

impl Opportunity {
    /// Venue-A order side for this strategy.
    pub fn kalshi_side(&self) -> Side {
        match self.strategy {
            Strategy::A => Side::Yes,
            Strategy::B => Side::No,
        }
    }

    /// Venue-B token id for the leg this strategy buys.
    pub fn poly_token_id(&self) -> &str {
        match self.strategy {
            Strategy::A => &self.pair.poly.no_token,
            Strategy::B => &self.pair.poly.yes_token,
        }
    }
}

/// YES/NO side of a binary contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "yes",
            Side::No => "no",
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Tier classification - boundaries from the tier table
    // =========================================================================

    #[test]
    fn test_tier_boundaries() {
        let min = 3.3;
        assert_eq!(Tier::classify(8.0, min), Some(Tier::UltraHigh));
        assert_eq!(Tier::classify(12.5, min), Some(Tier::UltraHigh));
        assert_eq!(Tier::classify(7.99, min), Some(Tier::High));
        assert_eq!(Tier::classify(5.0, min), Some(Tier::High));
        assert_eq!(Tier::classify(4.99, min), Some(Tier::Mid));
        assert_eq!(Tier::classify(4.0, min), Some(Tier::Mid));
        assert_eq!(Tier::classify(3.99, min), Some(Tier::Low));
        assert_eq!(Tier::classify(3.3, min), Some(Tier::Low));
        assert_eq!(Tier::classify(3.29, min), None);
        assert_eq!(Tier::classify(-1.0, min), None);
    }

    #[test]
    fn test_tier_respects_configured_minimum() {
        // Low tier widens when the minimum is configured below 3.3
        assert_eq!(Tier::classify(1.0, 0.8), Some(Tier::Low));
        assert_eq!(Tier::classify(0.5, 0.8), None);
    }

    // =========================================================================
    // Strategy / side mapping
    // =========================================================================

    fn dummy_market(venue: Venue, id: &str) -> NormalizedMarket {
        NormalizedMarket {
            venue,
            platform_id: id.to_string(),
            asset_class: AssetClass::Sports,
            sport: Some("CS2".into()),
            team: Some("m80".into()),
            opponent: Some("voca".into()),
            sport_subtype: Some(SportSubtype::Series),
            map_number: None,
            crypto_asset: None,
            direction: None,
            threshold: None,
            resolution_dt: Utc::now(),
            yes_token: format!("{id}-yes"),
            no_token: format!("{id}-no"),
            raw_title: "Will M80 win the M80 vs. Voca CS2 match?".into(),
        }
    }

    #[test]
    fn test_strategy_leg_mapping() {
        let pair = Arc::new(MatchedPair {
            kalshi: dummy_market(Venue::Kalshi, "KXCS2GAME-X"),
            poly: dummy_market(Venue::Polymarket, "cond1"),
        });

        let opp = Opportunity {
            pair: pair.clone(),
            strategy: Strategy::A,
            k_cost_cents: 48.0,
            p_cost_cents: 49.0,
            spread_cents: 3.0,
            tier: Tier::Low,
            k_depth: None,
            p_depth: None,
            tradeable_units: None,
            max_locked_profit_usd: None,
            p_ladder: vec![],
            hours_to_close: 2.0,
            detected_at: Utc::now(),
        };

        // Strategy A buys YES on venue A and the NO token on venue B
        assert_eq!(opp.kalshi_side(), Side::Yes);
        assert_eq!(opp.poly_token_id(), "cond1-no");

        let opp_b = Opportunity {
            strategy: Strategy::B,
            ..opp
        };
        assert_eq!(opp_b.kalshi_side(), Side::No);
        assert_eq!(opp_b.poly_token_id(), "cond1-yes");
    }

    #[test]
    fn test_pair_key_contains_both_ids() {
        let pair = MatchedPair {
            kalshi: dummy_market(Venue::Kalshi, "K1"),
            poly: dummy_market(Venue::Polymarket, "P1"),
        };
        assert_eq!(pair.key(), "K1|P1");
    }
}
