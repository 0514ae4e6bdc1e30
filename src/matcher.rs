//! Cross-venue market matching.
//!
//! Strict matching - every applicable criterion must pass or the candidate is
//! rejected, and each market lands in at most one pair.
//!
//! Sports (6 criteria): equal sport, equal team, equal opponent, resolution
//! times within tolerance, equal subtype, and equal map number when both rows
//! carry one. Crypto (4 criteria, feature-flagged off by default): equal
//! asset, equal direction, times within tolerance, exact equal threshold.

use chrono::Duration as ChronoDuration;
use rustc_hash::FxHashMap;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::Config;
use crate::types::{AssetClass, MatchedPair, NormalizedMarket, SportSubtype};

pub struct Matcher {
    sports_tolerance: ChronoDuration,
    crypto_tolerance: ChronoDuration,
    crypto_enabled: bool,
}

impl Matcher {
    pub fn new(cfg: &Config) -> Self {
        Self {
            sports_tolerance: ChronoDuration::hours(cfg.sports_time_tolerance_hours),
            crypto_tolerance: ChronoDuration::hours(cfg.crypto_time_tolerance_hours),
            crypto_enabled: cfg.crypto_matching_enabled,
        }
    }

    /// Join the two venues' normalized markets into matched pairs.
    pub fn find_matches(
        &self,
        kalshi: &[NormalizedMarket],
        poly: &[NormalizedMarket],
    ) -> Vec<MatchedPair> {
        let mut pairs = Vec::new();
        let mut used_kalshi: HashSet<&str> = HashSet::new();
        let mut used_poly: HashSet<&str> = HashSet::new();

        let sports = self.match_sports(kalshi, poly, &mut used_kalshi, &mut used_poly);
        let sports_count = sports.len();
        pairs.extend(sports);

        let crypto_count = if self.crypto_enabled {
            let crypto = self.match_crypto(kalshi, poly, &mut used_kalshi, &mut used_poly);
            let n = crypto.len();
            pairs.extend(crypto);
            n
        } else {
            0
        };

        info!(
            "[MATCH] K:{} × P:{} → {} pairs ({} sports, {} crypto)",
            kalshi.len(),
            poly.len(),
            pairs.len(),
            sports_count,
            crypto_count,
        );
        pairs
    }

    fn match_sports<'a>(
        &self,
        kalshi: &'a [NormalizedMarket],
        poly: &'a [NormalizedMarket],
        used_kalshi: &mut HashSet<&'a str>,
        used_poly: &mut HashSet<&'a str>,
    ) -> Vec<MatchedPair> {
        // Bucket venue-A rows by (sport, team, subtype); the remaining
        // criteria are checked per candidate.
        type SportsKey<'k> = (&'k str, &'k str, SportSubtype);
        let mut buckets: FxHashMap<SportsKey<'a>, Vec<&'a NormalizedMarket>> =
            FxHashMap::default();
        for km in kalshi
            .iter()
            .filter(|m| m.asset_class == AssetClass::Sports)
        {
            let (Some(sport), Some(team), Some(subtype)) =
                (km.sport.as_deref(), km.team.as_deref(), km.sport_subtype)
            else {
                continue;
            };
            buckets.entry((sport, team, subtype)).or_default().push(km);
        }

        let mut pairs = Vec::new();
        let mut rejected: FxHashMap<&'static str, usize> = FxHashMap::default();

        for pm in poly.iter().filter(|m| m.asset_class == AssetClass::Sports) {
            if used_poly.contains(pm.platform_id.as_str()) {
                continue;
            }
            let (Some(sport), Some(team), Some(subtype)) =
                (pm.sport.as_deref(), pm.team.as_deref(), pm.sport_subtype)
            else {
                continue;
            };
            let Some(candidates) = buckets.get(&(sport, team, subtype)) else {
                continue;
            };

            for km in candidates {
                if used_kalshi.contains(km.platform_id.as_str()) {
                    continue;
                }
                if let Some(reason) = self.check_sports(km, pm) {
                    *rejected.entry(reason).or_insert(0) += 1;
                    continue;
                }

                info!(
                    "[MATCH] SPORTS | {} | closes ~{} UTC\n  A: {} ({})\n  B: {} ({})",
                    km.label(),
                    km.resolution_dt.format("%Y-%m-%d %H:%M"),
                    km.platform_id,
                    truncate(&km.raw_title, 80),
                    pm.platform_id,
                    truncate(&pm.raw_title, 80),
                );
                pairs.push(MatchedPair {
                    kalshi: (*km).clone(),
                    poly: pm.clone(),
                });
                used_kalshi.insert(km.platform_id.as_str());
                used_poly.insert(pm.platform_id.as_str());
                break;
            }
        }

        log_rejections("sports", &rejected);
        pairs
    }

    fn match_crypto<'a>(
        &self,
        kalshi: &'a [NormalizedMarket],
        poly: &'a [NormalizedMarket],
        used_kalshi: &mut HashSet<&'a str>,
        used_poly: &mut HashSet<&'a str>,
    ) -> Vec<MatchedPair> {
        let mut buckets: FxHashMap<(&'a str, &'a str), Vec<&'a NormalizedMarket>> =
            FxHashMap::default();
        for km in kalshi
            .iter()
            .filter(|m| m.asset_class == AssetClass::Crypto)
        {
            let (Some(asset), Some(direction)) = (km.crypto_asset.as_deref(), km.direction) else {
                continue;
            };
            let dir = match direction {
                crate::types::Direction::Above => "ABOVE",
                crate::types::Direction::Below => "BELOW",
            };
            buckets.entry((asset, dir)).or_default().push(km);
        }

        let mut pairs = Vec::new();
        let mut rejected: FxHashMap<&'static str, usize> = FxHashMap::default();

        for pm in poly.iter().filter(|m| m.asset_class == AssetClass::Crypto) {
            if used_poly.contains(pm.platform_id.as_str()) {
                continue;
            }
            let (Some(asset), Some(direction)) = (pm.crypto_asset.as_deref(), pm.direction) else {
                continue;
            };
            let dir = match direction {
                crate::types::Direction::Above => "ABOVE",
                crate::types::Direction::Below => "BELOW",
            };
            let Some(candidates) = buckets.get(&(asset, dir)) else {
                continue;
            };

            for km in candidates {
                if used_kalshi.contains(km.platform_id.as_str()) {
                    continue;
                }
                if let Some(reason) = self.check_crypto(km, pm) {
                    *rejected.entry(reason).or_insert(0) += 1;
                    continue;
                }

                info!(
                    "[MATCH] CRYPTO | {} | closes ~{} UTC",
                    km.label(),
                    km.resolution_dt.format("%Y-%m-%d %H:%M"),
                );
                pairs.push(MatchedPair {
                    kalshi: (*km).clone(),
                    poly: pm.clone(),
                });
                used_kalshi.insert(km.platform_id.as_str());
                used_poly.insert(pm.platform_id.as_str());
                break;
            }
        }

        log_rejections("crypto", &rejected);
        pairs
    }

    /// Remaining sports criteria after the bucket lookup (sport, team, and
    /// subtype already agree). Returns the first failing criterion.
    fn check_sports(
        &self,
        km: &NormalizedMarket,
        pm: &NormalizedMarket,
    ) -> Option<&'static str> {
        // Opponent must agree when both sides know it; YES/NO-outcome venue-B
        // rows may not carry one, and the criterion is then not applied.
        if let (Some(ko), Some(po)) = (km.opponent.as_deref(), pm.opponent.as_deref()) {
            if ko != po {
                return Some("opponent");
            }
        }
        let gap = (km.resolution_dt - pm.resolution_dt).abs();
        if gap > self.sports_tolerance {
            return Some("date");
        }
        // Map number must agree when both rows carry one
        if let (Some(k_map), Some(p_map)) = (km.map_number, pm.map_number) {
            if k_map != p_map {
                return Some("map_number");
            }
        }
        None
    }

    /// Remaining crypto criteria after the bucket lookup (asset and direction
    /// already agree).
    fn check_crypto(
        &self,
        km: &NormalizedMarket,
        pm: &NormalizedMarket,
    ) -> Option<&'static str> {
        let gap = (km.resolution_dt - pm.resolution_dt).abs();
        if gap > self.crypto_tolerance {
            return Some("date");
        }
        // Thresholds parse from decimal text through the same path on both
        // venues, so exact equality is the criterion.
        if km.threshold != pm.threshold {
            return Some("threshold");
        }
        None
    }
}

fn log_rejections(kind: &str, rejected: &FxHashMap<&'static str, usize>) {
    if rejected.is_empty() {
        return;
    }
    let summary = rejected
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");
    debug!("[MATCH] {kind} rejections: {summary}");
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, Venue};
    use chrono::{TimeZone, Utc};

    fn cfg() -> Config {
        Config::default()
    }

    fn sports_market(
        venue: Venue,
        id: &str,
        team: &str,
        opponent: &str,
        hour: u32,
        subtype: SportSubtype,
        map_number: Option<u32>,
    ) -> NormalizedMarket {
        NormalizedMarket {
            venue,
            platform_id: id.to_string(),
            asset_class: AssetClass::Sports,
            sport: Some("CS2".to_string()),
            team: Some(team.to_string()),
            opponent: Some(opponent.to_string()),
            sport_subtype: Some(subtype),
            map_number,
            crypto_asset: None,
            direction: None,
            threshold: None,
            resolution_dt: Utc.with_ymd_and_hms(2026, 2, 22, hour, 0, 0).unwrap(),
            yes_token: format!("{id}-y"),
            no_token: format!("{id}-n"),
            raw_title: format!("Will {team} win the {team} vs. {opponent} CS2 match?"),
        }
    }

    fn crypto_market(venue: Venue, id: &str, threshold: f64, hour: u32) -> NormalizedMarket {
        NormalizedMarket {
            venue,
            platform_id: id.to_string(),
            asset_class: AssetClass::Crypto,
            sport: None,
            team: None,
            opponent: None,
            sport_subtype: None,
            map_number: None,
            crypto_asset: Some("BTC".to_string()),
            direction: Some(Direction::Above),
            threshold: Some(threshold),
            resolution_dt: Utc.with_ymd_and_hms(2026, 2, 21, hour, 0, 0).unwrap(),
            yes_token: format!("{id}-y"),
            no_token: format!("{id}-n"),
            raw_title: format!("BTC above ${threshold}?"),
        }
    }

    // =========================================================================
    // Sports matching
    // =========================================================================

    #[test]
    fn test_sports_match_all_criteria() {
        let m = Matcher::new(&cfg());
        let k = vec![sports_market(Venue::Kalshi, "K1", "m80", "voca", 12, SportSubtype::Series, None)];
        let p = vec![sports_market(Venue::Polymarket, "P1", "m80", "voca", 14, SportSubtype::Series, None)];
        let pairs = m.find_matches(&k, &p);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].kalshi.platform_id, "K1");
        assert_eq!(pairs[0].poly.platform_id, "P1");
    }

    #[test]
    fn test_sports_reject_opponent_mismatch() {
        // A: drx vs t1; B: drx vs geng - same date/subtype, no pair
        let m = Matcher::new(&cfg());
        let k = vec![sports_market(Venue::Kalshi, "K1", "drx", "t1", 12, SportSubtype::Series, None)];
        let p = vec![sports_market(Venue::Polymarket, "P1", "drx", "geng", 12, SportSubtype::Series, None)];
        assert!(m.find_matches(&k, &p).is_empty());
    }

    #[test]
    fn test_sports_reject_date_gap() {
        // 4h tolerance: 5h gap must reject, 4h must pass
        let m = Matcher::new(&cfg());
        let k = vec![sports_market(Venue::Kalshi, "K1", "m80", "voca", 10, SportSubtype::Series, None)];
        let p_far = vec![sports_market(Venue::Polymarket, "P1", "m80", "voca", 15, SportSubtype::Series, None)];
        assert!(m.find_matches(&k, &p_far).is_empty());

        let p_edge = vec![sports_market(Venue::Polymarket, "P1", "m80", "voca", 14, SportSubtype::Series, None)];
        assert_eq!(m.find_matches(&k, &p_edge).len(), 1);
    }

    #[test]
    fn test_sports_reject_subtype_mismatch() {
        let m = Matcher::new(&cfg());
        let k = vec![sports_market(Venue::Kalshi, "K1", "m80", "voca", 12, SportSubtype::Map, None)];
        let p = vec![sports_market(Venue::Polymarket, "P1", "m80", "voca", 12, SportSubtype::Series, None)];
        assert!(m.find_matches(&k, &p).is_empty());
    }

    #[test]
    fn test_sports_map_number_required_when_both_present() {
        // A: map 2, B: game 3 - no pair
        let m = Matcher::new(&cfg());
        let k = vec![sports_market(Venue::Kalshi, "K1", "m80", "voca", 12, SportSubtype::Map, Some(2))];
        let p = vec![sports_market(Venue::Polymarket, "P1", "m80", "voca", 12, SportSubtype::Map, Some(3))];
        assert!(m.find_matches(&k, &p).is_empty());

        // One absent: criterion not applied
        let p2 = vec![sports_market(Venue::Polymarket, "P1", "m80", "voca", 12, SportSubtype::Map, None)];
        assert_eq!(m.find_matches(&k, &p2).len(), 1);
    }

    #[test]
    fn test_sports_opponent_criterion_skipped_when_absent() {
        let m = Matcher::new(&cfg());
        let k = vec![sports_market(Venue::Kalshi, "K1", "austin", "dallas", 12, SportSubtype::Series, None)];
        let mut p_market =
            sports_market(Venue::Polymarket, "P1", "austin", "x", 12, SportSubtype::Series, None);
        p_market.opponent = None;
        assert_eq!(m.find_matches(&k, &[p_market]).len(), 1);
    }

    // =========================================================================
    // Exclusivity
    // =========================================================================

    #[test]
    fn test_each_market_in_at_most_one_pair() {
        let m = Matcher::new(&cfg());
        // Two venue-B rows both matching the single venue-A row
        let k = vec![sports_market(Venue::Kalshi, "K1", "m80", "voca", 12, SportSubtype::Series, None)];
        let p = vec![
            sports_market(Venue::Polymarket, "P1", "m80", "voca", 12, SportSubtype::Series, None),
            sports_market(Venue::Polymarket, "P2", "m80", "voca", 13, SportSubtype::Series, None),
        ];
        let pairs = m.find_matches(&k, &p);
        assert_eq!(pairs.len(), 1, "venue-A market must be consumed by the first match");
    }

    // =========================================================================
    // Crypto matching and the feature flag
    // =========================================================================

    #[test]
    fn test_crypto_disabled_by_default() {
        let m = Matcher::new(&cfg());
        let k = vec![crypto_market(Venue::Kalshi, "K1", 90_000.0, 12)];
        let p = vec![crypto_market(Venue::Polymarket, "P1", 90_000.0, 12)];
        // Criteria would match, but the flag is off
        assert!(m.find_matches(&k, &p).is_empty());
    }

    #[test]
    fn test_crypto_match_when_enabled() {
        let mut cfg = cfg();
        cfg.crypto_matching_enabled = true;
        let m = Matcher::new(&cfg);
        let k = vec![crypto_market(Venue::Kalshi, "K1", 90_000.0, 12)];
        let p = vec![crypto_market(Venue::Polymarket, "P1", 90_000.0, 12)];
        assert_eq!(m.find_matches(&k, &p).len(), 1);
    }

    #[test]
    fn test_crypto_threshold_and_tolerance() {
        let mut cfg = cfg();
        cfg.crypto_matching_enabled = true;
        let m = Matcher::new(&cfg);
        let k = vec![crypto_market(Venue::Kalshi, "K1", 90_000.0, 12)];

        // Different threshold rejects
        let p = vec![crypto_market(Venue::Polymarket, "P1", 91_000.0, 12)];
        assert!(m.find_matches(&k, &p).is_empty());

        // 1h tolerance: 2h gap rejects
        let p = vec![crypto_market(Venue::Polymarket, "P1", 90_000.0, 14)];
        assert!(m.find_matches(&k, &p).is_empty());
    }
}
