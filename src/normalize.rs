//! Shared text normalization: team names, map/game numbers, crypto
//! asset/direction/threshold extraction, and timestamp parsing.
//!
//! Both venue adapters reduce their raw market records through these helpers
//! before matching, so the matcher only ever compares canonical strings.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::types::Direction;

// === Team names ===

/// Wrapper words that don't distinguish teams.
const TEAM_STOPWORDS: [&str; 6] = ["team", "esports", "gaming", "fc", "sc", "the"];

/// Normalize a team name for cross-venue matching.
///
/// Lowercase, strip ASCII punctuation, drop stopwords, drop a trailing
/// all-digit token ("cloud9 2" → "cloud9"), then concatenate the remaining
/// tokens with no separator. If stopword filtering would empty the string the
/// pre-filter tokens are kept (preserves names like "m80" after punctuation
/// stripping, and short identifiers made entirely of stopword text).
///
/// Idempotent: `normalize_team_name(normalize_team_name(x)) == normalize_team_name(x)`.
pub fn normalize_team_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| {
            if c.is_ascii_punctuation() {
                ' '
            } else {
                c
            }
        })
        .collect();

    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let mut filtered: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| !TEAM_STOPWORDS.contains(t))
        .collect();
    if filtered.is_empty() {
        filtered = tokens;
    }

    // Trailing numeric suffix ("cloud9 2" → "cloud9"), but never down to nothing
    while filtered.len() > 1
        && filtered
            .last()
            .is_some_and(|t| t.chars().all(|c| c.is_ascii_digit()))
    {
        filtered.pop();
    }

    filtered.concat()
}

// === Map / game numbers ===

static MAP_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    // The number is captured with an optional fraction so "map 2.5" can be
    // rejected (the regex crate has no lookahead). The plural "maps" never
    // matches because whitespace must follow the literal word.
    Regex::new(r"(?i)\b(?:map|game)\s+(\d+(?:\.\d+)?)").expect("map-number regex")
});

/// Extract a map/game number from free text: "Map 2", "game 3".
///
/// Does not match "2.5 maps" or "over 2.5 maps" (fractional counts are
/// over/under lines, not map indices).
pub fn extract_map_number(text: &str) -> Option<u32> {
    let caps = MAP_NUMBER_RE.captures(text)?;
    let num = caps.get(1)?.as_str();
    if num.contains('.') {
        return None;
    }
    num.parse().ok()
}

// === Teams from question text ===

static BOTH_TEAMS_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // "the X vs. Y CS2 match" / "the X vs Y game"
        Regex::new(
            r"(?i)the\s+(.+?)\s+vs\.?\s+(.+?)\s+(?:cs2|nba|nfl|nhl|mlb|lol|valorant|dota|rocket\s*league|soccer|game|match|series)",
        )
        .expect("teams regex"),
        // "the X vs. Y" at end of question
        Regex::new(r"(?i)the\s+(.+?)\s+vs\.?\s+(.+?)(?:\s*\?|$)").expect("teams regex"),
    ]
});

/// Extract both team names from a title like
/// "Will M80 win the M80 vs. Voca CS2 match?".
pub fn extract_both_teams(title: &str) -> Option<(String, String)> {
    for re in BOTH_TEAMS_RES.iter() {
        if let Some(caps) = re.captures(title) {
            let a = caps.get(1)?.as_str().trim();
            let b = caps.get(2)?.as_str().trim();
            if !a.is_empty() && !b.is_empty() {
                return Some((a.to_string(), b.to_string()));
            }
        }
    }
    None
}

static WINNER_TEAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^will\s+(.+?)\s+win\b").expect("winner regex"));

/// Extract the subject team from "Will <TEAM> win ..." questions.
pub fn extract_winner_team(title: &str) -> Option<String> {
    WINNER_TEAM_RE
        .captures(title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

// === Crypto parsing ===

const ASSET_KEYWORDS: [(&str, &str); 20] = [
    ("bitcoin", "BTC"),
    ("btc", "BTC"),
    ("ethereum", "ETH"),
    ("eth", "ETH"),
    ("xrp", "XRP"),
    ("ripple", "XRP"),
    ("solana", "SOL"),
    ("sol", "SOL"),
    ("dogecoin", "DOGE"),
    ("doge", "DOGE"),
    ("bnb", "BNB"),
    ("binance", "BNB"),
    ("cardano", "ADA"),
    ("ada", "ADA"),
    ("avalanche", "AVAX"),
    ("avax", "AVAX"),
    ("polygon", "MATIC"),
    ("matic", "MATIC"),
    ("litecoin", "LTC"),
    ("ltc", "LTC"),
];

/// Extract a normalized coin symbol from question text.
pub fn extract_asset(text: &str) -> Option<String> {
    let t = text.to_lowercase();
    ASSET_KEYWORDS
        .iter()
        .find(|(kw, _)| t.contains(kw))
        .map(|(_, sym)| sym.to_string())
}

const ABOVE_WORDS: [&str; 12] = [
    "above", "over", "exceed", "exceeds", "higher", "more", "greater", "reach", "reaches", "hit",
    "hits", "surpass",
];
const BELOW_WORDS: [&str; 9] = [
    "below", "under", "less", "lower", "beneath", "fall", "falls", "drop", "drops",
];

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("word regex"));

/// Extract ABOVE/BELOW direction from question text, if either is signalled.
pub fn extract_direction(text: &str) -> Option<Direction> {
    if text.contains('≥') {
        return Some(Direction::Above);
    }
    let t = text.to_lowercase();
    let mut saw_below = false;
    for m in WORD_RE.find_iter(&t) {
        let w = m.as_str();
        if ABOVE_WORDS.contains(&w) {
            return Some(Direction::Above);
        }
        if BELOW_WORDS.contains(&w) {
            saw_below = true;
        }
    }
    saw_below.then_some(Direction::Below)
}

static DOLLAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*(\d+(?:\.\d+)?)\s*([kKmMbB]?)").expect("dollar regex"));

/// Extract the first dollar amount from text as a base float.
///
/// Handles `$90,000`, `$90k`, `$1.5M`, `$90000`.
pub fn extract_dollar_amount(text: &str) -> Option<f64> {
    let clean = text.replace(',', "");
    let caps = DOLLAR_RE.captures(&clean)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let mult = match caps.get(2).map(|m| m.as_str().to_lowercase()) {
        Some(s) if s == "k" => 1_000.0,
        Some(s) if s == "m" => 1_000_000.0,
        Some(s) if s == "b" => 1_000_000_000.0,
        _ => 1.0,
    };
    Some(value * mult)
}

// === Timestamps ===

/// Parse an ISO-8601 UTC instant. Accepts trailing `Z`, explicit offsets, and
/// bare (assumed-UTC) timestamps, with or without fractional seconds.
pub fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Team normalization
    // =========================================================================

    #[test]
    fn test_normalize_team_basic() {
        assert_eq!(normalize_team_name("M80"), "m80");
        assert_eq!(normalize_team_name("Team Vitality"), "vitality");
        assert_eq!(normalize_team_name("Cloud9 2"), "cloud9");
        assert_eq!(normalize_team_name("KUUSAMO.gg"), "kuusamogg");
        assert_eq!(normalize_team_name("NAVI Junior"), "navijunior");
    }

    #[test]
    fn test_normalize_team_stopword_guard() {
        // Filtering must not empty the name
        assert_eq!(normalize_team_name("FC"), "fc");
        assert_eq!(normalize_team_name("The Team"), "theteam");
        // "G2" style short identifiers survive
        assert_eq!(normalize_team_name("G2"), "g2");
    }

    #[test]
    fn test_normalize_team_idempotent() {
        for name in [
            "M80",
            "Team Vitality",
            "Cloud9 2",
            "KUUSAMO.gg",
            "FC Barcelona",
            "G2",
            "The Team",
            "Austin FC",
        ] {
            let once = normalize_team_name(name);
            assert_eq!(
                normalize_team_name(&once),
                once,
                "normalization not idempotent for {name:?}"
            );
        }
    }

    #[test]
    fn test_normalize_team_punctuation() {
        assert_eq!(normalize_team_name("St. Louis"), "stlouis");
        assert_eq!(normalize_team_name("A's"), "as");
    }

    // =========================================================================
    // Map / game number extraction
    // =========================================================================

    #[test]
    fn test_map_number_matches() {
        assert_eq!(extract_map_number("Will M80 win Map 2?"), Some(2));
        assert_eq!(extract_map_number("T1 vs DK: Game 3 winner"), Some(3));
        assert_eq!(extract_map_number("map   1"), Some(1));
    }

    #[test]
    fn test_map_number_rejections() {
        // Fractional lines and over/under phrasing are not map indices
        assert_eq!(extract_map_number("Over 2.5 maps"), None);
        assert_eq!(extract_map_number("map 2.5"), None);
        assert_eq!(extract_map_number("Will the series go over 2 maps?"), None);
        assert_eq!(extract_map_number("roadmap 3"), None);
        assert_eq!(extract_map_number("pregame 2"), None);
        assert_eq!(extract_map_number("no number here"), None);
    }

    // =========================================================================
    // Question-text team extraction
    // =========================================================================

    #[test]
    fn test_extract_both_teams() {
        let (a, b) =
            extract_both_teams("Will M80 win the M80 vs. Voca CS2 match?").unwrap();
        assert_eq!(a, "M80");
        assert_eq!(b, "Voca");

        let (a, b) =
            extract_both_teams("Will Fnatic win the Fnatic vs. Team Vitality CS2 match?").unwrap();
        assert_eq!(a, "Fnatic");
        assert_eq!(b, "Team Vitality");

        assert!(extract_both_teams("Will BTC be above $90k?").is_none());
    }

    #[test]
    fn test_extract_winner_team() {
        assert_eq!(
            extract_winner_team("Will Austin FC win on 2026-03-01?").as_deref(),
            Some("Austin FC")
        );
        assert_eq!(extract_winner_team("Bitcoin above $90k?"), None);
    }

    // =========================================================================
    // Crypto parsing
    // =========================================================================

    #[test]
    fn test_extract_asset() {
        assert_eq!(extract_asset("Will Bitcoin hit $100k?").as_deref(), Some("BTC"));
        assert_eq!(extract_asset("ETH above $4000").as_deref(), Some("ETH"));
        assert_eq!(extract_asset("Who wins the match?"), None);
    }

    #[test]
    fn test_extract_direction() {
        assert_eq!(
            extract_direction("Will BTC be above $90k?"),
            Some(Direction::Above)
        );
        assert_eq!(
            extract_direction("$75,750 or more"),
            Some(Direction::Above)
        );
        assert_eq!(
            extract_direction("Will ETH drop below $3000?"),
            Some(Direction::Below)
        );
        assert_eq!(extract_direction("Will X win the match?"), None);
    }

    #[test]
    fn test_extract_dollar_amount() {
        assert_eq!(extract_dollar_amount("$90,000 or above"), Some(90_000.0));
        assert_eq!(extract_dollar_amount("$90k"), Some(90_000.0));
        assert_eq!(extract_dollar_amount("$1.5M"), Some(1_500_000.0));
        assert_eq!(extract_dollar_amount("$75,750 or above"), Some(75_750.0));
        assert_eq!(extract_dollar_amount("no dollars"), None);
    }

    // =========================================================================
    // Timestamp parsing
    // =========================================================================

    #[test]
    fn test_parse_iso_variants() {
        let dt = parse_iso("2026-02-21T15:00:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-02-21T15:00:00+00:00");

        assert!(parse_iso("2026-02-21T15:00:00+01:00").is_some());
        assert!(parse_iso("2026-02-21T15:00:00").is_some());
        assert!(parse_iso("2026-02-21T15:00:00.123Z").is_some());
        assert!(parse_iso("").is_none());
        assert!(parse_iso("not a date").is_none());
    }
}
