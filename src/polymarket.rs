//! Venue-B read side: Gamma market discovery and CLOB book quotes.
//!
//! Discovery paginates the Gamma `/markets` endpoint. Sports markets with
//! distinct team outcomes are expanded into one [`NormalizedMarket`] per team
//! ("team X" row: yes_token = X's win token, no_token = the opponent's).
//! Live prices come from the CLOB `/book` endpoint, whose ask array is sorted
//! descending by price - the best ask is the *last* element. Ladders handed
//! downstream are always canonical best-first.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::info;

use crate::config::{Config, CLOB_API_URL, GAMMA_API_URL, GAMMA_PAGE_LIMIT, QUOTE_TIMEOUT};
use crate::error::{VenueError, VenueResult};
use crate::normalize::{
    extract_asset, extract_both_teams, extract_direction, extract_dollar_amount,
    extract_map_number, extract_winner_team, normalize_team_name, parse_iso,
};
use crate::types::{
    AssetClass, LadderLevel, NormalizedMarket, Quote, SportSubtype, Venue,
};

// === Sport detection ===

/// Keyword → sport code. Longer keywords are tried first so "league of
/// legends" wins over "football" inside compound category strings.
static POLY_SPORT_MAP: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    let mut map = vec![
        ("counter-strike", "CS2"),
        ("counter strike", "CS2"),
        ("cs2", "CS2"),
        ("league of legends", "LOL"),
        ("lol", "LOL"),
        ("rocket league", "RL"),
        ("valorant", "VALORANT"),
        ("dota", "DOTA2"),
        ("nba", "NBA"),
        ("wnba", "WNBA"),
        ("nfl", "NFL"),
        ("nhl", "NHL"),
        ("mlb", "MLB"),
        ("basketball", "NBA"),
        ("hockey", "NHL"),
        ("baseball", "MLB"),
        ("premier league", "SOCCER"),
        ("champions league", "SOCCER"),
        ("la liga", "SOCCER"),
        ("bundesliga", "SOCCER"),
        ("serie a", "SOCCER"),
        ("ligue 1", "SOCCER"),
        ("mls", "SOCCER"),
        ("soccer", "SOCCER"),
        ("football", "SOCCER"),
    ];
    map.sort_by_key(|(kw, _)| std::cmp::Reverse(kw.len()));
    map
});

fn detect_sport(text: &str) -> Option<&'static str> {
    let t = text.to_lowercase();
    POLY_SPORT_MAP
        .iter()
        .find(|(kw, _)| t.contains(kw))
        .map(|(_, code)| *code)
}

/// Series slugs use hyphens as separators ("nba-2026", "la-liga-2025").
fn detect_sport_from_series_slug(slug: &str) -> Option<&'static str> {
    if slug.is_empty() {
        return None;
    }
    detect_sport(&slug.replace('-', " "))
}

// === Wire types ===

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    #[serde(default)]
    condition_id: Option<String>,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    end_date_iso: Option<String>,
    /// Stringified JSON array of outcome names.
    #[serde(default)]
    outcomes: Option<String>,
    /// Stringified JSON array of token ids, same order as `outcomes`.
    #[serde(default)]
    clob_token_ids: Option<String>,
    /// "moneyline" = full match/series winner, "child_moneyline" = per map/game.
    #[serde(default)]
    sports_market_type: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    closed: Option<bool>,
    #[serde(default)]
    events: Vec<GammaEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaEvent {
    #[serde(default)]
    series_slug: Option<String>,
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    series: Vec<GammaSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct GammaSeries {
    #[serde(default)]
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClobBookLevel {
    price: String,
    size: String,
}

/// Only the ask side matters here: every venue-B order this system places is
/// a taker buy.
#[derive(Debug, Default, Deserialize)]
struct ClobBook {
    #[serde(default)]
    asks: Vec<ClobBookLevel>,
}

impl GammaMarket {
    fn series_slug(&self) -> &str {
        let Some(ev) = self.events.first() else {
            return "";
        };
        if let Some(s) = ev.series_slug.as_deref().filter(|s| !s.is_empty()) {
            return s;
        }
        if let Some(s) = ev
            .series
            .first()
            .and_then(|s| s.slug.as_deref())
            .filter(|s| !s.is_empty())
        {
            return s;
        }
        ev.ticker.as_deref().unwrap_or("")
    }
}

/// Parse a field that arrives as a stringified JSON array.
fn parse_json_array(value: Option<&str>) -> Vec<String> {
    value
        .and_then(|s| serde_json::from_str::<Vec<serde_json::Value>>(s).ok())
        .map(|vals| {
            vals.into_iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn is_yes_no(outcomes: &[String]) -> bool {
    if outcomes.len() != 2 {
        return false;
    }
    let mut lower: Vec<String> = outcomes.iter().map(|o| o.to_lowercase()).collect();
    lower.sort();
    lower == ["no", "yes"]
}

// === Client ===

/// Unauthenticated market reader for venue B.
pub struct PolyClient {
    http: reqwest::Client,
    scan_window_hours: i64,
}

impl PolyClient {
    pub fn new(cfg: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            scan_window_hours: cfg.scan_window_hours,
        }
    }

    /// Fetch all active markets, normalize (sports markets expand into one
    /// row per team), and keep those resolving within the scan window.
    pub async fn list_markets(&self) -> VenueResult<Vec<NormalizedMarket>> {
        let raw = self.fetch_gamma_pages().await?;
        let raw_count = raw.len();

        let now = Utc::now();
        let cutoff = now + ChronoDuration::hours(self.scan_window_hours);

        let mut markets = Vec::new();
        for gm in &raw {
            markets.extend(normalize_gamma_market(gm, now, cutoff));
        }

        let sports = markets
            .iter()
            .filter(|m| m.asset_class == AssetClass::Sports)
            .count();
        info!(
            "[POLY] {} raw → {} normalized rows in {}h window ({} sports team-entries, {} crypto)",
            raw_count,
            markets.len(),
            self.scan_window_hours,
            sports,
            markets.len() - sports,
        );
        Ok(markets)
    }

    /// Quote one normalized market: one book fetch per token side.
    pub async fn get_quote(&self, market: &NormalizedMarket) -> VenueResult<Quote> {
        let (yes_ask, yes_depth, yes_ladder) = self.fetch_book(&market.yes_token).await?;
        let (no_ask, no_depth, no_ladder) = self.fetch_book(&market.no_token).await?;
        Ok(Quote {
            yes_ask_cents: yes_ask,
            no_ask_cents: no_ask,
            yes_depth,
            no_depth,
            yes_ladder,
            no_ladder,
        })
    }

    /// Fetch one token's book and reduce it to (best ask, depth at best,
    /// canonical ascending ladder).
    async fn fetch_book(
        &self,
        token_id: &str,
    ) -> VenueResult<(Option<f64>, Option<f64>, Vec<LadderLevel>)> {
        let url = format!("{CLOB_API_URL}/book?token_id={token_id}");
        let resp = self
            .http
            .get(&url)
            .timeout(QUOTE_TIMEOUT)
            .send()
            .await
            .map_err(VenueError::from_http)?;
        if !resp.status().is_success() {
            return Err(VenueError::from_status(
                resp.status().as_u16(),
                format!("book {}", &token_id[..token_id.len().min(16)]),
            ));
        }
        let book: ClobBook = resp
            .json()
            .await
            .map_err(|e| VenueError::Protocol(format!("book response: {e}")))?;
        Ok(reduce_asks(&book))
    }

    async fn fetch_gamma_pages(&self) -> VenueResult<Vec<GammaMarket>> {
        let mut all = Vec::new();
        let mut offset = 0usize;

        loop {
            let url = format!(
                "{GAMMA_API_URL}/markets?active=true&closed=false&limit={GAMMA_PAGE_LIMIT}&offset={offset}"
            );
            let resp = self
                .http
                .get(&url)
                .timeout(std::time::Duration::from_secs(15))
                .send()
                .await
                .map_err(VenueError::from_http)?;
            if !resp.status().is_success() {
                return Err(VenueError::from_status(
                    resp.status().as_u16(),
                    "gamma market list".to_string(),
                ));
            }
            let page: Vec<GammaMarket> = resp
                .json()
                .await
                .map_err(|e| VenueError::Protocol(format!("gamma page: {e}")))?;

            let fetched = page.len();
            all.extend(page);
            if fetched < GAMMA_PAGE_LIMIT {
                break;
            }
            offset += GAMMA_PAGE_LIMIT;
        }

        Ok(all)
    }
}

/// Reduce a CLOB book to (best ask, depth at best ask, canonical ladder).
///
/// The ask array arrives sorted descending by price - best ask last. Sizes at
/// a repeated price are aggregated per level; the returned ladder is sorted
/// ascending (best first).
fn reduce_asks(book: &ClobBook) -> (Option<f64>, Option<f64>, Vec<LadderLevel>) {
    if book.asks.is_empty() {
        return (None, None, vec![]);
    }

    let mut levels: Vec<LadderLevel> = Vec::new();
    for entry in &book.asks {
        let (Ok(price), Ok(size)) = (entry.price.parse::<f64>(), entry.size.parse::<f64>()) else {
            continue;
        };
        let price_cents = price * 100.0;
        if !(0.0..=100.0).contains(&price_cents) {
            continue;
        }
        match levels
            .iter_mut()
            .find(|l| (l.price_cents - price_cents).abs() < 1e-9)
        {
            Some(level) => level.size += size,
            None => levels.push(LadderLevel { price_cents, size }),
        }
    }
    if levels.is_empty() {
        return (None, None, vec![]);
    }

    levels.sort_by(|a, b| a.price_cents.total_cmp(&b.price_cents));
    let best = levels[0];
    (Some(best.price_cents), Some(best.size), levels)
}

// === Normalization ===

fn normalize_gamma_market(
    gm: &GammaMarket,
    now: DateTime<Utc>,
    cutoff: DateTime<Utc>,
) -> Vec<NormalizedMarket> {
    if gm.closed == Some(true) || gm.active == Some(false) {
        return vec![];
    }
    let Some(condition_id) = gm.condition_id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    else {
        return vec![];
    };
    let Some(question) = gm.question.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return vec![];
    };
    let Some(resolution_dt) = gm
        .end_date
        .as_deref()
        .or(gm.end_date_iso.as_deref())
        .and_then(parse_iso)
    else {
        return vec![];
    };
    if resolution_dt <= now || resolution_dt > cutoff {
        return vec![];
    }

    let outcomes = parse_json_array(gm.outcomes.as_deref());
    let token_ids = parse_json_array(gm.clob_token_ids.as_deref());

    let sports_type = gm
        .sports_market_type
        .as_deref()
        .unwrap_or("")
        .to_lowercase();
    let declared_sports = matches!(sports_type.as_str(), "moneyline" | "child_moneyline");

    let detected_sport = detect_sport(question)
        .or_else(|| gm.category.as_deref().and_then(detect_sport))
        .or_else(|| detect_sport_from_series_slug(gm.series_slug()));

    if declared_sports || (detected_sport.is_some() && outcomes.len() >= 2 && !is_yes_no(&outcomes))
    {
        return normalize_sports(
            gm,
            condition_id,
            question,
            resolution_dt,
            &sports_type,
            detected_sport,
            &outcomes,
            &token_ids,
        );
    }

    // Undeclared YES/NO moneylines ("Will X win on ...?") are sports when the
    // question or category carries a sport keyword
    if detected_sport.is_some() && is_yes_no(&outcomes) && extract_winner_team(question).is_some() {
        return normalize_yes_no_sports(
            gm,
            condition_id,
            question,
            resolution_dt,
            detected_sport,
            &token_ids,
        );
    }

    normalize_crypto(condition_id, question, resolution_dt, &outcomes, &token_ids)
        .into_iter()
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn normalize_sports(
    gm: &GammaMarket,
    condition_id: &str,
    question: &str,
    resolution_dt: DateTime<Utc>,
    sports_type: &str,
    detected_sport: Option<&'static str>,
    outcomes: &[String],
    token_ids: &[String],
) -> Vec<NormalizedMarket> {
    if outcomes.len() < 2 || token_ids.len() < outcomes.len() {
        return vec![];
    }

    if is_yes_no(outcomes) {
        return normalize_yes_no_sports(
            gm,
            condition_id,
            question,
            resolution_dt,
            detected_sport,
            token_ids,
        );
    }

    // 3+ outcome markets have no trivially inferable opponent token
    if outcomes.len() != 2 {
        return vec![];
    }

    let sport = detected_sport.unwrap_or("SPORTS");
    let subtype = if sports_type == "child_moneyline" {
        SportSubtype::Map
    } else {
        SportSubtype::Series
    };
    let map_number = extract_map_number(question);

    let mut rows = Vec::with_capacity(2);
    for i in 0..2 {
        let team_raw = outcomes[i].trim();
        if team_raw.is_empty()
            || matches!(team_raw.to_lowercase().as_str(), "draw" | "tie" | "no contest")
        {
            continue;
        }
        let opp_raw = outcomes[1 - i].trim();

        let team = normalize_team_name(team_raw);
        let opponent = normalize_team_name(opp_raw);
        if team.is_empty() || opponent.is_empty() {
            continue;
        }

        rows.push(NormalizedMarket {
            venue: Venue::Polymarket,
            platform_id: format!("{condition_id}_{team}"),
            asset_class: AssetClass::Sports,
            sport: Some(sport.to_string()),
            team: Some(team),
            opponent: Some(opponent),
            sport_subtype: Some(subtype),
            map_number,
            crypto_asset: None,
            direction: None,
            threshold: None,
            resolution_dt,
            // This team's win token is YES, the opponent's win token is NO
            yes_token: token_ids[i].clone(),
            no_token: token_ids[1 - i].clone(),
            raw_title: question.to_string(),
        });
    }
    rows
}

/// "Will X win?" YES/NO moneylines, common in soccer. The team comes from the
/// question; the opponent is extracted when the question names both teams and
/// left empty otherwise (the matcher then skips the opponent criterion for
/// this side). Draw-only markets are skipped - no venue-A equivalent.
fn normalize_yes_no_sports(
    gm: &GammaMarket,
    condition_id: &str,
    question: &str,
    resolution_dt: DateTime<Utc>,
    detected_sport: Option<&'static str>,
    token_ids: &[String],
) -> Vec<NormalizedMarket> {
    let q_lower = question.to_lowercase();
    if q_lower.contains("draw") || q_lower.contains(" tie") || q_lower.contains("end in a") {
        return vec![];
    }
    let Some(team_raw) = extract_winner_team(question) else {
        return vec![];
    };
    let team = normalize_team_name(&team_raw);
    if team.is_empty() || token_ids.len() < 2 {
        return vec![];
    }

    let opponent = extract_both_teams(question).and_then(|(a, b)| {
        let na = normalize_team_name(&a);
        let nb = normalize_team_name(&b);
        if na == team {
            Some(nb)
        } else if nb == team {
            Some(na)
        } else {
            None
        }
    });

    let sport = detected_sport
        .or_else(|| detect_sport_from_series_slug(gm.series_slug()))
        .unwrap_or("SPORTS");

    vec![NormalizedMarket {
        venue: Venue::Polymarket,
        platform_id: format!("{condition_id}_{team}"),
        asset_class: AssetClass::Sports,
        sport: Some(sport.to_string()),
        team: Some(team),
        opponent,
        sport_subtype: Some(SportSubtype::Series),
        map_number: None,
        crypto_asset: None,
        direction: None,
        threshold: None,
        resolution_dt,
        yes_token: token_ids[0].clone(),
        no_token: token_ids[1].clone(),
        raw_title: question.to_string(),
    }]
}

fn normalize_crypto(
    condition_id: &str,
    question: &str,
    resolution_dt: DateTime<Utc>,
    outcomes: &[String],
    token_ids: &[String],
) -> Option<NormalizedMarket> {
    let asset = extract_asset(question)?;
    let direction = extract_direction(question)?;
    let threshold = extract_dollar_amount(question)?;
    if token_ids.len() < 2 {
        return None;
    }

    // Map YES/NO outcome labels onto token order; default to declared order
    let (mut yes_idx, mut no_idx) = (0usize, 1usize);
    for (i, o) in outcomes.iter().enumerate() {
        match o.to_lowercase().as_str() {
            "yes" | "true" | "1" => yes_idx = i,
            "no" | "false" | "0" => no_idx = i,
            _ => {}
        }
    }
    if yes_idx >= token_ids.len() || no_idx >= token_ids.len() {
        return None;
    }

    Some(NormalizedMarket {
        venue: Venue::Polymarket,
        platform_id: condition_id.to_string(),
        asset_class: AssetClass::Crypto,
        sport: None,
        team: None,
        opponent: None,
        sport_subtype: None,
        map_number: None,
        crypto_asset: Some(asset),
        direction: Some(direction),
        threshold: Some(threshold),
        resolution_dt,
        yes_token: token_ids[yes_idx].clone(),
        no_token: token_ids[no_idx].clone(),
        raw_title: question.to_string(),
    })
}

// =============================================================================
// TESTS
// =============================================================================
