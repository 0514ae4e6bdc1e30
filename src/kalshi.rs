//! Venue-A adapter: integer-cent CLOB with RSA-PS256 signed REST orders.
//!
//! Read side ([`KalshiClient`]): paginated market list, normalization into
//! [`NormalizedMarket`], and per-ticker quotes with orderbook fallback.
//! Write side ([`KalshiTrader`]): signed order placement, cancels, fill
//! queries, balance, and sell-at-bid for the unwind path.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration as ChronoDuration, Utc};
use governor::{clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::BlindedSigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{
    Config, BALANCE_TIMEOUT, FILL_TIMEOUT, KALSHI_API_PATH_PREFIX, KALSHI_BASE_URL,
    KALSHI_LIST_RATE_LIMIT_PER_SEC, KALSHI_PAGE_LIMIT, ORDER_TIMEOUT, QUOTE_TIMEOUT,
};
use crate::error::{VenueError, VenueResult};
use crate::normalize::{
    extract_asset, extract_both_teams, extract_direction, extract_dollar_amount,
    extract_map_number, extract_winner_team, normalize_team_name, parse_iso,
};
use crate::types::{AssetClass, Direction, NormalizedMarket, Quote, Side, SportSubtype, Venue};

type ListLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

// === Series classification ===

/// Series-ticker prefix → sport code.
const SPORT_SERIES: [(&str, &str); 18] = [
    ("KXCS2GAME", "CS2"),
    ("KXCS2MAP", "CS2"),
    ("KXCS2", "CS2"),
    ("KXNBAWIN", "NBA"),
    ("KXNBA", "NBA"),
    ("KXMLBWIN", "MLB"),
    ("KXMLB", "MLB"),
    ("KXNHLWIN", "NHL"),
    ("KXNHL", "NHL"),
    ("KXNFLWIN", "NFL"),
    ("KXNFL", "NFL"),
    ("KXSOCCER", "SOCCER"),
    ("KXLOLGAME", "LOL"),
    ("KXLOLMAP", "LOL"),
    ("KXLOL", "LOL"),
    ("KXVALORANTMAP", "VALORANT"),
    ("KXVALORANT", "VALORANT"),
    ("KXDOTA2", "DOTA2"),
];

fn sport_for_series(series_ticker: &str, ticker: &str) -> Option<&'static str> {
    let series = series_ticker.to_uppercase();
    if !series.is_empty() {
        for (prefix, sport) in SPORT_SERIES {
            if series.starts_with(prefix) {
                return Some(sport);
            }
        }
    }
    let ticker = ticker.to_uppercase();
    SPORT_SERIES
        .iter()
        .find(|(prefix, _)| ticker.starts_with(prefix))
        .map(|(_, sport)| *sport)
}

/// Per-map/game winner series vs full match/series winner, from the ticker.
fn subtype_for_series(series_ticker: &str) -> SportSubtype {
    let s = series_ticker.to_uppercase();
    if s.contains("MAP") || s.contains("GAME") {
        SportSubtype::Map
    } else {
        SportSubtype::Series
    }
}

// === Wire types ===

#[derive(Debug, Deserialize)]
struct MarketsPage {
    #[serde(default)]
    markets: Vec<RawMarket>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarketEnvelope {
    market: RawMarket,
}

#[derive(Debug, Default, Deserialize)]
struct RawMarket {
    #[serde(default)]
    ticker: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    yes_sub_title: Option<String>,
    #[serde(default)]
    series_ticker: Option<String>,
    #[serde(default)]
    expected_expiration_time: Option<String>,
    #[serde(default)]
    yes_ask: Option<f64>,
    #[serde(default)]
    no_ask: Option<f64>,
    #[serde(default)]
    yes_bid: Option<f64>,
    #[serde(default)]
    no_bid: Option<f64>,
}

/// Book response: resting bids per side, sorted ascending (best bid last).
#[derive(Debug, Deserialize)]
struct OrderbookEnvelope {
    orderbook: RawOrderbook,
}

#[derive(Debug, Default, Deserialize)]
struct RawOrderbook {
    #[serde(default)]
    yes: Vec<(f64, f64)>,
    #[serde(default)]
    no: Vec<(f64, f64)>,
}

#[derive(Debug, Deserialize)]
struct OrderEnvelope {
    order: RawOrder,
}

#[derive(Debug, Default, Deserialize)]
struct RawOrder {
    #[serde(default)]
    order_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    fill_count: Option<i64>,
    #[serde(default)]
    remaining_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BalanceEnvelope {
    #[serde(default)]
    balance: f64,
}

#[derive(Debug, Serialize)]
struct OrderBody<'a> {
    ticker: &'a str,
    client_order_id: String,
    #[serde(rename = "type")]
    order_type: &'static str,
    action: &'static str,
    side: &'static str,
    count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    yes_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    no_price: Option<i64>,
}

/// Fill state of a venue-A order.
#[derive(Debug, Clone)]
pub struct KalshiFill {
    pub status: String,
    pub fill_count: i64,
    pub remaining_count: i64,
}

impl KalshiFill {
    /// A cancelled order reports remaining_count = 0 too; only `fill_count`
    /// is authoritative for how many contracts actually filled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.status.as_str(), "canceled" | "cancelled")
    }
}

// === Request signer ===

/// RSASSA-PSS (SHA-256, MGF1-SHA-256) request signer.
///
/// Message: `timestamp_ms + METHOD + path`, with the body contribution fixed
/// to the empty string even on POST.
pub struct KalshiSigner {
    api_key: String,
    private_key: RsaPrivateKey,
}

impl KalshiSigner {
    /// Build from the API key id and a PEM private key. Literal `\n` escapes
    /// (as they arrive from .env files) are tolerated; PKCS#8 and PKCS#1
    /// encodings are both accepted.
    pub fn new(api_key: &str, private_key_pem: &str) -> VenueResult<Self> {
        let pem = private_key_pem.trim().replace("\\n", "\n");
        let private_key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pem))
            .map_err(|e| VenueError::Auth(format!("cannot parse venue-A private key: {e}")))?;
        Ok(Self {
            api_key: api_key.trim().to_string(),
            private_key,
        })
    }

    /// Sign a request; returns (timestamp_ms, base64 signature).
    pub fn sign(&self, method: &str, path: &str) -> (String, String) {
        let ts = Utc::now().timestamp_millis().to_string();
        let message = format!("{ts}{}{path}", method.to_uppercase());
        let signing_key = BlindedSigningKey::<Sha256>::new(self.private_key.clone());
        let signature = signing_key.sign_with_rng(&mut rand::thread_rng(), message.as_bytes());
        (ts, BASE64.encode(signature.to_bytes()))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for KalshiSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KalshiSigner")
            .field("api_key", &self.api_key)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

// === Read-side client ===

/// Unauthenticated market reader for venue A.
pub struct KalshiClient {
    http: reqwest::Client,
    limiter: Arc<ListLimiter>,
    scan_window_hours: i64,
}

impl KalshiClient {
    pub fn new(cfg: &Config) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(KALSHI_LIST_RATE_LIMIT_PER_SEC).expect("nonzero rate limit"),
        );
        Self {
            http: reqwest::Client::new(),
            limiter: Arc::new(RateLimiter::direct(quota)),
            scan_window_hours: cfg.scan_window_hours,
        }
    }

    /// Fetch all open markets, normalize, and keep those resolving within the
    /// scan window.
    pub async fn list_markets(&self) -> VenueResult<Vec<NormalizedMarket>> {
        let raw = self.fetch_all_pages().await?;
        let raw_count = raw.len();

        let now = Utc::now();
        let cutoff = now + ChronoDuration::hours(self.scan_window_hours);

        let mut markets = Vec::new();
        for item in raw {
            if let Some(m) = normalize_market(&item) {
                if m.resolution_dt > now && m.resolution_dt <= cutoff {
                    markets.push(m);
                }
            }
        }

        let sports = markets
            .iter()
            .filter(|m| m.asset_class == AssetClass::Sports)
            .count();
        info!(
            "[KALSHI] {} raw → {} in {}h window ({} sports, {} crypto)",
            raw_count,
            markets.len(),
            self.scan_window_hours,
            sports,
            markets.len() - sports,
        );
        Ok(markets)
    }

    /// Quote one ticker. The summary endpoint may carry null asks; the
    /// orderbook is then authoritative (a missing side stays `None`, never 0).
    pub async fn get_quote(&self, ticker: &str) -> VenueResult<Quote> {
        let url = format!("{KALSHI_BASE_URL}/markets/{ticker}");
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
                format!("quote {ticker}"),
            ));
        }
        let envelope: MarketEnvelope = resp
            .json()
            .await
            .map_err(|e| VenueError::Protocol(format!("market response: {e}")))?;

        let mut quote = Quote {
            yes_ask_cents: valid_cents(envelope.market.yes_ask),
            no_ask_cents: valid_cents(envelope.market.no_ask),
            ..Quote::default()
        };

        if quote.yes_ask_cents.is_none() || quote.no_ask_cents.is_none() {
            match self.get_orderbook_quote(ticker).await {
                Ok(book) => {
                    if quote.yes_ask_cents.is_none() {
                        quote.yes_ask_cents = book.yes_ask_cents;
                    }
                    if quote.no_ask_cents.is_none() {
                        quote.no_ask_cents = book.no_ask_cents;
                    }
                    quote.yes_depth = book.yes_depth;
                    quote.no_depth = book.no_depth;
                    quote.yes_ladder = book.yes_ladder;
                    quote.no_ladder = book.no_ladder;
                }
                Err(e) => debug!("[KALSHI] orderbook fallback failed for {ticker}: {e}"),
            }
        }

        Ok(quote)
    }

    /// Derive a quote from the orderbook. Both sides carry resting bids
    /// sorted ascending (best bid last); the ask of one side is 100 minus the
    /// best bid of the other side, with that entry's count as depth.
    pub async fn get_orderbook_quote(&self, ticker: &str) -> VenueResult<Quote> {
        let url = format!("{KALSHI_BASE_URL}/markets/{ticker}/orderbook");
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
                format!("orderbook {ticker}"),
            ));
        }
        let envelope: OrderbookEnvelope = resp
            .json()
            .await
            .map_err(|e| VenueError::Protocol(format!("orderbook response: {e}")))?;

        Ok(quote_from_book(&envelope.orderbook))
    }

    async fn fetch_all_pages(&self) -> VenueResult<Vec<RawMarket>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            self.limiter.until_ready().await;

            let mut url = format!(
                "{KALSHI_BASE_URL}/markets?status=open&limit={KALSHI_PAGE_LIMIT}"
            );
            if let Some(c) = &cursor {
                url.push_str(&format!("&cursor={c}"));
            }

            let resp = self
                .http
                .get(&url)
                .timeout(ORDER_TIMEOUT)
                .send()
                .await
                .map_err(VenueError::from_http)?;
            if !resp.status().is_success() {
                return Err(VenueError::from_status(
                    resp.status().as_u16(),
                    "market list".to_string(),
                ));
            }
            let page: MarketsPage = resp
                .json()
                .await
                .map_err(|e| VenueError::Protocol(format!("markets page: {e}")))?;

            let fetched = page.markets.len();
            all.extend(page.markets);

            cursor = page.cursor.filter(|c| !c.is_empty());
            if cursor.is_none() || fetched < KALSHI_PAGE_LIMIT {
                break;
            }
        }

        Ok(all)
    }
}

fn quote_from_book(book: &RawOrderbook) -> Quote {
    let mut quote = Quote::default();

    // Best yes ask comes from the best (last, highest) NO bid, and vice versa
    if let Some(&(no_bid, count)) = book.no.last() {
        quote.yes_ask_cents = valid_cents(Some(100.0 - no_bid));
        quote.yes_depth = Some(count);
    }
    if let Some(&(yes_bid, count)) = book.yes.last() {
        quote.no_ask_cents = valid_cents(Some(100.0 - yes_bid));
        quote.no_depth = Some(count);
    }

    // Canonical best-first ask ladders from the opposite side's bid stack
    quote.yes_ladder = book
        .no
        .iter()
        .rev()
        .filter_map(|&(p, s)| {
            valid_cents(Some(100.0 - p)).map(|price_cents| crate::types::LadderLevel {
                price_cents,
                size: s,
            })
        })
        .collect();
    quote.no_ladder = book
        .yes
        .iter()
        .rev()
        .filter_map(|&(p, s)| {
            valid_cents(Some(100.0 - p)).map(|price_cents| crate::types::LadderLevel {
                price_cents,
                size: s,
            })
        })
        .collect();

    quote
}

/// A price is a valid cents value only inside (0, 100); 0 and null both mean
/// "no price".
fn valid_cents(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0 && *v < 100.0)
}

// === Normalization ===

fn normalize_market(raw: &RawMarket) -> Option<NormalizedMarket> {
    let ticker = raw.ticker.trim();
    let title = raw.title.trim();
    if ticker.is_empty() || title.is_empty() {
        return None;
    }
    let resolution_dt = parse_iso(raw.expected_expiration_time.as_deref()?)?;

    let series_ticker = raw.series_ticker.as_deref().unwrap_or("");
    if let Some(sport) = sport_for_series(series_ticker, ticker) {
        return normalize_sports(raw, ticker, title, resolution_dt, sport, series_ticker);
    }
    normalize_crypto(raw, ticker, title, resolution_dt)
}

fn normalize_sports(
    raw: &RawMarket,
    ticker: &str,
    title: &str,
    resolution_dt: chrono::DateTime<Utc>,
    sport: &str,
    series_ticker: &str,
) -> Option<NormalizedMarket> {
    // yes_sub_title names the team this YES market is for
    let team_raw = raw
        .yes_sub_title
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| extract_winner_team(title))?;

    let (team_a, team_b) = extract_both_teams(title)?;
    let team = normalize_team_name(&team_raw);
    let norm_a = normalize_team_name(&team_a);
    let norm_b = normalize_team_name(&team_b);
    let opponent = if team == norm_a {
        norm_b
    } else if team == norm_b {
        norm_a
    } else if team_a.to_lowercase().contains(&team_raw.to_lowercase()) {
        norm_b
    } else {
        norm_a
    };

    if team.is_empty() || opponent.is_empty() {
        return None;
    }

    Some(NormalizedMarket {
        venue: Venue::Kalshi,
        platform_id: ticker.to_string(),
        asset_class: AssetClass::Sports,
        sport: Some(sport.to_string()),
        team: Some(team),
        opponent: Some(opponent),
        sport_subtype: Some(subtype_for_series(if series_ticker.is_empty() {
            ticker
        } else {
            series_ticker
        })),
        map_number: extract_map_number(title),
        crypto_asset: None,
        direction: None,
        threshold: None,
        resolution_dt,
        yes_token: ticker.to_string(),
        no_token: ticker.to_string(),
        raw_title: title.to_string(),
    })
}

fn normalize_crypto(
    raw: &RawMarket,
    ticker: &str,
    title: &str,
    resolution_dt: chrono::DateTime<Utc>,
) -> Option<NormalizedMarket> {
    let asset = extract_asset(title)?;

    // The asset lives in the title; direction and threshold live in the
    // subtitle ("$75,750 or above"). Parse the concatenation.
    let subtitle = raw
        .subtitle
        .as_deref()
        .or(raw.yes_sub_title.as_deref())
        .unwrap_or("");
    let combined = format!("{title} {subtitle}");

    let direction = extract_direction(subtitle)
        .or_else(|| extract_direction(&combined))
        .unwrap_or(Direction::Below);
    let threshold = extract_dollar_amount(&combined)?;

    Some(NormalizedMarket {
        venue: Venue::Kalshi,
        platform_id: ticker.to_string(),
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
        yes_token: ticker.to_string(),
        no_token: ticker.to_string(),
        raw_title: title.to_string(),
    })
}

// === Write-side trader ===

/// Authenticated order placement on venue A.
pub struct KalshiTrader {
    http: reqwest::Client,
    signer: KalshiSigner,
}

impl KalshiTrader {
    pub fn new(api_key: &str, private_key_pem: &str) -> VenueResult<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            signer: KalshiSigner::new(api_key, private_key_pem)?,
        })
    }

    /// Account cash balance in dollars (the wire field is integer cents).
    pub async fn get_balance(&self) -> VenueResult<f64> {
        let body: BalanceEnvelope = self
            .signed_get("/portfolio/balance", BALANCE_TIMEOUT)
            .await?;
        Ok(body.balance / 100.0)
    }

    /// Place a limit taker order. Returns the venue order id.
    pub async fn place_order(
        &self,
        ticker: &str,
        side: Side,
        action_buy: bool,
        count: i64,
        price_cents: i64,
    ) -> VenueResult<String> {
        if count < 1 {
            return Err(VenueError::Validation(format!("count must be ≥ 1, got {count}")));
        }
        if !(1..=99).contains(&price_cents) {
            return Err(VenueError::Validation(format!(
                "price must be 1–99 cents, got {price_cents}"
            )));
        }

        let body = OrderBody {
            ticker,
            client_order_id: uuid::Uuid::new_v4().to_string(),
            order_type: "limit",
            action: if action_buy { "buy" } else { "sell" },
            side: side.as_str(),
            count,
            yes_price: (side == Side::Yes).then_some(price_cents),
            no_price: (side == Side::No).then_some(price_cents),
        };

        let envelope: OrderEnvelope = self.signed_post("/portfolio/orders", &body).await?;
        if envelope.order.order_id.is_empty() {
            return Err(VenueError::Protocol("order response missing order_id".into()));
        }
        info!(
            "[KALSHI] {} {} {} ×{} @ {}¢ → id={}",
            if action_buy { "BUY" } else { "SELL" },
            side.as_str().to_uppercase(),
            ticker,
            count,
            price_cents,
            envelope.order.order_id,
        );
        Ok(envelope.order.order_id)
    }

    /// Cancel a resting order.
    pub async fn cancel(&self, order_id: &str) -> VenueResult<()> {
        let _: serde_json::Value = self
            .signed_delete(&format!("/portfolio/orders/{order_id}"))
            .await?;
        Ok(())
    }

    /// Fill state of an order. `fill_count` is the authoritative field - a
    /// cancelled order also reports remaining_count = 0.
    pub async fn get_fill(&self, order_id: &str) -> VenueResult<KalshiFill> {
        let envelope: OrderEnvelope = self
            .signed_get(&format!("/portfolio/orders/{order_id}"), FILL_TIMEOUT)
            .await?;
        Ok(KalshiFill {
            status: envelope.order.status.unwrap_or_default().to_lowercase(),
            fill_count: envelope.order.fill_count.unwrap_or(0),
            remaining_count: envelope.order.remaining_count.unwrap_or(0),
        })
    }

    /// Sell contracts back at the current bid. One attempt; the executor owns
    /// the retry schedule. Returns dollars recovered.
    pub async fn sell_at_bid(&self, ticker: &str, side: Side, count: i64) -> VenueResult<f64> {
        let envelope: MarketEnvelope = self
            .signed_get(&format!("/markets/{ticker}"), QUOTE_TIMEOUT)
            .await?;
        let bid = match side {
            Side::Yes => envelope.market.yes_bid,
            Side::No => envelope.market.no_bid,
        };
        let bid = valid_cents(bid).ok_or_else(|| {
            VenueError::InsufficientLiquidity(format!("no {} bid for {ticker}", side.as_str()))
        })?;

        let sell_price = (bid.floor() as i64).max(1);
        self.place_order(ticker, side, false, count, sell_price).await?;
        let recovered = count as f64 * sell_price as f64 / 100.0;
        info!(
            "[KALSHI] unwind SELL {} {ticker} ×{count} @ {sell_price}¢ - recovered ${recovered:.4}",
            side.as_str().to_uppercase(),
        );
        Ok(recovered)
    }

    // --- signed HTTP helpers ---

    async fn signed_get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        timeout: std::time::Duration,
    ) -> VenueResult<T> {
        let full_path = format!("{KALSHI_API_PATH_PREFIX}{path}");
        let (ts, sig) = self.signer.sign("GET", &full_path);
        let resp = self
            .http
            .get(format!("{KALSHI_BASE_URL}{path}"))
            .timeout(timeout)
            .header("KALSHI-ACCESS-KEY", self.signer.api_key())
            .header("KALSHI-ACCESS-SIGNATURE", sig)
            .header("KALSHI-ACCESS-TIMESTAMP", ts)
            .send()
            .await
            .map_err(VenueError::from_http)?;
        Self::parse(resp).await
    }

    async fn signed_post<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> VenueResult<T> {
        let full_path = format!("{KALSHI_API_PATH_PREFIX}{path}");
        let (ts, sig) = self.signer.sign("POST", &full_path);
        let resp = self
            .http
            .post(format!("{KALSHI_BASE_URL}{path}"))
            .timeout(ORDER_TIMEOUT)
            .header("KALSHI-ACCESS-KEY", self.signer.api_key())
            .header("KALSHI-ACCESS-SIGNATURE", sig)
            .header("KALSHI-ACCESS-TIMESTAMP", ts)
            .json(body)
            .send()
            .await
            .map_err(VenueError::from_http)?;
        Self::parse(resp).await
    }

    async fn signed_delete<T: serde::de::DeserializeOwned>(&self, path: &str) -> VenueResult<T> {
        let full_path = format!("{KALSHI_API_PATH_PREFIX}{path}");
        let (ts, sig) = self.signer.sign("DELETE", &full_path);
        let resp = self
            .http
            .delete(format!("{KALSHI_BASE_URL}{path}"))
            .timeout(FILL_TIMEOUT)
            .header("KALSHI-ACCESS-KEY", self.signer.api_key())
            .header("KALSHI-ACCESS-SIGNATURE", sig)
            .header("KALSHI-ACCESS-TIMESTAMP", ts)
            .send()
            .await
            .map_err(VenueError::from_http)?;
        Self::parse(resp).await
    }

    async fn parse<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> VenueResult<T> {
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                warn!("[KALSHI] auth rejected ({status}): {text}");
            }
            return Err(VenueError::from_status(status.as_u16(), text));
        }
        resp.json()
            .await
            .map_err(|e| VenueError::Protocol(format!("response decode: {e}")))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_sports(ticker: &str, series: &str, title: &str, team: &str) -> RawMarket {
        RawMarket {
            ticker: ticker.to_string(),
            title: title.to_string(),
            yes_sub_title: Some(team.to_string()),
            series_ticker: Some(series.to_string()),
            expected_expiration_time: Some("2026-02-22T18:00:00Z".to_string()),
            ..RawMarket::default()
        }
    }

    // =========================================================================
    // Series classification
    // =========================================================================

    #[test]
    fn test_sport_for_series() {
        assert_eq!(sport_for_series("KXCS2GAME", ""), Some("CS2"));
        assert_eq!(sport_for_series("KXLOLMAP", ""), Some("LOL"));
        assert_eq!(sport_for_series("KXNBAWIN", ""), Some("NBA"));
        assert_eq!(sport_for_series("", "KXNHLWIN-26FEB22-DET"), Some("NHL"));
        assert_eq!(sport_for_series("KXBTC", "KXBTC-26FEB21"), None);
    }

    #[test]
    fn test_subtype_from_ticker() {
        assert_eq!(subtype_for_series("KXCS2MAP"), SportSubtype::Map);
        assert_eq!(subtype_for_series("KXCS2GAME"), SportSubtype::Map);
        assert_eq!(subtype_for_series("KXNBAWIN"), SportSubtype::Series);
        assert_eq!(subtype_for_series("KXSOCCER"), SportSubtype::Series);
    }

    // =========================================================================
    // Sports normalization
    // =========================================================================

    #[test]
    fn test_normalize_sports_market() {
        let raw = raw_sports(
            "KXCS2GAME-26FEB22M80VOC-M80",
            "KXCS2GAME",
            "Will M80 win the M80 vs. Voca CS2 match?",
            "M80",
        );
        let m = normalize_market(&raw).expect("should normalize");
        assert_eq!(m.venue, Venue::Kalshi);
        assert_eq!(m.asset_class, AssetClass::Sports);
        assert_eq!(m.sport.as_deref(), Some("CS2"));
        assert_eq!(m.team.as_deref(), Some("m80"));
        assert_eq!(m.opponent.as_deref(), Some("voca"));
        assert_eq!(m.sport_subtype, Some(SportSubtype::Map));
        assert_eq!(m.map_number, None);
        // Venue-A YES/NO handles collapse to the ticker
        assert_eq!(m.yes_token, m.platform_id);
        assert_eq!(m.no_token, m.platform_id);
    }

    #[test]
    fn test_normalize_sports_with_map_number() {
        let raw = raw_sports(
            "KXLOLMAP-26FEB22T1DK-T1",
            "KXLOLMAP",
            "Will T1 win Map 2 of the T1 vs. DK LOL match?",
            "T1",
        );
        let m = normalize_market(&raw).expect("should normalize");
        assert_eq!(m.map_number, Some(2));
        assert_eq!(m.sport_subtype, Some(SportSubtype::Map));
    }

    #[test]
    fn test_normalize_sports_requires_opponent() {
        let mut raw = raw_sports("KXCS2GAME-X", "KXCS2GAME", "Will M80 win?", "M80");
        raw.title = "Will M80 win?".to_string();
        assert!(normalize_market(&raw).is_none());
    }

    // =========================================================================
    // Crypto normalization
    // =========================================================================

    #[test]
    fn test_normalize_crypto_market() {
        let raw = RawMarket {
            ticker: "KXBTC-26FEB21-T75750".to_string(),
            title: "Bitcoin price today at 5pm EST?".to_string(),
            subtitle: Some("$75,750 or above".to_string()),
            expected_expiration_time: Some("2026-02-21T22:00:00Z".to_string()),
            ..RawMarket::default()
        };
        let m = normalize_market(&raw).expect("should normalize");
        assert_eq!(m.asset_class, AssetClass::Crypto);
        assert_eq!(m.crypto_asset.as_deref(), Some("BTC"));
        assert_eq!(m.direction, Some(Direction::Above));
        assert_eq!(m.threshold, Some(75_750.0));
    }

    #[test]
    fn test_normalize_crypto_below_default() {
        let raw = RawMarket {
            ticker: "KXETH-26FEB21-B4000".to_string(),
            title: "Ethereum price today?".to_string(),
            subtitle: Some("$4,000 or lower".to_string()),
            expected_expiration_time: Some("2026-02-21T22:00:00Z".to_string()),
            ..RawMarket::default()
        };
        let m = normalize_market(&raw).expect("should normalize");
        assert_eq!(m.direction, Some(Direction::Below));
        assert_eq!(m.threshold, Some(4_000.0));
    }

    #[test]
    fn test_normalize_skips_unparseable() {
        let raw = RawMarket {
            ticker: "KXWEATHER-X".to_string(),
            title: "High temp in NYC?".to_string(),
            expected_expiration_time: Some("2026-02-21T22:00:00Z".to_string()),
            ..RawMarket::default()
        };
        assert!(normalize_market(&raw).is_none());
    }

    // =========================================================================
    // Orderbook-derived quotes
    // =========================================================================

    #[test]
    fn test_quote_from_book() {
        // Bids ascending, best last. Best NO bid 55 → yes ask 45.
        let book = RawOrderbook {
            yes: vec![(30.0, 10.0), (40.0, 20.0)],
            no: vec![(50.0, 5.0), (55.0, 7.0)],
        };
        let q = quote_from_book(&book);
        assert_eq!(q.yes_ask_cents, Some(45.0));
        assert_eq!(q.yes_depth, Some(7.0));
        assert_eq!(q.no_ask_cents, Some(60.0));
        assert_eq!(q.no_depth, Some(20.0));
        // Ladders are canonical best-first (ascending price)
        assert_eq!(q.yes_ladder[0].price_cents, 45.0);
        assert_eq!(q.yes_ladder[1].price_cents, 50.0);
    }

    #[test]
    fn test_quote_from_empty_book_stays_none() {
        let book = RawOrderbook::default();
        let q = quote_from_book(&book);
        // Empty sides are infinite cost, never zero
        assert_eq!(q.yes_ask_cents, None);
        assert_eq!(q.no_ask_cents, None);
    }

    #[test]
    fn test_valid_cents_bounds() {
        assert_eq!(valid_cents(Some(0.0)), None);
        assert_eq!(valid_cents(Some(100.0)), None);
        assert_eq!(valid_cents(Some(50.0)), Some(50.0));
        assert_eq!(valid_cents(None), None);
    }
}
