//! System configuration: fixed venue constants plus env-tunable knobs.
//!
//! Everything tunable lives on [`Config`], built once at startup and threaded
//! through constructors. Credentials are collected into [`Credentials`] and
//! never logged.

use std::time::Duration;

/// Venue-A (integer-cent CLOB) REST base URL.
pub const KALSHI_BASE_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";

/// Path prefix included in the signed message (everything after the domain).
pub const KALSHI_API_PATH_PREFIX: &str = "/trade-api/v2";

/// Venue-B market discovery (Gamma) base URL.
pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";

/// Venue-B CLOB base URL (books, orders, auth).
pub const CLOB_API_URL: &str = "https://clob.polymarket.com";

/// Polygon mainnet chain id, used for venue-B order signing.
pub const POLYGON_CHAIN_ID: u64 = 137;

/// Venue-A market list page size (API max).
pub const KALSHI_PAGE_LIMIT: usize = 1000;

/// Venue-B market list page size (API max).
pub const GAMMA_PAGE_LIMIT: usize = 500;

/// Venue-A list-pagination rate limit, requests per second.
pub const KALSHI_LIST_RATE_LIMIT_PER_SEC: u32 = 10;

/// Per-call deadline for quote fetches.
pub const QUOTE_TIMEOUT: Duration = Duration::from_secs(2);
/// Per-call deadline for order placement.
pub const ORDER_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-call deadline for fill queries and cancels.
pub const FILL_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-call deadline for balance queries.
pub const BALANCE_TIMEOUT: Duration = Duration::from_secs(5);

/// Venue-A taker fee: 1.75% of face value (filled contracts × $1).
pub const KALSHI_TAKER_FEE_RATE: f64 = 0.0175;

/// Pause between leg 1 placement and the fill check.
pub const LEG1_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Paper mode: virtual wallet per venue.
pub const PAPER_CAPITAL_PER_VENUE_USD: f64 = 10_000.0;

/// Run mode selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Detect and record opportunities; never place orders.
    Scan,
    /// Full executor control flow against a simulator and virtual wallets.
    Paper,
    /// Real orders on both venues (requires credentials).
    Live,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Scan => write!(f, "scan"),
            Mode::Paper => write!(f, "paper"),
            Mode::Live => write!(f, "live"),
        }
    }
}

/// Tunable configuration, with env-var overrides for the operational knobs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seconds between full market-list refresh + re-match (slow loop).
    pub market_refresh_secs: u64,
    /// Seconds between price polls (fast loop).
    pub price_poll_secs: u64,
    /// Only markets resolving within this many hours are considered.
    pub scan_window_hours: i64,
    /// Max |Δ resolution time| for a sports pair.
    pub sports_time_tolerance_hours: i64,
    /// Max |Δ resolution time| for a crypto pair.
    pub crypto_time_tolerance_hours: i64,
    /// Crypto matching feature flag (off by default).
    pub crypto_matching_enabled: bool,
    /// Minimum spread in cents for an opportunity.
    pub min_spread_cents: f64,
    /// Parallel quote-fetch workers.
    pub fetch_workers: usize,
    /// Max combined spend per trade, USD.
    pub exec_max_trade_usd: f64,
    /// Hard per-trade unit cap on thin map markets.
    pub exec_max_units_per_map: i64,
    /// Cumulative session unit cap per venue-A market.
    pub exec_max_units_per_market: i64,
    /// Venue-B per-leg minimum order value, USD.
    pub exec_poly_min_order_usd: f64,
    /// Cooldown after a terminal execution, in price cycles.
    pub exec_cooldown_cycles: u64,
    /// Shorter cooldown after a venue-A no-fill.
    pub exec_no_fill_cooldown_cycles: u64,
    /// Delay before the first unwind attempt.
    pub exec_unwind_delay: Duration,
    /// Backoff after HTTP 429 during refresh.
    pub refresh_backoff: Duration,
    /// Consecutive refresh failures before the refresh aborts (old set kept).
    pub refresh_max_failures: u32,
    /// SQLite path for live/scan runs.
    pub db_path: String,
    /// SQLite path for paper runs, kept separate so simulated data never
    /// pollutes real trade history.
    pub paper_db_path: String,
    /// NDJSON output, one line per tick that produced opportunities.
    pub ndjson_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            market_refresh_secs: 7200,
            price_poll_secs: 2,
            scan_window_hours: 72,
            sports_time_tolerance_hours: 4,
            crypto_time_tolerance_hours: 1,
            crypto_matching_enabled: false,
            min_spread_cents: 3.3,
            fetch_workers: 20,
            exec_max_trade_usd: 50.0,
            exec_max_units_per_map: 100,
            exec_max_units_per_market: 400,
            exec_poly_min_order_usd: 1.0,
            exec_cooldown_cycles: 30,
            exec_no_fill_cooldown_cycles: 15,
            exec_unwind_delay: Duration::from_secs(2),
            refresh_backoff: Duration::from_secs(30),
            refresh_max_failures: 3,
            db_path: "arb.db".to_string(),
            paper_db_path: "arb_paper.db".to_string(),
            ndjson_path: "opportunities.ndjson".to_string(),
        }
    }
}

impl Config {
    /// Build a config from defaults plus env-var overrides.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_parse::<f64>("MIN_SPREAD_CENTS") {
            cfg.min_spread_cents = v;
        }
        if let Some(v) = env_parse::<f64>("EXEC_MAX_TRADE_USD") {
            cfg.exec_max_trade_usd = v;
        }
        if let Some(v) = env_parse::<i64>("EXEC_MAX_UNITS_PER_MAP") {
            cfg.exec_max_units_per_map = v;
        }
        if let Some(v) = env_parse::<i64>("EXEC_MAX_UNITS_PER_MARKET") {
            cfg.exec_max_units_per_market = v;
        }
        if let Some(v) = env_parse::<f64>("EXEC_POLY_MIN_ORDER_USD") {
            cfg.exec_poly_min_order_usd = v;
        }
        if let Some(v) = env_parse::<u64>("EXEC_COOLDOWN_CYCLES") {
            cfg.exec_cooldown_cycles = v;
        }
        if let Some(v) = env_parse::<u64>("MARKET_REFRESH_SECONDS") {
            cfg.market_refresh_secs = v;
        }
        if let Some(v) = env_parse::<u64>("PRICE_POLL_SECONDS") {
            cfg.price_poll_secs = v;
        }
        if let Some(v) = env_parse::<u64>("EXEC_UNWIND_DELAY_SECONDS") {
            cfg.exec_unwind_delay = Duration::from_secs(v);
        }
        cfg.crypto_matching_enabled = std::env::var("CRYPTO_MATCHING_ENABLED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(cfg.crypto_matching_enabled);
        cfg
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Credentials for both venues, loaded from the environment.
///
/// Venue-A: API key id + RSA private key (PEM, literal `\n` escapes tolerated).
/// Venue-B: wallet private key, optional pre-derived API credentials, and the
/// funder (proxy maker) address.
#[derive(Clone)]
pub struct Credentials {
    pub venue_a_key: String,
    pub venue_a_secret_pem: String,
    pub venue_b_priv_key: String,
    pub venue_b_api_key: Option<String>,
    pub venue_b_api_secret: Option<String>,
    pub venue_b_api_passphrase: Option<String>,
    pub venue_b_funder: Option<String>,
}

impl Credentials {
    /// Load credentials from the environment. Returns `None` when either
    /// venue's required variables are absent (scan-only operation).
    pub fn from_env() -> Option<Self> {
        let venue_a_key = std::env::var("VENUE_A_KEY").ok()?;
        let venue_a_secret_pem = std::env::var("VENUE_A_SECRET").ok()?;
        let venue_b_priv_key = std::env::var("VENUE_B_PRIV_KEY").ok()?;
        Some(Self {
            venue_a_key,
            venue_a_secret_pem,
            venue_b_priv_key,
            venue_b_api_key: std::env::var("VENUE_B_API_KEY").ok(),
            venue_b_api_secret: std::env::var("VENUE_B_API_SECRET").ok(),
            venue_b_api_passphrase: std::env::var("VENUE_B_API_PASSPHRASE").ok(),
            venue_b_funder: std::env::var("VENUE_B_FUNDER").ok(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key_prefix: String = self.venue_a_key.chars().take(8).collect();
        f.debug_struct("Credentials")
            .field("venue_a_key", &format!("{key_prefix}..."))
            .field("venue_a_secret_pem", &"[REDACTED]")
            .field("venue_b_priv_key", &"[REDACTED]")
            .field("venue_b_funder", &self.venue_b_funder)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_loop_timing() {
        let cfg = Config::default();
        assert_eq!(cfg.market_refresh_secs, 7200);
        assert_eq!(cfg.price_poll_secs, 2);
        assert_eq!(cfg.scan_window_hours, 72);
        assert_eq!(cfg.sports_time_tolerance_hours, 4);
        assert_eq!(cfg.crypto_time_tolerance_hours, 1);
        assert!(!cfg.crypto_matching_enabled);
        assert_eq!(cfg.fetch_workers, 20);
        assert!((cfg.min_spread_cents - 3.3).abs() < 1e-9);
    }
}
