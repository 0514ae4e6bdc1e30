//! Two-leg cross-venue executor.
//!
//! Takes a confirmed [`Opportunity`] and executes both legs, venue A first:
//!
//!   1. Venue-B balance gate.
//!   2. Venue-A taker at the detected price (leg 1).
//!   3. Settle pause, then fill verification; a partial fill cancels the
//!      resting remainder and shrinks the position.
//!   4. Venue-B FOK taker at the (possibly blended) price (leg 2).
//!   5. On leg-2 failure: unwind the venue-A leg at the current bid, up to
//!      three attempts - `unwound` on success, `partial_stuck` on exhaustion.
//!
//! Sizing caps the position by budget, depth on both sides, and the per-map
//! unit cap; when the venue-B best-ask depth cannot satisfy the venue
//! minimum, the ask ladder is walked and the spread re-checked at the
//! blended price.
//!
//! Cooldowns are indexed by pair (not by strategy) and doubled after an
//! unwind or a stuck position.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::{Config, KALSHI_TAKER_FEE_RATE, LEG1_SETTLE_DELAY};
use crate::error::{VenueError, VenueResult};
use crate::guard::ExecutorGuard;
use crate::kalshi::{KalshiFill, KalshiTrader};
use crate::polymarket_clob::PolyTrader;
use crate::storage::{StorageChannel, TradeRecord};
use crate::types::{LadderLevel, Opportunity, Side};

const UNWIND_MAX_ATTEMPTS: u32 = 3;
const UNWIND_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Balance deltas beyond this gap trigger a reconciliation warning.
const RECONCILE_GAP_USD: f64 = 0.50;

// === Venue execution seams ===

/// Venue-A order capabilities consumed by the executor. Implemented by the
/// live trader, the paper simulator, and test mocks.
#[async_trait]
pub trait KalshiExecution: Send + Sync {
    async fn get_balance(&self) -> VenueResult<f64>;
    /// Place a limit taker buy; returns the order id.
    async fn place_taker(
        &self,
        ticker: &str,
        side: Side,
        count: i64,
        price_cents: i64,
    ) -> VenueResult<String>;
    async fn cancel(&self, order_id: &str) -> VenueResult<()>;
    async fn get_fill(&self, order_id: &str) -> VenueResult<KalshiFill>;
    /// Sell contracts back at the current bid; returns dollars recovered.
    async fn sell_at_bid(&self, ticker: &str, side: Side, count: i64) -> VenueResult<f64>;
}

/// Venue-B order capabilities consumed by the executor.
#[async_trait]
pub trait PolyExecution: Send + Sync {
    async fn get_balance(&self) -> VenueResult<f64>;
    /// Place a FOK limit buy for `size` shares at `price` (0–1 fraction);
    /// returns the order id.
    async fn place_fok_buy(&self, token_id: &str, price: f64, size: f64) -> VenueResult<String>;
    /// Matched share count for an order.
    async fn get_fill(&self, order_id: &str) -> VenueResult<f64>;
}

#[async_trait]
impl KalshiExecution for KalshiTrader {
    async fn get_balance(&self) -> VenueResult<f64> {
        KalshiTrader::get_balance(self).await
    }
    async fn place_taker(
        &self,
        ticker: &str,
        side: Side,
        count: i64,
        price_cents: i64,
    ) -> VenueResult<String> {
        self.place_order(ticker, side, true, count, price_cents).await
    }
    async fn cancel(&self, order_id: &str) -> VenueResult<()> {
        KalshiTrader::cancel(self, order_id).await
    }
    async fn get_fill(&self, order_id: &str) -> VenueResult<KalshiFill> {
        KalshiTrader::get_fill(self, order_id).await
    }
    async fn sell_at_bid(&self, ticker: &str, side: Side, count: i64) -> VenueResult<f64> {
        KalshiTrader::sell_at_bid(self, ticker, side, count).await
    }
}

#[async_trait]
impl PolyExecution for PolyTrader {
    async fn get_balance(&self) -> VenueResult<f64> {
        PolyTrader::get_balance(self).await
    }
    async fn place_fok_buy(&self, token_id: &str, price: f64, size: f64) -> VenueResult<String> {
        PolyTrader::place_fok_buy(self, token_id, price, size).await
    }
    async fn get_fill(&self, order_id: &str) -> VenueResult<f64> {
        PolyTrader::get_fill(self, order_id).await
    }
}

// === Results ===

/// Terminal state of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Filled,
    Skipped,
    Unwound,
    PartialStuck,
    Error,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Filled => "filled",
            ExecutionStatus::Skipped => "skipped",
            ExecutionStatus::Unwound => "unwound",
            ExecutionStatus::PartialStuck => "partial_stuck",
            ExecutionStatus::Error => "error",
        }
    }
}

/// Full record of one execution attempt, persisted to the trades table.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub status: ExecutionStatus,
    pub reason: String,
    pub requested_units: i64,
    pub k_filled: i64,
    pub p_filled: i64,
    pub k_price_cents: f64,
    pub p_price_cents: f64,
    pub k_cost_usd: f64,
    pub p_cost_usd: f64,
    pub total_cost_usd: f64,
    pub locked_profit_usd: f64,
    pub k_fee_usd: f64,
    pub net_profit_usd: f64,
    pub k_order_id: String,
    pub p_order_id: String,
    pub p_balance_before: Option<f64>,
    pub unwind_recovered_usd: f64,
}

impl ExecutionReport {
    fn skipped(reason: &str) -> Self {
        Self {
            status: ExecutionStatus::Skipped,
            reason: reason.to_string(),
            requested_units: 0,
            k_filled: 0,
            p_filled: 0,
            k_price_cents: 0.0,
            p_price_cents: 0.0,
            k_cost_usd: 0.0,
            p_cost_usd: 0.0,
            total_cost_usd: 0.0,
            locked_profit_usd: 0.0,
            k_fee_usd: 0.0,
            net_profit_usd: 0.0,
            k_order_id: String::new(),
            p_order_id: String::new(),
            p_balance_before: None,
            unwind_recovered_usd: 0.0,
        }
    }
}

// === Position sizing ===

/// Sized position: unit count and the effective (possibly blended) venue-B
/// price in cents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    pub units: i64,
    pub p_price_cents: f64,
}

/// Size a position against budget, depth, and the per-map cap, walking the
/// venue-B ask ladder when the best-ask depth cannot satisfy the venue
/// minimum order value.
///
/// Returns `None` when no tradable size exists (including a spread that
/// collapses below the minimum at the blended price).
pub fn calc_units(
    k_price_cents: f64,
    p_price_cents: f64,
    k_depth: Option<f64>,
    p_depth: Option<f64>,
    p_ladder: &[LadderLevel],
    cfg: &Config,
) -> Option<Sizing> {
    if k_price_cents <= 0.0 || p_price_cents <= 0.0 {
        return None;
    }

    let combined = k_price_cents + p_price_cents;
    let mut units = (cfg.exec_max_trade_usd * 100.0 / combined).floor() as i64;
    if let Some(k) = k_depth {
        units = units.min(k as i64);
    }
    if let Some(p) = p_depth {
        units = units.min(p as i64);
    }
    units = units.min(cfg.exec_max_units_per_map);
    if units < 1 {
        return None;
    }

    let min_spend_cents = cfg.exec_poly_min_order_usd * 100.0;
    if units as f64 * p_price_cents >= min_spend_cents {
        return Some(Sizing {
            units,
            p_price_cents,
        });
    }

    // Book-walk: collect shares at successively worse prices until the
    // cumulative venue-B spend reaches the minimum or the ladder runs dry.
    if p_ladder.is_empty() {
        return None;
    }
    let mut collected: i64 = 0;
    let mut spent_cents = 0.0;
    'walk: for level in p_ladder {
        let mut available = level.size.floor() as i64;
        while available > 0 && spent_cents < min_spend_cents {
            let needed = ((min_spend_cents - spent_cents) / level.price_cents).ceil() as i64;
            let take = needed.min(available);
            collected += take;
            spent_cents += take as f64 * level.price_cents;
            available -= take;
        }
        if spent_cents >= min_spend_cents {
            break 'walk;
        }
    }
    if spent_cents < min_spend_cents {
        return None;
    }

    let blended = spent_cents / collected as f64;

    // Re-evaluate the arbitrage at the blended (worse) price
    let blended_spread = 100.0 - k_price_cents - blended;
    if blended_spread < cfg.min_spread_cents {
        return None;
    }

    // Re-cap against venue-A depth and the budget at the blended combined cost
    let blended_combined = k_price_cents + blended;
    let max_by_usd = (cfg.exec_max_trade_usd * 100.0 / blended_combined).floor() as i64;
    let max_by_k = k_depth.map(|k| k as i64).unwrap_or(collected);
    let final_units = collected.min(max_by_k).min(max_by_usd);
    if final_units < collected && (final_units as f64 * blended) < min_spend_cents {
        return None;
    }
    if final_units < 1 {
        return None;
    }

    Some(Sizing {
        units: final_units,
        p_price_cents: blended,
    })
}

// === Executor ===

pub struct TwoLegExecutor {
    kalshi: Arc<dyn KalshiExecution>,
    poly: Arc<dyn PolyExecution>,
    cfg: Config,
    guard: ExecutorGuard,
    /// Pair key → price cycle at which the pair becomes eligible again.
    cooldowns: Mutex<FxHashMap<String, u64>>,
    cycle: AtomicU64,
    /// Venue-A market → cumulative units filled this session.
    market_units: Mutex<FxHashMap<String, i64>>,
}

impl TwoLegExecutor {
    pub fn new(
        kalshi: Arc<dyn KalshiExecution>,
        poly: Arc<dyn PolyExecution>,
        cfg: Config,
    ) -> Self {
        let guard = ExecutorGuard::new(cfg.exec_max_units_per_market * 16, 5);
        Self {
            kalshi,
            poly,
            cfg,
            guard,
            cooldowns: Mutex::new(FxHashMap::default()),
            cycle: AtomicU64::new(0),
            market_units: Mutex::new(FxHashMap::default()),
        }
    }

    /// Advance the cycle counter; called once per price poll cycle.
    pub fn tick(&self) {
        self.cycle.fetch_add(1, Ordering::SeqCst);
    }

    /// True while the pair's cooldown window is still open.
    pub fn is_on_cooldown(&self, opp: &Opportunity) -> bool {
        let cycle = self.cycle.load(Ordering::SeqCst);
        let cooldowns = self.cooldowns.lock().expect("cooldown lock");
        cycle < cooldowns.get(&opp.pair.key()).copied().unwrap_or(0)
    }

    fn set_cooldown(&self, opp: &Opportunity, cycles: u64) {
        let until = self.cycle.load(Ordering::SeqCst) + cycles;
        self.cooldowns
            .lock()
            .expect("cooldown lock")
            .insert(opp.pair.key(), until);
    }

    /// Execute both legs of one opportunity through to a terminal state.
    pub async fn execute(&self, opp: &Opportunity) -> ExecutionReport {
        let km = &opp.pair.kalshi;
        let k_side = opp.kalshi_side();
        let poly_token = opp.poly_token_id();

        // Session cap per venue-A market - checked before any API traffic
        let units_so_far = {
            let map = self.market_units.lock().expect("market units lock");
            map.get(&km.platform_id).copied().unwrap_or(0)
        };
        if units_so_far >= self.cfg.exec_max_units_per_market {
            info!(
                "[EXEC] SKIP {} | per-market cap reached ({units_so_far}/{})",
                km.platform_id, self.cfg.exec_max_units_per_market,
            );
            self.set_cooldown(opp, self.cfg.exec_no_fill_cooldown_cycles);
            return ExecutionReport::skipped("market_cap_reached");
        }

        if let Err(refusal) = self.guard.can_execute(opp.tradeable_units.unwrap_or(1)) {
            info!("[EXEC] SKIP {} | guard: {refusal}", km.platform_id);
            self.set_cooldown(opp, self.cfg.exec_cooldown_cycles);
            return ExecutionReport::skipped("executor_halted");
        }

        // --- 1. Venue-B balance gate ---
        let p_balance = match self.poly.get_balance().await {
            Ok(b) => b,
            Err(e) => {
                warn!("[EXEC] could not fetch venue-B balance: {e} - skipping");
                if e.is_auth() {
                    self.guard.pause_auth();
                }
                self.set_cooldown(opp, self.cfg.exec_cooldown_cycles);
                return ExecutionReport::skipped("balance_check_failed");
            }
        };
        if p_balance < self.cfg.exec_poly_min_order_usd {
            warn!(
                "[EXEC] SKIP {} | venue-B balance ${p_balance:.2} < min ${:.2}",
                km.platform_id, self.cfg.exec_poly_min_order_usd,
            );
            self.set_cooldown(opp, self.cfg.exec_cooldown_cycles);
            let mut report = ExecutionReport::skipped("low_balance");
            report.p_balance_before = Some(p_balance);
            return report;
        }

        let k_balance = self.kalshi.get_balance().await.ok();

        // --- 2. Sizing (may walk the venue-B book) ---
        let Some(sizing) = calc_units(
            opp.k_cost_cents,
            opp.p_cost_cents,
            opp.k_depth,
            opp.p_depth,
            &opp.p_ladder,
            &self.cfg,
        ) else {
            info!(
                "[EXEC] SKIP {} | no tradable size (k={:.1}c p={:.1}c)",
                km.platform_id, opp.k_cost_cents, opp.p_cost_cents,
            );
            self.set_cooldown(opp, self.cfg.exec_cooldown_cycles);
            let mut report = ExecutionReport::skipped("insufficient_units");
            report.p_balance_before = Some(p_balance);
            return report;
        };
        let mut units = sizing.units;
        let p_price_cents = sizing.p_price_cents;
        let k_price_int = opp.k_cost_cents.round() as i64;

        info!(
            "[EXEC] {} | strategy {} | A-{} @ {}¢  B @ {:.2}¢ | {} units | spread={:.2}c",
            km.platform_id,
            opp.strategy,
            k_side.as_str().to_uppercase(),
            k_price_int,
            p_price_cents,
            units,
            opp.spread_cents,
        );

        // --- 3. Leg 1: venue A ---
        let k_order_id = match self
            .kalshi
            .place_taker(&km.platform_id, k_side, units, k_price_int)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!("[EXEC] venue-A leg failed: {e}");
                if e.is_auth() {
                    self.guard.pause_auth();
                } else {
                    self.guard.record_error();
                }
                let cycles = if e.is_conflict() {
                    // Position limit / non-tradeable: cool down much longer
                    self.cfg.exec_cooldown_cycles * 6
                } else {
                    self.cfg.exec_cooldown_cycles
                };
                self.set_cooldown(opp, cycles);
                let mut report = ExecutionReport::skipped(if e.is_conflict() {
                    "kalshi_conflict"
                } else {
                    "kalshi_leg_failed"
                });
                report.p_balance_before = Some(p_balance);
                return report;
            }
        };

        // --- 4. Settle pause, then verify the actual fill ---
        tokio::time::sleep(LEG1_SETTLE_DELAY).await;
        match self.kalshi.get_fill(&k_order_id).await {
            Ok(fill) => {
                if fill.remaining_count > 0 && !fill.is_cancelled() {
                    // Cancel the resting remainder so it cannot fill unhedged later
                    if let Err(e) = self.kalshi.cancel(&k_order_id).await {
                        warn!("[EXEC] could not cancel resting remainder: {e}");
                    } else {
                        info!(
                            "[EXEC] venue-A partial fill {}/{units} - cancelled resting {}",
                            fill.fill_count, fill.remaining_count,
                        );
                    }
                }
                if fill.fill_count < 1 {
                    info!("[EXEC] SKIP {} | venue-A 0-fill - venue B untouched", km.platform_id);
                    self.set_cooldown(opp, self.cfg.exec_cooldown_cycles);
                    let mut report = ExecutionReport::skipped("no_fill");
                    report.requested_units = units;
                    report.k_order_id = k_order_id;
                    report.p_balance_before = Some(p_balance);
                    return report;
                }
                if fill.fill_count < units {
                    info!(
                        "[EXEC] adjusting venue-B size {units} → {} (actual venue-A fill)",
                        fill.fill_count,
                    );
                    units = fill.fill_count;
                }
            }
            Err(e) => {
                warn!("[EXEC] could not verify venue-A fill ({e}) - assuming {units} filled");
            }
        }

        let requested_units = sizing.units;
        let k_cost_usd = units as f64 * k_price_int as f64 / 100.0;

        // --- 5. Leg 2: venue B (FOK) ---
        let p_order_id = match self
            .poly
            .place_fok_buy(poly_token, p_price_cents / 100.0, units as f64)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("[EXEC] venue-B leg FAILED after venue-A fill: {e}");
                if e.is_auth() {
                    self.guard.pause_auth();
                }
                None
            }
        };

        let p_filled = match &p_order_id {
            Some(id) => match self.poly.get_fill(id).await {
                Ok(matched) => matched,
                Err(e) => {
                    warn!("[EXEC] could not verify venue-B fill ({e}) - assuming {units}");
                    units as f64
                }
            },
            None => 0.0,
        };

        if p_filled < 1.0 {
            // Leg 2 dead: unwind the venue-A position
            return self
                .unwind(
                    opp,
                    k_side,
                    units,
                    requested_units,
                    k_price_int,
                    p_price_cents,
                    k_order_id,
                    p_order_id.unwrap_or_default(),
                    k_balance,
                    p_balance,
                )
                .await;
        }

        let a_filled = units;
        let p_units = p_filled as i64;
        let hedged = p_units.min(a_filled);
        if p_units < a_filled {
            warn!(
                "[EXEC] venue-B partial fill {p_units}/{a_filled} - {} venue-A units unhedged",
                a_filled - p_units,
            );
        }

        // --- 6. Both legs filled ---
        let spread = 100.0 - opp.k_cost_cents - p_price_cents;
        let p_cost_usd = p_units as f64 * p_price_cents / 100.0;
        let total_cost_usd = k_cost_usd + p_cost_usd;
        let locked_profit_usd = hedged as f64 * spread / 100.0;
        let k_fee_usd = a_filled as f64 * KALSHI_TAKER_FEE_RATE;
        let net_profit_usd = locked_profit_usd - k_fee_usd;

        info!(
            "[EXEC] FILLED {} | {hedged} hedged units | A=${k_cost_usd:.4} B=${p_cost_usd:.4} total=${total_cost_usd:.4} | locked=${locked_profit_usd:.4} net=${net_profit_usd:.4}",
            km.platform_id,
        );

        {
            let mut map = self.market_units.lock().expect("market units lock");
            *map.entry(km.platform_id.clone()).or_insert(0) += hedged;
        }
        self.guard.record_success(hedged);
        self.set_cooldown(opp, self.cfg.exec_cooldown_cycles);

        self.reconcile(&km.platform_id, k_balance, Some(p_balance), -k_cost_usd, -p_cost_usd)
            .await;

        ExecutionReport {
            status: ExecutionStatus::Filled,
            reason: String::new(),
            requested_units,
            k_filled: a_filled,
            p_filled: p_units,
            k_price_cents: k_price_int as f64,
            p_price_cents,
            k_cost_usd,
            p_cost_usd,
            total_cost_usd,
            locked_profit_usd,
            k_fee_usd,
            net_profit_usd,
            k_order_id,
            p_order_id: p_order_id.unwrap_or_default(),
            p_balance_before: Some(p_balance),
            unwind_recovered_usd: 0.0,
        }
    }

    /// Sell the filled venue-A leg back at the bid. First attempt after the
    /// configured settle delay, then fixed retry pauses, three attempts total.
    #[allow(clippy::too_many_arguments)]
    async fn unwind(
        &self,
        opp: &Opportunity,
        k_side: Side,
        units: i64,
        requested_units: i64,
        k_price_int: i64,
        p_price_cents: f64,
        k_order_id: String,
        p_order_id: String,
        k_balance: Option<f64>,
        p_balance: f64,
    ) -> ExecutionReport {
        let km = &opp.pair.kalshi;
        warn!(
            "[EXEC] venue-B 0-fill after venue-A filled {units} - unwinding {}",
            km.platform_id,
        );

        let mut recovered = 0.0;
        let mut unwound = false;
        for attempt in 1..=UNWIND_MAX_ATTEMPTS {
            let delay = if attempt == 1 {
                self.cfg.exec_unwind_delay
            } else {
                UNWIND_RETRY_DELAY
            };
            tokio::time::sleep(delay).await;

            match self.kalshi.sell_at_bid(&km.platform_id, k_side, units).await {
                Ok(usd) => {
                    recovered = usd;
                    unwound = true;
                    break;
                }
                Err(e) => {
                    if attempt < UNWIND_MAX_ATTEMPTS {
                        warn!("[EXEC] unwind attempt {attempt}/{UNWIND_MAX_ATTEMPTS} failed ({e}), retrying");
                    } else {
                        error!(
                            "[EXEC] unwind FAILED after {UNWIND_MAX_ATTEMPTS} attempts for {} ×{units} - PARTIAL STUCK",
                            km.platform_id,
                        );
                    }
                }
            }
        }

        // Doubled cooldown after either unwind outcome
        self.set_cooldown(opp, self.cfg.exec_cooldown_cycles * 2);
        if !unwound {
            self.guard.record_error();
        }

        let k_cost_usd = units as f64 * k_price_int as f64 / 100.0;
        self.reconcile(&km.platform_id, k_balance, Some(p_balance), -k_cost_usd + recovered, 0.0)
            .await;

        ExecutionReport {
            status: if unwound {
                ExecutionStatus::Unwound
            } else {
                ExecutionStatus::PartialStuck
            },
            reason: "poly_0_fill".to_string(),
            requested_units,
            k_filled: units,
            p_filled: 0,
            k_price_cents: k_price_int as f64,
            p_price_cents,
            k_cost_usd,
            p_cost_usd: 0.0,
            total_cost_usd: k_cost_usd,
            locked_profit_usd: 0.0,
            k_fee_usd: units as f64 * KALSHI_TAKER_FEE_RATE,
            net_profit_usd: recovered - k_cost_usd,
            k_order_id,
            p_order_id,
            p_balance_before: Some(p_balance),
            unwind_recovered_usd: recovered,
        }
    }

    /// Re-fetch both balances after a terminal trade and compare the deltas
    /// with what the fills imply; a gap beyond the threshold is warned about.
    async fn reconcile(
        &self,
        label: &str,
        k_before: Option<f64>,
        p_before: Option<f64>,
        expected_k_delta: f64,
        expected_p_delta: f64,
    ) {
        let k_after = self.kalshi.get_balance().await.ok();
        let p_after = self.poly.get_balance().await.ok();

        if let (Some(before), Some(after)) = (k_before, k_after) {
            let actual = after - before;
            if (actual - expected_k_delta).abs() > RECONCILE_GAP_USD {
                warn!(
                    "[EXEC] RECONCILE {label} | venue-A delta ${actual:.4} vs expected ${expected_k_delta:.4} - verify settlement",
                );
            }
        }
        if let (Some(before), Some(after)) = (p_before, p_after) {
            let actual = after - before;
            if (actual - expected_p_delta).abs() > RECONCILE_GAP_USD {
                warn!(
                    "[EXEC] RECONCILE {label} | venue-B delta ${actual:.4} vs expected ${expected_p_delta:.4} - verify settlement",
                );
            }
        }
    }
}

// === Execution channel + loop ===

pub fn create_execution_channel() -> (mpsc::Sender<Opportunity>, mpsc::Receiver<Opportunity>) {
    mpsc::channel(256)
}

/// Drain the execution channel, driving each opportunity to a terminal state
/// and persisting the trade record. One consumer: executions are serial
/// across pairs, which also satisfies the per-pair ordering requirement.
pub async fn run_execution_loop(
    mut rx: mpsc::Receiver<Opportunity>,
    executor: Arc<TwoLegExecutor>,
    storage: StorageChannel,
    paper_stats: Option<Arc<Mutex<PaperStats>>>,
) {
    info!("[EXEC] execution loop started");

    while let Some(opp) = rx.recv().await {
        let report = executor.execute(&opp).await;

        match report.status {
            ExecutionStatus::PartialStuck => warn!(
                "[EXEC] ⚠️ PARTIAL STUCK {} | {} venue-A units unhedged",
                opp.pair.key(),
                report.k_filled,
            ),
            ExecutionStatus::Filled => {}
            _ => info!(
                "[EXEC] result {} | {} {}",
                opp.pair.key(),
                report.status.as_str(),
                report.reason,
            ),
        }

        if let Some(stats) = &paper_stats {
            stats.lock().expect("paper stats lock").record(&opp, &report);
        }

        storage.record_trade(TradeRecord::from_execution(&opp, &report));
    }

    info!("[EXEC] execution loop stopped");
}

// === Paper statistics ===

/// Virtual-wallet running totals for paper mode.
#[derive(Debug, Default)]
pub struct PaperStats {
    pub trade_count: u64,
    pub total_invested: f64,
    pub total_gross_profit: f64,
    pub total_fees: f64,
    pub best_profit: f64,
    pub best_label: String,
    pub worst_profit: f64,
    pub worst_label: String,
}

impl PaperStats {
    pub fn record(&mut self, opp: &Opportunity, report: &ExecutionReport) {
        if report.status != ExecutionStatus::Filled {
            return;
        }
        self.trade_count += 1;
        self.total_invested += report.total_cost_usd;
        self.total_gross_profit += report.locked_profit_usd;
        self.total_fees += report.k_fee_usd;

        let label = format!(
            "{} | {:.1}c spread | {} units",
            opp.pair.kalshi.platform_id, opp.spread_cents, report.k_filled,
        );
        if report.locked_profit_usd > self.best_profit || self.trade_count == 1 {
            self.best_profit = report.locked_profit_usd;
            self.best_label = label.clone();
        }
        if report.locked_profit_usd < self.worst_profit || self.trade_count == 1 {
            self.worst_profit = report.locked_profit_usd;
            self.worst_label = label;
        }
    }

    pub fn net_profit(&self) -> f64 {
        self.total_gross_profit - self.total_fees
    }

    /// Multi-line wallet summary for periodic logging.
    pub fn report(&self, k_balance: f64, p_balance: f64) -> String {
        let mut lines = vec![
            String::new(),
            "=".repeat(60),
            "  PAPER TRADING REPORT".to_string(),
            "=".repeat(60),
            format!("  Venue-A balance   : ${k_balance:>10.2}"),
            format!("  Venue-B balance   : ${p_balance:>10.2}"),
            format!("  Deployed          : ${:>10.4}", self.total_invested),
            String::new(),
            format!("  Trades simulated  : {}", self.trade_count),
            format!("  Gross profit      : ${:>10.4}", self.total_gross_profit),
            format!("  Venue-A fees (est): ${:>10.4}", self.total_fees),
            format!("  Net profit        : ${:>10.4}", self.net_profit()),
        ];
        if self.trade_count > 0 {
            lines.push(String::new());
            lines.push(format!("  Best trade  : ${:.4} - {}", self.best_profit, self.best_label));
            lines.push(format!("  Worst trade : ${:.4} - {}", self.worst_profit, self.worst_label));
        }
        lines.push("=".repeat(60));
        lines.join("\n")
    }
}

// === Paper simulators ===

/// Venue-A simulator: full immediate fills at the limit price, virtual cash.
pub struct PaperKalshi {
    balance: Mutex<f64>,
    next_id: AtomicU64,
    orders: Mutex<FxHashMap<String, i64>>,
}

impl PaperKalshi {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            balance: Mutex::new(starting_balance),
            next_id: AtomicU64::new(1),
            orders: Mutex::new(FxHashMap::default()),
        }
    }
}

#[async_trait]
impl KalshiExecution for PaperKalshi {
    async fn get_balance(&self) -> VenueResult<f64> {
        Ok(*self.balance.lock().expect("paper balance lock"))
    }

    async fn place_taker(
        &self,
        _ticker: &str,
        _side: Side,
        count: i64,
        price_cents: i64,
    ) -> VenueResult<String> {
        let cost = count as f64 * price_cents as f64 / 100.0;
        {
            let mut bal = self.balance.lock().expect("paper balance lock");
            if *bal < cost {
                return Err(VenueError::BalanceLow {
                    have: *bal,
                    need: cost,
                });
            }
            *bal -= cost;
        }
        let id = format!("PAPER-K-{:04}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.orders.lock().expect("paper orders lock").insert(id.clone(), count);
        Ok(id)
    }

    async fn cancel(&self, _order_id: &str) -> VenueResult<()> {
        Ok(())
    }

    async fn get_fill(&self, order_id: &str) -> VenueResult<KalshiFill> {
        let count = self
            .orders
            .lock()
            .expect("paper orders lock")
            .get(order_id)
            .copied()
            .unwrap_or(0);
        Ok(KalshiFill {
            status: "executed".to_string(),
            fill_count: count,
            remaining_count: 0,
        })
    }

    async fn sell_at_bid(&self, _ticker: &str, _side: Side, _count: i64) -> VenueResult<f64> {
        // The simulator always fills leg 2, so the unwind path never runs
        Ok(0.0)
    }
}

/// Venue-B simulator: full immediate FOK fills, virtual collateral.
pub struct PaperPoly {
    balance: Mutex<f64>,
    next_id: AtomicU64,
    orders: Mutex<FxHashMap<String, f64>>,
}

impl PaperPoly {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            balance: Mutex::new(starting_balance),
            next_id: AtomicU64::new(1),
            orders: Mutex::new(FxHashMap::default()),
        }
    }
}

#[async_trait]
impl PolyExecution for PaperPoly {
    async fn get_balance(&self) -> VenueResult<f64> {
        Ok(*self.balance.lock().expect("paper balance lock"))
    }

    async fn place_fok_buy(&self, _token_id: &str, price: f64, size: f64) -> VenueResult<String> {
        let cost = size * price;
        {
            let mut bal = self.balance.lock().expect("paper balance lock");
            if *bal < cost {
                return Err(VenueError::BalanceLow {
                    have: *bal,
                    need: cost,
                });
            }
            *bal -= cost;
        }
        let id = format!("PAPER-P-{:04}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.orders.lock().expect("paper orders lock").insert(id.clone(), size);
        Ok(id)
    }

    async fn get_fill(&self, order_id: &str) -> VenueResult<f64> {
        Ok(self
            .orders
            .lock()
            .expect("paper orders lock")
            .get(order_id)
            .copied()
            .unwrap_or(0.0))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LadderLevel;

    fn cfg() -> Config {
        Config {
            min_spread_cents: 0.8,
            exec_max_trade_usd: 50.0,
            ..Config::default()
        }
    }

    fn level(price_cents: f64, size: f64) -> LadderLevel {
        LadderLevel { price_cents, size }
    }

    // =========================================================================
    // Sizing caps
    // =========================================================================

    #[test]
    fn test_sizing_budget_cap() {
        // $50 budget at 97c combined → floor(5000/97) = 51 units
        let s = calc_units(48.0, 49.0, Some(1000.0), Some(1000.0), &[], &cfg()).unwrap();
        assert_eq!(s.units, 51);
        assert_eq!(s.p_price_cents, 49.0);
    }

    #[test]
    fn test_sizing_depth_caps() {
        let s = calc_units(48.0, 49.0, Some(10.0), Some(1000.0), &[], &cfg()).unwrap();
        assert_eq!(s.units, 10);

        let s = calc_units(48.0, 49.0, Some(1000.0), Some(7.0), &[], &cfg()).unwrap();
        assert_eq!(s.units, 7);
    }

    #[test]
    fn test_sizing_map_cap() {
        let mut c = cfg();
        c.exec_max_trade_usd = 10_000.0;
        c.exec_max_units_per_map = 25;
        let s = calc_units(48.0, 49.0, None, None, &[], &c).unwrap();
        assert_eq!(s.units, 25);
    }

    #[test]
    fn test_sizing_zero_units() {
        let mut c = cfg();
        c.exec_max_trade_usd = 0.5; // floor(50/97) = 0
        assert!(calc_units(48.0, 49.0, None, None, &[], &c).is_none());
    }

    // =========================================================================
    // Book-walk: units=3 at 30c needs $0.90 < $1 minimum; ladder
    // [(30,3),(32,5)] → consume (30,3),(32,1) → blended 30.5c
    // =========================================================================

    #[test]
    fn test_book_walk_blends_price() {
        let ladder = vec![level(30.0, 3.0), level(32.0, 5.0)];
        let s = calc_units(40.0, 30.0, Some(100.0), Some(3.0), &ladder, &cfg()).unwrap();
        assert_eq!(s.units, 4);
        assert!((s.p_price_cents - 30.5).abs() < 1e-9);
    }

    #[test]
    fn test_book_walk_correctness_invariants() {
        let ladder = vec![level(30.0, 3.0), level(32.0, 5.0)];
        let c = cfg();
        let s = calc_units(40.0, 30.0, Some(100.0), Some(3.0), &ladder, &c).unwrap();
        // Blended ≥ best ask, cumulative spend ≥ minimum
        assert!(s.p_price_cents >= 30.0);
        assert!(s.units as f64 * s.p_price_cents >= c.exec_poly_min_order_usd * 100.0);
    }

    #[test]
    fn test_book_walk_ladder_exhausted() {
        // Only 2 shares at 30c: spend can reach 60c max, below $1 minimum
        let ladder = vec![level(30.0, 2.0)];
        assert!(calc_units(40.0, 30.0, Some(100.0), Some(2.0), &ladder, &cfg()).is_none());
    }

    #[test]
    fn test_book_walk_abandons_on_collapsed_spread() {
        // Best ask 30c depth 1; next level 68c. Blending pushes venue-B cost
        // to ~55.3c, and at a 60c venue-A leg the spread turns negative.
        let ladder = vec![level(30.0, 1.0), level(68.0, 50.0)];
        let mut c = cfg();
        c.min_spread_cents = 3.3;
        assert!(calc_units(60.0, 30.0, Some(100.0), Some(1.0), &ladder, &c).is_none());
    }

    #[test]
    fn test_no_walk_when_minimum_met() {
        // 4 units × 30c = $1.20 ≥ $1: the ladder must not be touched
        let ladder = vec![level(30.0, 4.0), level(90.0, 100.0)];
        let s = calc_units(40.0, 30.0, Some(100.0), Some(4.0), &ladder, &cfg()).unwrap();
        assert_eq!(s.p_price_cents, 30.0);
        assert_eq!(s.units, 4);
    }

    // =========================================================================
    // Cooldown bookkeeping
    // =========================================================================

    fn dummy_opportunity() -> Opportunity {
        use crate::types::{
            AssetClass, MatchedPair, NormalizedMarket, Strategy, Tier, Venue,
        };
        use chrono::Utc;
        let market = |venue, id: &str| NormalizedMarket {
            venue,
            platform_id: id.to_string(),
            asset_class: AssetClass::Sports,
            sport: Some("CS2".into()),
            team: Some("m80".into()),
            opponent: Some("voca".into()),
            sport_subtype: Some(crate::types::SportSubtype::Series),
            map_number: None,
            crypto_asset: None,
            direction: None,
            threshold: None,
            resolution_dt: Utc::now(),
            yes_token: format!("{id}-y"),
            no_token: format!("{id}-n"),
            raw_title: String::new(),
        };
        Opportunity {
            pair: Arc::new(MatchedPair {
                kalshi: market(Venue::Kalshi, "K1"),
                poly: market(Venue::Polymarket, "P1"),
            }),
            strategy: Strategy::A,
            k_cost_cents: 48.0,
            p_cost_cents: 49.0,
            spread_cents: 3.0,
            tier: Tier::Low,
            k_depth: Some(100.0),
            p_depth: Some(100.0),
            tradeable_units: Some(100),
            max_locked_profit_usd: Some(3.0),
            p_ladder: vec![level(49.0, 100.0)],
            hours_to_close: 2.0,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn test_cooldown_liveness() {
        let cfg = Config {
            exec_cooldown_cycles: 3,
            ..cfg()
        };
        let executor = TwoLegExecutor::new(
            Arc::new(PaperKalshi::new(100.0)),
            Arc::new(PaperPoly::new(100.0)),
            cfg,
        );
        let opp = dummy_opportunity();

        assert!(!executor.is_on_cooldown(&opp));
        executor.set_cooldown(&opp, 3);
        assert!(executor.is_on_cooldown(&opp));

        executor.tick();
        executor.tick();
        assert!(executor.is_on_cooldown(&opp));
        executor.tick();
        // Eligible again at tick t + C
        assert!(!executor.is_on_cooldown(&opp));
    }

    // =========================================================================
    // Paper execution end-to-end
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_paper_execution_fills_and_debits() {
        let kalshi = Arc::new(PaperKalshi::new(10_000.0));
        let poly = Arc::new(PaperPoly::new(10_000.0));
        let executor = TwoLegExecutor::new(kalshi.clone(), poly.clone(), cfg());
        let opp = dummy_opportunity();

        let report = executor.execute(&opp).await;
        assert_eq!(report.status, ExecutionStatus::Filled);
        assert_eq!(report.k_filled, 51); // floor($50 × 100 / 97)
        assert_eq!(report.p_filled, 51);

        // Wallets debited at the leg prices
        let k_bal = KalshiExecution::get_balance(kalshi.as_ref()).await.unwrap();
        let p_bal = PolyExecution::get_balance(poly.as_ref()).await.unwrap();
        assert!((k_bal - (10_000.0 - 51.0 * 0.48)).abs() < 1e-6);
        assert!((p_bal - (10_000.0 - 51.0 * 0.49)).abs() < 1e-6);

        // Fee applied to P&L: 1.75% of face value
        assert!((report.k_fee_usd - 51.0 * 0.0175).abs() < 1e-9);
        assert!((report.locked_profit_usd - 51.0 * 0.03).abs() < 1e-9);
        assert!((report.net_profit_usd - (report.locked_profit_usd - report.k_fee_usd)).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paper_low_balance_skips() {
        let kalshi = Arc::new(PaperKalshi::new(10_000.0));
        let poly = Arc::new(PaperPoly::new(0.5)); // below $1 minimum
        let executor = TwoLegExecutor::new(kalshi, poly, cfg());

        let report = executor.execute(&dummy_opportunity()).await;
        assert_eq!(report.status, ExecutionStatus::Skipped);
        assert_eq!(report.reason, "low_balance");
    }

    #[test]
    fn test_paper_stats_report() {
        let mut stats = PaperStats::default();
        let opp = dummy_opportunity();
        let mut report = ExecutionReport::skipped("x");
        report.status = ExecutionStatus::Filled;
        report.k_filled = 10;
        report.total_cost_usd = 9.7;
        report.locked_profit_usd = 0.30;
        report.k_fee_usd = 0.175;
        stats.record(&opp, &report);

        assert_eq!(stats.trade_count, 1);
        assert!((stats.net_profit() - 0.125).abs() < 1e-9);
        let text = stats.report(10_000.0, 10_000.0);
        assert!(text.contains("PAPER TRADING REPORT"));
        assert!(text.contains("Trades simulated  : 1"));
    }
}
