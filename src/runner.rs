//! Two-speed orchestrator.
//!
//! A slow refresh task re-fetches both venues' market lists and re-matches
//! every `market_refresh_secs`, publishing the new pair set by atomic
//! snapshot swap (a watch channel: single writer, many readers, never a torn
//! view). The fast tick loop reads the current snapshot every
//! `price_poll_secs`, fans out quotes, detects opportunities, and hands them
//! to the executor. Ticks never overlap - an overrunning tick delays the
//! next one and is logged as backpressure.
//!
//! Shutdown is cooperative: on ctrl-c the tick loop stops submitting new
//! work, the execution channel drains in-flight trades through their
//! terminal or unwind states, and the storage writer flushes.

use anyhow::{bail, Context, Result};
use std::io::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::{Config, Credentials, Mode, PAPER_CAPITAL_PER_VENUE_USD};
use crate::executor::{
    create_execution_channel, run_execution_loop, KalshiExecution, PaperKalshi, PaperPoly,
    PaperStats, PolyExecution, TwoLegExecutor,
};
use crate::finder::{format_opportunity_log, OpportunityFinder};
use crate::kalshi::{KalshiClient, KalshiTrader};
use crate::matcher::Matcher;
use crate::polymarket::PolyClient;
use crate::polymarket_clob::PolyTrader;
use crate::quotes::fetch_pair_quotes;
use crate::storage::{create_storage_channel, OpportunityRecord};
use crate::types::{MatchedPair, Opportunity};

type PairSnapshot = Arc<Vec<Arc<MatchedPair>>>;

/// Paper-report cadence, in price cycles (~3 min at the default 2 s poll).
const PAPER_REPORT_EVERY: u64 = 100;

pub async fn run(cfg: Config, mode: Mode, credentials: Option<Credentials>) -> Result<()> {
    info!("🚀 cross-venue arbitrage scanner starting | mode={mode}");
    info!(
        "   market refresh every {}s, price poll every {}s, min spread {:.1}¢",
        cfg.market_refresh_secs, cfg.price_poll_secs, cfg.min_spread_cents,
    );

    let kalshi = Arc::new(KalshiClient::new(&cfg));
    let poly = Arc::new(PolyClient::new(&cfg));
    let matcher = Matcher::new(&cfg);
    let finder = OpportunityFinder::new(&cfg);

    let db_path = match mode {
        Mode::Paper => cfg.paper_db_path.clone(),
        _ => cfg.db_path.clone(),
    };
    let storage = create_storage_channel(&db_path);

    // --- Executor wiring per mode ---
    let paper_stats = (mode == Mode::Paper).then(|| Arc::new(Mutex::new(PaperStats::default())));
    let paper_venues = (mode == Mode::Paper).then(|| {
        (
            Arc::new(PaperKalshi::new(PAPER_CAPITAL_PER_VENUE_USD)),
            Arc::new(PaperPoly::new(PAPER_CAPITAL_PER_VENUE_USD)),
        )
    });

    let executor: Option<Arc<TwoLegExecutor>> = match mode {
        Mode::Scan => {
            info!("   scan-only: no orders will be placed");
            None
        }
        Mode::Paper => {
            let (pk, pp) = paper_venues.as_ref().expect("paper venues");
            info!("   PAPER MODE - virtual ${PAPER_CAPITAL_PER_VENUE_USD:.0} per venue, no real orders");
            Some(Arc::new(TwoLegExecutor::new(
                pk.clone(),
                pp.clone(),
                cfg.clone(),
            )))
        }
        Mode::Live => {
            let creds = credentials.context("live mode requires credentials")?;
            let k_trader = KalshiTrader::new(&creds.venue_a_key, &creds.venue_a_secret_pem)
                .context("venue-A trader init failed")?;
            let p_trader = PolyTrader::connect(
                &creds.venue_b_priv_key,
                creds.venue_b_api_key.clone(),
                creds.venue_b_api_secret.clone(),
                creds.venue_b_api_passphrase.clone(),
                creds.venue_b_funder.clone(),
            )
            .await
            .context("venue-B trader init failed")?;
            warn!("   LIVE MODE - real orders, max ${:.2} per trade", cfg.exec_max_trade_usd);
            Some(Arc::new(TwoLegExecutor::new(
                Arc::new(k_trader),
                Arc::new(p_trader),
                cfg.clone(),
            )))
        }
    };

    let (exec_tx, exec_rx) = create_execution_channel();
    let exec_handle = executor.as_ref().map(|ex| {
        tokio::spawn(run_execution_loop(
            exec_rx,
            ex.clone(),
            storage.clone(),
            paper_stats.clone(),
        ))
    });
    let mut exec_tx = executor.is_some().then_some(exec_tx);

    // --- Slow refresh task: single writer of the pair snapshot ---
    let (snapshot_tx, snapshot_rx) = watch::channel::<PairSnapshot>(Arc::new(vec![]));
    let refresh_handle = {
        let cfg = cfg.clone();
        let kalshi = kalshi.clone();
        let poly = poly.clone();
        tokio::spawn(async move {
            loop {
                match refresh_pairs(&cfg, &kalshi, &poly, &matcher).await {
                    Some(pairs) => {
                        info!("=== MARKET REFRESH complete | {} matched pairs ===", pairs.len());
                        let _ = snapshot_tx.send(Arc::new(pairs));
                    }
                    None => {
                        warn!("=== MARKET REFRESH aborted - keeping previous pair set ===");
                    }
                }
                tokio::time::sleep(std::time::Duration::from_secs(cfg.market_refresh_secs)).await;
            }
        })
    };

    // --- Fast tick loop ---
    let poll_period = std::time::Duration::from_secs(cfg.price_poll_secs);
    let mut ticker = tokio::time::interval(poll_period);
    // Overrunning ticks are delayed, never dropped
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut price_cycle: u64 = 0;
    let mut total_opportunities: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received - draining in-flight work");
                break;
            }
        }

        let snapshot: PairSnapshot = snapshot_rx.borrow().clone();
        if snapshot.is_empty() {
            continue;
        }

        price_cycle += 1;
        if let Some(ex) = &executor {
            ex.tick();
        }
        let cycle_start = Instant::now();

        let quotes = fetch_pair_quotes(&snapshot, &kalshi, &poly, cfg.fetch_workers).await;
        let opportunities = finder.find(&quotes);
        total_opportunities += opportunities.len() as u64;

        if !opportunities.is_empty() {
            for opp in &opportunities {
                info!("{}", format_opportunity_log(opp));
                storage.record_opportunity(OpportunityRecord::from_opportunity(opp));
            }
            append_ndjson(&cfg.ndjson_path, &opportunities);

            if let (Some(tx), Some(ex)) = (&exec_tx, &executor) {
                for opp in &opportunities {
                    if ex.is_on_cooldown(opp) {
                        info!("[EXEC] SKIP (cooldown) | {}", opp.pair.key());
                        continue;
                    }
                    if tx.send(opp.clone()).await.is_err() {
                        warn!("[EXEC] execution channel closed");
                        break;
                    }
                }
            }
        }

        let elapsed = cycle_start.elapsed();
        info!(
            "SCAN CYCLE #{price_cycle} | {:.3}s | {} pairs | {} quoted | {} opportunities | {} lifetime",
            elapsed.as_secs_f64(),
            snapshot.len(),
            quotes.len(),
            opportunities.len(),
            total_opportunities,
        );
        if elapsed > poll_period {
            warn!(
                "[TICK] backpressure: cycle took {:.3}s > {}s period",
                elapsed.as_secs_f64(),
                cfg.price_poll_secs,
            );
        }

        if let (Some(stats), Some((pk, pp))) = (&paper_stats, &paper_venues) {
            if price_cycle % PAPER_REPORT_EVERY == 0 {
                let k_bal = KalshiExecution::get_balance(pk.as_ref()).await.unwrap_or(0.0);
                let p_bal = PolyExecution::get_balance(pp.as_ref()).await.unwrap_or(0.0);
                info!("{}", stats.lock().expect("paper stats lock").report(k_bal, p_bal));
            }
        }
    }

    // Cooperative shutdown: close the execution channel, let in-flight trades
    // reach a terminal state, then flush storage.
    refresh_handle.abort();
    exec_tx.take();
    if let Some(handle) = exec_handle {
        if let Err(e) = handle.await {
            error!("execution loop join failed: {e}");
        }
    }
    if let (Some(stats), Some((pk, pp))) = (&paper_stats, &paper_venues) {
        let k_bal = KalshiExecution::get_balance(pk.as_ref()).await.unwrap_or(0.0);
        let p_bal = PolyExecution::get_balance(pp.as_ref()).await.unwrap_or(0.0);
        info!("{}", stats.lock().expect("paper stats lock").report(k_bal, p_bal));
    }
    storage.shutdown();

    info!("clean shutdown complete");
    Ok(())
}

/// One refresh attempt cycle: fetch both venues and re-match. Rate limits
/// back off 30 s and retry; after the configured number of consecutive
/// failures the refresh aborts and the previous set stays live.
async fn refresh_pairs(
    cfg: &Config,
    kalshi: &KalshiClient,
    poly: &PolyClient,
    matcher: &Matcher,
) -> Option<Vec<Arc<MatchedPair>>> {
    let mut failures = 0u32;
    loop {
        info!("=== MARKET REFRESH starting ===");
        let (k_res, p_res) = tokio::join!(kalshi.list_markets(), poly.list_markets());

        match (k_res, p_res) {
            (Ok(k_markets), Ok(p_markets)) => {
                let pairs = matcher.find_matches(&k_markets, &p_markets);
                if pairs.is_empty() {
                    info!("no matched pairs - verify parsing covers current market types");
                }
                return Some(pairs.into_iter().map(Arc::new).collect());
            }
            (k_res, p_res) => {
                failures += 1;
                let rate_limited = k_res.as_ref().err().is_some_and(|e| e.is_rate_limit())
                    || p_res.as_ref().err().is_some_and(|e| e.is_rate_limit());
                for (venue, res) in [("A", &k_res), ("B", &p_res)] {
                    if let Err(e) = res.as_ref() {
                        warn!("refresh: venue-{venue} list failed: {e}");
                    }
                }
                if failures >= cfg.refresh_max_failures {
                    return None;
                }
                let backoff = if rate_limited {
                    cfg.refresh_backoff
                } else {
                    std::time::Duration::from_secs(5)
                };
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Append one NDJSON line carrying every opportunity of this tick.
fn append_ndjson(path: &str, opportunities: &[Opportunity]) {
    let line = serde_json::json!({
        "scan_timestamp": chrono::Utc::now().to_rfc3339(),
        "opportunity_count": opportunities.len(),
        "opportunities": opportunities.iter().map(|opp| {
            serde_json::json!({
                "pair_key": opp.pair.key(),
                "strategy": opp.strategy.to_string(),
                "tier": opp.tier.to_string(),
                "k_cost_cents": opp.k_cost_cents,
                "p_cost_cents": opp.p_cost_cents,
                "spread_cents": opp.spread_cents,
                "k_depth": opp.k_depth,
                "p_depth": opp.p_depth,
                "tradeable_units": opp.tradeable_units,
                "max_locked_profit_usd": opp.max_locked_profit_usd,
                "hours_to_close": opp.hours_to_close,
                "kalshi_title": opp.pair.kalshi.raw_title,
                "poly_title": opp.pair.poly.raw_title,
            })
        }).collect::<Vec<_>>(),
    });

    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| writeln!(f, "{line}"));
    if let Err(e) = result {
        warn!("[NDJSON] write failed: {e}");
    }
}

/// Fatal-config validation shared by the CLI entry point.
pub fn validate_mode(mode: Mode, credentials: &Option<Credentials>) -> Result<()> {
    if mode == Mode::Live && credentials.is_none() {
        bail!("live mode requires VENUE_A_KEY, VENUE_A_SECRET and VENUE_B_PRIV_KEY");
    }
    Ok(())
}
