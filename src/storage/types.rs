//! Storage record types for SQLite persistence.

use chrono::Utc;

use crate::executor::{ExecutionReport, ExecutionStatus};
use crate::types::Opportunity;

/// One detected opportunity (traded or not), append-only.
#[derive(Debug, Clone)]
pub struct OpportunityRecord {
    pub scanned_at: String,
    pub pair_key: String,
    pub strategy: String,
    pub k_cost: f64,
    pub p_cost: f64,
    pub spread: f64,
    pub tier: String,
    pub k_depth: Option<f64>,
    pub p_depth: Option<f64>,
    pub tradeable_units: Option<i64>,
    pub max_locked_profit_usd: Option<f64>,
    pub hours_to_close: f64,
    pub executed: bool,
}

impl OpportunityRecord {
    pub fn from_opportunity(opp: &Opportunity) -> Self {
        Self {
            scanned_at: opp.detected_at.to_rfc3339(),
            pair_key: opp.pair.key(),
            strategy: opp.strategy.to_string(),
            k_cost: opp.k_cost_cents,
            p_cost: opp.p_cost_cents,
            spread: opp.spread_cents,
            tier: opp.tier.to_string(),
            k_depth: opp.k_depth,
            p_depth: opp.p_depth,
            tradeable_units: opp.tradeable_units,
            max_locked_profit_usd: opp.max_locked_profit_usd,
            hours_to_close: opp.hours_to_close,
            executed: false,
        }
    }
}

/// One execution attempt, append-only. `opp_fk` is resolved by the writer
/// from the most recent opportunity row for the same pair and strategy.
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub pair_key: String,
    pub strategy: String,
    pub traded_at: String,
    pub requested_units: i64,
    pub k_filled: i64,
    pub p_filled: i64,
    pub k_price: f64,
    pub p_price: f64,
    pub k_cost_usd: f64,
    pub p_cost_usd: f64,
    pub total_cost_usd: f64,
    pub locked_profit_usd: f64,
    pub k_fee_usd: f64,
    pub net_profit_usd: f64,
    pub k_order_id: String,
    pub p_order_id: String,
    pub status: String,
    pub reason: String,
    pub p_balance_before: Option<f64>,
}

impl TradeRecord {
    pub fn from_execution(opp: &Opportunity, report: &ExecutionReport) -> Self {
        Self {
            pair_key: opp.pair.key(),
            strategy: opp.strategy.to_string(),
            traded_at: Utc::now().to_rfc3339(),
            requested_units: report.requested_units,
            k_filled: report.k_filled,
            p_filled: report.p_filled,
            k_price: report.k_price_cents,
            p_price: report.p_price_cents,
            k_cost_usd: report.k_cost_usd,
            p_cost_usd: report.p_cost_usd,
            total_cost_usd: report.total_cost_usd,
            locked_profit_usd: report.locked_profit_usd,
            k_fee_usd: report.k_fee_usd,
            net_profit_usd: report.net_profit_usd,
            k_order_id: report.k_order_id.clone(),
            p_order_id: report.p_order_id.clone(),
            status: report.status.as_str().to_string(),
            reason: report.reason.clone(),
            p_balance_before: report.p_balance_before,
        }
    }

    /// Whether this trade marks its opportunity as executed.
    pub fn attempted(&self) -> bool {
        self.status != ExecutionStatus::Skipped.as_str()
            || matches!(self.reason.as_str(), "no_fill" | "kalshi_leg_failed" | "kalshi_conflict")
    }
}
