//! Executor guard: halts order placement when something is broken.
//!
//! Matched-fill arbitrage is risk-free, so the guard only tracks total open
//! units, consecutive order-side errors, and auth rejections. A tripped
//! guard pauses the executor; the scanner keeps running.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use tracing::{error, warn};

/// Why the guard refused an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardRefusal {
    Halted,
    AuthPaused,
    TotalUnits { units: i64, limit: i64 },
}

impl std::fmt::Display for GuardRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardRefusal::Halted => write!(f, "halted after consecutive errors"),
            GuardRefusal::AuthPaused => write!(f, "auth rejected - executor paused until restart"),
            GuardRefusal::TotalUnits { units, limit } => {
                write!(f, "total units {units} would exceed limit {limit}")
            }
        }
    }
}

pub struct ExecutorGuard {
    max_total_units: i64,
    max_consecutive_errors: u32,
    halted: AtomicBool,
    auth_paused: AtomicBool,
    consecutive_errors: AtomicU32,
    total_units: AtomicI64,
}

impl ExecutorGuard {
    pub fn new(max_total_units: i64, max_consecutive_errors: u32) -> Self {
        Self {
            max_total_units,
            max_consecutive_errors,
            halted: AtomicBool::new(false),
            auth_paused: AtomicBool::new(false),
            consecutive_errors: AtomicU32::new(0),
            total_units: AtomicI64::new(0),
        }
    }

    pub fn can_execute(&self, units: i64) -> Result<(), GuardRefusal> {
        if self.auth_paused.load(Ordering::SeqCst) {
            return Err(GuardRefusal::AuthPaused);
        }
        if self.halted.load(Ordering::SeqCst) {
            return Err(GuardRefusal::Halted);
        }
        let current = self.total_units.load(Ordering::SeqCst);
        if current + units > self.max_total_units {
            return Err(GuardRefusal::TotalUnits {
                units: current + units,
                limit: self.max_total_units,
            });
        }
        Ok(())
    }

    pub fn record_success(&self, matched_units: i64) {
        self.consecutive_errors.store(0, Ordering::SeqCst);
        self.total_units.fetch_add(matched_units, Ordering::SeqCst);
    }

    pub fn record_error(&self) {
        let errors = self.consecutive_errors.fetch_add(1, Ordering::SeqCst) + 1;
        if errors >= self.max_consecutive_errors {
            error!("[GUARD] halting executor after {errors} consecutive errors");
            self.halted.store(true, Ordering::SeqCst);
        }
    }

    /// Auth errors pause the executor until restart; the scanner is unaffected.
    pub fn pause_auth(&self) {
        warn!("[GUARD] venue auth rejected - pausing executor");
        self.auth_paused.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.auth_paused.load(Ordering::SeqCst) || self.halted.load(Ordering::SeqCst)
    }
}
