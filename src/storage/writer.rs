//! Non-blocking SQLite writer using a dedicated thread and an mpsc channel.
//!
//! Async tasks hand records to [`StorageChannel`]; the writer thread batches
//! them into transactions. Trades are linked back to the most recent
//! opportunity row for the same pair and strategy, whose `executed` flag is
//! flipped when an execution was actually attempted.

use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

use super::schema::create_tables;
use super::types::{OpportunityRecord, TradeRecord};

/// Bounded queue depth between async tasks and the writer thread.
const QUEUE_CAPACITY: usize = 1024;

/// Messages sent to the storage writer thread.
pub enum StorageMessage {
    Opportunity(OpportunityRecord),
    Trade(TradeRecord),
    /// Graceful shutdown: flush and exit.
    Shutdown,
}

/// Cloneable handle for sending storage messages. Sends never block: when
/// the queue is full the record is dropped with a warning rather than
/// stalling the tick loop.
#[derive(Clone)]
pub struct StorageChannel {
    tx: SyncSender<StorageMessage>,
}

impl StorageChannel {
    pub fn record_opportunity(&self, record: OpportunityRecord) {
        self.push(StorageMessage::Opportunity(record));
    }

    pub fn record_trade(&self, record: TradeRecord) {
        self.push(StorageMessage::Trade(record));
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(StorageMessage::Shutdown);
    }

    fn push(&self, msg: StorageMessage) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(msg) {
            warn!("[STORAGE] queue full, record dropped");
        }
    }
}

/// Open the database and spawn the writer thread.
pub fn create_storage_channel(db_path: &str) -> StorageChannel {
    let (tx, rx) = mpsc::sync_channel(QUEUE_CAPACITY);
    let path = db_path.to_string();

    thread::spawn(move || {
        storage_writer_loop(rx, &path);
    });

    StorageChannel { tx }
}

fn storage_writer_loop(rx: Receiver<StorageMessage>, db_path: &str) {
    let conn = match Connection::open(db_path) {
        Ok(c) => c,
        Err(e) => {
            error!("[STORAGE] failed to open database at {db_path}: {e}");
            return;
        }
    };
    if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("[STORAGE] could not enable WAL: {e}");
    }
    if let Err(e) = create_tables(&conn) {
        error!("[STORAGE] failed to create tables: {e}");
        return;
    }
    info!("[STORAGE] database initialized at {db_path}");

    // (pair_key, strategy) → rowid of the most recent opportunity
    let mut last_opportunity: HashMap<(String, String), i64> = HashMap::new();

    let mut batch: Vec<StorageMessage> = Vec::with_capacity(100);
    let batch_timeout = Duration::from_millis(100);

    loop {
        match rx.recv_timeout(batch_timeout) {
            Ok(StorageMessage::Shutdown) => {
                flush_batch(&conn, &mut batch, &mut last_opportunity);
                info!("[STORAGE] writer shutdown complete");
                break;
            }
            Ok(msg) => {
                batch.push(msg);
                if batch.len() >= 100 {
                    flush_batch(&conn, &mut batch, &mut last_opportunity);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                flush_batch(&conn, &mut batch, &mut last_opportunity);
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                flush_batch(&conn, &mut batch, &mut last_opportunity);
                info!("[STORAGE] channel disconnected, writer exiting");
                break;
            }
        }
    }
}

fn flush_batch(
    conn: &Connection,
    batch: &mut Vec<StorageMessage>,
    last_opportunity: &mut HashMap<(String, String), i64>,
) {
    if batch.is_empty() {
        return;
    }
    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => {
            error!("[STORAGE] failed to start transaction: {e}");
            batch.clear();
            return;
        }
    };

    for msg in batch.drain(..) {
        match msg {
            StorageMessage::Opportunity(record) => {
                if let Err(e) = insert_opportunity(&tx, &record, last_opportunity) {
                    warn!("[STORAGE] failed to insert opportunity: {e}");
                }
            }
            StorageMessage::Trade(record) => {
                if let Err(e) = insert_trade(&tx, &record, last_opportunity) {
                    warn!("[STORAGE] failed to insert trade: {e}");
                }
            }
            StorageMessage::Shutdown => {}
        }
    }

    if let Err(e) = tx.commit() {
        error!("[STORAGE] failed to commit transaction: {e}");
    }
}

fn insert_opportunity(
    conn: &Connection,
    record: &OpportunityRecord,
    last_opportunity: &mut HashMap<(String, String), i64>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO opportunities (
            scanned_at, pair_key, strategy, k_cost, p_cost, spread, tier,
            k_depth, p_depth, tradeable_units, max_locked_profit_usd,
            hours_to_close, executed
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
        rusqlite::params![
            record.scanned_at,
            record.pair_key,
            record.strategy,
            record.k_cost,
            record.p_cost,
            record.spread,
            record.tier,
            record.k_depth,
            record.p_depth,
            record.tradeable_units,
            record.max_locked_profit_usd,
            record.hours_to_close,
            record.executed as i32,
        ],
    )?;
    last_opportunity.insert(
        (record.pair_key.clone(), record.strategy.clone()),
        conn.last_insert_rowid(),
    );
    Ok(())
}

fn insert_trade(
    conn: &Connection,
    record: &TradeRecord,
    last_opportunity: &HashMap<(String, String), i64>,
) -> rusqlite::Result<()> {
    let opp_fk = last_opportunity
        .get(&(record.pair_key.clone(), record.strategy.clone()))
        .copied();

    conn.execute(
        "INSERT INTO trades (
            opp_fk, traded_at, pair_key, strategy, requested_units,
            k_filled, p_filled, k_price, p_price,
            k_cost_usd, p_cost_usd, total_cost_usd,
            locked_profit_usd, k_fee_usd, net_profit_usd,
            k_order_id, p_order_id, status, reason, p_balance_before
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)",
        rusqlite::params![
            opp_fk,
            record.traded_at,
            record.pair_key,
            record.strategy,
            record.requested_units,
            record.k_filled,
            record.p_filled,
            record.k_price,
            record.p_price,
            record.k_cost_usd,
            record.p_cost_usd,
            record.total_cost_usd,
            record.locked_profit_usd,
            record.k_fee_usd,
            record.net_profit_usd,
            record.k_order_id,
            record.p_order_id,
            record.status,
            record.reason,
            record.p_balance_before,
        ],
    )?;

    if record.attempted() {
        if let Some(id) = opp_fk {
            conn.execute("UPDATE opportunities SET executed=1 WHERE id=?1", [id])?;
        }
    }
    Ok(())
}
