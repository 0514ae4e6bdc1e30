//! Database schema creation.

use rusqlite::{Connection, Result};

/// Create both append-only tables and their indexes.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS opportunities (
            id                     INTEGER PRIMARY KEY AUTOINCREMENT,
            scanned_at             TEXT    NOT NULL,
            pair_key               TEXT    NOT NULL,
            strategy               TEXT    NOT NULL,
            k_cost                 REAL,
            p_cost                 REAL,
            spread                 REAL,
            tier                   TEXT,
            k_depth                REAL,
            p_depth                REAL,
            tradeable_units        INTEGER,
            max_locked_profit_usd  REAL,
            hours_to_close         REAL,
            executed               INTEGER DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS trades (
            id                    INTEGER PRIMARY KEY AUTOINCREMENT,
            opp_fk                INTEGER REFERENCES opportunities(id),
            traded_at             TEXT    NOT NULL,
            pair_key              TEXT    NOT NULL,
            strategy              TEXT,
            requested_units       INTEGER,
            k_filled              INTEGER,
            p_filled              INTEGER,
            k_price               REAL,
            p_price               REAL,
            k_cost_usd            REAL,
            p_cost_usd            REAL,
            total_cost_usd        REAL,
            locked_profit_usd     REAL,
            k_fee_usd             REAL,
            net_profit_usd        REAL,
            k_order_id            TEXT,
            p_order_id            TEXT,
            status                TEXT,
            reason                TEXT,
            p_balance_before      REAL
        );

        CREATE INDEX IF NOT EXISTS idx_opp_scanned_at ON opportunities(scanned_at);
        CREATE INDEX IF NOT EXISTS idx_opp_pair_key   ON opportunities(pair_key);
        CREATE INDEX IF NOT EXISTS idx_opp_tier       ON opportunities(tier);
        CREATE INDEX IF NOT EXISTS idx_trades_traded_at ON trades(traded_at);
        CREATE INDEX IF NOT EXISTS idx_trades_status    ON trades(status);
        CREATE INDEX IF NOT EXISTS idx_trades_pair_key  ON trades(pair_key);",
    )?;
    Ok(())
}
