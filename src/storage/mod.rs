//! SQLite persistence: two append-only tables (`opportunities`, `trades`)
//! behind a dedicated writer thread.

mod schema;
mod types;
mod writer;

pub use types::{OpportunityRecord, TradeRecord};
pub use writer::{create_storage_channel, StorageChannel};
