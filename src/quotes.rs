//! Concurrent quote fan-out for the matched-pair set.
//!
//! Each pair issues one quote call per venue; both run concurrently, and up
//! to `fetch_workers` pairs are in flight at once. A failed or timed-out
//! quote on either side demotes that pair for the tick (logged at debug,
//! never fatal).

use futures_util::{stream, StreamExt};
use std::sync::Arc;
use tracing::debug;

use crate::kalshi::KalshiClient;
use crate::polymarket::PolyClient;
use crate::types::{MatchedPair, PairQuotes};

/// Fetch quotes for every pair in the snapshot. Pairs with an incomplete
/// quote are absent from the result.
pub async fn fetch_pair_quotes(
    pairs: &[Arc<MatchedPair>],
    kalshi: &KalshiClient,
    poly: &PolyClient,
    fetch_workers: usize,
) -> Vec<PairQuotes> {
    stream::iter(pairs.iter().cloned())
        .map(|pair| async move {
            let (k_res, p_res) = tokio::join!(
                kalshi.get_quote(&pair.kalshi.platform_id),
                poly.get_quote(&pair.poly),
            );

            let k_quote = match k_res {
                Ok(q) => q,
                Err(e) => {
                    debug!("[QUOTES] venue-A quote failed for {}: {e}", pair.key());
                    return None;
                }
            };
            let p_quote = match p_res {
                Ok(q) => q,
                Err(e) => {
                    debug!("[QUOTES] venue-B quote failed for {}: {e}", pair.key());
                    return None;
                }
            };

            Some(PairQuotes {
                pair,
                kalshi: k_quote,
                poly: p_quote,
            })
        })
        .buffer_unordered(fetch_workers.max(1))
        .filter_map(|x| async { x })
        .collect()
        .await
}
