//! Error taxonomy for venue I/O and execution.
//!
//! Quote-side errors are non-fatal and demote a pair for the tick. Order-side
//! errors on leg 1 skip the trade; on leg 2 they trigger the unwind path.

use thiserror::Error;

/// Errors surfaced by venue adapters and the executor.
#[derive(Debug, Error)]
pub enum VenueError {
    /// HTTP/network failure, including deadline overruns.
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP 429 from the venue.
    #[error("rate limited by venue")]
    RateLimit,

    /// HTTP 401/403 - fatal for that venue's executor until restart.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Response did not match the expected venue schema.
    #[error("unexpected venue response: {0}")]
    Protocol(String),

    /// The venue refused the order (includes the venue's status code).
    #[error("order rejected (status {status}): {message}")]
    OrderRejected { status: u16, message: String },

    /// The book was too thin to satisfy the minimum order even after walking.
    #[error("insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    /// Wallet balance below the venue minimum.
    #[error("balance too low: have ${have:.2}, need ${need:.2}")]
    BalanceLow { have: f64, need: f64 },

    /// A sanity check failed (e.g. spread turned negative after a book walk).
    #[error("validation failed: {0}")]
    Validation(String),
}

impl VenueError {
    /// Classify a reqwest failure into the taxonomy.
    pub fn from_http(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return VenueError::Transport(format!("deadline exceeded: {err}"));
        }
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), err.to_string());
        }
        VenueError::Transport(err.to_string())
    }

    /// Classify a non-success HTTP status into the taxonomy.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            429 => VenueError::RateLimit,
            401 | 403 => VenueError::Auth(message),
            400..=499 => VenueError::OrderRejected { status, message },
            _ => VenueError::Transport(format!("HTTP {status}: {message}")),
        }
    }

    /// True for 401/403 errors that pause the executor.
    pub fn is_auth(&self) -> bool {
        matches!(self, VenueError::Auth(_))
    }

    /// True for HTTP 429.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, VenueError::RateLimit)
    }

    /// True when the venue rejected with HTTP 409 (position limit hit or
    /// market non-tradeable) - cooled down longer than a generic failure.
    pub fn is_conflict(&self) -> bool {
        matches!(self, VenueError::OrderRejected { status: 409, .. })
    }
}

pub type VenueResult<T> = Result<T, VenueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(VenueError::from_status(429, String::new()).is_rate_limit());
        assert!(VenueError::from_status(401, "bad key".into()).is_auth());
        assert!(VenueError::from_status(403, "forbidden".into()).is_auth());
        assert!(VenueError::from_status(409, "limit".into()).is_conflict());
        assert!(matches!(
            VenueError::from_status(500, "oops".into()),
            VenueError::Transport(_)
        ));
        assert!(matches!(
            VenueError::from_status(422, "bad order".into()),
            VenueError::OrderRejected { status: 422, .. }
        ));
    }
}
