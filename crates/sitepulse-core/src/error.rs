//! Error taxonomy for the dispatcher.
//!
//! `Config` is the only variant that aborts a run; everything else is
//! scoped to a single subscriber (or recipient) and logged, never
//! surfaced to an end user.

use thiserror::Error;

/// All SitePulse errors.
#[derive(Debug, Error)]
pub enum PulseError {
    /// Malformed timezone, unparsable reference instant, bad config file.
    /// Fatal to the run — aborted before any delivery.
    #[error("configuration error: {0}")]
    Config(String),

    /// Report assembly failed for one subscriber. The subscriber is
    /// skipped for this run and stays eligible while the window is open.
    #[error("report assembly failed: {0}")]
    Assembly(String),

    /// Delivery failed for one recipient. Other recipients of the same
    /// subscriber are still attempted.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Ledger read or write failed.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Subscriber source read failed.
    #[error("subscriber store error: {0}")]
    Subscribers(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PulseError>;
