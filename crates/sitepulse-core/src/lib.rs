//! # SitePulse Core
//!
//! Shared building blocks for the report dispatcher: data model
//! (cadences, periods, subscriptions, metrics payloads), the error
//! taxonomy, collaborator traits, and TOML configuration.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::PulseConfig;
pub use error::{PulseError, Result};
pub use traits::{Notifier, ReportAssembler};
pub use types::{Cadence, EntryCount, MetricsPayload, Period, ReportRange, ReportSubscription};
