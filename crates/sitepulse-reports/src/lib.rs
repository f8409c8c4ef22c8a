//! # SitePulse Reports
//!
//! Periodic, timezone-local, idempotent report dispatch. An external
//! cron invokes the dispatcher hourly; per subscriber, in that
//! subscriber's own timezone, it decides who has just entered their
//! delivery window, assembles the metrics payload, delivers one email
//! per recipient, and records the period as fulfilled.
//!
//! ## Architecture
//! ```text
//! cron (hourly) → Dispatcher.run(reference instant)
//!   ├── SubscriberSource: active subscriptions per cadence
//!   ├── window: local-time eligibility + period key (pure)
//!   ├── ReportLedger: anti-join "already sent", insert-if-absent
//!   ├── ReportAssembler: metrics payload for the previous period
//!   └── Notifier: one email per recipient
//! ```
//!
//! The ledger is the complete durable state: eligibility is recomputed
//! from calendar facts on every run, `Sent` is the only persisted
//! state. If a run is skipped for an entire local eligible day the
//! period is never revisited — there is no catch-up.

pub mod assemble;
pub mod dispatcher;
pub mod ledger;
pub mod subscribers;
pub mod window;

pub use assemble::HttpAssembler;
pub use dispatcher::{DispatchPolicy, Dispatcher, RunReport};
pub use ledger::ReportLedger;
pub use subscribers::{SqliteSubscribers, SubscriberSource};
pub use window::{Window, evaluate, report_range};
