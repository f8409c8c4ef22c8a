//! Collaborator traits the dispatcher fans out to.
//!
//! Both collaborators are invoked once per eligible subscriber (the
//! notifier once per recipient) and must never be the reason a whole
//! run aborts — the orchestrator isolates their failures per
//! subscriber.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{MetricsPayload, ReportRange, ReportSubscription};

/// Produces the metrics payload for one subscriber and period.
#[async_trait]
pub trait ReportAssembler: Send + Sync {
    /// Aggregate metrics over `range`, with deltas computed against
    /// `prior` (the immediately preceding equivalent range).
    async fn assemble(
        &self,
        subscription: &ReportSubscription,
        range: &ReportRange,
        prior: &ReportRange,
    ) -> Result<MetricsPayload>;
}

/// Renders and delivers one report message to one recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        display_name: &str,
        period_label: &str,
        unsubscribe_link: &str,
        payload: &MetricsPayload,
    ) -> Result<()>;
}
