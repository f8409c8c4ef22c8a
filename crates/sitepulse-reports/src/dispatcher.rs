//! Dispatch orchestration — one run of the hourly trigger.
//!
//! The trigger is at-least-once: a given hour may be skipped, delayed,
//! or retried. Eligibility is therefore recomputed from calendar facts
//! on every run and the ledger alone decides "already sent". Within a
//! run each subscriber is processed independently; one subscriber's
//! failure never aborts the batch.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use sitepulse_core::error::{PulseError, Result};
use sitepulse_core::traits::{Notifier, ReportAssembler};
use sitepulse_core::types::{Cadence, Period, ReportSubscription};

use crate::ledger::ReportLedger;
use crate::subscribers::SubscriberSource;
use crate::window;

/// Tunables for one dispatcher instance.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Local hour at which the delivery window opens.
    pub send_hour: u32,
    /// Base URL for per-recipient unsubscribe links.
    pub unsubscribe_base_url: String,
    /// Bound on each assembler / notifier call.
    pub call_timeout: std::time::Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            send_hour: 9,
            unsubscribe_base_url: "https://app.sitepulse.io".into(),
            call_timeout: std::time::Duration::from_secs(30),
        }
    }
}

/// Counters for one run, logged for operators.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Active subscriptions seen across both cadences.
    pub candidates: usize,
    /// Subscribers inside their delivery window.
    pub eligible: usize,
    /// Eligible but already fulfilled per the ledger.
    pub skipped_sent: usize,
    /// Subscribers with at least one recipient delivered and marked.
    pub delivered: usize,
    /// Subscribers marked after every recipient delivery failed.
    pub delivery_failed: usize,
    /// Eligible subscribers that failed before delivery (assembly
    /// error etc.) — no ledger entry, retryable while the window is
    /// open.
    pub failed: usize,
}

/// Drives one dispatch run over both cadences.
pub struct Dispatcher<'a> {
    subscribers: &'a dyn SubscriberSource,
    ledger: &'a ReportLedger,
    assembler: &'a dyn ReportAssembler,
    notifier: &'a dyn Notifier,
    policy: DispatchPolicy,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        subscribers: &'a dyn SubscriberSource,
        ledger: &'a ReportLedger,
        assembler: &'a dyn ReportAssembler,
        notifier: &'a dyn Notifier,
        policy: DispatchPolicy,
    ) -> Self {
        Self { subscribers, ledger, assembler, notifier, policy }
    }

    /// Run one dispatch pass at the given reference instant.
    ///
    /// Fails only on `ConfigurationError`; every other failure is
    /// logged, counted, and isolated to the subscriber it hit.
    pub async fn run(&self, at: DateTime<Utc>) -> Result<RunReport> {
        let mut report = RunReport::default();

        // Enumerate and resolve every subscription's timezone across
        // both cadences before any delivery: a malformed zone is a
        // configuration error and the whole run aborts before
        // processing.
        let mut batches: Vec<(Cadence, Vec<(ReportSubscription, Tz)>)> = Vec::new();
        for cadence in Cadence::all() {
            let subs = match self.subscribers.active_subscriptions(cadence) {
                Ok(subs) => subs,
                Err(e) => {
                    tracing::error!(
                        "⚠️ Skipping {cadence} batch, subscriber store unavailable: {e}"
                    );
                    continue;
                }
            };
            report.candidates += subs.len();

            let mut candidates: Vec<(ReportSubscription, Tz)> = Vec::with_capacity(subs.len());
            for sub in subs {
                let tz: Tz = sub.timezone.parse().map_err(|_| {
                    PulseError::Config(format!(
                        "invalid timezone '{}' for subscriber {}",
                        sub.timezone, sub.subscriber_id
                    ))
                })?;
                candidates.push((sub, tz));
            }
            batches.push((cadence, candidates));
        }

        for (cadence, candidates) in batches {
            self.run_cadence(at, cadence, candidates, &mut report).await;
        }
        tracing::info!(
            "📬 Dispatch run at {} done: {} candidates, {} eligible, {} delivered, {} already sent, {} delivery-failed, {} failed",
            at.to_rfc3339(),
            report.candidates,
            report.eligible,
            report.delivered,
            report.skipped_sent,
            report.delivery_failed,
            report.failed,
        );
        Ok(report)
    }

    async fn run_cadence(
        &self,
        at: DateTime<Utc>,
        cadence: Cadence,
        candidates: Vec<(ReportSubscription, Tz)>,
        report: &mut RunReport,
    ) {
        let mut eligible: Vec<(ReportSubscription, Tz, Period)> = Vec::new();
        for (sub, tz) in candidates {
            let w = window::evaluate(at, tz, cadence, self.policy.send_hour);
            if w.eligible {
                eligible.push((sub, tz, w.period));
            }
        }
        if eligible.is_empty() {
            return;
        }
        report.eligible += eligible.len();

        // Anti-join the eligible set against the ledger in one pass.
        let periods: Vec<Period> = eligible.iter().map(|(_, _, p)| *p).collect();
        let already_sent = match self.ledger.sent_in_periods(&periods) {
            Ok(sent) => sent,
            Err(e) => {
                tracing::error!("⚠️ Skipping {cadence} batch, ledger unavailable: {e}");
                return;
            }
        };

        for (sub, tz, period) in eligible {
            if already_sent.contains(&(sub.subscriber_id, period)) {
                report.skipped_sent += 1;
                continue;
            }
            match self.deliver_one(at, &sub, tz, period).await {
                Ok(sent) if sent > 0 => report.delivered += 1,
                Ok(_) => {
                    tracing::warn!(
                        "⚠️ {cadence} report for subscriber {} ({}): no recipient reachable",
                        sub.subscriber_id,
                        sub.display_name,
                    );
                    report.delivery_failed += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "⚠️ {cadence} report for subscriber {} ({}) failed: {e}",
                        sub.subscriber_id,
                        sub.display_name,
                    );
                    report.failed += 1;
                }
            }
        }
    }

    /// Assemble, deliver to every recipient, then mark the period —
    /// exactly once per subscriber, after best-effort delivery.
    /// Returns the number of recipients actually delivered.
    async fn deliver_one(
        &self,
        at: DateTime<Utc>,
        sub: &ReportSubscription,
        tz: Tz,
        period: Period,
    ) -> Result<usize> {
        let (range, prior) = window::report_range(at, tz, sub.cadence);
        let payload = tokio::time::timeout(
            self.policy.call_timeout,
            self.assembler.assemble(sub, &range, &prior),
        )
        .await
        .map_err(|_| PulseError::Assembly(format!("assembly timed out for {}", sub.public_id)))??;

        let label = period.label();
        let mut sent = 0usize;
        for recipient in &sub.recipients {
            let link = unsubscribe_link(
                &self.policy.unsubscribe_base_url,
                &sub.public_id,
                sub.cadence,
                recipient,
            );
            let outcome = tokio::time::timeout(
                self.policy.call_timeout,
                self.notifier.send(recipient, &sub.display_name, &label, &link, &payload),
            )
            .await
            .map_err(|_| PulseError::Delivery(format!("delivery to {recipient} timed out")))
            .and_then(|res| res);

            match outcome {
                Ok(()) => {
                    sent += 1;
                    tracing::debug!("📤 {} report delivered to {recipient}", sub.cadence)
                }
                // Other recipients are still attempted and the ledger
                // entry is still written: mark-after-best-effort.
                Err(e) => tracing::warn!("⚠️ Delivery to {recipient} failed: {e}"),
            }
        }

        match self.ledger.mark_sent(sub.subscriber_id, period, at) {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                "Ledger already held {label} for subscriber {} — concurrent run?",
                sub.subscriber_id
            ),
            // The subscriber stays eligible next run and may receive a
            // duplicate; accepted trade-off.
            Err(e) => tracing::warn!(
                "⚠️ Ledger write failed for subscriber {}: {e}",
                sub.subscriber_id
            ),
        }
        Ok(sent)
    }
}

/// Unsubscribe URL carrying the public site id, cadence name, and
/// percent-encoded recipient address; passed through to the notifier
/// unchanged.
pub fn unsubscribe_link(base: &str, public_id: &str, cadence: Cadence, recipient: &str) -> String {
    format!(
        "{}/reports/unsubscribe/{}/{}?email={}",
        base.trim_end_matches('/'),
        cadence,
        public_id,
        urlencoding::encode(recipient)
    )
}
