//! Email delivery — renders the report summary and sends it via SMTP
//! (async lettre, STARTTLS relay).

use async_trait::async_trait;

use sitepulse_core::config::SmtpConfig;
use sitepulse_core::error::{PulseError, Result};
use sitepulse_core::traits::Notifier;
use sitepulse_core::types::MetricsPayload;

/// SMTP-backed notifier.
pub struct EmailChannel {
    config: SmtpConfig,
}

impl EmailChannel {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Notifier for EmailChannel {
    async fn send(
        &self,
        recipient: &str,
        display_name: &str,
        period_label: &str,
        unsubscribe_link: &str,
        payload: &MetricsPayload,
    ) -> Result<()> {
        use lettre::{
            AsyncSmtpTransport, AsyncTransport, Message, message::Mailbox,
            message::header::ContentType, transport::smtp::authentication::Credentials,
        };

        let from_name = self.config.display_name.as_deref().unwrap_or("SitePulse Reports");
        let from_mailbox: Mailbox = format!("{from_name} <{}>", self.config.from_address)
            .parse()
            .map_err(|e| PulseError::Delivery(format!("Invalid from: {e}")))?;

        let to_mailbox: Mailbox = recipient
            .parse()
            .map_err(|e| PulseError::Delivery(format!("Invalid recipient: {e}")))?;

        let subject = format!("{display_name} — {period_label}");
        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(render_text(display_name, period_label, unsubscribe_link, payload))
            .map_err(|e| PulseError::Delivery(format!("Build email: {e}")))?;

        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());

        let mailer = AsyncSmtpTransport::<lettre::Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|e| PulseError::Delivery(format!("SMTP relay: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| PulseError::Delivery(format!("SMTP send: {e}")))?;

        tracing::info!("📤 Report email sent to {recipient}");
        Ok(())
    }
}

/// Plain-text report body.
fn render_text(
    display_name: &str,
    period_label: &str,
    unsubscribe_link: &str,
    payload: &MetricsPayload,
) -> String {
    let mut body = format!(
        "Your traffic report for {display_name} — {period_label}\n\n\
         Pageviews:      {} ({})\n\
         Visitors:       {} ({})\n\
         Bounce rate:    {:.0}% ({})\n",
        payload.pageviews,
        signed(payload.pageviews_delta),
        payload.visitors,
        signed(payload.visitors_delta),
        payload.bounce_rate * 100.0,
        signed_points(payload.bounce_rate_delta),
    );

    if !payload.top_referrers.is_empty() {
        body.push_str("\nTop referrers:\n");
        for entry in &payload.top_referrers {
            body.push_str(&format!("  {:>8}  {}\n", entry.count, entry.label));
        }
    }
    if !payload.top_pages.is_empty() {
        body.push_str("\nTop pages:\n");
        for entry in &payload.top_pages {
            body.push_str(&format!("  {:>8}  {}\n", entry.count, entry.label));
        }
    }

    body.push_str(&format!("\n--\nUnsubscribe from these reports: {unsubscribe_link}\n"));
    body
}

fn signed(delta: i64) -> String {
    if delta >= 0 { format!("+{delta}") } else { delta.to_string() }
}

fn signed_points(delta: f64) -> String {
    let points = delta * 100.0;
    if points >= 0.0 { format!("+{points:.0}pt") } else { format!("{points:.0}pt") }
}
