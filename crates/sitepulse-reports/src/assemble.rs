//! HTTP report assembler — queries the internal stats service for one
//! subscriber's metrics over a period range.

use async_trait::async_trait;

use sitepulse_core::config::StatsConfig;
use sitepulse_core::error::{PulseError, Result};
use sitepulse_core::traits::ReportAssembler;
use sitepulse_core::types::{MetricsPayload, ReportRange, ReportSubscription};

/// Assembler backed by the stats service's report endpoint.
pub struct HttpAssembler {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpAssembler {
    pub fn new(config: &StatsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        }
    }
}

#[async_trait]
impl ReportAssembler for HttpAssembler {
    async fn assemble(
        &self,
        subscription: &ReportSubscription,
        range: &ReportRange,
        prior: &ReportRange,
    ) -> Result<MetricsPayload> {
        let url = format!("{}/api/sites/{}/report", self.base_url, subscription.public_id);
        let mut req = self.client.get(&url).query(&[
            ("from", range.start.to_rfc3339()),
            ("to", range.end.to_rfc3339()),
            ("prior_from", prior.start.to_rfc3339()),
            ("prior_to", prior.end.to_rfc3339()),
        ]);
        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| PulseError::Assembly(format!("stats request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(PulseError::Assembly(format!(
                "stats API error {} for site {}",
                resp.status(),
                subscription.public_id
            )));
        }

        resp.json::<MetricsPayload>()
            .await
            .map_err(|e| PulseError::Assembly(format!("stats payload decode: {e}")))
    }
}
