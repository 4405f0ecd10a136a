//! Health reporter.
//!
//! Posts `online` to the status endpoint on a fixed interval and `offline`
//! when told to stop. A reporter that dies without saying so still reads as
//! offline once its last report goes stale.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::HeartbeatConfig;
use crate::status::{OFFLINE, ONLINE};

/// Errors specific to heartbeat reporting
#[derive(Error, Debug)]
pub enum HeartbeatError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("status endpoint returned {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

impl HeartbeatError {
    /// Network failures, server errors, and rate limits are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            HeartbeatError::Request(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            HeartbeatError::Rejected { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    key: &'a str,
    status: &'a str,
    details: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusReportAck {
    id: Uuid,
}

/// Periodically reports health to the status registry over HTTP
pub struct HeartbeatReporter {
    client: reqwest::Client,
    endpoint: String,
    key: String,
    interval: Duration,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    shutdown_rx: Option<mpsc::Receiver<()>>,
    beats: u64,
}

impl HeartbeatReporter {
    pub fn new(config: &HeartbeatConfig) -> Result<Self, HeartbeatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/v1/status", config.api_url.trim_end_matches('/')),
            key: config.key.clone(),
            interval: config.interval(),
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            shutdown_rx: None,
            beats: 0,
        })
    }

    /// Override the retry delays
    pub fn with_retry_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Set shutdown receiver
    pub fn with_shutdown(mut self, rx: mpsc::Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn retry_strategy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }

    /// Send one report, retrying transient failures. Returns the status
    /// entry id.
    #[instrument(skip(self, details), fields(key = %self.key))]
    pub async fn report(
        &self,
        status: &str,
        details: Option<String>,
    ) -> Result<Uuid, HeartbeatError> {
        let op = || {
            let details = details.clone();
            async move { self.send(status, details).await }
        };

        op.retry(self.retry_strategy())
            .when(HeartbeatError::is_transient)
            .notify(|err, dur| {
                warn!("Retrying heartbeat after {:?}: {}", dur, err);
            })
            .await
    }

    async fn send(&self, status: &str, details: Option<String>) -> Result<Uuid, HeartbeatError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&StatusReport {
                key: &self.key,
                status,
                details,
            })
            .send()
            .await?;

        let code = response.status();
        if !code.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HeartbeatError::Rejected { status: code, body });
        }

        let ack: StatusReportAck = response.json().await?;
        debug!(entry_id = %ack.id, status = %status, "Heartbeat accepted");
        Ok(ack.id)
    }

    /// Report `online` once
    pub async fn beat(&mut self) -> Result<Uuid, HeartbeatError> {
        self.beats += 1;
        let details = format!("Running | beats={}", self.beats);
        self.report(ONLINE, Some(details)).await
    }

    /// Report `online` every interval until shutdown, then report `offline`
    pub async fn run(&mut self) -> Result<(), HeartbeatError> {
        info!(
            "Heartbeat reporter started, endpoint: {}, interval: {:?}",
            self.endpoint, self.interval
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.beat().await {
                        error!("Heartbeat failed: {}", e);
                    }
                }
                _ = async {
                    if let Some(ref mut rx) = self.shutdown_rx {
                        rx.recv().await
                    } else {
                        std::future::pending::<Option<()>>().await
                    }
                } => {
                    info!("Heartbeat reporter shutting down");
                    break;
                }
            }
        }

        self.report(OFFLINE, Some("Reporter stopped".to_string()))
            .await
            .map(|_| ())
    }
}
