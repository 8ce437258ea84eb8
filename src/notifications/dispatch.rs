use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::NotificationConfig;
use crate::models::{DeliveryChannel, DeliveryJob, DeliveryStatus};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no endpoint configured for {0:?} delivery")]
    NoEndpoint(DeliveryChannel),

    #[error("delivery endpoint answered {0}")]
    Rejected(u16),

    #[error("delivery request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Sends one queued payload to its channel
#[async_trait]
pub trait Deliverer: Send + Sync {
    async fn deliver(&self, job: &DeliveryJob) -> Result<(), DispatchError>;
}

/// POSTs payloads as JSON to the configured email/push endpoints
pub struct HttpDeliverer {
    client: reqwest::Client,
    email_endpoint: Option<String>,
    push_endpoint: Option<String>,
}

impl HttpDeliverer {
    pub fn new(settings: &NotificationConfig) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            email_endpoint: settings.email_endpoint.clone(),
            push_endpoint: settings.push_endpoint.clone(),
        })
    }

    fn endpoint(&self, channel: DeliveryChannel) -> Option<&str> {
        match channel {
            DeliveryChannel::Email => self.email_endpoint.as_deref(),
            DeliveryChannel::Push => self.push_endpoint.as_deref(),
        }
    }
}

#[async_trait]
impl Deliverer for HttpDeliverer {
    async fn deliver(&self, job: &DeliveryJob) -> Result<(), DispatchError> {
        let endpoint = self.endpoint(job.channel).ok_or(DispatchError::NoEndpoint(job.channel))?;
        let response = self
            .client
            .post(endpoint)
            .json(&serde_json::json!({
                "id": job.id,
                "recipient": job.recipient,
                "payload": job.payload,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DispatchError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub sent: usize,
    /// Failed this round but still below the attempt cap
    pub retrying: usize,
    /// Reached the attempt cap and will not be picked up again
    pub failed: usize,
}

/// Drain one batch per channel from the delivery queue
pub async fn process_notifications(
    store: &dyn Store,
    deliverer: &dyn Deliverer,
    settings: &NotificationConfig,
) -> Result<DispatchReport, StoreError> {
    let mut report = DispatchReport::default();

    for channel in [DeliveryChannel::Email, DeliveryChannel::Push] {
        let jobs = store.pending_deliveries(channel, settings.batch_size).await?;
        if jobs.is_empty() {
            continue;
        }
        tracing::debug!("Dispatching {} {:?} job(s)", jobs.len(), channel);

        for mut job in jobs {
            job.attempts += 1;
            job.updated_at = Utc::now();

            match deliverer.deliver(&job).await {
                Ok(()) => {
                    job.status = DeliveryStatus::Sent;
                    job.last_error = None;
                    report.sent += 1;
                }
                Err(e) => {
                    job.last_error = Some(e.to_string());
                    if job.attempts >= settings.max_attempts {
                        job.status = DeliveryStatus::Failed;
                        report.failed += 1;
                        tracing::warn!("Delivery {} failed permanently after {} attempts: {}", job.id, job.attempts, e);
                    } else {
                        report.retrying += 1;
                        tracing::debug!("Delivery {} failed (attempt {}): {}", job.id, job.attempts, e);
                    }
                }
            }
            store.update_delivery(job).await?;
        }
    }

    if report != DispatchReport::default() {
        tracing::info!(
            "Notification dispatch: {} sent, {} retrying, {} failed",
            report.sent,
            report.retrying,
            report.failed
        );
    }
    Ok(report)
}
