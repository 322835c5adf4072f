//! Delivery of processed events to a workspace's automation webhook.
//!
//! Fire-and-forget with a short timeout: the gateway never retries and
//! never queues. A delivery failure is reported in the provisioning
//! outcome and otherwise ignored.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Lead, Order, Vendor};
use crate::vendors::SaleEventKind;

/// Payload POSTed to the automation webhook after a lead is upserted.
#[derive(Debug, Clone, Serialize)]
pub struct AutomationEvent {
    pub event: SaleEventKind,
    pub vendor: Vendor,
    pub workspace_id: Uuid,
    pub lead: Lead,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, url: &str, event: &AutomationEvent) -> anyhow::Result<()>;
}

pub struct WebhookNotifier {
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, url: &str, event: &AutomationEvent) -> anyhow::Result<()> {
        let response = self.http.post(url).json(event).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("automation webhook {url} answered {status}");
        }
        Ok(())
    }
}
