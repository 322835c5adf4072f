//! Provisioning pipeline: one normalized sale event in, one upserted
//! lead out, plus an order row and an automation ping when the event
//! calls for them.
//!
//! The pipeline is deliberately forgiving past the lead step. Once the
//! lead is safely upserted, an order failure or a dead automation
//! webhook degrades the outcome instead of failing the request, so the
//! vendor never retries a webhook we already absorbed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::automation::{AutomationEvent, Notifier};
use crate::errors::ProvisionError;
use crate::models::{Lead, LeadPatch, NewLead, NewOrder, Order, OrderStatus, Workspace};
use crate::normalize::normalize_phone;
use crate::store::CrmStore;
use crate::vendors::NormalizedSale;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationStatus {
    Triggered,
    Skipped,
    Failed,
}

impl AutomationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triggered => "triggered",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AutomationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that happened while absorbing one event.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionOutcome {
    pub workspace_id: Uuid,
    pub lead: Lead,
    pub lead_created: bool,
    pub order: Option<Order>,
    /// Set when the order step failed; the lead above it still counts.
    pub order_error: Option<String>,
    pub automation: AutomationStatus,
    pub automation_error: Option<String>,
}

pub struct LeadPipeline {
    store: Arc<dyn CrmStore>,
    notifier: Arc<dyn Notifier>,
    default_country_code: String,
}

impl LeadPipeline {
    pub fn new(
        store: Arc<dyn CrmStore>,
        notifier: Arc<dyn Notifier>,
        default_country_code: &str,
    ) -> Self {
        Self {
            store,
            notifier,
            default_country_code: default_country_code.to_string(),
        }
    }

    /// Runs the full provisioning flow for one event.
    ///
    /// Steps: resolve workspace, normalize the phone key, upsert the
    /// lead, conditionally upsert the order, conditionally ping the
    /// automation webhook. Only the first three can fail the call.
    pub async fn process(
        &self,
        sale: NormalizedSale,
        workspace_hint: Option<Uuid>,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        debug!(vendor = %sale.vendor, event = %sale.kind, "processing sale event");

        let workspace = self.resolve_workspace(workspace_hint).await?;

        let phone = normalize_phone(&sale.customer.phone_raw, &self.default_country_code)
            .ok_or_else(|| ProvisionError::UnusablePhone {
                raw: sale.customer.phone_raw.clone(),
            })?;

        let (lead, lead_created) = self.upsert_lead(&workspace, &phone, &sale).await?;

        let (order, order_error) = self.record_order(&workspace, &lead, &sale).await;

        let (automation, automation_error) = self
            .ping_automation(&workspace, &lead, order.as_ref(), &sale)
            .await;

        Ok(ProvisionOutcome {
            workspace_id: workspace.id,
            lead,
            lead_created,
            order,
            order_error,
            automation,
            automation_error,
        })
    }

    /// Hinted workspace when it exists, else the default one. A stale
    /// hint logs and falls back rather than bouncing the webhook.
    async fn resolve_workspace(&self, hint: Option<Uuid>) -> Result<Workspace, ProvisionError> {
        if let Some(id) = hint {
            match self.store.workspace(id).await? {
                Some(workspace) => return Ok(workspace),
                None => {
                    warn!(workspace_id = %id, "hinted workspace not found, using default")
                }
            }
        }
        self.store
            .default_workspace()
            .await?
            .ok_or(ProvisionError::NoWorkspace)
    }

    async fn upsert_lead(
        &self,
        workspace: &Workspace,
        phone: &str,
        sale: &NormalizedSale,
    ) -> Result<(Lead, bool), ProvisionError> {
        let now = Utc::now();
        let status = sale.kind.lead_status();
        let product = sale.product.as_ref().map(|p| p.name.clone());
        let name = sale
            .customer
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        if let Some(existing) = self.store.find_lead_by_phone(workspace.id, phone).await? {
            let mut patch = LeadPatch {
                last_event_at: next_event_time(existing.last_event_at, sale.occurred_at, now),
                updated_at: Some(now),
                ..Default::default()
            };
            // Identity fields only fill gaps; a webhook never clobbers
            // what an operator typed in.
            if let Some(name) = name {
                if existing.name.trim().is_empty() || existing.name == existing.phone {
                    patch.name = Some(name.to_string());
                }
            }
            if existing.email.is_none() {
                patch.email = sale.customer.email.clone();
            }
            if existing.document.is_none() {
                patch.document = sale.customer.document.clone();
            }
            if status.applies_over(&existing.status) {
                patch.status = Some(status);
            }
            // Latest product interest wins.
            if product.is_some() && product != existing.product {
                patch.product = product;
            }
            let lead = self.store.update_lead(existing.id, patch).await?;
            debug!(lead_id = %lead.id, status = %lead.status, "updated existing lead");
            return Ok((lead, false));
        }

        let column = self.store.entry_column(workspace.id).await?;
        let lead = self
            .store
            .insert_lead(NewLead {
                workspace_id: workspace.id,
                column_id: column.map(|c| c.id),
                name: name.map(String::from).unwrap_or_else(|| phone.to_string()),
                phone: phone.to_string(),
                email: sale.customer.email.clone(),
                document: sale.customer.document.clone(),
                source: sale.vendor.clone(),
                status,
                product,
                last_event_at: Some(sale.occurred_at.unwrap_or(now)),
                updated_at: now,
            })
            .await?;
        info!(
            lead_id = %lead.id,
            workspace_id = %workspace.id,
            status = %lead.status,
            "created lead"
        );
        Ok((lead, true))
    }

    /// Upserts the order row for money events. Failures come back as a
    /// message instead of an error so the caller still answers 200.
    async fn record_order(
        &self,
        workspace: &Workspace,
        lead: &Lead,
        sale: &NormalizedSale,
    ) -> (Option<Order>, Option<String>) {
        let Some(status) = sale.kind.order_status() else {
            return (None, None);
        };
        let Some(external_id) = sale.transaction_id.clone() else {
            debug!(
                vendor = %sale.vendor,
                event = %sale.kind,
                "event carries no transaction id, skipping order"
            );
            return (None, None);
        };

        let paid_at = if status == OrderStatus::Paid {
            Some(sale.occurred_at.unwrap_or_else(Utc::now))
        } else {
            None
        };
        let row = NewOrder {
            workspace_id: workspace.id,
            lead_id: lead.id,
            platform: sale.vendor.clone(),
            external_id: external_id.clone(),
            product_name: sale.product.as_ref().map(|p| p.name.clone()),
            amount_cents: sale.payment.amount_cents,
            currency: sale.payment.currency.clone(),
            payment_method: sale.payment.method.clone(),
            installments: sale.payment.installments,
            status,
            paid_at,
        };
        match self.store.upsert_order(row).await {
            Ok(order) => {
                info!(order_id = %order.id, external_id = %external_id, status = %order.status, "upserted order");
                (Some(order), None)
            }
            Err(err) => {
                warn!(error = %err, external_id = %external_id, "order upsert failed, lead kept");
                (None, Some(err.to_string()))
            }
        }
    }

    async fn ping_automation(
        &self,
        workspace: &Workspace,
        lead: &Lead,
        order: Option<&Order>,
        sale: &NormalizedSale,
    ) -> (AutomationStatus, Option<String>) {
        if !sale.kind.triggers_automation() {
            return (AutomationStatus::Skipped, None);
        }
        let Some(url) = workspace.automation_url.as_deref() else {
            debug!(workspace_id = %workspace.id, "workspace has no automation url");
            return (AutomationStatus::Skipped, None);
        };

        let event = AutomationEvent {
            event: sale.kind.clone(),
            vendor: sale.vendor.clone(),
            workspace_id: workspace.id,
            lead: lead.clone(),
            order: order.cloned(),
            occurred_at: sale.occurred_at,
        };
        match self.notifier.deliver(url, &event).await {
            Ok(()) => {
                debug!(url, event = %sale.kind, "automation webhook triggered");
                (AutomationStatus::Triggered, None)
            }
            Err(err) => {
                warn!(error = %err, url, "automation webhook failed");
                (AutomationStatus::Failed, Some(err.to_string()))
            }
        }
    }
}

/// Monotonic guard for `last_event_at`: webhooks replay and arrive out
/// of order, and the lead should show the latest activity, not the last
/// delivery.
fn next_event_time(
    current: Option<DateTime<Utc>>,
    incoming: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let event_time = incoming.unwrap_or(now);
    match current {
        Some(prev) if prev >= event_time => None,
        _ => Some(event_time),
    }
}
