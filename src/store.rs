//! CRM store seam between the pipeline and persistence.
//!
//! Two implementations share the trait: `PlatformStore` maps each
//! operation onto the hosted platform's REST layer, `MemoryStore` keeps
//! the same observable semantics in process memory for tests and the
//! pipeline's unit tests.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{PlatformError, StoreError};
use crate::models::{BoardColumn, Lead, LeadPatch, NewLead, NewOrder, Order, Workspace};
use crate::platform::PlatformClient;

#[async_trait]
pub trait CrmStore: Send + Sync {
    /// The workspace flagged `is_default`, else the oldest one; `None`
    /// when the platform has no workspaces at all.
    async fn default_workspace(&self) -> Result<Option<Workspace>, StoreError>;

    async fn workspace(&self, id: Uuid) -> Result<Option<Workspace>, StoreError>;

    /// Lowest-position kanban column of the workspace, where new leads
    /// land.
    async fn entry_column(&self, workspace_id: Uuid) -> Result<Option<BoardColumn>, StoreError>;

    /// The idempotency probe: leads are keyed by `(workspace, phone)`.
    async fn find_lead_by_phone(
        &self,
        workspace_id: Uuid,
        phone: &str,
    ) -> Result<Option<Lead>, StoreError>;

    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, StoreError>;

    async fn update_lead(&self, id: Uuid, patch: LeadPatch) -> Result<Lead, StoreError>;

    /// Idempotent on `(platform, external_id)`; a replayed webhook merges
    /// into the existing row.
    async fn upsert_order(&self, order: NewOrder) -> Result<Order, StoreError>;
}

// ── Platform-backed store ────────────────────────────────────────────

pub struct PlatformStore {
    client: PlatformClient,
}

impl PlatformStore {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CrmStore for PlatformStore {
    async fn default_workspace(&self) -> Result<Option<Workspace>, StoreError> {
        let mut flagged: Vec<Workspace> = self
            .client
            .table("workspaces")
            .filter("is_default", "is", "true")
            .limit(1)
            .select()
            .await?;
        if let Some(workspace) = flagged.pop() {
            return Ok(Some(workspace));
        }
        let mut oldest: Vec<Workspace> = self
            .client
            .table("workspaces")
            .order("created_at.asc")
            .limit(1)
            .select()
            .await?;
        Ok(oldest.pop())
    }

    async fn workspace(&self, id: Uuid) -> Result<Option<Workspace>, StoreError> {
        let mut rows: Vec<Workspace> = self
            .client
            .table("workspaces")
            .eq("id", id)
            .limit(1)
            .select()
            .await?;
        Ok(rows.pop())
    }

    async fn entry_column(&self, workspace_id: Uuid) -> Result<Option<BoardColumn>, StoreError> {
        let mut rows: Vec<BoardColumn> = self
            .client
            .table("board_columns")
            .eq("workspace_id", workspace_id)
            .order("position.asc")
            .limit(1)
            .select()
            .await?;
        Ok(rows.pop())
    }

    async fn find_lead_by_phone(
        &self,
        workspace_id: Uuid,
        phone: &str,
    ) -> Result<Option<Lead>, StoreError> {
        let mut rows: Vec<Lead> = self
            .client
            .table("leads")
            .eq("workspace_id", workspace_id)
            .eq("phone", phone)
            .limit(1)
            .select()
            .await?;
        Ok(rows.pop())
    }

    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let row = self.client.table("leads").insert(&lead).await?;
        Ok(row)
    }

    async fn update_lead(&self, id: Uuid, patch: LeadPatch) -> Result<Lead, StoreError> {
        let mut rows: Vec<Lead> = self
            .client
            .table("leads")
            .eq("id", id)
            .update(&patch)
            .await?;
        rows.pop().ok_or(StoreError::Platform(
            PlatformError::EmptyRepresentation {
                table: "leads".to_string(),
            },
        ))
    }

    async fn upsert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let row = self
            .client
            .table("orders")
            .upsert(&order, "platform,external_id")
            .await?;
        Ok(row)
    }
}

// ── In-memory store ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryTables>,
}

#[derive(Default)]
struct MemoryTables {
    workspaces: Vec<Workspace>,
    columns: Vec<BoardColumn>,
    leads: Vec<Lead>,
    orders: Vec<Order>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_workspace(
        &self,
        name: &str,
        is_default: bool,
        automation_url: Option<&str>,
    ) -> Workspace {
        let workspace = Workspace {
            id: Uuid::new_v4(),
            name: name.to_string(),
            is_default,
            automation_url: automation_url.map(|u| u.to_string()),
            created_at: chrono::Utc::now(),
        };
        self.inner.write().await.workspaces.push(workspace.clone());
        workspace
    }

    pub async fn seed_column(
        &self,
        workspace_id: Uuid,
        title: &str,
        position: i32,
    ) -> BoardColumn {
        let column = BoardColumn {
            id: Uuid::new_v4(),
            workspace_id,
            title: title.to_string(),
            position,
            created_at: chrono::Utc::now(),
        };
        self.inner.write().await.columns.push(column.clone());
        column
    }

    /// Snapshot for assertions.
    pub async fn leads(&self) -> Vec<Lead> {
        self.inner.read().await.leads.clone()
    }

    /// Snapshot for assertions.
    pub async fn orders(&self) -> Vec<Order> {
        self.inner.read().await.orders.clone()
    }
}

fn apply_patch(lead: &mut Lead, patch: LeadPatch) {
    if let Some(name) = patch.name {
        lead.name = name;
    }
    if let Some(email) = patch.email {
        lead.email = Some(email);
    }
    if let Some(document) = patch.document {
        lead.document = Some(document);
    }
    if let Some(status) = patch.status {
        lead.status = status;
    }
    if let Some(product) = patch.product {
        lead.product = Some(product);
    }
    if let Some(at) = patch.last_event_at {
        lead.last_event_at = Some(at);
    }
    if let Some(at) = patch.updated_at {
        lead.updated_at = at;
    }
}

#[async_trait]
impl CrmStore for MemoryStore {
    async fn default_workspace(&self) -> Result<Option<Workspace>, StoreError> {
        let tables = self.inner.read().await;
        let flagged = tables.workspaces.iter().find(|w| w.is_default);
        let chosen = flagged.or_else(|| tables.workspaces.iter().min_by_key(|w| w.created_at));
        Ok(chosen.cloned())
    }

    async fn workspace(&self, id: Uuid) -> Result<Option<Workspace>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables.workspaces.iter().find(|w| w.id == id).cloned())
    }

    async fn entry_column(&self, workspace_id: Uuid) -> Result<Option<BoardColumn>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .columns
            .iter()
            .filter(|c| c.workspace_id == workspace_id)
            .min_by_key(|c| c.position)
            .cloned())
    }

    async fn find_lead_by_phone(
        &self,
        workspace_id: Uuid,
        phone: &str,
    ) -> Result<Option<Lead>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .leads
            .iter()
            .find(|l| l.workspace_id == workspace_id && l.phone == phone)
            .cloned())
    }

    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let row = Lead {
            id: Uuid::new_v4(),
            workspace_id: lead.workspace_id,
            column_id: lead.column_id,
            name: lead.name,
            phone: lead.phone,
            email: lead.email,
            document: lead.document,
            source: lead.source,
            status: lead.status,
            product: lead.product,
            last_event_at: lead.last_event_at,
            created_at: chrono::Utc::now(),
            updated_at: lead.updated_at,
        };
        self.inner.write().await.leads.push(row.clone());
        Ok(row)
    }

    async fn update_lead(&self, id: Uuid, patch: LeadPatch) -> Result<Lead, StoreError> {
        let mut tables = self.inner.write().await;
        let lead = tables
            .leads
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| StoreError::Unavailable(format!("lead {id} not found")))?;
        apply_patch(lead, patch);
        Ok(lead.clone())
    }

    async fn upsert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tables = self.inner.write().await;
        if let Some(existing) = tables
            .orders
            .iter_mut()
            .find(|o| o.platform == order.platform && o.external_id == order.external_id)
        {
            existing.workspace_id = order.workspace_id;
            existing.lead_id = order.lead_id;
            existing.product_name = order.product_name;
            existing.amount_cents = order.amount_cents;
            existing.currency = order.currency;
            existing.payment_method = order.payment_method;
            existing.installments = order.installments;
            existing.status = order.status;
            existing.paid_at = order.paid_at;
            return Ok(existing.clone());
        }
        let row = Order {
            id: Uuid::new_v4(),
            workspace_id: order.workspace_id,
            lead_id: order.lead_id,
            platform: order.platform,
            external_id: order.external_id,
            product_name: order.product_name,
            amount_cents: order.amount_cents,
            currency: order.currency,
            payment_method: order.payment_method,
            installments: order.installments,
            status: order.status,
            paid_at: order.paid_at,
            created_at: chrono::Utc::now(),
        };
        tables.orders.push(row.clone());
        Ok(row)
    }
}
