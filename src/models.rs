use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub is_default: bool,
    /// Downstream automation webhook; `None` disables automation for the
    /// workspace.
    pub automation_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardColumn {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Source of a lead or order: one of the payment platforms posting
/// webhooks, or `Direct` for form captures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    Kirvano,
    Kiwify,
    Hotmart,
    Direct,
}

impl Vendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kirvano => "kirvano",
            Self::Kiwify => "kiwify",
            Self::Hotmart => "hotmart",
            Self::Direct => "direct",
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kirvano" => Ok(Self::Kirvano),
            "kiwify" => Ok(Self::Kiwify),
            "hotmart" => Ok(Self::Hotmart),
            "direct" => Ok(Self::Direct),
            _ => Err(format!("Invalid vendor: {}", s)),
        }
    }
}

/// Kanban-facing lead status.
///
/// Progression statuses rank `New < Abandoned < AwaitingPayment < Customer`
/// and only ever move a lead up; correction statuses (`Refused`,
/// `Refunded`, `Canceled`) overwrite unconditionally. Webhooks arrive
/// repeated and out of order, so the upsert must never downgrade a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Abandoned,
    AwaitingPayment,
    Customer,
    Refused,
    Refunded,
    Canceled,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Abandoned => "abandoned",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Customer => "customer",
            Self::Refused => "refused",
            Self::Refunded => "refunded",
            Self::Canceled => "canceled",
        }
    }

    /// Correction statuses record money moving backwards; they apply no
    /// matter what the lead looked like before.
    pub fn is_correction(&self) -> bool {
        matches!(self, Self::Refused | Self::Refunded | Self::Canceled)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::New => 0,
            Self::Abandoned => 1,
            Self::AwaitingPayment => 2,
            Self::Customer => 3,
            // Corrections never compete on rank.
            Self::Refused | Self::Refunded | Self::Canceled => 0,
        }
    }

    /// Whether an incoming status should replace `current`.
    ///
    /// A progression applies over any correction: a refused or refunded
    /// customer who checks out again is moving forward.
    pub fn applies_over(&self, current: &LeadStatus) -> bool {
        if self.is_correction() {
            return true;
        }
        current.is_correction() || self.rank() > current.rank()
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "abandoned" => Ok(Self::Abandoned),
            "awaiting_payment" => Ok(Self::AwaitingPayment),
            "customer" => Ok(Self::Customer),
            "refused" => Ok(Self::Refused),
            "refunded" => Ok(Self::Refunded),
            "canceled" => Ok(Self::Canceled),
            _ => Err(format!("Invalid lead status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Paid,
    Refunded,
    Chargeback,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Refunded => "refunded",
            Self::Chargeback => "chargeback",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(Self::Paid),
            "refunded" => Ok(Self::Refunded),
            "chargeback" => Ok(Self::Chargeback),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    CreditCard,
    Boleto,
    Unknown,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pix => "pix",
            Self::CreditCard => "credit_card",
            Self::Boleto => "boleto",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient mapping from whatever label a vendor uses
    /// (`"PIX"`, `"credit_card"`, `"BOLETO"`, `"billet"`, ...).
    pub fn infer(raw: &str) -> Self {
        let label = raw.trim().to_ascii_lowercase();
        if label.contains("pix") {
            Self::Pix
        } else if label.contains("card") || label.contains("credit") {
            Self::CreditCard
        } else if label.contains("boleto") || label.contains("billet") || label.contains("slip") {
            Self::Boleto
        } else {
            Self::Unknown
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pix" => Ok(Self::Pix),
            "credit_card" => Ok(Self::CreditCard),
            "boleto" => Ok(Self::Boleto),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Invalid payment method: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub workspace_id: Uuid,
    /// Kanban column; set once at creation, moved only by operators.
    pub column_id: Option<Uuid>,
    pub name: String,
    /// Normalized digits-only phone, the idempotency key within a workspace.
    pub phone: String,
    pub email: Option<String>,
    pub document: Option<String>,
    pub source: Vendor,
    pub status: LeadStatus,
    /// Name of the last product this lead interacted with.
    pub product: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert shape for `leads`; the platform fills `id` and `created_at`.
#[derive(Debug, Clone, Serialize)]
pub struct NewLead {
    pub workspace_id: Uuid,
    pub column_id: Option<Uuid>,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub document: Option<String>,
    pub source: Vendor,
    pub status: LeadStatus,
    pub product: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for `leads`; only set fields reach the PATCH body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LeadPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LeadStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LeadPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.document.is_none()
            && self.status.is_none()
            && self.product.is_none()
            && self.last_event_at.is_none()
            && self.updated_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub lead_id: Uuid,
    pub platform: Vendor,
    /// Vendor-side transaction id; `(platform, external_id)` is unique.
    pub external_id: String,
    pub product_name: Option<String>,
    pub amount_cents: Option<i64>,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub installments: Option<u32>,
    pub status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert/upsert shape for `orders`.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub workspace_id: Uuid,
    pub lead_id: Uuid,
    pub platform: Vendor,
    pub external_id: String,
    pub product_name: Option<String>,
    pub amount_cents: Option<i64>,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub installments: Option<u32>,
    pub status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
}
