//! Vendor payload schemas and their mapping into the one internal sale
//! shape the pipeline consumes.
//!
//! | Endpoint             | Wire shape                          | Module    |
//! |----------------------|-------------------------------------|-----------|
//! | `/webhooks/kirvano`  | flat JSON, BRL string prices        | `kirvano` |
//! | `/webhooks/kiwify`   | PascalCase sub-objects, cent ints   | `kiwify`  |
//! | `/webhooks/hotmart`  | `{event, data}` envelope, float R$  | `hotmart` |
//!
//! Each schema module owns a `normalize()` returning `Option<NormalizedSale>`;
//! `None` means a recognized-but-irrelevant or unknown event name, which the
//! server acks with 200 so the vendor neither retries nor disables the
//! endpoint. Vendor casing and nesting never leak past this boundary.

pub mod hotmart;
pub mod kirvano;
pub mod kiwify;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{LeadStatus, OrderStatus, PaymentMethod, Vendor};

/// What a vendor event means to the CRM, independent of the vendor's own
/// event taxonomy. Everything the pipeline branches on hangs off this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleEventKind {
    Approved,
    PaymentPending,
    Abandoned,
    Refused,
    Refunded,
    Chargeback,
    Canceled,
    SubscriptionRenewed,
    LeadCapture,
}

impl SaleEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::PaymentPending => "payment_pending",
            Self::Abandoned => "abandoned",
            Self::Refused => "refused",
            Self::Refunded => "refunded",
            Self::Chargeback => "chargeback",
            Self::Canceled => "canceled",
            Self::SubscriptionRenewed => "subscription_renewed",
            Self::LeadCapture => "lead_capture",
        }
    }

    /// Lead status this event pushes towards (subject to the lattice in
    /// `models::LeadStatus::applies_over`).
    pub fn lead_status(&self) -> LeadStatus {
        match self {
            Self::Approved | Self::SubscriptionRenewed => LeadStatus::Customer,
            Self::PaymentPending => LeadStatus::AwaitingPayment,
            Self::Abandoned => LeadStatus::Abandoned,
            Self::Refused => LeadStatus::Refused,
            // A chargeback is still money returned; the order keeps the
            // precise status.
            Self::Refunded | Self::Chargeback => LeadStatus::Refunded,
            Self::Canceled => LeadStatus::Canceled,
            Self::LeadCapture => LeadStatus::New,
        }
    }

    /// Order status to record, or `None` when the event is not an order
    /// fact. Refunds and chargebacks upsert so the order row exists even
    /// when the approval webhook was never delivered.
    pub fn order_status(&self) -> Option<OrderStatus> {
        match self {
            Self::Approved | Self::SubscriptionRenewed => Some(OrderStatus::Paid),
            Self::Refunded => Some(OrderStatus::Refunded),
            Self::Chargeback => Some(OrderStatus::Chargeback),
            _ => None,
        }
    }

    pub fn records_order(&self) -> bool {
        self.order_status().is_some()
    }

    /// Events that feed the workspace automation webhook (welcome,
    /// payment-reminder and cart-recovery flows). Money-back events stay
    /// out: nobody wants a remarketing message after a refund.
    pub fn triggers_automation(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::PaymentPending | Self::Abandoned | Self::LeadCapture
        )
    }
}

impl std::fmt::Display for SaleEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "payment_pending" => Ok(Self::PaymentPending),
            "abandoned" => Ok(Self::Abandoned),
            "refused" => Ok(Self::Refused),
            "refunded" => Ok(Self::Refunded),
            "chargeback" => Ok(Self::Chargeback),
            "canceled" => Ok(Self::Canceled),
            "subscription_renewed" => Ok(Self::SubscriptionRenewed),
            "lead_capture" => Ok(Self::LeadCapture),
            _ => Err(format!("Invalid sale event kind: {}", s)),
        }
    }
}

/// The single internal shape every vendor payload maps into.
#[derive(Debug, Clone)]
pub struct NormalizedSale {
    pub vendor: Vendor,
    pub kind: SaleEventKind,
    /// Vendor-side transaction/order id; keys the order upsert.
    pub transaction_id: Option<String>,
    pub customer: CustomerInfo,
    pub product: Option<ProductInfo>,
    pub payment: PaymentInfo,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Phone as the vendor sent it; the pipeline normalizes and keys on it.
    pub phone_raw: String,
    pub document: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProductInfo {
    pub external_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub amount_cents: Option<i64>,
    pub currency: String,
    pub installments: Option<u32>,
}

impl Default for PaymentInfo {
    fn default() -> Self {
        Self {
            method: PaymentMethod::Unknown,
            amount_cents: None,
            currency: "BRL".to_string(),
            installments: None,
        }
    }
}
