//! Kiwify webhook payloads. Two shapes arrive on the same endpoint:
//! orders (PascalCase sub-objects, amounts already in cents) and abandoned
//! carts (flat, no order id). An untagged enum tells them apart.

use serde::Deserialize;
use serde_json::Value;

use super::{CustomerInfo, NormalizedSale, PaymentInfo, ProductInfo, SaleEventKind};
use crate::models::{PaymentMethod, Vendor};
use crate::normalize::{non_empty, parse_timestamp};

/// Order first: it requires `order_id` and `webhook_event_type`, so a cart
/// payload (which has neither) can never match it. The cart variant in
/// turn requires `phone` and `product_name`, keeping arbitrary objects
/// from false-matching.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KiwifyEvent {
    Order(KiwifyOrder),
    AbandonedCart(KiwifyAbandonedCart),
}

#[derive(Debug, Clone, Deserialize)]
pub struct KiwifyOrder {
    pub order_id: String,
    #[serde(default)]
    pub order_ref: Option<String>,
    #[serde(default)]
    pub order_status: Option<String>,
    pub webhook_event_type: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub installments: Option<u32>,
    #[serde(default)]
    pub card_type: Option<String>,
    #[serde(default)]
    pub approved_date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, rename = "Product")]
    pub product: Option<KiwifyProduct>,
    #[serde(rename = "Customer")]
    pub customer: KiwifyCustomer,
    #[serde(default, rename = "Commissions")]
    pub commissions: Option<KiwifyCommissions>,
    #[serde(default, rename = "Subscription")]
    pub subscription: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KiwifyCustomer {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default, rename = "CPF")]
    pub cpf: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KiwifyProduct {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
}

/// Amounts here are integer cents; no heuristics apply.
#[derive(Debug, Clone, Deserialize)]
pub struct KiwifyCommissions {
    #[serde(default)]
    pub charge_amount: Option<i64>,
    #[serde(default)]
    pub product_base_price: Option<i64>,
    #[serde(default)]
    pub kiwify_fee: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KiwifyAbandonedCart {
    #[serde(default)]
    pub checkout_link: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub phone: String,
    pub product_name: String,
    #[serde(default)]
    pub country: Option<String>,
}

impl KiwifyEvent {
    /// Vendor-side event name, for ignore responses and logs.
    pub fn event_label(&self) -> &str {
        match self {
            Self::Order(order) => &order.webhook_event_type,
            Self::AbandonedCart(_) => "abandoned_cart",
        }
    }

    pub fn normalize(self) -> Option<NormalizedSale> {
        match self {
            Self::Order(order) => order.normalize(),
            Self::AbandonedCart(cart) => Some(cart.normalize()),
        }
    }
}

impl KiwifyOrder {
    pub fn kind(&self) -> Option<SaleEventKind> {
        match self.webhook_event_type.as_str() {
            "order_approved" => Some(SaleEventKind::Approved),
            "order_rejected" => Some(SaleEventKind::Refused),
            "order_refunded" => Some(SaleEventKind::Refunded),
            "chargeback" => Some(SaleEventKind::Chargeback),
            "pix_created" | "billet_created" => Some(SaleEventKind::PaymentPending),
            // An overdue renewal is an open charge; reminder flows apply.
            "subscription_late" => Some(SaleEventKind::PaymentPending),
            "subscription_canceled" => Some(SaleEventKind::Canceled),
            "subscription_renewed" => Some(SaleEventKind::SubscriptionRenewed),
            _ => None,
        }
    }

    fn normalize(self) -> Option<NormalizedSale> {
        let kind = self.kind()?;
        let commissions = self.commissions;

        Some(NormalizedSale {
            vendor: Vendor::Kiwify,
            kind,
            transaction_id: Some(self.order_id),
            customer: CustomerInfo {
                name: non_empty(self.customer.full_name).or(non_empty(self.customer.first_name)),
                email: non_empty(self.customer.email),
                phone_raw: self.customer.mobile.unwrap_or_default(),
                document: non_empty(self.customer.cpf),
            },
            product: self.product.and_then(|p| {
                non_empty(p.product_name).map(|name| ProductInfo {
                    external_id: p.product_id,
                    name,
                })
            }),
            payment: PaymentInfo {
                method: self
                    .payment_method
                    .as_deref()
                    .map(PaymentMethod::infer)
                    .unwrap_or(PaymentMethod::Unknown),
                amount_cents: commissions.as_ref().and_then(|c| c.charge_amount),
                currency: commissions
                    .and_then(|c| c.currency)
                    .unwrap_or_else(|| "BRL".to_string()),
                installments: self.installments,
            },
            occurred_at: self
                .approved_date
                .as_deref()
                .and_then(parse_timestamp)
                .or_else(|| self.created_at.as_deref().and_then(parse_timestamp)),
        })
    }
}

impl KiwifyAbandonedCart {
    fn normalize(self) -> NormalizedSale {
        NormalizedSale {
            vendor: Vendor::Kiwify,
            kind: SaleEventKind::Abandoned,
            transaction_id: None,
            customer: CustomerInfo {
                name: non_empty(self.name),
                email: non_empty(self.email),
                phone_raw: self.phone,
                document: None,
            },
            product: Some(ProductInfo {
                external_id: None,
                name: self.product_name,
            }),
            payment: PaymentInfo::default(),
            occurred_at: None,
        }
    }
}
