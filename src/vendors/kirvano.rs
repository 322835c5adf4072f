//! Kirvano webhook payloads: flat JSON, SCREAMING_CASE event names, prices
//! as formatted BRL strings.

use serde::Deserialize;
use serde_json::Value;

use super::{CustomerInfo, NormalizedSale, PaymentInfo, ProductInfo, SaleEventKind};
use crate::models::{PaymentMethod, Vendor};
use crate::normalize::{amount_from_value, non_empty, parse_timestamp};

#[derive(Debug, Clone, Deserialize)]
pub struct KirvanoEvent {
    pub event: String,
    #[serde(default)]
    pub event_description: Option<String>,
    #[serde(default)]
    pub checkout_id: Option<String>,
    #[serde(default)]
    pub sale_id: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Current payloads send `"R$ 297,00"`; older ones send a bare number.
    #[serde(default)]
    pub total_price: Option<Value>,
    #[serde(default, rename = "type")]
    pub sale_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    pub customer: KirvanoCustomer,
    #[serde(default)]
    pub products: Vec<KirvanoProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KirvanoCustomer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KirvanoProduct {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub offer_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub is_order_bump: bool,
}

impl KirvanoEvent {
    /// Map the vendor event name to the internal kind. `None` covers
    /// events the CRM does not act on (`PIX_EXPIRED` and whatever Kirvano
    /// ships next).
    pub fn kind(&self) -> Option<SaleEventKind> {
        match self.event.as_str() {
            "SALE_APPROVED" => Some(SaleEventKind::Approved),
            "PIX_GENERATED" | "BANK_SLIP_GENERATED" => Some(SaleEventKind::PaymentPending),
            "ABANDONED_CART" => Some(SaleEventKind::Abandoned),
            "SALE_REFUSED" => Some(SaleEventKind::Refused),
            "SALE_REFUNDED" => Some(SaleEventKind::Refunded),
            "SALE_CHARGEBACK" => Some(SaleEventKind::Chargeback),
            "SUBSCRIPTION_CANCELED" | "SUBSCRIPTION_EXPIRED" => Some(SaleEventKind::Canceled),
            "SUBSCRIPTION_RENEWED" => Some(SaleEventKind::SubscriptionRenewed),
            _ => None,
        }
    }

    pub fn normalize(self) -> Option<NormalizedSale> {
        let kind = self.kind()?;

        // The main product names the sale; order bumps ride along.
        let product = self
            .products
            .iter()
            .find(|p| !p.is_order_bump)
            .or_else(|| self.products.first());
        let amount_cents = self
            .total_price
            .as_ref()
            .and_then(amount_from_value)
            .or_else(|| product.and_then(|p| p.price.as_ref()).and_then(amount_from_value));
        let product_info = product.and_then(|p| {
            non_empty(p.name.clone()).map(|name| ProductInfo {
                external_id: p.id.clone(),
                name,
            })
        });

        Some(NormalizedSale {
            vendor: Vendor::Kirvano,
            kind,
            transaction_id: non_empty(self.sale_id).or(non_empty(self.checkout_id)),
            customer: CustomerInfo {
                name: non_empty(self.customer.name),
                email: non_empty(self.customer.email),
                phone_raw: self.customer.phone_number.unwrap_or_default(),
                document: non_empty(self.customer.document),
            },
            product: product_info,
            payment: PaymentInfo {
                method: self
                    .payment_method
                    .as_deref()
                    .map(PaymentMethod::infer)
                    .unwrap_or(PaymentMethod::Unknown),
                amount_cents,
                currency: "BRL".to_string(),
                installments: None,
            },
            occurred_at: self.created_at.as_deref().and_then(parse_timestamp),
        })
    }
}
