//! Hotmart webhook payloads (webhook version 2.0.0): an `{event, data}`
//! envelope, prices as float reais, dates as epoch milliseconds.

use serde::Deserialize;
use serde_json::Value;

use super::{CustomerInfo, NormalizedSale, PaymentInfo, ProductInfo, SaleEventKind};
use crate::models::{PaymentMethod, Vendor};
use crate::normalize::{millis_timestamp, non_empty};

#[derive(Debug, Clone, Deserialize)]
pub struct HotmartEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub event: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub creation_date: Option<i64>,
    pub data: HotmartData,
}

/// Cart-abandonment events carry no `purchase` object.
#[derive(Debug, Clone, Deserialize)]
pub struct HotmartData {
    #[serde(default)]
    pub product: Option<HotmartProduct>,
    pub buyer: HotmartBuyer,
    #[serde(default)]
    pub purchase: Option<HotmartPurchase>,
    #[serde(default)]
    pub subscription: Option<HotmartSubscription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HotmartBuyer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub checkout_phone: Option<String>,
    #[serde(default)]
    pub document: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HotmartProduct {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ucode: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HotmartPurchase {
    #[serde(default)]
    pub transaction: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub approved_date: Option<i64>,
    #[serde(default)]
    pub payment: Option<HotmartPayment>,
    #[serde(default)]
    pub price: Option<HotmartPrice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HotmartPayment {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub installments_number: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HotmartPrice {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub currency_value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HotmartSubscription {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub plan: Option<Value>,
    #[serde(default)]
    pub subscriber: Option<Value>,
}

impl HotmartEvent {
    pub fn kind(&self) -> Option<SaleEventKind> {
        match self.event.as_str() {
            "PURCHASE_APPROVED" => Some(SaleEventKind::Approved),
            "PURCHASE_BILLET_PRINTED" => Some(SaleEventKind::PaymentPending),
            // An overdue recurrence is an open charge awaiting payment.
            "PURCHASE_DELAYED" => Some(SaleEventKind::PaymentPending),
            "PURCHASE_OUT_OF_SHOPPING_CART" | "CART_ABANDONMENT" => Some(SaleEventKind::Abandoned),
            "PURCHASE_REFUNDED" => Some(SaleEventKind::Refunded),
            "PURCHASE_CHARGEBACK" => Some(SaleEventKind::Chargeback),
            "PURCHASE_CANCELED" | "SUBSCRIPTION_CANCELLATION" => Some(SaleEventKind::Canceled),
            // PURCHASE_COMPLETE is the warranty window closing; the lead
            // became a customer back at PURCHASE_APPROVED.
            "PURCHASE_COMPLETE" | "PURCHASE_EXPIRED" => None,
            _ => None,
        }
    }

    pub fn normalize(self) -> Option<NormalizedSale> {
        let kind = self.kind()?;
        let purchase = self.data.purchase;
        let price = purchase.as_ref().and_then(|p| p.price.clone());
        let payment = purchase.as_ref().and_then(|p| p.payment.clone());

        // Float reais straight from the envelope; the integer-cents
        // heuristic never applies to Hotmart.
        let amount_cents = price
            .as_ref()
            .and_then(|p| p.value)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| (v * 100.0).round() as i64);

        Some(NormalizedSale {
            vendor: Vendor::Hotmart,
            kind,
            transaction_id: purchase.as_ref().and_then(|p| non_empty(p.transaction.clone())),
            customer: CustomerInfo {
                name: non_empty(self.data.buyer.name),
                email: non_empty(self.data.buyer.email),
                phone_raw: self.data.buyer.checkout_phone.unwrap_or_default(),
                document: non_empty(self.data.buyer.document),
            },
            product: self.data.product.and_then(|p| {
                non_empty(p.name).map(|name| ProductInfo {
                    external_id: p.id.map(|id| id.to_string()),
                    name,
                })
            }),
            payment: PaymentInfo {
                method: payment
                    .as_ref()
                    .and_then(|p| p.kind.as_deref())
                    .map(PaymentMethod::infer)
                    .unwrap_or(PaymentMethod::Unknown),
                amount_cents,
                currency: price
                    .and_then(|p| p.currency_value)
                    .unwrap_or_else(|| "BRL".to_string()),
                installments: payment.and_then(|p| p.installments_number),
            },
            occurred_at: purchase
                .as_ref()
                .and_then(|p| p.approved_date)
                .or(self.creation_date)
                .and_then(millis_timestamp),
        })
    }
}
