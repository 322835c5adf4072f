//! End-to-end webhook flow tests.
//!
//! Each test drives the real router against an in-memory store, so the
//! whole path runs as in production minus the network: vendor payload
//! deserialization, normalization, provisioning, HTTP answer.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::Mutex;
use tower::ServiceExt;

use leadgate::automation::{AutomationEvent, Notifier};
use leadgate::models::{LeadStatus, OrderStatus, Vendor};
use leadgate::pipeline::LeadPipeline;
use leadgate::server::api::AppState;
use leadgate::server::build_router;
use leadgate::store::MemoryStore;
use leadgate::vendors::SaleEventKind;

// ── Test gateway ──────────────────────────────────────────────────────

struct RecordingNotifier {
    deliveries: Mutex<Vec<(String, AutomationEvent)>>,
}

impl RecordingNotifier {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            deliveries: Mutex::new(Vec::new()),
        })
    }

    async fn recorded(&self) -> Vec<(String, AutomationEvent)> {
        self.deliveries.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, url: &str, event: &AutomationEvent) -> anyhow::Result<()> {
        self.deliveries
            .lock()
            .await
            .push((url.to_string(), event.clone()));
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn deliver(&self, _url: &str, _event: &AutomationEvent) -> anyhow::Result<()> {
        anyhow::bail!("automation endpoint timed out")
    }
}

struct Gateway {
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    router: Router,
    workspace_id: uuid::Uuid,
}

async fn gateway() -> Gateway {
    gateway_with_token(None).await
}

async fn gateway_with_token(token: Option<&str>) -> Gateway {
    let store = Arc::new(MemoryStore::new());
    let workspace = store
        .seed_workspace("Vendas", true, Some("https://hooks.example.com/auto"))
        .await;
    store.seed_column(workspace.id, "Novo", 0).await;
    store.seed_column(workspace.id, "Comprou", 1).await;

    let notifier = RecordingNotifier::new();
    let pipeline = LeadPipeline::new(store.clone(), notifier.clone(), "55");
    let state = Arc::new(AppState {
        pipeline,
        webhook_token: token.map(String::from),
    });
    Gateway {
        store,
        notifier,
        router: build_router(state),
        workspace_id: workspace.id,
    }
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

// ── Vendor payload fixtures ──────────────────────────────────────────

fn kirvano_event(event: &str, phone: &str, sale_id: &str) -> serde_json::Value {
    serde_json::json!({
        "event": event,
        "event_description": "Webhook event",
        "checkout_id": "chk_9f2",
        "sale_id": sale_id,
        "payment_method": "PIX",
        "total_price": "R$ 297,00",
        "type": "ONE_TIME",
        "status": "APPROVED",
        "created_at": "2024-06-12T15:04:05Z",
        "customer": {
            "name": "Maria Souza",
            "document": "123.456.789-00",
            "email": "maria@example.com",
            "phone_number": phone
        },
        "products": [
            {
                "id": "prod_1",
                "offer_id": "off_1",
                "name": "Curso X",
                "price": "R$ 297,00",
                "is_order_bump": false
            }
        ]
    })
}

fn kiwify_order(event: &str, phone: &str, order_id: &str) -> serde_json::Value {
    serde_json::json!({
        "order_id": order_id,
        "order_ref": "ref_77",
        "order_status": "paid",
        "webhook_event_type": event,
        "payment_method": "credit_card",
        "installments": 3,
        "approved_date": "2024-06-12 15:04:05",
        "created_at": "2024-06-12 15:00:00",
        "Product": {
            "product_id": "prod-9",
            "product_name": "Mentoria Y"
        },
        "Customer": {
            "full_name": "João Lima",
            "first_name": "João",
            "email": "joao@example.com",
            "mobile": phone,
            "CPF": "98765432100"
        },
        "Commissions": {
            "charge_amount": 99700,
            "product_base_price": 99700,
            "kiwify_fee": 8973,
            "currency": "BRL"
        }
    })
}

fn kiwify_cart(phone: &str) -> serde_json::Value {
    serde_json::json!({
        "checkout_link": "https://pay.kiwify.com.br/abc123",
        "name": "João Lima",
        "email": "joao@example.com",
        "phone": phone,
        "product_name": "Mentoria Y",
        "country": "BR"
    })
}

fn hotmart_event(event: &str, phone: &str, transaction: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "evt-b1c",
        "event": event,
        "version": "2.0.0",
        "creation_date": 1718204645000i64,
        "data": {
            "product": {"id": 4321, "name": "Formação Z", "ucode": "uc-1"},
            "buyer": {
                "name": "Ana Costa",
                "email": "ana@example.com",
                "checkout_phone": phone,
                "document": "11122233344"
            },
            "purchase": {
                "transaction": transaction,
                "status": "APPROVED",
                "approved_date": 1718204645000i64,
                "payment": {"type": "PIX", "installments_number": 1},
                "price": {"value": 297.0, "currency_value": "BRL"}
            }
        }
    })
}

// =====================================================================
// Kirvano flow
// =====================================================================

mod kirvano {
    use super::*;

    #[tokio::test]
    async fn test_approved_sale_full_flow() {
        let gw = gateway().await;

        let (status, json) = send(
            &gw.router,
            post_json(
                "/webhooks/kirvano",
                kirvano_event("SALE_APPROVED", "(11) 98888-7777", "sal_1"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "processed");
        assert_eq!(json["lead_created"], true);
        assert_eq!(json["automation"], "triggered");

        let leads = gw.store.leads().await;
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].phone, "5511988887777");
        assert_eq!(leads[0].name, "Maria Souza");
        assert_eq!(leads[0].status, LeadStatus::Customer);
        assert_eq!(leads[0].source, Vendor::Kirvano);
        assert!(leads[0].column_id.is_some());

        let orders = gw.store.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].external_id, "sal_1");
        assert_eq!(orders[0].status, OrderStatus::Paid);
        assert_eq!(orders[0].amount_cents, Some(29700));

        let pings = gw.notifier.recorded().await;
        assert_eq!(pings.len(), 1);
        assert_eq!(pings[0].0, "https://hooks.example.com/auto");
        assert_eq!(pings[0].1.event, SaleEventKind::Approved);
    }

    #[tokio::test]
    async fn test_pix_generated_then_approved_upgrades_lead() {
        let gw = gateway().await;

        let (status, json) = send(
            &gw.router,
            post_json(
                "/webhooks/kirvano",
                kirvano_event("PIX_GENERATED", "11988887777", "sal_2"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["lead_created"], true);
        assert_eq!(gw.store.leads().await[0].status, LeadStatus::AwaitingPayment);

        let (_, json) = send(
            &gw.router,
            post_json(
                "/webhooks/kirvano",
                kirvano_event("SALE_APPROVED", "11988887777", "sal_2"),
            ),
        )
        .await;
        assert_eq!(json["lead_created"], false);

        let leads = gw.store.leads().await;
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].status, LeadStatus::Customer);
        // Welcome flow for the pending pix, then for the purchase.
        assert_eq!(gw.notifier.recorded().await.len(), 2);
    }

    #[tokio::test]
    async fn test_replayed_webhook_changes_nothing() {
        let gw = gateway().await;
        let payload = kirvano_event("SALE_APPROVED", "11988887777", "sal_3");

        send(&gw.router, post_json("/webhooks/kirvano", payload.clone())).await;
        let (status, json) =
            send(&gw.router, post_json("/webhooks/kirvano", payload)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["lead_created"], false);
        assert_eq!(gw.store.leads().await.len(), 1);
        assert_eq!(gw.store.orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_refund_corrects_lead_and_order() {
        let gw = gateway().await;

        send(
            &gw.router,
            post_json(
                "/webhooks/kirvano",
                kirvano_event("SALE_APPROVED", "11988887777", "sal_4"),
            ),
        )
        .await;
        let (status, json) = send(
            &gw.router,
            post_json(
                "/webhooks/kirvano",
                kirvano_event("SALE_REFUNDED", "11988887777", "sal_4"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["automation"], "skipped");

        assert_eq!(gw.store.leads().await[0].status, LeadStatus::Refunded);
        let orders = gw.store.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Refunded);
        // Only the approval pinged automation.
        assert_eq!(gw.notifier.recorded().await.len(), 1);
    }
}

// =====================================================================
// Kiwify flow
// =====================================================================

mod kiwify {
    use super::*;

    #[tokio::test]
    async fn test_order_approved_keeps_integer_cents() {
        let gw = gateway().await;

        let (status, json) = send(
            &gw.router,
            post_json(
                "/webhooks/kiwify",
                kiwify_order("order_approved", "+55 21 97777-1234", "kw_1"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "processed");

        let leads = gw.store.leads().await;
        assert_eq!(leads[0].name, "João Lima");
        assert_eq!(leads[0].phone, "5521977771234");
        assert_eq!(leads[0].source, Vendor::Kiwify);

        let orders = gw.store.orders().await;
        assert_eq!(orders[0].amount_cents, Some(99700));
        assert_eq!(orders[0].installments, Some(3));
        assert!(orders[0].paid_at.is_some());
    }

    #[tokio::test]
    async fn test_abandoned_cart_shape_is_recognized() {
        let gw = gateway().await;

        let (status, json) = send(
            &gw.router,
            post_json("/webhooks/kiwify", kiwify_cart("21977771234")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "processed");

        let leads = gw.store.leads().await;
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].status, LeadStatus::Abandoned);
        assert_eq!(leads[0].product.as_deref(), Some("Mentoria Y"));
        assert!(gw.store.orders().await.is_empty());
        // Cart recovery flow fires.
        assert_eq!(gw.notifier.recorded().await.len(), 1);
    }

    #[tokio::test]
    async fn test_refused_order_marks_lead() {
        let gw = gateway().await;

        send(
            &gw.router,
            post_json(
                "/webhooks/kiwify",
                kiwify_order("order_rejected", "21977771234", "kw_2"),
            ),
        )
        .await;
        let leads = gw.store.leads().await;
        assert_eq!(leads[0].status, LeadStatus::Refused);
        // Rejections record no order row.
        assert!(gw.store.orders().await.is_empty());
    }
}

// =====================================================================
// Hotmart flow
// =====================================================================

mod hotmart {
    use super::*;

    #[tokio::test]
    async fn test_purchase_approved_envelope() {
        let gw = gateway().await;

        let (status, json) = send(
            &gw.router,
            post_json(
                "/webhooks/hotmart",
                hotmart_event("PURCHASE_APPROVED", "+55 31 96666-5555", "HP0330"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "processed");

        let leads = gw.store.leads().await;
        assert_eq!(leads[0].name, "Ana Costa");
        assert_eq!(leads[0].phone, "5531966665555");
        assert_eq!(leads[0].status, LeadStatus::Customer);
        assert_eq!(leads[0].source, Vendor::Hotmart);

        let orders = gw.store.orders().await;
        assert_eq!(orders[0].external_id, "HP0330");
        // 297.0 reais from the envelope, stored as cents.
        assert_eq!(orders[0].amount_cents, Some(29700));
        assert_eq!(orders[0].platform, Vendor::Hotmart);
    }

    #[tokio::test]
    async fn test_cart_abandonment_creates_abandoned_lead() {
        let gw = gateway().await;

        let mut payload = hotmart_event("CART_ABANDONMENT", "31966665555", "HP0331");
        // Abandonment payloads carry no purchase block.
        payload["data"]
            .as_object_mut()
            .unwrap()
            .remove("purchase");

        let (status, json) = send(&gw.router, post_json("/webhooks/hotmart", payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "processed");

        let leads = gw.store.leads().await;
        assert_eq!(leads[0].status, LeadStatus::Abandoned);
        assert!(gw.store.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_purchase_complete_is_acknowledged_and_ignored() {
        let gw = gateway().await;

        let (status, json) = send(
            &gw.router,
            post_json(
                "/webhooks/hotmart",
                hotmart_event("PURCHASE_COMPLETE", "31966665555", "HP0332"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ignored");
        assert_eq!(json["event"], "PURCHASE_COMPLETE");
        assert!(gw.store.leads().await.is_empty());
    }
}

// =====================================================================
// Cross-cutting gateway behavior
// =====================================================================

mod gateway_behavior {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let gw = gateway().await;
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = gw.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_token_required_on_every_webhook_route() {
        let gw = gateway_with_token(Some("s3cret")).await;

        for (uri, body) in [
            (
                "/webhooks/kirvano",
                kirvano_event("SALE_APPROVED", "11988887777", "sal_1"),
            ),
            (
                "/webhooks/kiwify",
                kiwify_order("order_approved", "11988887777", "kw_1"),
            ),
            (
                "/webhooks/hotmart",
                hotmart_event("PURCHASE_APPROVED", "11988887777", "HP1"),
            ),
            (
                "/webhooks/lead",
                serde_json::json!({"name": "X", "phone": "11988887777"}),
            ),
        ] {
            let (status, _) = send(&gw.router, post_json(uri, body)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "route {uri} is open");
        }
        assert!(gw.store.leads().await.is_empty());
    }

    #[tokio::test]
    async fn test_query_token_accepted_per_vendor() {
        let gw = gateway_with_token(Some("s3cret")).await;
        let (status, json) = send(
            &gw.router,
            post_json(
                "/webhooks/kirvano?token=s3cret",
                kirvano_event("SALE_APPROVED", "11988887777", "sal_1"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "processed");
    }

    #[tokio::test]
    async fn test_workspace_query_routes_lead() {
        let gw = gateway().await;
        let other = gw.store.seed_workspace("Mentoria", false, None).await;
        gw.store.seed_column(other.id, "Inbox", 0).await;

        let uri = format!("/webhooks/kirvano?workspace={}", other.id);
        let (status, json) = send(
            &gw.router,
            post_json(&uri, kirvano_event("SALE_APPROVED", "11988887777", "sal_1")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["workspace_id"], other.id.to_string());

        let leads = gw.store.leads().await;
        assert_eq!(leads[0].workspace_id, other.id);
        assert_ne!(leads[0].workspace_id, gw.workspace_id);
    }

    #[tokio::test]
    async fn test_same_phone_across_vendors_is_one_lead() {
        let gw = gateway().await;

        send(
            &gw.router,
            post_json(
                "/webhooks/kirvano",
                kirvano_event("ABANDONED_CART", "11988887777", "sal_1"),
            ),
        )
        .await;
        let (_, json) = send(
            &gw.router,
            post_json(
                "/webhooks/hotmart",
                hotmart_event("PURCHASE_APPROVED", "+55 11 98888-7777", "HP9"),
            ),
        )
        .await;
        assert_eq!(json["lead_created"], false);

        let leads = gw.store.leads().await;
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].status, LeadStatus::Customer);
        // First vendor that saw the contact stays recorded as the source.
        assert_eq!(leads[0].source, Vendor::Kirvano);

        let orders = gw.store.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].platform, Vendor::Hotmart);
    }

    #[tokio::test]
    async fn test_automation_failure_still_answers_200() {
        let store = Arc::new(MemoryStore::new());
        let workspace = store
            .seed_workspace("Vendas", true, Some("https://hooks.example.com/dead"))
            .await;
        store.seed_column(workspace.id, "Novo", 0).await;
        let pipeline = LeadPipeline::new(store.clone(), Arc::new(FailingNotifier), "55");
        let router = build_router(Arc::new(AppState {
            pipeline,
            webhook_token: None,
        }));

        let (status, json) = send(
            &router,
            post_json(
                "/webhooks/kirvano",
                kirvano_event("SALE_APPROVED", "11988887777", "sal_1"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "processed");
        assert_eq!(json["automation"], "failed");
        assert!(
            json["automation_error"]
                .as_str()
                .unwrap()
                .contains("timed out")
        );
        // Lead and order landed regardless.
        assert_eq!(store.leads().await.len(), 1);
        assert_eq!(store.orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_lead_capture_roundtrip() {
        let gw = gateway().await;

        let (status, json) = send(
            &gw.router,
            post_json(
                "/webhooks/lead",
                serde_json::json!({
                    "name": "Pedro Alves",
                    "phone": "47 95555-0000",
                    "email": "pedro@example.com",
                    "product": "Ebook Z"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "processed");
        assert_eq!(json["automation"], "triggered");

        let leads = gw.store.leads().await;
        assert_eq!(leads[0].source, Vendor::Direct);
        assert_eq!(leads[0].status, LeadStatus::New);
        assert_eq!(leads[0].phone, "5547955550000");
        assert_eq!(gw.notifier.recorded().await[0].1.event, SaleEventKind::LeadCapture);
    }
}
