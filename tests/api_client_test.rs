//! Integration tests for the API client plumbing.
//!
//! Tests cover:
//! - Menu fetch: query contract and category flattening
//! - Backend error envelopes mapping to typed errors
//! - 401 handling: stored token is dropped
//! - Order history normalization

mod common;

use assert_matches::assert_matches;
use common::TestBackend;
use rust_decimal_macros::dec;
use serde_json::json;
use tableside::storage::keys;
use tableside::ClientError;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn menu_is_fetched_with_online_filter_and_flattened() {
    let backend = TestBackend::new().await;
    Mock::given(method("GET"))
        .and(path("/v1/menu/categories"))
        .and(query_param("for", "online"))
        .and(query_param("includeUnavailable", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "name": "نوشیدنی",
                "station": "BAR",
                "products": [
                    {"id": 1, "name": "موهیتو", "price": 90000,
                     "addons": [{"id": "a1", "name": "نعنا", "price": 5000, "maxPerItem": 3}]},
                    {"id": 2, "name": "لیموناد", "price": 80000, "available": false}
                ]
            }
        ])))
        .expect(1)
        .mount(&backend.server)
        .await;

    let items = backend.client.menu().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].category, "نوشیدنی");
    assert_eq!(items[0].price, dec!(90000));
    assert_eq!(items[0].addons[0].max_per_item, Some(3));
    // unavailable items come back so the UI can render them disabled
    assert!(!items[1].available);
}

#[tokio::test]
async fn backend_error_envelope_maps_to_typed_error() {
    let backend = TestBackend::new().await;
    Mock::given(method("GET"))
        .and(path("/v1/settings/info"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "maintenance window"})),
        )
        .mount(&backend.server)
        .await;

    let err = backend.client.settings_info().await.unwrap_err();
    assert_matches!(err, ClientError::Backend { status: 500, message } if message == "maintenance window");
}

#[tokio::test]
async fn unauthorized_response_drops_stored_token() {
    let backend = TestBackend::authenticated().await;
    Mock::given(method("GET"))
        .and(path("/v1/orders/ord-1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&backend.server)
        .await;

    assert!(backend.client.is_authenticated());
    let err = backend.client.order_by_id("ord-1").await.unwrap_err();
    assert!(err.is_unauthorized());

    assert!(!backend.client.is_authenticated());
    assert_eq!(backend.storage.get(keys::AUTH_TOKEN).await.unwrap(), None);
}

#[tokio::test]
async fn order_history_normalizes_nested_customer_and_products() {
    let backend = TestBackend::authenticated().await;
    Mock::given(method("GET"))
        .and(path("/v1/orders/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "ord-1",
                "orderNumber": "A-1",
                "type": "TAKEOUT",
                "createdAt": "2025-04-02T18:00:00Z",
                "customer": {"name": "علی رضایی", "phone": "09123456789"},
                "items": [{"productId": 7, "quantity": 1, "priceAtOrder": 120000,
                           "product": {"name": "کیک"}}],
                "total": 120000,
                "subtotal": 120000,
                "status": "SENT"
            }
        ])))
        .mount(&backend.server)
        .await;

    let orders = backend.client.my_orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.customer_name.as_deref(), Some("علی رضایی"));
    assert_eq!(order.contact_phone, "09123456789");
    assert_eq!(order.items[0].name, "کیک");
    assert_eq!(order.items[0].price_at_time_of_order, dec!(120000));
}

#[tokio::test]
async fn health_probe_is_boolean() {
    let backend = TestBackend::new().await;
    Mock::given(method("GET"))
        .and(path("/v1/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&backend.server)
        .await;

    assert!(backend.client.health().await);

    let down = TestBackend::new().await;
    assert!(!down.client.health().await);
}
