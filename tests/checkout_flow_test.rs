//! Integration tests for the checkout flow.
//!
//! Tests cover:
//! - Delivery-zone validation (allowed, blocked, fail-closed on outage)
//! - Order submission and payment initiation
//! - Backend soft failures on order creation and payment request
//! - Guest checkout: OTP request, pending-order replay after verification

mod common;

use assert_matches::assert_matches;
use common::{product, TestBackend};
use rust_decimal_macros::dec;
use serde_json::json;
use tableside::models::OrderType;
use tableside::services::checkout::CheckoutForm;
use tableside::storage::keys;
use tableside::ClientError;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn delivery_form() -> CheckoutForm {
    CheckoutForm {
        name: "علی رضایی".into(),
        phone: "09123456789".into(),
        order_type: OrderType::Delivery,
        address: "تهران، چهاردانگه، جنب مجتمع".into(),
        address_coords: None,
        notes: String::new(),
        guest_count: None,
        table_id: None,
    }
}

// ==================== Zone validation ====================

#[tokio::test]
async fn zone_check_passes_allowed_addresses() {
    let backend = TestBackend::new().await;
    Mock::given(method("GET"))
        .and(path("/v1/zones/validate"))
        .and(query_param("lat", "35.6"))
        .and(query_param("lng", "51.3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"allowed": true})))
        .mount(&backend.server)
        .await;

    let mut form = delivery_form();
    form.address_coords = Some((35.6, 51.3));
    assert!(backend.checkout().validate(&form).await.is_empty());
}

#[tokio::test]
async fn zone_check_blocks_with_server_reason() {
    let backend = TestBackend::new().await;
    Mock::given(method("GET"))
        .and(path("/v1/zones/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "allowed": false,
            "reason": "خارج از محدوده پیک"
        })))
        .mount(&backend.server)
        .await;

    let mut form = delivery_form();
    form.address_coords = Some((34.0, 50.0));
    let errors = backend.checkout().validate(&form).await;
    assert_eq!(errors.address.as_deref(), Some("خارج از محدوده پیک"));
}

#[tokio::test]
async fn zone_check_fails_closed_when_service_is_down() {
    // no zone mock mounted: every call 404s, which must block delivery
    let backend = TestBackend::new().await;

    let mut form = delivery_form();
    form.address_coords = Some((35.6, 51.3));
    let errors = backend.checkout().validate(&form).await;
    assert_eq!(
        errors.address.as_deref(),
        Some("آدرس خارج از محدوده یا سامانه تعیین محدوده در دسترس نیست.")
    );
}

#[tokio::test]
async fn addresses_without_coordinates_skip_the_zone_check() {
    let backend = TestBackend::new().await;
    // nothing mounted; a zone call would fail-closed and poison the result
    assert!(backend.checkout().validate(&delivery_form()).await.is_empty());
}

// ==================== Submission ====================

#[tokio::test]
async fn submit_creates_order_and_returns_payment_redirect() {
    let backend = TestBackend::new().await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .and(body_partial_json(json!({
            "type": "DELIVERY",
            "phone": "09123456789",
            "items": [{"productId": "kebab", "quantity": 2}]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "ord-1",
            "orderNumber": "A-1001",
            "total": 500000
        })))
        .expect(1)
        .mount(&backend.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/payments/request/ord-1"))
        .and(body_partial_json(json!({
            "returnUrl": "http://localhost:5173/confirmation"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "paymentUrl": "https://gateway.example/pay/123"
        })))
        .expect(1)
        .mount(&backend.server)
        .await;

    let mut cart = backend.cart().await;
    cart.add_line(&product("kebab", dec!(250000)), Vec::new()).await;
    cart.set_quantity("kebab", 2).await;

    let checkout = backend.checkout();
    let request = checkout.build_request(&cart, &delivery_form());
    assert_eq!(request.total, dec!(500000));

    let mut session = backend.session();
    let redirect = checkout.submit(&mut session, request).await.unwrap();
    assert_eq!(redirect.order_id, "ord-1");
    assert_eq!(redirect.payment_url, "https://gateway.example/pay/123");

    // the order id is persisted before the gateway redirect
    let last = backend.storage.get(keys::LAST_ORDER_ID).await.unwrap();
    assert_eq!(last.as_deref(), Some("ord-1"));
}

#[tokio::test]
async fn order_creation_soft_failure_maps_to_order_error() {
    let backend = TestBackend::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "کالای انتخابی موجود نیست"
        })))
        .mount(&backend.server)
        .await;

    let cart = backend.cart().await;
    let checkout = backend.checkout();
    let request = checkout.build_request(&cart, &delivery_form());

    let mut session = backend.session();
    let err = checkout.submit(&mut session, request).await.unwrap_err();
    assert_matches!(err, ClientError::OrderError(msg) if msg == "کالای انتخابی موجود نیست");
}

#[tokio::test]
async fn failed_payment_request_surfaces_payment_error() {
    let backend = TestBackend::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": "ord-2", "total": 90000})),
        )
        .mount(&backend.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/payments/request/ord-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "درگاه پرداخت در دسترس نیست"
        })))
        .mount(&backend.server)
        .await;

    let cart = backend.cart().await;
    let checkout = backend.checkout();
    let request = checkout.build_request(&cart, &delivery_form());

    let mut session = backend.session();
    let err = checkout.submit(&mut session, request).await.unwrap_err();
    assert_matches!(err, ClientError::PaymentFailed(msg) if msg == "درگاه پرداخت در دسترس نیست");
}

// ==================== Guest checkout ====================

#[tokio::test]
async fn guest_checkout_replays_pending_order_after_otp() {
    let backend = TestBackend::new().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/otp/request"))
        .and(body_partial_json(json!({"phone": "09123456789"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "sent"})))
        .expect(1)
        .mount(&backend.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/otp/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "fresh-token",
            "user": {"id": "u1", "phone": "09123456789", "name": "علی"}
        })))
        .expect(1)
        .mount(&backend.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": "u1", "phone": "09123456789", "name": "علی رضایی"}
        })))
        .mount(&backend.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": "u1", "phone": "09123456789", "name": "علی رضایی"}
        })))
        .mount(&backend.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": "ord-3", "total": 250000})),
        )
        .mount(&backend.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/payments/request/ord-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "paymentUrl": "https://gateway.example/pay/456"
        })))
        .mount(&backend.server)
        .await;

    let mut cart = backend.cart().await;
    cart.add_line(&product("kebab", dec!(250000)), Vec::new()).await;

    let checkout = backend.checkout();
    let mut form = delivery_form();
    form.order_type = OrderType::Pickup;
    let request = checkout.build_request(&cart, &form);

    // guest: OTP requested, order parked
    checkout.submit_guest(request).await.unwrap();

    // OTP verified → session established → parked order replayed
    let mut session = backend.session();
    session.login("09123456789", "1234", None).await.unwrap();
    assert!(session.is_authenticated());

    let redirect = checkout.resume_pending(&mut session).await.unwrap();
    assert_eq!(redirect.unwrap().order_id, "ord-3");

    // the slot is one-shot
    let replayed = checkout.resume_pending(&mut session).await.unwrap();
    assert!(replayed.is_none());
}
