use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};
use url::Url;

use crate::client::ApiClient;
use crate::errors::ClientError;
use crate::models::{NewOrder, NewOrderAddon, NewOrderItem, OrderType, PaymentRedirect};
use crate::services::auth::{normalize_phone, AuthSession};
use crate::services::cart::{CartLine, CartStore};
use crate::storage::{keys, StorageBackend};

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{11}$").expect("phone pattern"));

/// Field-level validation errors. All fields are checked on every pass;
/// one failing field never hides another.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub guest_count: Option<String>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.guest_count.is_none()
    }
}

/// Checkout form state as collected by the UI layer.
#[derive(Debug, Clone)]
pub struct CheckoutForm {
    pub name: String,
    pub phone: String,
    pub order_type: OrderType,
    /// Selected or newly entered formatted address (delivery only)
    pub address: String,
    /// Coordinates of the selected address, when the picker recorded them
    pub address_coords: Option<(f64, f64)>,
    pub notes: String,
    pub guest_count: Option<u32>,
    pub table_id: Option<String>,
}

impl CheckoutForm {
    pub fn new(order_type: OrderType) -> Self {
        Self {
            name: String::new(),
            phone: String::new(),
            order_type,
            address: String::new(),
            address_coords: None,
            notes: String::new(),
            guest_count: None,
            table_id: None,
        }
    }
}

/// Transient order request assembled at checkout time.
///
/// Exists only for the duration of one checkout attempt; a guest checkout
/// parks it in the [`PendingOrderSlot`] across the OTP interruption.
#[derive(Debug, Clone)]
pub struct PendingOrderRequest {
    pub lines: Vec<CartLine>,
    pub total: Decimal,
    pub order_type: OrderType,
    pub address: String,
    pub phone: String,
    pub name: String,
    pub notes: String,
    pub guest_count: Option<u32>,
    pub table_id: Option<String>,
}

impl PendingOrderRequest {
    fn to_new_order(&self) -> NewOrder {
        NewOrder {
            order_type: self.order_type,
            address: self.address.clone(),
            customer_name: (!self.name.is_empty()).then(|| self.name.clone()),
            phone: self.phone.clone(),
            notes: (!self.notes.trim().is_empty()).then(|| self.notes.clone()),
            items: self
                .lines
                .iter()
                .map(|line| {
                    let addons: Vec<NewOrderAddon> = line
                        .selected_addons
                        .iter()
                        .filter(|a| a.quantity > 0)
                        .map(|a| NewOrderAddon {
                            addon_id: a.addon_id.clone(),
                            quantity: a.quantity,
                        })
                        .collect();
                    NewOrderItem {
                        product_id: line.product.id.clone(),
                        quantity: line.quantity,
                        note: None,
                        addons: (!addons.is_empty()).then_some(addons),
                    }
                })
                .collect(),
            guest_count: self.guest_count,
            table_id: self.table_id.clone(),
        }
    }
}

/// One-shot holder for an order interrupted by OTP verification.
#[derive(Default)]
pub struct PendingOrderSlot {
    slot: Mutex<Option<PendingOrderRequest>>,
}

impl PendingOrderSlot {
    pub fn put(&self, request: PendingOrderRequest) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(request);
        }
    }

    /// Takes the parked request, leaving the slot empty.
    pub fn take(&self) -> Option<PendingOrderRequest> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct StoredCoords {
    lat: f64,
    lng: f64,
}

/// Dine-in intent carried by a QR entry link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DineInIntent {
    pub table_id: Option<String>,
    pub guests: u32,
}

impl DineInIntent {
    /// Recognizes a dine-in entry URL (table QR codes use several spellings).
    pub fn from_entry_url(url: &Url) -> Option<Self> {
        let get = |key: &str| -> Option<String> {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.to_lowercase())
        };
        let has = |key: &str| url.query_pairs().any(|(k, _)| k == key);
        let truthy =
            |value: Option<String>| matches!(value.as_deref(), Some("1" | "true" | "yes" | "y"));

        let type_hint = get("type").or_else(|| get("orderType")).or_else(|| get("ordertype"));
        let mode = get("mode").or_else(|| get("service"));
        let salon = get("salon").or_else(|| get("سالن"));

        let is_dine_in = truthy(get("dinein").or_else(|| get("dine-in")).or_else(|| get("dine_in")))
            || matches!(
                type_hint.as_deref(),
                Some("dinein" | "dine-in" | "dine_in" | "dine in")
            )
            || matches!(mode.as_deref(), Some("salon" | "inhouse" | "in-house" | "dinein"))
            || matches!(salon.as_deref(), Some("salon" | "سالن"))
            || has("table")
            || has("tableId")
            || has("desk")
            || has("deskId");

        if !is_dine_in {
            return None;
        }

        let table_id = url
            .query_pairs()
            .find(|(k, _)| matches!(k.as_ref(), "table" | "tableId" | "desk" | "deskId"))
            .map(|(_, v)| v.to_string());

        let guests = get("guests")
            .or_else(|| get("guest"))
            .and_then(|g| g.parse::<u32>().ok())
            .filter(|g| *g > 0)
            .unwrap_or(1);

        Some(Self { table_id, guests })
    }
}

/// Order-type hint from an entry URL, for preselecting the checkout toggle.
pub fn order_type_hint(url: &Url) -> Option<OrderType> {
    if DineInIntent::from_entry_url(url).is_some() {
        return Some(OrderType::DineIn);
    }
    let get = |key: &str| -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.to_lowercase())
    };
    let type_hint = get("type").or_else(|| get("orderType")).or_else(|| get("ordertype"));
    let mode = get("mode").or_else(|| get("service"));

    if matches!(
        type_hint.as_deref(),
        Some("pickup" | "takeout" | "take-away" | "takeaway")
    ) || matches!(mode.as_deref(), Some("pickup" | "takeout"))
    {
        return Some(OrderType::Pickup);
    }
    if matches!(type_hint.as_deref(), Some("delivery" | "send" | "ارسال"))
        || matches!(mode.as_deref(), Some("delivery" | "send"))
    {
        return Some(OrderType::Delivery);
    }
    None
}

/// Validates the checkout form and drives order submission.
///
/// Authenticated users go straight to order creation and payment initiation;
/// guests are routed through OTP first, with the assembled request replayed
/// from the pending slot once verification succeeds.
pub struct CheckoutService {
    client: Arc<ApiClient>,
    storage: Arc<dyn StorageBackend>,
    pending: PendingOrderSlot,
}

impl CheckoutService {
    pub fn new(client: Arc<ApiClient>, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            client,
            storage,
            pending: PendingOrderSlot::default(),
        }
    }

    /// Validates the form. Must come back empty before submission.
    ///
    /// The delivery zone check is fail-closed: if the zone service cannot be
    /// reached the address is rejected with a generic reason.
    #[instrument(skip(self, form))]
    pub async fn validate(&self, form: &CheckoutForm) -> FieldErrors {
        let mut errors = FieldErrors::default();

        if form.name.trim().chars().count() < 3 {
            errors.name = Some("لطفاً نام و نام خانوادگی معتبری وارد کنید.".to_string());
        }

        if !PHONE_RE.is_match(&normalize_phone(&form.phone)) {
            errors.phone = Some("شماره تماس باید ۱۱ رقمی باشد.".to_string());
        }

        match form.order_type {
            OrderType::Delivery => {
                if form.address.trim().is_empty() {
                    errors.address = Some(
                        "لطفاً یک آدرس را انتخاب کنید یا آدرس جدید ثبت نمایید.".to_string(),
                    );
                } else if let Some((lat, lng)) = form.address_coords {
                    let check = self.client.validate_zone(lat, lng).await;
                    if !check.allowed {
                        errors.address = Some(
                            check
                                .reason
                                .unwrap_or_else(|| "این آدرس خارج از محدوده ارسال است.".to_string()),
                        );
                    }
                }
            }
            OrderType::DineIn => {
                if form.guest_count.unwrap_or(0) < 1 {
                    errors.guest_count = Some("لطفاً تعداد نفرات را وارد کنید.".to_string());
                }
            }
            OrderType::Pickup => {}
        }

        errors
    }

    /// Snapshots the cart and form into a submission-ready request.
    pub fn build_request(&self, cart: &CartStore, form: &CheckoutForm) -> PendingOrderRequest {
        PendingOrderRequest {
            lines: cart.lines().to_vec(),
            total: cart.total(),
            order_type: form.order_type,
            address: match form.order_type {
                OrderType::Delivery => form.address.trim().to_string(),
                _ => String::new(),
            },
            phone: normalize_phone(&form.phone),
            name: form.name.trim().to_string(),
            notes: form.notes.clone(),
            guest_count: match form.order_type {
                OrderType::DineIn => Some(form.guest_count.unwrap_or(1)),
                _ => None,
            },
            table_id: match form.order_type {
                OrderType::DineIn => form.table_id.clone(),
                _ => None,
            },
        }
    }

    /// Submits an order for an authenticated user and initiates payment.
    ///
    /// The display-name update and address bookkeeping are best-effort; only
    /// order creation and payment initiation can fail the checkout.
    #[instrument(skip(self, session, request))]
    pub async fn submit(
        &self,
        session: &mut AuthSession,
        request: PendingOrderRequest,
    ) -> Result<PaymentRedirect, ClientError> {
        if session.is_authenticated() {
            if !request.name.is_empty() {
                if let Err(err) = session.update_name(&request.name).await {
                    warn!("Failed to update customer name: {}", err);
                }
            }
            if request.order_type == OrderType::Delivery && !request.address.is_empty() {
                if let Err(err) = session.add_address(&request.address).await {
                    warn!("Failed to save checkout address: {}", err);
                }
            }
        }

        let order = self.client.create_order(&request.to_new_order()).await?;
        info!("Order {} created, requesting payment", order.id);

        if let Err(err) = self.storage.set(keys::LAST_ORDER_ID, &order.id).await {
            warn!("Failed to persist last order id: {}", err);
        }

        let payment = self.client.request_payment(&order.id).await?;
        match payment.payment_url {
            Some(payment_url) if payment.success => Ok(PaymentRedirect {
                order_id: order.id,
                payment_url,
            }),
            _ => Err(ClientError::PaymentFailed(
                payment
                    .error
                    .unwrap_or_else(|| "خطا در درخواست پرداخت".to_string()),
            )),
        }
    }

    /// Starts a guest checkout: requests an OTP for the contact phone and
    /// parks the request for replay after verification.
    #[instrument(skip(self, request))]
    pub async fn submit_guest(&self, request: PendingOrderRequest) -> Result<(), ClientError> {
        self.client.request_otp(&request.phone).await?;
        self.pending.put(request);
        Ok(())
    }

    /// Replays the parked order after a successful OTP verification.
    ///
    /// Returns `Ok(None)` when nothing was pending (a plain login).
    pub async fn resume_pending(
        &self,
        session: &mut AuthSession,
    ) -> Result<Option<PaymentRedirect>, ClientError> {
        match self.pending.take() {
            Some(request) => self.submit(session, request).await.map(Some),
            None => Ok(None),
        }
    }

    // ---- guest address cache --------------------------------------------

    /// Remembers a guest address: newest first, deduplicated, capped.
    pub async fn remember_guest_address(&self, formatted: &str) {
        let mut addresses = self.guest_addresses().await;
        addresses.retain(|a| a != formatted);
        addresses.insert(0, formatted.to_string());
        addresses.truncate(self.client.config().guest_address_cap);

        match serde_json::to_string(&addresses) {
            Ok(serialized) => {
                if let Err(err) = self.storage.set(keys::GUEST_ADDRESSES, &serialized).await {
                    warn!("Failed to persist guest addresses: {}", err);
                }
            }
            Err(err) => warn!("Failed to serialize guest addresses: {}", err),
        }
    }

    pub async fn guest_addresses(&self) -> Vec<String> {
        match self.storage.get(keys::GUEST_ADDRESSES).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    // ---- address metadata -----------------------------------------------

    /// Caches the picked coordinates for a formatted address so later
    /// checkouts can zone-validate it without reopening the map.
    pub async fn remember_address_coords(&self, formatted: &str, lat: f64, lng: f64) {
        let mut meta = self.address_meta().await;
        meta.insert(formatted.to_string(), StoredCoords { lat, lng });
        match serde_json::to_string(&meta) {
            Ok(serialized) => {
                if let Err(err) = self.storage.set(keys::ADDRESS_META, &serialized).await {
                    warn!("Failed to persist address metadata: {}", err);
                }
            }
            Err(err) => warn!("Failed to serialize address metadata: {}", err),
        }
    }

    pub async fn address_coords(&self, formatted: &str) -> Option<(f64, f64)> {
        self.address_meta()
            .await
            .get(formatted)
            .map(|c| (c.lat, c.lng))
    }

    async fn address_meta(&self) -> HashMap<String, StoredCoords> {
        match self.storage.get(keys::ADDRESS_META).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            _ => HashMap::new(),
        }
    }

    // ---- dine-in intent -------------------------------------------------

    /// Persists a dine-in intent parsed from a QR entry link.
    pub async fn remember_dine_in(&self, intent: &DineInIntent) {
        match serde_json::to_string(intent) {
            Ok(serialized) => {
                if let Err(err) = self.storage.set(keys::DINE_IN_INTENT, &serialized).await {
                    warn!("Failed to persist dine-in intent: {}", err);
                }
            }
            Err(err) => warn!("Failed to serialize dine-in intent: {}", err),
        }
    }

    pub async fn dine_in_intent(&self) -> Option<DineInIntent> {
        match self.storage.get(keys::DINE_IN_INTENT).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            _ => None,
        }
    }

    pub async fn clear_dine_in(&self) {
        if let Err(err) = self.storage.remove(keys::DINE_IN_INTENT).await {
            warn!("Failed to clear dine-in intent: {}", err);
        }
    }
}
