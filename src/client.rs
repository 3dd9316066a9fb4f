//! HTTP client for the restaurant backend.
//!
//! All remote calls go through [`ApiClient`]: it injects the bearer token,
//! normalizes the backend's loosely shaped payloads into the crate's models,
//! and maps HTTP failures onto [`ClientError`]. A 401 clears the stored
//! token so the session layer can force a re-login.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::models::{
    de_id, AddressItem, MenuCategory, NewAddress, NewOrder, OrderCreated, OrderRecord,
    PaymentRequested, Product, SettingsInfo, User, VerifyPaymentRequest, VerifyPaymentResponse,
    ZoneCheck,
};
use crate::storage::{keys, StorageBackend};

/// Backend REST client with bearer-token session state.
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    storage: Arc<dyn StorageBackend>,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Builds a client and restores a previously persisted token.
    pub async fn new(
        config: Arc<ClientConfig>,
        storage: Arc<dyn StorageBackend>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        let token = match storage.get(keys::AUTH_TOKEN).await {
            Ok(token) => token,
            Err(err) => {
                warn!("Failed to read persisted auth token: {}", err);
                None
            }
        };

        Ok(Self {
            http,
            config,
            storage,
            token: RwLock::new(token),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().map(|t| t.is_some()).unwrap_or(false)
    }

    fn bearer(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    /// Replaces (or clears) the session token, persisting best-effort.
    pub async fn set_token(&self, token: Option<&str>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token.map(str::to_string);
        }
        let result = match token {
            Some(token) => self.storage.set(keys::AUTH_TOKEN, token).await,
            None => self.storage.remove(keys::AUTH_TOKEN).await,
        };
        if let Err(err) = result {
            warn!("Failed to persist auth token change: {}", err);
        }
    }

    async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        let url = self.config.endpoint(path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = self.bearer() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!("{} {}", method, url);
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            self.set_token(None).await;
            return Err(ClientError::Unauthorized);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .or_else(|| v.get("message"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| status.to_string());
            return Err(ClientError::backend(status.as_u16(), message));
        }

        Ok(response.json::<T>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send::<(), T>(Method::GET, path, None).await
    }

    // ---- auth -----------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn request_otp(&self, phone: &str) -> Result<(), ClientError> {
        let _: Value = self
            .send(Method::POST, "/auth/otp/request", Some(&json!({ "phone": phone })))
            .await?;
        Ok(())
    }

    /// Verifies the OTP, stores the session token, and returns the profile.
    #[instrument(skip(self, otp))]
    pub async fn verify_otp(
        &self,
        phone: &str,
        otp: &str,
        name: Option<&str>,
    ) -> Result<User, ClientError> {
        let mut payload = json!({ "phone": phone, "otp": otp });
        if let Some(name) = name {
            payload["name"] = Value::String(name.to_string());
        }

        let response: VerifiedSession = self
            .send(Method::POST, "/auth/otp/verify", Some(&payload))
            .await?;

        self.set_token(Some(&response.token)).await;
        Ok(response.user.normalize())
    }

    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<User, ClientError> {
        let raw: MaybeWrappedUser = self.get("/users/me").await?;
        Ok(raw.into_raw().normalize())
    }

    /// Updates profile fields; currently only the display name.
    #[instrument(skip(self))]
    pub async fn update_name(&self, name: &str) -> Result<User, ClientError> {
        let raw: MaybeWrappedUser = self
            .send(Method::PUT, "/users/me", Some(&json!({ "name": name })))
            .await?;
        Ok(raw.into_raw().normalize())
    }

    // ---- addresses ------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn addresses(&self) -> Result<Vec<AddressItem>, ClientError> {
        let raw: MaybeWrappedAddresses = self.get("/users/me/addresses").await?;
        Ok(raw
            .into_vec()
            .into_iter()
            .map(RawAddressRecord::into_item)
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn add_address(&self, formatted: &str) -> Result<(), ClientError> {
        let _: Value = self
            .send(
                Method::POST,
                "/users/me/addresses",
                Some(&NewAddress::from_formatted(formatted)),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn update_address(&self, id: &str, formatted: &str) -> Result<(), ClientError> {
        let _: Value = self
            .send(
                Method::PUT,
                &format!("/users/me/addresses/{}", id),
                Some(&NewAddress::from_formatted(formatted)),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_address(&self, id: &str) -> Result<(), ClientError> {
        let _: Value = self
            .send::<(), _>(Method::DELETE, &format!("/users/me/addresses/{}", id), None)
            .await?;
        Ok(())
    }

    // ---- menu -----------------------------------------------------------

    /// Fetches the online menu flattened to products.
    ///
    /// Unavailable items are included so the UI can render them disabled.
    #[instrument(skip(self))]
    pub async fn menu(&self) -> Result<Vec<Product>, ClientError> {
        let categories: Vec<MenuCategory> = self
            .get("/menu/categories?for=online&includeUnavailable=1")
            .await?;
        Ok(MenuCategory::flatten(categories))
    }

    // ---- orders ---------------------------------------------------------

    #[instrument(skip(self, order))]
    pub async fn create_order(&self, order: &NewOrder) -> Result<OrderCreated, ClientError> {
        let response: Value = self.send(Method::POST, "/orders", Some(order)).await?;

        // A 2xx body without an id is the backend's soft failure shape.
        if response.get("id").is_none() {
            let message = response
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("order creation returned no id")
                .to_string();
            return Err(ClientError::OrderError(message));
        }
        Ok(serde_json::from_value(response)?)
    }

    #[instrument(skip(self))]
    pub async fn order_by_id(&self, id: &str) -> Result<OrderRecord, ClientError> {
        let envelope: OrderEnvelope = self.get(&format!("/orders/{}", id)).await?;
        Ok(envelope.order)
    }

    #[instrument(skip(self))]
    pub async fn my_orders(&self) -> Result<Vec<OrderRecord>, ClientError> {
        let raw: Vec<Value> = self.get("/orders/me").await?;
        let mut orders = Vec::with_capacity(raw.len());
        for entry in raw {
            orders.push(normalize_history_entry(entry)?);
        }
        Ok(orders)
    }

    // ---- payments -------------------------------------------------------

    /// Requests a gateway payment URL for an already created order.
    #[instrument(skip(self))]
    pub async fn request_payment(&self, order_id: &str) -> Result<PaymentRequested, ClientError> {
        let payload = json!({ "returnUrl": self.config.return_url });
        self.send(
            Method::POST,
            &format!("/payments/request/{}", order_id),
            Some(&payload),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, ClientError> {
        self.send(Method::POST, "/payments/verify", Some(request))
            .await
    }

    /// Public receipt lookup: no auth, gated by order id + gateway reference.
    #[instrument(skip(self))]
    pub async fn public_receipt(
        &self,
        order_id: &str,
        ref_id: &str,
    ) -> Result<OrderRecord, ClientError> {
        let path = format!(
            "/payments/receipt?orderId={}&refId={}",
            urlencode(order_id),
            urlencode(ref_id)
        );
        let envelope: OrderEnvelope = self.get(&path).await?;
        Ok(envelope.order)
    }

    // ---- zones / settings / health --------------------------------------

    /// Checks whether coordinates fall inside a deliverable zone.
    ///
    /// Fail-closed: any transport or protocol failure blocks delivery with a
    /// generic reason rather than letting an undeliverable order through.
    #[instrument(skip(self))]
    pub async fn validate_zone(&self, lat: f64, lng: f64) -> ZoneCheck {
        let path = format!("/zones/validate?lat={}&lng={}", lat, lng);
        match self.get::<ZoneCheck>(&path).await {
            Ok(check) => check,
            Err(err) => {
                warn!("Zone validation unavailable, blocking: {}", err);
                ZoneCheck {
                    allowed: false,
                    zone: None,
                    reason: Some(
                        "آدرس خارج از محدوده یا سامانه تعیین محدوده در دسترس نیست.".to_string(),
                    ),
                }
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn settings_info(&self) -> Result<SettingsInfo, ClientError> {
        self.get("/settings/info").await
    }

    pub async fn health(&self) -> bool {
        matches!(
            self.get::<Value>("/health").await,
            Ok(value) if value.get("ok").and_then(Value::as_bool) == Some(true)
        )
    }
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// History entries nest customer and product data; flatten them into the
/// shape `OrderRecord` expects before deserializing.
fn normalize_history_entry(mut entry: Value) -> Result<OrderRecord, ClientError> {
    if let Some(object) = entry.as_object_mut() {
        if !object.contains_key("customerName") {
            if let Some(name) = object
                .get("customer")
                .and_then(|c| c.get("name"))
                .cloned()
            {
                object.insert("customerName".to_string(), name);
            }
        }
        if !object.contains_key("customerPhone") {
            if let Some(phone) = object
                .get("customer")
                .and_then(|c| c.get("phone"))
                .cloned()
            {
                object.insert("customerPhone".to_string(), phone);
            }
        }
        if let Some(items) = object.get_mut("items").and_then(Value::as_array_mut) {
            for item in items {
                let product_name = item.get("product").and_then(|p| p.get("name")).cloned();
                if let (Some(obj), Some(name)) = (item.as_object_mut(), product_name) {
                    obj.entry("name").or_insert(name);
                }
            }
        }
    }
    Ok(serde_json::from_value(entry)?)
}

// ---- wire shapes private to the client ----------------------------------

#[derive(Deserialize)]
struct VerifiedSession {
    token: String,
    user: RawUser,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MaybeWrappedUser {
    Wrapped { user: RawUser },
    Direct(RawUser),
}

impl MaybeWrappedUser {
    fn into_raw(self) -> RawUser {
        match self {
            MaybeWrappedUser::Wrapped { user } => user,
            MaybeWrappedUser::Direct(user) => user,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MaybeWrappedAddresses {
    Wrapped { addresses: Vec<RawAddressRecord> },
    Direct(Vec<RawAddressRecord>),
}

impl MaybeWrappedAddresses {
    fn into_vec(self) -> Vec<RawAddressRecord> {
        match self {
            MaybeWrappedAddresses::Wrapped { addresses } => addresses,
            MaybeWrappedAddresses::Direct(addresses) => addresses,
        }
    }
}

#[derive(Deserialize)]
struct OrderEnvelope {
    order: OrderRecord,
}

/// User payload as the backend sends it: addresses are either plain strings
/// or street/city/postal records, sometimes with placeholder postal codes.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(deserialize_with = "de_id")]
    phone: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    addresses: Vec<RawAddress>,
    #[serde(default)]
    address_items: Option<Vec<AddressItem>>,
}

impl RawUser {
    fn normalize(self) -> User {
        User {
            id: self.id,
            phone: self.phone,
            name: self.name,
            addresses: self
                .addresses
                .into_iter()
                .map(RawAddress::into_formatted)
                .collect(),
            address_items: self.address_items,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAddress {
    Text(String),
    Structured {
        #[serde(default)]
        street: Option<String>,
        #[serde(default)]
        city: Option<String>,
        #[serde(default, rename = "postalCode")]
        postal_code: Option<String>,
    },
}

impl RawAddress {
    fn into_formatted(self) -> String {
        match self {
            RawAddress::Text(text) => text,
            RawAddress::Structured {
                street,
                city,
                postal_code,
            } => [street, city, postal_code]
                .into_iter()
                .flatten()
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty() && part != "00000")
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAddressRecord {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(default)]
    formatted: Option<String>,
    #[serde(default)]
    street: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    postal_code: Option<String>,
}

impl RawAddressRecord {
    fn into_item(self) -> AddressItem {
        let formatted = self.formatted.unwrap_or_else(|| {
            [self.street, self.city, self.postal_code]
                .into_iter()
                .flatten()
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty() && part != "00000")
                .collect::<Vec<_>>()
                .join(", ")
        });
        AddressItem {
            id: self.id,
            formatted,
        }
    }
}
