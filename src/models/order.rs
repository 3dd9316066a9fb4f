use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::de_id;

/// Order fulfilment type. The backend wire name for pickup is `TAKEOUT`;
/// `PICKUP` is accepted on input for older records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "DELIVERY")]
    Delivery,
    #[serde(rename = "TAKEOUT", alias = "PICKUP")]
    Pickup,
    #[serde(rename = "DINE_IN")]
    DineIn,
}

impl OrderType {
    /// User-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            OrderType::Delivery => "ارسال به آدرس",
            OrderType::Pickup => "دریافت حضوری",
            OrderType::DineIn => "سرو در رستوران",
        }
    }
}

/// Server-side order lifecycle state. Unrecognized values map to `Unknown`
/// so a backend rollout cannot break order rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Selecting,
    Waiting,
    Cooking,
    Sent,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Selecting => "در حال انتخاب",
            OrderStatus::Waiting => "در انتظار تایید",
            OrderStatus::Cooking => "در حال آماده‌سازی",
            OrderStatus::Sent => "تحویل شد",
            OrderStatus::Cancelled => "لغو شده",
            OrderStatus::Unknown => "",
        }
    }
}

/// Addon selection snapshot: name and price are copied at selection time so
/// cart rendering and order history never need a catalog lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedAddon {
    #[serde(deserialize_with = "de_id")]
    pub addon_id: String,
    pub name: String,
    #[serde(default)]
    pub price: Decimal,
    pub quantity: u32,
}

/// One item of an authoritative order record, priced at order time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(deserialize_with = "de_id", alias = "menuItemId")]
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    pub quantity: u32,
    #[serde(default, alias = "priceAtOrder")]
    pub price_at_time_of_order: Decimal,
    #[serde(default)]
    pub addons: Option<Vec<SelectedAddon>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Authoritative order record, owned by the backend. The client only ever
/// reads this; it never treats a locally computed total as authoritative
/// after submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default, rename = "type")]
    pub order_type: Option<OrderType>,
    #[serde(default, alias = "createdAt")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default, alias = "address")]
    pub delivery_address: String,
    #[serde(default, alias = "customerPhone")]
    pub contact_phone: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

impl OrderRecord {
    /// Short reference shown when the backend assigned no order number.
    pub fn display_number(&self) -> String {
        match &self.order_number {
            Some(number) => number.clone(),
            None => {
                let id = self.id.as_str();
                let tail = id.len().saturating_sub(6);
                id.get(tail..).unwrap_or(id).to_string()
            }
        }
    }
}

/// Addon reference inside an order submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderAddon {
    pub addon_id: String,
    pub quantity: u32,
}

/// One line of an order submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    pub product_id: String,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addons: Option<Vec<NewOrderAddon>>,
}

/// Order submission payload for `POST /orders`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub items: Vec<NewOrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
}

/// Response of a successful order creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub total: Decimal,
}
