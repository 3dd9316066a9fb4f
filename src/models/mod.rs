//! Wire and domain types shared across the client.
//!
//! Field names mirror the backend's camelCase JSON; identifiers arrive as
//! either strings or numbers depending on the endpoint, so id fields go
//! through [`de_id`].

pub mod menu;
pub mod order;
pub mod payment;
pub mod user;

pub use menu::{AddonDefinition, MenuCategory, Product, Station};
pub use order::{
    NewOrder, NewOrderAddon, NewOrderItem, OrderCreated, OrderItem, OrderRecord, OrderStatus,
    OrderType, SelectedAddon,
};
pub use payment::{
    PaymentRedirect, PaymentRequested, VerifyPaymentRequest, VerifyPaymentResponse, ZoneCheck,
};
pub use user::{AddressItem, NewAddress, SettingsInfo, User};

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

/// Accepts both `"42"` and `42` for identifier fields.
pub(crate) fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

/// Optional variant of [`de_id`].
pub(crate) fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(String::from))
}

pub(crate) fn default_true() -> bool {
    true
}
