use serde::{Deserialize, Serialize};

use super::de_id;

/// Saved address with its server-side id; ids prevent collisions when two
/// formatted strings are identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressItem {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub formatted: String,
}

/// Authenticated customer profile, normalized from the backend's wrapped or
/// direct payload shapes by the API client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub phone: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub address_items: Option<Vec<AddressItem>>,
}

impl User {
    /// Preferred address for pre-filling checkout: the first detailed item,
    /// falling back to the first legacy string.
    pub fn default_address(&self) -> Option<(Option<String>, String)> {
        if let Some(items) = &self.address_items {
            if let Some(first) = items.first() {
                return Some((Some(first.id.clone()), first.formatted.clone()));
            }
        }
        self.addresses.first().map(|a| (None, a.clone()))
    }
}

/// Address creation payload; the backend schema keeps street/city/postal
/// separate even though this client formats addresses as a single string.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAddress {
    pub street: String,
    pub city: String,
    pub postal_code: String,
}

impl NewAddress {
    pub fn from_formatted(formatted: impl Into<String>) -> Self {
        Self {
            street: formatted.into(),
            city: String::new(),
            postal_code: String::new(),
        }
    }
}

/// Restaurant info shown on receipts and the confirmation screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsInfo {
    pub name: String,
    #[serde(default)]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub is_open: Option<bool>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}
