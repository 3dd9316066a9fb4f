use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{de_id, default_true};

/// Preparation station a product is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Station {
    Kitchen,
    Bar,
    Hookah,
}

/// Optional priced modifier attachable to a product, bounded by an optional
/// per-unit maximum quantity (`None` means unlimited).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonDefinition {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub max_per_item: Option<u32>,
}

/// Menu product. Immutable reference data fetched from the backend; the
/// client holds it only as a read-only cache for the current session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub station: Option<Station>,
    #[serde(default, alias = "productAddons")]
    pub addons: Vec<AddonDefinition>,
}

impl Product {
    pub fn addon(&self, addon_id: &str) -> Option<&AddonDefinition> {
        self.addons.iter().find(|a| a.id == addon_id)
    }
}

/// One node of the category → product tree returned by the menu endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuCategory {
    pub name: String,
    #[serde(default)]
    pub station: Option<Station>,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl MenuCategory {
    /// Flattens the tree into standalone products carrying their category
    /// name and station.
    pub fn flatten(categories: Vec<MenuCategory>) -> Vec<Product> {
        let mut items = Vec::new();
        for category in categories {
            for mut product in category.products {
                product.category = category.name.clone();
                if product.station.is_none() {
                    product.station = category.station;
                }
                items.push(product);
            }
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn product_accepts_numeric_and_string_ids() {
        let product: Product = serde_json::from_value(json!({
            "id": 42,
            "name": "چای",
            "price": 30000,
            "addons": [{"id": "a-1", "name": "هل", "price": 5000, "maxPerItem": 2}]
        }))
        .unwrap();

        assert_eq!(product.id, "42");
        assert_eq!(product.price, dec!(30000));
        assert!(product.available);
        assert_eq!(product.addons[0].max_per_item, Some(2));
    }

    #[test]
    fn flatten_carries_category_name_and_station() {
        let categories: Vec<MenuCategory> = serde_json::from_value(json!([
            {
                "name": "نوشیدنی",
                "station": "BAR",
                "products": [{"id": 1, "name": "موهیتو", "price": 90000}]
            },
            {
                "name": "غذای اصلی",
                "products": [{"id": 2, "name": "کباب", "price": 250000, "station": "KITCHEN"}]
            }
        ]))
        .unwrap();

        let items = MenuCategory::flatten(categories);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].category, "نوشیدنی");
        assert_eq!(items[0].station, Some(Station::Bar));
        assert_eq!(items[1].station, Some(Station::Kitchen));
    }
}
