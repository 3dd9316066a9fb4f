use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::models::{AddonDefinition, Product, SelectedAddon};
use crate::storage::{keys, StorageBackend};

/// Outcome of a cart or addon mutation.
///
/// The cart clamps internally either way; this is how the UI learns that a
/// tap did nothing (so it can disable the control) instead of the change
/// being dropped silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddonChange {
    /// The mutation was applied.
    Applied,
    /// The addon already sits at its per-unit maximum.
    Capped,
    /// The product or the addon is marked unavailable.
    Unavailable,
    /// No cart line exists for the given product id.
    NoSuchLine,
}

/// One cart entry: a product snapshot, a quantity, and the selected addons.
///
/// The product is stored flattened so the persisted shape matches the menu
/// payload plus `quantity`/`selectedAddons`, and rehydration needs no
/// catalog lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
    #[serde(default)]
    pub selected_addons: Vec<SelectedAddon>,
}

impl CartLine {
    /// Price of a single unit: base price plus the addon selection.
    pub fn unit_price(&self) -> Decimal {
        let addons: Decimal = self
            .selected_addons
            .iter()
            .map(|a| a.price * Decimal::from(a.quantity))
            .sum();
        self.product.price + addons
    }

    /// Line total: unit price times line quantity.
    pub fn line_total(&self) -> Decimal {
        self.unit_price() * Decimal::from(self.quantity)
    }

    pub fn addon_quantity(&self, addon_id: &str) -> u32 {
        self.selected_addons
            .iter()
            .find(|a| a.addon_id == addon_id)
            .map(|a| a.quantity)
            .unwrap_or(0)
    }

    fn cap_for(&self, addon_id: &str) -> Option<u32> {
        self.product.addon(addon_id).and_then(|def| def.max_per_item)
    }

    /// Merges an addon selection into this line, clamping each quantity at
    /// the catalog cap. Entries that end up at zero are dropped.
    fn merge_addons(&mut self, addons: &[SelectedAddon]) {
        for incoming in addons {
            if incoming.quantity == 0 {
                continue;
            }
            let cap = self.cap_for(&incoming.addon_id);
            match self
                .selected_addons
                .iter_mut()
                .find(|a| a.addon_id == incoming.addon_id)
            {
                Some(existing) => {
                    let merged = existing.quantity.saturating_add(incoming.quantity);
                    existing.quantity = cap.map_or(merged, |cap| merged.min(cap));
                }
                None => {
                    let mut entry = incoming.clone();
                    if let Some(cap) = cap {
                        entry.quantity = entry.quantity.min(cap);
                    }
                    if entry.quantity > 0 {
                        self.selected_addons.push(entry);
                    }
                }
            }
        }
        self.selected_addons.retain(|a| a.quantity > 0);
    }
}

/// Single source of truth for the order in progress.
///
/// The store is an ordered collection of [`CartLine`]s with at most one line
/// per product id. Every mutation persists the full cart to the storage
/// backend before returning; persistence failures are logged and swallowed
/// so the in-memory cart keeps working for the rest of the session.
///
/// # Examples
///
/// ```ignore
/// use tableside::services::cart::CartStore;
///
/// let mut cart = CartStore::load(storage).await;
/// cart.add_line(&espresso, Vec::new()).await;
/// cart.increment_addon("espresso-1", &extra_shot).await;
/// assert_eq!(cart.total(), dec!(98000));
/// ```
pub struct CartStore {
    lines: Vec<CartLine>,
    storage: Arc<dyn StorageBackend>,
}

impl CartStore {
    /// Rehydrates the cart persisted by a previous session.
    ///
    /// A missing or corrupt record yields an empty cart; there is nothing
    /// actionable to surface to the user in either case.
    pub async fn load(storage: Arc<dyn StorageBackend>) -> Self {
        let lines = match storage.get(keys::CART).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<CartLine>>(&raw) {
                Ok(lines) => lines,
                Err(err) => {
                    warn!("Error reading cart from storage: {}", err);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!("Error reading cart from storage: {}", err);
                Vec::new()
            }
        };
        Self { lines, storage }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn quantity_of(&self, product_id: &str) -> u32 {
        self.line(product_id).map(|l| l.quantity).unwrap_or(0)
    }

    pub fn addon_quantity(&self, product_id: &str, addon_id: &str) -> u32 {
        self.line(product_id)
            .map(|l| l.addon_quantity(addon_id))
            .unwrap_or(0)
    }

    /// Cart total over all lines: `(base + addons) × quantity`, summed.
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    fn line(&self, product_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product.id == product_id)
    }

    fn line_mut(&mut self, product_id: &str) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.product.id == product_id)
    }

    /// Adds a product to the cart.
    ///
    /// Unavailable products are rejected. If a line for the product already
    /// exists its quantity goes up by one and the supplied addon selection is
    /// merged into the existing one (clamped per addon cap); otherwise a new
    /// line with quantity 1 is appended.
    #[instrument(skip(self, product, addons), fields(product_id = %product.id))]
    pub async fn add_line(&mut self, product: &Product, addons: Vec<SelectedAddon>) -> AddonChange {
        if !product.available {
            return AddonChange::Unavailable;
        }

        match self.lines.iter().position(|l| l.product.id == product.id) {
            Some(index) => {
                let line = &mut self.lines[index];
                line.quantity = line.quantity.saturating_add(1);
                line.merge_addons(&addons);
            }
            None => {
                let mut line = CartLine {
                    product: product.clone(),
                    quantity: 1,
                    selected_addons: Vec::new(),
                };
                line.merge_addons(&addons);
                self.lines.push(line);
            }
        }
        self.persist().await;
        AddonChange::Applied
    }

    /// Replaces a line's quantity; zero or less removes the line.
    #[instrument(skip(self))]
    pub async fn set_quantity(&mut self, product_id: &str, quantity: i64) {
        if quantity <= 0 {
            self.lines.retain(|l| l.product.id != product_id);
        } else if let Some(line) = self.line_mut(product_id) {
            line.quantity = quantity as u32;
        } else {
            return;
        }
        self.persist().await;
    }

    /// Increments an addon on an existing line, clamped at the addon's
    /// per-unit maximum.
    #[instrument(skip(self, addon), fields(addon_id = %addon.id))]
    pub async fn increment_addon(&mut self, product_id: &str, addon: &AddonDefinition) -> AddonChange {
        let Some(line) = self.line_mut(product_id) else {
            return AddonChange::NoSuchLine;
        };
        if !line.product.available || !addon.available {
            return AddonChange::Unavailable;
        }

        let max = addon.max_per_item.unwrap_or(u32::MAX);
        match line
            .selected_addons
            .iter_mut()
            .find(|a| a.addon_id == addon.id)
        {
            Some(existing) => {
                if existing.quantity >= max {
                    return AddonChange::Capped;
                }
                existing.quantity += 1;
            }
            None => {
                if max == 0 {
                    return AddonChange::Capped;
                }
                line.selected_addons.push(SelectedAddon {
                    addon_id: addon.id.clone(),
                    name: addon.name.clone(),
                    price: addon.price,
                    quantity: 1,
                });
            }
        }
        self.persist().await;
        AddonChange::Applied
    }

    /// Decrements an addon; reaching zero removes the entry entirely, so no
    /// zero-quantity selection is ever persisted.
    #[instrument(skip(self))]
    pub async fn decrement_addon(&mut self, product_id: &str, addon_id: &str) {
        let Some(line) = self.line_mut(product_id) else {
            return;
        };
        for addon in &mut line.selected_addons {
            if addon.addon_id == addon_id {
                addon.quantity = addon.quantity.saturating_sub(1);
            }
        }
        line.selected_addons.retain(|a| a.quantity > 0);
        self.persist().await;
    }

    /// Empties the cart.
    #[instrument(skip(self))]
    pub async fn clear(&mut self) {
        self.lines.clear();
        self.persist().await;
        info!("Cart cleared");
    }

    async fn persist(&self) {
        let serialized = match serde_json::to_string(&self.lines) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!("Error serializing cart: {}", err);
                return;
            }
        };
        if let Err(err) = self.storage.set(keys::CART, &serialized).await {
            warn!("Error saving cart to storage: {}", err);
        }
    }
}
