use serde::{Deserialize, Serialize};

use shopfront_core::{DomainError, DomainResult, Entity, ProductKey};

/// Cart line: product, display text, quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Products are keyed by title.
    #[serde(rename = "title")]
    pub product_key: ProductKey,
    #[serde(default)]
    pub description: String,
    /// Always ≥ 1 once the item is in a ledger.
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product_key: impl Into<ProductKey>, description: impl Into<String>) -> Self {
        Self {
            product_key: product_key.into(),
            description: description.into(),
            quantity: 1,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }
}

impl Entity for CartItem {
    type Id = ProductKey;

    fn id(&self) -> &Self::Id {
        &self.product_key
    }
}

/// In-memory cart.
///
/// # Invariants
/// - At most one line per product key.
/// - Every quantity is ≥ 1.
/// - Insertion order is kept for display only; neither uniqueness nor totals
///   depend on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLedger {
    items: Vec<CartItem>,
}

impl CartLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn get(&self, key: &ProductKey) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id() == key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add one unit of `item`.
    ///
    /// The caller's `quantity` is ignored in both branches: an existing line
    /// grows by exactly one, a new line starts at exactly one. Storefront
    /// pages rely on "add" meaning "one more", so this normalization is part
    /// of the contract.
    pub fn add(&mut self, item: CartItem) -> &CartItem {
        let position = match self.position(item.id()) {
            Some(idx) => {
                let line = &mut self.items[idx];
                line.quantity = line.quantity.saturating_add(1);
                tracing::debug!(product = %line.product_key, quantity = line.quantity, "cart line incremented");
                idx
            }
            None => {
                tracing::debug!(product = %item.product_key, "cart line added");
                self.items.push(CartItem { quantity: 1, ..item });
                self.items.len() - 1
            }
        };
        &self.items[position]
    }

    /// Replace the quantity of an existing line.
    ///
    /// Absent keys are `NotFound`; a zero quantity is rejected rather than
    /// treated as removal (use [`CartLedger::remove`] for that).
    pub fn set_quantity(&mut self, key: &ProductKey, quantity: u32) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }

        let idx = self
            .position(key)
            .ok_or_else(|| DomainError::not_found(format!("cart item '{key}'")))?;
        self.items[idx].quantity = quantity;
        Ok(())
    }

    /// Remove the line for `key`, if any. Returns whether a line was removed.
    pub fn remove(&mut self, key: &ProductKey) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id() != key);
        before != self.items.len()
    }

    /// Sum of quantities across all lines.
    pub fn total_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn position(&self, key: &ProductKey) -> Option<usize> {
        self.items.iter().position(|item| item.id() == key)
    }
}
