//! Player inventory: item stacks and the additive patch format.
//!
//! Inventories arrive in two shapes, bare item names and `{name, quantity}`
//! objects. Both are normalized into [`ItemStack`] on ingestion; nothing past
//! this module sees the bare-string form.

use serde::{Deserialize, Deserializer, Serialize};
use crate::lenient;
use serde_json::Value;

/// A named item and how many of it are carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct ItemStack {
    pub name: String,
    pub quantity: u32,
}

impl ItemStack {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.max(1),
        }
    }

    /// Normalize one JSON item: a bare name or a `{name, quantity?}` object.
    ///
    /// Returns `None` for anything without a usable name.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) => non_empty(name).map(|n| Self::new(n, 1)),
            Value::Object(map) => {
                let name = map.get("name").and_then(Value::as_str).and_then(non_empty)?;
                let quantity = map.get("quantity").and_then(positive_quantity).unwrap_or(1);
                Some(Self::new(name, quantity))
            }
            _ => None,
        }
    }

    fn matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

impl TryFrom<Value> for ItemStack {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        ItemStack::from_json(&value).ok_or_else(|| format!("not an item: {value}"))
    }
}

/// `deserialize_with` target for item lists: unusable entries are dropped.
pub fn items<'de, D>(deserializer: D) -> Result<Vec<ItemStack>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Inventory::from_json(&value).items)
}

/// Like [`items`], with `null` read as absent.
pub fn opt_items<'de, D>(deserializer: D) -> Result<Option<Vec<ItemStack>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(Inventory::from_json(&value).items))
}

/// An ordered list of item stacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    #[serde(deserialize_with = "items")]
    pub items: Vec<ItemStack>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a stored JSON inventory, skipping entries without a name.
    pub fn from_json(value: &Value) -> Self {
        let items = match value {
            Value::Array(entries) => entries.iter().filter_map(ItemStack::from_json).collect(),
            _ => Vec::new(),
        };
        Self { items }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.items).unwrap_or(Value::Array(Vec::new()))
    }

    /// Add to the stack with a matching name (case-insensitive), or append one.
    pub fn add(&mut self, name: &str, quantity: u32) {
        let quantity = quantity.max(1);
        if let Some(existing) = self.items.iter_mut().find(|i| i.matches(name)) {
            existing.quantity = existing.quantity.saturating_add(quantity);
            return;
        }
        self.items.push(ItemStack::new(name, quantity));
    }

    /// Take from the matching stack, dropping it once it runs out.
    ///
    /// Returns false if no stack matched.
    pub fn remove(&mut self, name: &str, quantity: u32) -> bool {
        let Some(idx) = self.items.iter().position(|i| i.matches(name)) else {
            return false;
        };
        let remaining = self.items[idx].quantity.saturating_sub(quantity.max(1));
        if remaining == 0 {
            self.items.remove(idx);
        } else {
            self.items[idx].quantity = remaining;
        }
        true
    }

    /// Find an item by name.
    pub fn find(&self, name: &str) -> Option<&ItemStack> {
        self.items.iter().find(|i| i.matches(name))
    }

    /// Total quantity carried of an item, zero if absent.
    pub fn quantity_of(&self, name: &str) -> u32 {
        self.find(name).map(|i| i.quantity).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply an inventory update as sent by the narrator.
    pub fn apply(&mut self, patch: &InventoryPatch) {
        match patch {
            InventoryPatch::AddAll(stacks) => {
                for stack in stacks {
                    self.add(&stack.name, stack.quantity);
                }
            }
            InventoryPatch::Add(stack) => self.add(&stack.name, stack.quantity),
            InventoryPatch::Remove { name, quantity } => {
                self.remove(name, *quantity);
            }
            InventoryPatch::Ignored => {}
        }
    }
}

/// The update shapes accepted for `player.inventory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryPatch {
    /// `["Map", {"name": "Rope", "quantity": 2}]`
    AddAll(Vec<ItemStack>),
    /// `"Map"` or `{"add": "Map" | {...}, "quantity"?: n}`
    Add(ItemStack),
    /// `{"remove": "Map", "quantity"?: n}`
    Remove { name: String, quantity: u32 },
    /// Anything else; applying it changes nothing.
    Ignored,
}

impl InventoryPatch {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Array(entries) => {
                InventoryPatch::AddAll(entries.iter().filter_map(ItemStack::from_json).collect())
            }
            Value::String(_) => ItemStack::from_json(value)
                .map(InventoryPatch::Add)
                .unwrap_or(InventoryPatch::Ignored),
            Value::Object(map) => {
                let quantity = map.get("quantity").and_then(positive_quantity);
                if let Some(item) = map.get("add") {
                    // The patch's own quantity wins over the item's.
                    match ItemStack::from_json(item) {
                        Some(mut stack) => {
                            if let Some(q) = quantity {
                                stack.quantity = q;
                            }
                            InventoryPatch::Add(stack)
                        }
                        None => InventoryPatch::Ignored,
                    }
                } else if let Some(target) = map.get("remove") {
                    match ItemStack::from_json(target) {
                        Some(stack) => InventoryPatch::Remove {
                            name: stack.name,
                            quantity: quantity.unwrap_or(1),
                        },
                        None => InventoryPatch::Ignored,
                    }
                } else {
                    InventoryPatch::Ignored
                }
            }
            _ => InventoryPatch::Ignored,
        }
    }
}

/// Merge an inventory patch into a stored inventory value.
///
/// The result is always a normalized array of `{name, quantity}` objects.
pub fn apply_patch(current: &Value, patch: &Value) -> Value {
    let mut inventory = Inventory::from_json(current);
    let patch = InventoryPatch::from_json(patch);
    if patch == InventoryPatch::Ignored {
        tracing::debug!("ignoring unrecognized inventory update");
    }
    inventory.apply(&patch);
    inventory.to_json()
}

fn non_empty(name: &str) -> Option<&str> {
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

fn positive_quantity(value: &Value) -> Option<u32> {
    let n = lenient::as_integer(value)?;
    u32::try_from(n).ok().filter(|q| *q > 0)
}
