//! The player character record kept under the `player` state key.

use crate::inventory::{self, Inventory, ItemStack};
use crate::lenient;
use dm_macros::Tool;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DEFAULT_NAME: &str = "Adventurer";
pub const DEFAULT_CLASS: &str = "Fighter";
pub const DEFAULT_MAX_HP: i64 = 30;
pub const DEFAULT_AC: i64 = 15;
pub const DEFAULT_GOLD: i64 = 10;
pub const DEFAULT_LOCATION: &str = "start";

/// Gear a new character starts with when none is given.
pub const STARTER_INVENTORY: [&str; 6] = [
    "Longsword",
    "Shield",
    "Chain Mail",
    "Healing Potion (2d4+2)",
    "Rope (50 ft)",
    "Torch (3)",
];

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityScores {
    #[serde(deserialize_with = "lenient::int")]
    pub strength: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub dexterity: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub constitution: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub intelligence: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub wisdom: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub charisma: i64,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 14,
            dexterity: 12,
            constitution: 14,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

/// Ability scores where any subset may be given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialAbilityScores {
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub strength: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub dexterity: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub constitution: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub intelligence: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub wisdom: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub charisma: Option<i64>,
}

impl PartialAbilityScores {
    /// Fill each missing or non-positive score from the defaults.
    pub fn resolve(&self) -> AbilityScores {
        let base = AbilityScores::default();
        let pick = |given: Option<i64>, fallback: i64| given.filter(|s| *s > 0).unwrap_or(fallback);
        AbilityScores {
            strength: pick(self.strength, base.strength),
            dexterity: pick(self.dexterity, base.dexterity),
            constitution: pick(self.constitution, base.constitution),
            intelligence: pick(self.intelligence, base.intelligence),
            wisdom: pick(self.wisdom, base.wisdom),
            charisma: pick(self.charisma, base.charisma),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitPoints {
    #[serde(deserialize_with = "lenient::int")]
    pub current: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub max: i64,
}

impl Default for HitPoints {
    fn default() -> Self {
        Self {
            current: DEFAULT_MAX_HP,
            max: DEFAULT_MAX_HP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    #[serde(deserialize_with = "lenient::int")]
    pub gold: i64,
    pub special_abilities: BTreeMap<String, i64>,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            gold: DEFAULT_GOLD,
            special_abilities: BTreeMap::from([
                ("second_wind".to_string(), 1),
                ("action_surge".to_string(), 1),
            ]),
        }
    }
}

/// A full player character.
///
/// Decoding is field by field: numbers may arrive as `12`, `12.0` or `"12"`,
/// and a field that still cannot be read keeps its default instead of
/// failing the whole record. Only a non-object fails to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct PlayerRecord {
    pub name: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub level: i64,
    pub hp: HitPoints,
    pub ac: i64,
    pub stats: AbilityScores,
    pub inventory: Vec<ItemStack>,
    pub conditions: Vec<String>,
    pub resources: Resources,
    pub location: String,
    pub flags: Map<String, Value>,
    pub quest_log: Vec<Value>,
}

impl Default for PlayerRecord {
    fn default() -> Self {
        PlayerInit::default().into_record()
    }
}

impl From<Map<String, Value>> for PlayerRecord {
    fn from(fields: Map<String, Value>) -> Self {
        let mut record = PlayerRecord::default();
        for (field, value) in fields {
            let read = match field.as_str() {
                "name" => read_into(&mut record.name, value),
                "class" => read_into(&mut record.class_name, value),
                "level" => read_int(&mut record.level, &value),
                "hp" => read_into(&mut record.hp, value),
                "ac" => read_int(&mut record.ac, &value),
                "stats" => read_into(&mut record.stats, value),
                "inventory" => {
                    record.inventory = Inventory::from_json(&value).items;
                    true
                }
                "conditions" => read_into(&mut record.conditions, value),
                "resources" => read_into(&mut record.resources, value),
                "location" => read_into(&mut record.location, value),
                "flags" => read_into(&mut record.flags, value),
                "quest_log" => read_into(&mut record.quest_log, value),
                _ => true,
            };
            if !read {
                tracing::debug!(field = %field, "unreadable player field kept its default");
            }
        }
        record
    }
}

fn read_into<T: DeserializeOwned>(slot: &mut T, value: Value) -> bool {
    match serde_json::from_value(value) {
        Ok(decoded) => {
            *slot = decoded;
            true
        }
        Err(_) => false,
    }
}

fn read_int(slot: &mut i64, value: &Value) -> bool {
    match lenient::as_integer(value) {
        Some(n) => {
            *slot = n;
            true
        }
        None => false,
    }
}

impl PlayerRecord {
    pub fn is_dead(&self) -> bool {
        self.hp.current <= 0
    }

    /// One-line status, e.g. `Aria the Wizard (level 1) HP 8/8 AC 12 @ start`.
    pub fn summary(&self) -> String {
        format!(
            "{} the {} (level {}) HP {}/{} AC {} @ {}",
            self.name, self.class_name, self.level, self.hp.current, self.hp.max, self.ac, self.location
        )
    }
}

/// Initialize player state with default stats. Use this at the start of a new game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Tool, Serialize, Deserialize)]
#[tool(name = "initialize_player")]
#[serde(rename_all = "camelCase")]
pub struct PlayerInit {
    /// Player character name
    #[tool(required)]
    #[serde(default)]
    pub name: Option<String>,
    /// Character class (Fighter, Wizard, Rogue, etc.)
    #[serde(default, rename = "class")]
    pub class_name: Option<String>,
    /// Character level (usually 1 for new games)
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub level: Option<i64>,
    /// Maximum hit points
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub max_hp: Option<i64>,
    /// Armor class
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub ac: Option<i64>,
    /// Ability scores (strength, dexterity, constitution, intelligence, wisdom, charisma)
    #[serde(default)]
    pub stats: Option<PartialAbilityScores>,
    /// Starting items, as names or {name, quantity} objects
    #[serde(default, deserialize_with = "inventory::opt_items")]
    pub inventory: Option<Vec<ItemStack>>,
    /// Starting gold
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub gold: Option<i64>,
    /// Starting location
    #[serde(default)]
    pub location: Option<String>,
}

impl PlayerInit {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_level(mut self, level: i64) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_max_hp(mut self, max_hp: i64) -> Self {
        self.max_hp = Some(max_hp);
        self
    }

    pub fn with_ac(mut self, ac: i64) -> Self {
        self.ac = Some(ac);
        self
    }

    pub fn with_stats(mut self, stats: PartialAbilityScores) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_inventory(mut self, items: Vec<ItemStack>) -> Self {
        self.inventory = Some(items);
        self
    }

    pub fn with_gold(mut self, gold: i64) -> Self {
        self.gold = Some(gold);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Build the full record, filling every missing field.
    ///
    /// Blank strings and non-positive level, max HP and AC count as missing.
    /// Gold may legitimately be zero.
    pub fn into_record(self) -> PlayerRecord {
        let text = |value: Option<String>, fallback: &str| {
            value
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        let positive = |value: Option<i64>, fallback: i64| value.filter(|v| *v > 0).unwrap_or(fallback);

        let max_hp = positive(self.max_hp, DEFAULT_MAX_HP);
        let inventory = self.inventory.unwrap_or_else(|| {
            STARTER_INVENTORY
                .iter()
                .map(|name| ItemStack::new(*name, 1))
                .collect()
        });
        let mut resources = Resources::default();
        if let Some(gold) = self.gold.filter(|g| *g >= 0) {
            resources.gold = gold;
        }

        PlayerRecord {
            name: text(self.name, DEFAULT_NAME),
            class_name: text(self.class_name, DEFAULT_CLASS),
            level: positive(self.level, 1),
            hp: HitPoints {
                current: max_hp,
                max: max_hp,
            },
            ac: positive(self.ac, DEFAULT_AC),
            stats: self.stats.unwrap_or_default().resolve(),
            inventory,
            conditions: Vec::new(),
            resources,
            location: text(self.location, DEFAULT_LOCATION),
            flags: Map::new(),
            quest_log: Vec::new(),
        }
    }
}
