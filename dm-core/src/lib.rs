//! Rules core for an AI Dungeon Master.
//!
//! This crate provides:
//! - Dice notation parsing and rolling, with advantage and disadvantage
//! - Attack, damage, healing, initiative and saving throw resolution
//! - A JSON key-value game state with player and inventory handling
//! - The `TOOL_CALL:` / `ARGUMENTS:` text protocol and its tool catalogue
//! - A turn loop around a pluggable narrator, and save files
//!
//! # Quick Start
//!
//! ```ignore
//! use dm_core::{EngineConfig, GameEngine};
//!
//! let mut engine = GameEngine::with_config(EngineConfig::new().with_seed(42));
//! let outcome = engine.process_response(
//!     "The goblin swings!\nTOOL_CALL: resolve_attack\nARGUMENTS: {targetAC: 15, damageDice: '1d6'}",
//! );
//! println!("{}", outcome.narrative);
//! for result in &outcome.results {
//!     println!("{}: {}", result.tool(), result.payload());
//! }
//! ```

// Lets `#[derive(Tool)]` name `dm_core::ToolDefinition` from inside this crate.
extern crate self as dm_core;

pub mod combat;
pub mod dice;
pub mod inventory;
pub mod lenient;
pub mod persist;
pub mod player;
pub mod protocol;
pub mod session;
pub mod state;
pub mod testing;
pub mod tools;

// Re-export for convenience
pub use dm_macros::Tool;

// Primary public API
pub use dice::{Advantage, DiceError, DiceNotation, RollResult, Roller};
pub use inventory::{Inventory, ItemStack};
pub use persist::{PersistError, SavedGame};
pub use player::{PlayerInit, PlayerRecord};
pub use protocol::{
    extract_narrative, parse_response, parse_tool_calls, ParsedResponse, RejectReason, RejectedCall,
    ToolCall, ToolResult,
};
pub use session::{Narrator, NarratorError, NarratorRequest, Session, SessionError, TurnReport};
pub use state::{StateError, StateStore};
pub use tools::{all_tools, EngineConfig, GameEngine, ToolDefinition, ToolError, TurnOutcome};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    /// Roll dice using standard D&D notation
    #[derive(Tool, Deserialize)]
    #[tool(name = "roll_dice")]
    #[allow(dead_code)]
    struct RollDice {
        /// Dice notation like "2d6+3" or "1d20"
        notation: String,
        /// Optional purpose for the roll
        purpose: Option<String>,
    }

    /// Move a creature
    #[derive(Tool, Deserialize)]
    #[serde(rename_all = "camelCase")]
    #[allow(dead_code)]
    struct MoveCreature {
        creature_id: String,
        #[serde(rename = "toAC")]
        target_ac: i32,
        #[serde(default)]
        distance_feet: u32,
        #[tool(rename = "tags")]
        labels: Vec<String>,
        extra: serde_json::Value,
    }

    #[test]
    fn test_tool_derive() {
        assert_eq!(RollDice::tool_name(), "roll_dice");
        assert_eq!(
            RollDice::tool_description(),
            "Roll dice using standard D&D notation"
        );
        assert_eq!(MoveCreature::tool_name(), "move_creature");
    }

    #[test]
    fn test_tool_schema() {
        let schema = RollDice::input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["notation"]["type"], "string");
        assert_eq!(schema["properties"]["purpose"]["type"], "string");

        // notation should be required, purpose should not be (it's Option)
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "notation"));
        assert!(!required.iter().any(|v| v == "purpose"));
    }

    #[test]
    fn test_schema_follows_serde_names() {
        let schema = MoveCreature::input_schema();
        let properties = &schema["properties"];
        assert_eq!(properties["creatureId"]["type"], "string");
        assert_eq!(properties["toAC"]["type"], "integer");
        assert_eq!(properties["tags"]["items"]["type"], "string");
        assert_eq!(properties["extra"], serde_json::json!({}));
        assert_eq!(
            schema["required"],
            serde_json::json!(["creatureId", "toAC", "tags", "extra"])
        );
    }

    #[test]
    fn test_tool_as_tool() {
        let tool = RollDice::as_tool();
        assert_eq!(tool.name, "roll_dice");
        assert!(!tool.description.is_empty());
    }
}
