//! Game tools exposed to the narrator.
//!
//! Each tool has an argument struct whose `#[derive(Tool)]` supplies the
//! catalogue entry; [`GameEngine`] binds the names to dice, combat and state.

use crate::combat::{self, AttackParams, SaveParams};
use crate::dice::{self, DiceError, Roller};
use crate::lenient;
use crate::player::PlayerInit;
use crate::protocol::{self, RejectedCall, ToolCall, ToolResult};
use crate::state::{StateError, StateStore};
use dm_macros::Tool;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// A tool as advertised to the narrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Errors from running a single tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error(transparent)]
    Dice(#[from] DiceError),

    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Roll dice using standard D&D notation (e.g., "2d6+3", "1d20"). Returns result and breakdown.
#[derive(Debug, Clone, Deserialize, Tool)]
#[tool(name = "roll_dice")]
pub struct RollDiceArgs {
    /// Dice notation (e.g., "2d6+3", "1d20", "4d8-2")
    pub notation: String,
    /// What the roll is for (e.g., "attack roll", "damage")
    #[serde(default)]
    pub context: Option<String>,
}

/// Roll dice with advantage (roll twice, take higher result). Used in D&D when you have an advantage.
#[derive(Debug, Clone, Deserialize, Tool)]
#[tool(name = "roll_with_advantage")]
pub struct RollWithAdvantageArgs {
    /// Dice notation (usually "1d20" for D&D)
    pub notation: String,
    /// What the roll is for
    #[serde(default)]
    pub context: Option<String>,
}

/// Roll dice with disadvantage (roll twice, take lower result). Used in D&D when you have a disadvantage.
#[derive(Debug, Clone, Deserialize, Tool)]
#[tool(name = "roll_with_disadvantage")]
pub struct RollWithDisadvantageArgs {
    /// Dice notation (usually "1d20" for D&D)
    pub notation: String,
    /// What the roll is for
    #[serde(default)]
    pub context: Option<String>,
}

/// Save game state data (player stats, flags, etc.) to memory.
#[derive(Debug, Clone, Deserialize, Tool)]
#[tool(name = "save_state")]
pub struct SaveStateArgs {
    /// State key to save to (e.g., "player", "npcs", "flags")
    pub key: String,
    /// Value to save (any JSON-serializable data)
    pub value: Value,
}

/// Load game state data from memory.
#[derive(Debug, Clone, Deserialize, Tool)]
#[tool(name = "load_state")]
pub struct LoadStateArgs {
    /// State key to load from (e.g., "player", "npcs")
    pub key: String,
}

/// Update existing state with partial changes (deep merge). Use this to update player HP, inventory, etc.
#[derive(Debug, Clone, Deserialize, Tool)]
#[tool(name = "update_state")]
pub struct UpdateStateArgs {
    /// State key to update (e.g., "player")
    pub key: String,
    /// Object with updates to merge into existing state
    pub updates: Value,
}

/// Get all current game state data. Useful for debugging or saving the game.
#[derive(Debug, Clone, Deserialize, Tool)]
#[tool(name = "get_all_state")]
pub struct GetAllStateArgs {}

/// Reset all game state (start a new game). Clears player, NPCs, flags, etc.
#[derive(Debug, Clone, Deserialize, Tool)]
#[tool(name = "reset_state")]
pub struct ResetStateArgs {}

/// Resolve a complete attack: roll to hit, check against AC, roll damage if hit. Handles crits and misses.
#[derive(Debug, Clone, Deserialize, Tool)]
#[tool(name = "resolve_attack")]
#[serde(rename_all = "camelCase")]
pub struct ResolveAttackArgs {
    /// Attack bonus to add to 1d20 roll
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub attack_bonus: Option<i32>,
    /// Target's Armor Class
    #[serde(rename = "targetAC", deserialize_with = "lenient::int")]
    pub target_ac: i32,
    /// Damage dice notation (e.g., "1d8", "2d6")
    pub damage_dice: String,
    /// Damage bonus to add
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub damage_bonus: Option<i32>,
    /// Roll attack with advantage
    #[serde(default)]
    pub advantage: bool,
    /// Roll attack with disadvantage
    #[serde(default)]
    pub disadvantage: bool,
    /// Natural roll needed for critical hit (default 20)
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub crit_range: Option<u32>,
    /// Description of the attack
    #[serde(default)]
    pub context: Option<String>,
}

/// Apply damage to a creature, calculating new HP and status (dead, bloodied).
#[derive(Debug, Clone, Deserialize, Tool)]
#[tool(name = "apply_damage")]
pub struct ApplyDamageArgs {
    /// Current hit points
    #[serde(rename = "currentHP", deserialize_with = "lenient::int")]
    pub current_hp: i64,
    /// Maximum hit points
    #[serde(rename = "maxHP", deserialize_with = "lenient::int")]
    pub max_hp: i64,
    /// Damage to apply
    #[serde(deserialize_with = "lenient::int")]
    pub damage: i64,
}

/// Apply healing to a creature, calculating new HP (cannot exceed max).
#[derive(Debug, Clone, Deserialize, Tool)]
#[tool(name = "apply_healing")]
pub struct ApplyHealingArgs {
    /// Current hit points
    #[serde(rename = "currentHP", deserialize_with = "lenient::int")]
    pub current_hp: i64,
    /// Maximum hit points
    #[serde(rename = "maxHP", deserialize_with = "lenient::int")]
    pub max_hp: i64,
    /// Hit points to restore
    #[serde(deserialize_with = "lenient::int")]
    pub healing: i64,
}

/// Roll initiative for combat (1d20 + DEX modifier). Determines turn order.
#[derive(Debug, Clone, Deserialize, Tool)]
#[tool(name = "roll_initiative")]
#[serde(rename_all = "camelCase")]
pub struct RollInitiativeArgs {
    /// Dexterity modifier to add to roll
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub dex_modifier: Option<i32>,
    /// Roll with advantage
    #[serde(default)]
    pub advantage: bool,
}

/// Resolve a saving throw (1d20 + modifier vs DC). Used for resisting spells, traps, etc.
#[derive(Debug, Clone, Deserialize, Tool)]
#[tool(name = "resolve_saving_throw")]
#[serde(rename_all = "camelCase")]
pub struct ResolveSavingThrowArgs {
    /// Ability modifier to add to roll
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub modifier: Option<i32>,
    /// Difficulty Class to beat
    #[serde(deserialize_with = "lenient::int")]
    pub dc: i32,
    /// Roll with advantage
    #[serde(default)]
    pub advantage: bool,
    /// Roll with disadvantage
    #[serde(default)]
    pub disadvantage: bool,
    /// Name of the save (e.g., "Dexterity Save", "Constitution Save")
    #[serde(default)]
    pub save_name: Option<String>,
}

/// Every tool, in catalogue order.
pub fn all_tools() -> Vec<ToolDefinition> {
    vec![
        RollDiceArgs::as_tool(),
        RollWithAdvantageArgs::as_tool(),
        RollWithDisadvantageArgs::as_tool(),
        SaveStateArgs::as_tool(),
        LoadStateArgs::as_tool(),
        UpdateStateArgs::as_tool(),
        GetAllStateArgs::as_tool(),
        ResetStateArgs::as_tool(),
        PlayerInit::as_tool(),
        ResolveAttackArgs::as_tool(),
        ApplyDamageArgs::as_tool(),
        ApplyHealingArgs::as_tool(),
        RollInitiativeArgs::as_tool(),
        ResolveSavingThrowArgs::as_tool(),
    ]
}

/// Configuration for a [`GameEngine`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Seed for the dice; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every roll reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Everything one response produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub narrative: String,
    pub results: Vec<ToolResult>,
    pub rejected: Vec<RejectedCall>,
}

/// Runs tools against one game's state with one source of dice.
pub struct GameEngine<R: Roller = StdRng> {
    state: StateStore,
    roller: R,
}

impl GameEngine<StdRng> {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_roller(rng)
    }
}

impl Default for GameEngine<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Roller> GameEngine<R> {
    /// An engine with a fresh state store and the given dice.
    pub fn with_roller(roller: R) -> Self {
        Self {
            state: StateStore::new(),
            roller,
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateStore {
        &mut self.state
    }

    pub fn roller_mut(&mut self) -> &mut R {
        &mut self.roller
    }

    /// Run one tool and return its raw JSON result.
    pub fn call(&mut self, tool: &str, args: &Value) -> Result<Value, ToolError> {
        match tool {
            "roll_dice" => {
                let args: RollDiceArgs = parse_args(tool, args)?;
                let context = args.context.unwrap_or_default();
                let roll = dice::roll_dice(&mut self.roller, &args.notation, &context)?;
                Ok(serde_json::to_value(roll)?)
            }
            "roll_with_advantage" => {
                let args: RollWithAdvantageArgs = parse_args(tool, args)?;
                let context = args.context.unwrap_or_default();
                let roll = dice::roll_with_advantage(&mut self.roller, &args.notation, &context)?;
                Ok(serde_json::to_value(roll)?)
            }
            "roll_with_disadvantage" => {
                let args: RollWithDisadvantageArgs = parse_args(tool, args)?;
                let context = args.context.unwrap_or_default();
                let roll = dice::roll_with_disadvantage(&mut self.roller, &args.notation, &context)?;
                Ok(serde_json::to_value(roll)?)
            }
            "save_state" => {
                let args: SaveStateArgs = parse_args(tool, args)?;
                self.state.save(args.key.clone(), args.value);
                Ok(json!({
                    "success": true,
                    "key": args.key,
                    "message": format!("State saved to '{}'", args.key),
                }))
            }
            "load_state" => {
                let args: LoadStateArgs = parse_args(tool, args)?;
                Ok(match self.state.load(&args.key) {
                    Ok(value) => json!({"success": true, "key": args.key, "value": value}),
                    Err(err) => json!({"success": false, "message": err.to_string(), "value": null}),
                })
            }
            "update_state" => {
                let args: UpdateStateArgs = parse_args(tool, args)?;
                Ok(match self.state.update(&args.key, &args.updates) {
                    Ok(value) => json!({
                        "success": true,
                        "key": args.key,
                        "value": value,
                        "message": format!("State '{}' updated", args.key),
                    }),
                    Err(err @ StateError::KeyNotFound(_)) => json!({
                        "success": false,
                        "message": format!("{err}. Use save_state to create it first."),
                    }),
                    Err(err) => json!({"success": false, "message": err.to_string()}),
                })
            }
            "get_all_state" => {
                let _: GetAllStateArgs = parse_args(tool, args)?;
                Ok(json!({"success": true, "state": self.state.snapshot()}))
            }
            "reset_state" => {
                let _: ResetStateArgs = parse_args(tool, args)?;
                self.state.reset();
                Ok(json!({"success": true, "message": "All state reset"}))
            }
            "initialize_player" => {
                let init: PlayerInit = parse_args(tool, args)?;
                let player = self.state.initialize_player(init);
                Ok(json!({
                    "success": true,
                    "message": format!("Player '{}' initialized", player.name),
                    "player": player,
                }))
            }
            "resolve_attack" => {
                let args: ResolveAttackArgs = parse_args(tool, args)?;
                let mut params = AttackParams::new(args.target_ac, args.damage_dice)
                    .with_attack_bonus(args.attack_bonus.unwrap_or(0))
                    .with_damage_bonus(args.damage_bonus.unwrap_or(0))
                    .with_advantage(args.advantage, args.disadvantage);
                if let Some(crit_range) = args.crit_range {
                    params = params.with_crit_range(crit_range);
                }
                if let Some(context) = args.context.filter(|c| !c.is_empty()) {
                    params = params.with_context(context);
                }
                let outcome = combat::resolve_attack(&mut self.roller, &params)?;
                Ok(serde_json::to_value(outcome)?)
            }
            "apply_damage" => {
                let args: ApplyDamageArgs = parse_args(tool, args)?;
                let result = combat::apply_damage(args.current_hp, args.max_hp, args.damage);
                Ok(serde_json::to_value(result)?)
            }
            "apply_healing" => {
                let args: ApplyHealingArgs = parse_args(tool, args)?;
                let result = combat::apply_healing(args.current_hp, args.max_hp, args.healing);
                Ok(serde_json::to_value(result)?)
            }
            "roll_initiative" => {
                let args: RollInitiativeArgs = parse_args(tool, args)?;
                let result = combat::roll_initiative(
                    &mut self.roller,
                    args.dex_modifier.unwrap_or(0),
                    args.advantage,
                );
                Ok(serde_json::to_value(result)?)
            }
            "resolve_saving_throw" => {
                let args: ResolveSavingThrowArgs = parse_args(tool, args)?;
                let mut params = SaveParams::new(args.dc)
                    .with_modifier(args.modifier.unwrap_or(0))
                    .with_advantage(args.advantage, args.disadvantage);
                if let Some(name) = args.save_name.filter(|n| !n.is_empty()) {
                    params = params.with_save_name(name);
                }
                let result = combat::resolve_saving_throw(&mut self.roller, &params);
                Ok(serde_json::to_value(result)?)
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    /// Run one call, capturing any failure in the result.
    pub fn execute(&mut self, call: &ToolCall) -> ToolResult {
        match self.call(&call.tool, &call.args) {
            Ok(result) => {
                tracing::debug!(tool = %call.tool, "tool executed");
                ToolResult::Success {
                    tool: call.tool.clone(),
                    args: call.args.clone(),
                    result,
                }
            }
            Err(err) => {
                tracing::warn!(tool = %call.tool, error = %err, "tool failed");
                ToolResult::Failure {
                    tool: call.tool.clone(),
                    error: err.to_string(),
                }
            }
        }
    }

    /// Run calls strictly in order. A failure does not stop later calls.
    pub fn execute_batch(&mut self, calls: &[ToolCall]) -> Vec<ToolResult> {
        calls.iter().map(|call| self.execute(call)).collect()
    }

    /// Parse a narrator response, run its tool calls and keep its prose.
    pub fn process_response(&mut self, text: &str) -> TurnOutcome {
        let parsed = protocol::parse_response(text);
        TurnOutcome {
            narrative: protocol::extract_narrative(text),
            results: self.execute_batch(&parsed.calls),
            rejected: parsed.rejected,
        }
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, ToolError> {
    let args = if args.is_null() { json!({}) } else { args.clone() };
    serde_json::from_value(args).map_err(|err| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::LoadedDice;

    fn engine(faces: impl IntoIterator<Item = u32>) -> GameEngine<LoadedDice> {
        GameEngine::with_roller(LoadedDice::new(faces))
    }

    #[test]
    fn test_catalogue() {
        let tools = all_tools();
        assert_eq!(tools.len(), 14);
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"initialize_player"));
        assert!(names.contains(&"resolve_saving_throw"));

        let attack = tools.iter().find(|t| t.name == "resolve_attack").unwrap();
        assert_eq!(attack.input_schema["required"], json!(["targetAC", "damageDice"]));
        assert_eq!(attack.input_schema["properties"]["critRange"]["type"], "integer");

        let damage = tools.iter().find(|t| t.name == "apply_damage").unwrap();
        assert_eq!(damage.input_schema["required"], json!(["currentHP", "maxHP", "damage"]));

        let reset = tools.iter().find(|t| t.name == "reset_state").unwrap();
        assert_eq!(reset.input_schema["required"], json!([]));
    }

    #[test]
    fn test_every_catalogued_tool_dispatches() {
        let mut engine = engine([]);
        for tool in all_tools() {
            let err = engine.call(&tool.name, &json!({})).err();
            assert!(
                !matches!(err, Some(ToolError::UnknownTool(_))),
                "{} is not dispatched",
                tool.name
            );
        }
    }

    #[test]
    fn test_unknown_tool() {
        let mut engine = engine([]);
        let result = engine.execute(&ToolCall::new("cast_fireball", json!({})));
        assert_eq!(result.error(), Some("Unknown tool: cast_fireball"));
    }

    #[test]
    fn test_roll_dice() {
        let mut engine = engine([4, 6]);
        let result = engine
            .call("roll_dice", &json!({"notation": "2d6+1", "context": "damage"}))
            .unwrap();
        assert_eq!(result["result"], 11);
        assert_eq!(result["rawRolls"], json!([4, 6]));
        assert_eq!(result["context"], "damage");
    }

    #[test]
    fn test_bad_notation_is_a_failure() {
        let mut engine = engine([]);
        let result = engine.execute(&ToolCall::new("roll_dice", json!({"notation": "d20"})));
        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("Invalid dice notation"));
    }

    #[test]
    fn test_advantage_roll() {
        let mut engine = engine([7, 15]);
        let result = engine
            .call("roll_with_advantage", &json!({"notation": "1d20"}))
            .unwrap();
        assert_eq!(result["result"], 15);
        assert_eq!(result["chosenResult"], 15);
        assert_eq!(result["discardedResult"], 7);
    }

    #[test]
    fn test_state_round_trip() {
        let mut engine = engine([]);
        let saved = engine
            .call("save_state", &json!({"key": "npc", "value": {"name": "Mira"}}))
            .unwrap();
        assert_eq!(saved["message"], "State saved to 'npc'");

        let loaded = engine.call("load_state", &json!({"key": "npc"})).unwrap();
        assert_eq!(loaded["value"], json!({"name": "Mira"}));

        let missing = engine.call("load_state", &json!({"key": "dragon"})).unwrap();
        assert_eq!(missing["success"], false);
        assert_eq!(missing["value"], Value::Null);
    }

    #[test]
    fn test_update_state_failures_are_results() {
        let mut engine = engine([]);
        let missing = engine
            .call("update_state", &json!({"key": "dragon", "updates": {"hp": 1}}))
            .unwrap();
        assert_eq!(missing["success"], false);
        assert!(missing["message"].as_str().unwrap().contains("save_state"));

        let not_object = engine
            .call("update_state", &json!({"key": "flags", "updates": 3}))
            .unwrap();
        assert_eq!(not_object["success"], false);
    }

    #[test]
    fn test_initialize_player_then_inventory_update() {
        let mut engine = engine([]);
        let created = engine
            .call("initialize_player", &json!({"name": "Aria", "class": "Wizard", "maxHp": 8.0}))
            .unwrap();
        assert_eq!(created["message"], "Player 'Aria' initialized");
        assert_eq!(created["player"]["hp"]["max"], 8);

        engine
            .call(
                "update_state",
                &json!({"key": "player", "updates": {"inventory": {"add": "Torch (3)", "quantity": 2}}}),
            )
            .unwrap();
        let player = engine.state().player().unwrap();
        assert_eq!(player.inventory.iter().find(|i| i.name == "Torch (3)").unwrap().quantity, 3);
    }

    #[test]
    fn test_player_survives_stringly_update() {
        let mut engine = engine([]);
        engine.call("initialize_player", &json!({"name": "Aria"})).unwrap();
        let updated = engine
            .call("update_state", &json!({"key": "player", "updates": {"hp": {"current": "12"}}}))
            .unwrap();
        assert_eq!(updated["success"], true);

        let player = engine.state().player().expect("player still readable");
        assert_eq!(player.name, "Aria");
        assert_eq!(player.hp.current, 12);
        assert_eq!(player.hp.max, 30);

        let saved = crate::persist::SavedGame::new(engine.state());
        assert_eq!(saved.metadata.player_name.as_deref(), Some("Aria"));
        assert_eq!(saved.metadata.level, Some(1));
    }

    #[test]
    fn test_initialize_player_with_lenient_inventory() {
        let mut engine = engine([]);
        let created = engine
            .call(
                "initialize_player",
                &json!({"name": "Aria", "inventory": [{"name": "Rope", "quantity": 2.0}, "", "Map"]}),
            )
            .unwrap();
        assert_eq!(
            created["player"]["inventory"],
            json!([{"name": "Rope", "quantity": 2}, {"name": "Map", "quantity": 1}])
        );
    }

    #[test]
    fn test_extreme_hp_does_not_stop_batch() {
        let mut engine = engine([4]);
        let results = engine.execute_batch(&[
            ToolCall::new("apply_healing", json!({"currentHP": i64::MIN, "maxHP": 10, "healing": 0})),
            ToolCall::new("apply_healing", json!({"currentHP": -10, "maxHP": 10, "healing": 5})),
            ToolCall::new("roll_dice", json!({"notation": "1d6"})),
        ]);
        assert_eq!(results[0].result().unwrap()["newHP"], 0);
        let healed = results[1].result().unwrap();
        assert_eq!(healed["healing"], 5);
        assert_eq!(healed["overheal"], 0);
        assert_eq!(results[2].result().unwrap()["result"], 4);
    }

    #[test]
    fn test_resolve_attack_lenient_numbers() {
        let mut engine = engine([12, 3]);
        let result = engine
            .call(
                "resolve_attack",
                &json!({"targetAC": "14", "damageDice": "1d8", "attackBonus": 2.0, "damageBonus": 1}),
            )
            .unwrap();
        assert_eq!(result["hit"], true);
        assert_eq!(result["damage"], 4);
        assert_eq!(result["context"], "Attack");
    }

    #[test]
    fn test_invalid_arguments() {
        let mut engine = engine([]);
        let err = engine.call("apply_damage", &json!({"currentHP": 10, "maxHP": 10})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { ref tool, .. } if tool == "apply_damage"));

        let err = engine
            .call("resolve_saving_throw", &json!({"dc": 12.5}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_hp_tools() {
        let mut engine = engine([]);
        let hurt = engine
            .call("apply_damage", &json!({"currentHP": 10, "maxHP": 10, "damage": 5}))
            .unwrap();
        assert_eq!(hurt["newHP"], 5);
        assert_eq!(hurt["isBloodied"], true);

        let healed = engine
            .call("apply_healing", &json!({"currentHP": 5, "maxHP": 10, "healing": 9}))
            .unwrap();
        assert_eq!(healed["newHP"], 10);
        assert_eq!(healed["overheal"], 4);
    }

    #[test]
    fn test_initiative_and_save() {
        let mut engine = engine([15, 9]);
        let init = engine.call("roll_initiative", &json!({"dexModifier": 2})).unwrap();
        assert_eq!(init["total"], 17);

        let save = engine
            .call("resolve_saving_throw", &json!({"dc": 12, "modifier": 3, "saveName": "Dexterity Save"}))
            .unwrap();
        assert_eq!(save["success"], true);
        assert_eq!(save["saveName"], "Dexterity Save");
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let mut engine = engine([20]);
        let results = engine.execute_batch(&[
            ToolCall::new("roll_dice", json!({"notation": "banana"})),
            ToolCall::new("save_state", json!({"key": "door", "value": "open"})),
            ToolCall::new("roll_dice", json!({"notation": "1d20"})),
        ]);
        let ok: Vec<bool> = results.iter().map(ToolResult::is_success).collect();
        assert_eq!(ok, [false, true, true]);
        assert_eq!(results[2].result().unwrap()["result"], 20);
        assert_eq!(engine.state().load("door").unwrap(), "open");
    }

    #[test]
    fn test_process_response() {
        let mut engine = engine([18]);
        let outcome = engine.process_response(
            "You swing at the goblin.\n\
             TOOL_CALL: roll_dice\n\
             ARGUMENTS: {notation: '1d20', context: 'test'}\n\
             TOOL_CALL: roll_dice\n\
             What do you do?",
        );
        assert_eq!(outcome.narrative, "You swing at the goblin.\nWhat do you do?");
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].result().unwrap()["context"], "test");
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[test]
    fn test_seeded_engines_agree() {
        let mut a = GameEngine::with_config(EngineConfig::new().with_seed(7));
        let mut b = GameEngine::with_config(EngineConfig::new().with_seed(7));
        let args = json!({"notation": "4d6"});
        for _ in 0..5 {
            assert_eq!(
                a.call("roll_dice", &args).unwrap()["rawRolls"],
                b.call("roll_dice", &args).unwrap()["rawRolls"]
            );
        }
    }
}
