//! Headless drivers for the rules engine.
//!
//! Two line-oriented protocols on stdin/stdout:
//!
//! - Interactive: plain lines are buffered as narrator output, `#run` executes
//!   the buffer, other `#` lines are commands (see `#help`).
//! - Serve (`--serve`): every line is a JSON `{"tool": ..., "args": ...}`
//!   request answered by one JSON result line.

use anyhow::Context;
use dm_core::{
    all_tools, EngineConfig, GameEngine, PlayerInit, SavedGame, ToolCall, ToolResult, TurnOutcome,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Settings gathered from the command line and environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadlessConfig {
    pub seed: Option<u64>,
    pub serve: bool,
    /// Create a player with this name before the first line is read.
    pub player: Option<String>,
}

impl HeadlessConfig {
    fn engine(&self) -> GameEngine {
        let config = match self.seed {
            Some(seed) => EngineConfig::new().with_seed(seed),
            None => EngineConfig::new(),
        };
        let mut engine = GameEngine::with_config(config);
        if let Some(name) = &self.player {
            let player = engine.state_mut().initialize_player(PlayerInit::named(name.clone()));
            tracing::info!(player = %player.name, "player created from command line");
        }
        engine
    }
}

/// What the input loop should do after a line.
#[derive(Debug, PartialEq)]
enum Flow {
    Continue,
    Quit,
}

/// Interactive driver state: one engine and the pending narrator text.
pub struct Driver {
    engine: GameEngine,
    buffer: Vec<String>,
}

impl Driver {
    pub fn new(engine: GameEngine) -> Self {
        Self {
            engine,
            buffer: Vec::new(),
        }
    }

    /// Handle one input line, appending anything to print to `out`.
    async fn handle_line(&mut self, line: &str, out: &mut Vec<String>) -> Flow {
        // Markdown headings ("## Act I") are narrator text, not commands.
        let command = line
            .trim_start()
            .strip_prefix('#')
            .filter(|rest| rest.starts_with(|c: char| c.is_ascii_alphabetic()));
        let Some(command) = command else {
            self.buffer.push(line.to_string());
            return Flow::Continue;
        };

        let command = command.trim();
        let (name, rest) = command
            .split_once(char::is_whitespace)
            .map(|(name, rest)| (name, rest.trim()))
            .unwrap_or((command, ""));

        match name {
            "quit" | "exit" => {
                out.push("Goodbye!".to_string());
                return Flow::Quit;
            }
            "run" => {
                let text = self.buffer.join("\n");
                self.buffer.clear();
                let outcome = self.engine.process_response(&text);
                render_outcome(&outcome, out);
            }
            "call" => self.call(rest, out),
            "tools" => {
                for tool in all_tools() {
                    out.push(format!("  {:<24} {}", tool.name, tool.description));
                }
            }
            "state" => {
                let state = Value::Object(self.engine.state().snapshot());
                out.push(pretty(&state));
            }
            "player" => match self.engine.state().player() {
                Some(player) => out.push(format!("[PLAYER] {}", player.summary())),
                None => out.push("[PLAYER] none (use initialize_player)".to_string()),
            },
            "reset" => {
                self.engine.state_mut().reset();
                self.buffer.clear();
                out.push("[RESET] All state reset".to_string());
            }
            "save" if !rest.is_empty() => {
                match SavedGame::new(self.engine.state()).save_json(rest).await {
                    Ok(()) => out.push(format!("[SAVED] Game saved to {rest}")),
                    Err(e) => out.push(format!("[ERROR] Save failed: {e}")),
                }
            }
            "load" if !rest.is_empty() => match SavedGame::load_json(rest).await {
                Ok(saved) => {
                    self.engine.state_mut().restore(saved.state);
                    out.push(format!("[LOADED] Game loaded from {rest}"));
                    if let Some(player) = self.engine.state().player() {
                        out.push(format!("[PLAYER] {}", player.summary()));
                    }
                }
                Err(e) => out.push(format!("[ERROR] Load failed: {e}")),
            },
            "save" => out.push("[ERROR] Usage: #save <path>".to_string()),
            "load" => out.push("[ERROR] Usage: #load <path>".to_string()),
            "help" => help(out),
            _ => out.push("[ERROR] Unknown command. Type #help for help.".to_string()),
        }
        Flow::Continue
    }

    fn call(&mut self, rest: &str, out: &mut Vec<String>) {
        let (tool, raw_args) = rest
            .split_once(char::is_whitespace)
            .map(|(tool, args)| (tool, args.trim()))
            .unwrap_or((rest, ""));
        if tool.is_empty() {
            out.push("[ERROR] Usage: #call <tool> <json>".to_string());
            return;
        }

        let args = if raw_args.is_empty() {
            Ok(json!({}))
        } else {
            dm_core::protocol::decode_arguments(raw_args)
        };
        match args {
            Ok(args) => {
                let result = self.engine.execute(&ToolCall::new(tool, args));
                render_result(&result, out);
            }
            Err(reason) => out.push(format!("[ERROR] {reason}")),
        }
    }
}

fn render_outcome(outcome: &TurnOutcome, out: &mut Vec<String>) {
    if !outcome.narrative.is_empty() {
        out.push("[DM]".to_string());
        out.push(outcome.narrative.clone());
    }
    for result in &outcome.results {
        render_result(result, out);
    }
    for rejected in &outcome.rejected {
        out.push(format!(
            "[REJECTED] line {}: {} ({})",
            rejected.line,
            rejected.tool.as_deref().unwrap_or("?"),
            rejected.reason
        ));
    }
}

fn render_result(result: &ToolResult, out: &mut Vec<String>) {
    match result.error() {
        Some(error) => out.push(format!("[ERROR] {}: {error}", result.tool())),
        None => out.push(format!("[RESULT] {}: {}", result.tool(), compact(&result.payload()))),
    }
}

fn help(out: &mut Vec<String>) {
    out.push("[HELP]".to_string());
    for line in [
        "  #run               - Execute the buffered narrator text",
        "  #call <tool> <json> - Run one tool directly",
        "  #tools             - List available tools",
        "  #state             - Show all game state",
        "  #player            - Show the player",
        "  #reset             - Reset all state",
        "  #save <path>       - Save the game",
        "  #load <path>       - Load a saved game",
        "  #help              - Show this help",
        "  #quit              - Exit",
        "  (anything else is buffered as narrator text)",
    ] {
        out.push(line.to_string());
    }
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

/// Run the interactive line protocol until `#quit` or end of input.
pub async fn run_headless(config: HeadlessConfig) -> anyhow::Result<()> {
    let mut driver = Driver::new(config.engine());
    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();

    let mut out = vec![
        "=== Dungeon Master Headless Mode ===".to_string(),
        "Paste narrator output, then #run. Type #help for commands.".to_string(),
    ];
    if let Some(player) = driver.engine.state().player() {
        out.push(format!("[PLAYER] {}", player.summary()));
    }
    write_lines(&mut stdout, &mut out).await?;

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let flow = driver.handle_line(&line, &mut out).await;
        write_lines(&mut stdout, &mut out).await?;
        if flow == Flow::Quit {
            break;
        }
    }

    if !driver.buffer.is_empty() {
        tracing::warn!(lines = driver.buffer.len(), "input ended with unexecuted text; use #run");
    }
    Ok(())
}

async fn write_lines(stdout: &mut io::Stdout, out: &mut Vec<String>) -> anyhow::Result<()> {
    for line in out.drain(..) {
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }
    stdout.flush().await?;
    Ok(())
}

/// One serve-mode request.
#[derive(Debug, Deserialize)]
struct ServeRequest {
    tool: String,
    #[serde(default)]
    args: Value,
}

/// Answer one serve-mode line with one JSON line.
fn serve_line(engine: &mut GameEngine, line: &str) -> String {
    let response = match serde_json::from_str::<ServeRequest>(line) {
        Ok(request) => {
            let result = engine.execute(&ToolCall::new(request.tool, request.args));
            serde_json::to_value(&result).unwrap_or_else(|e| json!({ "error": e.to_string() }))
        }
        Err(e) => {
            tracing::warn!(error = %e, "bad serve request");
            json!({ "error": format!("Invalid request: {e}") })
        }
    };
    compact(&response)
}

/// Run the JSON-lines tool server until end of input.
pub async fn run_serve(config: HeadlessConfig) -> anyhow::Result<()> {
    let mut engine = config.engine();
    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let mut out = vec![serve_line(&mut engine, &line)];
        write_lines(&mut stdout, &mut out).await?;
    }
    Ok(())
}

/// Parse driver configuration from command line arguments.
///
/// `DM_DICE_SEED` supplies the seed unless `--seed` is given.
pub fn parse_config_from_args(args: &[String], env_seed: Option<&str>) -> anyhow::Result<HeadlessConfig> {
    let mut config = HeadlessConfig {
        seed: env_seed
            .map(|raw| raw.trim().parse().context("DM_DICE_SEED must be an unsigned integer"))
            .transpose()?,
        ..HeadlessConfig::default()
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" => {
                let raw = args.get(i + 1).context("--seed needs a value")?;
                config.seed = Some(raw.parse().with_context(|| format!("invalid seed: {raw}"))?);
                i += 1;
            }
            "--player" => {
                if let Some(name) = args.get(i + 1) {
                    config.player = Some(name.clone());
                    i += 1;
                }
            }
            "--serve" => config.serve = true,
            _ => {}
        }
        i += 1;
    }

    Ok(config)
}
