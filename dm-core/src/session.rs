//! Session - one game driven turn by turn through a narrator.
//!
//! A turn asks the [`Narrator`] to respond to the player's action. If the
//! reply requests tools, they run against the session's [`GameEngine`] and
//! the narrator is asked once more, with the results, for the final prose.

use crate::dice::Roller;
use crate::player::PlayerRecord;
use crate::protocol::{self, RejectedCall, ToolResult};
use crate::tools::{EngineConfig, GameEngine};
use rand::rngs::StdRng;
use serde::Serialize;
use thiserror::Error;

/// Errors a narrator can report.
#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("Narrator unavailable: {0}")]
    Unavailable(String),

    #[error("Narrator has no more responses")]
    Exhausted,
}

/// Errors from Session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Narrator error: {0}")]
    Narrator(#[from] NarratorError),

    #[error("Empty player action")]
    EmptyAction,
}

/// What the narrator is asked to respond to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NarratorRequest {
    /// The player did something.
    Action {
        turn: u64,
        action: String,
        player: Option<PlayerRecord>,
    },
    /// Tools ran; narrate their outcome.
    ToolResults { turn: u64, prompt: String },
}

impl NarratorRequest {
    /// The text a language model would be sent.
    pub fn prompt(&self) -> String {
        match self {
            NarratorRequest::Action { action, .. } => format!("CURRENT ACTION: {action}"),
            NarratorRequest::ToolResults { prompt, .. } => prompt.clone(),
        }
    }
}

/// The language model seam.
pub trait Narrator {
    fn respond(&mut self, request: &NarratorRequest) -> Result<String, NarratorError>;
}

impl<N: Narrator + ?Sized> Narrator for &mut N {
    fn respond(&mut self, request: &NarratorRequest) -> Result<String, NarratorError> {
        (**self).respond(request)
    }
}

impl<N: Narrator + ?Sized> Narrator for Box<N> {
    fn respond(&mut self, request: &NarratorRequest) -> Result<String, NarratorError> {
        (**self).respond(request)
    }
}

/// Everything that happened in one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReport {
    pub turn: u64,
    /// Player-visible prose from the final narrator reply.
    pub narrative: String,
    pub results: Vec<ToolResult>,
    pub rejected: Vec<RejectedCall>,
    /// Whether the narrator was asked a second time with tool results.
    pub follow_up: bool,
}

/// A game in progress.
pub struct Session<N: Narrator, R: Roller = StdRng> {
    engine: GameEngine<R>,
    narrator: N,
    turn: u64,
}

impl<N: Narrator> Session<N, StdRng> {
    pub fn new(narrator: N, config: EngineConfig) -> Self {
        Self::with_engine(narrator, GameEngine::with_config(config))
    }
}

impl<N: Narrator, R: Roller> Session<N, R> {
    pub fn with_engine(narrator: N, engine: GameEngine<R>) -> Self {
        Self {
            engine,
            narrator,
            turn: 0,
        }
    }

    pub fn engine(&self) -> &GameEngine<R> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut GameEngine<R> {
        &mut self.engine
    }

    pub fn narrator_mut(&mut self) -> &mut N {
        &mut self.narrator
    }

    /// Turns taken so far.
    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// Play one turn.
    pub fn take_turn(&mut self, action: &str) -> Result<TurnReport, SessionError> {
        let action = action.trim();
        if action.is_empty() {
            return Err(SessionError::EmptyAction);
        }
        self.turn += 1;
        let turn = self.turn;

        let request = NarratorRequest::Action {
            turn,
            action: action.to_string(),
            player: self.engine.state().player(),
        };
        let mut reply = self.narrator.respond(&request)?;

        let mut results = Vec::new();
        let mut rejected = Vec::new();
        let mut follow_up = false;

        if protocol::has_tool_calls(&reply) {
            let outcome = self.engine.process_response(&reply);
            results = outcome.results;
            rejected = outcome.rejected;

            if !results.is_empty() {
                let request = NarratorRequest::ToolResults {
                    turn,
                    prompt: protocol::tool_results_prompt(&results),
                };
                reply = self.narrator.respond(&request)?;
                follow_up = true;
            }
        }

        tracing::debug!(turn, tools = results.len(), rejected = rejected.len(), "turn complete");

        Ok(TurnReport {
            turn,
            narrative: protocol::extract_narrative(&reply),
            results,
            rejected,
            follow_up,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LoadedDice, ScriptedNarrator};

    fn session(narrator: ScriptedNarrator, faces: impl IntoIterator<Item = u32>) -> Session<ScriptedNarrator, LoadedDice> {
        Session::with_engine(narrator, GameEngine::with_roller(LoadedDice::new(faces)))
    }

    #[test]
    fn test_plain_turn() {
        let mut session = session(ScriptedNarrator::new(["The tavern is warm.\n\nWhat do you do?"]), []);
        let report = session.take_turn("look around").unwrap();
        assert_eq!(report.turn, 1);
        assert_eq!(report.narrative, "The tavern is warm.\n\nWhat do you do?");
        assert!(!report.follow_up);
        assert!(report.results.is_empty());
        assert_eq!(session.narrator_mut().requests().len(), 1);
    }

    #[test]
    fn test_tool_turn_asks_again() {
        let narrator = ScriptedNarrator::new([
            "You search the chest.\nTOOL_CALL: roll_dice\nARGUMENTS: {\"notation\": \"1d20\", \"context\": \"Investigation\"}",
            "You find a hidden latch! What do you do?",
        ]);
        let mut session = session(narrator, [17]);
        let report = session.take_turn("search the chest").unwrap();

        assert!(report.follow_up);
        assert_eq!(report.narrative, "You find a hidden latch! What do you do?");
        assert_eq!(report.results[0].result().unwrap()["result"], 17);

        let requests = session.narrator_mut().requests();
        assert_eq!(requests.len(), 2);
        match &requests[1] {
            NarratorRequest::ToolResults { prompt, .. } => {
                assert!(prompt.starts_with("TOOL RESULTS:\n1. roll_dice:"));
            }
            other => panic!("expected tool results, got {other:?}"),
        }
    }

    #[test]
    fn test_only_rejected_calls_skip_follow_up() {
        let narrator = ScriptedNarrator::new(["The rune flickers.\nTOOL_CALL: roll_dice\nARGUMENTS: {{{"]);
        let mut session = session(narrator, []);
        let report = session.take_turn("touch the rune").unwrap();
        assert!(!report.follow_up);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.narrative, "The rune flickers.");
    }

    #[test]
    fn test_action_request_carries_player() {
        let mut session = session(ScriptedNarrator::new(["Hello, Aria."]), []);
        session
            .engine_mut()
            .state_mut()
            .initialize_player(crate::player::PlayerInit::named("Aria"));
        session.take_turn("wave").unwrap();
        match &session.narrator_mut().requests()[0] {
            NarratorRequest::Action { player, action, .. } => {
                assert_eq!(action, "wave");
                assert_eq!(player.as_ref().map(|p| p.name.as_str()), Some("Aria"));
            }
            other => panic!("expected an action, got {other:?}"),
        }
    }

    #[test]
    fn test_errors() {
        let mut session = session(ScriptedNarrator::new(Vec::<String>::new()), []);
        assert!(matches!(session.take_turn("  "), Err(SessionError::EmptyAction)));
        assert!(matches!(
            session.take_turn("knock"),
            Err(SessionError::Narrator(NarratorError::Exhausted))
        ));
    }
}
