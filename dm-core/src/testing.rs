//! Testing utilities.
//!
//! - `LoadedDice` for rolls with known faces
//! - `ScriptedNarrator` for deterministic turns without a language model

use crate::dice::Roller;
use crate::session::{Narrator, NarratorError, NarratorRequest};
use std::collections::VecDeque;

/// Dice that land on scripted faces.
///
/// Faces are clamped to the die being rolled. Once the script runs out every
/// die shows 1.
#[derive(Debug, Clone, Default)]
pub struct LoadedDice {
    faces: VecDeque<u32>,
}

impl LoadedDice {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
        }
    }

    /// Queue more faces.
    pub fn load(&mut self, faces: impl IntoIterator<Item = u32>) {
        self.faces.extend(faces);
    }

    /// Faces not yet rolled.
    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl Roller for LoadedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.faces.pop_front().unwrap_or(1).clamp(1, sides.max(1))
    }
}

/// A narrator that replies from a script and records what it was asked.
#[derive(Debug, Clone, Default)]
pub struct ScriptedNarrator {
    replies: VecDeque<String>,
    requests: Vec<NarratorRequest>,
}

impl ScriptedNarrator {
    pub fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            requests: Vec::new(),
        }
    }

    /// Add a reply to the end of the script.
    pub fn queue(&mut self, reply: impl Into<String>) {
        self.replies.push_back(reply.into());
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> &[NarratorRequest] {
        &self.requests
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }
}

impl Narrator for ScriptedNarrator {
    fn respond(&mut self, request: &NarratorRequest) -> Result<String, NarratorError> {
        self.requests.push(request.clone());
        self.replies.pop_front().ok_or(NarratorError::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loaded_dice() {
        let mut dice = LoadedDice::new([5, 30, 0]);
        assert_eq!(dice.roll_die(6), 5);
        assert_eq!(dice.roll_die(20), 20);
        assert_eq!(dice.roll_die(8), 1);
        assert_eq!(dice.remaining(), 0);
        assert_eq!(dice.roll_die(12), 1);

        dice.load([3]);
        assert_eq!(dice.roll_die(4), 3);
    }

    #[test]
    fn test_scripted_narrator() {
        let mut narrator = ScriptedNarrator::new(["one"]);
        narrator.queue("two");
        let request = NarratorRequest::ToolResults {
            turn: 1,
            prompt: "TOOL RESULTS:".to_string(),
        };
        assert_eq!(narrator.respond(&request).unwrap(), "one");
        assert_eq!(narrator.respond(&request).unwrap(), "two");
        assert!(matches!(narrator.respond(&request), Err(NarratorError::Exhausted)));
        assert_eq!(narrator.requests().len(), 3);
    }
}
