//! Dice rolling system.
//!
//! Supports the strict notation the narrator is told to emit: `NdS`,
//! `NdS+M` and `NdS-M`. Rolls can be made plain, with advantage or with
//! disadvantage, and every roll carries a breakdown string for display.

use lazy_static::lazy_static;
use rand::Rng;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Most dice a single notation may roll.
pub const MAX_DICE: u32 = 1000;

/// Rolls with more dice than this leave individual faces out of the breakdown.
const BREAKDOWN_ROLL_LIMIT: usize = 10;

lazy_static! {
    static ref NOTATION_RE: Regex =
        Regex::new(r"^(\d+)[dD](\d+)([+-]\d+)?$").expect("valid dice notation regex");
}

/// Error type for dice parsing and rolling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}. Use format like \"2d6+3\"")]
    InvalidNotation(String),
    #[error("Too many dice in {notation}: at most {max} may be rolled at once")]
    TooManyDice { notation: String, max: u32 },
}

/// Source of die faces.
///
/// Every `rand::Rng` is a roller; tests substitute loaded dice.
pub trait Roller {
    /// Roll one die, returning a face in `1..=sides`.
    fn roll_die(&mut self, sides: u32) -> u32;
}

impl<R: Rng> Roller for R {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.gen_range(1..=sides.max(1))
    }
}

/// Advantage state for d20 rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Combine two advantage states (advantage + disadvantage = normal).
    pub fn combine(self, other: Advantage) -> Advantage {
        match (self, other) {
            (Advantage::Normal, x) | (x, Advantage::Normal) => x,
            (Advantage::Advantage, Advantage::Disadvantage) => Advantage::Normal,
            (Advantage::Disadvantage, Advantage::Advantage) => Advantage::Normal,
            (Advantage::Advantage, Advantage::Advantage) => Advantage::Advantage,
            (Advantage::Disadvantage, Advantage::Disadvantage) => Advantage::Disadvantage,
        }
    }

    /// Build from the pair of boolean flags tool arguments carry.
    ///
    /// Both flags set cancel out to a flat roll.
    pub fn from_flags(advantage: bool, disadvantage: bool) -> Advantage {
        let adv = if advantage {
            Advantage::Advantage
        } else {
            Advantage::Normal
        };
        let dis = if disadvantage {
            Advantage::Disadvantage
        } else {
            Advantage::Normal
        };
        adv.combine(dis)
    }
}

/// A parsed dice notation (e.g., 2d6+3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceNotation {
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
}

impl DiceNotation {
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            sides,
            modifier,
        }
    }

    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let invalid = || DiceError::InvalidNotation(notation.to_string());
        let trimmed = notation.trim();
        let caps = NOTATION_RE.captures(trimmed).ok_or_else(invalid)?;

        let count: u32 = caps[1].parse().map_err(|_| invalid())?;
        let sides: u32 = caps[2].parse().map_err(|_| invalid())?;
        let modifier: i32 = match caps.get(3) {
            Some(m) => m.as_str().parse().map_err(|_| invalid())?,
            None => 0,
        };

        if count == 0 || sides == 0 {
            return Err(invalid());
        }
        if count > MAX_DICE {
            return Err(DiceError::TooManyDice {
                notation: notation.to_string(),
                max: MAX_DICE,
            });
        }

        Ok(Self::new(count, sides, modifier))
    }

    /// The same dice with the count doubled, as rolled on a critical hit.
    pub fn doubled(&self) -> Self {
        Self {
            count: self.count.saturating_mul(2),
            ..*self
        }
    }

    /// The dice part alone, without the modifier (e.g., `2d6`).
    pub fn dice_only(&self) -> String {
        format!("{}d{}", self.count, self.sides)
    }

    /// Roll this notation.
    pub fn roll<R: Roller + ?Sized>(&self, roller: &mut R, context: &str) -> RollResult {
        let raw_rolls: Vec<u32> = (0..self.count)
            .map(|_| roller.roll_die(self.sides))
            .collect();
        let sum: i64 = raw_rolls.iter().map(|&r| i64::from(r)).sum();
        let result = sum + i64::from(self.modifier);

        let mut breakdown = self.dice_only();
        if raw_rolls.len() <= BREAKDOWN_ROLL_LIMIT {
            let faces: Vec<String> = raw_rolls.iter().map(|r| r.to_string()).collect();
            breakdown.push_str(&format!(" ({})", faces.join(", ")));
        }
        if self.modifier != 0 {
            breakdown.push_str(&format!(" {:+}", self.modifier));
        }

        RollResult {
            result,
            breakdown,
            raw_rolls,
            modifier: self.modifier,
            context: context.to_string(),
            notation: self.to_string(),
            sum_before_modifier: sum,
        }
    }
}

impl FromStr for DiceNotation {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceNotation::parse(s)
    }
}

impl fmt::Display for DiceNotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        if self.modifier != 0 {
            write!(f, "{:+}", self.modifier)?;
        }
        Ok(())
    }
}

/// Complete result of a dice roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollResult {
    pub result: i64,
    pub breakdown: String,
    pub raw_rolls: Vec<u32>,
    pub modifier: i32,
    pub context: String,
    /// Canonical notation; parsing it reproduces the rolled dice.
    pub notation: String,
    pub sum_before_modifier: i64,
}

impl RollResult {
    /// The first die face, i.e. the natural roll of a d20.
    pub fn natural(&self) -> u32 {
        self.raw_rolls.first().copied().unwrap_or(0)
    }

    /// Check if the roll meets or exceeds a DC.
    pub fn meets_dc(&self, dc: i64) -> bool {
        self.result >= dc
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.breakdown, self.result)
    }
}

/// Result of rolling twice and keeping one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvantageRollResult {
    /// The kept roll, with the choice appended to its breakdown.
    #[serde(flatten)]
    pub chosen: RollResult,
    pub mode: Advantage,
    /// Both underlying rolls, in the order they were made.
    pub rolls: [RollResult; 2],
    pub chosen_result: i64,
    pub discarded_result: i64,
}

/// Parse a dice notation string.
pub fn parse_dice_notation(notation: &str) -> Result<DiceNotation, DiceError> {
    DiceNotation::parse(notation)
}

/// Roll a single die.
pub fn roll_die<R: Roller + ?Sized>(roller: &mut R, sides: u32) -> u32 {
    roller.roll_die(sides)
}

/// Roll dice from a notation string.
pub fn roll_dice<R: Roller + ?Sized>(
    roller: &mut R,
    notation: &str,
    context: &str,
) -> Result<RollResult, DiceError> {
    Ok(DiceNotation::parse(notation)?.roll(roller, context))
}

/// Roll twice and keep the higher result.
pub fn roll_with_advantage<R: Roller + ?Sized>(
    roller: &mut R,
    notation: &str,
    context: &str,
) -> Result<AdvantageRollResult, DiceError> {
    let parsed = DiceNotation::parse(notation)?;
    Ok(roll_twice(roller, &parsed, context, Advantage::Advantage))
}

/// Roll twice and keep the lower result.
pub fn roll_with_disadvantage<R: Roller + ?Sized>(
    roller: &mut R,
    notation: &str,
    context: &str,
) -> Result<AdvantageRollResult, DiceError> {
    let parsed = DiceNotation::parse(notation)?;
    Ok(roll_twice(roller, &parsed, context, Advantage::Disadvantage))
}

/// Roll a d20 under an advantage state.
///
/// `Normal` rolls once; the other modes roll twice and keep one.
pub fn roll_d20<R: Roller + ?Sized>(roller: &mut R, advantage: Advantage, context: &str) -> RollResult {
    let d20 = DiceNotation::new(1, 20, 0);
    match advantage {
        Advantage::Normal => d20.roll(roller, context),
        mode => roll_twice(roller, &d20, context, mode).chosen,
    }
}

fn roll_twice<R: Roller + ?Sized>(
    roller: &mut R,
    notation: &DiceNotation,
    context: &str,
    mode: Advantage,
) -> AdvantageRollResult {
    let first = notation.roll(roller, context);
    let second = notation.roll(roller, context);

    // Ties keep the first roll.
    let keep_first = match mode {
        Advantage::Disadvantage => first.result <= second.result,
        _ => first.result >= second.result,
    };
    let (chosen, discarded) = if keep_first {
        (&first, &second)
    } else {
        (&second, &first)
    };

    let tag = match mode {
        Advantage::Disadvantage => "DIS",
        _ => "ADV",
    };
    let mut kept = chosen.clone();
    kept.breakdown = format!(
        "{} [{tag}: chose {} over {}]",
        chosen.breakdown, chosen.result, discarded.result
    );

    AdvantageRollResult {
        chosen_result: chosen.result,
        discarded_result: discarded.result,
        chosen: kept,
        mode,
        rolls: [first, second],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::LoadedDice;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_parse_simple() {
        let notation = parse_dice_notation("1d20").unwrap();
        assert_eq!(notation, DiceNotation::new(1, 20, 0));
    }

    #[test]
    fn test_parse_with_modifier() {
        assert_eq!(parse_dice_notation("1d20+5").unwrap().modifier, 5);
        assert_eq!(parse_dice_notation("2d6-2").unwrap().modifier, -2);
        assert_eq!(parse_dice_notation("3D8").unwrap().sides, 8);
        assert_eq!(parse_dice_notation("  4d4+1 ").unwrap().count, 4);
    }

    #[test]
    fn test_parse_rejects_loose_notation() {
        for bad in ["d20", "1d", "2d6+", "1d20 + 5", "2d6+1d4", "4d6kh3", "abc", "", "0d6", "1d0"] {
            let err = parse_dice_notation(bad).unwrap_err();
            assert_eq!(err, DiceError::InvalidNotation(bad.to_string()), "{bad}");
        }
    }

    #[test]
    fn test_parse_rejects_overflow() {
        assert!(matches!(
            parse_dice_notation("99999999999d6"),
            Err(DiceError::InvalidNotation(_))
        ));
        assert!(matches!(
            parse_dice_notation("1001d6"),
            Err(DiceError::TooManyDice { max: MAX_DICE, .. })
        ));
    }

    #[test]
    fn test_breakdown_format() {
        let mut dice = LoadedDice::new([3, 5]);
        let roll = roll_dice(&mut dice, "2d6+3", "damage").unwrap();
        assert_eq!(roll.result, 11);
        assert_eq!(roll.breakdown, "2d6 (3, 5) +3");
        assert_eq!(roll.sum_before_modifier, 8);
        assert_eq!(roll.context, "damage");
        assert_eq!(roll.to_string(), "2d6 (3, 5) +3 = 11");

        let mut dice = LoadedDice::new([4]);
        let roll = roll_dice(&mut dice, "1d8-1", "").unwrap();
        assert_eq!(roll.breakdown, "1d8 (4) -1");

        let mut dice = LoadedDice::new([7]);
        let roll = roll_dice(&mut dice, "1d20", "").unwrap();
        assert_eq!(roll.breakdown, "1d20 (7)");
    }

    #[test]
    fn test_breakdown_omits_large_pools() {
        let mut rng = StdRng::seed_from_u64(7);
        let roll = roll_dice(&mut rng, "20d6", "fireball").unwrap();
        assert_eq!(roll.breakdown, "20d6");
        assert_eq!(roll.raw_rolls.len(), 20);

        let roll = roll_dice(&mut rng, "10d6", "").unwrap();
        assert!(roll.breakdown.starts_with("10d6 ("));
    }

    #[test]
    fn test_advantage_keeps_higher() {
        let mut dice = LoadedDice::new([4, 17]);
        let roll = roll_with_advantage(&mut dice, "1d20", "attack").unwrap();
        assert_eq!(roll.chosen.result, 17);
        assert_eq!(roll.discarded_result, 4);
        assert_eq!(roll.chosen.breakdown, "1d20 (17) [ADV: chose 17 over 4]");
        assert_eq!(roll.rolls[0].result, 4);
        assert_eq!(roll.rolls[1].result, 17);
    }

    #[test]
    fn test_disadvantage_keeps_lower() {
        let mut dice = LoadedDice::new([4, 17]);
        let roll = roll_with_disadvantage(&mut dice, "1d20+2", "save").unwrap();
        assert_eq!(roll.chosen.result, 6);
        assert_eq!(roll.chosen.breakdown, "1d20 (4) +2 [DIS: chose 6 over 19]");
    }

    #[test]
    fn test_tie_keeps_first_roll() {
        let mut dice = LoadedDice::new([5, 6, 6, 5]);
        let roll = roll_with_advantage(&mut dice, "2d6", "").unwrap();
        assert_eq!(roll.chosen.raw_rolls, vec![5, 6]);

        let mut dice = LoadedDice::new([5, 6, 6, 5]);
        let roll = roll_with_disadvantage(&mut dice, "2d6", "").unwrap();
        assert_eq!(roll.chosen.raw_rolls, vec![5, 6]);
    }

    #[test]
    fn test_advantage_serializes_flat() {
        let mut dice = LoadedDice::new([2, 9]);
        let roll = roll_with_advantage(&mut dice, "1d20", "").unwrap();
        let json = serde_json::to_value(&roll).unwrap();
        assert_eq!(json["result"], 9);
        assert_eq!(json["mode"], "advantage");
        assert_eq!(json["rawRolls"], serde_json::json!([9]));
        assert_eq!(json["rolls"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_roll_d20_modes() {
        let mut dice = LoadedDice::new([3, 18]);
        assert_eq!(roll_d20(&mut dice, Advantage::Advantage, "").natural(), 18);
        let mut dice = LoadedDice::new([3, 18]);
        assert_eq!(roll_d20(&mut dice, Advantage::Disadvantage, "").natural(), 3);
        let mut dice = LoadedDice::new([3, 18]);
        assert_eq!(roll_d20(&mut dice, Advantage::Normal, "").natural(), 3);
    }

    #[test]
    fn test_advantage_combine() {
        assert_eq!(
            Advantage::Normal.combine(Advantage::Advantage),
            Advantage::Advantage
        );
        assert_eq!(
            Advantage::Advantage.combine(Advantage::Disadvantage),
            Advantage::Normal
        );
        assert_eq!(Advantage::from_flags(true, true), Advantage::Normal);
        assert_eq!(Advantage::from_flags(false, true), Advantage::Disadvantage);
    }

    proptest! {
        #[test]
        fn roll_stays_in_bounds(count in 1u32..=30, sides in 1u32..=100, modifier in -20i32..=20, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let notation = DiceNotation::new(count, sides, modifier).to_string();
            let roll = roll_dice(&mut rng, &notation, "").unwrap();

            let low = i64::from(count) + i64::from(modifier);
            let high = i64::from(count) * i64::from(sides) + i64::from(modifier);
            prop_assert!(roll.result >= low && roll.result <= high);
            prop_assert_eq!(roll.raw_rolls.len(), count as usize);
            prop_assert!(roll.raw_rolls.iter().all(|&r| r >= 1 && r <= sides));
        }

        #[test]
        fn notation_reparses_to_same_dice(count in 1u32..=50, sides in 1u32..=1000, modifier in -100i32..=100, seed in any::<u64>()) {
            let original = DiceNotation::new(count, sides, modifier);
            let mut rng = StdRng::seed_from_u64(seed);
            let roll = original.roll(&mut rng, "");
            prop_assert_eq!(parse_dice_notation(&roll.notation).unwrap(), original);
        }

        #[test]
        fn advantage_bounds_both_rolls(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let adv = roll_with_advantage(&mut rng, "2d8+1", "").unwrap();
            prop_assert!(adv.chosen.result >= adv.rolls[0].result);
            prop_assert!(adv.chosen.result >= adv.rolls[1].result);

            let dis = roll_with_disadvantage(&mut rng, "2d8+1", "").unwrap();
            prop_assert!(dis.chosen.result <= dis.rolls[0].result);
            prop_assert!(dis.chosen.result <= dis.rolls[1].result);
        }
    }
}
