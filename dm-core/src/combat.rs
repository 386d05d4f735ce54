//! Combat resolution.
//!
//! Attack rolls, damage and healing, initiative and saving throws. Every
//! function here is pure with respect to its arguments: HP is passed in and
//! the new value is reported back, never written to the state store. Dice
//! come from the caller's [`Roller`].

use crate::dice::{roll_d20, Advantage, DiceError, DiceNotation, Roller};
use serde::{Deserialize, Serialize};

/// Lowest critical range accepted; a natural 1 always stays a miss.
const MIN_CRIT_RANGE: u32 = 2;
const NATURAL_MAX: u32 = 20;

/// Inputs to an attack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackParams {
    pub attack_bonus: i32,
    pub target_ac: i32,
    pub damage_dice: String,
    pub damage_bonus: i32,
    pub advantage: bool,
    pub disadvantage: bool,
    pub crit_range: u32,
    pub context: String,
}

impl AttackParams {
    /// An attack with default bonuses and a natural-20 critical range.
    pub fn new(target_ac: i32, damage_dice: impl Into<String>) -> Self {
        Self {
            attack_bonus: 0,
            target_ac,
            damage_dice: damage_dice.into(),
            damage_bonus: 0,
            advantage: false,
            disadvantage: false,
            crit_range: NATURAL_MAX,
            context: "Attack".to_string(),
        }
    }

    pub fn with_attack_bonus(mut self, bonus: i32) -> Self {
        self.attack_bonus = bonus;
        self
    }

    pub fn with_damage_bonus(mut self, bonus: i32) -> Self {
        self.damage_bonus = bonus;
        self
    }

    pub fn with_advantage(mut self, advantage: bool, disadvantage: bool) -> Self {
        self.advantage = advantage;
        self.disadvantage = disadvantage;
        self
    }

    pub fn with_crit_range(mut self, crit_range: u32) -> Self {
        self.crit_range = crit_range;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// Result of an attack roll and any damage it dealt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackOutcome {
    pub natural_roll: u32,
    pub attack_bonus: i32,
    pub total_attack: i64,
    #[serde(rename = "targetAC")]
    pub target_ac: i32,
    pub hit: bool,
    pub critical: bool,
    pub critical_miss: bool,
    pub damage: i64,
    pub damage_breakdown: String,
    pub damage_rolls: Option<Vec<u32>>,
    pub attack_breakdown: String,
    pub context: String,
}

/// Resolve an attack: roll to hit, compare against AC, roll damage on a hit.
///
/// A natural 1 always misses. A natural roll at or above the critical range
/// always hits and doubles the damage dice; flat bonuses are added once.
pub fn resolve_attack<R: Roller + ?Sized>(
    roller: &mut R,
    params: &AttackParams,
) -> Result<AttackOutcome, DiceError> {
    let damage_dice = DiceNotation::parse(&params.damage_dice)?;
    let advantage = Advantage::from_flags(params.advantage, params.disadvantage);
    let crit_range = params.crit_range.clamp(MIN_CRIT_RANGE, NATURAL_MAX);

    let roll_context = match advantage {
        Advantage::Normal => params.context.clone(),
        Advantage::Advantage => format!("{} (with advantage)", params.context),
        Advantage::Disadvantage => format!("{} (with disadvantage)", params.context),
    };
    let attack_roll = roll_d20(roller, advantage, &roll_context);

    let natural_roll = attack_roll.natural();
    let total_attack = i64::from(natural_roll) + i64::from(params.attack_bonus);
    let critical_miss = natural_roll == 1;
    let critical = !critical_miss && natural_roll >= crit_range;
    let hit = if critical_miss {
        false
    } else if critical {
        true
    } else {
        total_attack >= i64::from(params.target_ac)
    };

    let attack_breakdown = format!(
        "1d20 ({natural_roll}) {} = {total_attack} vs AC {}",
        signed(i64::from(params.attack_bonus)),
        params.target_ac
    );

    let (damage, damage_breakdown, damage_rolls) = if hit {
        let (dice, label) = if critical {
            (damage_dice.doubled(), "Critical Damage")
        } else {
            (damage_dice, "Damage")
        };
        let roll = dice.roll(roller, label);
        let damage = roll.result + i64::from(params.damage_bonus);
        let mut breakdown = roll.breakdown.clone();
        if params.damage_bonus != 0 {
            breakdown.push_str(&format!(" {:+}", params.damage_bonus));
        }
        breakdown.push_str(&format!(" = {damage}"));
        (damage, breakdown, Some(roll.raw_rolls))
    } else {
        (0, String::new(), None)
    };

    Ok(AttackOutcome {
        natural_roll,
        attack_bonus: params.attack_bonus,
        total_attack,
        target_ac: params.target_ac,
        hit,
        critical,
        critical_miss,
        damage,
        damage_breakdown,
        damage_rolls,
        attack_breakdown,
        context: params.context.clone(),
    })
}

/// HP after taking damage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageResult {
    #[serde(rename = "previousHP")]
    pub previous_hp: i64,
    pub damage: i64,
    #[serde(rename = "newHP")]
    pub new_hp: i64,
    #[serde(rename = "maxHP")]
    pub max_hp: i64,
    pub is_dead: bool,
    pub is_bloodied: bool,
    pub hp_lost: i64,
    pub message: String,
}

/// Apply damage, flooring HP at zero.
///
/// Current HP outside `0..=max_hp` is clamped into range first.
pub fn apply_damage(current_hp: i64, max_hp: i64, damage: i64) -> DamageResult {
    let max_hp = max_hp.max(0);
    let current_hp = clamp_hp(current_hp, max_hp);
    let damage = damage.max(0);
    let new_hp = clamp_hp(current_hp.saturating_sub(damage), max_hp);

    let message = if new_hp == 0 {
        "Reduced to 0 HP!".to_string()
    } else {
        format!("HP: {current_hp} → {new_hp} ({damage} damage taken)")
    };

    DamageResult {
        previous_hp: current_hp,
        damage,
        new_hp,
        max_hp,
        is_dead: new_hp == 0,
        is_bloodied: is_bloodied(new_hp, max_hp),
        hp_lost: current_hp - new_hp,
        message,
    }
}

/// HP after healing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingResult {
    #[serde(rename = "previousHP")]
    pub previous_hp: i64,
    /// HP actually restored.
    pub healing: i64,
    #[serde(rename = "newHP")]
    pub new_hp: i64,
    #[serde(rename = "maxHP")]
    pub max_hp: i64,
    pub at_full_health: bool,
    pub overheal: i64,
    pub message: String,
}

/// Apply healing, capping HP at the maximum.
///
/// Current HP outside `0..=max_hp` is clamped into range first, so the
/// restored amount never exceeds what was asked for.
pub fn apply_healing(current_hp: i64, max_hp: i64, healing: i64) -> HealingResult {
    let max_hp = max_hp.max(0);
    let current_hp = clamp_hp(current_hp, max_hp);
    let healing = healing.max(0);
    let new_hp = clamp_hp(current_hp.saturating_add(healing), max_hp);
    let actual = new_hp - current_hp;

    HealingResult {
        previous_hp: current_hp,
        healing: actual,
        new_hp,
        max_hp,
        at_full_health: new_hp == max_hp,
        overheal: healing - actual,
        message: format!("HP: {current_hp} → {new_hp} (+{actual} HP restored)"),
    }
}

/// Result of an initiative roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiativeResult {
    pub roll: u32,
    pub dex_modifier: i32,
    pub total: i64,
    pub breakdown: String,
    pub advantage: bool,
}

/// Roll initiative: 1d20 plus the dexterity modifier.
pub fn roll_initiative<R: Roller + ?Sized>(
    roller: &mut R,
    dex_modifier: i32,
    advantage: bool,
) -> InitiativeResult {
    let mode = Advantage::from_flags(advantage, false);
    let natural = roll_d20(roller, mode, "Initiative").natural();
    let total = i64::from(natural) + i64::from(dex_modifier);

    InitiativeResult {
        roll: natural,
        dex_modifier,
        total,
        breakdown: format!(
            "1d20 ({natural}) {} = {total}",
            signed(i64::from(dex_modifier))
        ),
        advantage,
    }
}

/// Inputs to a saving throw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveParams {
    pub modifier: i32,
    pub dc: i32,
    pub advantage: bool,
    pub disadvantage: bool,
    pub save_name: String,
}

impl SaveParams {
    pub fn new(dc: i32) -> Self {
        Self {
            modifier: 0,
            dc,
            advantage: false,
            disadvantage: false,
            save_name: "Saving Throw".to_string(),
        }
    }

    pub fn with_modifier(mut self, modifier: i32) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn with_advantage(mut self, advantage: bool, disadvantage: bool) -> Self {
        self.advantage = advantage;
        self.disadvantage = disadvantage;
        self
    }

    pub fn with_save_name(mut self, name: impl Into<String>) -> Self {
        self.save_name = name.into();
        self
    }
}

/// Result of a saving throw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResult {
    pub roll: u32,
    pub modifier: i32,
    pub total: i64,
    pub dc: i32,
    pub success: bool,
    pub margin: i64,
    pub save_name: String,
    pub breakdown: String,
    pub message: String,
}

/// Resolve a saving throw: 1d20 plus modifier against a DC.
pub fn resolve_saving_throw<R: Roller + ?Sized>(roller: &mut R, params: &SaveParams) -> SaveResult {
    let mode = Advantage::from_flags(params.advantage, params.disadvantage);
    let natural = roll_d20(roller, mode, &params.save_name).natural();
    let total = i64::from(natural) + i64::from(params.modifier);
    let dc = i64::from(params.dc);
    let success = total >= dc;

    let message = if success {
        format!("Success! ({total} vs DC {dc})")
    } else {
        format!("Failure! ({total} vs DC {dc})")
    };

    SaveResult {
        roll: natural,
        modifier: params.modifier,
        total,
        dc: params.dc,
        success,
        margin: total - dc,
        save_name: params.save_name.clone(),
        breakdown: format!(
            "1d20 ({natural}) {} = {total} vs DC {dc}",
            signed(i64::from(params.modifier))
        ),
        message,
    }
}

/// Ability modifier for a score: `floor((score - 10) / 2)`.
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

fn clamp_hp(hp: i64, max_hp: i64) -> i64 {
    hp.min(max_hp).max(0)
}

fn is_bloodied(hp: i64, max_hp: i64) -> bool {
    hp > 0 && hp.saturating_mul(2) <= max_hp
}

/// `+ 3` / `- 2` for breakdown strings.
fn signed(value: i64) -> String {
    if value < 0 {
        format!("- {}", value.unsigned_abs())
    } else {
        format!("+ {value}")
    }
}
