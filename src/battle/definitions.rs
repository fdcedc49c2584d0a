//! Class, skill and status-effect definitions loaded from TOML
//!
//! Definitions are data, keyed by string id. A unit refers to its class by
//! id and carries skill ids in its slots; nothing here is per-battle state.

use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::battle::constants::DEFAULT_ATTACK_RANGE;
use crate::battle::dice::DiceSpec;
use crate::core::error::Result;

/// Which stat feeds the flat damage bonus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    #[default]
    Physical,
    Magic,
}

/// Class-specific basic behaviour used when no skill fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    /// Walk to the most wounded reachable opponent and hit it
    #[default]
    MeleeSeeker,
    /// Never moves; hits whatever is already in range
    Holder,
}

fn default_attack_range() -> u32 {
    DEFAULT_ATTACK_RANGE
}

fn default_modifier() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Set from the table key on load
    #[serde(default)]
    pub id: String,
    pub move_range: u32,
    #[serde(default = "default_attack_range")]
    pub attack_range: u32,
    #[serde(default)]
    pub attack_dice: DiceSpec,
    #[serde(default)]
    pub damage_type: DamageType,
    #[serde(default)]
    pub behavior: BehaviorKind,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ClassDef {
    pub fn new(id: &str, move_range: u32) -> Self {
        Self {
            id: id.to_string(),
            move_range,
            attack_range: DEFAULT_ATTACK_RANGE,
            attack_dice: DiceSpec::default(),
            damage_type: DamageType::Physical,
            behavior: BehaviorKind::MeleeSeeker,
            skills: Vec::new(),
            tags: Vec::new(),
        }
    }
}

/// Who a buff lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuffTarget {
    #[default]
    #[serde(rename = "self")]
    SelfUnit,
    /// Living ally with the lowest hp within range (self when alone)
    WeakestAlly,
}

/// Continuous passive formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassiveKind {
    /// Less incoming damage the more hp is already lost
    HpLossReduction,
}

/// What a skill does, one variant per category
///
/// Only active and buff skills take part in the per-turn skill roll.
/// Debuff and reaction skills fire from events; passives are evaluated
/// continuously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum SkillEffect {
    Active {
        dice: DiceSpec,
        #[serde(default)]
        damage_type: DamageType,
        #[serde(default = "default_attack_range")]
        range: u32,
        #[serde(default = "default_modifier")]
        damage_modifier: f32,
        #[serde(default)]
        apply_status: Option<String>,
    },
    Buff {
        status: String,
        #[serde(default)]
        target: BuffTarget,
        #[serde(default = "default_attack_range")]
        range: u32,
    },
    Debuff {
        status: String,
        /// Base chance in percent
        chance: f32,
        /// Extra percent per point of attacker luck
        #[serde(default)]
        luck_scaling: f32,
    },
    Reaction {
        /// Chance in percent
        chance: f32,
        #[serde(default = "default_modifier")]
        damage_modifier: f32,
    },
    Passive {
        kind: PassiveKind,
        #[serde(default)]
        max_reduction: f32,
    },
}

impl SkillEffect {
    /// Skills that compete in the per-turn probability roll
    pub fn is_rollable(&self) -> bool {
        matches!(self, SkillEffect::Active { .. } | SkillEffect::Buff { .. })
    }

    pub fn category(&self) -> &'static str {
        match self {
            SkillEffect::Active { .. } => "active",
            SkillEffect::Buff { .. } => "buff",
            SkillEffect::Debuff { .. } => "debuff",
            SkillEffect::Reaction { .. } => "reaction",
            SkillEffect::Passive { .. } => "passive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Activation chance in percent (rollable categories only)
    #[serde(default)]
    pub probability: f32,
    #[serde(default)]
    pub required_tags: Vec<String>,
    pub effect: SkillEffect,
}

impl SkillDef {
    pub fn new(id: &str, probability: f32, effect: SkillEffect) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            probability,
            required_tags: Vec::new(),
            effect,
        }
    }

    /// Does a unit with `tags` satisfy this skill's requirements?
    pub fn usable_with(&self, tags: &[String]) -> bool {
        self.required_tags.iter().all(|req| tags.contains(req))
    }
}

/// What an active status effect does to its carrier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusPayload {
    /// Unit cannot act
    Disable,
    /// Multiplies the carrier's outgoing damage
    AttackModifier { multiplier: f32 },
    /// Fixed damage at the carrier's start of turn
    DamageOverTime { amount: i32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectDef {
    #[serde(default)]
    pub id: String,
    /// Turns the effect lasts; -1 means until explicitly removed
    pub duration: i32,
    pub payload: StatusPayload,
}

impl StatusEffectDef {
    pub fn new(id: &str, duration: i32, payload: StatusPayload) -> Self {
        Self {
            id: id.to_string(),
            duration,
            payload,
        }
    }
}

/// All definitions a battle consumes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definitions {
    #[serde(default)]
    pub classes: AHashMap<String, ClassDef>,
    #[serde(default)]
    pub skills: AHashMap<String, SkillDef>,
    #[serde(default)]
    pub statuses: AHashMap<String, StatusEffectDef>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse definitions from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut defs: Definitions = toml::from_str(content)?;
        defs.assign_ids();
        Ok(defs)
    }

    /// Load definitions from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Table keys are the ids; copy them into the records
    fn assign_ids(&mut self) {
        for (id, class) in self.classes.iter_mut() {
            class.id = id.clone();
        }
        for (id, skill) in self.skills.iter_mut() {
            skill.id = id.clone();
            if skill.name.is_empty() {
                skill.name = id.clone();
            }
        }
        for (id, status) in self.statuses.iter_mut() {
            status.id = id.clone();
        }
    }

    pub fn insert_class(&mut self, class: ClassDef) {
        self.classes.insert(class.id.clone(), class);
    }

    pub fn insert_skill(&mut self, skill: SkillDef) {
        self.skills.insert(skill.id.clone(), skill);
    }

    pub fn insert_status(&mut self, status: StatusEffectDef) {
        self.statuses.insert(status.id.clone(), status);
    }

    /// Look up a class, logging when it is missing
    pub fn class(&self, id: &str) -> Option<&ClassDef> {
        let found = self.classes.get(id);
        if found.is_none() {
            tracing::warn!("Missing class definition '{}'", id);
        }
        found
    }

    /// Look up a skill, logging when it is missing
    pub fn skill(&self, id: &str) -> Option<&SkillDef> {
        let found = self.skills.get(id);
        if found.is_none() {
            tracing::warn!("Missing skill definition '{}'", id);
        }
        found
    }

    /// Look up a status effect, logging when it is missing
    pub fn status(&self, id: &str) -> Option<&StatusEffectDef> {
        let found = self.statuses.get(id);
        if found.is_none() {
            tracing::warn!("Missing status effect definition '{}'", id);
        }
        found
    }

    /// Cross references that point at nothing, as readable messages
    ///
    /// These are not fatal: a dangling skill simply never fires.
    pub fn dangling_references(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for class in self.classes.values() {
            for skill in &class.skills {
                if !self.skills.contains_key(skill) {
                    problems.push(format!("class '{}' lists unknown skill '{}'", class.id, skill));
                }
            }
        }

        for skill in self.skills.values() {
            let status = match &skill.effect {
                SkillEffect::Active { apply_status, .. } => apply_status.as_deref(),
                SkillEffect::Buff { status, .. } | SkillEffect::Debuff { status, .. } => {
                    Some(status.as_str())
                }
                SkillEffect::Reaction { .. } | SkillEffect::Passive { .. } => None,
            };
            if let Some(status) = status {
                if !self.statuses.contains_key(status) {
                    problems.push(format!(
                        "skill '{}' refers to unknown status '{}'",
                        skill.id, status
                    ));
                }
            }
        }

        problems.sort();
        problems
    }
}
