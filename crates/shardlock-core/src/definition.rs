//! Build inputs: per-tier secrets, thresholds and puzzle solutions.
//!
//! This file is private to the operator. It holds every secret and every
//! answer in the clear.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ShardlockError;
use crate::identifier::{Coordinate, Resolution};
use crate::kdf::{CostParams, DEFAULT_MEMORY_COST_KIB};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PuzzleDefinition {
    pub name: String,
    #[serde(flatten)]
    pub solution: Coordinate,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TierDefinition {
    pub threshold: u8,
    pub resolution: Resolution,
    pub cost_param: u32,
    #[serde(default = "default_memory_cost")]
    pub memory_cost: u32,
    pub secret: String,
    /// Share indices follow this order, starting at 1.
    pub puzzles: Vec<PuzzleDefinition>,
}

fn default_memory_cost() -> u32 {
    DEFAULT_MEMORY_COST_KIB
}

impl TierDefinition {
    pub fn cost(&self) -> CostParams {
        CostParams {
            time_cost: self.cost_param,
            memory_cost_kib: self.memory_cost,
        }
    }

    pub fn validate(&self, tier: &str) -> Result<(), ShardlockError> {
        let fail = |reason: String| ShardlockError::Definition {
            tier: tier.to_string(),
            reason,
        };

        if self.puzzles.is_empty() {
            return Err(fail("no puzzles".into()));
        }
        if self.puzzles.len() > u8::MAX as usize {
            return Err(fail(format!(
                "{} puzzles, at most {} are supported",
                self.puzzles.len(),
                u8::MAX
            )));
        }
        if self.threshold == 0 || self.threshold as usize > self.puzzles.len() {
            return Err(fail(format!(
                "threshold {} outside 1..={}",
                self.threshold,
                self.puzzles.len()
            )));
        }
        if self.cost_param == 0 {
            return Err(fail("costParam must be at least 1".into()));
        }

        let mut seen = BTreeSet::new();
        for puzzle in &self.puzzles {
            if puzzle.name.is_empty() {
                return Err(fail("puzzle with an empty name".into()));
            }
            if !seen.insert(puzzle.name.as_str()) {
                return Err(fail(format!("duplicate puzzle name {:?}", puzzle.name)));
            }
        }
        Ok(())
    }
}

/// Tier name → definition.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct BuildDefinition {
    pub tiers: BTreeMap<String, TierDefinition>,
}

impl BuildDefinition {
    pub fn validate(&self) -> Result<(), ShardlockError> {
        if self.tiers.is_empty() {
            return Err(ShardlockError::Definition {
                tier: "*".into(),
                reason: "no tiers defined".into(),
            });
        }
        self.tiers
            .iter()
            .try_for_each(|(name, tier)| tier.validate(name))
    }
}
