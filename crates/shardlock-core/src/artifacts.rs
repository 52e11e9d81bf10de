//! Build outputs: the public tier and puzzle collections and the private
//! solutions record. Byte fields are lowercase hex in JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cipher::IV_LEN;
use crate::identifier::{Coordinate, Resolution};
use crate::kdf::{CostParams, COMMITMENT_LEN, DEFAULT_MEMORY_COST_KIB, DERIVED_KEY_LEN};

/// Public per-tier parameters and the encrypted secret.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TierArtifact {
    pub threshold: u8,
    pub resolution: Resolution,
    /// Argon2 time cost.
    pub cost_param: u32,
    #[serde(default = "default_memory_cost")]
    pub memory_cost: u32,
    #[serde(with = "hex::serde")]
    pub secret_iv: [u8; IV_LEN],
    #[serde(with = "hex::serde")]
    pub secret_ciphertext: Vec<u8>,
}

impl TierArtifact {
    pub fn cost(&self) -> CostParams {
        CostParams {
            time_cost: self.cost_param,
            memory_cost_kib: self.memory_cost,
        }
    }
}

fn default_memory_cost() -> u32 {
    DEFAULT_MEMORY_COST_KIB
}

/// Public per-puzzle entry: the commitment and the locked share.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleArtifact {
    pub name: String,
    #[serde(with = "hex::serde")]
    pub commitment: [u8; COMMITMENT_LEN],
    pub share_index: u8,
    #[serde(with = "hex::serde")]
    pub share_iv: [u8; IV_LEN],
    #[serde(with = "hex::serde")]
    pub share_ciphertext: Vec<u8>,
}

/// What a client needs to compare a guess before paying for decryption.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitmentEntry {
    pub name: String,
    #[serde(with = "hex::serde")]
    pub commitment: [u8; COMMITMENT_LEN],
}

/// Everything that may be served publicly.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishedArtifacts {
    pub tiers: BTreeMap<String, TierArtifact>,
    pub puzzles: BTreeMap<String, Vec<PuzzleArtifact>>,
}

impl PublishedArtifacts {
    pub fn tier(&self, name: &str) -> Option<(&TierArtifact, &[PuzzleArtifact])> {
        let tier = self.tiers.get(name)?;
        let puzzles = self.puzzles.get(name)?;
        Some((tier, puzzles.as_slice()))
    }

    /// Tier owning the puzzle called `puzzle`, if any.
    pub fn tier_of(&self, puzzle: &str) -> Option<&str> {
        self.puzzles
            .iter()
            .find(|(_, list)| list.iter().any(|p| p.name == puzzle))
            .map(|(tier, _)| tier.as_str())
    }

    pub fn commitments(&self, tier: &str) -> Option<Vec<CommitmentEntry>> {
        let puzzles = self.puzzles.get(tier)?;
        Some(
            puzzles
                .iter()
                .map(|p| CommitmentEntry {
                    name: p.name.clone(),
                    commitment: p.commitment,
                })
                .collect(),
        )
    }
}

/// Audit entry for one puzzle. Never published.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolutionRecord {
    pub name: String,
    pub solution_input: Coordinate,
    pub identifier: String,
    #[serde(with = "hex::serde")]
    pub derived_key: [u8; DERIVED_KEY_LEN],
    pub share_index: u8,
    /// Share in wire form (`value || index`).
    #[serde(with = "hex::serde")]
    pub share: Vec<u8>,
}

/// Tier name → solutions in share-index order.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct PrivateSolutions(pub BTreeMap<String, Vec<SolutionRecord>>);

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tier() -> TierArtifact {
        TierArtifact {
            threshold: 2,
            resolution: Resolution::try_from(7).expect("resolution"),
            cost_param: 3,
            memory_cost: 1024,
            secret_iv: [0xaa; IV_LEN],
            secret_ciphertext: vec![0x01, 0x02],
        }
    }

    #[test]
    fn tier_uses_camel_case_and_hex() {
        let json = serde_json::to_value(sample_tier()).expect("json");
        assert_eq!(json["threshold"], 2);
        assert_eq!(json["resolution"], 7);
        assert_eq!(json["costParam"], 3);
        assert_eq!(json["secretIv"], "aa".repeat(IV_LEN));
        assert_eq!(json["secretCiphertext"], "0102");
    }

    #[test]
    fn memory_cost_defaults_when_absent() {
        let json = format!(
            r#"{{"threshold":1,"resolution":5,"costParam":2,"secretIv":"{}","secretCiphertext":"00"}}"#,
            "00".repeat(IV_LEN)
        );
        let tier: TierArtifact = serde_json::from_str(&json).expect("parse");
        assert_eq!(tier.cost().memory_cost_kib, DEFAULT_MEMORY_COST_KIB);
        assert_eq!(tier.cost().time_cost, 2);
    }

    #[test]
    fn rejects_short_iv_and_bad_resolution() {
        let short = r#"{"threshold":1,"resolution":5,"costParam":2,"secretIv":"00","secretCiphertext":"00"}"#;
        assert!(serde_json::from_str::<TierArtifact>(short).is_err());

        let bad_res = format!(
            r#"{{"threshold":1,"resolution":16,"costParam":2,"secretIv":"{}","secretCiphertext":"00"}}"#,
            "00".repeat(IV_LEN)
        );
        assert!(serde_json::from_str::<TierArtifact>(&bad_res).is_err());
    }

    #[test]
    fn finds_tier_by_puzzle_name() {
        let mut published = PublishedArtifacts::default();
        published.tiers.insert("easy".into(), sample_tier());
        published.puzzles.insert(
            "easy".into(),
            vec![PuzzleArtifact {
                name: "harbour".into(),
                commitment: [0x11; COMMITMENT_LEN],
                share_index: 1,
                share_iv: [0; IV_LEN],
                share_ciphertext: vec![0; 32],
            }],
        );
        assert_eq!(published.tier_of("harbour"), Some("easy"));
        assert_eq!(published.tier_of("missing"), None);
        let commitments = published.commitments("easy").expect("tier");
        assert_eq!(commitments[0].name, "harbour");
        assert!(published.commitments("hard").is_none());
    }
}
