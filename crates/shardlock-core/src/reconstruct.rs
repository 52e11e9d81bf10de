//! Client-side reconstruction from solved puzzles.
//!
//! The engine only reads published artifacts. Every call is a pure function
//! of its inputs: the same proofs always give the same [`Reconstruction`], so
//! callers may re-run it whenever their solved state changes and keep the
//! latest answer. Wrong proofs, missing shares and garbled plaintext all
//! collapse into [`Reconstruction::Pending`]; nothing here returns an error.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::artifacts::{CommitmentEntry, PublishedArtifacts, PuzzleArtifact, TierArtifact};
use crate::cipher::KEY_LEN;
use crate::identifier::Coordinate;
use crate::kdf::{salt_for, DerivedKey};
use crate::pipeline::Primitives;
use crate::sharing::Share;

/// What a player presents for a solved puzzle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Proof {
    /// The answer itself; mapped to an identifier with the tier's resolution.
    Location(Coordinate),
    /// An identifier the caller already computed.
    Identifier { identifier: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolvedProof {
    /// Share index of the puzzle (1-based).
    pub index: u8,
    pub proof: Proof,
}

/// One entry of the caller's solved-puzzles store, keyed by puzzle name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolvedEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    pub proof: Proof,
}

/// Snapshot of the caller's solved-puzzles store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SolvedSnapshot(pub BTreeMap<String, SolvedEntry>);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reconstruction {
    Recovered(String),
    Pending,
}

impl Reconstruction {
    pub fn secret(&self) -> Option<&str> {
        match self {
            Reconstruction::Recovered(s) => Some(s.as_str()),
            Reconstruction::Pending => None,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, Reconstruction::Recovered(_))
    }
}

/// Shares unlocked so far for one tier, in the order they were obtained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShareSet {
    tier: String,
    shares: Vec<Share>,
}

impl ShareSet {
    pub fn new(tier: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            shares: Vec::new(),
        }
    }

    pub fn tier(&self) -> &str {
        &self.tier
    }

    /// Add a share unless one with the same index is already present.
    pub fn insert(&mut self, share: Share) -> bool {
        if self.shares.iter().any(|s| s.index() == share.index()) {
            return false;
        }
        self.shares.push(share);
        true
    }

    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn indices(&self) -> Vec<u8> {
        self.shares.iter().map(Share::index).collect()
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }
}

#[derive(Clone)]
pub struct ReconstructionEngine {
    artifacts: Arc<PublishedArtifacts>,
    primitives: Primitives,
}

impl ReconstructionEngine {
    pub fn new(artifacts: PublishedArtifacts, primitives: Primitives) -> Self {
        Self {
            artifacts: Arc::new(artifacts),
            primitives,
        }
    }

    pub fn artifacts(&self) -> &PublishedArtifacts {
        &self.artifacts
    }

    pub fn commitments(&self, tier: &str) -> Option<Vec<CommitmentEntry>> {
        self.artifacts.commitments(tier)
    }

    fn puzzle(&self, tier: &str, index: u8) -> Option<(&TierArtifact, &PuzzleArtifact)> {
        let (tier, puzzles) = self.artifacts.tier(tier)?;
        let puzzle = puzzles.iter().find(|p| p.share_index == index)?;
        Some((tier, puzzle))
    }

    fn derive(&self, tier: &TierArtifact, puzzle: &PuzzleArtifact, proof: &Proof) -> Option<DerivedKey> {
        let identifier = match proof {
            Proof::Location(at) => self.primitives.mapper.identifier(at, tier.resolution),
            Proof::Identifier { identifier } => identifier.clone(),
        };
        self.primitives
            .kdf
            .derive(&identifier, &salt_for(&puzzle.name), tier.cost())
            .ok()
    }

    /// Whether `proof` matches the published commitment of puzzle `index`.
    pub fn check_guess(&self, tier: &str, index: u8, proof: &Proof) -> bool {
        let Some((tier, puzzle)) = self.puzzle(tier, index) else {
            return false;
        };
        self.derive(tier, puzzle, proof)
            .is_some_and(|key| key.commitment() == puzzle.commitment)
    }

    /// Decrypt the share of puzzle `index` with the key derived from `proof`.
    ///
    /// `None` when the padding is out of range or the plaintext is not a
    /// well-formed share for this index; a wrong key usually ends here.
    pub fn unlock_share(&self, tier: &str, index: u8, proof: &Proof) -> Option<Share> {
        let (tier, puzzle) = self.puzzle(tier, index)?;
        let key = self.derive(tier, puzzle, proof)?;
        let plain = self
            .primitives
            .cipher
            .decrypt(key.as_bytes(), &puzzle.share_iv, &puzzle.share_ciphertext)
            .ok()?;
        let share = Share::from_bytes(&plain).ok()?;
        (share.index() == index && share.value().len() == KEY_LEN).then_some(share)
    }

    /// Unlock every proof for `tier`. The first proof per index wins; proofs
    /// for indices the tier does not have are ignored.
    pub fn collect_shares(&self, tier: &str, proofs: &[SolvedProof]) -> ShareSet {
        let mut seen = BTreeSet::new();
        let unique: Vec<&SolvedProof> = proofs
            .iter()
            .filter(|p| self.puzzle(tier, p.index).is_some() && seen.insert(p.index))
            .collect();

        let unlocked: Vec<Option<Share>> = unique
            .par_iter()
            .map(|p| self.unlock_share(tier, p.index, &p.proof))
            .collect();

        let mut set = ShareSet::new(tier);
        for share in unlocked.into_iter().flatten() {
            set.insert(share);
        }
        debug!(tier, proofs = proofs.len(), unlocked = set.len(), "shares collected");
        set
    }

    /// Combine the first `threshold` shares of `set` and open the tier secret.
    pub fn combine(&self, set: &ShareSet) -> Reconstruction {
        let Some((tier, _)) = self.artifacts.tier(&set.tier) else {
            return Reconstruction::Pending;
        };
        let threshold = tier.threshold as usize;
        if set.len() < threshold {
            return Reconstruction::Pending;
        }

        let Ok(combined) = self.primitives.splitter.combine(&set.shares[..threshold]) else {
            return Reconstruction::Pending;
        };
        let Ok(key) = <[u8; KEY_LEN]>::try_from(combined.as_slice()) else {
            return Reconstruction::Pending;
        };
        let key = Zeroizing::new(key);

        let Ok(plain) =
            self.primitives
                .cipher
                .decrypt(&key, &tier.secret_iv, &tier.secret_ciphertext)
        else {
            return Reconstruction::Pending;
        };
        match String::from_utf8(plain.to_vec()) {
            Ok(secret) => Reconstruction::Recovered(secret),
            Err(err) => {
                err.into_bytes().zeroize();
                Reconstruction::Pending
            }
        }
    }

    pub fn reconstruct(&self, tier: &str, proofs: &[SolvedProof]) -> Reconstruction {
        let Some((artifact, _)) = self.artifacts.tier(tier) else {
            return Reconstruction::Pending;
        };
        let distinct: BTreeSet<u8> = proofs.iter().map(|p| p.index).collect();
        if distinct.len() < artifact.threshold as usize {
            return Reconstruction::Pending;
        }
        let set = self.collect_shares(tier, proofs);
        self.combine(&set)
    }

    /// Reconstruct every tier reachable from a name-keyed snapshot.
    ///
    /// Entries without a tier are attributed to the tier that owns a puzzle
    /// of that name; unknown names are skipped. Only recovered tiers appear
    /// in the result.
    pub fn reconstruct_snapshot(&self, snapshot: &SolvedSnapshot) -> BTreeMap<String, String> {
        let mut by_tier: BTreeMap<&str, Vec<SolvedProof>> = BTreeMap::new();
        for (name, entry) in &snapshot.0 {
            let tier = match entry.tier.as_deref() {
                Some(tier) => tier,
                None => match self.artifacts.tier_of(name) {
                    Some(tier) => tier,
                    None => continue,
                },
            };
            let Some((_, puzzles)) = self.artifacts.tier(tier) else {
                continue;
            };
            let Some(puzzle) = puzzles.iter().find(|p| &p.name == name) else {
                continue;
            };
            by_tier.entry(tier).or_default().push(SolvedProof {
                index: puzzle.share_index,
                proof: entry.proof.clone(),
            });
        }

        // Snapshot keys are sorted by name; order proofs by share index so the
        // shares that get combined do not depend on how puzzles are named.
        by_tier
            .into_par_iter()
            .filter_map(|(tier, mut proofs)| {
                proofs.sort_by_key(|p| p.index);
                match self.reconstruct(tier, &proofs) {
                    Reconstruction::Recovered(secret) => Some((tier.to_string(), secret)),
                    Reconstruction::Pending => None,
                }
            })
            .collect()
    }
}
