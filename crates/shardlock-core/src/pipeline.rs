//! Offline build: definitions in, public artifacts and private solutions out.
//!
//! Per tier a random key encrypts the secret and is split into one share per
//! puzzle; each share is encrypted under the key derived from that puzzle's
//! solution. All derivations run on a dedicated rayon pool. Nothing is
//! written here; the caller persists [`BuildOutput`] once the whole build,
//! including [`BuildPipeline::verify`], has succeeded.

use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::artifacts::{PrivateSolutions, PublishedArtifacts, PuzzleArtifact, SolutionRecord, TierArtifact};
use crate::cipher::{Aes128Cbc, Cipher, KEY_LEN};
use crate::definition::{BuildDefinition, TierDefinition};
use crate::error::ShardlockError;
use crate::identifier::{H3Cells, IdentifierMapper};
use crate::kdf::{salt_for, Argon2d, KeyDerivationFunction};
use crate::reconstruct::{Proof, Reconstruction, ReconstructionEngine, SolvedProof};
use crate::sharing::{Shamir, Splitter};

/// The four primitives, composed once and shared by build and reconstruction.
#[derive(Clone)]
pub struct Primitives {
    pub mapper: Arc<dyn IdentifierMapper>,
    pub kdf: Arc<dyn KeyDerivationFunction>,
    pub cipher: Arc<dyn Cipher>,
    pub splitter: Arc<dyn Splitter>,
}

impl Primitives {
    /// H3 cells, Argon2d, AES-128-CBC, Shamir over GF(256).
    pub fn standard() -> Self {
        Self {
            mapper: Arc::new(H3Cells),
            kdf: Arc::new(Argon2d),
            cipher: Arc::new(Aes128Cbc),
            splitter: Arc::new(Shamir),
        }
    }
}

impl Default for Primitives {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Clone, Debug)]
pub struct BuildOutput {
    pub published: PublishedArtifacts,
    pub solutions: PrivateSolutions,
}

struct TierOutput {
    tier: TierArtifact,
    puzzles: Vec<PuzzleArtifact>,
    solutions: Vec<SolutionRecord>,
}

pub struct BuildPipeline {
    primitives: Primitives,
    pool: ThreadPool,
}

impl BuildPipeline {
    /// `workers` bounds concurrent derivations; 0 means one per hardware thread.
    pub fn new(primitives: Primitives, workers: usize) -> Result<Self, ShardlockError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("shardlock-kdf-{i}"))
            .build()
            .map_err(|e| ShardlockError::WorkerPool(e.to_string()))?;
        Ok(Self { primitives, pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn primitives(&self) -> &Primitives {
        &self.primitives
    }

    /// Validate `definition` and produce every artifact.
    pub fn build(&self, definition: &BuildDefinition) -> Result<BuildOutput, ShardlockError> {
        definition.validate()?;
        info!(
            tiers = definition.tiers.len(),
            workers = self.workers(),
            "building artifacts"
        );

        let tiers: Vec<(String, TierOutput)> = self.pool.install(|| {
            definition
                .tiers
                .par_iter()
                .map(|(name, tier)| self.build_tier(name, tier).map(|out| (name.clone(), out)))
                .collect::<Result<Vec<_>, ShardlockError>>()
        })?;

        let mut output = BuildOutput {
            published: PublishedArtifacts::default(),
            solutions: PrivateSolutions::default(),
        };
        for (name, tier) in tiers {
            output.published.tiers.insert(name.clone(), tier.tier);
            output.published.puzzles.insert(name.clone(), tier.puzzles);
            output.solutions.0.insert(name, tier.solutions);
        }
        Ok(output)
    }

    fn build_tier(&self, name: &str, def: &TierDefinition) -> Result<TierOutput, ShardlockError> {
        let p = &self.primitives;
        let n = def.puzzles.len() as u8;
        info!(
            tier = name,
            puzzles = n,
            threshold = def.threshold,
            resolution = %def.resolution,
            cost = def.cost_param,
            "processing tier"
        );

        let mut secret_key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(secret_key.as_mut_slice());
        let sealed_secret = p.cipher.encrypt(&secret_key, def.secret.as_bytes());
        let shares = p.splitter.split(secret_key.as_slice(), n, def.threshold)?;
        let cost = def.cost();

        let locked: Vec<(PuzzleArtifact, SolutionRecord)> = def
            .puzzles
            .par_iter()
            .zip(shares.par_iter())
            .map(|(puzzle, share)| -> Result<(PuzzleArtifact, SolutionRecord), ShardlockError> {
                let identifier = p.mapper.identifier(&puzzle.solution, def.resolution);
                let key = p.kdf.derive(&identifier, &salt_for(&puzzle.name), cost)?;
                let share_bytes = share.to_bytes();
                let sealed_share = p.cipher.encrypt(key.as_bytes(), &share_bytes);
                debug!(tier = name, puzzle = %puzzle.name, index = share.index(), "share locked");

                Ok((
                    PuzzleArtifact {
                        name: puzzle.name.clone(),
                        commitment: key.commitment(),
                        share_index: share.index(),
                        share_iv: sealed_share.iv,
                        share_ciphertext: sealed_share.ciphertext,
                    },
                    SolutionRecord {
                        name: puzzle.name.clone(),
                        solution_input: puzzle.solution,
                        identifier,
                        derived_key: *key.as_bytes(),
                        share_index: share.index(),
                        share: share_bytes.to_vec(),
                    },
                ))
            })
            .collect::<Result<_, _>>()?;
        let (puzzles, solutions): (Vec<_>, Vec<_>) = locked.into_iter().unzip();

        Ok(TierOutput {
            tier: TierArtifact {
                threshold: def.threshold,
                resolution: def.resolution,
                cost_param: def.cost_param,
                memory_cost: def.memory_cost,
                secret_iv: sealed_secret.iv,
                secret_ciphertext: sealed_secret.ciphertext,
            },
            puzzles,
            solutions,
        })
    }

    /// Recover every tier's secret from `published` through the client path,
    /// using the first `threshold` solutions, and compare with `definition`.
    pub fn verify(
        &self,
        definition: &BuildDefinition,
        published: &PublishedArtifacts,
    ) -> Result<(), ShardlockError> {
        let engine = ReconstructionEngine::new(published.clone(), self.primitives.clone());
        let fail = |tier: &str, reason: &str| ShardlockError::Verification {
            tier: tier.to_string(),
            reason: reason.to_string(),
        };

        self.pool.install(|| {
            definition.tiers.par_iter().try_for_each(|(name, def)| {
                let (tier, puzzles) = published
                    .tier(name)
                    .ok_or_else(|| fail(name.as_str(), "tier missing from artifacts"))?;
                if tier.threshold != def.threshold || puzzles.len() != def.puzzles.len() {
                    return Err(fail(name.as_str(), "tier parameters differ from definition"));
                }
                for (i, (puzzle, expected)) in puzzles.iter().zip(&def.puzzles).enumerate() {
                    if puzzle.name != expected.name || puzzle.share_index as usize != i + 1 {
                        return Err(fail(name.as_str(), "puzzle order or share index mismatch"));
                    }
                }

                let proofs: Vec<SolvedProof> = def
                    .puzzles
                    .iter()
                    .zip(puzzles)
                    .take(def.threshold as usize)
                    .map(|(solution, puzzle)| SolvedProof {
                        index: puzzle.share_index,
                        proof: Proof::Location(solution.solution),
                    })
                    .collect();

                match engine.reconstruct(name, &proofs) {
                    Reconstruction::Recovered(secret) if secret == def.secret => {
                        info!(tier = name.as_str(), "self-verification passed");
                        Ok(())
                    }
                    Reconstruction::Recovered(_) => {
                        warn!(tier = name.as_str(), "recovered secret differs");
                        Err(fail(name.as_str(), "recovered secret differs"))
                    }
                    Reconstruction::Pending => {
                        warn!(tier = name.as_str(), "secret not recovered");
                        Err(fail(name.as_str(), "secret not recovered"))
                    }
                }
            })
        })
    }

    /// [`build`](Self::build) followed by [`verify`](Self::verify).
    pub fn build_verified(&self, definition: &BuildDefinition) -> Result<BuildOutput, ShardlockError> {
        let output = self.build(definition)?;
        self.verify(definition, &output.published)?;
        Ok(output)
    }
}
