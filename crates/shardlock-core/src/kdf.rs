//! Memory-hard key derivation and the published commitment.
//!
//! Each puzzle's share is encrypted under `Argon2d(identifier, salt)`. The
//! derivation is deliberately expensive and is the dominant cost of both the
//! build and the client; callers should schedule it as blocking work.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::ShardlockError;

pub const DERIVED_KEY_LEN: usize = 16;
pub const COMMITMENT_LEN: usize = 32;

/// 256 MiB, the production memory cost.
pub const DEFAULT_MEMORY_COST_KIB: u32 = 262_144;

/// Salts shorter than this are right-padded with `'0'`.
pub const MIN_SALT_LEN: usize = 8;

/// Per-tier tuning of the derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostParams {
    /// Argon2 passes over memory; the difficulty knob.
    pub time_cost: u32,
    /// Argon2 memory in KiB.
    pub memory_cost_kib: u32,
}

impl CostParams {
    pub fn new(time_cost: u32) -> Self {
        Self {
            time_cost,
            memory_cost_kib: DEFAULT_MEMORY_COST_KIB,
        }
    }
}

/// Output of the derivation; zeroised on drop.
#[derive(Clone)]
pub struct DerivedKey {
    inner: Zeroizing<[u8; DERIVED_KEY_LEN]>,
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; DERIVED_KEY_LEN]) -> Self {
        Self {
            inner: Zeroizing::new(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8; DERIVED_KEY_LEN] {
        &self.inner
    }

    /// Lowercase hex, the form that is hashed into the commitment.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.inner[..]))
    }

    pub fn commitment(&self) -> [u8; COMMITMENT_LEN] {
        commitment(self)
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Key derivation from an identifier and a salt.
pub trait KeyDerivationFunction: Send + Sync {
    fn derive(
        &self,
        identifier: &str,
        salt: &[u8],
        cost: CostParams,
    ) -> Result<DerivedKey, ShardlockError>;
}

/// Argon2d, version 0x13, one lane.
#[derive(Clone, Copy, Debug, Default)]
pub struct Argon2d;

impl KeyDerivationFunction for Argon2d {
    fn derive(
        &self,
        identifier: &str,
        salt: &[u8],
        cost: CostParams,
    ) -> Result<DerivedKey, ShardlockError> {
        let params = Params::new(
            cost.memory_cost_kib,
            cost.time_cost,
            1,
            Some(DERIVED_KEY_LEN),
        )
        .map_err(|e| ShardlockError::KeyDerivation(e.to_string()))?;
        let argon = Argon2::new(Algorithm::Argon2d, Version::V0x13, params);

        let mut out = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
        argon
            .hash_password_into(identifier.as_bytes(), salt, &mut out[..])
            .map_err(|e| ShardlockError::KeyDerivation(e.to_string()))?;
        Ok(DerivedKey { inner: out })
    }
}

/// Salt for a puzzle: its name, right-padded with `'0'` to [`MIN_SALT_LEN`].
///
/// Names are never truncated, so two puzzles in a tier must not share a name.
pub fn salt_for(name: &str) -> Vec<u8> {
    let mut salt = name.as_bytes().to_vec();
    if salt.len() < MIN_SALT_LEN {
        salt.resize(MIN_SALT_LEN, b'0');
    }
    salt
}

/// SHA-256 of the derived key's hex text. Safe to publish.
pub fn commitment(key: &DerivedKey) -> [u8; COMMITMENT_LEN] {
    Sha256::digest(key.to_hex().as_bytes()).into()
}
