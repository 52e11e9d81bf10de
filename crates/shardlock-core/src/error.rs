use thiserror::Error;

/// Canonical error type exposed by the core primitives.
#[derive(Debug, Error)]
pub enum ShardlockError {
    /// Input definitions are unusable; the build must not start.
    #[error("invalid definition for tier {tier}: {reason}")]
    Definition { tier: String, reason: String },

    /// Threshold outside `1..=shares`, or share count outside `1..=255`.
    #[error("invalid threshold {threshold} for {shares} shares")]
    InvalidThreshold { threshold: usize, shares: usize },

    /// Share material that cannot be split or combined.
    #[error("share error: {0}")]
    Share(&'static str),

    /// Ciphertext or padding that cannot be decoded under the given key.
    #[error("decryption failure: {0}")]
    Decryption(&'static str),

    /// Argon2 rejected its parameters or failed to hash.
    #[error("key derivation failure: {0}")]
    KeyDerivation(String),

    /// Latitude or longitude is not a finite number.
    #[error("invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },

    /// Discretization level outside the supported range.
    #[error("invalid resolution {0}")]
    InvalidResolution(u8),

    /// The build worker pool could not be started.
    #[error("worker pool error: {0}")]
    WorkerPool(String),

    /// Round-trip check of freshly built artifacts did not recover the secret.
    #[error("self-verification failed for tier {tier}: {reason}")]
    Verification { tier: String, reason: String },
}
