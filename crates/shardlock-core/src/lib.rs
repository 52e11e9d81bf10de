//! Core primitives for shardlock.
//!
//! A tier secret is encrypted under a random key, the key is split into one
//! Shamir share per puzzle, and each share is locked behind a key derived from
//! that puzzle's solution. The crate exposes the building blocks and the two
//! orchestrators that compose them:
//!
//! * [`identifier`]: maps a puzzle solution (a coordinate) to a stable cell id.
//! * [`kdf`]: memory-hard Argon2d derivation plus the published commitment.
//! * [`cipher`]: AES-128-CBC with explicit padding and a fresh IV per call.
//! * [`sharing`]: (t, n) Shamir secret sharing over GF(256).
//! * [`pipeline`]: the offline build producing public artifacts.
//! * [`reconstruct`]: the client-side inverse, from proofs to the secret.
//!
//! Every primitive sits behind a trait so [`Primitives`] can be composed with
//! alternative implementations in tests or other deployments.

pub mod artifacts;
pub mod cipher;
pub mod definition;
pub mod identifier;
pub mod kdf;
pub mod pipeline;
pub mod reconstruct;
pub mod sharing;

mod error;

pub use error::ShardlockError;
pub use pipeline::{BuildOutput, BuildPipeline, Primitives};
pub use reconstruct::{Proof, Reconstruction, ReconstructionEngine, ShareSet, SolvedProof};
