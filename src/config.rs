use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "shardlock", version, about = "Threshold-locked secrets behind puzzle proofs")]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build, self-verify and publish artifacts
    Build {
        /// Private tier/puzzle definitions (secrets and answers)
        #[arg(long, env = "SHARDLOCK_DEFINITION", default_value = "puzzles.json")]
        definition: PathBuf,

        /// Directory served to clients (levels.json, challs.json)
        #[arg(long, env = "SHARDLOCK_PUBLIC_DIR", default_value = "static")]
        public_dir: PathBuf,

        /// Private solutions record; must live outside the public directory
        #[arg(long, env = "SHARDLOCK_SOLUTIONS", default_value = "solutions.json")]
        solutions: PathBuf,

        /// Concurrent key derivations (0 = one per hardware thread)
        #[arg(long, env = "SHARDLOCK_WORKERS", default_value = "0")]
        workers: usize,
    },

    /// Re-run self-verification against published artifacts
    Verify {
        #[arg(long, env = "SHARDLOCK_DEFINITION", default_value = "puzzles.json")]
        definition: PathBuf,

        #[arg(long, env = "SHARDLOCK_PUBLIC_DIR", default_value = "static")]
        public_dir: PathBuf,

        #[arg(long, env = "SHARDLOCK_WORKERS", default_value = "0")]
        workers: usize,
    },

    /// Print the published commitments of a tier
    Commitments {
        #[arg(long, env = "SHARDLOCK_PUBLIC_DIR", default_value = "static")]
        public_dir: PathBuf,

        #[arg(long, env = "SHARDLOCK_TIER")]
        tier: String,
    },

    /// Recover tier secrets from a snapshot of solved puzzles
    Reconstruct {
        #[arg(long, env = "SHARDLOCK_PUBLIC_DIR", default_value = "static")]
        public_dir: PathBuf,

        /// JSON object: puzzle name -> {"tier"?, "proof": {lat, lng} | {identifier}}
        #[arg(long, env = "SHARDLOCK_PROOFS")]
        proofs: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_and_proofs_fall_back_to_environment() {
        std::env::set_var("SHARDLOCK_TIER", "easy");
        std::env::set_var("SHARDLOCK_PROOFS", "solved.json");

        let cfg = Config::try_parse_from(["shardlock", "commitments"]).expect("commitments");
        match cfg.command {
            Command::Commitments { tier, .. } => assert_eq!(tier, "easy"),
            other => panic!("unexpected command {other:?}"),
        }

        let cfg = Config::try_parse_from(["shardlock", "reconstruct"]).expect("reconstruct");
        match cfg.command {
            Command::Reconstruct { proofs, .. } => assert_eq!(proofs, PathBuf::from("solved.json")),
            other => panic!("unexpected command {other:?}"),
        }

        let cfg = Config::try_parse_from(["shardlock", "commitments", "--tier", "hard"]).expect("flag");
        match cfg.command {
            Command::Commitments { tier, .. } => assert_eq!(tier, "hard"),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
