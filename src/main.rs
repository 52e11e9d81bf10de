mod config;
mod store;

use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use shardlock_core::definition::BuildDefinition;
use shardlock_core::reconstruct::SolvedSnapshot;
use shardlock_core::{BuildPipeline, Primitives, ReconstructionEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Command, Config};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cfg = Config::parse();

    match cfg.command {
        Command::Build {
            definition,
            public_dir,
            solutions,
            workers,
        } => {
            store::ensure_private(&public_dir, &solutions)?;
            let def: BuildDefinition = store::read_json(&definition)?;
            let pipeline = BuildPipeline::new(Primitives::standard(), workers)?;

            let started = Instant::now();
            let output = pipeline
                .build_verified(&def)
                .context("build aborted, nothing written")?;
            info!(elapsed = ?started.elapsed(), "build verified");

            store::write_all(&public_dir, &solutions, &output.published, &output.solutions)?;
            println!(
                "Built {} tier(s) → {} (solutions → {})",
                output.published.tiers.len(),
                public_dir.display(),
                solutions.display()
            );
        }
        Command::Verify {
            definition,
            public_dir,
            workers,
        } => {
            let def: BuildDefinition = store::read_json(&definition)?;
            let published = store::load_published(&public_dir)?;
            let pipeline = BuildPipeline::new(Primitives::standard(), workers)?;
            pipeline.verify(&def, &published)?;
            println!("verify: OK ({} tier(s))", def.tiers.len());
        }
        Command::Commitments { public_dir, tier } => {
            let published = store::load_published(&public_dir)?;
            let commitments = published
                .commitments(&tier)
                .with_context(|| format!("unknown tier {tier}"))?;
            println!("{}", serde_json::to_string_pretty(&commitments)?);
        }
        Command::Reconstruct { public_dir, proofs } => {
            let published = store::load_published(&public_dir)?;
            let snapshot: SolvedSnapshot = store::read_json(&proofs)?;
            let engine = ReconstructionEngine::new(published, Primitives::standard());

            let recovered = engine.reconstruct_snapshot(&snapshot);
            let report: BTreeMap<&str, &str> = engine
                .artifacts()
                .tiers
                .keys()
                .map(|tier| {
                    let status = recovered.get(tier).map(String::as_str).unwrap_or("pending");
                    (tier.as_str(), status)
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
