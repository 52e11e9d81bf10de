//! Artifact files on disk.
//!
//! Every file is first written to a temp file next to its destination. The
//! temp files are then moved into place one by one, with any file they
//! replace set aside. If a move fails, the files already placed are removed
//! and the set-aside ones put back, so a failed build leaves the previous
//! artifact set (or nothing) behind.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use shardlock_core::artifacts::{PrivateSolutions, PublishedArtifacts};
use tempfile::{NamedTempFile, TempPath};
use tracing::warn;

pub const TIERS_FILE: &str = "levels.json";
pub const PUZZLES_FILE: &str = "challs.json";

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
}

pub fn load_published(public_dir: &Path) -> Result<PublishedArtifacts> {
    Ok(PublishedArtifacts {
        tiers: read_json(&public_dir.join(TIERS_FILE))?,
        puzzles: read_json(&public_dir.join(PUZZLES_FILE))?,
    })
}

/// Absolute form of `path` with its existing ancestors resolved.
fn resolve(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }
    let mut resolved = fs::canonicalize(existing)
        .with_context(|| format!("resolve {}", existing.display()))?;
    resolved.extend(rest.iter().rev());
    Ok(resolved)
}

/// Refuse to place the private record where clients could fetch it.
pub fn ensure_private(public_dir: &Path, solutions: &Path) -> Result<()> {
    let public = resolve(public_dir)?;
    let private = resolve(solutions)?;
    if private.starts_with(&public) {
        bail!(
            "solutions path {} is inside the public directory {}",
            solutions.display(),
            public_dir.display()
        );
    }
    Ok(())
}

fn parent_dir(dest: &Path) -> PathBuf {
    match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn stage<T: Serialize>(dest: &Path, value: &T) -> Result<(NamedTempFile, PathBuf)> {
    let dir = parent_dir(dest);
    fs::create_dir_all(&dir).with_context(|| format!("mkdir {}", dir.display()))?;
    let mut tmp = NamedTempFile::new_in(&dir)
        .with_context(|| format!("temp file in {}", dir.display()))?;
    let json = serde_json::to_vec_pretty(value)?;
    tmp.write_all(&json)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    Ok((tmp, dest.to_path_buf()))
}

/// Move whatever sits at `dest` to a temp path in the same directory.
///
/// The returned path is deleted on drop, which discards the old contents
/// once the new set is fully in place.
fn set_aside(dest: &Path) -> Result<Option<TempPath>> {
    if fs::symlink_metadata(dest).is_err() {
        return Ok(None);
    }
    let previous = tempfile::Builder::new()
        .prefix(".shardlock-prev")
        .tempfile_in(parent_dir(dest))
        .with_context(|| format!("temp file next to {}", dest.display()))?
        .into_temp_path();
    fs::rename(dest, &previous).with_context(|| format!("set aside {}", dest.display()))?;
    Ok(Some(previous))
}

fn put_back(previous: Option<TempPath>, dest: &Path) {
    let Some(previous) = previous else {
        return;
    };
    let path = match previous.keep() {
        Ok(path) => path,
        Err(err) => {
            warn!(dest = %dest.display(), error = %err.error, "could not keep set-aside file");
            return;
        }
    };
    if let Err(err) = fs::rename(&path, dest) {
        warn!(
            dest = %dest.display(),
            kept = %path.display(),
            error = %err,
            "could not restore previous file"
        );
    }
}

/// A destination holding a freshly written file.
struct Placed {
    dest: PathBuf,
    previous: Option<TempPath>,
}

impl Placed {
    fn place(tmp: NamedTempFile, dest: PathBuf) -> Result<Self> {
        let previous = set_aside(&dest)?;
        if let Err(err) = tmp.persist(&dest) {
            put_back(previous, &dest);
            return Err(err.error).with_context(|| format!("move into {}", dest.display()));
        }
        Ok(Self { dest, previous })
    }

    fn undo(self) {
        if let Err(err) = fs::remove_file(&self.dest) {
            warn!(dest = %self.dest.display(), error = %err, "could not remove new file");
        }
        put_back(self.previous, &self.dest);
    }
}

/// Write the public collections and the private record together.
///
/// Either all three files are replaced or, on error, none of them is.
pub fn write_all(
    public_dir: &Path,
    solutions_path: &Path,
    published: &PublishedArtifacts,
    solutions: &PrivateSolutions,
) -> Result<()> {
    let staged = vec![
        stage(&public_dir.join(TIERS_FILE), &published.tiers)?,
        stage(&public_dir.join(PUZZLES_FILE), &published.puzzles)?,
        stage(solutions_path, solutions)?,
    ];

    let mut placed: Vec<Placed> = Vec::with_capacity(staged.len());
    for (tmp, dest) in staged {
        match Placed::place(tmp, dest) {
            Ok(p) => placed.push(p),
            Err(err) => {
                for p in placed.into_iter().rev() {
                    p.undo();
                }
                return Err(err);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample() -> PublishedArtifacts {
        PublishedArtifacts {
            tiers: BTreeMap::new(),
            puzzles: BTreeMap::from([("easy".to_string(), Vec::new())]),
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read_dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn rejects_solutions_inside_public_dir() {
        let root = tempfile::tempdir().expect("tempdir");
        let public = root.path().join("static");
        assert!(ensure_private(&public, &public.join("solutions.json")).is_err());
        assert!(ensure_private(&public, &public.join("nested/solutions.json")).is_err());
        assert!(ensure_private(&public, &root.path().join("solutions.json")).is_ok());
    }

    #[test]
    fn writes_and_reloads_artifacts() {
        let root = tempfile::tempdir().expect("tempdir");
        let public = root.path().join("static");
        let solutions = root.path().join("private/solutions.json");
        let published = sample();

        write_all(&public, &solutions, &published, &PrivateSolutions::default()).expect("write");
        assert!(public.join(TIERS_FILE).exists());
        assert!(solutions.exists());
        assert_eq!(load_published(&public).expect("load"), published);
        assert_eq!(entries(&public), [PUZZLES_FILE, TIERS_FILE]);
    }

    #[test]
    fn rewrite_replaces_files_without_leftovers() {
        let root = tempfile::tempdir().expect("tempdir");
        let public = root.path().join("static");
        let solutions = root.path().join("solutions.json");
        write_all(&public, &solutions, &PublishedArtifacts::default(), &PrivateSolutions::default())
            .expect("first");

        let published = sample();
        write_all(&public, &solutions, &published, &PrivateSolutions::default()).expect("second");
        assert_eq!(load_published(&public).expect("load"), published);
        assert_eq!(entries(&public), [PUZZLES_FILE, TIERS_FILE]);
    }

    #[test]
    fn failed_publish_leaves_nothing_new_behind() {
        let root = tempfile::tempdir().expect("tempdir");
        let public = root.path().join("static");
        let solutions = root.path().join("solutions.json");
        fs::create_dir_all(public.join(PUZZLES_FILE)).expect("blocking dir");

        let err = write_all(&public, &solutions, &sample(), &PrivateSolutions::default());
        assert!(err.is_err());
        assert!(!public.join(TIERS_FILE).exists());
        assert!(public.join(PUZZLES_FILE).is_dir());
        assert!(!solutions.exists());
        assert_eq!(entries(&public), [PUZZLES_FILE]);
    }

    #[test]
    fn failed_publish_restores_previous_files() {
        let root = tempfile::tempdir().expect("tempdir");
        let public = root.path().join("static");
        let solutions = root.path().join("solutions.json");
        fs::create_dir_all(public.join(PUZZLES_FILE)).expect("blocking dir");
        fs::write(public.join(TIERS_FILE), b"old tiers").expect("old tiers");

        assert!(write_all(&public, &solutions, &sample(), &PrivateSolutions::default()).is_err());
        assert_eq!(fs::read(public.join(TIERS_FILE)).expect("tiers"), b"old tiers");
        assert_eq!(entries(&public), [PUZZLES_FILE, TIERS_FILE]);
    }

    #[test]
    fn failure_on_private_record_rolls_back_public_files() {
        let root = tempfile::tempdir().expect("tempdir");
        let public = root.path().join("static");
        let solutions = root.path().join("solutions.json");
        fs::create_dir_all(&solutions).expect("blocking dir");
        fs::create_dir_all(&public).expect("public");
        fs::write(public.join(PUZZLES_FILE), b"old puzzles").expect("old puzzles");

        assert!(write_all(&public, &solutions, &sample(), &PrivateSolutions::default()).is_err());
        assert!(!public.join(TIERS_FILE).exists());
        assert_eq!(fs::read(public.join(PUZZLES_FILE)).expect("puzzles"), b"old puzzles");
        assert!(solutions.is_dir());
    }

    #[test]
    fn missing_files_are_reported() {
        let root = tempfile::tempdir().expect("tempdir");
        assert!(load_published(root.path()).is_err());
    }
}
