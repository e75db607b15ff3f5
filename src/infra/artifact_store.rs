// ============================================================
// Layer 6 — Artifact Store
// ============================================================
// Saves and restores the fitted preprocessor/model pair as one
// versioned, immutable unit.
//
// What gets saved per version:
//   1. preprocessor.json — every fitted transformer statistic
//   2. model.json        — the boosted-tree ensemble
//   3. manifest.json     — version, timestamp, hyperparameters,
//                          score report, content checksums
//
// Why save the preprocessor WITH the model?
//   A model is only meaningful behind the exact imputation,
//   encoding and scaling it was trained on. Persisting them as
//   one unit makes mixing a v3 preprocessor with a v5 model a
//   load-time error instead of a silent misprediction.
//
// File naming convention:
//   artifacts/
//     v1/
//       preprocessor.json
//       model.json
//       manifest.json    ← written last inside the version
//     v2/ ...
//     latest.json        ← promoted version number, written
//                          only after the version is complete
//
// Writes go through a temp file + rename, and a version
// directory is claimed with create_dir, so a crashed run can
// leave an unpromoted partial directory behind but never a
// promoted broken one.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (Working with Files)

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::transformer::TransformerState;
use crate::domain::error::ArtifactError;
use crate::ml::metrics::ScoreReport;
use crate::ml::model::{GbdtParams, GbdtRegressor};

const PREPROCESSOR_FILE: &str = "preprocessor.json";
const MODEL_FILE:        &str = "model.json";
const MANIFEST_FILE:     &str = "manifest.json";
const LATEST_FILE:       &str = "latest.json";

/// Everything recorded about one persisted version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version:     u32,
    pub created_utc: String,
    pub params:      GbdtParams,
    pub scores:      ScoreReport,
    /// FNV-1a 64 of the exact preprocessor.json bytes
    pub preprocessor_checksum: String,
    /// FNV-1a 64 of the exact model.json bytes
    pub model_checksum: String,
}

/// A fully verified pair, ready to serve. Only the store can
/// produce one, so holding a LoadedPair means the checksums,
/// the pairing and the schema all checked out.
#[derive(Debug)]
pub struct LoadedPair {
    pub version: u32,
    pub state:   TransformerState,
    pub model:   GbdtRegressor,
}

/// Manages the versioned artifact directory.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store over `root`, creating the directory if it
    /// doesn't already exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        // create_dir_all creates parent directories too, like `mkdir -p`
        fs::create_dir_all(&root).ok();
        Self { root }
    }

    /// Persist a fitted pair as the next version and promote it.
    /// Returns the version number written.
    ///
    /// Steps:
    ///   1. Claim artifacts/vN with create_dir (fails if taken)
    ///   2. Write preprocessor.json and model.json
    ///   3. Write manifest.json with their checksums
    ///   4. Point latest.json at N
    pub fn save_pair(
        &self,
        state:  &TransformerState,
        model:  &GbdtRegressor,
        scores: &ScoreReport,
    ) -> Result<u32> {
        let version = self.next_version()?;
        let dir = self.version_dir(version);

        // create_dir (not create_dir_all) is the claim: a second
        // writer racing for the same number fails here
        fs::create_dir(&dir).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                anyhow::Error::from(ArtifactError::VersionExists {
                    version,
                    path: dir.display().to_string(),
                })
            } else {
                anyhow::Error::from(io_error(&dir, e))
            }
        })?;

        let state_bytes = serde_json::to_vec_pretty(state)
            .context("cannot serialise preprocessor state")?;
        let model_bytes = serde_json::to_vec_pretty(model)
            .context("cannot serialise model")?;

        write_atomic(&dir.join(PREPROCESSOR_FILE), &state_bytes)?;
        write_atomic(&dir.join(MODEL_FILE), &model_bytes)?;

        let manifest = Manifest {
            version,
            created_utc: chrono::Utc::now().to_rfc3339(),
            params: model.params,
            scores: *scores,
            preprocessor_checksum: format!("{:016x}", fnv1a_64(&state_bytes)),
            model_checksum:        format!("{:016x}", fnv1a_64(&model_bytes)),
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .context("cannot serialise manifest")?;
        write_atomic(&dir.join(MANIFEST_FILE), &manifest_bytes)?;

        // Promotion: from here on, load_latest serves this version
        let latest = self.root.join(LATEST_FILE);
        write_atomic(&latest, serde_json::to_string(&version)?.as_bytes())?;

        tracing::info!("Saved artifact v{} to '{}'", version, dir.display());
        Ok(version)
    }

    /// Load whatever version latest.json promotes.
    pub fn load_latest(&self) -> Result<LoadedPair, ArtifactError> {
        let latest = self.root.join(LATEST_FILE);
        let text = fs::read_to_string(&latest).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                // no promoted version at all: train first
                ArtifactError::NotFound {
                    path: latest.display().to_string(),
                }
            } else {
                io_error(&latest, e)
            }
        })?;
        let version: u32 = serde_json::from_str(&text).map_err(|e| ArtifactError::Corrupt {
            path:   latest.display().to_string(),
            reason: e.to_string(),
        })?;
        self.load_pair(version)
    }

    /// Load one specific version, verifying checksums, pairing
    /// and schema before returning it.
    pub fn load_pair(&self, version: u32) -> Result<LoadedPair, ArtifactError> {
        let dir = self.version_dir(version);
        if !dir.is_dir() {
            return Err(ArtifactError::NotFound {
                path: dir.display().to_string(),
            });
        }

        let manifest: Manifest = read_json(&dir.join(MANIFEST_FILE))?;
        if manifest.version != version {
            return Err(ArtifactError::PairMismatch {
                reason: format!(
                    "manifest in '{}' claims version v{}",
                    dir.display(),
                    manifest.version
                ),
            });
        }

        let state_bytes = read_verified(
            &dir.join(PREPROCESSOR_FILE),
            &manifest.preprocessor_checksum,
        )?;
        let model_bytes = read_verified(&dir.join(MODEL_FILE), &manifest.model_checksum)?;

        let state: TransformerState = parse_json(&dir.join(PREPROCESSOR_FILE), &state_bytes)?;
        if !state.schema_matches() {
            return Err(ArtifactError::SchemaMismatch {
                found: state.columns,
            });
        }
        let model: GbdtRegressor = parse_json(&dir.join(MODEL_FILE), &model_bytes)?;

        tracing::debug!("Loaded artifact v{}", version);
        Ok(LoadedPair {
            version,
            state,
            model,
        })
    }

    fn version_dir(&self, version: u32) -> PathBuf {
        self.root.join(format!("v{version}"))
    }

    /// One past the highest existing version directory, claimed
    /// or not. Partial directories from crashed runs are never
    /// reused.
    fn next_version(&self) -> Result<u32, ArtifactError> {
        let entries = fs::read_dir(&self.root).map_err(|e| io_error(&self.root, e))?;
        let mut highest = 0u32;
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.root, e))?;
            let name = entry.file_name();
            if let Some(n) = name.to_string_lossy().strip_prefix('v') {
                if let Ok(v) = n.parse::<u32>() {
                    highest = highest.max(v);
                }
            }
        }
        Ok(highest + 1)
    }
}

// ─── File helpers ─────────────────────────────────────────────────────────────

fn io_error(path: &Path, source: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Write via a temp file in the same directory, then rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(|e| io_error(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_error(path, e))?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::Corrupt {
                path:   path.display().to_string(),
                reason: "file missing from its version directory".to_string(),
            }
        } else {
            io_error(path, e)
        }
    })?;
    parse_json(path, &bytes)
}

fn parse_json<T: serde::de::DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T, ArtifactError> {
    serde_json::from_slice(bytes).map_err(|e| ArtifactError::Corrupt {
        path:   path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Read a file and require its checksum to match the manifest.
fn read_verified(path: &Path, expected: &str) -> Result<Vec<u8>, ArtifactError> {
    let bytes = fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::Corrupt {
                path:   path.display().to_string(),
                reason: "file missing from its version directory".to_string(),
            }
        } else {
            io_error(path, e)
        }
    })?;
    let actual = format!("{:016x}", fnv1a_64(&bytes));
    if actual != expected {
        return Err(ArtifactError::Corrupt {
            path:   path.display().to_string(),
            reason: format!("checksum mismatch: manifest {expected}, file {actual}"),
        });
    }
    Ok(bytes)
}

/// FNV-1a, 64-bit. Fast, dependency-free, and plenty to catch
/// truncation or a stray editor touching an artifact.
fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
