//! Persistent storage for the (classifier, normalizer) artifact pair

use crate::config::{AppConfig, TrainingConfig};
use crate::error::{Result, ScoringError};
use crate::feature_extractor::FEATURE_NAMES;
use crate::models::forest::RandomForest;
use crate::normalizer::NormalizationParameters;
use crate::synthetic;
use atomic_write_file::AtomicWriteFile;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, warn};

/// Bumped whenever the on-disk layout of either artifact changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Envelope written around each artifact payload
#[derive(Debug, Serialize, Deserialize)]
struct Artifact<T> {
    format_version: u32,
    run_id: String,
    trained_at: DateTime<Utc>,
    payload: T,
}

/// Classifier and normalizer produced by the same training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedArtifacts {
    pub run_id: String,
    pub trained_at: DateTime<Utc>,
    pub model: RandomForest,
    pub normalizer: NormalizationParameters,
}

/// Locations of the two artifact files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub normalizer: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir<P: AsRef<Path>>(dir: P, model_file: &str, normalizer_file: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join(model_file),
            normalizer: dir.join(normalizer_file),
        }
    }
}

/// Run one full training sequence: corpus, normalizer, forest.
pub fn train(settings: &TrainingConfig) -> Result<TrainedArtifacts> {
    let started = Instant::now();
    let run_id = uuid::Uuid::new_v4().to_string();
    info!(run_id = %run_id, seed = settings.seed, samples = settings.samples, "Starting training run");

    let corpus = synthetic::generate(settings.seed, settings.samples)?;
    let [good, bad] = corpus.class_counts();

    let normalizer = NormalizationParameters::fit(&corpus.features)?;
    let scaled = normalizer.transform_all(&corpus.features);
    let model = RandomForest::fit(&scaled, &corpus.labels, &settings.forest_config())?;
    let accuracy = model.accuracy(&scaled, &corpus.labels)?;

    let mut ranked: Vec<(&str, f64)> = FEATURE_NAMES
        .iter()
        .copied()
        .zip(model.feature_importances().iter().copied())
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let top: Vec<String> = ranked
        .iter()
        .take(3)
        .map(|(name, value)| format!("{}:{:.3}", name, value))
        .collect();

    info!(
        run_id = %run_id,
        good,
        bad,
        accuracy = format!("{:.3}", accuracy),
        top_features = ?top,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Model trained"
    );

    Ok(TrainedArtifacts {
        run_id,
        trained_at: Utc::now(),
        model,
        normalizer,
    })
}

/// Owns the artifact pair for the lifetime of the process.
///
/// The first `load` either reads both artifacts or trains and persists a
/// fresh pair. The mutex is held for the whole cold start, so concurrent
/// callers wait for a single training run and then share its result.
pub struct ModelStore {
    paths: ArtifactPaths,
    training: TrainingConfig,
    loaded: Mutex<Option<Arc<TrainedArtifacts>>>,
}

impl ModelStore {
    pub fn new(paths: ArtifactPaths, training: TrainingConfig) -> Self {
        Self {
            paths,
            training,
            loaded: Mutex::new(None),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            ArtifactPaths::in_dir(
                &config.models.models_dir,
                &config.models.model_file,
                &config.models.normalizer_file,
            ),
            config.training.clone(),
        )
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Whether a pair is already held in memory
    pub fn is_loaded(&self) -> bool {
        self.loaded.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Return the cached pair, reading or training it on first use.
    pub fn load(&self) -> Result<Arc<TrainedArtifacts>> {
        let mut slot = self
            .loaded
            .lock()
            .map_err(|e| ScoringError::ArtifactUnavailable(format!("model store lock poisoned: {e}")))?;

        if let Some(artifacts) = slot.as_ref() {
            return Ok(Arc::clone(artifacts));
        }

        let artifacts = match read_pair(&self.paths)? {
            Some(artifacts) => {
                info!(
                    run_id = %artifacts.run_id,
                    trained_at = %artifacts.trained_at,
                    model = %self.paths.model.display(),
                    "Loaded model artifacts"
                );
                artifacts
            }
            None => self.train_and_persist()?,
        };

        let artifacts = Arc::new(artifacts);
        *slot = Some(Arc::clone(&artifacts));
        Ok(artifacts)
    }

    /// Train a new pair, persist it and replace the cached one.
    pub fn retrain(&self) -> Result<Arc<TrainedArtifacts>> {
        let mut slot = self
            .loaded
            .lock()
            .map_err(|e| ScoringError::ArtifactUnavailable(format!("model store lock poisoned: {e}")))?;

        let artifacts = Arc::new(self.train_and_persist()?);
        *slot = Some(Arc::clone(&artifacts));
        Ok(artifacts)
    }

    fn train_and_persist(&self) -> Result<TrainedArtifacts> {
        let artifacts = train(&self.training).map_err(|e| match e {
            ScoringError::Io { .. } | ScoringError::Serialization { .. } => e,
            other => ScoringError::ArtifactUnavailable(format!("training failed: {other}")),
        })?;
        persist(&self.paths, &artifacts)?;
        Ok(artifacts)
    }
}

/// Write both artifacts as a pair.
///
/// Both are staged in temporary files before either is committed. The model
/// is committed first and rolled back to its previous contents if the
/// normalizer commit fails, so a failed persist leaves the old pair readable.
pub fn persist(paths: &ArtifactPaths, artifacts: &TrainedArtifacts) -> Result<()> {
    let previous_model = read_existing(&paths.model)?;

    let model = stage_artifact(
        &paths.model,
        &Artifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            run_id: artifacts.run_id.clone(),
            trained_at: artifacts.trained_at,
            payload: &artifacts.model,
        },
    )?;
    let normalizer = stage_artifact(
        &paths.normalizer,
        &Artifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            run_id: artifacts.run_id.clone(),
            trained_at: artifacts.trained_at,
            payload: &artifacts.normalizer,
        },
    )?;

    model.commit().map_err(|source| io_error(&paths.model, source))?;
    if let Err(source) = normalizer.commit() {
        restore_artifact(&paths.model, previous_model.as_deref());
        return Err(io_error(&paths.normalizer, source));
    }

    info!(
        run_id = %artifacts.run_id,
        model = %paths.model.display(),
        normalizer = %paths.normalizer.display(),
        "Model artifacts persisted"
    );
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> ScoringError {
    ScoringError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Serialize into a temporary file next to `path`; nothing is visible at
/// `path` until the returned file is committed.
fn stage_artifact<T: Serialize>(path: &Path, artifact: &Artifact<T>) -> Result<AtomicWriteFile> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| io_error(path, source))?;
    }

    let mut file = AtomicWriteFile::open(path).map_err(|source| io_error(path, source))?;
    serde_json::to_writer(&mut file, artifact).map_err(|source| ScoringError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    file.flush().map_err(|source| io_error(path, source))?;
    Ok(file)
}

fn read_existing(path: &Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(io_error(path, source)),
    }
}

/// Put back what was at `path` before a partial persist.
fn restore_artifact(path: &Path, previous: Option<&[u8]>) {
    let restored = match previous {
        Some(bytes) => AtomicWriteFile::open(path).and_then(|mut file| {
            file.write_all(bytes)?;
            file.commit()
        }),
        None => std::fs::remove_file(path),
    };

    match restored {
        Ok(()) => warn!(path = %path.display(), "Rolled back model artifact after failed persist"),
        Err(e) => error!(
            path = %path.display(),
            error = %e,
            "Failed to roll back model artifact; stored pair is now inconsistent"
        ),
    }
}

/// Read one artifact; `Ok(None)` when the file does not exist or cannot be
/// decoded.
fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<Option<Artifact<T>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ScoringError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    match serde_json::from_reader(BufReader::new(file)) {
        Ok(artifact) => Ok(Some(artifact)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable model artifact");
            Ok(None)
        }
    }
}

/// Read both artifacts and check they form a usable pair.
///
/// Missing, unreadable, foreign-version or mismatched artifacts all yield
/// `Ok(None)` so the caller retrains.
pub fn read_pair(paths: &ArtifactPaths) -> Result<Option<TrainedArtifacts>> {
    let Some(model) = read_artifact::<RandomForest>(&paths.model)? else {
        info!(path = %paths.model.display(), "Classifier artifact missing");
        return Ok(None);
    };
    let Some(normalizer) = read_artifact::<NormalizationParameters>(&paths.normalizer)? else {
        info!(path = %paths.normalizer.display(), "Normalizer artifact missing");
        return Ok(None);
    };

    match check_pair(&model, &normalizer) {
        Ok(()) => Ok(Some(TrainedArtifacts {
            run_id: model.run_id,
            trained_at: model.trained_at,
            model: model.payload,
            normalizer: normalizer.payload,
        })),
        Err(e) => {
            warn!(error = %e, "Rejecting persisted artifacts");
            Ok(None)
        }
    }
}

fn check_pair(
    model: &Artifact<RandomForest>,
    normalizer: &Artifact<NormalizationParameters>,
) -> Result<()> {
    for version in [model.format_version, normalizer.format_version] {
        if version != ARTIFACT_FORMAT_VERSION {
            return Err(ScoringError::ArtifactUnavailable(format!(
                "unsupported artifact format version {version}"
            )));
        }
    }
    if model.run_id != normalizer.run_id {
        return Err(ScoringError::ArtifactMismatch {
            model_run: model.run_id.clone(),
            normalizer_run: normalizer.run_id.clone(),
        });
    }
    model.payload.validate()?;
    normalizer.payload.validate()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use std::thread;

    fn quick_training() -> TrainingConfig {
        TrainingConfig {
            samples: 200,
            n_trees: 8,
            max_depth: 5,
            ..TrainingConfig::default()
        }
    }

    fn store_in(dir: &Path) -> ModelStore {
        ModelStore::new(
            ArtifactPaths::in_dir(dir, "credit_model.json", "normalizer.json"),
            quick_training(),
        )
    }

    #[test]
    fn test_cold_start_trains_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(!store.is_loaded());

        let artifacts = store.load().unwrap();

        assert!(store.is_loaded());
        assert!(store.paths().model.exists());
        assert!(store.paths().normalizer.exists());
        assert_eq!(artifacts.model.tree_count(), 8);
    }

    #[test]
    fn test_reload_returns_persisted_pair() {
        let dir = tempfile::tempdir().unwrap();
        let first = store_in(dir.path()).load().unwrap();

        let second = store_in(dir.path()).load().unwrap();

        assert_eq!(first.run_id, second.run_id);
        assert_eq!(first.model, second.model);
        assert_eq!(first.normalizer, second.normalizer);
    }

    #[test]
    fn test_load_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let a = store.load().unwrap();
        let b = store.load().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_missing_normalizer_triggers_retrain() {
        let dir = tempfile::tempdir().unwrap();
        let first = store_in(dir.path()).load().unwrap();
        std::fs::remove_file(dir.path().join("normalizer.json")).unwrap();

        let second = store_in(dir.path()).load().unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert!(dir.path().join("normalizer.json").exists());
    }

    #[test]
    fn test_mismatched_pair_is_rejected() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let a = store_in(dir_a.path()).load().unwrap();
        let b = store_in(dir_b.path()).load().unwrap();
        assert_ne!(a.run_id, b.run_id);

        std::fs::copy(
            dir_b.path().join("normalizer.json"),
            dir_a.path().join("normalizer.json"),
        )
        .unwrap();

        let paths = ArtifactPaths::in_dir(dir_a.path(), "credit_model.json", "normalizer.json");
        assert!(read_pair(&paths).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_artifact_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        store_in(dir.path()).load().unwrap();
        std::fs::write(dir.path().join("credit_model.json"), b"{not json").unwrap();

        let paths = ArtifactPaths::in_dir(dir.path(), "credit_model.json", "normalizer.json");
        assert!(read_pair(&paths).unwrap().is_none());
    }

    #[test]
    fn test_retrain_replaces_cached_pair() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let first = store.load().unwrap();

        let second = store.retrain().unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert!(Arc::ptr_eq(&second, &store.load().unwrap()));
        let on_disk = read_pair(store.paths()).unwrap().unwrap();
        assert_eq!(on_disk.run_id, second.run_id);
    }

    /// A non-empty directory at `path` makes the commit rename fail.
    fn block_path(path: &Path) {
        if path.exists() {
            std::fs::remove_file(path).unwrap();
        }
        std::fs::create_dir(path).unwrap();
        std::fs::write(path.join("occupied"), b"x").unwrap();
    }

    #[test]
    fn test_failed_persist_keeps_previous_pair() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path(), "credit_model.json", "normalizer.json");
        let first = train(&quick_training()).unwrap();
        persist(&paths, &first).unwrap();
        let first_normalizer = std::fs::read(&paths.normalizer).unwrap();

        block_path(&paths.normalizer);
        let second = train(&TrainingConfig {
            seed: 7,
            ..quick_training()
        })
        .unwrap();
        assert!(matches!(persist(&paths, &second), Err(ScoringError::Io { .. })));

        std::fs::remove_dir_all(&paths.normalizer).unwrap();
        std::fs::write(&paths.normalizer, first_normalizer).unwrap();

        let on_disk = read_pair(&paths).unwrap().unwrap();
        assert_eq!(on_disk.run_id, first.run_id);
        assert_eq!(on_disk.model, first.model);
        assert_eq!(on_disk.normalizer, first.normalizer);
    }

    #[test]
    fn test_failed_first_persist_leaves_no_model() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path(), "credit_model.json", "normalizer.json");
        block_path(&paths.normalizer);

        assert!(persist(&paths, &train(&quick_training()).unwrap()).is_err());
        assert!(!paths.model.exists());
    }

    #[test]
    fn test_concurrent_cold_start_trains_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(dir.path()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.load().unwrap())
            })
            .collect();
        let loaded: Vec<Arc<TrainedArtifacts>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        for artifacts in &loaded[1..] {
            assert!(Arc::ptr_eq(&loaded[0], artifacts));
        }
    }
}
