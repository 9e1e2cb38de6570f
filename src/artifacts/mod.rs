//! Durable artifact storage
//!
//! Owns the production model files, a staging area for candidate promotion,
//! and timestamped backup snapshots. The production set is only ever
//! replaced by promoting a fully-written staging directory, so serving code
//! can never observe a half-swapped artifact set.
//!
//! Layout under the store root:
//!
//! ```text
//! production/{churn_model.json, spending_model.json, scaler.json}
//! staging/                      # transient, rebuilt per swap
//! backups/models_<timestamp>/   # one directory per snapshot
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::ArtifactSet;

/// Classifier artifact file name
pub const CLASSIFIER_FILE: &str = "churn_model.json";
/// Regressor artifact file name
pub const REGRESSOR_FILE: &str = "spending_model.json";
/// Scaler artifact file name
pub const SCALER_FILE: &str = "scaler.json";

const PRODUCTION_DIR: &str = "production";
const STAGING_DIR: &str = "staging";
const RETIRED_DIR: &str = "production.old";
const BACKUPS_DIR: &str = "backups";
const BACKUP_PREFIX: &str = "models_";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A timestamped, complete copy of a production artifact set
#[derive(Debug, Clone, PartialEq)]
pub struct BackupSnapshot {
    /// Snapshot directory
    pub path: PathBuf,
    /// Creation time encoded in the directory name
    pub created_at: DateTime<Utc>,
}

/// Durable read/write access to deployed model artifacts
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) an artifact store rooted at `root`
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(BACKUPS_DIR))?;
        Ok(Self { root })
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn production_dir(&self) -> PathBuf {
        self.root.join(PRODUCTION_DIR)
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    fn backups_dir(&self) -> PathBuf {
        self.root.join(BACKUPS_DIR)
    }

    fn artifact_files(dir: &Path) -> [PathBuf; 3] {
        [dir.join(CLASSIFIER_FILE), dir.join(REGRESSOR_FILE), dir.join(SCALER_FILE)]
    }

    /// Whether a complete production set is on disk
    pub fn has_production(&self) -> bool {
        Self::artifact_files(&self.production_dir()).iter().all(|f| f.exists())
    }

    /// Load the production artifact set
    pub fn load_production(&self) -> Result<ArtifactSet> {
        let dir = self.production_dir();
        if !self.has_production() {
            return Err(Error::ArtifactsNotFound(dir));
        }

        let classifier = serde_json::from_str(&std::fs::read_to_string(dir.join(CLASSIFIER_FILE))?)?;
        let regressor = serde_json::from_str(&std::fs::read_to_string(dir.join(REGRESSOR_FILE))?)?;
        let scaler = serde_json::from_str(&std::fs::read_to_string(dir.join(SCALER_FILE))?)?;
        Ok(ArtifactSet { classifier, regressor, scaler })
    }

    /// Atomically replace the production set with `candidate`.
    ///
    /// All three files are written into a fresh staging directory first and
    /// promoted together; a partially-written set is never visible under
    /// `production/`.
    pub fn swap_production(&self, candidate: &ArtifactSet) -> Result<()> {
        let staging = self.staging_dir();
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        std::fs::create_dir_all(&staging)?;

        std::fs::write(
            staging.join(CLASSIFIER_FILE),
            serde_json::to_string_pretty(&candidate.classifier)?,
        )?;
        std::fs::write(
            staging.join(REGRESSOR_FILE),
            serde_json::to_string_pretty(&candidate.regressor)?,
        )?;
        std::fs::write(
            staging.join(SCALER_FILE),
            serde_json::to_string_pretty(&candidate.scaler)?,
        )?;

        self.promote_staging()
    }

    /// Snapshot the production set into a new timestamped backup.
    ///
    /// Returns `None` when no production set exists yet; there is nothing
    /// to roll back to and the first deploy must still be possible.
    pub fn backup(&self) -> Result<Option<BackupSnapshot>> {
        if !self.has_production() {
            return Ok(None);
        }

        let created_at = Utc::now();
        let name = format!("{BACKUP_PREFIX}{}", created_at.format(BACKUP_TIMESTAMP_FORMAT));
        let snapshot_dir = self.backups_dir().join(name);
        std::fs::create_dir_all(&snapshot_dir)?;

        let production = self.production_dir();
        for file in [CLASSIFIER_FILE, REGRESSOR_FILE, SCALER_FILE] {
            std::fs::copy(production.join(file), snapshot_dir.join(file))
                .map_err(|e| Error::Backup(format!("copying {file}: {e}")))?;
        }

        debug!(path = %snapshot_dir.display(), "production artifacts backed up");
        Ok(Some(BackupSnapshot { path: snapshot_dir, created_at }))
    }

    /// Most recent backup snapshot, by the timestamp in the directory name
    pub fn latest_backup(&self) -> Result<Option<BackupSnapshot>> {
        let mut snapshots: Vec<BackupSnapshot> = Vec::new();
        for entry in std::fs::read_dir(self.backups_dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stamp) = name.strip_prefix(BACKUP_PREFIX) else {
                continue;
            };
            let Ok(naive) = NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT) else {
                continue;
            };
            snapshots.push(BackupSnapshot { path: entry.path(), created_at: naive.and_utc() });
        }

        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(snapshots.pop())
    }

    /// Restore the most recent backup as the production set.
    ///
    /// Returns `false` when no backups exist; the caller decides how loudly
    /// to report that. Restoration goes through the same staging promotion
    /// as a deploy, and the snapshot files are copied byte-for-byte.
    pub fn restore_latest_backup(&self) -> Result<bool> {
        let Some(snapshot) = self.latest_backup()? else {
            return Ok(false);
        };

        let staging = self.staging_dir();
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        std::fs::create_dir_all(&staging)?;

        for file in [CLASSIFIER_FILE, REGRESSOR_FILE, SCALER_FILE] {
            std::fs::copy(snapshot.path.join(file), staging.join(file))?;
        }

        self.promote_staging()?;
        debug!(path = %snapshot.path.display(), "restored production artifacts from backup");
        Ok(true)
    }

    /// Promote `staging/` to `production/`, retiring any existing set.
    fn promote_staging(&self) -> Result<()> {
        let production = self.production_dir();
        let retired = self.root.join(RETIRED_DIR);

        if retired.exists() {
            std::fs::remove_dir_all(&retired)?;
        }
        if production.exists() {
            std::fs::rename(&production, &retired)?;
        }
        std::fs::rename(self.staging_dir(), &production)?;

        if retired.exists() {
            if let Err(e) = std::fs::remove_dir_all(&retired) {
                warn!(error = %e, "failed to clean up retired production artifacts");
            }
        }
        Ok(())
    }
}
