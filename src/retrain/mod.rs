//! Retraining orchestrator
//!
//! Owns the background monitoring loop, the trigger policy, and the
//! train→validate→deploy/rollback state machine. The orchestrator is the
//! only writer of retraining state; control operations may be called
//! concurrently from any thread, and exactly one cycle body executes at a
//! time system-wide.
//!
//! Nothing here is allowed to take down the hosting process: transient
//! errors degrade to "keep serving the last known-good models" and the
//! monitoring loop only exits when asked to stop.

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::artifacts::ArtifactStore;
use crate::config::RetrainConfig;
use crate::data::DataProvider;
use crate::error::Result;
use crate::features::prepare_features;
use crate::history::{PerformanceHistory, PerformanceRecord};
use crate::model::{BehaviorModelTrainer, Evaluation};

/// Rows pulled for one training extract
pub const TRAINING_EXTRACT_LIMIT: usize = 10_000;
/// Fewest extract rows worth training on
pub const MIN_TRAINING_ROWS: usize = 100;
/// Fraction of the extract held out for candidate validation
pub const VALIDATION_FRACTION: f64 = 0.2;
/// Seed for the train/validation shuffle
pub const SPLIT_SEED: u64 = 42;
/// Rows pulled for the drift-scoring window
pub const DRIFT_WINDOW_LIMIT: usize = 1_000;
/// Fewest window rows that count as drift evidence
pub const MIN_DRIFT_SAMPLES: usize = 50;
/// History records averaged into the drift baseline
pub const DRIFT_HISTORY_WINDOW: usize = 5;
/// Absolute error-metric improvement that justifies a deploy on its own
pub const ERROR_IMPROVEMENT_MARGIN: f64 = 100.0;

const ERROR_RETRY: StdDuration = StdDuration::from_secs(300);
const STOP_JOIN_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Result of one retraining cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Candidate promoted to production
    Deployed { record: PerformanceRecord },
    /// Extract too small to train on; a skip, not an error
    InsufficientData { rows: usize, needed: usize },
    /// Candidate judged worse than the baseline; production kept
    Rejected { candidate: Evaluation, baseline: PerformanceRecord },
    /// Pre-cycle snapshot failed; deploying without a rollback path is unsafe
    BackupFailed,
}

/// Snapshot of the service state for status queries.
///
/// Produced without touching the cycle guard, so status never stalls
/// behind an in-flight training run.
#[derive(Debug, Clone, Serialize)]
pub struct RetrainStatus {
    pub running: bool,
    pub last_retrain_time: DateTime<Utc>,
    pub new_sample_count: u64,
    pub min_samples_needed: u64,
    pub history_length: usize,
    pub next_check_hours: u64,
}

/// Scalar state shared with the background worker
struct Shared {
    running: AtomicBool,
    last_retrain_epoch: AtomicI64,
    stop_requested: Mutex<bool>,
    stop_signal: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Automated retraining service for the behavior model pair
pub struct Retrainer {
    config: RetrainConfig,
    provider: Arc<dyn DataProvider>,
    trainer: BehaviorModelTrainer,
    artifacts: ArtifactStore,
    history: Mutex<PerformanceHistory>,
    cycle_guard: Mutex<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shared: Shared,
}

impl Retrainer {
    /// Create a retraining service over `provider`.
    ///
    /// Opens the artifact store and loads any persisted performance
    /// history. The service starts idle; call
    /// [`start_monitoring`](Self::start_monitoring) to spawn the worker.
    pub fn new(config: RetrainConfig, provider: Arc<dyn DataProvider>) -> Result<Self> {
        config.validate()?;
        let artifacts = ArtifactStore::open(&config.artifact_root)?;
        let history = PerformanceHistory::open(&config.history_path);

        info!(
            min_new_samples = config.min_new_samples,
            retrain_interval_hours = config.retrain_interval_hours,
            "retraining service initialized"
        );

        Ok(Self {
            provider,
            trainer: BehaviorModelTrainer::new(),
            artifacts,
            history: Mutex::new(history),
            cycle_guard: Mutex::new(()),
            worker: Mutex::new(None),
            shared: Shared {
                running: AtomicBool::new(false),
                last_retrain_epoch: AtomicI64::new(Utc::now().timestamp()),
                stop_requested: Mutex::new(false),
                stop_signal: Condvar::new(),
            },
            config,
        })
    }

    /// Service configuration
    pub fn config(&self) -> &RetrainConfig {
        &self.config
    }

    /// Whether the background worker is active
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Time of the last deployed retrain (or service start)
    pub fn last_retrain_time(&self) -> DateTime<Utc> {
        let epoch = self.shared.last_retrain_epoch.load(Ordering::SeqCst);
        DateTime::from_timestamp(epoch, 0).unwrap_or_else(Utc::now)
    }

    /// Overwrite the last-retrain marker.
    ///
    /// Intended for hosts restoring persisted lifecycle state at startup.
    pub fn set_last_retrain_time(&self, time: DateTime<Utc>) {
        self.shared.last_retrain_epoch.store(time.timestamp(), Ordering::SeqCst);
    }

    /// Start the background monitoring worker.
    ///
    /// Idempotent: a second call while running logs a warning and changes
    /// nothing.
    pub fn start_monitoring(self: &Arc<Self>) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            warn!("retraining service already running");
            return;
        }
        *lock(&self.shared.stop_requested) = false;

        let worker = Arc::clone(self);
        match std::thread::Builder::new()
            .name("retrain-monitor".into())
            .spawn(move || worker.monitor_loop())
        {
            Ok(handle) => {
                *lock(&self.worker) = Some(handle);
                info!("retraining service started");
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                error!(error = %e, "failed to spawn monitoring thread");
            }
        }
    }

    /// Stop the background worker.
    ///
    /// Signals the cooperative stop flag, waits up to five seconds for the
    /// worker to finish its current iteration, and marks the service
    /// stopped even if the join times out (an in-flight cycle is allowed
    /// to finish on the detached thread rather than be hard-killed).
    pub fn stop_monitoring(&self) {
        {
            let mut stopped = lock(&self.shared.stop_requested);
            *stopped = true;
            self.shared.stop_signal.notify_all();
        }

        if let Some(handle) = lock(&self.worker).take() {
            let deadline = Instant::now() + STOP_JOIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(StdDuration::from_millis(20));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                warn!("monitoring thread did not exit within join timeout, detaching");
            }
        }

        self.shared.running.store(false, Ordering::SeqCst);
        info!("retraining service stopped");
    }

    /// Run exactly one retraining cycle regardless of trigger conditions.
    ///
    /// Serialized against the scheduled loop; blocks the caller until the
    /// cycle completes. Returns whether a candidate was deployed (the
    /// "no worse" acceptance counts as a deploy).
    pub fn force_retrain(&self) -> bool {
        info!("forcing immediate retraining cycle");
        match self.run_cycle() {
            Ok(CycleOutcome::Deployed { .. }) => true,
            Ok(outcome) => {
                info!(?outcome, "forced cycle finished without deploying");
                false
            }
            Err(e) => {
                error!(error = %e, "forced retraining cycle failed");
                false
            }
        }
    }

    /// Current service status for external callers.
    ///
    /// Never waits on an in-flight cycle. A provider failure in the
    /// sample count degrades to zero.
    pub fn status(&self) -> RetrainStatus {
        RetrainStatus {
            running: self.is_running(),
            last_retrain_time: self.last_retrain_time(),
            new_sample_count: self.new_sample_count(),
            min_samples_needed: self.config.min_new_samples,
            history_length: lock(&self.history).len(),
            next_check_hours: self.config.retrain_interval_hours,
        }
    }

    /// Evaluate the trigger policy.
    ///
    /// Warranted only once the retrain interval has elapsed, and then
    /// either enough new samples have arrived or production accuracy has
    /// drifted below the recent historical mean. Drift can override an
    /// insufficient sample count; the sample-count path alone never fires
    /// below `min_new_samples`.
    pub fn should_retrain(&self) -> bool {
        let elapsed = Utc::now().signed_duration_since(self.last_retrain_time());
        if elapsed < Duration::hours(self.config.retrain_interval_hours as i64) {
            return false;
        }

        let new_samples = self.new_sample_count();
        if new_samples >= self.config.min_new_samples {
            info!(new_samples, "sufficient new data, retraining warranted");
            return true;
        }

        if self.detect_performance_drift() {
            info!("performance drift detected, retraining warranted");
            return true;
        }

        debug!(
            new_samples,
            needed = self.config.min_new_samples,
            "retraining not warranted"
        );
        false
    }

    /// Execute one full retraining cycle under the exclusive cycle guard.
    pub fn run_cycle(&self) -> Result<CycleOutcome> {
        let _cycle = lock(&self.cycle_guard);
        info!("starting retraining cycle");

        if self.config.backup_enabled {
            match self.artifacts.backup() {
                Ok(Some(snapshot)) => {
                    info!(path = %snapshot.path.display(), "production artifacts backed up");
                }
                Ok(None) => info!("no production artifacts yet, nothing to back up"),
                Err(e) => {
                    // Without a fresh snapshot a rejected candidate has no
                    // rollback path, so the cycle must not reach deploy.
                    warn!(error = %e, "backup failed, aborting cycle");
                    return Ok(CycleOutcome::BackupFailed);
                }
            }
        }

        let extract = self.provider.training_extract(TRAINING_EXTRACT_LIMIT)?;
        if extract.len() < MIN_TRAINING_ROWS {
            info!(
                rows = extract.len(),
                needed = MIN_TRAINING_ROWS,
                "insufficient training data, skipping cycle"
            );
            return Ok(CycleOutcome::InsufficientData {
                rows: extract.len(),
                needed: MIN_TRAINING_ROWS,
            });
        }

        let table = prepare_features(&extract);
        let (train_table, validation_table) = table.split(VALIDATION_FRACTION, SPLIT_SEED);

        let (candidate, train_metrics) = self.trainer.train(&train_table)?;
        debug!(
            train_accuracy = train_metrics.accuracy,
            train_error = train_metrics.error_metric,
            "candidate models trained"
        );

        let evaluation = self.trainer.evaluate(&candidate, &validation_table)?;
        info!(
            accuracy = evaluation.accuracy,
            error_metric = evaluation.error_metric,
            samples = evaluation.samples_used,
            "candidate validated on held-out split"
        );

        let baseline = lock(&self.history).latest();
        if !self.should_deploy(&evaluation, &baseline) {
            warn!(
                candidate_accuracy = evaluation.accuracy,
                baseline_accuracy = baseline.accuracy,
                "candidate rejected, keeping production models"
            );
            if self.config.backup_enabled {
                // The candidate never touched production, but restoring the
                // snapshot guards against any partial corruption from the
                // failed attempt.
                match self.artifacts.restore_latest_backup() {
                    Ok(true) => info!("production artifacts restored from latest backup"),
                    Ok(false) => {
                        warn!("no backup available to restore, production left as-is");
                    }
                    Err(e) => warn!(error = %e, "restore from backup failed"),
                }
            }
            return Ok(CycleOutcome::Rejected { candidate: evaluation, baseline });
        }

        self.artifacts.swap_production(&candidate)?;
        let now = Utc::now();
        let record = PerformanceRecord {
            accuracy: evaluation.accuracy,
            error_metric: evaluation.error_metric,
            timestamp: now,
            samples_used: evaluation.samples_used,
        };
        lock(&self.history).append(record.clone());
        self.shared.last_retrain_epoch.store(now.timestamp(), Ordering::SeqCst);
        info!(accuracy = record.accuracy, "candidate deployed to production");
        Ok(CycleOutcome::Deployed { record })
    }

    /// Count samples recorded since the last retrain; provider failures
    /// degrade to zero (transient data errors must not surface here).
    fn new_sample_count(&self) -> u64 {
        match self.provider.count_samples_since(self.last_retrain_time()) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "failed to count new samples, treating as zero");
                0
            }
        }
    }

    /// Score the production classifier on a recent held-out window and
    /// compare against the recent historical mean accuracy.
    ///
    /// Fewer than [`MIN_DRIFT_SAMPLES`] rows, no history, or no production
    /// models all count as "no drift": insufficient evidence, not a
    /// positive signal.
    fn detect_performance_drift(&self) -> bool {
        let window = match self.provider.recent_window(DRIFT_WINDOW_LIMIT) {
            Ok(w) => w,
            Err(e) => {
                warn!(error = %e, "failed to load drift window");
                return false;
            }
        };
        if window.len() < MIN_DRIFT_SAMPLES {
            return false;
        }

        let Some(historical_mean) =
            lock(&self.history).recent_mean_accuracy(DRIFT_HISTORY_WINDOW)
        else {
            return false;
        };

        let production = match self.artifacts.load_production() {
            Ok(set) => set,
            Err(_) => return false,
        };

        let table = prepare_features(&window);
        let current = match self.trainer.evaluate(&production, &table) {
            Ok(eval) => eval,
            Err(e) => {
                warn!(error = %e, "failed to score production models for drift");
                return false;
            }
        };

        if current.accuracy < historical_mean - self.config.performance_threshold {
            warn!(
                current_accuracy = current.accuracy,
                historical_mean, "production accuracy drifted below recent mean"
            );
            return true;
        }
        false
    }

    /// Deploy decision: better-than-threshold accuracy, a large error-metric
    /// improvement, or "no worse" all promote the candidate. Only a clear
    /// accuracy regression keeps the incumbent.
    fn should_deploy(&self, candidate: &Evaluation, baseline: &PerformanceRecord) -> bool {
        let accuracy_delta = candidate.accuracy - baseline.accuracy;
        let error_improvement = baseline.error_metric - candidate.error_metric;

        if accuracy_delta > self.config.performance_threshold {
            info!(accuracy_delta, "accuracy improved beyond threshold");
            return true;
        }
        if error_improvement > ERROR_IMPROVEMENT_MARGIN {
            info!(error_improvement, "error metric improved beyond margin");
            return true;
        }
        if accuracy_delta < -self.config.performance_threshold {
            return false;
        }
        // Within the threshold band: favor the models that saw new data.
        info!("candidate performance comparable, deploying updated models");
        true
    }

    fn stop_was_requested(&self) -> bool {
        *lock(&self.shared.stop_requested)
    }

    /// Wait on the stop condvar for up to `timeout`.
    ///
    /// Returns true when a stop was requested, so shutdown latency is the
    /// signal latency rather than the poll interval.
    fn wait_for_stop(&self, timeout: StdDuration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = lock(&self.shared.stop_requested);
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .shared
                .stop_signal
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            stopped = guard;
        }
        true
    }

    fn monitor_iteration(&self) -> Result<()> {
        if self.should_retrain() {
            info!("retraining conditions met, starting model update");
            let outcome = self.run_cycle()?;
            info!(?outcome, "scheduled retraining cycle finished");
        }
        Ok(())
    }

    fn monitor_loop(&self) {
        info!("monitoring loop started");
        loop {
            if self.stop_was_requested() {
                break;
            }
            let wait = match self.monitor_iteration() {
                Ok(()) => StdDuration::from_millis(self.config.poll_interval_ms),
                Err(e) => {
                    error!(error = %e, "error in monitoring loop iteration");
                    ERROR_RETRY.min(StdDuration::from_millis(self.config.poll_interval_ms))
                }
            };
            if self.wait_for_stop(wait) {
                break;
            }
        }
        info!("monitoring loop exited");
    }
}
