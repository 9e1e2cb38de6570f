//! Reentrenar: unattended retraining for user-behavior models
//!
//! A pair of predictive models (a churn classifier and a spending
//! regressor) is kept fresh by a background service that watches for new
//! behavioral data, decides when retraining is warranted, validates every
//! candidate against recorded history, and promotes or rolls back
//! atomically, all without blocking the serving path.
//!
//! ## Architecture
//!
//! - [`data`]: the `DataProvider` boundary to the behavioral event store
//! - [`features`]: raw records to fixed-width feature table plus labels
//! - [`model`]: training and evaluation of the model pair
//! - [`history`]: bounded, persisted log of past training outcomes
//! - [`artifacts`]: durable production artifacts, backups, and restore
//! - [`retrain`]: the monitoring loop, trigger policy, and cycle state
//!   machine
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use reentrenar::{MemoryProvider, RetrainConfig, Retrainer};
//!
//! let provider = Arc::new(MemoryProvider::synthetic(1_000, 42));
//! let config = RetrainConfig::new().with_min_new_samples(50);
//! let service = Arc::new(Retrainer::new(config, provider).unwrap());
//!
//! service.start_monitoring();
//! println!("{:?}", service.status());
//! service.stop_monitoring();
//! ```

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod history;
pub mod model;
pub mod retrain;

pub use artifacts::{ArtifactStore, BackupSnapshot};
pub use config::RetrainConfig;
pub use data::{BehaviorRecord, DataProvider, MemoryProvider};
pub use error::{Error, Result};
pub use features::{prepare_features, FeatureTable};
pub use history::{PerformanceHistory, PerformanceRecord};
pub use model::{ArtifactSet, BehaviorModelTrainer, Evaluation};
pub use retrain::{CycleOutcome, RetrainStatus, Retrainer};
