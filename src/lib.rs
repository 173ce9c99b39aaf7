// Library interface for liftrs modules
// The CLI and the integration tests both go through this crate root

pub mod compute;
pub mod config;
pub mod error;
pub mod fatigue;
pub mod hierarchy;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod presentation;
pub mod recovery;
pub mod resolver;
pub mod strength;
pub mod thresholds;
pub mod volume;

// Re-export commonly used types for convenience
pub use models::*;
pub use compute::{BatteryRequest, BatterySnapshot, ComputeService, LatestSlot, RequestSequencer, VolumeRequest, VolumeSource};
pub use config::EngineConfig;
pub use error::{IngestError, LiftRsError, Result};
pub use hierarchy::MuscleHierarchy;
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use recovery::{BatteryReport, RecoveryConfig, RecoveryEngine, RecoveryInputs};
pub use resolver::{ExerciseIndex, FamilyMatchRule};
pub use thresholds::{MuscleVolumeThresholds, ThresholdContext, ThresholdEngine, VolumeStatus};
pub use volume::{VolumeAggregator, VolumeConfig, VolumeMode};
