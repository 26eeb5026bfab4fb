pub mod angle;
pub mod calibration;
pub mod config;
pub mod scheduler;
pub mod storage;
pub mod trial;

pub use angle::VisualAngle;
pub use calibration::{CalibrationEstimate, CardSizer, Nudge};
pub use config::{ConfigError, RunnerConfig};
pub use scheduler::{RunError, RunReport, TrialScheduler};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError, Workspace};
pub use trial::ResponseRecord;
