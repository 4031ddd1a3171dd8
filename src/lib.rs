pub mod cache;
pub mod clients;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod feeds;
pub mod generation;
pub mod jobs;
pub mod monitoring; // Health reporting
pub mod publisher;
pub mod scheduler;
pub mod stats;
pub mod testing; // Mock collaborators for unit and integration tests
pub mod utils;

pub use cache::{BoundedCache, CacheEntry, CacheMetrics};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::Config;
pub use engine::{Collaborators, Engine};
pub use error::{BotError, Result};
pub use generation::{GenerationCoordinator, GenerationResult, GenerationState};
pub use monitoring::{HealthReport, HealthStatus};
pub use publisher::{PublishReceipt, Publisher};
pub use scheduler::{ScheduledTask, Scheduler};
pub use stats::{EngineStatus, Stats, StatsTracker};
