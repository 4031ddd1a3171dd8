// src/generation/mod.rs
pub mod coordinator;
pub mod examples;
pub mod history;
pub mod request;
pub mod usage;

pub use coordinator::{GenerationCoordinator, GenerationState, SignalCaches};
pub use examples::{load_examples, load_examples_or_empty};
pub use history::RecentPosts;
pub use request::{GenerationRequest, GenerationResult};
pub use usage::SourceUsage;
