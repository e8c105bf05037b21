pub mod enrich;
pub mod orchestrator;
pub mod persist;
pub mod predict;
pub mod score;
pub mod vectorize;

pub use orchestrator::{PipelineBuilder, TrendPipeline};
pub use persist::PersistResult;
