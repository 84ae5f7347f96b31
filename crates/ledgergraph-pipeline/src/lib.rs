//! Document lifecycle: ingestion plus the stage coordinator that routes
//! documents through extract, normalize, index and risk detection.

mod coordinator;
mod ingestion;

pub use coordinator::{PipelineCoordinator, StageOutcome};
pub use ingestion::Ingestor;
