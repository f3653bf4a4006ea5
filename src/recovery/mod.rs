//! Recovery of a structured transcript from whatever text an agent run
//! returned, plus the artifacts that record the outcome.

pub mod artifacts;
pub mod extract;
pub mod outcome;
pub mod persist;
pub mod segment;

pub use artifacts::{list_artifacts, ArtifactEntry, ArtifactKind, ArtifactPaths};
pub use extract::extract_json_object;
pub use outcome::{recover, FailureReason, RawAgentResult, RecoveryOutcome};
pub use persist::{diagnostic_path, persist};
pub use segment::{TranscriptSegment, TranscriptSet};
