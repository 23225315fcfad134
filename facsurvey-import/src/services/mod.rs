//! Import pipeline services
//!
//! - `source_client`: pulls raw submissions from the survey platform
//! - `facility_resolver`: get-or-create for the facility a survey describes
//! - `import_orchestrator`: drives staged records through the pipeline

pub mod facility_resolver;
pub mod import_orchestrator;
pub mod source_client;

pub use facility_resolver::{FacilityResolver, MAX_RESOLVE_ATTEMPTS};
pub use import_orchestrator::{ImportOrchestrator, OrchestratorOptions};
pub use source_client::{SourceClient, SurveySource};
