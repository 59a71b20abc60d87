// ANS content transfer between organizations
pub mod ans_version;
pub mod client;
pub mod config;
pub mod content_type;
pub mod document;
pub mod endpoints;
pub mod error;
pub mod identifier;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod rules;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transformer;
pub mod validation;

// Re-export core types for convenience
pub use ans_version::AnsVersion;
pub use client::{AnsViolation, ArcClient, ClientError, HttpArcClient, SubmitConfirmation};
pub use content_type::ContentType;
pub use error::{Result, TransferError};
pub use identifier::IdentifierGenerator;
pub use orchestrator::{BulkCounts, BulkOrchestrator, BulkReport, ItemOutcome, ItemState};
pub use pipeline::TransferPipeline;
pub use report::{ChangeReport, ChangeReporter, FollowUp, RedirectOutcome, ReportFormat, SubmissionStatus};
pub use resolver::{ReferenceKind, ReferenceResolver, ResolutionOrigin, ResolvedReference};
pub use session::{Environment, SessionState, TransformSession};
pub use transformer::{ContentTransformer, TransformOutput};
pub use validation::{AnsValidator, SchemaValidator, ValidationReport};
