use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content_type::ContentType;
use crate::orchestrator::{BulkReport, ItemState};
use crate::resolver::{ReferenceKind, ResolutionOrigin, ResolvedReference};
use crate::session::TransformSession;
use crate::validation::ValidationReport;

/// Reporter for rendering change reports in various formats
pub struct ChangeReporter {
    output_format: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Console,
    Json,
    Yaml,
}

/// Everything a transform changed, or would change on a dry run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeReport {
    pub content_type: ContentType,
    pub source_id: String,
    pub target_id: Option<String>,
    pub source_org: String,
    pub target_org: String,
    pub dry_run: bool,
    pub id_remaps: Vec<IdRemap>,
    pub references: Vec<ReferenceChange>,
    pub unresolved: Vec<UnresolvedReference>,
    pub warnings: Vec<TransformWarning>,
    pub follow_ups: Vec<FollowUp>,
    /// Follow-ups applied during this run instead of being left to the operator.
    pub applied_follow_ups: Vec<FollowUp>,
    pub stripped_fields: Vec<String>,
    pub catalog: ReferenceCatalog,
    pub circulation: Option<CirculationChange>,
    /// Story redirects carried over to the target website.
    pub redirects: Vec<RedirectCopy>,
    pub validation: Option<ValidationSummary>,
    pub submission: SubmissionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdRemap {
    pub content_type: ContentType,
    pub old_id: String,
    pub new_id: String,
}

/// A reference slot rewritten to its target-org equivalent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceChange {
    pub field_path: String,
    pub kind: ReferenceKind,
    pub source_id: String,
    pub target_id: String,
    pub origin: ResolutionOrigin,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    pub field_path: String,
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformWarning {
    pub message: String,
    pub field_path: Option<String>,
    pub warning_type: WarningType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningType {
    /// Points at a gallery or image whose id changes in the target.
    PhotoCenterReference,
    /// Redirect whose destination id is not stable across organizations.
    UnstableRedirect,
    /// Redirect type had to be guessed.
    AmbiguousRedirect,
    EmptyContainer,
    /// Story redirects could not be listed in the source org.
    RedirectCopy,
    ValidationProblem,
    DryRun,
}

/// Work left for the operator after the transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FollowUp {
    /// Gallery embedding a re-identified image still points at the old id.
    PatchGallery {
        gallery_id: String,
        old_image_id: String,
        new_image_id: String,
    },
    /// Author photos stay in the source org's storage until re-uploaded.
    ReuploadAuthorImage { author_id: String, image_url: String },
}

/// Objects referenced by the document that are not moved with it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCatalog {
    pub authors: Vec<String>,
    pub videos: Vec<String>,
    pub stories: Vec<String>,
    pub images: Vec<String>,
    pub galleries: Vec<String>,
}

impl ReferenceCatalog {
    pub fn add(&mut self, content_type: ContentType, id: &str) {
        let bucket = match content_type {
            ContentType::Author => &mut self.authors,
            ContentType::Video => &mut self.videos,
            ContentType::Story => &mut self.stories,
            ContentType::Image => &mut self.images,
            ContentType::Gallery => &mut self.galleries,
            _ => return,
        };
        if !bucket.iter().any(|existing| existing == id) {
            bucket.push(id.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.authors.len() + self.videos.len() + self.stories.len() + self.images.len() + self.galleries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectCopy {
    pub website_url: String,
    pub outcome: RedirectOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RedirectOutcome {
    WouldCreate,
    Created,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CirculationChange {
    pub source: Value,
    pub target: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_errors: usize,
    pub total_warnings: usize,
    pub deprecated_fields_count: usize,
    pub missing_required_fields_count: usize,
    pub is_valid: bool,
    pub problems: Vec<String>,
}

impl From<&ValidationReport> for ValidationSummary {
    fn from(report: &ValidationReport) -> Self {
        Self {
            total_errors: report.errors.len(),
            total_warnings: report.warnings.len(),
            deprecated_fields_count: report.deprecated_fields.len(),
            missing_required_fields_count: report.missing_required_fields.len(),
            is_valid: report.is_valid,
            problems: report.problems(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionStatus {
    NotAttempted,
    /// Dry run: the document would have been submitted.
    WouldSubmit,
    Submitted { target_id: Option<String>, http_status: u16 },
    Skipped { reason: String },
}

impl TransformWarning {
    pub fn new(message: impl Into<String>, warning_type: WarningType) -> Self {
        Self {
            message: message.into(),
            field_path: None,
            warning_type,
        }
    }

    pub fn with_field_path(mut self, field_path: impl Into<String>) -> Self {
        self.field_path = Some(field_path.into());
        self
    }
}

impl ChangeReport {
    pub fn new(content_type: ContentType, source_id: impl Into<String>, session: &TransformSession) -> Self {
        Self {
            content_type,
            source_id: source_id.into(),
            target_id: None,
            source_org: session.source_org.clone(),
            target_org: session.target_org.clone(),
            dry_run: session.dry_run,
            id_remaps: Vec::new(),
            references: Vec::new(),
            unresolved: Vec::new(),
            warnings: Vec::new(),
            follow_ups: Vec::new(),
            applied_follow_ups: Vec::new(),
            stripped_fields: Vec::new(),
            catalog: ReferenceCatalog::default(),
            circulation: None,
            redirects: Vec::new(),
            validation: None,
            submission: SubmissionStatus::NotAttempted,
        }
    }

    pub fn record_remap(&mut self, content_type: ContentType, old_id: &str, new_id: &str) {
        if self.id_remaps.iter().any(|r| r.old_id == old_id) {
            return;
        }
        self.id_remaps.push(IdRemap {
            content_type,
            old_id: old_id.to_string(),
            new_id: new_id.to_string(),
        });
    }

    pub fn remap_for(&self, old_id: &str) -> Option<&str> {
        self.id_remaps
            .iter()
            .find(|r| r.old_id == old_id)
            .map(|r| r.new_id.as_str())
    }

    pub fn record_reference(&mut self, field_path: impl Into<String>, reference: &ResolvedReference, cache_hit: bool) {
        self.references.push(ReferenceChange {
            field_path: field_path.into(),
            kind: reference.kind,
            source_id: reference.source_id.clone(),
            target_id: reference.target_id.clone(),
            origin: reference.origin,
            cache_hit,
        });
    }

    /// References newly created in the target org (or placeholders on a dry run).
    pub fn references_created(&self) -> usize {
        self.references
            .iter()
            .filter(|r| !r.cache_hit && matches!(r.origin, ResolutionOrigin::Created | ResolutionOrigin::Placeholder))
            .count()
    }

    pub fn flag_unresolved(&mut self, field_path: impl Into<String>, id: impl Into<String>, reason: impl Into<String>) {
        self.unresolved.push(UnresolvedReference {
            field_path: field_path.into(),
            id: id.into(),
            reason: reason.into(),
        });
    }

    pub fn add_warning(&mut self, warning: TransformWarning) {
        self.warnings.push(warning);
    }

    pub fn add_follow_up(&mut self, follow_up: FollowUp) {
        if !self.follow_ups.contains(&follow_up) {
            self.follow_ups.push(follow_up);
        }
    }

    /// Move a follow-up to the applied list.
    pub fn complete_follow_up(&mut self, follow_up: &FollowUp) {
        if let Some(index) = self.follow_ups.iter().position(|f| f == follow_up) {
            let done = self.follow_ups.remove(index);
            self.applied_follow_ups.push(done);
        }
    }

    pub fn record_redirect(&mut self, website_url: impl Into<String>, outcome: RedirectOutcome) {
        self.redirects.push(RedirectCopy {
            website_url: website_url.into(),
            outcome,
        });
    }

    pub fn record_stripped(&mut self, field_path: impl Into<String>) {
        self.stripped_fields.push(field_path.into());
    }

    pub fn set_validation(&mut self, report: &ValidationReport) {
        self.validation = Some(ValidationSummary::from(report));
    }
}

impl ChangeReporter {
    pub fn new() -> Self {
        Self {
            output_format: ReportFormat::Console,
        }
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn format_report(&self, report: &ChangeReport) -> Result<String, ReportError> {
        match self.output_format {
            ReportFormat::Console => Ok(self.format_console_report(report)),
            ReportFormat::Json => to_json(report),
            ReportFormat::Yaml => to_yaml(report),
        }
    }

    pub fn format_bulk_report(&self, report: &BulkReport) -> Result<String, ReportError> {
        match self.output_format {
            ReportFormat::Console => Ok(self.format_console_bulk_report(report)),
            ReportFormat::Json => to_json(report),
            ReportFormat::Yaml => to_yaml(report),
        }
    }

    /// Next steps an operator should take after this transform
    fn generate_recommendations(&self, report: &ChangeReport) -> Vec<String> {
        let mut recommendations = Vec::new();

        if !report.unresolved.is_empty() {
            recommendations.push(
                "Move the unresolved Photo Center objects first, then re-run to rewrite their ids".to_string(),
            );
        }
        if !report.follow_ups.is_empty() {
            recommendations.push("Apply the follow-up actions listed above".to_string());
        }
        if report.validation.as_ref().is_some_and(|v| !v.is_valid) {
            recommendations.push("Fix validation problems before submitting to the target organization".to_string());
        }
        if !report.catalog.is_empty() {
            recommendations.push("Referenced objects in the catalog are not moved with this document".to_string());
        }
        if report.dry_run {
            recommendations.push("Re-run without --dry-run to submit".to_string());
        }

        recommendations
    }

    fn format_console_report(&self, report: &ChangeReport) -> String {
        let mut output = String::new();

        output.push_str("=== ANS Transfer Report ===\n\n");
        output.push_str(&format!(
            "{} {} -> {}\n",
            report.content_type,
            report.source_id,
            report.target_id.as_deref().unwrap_or("(none)")
        ));
        output.push_str(&format!("Organizations: {} -> {}\n", report.source_org, report.target_org));
        if report.dry_run {
            output.push_str("Mode: DRY RUN\n");
        }
        output.push_str(&format!("Submission: {}\n", describe_submission(&report.submission)));

        if !report.id_remaps.is_empty() {
            output.push_str("\nId remaps:\n");
            for remap in &report.id_remaps {
                output.push_str(&format!("  {} {} -> {}\n", remap.content_type, remap.old_id, remap.new_id));
            }
        }

        if !report.references.is_empty() {
            output.push_str(&format!("\nReferences ({} created):\n", report.references_created()));
            for reference in &report.references {
                output.push_str(&format!(
                    "  {} [{}] {} -> {} ({:?})\n",
                    reference.field_path, reference.kind, reference.source_id, reference.target_id, reference.origin
                ));
            }
        }

        if !report.unresolved.is_empty() {
            output.push_str("\nUnresolved:\n");
            for unresolved in &report.unresolved {
                output.push_str(&format!("  {} {}: {}\n", unresolved.field_path, unresolved.id, unresolved.reason));
            }
        }

        if !report.warnings.is_empty() {
            output.push_str("\nWarnings:\n");
            for warning in &report.warnings {
                match &warning.field_path {
                    Some(path) => output.push_str(&format!("  {}: {}\n", path, warning.message)),
                    None => output.push_str(&format!("  {}\n", warning.message)),
                }
            }
        }

        if !report.follow_ups.is_empty() {
            output.push_str("\nFollow-ups:\n");
            for follow_up in &report.follow_ups {
                output.push_str(&format!("  {}\n", describe_follow_up(follow_up)));
            }
        }

        if !report.applied_follow_ups.is_empty() {
            output.push_str("\nApplied:\n");
            for follow_up in &report.applied_follow_ups {
                output.push_str(&format!("  {}\n", describe_follow_up(follow_up)));
            }
        }

        if !report.redirects.is_empty() {
            output.push_str("\nRedirects:\n");
            for redirect in &report.redirects {
                let outcome = match &redirect.outcome {
                    RedirectOutcome::WouldCreate => "would create".to_string(),
                    RedirectOutcome::Created => "created".to_string(),
                    RedirectOutcome::Failed { reason } => format!("failed: {reason}"),
                };
                output.push_str(&format!("  {} ({})\n", redirect.website_url, outcome));
            }
        }

        if !report.catalog.is_empty() {
            output.push_str("\nReferenced objects:\n");
            for (label, ids) in [
                ("authors", &report.catalog.authors),
                ("videos", &report.catalog.videos),
                ("stories", &report.catalog.stories),
                ("images", &report.catalog.images),
                ("galleries", &report.catalog.galleries),
            ] {
                if !ids.is_empty() {
                    output.push_str(&format!("  {}: {}\n", label, ids.join(", ")));
                }
            }
        }

        if let Some(validation) = &report.validation {
            output.push_str(&format!(
                "\nValidation Status: {}\n",
                if validation.is_valid { "VALID" } else { "INVALID" }
            ));
            for problem in &validation.problems {
                output.push_str(&format!("  {}\n", problem));
            }
        }

        let recommendations = self.generate_recommendations(report);
        if !recommendations.is_empty() {
            output.push_str("\nRecommendations:\n");
            for rec in &recommendations {
                output.push_str(&format!("  • {}\n", rec));
            }
        }

        output
    }

    fn format_console_bulk_report(&self, report: &BulkReport) -> String {
        let mut output = String::new();

        output.push_str("=== ANS Bulk Transfer Report ===\n\n");
        output.push_str(&format!("Content type: {}\n", report.content_type));
        output.push_str(&format!(
            "Succeeded: {}  Failed: {}  Skipped: {}  Total: {}\n\n",
            report.counts.succeeded, report.counts.failed, report.counts.skipped, report.counts.total
        ));

        for outcome in &report.outcomes {
            let marker = match outcome.state {
                ItemState::Succeeded => "ok",
                ItemState::Failed => "FAILED",
                ItemState::Skipped => "skipped",
                ItemState::Pending | ItemState::InProgress => "incomplete",
            };
            output.push_str(&format!("  [{}] {}", marker, outcome.item_id));
            if let Some(error) = &outcome.error {
                output.push_str(&format!(": {}", error));
            }
            output.push('\n');
        }

        output
    }
}

impl Default for ChangeReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn to_json<T: Serialize>(report: &T) -> Result<String, ReportError> {
    serde_json::to_string_pretty(report).map_err(|e| ReportError::SerializationError(e.to_string()))
}

fn to_yaml<T: Serialize>(report: &T) -> Result<String, ReportError> {
    serde_yaml::to_string(report).map_err(|e| ReportError::SerializationError(e.to_string()))
}

fn describe_submission(status: &SubmissionStatus) -> String {
    match status {
        SubmissionStatus::NotAttempted => "not attempted".to_string(),
        SubmissionStatus::WouldSubmit => "would submit".to_string(),
        SubmissionStatus::Submitted { target_id, http_status } => match target_id {
            Some(id) => format!("submitted as {id} ({http_status})"),
            None => format!("submitted ({http_status})"),
        },
        SubmissionStatus::Skipped { reason } => format!("skipped: {reason}"),
    }
}

fn describe_follow_up(follow_up: &FollowUp) -> String {
    match follow_up {
        FollowUp::PatchGallery { gallery_id, old_image_id, new_image_id } => {
            format!("patch gallery {gallery_id}: replace image {old_image_id} with {new_image_id}")
        }
        FollowUp::ReuploadAuthorImage { author_id, image_url } => {
            format!("re-upload photo for author {author_id} from {image_url}")
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ChangeReport {
        let session = TransformSession::new("orga", "orgb");
        ChangeReport::new(ContentType::Gallery, "G1", &session)
    }

    #[test]
    fn test_reporter_with_format() {
        let reporter = ChangeReporter::new().with_format(ReportFormat::Json);
        assert_eq!(reporter.output_format, ReportFormat::Json);
    }

    #[test]
    fn test_catalog_deduplicates() {
        let mut catalog = ReferenceCatalog::default();
        catalog.add(ContentType::Author, "KilgoreTrout");
        catalog.add(ContentType::Author, "KilgoreTrout");
        catalog.add(ContentType::Redirect, "ignored");
        assert_eq!(catalog.authors, vec!["KilgoreTrout".to_string()]);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_references_created_ignores_cache_hits_and_reuse() {
        let mut report = report();
        let created = ResolvedReference {
            kind: ReferenceKind::Distributor,
            source_id: "D1".to_string(),
            target_id: "DB1".to_string(),
            origin: ResolutionOrigin::Created,
        };
        let reused = ResolvedReference {
            origin: ResolutionOrigin::Reused,
            source_id: "D2".to_string(),
            ..created.clone()
        };
        report.record_reference("distributor.reference_id", &created, false);
        report.record_reference("promo_items.basic.distributor.reference_id", &created, true);
        report.record_reference("x", &reused, false);
        assert_eq!(report.references_created(), 1);
    }

    #[test]
    fn test_format_console_report() {
        let mut report = report();
        report.target_id = Some("NEWGALLERY".to_string());
        report.record_remap(ContentType::Gallery, "G1", "NEWGALLERY");
        report.add_follow_up(FollowUp::PatchGallery {
            gallery_id: "G9".to_string(),
            old_image_id: "I1".to_string(),
            new_image_id: "I1NEW".to_string(),
        });
        report.record_redirect("/2023/01/old-story/", RedirectOutcome::WouldCreate);
        report.submission = SubmissionStatus::WouldSubmit;

        let formatted = ChangeReporter::new().format_report(&report).unwrap();
        assert!(formatted.contains("ANS Transfer Report"));
        assert!(formatted.contains("gallery G1 -> NEWGALLERY"));
        assert!(formatted.contains("patch gallery G9"));
        assert!(formatted.contains("would submit"));
        assert!(formatted.contains("/2023/01/old-story/ (would create)"));
    }

    #[test]
    fn test_json_and_yaml_rendering() {
        let mut report = report();
        report.record_remap(ContentType::Gallery, "G1", "G2");

        let json = ChangeReporter::new().with_format(ReportFormat::Json).format_report(&report).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["id_remaps"][0]["new_id"], "G2");
        assert_eq!(parsed["submission"]["status"], "not_attempted");

        let yaml = ChangeReporter::new().with_format(ReportFormat::Yaml).format_report(&report).unwrap();
        assert!(yaml.contains("old_id: G1"));
    }

    #[test]
    fn test_duplicate_remaps_and_follow_ups_are_recorded_once() {
        let mut report = report();
        report.record_remap(ContentType::Image, "I1", "A");
        report.record_remap(ContentType::Image, "I1", "B");
        assert_eq!(report.remap_for("I1"), Some("A"));

        let follow_up = FollowUp::ReuploadAuthorImage {
            author_id: "KilgoreTrout".to_string(),
            image_url: "https://cdn/kt.jpg".to_string(),
        };
        report.add_follow_up(follow_up.clone());
        report.add_follow_up(follow_up);
        assert_eq!(report.follow_ups.len(), 1);
    }
}
