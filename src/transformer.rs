use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::client::ArcClient;
use crate::content_type::ContentType;
use crate::document::set_path;
use crate::error::{Result, TransferError};
use crate::report::{ChangeReport, TransformWarning, WarningType};
use crate::resolver::ResolutionOrigin;
use crate::rules::{
    AuthorRules, CollectionRules, GalleryRules, ImageRules, LightboxRules, RedirectRules, RuleContext, RuleSet,
    StoryRules, VideoRules,
};
use crate::session::{SessionState, TransformSession};
use crate::validation::{prepare_for_validation, restore_parked_fields, AnsValidator, ValidationReport};

/// Dispatches a document to the rule set registered for its content type
/// and runs the shared transformation steps.
pub struct ContentTransformer {
    rules: HashMap<ContentType, Box<dyn RuleSet>>,
    validator: AnsValidator,
}

/// Result of transforming one document
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub document: Value,
    pub report: ChangeReport,
    pub validation: ValidationReport,
}

impl ContentTransformer {
    /// Transformer with no rule sets registered.
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
            validator: AnsValidator::new(),
        }
    }

    /// Transformer with a rule set for every supported content type.
    pub fn with_default_rules() -> Self {
        let mut transformer = Self::new();
        transformer.register(Box::new(StoryRules));
        transformer.register(Box::new(VideoRules));
        transformer.register(Box::new(GalleryRules));
        transformer.register(Box::new(ImageRules));
        transformer.register(Box::new(AuthorRules));
        transformer.register(Box::new(RedirectRules));
        transformer.register(Box::new(LightboxRules));
        transformer.register(Box::new(CollectionRules));
        transformer
    }

    pub fn register(&mut self, rules: Box<dyn RuleSet>) {
        self.rules.insert(rules.content_type(), rules);
    }

    pub fn with_validator(mut self, validator: AnsValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn rules_for(&self, content_type: ContentType) -> Result<&dyn RuleSet> {
        self.rules
            .get(&content_type)
            .map(Box::as_ref)
            .ok_or_else(|| TransferError::UnsupportedType(content_type.to_string()))
    }

    pub fn supported_types(&self) -> Vec<ContentType> {
        let mut types: Vec<ContentType> = self.rules.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }

    /// Transform a fetched source document for the session's target org.
    ///
    /// Reference creation in the target and the target's ANS validation go
    /// through `client`; nothing is submitted here.
    pub async fn transform<C: ArcClient>(
        &self,
        client: &C,
        session: &TransformSession,
        state: &mut SessionState,
        content_type: ContentType,
        source_id: &str,
        source: Value,
    ) -> Result<TransformOutput> {
        let rules = self.rules_for(content_type)?;
        if !source.is_object() {
            return Err(TransferError::InvalidDocument(format!(
                "{content_type} {source_id} is not a JSON object"
            )));
        }

        let mut document = source.clone();
        let mut report = ChangeReport::new(content_type, source_id, session);

        let target_id = {
            let mut ctx = RuleContext {
                session,
                source: &source,
                generator: &mut state.generator,
                remaps: &mut state.remaps,
                report: &mut report,
            };
            rules.strip(&mut document, &mut ctx);
            rules.rewrite_owner(&mut document, &mut ctx);
            rules.place(&mut document, &mut ctx);
            rules.reidentify(&mut document, &mut ctx)?
        };

        for slot in rules.reference_slots(&document) {
            let resolution = state
                .resolver
                .resolve(client, session, slot.kind, &slot.source_id)
                .await?;
            if let Some(target) = document.pointer_mut(&slot.pointer) {
                *target = json!(resolution.reference.target_id);
            }
            let field_path = slot.pointer.trim_start_matches('/').replace('/', ".");
            debug!(%field_path, source_id = %slot.source_id, target_id = %resolution.reference.target_id, "rewrote reference");
            report.record_reference(field_path, &resolution.reference, resolution.cache_hit);
        }

        {
            let mut ctx = RuleContext {
                session,
                source: &source,
                generator: &mut state.generator,
                remaps: &mut state.remaps,
                report: &mut report,
            };
            rules.type_specific_pass(&mut document, &mut ctx)?;
        }

        if let Some(version) = content_type.ans_version() {
            set_path(&mut document, "version", json!(version.to_string()));
        }

        let parked = prepare_for_validation(content_type, &mut document);
        let mut validation = self.validator.validate_prepared(content_type, &document);
        if validation.has_errors() && session.strict {
            return Err(TransferError::ValidationFailed(validation));
        }
        if let Some(version) = content_type.ans_version() {
            let violations = client
                .validate_ans(&session.target_org, &session.target_token, &version, &document)
                .await?;
            debug!(%content_type, source_id, violations = violations.len(), "target ANS validation");
            validation.add_target_violations(violations);
        }
        restore_parked_fields(&mut document, parked);

        report.set_validation(&validation);
        // Placeholder ids from a dry run are expected to fail the target's schema.
        let has_placeholders = report.references.iter().any(|r| r.origin == ResolutionOrigin::Placeholder);
        if validation.rejected_by_target() && !(session.dry_run && has_placeholders) {
            return Err(TransferError::ValidationFailed(validation));
        }
        if validation.has_errors() {
            for problem in validation.problems() {
                warn!(%content_type, source_id, %problem, "validation problem");
                report.add_warning(TransformWarning::new(problem, WarningType::ValidationProblem));
            }
        }

        report.target_id = target_id;
        info!(
            %content_type,
            source_id,
            target_id = report.target_id.as_deref().unwrap_or("<assigned by target>"),
            references = report.references.len(),
            remaps = report.id_remaps.len(),
            warnings = report.warnings.len(),
            "transformed document"
        );

        Ok(TransformOutput {
            document,
            report,
            validation,
        })
    }
}

impl Default for ContentTransformer {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ReferenceKind;
    use crate::testing::{ClientCall, MemoryClient};

    fn session() -> TransformSession {
        TransformSession::new("orga", "orgb")
            .with_tokens("token-a", "token-b")
            .with_website("site-b")
    }

    fn story() -> Value {
        json!({
            "_id": "S1",
            "type": "story",
            "version": "0.10.7",
            "owner": {"id": "orga"},
            "canonical_website": "site-a",
            "distributor": {"category": "wires", "reference_id": "D1"},
            "revision": {"revision_id": "R"},
            "content_elements": [{"type": "text", "content": "hello"}]
        })
    }

    fn client() -> MemoryClient {
        MemoryClient::new().with_reference("orga", ReferenceKind::Distributor, "D1", json!({"id": "D1", "name": "Wire"}))
    }

    #[tokio::test]
    async fn test_story_transform_creates_distributor() {
        let client = client();
        let transformer = ContentTransformer::with_default_rules();
        let mut state = SessionState::new();

        let output = transformer
            .transform(&client, &session(), &mut state, ContentType::Story, "S1", story())
            .await
            .unwrap();

        let created = client.created_references();
        assert_eq!(created.len(), 1);
        assert_eq!(output.document["_id"], "S1");
        assert_eq!(output.document["owner"]["id"], "orgb");
        assert_eq!(output.document["version"], "0.10.9");
        assert_eq!(output.document["canonical_website"], "site-b");
        assert_eq!(output.document["distributor"]["reference_id"], created[0].as_str());
        assert!(output.document.get("revision").is_none());

        assert_eq!(output.report.target_id.as_deref(), Some("S1"));
        assert_eq!(output.report.references_created(), 1);
        assert_eq!(output.report.references[0].field_path, "distributor.reference_id");
        assert_eq!(output.report.references[0].origin, ResolutionOrigin::Created);
        assert!(!output.validation.has_errors());
    }

    #[tokio::test]
    async fn test_unregistered_type_is_unsupported() {
        let transformer = ContentTransformer::new();
        let mut state = SessionState::new();
        let err = transformer
            .transform(&MemoryClient::new(), &session(), &mut state, ContentType::Story, "S1", story())
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::UnsupportedType(ref t) if t == "story"));
    }

    #[tokio::test]
    async fn test_missing_distributor_fails_item() {
        let transformer = ContentTransformer::with_default_rules();
        let mut state = SessionState::new();
        let err = transformer
            .transform(&MemoryClient::new(), &session(), &mut state, ContentType::Story, "S1", story())
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::MissingReference { kind: ReferenceKind::Distributor, .. }));
    }

    #[tokio::test]
    async fn test_strict_session_rejects_invalid_document() {
        let transformer = ContentTransformer::with_default_rules();
        let mut state = SessionState::new();
        let mut source = story();
        source.as_object_mut().unwrap().remove("type");

        let lenient = transformer
            .transform(&client(), &session(), &mut state, ContentType::Story, "S1", source.clone())
            .await
            .unwrap();
        assert!(lenient
            .report
            .warnings
            .iter()
            .any(|w| w.warning_type == WarningType::ValidationProblem));

        let err = transformer
            .transform(&client(), &session().with_strict(true), &mut SessionState::new(), ContentType::Story, "S1", source)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_target_rejection_fails_lenient_session() {
        let client = client().with_ans_violation("S1", ".promo_items", "should NOT have additional properties");
        let transformer = ContentTransformer::with_default_rules();
        let mut state = SessionState::new();

        let err = transformer
            .transform(&client, &session(), &mut state, ContentType::Story, "S1", story())
            .await
            .unwrap_err();

        let validation = match err {
            TransferError::ValidationFailed(validation) => validation,
            other => panic!("expected a validation failure, got {other:?}"),
        };
        assert!(validation.rejected_by_target());
        assert_eq!(validation.errors[0].field_path, ".promo_items");
        assert!(client.calls().contains(&ClientCall::ValidateAns {
            org: "orgb".to_string(),
            id: "S1".to_string(),
            version: "0.10.9".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_strict_local_failure_skips_target_validation() {
        let client = client();
        let transformer = ContentTransformer::with_default_rules();
        let mut source = story();
        source.as_object_mut().unwrap().remove("type");

        let err = transformer
            .transform(&client, &session().with_strict(true), &mut SessionState::new(), ContentType::Story, "S1", source)
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::ValidationFailed(ref v) if !v.rejected_by_target()));
        assert!(!client.calls().iter().any(|c| matches!(c, ClientCall::ValidateAns { .. })));
    }

    #[tokio::test]
    async fn test_dry_run_placeholders_tolerate_target_rejection() {
        let client = client().with_ans_violation("S1", ".distributor.reference_id", "should match exactly one schema in oneOf");
        let transformer = ContentTransformer::with_default_rules();
        let mut state = SessionState::new();

        let output = transformer
            .transform(&client, &session().with_dry_run(true), &mut state, ContentType::Story, "S1", story())
            .await
            .unwrap();

        assert!(output.validation.rejected_by_target());
        assert!(output
            .report
            .warnings
            .iter()
            .any(|w| w.warning_type == WarningType::ValidationProblem));
    }

    #[tokio::test]
    async fn test_authors_skip_target_validation() {
        let client = MemoryClient::new();
        let transformer = ContentTransformer::with_default_rules();
        let author = json!({"_id": "KilgoreTrout", "byline": "Kilgore Trout"});

        transformer
            .transform(&client, &session(), &mut SessionState::new(), ContentType::Author, "KilgoreTrout", author)
            .await
            .unwrap();
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transform_is_idempotent_on_placement_fields() {
        let client = client();
        let transformer = ContentTransformer::with_default_rules();
        let mut state = SessionState::new();

        let once = transformer
            .transform(&client, &session(), &mut state, ContentType::Story, "S1", story())
            .await
            .unwrap();
        let twice = transformer
            .transform(&client, &session(), &mut state, ContentType::Story, "S1", once.document.clone())
            .await
            .unwrap();

        for field in ["owner", "canonical_website", "circulations", "additional_properties", "version"] {
            assert_eq!(once.document.get(field), twice.document.get(field), "{field} changed on second pass");
        }
    }

    #[test]
    fn test_default_rules_cover_every_type() {
        let transformer = ContentTransformer::with_default_rules();
        assert_eq!(transformer.supported_types().len(), ContentType::ALL.len());
    }
}
