//! Entry points the driver calls: fetch, transform, check, submit.

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::client::{ArcClient, ClientError};
use crate::content_type::ContentType;
use crate::document::{array_at_mut, element_id, get_str, remove_path, rewrite_element_id};
use crate::error::{Result, TransferError};
use crate::orchestrator::{BulkOrchestrator, BulkReport, ItemProcessor};
use crate::report::{ChangeReport, FollowUp, RedirectOutcome, SubmissionStatus, TransformWarning, WarningType};
use crate::resolver::ResolutionOrigin;
use crate::rules::RedirectKind;
use crate::session::{SessionState, TransformSession};
use crate::transformer::ContentTransformer;

/// Types whose id is kept across organizations and must not collide with a
/// differently-owned object in the target.
const ID_PRESERVING_TYPES: [ContentType; 3] = [ContentType::Story, ContentType::Video, ContentType::Author];

/// One transfer session bound to a client.
pub struct TransferPipeline<C> {
    client: C,
    session: TransformSession,
    transformer: ContentTransformer,
    state: SessionState,
}

impl<C: ArcClient> TransferPipeline<C> {
    pub fn new(client: C, session: TransformSession) -> Self {
        if session.dry_run {
            warn!(
                source_org = %session.source_org,
                target_org = %session.target_org,
                "DRY RUN: nothing will be created or submitted in the target organization"
            );
        }
        Self {
            client,
            session,
            transformer: ContentTransformer::with_default_rules(),
            state: SessionState::new(),
        }
    }

    pub fn with_transformer(mut self, transformer: ContentTransformer) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn session(&self) -> &TransformSession {
        &self.session
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Transform one object and, unless this is a dry run, submit it.
    pub async fn transform_one(&mut self, content_type: ContentType, source_id: &str) -> Result<(Value, ChangeReport)> {
        self.transformer.rules_for(content_type)?;
        let source = self
            .client
            .fetch_ans(&self.session.source_org, &self.session.source_token, content_type, source_id)
            .await?
            .ok_or_else(|| {
                ClientError::NotFound(format!("{content_type} {source_id} in {}", self.session.source_org))
            })?;
        self.process_document(content_type, source_id, source).await
    }

    /// Transform every object of a bulk type, isolating per-item failures.
    pub async fn transform_all(&mut self, content_type: ContentType) -> Result<BulkReport> {
        self.transformer.rules_for(content_type)?;
        if !content_type.supports_bulk() {
            return Err(TransferError::UnsupportedType(format!("{content_type} has no bulk variant")));
        }
        let items = self
            .client
            .fetch_collection(&self.session.source_org, &self.session.source_token, content_type)
            .await?;
        info!(%content_type, items = items.len(), "fetched source collection");
        let orchestrator = BulkOrchestrator::new(self.session.max_iterations);
        orchestrator.run(content_type, items, self).await
    }

    async fn process_document(
        &mut self,
        content_type: ContentType,
        source_id: &str,
        source: Value,
    ) -> Result<(Value, ChangeReport)> {
        if ID_PRESERVING_TYPES.contains(&content_type) {
            self.check_conflict(content_type, source_id).await?;
        }
        let output = self
            .transformer
            .transform(&self.client, &self.session, &mut self.state, content_type, source_id, source)
            .await?;
        let mut document = output.document;
        let mut report = output.report;

        self.submit(content_type, &document, &mut report).await?;

        if content_type == ContentType::Story
            && matches!(report.submission, SubmissionStatus::Submitted { .. } | SubmissionStatus::WouldSubmit)
        {
            let story_id = report.target_id.clone().unwrap_or_else(|| source_id.to_string());
            self.copy_story_redirects(&story_id, &mut report).await;
        }

        if content_type == ContentType::Image && self.session.patch_dependent_galleries && !self.session.dry_run {
            self.patch_dependent_galleries(&mut report).await?;
        }

        if content_type == ContentType::Redirect {
            remove_path(&mut document, "redirect_kind");
        }
        Ok((document, report))
    }

    /// Fail when the target already holds an object at `id` that did not
    /// come from the source organization.
    async fn check_conflict(&self, content_type: ContentType, id: &str) -> Result<()> {
        if !self.session.is_cross_org() || !ID_PRESERVING_TYPES.contains(&content_type) {
            return Ok(());
        }
        let existing = match self
            .client
            .fetch_ans(&self.session.target_org, &self.session.target_token, content_type, id)
            .await
        {
            Ok(existing) => existing,
            Err(ClientError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        let Some(existing) = existing else {
            return Ok(());
        };
        if self.is_same_origin(&existing) {
            debug!(%content_type, id, "target copy has the same origin, overwriting");
            return Ok(());
        }
        let owner = get_str(&existing, "additional_properties.ingestionMethod")
            .or_else(|| get_str(&existing, "owner.id"))
            .unwrap_or("unknown")
            .to_string();
        Err(TransferError::ConflictingIdentifier {
            content_type,
            id: id.to_string(),
            owner,
        })
    }

    fn is_same_origin(&self, existing: &Value) -> bool {
        get_str(existing, "additional_properties.arcOriginalId.org") == Some(self.session.source_org.as_str())
            || get_str(existing, "additional_properties.ingestionMethod")
                == Some(self.session.provenance_label().as_str())
    }

    async fn submit(&self, content_type: ContentType, document: &Value, report: &mut ChangeReport) -> Result<()> {
        if content_type == ContentType::Redirect {
            let kind = get_str(document, "redirect_kind").unwrap_or("story");
            if kind != RedirectKind::Story.as_str() {
                report.submission = SubmissionStatus::Skipped {
                    reason: format!("{kind} redirects are not created automatically"),
                };
                return Ok(());
            }
        }

        if report.warnings.iter().any(|w| w.warning_type == WarningType::EmptyContainer) {
            report.submission = SubmissionStatus::Skipped {
                reason: format!("{content_type} has nothing to carry over"),
            };
            info!(%content_type, source_id = %report.source_id, "empty container, not submitted");
            return Ok(());
        }

        if self.session.dry_run {
            report.submission = SubmissionStatus::WouldSubmit;
            if report.references.iter().any(|r| r.origin == ResolutionOrigin::Placeholder) {
                report.add_warning(TransformWarning::new(
                    "references that would be created carry placeholder ids",
                    WarningType::DryRun,
                ));
            }
            info!(%content_type, source_id = %report.source_id, "dry run: would submit");
            return Ok(());
        }

        let confirmation = self
            .client
            .submit_ans(&self.session.target_org, &self.session.target_token, content_type, document)
            .await
            .map_err(|e| match e {
                ClientError::Conflict(message) => TransferError::ConflictingIdentifier {
                    content_type,
                    id: report.target_id.clone().unwrap_or_else(|| report.source_id.clone()),
                    owner: message,
                },
                other => other.into(),
            })?;
        if report.target_id.is_none() {
            report.target_id = confirmation.id.clone();
        }
        info!(
            %content_type,
            source_id = %report.source_id,
            target_id = confirmation.id.as_deref().unwrap_or("-"),
            status = confirmation.status,
            target_org = %self.session.target_org,
            "submitted"
        );
        report.submission = SubmissionStatus::Submitted {
            target_id: confirmation.id,
            http_status: confirmation.status,
        };
        Ok(())
    }

    /// Recreate the story's source-website redirects on the target website.
    /// A redirect that cannot be created is reported and does not fail the story.
    async fn copy_story_redirects(&self, story_id: &str, report: &mut ChangeReport) {
        let (Some(source_website), Some(target_website)) =
            (self.session.source_website.as_deref(), self.session.target_website.as_deref())
        else {
            debug!(story_id, "no source website configured, story redirects not copied");
            return;
        };
        let redirects = match self
            .client
            .fetch_story_redirects(&self.session.source_org, &self.session.source_token, story_id, source_website)
            .await
        {
            Ok(redirects) => redirects,
            Err(e) => {
                warn!(story_id, error = %e, "could not list story redirects");
                report.add_warning(TransformWarning::new(
                    format!("redirects for story {story_id} were not copied: {e}"),
                    WarningType::RedirectCopy,
                ));
                return;
            }
        };

        for redirect in redirects {
            let Some(website_url) = get_str(&redirect, "website_url").map(str::to_string) else {
                continue;
            };
            if self.session.dry_run {
                report.record_redirect(website_url, RedirectOutcome::WouldCreate);
                continue;
            }
            let payload = json!({
                "type": "redirect",
                "website": target_website,
                "website_url": website_url,
                "document_id": story_id,
            });
            let outcome = match self
                .client
                .submit_ans(&self.session.target_org, &self.session.target_token, ContentType::Redirect, &payload)
                .await
            {
                Ok(_) => {
                    info!(story_id, %website_url, website = target_website, "created story redirect");
                    RedirectOutcome::Created
                }
                Err(e) => {
                    warn!(story_id, %website_url, error = %e, "story redirect not created");
                    RedirectOutcome::Failed { reason: e.to_string() }
                }
            };
            report.record_redirect(website_url, outcome);
        }
    }

    /// Apply gallery follow-ups for galleries re-identified earlier in this
    /// session. Anything else stays a follow-up.
    async fn patch_dependent_galleries(&mut self, report: &mut ChangeReport) -> Result<()> {
        let pending: Vec<FollowUp> = report
            .follow_ups
            .iter()
            .filter(|f| matches!(f, FollowUp::PatchGallery { .. }))
            .cloned()
            .collect();

        for follow_up in pending {
            let FollowUp::PatchGallery { gallery_id, old_image_id, new_image_id } = &follow_up else {
                continue;
            };
            let Some(target_gallery_id) = self.state.remaps.get(gallery_id).map(str::to_string) else {
                continue;
            };
            let Some(mut gallery) = self
                .client
                .fetch_ans(&self.session.target_org, &self.session.target_token, ContentType::Gallery, &target_gallery_id)
                .await?
            else {
                continue;
            };

            let mut patched = false;
            if let Some(elements) = array_at_mut(&mut gallery, "content_elements") {
                for element in elements.iter_mut() {
                    let original = get_str(element, "referent.referent_properties.additional_properties.original_arc_id");
                    if element_id(element) == Some(old_image_id.as_str()) || original == Some(old_image_id.as_str()) {
                        if element_id(element) != Some(new_image_id.as_str()) {
                            rewrite_element_id(element, new_image_id);
                            patched = true;
                        }
                    }
                }
            }

            if patched {
                self.client
                    .submit_ans(&self.session.target_org, &self.session.target_token, ContentType::Gallery, &gallery)
                    .await?;
                info!(gallery = %target_gallery_id, image = %new_image_id, "patched dependent gallery");
            }
            report.complete_follow_up(&follow_up);
        }
        Ok(())
    }
}

impl<C: ArcClient> ItemProcessor for TransferPipeline<C> {
    fn item_id(&self, content_type: ContentType, item: &Value) -> String {
        let id = match content_type {
            ContentType::Redirect => get_str(item, "_id").or_else(|| get_str(item, "canonical_url")),
            _ => get_str(item, "_id").or_else(|| get_str(item, "id")),
        };
        id.map(str::to_string).unwrap_or_default()
    }

    async fn process(&mut self, content_type: ContentType, item: Value) -> Result<ChangeReport> {
        let item_id = self.item_id(content_type, &item);
        let (_, report) = self.process_document(content_type, &item_id, item).await?;
        Ok(report)
    }
}
