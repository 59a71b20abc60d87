use serde_json::Value;

use crate::content_type::ContentType;
use crate::document::{array_at, element_id, element_type, get_path_mut};
use crate::error::Result;
use crate::rules::{catalog_authors, placement, remap_photo_center_array, remap_photo_center_element, strip_credit_versions, RuleContext, RuleSet};

/// Stories keep their id; circulations move to the target website.
#[derive(Debug, Default)]
pub struct StoryRules;

impl RuleSet for StoryRules {
    fn content_type(&self) -> ContentType {
        ContentType::Story
    }

    fn strip_paths(&self) -> &'static [&'static str] {
        &["revision"]
    }

    fn place(&self, document: &mut Value, ctx: &mut RuleContext<'_>) {
        placement::rewrite_story_circulations(document, ctx);
    }

    fn type_specific_pass(&self, document: &mut Value, ctx: &mut RuleContext<'_>) -> Result<()> {
        strip_credit_versions(document, ctx);
        catalog_authors(document, ctx);
        catalog_linked_content(document, ctx);

        remap_photo_center_array(document, "content_elements", ctx);
        for slot in ["basic", "lead_art"] {
            if let Some(item) = get_path_mut(document, &format!("promo_items.{slot}")) {
                remap_photo_center_element(item, &format!("promo_items.{slot}"), ctx);
            }
        }
        remap_photo_center_array(document, "related_content.basic", ctx);
        Ok(())
    }
}

/// Videos and stories linked from the body are moved separately; list them.
fn catalog_linked_content(document: &Value, ctx: &mut RuleContext<'_>) {
    let linked = array_at(document, "content_elements")
        .iter()
        .chain(array_at(document, "related_content.basic"));
    for element in linked {
        let content_type = match element_type(element) {
            Some("video") => ContentType::Video,
            Some("story") => ContentType::Story,
            _ => continue,
        };
        if let Some(id) = element_id(element) {
            ctx.report.catalog.add(content_type, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::WarningType;
    use crate::rules::test_support::run_rules;
    use crate::session::{SessionState, TransformSession};
    use serde_json::json;

    fn story() -> Value {
        json!({
            "_id": "S1",
            "type": "story",
            "version": "0.10.7",
            "owner": {"id": "orga"},
            "revision": {"revision_id": "R1", "branch": "default"},
            "canonical_website": "site-a",
            "additional_properties": {},
            "credits": {"by": [
                {"type": "reference", "referent": {"id": "KilgoreTrout", "type": "author"}},
                {"type": "author", "name": "Guest", "version": "0.10.7"}
            ]},
            "content_elements": [
                {"type": "text", "content": "hello"},
                {"type": "reference", "referent": {"id": "IMG1", "type": "image"}},
                {"type": "video", "_id": "VID1"}
            ],
            "related_content": {"basic": [{"type": "reference", "referent": {"id": "S2", "type": "story"}}]},
            "circulations": [{
                "website_id": "site-a",
                "website_primary_section": {"type": "reference", "referent": {"id": "/news", "type": "section", "website": "site-a"}},
                "website_sections": [{"type": "reference", "referent": {"id": "/news", "type": "section", "website": "site-a"}}]
            }]
        })
    }

    #[test]
    fn test_story_keeps_id_and_moves_owner() {
        let session = TransformSession::new("orga", "orgb").with_website("site-b");
        let mut state = SessionState::new();
        let (doc, report, target_id) = run_rules(&StoryRules, &session, &mut state, "S1", story());

        assert_eq!(target_id.as_deref(), Some("S1"));
        assert_eq!(doc["_id"], "S1");
        assert_eq!(doc["owner"]["id"], "orgb");
        assert!(doc.get("revision").is_none());
        assert!(doc["credits"]["by"][1].get("version").is_none());
        assert_eq!(doc["circulations"][0]["website_id"], "site-b");
        assert!(report.stripped_fields.contains(&"revision".to_string()));
    }

    #[test]
    fn test_unmapped_photo_center_reference_is_flagged() {
        let session = TransformSession::new("orga", "orgb").with_website("site-b");
        let mut state = SessionState::new();
        let (doc, report, _) = run_rules(&StoryRules, &session, &mut state, "S1", story());

        assert_eq!(doc["content_elements"][1]["referent"]["id"], "IMG1");
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].field_path, "content_elements[1]");
        assert_eq!(report.warnings[0].warning_type, WarningType::PhotoCenterReference);
        assert_eq!(report.catalog.images, vec!["IMG1".to_string()]);
        assert_eq!(report.catalog.videos, vec!["VID1".to_string()]);
        assert_eq!(report.catalog.stories, vec!["S2".to_string()]);
        assert_eq!(report.catalog.authors, vec!["KilgoreTrout".to_string()]);
    }

    #[test]
    fn test_photo_center_reference_uses_session_remap() {
        let session = TransformSession::new("orga", "orgb").with_website("site-b");
        let mut state = SessionState::new();
        state.remaps.insert("IMG1", "NEWIMAGEID");
        let (doc, report, _) = run_rules(&StoryRules, &session, &mut state, "S1", story());

        assert_eq!(doc["content_elements"][1]["referent"]["id"], "NEWIMAGEID");
        assert!(report.unresolved.is_empty());
        assert_eq!(report.remap_for("IMG1"), Some("NEWIMAGEID"));
    }
}
