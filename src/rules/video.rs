use serde_json::{json, Value};

use crate::ans_version::AnsVersion;
use crate::content_type::ContentType;
use crate::document::{get_path, get_str, remove_path, set_path};
use crate::error::Result;
use crate::rules::{catalog_authors, placement, remap_photo_center_array, strip_credit_versions, RuleContext, RuleSet};

/// Videos keep their id across organizations.
#[derive(Debug, Default)]
pub struct VideoRules;

impl RuleSet for VideoRules {
    fn content_type(&self) -> ContentType {
        ContentType::Video
    }

    fn strip_paths(&self) -> &'static [&'static str] {
        &["embed_html", "source.edit_url", "credits.affiliation", "revision"]
    }

    fn place(&self, document: &mut Value, ctx: &mut RuleContext<'_>) {
        placement::rewrite_taxonomy(document, ctx);
    }

    fn type_specific_pass(&self, document: &mut Value, ctx: &mut RuleContext<'_>) -> Result<()> {
        drop_anglerfish_keys(document, ctx);
        rebuild_promo_items(document, ctx);
        strip_credit_versions(document, ctx);
        catalog_authors(document, ctx);
        remap_photo_center_array(document, "related_content.basic", ctx);
        Ok(())
    }
}

/// `additional_properties.anglerfisharc_id` names a sibling key holding the
/// source org's Photo Center copy of the thumbnail; both are meaningless in
/// the target.
fn drop_anglerfish_keys(document: &mut Value, ctx: &mut RuleContext<'_>) {
    let Some(anglerfish_id) = get_str(document, "additional_properties.anglerfisharc_id").map(str::to_string) else {
        return;
    };
    let sibling = format!("additional_properties.{anglerfish_id}");
    if remove_path(document, &sibling).is_some() {
        ctx.report.record_stripped(sibling);
    }
    remove_path(document, "additional_properties.anglerfisharc_id");
    ctx.report.record_stripped("additional_properties.anglerfisharc_id");
}

/// Video promo items are rebuilt from `promo_image.url` so the target imports
/// the thumbnail as a new image.
fn rebuild_promo_items(document: &mut Value, ctx: &mut RuleContext<'_>) {
    if get_path(document, "promo_image").is_none() {
        return;
    }
    let url = get_str(document, "promo_image.url").map(str::to_string);
    remove_path(document, "promo_image");
    match url {
        Some(url) => {
            let promo = json!({
                "basic": {
                    "type": "image",
                    "url": url,
                    "version": AnsVersion::video().to_string(),
                }
            });
            set_path(document, "promo_items", promo);
        }
        None => {
            if remove_path(document, "promo_items").is_some() {
                ctx.report.record_stripped("promo_items");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::run_rules;
    use crate::session::{SessionState, TransformSession};

    fn video() -> Value {
        json!({
            "_id": "VID1",
            "type": "video",
            "owner": {"id": "orga"},
            "embed_html": "<div></div>",
            "source": {"edit_url": "https://orga/edit", "name": "wire"},
            "credits": {"affiliation": [{"name": "AP"}], "by": []},
            "promo_image": {"url": "https://cdn/thumb.jpg"},
            "promo_items": {"basic": {"type": "image", "_id": "OLDTHUMB"}},
            "additional_properties": {"anglerfisharc_id": "THUMB1", "THUMB1": {"url": "x"}},
            "canonical_url": "/video/clip",
            "taxonomy": {"primary_section": {"_id": "/video"}, "sections": [{"_id": "/video"}]}
        })
    }

    #[test]
    fn test_video_strips_and_rebuilds_promo() {
        let session = TransformSession::to_sandbox("orga").with_website("site-a");
        let mut state = SessionState::new();
        let (doc, report, target_id) = run_rules(&VideoRules, &session, &mut state, "VID1", video());

        assert_eq!(target_id.as_deref(), Some("VID1"));
        assert_eq!(doc["owner"]["id"], "sandbox.orga");
        assert!(doc.get("embed_html").is_none());
        assert!(doc["source"].get("edit_url").is_none());
        assert!(doc["credits"].get("affiliation").is_none());
        assert!(doc.get("promo_image").is_none());
        assert_eq!(
            doc["promo_items"],
            json!({"basic": {"type": "image", "url": "https://cdn/thumb.jpg", "version": "0.8.0"}})
        );
        assert!(doc["additional_properties"].get("THUMB1").is_none());
        assert!(doc["additional_properties"].get("anglerfisharc_id").is_none());
        assert!(report.stripped_fields.contains(&"embed_html".to_string()));
    }

    #[test]
    fn test_promo_image_without_url_drops_promo_items() {
        let session = TransformSession::new("orga", "orgb").with_website("site-b");
        let mut state = SessionState::new();
        let mut source = video();
        source["promo_image"] = json!({});
        let (doc, _, _) = run_rules(&VideoRules, &session, &mut state, "VID1", source);
        assert!(doc.get("promo_items").is_none());
    }

    #[test]
    fn test_second_pass_keeps_rebuilt_promo_items() {
        let session = TransformSession::new("orga", "orgb").with_website("site-b");
        let mut state = SessionState::new();
        let (once, _, _) = run_rules(&VideoRules, &session, &mut state, "VID1", video());
        let (twice, _, _) = run_rules(&VideoRules, &session, &mut state, "VID1", once.clone());
        assert_eq!(once["promo_items"], twice["promo_items"]);
        assert_eq!(once["taxonomy"], twice["taxonomy"]);
    }
}
