use serde_json::{json, Value};

use crate::content_type::ContentType;
use crate::document::{array_at_mut, element_id, get_path, get_path_mut, remove_path};
use crate::error::Result;
use crate::rules::{catalog_authors, placement, reidentify_photo_center, strip_credit_versions, RuleContext, RuleSet};

/// Galleries get a new id, and so does every image they contain.
#[derive(Debug, Default)]
pub struct GalleryRules;

impl RuleSet for GalleryRules {
    fn content_type(&self) -> ContentType {
        ContentType::Gallery
    }

    fn strip_paths(&self) -> &'static [&'static str] {
        &["additional_properties.version", "revision"]
    }

    fn place(&self, document: &mut Value, ctx: &mut RuleContext<'_>) {
        placement::rewrite_taxonomy(document, ctx);
        // Galleries resolve their URL from the target website.
        if remove_path(document, "canonical_url").is_some() {
            ctx.report.record_stripped("canonical_url");
        }
    }

    fn reidentify(&self, document: &mut Value, ctx: &mut RuleContext<'_>) -> Result<Option<String>> {
        reidentify_photo_center(document, ctx).map(Some)
    }

    fn type_specific_pass(&self, document: &mut Value, ctx: &mut RuleContext<'_>) -> Result<()> {
        let gallery_id = get_path(document, "_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default();

        if let Some(elements) = array_at_mut(document, "content_elements") {
            for element in elements.iter_mut() {
                let Some(old_id) = element_id(element).map(str::to_string) else {
                    continue;
                };
                let original_id = original_image_id(element, &old_id);
                let new_id = remap_image(&old_id, ctx);
                ctx.report.catalog.add(ContentType::Image, &original_id);

                *element = image_reference(&new_id, json!({
                    "original_arc_id": original_id,
                    "galleries": [{ "_id": gallery_id }],
                }));
            }
        }

        // The cover is one of the contained images, so it shares their remap.
        if let Some(cover) = get_path_mut(document, "promo_items.basic") {
            if let Some(old_id) = element_id(cover).map(str::to_string) {
                let original_id = original_image_id(cover, &old_id);
                let new_id = remap_image(&old_id, ctx);
                *cover = image_reference(&new_id, json!({ "original_arc_id": original_id }));
            }
        }

        strip_credit_versions(document, ctx);
        catalog_authors(document, ctx);
        Ok(())
    }
}

fn original_image_id(element: &Value, old_id: &str) -> String {
    get_path(element, "referent.referent_properties.additional_properties.original_arc_id")
        .and_then(Value::as_str)
        .unwrap_or(old_id)
        .to_string()
}

/// New id for a contained image. Ids that are already the new side of a
/// remap are left alone so a second pass is a no-op.
fn remap_image(old_id: &str, ctx: &mut RuleContext<'_>) -> String {
    if ctx.remaps.is_target_id(old_id) {
        return old_id.to_string();
    }
    let (new_id, _) = ctx.remaps.remap_or_generate(old_id, ctx.generator);
    ctx.report.record_remap(ContentType::Image, old_id, &new_id);
    new_id
}

fn image_reference(id: &str, additional_properties: Value) -> Value {
    json!({
        "type": "reference",
        "_id": id,
        "referent": {
            "id": id,
            "type": "image",
            "referent_properties": {
                "additional_properties": additional_properties,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::is_native_identifier;
    use crate::rules::test_support::run_rules;
    use crate::session::{SessionState, TransformSession};

    fn gallery() -> Value {
        json!({
            "_id": "G1",
            "type": "gallery",
            "version": "0.10.7",
            "owner": {"id": "orga"},
            "canonical_url": "/photos/g1",
            "additional_properties": {"version": 3},
            "taxonomy": {"primary_section": {"_id": "/photos"}, "sections": [{"_id": "/photos"}]},
            "content_elements": [
                {"_id": "I1", "type": "image", "url": "https://cdn/i1.jpg"},
                {"_id": "I2", "type": "image", "url": "https://cdn/i2.jpg"}
            ]
        })
    }

    #[test]
    fn test_gallery_and_images_are_reidentified() {
        let session = TransformSession::new("orga", "orgb").with_website("site-b");
        let mut state = SessionState::new();
        let (doc, report, target_id) = run_rules(&GalleryRules, &session, &mut state, "G1", gallery());

        let new_gallery = target_id.unwrap();
        assert_ne!(new_gallery, "G1");
        assert!(is_native_identifier(&new_gallery));
        assert_eq!(doc["_id"], new_gallery.as_str());
        assert_eq!(doc["additional_properties"]["arcOriginalId"], json!({"org": "orga", "_id": "G1"}));
        assert!(doc["additional_properties"].get("version").is_none());

        for (index, old) in ["I1", "I2"].iter().enumerate() {
            let element = &doc["content_elements"][index];
            let new_image = element["referent"]["id"].as_str().unwrap();
            assert_ne!(new_image, *old);
            assert_eq!(element["type"], "reference");
            assert_eq!(element["_id"], new_image);
            let props = &element["referent"]["referent_properties"]["additional_properties"];
            assert_eq!(props["original_arc_id"], *old);
            assert_eq!(props["galleries"][0]["_id"], new_gallery.as_str());
            assert_eq!(state.remaps.get(old), Some(new_image));
        }

        assert_eq!(report.remap_for("G1"), Some(new_gallery.as_str()));
        assert_eq!(report.id_remaps.len(), 3);
        assert_eq!(report.catalog.images, vec!["I1".to_string(), "I2".to_string()]);
    }

    #[test]
    fn test_cover_image_follows_contained_image_remap() {
        let session = TransformSession::new("orga", "orgb").with_website("site-b");
        let mut state = SessionState::new();
        let mut source = gallery();
        source["promo_items"] = json!({"basic": {"_id": "I1", "type": "image", "url": "https://cdn/i1.jpg"}});

        let (doc, report, _) = run_rules(&GalleryRules, &session, &mut state, "G1", source);

        let new_image = state.remaps.get("I1").unwrap();
        let cover = &doc["promo_items"]["basic"];
        assert_eq!(cover["type"], "reference");
        assert_eq!(cover["_id"], new_image);
        assert_eq!(cover["referent"]["id"], new_image);
        assert_eq!(cover["referent"]["type"], "image");
        assert_eq!(cover["referent"]["referent_properties"]["additional_properties"]["original_arc_id"], "I1");
        assert_eq!(doc["content_elements"][0]["_id"], cover["_id"]);
        assert_eq!(report.id_remaps.len(), 3);
    }

    #[test]
    fn test_gallery_reuses_image_ids_issued_earlier_in_session() {
        let session = TransformSession::new("orga", "orgb").with_website("site-b");
        let mut state = SessionState::new();
        let (image_id, _) = state.remaps.remap_or_generate("I1", &mut state.generator);

        let (doc, _, _) = run_rules(&GalleryRules, &session, &mut state, "G1", gallery());
        assert_eq!(doc["content_elements"][0]["referent"]["id"], image_id.as_str());
    }
}
