use serde_json::Value;

use crate::content_type::ContentType;
use crate::document::{array_at, get_str};
use crate::error::Result;
use crate::report::FollowUp;
use crate::rules::{catalog_authors, reidentify_photo_center, strip_credit_versions, RuleContext, RuleSet};

/// Images always get a new id. Galleries embedding the source image are
/// reported as follow-ups; the pipeline may patch them eagerly.
#[derive(Debug, Default)]
pub struct ImageRules;

impl RuleSet for ImageRules {
    fn content_type(&self) -> ContentType {
        ContentType::Image
    }

    fn strip_paths(&self) -> &'static [&'static str] {
        &[
            "auth",
            "source.edit_url",
            "imageId",
            "ingestImageToAnglerfish",
            "additional_properties.version",
            "additional_properties.galleries",
        ]
    }

    fn reidentify(&self, document: &mut Value, ctx: &mut RuleContext<'_>) -> Result<Option<String>> {
        reidentify_photo_center(document, ctx).map(Some)
    }

    fn type_specific_pass(&self, document: &mut Value, ctx: &mut RuleContext<'_>) -> Result<()> {
        let old_image_id = get_str(ctx.source, "_id")
            .map(str::to_string)
            .unwrap_or_else(|| ctx.source_id());
        let new_image_id = get_str(document, "_id").unwrap_or_default().to_string();

        for gallery in array_at(ctx.source, "additional_properties.galleries") {
            let gallery_id = get_str(gallery, "_id").or_else(|| gallery.as_str().filter(|s| !s.is_empty()));
            if let Some(gallery_id) = gallery_id {
                ctx.report.catalog.add(ContentType::Gallery, gallery_id);
                ctx.report.add_follow_up(FollowUp::PatchGallery {
                    gallery_id: gallery_id.to_string(),
                    old_image_id: old_image_id.clone(),
                    new_image_id: new_image_id.clone(),
                });
            }
        }

        strip_credit_versions(document, ctx);
        catalog_authors(document, ctx);
        Ok(())
    }
}
