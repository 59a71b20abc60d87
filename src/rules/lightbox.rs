use serde_json::Value;

use crate::content_type::ContentType;
use crate::document::array_at_mut;
use crate::error::Result;
use crate::report::WarningType;
use crate::rules::{remap_photo_center_as, ReferenceSlot, RuleContext, RuleSet};

/// Lightboxes are recreated in the target; the target assigns the id.
#[derive(Debug, Default)]
pub struct LightboxRules;

impl RuleSet for LightboxRules {
    fn content_type(&self) -> ContentType {
        ContentType::Lightbox
    }

    fn strip_paths(&self) -> &'static [&'static str] {
        &["id", "created_date"]
    }

    fn rewrite_owner(&self, _document: &mut Value, _ctx: &mut RuleContext<'_>) {}

    fn reidentify(&self, _document: &mut Value, _ctx: &mut RuleContext<'_>) -> Result<Option<String>> {
        Ok(None)
    }

    fn reference_slots(&self, _document: &Value) -> Vec<ReferenceSlot> {
        Vec::new()
    }

    fn type_specific_pass(&self, document: &mut Value, ctx: &mut RuleContext<'_>) -> Result<()> {
        let photos = match array_at_mut(document, "photos") {
            Some(photos) if !photos.is_empty() => photos,
            _ => {
                ctx.warn(
                    format!("lightbox {} has no photos to carry over", ctx.source_id()),
                    "photos",
                    WarningType::EmptyContainer,
                );
                return Ok(());
            }
        };
        for (index, photo) in photos.iter_mut().enumerate() {
            remap_photo_center_as(photo, ContentType::Image, &format!("photos[{index}]"), ctx);
        }
        Ok(())
    }
}
