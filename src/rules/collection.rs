use serde_json::Value;

use crate::content_type::ContentType;
use crate::document::{array_at, element_id, element_type};
use crate::error::Result;
use crate::report::WarningType;
use crate::rules::{placement, remap_photo_center_array, ReferenceSlot, RuleContext, RuleSet};

const ITEMS_PATH: &str = "document.content_elements";

/// Websked collections. Contained stories keep their ids; the target
/// assigns the collection id.
#[derive(Debug, Default)]
pub struct CollectionRules;

impl RuleSet for CollectionRules {
    fn content_type(&self) -> ContentType {
        ContentType::Collection
    }

    fn strip_paths(&self) -> &'static [&'static str] {
        &["id", "published_revision", "current_revision"]
    }

    fn rewrite_owner(&self, _document: &mut Value, _ctx: &mut RuleContext<'_>) {}

    fn place(&self, document: &mut Value, ctx: &mut RuleContext<'_>) {
        placement::rewrite_collection_website(document, ctx);
    }

    fn reidentify(&self, _document: &mut Value, _ctx: &mut RuleContext<'_>) -> Result<Option<String>> {
        Ok(None)
    }

    fn reference_slots(&self, _document: &Value) -> Vec<ReferenceSlot> {
        Vec::new()
    }

    fn type_specific_pass(&self, document: &mut Value, ctx: &mut RuleContext<'_>) -> Result<()> {
        let items = array_at(document, ITEMS_PATH);
        if items.is_empty() {
            ctx.warn(
                format!("collection {} has no items to carry over", ctx.source_id()),
                ITEMS_PATH,
                WarningType::EmptyContainer,
            );
            return Ok(());
        }
        for item in items {
            let Some(id) = element_id(item) else { continue };
            match element_type(item) {
                Some("video") => ctx.report.catalog.add(ContentType::Video, id),
                Some("story") | None => ctx.report.catalog.add(ContentType::Story, id),
                _ => {}
            }
        }
        remap_photo_center_array(document, ITEMS_PATH, ctx);
        Ok(())
    }
}
