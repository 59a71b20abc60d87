use serde_json::Value;

use crate::content_type::ContentType;
use crate::document::get_str;
use crate::error::Result;
use crate::report::FollowUp;
use crate::rules::{ReferenceSlot, RuleContext, RuleSet};

/// Author records are not ANS: no owner, no placement, no references.
#[derive(Debug, Default)]
pub struct AuthorRules;

impl RuleSet for AuthorRules {
    fn content_type(&self) -> ContentType {
        ContentType::Author
    }

    fn strip_paths(&self) -> &'static [&'static str] {
        &["last_updated_date", "created_date"]
    }

    fn rewrite_owner(&self, _document: &mut Value, _ctx: &mut RuleContext<'_>) {}

    fn reference_slots(&self, _document: &Value) -> Vec<ReferenceSlot> {
        Vec::new()
    }

    fn type_specific_pass(&self, document: &mut Value, ctx: &mut RuleContext<'_>) -> Result<()> {
        if let (Some(author_id), Some(image_url)) = (get_str(document, "_id"), get_str(document, "image")) {
            ctx.report.add_follow_up(FollowUp::ReuploadAuthorImage {
                author_id: author_id.to_string(),
                image_url: image_url.to_string(),
            });
        }
        Ok(())
    }
}
