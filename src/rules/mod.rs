//! Per-content-type transformation rule sets.
//!
//! Every rule set runs the same steps in order: strip source-only fields,
//! rewrite the owning organization, rewrite website/section placement,
//! re-identify, and a final type-specific pass. Reference slots (distributors,
//! geographic restrictions) are reported by the rule set and resolved by the
//! transformer, which owns the I/O.

mod author;
mod collection;
mod gallery;
mod image;
mod lightbox;
pub mod placement;
mod redirect;
mod story;
mod video;

pub use author::AuthorRules;
pub use collection::CollectionRules;
pub use gallery::GalleryRules;
pub use image::ImageRules;
pub use lightbox::LightboxRules;
pub use redirect::{classify_redirect, RedirectKind, RedirectRules};
pub use story::StoryRules;
pub use video::VideoRules;

use serde_json::{json, Value};

use crate::content_type::ContentType;
use crate::document::{array_at, array_at_mut, element_id, element_type, get_path, get_str, remove_path, rewrite_element_id, set_path};
use crate::error::{Result, TransferError};
use crate::identifier::IdentifierGenerator;
use crate::report::{ChangeReport, TransformWarning, WarningType};
use crate::resolver::ReferenceKind;
use crate::session::{IdRemapTable, TransformSession};

/// Mutable context handed to each rule step
pub struct RuleContext<'a> {
    pub session: &'a TransformSession,
    /// The document as fetched, before any rule ran.
    pub source: &'a Value,
    pub generator: &'a mut IdentifierGenerator,
    pub remaps: &'a mut IdRemapTable,
    pub report: &'a mut ChangeReport,
}

impl RuleContext<'_> {
    pub fn source_id(&self) -> String {
        self.report.source_id.clone()
    }

    pub fn warn(&mut self, message: impl Into<String>, field_path: &str, warning_type: WarningType) {
        self.report
            .add_warning(TransformWarning::new(message, warning_type).with_field_path(field_path));
    }
}

/// A reference the transformer must map into the target organization
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSlot {
    pub kind: ReferenceKind,
    /// JSON pointer to the string holding the reference id.
    pub pointer: String,
    pub source_id: String,
}

/// Transformation rules for one content type
pub trait RuleSet: Send + Sync {
    fn content_type(&self) -> ContentType;

    /// Source-only fields removed before anything else runs.
    fn strip_paths(&self) -> &'static [&'static str] {
        &[]
    }

    fn strip(&self, document: &mut Value, ctx: &mut RuleContext<'_>) {
        for path in self.strip_paths() {
            if remove_path(document, path).is_some() {
                ctx.report.record_stripped(*path);
            }
        }
    }

    fn rewrite_owner(&self, document: &mut Value, ctx: &mut RuleContext<'_>) {
        rewrite_ans_owner(document, ctx.session);
    }

    fn place(&self, _document: &mut Value, _ctx: &mut RuleContext<'_>) {}

    /// Settle the document's id. Returns the target id when it is known
    /// before submission.
    fn reidentify(&self, document: &mut Value, ctx: &mut RuleContext<'_>) -> Result<Option<String>> {
        preserve_id(document, ctx).map(Some)
    }

    fn reference_slots(&self, document: &Value) -> Vec<ReferenceSlot> {
        standard_reference_slots(document)
    }

    fn type_specific_pass(&self, _document: &mut Value, _ctx: &mut RuleContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Point an ANS document at the target org and stamp where it came from.
pub fn rewrite_ans_owner(document: &mut Value, session: &TransformSession) {
    set_path(document, "owner.id", json!(session.target_org));
    if get_path(document, "organization").is_some() {
        set_path(document, "organization", json!(session.target_org));
    }
    set_path(
        document,
        "additional_properties.ingestionMethod",
        json!(session.provenance_label()),
    );
}

/// Keep the source id, writing it back when the fetched body lacks `_id`.
pub fn preserve_id(document: &mut Value, ctx: &RuleContext<'_>) -> Result<String> {
    match get_str(document, "_id") {
        Some(id) => Ok(id.to_string()),
        None => {
            let id = ctx.source_id();
            if id.is_empty() {
                return Err(TransferError::InvalidDocument("document has no _id".to_string()));
            }
            set_path(document, "_id", json!(id));
            Ok(id)
        }
    }
}

/// Give a gallery or image a new id, reusing one already issued for it in
/// this session.
pub fn reidentify_photo_center(document: &mut Value, ctx: &mut RuleContext<'_>) -> Result<String> {
    let content_type = ctx.report.content_type;
    let old_id = get_str(document, "_id")
        .map(str::to_string)
        .unwrap_or_else(|| ctx.source_id());
    if old_id.is_empty() {
        return Err(TransferError::InvalidDocument(format!("{content_type} has no _id")));
    }

    let (new_id, _) = ctx.remaps.remap_or_generate(&old_id, ctx.generator);
    set_path(document, "_id", json!(new_id));
    if get_path(document, "additional_properties.arcOriginalId").is_none() {
        set_path(
            document,
            "additional_properties.arcOriginalId",
            json!({ "org": ctx.session.source_org, "_id": old_id }),
        );
    }
    ctx.report.record_remap(content_type, &old_id, &new_id);
    Ok(new_id)
}

/// Distributor and geographic-restriction slots present in any ANS document.
pub fn standard_reference_slots(document: &Value) -> Vec<ReferenceSlot> {
    let mut slots = Vec::new();
    if let Some(id) = get_str(document, "distributor.reference_id") {
        slots.push(ReferenceSlot {
            kind: ReferenceKind::Distributor,
            pointer: "/distributor/reference_id".to_string(),
            source_id: id.to_string(),
        });
    }
    for (index, restriction) in array_at(document, "content_restrictions.geo.restrictions").iter().enumerate() {
        if let Some(id) = get_str(restriction, "restriction_id") {
            slots.push(ReferenceSlot {
                kind: ReferenceKind::Geographic,
                pointer: format!("/content_restrictions/geo/restrictions/{index}/restriction_id"),
                source_id: id.to_string(),
            });
        }
    }
    slots
}

/// Guest and local bylines fail validation when they carry their own ANS version.
pub fn strip_credit_versions(document: &mut Value, ctx: &mut RuleContext<'_>) {
    let mut stripped = false;
    if let Some(bylines) = array_at_mut(document, "credits.by") {
        for byline in bylines.iter_mut() {
            stripped |= remove_path(byline, "version").is_some();
        }
    }
    if stripped {
        ctx.report.record_stripped("credits.by[*].version");
    }
}

pub fn catalog_authors(document: &Value, ctx: &mut RuleContext<'_>) {
    for byline in array_at(document, "credits.by") {
        if let Some(id) = get_str(byline, "referent.id").or_else(|| get_str(byline, "_id")) {
            if element_type(byline) == Some("author") {
                ctx.report.catalog.add(ContentType::Author, id);
            }
        }
    }
}

/// Photo Center type of an embedded element, if it is one.
pub fn photo_center_type(element: &Value) -> Option<ContentType> {
    match element_type(element) {
        Some("image") => Some(ContentType::Image),
        Some("gallery") => Some(ContentType::Gallery),
        _ => None,
    }
}

/// Rewrite an embedded gallery/image to its session remap, or flag it when
/// nothing in this session re-identified it.
pub fn remap_photo_center_element(element: &mut Value, field_path: &str, ctx: &mut RuleContext<'_>) {
    if let Some(content_type) = photo_center_type(element) {
        remap_photo_center_as(element, content_type, field_path, ctx);
    }
}

/// Like [`remap_photo_center_element`], for elements whose type is implied
/// by where they sit (lightbox photos carry only an id).
pub fn remap_photo_center_as(element: &mut Value, content_type: ContentType, field_path: &str, ctx: &mut RuleContext<'_>) {
    let Some(old_id) = element_id(element).map(str::to_string) else {
        return;
    };
    ctx.report.catalog.add(content_type, &old_id);

    if let Some(new_id) = ctx.remaps.get(&old_id).map(str::to_string) {
        rewrite_element_id(element, &new_id);
        ctx.report.record_remap(content_type, &old_id, &new_id);
        return;
    }
    if ctx.remaps.is_target_id(&old_id) {
        return;
    }

    ctx.report.flag_unresolved(
        field_path,
        &old_id,
        format!("{content_type} ids change when moved; move it first to rewrite this reference"),
    );
    ctx.warn(
        format!("{content_type} {old_id} keeps its source id and will not resolve in {}", ctx.session.target_org),
        field_path,
        WarningType::PhotoCenterReference,
    );
}

/// Apply [`remap_photo_center_element`] to every element of the array at `path`.
pub fn remap_photo_center_array(document: &mut Value, path: &str, ctx: &mut RuleContext<'_>) {
    if let Some(elements) = array_at_mut(document, path) {
        for (index, element) in elements.iter_mut().enumerate() {
            remap_photo_center_element(element, &format!("{path}[{index}]"), ctx);
        }
    }
}
