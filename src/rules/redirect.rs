use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::content_type::ContentType;
use crate::document::{get_str, remove_path, set_path};
use crate::error::{Result, TransferError};
use crate::report::WarningType;
use crate::rules::{ReferenceSlot, RuleContext, RuleSet};
use crate::session::TransformSession;

/// What a redirect points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectKind {
    Story,
    Video,
    Gallery,
}

impl RedirectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectKind::Story => "story",
            RedirectKind::Video => "video",
            RedirectKind::Gallery => "gallery",
        }
    }
}

const VANITY_MARKER: &str = "vanity_redirect";

/// Classify a redirect by its destination URL and id. Returns the kind and
/// whether it was a guess.
pub fn classify_redirect(session: &TransformSession, destination: &str, redirect_id: &str) -> (RedirectKind, bool) {
    let matches = |marker: &Option<String>| marker.as_deref().is_some_and(|m| destination.contains(m));
    if matches(&session.video_url_marker) {
        (RedirectKind::Video, false)
    } else if matches(&session.gallery_url_marker) {
        (RedirectKind::Gallery, false)
    } else if redirect_id.contains(VANITY_MARKER) {
        (RedirectKind::Video, true)
    } else {
        (RedirectKind::Story, false)
    }
}

/// Path part of a URL, with a leading slash.
fn normalize_path(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = if url.contains("://") {
        without_scheme.find('/').map_or("/", |index| &without_scheme[index..])
    } else {
        without_scheme
    };
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Redirects are rebuilt as `{website, website_url, document_id}` on the
/// target website.
#[derive(Debug, Default)]
pub struct RedirectRules;

impl RuleSet for RedirectRules {
    fn content_type(&self) -> ContentType {
        ContentType::Redirect
    }

    fn strip_paths(&self) -> &'static [&'static str] {
        &["canonical_url", "redirect_url", "canonical_website", "websites", "_website", "owner"]
    }

    fn rewrite_owner(&self, _document: &mut Value, _ctx: &mut RuleContext<'_>) {}

    fn place(&self, document: &mut Value, ctx: &mut RuleContext<'_>) {
        let source = ctx.source;
        let website = ctx
            .session
            .target_website
            .clone()
            .or_else(|| get_str(source, "website").map(str::to_string))
            .or_else(|| get_str(source, "canonical_website").map(str::to_string));
        match website {
            Some(website) => {
                set_path(document, "website", json!(website));
            }
            None => ctx.warn(
                "no target website configured for redirect",
                "website",
                WarningType::ValidationProblem,
            ),
        }

        let destination = get_str(source, "canonical_url")
            .or_else(|| get_str(source, "website_url"))
            .or_else(|| get_str(source, "redirect_url"));
        if let Some(destination) = destination {
            set_path(document, "website_url", json!(normalize_path(destination)));
        }
    }

    fn reidentify(&self, document: &mut Value, ctx: &mut RuleContext<'_>) -> Result<Option<String>> {
        let document_id = get_str(document, "document_id")
            .or_else(|| get_str(document, "_id"))
            .map(|id| id.split('_').next().unwrap_or(id).to_string())
            .or_else(|| Some(ctx.source_id()).filter(|id| !id.is_empty() && !id.starts_with('/')));
        let Some(document_id) = document_id else {
            return Err(TransferError::InvalidDocument("redirect has no document id".to_string()));
        };
        remove_path(document, "_id");
        set_path(document, "document_id", json!(document_id));
        set_path(document, "type", json!("redirect"));
        Ok(get_str(document, "website_url").map(str::to_string))
    }

    fn reference_slots(&self, _document: &Value) -> Vec<ReferenceSlot> {
        Vec::new()
    }

    fn type_specific_pass(&self, document: &mut Value, ctx: &mut RuleContext<'_>) -> Result<()> {
        let destination = get_str(document, "website_url").unwrap_or_default().to_string();
        let redirect_id = get_str(ctx.source, "_id").unwrap_or_default();
        let (kind, guessed) = classify_redirect(ctx.session, &destination, redirect_id);
        set_path(document, "redirect_kind", json!(kind.as_str()));

        if guessed {
            ctx.warn(
                format!("vanity redirect {redirect_id} has no type marker; treated as video"),
                "redirect_kind",
                WarningType::AmbiguousRedirect,
            );
        }

        if kind == RedirectKind::Gallery {
            let document_id = get_str(document, "document_id").unwrap_or_default().to_string();
            if let Some(new_id) = ctx.remaps.get(&document_id).map(str::to_string) {
                set_path(document, "document_id", json!(new_id));
                ctx.report.record_remap(ContentType::Gallery, &document_id, &new_id);
            }
            ctx.warn(
                format!("gallery redirect {destination} may not resolve: gallery ids change between organizations"),
                "document_id",
                WarningType::UnstableRedirect,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::run_rules;
    use crate::session::SessionState;

    fn session() -> TransformSession {
        TransformSession::new("orga", "orgb")
            .with_website("site-b")
            .with_redirect_markers(Some("/video/".to_string()), Some("/gallery/".to_string()))
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("https://www.site.com/2023/01/story/"), "/2023/01/story/");
        assert_eq!(normalize_path("2023/01/story"), "/2023/01/story");
        assert_eq!(normalize_path("/already"), "/already");
        assert_eq!(normalize_path("https://www.site.com"), "/");
    }

    #[test]
    fn test_classify_redirect() {
        let session = session();
        assert_eq!(classify_redirect(&session, "/video/clip", "X"), (RedirectKind::Video, false));
        assert_eq!(classify_redirect(&session, "/gallery/pics", "X"), (RedirectKind::Gallery, false));
        assert_eq!(classify_redirect(&session, "/promo", "ABC_vanity_redirect"), (RedirectKind::Video, true));
        assert_eq!(classify_redirect(&session, "/2023/01/story", "S1_redirect_1"), (RedirectKind::Story, false));
    }

    #[test]
    fn test_story_redirect_payload() {
        let mut state = SessionState::new();
        let redirect = json!({
            "_id": "MBDJUMH35VA4VKRW2Y6S2IR44A_redirect_0",
            "type": "redirect",
            "redirect_url": "/old/path",
            "canonical_url": "https://www.site-a.com/2023/01/new-story/",
            "canonical_website": "site-a"
        });
        let (doc, report, target_id) = run_rules(&RedirectRules, &session(), &mut state, "MBDJUMH35VA4VKRW2Y6S2IR44A_redirect_0", redirect);

        assert_eq!(
            doc,
            json!({
                "type": "redirect",
                "website": "site-b",
                "website_url": "/2023/01/new-story/",
                "document_id": "MBDJUMH35VA4VKRW2Y6S2IR44A",
                "redirect_kind": "story"
            })
        );
        assert_eq!(target_id.as_deref(), Some("/2023/01/new-story/"));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_gallery_redirect_warns() {
        let mut state = SessionState::new();
        let redirect = json!({"_id": "G1_redirect", "canonical_url": "/gallery/pics"});
        let (doc, report, _) = run_rules(&RedirectRules, &session(), &mut state, "G1_redirect", redirect);

        assert_eq!(doc["redirect_kind"], "gallery");
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].warning_type, WarningType::UnstableRedirect);
    }
}
