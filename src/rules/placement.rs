//! Website and section placement in the target organization.
//!
//! Sections are written as `reference` elements on the target website. A
//! configured target section replaces every source section; otherwise the
//! source section ids are kept and only the website changes.

use serde_json::{json, Map, Value};

use crate::document::{array_at, get_path, get_str, remove_path, section_reference, set_path};
use crate::report::{CirculationChange, WarningType};
use crate::rules::RuleContext;

fn primary_reference(section_id: &str, website: &str) -> Value {
    let mut reference = section_reference(section_id, website);
    set_path(
        &mut reference,
        "referent.referent_properties.additional_properties.primary",
        json!(true),
    );
    reference
}

fn section_id(section: &Value) -> Option<&str> {
    get_str(section, "_id").or_else(|| get_str(section, "referent.id"))
}

fn section_website(section: &Value) -> Option<&str> {
    get_str(section, "_website").or_else(|| get_str(section, "referent.website"))
}

fn circulation_entries(sections: &[Value]) -> Value {
    Value::Array(
        sections
            .iter()
            .map(|s| json!({ "section": section_id(s), "website": section_website(s) }))
            .collect(),
    )
}

/// Website the document is placed on: the session's target website, or the
/// document's own canonical website when none is configured.
pub fn target_website(document: &Value, ctx: &mut RuleContext<'_>) -> Option<String> {
    let website = ctx
        .session
        .target_website
        .clone()
        .or_else(|| get_str(document, "canonical_website").map(str::to_string));
    if website.is_none() {
        ctx.warn(
            "no target website configured; placement left as in the source",
            "canonical_website",
            WarningType::ValidationProblem,
        );
    }
    website
}

/// Rewrite `taxonomy` sections, `canonical_website` and `websites` (videos, galleries).
pub fn rewrite_taxonomy(document: &mut Value, ctx: &mut RuleContext<'_>) {
    let Some(website) = target_website(document, ctx) else {
        return;
    };

    let source_sections = array_at(document, "taxonomy.sections").to_vec();
    let source_circulation = circulation_entries(&source_sections);

    let primary_id = get_path(document, "taxonomy.primary_section")
        .and_then(section_id)
        .map(str::to_string)
        .or_else(|| source_sections.first().and_then(section_id).map(str::to_string));

    match (&ctx.session.target_section, primary_id) {
        (Some(target_section), _) => {
            let primary = primary_reference(target_section, &website);
            set_path(document, "taxonomy.primary_section", primary.clone());
            set_path(document, "taxonomy.sections", json!([primary]));
        }
        (None, Some(primary_id)) => {
            set_path(document, "taxonomy.primary_section", primary_reference(&primary_id, &website));
            let sections: Vec<Value> = source_sections
                .iter()
                .filter_map(section_id)
                .map(|id| section_reference(id, &website))
                .collect();
            set_path(document, "taxonomy.sections", Value::Array(sections));
        }
        (None, None) => {}
    }

    remove_path(document, "taxonomy.primary_site");
    remove_path(document, "taxonomy.sites");

    let website_url = get_str(document, "canonical_url")
        .map(str::to_string)
        .or_else(|| first_website_url(document));
    let mut entry = Map::new();
    if let Some(url) = website_url {
        entry.insert("website_url".to_string(), json!(url));
    }
    if let Some(primary) = get_path(document, "taxonomy.primary_section") {
        entry.insert("website_section".to_string(), primary.clone());
    }
    let mut websites = Map::new();
    websites.insert(website.clone(), Value::Object(entry));
    set_path(document, "websites", Value::Object(websites));
    set_path(document, "canonical_website", json!(website));

    let target_circulation = circulation_entries(array_at(document, "taxonomy.sections"));
    ctx.report.circulation = Some(CirculationChange {
        source: source_circulation,
        target: target_circulation,
    });
}

fn first_website_url(document: &Value) -> Option<String> {
    get_path(document, "websites")
        .and_then(Value::as_object)
        .and_then(|sites| sites.values().find_map(|site| get_str(site, "website_url")))
        .map(str::to_string)
}

fn story_circulation_entries(circulations: &[Value]) -> Value {
    Value::Array(
        circulations
            .iter()
            .flat_map(|c| array_at(c, "website_sections").iter())
            .map(|s| json!({ "section": section_id(s), "website": section_website(s) }))
            .collect(),
    )
}

/// Rewrite story `circulations` and `canonical_website`.
pub fn rewrite_story_circulations(document: &mut Value, ctx: &mut RuleContext<'_>) {
    let Some(website) = target_website(document, ctx) else {
        return;
    };
    set_path(document, "canonical_website", json!(website));

    let mut circulations = array_at(document, "circulations").to_vec();
    let source_circulation = story_circulation_entries(&circulations);

    if let Some(target_section) = &ctx.session.target_section {
        circulations.truncate(1);
        for circulation in circulations.iter_mut() {
            set_path(circulation, "website_id", json!(website));
            set_path(circulation, "website_primary_section", primary_reference(target_section, &website));
            set_path(circulation, "website_sections", json!([section_reference(target_section, &website)]));
        }
    } else {
        for circulation in circulations.iter_mut() {
            set_path(circulation, "website_id", json!(website));
            if get_path(circulation, "website_primary_section.referent").is_some() {
                set_path(circulation, "website_primary_section.referent.website", json!(website));
            }
            let rewritten: Vec<Value> = array_at(circulation, "website_sections")
                .iter()
                .filter_map(section_id)
                .map(|id| section_reference(id, &website))
                .collect();
            set_path(circulation, "website_sections", Value::Array(rewritten));
        }
    }

    let target_circulation = story_circulation_entries(&circulations);
    if get_path(document, "circulations").is_some() {
        set_path(document, "circulations", Value::Array(circulations));
    }
    ctx.report.circulation = Some(CirculationChange {
        source: source_circulation,
        target: target_circulation,
    });
}

/// Collections carry the website twice: on the collection and on its document.
pub fn rewrite_collection_website(document: &mut Value, ctx: &mut RuleContext<'_>) {
    let Some(website) = target_website(document, ctx) else {
        return;
    };
    let source = json!([{ "website": get_str(document, "canonical_website") }]);
    set_path(document, "canonical_website", json!(website));
    if get_path(document, "document").is_some() {
        set_path(document, "document.canonical_website", json!(website));
    }
    ctx.report.circulation = Some(CirculationChange {
        source,
        target: json!([{ "website": website }]),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_type::ContentType;
    use crate::report::ChangeReport;
    use crate::session::{SessionState, TransformSession};

    fn run(session: &TransformSession, document: &mut Value, f: fn(&mut Value, &mut RuleContext<'_>)) -> ChangeReport {
        let mut state = SessionState::new();
        let source = document.clone();
        let mut report = ChangeReport::new(ContentType::Video, "V1", session);
        let mut ctx = RuleContext {
            session,
            source: &source,
            generator: &mut state.generator,
            remaps: &mut state.remaps,
            report: &mut report,
        };
        f(document, &mut ctx);
        report
    }

    fn video() -> Value {
        json!({
            "canonical_url": "/video/2023/clip",
            "canonical_website": "site-a",
            "websites": {"site-a": {"website_url": "/video/2023/clip"}},
            "taxonomy": {
                "primary_section": {"_id": "/news", "_website": "site-a"},
                "sections": [{"_id": "/news", "_website": "site-a"}, {"_id": "/sports", "_website": "site-a"}],
                "primary_site": {"_id": "/news"},
                "sites": [{"_id": "/news"}]
            }
        })
    }

    #[test]
    fn test_taxonomy_keeps_source_sections_on_target_website() {
        let session = TransformSession::new("orga", "orgb").with_website("site-b");
        let mut doc = video();
        let report = run(&session, &mut doc, rewrite_taxonomy);

        assert_eq!(doc["canonical_website"], "site-b");
        assert_eq!(doc["taxonomy"]["sections"][1]["referent"]["id"], "/sports");
        assert_eq!(doc["taxonomy"]["sections"][1]["referent"]["website"], "site-b");
        assert_eq!(
            doc["taxonomy"]["primary_section"]["referent"]["referent_properties"]["additional_properties"]["primary"],
            true
        );
        assert!(doc["taxonomy"].get("primary_site").is_none());
        assert!(doc["taxonomy"].get("sites").is_none());
        assert_eq!(doc["websites"]["site-b"]["website_url"], "/video/2023/clip");
        assert!(doc["websites"].get("site-a").is_none());

        let circulation = report.circulation.unwrap();
        assert_eq!(circulation.source[0], json!({"section": "/news", "website": "site-a"}));
        assert_eq!(circulation.target[1], json!({"section": "/sports", "website": "site-b"}));
    }

    #[test]
    fn test_target_section_replaces_all_sections() {
        let session = TransformSession::new("orga", "orgb").with_website("site-b").with_section("/test");
        let mut doc = video();
        run(&session, &mut doc, rewrite_taxonomy);

        let sections = doc["taxonomy"]["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0]["referent"]["id"], "/test");
        assert_eq!(doc["taxonomy"]["primary_section"]["referent"]["id"], "/test");
    }

    #[test]
    fn test_taxonomy_rewrite_is_idempotent() {
        let session = TransformSession::new("orga", "orgb").with_website("site-b");
        let mut doc = video();
        run(&session, &mut doc, rewrite_taxonomy);
        let once = doc.clone();
        run(&session, &mut doc, rewrite_taxonomy);
        assert_eq!(doc, once);
    }

    #[test]
    fn test_story_circulations() {
        let session = TransformSession::new("orga", "orgb").with_website("site-b");
        let mut doc = json!({
            "canonical_website": "site-a",
            "circulations": [{
                "website_id": "site-a",
                "website_primary_section": {"type": "reference", "referent": {"id": "/news", "type": "section", "website": "site-a"}},
                "website_sections": [{"type": "reference", "referent": {"id": "/news", "type": "section", "website": "site-a"}}]
            }]
        });
        let report = run(&session, &mut doc, rewrite_story_circulations);

        assert_eq!(doc["canonical_website"], "site-b");
        assert_eq!(doc["circulations"][0]["website_id"], "site-b");
        assert_eq!(doc["circulations"][0]["website_primary_section"]["referent"]["website"], "site-b");
        assert_eq!(doc["circulations"][0]["website_sections"][0]["referent"]["id"], "/news");
        assert_eq!(report.circulation.unwrap().target, json!([{"section": "/news", "website": "site-b"}]));
    }

    #[test]
    fn test_missing_website_warns_and_leaves_placement() {
        let session = TransformSession::new("orga", "orgb");
        let mut doc = json!({"taxonomy": {"sections": []}});
        let report = run(&session, &mut doc, rewrite_taxonomy);
        assert_eq!(report.warnings.len(), 1);
        assert!(doc.get("websites").is_none());
    }
}
