//! URL builders for the publishing platform's REST APIs.

use crate::ans_version::AnsVersion;
use crate::content_type::ContentType;
use crate::resolver::ReferenceKind;
use crate::session::Environment;

fn api_base(org: &str) -> String {
    format!("https://api.{org}.arcpublishing.com")
}

pub fn draft_story_url(org: &str, id: &str) -> String {
    format!("{}/draft/v1/story/{id}", api_base(org))
}

pub fn draft_revision_url(org: &str, id: &str, revision_id: &str) -> String {
    format!("{}/draft/v1/story/{id}/revision/{revision_id}", api_base(org))
}

pub fn draft_circulations_url(org: &str, id: &str) -> String {
    format!("{}/draft/v1/story/{id}/circulation", api_base(org))
}

pub fn migration_center_ans_url(org: &str) -> String {
    format!("{}/migrations/v3/content/ans", api_base(org))
}

pub fn gallery_url(org: &str, id: &str) -> String {
    format!("{}/photo/api/v2/galleries/{id}/", api_base(org))
}

pub fn photo_url(org: &str, id: &str) -> String {
    format!("{}/photo/api/v2/photos/{id}/", api_base(org))
}

pub fn author_url(org: &str, version: &str) -> String {
    format!("{}/author/{version}/author-service/", api_base(org))
}

pub fn all_authors_url(org: &str) -> String {
    format!("{}/author/v1/", api_base(org))
}

/// Video API host. Sandbox organizations (`sandbox.<org>`) use the `sandbox` environment.
pub fn video_url(org: &str) -> String {
    let env = match Environment::of(org) {
        Environment::Sandbox => "sandbox",
        Environment::Production => "prod",
    };
    format!(
        "https://{}-{env}.video-api.arcpublishing.com/api/v1/ansvideos/findByUuid",
        Environment::base_org(org)
    )
}

pub fn lightbox_url(org: &str, id: Option<&str>) -> String {
    match id {
        Some(id) => format!("{}/photo/api/v2/lightboxes/{id}", api_base(org)),
        None => format!("{}/photo/api/v2/lightboxes/", api_base(org)),
    }
}

pub fn lightbox_photos_url(org: &str, id: &str) -> String {
    format!("{}/photo/api/v2/lightboxes/{id}/photos", api_base(org))
}

pub fn collection_url(org: &str, id: Option<&str>) -> String {
    match id {
        Some(id) => format!("{}/websked/collections/v1/collections/{id}", api_base(org)),
        None => format!("{}/websked/collections/v1/collections/", api_base(org)),
    }
}

pub fn ans_validation_url(org: &str, version: &AnsVersion) -> String {
    format!("{}/ans/validate/{version}", api_base(org))
}

/// Redirects pointing at one story on `website`.
pub fn story_redirects_url(org: &str, story_id: &str, website: &str) -> String {
    format!("{}/draft/v1/story/{story_id}/redirect/{website}", api_base(org))
}

pub fn content_scan_url(org: &str) -> String {
    format!("{}/content/v4/scan", api_base(org))
}

pub fn redirect_url(org: &str, website: &str, website_url: &str) -> String {
    let path = website_url.trim_start_matches('/');
    format!("{}/draft/v1/redirect/{website}/{path}/", api_base(org))
}

pub fn reference_url(org: &str, kind: ReferenceKind, id: Option<&str>) -> String {
    let segment = match kind {
        ReferenceKind::Distributor => "distributor",
        ReferenceKind::Restriction => "restriction",
        ReferenceKind::Geographic => "geo-restriction",
    };
    match id {
        Some(id) => format!("{}/settings/v1/{segment}/{id}", api_base(org)),
        None => format!("{}/settings/v1/{segment}/", api_base(org)),
    }
}

/// `ansType` query value for the migration-center endpoint.
pub fn migration_ans_type(content_type: ContentType) -> Option<&'static str> {
    match content_type {
        ContentType::Story | ContentType::Video | ContentType::Gallery | ContentType::Image => {
            Some(content_type.as_str())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_url_environment() {
        assert_eq!(
            video_url("devtraining"),
            "https://devtraining-prod.video-api.arcpublishing.com/api/v1/ansvideos/findByUuid"
        );
        assert_eq!(
            video_url("sandbox.devtraining"),
            "https://devtraining-sandbox.video-api.arcpublishing.com/api/v1/ansvideos/findByUuid"
        );
    }

    #[test]
    fn test_reference_urls() {
        assert_eq!(
            reference_url("cetest", ReferenceKind::Geographic, Some("G1")),
            "https://api.cetest.arcpublishing.com/settings/v1/geo-restriction/G1"
        );
        assert_eq!(
            reference_url("cetest", ReferenceKind::Distributor, None),
            "https://api.cetest.arcpublishing.com/settings/v1/distributor/"
        );
    }

    #[test]
    fn test_redirect_url_strips_leading_slash() {
        assert_eq!(
            redirect_url("cetest", "cetest", "/2023/01/old-story"),
            "https://api.cetest.arcpublishing.com/draft/v1/redirect/cetest/2023/01/old-story/"
        );
    }

    #[test]
    fn test_validation_and_story_redirect_urls() {
        let version: AnsVersion = "0.10.9".parse().unwrap();
        assert_eq!(
            ans_validation_url("cetest", &version),
            "https://api.cetest.arcpublishing.com/ans/validate/0.10.9"
        );
        assert_eq!(
            story_redirects_url("devtraining", "S1", "site-a"),
            "https://api.devtraining.arcpublishing.com/draft/v1/story/S1/redirect/site-a"
        );
    }

    #[test]
    fn test_migration_types() {
        assert_eq!(migration_ans_type(ContentType::Image), Some("image"));
        assert_eq!(migration_ans_type(ContentType::Author), None);
    }
}
