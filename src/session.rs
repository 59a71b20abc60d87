use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::identifier::IdentifierGenerator;
use crate::resolver::ReferenceResolver;

const SANDBOX_PREFIX: &str = "sandbox.";

/// Environment an organization id addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Sandbox,
}

impl Environment {
    pub fn of(org: &str) -> Self {
        if org.starts_with(SANDBOX_PREFIX) {
            Environment::Sandbox
        } else {
            Environment::Production
        }
    }

    /// Organization id without the environment prefix.
    pub fn base_org(org: &str) -> &str {
        org.strip_prefix(SANDBOX_PREFIX).unwrap_or(org)
    }
}

/// Source and target context for one invocation (one object, or one bulk run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformSession {
    pub source_org: String,
    pub target_org: String,
    #[serde(skip)]
    pub source_token: String,
    #[serde(skip)]
    pub target_token: String,
    /// Source website, used to find redirects in the source org.
    pub source_website: Option<String>,
    pub target_website: Option<String>,
    pub target_section: Option<String>,
    pub dry_run: bool,
    pub max_iterations: Option<usize>,
    /// Fail a single-item transform when local validation fails.
    pub strict: bool,
    /// Patch a re-identified image into its dependent gallery when that
    /// gallery was re-identified earlier in the same session.
    pub patch_dependent_galleries: bool,
    /// URL fragment identifying video redirects, e.g. `/video`.
    pub video_url_marker: Option<String>,
    /// URL fragment identifying gallery redirects, e.g. `/gallery`.
    pub gallery_url_marker: Option<String>,
}

impl TransformSession {
    pub fn new(source_org: impl Into<String>, target_org: impl Into<String>) -> Self {
        Self {
            source_org: source_org.into(),
            target_org: target_org.into(),
            source_token: String::new(),
            target_token: String::new(),
            source_website: None,
            target_website: None,
            target_section: None,
            dry_run: false,
            max_iterations: None,
            strict: false,
            patch_dependent_galleries: false,
            video_url_marker: None,
            gallery_url_marker: None,
        }
    }

    /// Session copying from an organization's production environment into its sandbox.
    pub fn to_sandbox(org: impl Into<String>) -> Self {
        let org = org.into();
        let target = format!("{SANDBOX_PREFIX}{org}");
        Self::new(org, target)
    }

    pub fn with_tokens(mut self, source_token: impl Into<String>, target_token: impl Into<String>) -> Self {
        self.source_token = source_token.into();
        self.target_token = target_token.into();
        self
    }

    pub fn with_source_website(mut self, website: impl Into<String>) -> Self {
        self.source_website = Some(website.into());
        self
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.target_website = Some(website.into());
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.target_section = Some(section.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_dependent_gallery_patching(mut self, enabled: bool) -> Self {
        self.patch_dependent_galleries = enabled;
        self
    }

    pub fn with_redirect_markers(mut self, video: Option<String>, gallery: Option<String>) -> Self {
        self.video_url_marker = video.filter(|m| !m.is_empty());
        self.gallery_url_marker = gallery.filter(|m| !m.is_empty());
        self
    }

    pub fn target_environment(&self) -> Environment {
        Environment::of(&self.target_org)
    }

    /// True when the target is the sandbox of the source organization.
    pub fn is_sandbox_copy(&self) -> bool {
        self.target_environment() == Environment::Sandbox && Environment::base_org(&self.target_org) == self.source_org
    }

    pub fn is_cross_org(&self) -> bool {
        !self.is_sandbox_copy() && self.source_org != self.target_org
    }

    /// Provenance marker stamped into `additional_properties.ingestionMethod`.
    pub fn provenance_label(&self) -> String {
        format!("moved orgs from {} to {}", self.source_org, self.target_org)
    }
}

/// Old-to-new identifier table for Photo Center objects re-identified in a session.
#[derive(Debug, Default, Clone)]
pub struct IdRemapTable {
    remaps: HashMap<String, String>,
}

impl IdRemapTable {
    pub fn get(&self, old_id: &str) -> Option<&str> {
        self.remaps.get(old_id).map(String::as_str)
    }

    pub fn insert(&mut self, old_id: impl Into<String>, new_id: impl Into<String>) {
        self.remaps.insert(old_id.into(), new_id.into());
    }

    /// True if `id` is the new side of a remap.
    pub fn is_target_id(&self, id: &str) -> bool {
        self.remaps.values().any(|v| v == id)
    }

    pub fn len(&self) -> usize {
        self.remaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaps.is_empty()
    }

    /// Existing new id for `old_id`, or a fresh one from `generator`.
    pub fn remap_or_generate(&mut self, old_id: &str, generator: &mut IdentifierGenerator) -> (String, bool) {
        if let Some(existing) = self.remaps.get(old_id) {
            return (existing.clone(), false);
        }
        let new_id = generator.generate_distinct(old_id);
        self.remaps.insert(old_id.to_string(), new_id.clone());
        (new_id, true)
    }
}

/// Mutable state confined to one session: id generation, reference
/// mappings and Photo Center remaps. Discarded when the session ends.
#[derive(Debug, Default)]
pub struct SessionState {
    pub generator: IdentifierGenerator,
    pub resolver: ReferenceResolver,
    pub remaps: IdRemapTable,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }
}
