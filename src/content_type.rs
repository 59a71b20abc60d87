use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ans_version::AnsVersion;
use crate::error::TransferError;

/// Content types the transformer knows how to move between organizations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Story,
    Video,
    Gallery,
    Image,
    Author,
    Redirect,
    Lightbox,
    Collection,
}

impl ContentType {
    pub const ALL: [ContentType; 8] = [
        ContentType::Story,
        ContentType::Video,
        ContentType::Gallery,
        ContentType::Image,
        ContentType::Author,
        ContentType::Redirect,
        ContentType::Lightbox,
        ContentType::Collection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Story => "story",
            ContentType::Video => "video",
            ContentType::Gallery => "gallery",
            ContentType::Image => "image",
            ContentType::Author => "author",
            ContentType::Redirect => "redirect",
            ContentType::Lightbox => "lightbox",
            ContentType::Collection => "collection",
        }
    }

    /// Photo Center objects can never keep their id in another organization.
    pub fn is_photo_center(&self) -> bool {
        matches!(self, ContentType::Gallery | ContentType::Image)
    }

    /// Types that have a collection-wide bulk variant.
    pub fn supports_bulk(&self) -> bool {
        matches!(self, ContentType::Author | ContentType::Redirect)
    }

    /// Types placed on a website section in the target org.
    pub fn needs_placement(&self) -> bool {
        matches!(
            self,
            ContentType::Story | ContentType::Video | ContentType::Gallery | ContentType::Collection
        )
    }

    /// ANS version pinned on output, `None` for the non-ANS payloads
    /// (authors, redirects, lightboxes, collections).
    pub fn ans_version(&self) -> Option<AnsVersion> {
        match self {
            ContentType::Story | ContentType::Gallery | ContentType::Image => Some(AnsVersion::content()),
            ContentType::Video => Some(AnsVersion::video()),
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ContentType::ALL
            .iter()
            .find(|t| t.as_str() == normalized)
            .copied()
            .ok_or_else(|| TransferError::UnsupportedType(s.to_string()))
    }
}
