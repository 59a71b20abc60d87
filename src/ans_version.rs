use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// ANS schema version written into transformed documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnsVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl AnsVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Version accepted by the migration endpoint for stories and Photo Center objects.
    pub const fn content() -> Self {
        Self::new(0, 10, 9)
    }

    /// Version the video API still expects.
    pub const fn video() -> Self {
        Self::new(0, 8, 0)
    }
}

impl fmt::Display for AnsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for AnsVersion {
    type Err = AnsVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(AnsVersionError::InvalidFormat(s.to_string()));
        }

        let major = parts[0].parse().map_err(|_| AnsVersionError::InvalidFormat(s.to_string()))?;
        let minor = parts[1].parse().map_err(|_| AnsVersionError::InvalidFormat(s.to_string()))?;
        let patch = parts[2].parse().map_err(|_| AnsVersionError::InvalidFormat(s.to_string()))?;

        Ok(AnsVersion::new(major, minor, patch))
    }
}

impl PartialOrd for AnsVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AnsVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.major.cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
    }
}

#[derive(Debug, Error)]
pub enum AnsVersionError {
    #[error("Invalid ANS version format: {0}")]
    InvalidFormat(String),
}
