use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::time::now_utc;
use crate::core::types::Tlp;

pub const DEFAULT_CREATOR: &str = "STASIS";

/// Semantic `major.minor.patch` version. Ordered so bumps can be checked for monotonicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const INITIAL: Version = Version {
        major: 1,
        minor: 0,
        patch: 0,
    };

    pub fn bumped(self, kind: BumpKind) -> Self {
        match kind {
            BumpKind::Major => Version {
                major: self.major.saturating_add(1),
                minor: 0,
                patch: 0,
            },
            BumpKind::Minor => Version {
                major: self.major,
                minor: self.minor.saturating_add(1),
                patch: 0,
            },
            BumpKind::Patch => Version {
                patch: self.patch.saturating_add(1),
                ..self
            },
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::INITIAL
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(format!("invalid version: {}", s));
        }
        let num = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| format!("invalid version: {}", s))
        };
        Ok(Version {
            major: num(parts[0])?,
            minor: num(parts[1])?,
            patch: num(parts[2])?,
        })
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    Major,
    Minor,
    Patch,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Revision {
    pub version: Version,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: BumpKind,
}

/// Versioning and provenance envelope owned by exactly one actor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub version: Version,
    pub creator: String,
    pub tlp_level: Tlp,
    pub confidence_score: i32,
    #[serde(default)]
    pub revision_history: Vec<Revision>,
}

impl Metadata {
    pub fn new(creator: impl Into<String>, tlp_level: Tlp) -> Self {
        let now = now_utc();
        Self {
            created: now,
            modified: now,
            version: Version::INITIAL,
            creator: creator.into(),
            tlp_level,
            confidence_score: 0,
            revision_history: vec![],
        }
    }

    /// Advances the version and records exactly one revision entry.
    pub fn bump(&mut self, kind: BumpKind) {
        let now = now_utc();
        self.version = self.version.bumped(kind);
        self.modified = now;
        self.revision_history.push(Revision {
            version: self.version,
            timestamp: now,
            kind,
        });
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata::new(DEFAULT_CREATOR, Tlp::Amber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_bump_resets_patch() {
        let v: Version = "1.2.7".parse().unwrap();
        assert_eq!(v.bumped(BumpKind::Minor).to_string(), "1.3.0");
        assert_eq!(v.bumped(BumpKind::Patch).to_string(), "1.2.8");
        assert_eq!(v.bumped(BumpKind::Major).to_string(), "2.0.0");
    }

    #[test]
    fn bump_appends_one_revision() {
        let mut meta = Metadata::default();
        meta.bump(BumpKind::Minor);
        meta.bump(BumpKind::Patch);
        assert_eq!(meta.version.to_string(), "1.1.1");
        assert_eq!(meta.revision_history.len(), 2);
        assert_eq!(meta.revision_history[0].kind, BumpKind::Minor);
        assert!(meta.revision_history[0].version < meta.revision_history[1].version);
    }

    #[test]
    fn version_rejects_malformed_strings() {
        assert!("1.0".parse::<Version>().is_err());
        assert!("1.x.0".parse::<Version>().is_err());
        let json = serde_json::to_string(&Version::INITIAL).unwrap();
        assert_eq!(json, "\"1.0.0\"");
    }
}
