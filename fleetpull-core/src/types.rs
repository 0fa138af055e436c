//! Domain types for pull work items.
//!
//! A [`PullItem`] is immutable once built. Its identity is the
//! `(repository, tag)` pair carried by [`ItemId`]; every other field is
//! descriptive and ignored by equality and hashing.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity of a pull item. Used as the dedup, ledger and circuit-breaker key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId {
    pub repository: String,
    pub tag: String,
}

impl ItemId {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// `repository:tag`, the reference handed to the fetch primitive.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// What kind of artifact an item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    #[default]
    Image,
    Model,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Image => write!(f, "image"),
            ItemKind::Model => write!(f, "model"),
        }
    }
}

// ---------------------------------------------------------------------------
// PullItem
// ---------------------------------------------------------------------------

/// One artifact to fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullItem {
    pub id: ItemId,
    #[serde(default)]
    pub kind: ItemKind,
    pub friendly_name: String,
    pub short_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PullItem {
    /// Build an image item whose display names default to the repository.
    pub fn image(repository: &str, tag: &str) -> Self {
        let short = short_name_for(repository);
        Self {
            id: ItemId::new(repository, tag),
            kind: ItemKind::Image,
            friendly_name: repository.to_string(),
            short_name: short,
            description: None,
        }
    }

    pub fn repository(&self) -> &str {
        &self.id.repository
    }

    pub fn tag(&self) -> &str {
        &self.id.tag
    }
}

impl PartialEq for PullItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PullItem {}

impl Hash for PullItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for PullItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

/// Last path segment of a repository (`ghcr.io/org/app` -> `app`).
pub fn short_name_for(repository: &str) -> String {
    repository
        .rsplit('/')
        .next()
        .unwrap_or(repository)
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn item_id_display_is_reference() {
        let id = ItemId::new("library/nginx", "1.27");
        assert_eq!(id.to_string(), "library/nginx:1.27");
        assert_eq!(id.reference(), id.to_string());
    }

    #[test]
    fn equality_ignores_descriptive_fields() {
        let mut a = PullItem::image("redis", "7");
        let b = PullItem::image("redis", "7");
        a.friendly_name = "Redis cache".into();
        a.kind = ItemKind::Model;
        assert_eq!(a, b);

        let set: HashSet<PullItem> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn short_name_takes_last_segment() {
        assert_eq!(short_name_for("ghcr.io/org/app"), "app");
        assert_eq!(short_name_for("alpine"), "alpine");
    }

    #[test]
    fn kind_serde_is_lowercase() {
        let yaml = serde_yaml::to_string(&ItemKind::Model).expect("serialize");
        assert_eq!(yaml.trim(), "model");
        let kind: ItemKind = serde_yaml::from_str("image").expect("deserialize");
        assert_eq!(kind, ItemKind::Image);
    }
}
