//! Declarative image manifest and the builder that flattens it into work.
//!
//! # Document shape
//!
//! ```text
//! settings:      { timeout, retries, parallel, skip_ai, skip_windows }
//! environments:  { <name>: { ...same keys as settings... } }
//! categories:
//!   <name>:
//!     enabled: true
//!     images:
//!       - { name, tag, type, friendly_name, short_name, description }
//! ```
//!
//! Category order and image order are preserved exactly as written in the
//! document; the work list is built in that order.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::ConfigurationError;
use crate::settings::{Settings, SettingsOverride};
use crate::types::{short_name_for, ItemId, ItemKind, PullItem};

/// Repository prefixes dropped by `skip_windows`.
pub const WINDOWS_PREFIXES: &[&str] = &[
    "mcr.microsoft.com/windows",
    "mcr.microsoft.com/dotnet/framework",
];

// ---------------------------------------------------------------------------
// 1. Document types
// ---------------------------------------------------------------------------

/// A parsed, structurally valid manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub settings: SettingsOverride,
    pub environments: BTreeMap<String, SettingsOverride>,
    /// Categories in document order.
    pub categories: Vec<Category>,
}

/// A named group of images that can be switched off as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    pub enabled: bool,
    pub images: Vec<ImageEntry>,
}

/// One image descriptor as written in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageEntry {
    pub name: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub tag: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ItemKind,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    settings: SettingsOverride,
    #[serde(default)]
    environments: BTreeMap<String, SettingsOverride>,
    // Kept as a mapping so category order survives deserialization.
    #[serde(default)]
    categories: serde_yaml::Mapping,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    #[serde(default)]
    images: Vec<ImageEntry>,
}

fn enabled_by_default() -> bool {
    true
}

/// Tags like `16` or `3.12` are written unquoted in practice and arrive as numbers.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_yaml::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a scalar tag, found {other:?}"
        ))),
    }
}

/// Where the manifest in use came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    File(PathBuf),
    BuiltIn,
}

impl std::fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestSource::File(path) => write!(f, "{}", path.display()),
            ManifestSource::BuiltIn => write!(f, "built-in default manifest"),
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Parse a manifest from YAML text. `path` is used for error context only.
pub fn parse_manifest(path: &Path, contents: &str) -> Result<Manifest, ConfigurationError> {
    let raw: RawManifest = serde_yaml::from_str(contents).map_err(|e| ConfigurationError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut categories = Vec::with_capacity(raw.categories.len());
    for (key, value) in raw.categories {
        let name = key
            .as_str()
            .ok_or_else(|| {
                ConfigurationError::Invalid(format!("category key {key:?} is not a string"))
            })?
            .to_string();
        let raw_category: RawCategory =
            serde_yaml::from_value(value).map_err(|e| ConfigurationError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        categories.push(Category {
            name,
            enabled: raw_category.enabled,
            images: raw_category.images,
        });
    }

    Ok(Manifest {
        settings: raw.settings,
        environments: raw.environments,
        categories,
    })
}

/// Load and parse the manifest at `path`.
///
/// Returns `ConfigurationError::Io` if the file cannot be read and
/// `ConfigurationError::Parse` (with path + line context) if malformed.
pub fn load_manifest(path: &Path) -> Result<Manifest, ConfigurationError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_manifest(path, &contents)
}

/// Load the manifest at `path`, falling back to [`default_manifest`] when the
/// file does not exist. Any other read or parse failure is still fatal.
pub fn load_or_default(path: &Path) -> Result<(Manifest, ManifestSource), ConfigurationError> {
    if !path.exists() {
        tracing::warn!(
            path = %path.display(),
            "manifest not found, using built-in default image list",
        );
        return Ok((default_manifest(), ManifestSource::BuiltIn));
    }
    let manifest = load_manifest(path)?;
    Ok((manifest, ManifestSource::File(path.to_path_buf())))
}

/// Small built-in manifest used when no manifest file is present.
pub fn default_manifest() -> Manifest {
    let image = |name: &str, tag: &str, friendly: &str| ImageEntry {
        name: name.to_string(),
        tag: Some(tag.to_string()),
        kind: ItemKind::Image,
        friendly_name: Some(friendly.to_string()),
        short_name: None,
        description: None,
    };
    Manifest {
        settings: SettingsOverride::default(),
        environments: BTreeMap::new(),
        categories: vec![Category {
            name: "base".to_string(),
            enabled: true,
            images: vec![
                image("alpine", "latest", "Alpine Linux"),
                image("busybox", "latest", "BusyBox"),
                image("debian", "bookworm-slim", "Debian Bookworm (slim)"),
                image("ubuntu", "22.04", "Ubuntu 22.04"),
                image("python", "3.12-slim", "Python 3.12 (slim)"),
            ],
        }],
    }
}

// ---------------------------------------------------------------------------
// 3. Builder
// ---------------------------------------------------------------------------

/// Post-flattening filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilters {
    pub skip_models: bool,
    pub skip_prefixes: Vec<String>,
}

impl ItemFilters {
    pub fn from_settings(settings: &Settings) -> Self {
        let skip_prefixes = if settings.skip_windows {
            WINDOWS_PREFIXES.iter().map(|p| p.to_string()).collect()
        } else {
            Vec::new()
        };
        Self {
            skip_models: settings.skip_ai,
            skip_prefixes,
        }
    }
}

impl Manifest {
    /// Flatten enabled categories into items, in document order.
    ///
    /// Entries with an empty name are dropped with a warning; a missing tag
    /// means `latest`; a repeated `(repository, tag)` keeps its first occurrence.
    pub fn flatten(&self) -> Vec<PullItem> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for category in self.categories.iter().filter(|c| c.enabled) {
            for entry in &category.images {
                let repository = entry.name.trim();
                if repository.is_empty() {
                    tracing::warn!(category = %category.name, "skipping image entry with empty name");
                    continue;
                }
                let tag = entry
                    .tag
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .unwrap_or("latest");
                let id = ItemId::new(repository, tag);
                if !seen.insert(id.clone()) {
                    tracing::debug!(item = %id, "dropping duplicate manifest entry");
                    continue;
                }
                items.push(PullItem {
                    friendly_name: entry
                        .friendly_name
                        .clone()
                        .unwrap_or_else(|| repository.to_string()),
                    short_name: entry
                        .short_name
                        .clone()
                        .unwrap_or_else(|| short_name_for(repository)),
                    description: entry.description.clone(),
                    kind: entry.kind,
                    id,
                });
            }
        }
        items
    }

    /// SHA-256 hex over every declared image, enabled or not, in document order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for category in &self.categories {
            hasher.update(category.name.as_bytes());
            hasher.update(b"\n");
            for entry in &category.images {
                hasher.update(entry.name.as_bytes());
                hasher.update(b":");
                hasher.update(entry.tag.as_deref().unwrap_or("latest").as_bytes());
                hasher.update(b"\n");
            }
        }
        hex::encode(hasher.finalize())
    }
}

/// Flatten `manifest` and apply `filters`.
pub fn build_items(manifest: &Manifest, filters: &ItemFilters) -> Vec<PullItem> {
    let mut items = manifest.flatten();
    if filters.skip_models {
        items = skip_models(items);
    }
    for prefix in &filters.skip_prefixes {
        items = skip_by_namespace_prefix(items, prefix);
    }
    items
}

/// Remove every `Model`-typed item.
pub fn skip_models(items: Vec<PullItem>) -> Vec<PullItem> {
    items
        .into_iter()
        .filter(|item| item.kind != ItemKind::Model)
        .collect()
}

/// Remove items whose repository starts with `prefix`.
pub fn skip_by_namespace_prefix(items: Vec<PullItem>, prefix: &str) -> Vec<PullItem> {
    items
        .into_iter()
        .filter(|item| !item.repository().starts_with(prefix))
        .collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
settings:
  parallel: 2
categories:
  zeta:
    enabled: true
    images:
      - name: redis
        tag: "7"
      - name: postgres
        tag: "16"
  alpha:
    enabled: false
    images:
      - name: mysql
        tag: "8"
  models:
    images:
      - name: ollama/llama3
        tag: 8b
        type: model
        friendly_name: Llama 3
"#;

    fn sample() -> Manifest {
        parse_manifest(Path::new("sample.yaml"), SAMPLE).expect("parse")
    }

    #[test]
    fn category_order_is_document_order() {
        let names: Vec<_> = sample().categories.into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["zeta", "alpha", "models"]);
    }

    #[test]
    fn flatten_skips_disabled_and_keeps_order() {
        let refs: Vec<String> = sample().flatten().iter().map(|i| i.id.to_string()).collect();
        assert_eq!(refs, ["redis:7", "postgres:16", "ollama/llama3:8b"]);
    }

    #[test]
    fn missing_enabled_defaults_to_true() {
        let manifest = sample();
        let models = manifest
            .categories
            .iter()
            .find(|c| c.name == "models")
            .expect("models category");
        assert!(models.enabled);
    }

    #[test]
    fn flatten_fills_names_and_default_tag() {
        let manifest = parse_manifest(
            Path::new("m.yaml"),
            "categories:\n  c:\n    images:\n      - name: ghcr.io/org/tool\n",
        )
        .expect("parse");
        let items = manifest.flatten();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].tag(), "latest");
        assert_eq!(items[0].friendly_name, "ghcr.io/org/tool");
        assert_eq!(items[0].short_name, "tool");
    }

    #[test]
    fn numeric_tag_is_accepted() {
        let manifest = parse_manifest(
            Path::new("m.yaml"),
            "categories:\n  c:\n    images:\n      - { name: postgres, tag: 16 }\n",
        )
        .expect("parse");
        assert_eq!(manifest.flatten()[0].tag(), "16");
    }

    #[test]
    fn duplicate_identity_keeps_first() {
        let manifest = parse_manifest(
            Path::new("m.yaml"),
            "categories:\n  a:\n    images:\n      - { name: nginx, tag: '1', friendly_name: first }\n  b:\n    images:\n      - { name: nginx, tag: '1', friendly_name: second }\n",
        )
        .expect("parse");
        let items = manifest.flatten();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].friendly_name, "first");
    }

    #[test]
    fn skip_models_filter() {
        let filters = ItemFilters {
            skip_models: true,
            skip_prefixes: vec![],
        };
        let items = build_items(&sample(), &filters);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.kind == ItemKind::Image));
    }

    #[test]
    fn windows_prefixes_from_settings() {
        let settings = Settings {
            skip_windows: true,
            ..Settings::default()
        };
        let filters = ItemFilters::from_settings(&settings);
        assert_eq!(filters.skip_prefixes.len(), WINDOWS_PREFIXES.len());
        assert!(!filters.skip_models);
    }

    #[test]
    fn load_missing_file_falls_back_to_default() {
        let dir = TempDir::new().expect("tempdir");
        let (manifest, source) =
            load_or_default(&dir.path().join("absent.yaml")).expect("fallback");
        assert_eq!(source, ManifestSource::BuiltIn);
        assert!(!manifest.flatten().is_empty());
    }

    #[test]
    fn load_missing_file_strict_is_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = load_manifest(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigurationError::Io { .. }));
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let a = sample();
        let mut b = sample();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.categories[0].images[0].tag = Some("7.2".to_string());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
