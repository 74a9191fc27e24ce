//! # Resource Manifest
//!
//! The manifest maps every logical resource of the application to the content
//! fingerprint produced at build time, and names the core shell that must be
//! present before first paint.
//!
//! The build emits the manifest as a JSON document:
//!
//! ```json
//! {
//!   "resources": { "main.dart.js": "39b562aa", "/": "7c598695" },
//!   "core": ["main.dart.js"]
//! }
//! ```
//!
//! After a successful activation only the `resources` object is persisted, see
//! [`PersistedManifest`].

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ManifestError, WorkerError};

/// Normalized path of a resource relative to the origin.
///
/// The root path `/` is the alias of the application's entry document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Key of the entry document.
    pub const ROOT: &'static str = "/";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The root alias `/`.
    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for ResourceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Opaque content hash of a resource. Equal fingerprints imply equal content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentFingerprint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// On-disk form produced by the build.
#[derive(Debug, Deserialize)]
struct ManifestDocument {
    resources: BTreeMap<ResourceKey, ContentFingerprint>,
    #[serde(default)]
    core: Vec<ResourceKey>,
}

/// Immutable resource manifest of one worker version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceManifest {
    resources: BTreeMap<ResourceKey, ContentFingerprint>,
    core: Vec<ResourceKey>,
}

impl ResourceManifest {
    /// Builds a manifest, rejecting core shell keys that are not resources.
    ///
    /// Duplicate core keys are dropped, keeping the first occurrence.
    pub fn new<R, K, F, C>(resources: R, core: C) -> Result<Self, ManifestError>
    where
        R: IntoIterator<Item = (K, F)>,
        K: Into<ResourceKey>,
        F: Into<ContentFingerprint>,
        C: IntoIterator,
        C::Item: Into<ResourceKey>,
    {
        let resources: BTreeMap<ResourceKey, ContentFingerprint> = resources
            .into_iter()
            .map(|(k, f)| (k.into(), f.into()))
            .collect();

        let mut seen = HashSet::new();
        let mut shell = Vec::new();
        for key in core.into_iter().map(Into::into) {
            if !resources.contains_key(&key) {
                return Err(ManifestError::CoreKeyMissing {
                    key: key.to_string(),
                });
            }
            if seen.insert(key.clone()) {
                shell.push(key);
            }
        }

        Ok(Self {
            resources,
            core: shell,
        })
    }

    /// Parses the JSON document emitted by the build.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        let doc: ManifestDocument =
            serde_json::from_str(json).map_err(|e| ManifestError::Parse {
                reason: e.to_string(),
            })?;
        Self::new(doc.resources, doc.core)
    }

    /// Reads and parses a manifest document from disk.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&ContentFingerprint> {
        self.resources.get(key)
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.resources.contains_key(key)
    }

    /// All resource keys, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.resources.keys()
    }

    /// The core shell keys, in declaration order.
    pub fn core(&self) -> &[ResourceKey] {
        &self.core
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Serializes the resource map in the layout stored after activation.
    pub fn to_persisted_json(&self) -> Result<String, WorkerError> {
        serde_json::to_string(&self.resources).map_err(|e| {
            WorkerError::Store(crate::error::StoreError::Serialization {
                reason: e.to_string(),
            })
        })
    }
}

/// The resource map recorded by the previous successful activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedManifest {
    resources: BTreeMap<ResourceKey, ContentFingerprint>,
}

impl PersistedManifest {
    /// Parses a persisted record. Any failure is reported as `ManifestCorrupt`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, WorkerError> {
        let resources =
            serde_json::from_slice(bytes).map_err(|e| WorkerError::ManifestCorrupt {
                reason: e.to_string(),
            })?;
        Ok(Self { resources })
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&ContentFingerprint> {
        self.resources.get(key)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResourceManifest {
        ResourceManifest::new(
            [
                ("main.dart.js", "h1"),
                ("index.html", "h2"),
                ("/", "h2"),
                ("assets/NOTICES", "h3"),
            ],
            ["main.dart.js", "index.html"],
        )
        .unwrap()
    }

    #[test]
    fn core_keys_keep_declaration_order() {
        let m = sample();
        let core: Vec<&str> = m.core().iter().map(ResourceKey::as_str).collect();
        assert_eq!(core, vec!["main.dart.js", "index.html"]);
        assert_eq!(m.len(), 4);
    }

    #[test]
    fn core_key_outside_resources_is_rejected() {
        let err = ResourceManifest::new([("a.js", "h1")], ["b.js"]).unwrap_err();
        assert!(matches!(err, ManifestError::CoreKeyMissing { key } if key == "b.js"));
    }

    #[test]
    fn duplicate_core_keys_are_dropped() {
        let m = ResourceManifest::new([("a.js", "h1")], ["a.js", "a.js"]).unwrap();
        assert_eq!(m.core().len(), 1);
    }

    #[test]
    fn parses_build_document() {
        let json = r#"{
            "resources": {"main.dart.js": "abc", "/": "def", "index.html": "def"},
            "core": ["main.dart.js"]
        }"#;
        let m = ResourceManifest::from_json(json).unwrap();
        assert_eq!(m.get(&ResourceKey::root()).unwrap().as_str(), "def");
        assert!(m.contains(&ResourceKey::from("index.html")));
        assert_eq!(m.core(), &[ResourceKey::from("main.dart.js")]);
    }

    #[test]
    fn build_document_without_core_is_accepted() {
        let m = ResourceManifest::from_json(r#"{"resources": {"a.js": "1"}}"#).unwrap();
        assert!(m.core().is_empty());
    }

    #[test]
    fn malformed_build_document_is_a_parse_error() {
        let err = ResourceManifest::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asset-manifest.json");
        std::fs::write(&path, r#"{"resources": {"a.js": "1"}, "core": ["a.js"]}"#).unwrap();
        let m = ResourceManifest::load(&path).unwrap();
        assert_eq!(m.len(), 1);

        let missing = ResourceManifest::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, ManifestError::Io { .. }));
    }

    #[test]
    fn persisted_form_is_the_bare_resource_map() {
        let m = sample();
        let json = m.to_persisted_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["main.dart.js"], "h1");
        assert_eq!(value["/"], "h2");
        assert!(value.get("core").is_none());

        let persisted = PersistedManifest::from_slice(json.as_bytes()).unwrap();
        assert_eq!(persisted.len(), 4);
        assert_eq!(
            persisted.get(&ResourceKey::from("assets/NOTICES")),
            m.get(&ResourceKey::from("assets/NOTICES"))
        );
    }

    #[test]
    fn corrupt_persisted_record() {
        let err = PersistedManifest::from_slice(b"[1, 2").unwrap_err();
        assert!(matches!(err, WorkerError::ManifestCorrupt { .. }));
    }
}
