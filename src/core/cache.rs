//! On-disk cache of exported skill documents.
//!
//! One file per skill, `{id}-{name}.json`, holding the full export. A file
//! is reused only while its `updated` marker equals the one the service
//! reports in its skill list; any other marker means re-fetch and overwrite.
//! Files are never removed, so renamed or deleted skills leave their last
//! export behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info, warn};

use crate::core::skill::{SkillDocument, SkillRecord};
use crate::error::Result;
use crate::service::SkillService;

/// A skill export stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedArtifact {
    pub path: PathBuf,
    pub updated_on: String,
    pub document: SkillDocument,
    /// Served from disk without a remote fetch.
    pub from_cache: bool,
}

impl CachedArtifact {
    /// Wrap an export that is already on disk, such as a hand-picked file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let document: SkillDocument = serde_json::from_str(&fs::read_to_string(path)?)?;
        Ok(Self {
            path: path.to_path_buf(),
            updated_on: document.updated.clone().unwrap_or_default(),
            document,
            from_cache: true,
        })
    }
}

/// Cache rooted at the project's `skills/` folder.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<id>-<name>.json`, always directly below the root.
    ///
    /// Path separators in the remote name become `_`.
    #[must_use]
    pub fn artifact_path(&self, record: &SkillRecord) -> PathBuf {
        let name = record.name.replace(['/', '\\'], "_");
        self.root.join(format!("{}-{name}.json", record.id))
    }

    /// Cached document at `path` if its `updated` marker is `expected_marker`.
    ///
    /// A missing, unreadable or unparseable file is a miss, never an error.
    #[must_use]
    pub fn get_cached(path: &Path, expected_marker: &str) -> Option<SkillDocument> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %err, "unreadable cache file");
                }
                return None;
            }
        };
        let document: SkillDocument = match serde_json::from_str(&raw) {
            Ok(document) => document,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "corrupt cache file");
                return None;
            }
        };
        if document.updated.as_deref() == Some(expected_marker) {
            Some(document)
        } else {
            debug!(
                path = %path.display(),
                cached = document.updated.as_deref().unwrap_or(""),
                expected = expected_marker,
                "cache marker mismatch"
            );
            None
        }
    }

    /// Write `document` to `path` with 4-space indentation.
    pub fn store(path: &Path, document: &SkillDocument) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        write_pretty(&mut file, document, b"    ")?;
        file.write_all(b"\n")?;
        Ok(())
    }

    /// The export for `record`, from disk when still current, otherwise
    /// fetched from `service` and stored.
    pub fn get_or_fetch(
        &self,
        service: &dyn SkillService,
        record: &SkillRecord,
    ) -> Result<CachedArtifact> {
        let path = self.artifact_path(record);
        if let Some(document) = Self::get_cached(&path, &record.updated_on) {
            info!("Using cache for skill {}", record.label());
            return Ok(CachedArtifact {
                path,
                updated_on: record.updated_on.clone(),
                document,
                from_cache: true,
            });
        }

        debug!(id = %record.id, name = %record.name, "fetching skill");
        let document = service.get(&record.id)?;
        Self::store(&path, &document)?;
        let updated_on = document
            .updated
            .clone()
            .unwrap_or_else(|| record.updated_on.clone());
        Ok(CachedArtifact {
            path,
            updated_on,
            document,
            from_cache: false,
        })
    }
}

/// Serialize `value` as pretty JSON with the given indent.
pub fn write_pretty<W: Write, T: Serialize + ?Sized>(
    writer: W,
    value: &T,
    indent: &[u8],
) -> Result<()> {
    let formatter = PrettyFormatter::with_indent(indent);
    let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
    value.serialize(&mut serializer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::tempdir;

    use crate::error::WaError;

    #[test]
    fn artifact_path_stays_flat_for_names_with_separators() {
        let cache = CacheStore::new("/project/skills");
        let path = cache.artifact_path(&SkillRecord::new("ws-3", "sales/emea\\north", "m1"));
        assert_eq!(path, Path::new("/project/skills/ws-3-sales_emea_north.json"));
        assert_eq!(path.parent(), Some(cache.root()));
    }

    struct CountingService {
        document: SkillDocument,
        gets: Cell<usize>,
    }

    impl SkillService for CountingService {
        fn list(&self, _pattern: &str) -> Result<Vec<SkillRecord>> {
            Ok(Vec::new())
        }
        fn get(&self, _id: &str) -> Result<SkillDocument> {
            self.gets.set(self.gets.get() + 1);
            Ok(self.document.clone())
        }
        fn status(&self, _id: &str) -> Result<String> {
            Err(WaError::remote("status", "unused"))
        }
        fn create(&self, _document: &SkillDocument) -> Result<bool> {
            Ok(false)
        }
        fn update(&self, _document: &SkillDocument) -> Result<bool> {
            Ok(false)
        }
        fn delete(&self, _id: &str) -> Result<bool> {
            Ok(false)
        }
    }

    fn document(marker: &str) -> SkillDocument {
        let mut doc = SkillDocument::new("billing", "Billing bot");
        doc.updated = Some(marker.to_string());
        doc
    }

    #[test]
    fn hit_only_with_matching_marker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1-billing.json");
        CacheStore::store(&path, &document("2024-01-01T00:00:00Z")).unwrap();

        let hit = CacheStore::get_cached(&path, "2024-01-01T00:00:00Z");
        assert_eq!(hit, Some(document("2024-01-01T00:00:00Z")));
        assert!(CacheStore::get_cached(&path, "2024-01-02T00:00:00Z").is_none());
    }

    #[test]
    fn lookups_are_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1-billing.json");
        CacheStore::store(&path, &document("m1")).unwrap();
        assert_eq!(
            CacheStore::get_cached(&path, "m1"),
            CacheStore::get_cached(&path, "m1")
        );
    }

    #[test]
    fn missing_and_corrupt_files_are_misses() {
        let dir = tempdir().unwrap();
        assert!(CacheStore::get_cached(&dir.path().join("nope.json"), "m1").is_none());
        let corrupt = dir.path().join("bad.json");
        fs::write(&corrupt, "{not json").unwrap();
        assert!(CacheStore::get_cached(&corrupt, "m1").is_none());
    }

    #[test]
    fn store_creates_parents_and_indents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/skills/1-billing.json");
        CacheStore::store(&path, &document("m1")).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n    \"name\": \"billing\""));
    }

    #[test]
    fn get_or_fetch_fetches_once_while_marker_is_unchanged() {
        let dir = tempdir().unwrap();
        let cache = CacheStore::new(dir.path());
        let service = CountingService {
            document: document("m1"),
            gets: Cell::new(0),
        };
        let record = SkillRecord::new("1", "billing", "m1");

        let first = cache.get_or_fetch(&service, &record).unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.path, dir.path().join("1-billing.json"));
        let second = cache.get_or_fetch(&service, &record).unwrap();
        assert!(second.from_cache);
        assert_eq!(second.document, first.document);
        assert_eq!(service.gets.get(), 1);
    }

    #[test]
    fn get_or_fetch_refetches_after_remote_change() {
        let dir = tempdir().unwrap();
        let cache = CacheStore::new(dir.path());
        let service = CountingService {
            document: document("m2"),
            gets: Cell::new(0),
        };
        CacheStore::store(&dir.path().join("1-billing.json"), &document("m1")).unwrap();

        let fetched = cache
            .get_or_fetch(&service, &SkillRecord::new("1", "billing", "m2"))
            .unwrap();
        assert!(!fetched.from_cache);
        assert_eq!(fetched.updated_on, "m2");
        assert_eq!(service.gets.get(), 1);
    }
}
