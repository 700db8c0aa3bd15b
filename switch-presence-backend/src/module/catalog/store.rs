use std::path::{Path, PathBuf};
use std::sync::Arc;

use switch_presence_common::CatalogEntry;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};

/// Default cap for title suggestions
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Immutable, ordered view of the catalog.
///
/// Lookups scan in file order and the first match wins; ids are not
/// assumed to be unique.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    entries: Vec<CatalogEntry>,
}

impl CatalogSnapshot {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive exact match on the game code
    pub fn lookup_by_id(&self, code: &str) -> Option<&CatalogEntry> {
        let code = code.to_uppercase();
        self.entries.iter().find(|entry| entry.id.to_uppercase() == code)
    }

    /// Case-insensitive exact match on the title
    pub fn lookup_by_title(&self, title: &str) -> Option<&CatalogEntry> {
        let title = title.to_lowercase();
        self.entries.iter().find(|entry| entry.title.to_lowercase() == title)
    }

    /// Case-insensitive substring search, catalog order, at most `limit` hits
    pub fn search_titles(&self, substring: &str, limit: usize) -> Vec<&CatalogEntry> {
        let needle = substring.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| entry.title.to_lowercase().contains(&needle))
            .take(limit)
            .collect()
    }
}

/// Read and deserialize a catalog file
pub async fn read_catalog(path: impl AsRef<Path>) -> Result<Vec<CatalogEntry>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| CoreError::io(path, e))?;

    serde_json::from_str(&content).map_err(|e| CoreError::parse(format!("catalog {:?}", path), e))
}

/// Live catalog bound to its file on disk.
///
/// Reloads replace the whole snapshot at once; readers holding an older
/// snapshot keep a consistent view until they drop it.
pub struct Catalog {
    path: PathBuf,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
}

impl Catalog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::default())),
        }
    }

    /// Catalog pre-populated with entries, e.g. right after a build
    pub fn from_entries(path: impl AsRef<Path>, entries: Vec<CatalogEntry>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::new(entries))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the catalog file, returning the number of entries.
    ///
    /// On failure the previously loaded entries stay in place.
    pub async fn load(&self) -> Result<usize> {
        match read_catalog(&self.path).await {
            Ok(entries) => {
                let count = entries.len();
                *self.snapshot.write().await = Arc::new(CatalogSnapshot::new(entries));
                info!("Loaded {} games from local catalog {:?}", count, self.path);
                Ok(count)
            }
            Err(e) => {
                warn!("Could not load catalog {:?}: {}", self.path, e);
                Err(e)
            }
        }
    }

    pub async fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.snapshot.read().await.len()
    }

    pub async fn lookup_by_id(&self, code: &str) -> Option<CatalogEntry> {
        self.snapshot().await.lookup_by_id(code).cloned()
    }

    pub async fn lookup_by_title(&self, title: &str) -> Option<CatalogEntry> {
        self.snapshot().await.lookup_by_title(title).cloned()
    }

    pub async fn search_titles(&self, substring: &str, limit: usize) -> Vec<CatalogEntry> {
        let snapshot = self.snapshot().await;
        let results: Vec<CatalogEntry> = snapshot
            .search_titles(substring, limit)
            .into_iter()
            .cloned()
            .collect();
        debug!("Search '{}' found {} results", substring, results.len());
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_entries() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry::new("AAACA", "Super Mario Odyssey"),
            CatalogEntry::new("AAAAB", "The Legend of Zelda: Breath of the Wild"),
            CatalogEntry::new("AABQA", "Mario Kart 8 Deluxe"),
            CatalogEntry::new("AAACA", "Duplicate Code"),
            CatalogEntry::new("ADENA", "Super Mario Party"),
        ]
    }

    #[test]
    fn test_lookup_by_id_round_trip() {
        let snapshot = CatalogSnapshot::new(sample_entries());
        for entry in snapshot.entries() {
            let found = snapshot.lookup_by_id(&entry.id.to_uppercase()).unwrap();
            assert_eq!(found.id, entry.id);
        }
        assert_eq!(snapshot.lookup_by_id("aaaca").unwrap().title, "Super Mario Odyssey");
        assert!(snapshot.lookup_by_id("ZZZZZ").is_none());
    }

    #[test]
    fn test_lookup_by_title_is_case_insensitive() {
        let snapshot = CatalogSnapshot::new(sample_entries());
        let upper = snapshot.lookup_by_title("Super Mario Odyssey").unwrap();
        let lower = snapshot.lookup_by_title("super mario odyssey").unwrap();
        assert_eq!(upper.id, lower.id);
        assert!(snapshot.lookup_by_title("super mario").is_none());
    }

    #[test]
    fn test_search_titles_order_and_limit() {
        let snapshot = CatalogSnapshot::new(sample_entries());

        let results = snapshot.search_titles("MARIO", 20);
        let ids: Vec<&str> = results.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["AAACA", "AABQA", "ADENA"]);

        let limited = snapshot.search_titles("mario", 2);
        assert_eq!(limited.len(), 2);
        assert!(limited.iter().all(|e| e.title.to_lowercase().contains("mario")));

        assert!(snapshot.search_titles("mario", 0).is_empty());
    }

    #[test]
    fn test_search_titles_caps_large_result_sets() {
        let entries: Vec<CatalogEntry> = (0..50)
            .map(|i| CatalogEntry::new(format!("A{:04}", i), format!("Mario Game {}", i)))
            .collect();
        let snapshot = CatalogSnapshot::new(entries);

        let results = snapshot.search_titles("mario", DEFAULT_SEARCH_LIMIT);
        assert_eq!(results.len(), 20);
        assert_eq!(results[0].id, "A0000");
        assert_eq!(results[19].id, "A0019");
    }

    #[tokio::test]
    async fn test_load_keeps_previous_on_failure() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("games.json");
        std::fs::write(&path, serde_json::to_string(&sample_entries()).unwrap()).unwrap();

        let catalog = Catalog::new(&path);
        assert_eq!(catalog.load().await.unwrap(), 5);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(catalog.load().await, Err(CoreError::Parse { .. })));
        assert_eq!(catalog.len().await, 5);

        std::fs::remove_file(&path).unwrap();
        assert!(catalog.load().await.unwrap_err().is_not_found());
        assert_eq!(catalog.len().await, 5);
    }

    #[tokio::test]
    async fn test_snapshot_survives_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("games.json");
        std::fs::write(&path, serde_json::to_string(&sample_entries()).unwrap()).unwrap();

        let catalog = Catalog::new(&path);
        catalog.load().await.unwrap();
        let before = catalog.snapshot().await;

        std::fs::write(&path, r#"[{"id":"BBBBB","title":"Only One"}]"#).unwrap();
        assert_eq!(catalog.load().await.unwrap(), 1);

        assert_eq!(before.len(), 5);
        assert_eq!(catalog.len().await, 1);
        assert_eq!(catalog.lookup_by_id("bbbbb").await.unwrap().title, "Only One");
    }
}
