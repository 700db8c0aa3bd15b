//! Offline game catalog
//!
//! - `CatalogBuilder`: GameTDB XML dump → `games.json`
//! - `Catalog`: in-memory id/title lookups over `games.json`

mod builder;
mod store;

pub use builder::{BuildReport, CatalogBuilder, parse_dump, write_catalog};
pub use store::{Catalog, CatalogSnapshot, DEFAULT_SEARCH_LIMIT, read_catalog};

use crate::error::Result;

/// Rebuild the catalog file from the dump, then reload the live catalog.
///
/// A failed build returns before the reload, so the live catalog and the
/// file on disk keep their previous contents.
pub async fn rebuild_and_reload(builder: &CatalogBuilder, catalog: &Catalog) -> Result<(BuildReport, usize)> {
    let report = builder.build().await?;
    let count = catalog.load().await?;
    Ok((report, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_failed_rebuild_keeps_loaded_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let dump = temp_dir.path().join("switchtdb.xml");
        let catalog_path = temp_dir.path().join("games.json");

        std::fs::write(
            &dump,
            r#"<datafile><game name="One"><id>AAAAA</id></game><game name="Two"><id>BBBBB</id></game></datafile>"#,
        )
        .unwrap();

        let builder = CatalogBuilder::new(&dump, &catalog_path);
        let catalog = Catalog::new(&catalog_path);
        let (report, count) = rebuild_and_reload(&builder, &catalog).await.unwrap();
        assert_eq!(report.entries_written, 2);
        assert_eq!(count, 2);

        std::fs::write(&dump, "<datafile><game name=\"Three\">").unwrap();
        assert!(rebuild_and_reload(&builder, &catalog).await.is_err());
        assert_eq!(catalog.len().await, 2);

        assert_eq!(catalog.load().await.unwrap(), 2);
    }
}
