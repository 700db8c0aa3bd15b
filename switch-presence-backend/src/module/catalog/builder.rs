//! GameTDB dump → compact catalog file
//!
//! Streams the XML dump with quick-xml and keeps, per `<game>` record, the
//! code and the first English title (or the record's `name` attribute).
//! Nothing is written unless the whole dump parsed cleanly.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use switch_presence_common::{CatalogEntry, PREFERRED_LOCALE};
use tokio::fs;

use crate::config::CatalogConfig;
use crate::error::{CoreError, Result};

const DUMP_WHAT: &str = "game database dump";

/// Outcome of one catalog build
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub records_seen: usize,
    pub entries_written: usize,
    pub skipped_missing_id: usize,
    pub skipped_missing_title: usize,
    pub finished_at: DateTime<Utc>,
}

impl BuildReport {
    fn new() -> Self {
        Self {
            records_seen: 0,
            entries_written: 0,
            skipped_missing_id: 0,
            skipped_missing_title: 0,
            finished_at: Utc::now(),
        }
    }
}

impl std::fmt::Display for BuildReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Records: {}, Written: {}, Skipped (no id): {}, Skipped (no title): {}",
            self.records_seen, self.entries_written, self.skipped_missing_id, self.skipped_missing_title
        )
    }
}

/// Which text node is currently being collected
#[derive(Debug, Clone, Copy, PartialEq)]
enum Capture {
    Id,
    Title,
}

/// A `<game>` element while it is being read
#[derive(Debug, Default)]
struct GameRecord {
    /// Depth of the `<game>` element itself
    depth: usize,
    id: Option<String>,
    fallback_name: Option<String>,
    preferred_title: Option<String>,
    /// First EN locale has been seen; later ones are ignored
    seen_preferred_locale: bool,
    in_preferred_locale: bool,
    capture: Option<(Capture, usize, String)>,
}

impl GameRecord {
    fn open(start: &BytesStart<'_>, depth: usize) -> Result<Self> {
        Ok(Self {
            depth,
            fallback_name: attribute(start, "name")?.filter(|n| !n.is_empty()),
            ..Default::default()
        })
    }

    fn child_started(&mut self, start: &BytesStart<'_>, depth: usize, empty: bool) -> Result<()> {
        let name = start.name();
        let tag = name.as_ref();

        if depth == self.depth + 1 {
            match tag {
                b"id" if self.id.is_none() && !empty => {
                    self.capture = Some((Capture::Id, depth, String::new()));
                }
                b"locale" if !self.seen_preferred_locale => {
                    if attribute(start, "lang")?.as_deref() == Some(PREFERRED_LOCALE) {
                        self.seen_preferred_locale = true;
                        self.in_preferred_locale = !empty;
                    }
                }
                _ => {}
            }
        } else if depth == self.depth + 2
            && self.in_preferred_locale
            && tag == b"title"
            && self.preferred_title.is_none()
            && self.capture.is_none()
        {
            // Only the first <title> counts; a self-closing one is an empty title
            if empty {
                self.preferred_title = Some(String::new());
            } else {
                self.capture = Some((Capture::Title, depth, String::new()));
            }
        }

        Ok(())
    }

    fn child_ended(&mut self, depth: usize) {
        if let Some((target, capture_depth, _)) = &self.capture {
            if *capture_depth == depth {
                let target = *target;
                if let Some((_, _, text)) = self.capture.take() {
                    let value = text.trim().to_string();
                    match target {
                        Capture::Id => self.id = Some(value),
                        Capture::Title => self.preferred_title = Some(value),
                    }
                }
                return;
            }
        }

        if depth == self.depth + 1 {
            self.in_preferred_locale = false;
        }
    }

    fn push_text(&mut self, depth: usize, text: &str) {
        if let Some((_, capture_depth, buffer)) = &mut self.capture {
            if *capture_depth + 1 == depth {
                buffer.push_str(text);
            }
        }
    }

    /// Apply the title rules: EN title, else `name` attribute, else nothing
    fn finish(self, report: &mut BuildReport) -> Option<CatalogEntry> {
        report.records_seen += 1;

        let Some(id) = self.id.filter(|id| !id.is_empty()) else {
            report.skipped_missing_id += 1;
            return None;
        };

        let title = self
            .preferred_title
            .filter(|t| !t.is_empty())
            .or(self.fallback_name);

        match title {
            Some(title) => Some(CatalogEntry::new(id.to_uppercase(), title)),
            None => {
                tracing::debug!("Skipping game {} without a usable title", id);
                report.skipped_missing_title += 1;
                None
            }
        }
    }
}

fn attribute(start: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    let attr = start
        .try_get_attribute(key)
        .map_err(|e| CoreError::parse(DUMP_WHAT, e))?;

    match attr {
        Some(attr) => {
            let value = attr.unescape_value().map_err(|e| CoreError::parse(DUMP_WHAT, e))?;
            Ok(Some(value.trim().to_string()))
        }
        None => Ok(None),
    }
}

fn resolve_entity(name: &str) -> String {
    let raw = format!("&{};", name);
    match quick_xml::escape::unescape(&raw) {
        Ok(resolved) => resolved.into_owned(),
        Err(e) => {
            tracing::warn!("Keeping unknown entity {} verbatim: {}", raw, e);
            raw
        }
    }
}

/// Parse a GameTDB dump into catalog entries in document order.
///
/// `<game>` records are expected as direct children of the root element.
pub fn parse_dump(xml: &[u8]) -> Result<(Vec<CatalogEntry>, BuildReport)> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(1024);
    let mut entries = Vec::new();
    let mut report = BuildReport::new();
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut current: Option<GameRecord> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            CoreError::parse(DUMP_WHAT, format!("{} at byte {}", e, reader.error_position()))
        })?;

        match event {
            Event::Start(e) => {
                saw_root = true;
                if let Some(game) = current.as_mut() {
                    game.child_started(&e, depth, false)?;
                } else if depth == 1 && e.name().as_ref() == b"game" {
                    current = Some(GameRecord::open(&e, depth)?);
                }
                depth += 1;
            }
            Event::Empty(e) => {
                saw_root = true;
                if let Some(game) = current.as_mut() {
                    game.child_started(&e, depth, true)?;
                } else if depth == 1 && e.name().as_ref() == b"game" {
                    if let Some(entry) = GameRecord::open(&e, depth)?.finish(&mut report) {
                        entries.push(entry);
                    }
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                let game_closed = current.as_ref().is_some_and(|g| g.depth == depth);
                if game_closed {
                    if let Some(entry) = current.take().and_then(|g| g.finish(&mut report)) {
                        entries.push(entry);
                    }
                } else if let Some(game) = current.as_mut() {
                    game.child_ended(depth);
                }
            }
            Event::Text(e) => {
                if let Some(game) = current.as_mut() {
                    let text = e.decode().map_err(|err| CoreError::parse(DUMP_WHAT, err))?;
                    game.push_text(depth, &text);
                }
            }
            Event::CData(e) => {
                if let Some(game) = current.as_mut() {
                    let text = reader
                        .decoder()
                        .decode(&e)
                        .map_err(|err| CoreError::parse(DUMP_WHAT, err))?;
                    game.push_text(depth, &text);
                }
            }
            Event::GeneralRef(e) => {
                if let Some(game) = current.as_mut() {
                    let name = e.decode().map_err(|err| CoreError::parse(DUMP_WHAT, err))?;
                    game.push_text(depth, &resolve_entity(&name));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(CoreError::parse(DUMP_WHAT, "document has no root element"));
    }
    if depth != 0 {
        return Err(CoreError::parse(
            DUMP_WHAT,
            format!("unexpected end of document with {} unclosed element(s)", depth),
        ));
    }

    report.entries_written = entries.len();
    report.finished_at = Utc::now();
    Ok((entries, report))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replace the catalog file wholesale (temp file + rename)
pub async fn write_catalog(path: impl AsRef<Path>, entries: &[CatalogEntry]) -> Result<()> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(entries).map_err(|e| CoreError::parse("catalog", e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| CoreError::io(parent, e))?;
    }

    let temp_path = temp_path_for(path);
    fs::write(&temp_path, content)
        .await
        .map_err(|e| CoreError::io(&temp_path, e))?;

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(CoreError::io(path, e));
    }

    Ok(())
}

/// One-shot dump → catalog transform
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    dump_path: PathBuf,
    catalog_path: PathBuf,
}

impl CatalogBuilder {
    pub fn new(dump_path: impl AsRef<Path>, catalog_path: impl AsRef<Path>) -> Self {
        Self {
            dump_path: dump_path.as_ref().to_path_buf(),
            catalog_path: catalog_path.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(&config.dump_path, &config.catalog_path)
    }

    /// Parse the dump and rewrite the catalog file.
    ///
    /// A missing or malformed dump leaves the existing catalog file untouched.
    pub async fn build(&self) -> Result<BuildReport> {
        tracing::info!("Parsing {:?}...", self.dump_path);

        let xml = match fs::read(&self.dump_path).await {
            Ok(xml) => xml,
            Err(e) => {
                tracing::error!("Cannot read game database dump {:?}: {}", self.dump_path, e);
                return Err(CoreError::io(&self.dump_path, e));
            }
        };

        // The dump is large; keep the XML walk off the async workers
        let parsed = tokio::task::spawn_blocking(move || parse_dump(&xml))
            .await
            .map_err(|e| CoreError::parse(DUMP_WHAT, e))
            .and_then(|parsed| parsed);
        let (entries, report) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!("Error parsing {:?}: {}", self.dump_path, e);
                return Err(e);
            }
        };
        tracing::info!("Parsed {} games ({})", entries.len(), report);

        write_catalog(&self.catalog_path, &entries).await?;
        tracing::info!("Saved catalog to {:?}", self.catalog_path);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE_DUMP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<datafile>
    <WiiTDB version="20260101" games="5"/>
    <game name="Super Mario Odyssey (fallback)">
        <id>AAACA</id>
        <type/>
        <locale lang="JA"><title>スーパーマリオ オデッセイ</title></locale>
        <locale lang="EN">
            <title>Super Mario Odyssey</title>
            <synopsis>Mario &amp; Cappy</synopsis>
        </locale>
        <locale lang="EN"><title>Second English Title</title></locale>
    </game>
    <game name="Fallback Only">
        <id>AAAEA</id>
        <locale lang="FR"><title>Seulement</title></locale>
    </game>
    <game>
        <id>AABBB</id>
        <locale lang="DE"><title>Nur Deutsch</title></locale>
    </game>
    <game name="No Id Here">
        <locale lang="EN"><title>Orphan</title></locale>
    </game>
    <game name="Mario &amp; Luigi">
        <id>aabcd</id>
        <locale lang="EN"><title>Mario &amp; Luigi: Brothership</title></locale>
    </game>
</datafile>"#;

    #[test]
    fn test_parse_dump_rules() {
        let (entries, report) = parse_dump(SAMPLE_DUMP.as_bytes()).unwrap();

        assert_eq!(
            entries,
            vec![
                CatalogEntry::new("AAACA", "Super Mario Odyssey"),
                CatalogEntry::new("AAAEA", "Fallback Only"),
                CatalogEntry::new("AABCD", "Mario & Luigi: Brothership"),
            ]
        );
        assert_eq!(report.records_seen, 5);
        assert_eq!(report.skipped_missing_id, 1);
        assert_eq!(report.skipped_missing_title, 1);
        assert_eq!(report.entries_written, 3);
    }

    #[test]
    fn test_untitled_records_reduce_count_exactly() {
        let titled = r#"<datafile><game name="A"><id>AAAAA</id></game><game name="B"><id>BBBBB</id></game></datafile>"#;
        let with_untitled = r#"<datafile><game name="A"><id>AAAAA</id></game><game><id>CCCCC</id></game><game name="B"><id>BBBBB</id></game><game><id>DDDDD</id><locale lang="EN"/></game></datafile>"#;

        let (base, _) = parse_dump(titled.as_bytes()).unwrap();
        let (filtered, report) = parse_dump(with_untitled.as_bytes()).unwrap();

        assert_eq!(base, filtered);
        assert_eq!(report.records_seen - filtered.len(), 2);
        assert_eq!(report.skipped_missing_title, 2);
    }

    #[test]
    fn test_first_en_locale_without_title_falls_back_to_name() {
        let xml = r#"<datafile><game name="Named"><id>AAAAA</id><locale lang="EN"><synopsis>x</synopsis></locale><locale lang="EN"><title>Later</title></locale></game></datafile>"#;
        let (entries, _) = parse_dump(xml.as_bytes()).unwrap();
        assert_eq!(entries, vec![CatalogEntry::new("AAAAA", "Named")]);
    }

    #[test]
    fn test_only_first_title_in_locale_counts() {
        for empty_title in ["<title/>", "<title></title>", "<title>  </title>"] {
            let xml = format!(
                r#"<datafile><game name="Named"><id>AAAAA</id><locale lang="EN">{}<title>Second</title></locale></game></datafile>"#,
                empty_title
            );
            let (entries, _) = parse_dump(xml.as_bytes()).unwrap();
            assert_eq!(entries, vec![CatalogEntry::new("AAAAA", "Named")], "{}", empty_title);
        }

        let xml = r#"<datafile><game name="Named"><id>AAAAA</id><locale lang="EN"><title>First</title><title>Second</title></locale></game></datafile>"#;
        let (entries, _) = parse_dump(xml.as_bytes()).unwrap();
        assert_eq!(entries[0].title, "First");
    }

    #[test]
    fn test_cdata_title() {
        let xml = r#"<datafile><game><id>AAAAA</id><locale lang="EN"><title><![CDATA[Tom & Jerry]]></title></locale></game></datafile>"#;
        let (entries, _) = parse_dump(xml.as_bytes()).unwrap();
        assert_eq!(entries[0].title, "Tom & Jerry");
    }

    #[test]
    fn test_nested_games_are_not_records() {
        let xml = r#"<datafile><companies><game name="Nested"><id>NNNNN</id></game></companies><game name="Top"><id>TTTTT</id></game></datafile>"#;
        let (entries, _) = parse_dump(xml.as_bytes()).unwrap();
        assert_eq!(entries, vec![CatalogEntry::new("TTTTT", "Top")]);
    }

    #[test]
    fn test_malformed_dump_is_rejected() {
        assert!(matches!(
            parse_dump(b"<datafile><game><id>AAAAA</id></gme></datafile>"),
            Err(CoreError::Parse { .. })
        ));
        assert!(matches!(
            parse_dump(b"<datafile><game name=\"A\"><id>AAAAA</id></game>"),
            Err(CoreError::Parse { .. })
        ));
        assert!(matches!(parse_dump(b""), Err(CoreError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_build_writes_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let dump = temp_dir.path().join("switchtdb.xml");
        let catalog = temp_dir.path().join("games.json");
        std::fs::write(&dump, SAMPLE_DUMP).unwrap();

        let report = CatalogBuilder::new(&dump, &catalog).build().await.unwrap();
        assert_eq!(report.entries_written, 3);

        let written: Vec<CatalogEntry> =
            serde_json::from_str(&std::fs::read_to_string(&catalog).unwrap()).unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(written[0].id, "AAACA");
        assert!(!temp_path_for(&catalog).exists());
    }

    #[tokio::test]
    async fn test_failed_build_leaves_catalog_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let dump = temp_dir.path().join("switchtdb.xml");
        let catalog = temp_dir.path().join("games.json");
        std::fs::write(&catalog, r#"[{"id":"AAACA","title":"Super Mario Odyssey"}]"#).unwrap();

        let builder = CatalogBuilder::new(&dump, &catalog);
        let missing = builder.build().await.unwrap_err();
        assert!(missing.is_not_found());

        std::fs::write(&dump, "<datafile><game>").unwrap();
        assert!(matches!(builder.build().await, Err(CoreError::Parse { .. })));

        let content = std::fs::read_to_string(&catalog).unwrap();
        assert_eq!(content, r#"[{"id":"AAACA","title":"Super Mario Odyssey"}]"#);
    }
}
