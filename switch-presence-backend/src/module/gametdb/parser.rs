//! GameTDB game page scraper
//!
//! Pulls the display title and the box-art URL out of a
//! `https://www.gametdb.com/Switch/<CODE>` page.

use switch_presence_common::{DEFAULT_ASSET, GameMetadata, UNKNOWN_GAME_TITLE};

use super::document::{HtmlDocument, MarkupDocument};

/// Heading holding "<CODE> - <Title>"
const TITLE_TAG: &str = "h1";
const TITLE_MARKER_CLASS: &str = "notranslate";

const IMAGE_TAG: &str = "img";
const COVER_HQ_MARKER: &str = "art.gametdb.com/switch/coverHQ/";
const COVER_MARKER: &str = "art.gametdb.com/switch/cover/";

/// Canonical page for a game code
pub fn game_page_url(base_url: &str, code: &str) -> String {
    format!("{}/Switch/{}", base_url.trim_end_matches('/'), code)
}

/// Title from the marked heading, with a leading "<CODE> - " removed
pub fn extract_title(doc: &impl MarkupDocument, code: &str) -> String {
    let Some(heading) = doc.find_first(TITLE_TAG, &|e| e.has_class(TITLE_MARKER_CLASS)) else {
        return UNKNOWN_GAME_TITLE.to_string();
    };

    let full_title = heading.text.trim();
    let prefix = format!("{} - ", code);
    match full_title.strip_prefix(&prefix) {
        Some(title) => title.to_string(),
        None => full_title.to_string(),
    }
}

/// Cover art source containing the code: HQ cover first, then the
/// standard cover, then the default asset key
pub fn extract_cover_art(doc: &impl MarkupDocument, code: &str) -> String {
    let sources: Vec<String> = doc
        .elements(IMAGE_TAG)
        .into_iter()
        .filter_map(|img| img.attr("src").map(str::to_string))
        .collect();

    let find_cover = |marker: &str| {
        sources
            .iter()
            .find(|src| src.contains(marker) && src.contains(code))
            .cloned()
    };

    find_cover(COVER_HQ_MARKER)
        .or_else(|| find_cover(COVER_MARKER))
        .unwrap_or_else(|| DEFAULT_ASSET.to_string())
}

pub fn extract_game_metadata(doc: &impl MarkupDocument, code: &str, base_url: &str) -> GameMetadata {
    GameMetadata {
        name: extract_title(doc, code),
        image_url: extract_cover_art(doc, code),
        page_url: game_page_url(base_url, code),
    }
}

/// Parse a raw game page body
pub fn parse_game_page(markup: &str, code: &str, base_url: &str) -> GameMetadata {
    let doc = HtmlDocument::parse(markup);
    extract_game_metadata(&doc, code, base_url)
}
