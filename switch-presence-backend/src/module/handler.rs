//! Console command parsing and presence composition.

use std::sync::LazyLock;

use regex::Regex;
use switch_presence_common::{
    CatalogEntry, DEFAULT_ASSET, DEFAULT_SMALL_IMAGE, DEFAULT_SMALL_TEXT, DEFAULT_STATE, GameMetadata,
    QueryMode, ResolutionQuery,
};

use super::presence::Activity;

static COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*/(\S+)\s*(.*)$").expect("command pattern is valid"));

/// Minimum input length before catalog search kicks in
pub const MIN_SEARCH_LEN: usize = 2;
/// Minimum description length before the default state is used instead
pub const MIN_DESCRIPTION_LEN: usize = 2;
/// Suggestions printed after a failed name query
pub const MAX_SUGGESTIONS: usize = 5;

pub const HELP_TEXT: &str = "\
Commands:
  <text>             look up a game by name
  /q <name>          look up a game by name
  /id <code>         look up a game by its 5-character code (e.g. AAACA)
  /s <text>          search catalog titles
  /set [description] publish presence for the current game (default: Playing)
  /build             rebuild the catalog from the XML dump and reload it
  /reload            reload the catalog file
  /status            show catalog, selection and presence state
  /help              show this help
  /quit              exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Query(ResolutionQuery),
    Search(String),
    SetPresence(Option<String>),
    Build,
    Reload,
    Status,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ConsoleCommand::Empty;
        }

        match parse_command(line) {
            Some((command, args)) => route(&command, args.trim()),
            None => ConsoleCommand::Query(ResolutionQuery::by_name(line)),
        }
    }
}

/// Parse command from a console line
fn parse_command(content: &str) -> Option<(String, String)> {
    let caps = COMMAND.captures(content)?;
    let command = caps.get(1).map_or("", |m| m.as_str()).to_string();
    let args = caps.get(2).map_or("", |m| m.as_str()).to_string();
    Some((command, args))
}

fn route(command: &str, args: &str) -> ConsoleCommand {
    match command.to_lowercase().as_str() {
        "q" | "query" => query(args, QueryMode::Name),
        "id" => query(args, QueryMode::Id),
        "s" | "search" => {
            if args.chars().count() < MIN_SEARCH_LEN {
                ConsoleCommand::Invalid(format!(
                    "Search needs at least {} characters. Example: /s mario",
                    MIN_SEARCH_LEN
                ))
            } else {
                ConsoleCommand::Search(args.to_string())
            }
        }
        "set" => ConsoleCommand::SetPresence((!args.is_empty()).then(|| args.to_string())),
        "build" => ConsoleCommand::Build,
        "reload" => ConsoleCommand::Reload,
        "status" => ConsoleCommand::Status,
        "help" | "h" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        _ => ConsoleCommand::Invalid(format!("Unknown command: /{}", command)),
    }
}

fn query(args: &str, mode: QueryMode) -> ConsoleCommand {
    if args.is_empty() {
        let example = match mode {
            QueryMode::Name => "/q Super Mario Odyssey",
            QueryMode::Id => "/id AAACA",
        };
        return ConsoleCommand::Invalid(format!("Please enter a game name or ID. Example: {}", example));
    }
    ConsoleCommand::Query(ResolutionQuery::new(args, mode))
}

/// What the console currently has selected
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub game: Option<GameMetadata>,
    pub last_query: Option<ResolutionQuery>,
}

impl Selection {
    /// Record a finished query; a miss clears the previous game
    pub fn apply(&mut self, query: ResolutionQuery, result: Option<GameMetadata>) {
        self.last_query = Some(query);
        self.game = result;
    }

    /// Title shown as the presence details, if anything is selected
    pub fn display_name(&self) -> Option<&str> {
        self.game
            .as_ref()
            .map(|game| game.name.as_str())
            .or_else(|| self.last_query.as_ref().map(|q| q.text.as_str()))
    }
}

/// Compose the activity for `/set`; `None` when no game has been entered
pub fn presence_activity(selection: &Selection, description: Option<&str>) -> Option<Activity> {
    let name = selection.display_name()?;
    let image = selection
        .game
        .as_ref()
        .map_or(DEFAULT_ASSET, |game| game.image_url.as_str());

    let state = match description.map(str::trim) {
        Some(desc) if desc.chars().count() >= MIN_DESCRIPTION_LEN => desc,
        _ => DEFAULT_STATE,
    };

    Some(Activity::new(
        state,
        name,
        image,
        name,
        DEFAULT_SMALL_IMAGE,
        DEFAULT_SMALL_TEXT,
    ))
}

pub fn format_game(game: &GameMetadata) -> String {
    let cover = if game.has_cover_art() {
        game.image_url.as_str()
    } else {
        "(no cover art)"
    };
    format!("Found: {}\n  Cover: {}\n  Game Page: {}", game.name, cover, game.page_url)
}

pub fn format_entries(entries: &[CatalogEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("  {}  {}", entry.id, entry.title))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_not_found(query: &ResolutionQuery, suggestions: &[CatalogEntry]) -> String {
    let mut message = format!(
        "No results found on GameTDB for '{}'.\nTry using the Game ID directly (e.g. AAACA).",
        query.text
    );
    if !suggestions.is_empty() {
        message.push_str("\nDid you mean:\n");
        message.push_str(&format_entries(suggestions));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn odyssey() -> GameMetadata {
        GameMetadata {
            name: "Super Mario Odyssey".to_string(),
            image_url: "https://art.gametdb.com/switch/coverHQ/US/AAACA.jpg".to_string(),
            page_url: "https://www.gametdb.com/Switch/AAACA".to_string(),
        }
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse_command("/q zelda"),
            Some(("q".to_string(), "zelda".to_string()))
        );
        assert_eq!(
            parse_command("  /id   AAACA  "),
            Some(("id".to_string(), "AAACA".to_string()))
        );
        assert_eq!(parse_command("no command here"), None);
    }

    #[test]
    fn test_route_commands() {
        assert_eq!(
            ConsoleCommand::parse("/q Super Mario Odyssey"),
            ConsoleCommand::Query(ResolutionQuery::by_name("Super Mario Odyssey"))
        );
        assert_eq!(
            ConsoleCommand::parse("/ID aaaca"),
            ConsoleCommand::Query(ResolutionQuery::by_id("aaaca"))
        );
        assert_eq!(ConsoleCommand::parse("/s mar"), ConsoleCommand::Search("mar".to_string()));
        assert_eq!(ConsoleCommand::parse("/set"), ConsoleCommand::SetPresence(None));
        assert_eq!(
            ConsoleCommand::parse("/set Speedrunning"),
            ConsoleCommand::SetPresence(Some("Speedrunning".to_string()))
        );
        assert_eq!(ConsoleCommand::parse("/build"), ConsoleCommand::Build);
        assert_eq!(ConsoleCommand::parse("/reload"), ConsoleCommand::Reload);
        assert_eq!(ConsoleCommand::parse("/status"), ConsoleCommand::Status);
        assert_eq!(ConsoleCommand::parse("/help"), ConsoleCommand::Help);
        assert_eq!(ConsoleCommand::parse("/exit"), ConsoleCommand::Quit);
        assert_eq!(ConsoleCommand::parse("   "), ConsoleCommand::Empty);
    }

    #[test]
    fn test_bare_text_is_name_query() {
        assert_eq!(
            ConsoleCommand::parse("  mario kart  "),
            ConsoleCommand::Query(ResolutionQuery::by_name("mario kart"))
        );
    }

    #[test]
    fn test_invalid_commands() {
        assert!(matches!(ConsoleCommand::parse("/s m"), ConsoleCommand::Invalid(_)));
        assert!(matches!(ConsoleCommand::parse("/q"), ConsoleCommand::Invalid(_)));
        assert_eq!(
            ConsoleCommand::parse("/frobnicate"),
            ConsoleCommand::Invalid("Unknown command: /frobnicate".to_string())
        );
    }

    #[test]
    fn test_presence_for_resolved_game() {
        let mut selection = Selection::default();
        selection.apply(ResolutionQuery::by_id("AAACA"), Some(odyssey()));

        let activity = presence_activity(&selection, Some("Exploring")).unwrap();
        assert_eq!(activity.state, "Exploring");
        assert_eq!(activity.details, "Super Mario Odyssey");
        assert_eq!(activity.large_text, "Super Mario Odyssey");
        assert_eq!(activity.large_image, odyssey().image_url);
        assert_eq!(activity.small_image, "online");
        assert_eq!(activity.small_text, "Online");
    }

    #[test]
    fn test_short_description_defaults_to_playing() {
        let mut selection = Selection::default();
        selection.apply(ResolutionQuery::by_id("AAACA"), Some(odyssey()));

        for desc in [None, Some(""), Some("x"), Some("  x ")] {
            assert_eq!(presence_activity(&selection, desc).unwrap().state, "Playing");
        }
    }

    #[test]
    fn test_unresolved_query_uses_default_asset() {
        let mut selection = Selection::default();
        assert!(presence_activity(&selection, None).is_none());

        selection.apply(ResolutionQuery::by_name("Homebrew Thing"), None);
        let activity = presence_activity(&selection, None).unwrap();
        assert_eq!(activity.details, "Homebrew Thing");
        assert_eq!(activity.large_image, DEFAULT_ASSET);
    }

    #[test]
    fn test_not_found_lists_suggestions() {
        let suggestions = vec![CatalogEntry::new("AAACA", "Super Mario Odyssey")];
        let message = format_not_found(&ResolutionQuery::by_name("mario"), &suggestions);
        assert!(message.contains("Did you mean"));
        assert!(message.contains("AAACA  Super Mario Odyssey"));

        let bare = format_not_found(&ResolutionQuery::by_name("zzz"), &[]);
        assert!(!bare.contains("Did you mean"));
    }
}
