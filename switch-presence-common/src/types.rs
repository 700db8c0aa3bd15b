use serde::{Deserialize, Serialize};

/// Title used when a game page carries no recognisable heading
pub const UNKNOWN_GAME_TITLE: &str = "Unknown Game";

/// Asset key used when no cover art could be extracted
pub const DEFAULT_ASSET: &str = "switch";

pub const DEFAULT_SMALL_IMAGE: &str = "online";
pub const DEFAULT_SMALL_TEXT: &str = "Online";
pub const DEFAULT_STATE: &str = "Playing";

/// Locale whose title wins when building the catalog
pub const PREFERRED_LOCALE: &str = "EN";

/// One row of the compact catalog file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Five character game code, e.g. "AAACA"
    pub id: String,
    pub title: String,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Display metadata for a resolved game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub name: String,
    /// Absolute cover-art URL or [`DEFAULT_ASSET`]
    pub image_url: String,
    pub page_url: String,
}

impl GameMetadata {
    /// Whether the image is a real URL rather than the sentinel asset key
    pub fn has_cover_art(&self) -> bool {
        self.image_url != DEFAULT_ASSET
    }
}

/// How the caller wants the query text to be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QueryMode {
    #[default]
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "id")]
    Id,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Name => "name",
            QueryMode::Id => "id",
        }
    }
}

impl std::fmt::Display for QueryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" | "title" => Ok(QueryMode::Name),
            "id" | "code" => Ok(QueryMode::Id),
            _ => Err(format!("Unknown query mode: {}", s)),
        }
    }
}

/// Raw query text plus the mode chosen by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionQuery {
    pub text: String,
    pub mode: QueryMode,
}

impl ResolutionQuery {
    pub fn new(text: impl Into<String>, mode: QueryMode) -> Self {
        Self {
            text: text.into(),
            mode,
        }
    }

    pub fn by_name(text: impl Into<String>) -> Self {
        Self::new(text, QueryMode::Name)
    }

    pub fn by_id(text: impl Into<String>) -> Self {
        Self::new(text, QueryMode::Id)
    }
}
