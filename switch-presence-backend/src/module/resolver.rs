//! Tiered game query resolution
//!
//! 1. exact code in the local catalog
//! 2. exact title in the local catalog
//! 3. direct page fetch when the token looks like a game code
//! 4. remote title search

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use switch_presence_common::{GameMetadata, ResolutionQuery};
use tracing::{debug, info, warn};

use super::catalog::{Catalog, CatalogSnapshot};
use super::gametdb::{GameTdbClient, parse_game_page};

static GAME_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{5}$").expect("game code pattern is valid"));

/// Which local tier matched the query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogMatch {
    Code,
    Title,
}

/// Promote the query to a catalog id when the catalog knows it
pub fn canonical_token(snapshot: &CatalogSnapshot, query: &str) -> (String, Option<CatalogMatch>) {
    if let Some(entry) = snapshot.lookup_by_id(query) {
        debug!("Direct ID match in DB: {}", entry.id);
        return (entry.id.clone(), Some(CatalogMatch::Code));
    }

    if let Some(entry) = snapshot.lookup_by_title(query) {
        debug!("Exact name match in DB: {}", entry.id);
        return (entry.id.clone(), Some(CatalogMatch::Title));
    }

    (query.to_string(), None)
}

/// Uppercased token if it has the shape of a game code
pub fn as_game_code(token: &str) -> Option<String> {
    let upper = token.to_uppercase();
    GAME_CODE.is_match(&upper).then_some(upper)
}

#[async_trait]
pub trait QueryResolver: Send + Sync {
    /// `None` means every tier came up empty
    async fn resolve(&self, query: &ResolutionQuery) -> Option<GameMetadata>;
}

pub struct Resolver {
    catalog: Arc<Catalog>,
    client: GameTdbClient,
}

impl Resolver {
    pub fn new(catalog: Arc<Catalog>, client: GameTdbClient) -> Self {
        Self { catalog, client }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    async fn fetch_by_code(&self, code: &str) -> Option<GameMetadata> {
        match self.client.fetch_game_page(code).await {
            Ok(body) => Some(parse_game_page(&body, code, self.client.base_url())),
            Err(e) => {
                warn!("Error fetching ID {}: {}", code, e);
                None
            }
        }
    }

    async fn search_remote(&self, query: &str) -> Option<GameMetadata> {
        match self.client.search(query).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Search failed for '{}': {}", query, e);
                None
            }
        }
    }
}

#[async_trait]
impl QueryResolver for Resolver {
    async fn resolve(&self, query: &ResolutionQuery) -> Option<GameMetadata> {
        info!("Resolving '{}' (mode: {})", query.text, query.mode);

        let (token, matched) = {
            let snapshot = self.catalog.snapshot().await;
            canonical_token(&snapshot, &query.text)
        };
        if matched.is_none() {
            debug!("No local catalog match for '{}'", query.text);
        }

        if let Some(code) = as_game_code(&token) {
            if let Some(metadata) = self.fetch_by_code(&code).await {
                info!("Resolved '{}' to {} ({})", query.text, metadata.name, code);
                return Some(metadata);
            }
        }

        let result = self.search_remote(&query.text).await;
        if result.is_none() {
            info!("No result for '{}'", query.text);
        }
        result
    }
}
