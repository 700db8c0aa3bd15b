use std::time::Duration;

use reqwest::{Client, StatusCode};
use switch_presence_common::GameMetadata;

use super::parser::game_page_url;
use crate::config::GameTdbConfig;
use crate::error::{CoreError, Result};

/// HTTP access to gametdb.com
///
/// Every request carries a browser User-Agent; the site turns away
/// obvious bots.
#[derive(Clone)]
pub struct GameTdbClient {
    client: Client,
    base_url: String,
}

impl GameTdbClient {
    pub fn new(config: &GameTdbConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn page_url(&self, code: &str) -> String {
        game_page_url(&self.base_url, code)
    }

    pub fn search_url(&self, query: &str) -> String {
        format!("{}/Switch/Search?q={}", self.base_url, urlencoding::encode(query))
    }

    /// GET the game page; anything but 200 is an error
    pub async fn fetch_game_page(&self, code: &str) -> Result<String> {
        let url = self.page_url(code);
        tracing::info!("Attempting valid ID fetch: {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(CoreError::Network(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }

        Ok(response.text().await?)
    }

    /// Remote title search.
    ///
    /// The request is issued but the result page is not parsed yet, so this
    /// never produces a match.
    pub async fn search(&self, query: &str) -> Result<Option<GameMetadata>> {
        let url = self.search_url(query);
        tracing::info!("Attempting search: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(CoreError::Network(format!("HTTP {} for {}", status, url)));
        }

        // TODO: parse the search results table into GameMetadata candidates.
        tracing::debug!("Search page returned {}; result parsing not implemented", status);
        Ok(None)
    }
}
