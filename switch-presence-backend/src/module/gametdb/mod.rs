//! GameTDB remote lookups
//!
//! Fetches `https://www.gametdb.com/Switch/<CODE>` pages and scrapes the
//! title and box art out of them.

pub mod client;
pub mod document;
pub mod parser;

pub use client::GameTdbClient;
pub use document::{HtmlDocument, MarkupDocument, MarkupElement};
pub use parser::{extract_game_metadata, game_page_url, parse_game_page};
