//! Rich presence publishing
//!
//! `PresenceUpdater` tracks the connection and swallows failures;
//! `PresenceClient` is the transport seam, `DiscordIpcClient` the real one.

mod ipc;
mod updater;

pub use ipc::{DEFAULT_CLIENT_ID, DiscordIpcClient, Opcode};
pub use updater::{ConnectionState, PresenceUpdater};

use async_trait::async_trait;

use crate::error::Result;

/// The six presence fields shown on the user's profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub state: String,
    pub details: String,
    pub large_image: String,
    pub large_text: String,
    pub small_image: String,
    pub small_text: String,
}

impl Activity {
    pub fn new(
        state: impl Into<String>,
        details: impl Into<String>,
        large_image: impl Into<String>,
        large_text: impl Into<String>,
        small_image: impl Into<String>,
        small_text: impl Into<String>,
    ) -> Self {
        Self {
            state: state.into(),
            details: details.into(),
            large_image: large_image.into(),
            large_text: large_text.into(),
            small_image: small_image.into(),
            small_text: small_text.into(),
        }
    }
}

#[async_trait]
pub trait PresenceClient: Send {
    async fn connect(&mut self) -> Result<()>;

    async fn set_activity(&mut self, activity: &Activity) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}
