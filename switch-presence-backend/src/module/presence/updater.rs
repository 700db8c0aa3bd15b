use tokio::sync::{Mutex, RwLock};

use super::{Activity, PresenceClient};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Connecting,
}

/// Presence publisher with reconnect-on-next-use.
///
/// Nothing here fails the caller: errors are logged, the connection is
/// marked down and the next update makes a single fresh connect attempt.
pub struct PresenceUpdater<C: PresenceClient> {
    client: Mutex<C>,
    state: RwLock<ConnectionState>,
}

impl<C: PresenceClient> PresenceUpdater<C> {
    pub fn new(client: C) -> Self {
        Self {
            client: Mutex::new(client),
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Initial connection attempt
    pub async fn initialize(&self) {
        *self.state.write().await = ConnectionState::Connecting;

        let result = self.client.lock().await.connect().await;
        match result {
            Ok(()) => {
                *self.state.write().await = ConnectionState::Connected;
                tracing::info!("Presence service connected");
            }
            Err(e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                tracing::warn!("Failed to connect to presence service: {}", e);
            }
        }
    }

    /// One connect attempt if currently down
    pub async fn ensure_connected(&self) -> bool {
        if self.state().await == ConnectionState::Connected {
            return true;
        }

        tracing::debug!("Presence service disconnected, attempting reconnection...");
        self.initialize().await;
        self.state().await == ConnectionState::Connected
    }

    /// Mark connection as disconnected (called when operations fail)
    pub async fn mark_disconnected(&self) {
        let mut state = self.state.write().await;
        if *state == ConnectionState::Connected {
            tracing::warn!("Presence connection lost");
            *state = ConnectionState::Disconnected;
        }
    }

    pub async fn update(
        &self,
        state: &str,
        details: &str,
        large_image: &str,
        large_text: &str,
        small_image: &str,
        small_text: &str,
    ) {
        let activity = Activity::new(state, details, large_image, large_text, small_image, small_text);
        self.publish(&activity).await;
    }

    /// Publish an activity; failures are logged and swallowed
    pub async fn publish(&self, activity: &Activity) {
        if !self.ensure_connected().await {
            tracing::warn!("Presence update for '{}' dropped: not connected", activity.details);
            return;
        }

        let result = self.client.lock().await.set_activity(activity).await;
        match result {
            Ok(()) => tracing::info!(
                "Presence updated: {} / {} ({})",
                activity.details,
                activity.state,
                activity.large_image
            ),
            Err(e) => {
                tracing::error!("Failed to update presence: {}", e);
                self.mark_disconnected().await;
            }
        }
    }

    /// Best-effort close
    pub async fn shutdown(&self) {
        if self.state().await == ConnectionState::Connected {
            if let Err(e) = self.client.lock().await.close().await {
                tracing::debug!("Error closing presence connection: {}", e);
            }
        }
        *self.state.write().await = ConnectionState::Disconnected;
    }
}
