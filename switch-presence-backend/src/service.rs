use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use switch_presence_common::QueryMode;

use crate::error::Result;
use crate::module::catalog::{BuildReport, Catalog, CatalogBuilder, rebuild_and_reload};
use crate::module::dispatch::{CompletionInbox, QueryCompletion, QueryDispatcher};
use crate::module::handler::{
    ConsoleCommand, HELP_TEXT, MAX_SUGGESTIONS, Selection, format_entries, format_game, format_not_found,
    presence_activity,
};
use crate::module::presence::{ConnectionState, PresenceClient, PresenceUpdater};

/// Outcome of a background `/build`: the build report and the reloaded count
pub type BuildOutcome = Result<(BuildReport, usize)>;

/// Interactive console: one line in, one reply out
pub struct ConsoleService<C: PresenceClient> {
    catalog: Arc<Catalog>,
    builder: CatalogBuilder,
    dispatcher: QueryDispatcher,
    presence: Option<PresenceUpdater<C>>,
    search_limit: usize,
    selection: Selection,
    build_tx: mpsc::Sender<BuildOutcome>,
    build_rx: mpsc::Receiver<BuildOutcome>,
    building: bool,
}

impl<C: PresenceClient> ConsoleService<C> {
    pub fn new(
        catalog: Arc<Catalog>,
        builder: CatalogBuilder,
        dispatcher: QueryDispatcher,
        presence: Option<PresenceUpdater<C>>,
        search_limit: usize,
    ) -> Self {
        let (build_tx, build_rx) = mpsc::channel(1);
        Self {
            catalog,
            builder,
            dispatcher,
            presence,
            search_limit,
            selection: Selection::default(),
            build_tx,
            build_rx,
            building: false,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Execute one command; `Quit` and `Empty` are handled by the caller
    pub async fn execute(&mut self, command: ConsoleCommand) -> String {
        match command {
            ConsoleCommand::Query(query) => {
                let seq = self.dispatcher.submit(query.clone());
                debug!("Query #{} submitted: {} ({})", seq, query.text, query.mode);
                format!("Searching for '{}'...", query.text)
            }
            ConsoleCommand::Search(text) => {
                let results = self.catalog.search_titles(&text, self.search_limit).await;
                if results.is_empty() {
                    format!("No catalog titles contain '{}'", text)
                } else {
                    format!("{} match(es):\n{}", results.len(), format_entries(&results))
                }
            }
            ConsoleCommand::SetPresence(description) => self.set_presence(description.as_deref()).await,
            ConsoleCommand::Build => self.start_build(),
            ConsoleCommand::Reload => match self.catalog.load().await {
                Ok(count) => format!("Loaded {} games", count),
                Err(e) => format!("Reload failed, keeping {} games: {}", self.catalog.len().await, e),
            },
            ConsoleCommand::Status => self.status().await,
            ConsoleCommand::Help => HELP_TEXT.to_string(),
            ConsoleCommand::Invalid(message) => message,
            ConsoleCommand::Quit | ConsoleCommand::Empty => String::new(),
        }
    }

    /// Apply a finished query to the selection
    pub async fn complete(&mut self, completion: QueryCompletion) -> String {
        let QueryCompletion { seq, query, result } = completion;
        debug!("Query #{} finished (found: {})", seq, result.is_some());

        let message = match &result {
            Some(game) => format_game(game),
            None if query.mode == QueryMode::Name => {
                let suggestions = self.catalog.search_titles(&query.text, MAX_SUGGESTIONS).await;
                format_not_found(&query, &suggestions)
            }
            None => format_not_found(&query, &[]),
        };

        self.selection.apply(query, result);
        message
    }

    /// Rebuild and reload in the background; the outcome arrives on `build_rx`
    fn start_build(&mut self) -> String {
        if self.building {
            return "A catalog build is already running".to_string();
        }
        self.building = true;

        let builder = self.builder.clone();
        let catalog = self.catalog.clone();
        let tx = self.build_tx.clone();
        tokio::spawn(async move {
            let outcome = rebuild_and_reload(&builder, &catalog).await;
            if tx.send(outcome).await.is_err() {
                warn!("Console closed before the catalog build finished");
            }
        });

        "Building catalog...".to_string()
    }

    /// Report a finished background build
    pub fn build_finished(&mut self, outcome: BuildOutcome) -> String {
        self.building = false;
        match outcome {
            Ok((report, count)) => format!("DB Updated ({} games)\n{}", count, report),
            Err(e) => format!("Catalog build failed: {}", e),
        }
    }

    async fn set_presence(&self, description: Option<&str>) -> String {
        let Some(presence) = &self.presence else {
            return "Presence is disabled in the configuration".to_string();
        };
        let Some(activity) = presence_activity(&self.selection, description) else {
            return "Game name required: look one up first".to_string();
        };

        presence.publish(&activity).await;
        match presence.state().await {
            ConnectionState::Connected => format!("Presence Set '{}' ({})", activity.details, activity.state),
            _ => "Presence service unavailable; will retry on the next /set".to_string(),
        }
    }

    async fn status(&self) -> String {
        let presence = match &self.presence {
            Some(updater) => format!("{:?}", updater.state().await),
            None => "disabled".to_string(),
        };
        format!(
            "Catalog: {} games ({:?})\nSelected: {}\nPresence: {}\nLast query: #{}",
            self.catalog.len().await,
            self.catalog.path(),
            self.selection.display_name().unwrap_or("(none)"),
            presence,
            self.dispatcher.latest(),
        )
    }

    pub async fn shutdown(&self) {
        if let Some(presence) = &self.presence {
            presence.shutdown().await;
        }
    }

    /// Read commands from stdin until `/quit` or EOF
    pub async fn run(mut self, mut inbox: CompletionInbox) -> anyhow::Result<()> {
        if let Some(presence) = &self.presence {
            presence.initialize().await;
        }

        println!("{}", HELP_TEXT);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read console input")? else {
                        info!("Console input closed");
                        break;
                    };
                    match ConsoleCommand::parse(&line) {
                        ConsoleCommand::Quit => break,
                        ConsoleCommand::Empty => continue,
                        command => println!("{}", self.execute(command).await),
                    }
                }
                Some(completion) = inbox.recv_latest() => {
                    println!("{}", self.complete(completion).await);
                }
                Some(outcome) = self.build_rx.recv() => {
                    println!("{}", self.build_finished(outcome));
                }
            }
        }

        self.shutdown().await;
        info!("Console stopped");
        Ok(())
    }
}

/// Publish a single activity for the non-interactive `set` command
pub async fn publish_once<C: PresenceClient>(
    presence: &PresenceUpdater<C>,
    selection: &Selection,
    description: Option<&str>,
) -> bool {
    let Some(activity) = presence_activity(selection, description) else {
        warn!("Nothing to publish");
        return false;
    };
    presence.publish(&activity).await;
    presence.state().await == ConnectionState::Connected
}
