//! Background query resolution with latest-wins delivery
//!
//! Each submitted query gets the next sequence number and resolves on its own
//! task. Completions land in a single inbox, which hands out only the one
//! matching the most recently issued sequence.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use switch_presence_common::{GameMetadata, ResolutionQuery};
use tokio::sync::mpsc;

use super::resolver::QueryResolver;

const INBOX_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryCompletion {
    pub seq: u64,
    pub query: ResolutionQuery,
    pub result: Option<GameMetadata>,
}

#[derive(Clone)]
pub struct QueryDispatcher {
    resolver: Arc<dyn QueryResolver>,
    latest: Arc<AtomicU64>,
    tx: mpsc::Sender<QueryCompletion>,
}

pub struct CompletionInbox {
    latest: Arc<AtomicU64>,
    rx: mpsc::Receiver<QueryCompletion>,
}

impl QueryDispatcher {
    pub fn channel(resolver: Arc<dyn QueryResolver>) -> (QueryDispatcher, CompletionInbox) {
        let latest = Arc::new(AtomicU64::new(0));
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);

        let dispatcher = QueryDispatcher {
            resolver,
            latest: latest.clone(),
            tx,
        };
        (dispatcher, CompletionInbox { latest, rx })
    }

    /// Start resolving `query`, returning its sequence number
    pub fn submit(&self, query: ResolutionQuery) -> u64 {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let resolver = self.resolver.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let result = resolver.resolve(&query).await;
            if tx.send(QueryCompletion { seq, query, result }).await.is_err() {
                tracing::debug!("Completion inbox closed, dropping result for query #{}", seq);
            }
        });

        tracing::debug!("Submitted query #{}", seq);
        seq
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

impl CompletionInbox {
    /// Next completion for the latest query; older ones are dropped
    pub async fn recv_latest(&mut self) -> Option<QueryCompletion> {
        while let Some(completion) = self.rx.recv().await {
            let latest = self.latest.load(Ordering::SeqCst);
            if completion.seq == latest {
                return Some(completion);
            }
            tracing::debug!(
                "Discarding stale result for '{}' (#{}, latest #{})",
                completion.query.text,
                completion.seq,
                latest
            );
        }
        None
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Resolves "slow*" queries after a delay, everything else at once
    struct DelayResolver;

    #[async_trait]
    impl QueryResolver for DelayResolver {
        async fn resolve(&self, query: &ResolutionQuery) -> Option<GameMetadata> {
            if query.text.starts_with("slow") {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Some(GameMetadata {
                name: query.text.clone(),
                image_url: "switch".to_string(),
                page_url: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_stale_completion_discarded() {
        let (dispatcher, mut inbox) = QueryDispatcher::channel(Arc::new(DelayResolver));

        let first = dispatcher.submit(ResolutionQuery::by_name("slow query"));
        let second = dispatcher.submit(ResolutionQuery::by_name("fast query"));
        assert_eq!((first, second), (1, 2));
        assert_eq!(inbox.latest(), 2);

        let completion = inbox.recv_latest().await.unwrap();
        assert_eq!(completion.seq, 2);
        assert_eq!(completion.result.unwrap().name, "fast query");

        drop(dispatcher);
        assert!(inbox.recv_latest().await.is_none());
    }

    #[tokio::test]
    async fn test_latest_result_delivered_even_when_slowest() {
        let (dispatcher, mut inbox) = QueryDispatcher::channel(Arc::new(DelayResolver));

        dispatcher.submit(ResolutionQuery::by_name("fast query"));
        let seq = dispatcher.submit(ResolutionQuery::by_id("slow AAACA"));

        let completion = inbox.recv_latest().await.unwrap();
        assert_eq!(completion.seq, seq);
        assert_eq!(completion.query, ResolutionQuery::by_id("slow AAACA"));
    }

    #[tokio::test]
    async fn test_single_query_round_trip() {
        let (dispatcher, mut inbox) = QueryDispatcher::channel(Arc::new(DelayResolver));
        let seq = dispatcher.submit(ResolutionQuery::by_name("zelda"));

        let completion = inbox.recv_latest().await.unwrap();
        assert_eq!(completion.seq, seq);
        assert_eq!(dispatcher.latest(), seq);
    }
}
