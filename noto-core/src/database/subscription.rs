//! Live query subscriptions
//!
//! Every subscription owns a `watch` channel seeded with the query's initial
//! result. After each committed write the store re-runs the queries that
//! depend on the touched tables and publishes the result when it differs.
//! Dropping a `Subscription` cancels it; the query is pruned on the next
//! refresh that reaches it.

use super::store::TableSet;
use crate::error::{AppError, Result};
use futures::future::BoxFuture;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub(crate) type FetchFn<T> = Arc<dyn Fn(SqlitePool) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Type-erased query kept by the store between writes
pub(crate) trait LiveQuery: Send + Sync {
    fn tables(&self) -> TableSet;

    fn is_closed(&self) -> bool;

    fn refresh<'a>(&'a self, pool: &'a SqlitePool) -> BoxFuture<'a, Result<()>>;
}

pub(crate) struct WatchedQuery<T> {
    tables: TableSet,
    fetch: FetchFn<T>,
    sender: watch::Sender<T>,
}

impl<T> WatchedQuery<T> {
    pub(crate) fn new(tables: TableSet, fetch: FetchFn<T>, sender: watch::Sender<T>) -> Self {
        Self {
            tables,
            fetch,
            sender,
        }
    }
}

impl<T> LiveQuery for WatchedQuery<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    fn tables(&self) -> TableSet {
        self.tables
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn refresh<'a>(&'a self, pool: &'a SqlitePool) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let latest = (self.fetch)(pool.clone()).await?;

            self.sender.send_if_modified(|current| {
                if *current == latest {
                    false
                } else {
                    *current = latest;
                    true
                }
            });

            Ok(())
        })
    }
}

/// Registry of open subscriptions
#[derive(Default)]
pub(crate) struct LiveQueries {
    queries: Mutex<Vec<Arc<dyn LiveQuery>>>,
}

impl LiveQueries {
    pub(crate) fn register(&self, query: Arc<dyn LiveQuery>) {
        let mut queries = self.queries.lock().unwrap_or_else(|e| e.into_inner());
        queries.push(query);
    }

    /// Drop cancelled queries and return the ones depending on `touched`
    fn affected_by(&self, touched: TableSet) -> Vec<Arc<dyn LiveQuery>> {
        let mut queries = self.queries.lock().unwrap_or_else(|e| e.into_inner());
        queries.retain(|query| !query.is_closed());
        queries
            .iter()
            .filter(|query| query.tables().intersects(touched))
            .cloned()
            .collect()
    }

    /// Re-run every open query that reads one of the touched tables.
    ///
    /// Runs after the commit, so a failing query cannot undo the write;
    /// its subscribers keep their previous result.
    pub(crate) async fn refresh(&self, pool: &SqlitePool, touched: TableSet) {
        if touched.is_empty() {
            return;
        }

        for query in self.affected_by(touched) {
            if let Err(e) = query.refresh(pool).await {
                tracing::warn!("Failed to refresh live query: {}", e);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Handle on a live query result.
///
/// `current` is always the newest result the store has published;
/// a subscriber never observes an older result after a newer one.
pub struct Subscription<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    pub(crate) fn new(rx: watch::Receiver<T>) -> Self {
        Self { rx }
    }

    /// Latest published result
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Whether a result newer than the last one returned by `next` is available
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Wait for the next result that differs from the last one observed
    pub async fn next(&mut self) -> Result<T> {
        self.rx
            .changed()
            .await
            .map_err(|_| AppError::SubscriptionClosed)?;

        Ok(self.rx.borrow_and_update().clone())
    }
}
