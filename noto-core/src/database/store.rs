//! Entity store
//!
//! Wraps the SQLite pool with the two guarantees repositories rely on:
//! - Writes are serialized through one gate and commit atomically.
//! - Open subscriptions are refreshed before a write call returns.
//!
//! The gate is held only for the duration of one write transaction plus
//! the refresh that follows it. Reads never take the gate.

use super::subscription::{FetchFn, LiveQueries, Subscription, WatchedQuery};
use crate::error::{AppError, Result};
use futures::FutureExt;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

/// Entity families stored in their own table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Folders,
    Notes,
    Labels,
    NoteLabels,
    Settings,
}

impl Table {
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Small set of tables a query reads or a write touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableSet(u8);

impl TableSet {
    pub fn of(tables: &[Table]) -> Self {
        let mut set = TableSet::default();
        for table in tables {
            set.insert(*table);
        }
        set
    }

    pub fn all() -> Self {
        TableSet::of(&[
            Table::Folders,
            Table::Notes,
            Table::Labels,
            Table::NoteLabels,
            Table::Settings,
        ])
    }

    pub fn insert(&mut self, table: Table) {
        self.0 |= table.bit();
    }

    pub fn contains(&self, table: Table) -> bool {
        self.0 & table.bit() != 0
    }

    pub fn intersects(&self, other: TableSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Transactional store shared by every repository
#[derive(Clone)]
pub struct EntityStore {
    pool: SqlitePool,
    write_gate: Arc<Mutex<()>>,
    live: Arc<LiveQueries>,
}

impl EntityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_gate: Arc::new(Mutex::new(())),
            live: Arc::new(LiveQueries::default()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Connection for one-off reads outside any write transaction
    pub async fn read(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    /// Read transaction; every query inside it sees the same snapshot
    pub async fn begin_snapshot(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Open an exclusive write transaction.
    ///
    /// Dropping the returned handle without committing rolls everything back.
    pub async fn begin_write(&self) -> Result<WriteTxn> {
        let gate = self.write_gate.clone().lock_owned().await;
        let tx = self.pool.begin().await?;

        Ok(WriteTxn {
            tx,
            touched: TableSet::default(),
            gate,
            store: self.clone(),
        })
    }

    /// Run `fetch` now and again after every committed write touching `tables`.
    ///
    /// Registration happens under the write gate, so no commit can fall
    /// between the initial result and the first refresh.
    pub async fn subscribe<T, F, Fut>(&self, tables: TableSet, fetch: F) -> Result<Subscription<T>>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(SqlitePool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let fetch: FetchFn<T> = Arc::new(move |pool| fetch(pool).boxed());

        let _gate = self.write_gate.lock().await;
        let initial = fetch(self.pool.clone()).await?;
        let (sender, rx) = watch::channel(initial);
        self.live
            .register(Arc::new(WatchedQuery::new(tables, fetch, sender)));

        Ok(Subscription::new(rx))
    }

    #[cfg(test)]
    pub(crate) fn live_query_count(&self) -> usize {
        self.live.len()
    }
}

/// An open write transaction holding the store's write gate
pub struct WriteTxn {
    tx: Transaction<'static, Sqlite>,
    touched: TableSet,
    gate: OwnedMutexGuard<()>,
    store: EntityStore,
}

impl WriteTxn {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// Record that this transaction changed `table`
    pub fn touch(&mut self, table: Table) {
        self.touched.insert(table);
    }

    pub fn touched(&self) -> TableSet {
        self.touched
    }

    /// Commit and refresh the affected subscriptions.
    ///
    /// Commit and refresh run on their own task: once started they finish
    /// even if the caller stops waiting, so a write is either absent or
    /// fully committed and published.
    pub async fn commit(self) -> Result<()> {
        let WriteTxn {
            tx,
            touched,
            gate,
            store,
        } = self;

        let task = tokio::spawn(async move {
            tx.commit().await?;
            store.live.refresh(&store.pool, touched).await;
            drop(gate);
            Ok::<(), AppError>(())
        });

        join_task(task).await
    }
}

/// Await a spawned store task, re-raising its panic if it had one
pub(crate) async fn join_task<T>(task: JoinHandle<Result<T>>) -> Result<T> {
    match task.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(AppError::Storage(sqlx::Error::WorkerCrashed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_memory_pool, rows, Folder};

    async fn create_test_store() -> EntityStore {
        EntityStore::new(create_memory_pool().await.unwrap())
    }

    async fn folder_titles(store: &EntityStore) -> Subscription<Vec<String>> {
        store
            .subscribe(TableSet::of(&[Table::Folders]), |pool| async move {
                let mut conn = pool.acquire().await?;
                let folders = rows::list_folders(&mut conn).await?;
                Ok(folders.into_iter().map(|f| f.title).collect())
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_table_set() {
        let set = TableSet::of(&[Table::Notes, Table::Labels]);

        assert!(set.contains(Table::Notes));
        assert!(!set.contains(Table::Folders));
        assert!(set.intersects(TableSet::of(&[Table::Labels])));
        assert!(!set.intersects(TableSet::of(&[Table::Settings])));
        assert!(TableSet::default().is_empty());
    }

    #[tokio::test]
    async fn test_commit_publishes_before_returning() {
        let store = create_test_store().await;
        let subscription = folder_titles(&store).await;
        assert_eq!(subscription.current(), vec!["General".to_string()]);

        let mut txn = store.begin_write().await.unwrap();
        rows::insert_folder(txn.conn(), &Folder::new("Archive"))
            .await
            .unwrap();
        txn.touch(Table::Folders);
        txn.commit().await.unwrap();

        assert!(subscription.has_changed());
        assert_eq!(
            subscription.current(),
            vec!["Archive".to_string(), "General".to_string()]
        );
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = create_test_store().await;
        let subscription = folder_titles(&store).await;

        {
            let mut txn = store.begin_write().await.unwrap();
            rows::insert_folder(txn.conn(), &Folder::new("Lost"))
                .await
                .unwrap();
            txn.touch(Table::Folders);
        }

        let mut conn = store.read().await.unwrap();
        let folders = rows::list_folders(&mut conn).await.unwrap();
        assert_eq!(folders.len(), 1);
        assert!(!subscription.has_changed());
    }

    #[tokio::test]
    async fn test_unrelated_write_does_not_notify() {
        let store = create_test_store().await;
        let subscription = folder_titles(&store).await;

        let mut txn = store.begin_write().await.unwrap();
        rows::store_settings(txn.conn(), &Default::default())
            .await
            .unwrap();
        txn.touch(Table::Settings);
        txn.commit().await.unwrap();

        assert!(!subscription.has_changed());
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let store = create_test_store().await;
        let subscription = folder_titles(&store).await;
        assert_eq!(store.live_query_count(), 1);

        drop(subscription);

        let mut txn = store.begin_write().await.unwrap();
        rows::insert_folder(txn.conn(), &Folder::new("Trigger"))
            .await
            .unwrap();
        txn.touch(Table::Folders);
        txn.commit().await.unwrap();

        assert_eq!(store.live_query_count(), 0);
    }
}
