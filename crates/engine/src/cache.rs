//! In-memory snapshot of the latest extracted register.
//!
//! The snapshot is replaced wholesale, never merged. A background refresher
//! keeps it current; readers that find it empty load it themselves.
use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::{ResultEngine, Transaction, ledger::Extract};

/// How often the refresher re-extracts by default.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

pub type Snapshot = Arc<Vec<Transaction>>;

pub struct LedgerCache {
    source: Arc<dyn Extract>,
    snapshot: RwLock<Snapshot>,
    // Serializes extractions so an empty cache is loaded once.
    loading: Mutex<()>,
}

impl LedgerCache {
    pub fn new(source: Arc<dyn Extract>) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::default()),
            loading: Mutex::new(()),
        }
    }

    /// Current snapshot, possibly empty.
    pub async fn get(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn replace(&self, transactions: Vec<Transaction>) {
        *self.snapshot.write().await = Arc::new(transactions);
    }

    /// Extracts and replaces the snapshot. On failure the previous snapshot
    /// stays in place.
    pub async fn refresh(&self) -> ResultEngine<usize> {
        let _loading = self.loading.lock().await;
        let transactions = self.source.extract().await?;
        let count = transactions.len();
        self.replace(transactions).await;
        Ok(count)
    }

    /// Snapshot for a reader. An empty cache is filled inline first; readers
    /// arriving meanwhile wait for that same extraction.
    pub async fn get_or_load(&self) -> ResultEngine<Snapshot> {
        let current = self.get().await;
        if !current.is_empty() {
            return Ok(current);
        }

        let _loading = self.loading.lock().await;
        let current = self.get().await;
        if !current.is_empty() {
            return Ok(current);
        }

        tracing::info!("cache is empty, loading ledger on demand");
        let loaded = Arc::new(self.source.extract().await?);
        *self.snapshot.write().await = loaded.clone();
        Ok(loaded)
    }
}

/// Spawns the periodic refresh of `cache`.
///
/// The first refresh starts immediately. Cancelling `shutdown` ends the loop
/// once the refresh in flight, if any, has finished.
pub fn spawn_refresher(
    cache: Arc<LedgerCache>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match cache.refresh().await {
                Ok(count) => tracing::info!("refreshed ledger cache: {count} transactions"),
                Err(err) => tracing::warn!("failed automatic sync: {err}"),
            }
        }

        tracing::debug!("ledger refresher stopped");
    })
}
