// Lease store seam: the only coordination medium between replicas

use crate::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Key-value store with per-key TTL expiry, holding the lease record.
///
/// Any backend with these three operations can drive an
/// [`Elector`](crate::Elector): a Redis/DynamoDB table, or the bundled
/// [`InMemoryLeaseStore`] for tests and single-process use.
///
/// Contract:
/// - an expired record reads as absent; the store must not reclaim it
///   before its TTL elapses and should eventually reclaim it after;
/// - each individual operation is atomic per key;
/// - `write_holder` is an unconditional upsert, NOT a compare-and-swap.
///   The elector compensates with a verification read after acquisition,
///   which narrows but cannot close the acquire race between two replicas
///   that both observed an empty key.
#[async_trait]
pub trait LeaseStore: Send + Sync + std::fmt::Debug {
    /// Read the current holder id, or `None` if the record is absent or
    /// expired.
    async fn read_holder(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    /// Upsert the holder id and reset the record's TTL.
    async fn write_holder(
        &self,
        namespace: &str,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<()>;

    /// Delete the record immediately. Idempotent: deleting an absent record
    /// is not an error.
    async fn delete_holder(&self, namespace: &str, key: &str) -> Result<()>;
}

/// In-memory [`LeaseStore`] backend.
///
/// Expiry uses `tokio::time::Instant`, so paused-time tests can advance the
/// clock and watch leases lapse deterministically.
#[derive(Debug, Default)]
pub struct InMemoryLeaseStore {
    records: DashMap<(String, String), LeaseRecord>,
}

#[derive(Debug, Clone)]
struct LeaseRecord {
    holder: String,
    expires_at: Instant,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn read_holder(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let id = (namespace.to_string(), key.to_string());
        if let Some(record) = self.records.get(&id) {
            if record.expires_at > Instant::now() {
                return Ok(Some(record.holder.clone()));
            }
        } else {
            return Ok(None);
        }
        // Expired: reclaim lazily so the next reader skips the lookup
        self.records.remove(&id);
        Ok(None)
    }

    async fn write_holder(
        &self,
        namespace: &str,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<()> {
        self.records.insert(
            (namespace.to_string(), key.to_string()),
            LeaseRecord {
                holder: holder.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete_holder(&self, namespace: &str, key: &str) -> Result<()> {
        self.records
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test]
    async fn test_read_after_write() {
        let store = InMemoryLeaseStore::new();
        store
            .write_holder("ns", "lock", "node1", Duration::from_secs(30))
            .await
            .unwrap();

        let holder = store.read_holder("ns", "lock").await.unwrap();
        assert_eq!(holder.as_deref(), Some("node1"));
    }

    #[tokio::test]
    async fn test_absent_key_reads_none() {
        let store = InMemoryLeaseStore::new();
        assert_eq!(store.read_holder("ns", "lock").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_record_reads_as_absent() {
        let store = InMemoryLeaseStore::new();
        store
            .write_holder("ns", "lock", "node1", Duration::from_secs(30))
            .await
            .unwrap();

        advance(Duration::from_secs(29)).await;
        assert!(store.read_holder("ns", "lock").await.unwrap().is_some());

        advance(Duration::from_secs(2)).await;
        assert_eq!(store.read_holder("ns", "lock").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_refreshes_ttl() {
        let store = InMemoryLeaseStore::new();
        store
            .write_holder("ns", "lock", "node1", Duration::from_secs(30))
            .await
            .unwrap();

        advance(Duration::from_secs(20)).await;
        store
            .write_holder("ns", "lock", "node1", Duration::from_secs(30))
            .await
            .unwrap();

        // 40s after the first write, but only 20s after the refresh
        advance(Duration::from_secs(20)).await;
        let holder = store.read_holder("ns", "lock").await.unwrap();
        assert_eq!(holder.as_deref(), Some("node1"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryLeaseStore::new();
        store
            .write_holder("ns", "lock", "node1", Duration::from_secs(30))
            .await
            .unwrap();

        store.delete_holder("ns", "lock").await.unwrap();
        assert_eq!(store.read_holder("ns", "lock").await.unwrap(), None);

        // Second delete of an absent record must not error
        store.delete_holder("ns", "lock").await.unwrap();
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = InMemoryLeaseStore::new();
        store
            .write_holder("ns-a", "lock", "node1", Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(store.read_holder("ns-b", "lock").await.unwrap(), None);
        assert!(store.read_holder("ns-a", "lock").await.unwrap().is_some());
    }
}
