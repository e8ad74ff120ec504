//! Cluster-wide key/value metadata relayed between compute graph nodes.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::RwLock;

/// Last-writer-wins map, locked independently of the node registry.
#[derive(Default)]
pub struct MetadataStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `name`. Empty names are rejected with an error log.
    pub async fn write(&self, name: &str, value: Bytes) {
        if name.is_empty() {
            tracing::error!("Empty metadata name.");
            return;
        }
        let mut entries = self.entries.write().await;
        entries.insert(name.to_string(), value);
    }

    pub async fn read(&self, name: &str) -> Option<Bytes> {
        let entries = self.entries.read().await;
        entries.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read() {
        let store = MetadataStore::new();
        store.write("nccl_id", Bytes::from_static(b"abc")).await;
        assert_eq!(store.read("nccl_id").await, Some(Bytes::from_static(b"abc")));
        assert_eq!(store.read("missing").await, None);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let store = MetadataStore::new();
        store.write("k", Bytes::from_static(b"1")).await;
        store.write("k", Bytes::from_static(b"2")).await;
        assert_eq!(store.read("k").await, Some(Bytes::from_static(b"2")));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_empty_name_ignored() {
        let store = MetadataStore::new();
        store.write("", Bytes::from_static(b"v")).await;
        assert!(store.is_empty().await);
        assert_eq!(store.read("").await, None);
    }
}
