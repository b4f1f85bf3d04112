//! Persistent chat store: `chat_id -> Chat`, backed by an embedded
//! single-writer/multi-reader database with an in-memory read cache in
//! front of it.

pub mod persistence;

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use redb::{Database, ReadableTable, TableDefinition};
use tracing::warn;

use crate::chat::{Chat, ChatStatus};
use crate::crypto::AlgorithmTriple;
use crate::error::{CoreError, Result};
use crate::keyring::ChatKeyRing;
use crate::utils::time::now_millis;

const CHATS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("chats");

#[derive(serde::Serialize, serde::Deserialize)]
struct StoredChatRow {
    name: String,
    peer_id: String,
    keys_blob: Vec<u8>,
    fingerprint: Option<String>,
    status: String,
    created_at: i64,
    updated_at: i64,
    establishment_completed_at: i64,
    last_activity: i64,
}

fn status_to_str(status: ChatStatus) -> &'static str {
    match status {
        ChatStatus::Initializing => "INITIALIZING",
        ChatStatus::Established => "ESTABLISHED",
        ChatStatus::Failed => "FAILED",
    }
}

fn status_from_str(s: &str) -> ChatStatus {
    match s {
        "ESTABLISHED" => ChatStatus::Established,
        "FAILED" => ChatStatus::Failed,
        _ => ChatStatus::Initializing,
    }
}

fn chat_to_row(chat: &Chat) -> Result<StoredChatRow> {
    Ok(StoredChatRow {
        name: chat.name.clone(),
        peer_id: chat.peer_id.clone(),
        keys_blob: persistence::encode_keys_blob(&chat.keys)?,
        fingerprint: chat.fingerprint.clone(),
        status: status_to_str(chat.status).to_string(),
        created_at: chat.created_at,
        updated_at: chat.updated_at,
        establishment_completed_at: chat.establishment_completed_at,
        last_activity: chat.last_activity,
    })
}

/// Reconstruct a `Chat` from its persisted row. On `keys_blob` parse failure
/// the chat identity is still returned with a null key ring and a logged
/// warning, per the store's read contract.
fn row_to_chat(chat_id: &str, row: StoredChatRow) -> Chat {
    let (keys, algorithms) = match persistence::decode_keys_blob(&row.keys_blob) {
        Ok(ring) => {
            let algorithms = ring.algorithms.expect("decoded ring always carries algorithms");
            (ring, algorithms)
        }
        Err(err) => {
            warn!(target: "store", chat_id, error = %err, "keys_blob failed to parse; returning chat with null key ring");
            // Fall back to a placeholder triple; the chat is unusable for
            // further handshake steps but its identity/status survive.
            let placeholder = AlgorithmTriple::new(
                crate::crypto::KemAlgorithm::Kyber768,
                crate::crypto::SymmetricAlgorithm::Aes256Gcm,
                crate::crypto::SignatureAlgorithm::Dilithium3,
            );
            (ChatKeyRing::new(placeholder), placeholder)
        }
    };

    Chat {
        id: chat_id.to_string(),
        name: row.name,
        keys,
        peer_id: row.peer_id,
        algorithms,
        fingerprint: row.fingerprint,
        status: status_from_str(&row.status),
        created_at: row.created_at,
        updated_at: row.updated_at,
        establishment_completed_at: row.establishment_completed_at,
        last_activity: row.last_activity,
    }
}

/// Persistent mapping from `chat_id` to `Chat`.
///
/// A single `RwLock` guards the in-memory cache: readers (`get`,
/// `list_by_status`) proceed in parallel; writers (`save`, `delete`,
/// `reap_stale`) exclude everyone and persist to disk before releasing the
/// lock. `save` is the sole atomicity boundary for establishment: callers
/// mutate a `Chat` in full (fingerprint, status, timestamps) and hand the
/// whole record to `save` rather than patching individual fields in place.
pub struct ChatStore {
    db: Database,
    cache: RwLock<HashMap<String, Chat>>,
}

impl ChatStore {
    /// Open (creating if absent) the database file at `path` and warm the
    /// in-memory cache from it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path).map_err(|e| CoreError::StoreFailure(e.to_string()))?;
        let mut cache = HashMap::new();

        let read_txn = db.begin_read()?;
        if let Ok(table) = read_txn.open_table(CHATS_TABLE) {
            for entry in table.iter()? {
                let (key, value) = entry?;
                let row: StoredChatRow = serde_json::from_slice(value.value())
                    .map_err(|e| CoreError::StoreFailure(e.to_string()))?;
                cache.insert(key.value().to_string(), row_to_chat(key.value(), row));
            }
        }

        Ok(Self { db, cache: RwLock::new(cache) })
    }

    /// Open an in-memory-only database, for tests.
    #[cfg(any(test, feature = "test"))]
    pub fn open_in_memory() -> Result<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(|e| CoreError::StoreFailure(e.to_string()))?;
        Ok(Self { db, cache: RwLock::new(HashMap::new()) })
    }

    fn persist_row(&self, chat: &Chat) -> Result<()> {
        let row = chat_to_row(chat)?;
        let bytes = serde_json::to_vec(&row).map_err(|e| CoreError::StoreFailure(e.to_string()))?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CHATS_TABLE)?;
            table.insert(chat.id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_row(&self, chat_id: &str) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CHATS_TABLE)?;
            table.remove(chat_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// O(1) lookup by primary key. A missing chat is not an error.
    pub fn get(&self, chat_id: &str) -> Option<Chat> {
        self.cache.read().expect("chat store lock poisoned").get(chat_id).cloned()
    }

    /// Upsert a chat record. Persists before the write lock is released.
    pub fn save(&self, chat: Chat) -> Result<()> {
        self.persist_row(&chat)?;
        let mut cache = self.cache.write().expect("chat store lock poisoned");
        cache.insert(chat.id.clone(), chat);
        Ok(())
    }

    /// Chats with the given status, most recently active first.
    pub fn list_by_status(&self, status: ChatStatus) -> Vec<Chat> {
        let cache = self.cache.read().expect("chat store lock poisoned");
        let mut chats: Vec<Chat> = cache.values().filter(|c| c.status == status).cloned().collect();
        chats.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        chats
    }

    pub fn delete(&self, chat_id: &str) -> Result<()> {
        self.delete_row(chat_id)?;
        let mut cache = self.cache.write().expect("chat store lock poisoned");
        cache.remove(chat_id);
        Ok(())
    }

    /// Transition every INITIALIZING chat older than `max_age` seconds to
    /// FAILED, clearing its key material. Returns the number reaped.
    ///
    /// `created_at` is stored in milliseconds (see `Chat`); `max_age` is
    /// expressed in seconds to match the rest of this crate's TTL
    /// configuration, so it is converted before comparison.
    pub fn reap_stale(&self, max_age: i64) -> Result<usize> {
        let cutoff = now_millis() - max_age * 1000;
        let mut cache = self.cache.write().expect("chat store lock poisoned");
        let stale_ids: Vec<String> = cache
            .values()
            .filter(|c| c.status == ChatStatus::Initializing && c.created_at < cutoff)
            .map(|c| c.id.clone())
            .collect();

        for id in &stale_ids {
            if let Some(chat) = cache.get_mut(id) {
                chat.mark_failed();
                let row = chat_to_row(chat)?;
                let bytes = serde_json::to_vec(&row).map_err(|e| CoreError::StoreFailure(e.to_string()))?;
                let write_txn = self.db.begin_write()?;
                {
                    let mut table = write_txn.open_table(CHATS_TABLE)?;
                    table.insert(chat.id.as_str(), bytes.as_slice())?;
                }
                write_txn.commit()?;
            }
        }

        Ok(stale_ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KemAlgorithm, SignatureAlgorithm, SymmetricAlgorithm};

    fn triple() -> AlgorithmTriple {
        AlgorithmTriple::new(
            KemAlgorithm::Kyber768,
            SymmetricAlgorithm::Aes256Gcm,
            SignatureAlgorithm::Dilithium3,
        )
    }

    #[test]
    fn save_then_get_round_trips() {
        let store = ChatStore::open_in_memory().unwrap();
        let chat = Chat::new_initiating("c1".into(), "Bob".into(), "peer-1".into(), triple()).unwrap();
        store.save(chat).unwrap();
        let fetched = store.get("c1").unwrap();
        assert_eq!(fetched.id, "c1");
        assert_eq!(fetched.status, ChatStatus::Initializing);
    }

    #[test]
    fn get_missing_chat_returns_none() {
        let store = ChatStore::open_in_memory().unwrap();
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn list_by_status_orders_by_last_activity_desc() {
        let store = ChatStore::open_in_memory().unwrap();
        let mut older = Chat::new_initiating("c1".into(), "A".into(), "p1".into(), triple()).unwrap();
        older.last_activity = 100;
        let mut newer = Chat::new_initiating("c2".into(), "B".into(), "p2".into(), triple()).unwrap();
        newer.last_activity = 200;
        store.save(older).unwrap();
        store.save(newer).unwrap();

        let chats = store.list_by_status(ChatStatus::Initializing);
        assert_eq!(chats[0].id, "c2");
        assert_eq!(chats[1].id, "c1");
    }

    #[test]
    fn reap_stale_transitions_old_initializing_chats() {
        let store = ChatStore::open_in_memory().unwrap();
        let mut chat = Chat::new_initiating("c1".into(), "A".into(), "p1".into(), triple()).unwrap();
        chat.created_at = now_millis() - 10_000_000;
        store.save(chat).unwrap();

        let reaped = store.reap_stale(100).unwrap();
        assert_eq!(reaped, 1);
        let chat = store.get("c1").unwrap();
        assert_eq!(chat.status, ChatStatus::Failed);
        assert!(chat.keys.symmetric.is_none());
    }
}
