//! Short-lived, process-local table of responder secrets awaiting the
//! matching INIT_CONFIRM.
//!
//! Not persisted: a crash mid-handshake is recoverable only by restarting
//! the handshake; `StaleReaper` ensures stuck chats still end up FAILED.

use std::collections::HashMap;
use std::sync::RwLock;

use zeroize::{Zeroize, Zeroizing};

use crate::utils::time::now_unix;

struct Entry {
    secret: Vec<u8>,
    created_at: i64,
}

/// `chat_uuid -> (secret, created_at)`, one entry per chat.
#[derive(Default)]
pub struct PendingSecretTable {
    entries: RwLock<HashMap<String, Entry>>,
}

impl PendingSecretTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, chat_uuid: &str, secret: Vec<u8>) {
        let mut entries = self.entries.write().expect("pending secret lock poisoned");
        entries.insert(
            chat_uuid.to_string(),
            Entry { secret, created_at: now_unix() },
        );
    }

    /// Remove and return the secret for `chat_uuid`, if present. The
    /// returned buffer zeroizes itself on drop, so a caller that lets it
    /// fall out of scope without consuming it still wipes the secret.
    pub fn remove(&self, chat_uuid: &str) -> Option<Zeroizing<Vec<u8>>> {
        let mut entries = self.entries.write().expect("pending secret lock poisoned");
        entries.remove(chat_uuid).map(|e| Zeroizing::new(e.secret))
    }

    pub fn contains(&self, chat_uuid: &str) -> bool {
        let entries = self.entries.read().expect("pending secret lock poisoned");
        entries.contains_key(chat_uuid)
    }

    /// Remove and zeroize every entry older than `older_than` seconds.
    /// Returns the number of entries expired.
    pub fn expire(&self, older_than: i64) -> usize {
        let cutoff = now_unix() - older_than;
        let mut entries = self.entries.write().expect("pending secret lock poisoned");
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.created_at < cutoff)
            .map(|(k, _)| k.clone())
            .collect();
        let count = stale.len();
        for key in stale {
            if let Some(mut entry) = entries.remove(&key) {
                entry.secret.zeroize();
            }
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("pending secret lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_remove_round_trips() {
        let table = PendingSecretTable::new();
        table.put("c1", vec![1, 2, 3]);
        assert!(table.contains("c1"));
        let secret = table.remove("c1").unwrap();
        assert_eq!(secret.as_slice(), &[1, 2, 3]);
        assert!(!table.contains("c1"));
    }

    #[test]
    fn second_remove_returns_none() {
        let table = PendingSecretTable::new();
        table.put("c1", vec![1, 2, 3]);
        assert!(table.remove("c1").is_some());
        assert!(table.remove("c1").is_none());
    }

    #[test]
    fn expire_drops_only_old_entries() {
        let table = PendingSecretTable::new();
        table.put("c1", vec![1]);
        assert_eq!(table.expire(-10), 1);
        assert!(!table.contains("c1"));
    }

    /// `expire` zeroizes the entry it drops via `entry.secret.zeroize()`;
    /// witness that call overwriting every byte to `0x00` rather than just
    /// dropping the buffer unchanged, which `Option::is_none()` alone can't
    /// distinguish.
    #[test]
    fn zeroize_overwrites_secret_bytes() {
        let mut entry = Entry { secret: vec![0xAB; 32], created_at: 0 };
        entry.secret.zeroize();
        assert!(entry.secret.iter().all(|&b| b == 0));
    }
}
