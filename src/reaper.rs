//! Periodic sweep that marks stuck handshakes FAILED and expires unclaimed
//! pending secrets.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use crate::config::Config;
use crate::pending::PendingSecretTable;
use crate::store::ChatStore;

/// Runs `ChatStore::reap_stale` and `PendingSecretTable::expire` on a fixed
/// interval until told to stop.
pub struct StaleReaper {
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl StaleReaper {
    /// Spawn the periodic task. `store`/`pending` are shared with the
    /// `HandshakeEngine` that owns the same chats.
    pub fn spawn(store: Arc<ChatStore>, pending: Arc<PendingSecretTable>) -> Self {
        let config = Config::global();
        let interval = config.reaper_interval_secs;
        let max_age = config.stale_handshake_max_age_secs;
        let pending_ttl = config.pending_secret_ttl_secs;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match store.reap_stale(max_age) {
                            Ok(count) if count > 0 => info!(target: "reaper", count, "reaped stale handshakes"),
                            Ok(_) => {}
                            Err(err) => error!(target: "reaper", %err, "failed to reap stale chats"),
                        }
                        let expired = pending.expire(pending_ttl);
                        if expired > 0 {
                            info!(target: "reaper", expired, "expired pending secrets");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Self { shutdown_tx, handle }
    }

    /// Signal the task to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{AlgorithmTriple, KemAlgorithm, SignatureAlgorithm, SymmetricAlgorithm};
    use crate::chat::{Chat, ChatStatus};

    #[tokio::test]
    async fn reaper_marks_old_chats_failed() {
        Config::init_with(Config {
            reaper_interval_secs: 1,
            ..Config::default()
        })
        .ok();

        let store = Arc::new(ChatStore::open_in_memory().unwrap());
        let pending = Arc::new(PendingSecretTable::new());

        let triple = AlgorithmTriple::new(
            KemAlgorithm::Kyber768,
            SymmetricAlgorithm::Aes256Gcm,
            SignatureAlgorithm::Dilithium3,
        );
        let mut chat = Chat::new_initiating("c1".into(), "A".into(), "p1".into(), triple).unwrap();
        chat.created_at = crate::utils::time::now_millis() - 100_000_000;
        store.save(chat).unwrap();

        let reaper = StaleReaper::spawn(store.clone(), pending);
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        reaper.shutdown().await;

        assert_eq!(store.get("c1").unwrap().status, ChatStatus::Failed);
    }
}
