//! Centralized configuration for the handshake core.
//!
//! All tunable constants live here so they are not hardcoded across the
//! handshake, store, and reaper modules.

use std::sync::OnceLock;

static GLOBAL_CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Config {
    // ============================================
    // HANDSHAKE LIFETIMES
    // ============================================
    /// How long a PendingSecret may sit unclaimed before `StaleReaper` wipes it.
    /// Default: 5 minutes.
    pub pending_secret_ttl_secs: i64,

    /// Age past which an INITIALIZING chat is considered stuck and reaped to
    /// FAILED. Default: 30 minutes.
    pub stale_handshake_max_age_secs: i64,

    /// How often `StaleReaper` runs. Default: 60 seconds.
    pub reaper_interval_secs: u64,

    // ============================================
    // KEY / DIGEST SIZES
    // ============================================
    /// Output length of the symmetric key derivation (bytes). 32 for AES-256
    /// or ChaCha20-Poly1305 keys.
    pub symmetric_key_length: usize,

    /// Length of the truncated fingerprint digest before hex encoding
    /// (bytes). 16 bytes yields the spec's 32 hex character fingerprint.
    pub fingerprint_digest_length: usize,

    /// Number of hex characters grouped together when rendering a fingerprint
    /// for human comparison (`"a1b2 c3d4 ..."`).
    pub fingerprint_group_width: usize,

    // ============================================
    // VALIDATION
    // ============================================
    /// Length of a chat_uuid string (RFC 4122 canonical form).
    pub uuid_length: usize,

    // ============================================
    // STORE
    // ============================================
    /// Current version tag written into persisted `keys_blob` records.
    pub keys_blob_version: u16,
}

impl Config {
    pub fn default() -> Self {
        Self {
            pending_secret_ttl_secs: 5 * 60,
            stale_handshake_max_age_secs: 30 * 60,
            reaper_interval_secs: 60,

            symmetric_key_length: 32,
            fingerprint_digest_length: 16,
            fingerprint_group_width: 4,

            uuid_length: 36,

            keys_blob_version: 1,
        }
    }

    /// Build a configuration from environment overrides on top of the
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("YUMSG_PENDING_SECRET_TTL_SECS") {
            if let Ok(parsed) = val.parse() {
                config.pending_secret_ttl_secs = parsed;
            }
        }

        if let Ok(val) = std::env::var("YUMSG_STALE_HANDSHAKE_MAX_AGE_SECS") {
            if let Ok(parsed) = val.parse() {
                config.stale_handshake_max_age_secs = parsed;
            }
        }

        if let Ok(val) = std::env::var("YUMSG_REAPER_INTERVAL_SECS") {
            if let Ok(parsed) = val.parse() {
                config.reaper_interval_secs = parsed;
            }
        }

        config
    }

    /// Get the global configuration, initializing it with defaults on first
    /// access.
    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(Config::default)
    }

    /// Initialize the global configuration with defaults.
    ///
    /// # Errors
    /// Returns an error if the configuration has already been initialized.
    pub fn init() -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(Self::default())
            .map_err(|_| "Config already initialized")
    }

    /// Initialize the global configuration from environment variables.
    ///
    /// # Errors
    /// Returns an error if the configuration has already been initialized.
    pub fn init_from_env() -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(Self::from_env())
            .map_err(|_| "Config already initialized")
    }

    /// Initialize the global configuration with a caller-supplied instance.
    ///
    /// # Errors
    /// Returns an error if the configuration has already been initialized.
    pub fn init_with(config: Config) -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(config)
            .map_err(|_| "Config already initialized")
    }

    pub fn is_initialized() -> bool {
        GLOBAL_CONFIG.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pending_secret_ttl_secs, 300);
        assert_eq!(config.stale_handshake_max_age_secs, 1800);
        assert_eq!(config.symmetric_key_length, 32);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("YUMSG_PENDING_SECRET_TTL_SECS", "42");
        let config = Config::from_env();
        assert_eq!(config.pending_secret_ttl_secs, 42);
        std::env::remove_var("YUMSG_PENDING_SECRET_TTL_SECS");
    }
}
