use std::path::PathBuf;

use solana_commitment_config::CommitmentConfig;

pub mod loader;
pub mod types;
pub mod wallet;

pub use loader::*;
pub use types::*;
pub use wallet::{PRIVATE_KEY_ENV, load_keypair, parse_keypair_string};

use self::types as cfg;
use crate::batch::{EXTEND_CHUNK_SIZE, TRANSFER_CHUNK_SIZE};
use crate::fees::FALLBACK_FEE_LAMPORTS;
use crate::lifecycle::DEFAULT_COOLDOWN_SLOTS;

pub(crate) fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

pub(crate) fn default_commitment() -> String {
    "confirmed".to_string()
}

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_timezone_offset_hours() -> i8 {
    0
}

pub(crate) fn default_cooldown_slots() -> u64 {
    DEFAULT_COOLDOWN_SLOTS
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    1_000
}

pub(crate) fn default_extend_chunk_size() -> usize {
    EXTEND_CHUNK_SIZE
}

pub(crate) fn default_transfer_chunk_size() -> usize {
    TRANSFER_CHUNK_SIZE
}

pub(crate) fn default_fallback_fee_lamports() -> u64 {
    FALLBACK_FEE_LAMPORTS
}

pub(crate) fn default_confirm_poll_ms() -> u64 {
    500
}

pub(crate) fn default_storage_path() -> PathBuf {
    PathBuf::from(".solsplit/state.json")
}

pub(crate) fn default_prometheus_listen() -> String {
    "0.0.0.0:9898".to_string()
}

impl Default for cfg::GlobalConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            commitment: default_commitment(),
            wallet: cfg::WalletConfig::default(),
            logging: cfg::LoggingConfig::default(),
        }
    }
}

impl Default for cfg::LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
            json: false,
            timezone_offset_hours: default_timezone_offset_hours(),
        }
    }
}

impl Default for cfg::LifecycleConfig {
    fn default() -> Self {
        Self {
            cooldown_slots: default_cooldown_slots(),
            poll_interval_ms: default_poll_interval_ms(),
            extend_chunk_size: default_extend_chunk_size(),
            transfer_chunk_size: default_transfer_chunk_size(),
            fallback_fee_lamports: default_fallback_fee_lamports(),
            confirm_poll_ms: default_confirm_poll_ms(),
            storage_path: default_storage_path(),
        }
    }
}

impl Default for cfg::PrometheusConfig {
    fn default() -> Self {
        Self {
            enable: false,
            listen: default_prometheus_listen(),
        }
    }
}

impl cfg::GlobalConfig {
    /// 未识别的取值按 `confirmed` 处理。
    pub fn commitment_config(&self) -> CommitmentConfig {
        match self.commitment.trim().to_ascii_lowercase().as_str() {
            "processed" => CommitmentConfig::processed(),
            "finalized" => CommitmentConfig::finalized(),
            _ => CommitmentConfig::confirmed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: SolsplitConfig = toml::from_str("").unwrap();
        assert_eq!(config.lifecycle.cooldown_slots, 512);
        assert_eq!(config.lifecycle.extend_chunk_size, 30);
        assert_eq!(config.lifecycle.transfer_chunk_size, 55);
        assert_eq!(config.lifecycle.fallback_fee_lamports, 5_000);
        assert_eq!(config.global.logging.level, "info");
        assert!(!config.prometheus.enable);
        assert_eq!(config.global.commitment_config(), CommitmentConfig::confirmed());
    }

    #[test]
    fn overrides_flow_into_settings() {
        let raw = r#"
            [global]
            rpc_url = "http://127.0.0.1:8899"
            commitment = "finalized"

            [global.logging]
            level = "debug"
            json = true

            [lifecycle]
            cooldown_slots = 64
            poll_interval_ms = 250
            extend_chunk_size = 0
            transfer_chunk_size = 20

            [prometheus]
            enable = true
            listen = "127.0.0.1:9100"
        "#;
        let config: SolsplitConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.global.rpc_url, "http://127.0.0.1:8899");
        assert_eq!(config.global.commitment_config(), CommitmentConfig::finalized());
        assert!(config.global.logging.json);

        let settings = config.lifecycle.settings();
        assert_eq!(settings.cooldown_slots, 64);
        assert_eq!(settings.poll_interval.as_millis(), 250);
        assert_eq!(settings.limits.extend, 1);
        assert_eq!(settings.limits.transfer, 20);
        assert_eq!(config.prometheus.listen, "127.0.0.1:9100");
    }
}
