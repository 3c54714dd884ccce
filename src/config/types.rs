use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::ChunkLimits;
use crate::lifecycle::LifecycleSettings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolsplitConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "super::default_rpc_url")]
    pub rpc_url: String,
    /// `processed` / `confirmed` / `finalized`
    #[serde(default = "super::default_commitment")]
    pub commitment: String,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    /// JSON 字节数组、逗号分隔字节或 base58 私钥；环境变量 `SOLSPLIT_PRIVATE_KEY` 优先。
    #[serde(default)]
    pub private_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default = "super::default_timezone_offset_hours")]
    pub timezone_offset_hours: i8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "super::default_cooldown_slots")]
    pub cooldown_slots: u64,
    #[serde(default = "super::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "super::default_extend_chunk_size")]
    pub extend_chunk_size: usize,
    #[serde(default = "super::default_transfer_chunk_size")]
    pub transfer_chunk_size: usize,
    #[serde(default = "super::default_fallback_fee_lamports")]
    pub fallback_fee_lamports: u64,
    #[serde(default = "super::default_confirm_poll_ms")]
    pub confirm_poll_ms: u64,
    #[serde(default = "super::default_storage_path")]
    pub storage_path: PathBuf,
}

impl LifecycleConfig {
    pub fn settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            cooldown_slots: self.cooldown_slots,
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            limits: ChunkLimits::new(self.extend_chunk_size, self.transfer_chunk_size),
            fallback_fee_lamports: self.fallback_fee_lamports,
        }
    }

    pub fn confirm_poll(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "super::default_prometheus_listen")]
    pub listen: String,
}
