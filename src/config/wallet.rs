use std::env;

use solana_sdk::signature::Keypair;
use tracing::info;

use super::{ConfigError, WalletConfig};

pub const PRIVATE_KEY_ENV: &str = "SOLSPLIT_PRIVATE_KEY";

/// 读取签名私钥，环境变量优先于配置文件；两者皆空时返回 `Ok(None)`。
pub fn load_keypair(wallet: &WalletConfig) -> Result<Option<Keypair>, ConfigError> {
    let from_env = env::var(PRIVATE_KEY_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty());
    let (raw, source) = match from_env {
        Some(value) => (value, "env"),
        None if !wallet.private_key.trim().is_empty() => (wallet.private_key.clone(), "config"),
        None => return Ok(None),
    };

    let keypair = parse_keypair_string(&raw)?;
    info!(target: "config", source, "已加载签名私钥");
    Ok(Some(keypair))
}

pub fn parse_keypair_string(raw: &str) -> Result<Keypair, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Wallet("keypair string empty".to_string()));
    }

    let bytes = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<u8>>(trimmed)
            .map_err(|err| ConfigError::Wallet(format!("invalid json byte array: {err}")))?
    } else if trimmed.contains(',') {
        trimmed
            .split(',')
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| ConfigError::Wallet(format!("invalid byte list: {err}")))?
    } else {
        bs58::decode(trimmed)
            .into_vec()
            .map_err(|err| ConfigError::Wallet(format!("invalid base58: {err}")))?
    };

    Keypair::try_from(bytes.as_slice()).map_err(|err| ConfigError::Wallet(err.to_string()))
}
