//! 单槽位的 ALT 记录持久化。后端存储通过 [`PersistencePort`] 注入。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;
use tracing::{debug, warn};

use crate::lifecycle::AltRecord;

pub const STORAGE_KEY: &str = "solsplit:lastAlt";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access store at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode store entry: {0}")]
    Json(#[from] serde_json::Error),
}

/// 键值存储端口，语义对应浏览器 localStorage：读不到即 `None`。
pub trait PersistencePort: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn clear(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryPersistence {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistencePort for MemoryPersistence {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// 以单个 JSON 对象文件保存全部键值。
#[derive(Debug)]
pub struct FilePersistence {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        match serde_json::from_str(&contents) {
            Ok(entries) => Ok(entries),
            Err(err) => {
                warn!(
                    target: "store",
                    path = %self.path.display(),
                    error = %err,
                    "存储文件格式损坏，按空存储处理"
                );
                Ok(BTreeMap::new())
            }
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, contents).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl PersistencePort for FilePersistence {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.guard.lock();
        Ok(self.load()?.remove(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.guard.lock();
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn clear(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.guard.lock();
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedAlt {
    address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wallet_pubkey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deactivation_slot: Option<u64>,
}

/// 从存储中恢复出的 ALT 记录。`wallet` 缺失表示旧记录，不属于任何钱包。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAlt {
    pub address: Pubkey,
    pub wallet: Option<Pubkey>,
    pub deactivation_slot: Option<u64>,
}

#[derive(Clone)]
pub struct AltRecordStore {
    port: Arc<dyn PersistencePort>,
}

impl AltRecordStore {
    pub fn new(port: Arc<dyn PersistencePort>) -> Self {
        Self { port }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryPersistence::new()))
    }

    /// 读取失败或内容无法解析时都视为没有记录。
    pub fn load(&self) -> Option<StoredAlt> {
        let raw = match self.port.read(STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(target: "store", error = %err, "读取 ALT 记录失败");
                return None;
            }
        };
        let persisted: PersistedAlt = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                debug!(target: "store", error = %err, "ALT 记录格式无效，忽略");
                return None;
            }
        };
        let address = Pubkey::from_str(&persisted.address).ok()?;
        let wallet = persisted
            .wallet_pubkey
            .as_deref()
            .and_then(|raw| Pubkey::from_str(raw).ok());
        Some(StoredAlt {
            address,
            wallet,
            deactivation_slot: persisted.deactivation_slot.filter(|slot| *slot > 0),
        })
    }

    pub fn save(&self, record: &AltRecord) -> Result<(), StoreError> {
        let persisted = PersistedAlt {
            address: record.address.to_string(),
            wallet_pubkey: Some(record.wallet.to_string()),
            deactivation_slot: record.deactivation_slot.filter(|slot| *slot > 0),
        };
        let raw = serde_json::to_string(&persisted)?;
        self.port.write(STORAGE_KEY, &raw)?;
        debug!(target: "store", address = %record.address, "ALT 记录已写入");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.port.clear(STORAGE_KEY)
    }
}
