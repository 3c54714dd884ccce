//! 链上网络客户端抽象：核心只通过该 trait 与网络交互，便于替换与测试。

use async_trait::async_trait;
use solana_address_lookup_table_interface::state::AddressLookupTable;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::message::v0::Message as V0Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

pub mod error;
pub mod instructions;
pub mod rpc;

pub use error::{LedgerError, LedgerResult};
pub use rpc::RpcLedger;

/// 最新区块哈希及其失效区块高度。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReference {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// 交易确认深度：中间步骤用 `Confirmed`，停用/关闭 ALT 用 `Finalized`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationDepth {
    Confirmed,
    Finalized,
}

impl ConfirmationDepth {
    pub fn commitment(self) -> CommitmentConfig {
        match self {
            Self::Confirmed => CommitmentConfig::confirmed(),
            Self::Finalized => CommitmentConfig::finalized(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

/// 链上 ALT 的当前状态；`deactivation_slot` 为 `None` 表示仍处于激活状态。
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTableState {
    pub account: AddressLookupTableAccount,
    pub deactivation_slot: Option<u64>,
}

impl LookupTableState {
    pub fn active(key: Pubkey, addresses: Vec<Pubkey>) -> Self {
        Self {
            account: AddressLookupTableAccount { key, addresses },
            deactivation_slot: None,
        }
    }

    pub fn address(&self) -> Pubkey {
        self.account.key
    }

    pub fn decode(address: &Pubkey, data: &[u8]) -> LedgerResult<Self> {
        let table = AddressLookupTable::deserialize(data).map_err(|err| LedgerError::Decode {
            address: *address,
            reason: err.to_string(),
        })?;
        let deactivation_slot = match table.meta.deactivation_slot {
            u64::MAX => None,
            slot => Some(slot),
        };
        Ok(Self {
            account: AddressLookupTableAccount {
                key: *address,
                addresses: table.addresses.into_owned(),
            },
            deactivation_slot,
        })
    }
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn get_slot(&self) -> LedgerResult<u64>;

    async fn get_balance(&self, owner: &Pubkey) -> LedgerResult<u64>;

    async fn get_latest_blockhash(&self) -> LedgerResult<BlockReference>;

    async fn get_fee_for_message(&self, message: &V0Message) -> LedgerResult<u64>;

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> LedgerResult<Signature>;

    /// 等待交易达到指定确认深度，区块哈希过期前未确认则返回 [`LedgerError::Expired`]。
    async fn confirm_transaction(
        &self,
        signature: &Signature,
        reference: &BlockReference,
        depth: ConfirmationDepth,
    ) -> LedgerResult<()>;

    /// 账户不存在时返回 `Ok(None)`。
    async fn get_lookup_table(&self, address: &Pubkey) -> LedgerResult<Option<LookupTableState>>;
}
