use solana_client::client_error::ClientError;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("RPC 请求失败: {0}")]
    Rpc(#[from] ClientError),
    #[error("反序列化 ALT 失败 {address}: {reason}")]
    Decode { address: Pubkey, reason: String },
    #[error("交易 {signature} 在区块高度 {last_valid_block_height} 之前未确认，区块哈希已过期")]
    Expired {
        signature: Signature,
        last_valid_block_height: u64,
    },
    #[error("交易 {signature} 执行失败: {reason}")]
    TransactionFailed { signature: Signature, reason: String },
    #[error("{0}")]
    Unavailable(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
