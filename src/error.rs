use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::fees::Shortfall;
use crate::ledger::LedgerError;
use crate::lifecycle::LifecycleState;
use crate::split::ValidationError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("参数校验失败: {0}")]
    Validation(#[from] ValidationError),
    #[error("余额不足 {0}")]
    InsufficientFunds(Shortfall),
    #[error("步骤 `{step}` 提交失败: {message}")]
    Submission { step: String, message: String },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("ALT 记录 {address} 属于其他钱包，已清除")]
    StaleRecord {
        address: Pubkey,
        owner: Option<Pubkey>,
    },
    #[error("当前状态 {state} 不允许执行 {action}")]
    InvalidState {
        state: LifecycleState,
        action: &'static str,
    },
}

pub type SplitResult<T> = Result<T, SplitError>;
