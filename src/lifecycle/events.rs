use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::fees::Shortfall;
use crate::submitter::PendingStep;

use super::LifecycleState;

/// 管理器事件流中的进度事件，供展示层订阅。
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    StateChanged {
        from: LifecycleState,
        to: LifecycleState,
    },
    StepPending(PendingStep),
    StepConfirmed {
        title: String,
        signature: Signature,
    },
    PreflightShortfall(Shortfall),
    /// 手续费预估失败，预检被跳过。
    PreflightSkipped {
        context: String,
    },
    Declined {
        step: String,
    },
    Aborted {
        step: String,
        message: String,
        orphaned_table: Option<Pubkey>,
    },
    StaleRecordCleared {
        address: Pubkey,
        owner: Option<Pubkey>,
    },
    Closed {
        address: Pubkey,
        signature: Signature,
    },
}
