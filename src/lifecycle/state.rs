use std::fmt;

use solana_sdk::pubkey::Pubkey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Creating,
    Extending,
    Ready,
    Transferring,
    Deactivating,
    CoolingDown,
    Closable,
    Closed,
    Aborted,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Creating => "creating",
            Self::Extending => "extending",
            Self::Ready => "ready",
            Self::Transferring => "transferring",
            Self::Deactivating => "deactivating",
            Self::CoolingDown => "cooling_down",
            Self::Closable => "closable",
            Self::Closed => "closed",
            Self::Aborted => "aborted",
        }
    }

    /// 正在执行上链步骤的状态，此时不允许发起新的流程。
    pub fn is_submitting(self) -> bool {
        matches!(
            self,
            Self::Creating | Self::Extending | Self::Ready | Self::Transferring | Self::Deactivating
        )
    }

    /// 存在待关闭 ALT 的状态。
    pub fn has_pending_table(self) -> bool {
        matches!(self, Self::CoolingDown | Self::Closable)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次流程中临时 ALT 的记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AltRecord {
    pub address: Pubkey,
    pub wallet: Pubkey,
    pub deactivation_slot: Option<u64>,
    pub state: LifecycleState,
}

impl AltRecord {
    pub fn new(address: Pubkey, wallet: Pubkey) -> Self {
        Self {
            address,
            wallet,
            deactivation_slot: None,
            state: LifecycleState::Creating,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_groups() {
        assert!(LifecycleState::Extending.is_submitting());
        assert!(!LifecycleState::CoolingDown.is_submitting());
        assert!(LifecycleState::Closable.has_pending_table());
        assert!(!LifecycleState::Aborted.has_pending_table());
        assert_eq!(LifecycleState::CoolingDown.to_string(), "cooling_down");
        assert_eq!(LifecycleState::default(), LifecycleState::Idle);
    }
}
