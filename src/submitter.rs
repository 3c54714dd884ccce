//! 单笔交易的提交流程：取区块哈希、编译 v0 消息、交给签名方签名提交、等待确认。

use std::sync::Arc;

use solana_sdk::instruction::Instruction;
use solana_sdk::message::v0::Message as V0Message;
use solana_sdk::message::{AddressLookupTableAccount, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use crate::ledger::{ConfirmationDepth, LedgerClient, LedgerError};
use crate::monitoring::events;
use crate::wallet::{SigningAuthority, WalletError};

/// 等待签名的步骤说明，供展示层使用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStep {
    pub title: String,
    pub description: Option<String>,
}

impl PendingStep {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: Some(description.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Confirmed(Signature),
    Declined,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("获取最新区块哈希失败: {0}")]
    Blockhash(#[source] LedgerError),
    #[error("编译交易消息失败: {0}")]
    Compile(String),
    #[error(transparent)]
    Wallet(WalletError),
    #[error("等待交易确认失败: {0}")]
    Confirm(#[source] LedgerError),
}

pub struct TransactionSubmitter {
    ledger: Arc<dyn LedgerClient>,
    authority: Arc<dyn SigningAuthority>,
    pending: watch::Sender<Option<PendingStep>>,
}

impl TransactionSubmitter {
    pub fn new(ledger: Arc<dyn LedgerClient>, authority: Arc<dyn SigningAuthority>) -> Self {
        let (pending, _) = watch::channel(None);
        Self {
            ledger,
            authority,
            pending,
        }
    }

    pub fn payer(&self) -> Pubkey {
        self.authority.pubkey()
    }

    pub fn pending(&self) -> watch::Receiver<Option<PendingStep>> {
        self.pending.subscribe()
    }

    /// 提交并等待确认；用户拒绝签名返回 [`SubmitOutcome::Declined`] 而非错误。
    pub async fn submit(
        &self,
        instructions: &[Instruction],
        lookups: &[AddressLookupTableAccount],
        depth: ConfirmationDepth,
    ) -> Result<SubmitOutcome, SubmitError> {
        let payer = self.payer();
        let reference = self
            .ledger
            .get_latest_blockhash()
            .await
            .map_err(SubmitError::Blockhash)?;
        let message = V0Message::try_compile(&payer, instructions, lookups, reference.blockhash)
            .map_err(|err| SubmitError::Compile(err.to_string()))?;

        let signature = match self
            .authority
            .sign_and_submit(VersionedMessage::V0(message))
            .await
        {
            Ok(signature) => signature,
            Err(err) if err.is_declined() => return Ok(SubmitOutcome::Declined),
            Err(err) => return Err(SubmitError::Wallet(err)),
        };
        debug!(
            target: "submitter",
            signature = %signature,
            depth = depth.as_str(),
            last_valid_block_height = reference.last_valid_block_height,
            "交易已提交，等待确认"
        );

        self.ledger
            .confirm_transaction(&signature, &reference, depth)
            .await
            .map_err(SubmitError::Confirm)?;
        Ok(SubmitOutcome::Confirmed(signature))
    }

    /// 与 [`submit`](Self::submit) 相同，但在执行期间公开步骤说明，结束后无论成败都会清空。
    pub async fn submit_step(
        &self,
        step: PendingStep,
        instructions: &[Instruction],
        lookups: &[AddressLookupTableAccount],
        depth: ConfirmationDepth,
    ) -> Result<SubmitOutcome, SubmitError> {
        events::step_pending(&step.title);
        let title = step.title.clone();
        self.pending.send_replace(Some(step));
        let result = self.submit(instructions, lookups, depth).await;
        self.pending.send_replace(None);
        if let Ok(SubmitOutcome::Confirmed(signature)) = &result {
            events::step_confirmed(&title, signature, depth);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::instructions::transfer;
    use crate::testing::{MockLedger, ScriptedWallet, WalletResponse};

    fn setup(responses: Vec<WalletResponse>) -> (Arc<MockLedger>, Arc<ScriptedWallet>, TransactionSubmitter) {
        let ledger = Arc::new(MockLedger::new(1_000, 1_000_000_000));
        let wallet = Arc::new(ScriptedWallet::new(ledger.clone()).with_responses(responses));
        let submitter = TransactionSubmitter::new(ledger.clone(), wallet.clone());
        (ledger, wallet, submitter)
    }

    #[tokio::test]
    async fn confirms_and_clears_pending_step() {
        let (ledger, wallet, submitter) = setup(vec![]);
        let pending = submitter.pending();
        let ix = transfer(&wallet.pubkey(), &Pubkey::new_unique(), 1);

        let outcome = submitter
            .submit_step(
                PendingStep::new("Confirm transaction to send SOL (1/1)", "Sending to 1 recipients"),
                &[ix],
                &[],
                ConfirmationDepth::Finalized,
            )
            .await
            .unwrap();

        assert!(matches!(outcome, SubmitOutcome::Confirmed(_)));
        assert_eq!(ledger.sent_count(), 1);
        assert!(pending.borrow().is_none());
        assert_eq!(
            ledger.confirmed_depths(),
            vec![ConfirmationDepth::Finalized]
        );
    }

    #[tokio::test]
    async fn decline_is_not_an_error() {
        let (ledger, wallet, submitter) = setup(vec![WalletResponse::Decline]);
        let ix = transfer(&wallet.pubkey(), &Pubkey::new_unique(), 1);
        let outcome = submitter
            .submit(&[ix], &[], ConfirmationDepth::Confirmed)
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Declined);
        assert_eq!(ledger.sent_count(), 0);
    }

    #[tokio::test]
    async fn wallet_failure_surfaces_and_clears_pending() {
        let (_, wallet, submitter) = setup(vec![WalletResponse::Fail("rpc down".into())]);
        let pending = submitter.pending();
        let ix = transfer(&wallet.pubkey(), &Pubkey::new_unique(), 1);
        let err = submitter
            .submit_step(PendingStep::new("t", "d"), &[ix], &[], ConfirmationDepth::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Wallet(_)));
        assert!(pending.borrow().is_none());
    }

    #[tokio::test]
    async fn confirmation_failure_is_reported() {
        let (ledger, wallet, submitter) = setup(vec![]);
        ledger.update(|state| state.fail_confirm = true);
        let ix = transfer(&wallet.pubkey(), &Pubkey::new_unique(), 1);
        let err = submitter
            .submit(&[ix], &[], ConfirmationDepth::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Confirm(LedgerError::Expired { .. })));
    }
}
