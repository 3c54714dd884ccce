use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::message::v0::Message as V0Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use tracing::{debug, info};

use super::{
    BlockReference, ConfirmationDepth, LedgerClient, LedgerError, LedgerResult, LookupTableState,
};

const DEFAULT_CONFIRM_POLL: Duration = Duration::from_millis(500);

/// 基于 `solana-client` 非阻塞 RPC 客户端的实现。
#[derive(Clone)]
pub struct RpcLedger {
    client: Arc<RpcClient>,
    confirm_poll: Duration,
}

impl RpcLedger {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self {
            client,
            confirm_poll: DEFAULT_CONFIRM_POLL,
        }
    }

    pub fn with_confirm_poll(mut self, poll: Duration) -> Self {
        self.confirm_poll = poll;
        self
    }

    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }
}

impl RpcLedger {
    async fn signature_status(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> LedgerResult<Option<Result<(), String>>> {
        let status = self
            .client
            .get_signature_status_with_commitment(signature, commitment)
            .await?;
        Ok(status.map(|result| result.map_err(|err| err.to_string())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PollVerdict {
    Confirmed,
    Failed(String),
    Pending,
    Expired,
}

/// 目标深度未确认时参考 processed 级别的状态：交易已落块就继续等待，
/// 只有链上查不到且区块高度超过有效高度才判定过期。
fn judge_poll(
    at_depth: Option<Result<(), String>>,
    landed: Option<Result<(), String>>,
    block_height: u64,
    last_valid_block_height: u64,
) -> PollVerdict {
    match (at_depth, landed) {
        (Some(Ok(())), _) => PollVerdict::Confirmed,
        (Some(Err(reason)), _) | (None, Some(Err(reason))) => PollVerdict::Failed(reason),
        (None, Some(Ok(()))) => PollVerdict::Pending,
        (None, None) if block_height > last_valid_block_height => PollVerdict::Expired,
        (None, None) => PollVerdict::Pending,
    }
}

#[async_trait]
impl LedgerClient for RpcLedger {
    async fn get_slot(&self) -> LedgerResult<u64> {
        Ok(self.client.get_slot().await?)
    }

    async fn get_balance(&self, owner: &Pubkey) -> LedgerResult<u64> {
        Ok(self.client.get_balance(owner).await?)
    }

    async fn get_latest_blockhash(&self) -> LedgerResult<BlockReference> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.client.commitment())
            .await?;
        Ok(BlockReference {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn get_fee_for_message(&self, message: &V0Message) -> LedgerResult<u64> {
        Ok(self.client.get_fee_for_message(message).await?)
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> LedgerResult<Signature> {
        let signature = self.client.send_transaction(transaction).await?;
        info!(
            target: "ledger::rpc",
            signature = %signature,
            endpoint = %self.client.url(),
            "transaction submitted via rpc client"
        );
        Ok(signature)
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        reference: &BlockReference,
        depth: ConfirmationDepth,
    ) -> LedgerResult<()> {
        loop {
            let at_depth = self.signature_status(signature, depth.commitment()).await?;
            let landed = match at_depth {
                None => {
                    self.signature_status(signature, CommitmentConfig::processed())
                        .await?
                }
                Some(_) => None,
            };
            let block_height = match (&at_depth, &landed) {
                (None, None) => self.client.get_block_height().await?,
                _ => 0,
            };

            match judge_poll(at_depth, landed, block_height, reference.last_valid_block_height) {
                PollVerdict::Confirmed => {
                    debug!(
                        target: "ledger::rpc",
                        signature = %signature,
                        depth = depth.as_str(),
                        "交易已确认"
                    );
                    return Ok(());
                }
                PollVerdict::Failed(reason) => {
                    return Err(LedgerError::TransactionFailed {
                        signature: *signature,
                        reason,
                    });
                }
                PollVerdict::Expired => {
                    return Err(LedgerError::Expired {
                        signature: *signature,
                        last_valid_block_height: reference.last_valid_block_height,
                    });
                }
                PollVerdict::Pending => {}
            }
            tokio::time::sleep(self.confirm_poll).await;
        }
    }

    async fn get_lookup_table(&self, address: &Pubkey) -> LedgerResult<Option<LookupTableState>> {
        let response = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await?;
        response
            .value
            .map(|account| LookupTableState::decode(address, &account.data))
            .transpose()
    }
}
