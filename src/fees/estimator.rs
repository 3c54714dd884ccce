use std::sync::Arc;

use solana_sdk::instruction::Instruction;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::message::v0::Message as V0Message;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::ledger::{LedgerClient, LedgerError};

/// 所有查询都失败时使用的保守手续费（单签名基础费）。
pub const FALLBACK_FEE_LAMPORTS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSource {
    /// 针对完整消息查询得到。
    Message,
    /// 完整消息查询失败，用空消息近似单签名费用。
    EmptyMessage,
    /// 两级查询均失败。
    Floor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub lamports: u64,
    pub source: FeeSource,
}

#[derive(Clone)]
pub struct FeeEstimator {
    ledger: Arc<dyn LedgerClient>,
    fallback_lamports: u64,
}

impl FeeEstimator {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            ledger,
            fallback_lamports: FALLBACK_FEE_LAMPORTS,
        }
    }

    pub fn with_fallback(mut self, lamports: u64) -> Self {
        self.fallback_lamports = lamports;
        self
    }

    /// 预估一组指令的手续费。消息过大或 RPC 失败时逐级降级，本方法不会失败。
    pub async fn estimate(
        &self,
        payer: &Pubkey,
        instructions: &[Instruction],
        lookups: &[AddressLookupTableAccount],
    ) -> FeeEstimate {
        match self.query(payer, instructions, lookups).await {
            Ok(lamports) => {
                return FeeEstimate {
                    lamports,
                    source: FeeSource::Message,
                };
            }
            Err(err) => {
                debug!(
                    target: "fees",
                    error = %err,
                    instructions = instructions.len(),
                    "手续费预估失败（消息过大或 RPC 限制），改用空消息近似"
                );
            }
        }

        match self.query(payer, &[], &[]).await {
            Ok(lamports) => FeeEstimate {
                lamports,
                source: FeeSource::EmptyMessage,
            },
            Err(err) => {
                warn!(
                    target: "fees",
                    error = %err,
                    fallback = self.fallback_lamports,
                    "空消息手续费预估同样失败，使用保守默认值"
                );
                FeeEstimate {
                    lamports: self.fallback_lamports,
                    source: FeeSource::Floor,
                }
            }
        }
    }

    async fn query(
        &self,
        payer: &Pubkey,
        instructions: &[Instruction],
        lookups: &[AddressLookupTableAccount],
    ) -> Result<u64, LedgerError> {
        let reference = self.ledger.get_latest_blockhash().await?;
        let message = V0Message::try_compile(payer, instructions, lookups, reference.blockhash)
            .map_err(|err| LedgerError::Unavailable(format!("编译消息失败: {err}")))?;
        self.ledger.get_fee_for_message(&message).await
    }
}
