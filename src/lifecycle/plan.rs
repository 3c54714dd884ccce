use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

use crate::batch::{ChunkLimits, chunk};
use crate::ledger::instructions;
use crate::split::{Allocation, SplitRequest, ValidationError, compute_split};
use crate::submitter::PendingStep;

/// 一次分账的完整执行计划：分配结果与两类分片。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    pub payer: Pubkey,
    pub allocation: Allocation,
    pub extend_chunks: Vec<Vec<Pubkey>>,
    pub transfer_chunks: Vec<Vec<(Pubkey, u64)>>,
}

impl SplitPlan {
    pub fn build(request: &SplitRequest, limits: ChunkLimits) -> Result<Self, ValidationError> {
        let allocation = compute_split(request)?;

        let mut addresses: Vec<Pubkey> = Vec::with_capacity(request.recipients.len());
        for recipient in &request.recipients {
            if *recipient != request.payer && !addresses.contains(recipient) {
                addresses.push(*recipient);
            }
        }

        let payable: Vec<(Pubkey, u64)> = allocation.payable().copied().collect();
        Ok(Self {
            payer: request.payer,
            extend_chunks: chunk(&addresses, limits.extend),
            transfer_chunks: chunk(&payable, limits.transfer),
            allocation,
        })
    }

    pub fn total_lamports(&self) -> u64 {
        self.allocation.total()
    }

    pub fn recipients(&self) -> usize {
        self.allocation.len()
    }

    pub fn extend_instruction(&self, table: &Pubkey, index: usize) -> Option<Instruction> {
        self.extend_chunks
            .get(index)
            .map(|addresses| instructions::extend_table(table, &self.payer, addresses.clone()))
    }

    pub fn transfer_instructions(&self, index: usize) -> Vec<Instruction> {
        self.transfer_chunks
            .get(index)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(to, lamports)| instructions::transfer(&self.payer, to, *lamports))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn create_step() -> PendingStep {
        PendingStep::new(
            "Confirm transaction to create ALT",
            "A temporary ALT will be created to optimize the send.",
        )
    }

    pub fn extend_step(&self, index: usize) -> PendingStep {
        let count = self.extend_chunks.get(index).map_or(0, Vec::len);
        PendingStep::new(
            format!(
                "Confirm transaction to extend ALT ({}/{})",
                index + 1,
                self.extend_chunks.len()
            ),
            format!("Adding {count} addresses to ALT"),
        )
    }

    pub fn transfer_step(&self, index: usize) -> PendingStep {
        let count = self.transfer_chunks.get(index).map_or(0, Vec::len);
        PendingStep::new(
            format!(
                "Confirm transaction to send SOL ({}/{})",
                index + 1,
                self.transfer_chunks.len()
            ),
            format!("Sending to {count} recipients"),
        )
    }

    pub fn deactivate_step() -> PendingStep {
        PendingStep::new(
            "Confirm transaction to deactivate ALT",
            "The temporary ALT will be deactivated.",
        )
    }

    pub fn close_step() -> PendingStep {
        PendingStep::new("Confirm transaction to close ALT", "Close ALT and reclaim rent")
    }
}
