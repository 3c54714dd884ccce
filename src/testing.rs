//! 测试用的链上客户端与签名方。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::hash::Hash;
use solana_sdk::message::VersionedMessage;
use solana_sdk::message::v0::Message as V0Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

use crate::ledger::{
    BlockReference, ConfirmationDepth, LedgerClient, LedgerError, LedgerResult, LookupTableState,
};
use crate::wallet::{SigningAuthority, WalletError};

const FEE_PER_SIGNATURE: u64 = 5_000;

#[derive(Debug, Default)]
pub struct MockState {
    pub slot: u64,
    pub balance: u64,
    pub tables: HashMap<Pubkey, LookupTableState>,
    pub fail_slot: bool,
    pub fail_balance: bool,
    pub fail_fee_with_instructions: bool,
    pub fail_all_fees: bool,
    pub fail_confirm: bool,
    pub fail_table_fetch: bool,
    pub submitted: Vec<VersionedMessage>,
    pub confirmed: Vec<ConfirmationDepth>,
    pub transferred: u64,
    /// 第 N 笔交易上链后把余额改为给定值，模拟流程中途余额被转走。
    pub drain_after: Option<(usize, u64)>,
    nonce: u64,
}

impl MockState {
    fn next_nonce(&mut self) -> [u8; 8] {
        self.nonce += 1;
        self.nonce.to_le_bytes()
    }
}

/// 内存中的链：执行 ALT 指令并累计转账金额。
#[derive(Debug, Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new(slot: u64, balance: u64) -> Self {
        Self {
            state: Mutex::new(MockState {
                slot,
                balance,
                ..MockState::default()
            }),
        }
    }

    pub fn update(&self, apply: impl FnOnce(&mut MockState)) {
        apply(&mut self.state.lock());
    }

    pub fn insert_table(&self, table: LookupTableState) {
        self.state.lock().tables.insert(table.address(), table);
    }

    pub fn table(&self, address: &Pubkey) -> Option<LookupTableState> {
        self.state.lock().tables.get(address).cloned()
    }

    pub fn table_count(&self) -> usize {
        self.state.lock().tables.len()
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().submitted.len()
    }

    pub fn submitted(&self) -> Vec<VersionedMessage> {
        self.state.lock().submitted.clone()
    }

    pub fn confirmed_depths(&self) -> Vec<ConfirmationDepth> {
        self.state.lock().confirmed.clone()
    }

    pub fn transferred_lamports(&self) -> u64 {
        self.state.lock().transferred
    }

    /// 执行消息中的 ALT 与转账指令，返回新签名。
    pub fn accept(&self, message: VersionedMessage) -> Signature {
        let mut state = self.state.lock();
        let keys = message.static_account_keys().to_vec();
        let alt_program = solana_address_lookup_table_interface::program::id();
        let system_program = solana_system_interface::program::id();

        for ix in message.instructions() {
            let Some(program) = keys.get(ix.program_id_index as usize) else {
                continue;
            };
            let tag = ix
                .data
                .get(..4)
                .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]));
            if *program == system_program {
                if let (Some(2), Some(raw)) = (tag, ix.data.get(4..12)) {
                    let mut amount = [0u8; 8];
                    amount.copy_from_slice(raw);
                    state.transferred += u64::from_le_bytes(amount);
                }
                continue;
            }
            if *program != alt_program {
                continue;
            }
            let Some(table) = ix
                .accounts
                .first()
                .and_then(|index| keys.get(*index as usize))
                .copied()
            else {
                continue;
            };
            let slot = state.slot;
            match tag {
                Some(0) => {
                    state
                        .tables
                        .insert(table, LookupTableState::active(table, Vec::new()));
                }
                Some(2) => {
                    let addresses = decode_extend(&ix.data);
                    if let Some(entry) = state.tables.get_mut(&table) {
                        entry.account.addresses.extend(addresses);
                    }
                }
                Some(3) => {
                    if let Some(entry) = state.tables.get_mut(&table) {
                        entry.deactivation_slot = Some(slot);
                    }
                }
                Some(4) => {
                    state.tables.remove(&table);
                }
                _ => {}
            }
        }

        state.submitted.push(message);
        if let Some((count, balance)) = state.drain_after {
            if state.submitted.len() == count {
                state.balance = balance;
            }
        }
        let mut raw = [0u8; 64];
        raw[..8].copy_from_slice(&state.next_nonce());
        Signature::from(raw)
    }

    fn guard(&self, failing: impl FnOnce(&MockState) -> bool, what: &str) -> LedgerResult<()> {
        if failing(&self.state.lock()) {
            return Err(LedgerError::Unavailable(format!("mock {what} unavailable")));
        }
        Ok(())
    }
}

fn decode_extend(data: &[u8]) -> Vec<Pubkey> {
    let Some(raw_len) = data.get(4..12) else {
        return Vec::new();
    };
    let mut len = [0u8; 8];
    len.copy_from_slice(raw_len);
    let count = u64::from_le_bytes(len) as usize;
    data.get(12..)
        .unwrap_or_default()
        .chunks_exact(32)
        .take(count)
        .filter_map(|raw| Pubkey::try_from(raw).ok())
        .collect()
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_slot(&self) -> LedgerResult<u64> {
        self.guard(|state| state.fail_slot, "slot")?;
        Ok(self.state.lock().slot)
    }

    async fn get_balance(&self, _owner: &Pubkey) -> LedgerResult<u64> {
        self.guard(|state| state.fail_balance, "balance")?;
        Ok(self.state.lock().balance)
    }

    async fn get_latest_blockhash(&self) -> LedgerResult<BlockReference> {
        let mut raw = [0u8; 32];
        raw[..8].copy_from_slice(&self.state.lock().next_nonce());
        Ok(BlockReference {
            blockhash: Hash::new_from_array(raw),
            last_valid_block_height: 150,
        })
    }

    async fn get_fee_for_message(&self, message: &V0Message) -> LedgerResult<u64> {
        let empty = message.instructions.is_empty();
        self.guard(
            |state| state.fail_all_fees || (state.fail_fee_with_instructions && !empty),
            "fee",
        )?;
        Ok(FEE_PER_SIGNATURE * u64::from(message.header.num_required_signatures))
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> LedgerResult<Signature> {
        Ok(self.accept(transaction.message.clone()))
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        reference: &BlockReference,
        depth: ConfirmationDepth,
    ) -> LedgerResult<()> {
        let mut state = self.state.lock();
        if state.fail_confirm {
            return Err(LedgerError::Expired {
                signature: *signature,
                last_valid_block_height: reference.last_valid_block_height,
            });
        }
        state.confirmed.push(depth);
        Ok(())
    }

    async fn get_lookup_table(&self, address: &Pubkey) -> LedgerResult<Option<LookupTableState>> {
        self.guard(|state| state.fail_table_fetch, "account")?;
        Ok(self.table(address))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletResponse {
    Approve,
    Decline,
    Fail(String),
}

/// 按脚本应答的签名方，队列为空时默认批准。
pub struct ScriptedWallet {
    payer: Pubkey,
    ledger: Arc<MockLedger>,
    responses: Mutex<VecDeque<WalletResponse>>,
}

impl ScriptedWallet {
    pub fn new(ledger: Arc<MockLedger>) -> Self {
        Self {
            payer: Pubkey::new_unique(),
            ledger,
            responses: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_responses(self, responses: Vec<WalletResponse>) -> Self {
        *self.responses.lock() = responses.into();
        self
    }
}

#[async_trait]
impl SigningAuthority for ScriptedWallet {
    fn pubkey(&self) -> Pubkey {
        self.payer
    }

    async fn sign_and_submit(&self, message: VersionedMessage) -> Result<Signature, WalletError> {
        let response = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or(WalletResponse::Approve);
        match response {
            WalletResponse::Approve => Ok(self.ledger.accept(message)),
            WalletResponse::Decline => Err(WalletError::Declined),
            WalletResponse::Fail(reason) => Err(WalletError::Signing(reason)),
        }
    }
}
