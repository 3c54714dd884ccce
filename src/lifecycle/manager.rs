use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};

use crate::batch::ChunkLimits;
use crate::error::{SplitError, SplitResult};
use crate::fees::{BalanceGuard, BalanceVerdict, FALLBACK_FEE_LAMPORTS, FeeEstimator, Shortfall};
use crate::ledger::{ConfirmationDepth, LedgerClient, instructions};
use crate::monitoring::events;
use crate::split::{SplitRequest, ValidationError};
use crate::store::AltRecordStore;
use crate::submitter::{PendingStep, SubmitOutcome, TransactionSubmitter};
use crate::wallet::SigningAuthority;

use super::monitor::MonitorContext;
use super::{
    AltRecord, CooldownMonitor, CooldownStream, DEFAULT_COOLDOWN_SLOTS, LifecycleEvent,
    LifecycleState, SharedState, SplitPlan, cooldown_remaining,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSettings {
    pub cooldown_slots: u64,
    pub poll_interval: Duration,
    pub limits: ChunkLimits,
    pub fallback_fee_lamports: u64,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            cooldown_slots: DEFAULT_COOLDOWN_SLOTS,
            poll_interval: Duration::from_secs(1),
            limits: ChunkLimits::default(),
            fallback_fee_lamports: FALLBACK_FEE_LAMPORTS,
        }
    }
}

/// 整个流程的手续费预估，单位 lamports。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeePreflight {
    pub create: u64,
    pub extend: u64,
    pub transfer: u64,
    pub deactivate: u64,
}

impl FeePreflight {
    pub fn total(&self) -> u64 {
        self.create
            .saturating_add(self.extend)
            .saturating_add(self.transfer)
            .saturating_add(self.deactivate)
    }
}

pub enum SplitOutcome {
    /// 全部转账完成，ALT 已停用并进入冷却。
    Completed {
        record: AltRecord,
        signatures: Vec<Signature>,
        updates: CooldownStream,
    },
    /// 用户拒绝签名；若 ALT 已创建则需要之后手动处理。
    Declined {
        step: String,
        orphaned_table: Option<Pubkey>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed { signature: Signature },
    Declined,
}

pub enum Rehydration {
    Resumed {
        record: AltRecord,
        updates: CooldownStream,
    },
    NothingPending,
    StaleCleared {
        address: Pubkey,
        owner: Option<Pubkey>,
    },
    /// 未连接钱包，内存中的待处理状态已清空。
    Disconnected,
}

impl Rehydration {
    pub fn stale_notice(&self) -> Option<SplitError> {
        match self {
            Self::StaleCleared { address, owner } => Some(SplitError::StaleRecord {
                address: *address,
                owner: *owner,
            }),
            _ => None,
        }
    }
}

pub struct AltLifecycleManager {
    ledger: Arc<dyn LedgerClient>,
    submitter: TransactionSubmitter,
    estimator: FeeEstimator,
    guard: BalanceGuard,
    store: AltRecordStore,
    settings: LifecycleSettings,
    shared: Arc<SharedState>,
    events: Mutex<Option<mpsc::UnboundedReceiver<LifecycleEvent>>>,
    monitor: Mutex<Option<CooldownMonitor>>,
    flow: tokio::sync::Mutex<()>,
}

impl AltLifecycleManager {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        authority: Arc<dyn SigningAuthority>,
        store: AltRecordStore,
        settings: LifecycleSettings,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            submitter: TransactionSubmitter::new(ledger.clone(), authority),
            estimator: FeeEstimator::new(ledger.clone()).with_fallback(settings.fallback_fee_lamports),
            guard: BalanceGuard::new(ledger.clone()),
            ledger,
            store,
            settings,
            shared: Arc::new(SharedState::new(tx)),
            events: Mutex::new(Some(rx)),
            monitor: Mutex::new(None),
            flow: tokio::sync::Mutex::new(()),
        }
    }

    pub fn payer(&self) -> Pubkey {
        self.submitter.payer()
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    /// 事件流只能取走一次。
    pub fn take_events(&self) -> Option<UnboundedReceiverStream<LifecycleEvent>> {
        self.events.lock().take().map(UnboundedReceiverStream::new)
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.current()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.shared.subscribe()
    }

    pub fn pending_step(&self) -> watch::Receiver<Option<PendingStep>> {
        self.submitter.pending()
    }

    pub fn record(&self) -> Option<AltRecord> {
        self.shared.record()
    }

    /// 启动时根据持久化记录恢复冷却流程。
    pub async fn rehydrate(&self, wallet: Option<Pubkey>) -> SplitResult<Rehydration> {
        let Some(wallet) = wallet else {
            self.stop_monitor().await;
            self.shared.set_record(None);
            self.shared.transition(LifecycleState::Idle);
            return Ok(Rehydration::Disconnected);
        };

        let Some(stored) = self.store.load() else {
            return Ok(Rehydration::NothingPending);
        };

        if stored.wallet != Some(wallet) {
            // 先停掉监控，否则下一次轮询会把记录重新写回
            self.stop_monitor().await;
            self.shared.set_record(None);
            self.shared.transition(LifecycleState::Idle);
            self.store.clear()?;
            events::stale_record_cleared(&stored.address, stored.wallet.as_ref());
            self.shared.emit(LifecycleEvent::StaleRecordCleared {
                address: stored.address,
                owner: stored.wallet,
            });
            return Ok(Rehydration::StaleCleared {
                address: stored.address,
                owner: stored.wallet,
            });
        }

        let state = match self.ledger.get_slot().await {
            Ok(slot)
                if cooldown_remaining(self.settings.cooldown_slots, stored.deactivation_slot, slot)
                    == 0 =>
            {
                LifecycleState::Closable
            }
            Ok(_) => LifecycleState::CoolingDown,
            Err(err) => {
                warn!(target: "lifecycle", error = %err, "获取当前槽位失败，按冷却中恢复");
                LifecycleState::CoolingDown
            }
        };
        let record = AltRecord {
            address: stored.address,
            wallet,
            deactivation_slot: stored.deactivation_slot,
            state,
        };
        info!(
            target: "lifecycle",
            address = %record.address,
            deactivation_slot = record.deactivation_slot,
            state = %state,
            "已恢复待关闭的 ALT"
        );
        let updates = self.monitor_alt(record.clone());
        Ok(Rehydration::Resumed { record, updates })
    }

    /// 预估完整流程的手续费（创建、全部扩展、全部转账、停用），使用预览的 ALT 地址。
    pub async fn estimate_total_fees(&self, request: &SplitRequest) -> SplitResult<FeePreflight> {
        let plan = SplitPlan::build(request, self.settings.limits)?;
        let slot = match self.ledger.get_slot().await {
            Ok(slot) => slot,
            Err(err) => {
                warn!(target: "lifecycle", error = %err, "获取槽位失败，使用 0 预览 ALT 地址");
                0
            }
        };
        let (create_ix, table) = instructions::create_table(&plan.payer, slot);
        Ok(self.estimate_plan(&plan, create_ix, &table).await)
    }

    pub async fn run_split(&self, request: &SplitRequest) -> SplitResult<SplitOutcome> {
        let Ok(_flow) = self.flow.try_lock() else {
            return Err(self.invalid_state("run_split"));
        };
        let state = self.state();
        if state.is_submitting() || state.has_pending_table() {
            return Err(self.invalid_state("run_split"));
        }
        let payer = self.payer();
        if request.payer != payer {
            return Err(ValidationError::PayerMismatch {
                request: request.payer,
                wallet: payer,
            }
            .into());
        }

        let plan = SplitPlan::build(request, self.settings.limits)?;
        events::split_planned(
            plan.recipients(),
            plan.total_lamports(),
            plan.extend_chunks.len(),
            plan.transfer_chunks.len(),
        );
        self.shared.set_record(None);

        let slot = self.ledger.get_slot().await?;
        let (create_ix, table) = instructions::create_table(&payer, slot);
        let fees = self.estimate_plan(&plan, create_ix.clone(), &table).await;
        if let Err(shortfall) = self
            .ensure_funds(plan.total_lamports(), fees.total(), "for full flow")
            .await
        {
            self.shared.transition(LifecycleState::Idle);
            return Err(SplitError::InsufficientFunds(shortfall));
        }

        let mut signatures = Vec::new();

        self.shared.transition(LifecycleState::Creating);
        let step = SplitPlan::create_step();
        let title = step.title.clone();
        let Some(signature) = self
            .submit(step, &[create_ix], &[], ConfirmationDepth::Confirmed)
            .await?
        else {
            return Ok(self.declined(title));
        };
        signatures.push(signature);
        self.shared.set_record(Some(AltRecord::new(table, payer)));
        info!(target: "lifecycle", address = %table, "ALT 已创建");

        self.shared.transition(LifecycleState::Extending);
        for index in 0..plan.extend_chunks.len() {
            let Some(extend_ix) = plan.extend_instruction(&table, index) else {
                continue;
            };
            let step = plan.extend_step(index);
            let fee = self
                .estimator
                .estimate(&payer, std::slice::from_ref(&extend_ix), &[])
                .await;
            self.ensure_funds_or_abort(0, fee.lamports, &step.title).await?;
            let title = step.title.clone();
            let Some(signature) = self
                .submit(step, &[extend_ix], &[], ConfirmationDepth::Confirmed)
                .await?
            else {
                return Ok(self.declined(title));
            };
            signatures.push(signature);
        }

        self.shared.transition(LifecycleState::Ready);
        let lookups = match self.ledger.get_lookup_table(&table).await {
            Ok(Some(state)) => vec![state.account],
            Ok(None) => {
                warn!(target: "lifecycle", address = %table, "未能读取 ALT，转账将不使用地址查找表");
                Vec::new()
            }
            Err(err) => {
                let err = SplitError::from(err);
                self.abort("load ALT", &err.to_string());
                return Err(err);
            }
        };

        let mut transfer_fees = 0u64;
        for index in 0..plan.transfer_chunks.len() {
            let ixs = plan.transfer_instructions(index);
            let fee = self.estimator.estimate(&payer, &ixs, &lookups).await;
            transfer_fees = transfer_fees.saturating_add(fee.lamports);
        }
        let deactivate_ix = instructions::deactivate_table(&table, &payer);
        let deactivate_fee = self
            .estimator
            .estimate(&payer, std::slice::from_ref(&deactivate_ix), &lookups)
            .await;
        self.ensure_funds_or_abort(
            plan.total_lamports(),
            transfer_fees.saturating_add(deactivate_fee.lamports),
            "for transfer + deactivate",
        )
        .await?;

        self.shared.transition(LifecycleState::Transferring);
        for index in 0..plan.transfer_chunks.len() {
            let ixs = plan.transfer_instructions(index);
            if ixs.is_empty() {
                continue;
            }
            let step = plan.transfer_step(index);
            let title = step.title.clone();
            let Some(signature) = self
                .submit(step, &ixs, &lookups, ConfirmationDepth::Finalized)
                .await?
            else {
                return Ok(self.declined(title));
            };
            signatures.push(signature);
        }

        self.shared.transition(LifecycleState::Deactivating);
        let step = SplitPlan::deactivate_step();
        let title = step.title.clone();
        let Some(signature) = self
            .submit(step, &[deactivate_ix], &[], ConfirmationDepth::Finalized)
            .await?
        else {
            return Ok(self.declined(title));
        };
        signatures.push(signature);

        let deactivation_slot = match self.ledger.get_lookup_table(&table).await {
            Ok(Some(state)) => state.deactivation_slot,
            Ok(None) => None,
            Err(err) => {
                warn!(target: "lifecycle", error = %err, "读取停用槽位失败，冷却按完整周期计算");
                None
            }
        };
        self.shared
            .update_record(|record| record.deactivation_slot = deactivation_slot);
        self.shared.transition(LifecycleState::CoolingDown);
        let record = self
            .shared
            .record()
            .unwrap_or_else(|| AltRecord::new(table, payer));
        match self.store.save(&record) {
            Ok(()) => events::alt_persisted(&record.address, deactivation_slot),
            Err(err) => warn!(target: "lifecycle", error = %err, "持久化 ALT 记录失败"),
        }

        let updates = self.monitor_alt(record.clone());
        Ok(SplitOutcome::Completed {
            record,
            signatures,
            updates,
        })
    }

    /// 启动（或重启）冷却监控，返回新的状态流。
    pub fn monitor_alt(&self, mut record: AltRecord) -> CooldownStream {
        if !record.state.has_pending_table() {
            record.state = LifecycleState::CoolingDown;
        }
        self.shared.set_record(Some(record.clone()));
        self.shared.transition(record.state);
        let context = MonitorContext {
            ledger: self.ledger.clone(),
            store: self.store.clone(),
            shared: self.shared.clone(),
            cooldown_slots: self.settings.cooldown_slots,
            poll_interval: self.settings.poll_interval,
        };
        let (monitor, updates) = CooldownMonitor::spawn(context, record);
        // 旧监控在 drop 时取消
        self.monitor.lock().replace(monitor);
        updates
    }

    pub async fn close_alt(&self) -> SplitResult<CloseOutcome> {
        let Ok(_flow) = self.flow.try_lock() else {
            return Err(self.invalid_state("close_alt"));
        };
        if self.state() != LifecycleState::Closable {
            return Err(self.invalid_state("close_alt"));
        }
        let Some(record) = self.shared.record() else {
            return Err(self.invalid_state("close_alt"));
        };

        self.stop_monitor().await;
        let close_ix = instructions::close_table(&record.address, &record.wallet);
        let step = SplitPlan::close_step();
        let title = step.title.clone();
        self.shared.emit(LifecycleEvent::StepPending(step.clone()));
        let outcome = self
            .submitter
            .submit_step(step, &[close_ix], &[], ConfirmationDepth::Finalized)
            .await;

        match outcome {
            Ok(SubmitOutcome::Confirmed(signature)) => {
                self.shared.emit(LifecycleEvent::StepConfirmed {
                    title,
                    signature,
                });
                self.store.clear()?;
                self.shared.set_record(None);
                self.shared.transition(LifecycleState::Closed);
                events::alt_closed(&record.address, &signature);
                self.shared.emit(LifecycleEvent::Closed {
                    address: record.address,
                    signature,
                });
                self.shared.transition(LifecycleState::Idle);
                Ok(CloseOutcome::Closed { signature })
            }
            Ok(SubmitOutcome::Declined) => {
                events::step_declined(&title, Some(&record.address));
                self.shared.emit(LifecycleEvent::Declined { step: title });
                self.monitor_alt(record);
                Ok(CloseOutcome::Declined)
            }
            Err(err) => {
                warn!(
                    target: "lifecycle",
                    address = %record.address,
                    error = %err,
                    "关闭 ALT 失败，可稍后重试"
                );
                self.monitor_alt(record);
                Err(SplitError::Submission {
                    step: title,
                    message: err.to_string(),
                })
            }
        }
    }

    pub async fn shutdown(&self) {
        self.stop_monitor().await;
    }

    async fn stop_monitor(&self) {
        let monitor = self.monitor.lock().take();
        if let Some(monitor) = monitor {
            monitor.stop().await;
        }
    }

    async fn estimate_plan(&self, plan: &SplitPlan, create_ix: Instruction, table: &Pubkey) -> FeePreflight {
        let payer = plan.payer;
        let mut preflight = FeePreflight {
            create: self.estimator.estimate(&payer, &[create_ix], &[]).await.lamports,
            ..FeePreflight::default()
        };
        for index in 0..plan.extend_chunks.len() {
            if let Some(ix) = plan.extend_instruction(table, index) {
                let fee = self.estimator.estimate(&payer, &[ix], &[]).await;
                preflight.extend = preflight.extend.saturating_add(fee.lamports);
            }
        }
        for index in 0..plan.transfer_chunks.len() {
            let ixs = plan.transfer_instructions(index);
            let fee = self.estimator.estimate(&payer, &ixs, &[]).await;
            preflight.transfer = preflight.transfer.saturating_add(fee.lamports);
        }
        let deactivate_ix = instructions::deactivate_table(table, &payer);
        preflight.deactivate = self.estimator.estimate(&payer, &[deactivate_ix], &[]).await.lamports;
        preflight
    }

    async fn ensure_funds(&self, amount: u64, fees: u64, context: &str) -> Result<(), Shortfall> {
        match self.guard.check(&self.payer(), amount, fees, context).await {
            BalanceVerdict::Sufficient { .. } => Ok(()),
            BalanceVerdict::Unchecked => {
                self.shared.emit(LifecycleEvent::PreflightSkipped {
                    context: context.to_string(),
                });
                Ok(())
            }
            BalanceVerdict::Insufficient(shortfall) => {
                self.shared
                    .emit(LifecycleEvent::PreflightShortfall(shortfall.clone()));
                Err(shortfall)
            }
        }
    }

    /// 流程中途余额不足时中止，已创建的 ALT 作为孤立账户报告。
    async fn ensure_funds_or_abort(&self, amount: u64, fees: u64, context: &str) -> SplitResult<()> {
        match self.ensure_funds(amount, fees, context).await {
            Ok(()) => Ok(()),
            Err(shortfall) => {
                self.abort(context, &shortfall.to_string());
                Err(SplitError::InsufficientFunds(shortfall))
            }
        }
    }

    /// 返回 `Ok(None)` 表示用户拒绝签名，拒绝相关的事件与状态已处理。
    async fn submit(
        &self,
        step: PendingStep,
        instructions: &[Instruction],
        lookups: &[AddressLookupTableAccount],
        depth: ConfirmationDepth,
    ) -> SplitResult<Option<Signature>> {
        let title = step.title.clone();
        self.shared.emit(LifecycleEvent::StepPending(step.clone()));
        match self
            .submitter
            .submit_step(step, instructions, lookups, depth)
            .await
        {
            Ok(SubmitOutcome::Confirmed(signature)) => {
                self.shared.emit(LifecycleEvent::StepConfirmed { title, signature });
                Ok(Some(signature))
            }
            Ok(SubmitOutcome::Declined) => {
                let orphaned = self.shared.record().map(|record| record.address);
                events::step_declined(&title, orphaned.as_ref());
                self.shared.emit(LifecycleEvent::Declined { step: title });
                // 拒绝签名不是错误：回到空闲，已创建的 ALT 由 `SplitOutcome::Declined` 报告
                self.shared.transition(LifecycleState::Idle);
                Ok(None)
            }
            Err(err) => {
                let message = err.to_string();
                self.abort(&title, &message);
                Err(SplitError::Submission {
                    step: title,
                    message,
                })
            }
        }
    }

    fn declined(&self, step: String) -> SplitOutcome {
        SplitOutcome::Declined {
            step,
            orphaned_table: self.shared.record().map(|record| record.address),
        }
    }

    fn abort(&self, step: &str, message: &str) {
        let orphaned = self.shared.record().map(|record| record.address);
        events::flow_aborted(step, message, orphaned.as_ref());
        self.shared.emit(LifecycleEvent::Aborted {
            step: step.to_string(),
            message: message.to_string(),
            orphaned_table: orphaned,
        });
        self.shared.transition(LifecycleState::Aborted);
    }

    fn invalid_state(&self, action: &'static str) -> SplitError {
        SplitError::InvalidState {
            state: self.state(),
            action,
        }
    }
}
