use std::sync::Arc;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ledger::LedgerClient;
use crate::monitoring::events;
use crate::store::AltRecordStore;

use super::{AltRecord, LifecycleState, SharedState};

/// 停用后需要等待的槽位数，期间 ALT 不可关闭。
pub const DEFAULT_COOLDOWN_SLOTS: u64 = 512;

/// 剩余冷却槽位；未知停用槽位时按完整冷却期计算。
pub fn cooldown_remaining(cooldown_slots: u64, deactivation_slot: Option<u64>, current_slot: u64) -> u64 {
    match deactivation_slot {
        None | Some(0) => cooldown_slots,
        Some(deactivated) => cooldown_slots.saturating_sub(current_slot.saturating_sub(deactivated)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownStatus {
    pub address: Pubkey,
    pub remaining: u64,
    pub closable: bool,
    pub deactivation_slot: Option<u64>,
    pub current_slot: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CooldownEvent {
    Status(CooldownStatus),
    /// 本轮查询失败，下一轮重试。
    Unavailable { message: String },
    /// ALT 已不存在（被外部关闭），监控结束。
    TableMissing { address: Pubkey },
}

pub type CooldownStream = UnboundedReceiverStream<CooldownEvent>;

pub(crate) struct MonitorContext {
    pub ledger: Arc<dyn LedgerClient>,
    pub store: AltRecordStore,
    pub shared: Arc<SharedState>,
    pub cooldown_slots: u64,
    pub poll_interval: Duration,
}

/// 冷却轮询任务句柄，drop 时自动取消。
pub struct CooldownMonitor {
    address: Pubkey,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl CooldownMonitor {
    pub(crate) fn spawn(context: MonitorContext, record: AltRecord) -> (Self, CooldownStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let address = record.address;
        let token = cancel.clone();
        let handle = tokio::spawn(run_monitor(context, record, tx, token));
        info!(target: "lifecycle::monitor", address = %address, "冷却监控已启动");
        (
            Self {
                address,
                cancel,
                handle: Some(handle),
            },
            UnboundedReceiverStream::new(rx),
        )
    }

    pub fn address(&self) -> Pubkey {
        self.address
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// 取消并等待任务退出。
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        debug!(target: "lifecycle::monitor", address = %self.address, "冷却监控已停止");
    }
}

impl Drop for CooldownMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_monitor(
    context: MonitorContext,
    mut record: AltRecord,
    tx: mpsc::UnboundedSender<CooldownEvent>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(context.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match poll_once(&context, &mut record).await {
            Ok(Some(status)) => {
                let _ = tx.send(CooldownEvent::Status(status));
            }
            Ok(None) => {
                let _ = tx.send(CooldownEvent::TableMissing {
                    address: record.address,
                });
                break;
            }
            Err(message) => {
                warn!(
                    target: "lifecycle::monitor",
                    address = %record.address,
                    error = %message,
                    "冷却状态查询失败，等待下一轮"
                );
                let _ = tx.send(CooldownEvent::Unavailable { message });
            }
        }
    }
}

/// 返回 `Ok(None)` 表示 ALT 已不存在。
async fn poll_once(context: &MonitorContext, record: &mut AltRecord) -> Result<Option<CooldownStatus>, String> {
    let current_slot = context.ledger.get_slot().await.map_err(|err| err.to_string())?;
    let table = context
        .ledger
        .get_lookup_table(&record.address)
        .await
        .map_err(|err| err.to_string())?;

    let Some(table) = table else {
        info!(
            target: "lifecycle::monitor",
            address = %record.address,
            "ALT 已不存在，清除记录"
        );
        if let Err(err) = context.store.clear() {
            warn!(target: "lifecycle::monitor", error = %err, "清除 ALT 记录失败");
        }
        if context.shared.current().has_pending_table() {
            context.shared.set_record(None);
            context.shared.transition(LifecycleState::Idle);
        }
        return Ok(None);
    };

    if let Some(slot) = table.deactivation_slot {
        record.deactivation_slot = Some(slot);
    }
    let remaining = cooldown_remaining(context.cooldown_slots, record.deactivation_slot, current_slot);
    let closable = remaining == 0;
    record.state = if closable {
        LifecycleState::Closable
    } else {
        LifecycleState::CoolingDown
    };

    if let Err(err) = context.store.save(record) {
        warn!(target: "lifecycle::monitor", error = %err, "刷新 ALT 记录失败");
    }
    let deactivation_slot = record.deactivation_slot;
    let state = record.state;
    context
        .shared
        .update_record(|shared| shared.deactivation_slot = deactivation_slot);
    context.shared.transition_if_pending(state);
    events::cooldown_status(&record.address, remaining, closable);

    Ok(Some(CooldownStatus {
        address: record.address,
        remaining,
        closable,
        deactivation_slot,
        current_slot,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LookupTableState;
    use crate::testing::MockLedger;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio_stream::StreamExt;

    #[test]
    fn remaining_slots_follow_cooldown() {
        assert_eq!(cooldown_remaining(512, Some(1_000), 1_500), 12);
        assert_eq!(cooldown_remaining(512, Some(1_000), 1_512), 0);
        assert_eq!(cooldown_remaining(512, Some(1_000), 9_999), 0);
        assert_eq!(cooldown_remaining(512, None, 1_500), 512);
        assert_eq!(cooldown_remaining(512, Some(0), 1_500), 512);
        assert_eq!(cooldown_remaining(512, Some(2_000), 1_500), 512);
    }

    fn context(ledger: Arc<MockLedger>, store: AltRecordStore, shared: Arc<SharedState>) -> MonitorContext {
        MonitorContext {
            ledger,
            store,
            shared,
            cooldown_slots: 512,
            poll_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn reports_closable_once_cooldown_elapses() {
        let ledger = Arc::new(MockLedger::new(1_500, 0));
        let address = Pubkey::new_unique();
        let mut table = LookupTableState::active(address, vec![]);
        table.deactivation_slot = Some(1_000);
        ledger.insert_table(table);

        let (events_tx, _events_rx) = unbounded_channel();
        let shared = Arc::new(SharedState::new(events_tx));
        let mut record = AltRecord::new(address, Pubkey::new_unique());
        record.state = LifecycleState::CoolingDown;
        shared.set_record(Some(record.clone()));
        shared.transition(LifecycleState::CoolingDown);
        let store = AltRecordStore::in_memory();

        let (monitor, mut stream) =
            CooldownMonitor::spawn(context(ledger.clone(), store.clone(), shared.clone()), record);

        let Some(CooldownEvent::Status(first)) = stream.next().await else {
            panic!("expected status event");
        };
        assert_eq!(first.remaining, 12);
        assert!(!first.closable);
        assert_eq!(store.load().unwrap().deactivation_slot, Some(1_000));

        ledger.update(|state| state.slot = 1_512);
        loop {
            match stream.next().await {
                Some(CooldownEvent::Status(status)) if status.closable => {
                    assert_eq!(status.remaining, 0);
                    break;
                }
                Some(_) => continue,
                None => panic!("stream ended early"),
            }
        }
        assert_eq!(shared.current(), LifecycleState::Closable);
        assert!(monitor.is_running());
        monitor.stop().await;
    }

    #[tokio::test]
    async fn missing_table_resets_to_idle() {
        let ledger = Arc::new(MockLedger::new(1_500, 0));
        let address = Pubkey::new_unique();
        let (events_tx, _events_rx) = unbounded_channel();
        let shared = Arc::new(SharedState::new(events_tx));
        let mut record = AltRecord::new(address, Pubkey::new_unique());
        record.deactivation_slot = Some(1_000);
        shared.set_record(Some(record.clone()));
        shared.transition(LifecycleState::CoolingDown);
        let store = AltRecordStore::in_memory();
        store.save(&record).unwrap();

        let (_monitor, mut stream) =
            CooldownMonitor::spawn(context(ledger, store.clone(), shared.clone()), record);

        assert_eq!(
            stream.next().await,
            Some(CooldownEvent::TableMissing { address })
        );
        assert_eq!(stream.next().await, None);
        assert_eq!(shared.current(), LifecycleState::Idle);
        assert!(shared.record().is_none());
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn dropping_the_handle_cancels_polling() {
        let ledger = Arc::new(MockLedger::new(1_500, 0));
        let address = Pubkey::new_unique();
        ledger.insert_table(LookupTableState::active(address, vec![]));
        let (events_tx, _events_rx) = unbounded_channel();
        let shared = Arc::new(SharedState::new(events_tx));
        let record = AltRecord::new(address, Pubkey::new_unique());

        let (monitor, mut stream) =
            CooldownMonitor::spawn(context(ledger, AltRecordStore::in_memory(), shared), record);
        assert!(matches!(stream.next().await, Some(CooldownEvent::Status(_))));
        drop(monitor);

        while stream.next().await.is_some() {}
    }
}
