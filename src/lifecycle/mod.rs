//! ALT 生命周期：创建、扩展、转账、停用、冷却、关闭，以及重启后的恢复。

mod events;
mod manager;
mod monitor;
mod plan;
mod state;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

pub use events::LifecycleEvent;
pub use manager::{
    AltLifecycleManager, CloseOutcome, FeePreflight, LifecycleSettings, Rehydration, SplitOutcome,
};
pub use monitor::{
    CooldownEvent, CooldownMonitor, CooldownStatus, CooldownStream, DEFAULT_COOLDOWN_SLOTS,
    cooldown_remaining,
};
pub use plan::SplitPlan;
pub use state::{AltRecord, LifecycleState};

use crate::monitoring::events as monitor_events;

/// 管理器与冷却监控任务共享的状态。
pub(crate) struct SharedState {
    state: watch::Sender<LifecycleState>,
    record: Mutex<Option<AltRecord>>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
}

impl SharedState {
    pub(crate) fn new(events: mpsc::UnboundedSender<LifecycleEvent>) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            state,
            record: Mutex::new(None),
            events,
        }
    }

    pub(crate) fn current(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub(crate) fn transition(&self, to: LifecycleState) {
        let from = self.state.send_replace(to);
        if let Some(record) = self.record.lock().as_mut() {
            record.state = to;
        }
        if from != to {
            monitor_events::state_changed(from, to);
            self.emit(LifecycleEvent::StateChanged { from, to });
        }
    }

    /// 仅当仍处于冷却相关状态时才切换，避免覆盖关闭或重置后的状态。
    pub(crate) fn transition_if_pending(&self, to: LifecycleState) -> bool {
        if !self.current().has_pending_table() {
            return false;
        }
        self.transition(to);
        true
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        let _ = self.events.send(event);
    }

    pub(crate) fn record(&self) -> Option<AltRecord> {
        self.record.lock().clone()
    }

    pub(crate) fn set_record(&self, record: Option<AltRecord>) {
        *self.record.lock() = record;
    }

    pub(crate) fn update_record(&self, apply: impl FnOnce(&mut AltRecord)) {
        if let Some(record) = self.record.lock().as_mut() {
            apply(record);
        }
    }
}
