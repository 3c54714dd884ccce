use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tracing::{debug, info, warn};

use crate::fees::Shortfall;
use crate::ledger::ConfirmationDepth;
use crate::lifecycle::LifecycleState;

use super::metrics::prometheus_enabled;
use metrics::{counter, histogram};

pub fn split_planned(recipients: usize, total_lamports: u64, extend_chunks: usize, transfer_chunks: usize) {
    info!(
        target: "monitoring::split",
        event = "planned",
        recipients,
        total_lamports,
        extend_chunks,
        transfer_chunks,
        "分账计划已生成"
    );

    if prometheus_enabled() {
        histogram!("solsplit_split_recipients").record(recipients as f64);
    }
}

pub fn state_changed(from: LifecycleState, to: LifecycleState) {
    debug!(
        target: "monitoring::lifecycle",
        event = "state_changed",
        from = %from,
        to = %to,
        "生命周期状态切换"
    );
}

pub fn preflight_shortfall(shortfall: &Shortfall) {
    warn!(
        target: "monitoring::preflight",
        event = "shortfall",
        context = %shortfall.context,
        required = shortfall.required(),
        available = shortfall.available,
        missing = shortfall.missing(),
        "余额不足: {shortfall}"
    );

    if prometheus_enabled() {
        counter!("solsplit_preflight_shortfall_total").increment(1);
    }
}

pub fn preflight_skipped(context: &str, reason: &str) {
    warn!(
        target: "monitoring::preflight",
        event = "skipped",
        context,
        reason,
        "手续费预检失败，跳过预检继续执行"
    );
}

pub fn step_pending(title: &str) {
    debug!(target: "monitoring::submit", event = "pending", title, "等待签名");
}

pub fn step_confirmed(title: &str, signature: &Signature, depth: ConfirmationDepth) {
    info!(
        target: "monitoring::submit",
        event = "confirmed",
        title,
        signature = %signature,
        depth = depth.as_str(),
        "交易已确认"
    );

    if prometheus_enabled() {
        counter!("solsplit_step_confirmed_total", "depth" => depth.as_str()).increment(1);
    }
}

pub fn step_declined(title: &str, orphaned_table: Option<&Pubkey>) {
    info!(
        target: "monitoring::submit",
        event = "declined",
        title,
        orphaned_table = orphaned_table.map(|pk| pk.to_string()),
        "用户拒绝签名，流程结束"
    );

    if prometheus_enabled() {
        counter!("solsplit_flow_declined_total").increment(1);
    }
}

pub fn flow_aborted(step: &str, message: &str, orphaned_table: Option<&Pubkey>) {
    warn!(
        target: "monitoring::lifecycle",
        event = "aborted",
        step,
        error = message,
        orphaned_table = orphaned_table.map(|pk| pk.to_string()),
        "流程中止，已确认的步骤不会回滚"
    );

    if prometheus_enabled() {
        counter!("solsplit_flow_aborted_total", "step" => step.to_string()).increment(1);
    }
}

pub fn alt_persisted(address: &Pubkey, deactivation_slot: Option<u64>) {
    info!(
        target: "monitoring::lifecycle",
        event = "persisted",
        address = %address,
        deactivation_slot,
        "ALT 记录已持久化"
    );
}

pub fn stale_record_cleared(address: &Pubkey, owner: Option<&Pubkey>) {
    info!(
        target: "monitoring::lifecycle",
        event = "stale_cleared",
        address = %address,
        owner = owner.map(|pk| pk.to_string()),
        "已清除属于其他钱包的 ALT 记录"
    );
}

pub fn cooldown_status(address: &Pubkey, remaining: u64, closable: bool) {
    debug!(
        target: "monitoring::cooldown",
        event = "status",
        address = %address,
        remaining,
        closable,
        "冷却状态"
    );
}

pub fn alt_closed(address: &Pubkey, signature: &Signature) {
    info!(
        target: "monitoring::lifecycle",
        event = "closed",
        address = %address,
        signature = %signature,
        "ALT 已关闭，租金已退回"
    );

    if prometheus_enabled() {
        counter!("solsplit_alt_closed_total").increment(1);
    }
}
