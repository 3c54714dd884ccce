use std::fs;

use anyhow::{Result, anyhow};
use solana_sdk::signer::Signer;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::cli::args::{
    AutofillCmd, CloseCmd, Cli, Command, ImportCmd, MonitorCmd, RecipientArgs, SplitCmd,
};
use crate::cli::context::{build_manager, build_request, init_configs, resolve_keypair};
use crate::config::SolsplitConfig;
use crate::lifecycle::{
    AltLifecycleManager, CloseOutcome, CooldownEvent, CooldownStream, LifecycleEvent,
    LifecycleState, Rehydration, SplitOutcome,
};
use crate::split::{
    AutoFillOutcome, ImportMode, SplitMode, auto_fill_percentages, equal_preview, fmt_sol,
    merge_recipients, parse_addresses, parse_percentages,
};

pub async fn run(cli: Cli, config: SolsplitConfig) -> Result<()> {
    if config.prometheus.enable {
        let addr = crate::monitoring::try_init_prometheus(&config.prometheus.listen)?;
        info!(target: "cli", listen = %addr, "Prometheus 导出器已启动");
    }

    match cli.command {
        Command::Split(args) => handle_split(&config, args).await,
        Command::Estimate(args) => handle_estimate(&config, &args).await,
        Command::Monitor(args) => handle_monitor(&config, args).await,
        Command::Close(args) => handle_close(&config, args).await,
        Command::Autofill(args) => handle_autofill(args),
        Command::Import(args) => handle_import(args),
        Command::Init(args) => {
            let path = init_configs(args)?;
            println!("已生成配置模版：{}", path.display());
            Ok(())
        }
    }
}

async fn handle_split(config: &SolsplitConfig, args: SplitCmd) -> Result<()> {
    let keypair = resolve_keypair(config)?;
    let manager = build_manager(config, keypair.clone(), !args.yes)?;
    spawn_event_printer(&manager);

    let rehydration = manager.rehydrate(Some(keypair.pubkey())).await?;
    if let Some(notice) = rehydration.stale_notice() {
        println!("{notice}");
    }
    if let Rehydration::Resumed { record, .. } = rehydration {
        manager.shutdown().await;
        return Err(anyhow!(
            "存在尚未关闭的 ALT {}（{}），请先执行 `solsplit monitor --close` 或 `solsplit close`",
            record.address,
            record.state
        ));
    }

    let request = build_request(keypair.pubkey(), &args.recipients)?;
    print_request_summary(&request.mode, request.total_lamports, request.recipients.len());
    let fees = manager.estimate_total_fees(&request).await?;
    println!(
        "预估手续费 {} SOL（创建 {} / 扩展 {} / 转账 {} / 停用 {}）",
        fmt_sol(fees.total()),
        fmt_sol(fees.create),
        fmt_sol(fees.extend),
        fmt_sol(fees.transfer),
        fmt_sol(fees.deactivate),
    );

    match manager.run_split(&request).await? {
        SplitOutcome::Completed {
            record,
            signatures,
            updates,
        } => {
            println!(
                "✅ 已向 {} 个收款人发送 {} SOL，共 {} 笔交易",
                request.recipients.len(),
                fmt_sol(request.total_lamports),
                signatures.len()
            );
            println!("ALT {} 已停用，冷却结束后可关闭回收租金", record.address);
            if args.no_monitor {
                manager.shutdown().await;
                return Ok(());
            }
            follow_cooldown(&manager, updates, args.close).await
        }
        SplitOutcome::Declined {
            step,
            orphaned_table,
        } => {
            println!("已取消：{step}");
            if let Some(table) = orphaned_table {
                println!("⚠️ 临时 ALT {table} 已创建但未停用，需要手动处理");
            }
            Ok(())
        }
    }
}

async fn handle_estimate(config: &SolsplitConfig, args: &RecipientArgs) -> Result<()> {
    let keypair = resolve_keypair(config)?;
    let manager = build_manager(config, keypair.clone(), false)?;
    let request = build_request(keypair.pubkey(), args)?;
    print_request_summary(&request.mode, request.total_lamports, request.recipients.len());
    let fees = manager.estimate_total_fees(&request).await?;
    println!("创建 ALT    {} SOL", fmt_sol(fees.create));
    println!("扩展 ALT    {} SOL", fmt_sol(fees.extend));
    println!("批量转账    {} SOL", fmt_sol(fees.transfer));
    println!("停用 ALT    {} SOL", fmt_sol(fees.deactivate));
    println!("合计        {} SOL", fmt_sol(fees.total()));
    println!(
        "需要余额    {} SOL",
        fmt_sol(request.total_lamports.saturating_add(fees.total()))
    );
    Ok(())
}

async fn handle_monitor(config: &SolsplitConfig, args: MonitorCmd) -> Result<()> {
    let keypair = resolve_keypair(config)?;
    let manager = build_manager(config, keypair.clone(), !args.yes)?;
    spawn_event_printer(&manager);
    match manager.rehydrate(Some(keypair.pubkey())).await? {
        Rehydration::Resumed { record, updates } => {
            println!("已恢复 ALT {}（{}）", record.address, record.state);
            follow_cooldown(&manager, updates, args.close).await
        }
        other => {
            report_rehydration(&other);
            Ok(())
        }
    }
}

async fn handle_close(config: &SolsplitConfig, args: CloseCmd) -> Result<()> {
    let keypair = resolve_keypair(config)?;
    let manager = build_manager(config, keypair.clone(), !args.yes)?;
    spawn_event_printer(&manager);
    let rehydration = manager.rehydrate(Some(keypair.pubkey())).await?;
    let Rehydration::Resumed { record, mut updates } = rehydration else {
        report_rehydration(&rehydration);
        return Ok(());
    };

    if manager.state() != LifecycleState::Closable {
        if let Some(CooldownEvent::Status(status)) = updates.next().await {
            if !status.closable {
                manager.shutdown().await;
                return Err(anyhow!(
                    "ALT {} 仍在冷却中，剩余 {} 个槽位",
                    record.address,
                    status.remaining
                ));
            }
        }
    }
    close_table(&manager).await
}

/// 跟踪冷却进度直到可关闭、ALT 消失或收到 Ctrl-C。
async fn follow_cooldown(
    manager: &AltLifecycleManager,
    mut updates: CooldownStream,
    close_when_ready: bool,
) -> Result<()> {
    let mut last_remaining = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("已停止跟踪，可稍后执行 `solsplit monitor` 继续");
                manager.shutdown().await;
                return Ok(());
            }
            event = updates.next() => match event {
                Some(CooldownEvent::Status(status)) => {
                    if last_remaining != Some(status.remaining) {
                        println!("冷却剩余 {} 个槽位（当前槽位 {}）", status.remaining, status.current_slot);
                        last_remaining = Some(status.remaining);
                    }
                    if status.closable {
                        break;
                    }
                }
                Some(CooldownEvent::Unavailable { message }) => {
                    warn!(target: "cli", error = %message, "冷却状态暂不可用");
                }
                Some(CooldownEvent::TableMissing { address }) => {
                    println!("ALT {address} 已不存在，记录已清除");
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    if close_when_ready {
        close_table(manager).await
    } else {
        println!("ALT 已可关闭，执行 `solsplit close` 回收租金");
        manager.shutdown().await;
        Ok(())
    }
}

async fn close_table(manager: &AltLifecycleManager) -> Result<()> {
    let outcome = manager.close_alt().await;
    manager.shutdown().await;
    match outcome? {
        CloseOutcome::Closed { signature } => {
            println!("✅ ALT 已关闭，租金已退回（{signature}）");
        }
        CloseOutcome::Declined => println!("已取消关闭，ALT 仍可稍后关闭"),
    }
    Ok(())
}

fn handle_autofill(args: AutofillCmd) -> Result<()> {
    let mut entries = parse_percentages(&args.values);
    match auto_fill_percentages(&entries)? {
        AutoFillOutcome::NothingToFill => println!("没有需要补齐的条目"),
        AutoFillOutcome::Filled(filled) => {
            for (idx, value) in &filled {
                entries[*idx] = value.parse::<f64>().ok();
            }
            for (idx, value) in entries.iter().enumerate() {
                let rendered = value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
                println!("#{:<3} {rendered}%", idx + 1);
            }
        }
    }
    Ok(())
}

fn handle_import(args: ImportCmd) -> Result<()> {
    let raw = fs::read_to_string(&args.file)
        .map_err(|err| anyhow!("读取导入文件失败 {}: {err}", args.file.display()))?;
    let imported = parse_addresses(&raw);

    let existing = match args.existing.as_ref() {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .map_err(|err| anyhow!("读取现有列表失败 {}: {err}", path.display()))?;
            parse_addresses(&raw).valid
        }
        None => Vec::new(),
    };
    let mode = if args.replace {
        ImportMode::Replace
    } else {
        ImportMode::Append
    };
    let merged = merge_recipients(&existing, &imported.valid, mode);
    for key in &merged {
        println!("{key}");
    }
    eprintln!(
        "导入 {} 个地址，跳过 {} 个无效条目、{} 个重复地址，合并后共 {} 个",
        imported.valid.len(),
        imported.invalid,
        imported.duplicates,
        merged.len()
    );
    Ok(())
}

fn print_request_summary(mode: &SplitMode, total_lamports: u64, recipients: usize) {
    match mode {
        SplitMode::Equal => {
            let preview = equal_preview(total_lamports, recipients);
            println!(
                "平均分配 {} SOL 给 {recipients} 个收款人：每人 {} SOL，前 {} 人各多 1 lamport",
                fmt_sol(total_lamports),
                fmt_sol(preview.per_recipient),
                preview.remainder
            );
        }
        SplitMode::Custom(_) => {
            println!(
                "按百分比分配 {} SOL 给 {recipients} 个收款人",
                fmt_sol(total_lamports)
            );
        }
    }
}

fn report_rehydration(rehydration: &Rehydration) {
    if let Some(notice) = rehydration.stale_notice() {
        println!("{notice}");
        return;
    }
    match rehydration {
        Rehydration::NothingPending => println!("没有待处理的 ALT"),
        Rehydration::Disconnected => println!("未连接钱包"),
        _ => {}
    }
}

fn spawn_event_printer(manager: &AltLifecycleManager) {
    let Some(mut events) = manager.take_events() else {
        return;
    };
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                LifecycleEvent::StepPending(step) => {
                    let description = step.description.unwrap_or_default();
                    println!("⏳ {} {description}", step.title);
                }
                LifecycleEvent::StepConfirmed { title, signature } => {
                    println!("✔ {title}: {signature}");
                }
                LifecycleEvent::PreflightShortfall(shortfall) => {
                    println!("❌ 余额不足 {shortfall}");
                }
                LifecycleEvent::Aborted {
                    step,
                    message,
                    orphaned_table,
                } => {
                    println!("❌ {step} 失败: {message}");
                    if let Some(table) = orphaned_table {
                        println!("⚠️ 临时 ALT {table} 未停用，需要手动处理");
                    }
                }
                LifecycleEvent::Closed { address, .. } => {
                    println!("ALT {address} 已关闭");
                }
                _ => {}
            }
        }
    });
}
