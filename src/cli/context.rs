use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use time::{UtcOffset, macros::format_description};
use tracing::warn;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

use crate::cli::args::{InitCmd, RecipientArgs};
use crate::config::{ConfigError, SolsplitConfig, load_config, load_keypair, write_template};
use crate::ledger::{LedgerClient, RpcLedger};
use crate::lifecycle::AltLifecycleManager;
use crate::split::{
    AutoFillOutcome, ImportMode, SplitMode, SplitRequest, auto_fill_percentages, merge_recipients,
    parse_addresses, parse_percentages, parse_sol_amount,
};
use crate::store::{AltRecordStore, FilePersistence};
use crate::wallet::{KeypairAuthority, PromptingAuthority, SigningAuthority};

/// 初始化 tracing，兼顾 JSON 与文本输出模式。
pub fn init_tracing(config: &crate::config::LoggingConfig) -> Result<()> {
    let mut filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    const QUIET_TARGETS: &[(&str, &str)] = &[
        ("hyper", "warn"),
        ("hyper_util::client::legacy", "warn"),
        ("reqwest", "info"),
        ("solana_client", "warn"),
    ];
    for (module, level) in QUIET_TARGETS {
        if !config.level.contains(module) {
            if let Ok(directive) = format!("{module}={level}").parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    let time_format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");
    let offset = UtcOffset::from_hms(config.timezone_offset_hours, 0, 0).map_err(|err| {
        anyhow!(
            "invalid logging timezone offset {}: {err}",
            config.timezone_offset_hours
        )
    })?;
    let offset_timer = OffsetTime::new(offset, time_format);

    let base = fmt()
        .with_timer(offset_timer)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(true)
        .with_level(true);

    if config.json {
        base.json()
            .with_current_span(false)
            .with_span_list(false)
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    } else {
        base.with_env_filter(filter)
            .event_format(fmt::format().compact())
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    }
    Ok(())
}

/// 加载主配置；用于 `solsplit --config` 的入口。
pub fn load_configuration(path: Option<PathBuf>) -> Result<SolsplitConfig, ConfigError> {
    load_config(path)
}

pub fn init_configs(args: InitCmd) -> Result<PathBuf> {
    let target = args
        .output
        .unwrap_or_else(|| PathBuf::from("."))
        .join("solsplit.toml");
    write_template(&target, args.force)?;
    Ok(target)
}

pub fn resolve_rpc_client(config: &SolsplitConfig) -> Result<Arc<RpcClient>> {
    let raw = config.global.rpc_url.trim();
    let url = Url::parse(raw).map_err(|err| anyhow!("RPC 地址无效 {raw}: {err}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("RPC 地址必须为 http(s): {raw}"));
    }
    Ok(Arc::new(RpcClient::new_with_commitment(
        raw.to_string(),
        config.global.commitment_config(),
    )))
}

pub fn resolve_keypair(config: &SolsplitConfig) -> Result<Arc<Keypair>> {
    load_keypair(&config.global.wallet)?
        .map(Arc::new)
        .ok_or_else(|| {
            anyhow!(
                "未配置签名私钥，请设置 global.wallet.private_key 或环境变量 {}",
                crate::config::PRIVATE_KEY_ENV
            )
        })
}

/// 组装生命周期管理器；`confirm_each` 为真时每笔交易签名前都会在终端确认。
pub fn build_manager(
    config: &SolsplitConfig,
    keypair: Arc<Keypair>,
    confirm_each: bool,
) -> Result<AltLifecycleManager> {
    let rpc = resolve_rpc_client(config)?;
    let ledger: Arc<dyn LedgerClient> =
        Arc::new(RpcLedger::new(rpc).with_confirm_poll(config.lifecycle.confirm_poll()));
    let signer = KeypairAuthority::new(keypair, ledger.clone());
    let authority: Arc<dyn SigningAuthority> = if confirm_each {
        Arc::new(PromptingAuthority::new(signer))
    } else {
        Arc::new(signer)
    };
    let store = AltRecordStore::new(Arc::new(FilePersistence::new(
        config.lifecycle.storage_path.clone(),
    )));
    Ok(AltLifecycleManager::new(
        ledger,
        authority,
        store,
        config.lifecycle.settings(),
    ))
}

/// 汇总 `--to` 与导入文件中的收款地址，保持输入顺序并去重。
pub fn collect_recipients(args: &RecipientArgs) -> Result<Vec<Pubkey>> {
    let mut explicit = Vec::with_capacity(args.to.len());
    for raw in &args.to {
        let key = Pubkey::from_str(raw.trim()).map_err(|err| anyhow!("收款地址无效 {raw}: {err}"))?;
        explicit.push(key);
    }

    let Some(path) = args.recipients_file.as_ref() else {
        return Ok(merge_recipients(&explicit, &[], ImportMode::Append));
    };
    let contents = fs::read_to_string(path)
        .map_err(|err| anyhow!("读取收款地址文件失败 {}: {err}", path.display()))?;
    let imported = parse_addresses(&contents);
    if imported.invalid > 0 || imported.duplicates > 0 {
        warn!(
            target: "cli",
            invalid = imported.invalid,
            duplicates = imported.duplicates,
            "导入时跳过了部分条目"
        );
    }
    Ok(merge_recipients(&explicit, &imported.valid, ImportMode::Append))
}

/// 未指定百分比时平均分配；含 `-` 或空白的条目先自动补齐。
pub fn resolve_mode(percent: &[String], recipients: usize) -> Result<SplitMode> {
    if percent.is_empty() {
        return Ok(SplitMode::Equal);
    }
    if percent.len() != recipients {
        return Err(anyhow!(
            "百分比数量 {} 与收款人数量 {recipients} 不一致",
            percent.len()
        ));
    }
    let mut parsed = parse_percentages(percent);
    if let AutoFillOutcome::Filled(filled) = auto_fill_percentages(&parsed)? {
        for (idx, value) in filled {
            parsed[idx] = value.parse::<f64>().ok();
        }
    }
    let values = parsed
        .into_iter()
        .enumerate()
        .map(|(idx, value)| value.ok_or_else(|| anyhow!("第 {} 个百分比无效", idx + 1)))
        .collect::<Result<Vec<_>>>()?;
    Ok(SplitMode::Custom(values))
}

pub fn build_request(payer: Pubkey, args: &RecipientArgs) -> Result<SplitRequest> {
    let total_lamports = parse_sol_amount(&args.amount)?;
    let recipients = collect_recipients(args)?;
    let mode = resolve_mode(&args.percent, recipients.len())?;
    Ok(SplitRequest {
        payer,
        total_lamports,
        recipients,
        mode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(to: Vec<String>, percent: Vec<&str>) -> RecipientArgs {
        RecipientArgs {
            amount: "1".to_string(),
            to,
            recipients_file: None,
            percent: percent.into_iter().map(str::to_string).collect(),
        }
    }

    #[test]
    fn blank_percentages_are_filled_before_splitting() {
        let mode = resolve_mode(&["50".into(), "-".into(), "-".into()], 3).unwrap();
        assert_eq!(mode, SplitMode::Custom(vec![50.0, 25.0, 25.0]));
        assert_eq!(resolve_mode(&[], 3).unwrap(), SplitMode::Equal);
        assert!(resolve_mode(&["50".into()], 2).is_err());
        assert!(resolve_mode(&["80".into(), "30".into(), "-".into()], 3).is_err());
    }

    #[test]
    fn recipients_merge_explicit_and_file_entries() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.csv");
        fs::write(&path, format!("{a},{b}\nnot-an-address\n{b}\n")).unwrap();

        let mut recipient_args = args(vec![a.to_string()], vec![]);
        recipient_args.recipients_file = Some(path);
        assert_eq!(collect_recipients(&recipient_args).unwrap(), vec![a, b]);

        let request = build_request(Pubkey::new_unique(), &recipient_args).unwrap();
        assert_eq!(request.total_lamports, 1_000_000_000);
        assert_eq!(request.mode, SplitMode::Equal);
    }

    #[tokio::test]
    async fn rejects_bad_rpc_url() {
        let mut config = SolsplitConfig::default();
        config.global.rpc_url = "ftp://example.com".to_string();
        assert!(resolve_rpc_client(&config).is_err());
        config.global.rpc_url = "http://127.0.0.1:8899".to_string();
        assert!(resolve_rpc_client(&config).is_ok());
    }
}
