use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "solsplit", version, about = "借助临时 ALT 的 SOL 批量分账工具")]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 solsplit.toml 或 config/solsplit.toml）"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 执行一次完整的分账流程
    Split(SplitCmd),
    /// 预估完整流程的手续费，不提交任何交易
    Estimate(RecipientArgs),
    /// 恢复并跟踪上一次分账留下的 ALT 冷却进度
    Monitor(MonitorCmd),
    /// 关闭冷却完成的 ALT 并回收租金
    Close(CloseCmd),
    /// 为未填写的收款人平均补齐百分比
    Autofill(AutofillCmd),
    /// 从文本文件中提取收款地址
    Import(ImportCmd),
    /// 初始化配置模版文件
    Init(InitCmd),
}

#[derive(Args, Debug, Clone)]
pub struct RecipientArgs {
    #[arg(long, help = "分账总额（SOL，最多 9 位小数）")]
    pub amount: String,
    #[arg(long = "to", value_name = "ADDRESS", help = "收款地址，可重复指定")]
    pub to: Vec<String>,
    #[arg(long, value_name = "FILE", help = "从文本文件导入收款地址，追加到 --to 之后")]
    pub recipients_file: Option<PathBuf>,
    #[arg(
        long = "percent",
        value_name = "PCT",
        help = "按收款人顺序指定百分比；填写 `-` 的条目自动补齐，不指定则平均分配"
    )]
    pub percent: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SplitCmd {
    #[command(flatten)]
    pub recipients: RecipientArgs,
    #[arg(long, short = 'y', help = "跳过逐笔签名确认")]
    pub yes: bool,
    #[arg(long, help = "完成后不等待冷却期")]
    pub no_monitor: bool,
    #[arg(long, help = "冷却完成后自动关闭 ALT")]
    pub close: bool,
}

#[derive(Args, Debug)]
pub struct MonitorCmd {
    #[arg(long, help = "冷却完成后自动关闭 ALT")]
    pub close: bool,
    #[arg(long, short = 'y', help = "跳过签名确认")]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct CloseCmd {
    #[arg(long, short = 'y', help = "跳过签名确认")]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct AutofillCmd {
    #[arg(
        value_name = "PCT",
        allow_hyphen_values = true,
        help = "按顺序填写的百分比，`-` 表示待补齐"
    )]
    pub values: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ImportCmd {
    #[arg(long, value_name = "FILE", help = "待导入的文本文件")]
    pub file: PathBuf,
    #[arg(long, value_name = "FILE", help = "现有收款列表文件，导入结果将合并到其后")]
    pub existing: Option<PathBuf>,
    #[arg(long, help = "替换现有列表而非追加")]
    pub replace: bool,
}

#[derive(Args, Debug)]
pub struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    pub output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_split_with_percentages() {
        let cli = Cli::try_parse_from([
            "solsplit", "split", "--amount", "1.5", "--to", "A", "--to", "B", "--percent", "60",
            "--percent", "-", "-y",
        ])
        .unwrap();
        let Command::Split(cmd) = cli.command else {
            panic!("expected split");
        };
        assert_eq!(cmd.recipients.to, vec!["A", "B"]);
        assert_eq!(cmd.recipients.percent, vec!["60", "-"]);
        assert!(cmd.yes);
        assert!(!cmd.close);
    }

    #[test]
    fn autofill_accepts_blank_markers() {
        let cli = Cli::try_parse_from(["solsplit", "autofill", "50", "-", "-"]).unwrap();
        let Command::Autofill(cmd) = cli.command else {
            panic!("expected autofill");
        };
        assert_eq!(cmd.values, vec!["50", "-", "-"]);
    }
}
