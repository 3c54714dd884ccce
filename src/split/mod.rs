//! 拆分计算：把一笔总额精确拆给多个收款人，保证零舍入损失。

use std::collections::HashSet;

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;
use tracing::debug;

pub mod amount;
pub mod import;
pub mod percent;

pub use amount::{fmt_sol, parse_sol_amount};
pub use import::{ImportMode, ImportedAddresses, merge_recipients, parse_addresses};
pub use percent::{AutoFillOutcome, auto_fill_percentages, parse_percentages};

/// 百分比总和允许的误差。
pub const PERCENT_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("金额必须大于 0")]
    NonPositiveAmount,
    #[error("金额格式非法: {0}")]
    InvalidAmount(String),
    #[error("至少需要一个收款地址")]
    NoRecipients,
    #[error("收款地址非法: {0}")]
    InvalidAddress(String),
    #[error("收款地址重复: {0}")]
    DuplicateRecipient(Pubkey),
    #[error("不能向自己的地址转账")]
    SelfTransfer,
    #[error("请求中的付款方 {request} 与当前钱包 {wallet} 不一致")]
    PayerMismatch { request: Pubkey, wallet: Pubkey },
    #[error("金额 {total} lamports 不足以拆分给 {recipients} 个收款人")]
    AmountTooSmall { total: u64, recipients: usize },
    #[error("百分比数量 {actual} 与收款人数量 {expected} 不一致")]
    PercentageCount { expected: usize, actual: usize },
    #[error("第 {index} 个收款人的百分比缺失或非法")]
    PercentageNotFinite { index: usize },
    #[error("第 {index} 个收款人的百分比 {value} 超出 [0, 100]")]
    PercentageOutOfRange { index: usize, value: f64 },
    #[error("百分比总和必须为 100，当前为 {total}")]
    PercentageSum { total: f64 },
    #[error("手动填写的百分比之和 {fixed} 已超过 100")]
    PercentagesExceedHundred { fixed: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SplitMode {
    Equal,
    /// 每个收款人一个百分比，按输入顺序与 `recipients` 对齐。
    Custom(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitRequest {
    pub payer: Pubkey,
    pub total_lamports: u64,
    pub recipients: Vec<Pubkey>,
    pub mode: SplitMode,
}

impl SplitRequest {
    pub fn equal(payer: Pubkey, total_lamports: u64, recipients: Vec<Pubkey>) -> Self {
        Self {
            payer,
            total_lamports,
            recipients,
            mode: SplitMode::Equal,
        }
    }

    pub fn custom(
        payer: Pubkey,
        total_lamports: u64,
        recipients: Vec<Pubkey>,
        percentages: Vec<f64>,
    ) -> Self {
        Self {
            payer,
            total_lamports,
            recipients,
            mode: SplitMode::Custom(percentages),
        }
    }

    /// 校验金额、收款人集合（非空、无重复、不含付款方）。
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.total_lamports == 0 {
            return Err(ValidationError::NonPositiveAmount);
        }
        if self.recipients.is_empty() {
            return Err(ValidationError::NoRecipients);
        }
        let mut seen = HashSet::with_capacity(self.recipients.len());
        for recipient in &self.recipients {
            if *recipient == self.payer {
                return Err(ValidationError::SelfTransfer);
            }
            if !seen.insert(*recipient) {
                return Err(ValidationError::DuplicateRecipient(*recipient));
            }
        }
        Ok(())
    }
}

/// 收款人 → lamports 的有序分配结果，总和恒等于请求总额。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    entries: Vec<(Pubkey, u64)>,
}

impl Allocation {
    pub fn entries(&self) -> &[(Pubkey, u64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, lamports)| *lamports).sum()
    }

    pub fn lamports(&self) -> Vec<u64> {
        self.entries.iter().map(|(_, lamports)| *lamports).collect()
    }

    pub fn get(&self, recipient: &Pubkey) -> Option<u64> {
        self.entries
            .iter()
            .find(|(key, _)| key == recipient)
            .map(|(_, lamports)| *lamports)
    }

    /// 需要真正发出转账指令的条目（金额为 0 的收款人被跳过）。
    pub fn payable(&self) -> impl Iterator<Item = &(Pubkey, u64)> {
        self.entries.iter().filter(|(_, lamports)| *lamports > 0)
    }
}

/// 平均拆分时的预览：每人基础金额与余数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EqualPreview {
    pub per_recipient: u64,
    pub remainder: u64,
}

pub fn equal_preview(total_lamports: u64, recipients: usize) -> EqualPreview {
    if recipients == 0 {
        return EqualPreview {
            per_recipient: 0,
            remainder: 0,
        };
    }
    let n = recipients as u64;
    let per_recipient = total_lamports / n;
    EqualPreview {
        per_recipient,
        remainder: total_lamports - per_recipient * n,
    }
}

pub fn compute_split(request: &SplitRequest) -> Result<Allocation, ValidationError> {
    request.validate()?;

    let shares = match &request.mode {
        SplitMode::Equal => equal_shares(request.total_lamports, request.recipients.len())?,
        SplitMode::Custom(percentages) => {
            if percentages.len() != request.recipients.len() {
                return Err(ValidationError::PercentageCount {
                    expected: request.recipients.len(),
                    actual: percentages.len(),
                });
            }
            percent::custom_shares(request.total_lamports, percentages)?
        }
    };

    debug!(
        target: "split",
        total = request.total_lamports,
        recipients = request.recipients.len(),
        custom = matches!(request.mode, SplitMode::Custom(_)),
        "拆分计算完成"
    );

    Ok(Allocation {
        entries: request.recipients.iter().copied().zip(shares).collect(),
    })
}

/// 前 `total mod n` 个收款人各多拿 1 lamport。
fn equal_shares(total: u64, recipients: usize) -> Result<Vec<u64>, ValidationError> {
    let EqualPreview {
        per_recipient,
        remainder,
    } = equal_preview(total, recipients);
    if per_recipient == 0 {
        return Err(ValidationError::AmountTooSmall { total, recipients });
    }
    Ok((0..recipients as u64)
        .map(|idx| per_recipient + u64::from(idx < remainder))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<Pubkey> {
        (0..n).map(|_| Pubkey::new_unique()).collect()
    }

    #[test]
    fn equal_split_gives_remainder_to_first_recipients() {
        let payer = Pubkey::new_unique();
        let request = SplitRequest::equal(payer, 1_000_000_000, keys(3));
        let allocation = compute_split(&request).expect("split");
        assert_eq!(
            allocation.lamports(),
            vec![333_333_334, 333_333_333, 333_333_333]
        );
        assert_eq!(allocation.total(), 1_000_000_000);
    }

    #[test]
    fn equal_split_spread_is_at_most_one() {
        let payer = Pubkey::new_unique();
        for (total, n) in [(7u64, 3usize), (100, 7), (1_000_003, 10), (55, 55)] {
            let allocation =
                compute_split(&SplitRequest::equal(payer, total, keys(n))).expect("split");
            let values = allocation.lamports();
            let max = values.iter().max().copied().unwrap_or_default();
            let min = values.iter().min().copied().unwrap_or_default();
            assert_eq!(allocation.total(), total);
            assert!(max - min <= 1);
            let bumped = values.iter().filter(|v| **v == min + 1).count() as u64;
            if max != min {
                assert_eq!(bumped, total % n as u64);
                assert!(values[..bumped as usize].iter().all(|v| *v == max));
            }
        }
    }

    #[test]
    fn equal_split_rejects_dust() {
        let payer = Pubkey::new_unique();
        let err = compute_split(&SplitRequest::equal(payer, 2, keys(3))).unwrap_err();
        assert_eq!(
            err,
            ValidationError::AmountTooSmall {
                total: 2,
                recipients: 3
            }
        );
    }

    #[test]
    fn request_validation_rejects_bad_recipient_sets() {
        let payer = Pubkey::new_unique();
        let other = Pubkey::new_unique();

        let zero = SplitRequest::equal(payer, 0, vec![other]);
        assert_eq!(zero.validate(), Err(ValidationError::NonPositiveAmount));

        let empty = SplitRequest::equal(payer, 10, vec![]);
        assert_eq!(empty.validate(), Err(ValidationError::NoRecipients));

        let own = SplitRequest::equal(payer, 10, vec![other, payer]);
        assert_eq!(own.validate(), Err(ValidationError::SelfTransfer));

        let dup = SplitRequest::equal(payer, 10, vec![other, other]);
        assert_eq!(dup.validate(), Err(ValidationError::DuplicateRecipient(other)));
    }

    #[test]
    fn custom_split_matches_exact_percentages() {
        let payer = Pubkey::new_unique();
        let request =
            SplitRequest::custom(payer, 10_000_000_000, keys(3), vec![50.0, 30.0, 20.0]);
        let allocation = compute_split(&request).expect("split");
        assert_eq!(
            allocation.lamports(),
            vec![5_000_000_000, 3_000_000_000, 2_000_000_000]
        );
    }

    #[test]
    fn custom_split_requires_one_percentage_per_recipient() {
        let payer = Pubkey::new_unique();
        let request = SplitRequest::custom(payer, 100, keys(3), vec![50.0, 50.0]);
        assert_eq!(
            compute_split(&request),
            Err(ValidationError::PercentageCount {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn preview_reports_base_and_remainder() {
        assert_eq!(
            equal_preview(10, 3),
            EqualPreview {
                per_recipient: 3,
                remainder: 1
            }
        );
        assert_eq!(equal_preview(10, 0).per_recipient, 0);
    }

    #[test]
    fn payable_skips_zero_allocations() {
        let payer = Pubkey::new_unique();
        let recipients = keys(3);
        let request = SplitRequest::custom(payer, 1_000, recipients.clone(), vec![60.0, 40.0, 0.0]);
        let allocation = compute_split(&request).expect("split");
        let payable: Vec<_> = allocation.payable().map(|(key, _)| *key).collect();
        assert_eq!(payable, recipients[..2].to_vec());
        assert_eq!(allocation.get(&recipients[2]), Some(0));
    }
}
