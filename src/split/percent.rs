use std::cmp::Ordering;

use super::{PERCENT_TOLERANCE, ValidationError};

/// 最大余数法：先取下整，再按小数部分从大到小补齐余数。
///
/// 按实际百分比之和归一化，容差内不足或超出 100 的部分不会集中到某几个收款人身上，
/// 余数始终小于收款人数。
pub(crate) fn custom_shares(total: u64, percentages: &[f64]) -> Result<Vec<u64>, ValidationError> {
    let sum = validate_percentages(percentages)?;

    let reals: Vec<f64> = percentages
        .iter()
        .map(|pct| total as f64 * pct / sum)
        .collect();
    let mut shares: Vec<u64> = reals.iter().map(|real| real.floor() as u64).collect();

    // 稳定排序，小数部分相同的保持输入顺序
    let mut order: Vec<usize> = (0..reals.len()).collect();
    order.sort_by(|a, b| {
        let fa = reals[*a] - reals[*a].floor();
        let fb = reals[*b] - reals[*b].floor();
        fb.partial_cmp(&fa).unwrap_or(Ordering::Equal)
    });

    let floor_sum: u128 = shares.iter().map(|v| u128::from(*v)).sum();
    let total_wide = u128::from(total);

    if floor_sum <= total_wide {
        let remainder = (total_wide - floor_sum) as u64;
        let n = order.len() as u64;
        let full_rounds = remainder / n;
        let partial = (remainder % n) as usize;
        for (rank, idx) in order.iter().enumerate() {
            shares[*idx] += full_rounds + u64::from(rank < partial);
        }
    } else {
        // 百分比总和略超 100 时从小数部分最小者回收
        let mut excess = (floor_sum - total_wide) as u64;
        while excess > 0 {
            for idx in order.iter().rev() {
                if excess == 0 {
                    break;
                }
                if shares[*idx] > 0 {
                    shares[*idx] -= 1;
                    excess -= 1;
                }
            }
        }
    }

    Ok(shares)
}

/// 返回百分比之和。
fn validate_percentages(percentages: &[f64]) -> Result<f64, ValidationError> {
    for (index, value) in percentages.iter().enumerate() {
        if !value.is_finite() {
            return Err(ValidationError::PercentageNotFinite { index });
        }
        if !(0.0..=100.0).contains(value) {
            return Err(ValidationError::PercentageOutOfRange {
                index,
                value: *value,
            });
        }
    }
    let total: f64 = percentages.iter().sum();
    if (total - 100.0).abs() >= PERCENT_TOLERANCE {
        return Err(ValidationError::PercentageSum { total });
    }
    Ok(total)
}

/// 将用户输入解析为百分比；空白或无法解析的输入视为未填写。
pub fn parse_percentages<S: AsRef<str>>(inputs: &[S]) -> Vec<Option<f64>> {
    inputs
        .iter()
        .map(|raw| {
            raw.as_ref()
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoFillOutcome {
    NothingToFill,
    /// `(下标, 两位小数的百分比字符串)`，只包含原本空白的条目。
    Filled(Vec<(usize, String)>),
}

/// 把 `100 - 已填写之和` 以百分之一为单位平均分给空白条目，多出的部分给靠前的空白。
pub fn auto_fill_percentages(entries: &[Option<f64>]) -> Result<AutoFillOutcome, ValidationError> {
    let blanks: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, value)| value.is_none())
        .map(|(idx, _)| idx)
        .collect();
    if blanks.is_empty() {
        return Ok(AutoFillOutcome::NothingToFill);
    }

    let fixed: f64 = entries.iter().flatten().sum();
    let remaining = 100.0 - fixed;
    if remaining < 0.0 {
        return Err(ValidationError::PercentagesExceedHundred { fixed });
    }

    let cents = (remaining * 100.0).round() as u64;
    let count = blanks.len() as u64;
    let base = cents / count;
    let extra = cents - base * count;

    let filled = blanks
        .into_iter()
        .enumerate()
        .map(|(rank, idx)| {
            let share = base + u64::from((rank as u64) < extra);
            (idx, format!("{}.{:02}", share / 100, share % 100))
        })
        .collect();
    Ok(AutoFillOutcome::Filled(filled))
}
