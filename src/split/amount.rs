use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use solana_sdk::native_token::LAMPORTS_PER_SOL;

use super::ValidationError;

/// 将 SOL 数量（十进制字符串）转换为 lamports。
pub fn parse_sol_amount(raw: &str) -> Result<u64, ValidationError> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|err| ValidationError::InvalidAmount(format!("{raw}: {err}")))?;
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount);
    }
    let scaled = amount
        .checked_mul(Decimal::from(LAMPORTS_PER_SOL))
        .ok_or_else(|| ValidationError::InvalidAmount("金额超出可表示范围".to_string()))?;
    if !scaled.fract().is_zero() {
        return Err(ValidationError::InvalidAmount(
            "金额最多支持 9 位小数".to_string(),
        ));
    }
    scaled
        .to_u64()
        .ok_or_else(|| ValidationError::InvalidAmount("金额超过 u64 最大值".to_string()))
}

/// 以 9 位小数展示 lamports 对应的 SOL 数量。
pub fn fmt_sol(lamports: u64) -> String {
    format!(
        "{}.{:09}",
        lamports / LAMPORTS_PER_SOL,
        lamports % LAMPORTS_PER_SOL
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_sol() {
        assert_eq!(parse_sol_amount("1"), Ok(1_000_000_000));
        assert_eq!(parse_sol_amount(" 0.000000001 "), Ok(1));
        assert_eq!(parse_sol_amount("2.5"), Ok(2_500_000_000));
    }

    #[test]
    fn rejects_bad_amounts() {
        assert_eq!(parse_sol_amount("0"), Err(ValidationError::NonPositiveAmount));
        assert_eq!(parse_sol_amount("-1"), Err(ValidationError::NonPositiveAmount));
        assert!(matches!(
            parse_sol_amount("0.0000000001"),
            Err(ValidationError::InvalidAmount(_))
        ));
        assert!(matches!(
            parse_sol_amount("abc"),
            Err(ValidationError::InvalidAmount(_))
        ));
    }

    #[test]
    fn formats_with_nine_decimals() {
        assert_eq!(fmt_sol(1_500_000_000), "1.500000000");
        assert_eq!(fmt_sol(5_000), "0.000005000");
    }
}
