use std::fmt;
use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::ledger::LedgerClient;
use crate::monitoring::events;
use crate::split::fmt_sol;

/// 余额缺口明细，所有数值单位为 lamports。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub context: String,
    pub amount: u64,
    pub fees: u64,
    pub available: u64,
}

impl Shortfall {
    pub fn required(&self) -> u64 {
        self.amount.saturating_add(self.fees)
    }

    pub fn missing(&self) -> u64 {
        self.required().saturating_sub(self.available)
    }
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: 需要 {} SOL（金额 {} + 手续费 {}），可用 {} SOL，缺少 {} SOL",
            self.context,
            fmt_sol(self.required()),
            fmt_sol(self.amount),
            fmt_sol(self.fees),
            fmt_sol(self.available),
            fmt_sol(self.missing()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceVerdict {
    Sufficient { available: u64 },
    /// 余额查询失败，按放行处理（提交时链上仍会校验余额）。
    Unchecked,
    Insufficient(Shortfall),
}

impl BalanceVerdict {
    pub fn is_sufficient(&self) -> bool {
        !matches!(self, Self::Insufficient(_))
    }
}

#[derive(Clone)]
pub struct BalanceGuard {
    ledger: Arc<dyn LedgerClient>,
}

impl BalanceGuard {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    pub async fn check(&self, payer: &Pubkey, amount: u64, fees: u64, context: &str) -> BalanceVerdict {
        let available = match self.ledger.get_balance(payer).await {
            Ok(balance) => balance,
            Err(err) => {
                events::preflight_skipped(context, &err.to_string());
                return BalanceVerdict::Unchecked;
            }
        };

        let shortfall = Shortfall {
            context: context.to_string(),
            amount,
            fees,
            available,
        };
        if available < shortfall.required() {
            events::preflight_shortfall(&shortfall);
            return BalanceVerdict::Insufficient(shortfall);
        }

        debug!(
            target: "fees",
            context,
            amount,
            fees,
            available,
            "余额预检通过"
        );
        BalanceVerdict::Sufficient { available }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLedger;

    #[tokio::test]
    async fn reports_exact_shortfall() {
        let ledger = Arc::new(MockLedger::new(1_000, 10_000));
        let guard = BalanceGuard::new(ledger);
        let payer = Pubkey::new_unique();

        let verdict = guard.check(&payer, 9_000, 2_500, "for full flow").await;
        match verdict {
            BalanceVerdict::Insufficient(shortfall) => {
                assert_eq!(shortfall.required(), 11_500);
                assert_eq!(shortfall.missing(), 1_500);
                assert!(shortfall.to_string().contains("0.000001500"));
            }
            other => panic!("unexpected verdict {other:?}"),
        }

        let verdict = guard.check(&payer, 5_000, 5_000, "exact").await;
        assert_eq!(verdict, BalanceVerdict::Sufficient { available: 10_000 });
    }

    #[tokio::test]
    async fn fails_open_when_balance_unavailable() {
        let ledger = Arc::new(MockLedger::new(1_000, 0));
        ledger.update(|state| state.fail_balance = true);
        let guard = BalanceGuard::new(ledger);
        let verdict = guard.check(&Pubkey::new_unique(), 1, 1, "ctx").await;
        assert_eq!(verdict, BalanceVerdict::Unchecked);
        assert!(verdict.is_sufficient());
    }
}
