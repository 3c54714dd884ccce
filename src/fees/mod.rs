//! 手续费预估与余额守卫，二者共同构成每个上链步骤之前的预检。

mod estimator;
mod guard;

pub use estimator::{FALLBACK_FEE_LAMPORTS, FeeEstimate, FeeEstimator, FeeSource};
pub use guard::{BalanceGuard, BalanceVerdict, Shortfall};
