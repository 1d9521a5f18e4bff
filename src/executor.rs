//! Wager execution seam
//!
//! The engine never talks to the betting site directly. It hands the final
//! (outcome, stake) pair to a [`WagerExecutor`]; a failed or unreachable
//! executor is logged and leaves account state untouched.

use crate::error::Result;
use crate::types::Outcome;
use async_trait::async_trait;
use rust_decimal::Decimal;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WagerExecutor: Send + Sync {
    /// Place a wager on `outcome`. `Ok(false)` means the site rejected it.
    async fn place_wager(&self, outcome: Outcome, stake: Decimal) -> Result<bool>;
}

/// Executor that only logs, for demo mode and dry runs
#[derive(Debug, Clone, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl WagerExecutor for DryRunExecutor {
    async fn place_wager(&self, outcome: Outcome, stake: Decimal) -> Result<bool> {
        tracing::info!("dry-run wager: {} on {}", stake, outcome);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_dry_run_always_accepts() {
        let executor = DryRunExecutor;
        assert!(executor
            .place_wager(Outcome::High, dec!(20000))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_mock_executor_rejects() {
        let mut mock = MockWagerExecutor::new();
        mock.expect_place_wager()
            .times(1)
            .returning(|_, _| Ok(false));
        assert!(!mock.place_wager(Outcome::Low, dec!(20000)).await.unwrap());
    }
}
