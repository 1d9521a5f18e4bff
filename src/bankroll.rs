//! Bankroll management: stake sizing and circuit breakers
//!
//! State machine over [`AccountState`]:
//! Disabled -> Armed -> Wagering -> (StopLoss | TakeProfit) -> Disabled.
//! `enabled` is the only field that flips off automatically; turning it back
//! on is an operator action on the account file.

use crate::config::{DifficultPeriodConfig, StakePolicy, WageringConfig};
use crate::error::Result;
use crate::store::write_json;
use crate::types::DrawId;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankrollPhase {
    Disabled,
    Armed,
    Wagering,
}

/// Breaker that fired on a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerEvent {
    StopLoss,
    TakeProfit,
}

impl std::fmt::Display for BreakerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerEvent::StopLoss => write!(f, "stop-loss"),
            BreakerEvent::TakeProfit => write!(f, "take-profit"),
        }
    }
}

/// Persisted wagering state. Missing fields are back-filled with defaults on
/// read, so hand-edited or older account files stay loadable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountState {
    pub enabled: bool,
    pub demo_mode: bool,
    pub policy: StakePolicy,
    pub base_stake: Decimal,
    pub max_stake: Decimal,
    /// Site balance, refreshed by the operator or executor
    pub account_balance: Decimal,
    /// Session profit and loss
    pub current_balance: Decimal,
    pub consecutive_losses: u32,
    pub last_stake: Decimal,
    pub max_multiplier: u32,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub reset_after_sl: bool,
    pub reset_after_tp: bool,
    pub disabled_reason: Option<String>,
    pub disabled_at: Option<DateTime<Utc>>,
}

impl Default for AccountState {
    fn default() -> Self {
        let config = WageringConfig::default();
        Self {
            enabled: false,
            demo_mode: true,
            policy: config.policy,
            base_stake: config.base_stake,
            max_stake: config.max_stake,
            account_balance: dec!(1000000),
            current_balance: Decimal::ZERO,
            consecutive_losses: 0,
            last_stake: Decimal::ZERO,
            max_multiplier: config.max_multiplier,
            stop_loss: config.stop_loss,
            take_profit: config.take_profit,
            reset_after_sl: config.reset_after_sl,
            reset_after_tp: config.reset_after_tp,
            disabled_reason: None,
            disabled_at: None,
        }
    }
}

impl AccountState {
    pub fn from_config(config: &WageringConfig) -> Self {
        Self {
            policy: config.policy,
            base_stake: config.base_stake,
            max_stake: config.max_stake,
            max_multiplier: config.max_multiplier,
            stop_loss: config.stop_loss,
            take_profit: config.take_profit,
            reset_after_sl: config.reset_after_sl,
            reset_after_tp: config.reset_after_tp,
            ..Self::default()
        }
    }
}

/// JSON-backed account store, created with defaults when absent
pub struct AccountStore {
    path: PathBuf,
}

impl AccountStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load_or_create(&self, config: &WageringConfig) -> Result<AccountState> {
        if self.path.exists() {
            let raw = tokio::fs::read_to_string(&self.path).await?;
            match serde_json::from_str::<AccountState>(&raw) {
                Ok(state) => return Ok(state),
                Err(e) => {
                    tracing::warn!("account file unreadable ({}), recreating defaults", e);
                }
            }
        }
        let state = AccountState::from_config(config);
        self.save(&state).await?;
        Ok(state)
    }

    pub async fn save(&self, state: &AccountState) -> Result<()> {
        write_json(&self.path, state).await
    }
}

pub struct BankrollController {
    config: WageringConfig,
    difficult: DifficultPeriodConfig,
    store: AccountStore,
    state: AccountState,
}

impl BankrollController {
    pub async fn open(
        config: WageringConfig,
        difficult: DifficultPeriodConfig,
        store: AccountStore,
    ) -> Result<Self> {
        let state = store.load_or_create(&config).await?;
        Ok(Self {
            config,
            difficult,
            store,
            state,
        })
    }

    pub fn state(&self) -> &AccountState {
        &self.state
    }

    pub fn phase(&self, has_credentials: bool) -> BankrollPhase {
        if !self.state.enabled {
            BankrollPhase::Disabled
        } else if self.state.demo_mode || has_credentials {
            BankrollPhase::Armed
        } else {
            BankrollPhase::Disabled
        }
    }

    /// Check arming preconditions, self-disabling when they cannot be met
    pub async fn arm(&mut self, has_credentials: bool) -> Result<bool> {
        if !self.state.enabled {
            return Ok(false);
        }
        if self.state.demo_mode || has_credentials {
            return Ok(true);
        }
        self.disable("wagering enabled without credentials or demo mode")
            .await?;
        Ok(false)
    }

    pub async fn disable(&mut self, reason: &str) -> Result<()> {
        if !self.state.enabled {
            return Ok(());
        }
        tracing::warn!("disabling wagering: {}", reason);
        self.state.enabled = false;
        self.state.disabled_reason = Some(reason.to_string());
        self.state.disabled_at = Some(Utc::now());
        self.store.save(&self.state).await
    }

    /// Size the next stake. Zero means no wager this cycle.
    ///
    /// `win_probability` feeds the Kelly policy; `difficult` damps the
    /// result during low-accuracy periods.
    pub fn stake(&self, confidence: f64, win_probability: f64, difficult: bool) -> Decimal {
        let raw = match self.state.policy {
            StakePolicy::Fixed => self.state.base_stake,
            StakePolicy::ConfidenceScaled => self.confidence_stake(confidence),
            StakePolicy::Martingale => self.martingale_stake(),
            StakePolicy::KellyFraction => self.kelly_stake(win_probability),
        };
        if raw <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        if difficult && self.difficult.enabled {
            let damp = Decimal::from_f64(self.difficult.stake_multiplier).unwrap_or(Decimal::ONE);
            return (raw * damp).floor();
        }
        raw
    }

    fn confidence_stake(&self, confidence: f64) -> Decimal {
        let span = self.state.max_stake - self.state.base_stake;
        let scaled = Decimal::from_f64(confidence.clamp(0.0, 1.0)).unwrap_or_default() * span;
        (self.state.base_stake + scaled)
            .floor()
            .min(self.state.max_stake)
    }

    fn martingale_stake(&self) -> Decimal {
        let losses = self.state.consecutive_losses;
        if losses == 0 || losses >= self.state.max_multiplier {
            // at or beyond the multiplier cap the ladder restarts
            self.state.base_stake
        } else {
            self.state.base_stake * Decimal::from(1u64 << losses)
        }
    }

    /// Kelly fraction of the account balance. Never positive at or below
    /// break-even probability.
    fn kelly_stake(&self, win_probability: f64) -> Decimal {
        let kelly = &self.config.kelly;
        let full = (kelly.odds * win_probability - 1.0) / (kelly.odds - 1.0);
        let fraction = (full * kelly.fraction).clamp(0.0, kelly.max_risk);
        if fraction <= 0.0 {
            return Decimal::ZERO;
        }

        let stake = self.state.account_balance * Decimal::from_f64(fraction).unwrap_or_default();
        if stake <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let rounded = (stake / kelly.granularity).ceil() * kelly.granularity;
        rounded.max(kelly.min_stake)
    }

    /// Skip wagering outright while recent accuracy is under the floor
    pub fn should_skip(&self, recent_accuracy: f64, samples: usize) -> bool {
        self.difficult.enabled
            && samples >= self.difficult.min_samples
            && recent_accuracy < self.difficult.min_accuracy_to_bet
    }

    /// Apply a resolved wager. The account is persisted on both paths before
    /// the breakers run, so a crash between the two never loses the result.
    pub async fn record_resolution(&mut self, won: bool, stake: Decimal) -> Result<Option<BreakerEvent>> {
        if won {
            self.state.current_balance += stake;
            self.state.consecutive_losses = 0;
        } else {
            self.state.current_balance -= stake;
            self.state.consecutive_losses += 1;
        }
        self.state.last_stake = stake;
        self.store.save(&self.state).await?;

        tracing::info!(
            "wager {}: stake {} balance {} losses {}",
            if won { "won" } else { "lost" },
            stake,
            self.state.current_balance,
            self.state.consecutive_losses
        );

        self.check_breakers().await
    }

    /// Stop-loss first, then take-profit
    async fn check_breakers(&mut self) -> Result<Option<BreakerEvent>> {
        if !self.state.enabled {
            return Ok(None);
        }

        if self.state.current_balance <= self.state.stop_loss {
            let reason = format!("stop-loss reached at {}", self.state.current_balance);
            self.disable(&reason).await?;
            if self.state.reset_after_sl {
                self.state.current_balance = Decimal::ZERO;
                self.state.consecutive_losses = 0;
                self.store.save(&self.state).await?;
            }
            return Ok(Some(BreakerEvent::StopLoss));
        }

        if self.state.current_balance >= self.state.take_profit {
            let reason = format!("take-profit reached at {}", self.state.current_balance);
            self.disable(&reason).await?;
            if self.state.reset_after_tp {
                self.state.current_balance = Decimal::ZERO;
                self.state.consecutive_losses = 0;
                self.store.save(&self.state).await?;
            }
            return Ok(Some(BreakerEvent::TakeProfit));
        }

        Ok(None)
    }

    /// Reset stale session state when the draw sequence jumped.
    ///
    /// A Martingale ladder must not resume across downtime; a gap beyond the
    /// configured distance (or a day rollover) starts a fresh session.
    pub async fn check_session_gap(&mut self, last_logged: &DrawId, current: &DrawId) -> Result<bool> {
        let gap = last_logged.distance(current);
        let stale = match gap {
            Some(distance) => distance > self.config.max_draw_gap,
            None => true,
        };
        if !stale {
            return Ok(false);
        }

        tracing::warn!(
            "draw gap {} -> {} exceeds {}, resetting session state",
            last_logged,
            current,
            self.config.max_draw_gap
        );
        self.state.current_balance = Decimal::ZERO;
        self.state.consecutive_losses = 0;
        self.state.last_stake = self.state.base_stake;
        self.store.save(&self.state).await?;
        Ok(true)
    }

    #[cfg(test)]
    pub fn state_mut(&mut self) -> &mut AccountState {
        &mut self.state
    }
}
