//! Per-cycle orchestration
//!
//! One cycle per draw interval: fetch history, resolve the outstanding
//! prediction, refresh the loss/difficulty context, run the detectors,
//! arbitrate, size a stake, persist the new prediction. A cycle either
//! completes its writes or leaves prior state untouched; any failure
//! degrades to skipping the cycle and retrying next tick.

use crate::arbiter::{Arbiter, ArbitrationInputs, StreakOverride};
use crate::bankroll::{AccountStore, BankrollController};
use crate::client::HistorySource;
use crate::config::Config;
use crate::detectors::{self, DetectorCaches, DetectorContext, FollowerState, PatternBook, SegmentStats};
use crate::error::{BotError, Result};
use crate::executor::WagerExecutor;
use crate::notify::Notifier;
use crate::performance::{PerformanceTracker, SharedTracker};
use crate::sequencer;
use crate::store::{PredictionSlot, ReversalLog, ReversalRecord, VerificationLog};
use crate::types::{DetectorKind, Outcome, PredictionRecord, Signal, TimeSegment};
use crate::verifier::{self, Resolution};
use chrono::{Timelike, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;

/// Window used for recent-accuracy queries
const ACCURACY_WINDOW: usize = 20;

/// Window used for the Kelly win-rate estimate
const WIN_RATE_WINDOW: usize = 30;

/// What one cycle did, for logging and tests
#[derive(Debug, Default)]
pub struct CycleReport {
    pub resolution: Option<Resolution>,
    pub prediction: Option<PredictionRecord>,
    pub skipped: Option<String>,
}

pub struct Engine {
    config: Config,
    history: Box<dyn HistorySource>,
    executor: Box<dyn WagerExecutor>,
    notifier: Notifier,
    tracker: SharedTracker,
    log: VerificationLog,
    reversals: ReversalLog,
    slot: PredictionSlot,
    bankroll: BankrollController,
    caches: DetectorCaches,
    rng: StdRng,
}

impl Engine {
    /// Build the engine, replaying the verification log into the tracker
    /// and detector caches so a restart loses no learned state.
    pub async fn new(
        config: Config,
        history: Box<dyn HistorySource>,
        executor: Box<dyn WagerExecutor>,
        notifier: Notifier,
    ) -> Result<Self> {
        let tracker = PerformanceTracker::shared();
        let log = VerificationLog::open(config.stores.verification_log()).await?;

        let mut caches = DetectorCaches {
            follower: FollowerState::new(),
            book: PatternBook::new(config.detectors.adaptive.clone()),
            segments: SegmentStats::new(),
        };
        for record in log.records() {
            tracker.record(record.kind, record.correct);
            let segment = record.segment();
            caches.segments.record_outcome(segment, record.actual);
            caches
                .segments
                .record_resolution(segment, record.predicted, record.correct);
        }
        caches.book.rebuild(log.records().iter().map(|r| r.actual));

        let bankroll = BankrollController::open(
            config.wagering.clone(),
            config.difficult_period.clone(),
            AccountStore::new(config.stores.account_file()),
        )
        .await?;

        let rng = match config.engine.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(rand::random()),
        };

        Ok(Self {
            reversals: ReversalLog::new(config.stores.reversal_log()),
            slot: PredictionSlot::new(config.stores.prediction_file()),
            config,
            history,
            executor,
            notifier,
            tracker,
            log,
            bankroll,
            caches,
            rng,
        })
    }

    pub fn bankroll(&self) -> &BankrollController {
        &self.bankroll
    }

    pub fn verification_log(&self) -> &VerificationLog {
        &self.log
    }

    /// Run one cycle at the current wall-clock hour
    pub async fn cycle(&mut self) -> Result<CycleReport> {
        let hour = chrono::Local::now().hour();
        self.cycle_at(hour).await
    }

    /// Run one cycle with an explicit hour (time-of-day detectors and peak
    /// threshold use it)
    pub async fn cycle_at(&mut self, hour: u32) -> Result<CycleReport> {
        let history = self
            .history
            .recent_draws(self.config.history.fetch_limit)
            .await?;
        if history.len() < self.config.analysis.minimum_history {
            return Err(BotError::DataUnavailable(format!(
                "{} draws available, {} required",
                history.len(),
                self.config.analysis.minimum_history
            )));
        }

        let mut report = CycleReport::default();

        // settle the previous cycle before predicting the next draw
        if let Some(pending) = self.slot.load().await? {
            let resolution =
                verifier::resolve(&pending, &history, &mut self.log, &self.tracker).await?;
            report.resolution = Some(resolution);
            match resolution {
                Resolution::Resolved { correct } => {
                    self.absorb_resolution(&pending, correct, hour).await?;
                    self.slot.clear().await?;
                }
                Resolution::AlreadyResolved { .. } => {
                    self.slot.clear().await?;
                }
                Resolution::Pending => {
                    tracing::debug!(
                        "prediction for {} still awaiting its draw",
                        pending.draw_id
                    );
                    report.skipped = Some(format!("awaiting draw {}", pending.draw_id));
                    return Ok(report);
                }
            }
        }

        // stale Martingale state must not survive a long outage
        if let Some(last_logged) = self.log.last_draw_id().cloned() {
            self.bankroll
                .check_session_gap(&last_logged, &history[0].id)
                .await?;
        }

        let target = sequencer::next_id(&history[0].id.to_string(), None, self.log.last_draw_id())
            .ok_or_else(|| BotError::MalformedId(history[0].id.to_string()))?;

        let recent_losses = self.log.consecutive_losses();
        let difficult = self.is_difficult_period(hour);
        if difficult {
            tracing::info!("difficult period active, tightening thresholds");
        }

        let outcomes: Vec<Outcome> = history.iter().map(|d| d.outcome()).collect();
        let ctx = DetectorContext {
            draws: &history,
            outcomes: &outcomes,
            hour,
            recent_losses,
            tracker: &self.tracker,
        };
        let signals: Vec<Signal> =
            detectors::run_all(&ctx, &self.config, &mut self.rng, &mut self.caches);

        let arbiter = Arbiter::new(
            &self.config.analysis,
            &self.config.weights,
            &self.config.streak_break,
            &self.config.follower,
            &self.config.difficult_period,
            &self.tracker,
        );
        let inputs = ArbitrationInputs {
            signals: &signals,
            hour,
            recent_losses,
            difficult_period: difficult,
            last_failed_kind: if recent_losses
                >= self.config.streak_break.max_consecutive_failures
            {
                self.log.last_failed_kind()
            } else {
                None
            },
            last_logged_direction: self.log.last_direction(),
            follower_active: self.caches.follower.is_following(),
        };

        let Some(arbitration) = arbiter.arbitrate(&inputs) else {
            tracing::info!("no detector produced a signal, skipping cycle");
            report.skipped = Some("no signals".to_string());
            return Ok(report);
        };

        if let Some(applied) = arbitration.override_applied {
            let (original, reason) = match applied {
                StreakOverride::Reversed { original } => (
                    original,
                    format!("reversed after {} consecutive losses", recent_losses),
                ),
                StreakOverride::Maintained { original } => (
                    original,
                    format!("direction maintained after {} consecutive losses", recent_losses),
                ),
            };
            self.reversals
                .append(&ReversalRecord {
                    draw_id: target.clone(),
                    kind: arbitration.kind,
                    original,
                    adjusted: arbitration.outcome,
                    reason,
                    timestamp: Utc::now(),
                })
                .await?;
        }

        let stake = self
            .place_wager(arbitration.outcome, arbitration.combined_score, difficult)
            .await;

        let record = PredictionRecord {
            draw_id: target,
            outcome: arbitration.outcome,
            kind: arbitration.kind,
            combined_score: arbitration.combined_score,
            stake,
            timestamp: Utc::now(),
        };
        self.slot.store(&record).await?;

        tracing::info!(
            "predicting {} for draw {} via {} (score {:.2}{})",
            record.outcome,
            record.draw_id,
            record.kind,
            record.combined_score,
            record
                .stake
                .map(|s| format!(", stake {}", s))
                .unwrap_or_default()
        );
        if let Err(e) = self
            .notifier
            .prediction(
                &record.draw_id.to_string(),
                record.outcome,
                record.combined_score,
            )
            .await
        {
            tracing::warn!("prediction notification failed: {}", e);
        }

        report.prediction = Some(record);
        Ok(report)
    }

    /// Feed one first-time resolution into every consumer of feedback
    async fn absorb_resolution(
        &mut self,
        pending: &PredictionRecord,
        correct: bool,
        hour: u32,
    ) -> Result<()> {
        let actual = self
            .log
            .verdict(&pending.draw_id)
            .map(|r| r.actual)
            .unwrap_or(pending.outcome);

        let segment = TimeSegment::from_hour(hour);
        self.caches.segments.record_outcome(segment, actual);
        self.caches
            .segments
            .record_resolution(segment, pending.outcome, correct);
        self.caches.book.push_actual(actual);

        match pending.kind {
            DetectorKind::AdaptiveLearning => self.caches.book.apply_feedback(correct),
            DetectorKind::StreakFollow => self.caches.follower.observe_resolution(correct),
            _ => {}
        }

        if let Some(stake) = pending.stake {
            if stake > Decimal::ZERO {
                if let Some(event) = self.bankroll.record_resolution(correct, stake).await? {
                    let balance = self.bankroll.state().current_balance;
                    if let Err(e) = self.notifier.breaker(&event.to_string(), balance).await {
                        tracing::warn!("breaker notification failed: {}", e);
                    }
                }
            }
        }
        Ok(())
    }

    /// Arm the bankroll and hand the wager to the executor. Any failure
    /// leaves the account untouched and the prediction unstaked.
    async fn place_wager(
        &mut self,
        outcome: Outcome,
        combined_score: f64,
        difficult: bool,
    ) -> Option<Decimal> {
        let was_enabled = self.bankroll.state().enabled;
        let armed = match self.bankroll.arm(self.config.has_credentials()).await {
            Ok(armed) => armed,
            Err(e) => {
                tracing::warn!("arming failed: {}", e);
                return None;
            }
        };
        if was_enabled && !self.bankroll.state().enabled {
            let reason = self
                .bankroll
                .state()
                .disabled_reason
                .clone()
                .unwrap_or_default();
            if let Err(e) = self.notifier.wagering_disabled(&reason).await {
                tracing::warn!("disable notification failed: {}", e);
            }
        }
        if !armed {
            return None;
        }

        let accuracy = self.log.recent_accuracy(ACCURACY_WINDOW);
        if self
            .bankroll
            .should_skip(accuracy, self.log.recent_samples(ACCURACY_WINDOW))
        {
            tracing::info!(
                "recent accuracy {:.0}% below wagering floor, skipping stake",
                accuracy * 100.0
            );
            return None;
        }

        let confidence = combined_score.min(1.0);
        // Kelly input blends the realized win rate with this cycle's score
        let win_probability =
            0.7 * self.log.recent_accuracy(WIN_RATE_WINDOW) + 0.3 * confidence;
        let amount = self.bankroll.stake(confidence, win_probability, difficult);
        if amount <= Decimal::ZERO {
            return None;
        }

        match self.executor.place_wager(outcome, amount).await {
            Ok(true) => Some(amount),
            Ok(false) => {
                tracing::warn!("wager rejected by executor, recording prediction unstaked");
                None
            }
            Err(e) => {
                tracing::warn!("wager execution failed: {}", e);
                None
            }
        }
    }

    /// Difficult periods tighten thresholds and damp stakes: either the
    /// current segment's accuracy or the recent overall accuracy is below
    /// its configured floor.
    fn is_difficult_period(&self, hour: u32) -> bool {
        let difficult = &self.config.difficult_period;
        if !difficult.enabled {
            return false;
        }

        let segment = TimeSegment::from_hour(hour);
        let samples = self.caches.segments.prediction_samples(segment) as usize;
        if samples >= difficult.min_samples
            && self.caches.segments.accuracy(segment) < difficult.accuracy_threshold
        {
            return true;
        }

        self.log.recent_samples(ACCURACY_WINDOW) >= difficult.min_samples
            && self.log.recent_accuracy(ACCURACY_WINDOW) < difficult.recent_accuracy_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StaticHistory;
    use crate::executor::DryRunExecutor;
    use crate::store::VerificationRecord;
    use crate::types::{Draw, DrawId};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn draws_newest_first(pattern: &str, newest_seq: u32) -> Vec<Draw> {
        let base = DrawId::parse("202505091000").unwrap();
        pattern
            .chars()
            .enumerate()
            .map(|(i, c)| Draw {
                id: base.with_seq(newest_seq - i as u32),
                digit: if c == 'H' { 7 } else { 2 },
                timestamp: Utc::now(),
            })
            .collect()
    }

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.stores.data_dir = dir.path().to_path_buf();
        config.engine.rng_seed = Some(7);
        config.detectors.streak_confidence = 0.82;
        config
    }

    async fn engine_with(
        config: Config,
        history: StaticHistory,
    ) -> Engine {
        Engine::new(
            config,
            Box::new(history),
            Box::new(DryRunExecutor),
            Notifier::disabled(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_cycle_skips_without_history() {
        let dir = TempDir::new().unwrap();
        let history = StaticHistory::new(draws_newest_first("HHL", 1005));
        let mut engine = engine_with(test_config(&dir), history).await;

        let err = engine.cycle_at(10).await.unwrap_err();
        assert!(matches!(err, BotError::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn test_streak_history_predicts_reversal() {
        let dir = TempDir::new().unwrap();
        let history = StaticHistory::new(draws_newest_first("HHHLH", 1005));
        let mut engine = engine_with(test_config(&dir), history).await;

        let report = engine.cycle_at(10).await.unwrap();
        let prediction = report.prediction.unwrap();
        assert_eq!(prediction.outcome, Outcome::Low);
        assert_eq!(prediction.kind, DetectorKind::CombinationStreak);
        assert!(prediction.combined_score >= 0.68);
        assert_eq!(prediction.draw_id.to_string(), "202505091006");
    }

    #[tokio::test]
    async fn test_cycle_resolves_previous_prediction() {
        let dir = TempDir::new().unwrap();
        let history = StaticHistory::new(draws_newest_first("HHHLH", 1005));
        let mut engine = engine_with(test_config(&dir), history.clone()).await;

        let first = engine.cycle_at(10).await.unwrap();
        let target = first.prediction.unwrap().draw_id;
        assert_eq!(target.to_string(), "202505091006");

        // the predicted draw arrives: digit 2 -> Low, matching the forecast
        history.push_front(Draw {
            id: target.clone(),
            digit: 2,
            timestamp: Utc::now(),
        });

        let second = engine.cycle_at(10).await.unwrap();
        assert_eq!(
            second.resolution,
            Some(Resolution::Resolved { correct: true })
        );
        assert!(engine.verification_log().contains(&target));
        // and a fresh prediction was made for the following draw
        assert_eq!(
            second.prediction.unwrap().draw_id.to_string(),
            "202505091007"
        );
    }

    #[tokio::test]
    async fn test_cycle_waits_while_draw_is_missing() {
        let dir = TempDir::new().unwrap();
        let history = StaticHistory::new(draws_newest_first("HHHLH", 1005));
        let mut engine = engine_with(test_config(&dir), history).await;

        engine.cycle_at(10).await.unwrap();
        // the predicted draw never arrived; the second cycle must not stack
        // a second outstanding prediction
        let report = engine.cycle_at(10).await.unwrap();
        assert_eq!(report.resolution, Some(Resolution::Pending));
        assert!(report.prediction.is_none());
        assert!(report.skipped.is_some());
    }

    async fn seed_losses(engine: &mut Engine, count: u32, kind: DetectorKind) {
        for i in 0..count {
            engine
                .log
                .append(VerificationRecord {
                    draw_id: DrawId::parse(&format!("20250509{:04}", 900 + i)).unwrap(),
                    predicted: Outcome::High,
                    actual: Outcome::Low,
                    correct: false,
                    kind,
                    combined_score: 0.8,
                    stake: None,
                    timestamp: Utc::now(),
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_loss_streak_reverses_winner() {
        let dir = TempDir::new().unwrap();
        let history = StaticHistory::new(draws_newest_first("HHHLH", 1005));
        // keep the streak follower out so the combination-streak signal wins
        let mut config = test_config(&dir);
        config.follower.enabled = false;
        let mut engine = engine_with(config, history).await;
        seed_losses(&mut engine, 3, DetectorKind::MeanReversion).await;

        let report = engine.cycle_at(10).await.unwrap();
        let prediction = report.prediction.unwrap();
        // the streak detector alone would predict Low; three consecutive
        // losses invert the chosen signal
        assert_eq!(prediction.outcome, Outcome::High);

        let reversals = engine.reversals.read_all().await.unwrap();
        assert_eq!(reversals.len(), 1);
        assert_eq!(reversals[0].original, Outcome::Low);
        assert_eq!(reversals[0].adjusted, Outcome::High);
    }

    #[tokio::test]
    async fn test_long_loss_streak_maintains_logged_direction() {
        let dir = TempDir::new().unwrap();
        let history = StaticHistory::new(draws_newest_first("HHHLH", 1005));
        let mut config = test_config(&dir);
        config.follower.enabled = false;
        let mut engine = engine_with(config, history).await;
        seed_losses(&mut engine, 5, DetectorKind::MeanReversion).await;

        let report = engine.cycle_at(10).await.unwrap();
        let prediction = report.prediction.unwrap();
        // the last logged prediction direction was High; it is maintained
        // instead of inverted
        assert_eq!(prediction.outcome, Outcome::High);

        let reversals = engine.reversals.read_all().await.unwrap();
        assert_eq!(reversals.len(), 1);
        assert!(reversals[0].reason.contains("maintained"));
    }

    #[tokio::test]
    async fn test_armed_demo_account_stakes_prediction() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.wagering.policy = crate::config::StakePolicy::Fixed;

        // enable wagering in the account file before the engine opens it
        let store = AccountStore::new(config.stores.account_file());
        let mut state = crate::bankroll::AccountState::from_config(&config.wagering);
        state.enabled = true;
        state.demo_mode = true;
        store.save(&state).await.unwrap();

        let history = StaticHistory::new(draws_newest_first("HHHLH", 1005));
        let mut engine = engine_with(config, history).await;

        let report = engine.cycle_at(10).await.unwrap();
        let prediction = report.prediction.unwrap();
        assert_eq!(prediction.stake, Some(dec!(20000)));
    }

    #[tokio::test]
    async fn test_resolved_loss_updates_bankroll() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.wagering.policy = crate::config::StakePolicy::Fixed;

        let store = AccountStore::new(config.stores.account_file());
        let mut state = crate::bankroll::AccountState::from_config(&config.wagering);
        state.enabled = true;
        store.save(&state).await.unwrap();

        let history = StaticHistory::new(draws_newest_first("HHHLH", 1005));
        let mut engine = engine_with(config, history.clone()).await;

        let first = engine.cycle_at(10).await.unwrap();
        let prediction = first.prediction.unwrap();
        assert_eq!(prediction.outcome, Outcome::Low);

        // the draw lands High, so the staked prediction loses
        history.push_front(Draw {
            id: prediction.draw_id.clone(),
            digit: 8,
            timestamp: Utc::now(),
        });
        engine.cycle_at(10).await.unwrap();

        assert_eq!(engine.bankroll().state().current_balance, dec!(-20000));
        assert_eq!(engine.bankroll().state().consecutive_losses, 1);
    }

    #[tokio::test]
    async fn test_restart_replays_log_into_caches() {
        let dir = TempDir::new().unwrap();
        let history = StaticHistory::new(draws_newest_first("HHHLH", 1005));

        {
            let mut engine = engine_with(test_config(&dir), history.clone()).await;
            seed_losses(&mut engine, 2, DetectorKind::CombinationStreak).await;
        }

        // a new engine over the same data dir sees the same loss streak
        let engine = engine_with(test_config(&dir), history).await;
        assert_eq!(engine.verification_log().consecutive_losses(), 2);
        assert!(
            engine
                .tracker
                .success_rate(DetectorKind::CombinationStreak)
                < 0.5
        );
    }
}
