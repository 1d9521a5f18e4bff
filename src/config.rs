//! Configuration loading and defaults
//!
//! All sections are optional in the TOML file; `Default` impls double as the
//! documented defaults. Credentials can be supplied via the environment
//! (`HIGHLOW_BOT_USERNAME` / `HIGHLOW_BOT_PASSWORD`) instead of the file.

use crate::error::{BotError, Result};
use crate::types::{DetectorKind, Outcome, TimeSegment};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub history: HistoryConfig,
    pub analysis: AnalysisConfig,
    pub weights: WeightTable,
    pub detectors: DetectorsConfig,
    pub streak_break: StreakBreakConfig,
    pub follower: FollowerConfig,
    pub wagering: WageringConfig,
    pub difficult_period: DifficultPeriodConfig,
    pub stores: StoresConfig,
    pub engine: EngineConfig,
    pub credentials: Option<Credentials>,
    pub telegram: Option<TelegramConfig>,
}

impl Config {
    /// Load from a TOML file, falling back to defaults when the file does
    /// not exist. Environment credentials override file credentials.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| BotError::Config(format!("cannot read {}: {}", path, e)))?;
            toml::from_str(&raw).map_err(|e| BotError::Config(format!("{}: {}", path, e)))?
        } else {
            tracing::warn!("config file {} not found, using defaults", path);
            Config::default()
        };

        if let (Ok(username), Ok(password)) = (
            std::env::var("HIGHLOW_BOT_USERNAME"),
            std::env::var("HIGHLOW_BOT_PASSWORD"),
        ) {
            config.credentials = Some(Credentials { username, password });
        }

        Ok(config)
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials
            .as_ref()
            .map(|c| !c.username.is_empty() && !c.password.is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Endpoint returning recent draws as JSON, newest first
    pub base_url: String,
    /// How many draws to request per cycle
    pub fetch_limit: usize,
    pub request_timeout_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/draws".to_string(),
            fetch_limit: 50,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Trailing window handed to the window detectors
    pub history_limit: usize,
    /// Minimum draws required before any cycle runs
    pub minimum_history: usize,
    /// Base confidence threshold for arbitration
    pub confidence_threshold: f64,
    /// Raise the threshold during peak hours
    pub dynamic_threshold: bool,
    pub peak_hours_threshold: f64,
    pub peak_hours_start: u32,
    pub peak_hours_end: u32,
    /// Threshold floor applied after 2+ consecutive losses
    pub min_confidence_after_loss: f64,
    pub mean_reversion: MeanReversionConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            history_limit: 10,
            minimum_history: 5,
            confidence_threshold: 0.68,
            dynamic_threshold: true,
            peak_hours_threshold: 0.72,
            peak_hours_start: 18,
            peak_hours_end: 22,
            min_confidence_after_loss: 0.75,
            mean_reversion: MeanReversionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeanReversionConfig {
    pub enabled: bool,
    /// Imbalance ratio that triggers a reversion prediction
    pub threshold: f64,
    pub window: usize,
    pub min_confidence: f64,
    pub max_confidence: f64,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.2,
            window: 30,
            min_confidence: 0.65,
            max_confidence: 0.85,
        }
    }
}

/// Per-detector base weights used by the arbiter. Centered on 1.0 so a
/// winning signal's combined score stays comparable to the confidence
/// threshold.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct WeightTable(pub HashMap<DetectorKind, f64>);

impl WeightTable {
    pub const FALLBACK: f64 = 1.0;

    pub fn get(&self, kind: DetectorKind) -> f64 {
        self.0.get(&kind).copied().unwrap_or(Self::FALLBACK)
    }

    pub fn set(&mut self, kind: DetectorKind, weight: f64) {
        self.0.insert(kind, weight);
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        let mut table = HashMap::new();
        table.insert(DetectorKind::CombinationStreak, 1.28);
        table.insert(DetectorKind::SwitchRate, 1.15);
        table.insert(DetectorKind::SpecialPattern, 1.15);
        table.insert(DetectorKind::CycleStride, 1.13);
        table.insert(DetectorKind::PerfectAlternation, 1.12);
        table.insert(DetectorKind::Sandwich, 1.10);
        table.insert(DetectorKind::StreakFollow, 1.10);
        table.insert(DetectorKind::PatternReplication, 1.08);
        table.insert(DetectorKind::MajorityTrend, 1.05);
        table.insert(DetectorKind::SegmentSkew, 1.04);
        table.insert(DetectorKind::LongStreak, 1.03);
        table.insert(DetectorKind::DoubleStreak, 1.02);
        table.insert(DetectorKind::SegmentPerformance, 1.02);
        table.insert(DetectorKind::AdaptiveLearning, 1.01);
        table.insert(DetectorKind::MeanReversion, 1.01);
        Self(table)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorsConfig {
    /// Base confidence of the leading-run reversal detector
    pub streak_confidence: f64,
    /// Confidence added per run element beyond three
    pub streak_bonus_per_extra: f64,
    pub streak_bonus_cap: f64,
    pub special_patterns: Vec<SpecialPatternRule>,
    pub segments: SegmentsConfig,
    pub adaptive: AdaptiveConfig,
}

impl Default for DetectorsConfig {
    fn default() -> Self {
        Self {
            streak_confidence: 0.80,
            streak_bonus_per_extra: 0.03,
            streak_bonus_cap: 0.09,
            special_patterns: SpecialPatternRule::defaults(),
            segments: SegmentsConfig::default(),
            adaptive: AdaptiveConfig::default(),
        }
    }
}

/// One exact-prefix pattern rule: when the newest outcomes spell `pattern`
/// (newest first), predict `outcome` with `confidence`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialPatternRule {
    pub pattern: String,
    pub outcome: Outcome,
    pub confidence: f64,
}

impl SpecialPatternRule {
    fn rule(pattern: &str, outcome: Outcome, confidence: f64) -> Self {
        Self {
            pattern: pattern.to_string(),
            outcome,
            confidence,
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::rule("HHHH", Outcome::Low, 0.85),
            Self::rule("LLLL", Outcome::High, 0.85),
            Self::rule("HHHL", Outcome::Low, 0.83),
            Self::rule("LLLH", Outcome::High, 0.83),
            Self::rule("HHH", Outcome::Low, 0.82),
            Self::rule("LLL", Outcome::High, 0.82),
            Self::rule("HLHHLH", Outcome::High, 0.81),
            Self::rule("LHLLHL", Outcome::Low, 0.81),
            Self::rule("HLHLH", Outcome::Low, 0.80),
            Self::rule("LHLHL", Outcome::High, 0.80),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SegmentsConfig {
    /// Minimum observed outcomes before the skew detector fires
    pub min_skew_samples: usize,
    /// Minimum resolved predictions before the performance detector trusts
    /// the log over the configured lean
    pub min_performance_samples: usize,
    pub leans: HashMap<TimeSegment, SegmentLean>,
}

impl Default for SegmentsConfig {
    fn default() -> Self {
        let mut leans = HashMap::new();
        leans.insert(TimeSegment::Morning, SegmentLean::new(Outcome::Low, 0.05));
        leans.insert(TimeSegment::Noon, SegmentLean::new(Outcome::High, 0.02));
        leans.insert(TimeSegment::Afternoon, SegmentLean::new(Outcome::High, 0.02));
        leans.insert(TimeSegment::Evening, SegmentLean::new(Outcome::Low, 0.00));
        leans.insert(TimeSegment::LateNight, SegmentLean::new(Outcome::High, 0.04));
        Self {
            min_skew_samples: 10,
            min_performance_samples: 20,
            leans,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentLean {
    pub lean: Outcome,
    pub confidence_boost: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl SegmentLean {
    fn new(lean: Outcome, confidence_boost: f64) -> Self {
        Self {
            lean,
            confidence_boost,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub enabled: bool,
    /// Minimum occurrences of a 3-outcome subsequence before it is trusted
    pub min_occurrences: u32,
    /// Minimum skew toward one follower outcome
    pub min_skew: f64,
    pub confidence_increment: f64,
    pub confidence_decrement: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_occurrences: 5,
            min_skew: 0.6,
            confidence_increment: 0.02,
            confidence_decrement: 0.05,
            min_confidence: 0.5,
            max_confidence: 0.95,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreakBreakConfig {
    pub enabled: bool,
    /// Loss count at which the winner's direction is inverted
    pub max_consecutive_failures: u32,
    pub reverse_after_streak: bool,
    /// Loss count at which the last logged direction is maintained instead
    pub maintain_direction_after_losses: bool,
    pub long_loss_threshold: u32,
}

impl Default for StreakBreakConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_consecutive_failures: 3,
            reverse_after_streak: true,
            maintain_direction_after_losses: true,
            long_loss_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FollowerConfig {
    pub enabled: bool,
    /// Overall consecutive losses required before following starts
    pub activate_after_losses: u32,
    /// Own misses after which the follow is abandoned
    pub max_consecutive_failures: u32,
    pub min_streak_length: usize,
    pub confidence: f64,
    /// Weight override applied while a follow is active
    pub priority_weight: f64,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            activate_after_losses: 2,
            max_consecutive_failures: 2,
            min_streak_length: 2,
            confidence: 0.82,
            priority_weight: 1.65,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StakePolicy {
    Fixed,
    ConfidenceScaled,
    Martingale,
    KellyFraction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WageringConfig {
    pub policy: StakePolicy,
    pub base_stake: Decimal,
    pub max_stake: Decimal,
    /// Martingale resets to the base stake at this many consecutive losses
    pub max_multiplier: u32,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub reset_after_sl: bool,
    pub reset_after_tp: bool,
    /// Draw-id gap beyond which stale session state is reset
    pub max_draw_gap: u32,
    pub kelly: KellyConfig,
}

impl Default for WageringConfig {
    fn default() -> Self {
        Self {
            policy: StakePolicy::Martingale,
            base_stake: dec!(20000),
            max_stake: dec!(200000),
            max_multiplier: 6,
            stop_loss: dec!(-200000),
            take_profit: dec!(300000),
            reset_after_sl: true,
            reset_after_tp: true,
            max_draw_gap: 30,
            kelly: KellyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KellyConfig {
    /// Payout multiplier for a winning wager
    pub odds: f64,
    /// Fraction of full Kelly actually staked
    pub fraction: f64,
    /// Hard cap on the balance fraction risked per wager
    pub max_risk: f64,
    /// Stakes are rounded up to a multiple of this
    pub granularity: Decimal,
    /// Positive stakes are floored at this amount
    pub min_stake: Decimal,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            odds: 1.95,
            fraction: 0.25,
            max_risk: 0.03,
            granularity: dec!(10000),
            min_stake: dec!(100000),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DifficultPeriodConfig {
    pub enabled: bool,
    /// Segment accuracy below this marks the segment as difficult
    pub accuracy_threshold: f64,
    /// Recent overall accuracy below this marks the period as difficult
    pub recent_accuracy_threshold: f64,
    /// Threshold floor while difficult
    pub confidence_threshold: f64,
    pub stake_multiplier: f64,
    /// Skip wagering entirely below this recent accuracy
    pub min_accuracy_to_bet: f64,
    pub min_samples: usize,
}

impl Default for DifficultPeriodConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            accuracy_threshold: 0.40,
            recent_accuracy_threshold: 0.45,
            confidence_threshold: 0.75,
            stake_multiplier: 0.7,
            min_accuracy_to_bet: 0.35,
            min_samples: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoresConfig {
    pub data_dir: PathBuf,
}

impl StoresConfig {
    pub fn account_file(&self) -> PathBuf {
        self.data_dir.join("account.json")
    }

    pub fn prediction_file(&self) -> PathBuf {
        self.data_dir.join("prediction.json")
    }

    pub fn verification_log(&self) -> PathBuf {
        self.data_dir.join("verifications.jsonl")
    }

    pub fn reversal_log(&self) -> PathBuf {
        self.data_dir.join("reversals.jsonl")
    }
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// One cycle per draw interval
    pub cycle_interval_secs: u64,
    /// Seed for the injected RNG; random when absent
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 45,
            rng_seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

fn default_true() -> bool {
    true
}
