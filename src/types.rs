//! Core domain types shared across the engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the numeric suffix in a draw id (e.g. "202505091424" = day prefix + "1424").
const SUFFIX_WIDTH: usize = 4;

/// Binary classification of a draw's digit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    High,
    Low,
}

impl Outcome {
    /// High iff the digit is 5 or above
    pub fn from_digit(digit: u8) -> Self {
        if digit >= 5 {
            Outcome::High
        } else {
            Outcome::Low
        }
    }

    pub fn invert(self) -> Self {
        match self {
            Outcome::High => Outcome::Low,
            Outcome::Low => Outcome::High,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Outcome::High => 'H',
            Outcome::Low => 'L',
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::High => write!(f, "High"),
            Outcome::Low => write!(f, "Low"),
        }
    }
}

/// Sequence-ordered draw identifier: an opaque prefix (usually a day code)
/// followed by a fixed-width numeric suffix. Upstream collectors sometimes
/// append a `_N` disambiguation suffix, which is stripped on parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DrawId {
    prefix: String,
    seq: u32,
}

impl DrawId {
    /// Parse a raw id, tolerating a trailing `_N` suffix. Returns `None`
    /// when the id is too short or the suffix is not numeric.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = Self::normalize_raw(raw);
        if normalized.len() <= SUFFIX_WIDTH {
            return None;
        }
        let split = normalized.len() - SUFFIX_WIDTH;
        if !normalized.is_char_boundary(split) {
            return None;
        }
        let (prefix, suffix) = normalized.split_at(split);
        let seq: u32 = suffix.parse().ok()?;
        Some(Self {
            prefix: prefix.to_string(),
            seq,
        })
    }

    /// Strip a `_N` disambiguation suffix without further validation.
    pub fn normalize_raw(raw: &str) -> &str {
        match raw.find('_') {
            Some(pos) if raw[pos + 1..].chars().all(|c| c.is_ascii_digit()) => &raw[..pos],
            _ => raw,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// The next id in sequence, preserving the prefix.
    pub fn succ(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            seq: self.seq + 1,
        }
    }

    pub fn with_seq(&self, seq: u32) -> Self {
        Self {
            prefix: self.prefix.clone(),
            seq,
        }
    }

    /// Distance in draws between two ids. `None` when the prefixes differ
    /// (a day rollover), which callers treat as an unbounded gap.
    pub fn distance(&self, other: &DrawId) -> Option<u32> {
        if self.prefix == other.prefix {
            Some(self.seq.abs_diff(other.seq))
        } else {
            None
        }
    }
}

impl fmt::Display for DrawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:0width$}", self.prefix, self.seq, width = SUFFIX_WIDTH)
    }
}

impl From<DrawId> for String {
    fn from(id: DrawId) -> String {
        id.to_string()
    }
}

impl TryFrom<String> for DrawId {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        DrawId::parse(&s).ok_or_else(|| format!("malformed draw id: {}", s))
    }
}

impl PartialOrd for DrawId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DrawId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.prefix
            .cmp(&other.prefix)
            .then(self.seq.cmp(&other.seq))
    }
}

/// One instance of the periodic game event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draw {
    pub id: DrawId,
    pub digit: u8,
    pub timestamp: DateTime<Utc>,
}

impl Draw {
    pub fn outcome(&self) -> Outcome {
        Outcome::from_digit(self.digit)
    }
}

/// The detectors that can contribute a signal to a cycle.
///
/// Detector identity is carried as a variant, not a string, so weight lookup
/// and performance feedback cannot drift apart from the detector set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectorKind {
    CombinationStreak,
    LongStreak,
    DoubleStreak,
    SwitchRate,
    PerfectAlternation,
    Sandwich,
    CycleStride,
    PatternReplication,
    SpecialPattern,
    MajorityTrend,
    MeanReversion,
    SegmentSkew,
    SegmentPerformance,
    StreakFollow,
    AdaptiveLearning,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 15] = [
        DetectorKind::CombinationStreak,
        DetectorKind::LongStreak,
        DetectorKind::DoubleStreak,
        DetectorKind::SwitchRate,
        DetectorKind::PerfectAlternation,
        DetectorKind::Sandwich,
        DetectorKind::CycleStride,
        DetectorKind::PatternReplication,
        DetectorKind::SpecialPattern,
        DetectorKind::MajorityTrend,
        DetectorKind::MeanReversion,
        DetectorKind::SegmentSkew,
        DetectorKind::SegmentPerformance,
        DetectorKind::StreakFollow,
        DetectorKind::AdaptiveLearning,
    ];

    /// Stable label used in logs and record files
    pub fn label(&self) -> &'static str {
        match self {
            DetectorKind::CombinationStreak => "CombinationStreak",
            DetectorKind::LongStreak => "LongStreak",
            DetectorKind::DoubleStreak => "DoubleStreak",
            DetectorKind::SwitchRate => "SwitchRate",
            DetectorKind::PerfectAlternation => "PerfectAlternation",
            DetectorKind::Sandwich => "Sandwich",
            DetectorKind::CycleStride => "CycleStride",
            DetectorKind::PatternReplication => "PatternReplication",
            DetectorKind::SpecialPattern => "SpecialPattern",
            DetectorKind::MajorityTrend => "MajorityTrend",
            DetectorKind::MeanReversion => "MeanReversion",
            DetectorKind::SegmentSkew => "SegmentSkew",
            DetectorKind::SegmentPerformance => "SegmentPerformance",
            DetectorKind::StreakFollow => "StreakFollow",
            DetectorKind::AdaptiveLearning => "AdaptiveLearning",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One detector's prediction for the next draw. Ephemeral, produced fresh
/// each cycle.
#[derive(Debug, Clone)]
pub struct Signal {
    pub kind: DetectorKind,
    pub outcome: Outcome,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub rationale: String,
}

impl Signal {
    pub fn new(
        kind: DetectorKind,
        outcome: Outcome,
        confidence: f64,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            outcome,
            confidence: confidence.clamp(0.0, 1.0),
            rationale: rationale.into(),
        }
    }
}

/// The single outstanding prediction, persisted between cycles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub draw_id: DrawId,
    pub outcome: Outcome,
    pub kind: DetectorKind,
    pub combined_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

/// Day segments used by the time-of-day detectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSegment {
    Morning,
    Noon,
    Afternoon,
    Evening,
    LateNight,
}

impl TimeSegment {
    pub const ALL: [TimeSegment; 5] = [
        TimeSegment::Morning,
        TimeSegment::Noon,
        TimeSegment::Afternoon,
        TimeSegment::Evening,
        TimeSegment::LateNight,
    ];

    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=10 => TimeSegment::Morning,
            11..=12 => TimeSegment::Noon,
            13..=17 => TimeSegment::Afternoon,
            18..=21 => TimeSegment::Evening,
            _ => TimeSegment::LateNight,
        }
    }
}

impl fmt::Display for TimeSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeSegment::Morning => "morning",
            TimeSegment::Noon => "noon",
            TimeSegment::Afternoon => "afternoon",
            TimeSegment::Evening => "evening",
            TimeSegment::LateNight => "latenight",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_digit() {
        assert_eq!(Outcome::from_digit(0), Outcome::Low);
        assert_eq!(Outcome::from_digit(4), Outcome::Low);
        assert_eq!(Outcome::from_digit(5), Outcome::High);
        assert_eq!(Outcome::from_digit(9), Outcome::High);
    }

    #[test]
    fn test_outcome_invert() {
        assert_eq!(Outcome::High.invert(), Outcome::Low);
        assert_eq!(Outcome::Low.invert(), Outcome::High);
    }

    #[test]
    fn test_draw_id_parse_and_display() {
        let id = DrawId::parse("202505091424").unwrap();
        assert_eq!(id.prefix(), "20250509");
        assert_eq!(id.seq(), 1424);
        assert_eq!(id.to_string(), "202505091424");
    }

    #[test]
    fn test_draw_id_parse_strips_disambiguation_suffix() {
        let id = DrawId::parse("202505091424_2").unwrap();
        assert_eq!(id.to_string(), "202505091424");
    }

    #[test]
    fn test_draw_id_parse_rejects_malformed() {
        assert!(DrawId::parse("abc").is_none());
        assert!(DrawId::parse("2025050914ab").is_none());
        assert!(DrawId::parse("1424").is_none());
    }

    #[test]
    fn test_draw_id_succ_pads_suffix() {
        let id = DrawId::parse("202505090009").unwrap();
        assert_eq!(id.succ().to_string(), "202505090010");
    }

    #[test]
    fn test_draw_id_distance() {
        let a = DrawId::parse("202505091424").unwrap();
        let b = DrawId::parse("202505091430").unwrap();
        assert_eq!(a.distance(&b), Some(6));

        let other_day = DrawId::parse("202505101424").unwrap();
        assert_eq!(a.distance(&other_day), None);
    }

    #[test]
    fn test_draw_id_ordering() {
        let a = DrawId::parse("202505091424").unwrap();
        let b = DrawId::parse("202505091425").unwrap();
        let c = DrawId::parse("202505100001").unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_draw_id_serde_round_trip() {
        let id = DrawId::parse("202505091424").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"202505091424\"");
        let back: DrawId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_time_segment_from_hour() {
        assert_eq!(TimeSegment::from_hour(6), TimeSegment::Morning);
        assert_eq!(TimeSegment::from_hour(12), TimeSegment::Noon);
        assert_eq!(TimeSegment::from_hour(15), TimeSegment::Afternoon);
        assert_eq!(TimeSegment::from_hour(20), TimeSegment::Evening);
        assert_eq!(TimeSegment::from_hour(23), TimeSegment::LateNight);
        assert_eq!(TimeSegment::from_hour(3), TimeSegment::LateNight);
    }
}
