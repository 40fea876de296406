use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::models::Candidate;

pub const WEIGHT_DIRECT_MENTION: f64 = 0.35;
pub const WEIGHT_EVENT: f64 = 0.25;
pub const WEIGHT_SOURCE: f64 = 0.15;
pub const WEIGHT_RECENCY: f64 = 0.15;
pub const WEIGHT_NOVELTY: f64 = 0.05;
pub const WEIGHT_LANGUAGE: f64 = 0.05;

/// Novelty has no algorithm yet; every candidate gets the same value.
pub const DEFAULT_NOVELTY: f64 = 1.0;

/// How an item's age turns into a recency weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RecencyModel {
    /// `2^(-age/half_life)` inside the window, floor outside it.
    HalfLife,
    /// <=24h 1.0, <=48h 0.5, older 0.0.
    Bucketed,
}

/// Per-run scorer. Holds the loaded tables and the reference "now" so that
/// identical inputs always produce identical scores.
#[derive(Debug, Clone)]
pub struct Scorer<'a> {
    config: &'a ScoringConfig,
    now: DateTime<Utc>,
}

impl<'a> Scorer<'a> {
    pub fn new(config: &'a ScoringConfig, now: DateTime<Utc>) -> Self {
        Self { config, now }
    }

    pub fn config(&self) -> &ScoringConfig {
        self.config
    }

    pub fn recency_weight(&self, published_at: Option<DateTime<Utc>>, model: RecencyModel) -> f64 {
        let recency = &self.config.recency;
        let Some(published_at) = published_at else {
            return recency.neutral;
        };
        // Timestamps in the future count as brand new.
        let age_hours = ((self.now - published_at).num_seconds() as f64 / 3600.0).max(0.0);

        match model {
            RecencyModel::HalfLife => {
                if age_hours > recency.window_hours {
                    return recency.floor;
                }
                let weight = 2f64.powf(-age_hours / recency.half_life_hours);
                weight.max(recency.floor)
            }
            RecencyModel::Bucketed => bucketed_weight(age_hours),
        }
    }

    /// Highest keyword weight found in the lowercased text, 0 when nothing matches.
    pub fn event_boost(&self, text: &str) -> f64 {
        let haystack = text.to_lowercase();
        self.config
            .event_keywords
            .iter()
            .filter(|(keyword, _)| !keyword.is_empty() && haystack.contains(keyword.as_str()))
            .map(|(_, weight)| *weight)
            .fold(0.0, f64::max)
            .min(1.0)
    }

    /// Substring lookup against the source table. The longest matching key
    /// wins so that "sky sports" can outrank a bare "sky".
    pub fn source_weight(&self, source: &str) -> f64 {
        let source = source.trim().to_lowercase();
        if source.is_empty() {
            return self.config.default_source_weight;
        }
        self.config
            .source_weights
            .iter()
            .filter(|(key, _)| !key.is_empty() && source.contains(key.as_str()))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
            .map(|(_, weight)| clamp_unit(*weight, self.config.default_source_weight))
            .unwrap_or(self.config.default_source_weight)
    }

    pub fn language_match(&self, language: Option<&str>) -> f64 {
        match (self.config.language.as_deref(), language) {
            (Some(expected), Some(actual)) if !actual.trim().is_empty() => {
                let actual = actual.trim().to_lowercase();
                // "en-GB" still counts as English.
                if actual == expected || actual.starts_with(&format!("{expected}-")) {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 1.0,
        }
    }

    /// Recomputes `candidate.score` from its current sub-scores.
    pub fn score_candidate(&self, candidate: &mut Candidate) {
        candidate.score = composite_score(&CandidateSignals {
            direct_mention: candidate.direct_mention_score,
            event_importance: candidate.event_importance,
            source_authority: candidate.source_authority,
            recency: candidate.recency_score,
            novelty: candidate.novelty_score,
            language_match: candidate.language_match,
        });
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CandidateSignals {
    pub direct_mention: f64,
    pub event_importance: f64,
    pub source_authority: f64,
    pub recency: f64,
    pub novelty: f64,
    pub language_match: f64,
}

/// Weighted sum of the clamped sub-scores, rounded to three decimals.
/// The weights add up to 1.0, so the result stays in [0, 1].
pub fn composite_score(signals: &CandidateSignals) -> f64 {
    let score = WEIGHT_DIRECT_MENTION * clamp_unit(signals.direct_mention, 0.0)
        + WEIGHT_EVENT * clamp_unit(signals.event_importance, 0.0)
        + WEIGHT_SOURCE * clamp_unit(signals.source_authority, 0.5)
        + WEIGHT_RECENCY * clamp_unit(signals.recency, 0.0)
        + WEIGHT_NOVELTY * clamp_unit(signals.novelty, DEFAULT_NOVELTY)
        + WEIGHT_LANGUAGE * clamp_unit(signals.language_match, 1.0);
    round_to(score, 3)
}

/// Additive score for one name mention. Not normalized: repeated strong
/// mentions of the same player keep adding up during aggregation.
pub fn mention_score(source_weight: f64, recency_weight: f64, event_boost: f64, whitelist_boost: f64) -> f64 {
    1.0 + 0.3 * clamp_unit(source_weight, 0.5)
        + 0.2 * clamp_unit(recency_weight, 0.0)
        + 0.5 * clamp_unit(event_boost, 0.0)
        + finite_or(whitelist_boost, 0.0).max(0.0)
}

pub fn bucketed_weight(age_hours: f64) -> f64 {
    if age_hours <= 24.0 {
        1.0
    } else if age_hours <= 48.0 {
        0.5
    } else {
        0.0
    }
}

/// Clamps to [0, 1]; NaN falls back to `neutral`.
pub fn clamp_unit(value: f64, neutral: f64) -> f64 {
    if value.is_nan() {
        neutral
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 9, 18, 0, 0).unwrap()
    }

    fn signals(direct: f64, event: f64, source: f64, recency: f64) -> CandidateSignals {
        CandidateSignals {
            direct_mention: direct,
            event_importance: event,
            source_authority: source,
            recency,
            novelty: 1.0,
            language_match: 1.0,
        }
    }

    #[test]
    fn missing_timestamp_uses_neutral_weight() {
        let config = ScoringConfig::default();
        let scorer = Scorer::new(&config, now());
        assert_eq!(scorer.recency_weight(None, RecencyModel::HalfLife), 0.7);
        assert_eq!(scorer.recency_weight(None, RecencyModel::Bucketed), 0.7);
    }

    #[test]
    fn item_older_than_window_gets_floor_not_zero() {
        let config = ScoringConfig::default();
        let scorer = Scorer::new(&config, now());
        let published = now() - Duration::hours(72);
        assert_eq!(scorer.recency_weight(Some(published), RecencyModel::HalfLife), 0.1);
    }

    #[rstest]
    #[case(0, 1.0)]
    #[case(24, 0.5)]
    #[case(47, 0.2573)]
    fn half_life_decay(#[case] hours: i64, #[case] expected: f64) {
        let config = ScoringConfig::default();
        let scorer = Scorer::new(&config, now());
        let weight = scorer.recency_weight(Some(now() - Duration::hours(hours)), RecencyModel::HalfLife);
        assert!((weight - expected).abs() < 1e-3, "{hours}h gave {weight}");
    }

    #[rstest]
    #[case(1, 1.0)]
    #[case(24, 1.0)]
    #[case(30, 0.5)]
    #[case(48, 0.5)]
    #[case(49, 0.0)]
    fn bucketed_bands(#[case] hours: i64, #[case] expected: f64) {
        let config = ScoringConfig::default();
        let scorer = Scorer::new(&config, now());
        let weight = scorer.recency_weight(Some(now() - Duration::hours(hours)), RecencyModel::Bucketed);
        assert_eq!(weight, expected);
    }

    #[test]
    fn future_timestamp_counts_as_fresh() {
        let config = ScoringConfig::default();
        let scorer = Scorer::new(&config, now());
        let weight = scorer.recency_weight(Some(now() + Duration::hours(3)), RecencyModel::HalfLife);
        assert_eq!(weight, 1.0);
    }

    #[test]
    fn recency_never_increases_with_age() {
        let config = ScoringConfig::default();
        let scorer = Scorer::new(&config, now());
        for model in [RecencyModel::HalfLife, RecencyModel::Bucketed] {
            let mut previous = f64::INFINITY;
            for hours in 0..120 {
                let weight = scorer.recency_weight(Some(now() - Duration::hours(hours)), model);
                assert!(weight <= previous, "{model:?} rose at {hours}h");
                previous = weight;
            }
        }
    }

    #[rstest]
    #[case("Mohamed Salah scores hat-trick for Liverpool", 1.0)]
    #[case("Partey with a BRACE at the Emirates", 0.8)]
    #[case("Late goal and an assist for Kudus", 0.6)]
    #[case("Onana keeps a clean sheet", 0.5)]
    #[case("Transfer rumours round-up", 0.0)]
    fn event_boost_takes_highest_keyword(#[case] text: &str, #[case] expected: f64) {
        let config = ScoringConfig::default();
        let scorer = Scorer::new(&config, now());
        assert_eq!(scorer.event_boost(text), expected);
    }

    #[rstest]
    #[case("guardian_football", 1.0)]
    #[case("BBC Sport", 1.0)]
    #[case("Sky Sports News", 0.9)]
    #[case("ESPN FC", 0.8)]
    #[case("talkSPORT", 0.5)]
    #[case("some blog", 0.5)]
    #[case("", 0.5)]
    fn source_weight_lookup(#[case] source: &str, #[case] expected: f64) {
        let config = ScoringConfig::default();
        let scorer = Scorer::new(&config, now());
        assert_eq!(scorer.source_weight(source), expected);
    }

    #[test]
    fn longest_source_key_wins() {
        let mut config = ScoringConfig::default();
        config.source_weights.insert("sky sports".to_string(), 0.95);
        let scorer = Scorer::new(&config, now());
        assert_eq!(scorer.source_weight("Sky Sports"), 0.95);
        assert_eq!(scorer.source_weight("Sky News"), 0.9);
    }

    #[test]
    fn language_match_accepts_regional_variants() {
        let config = ScoringConfig::default();
        let scorer = Scorer::new(&config, now());
        assert_eq!(scorer.language_match(Some("en-GB")), 1.0);
        assert_eq!(scorer.language_match(Some("fr")), 0.0);
        assert_eq!(scorer.language_match(None), 1.0);
    }

    #[test]
    fn composite_weights_sum_to_one() {
        let total = WEIGHT_DIRECT_MENTION
            + WEIGHT_EVENT
            + WEIGHT_SOURCE
            + WEIGHT_RECENCY
            + WEIGHT_NOVELTY
            + WEIGHT_LANGUAGE;
        assert!((total - 1.0).abs() < 1e-12);
        assert_eq!(composite_score(&signals(1.0, 1.0, 1.0, 1.0)), 1.0);
    }

    #[test]
    fn composite_stays_in_unit_interval_for_wild_inputs() {
        let values = [-3.0, -0.1, 0.0, 0.25, 0.5, 1.0, 1.7, f64::NAN, f64::INFINITY];
        for &a in &values {
            for &b in &values {
                let score = composite_score(&CandidateSignals {
                    direct_mention: a,
                    event_importance: b,
                    source_authority: a,
                    recency: b,
                    novelty: a,
                    language_match: b,
                });
                assert!((0.0..=1.0).contains(&score), "{a} {b} gave {score}");
            }
        }
    }

    #[test]
    fn composite_rounds_to_three_places() {
        let score = composite_score(&signals(0.4, 0.0, 0.5, 0.5));
        assert_eq!(score, 0.39);
        let score = composite_score(&signals(0.7, 0.6, 0.8, 0.2548));
        assert_eq!(score, round_to(score, 3));
    }

    #[test]
    fn mention_score_is_additive() {
        assert!((mention_score(1.0, 1.0, 1.0, 0.0) - 2.0).abs() < 1e-12);
        assert!((mention_score(0.5, 0.7, 0.0, 0.0) - 1.29).abs() < 1e-12);
        assert!((mention_score(0.5, 0.7, 0.0, 0.25) - 1.54).abs() < 1e-12);
        assert!((mention_score(f64::NAN, 0.0, 0.0, f64::NAN) - 1.15).abs() < 1e-12);
    }
}
