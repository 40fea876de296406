use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::Mention;
use crate::normalize::parse_timestamp_value;
use crate::roster::Roster;
use crate::scoring::{mention_score, RecencyModel, Scorer};

/// One player's line from one match, as delivered by the stats provider.
/// Providers disagree on types, so ids may be strings or numbers and counts
/// may arrive as whole floats or strings. A field that cannot be read is
/// defaulted; only a missing name rejects the line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatLine {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub player_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub club: Option<String>,
    #[serde(default, alias = "country")]
    pub nationality: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub minutes: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub goals: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub assists: u32,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub clean_sheet: bool,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub fixture: Option<String>,
    #[serde(default)]
    pub kickoff: Option<Value>,
    #[serde(default)]
    pub source: Option<String>,
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        _ => None,
    })
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(count_from_value).unwrap_or(0))
}

fn count_from_value(value: &Value) -> Option<u32> {
    let count = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    count.and_then(|n| u32::try_from(n).ok())
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(flag)) => flag,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f > 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    })
}

fn lenient_rating<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let rating = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(rating.filter(|r| r.is_finite()))
}

impl StatLine {
    pub fn kickoff_at(&self) -> Option<DateTime<Utc>> {
        self.kickoff.as_ref().and_then(parse_timestamp_value)
    }

    fn headline(&self) -> String {
        let mut parts = Vec::new();
        match self.goals {
            0 => {}
            1 => parts.push("1 goal".to_string()),
            n => parts.push(format!("{n} goals")),
        }
        match self.assists {
            0 => {}
            1 => parts.push("1 assist".to_string()),
            n => parts.push(format!("{n} assists")),
        }
        if self.clean_sheet {
            parts.push("clean sheet".to_string());
        }
        if parts.is_empty() {
            parts.push(format!("{} minutes", self.minutes));
        }
        match &self.fixture {
            Some(fixture) => format!("{}: {} in {}", self.name, parts.join(", "), fixture),
            None => format!("{}: {}", self.name, parts.join(", ")),
        }
    }
}

/// Reads stat lines from a JSON array (or an object with `lines`), skipping
/// records that do not have the expected shape.
pub fn read_stat_lines(path: &Path) -> anyhow::Result<Vec<StatLine>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let records = match serde_json::from_str::<Value>(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?
    {
        Value::Array(records) => records,
        Value::Object(mut map) => match map.remove("lines") {
            Some(Value::Array(records)) => records,
            _ => anyhow::bail!("{}: expected an array or an object with `lines`", path.display()),
        },
        _ => anyhow::bail!("{}: expected an array or an object with `lines`", path.display()),
    };
    Ok(parse_stat_records(records))
}

pub fn parse_stat_records(records: Vec<Value>) -> Vec<StatLine> {
    let total = records.len();
    let lines: Vec<StatLine> = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value::<StatLine>(record) {
            Ok(line) if !line.name.trim().is_empty() => Some(line),
            Ok(_) => {
                warn!(index, "skipping stat line without a player name");
                None
            }
            Err(err) => {
                warn!(index, error = %err, "skipping malformed stat line");
                None
            }
        })
        .collect();
    debug!(total, kept = lines.len(), "parsed stat lines");
    lines
}

/// Event weight implied by the numbers, read from the same keyword table
/// news headlines are scored with.
pub fn stat_event_boost(line: &StatLine, scorer: &Scorer<'_>) -> f64 {
    let keywords = &scorer.config().event_keywords;
    let weight = |key: &str| keywords.get(key).copied().unwrap_or(0.0);
    let mut boost: f64 = 0.0;
    if line.goals >= 3 {
        boost = boost.max(weight("hat-trick"));
    }
    if line.goals == 2 {
        boost = boost.max(weight("brace"));
    }
    if line.goals >= 1 {
        boost = boost.max(weight("goal"));
    }
    if line.assists >= 1 {
        boost = boost.max(weight("assist"));
    }
    if line.clean_sheet {
        boost = boost.max(weight("clean sheet"));
    }
    if line.rating.is_some_and(|r| r.is_finite() && r >= 8.0) {
        boost = boost.max(weight("motm"));
    }
    boost.min(1.0)
}

/// One mention per stat line. Players resolve through the roster by id,
/// then by name; unknown players keep the provider's name and club.
pub fn stat_mentions(lines: &[StatLine], roster: &Roster, scorer: &Scorer<'_>) -> Vec<Mention> {
    let config = scorer.config();
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let player = line
                .player_id
                .as_deref()
                .and_then(|id| roster.by_id(id))
                .or_else(|| roster.resolve(&line.name).map(|(p, _)| p));
            let name = player.map_or_else(|| line.name.trim().to_string(), |p| p.name.clone());
            let recency = scorer.recency_weight(line.kickoff_at(), RecencyModel::HalfLife);
            let item_id = line.id.clone().unwrap_or_else(|| {
                format!(
                    "stats:{}:{}",
                    line.fixture.as_deref().unwrap_or("match"),
                    line.player_id.clone().unwrap_or_else(|| index.to_string())
                )
            });
            Mention {
                matched_name: line.name.trim().to_string(),
                player_id: player.and_then(|p| p.id.clone()).or_else(|| line.player_id.clone()),
                club: player.and_then(|p| p.club.clone()).or_else(|| line.club.clone()),
                item_id,
                title: line.headline(),
                source: line.source.clone().unwrap_or_else(|| "stats".to_string()),
                link: None,
                score: mention_score(config.stats_source_weight, recency, stat_event_boost(line, scorer), 0.0),
                name,
            }
        })
        .collect()
}
