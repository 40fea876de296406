use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::extract::EntityExtractor;
use crate::models::NewsItem;

pub const SUMMARY_MAX_CHARS: usize = 1000;

/// Feed and API records disagree on key names, so every spelling is its own
/// field and the first non-empty one wins.
#[derive(Debug, Default, Deserialize)]
struct RawItem {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    guid: Option<Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    published_at: Option<Value>,
    #[serde(default)]
    published: Option<Value>,
    #[serde(default, rename = "pubDate")]
    pub_date: Option<Value>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    feed: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    entities: Option<RawEntities>,
    #[serde(default)]
    extracted_players: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEntities {
    #[serde(default)]
    players: Vec<String>,
}

/// Turns heterogeneous feed/API records into `NewsItem`s. Names are taken
/// from the record when upstream already extracted them, otherwise the
/// extractor runs over title and summary.
pub struct Normalizer<'a> {
    extractor: &'a EntityExtractor,
    markup: Regex,
}

impl<'a> Normalizer<'a> {
    pub fn new(extractor: &'a EntityExtractor) -> Self {
        Self {
            extractor,
            markup: Regex::new(r"<[^>]*>").expect("markup pattern is valid"),
        }
    }

    /// Normalizes every record it can; records that are not objects or have
    /// neither title nor summary are skipped with a warning.
    pub fn normalize_all(&self, records: Vec<Value>) -> Vec<NewsItem> {
        let total = records.len();
        let items: Vec<NewsItem> = records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| self.normalize(index, record))
            .collect();
        debug!(total, kept = items.len(), "normalized news items");
        items
    }

    pub fn normalize(&self, index: usize, record: Value) -> Option<NewsItem> {
        let raw: RawItem = match serde_json::from_value(record) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(index, error = %err, "skipping malformed news record");
                return None;
            }
        };

        let title = self.clean_text(raw.title.as_deref().unwrap_or_default());
        let summary = first_text([raw.summary, raw.description, raw.content])
            .map(|text| truncate_chars(&self.clean_text(&text), SUMMARY_MAX_CHARS))
            .unwrap_or_default();
        if title.is_empty() && summary.is_empty() {
            warn!(index, "skipping news record without title or summary");
            return None;
        }

        let source = first_text([raw.source, raw.feed]).unwrap_or_else(|| "unknown".to_string());
        let link = first_text([raw.link, raw.url]);

        let published_at = match [raw.published_at, raw.published, raw.pub_date]
            .into_iter()
            .flatten()
            .find(|value| !value.is_null())
        {
            None => None,
            Some(value) => {
                let parsed = parse_timestamp_value(&value);
                if parsed.is_none() {
                    debug!(index, value = %value, "unparseable published_at, treating as unknown");
                }
                parsed
            }
        };

        let id = match raw.id.or(raw.guid) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => derived_id(link.as_deref(), &source, &title),
        };

        let upstream = raw
            .extracted_players
            .or_else(|| raw.entities.map(|e| e.players))
            .unwrap_or_default();
        let extracted_players = if upstream.is_empty() {
            self.extractor.extract(&format!("{title}. {summary}"))
        } else {
            dedup_names(upstream)
        };

        Some(NewsItem {
            id,
            title,
            summary,
            published_at,
            source,
            link,
            language: raw
                .language
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty()),
            extracted_players,
        })
    }

    fn clean_text(&self, text: &str) -> String {
        let stripped = self.markup.replace_all(text, " ");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Reads a JSON file holding either an array of records or an object with
/// an `items` array.
pub fn read_records(path: &Path) -> anyhow::Result<Vec<Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_records(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn parse_records(raw: &str) -> anyhow::Result<Vec<Value>> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(records)) => Ok(records),
            _ => anyhow::bail!("expected a JSON array or an object with an `items` array"),
        },
        _ => anyhow::bail!("expected a JSON array or an object with an `items` array"),
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Epoch values at or above this are milliseconds; as seconds they would
/// land thousands of years ahead.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;
const LATEST_PLAUSIBLE_YEAR: i32 = 2100;

/// String timestamps or epoch numbers (seconds or milliseconds). Dates past
/// 2100 are treated as unknown rather than as brand new.
pub fn parse_timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    let parsed = match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => {
            let epoch = n.as_f64().filter(|f| f.is_finite())?;
            if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
                Utc.timestamp_millis_opt(epoch as i64).single()
            } else {
                Utc.timestamp_opt(epoch as i64, 0).single()
            }
        }
        _ => None,
    };
    parsed.filter(|dt| dt.year() <= LATEST_PLAUSIBLE_YEAR)
}

fn first_text<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
}

fn derived_id(link: Option<&str>, source: &str, title: &str) -> String {
    let key = match link {
        Some(link) => link.to_string(),
        None => format!("{source}|{title}"),
    };
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

fn dedup_names(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .map(|n| n.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|n| !n.is_empty() && seen.insert(n.to_lowercase()))
        .collect()
}
