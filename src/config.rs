use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::scoring::RecencyModel;

const DEFAULT_SOURCE_WEIGHTS: &[(&str, f64)] = &[
    ("guardian", 1.0),
    ("bbc", 1.0),
    ("the athletic", 0.95),
    ("sky", 0.9),
    ("telegraph", 0.9),
    ("reuters", 0.9),
    ("espn", 0.8),
    ("independent", 0.8),
    ("goal.com", 0.7),
    ("mirror", 0.6),
    ("talksport", 0.5),
];

const DEFAULT_EVENT_KEYWORDS: &[(&str, f64)] = &[
    ("hat-trick", 1.0),
    ("hat trick", 1.0),
    ("brace", 0.8),
    ("motm", 0.7),
    ("man of the match", 0.7),
    ("goal", 0.6),
    ("clean sheet", 0.5),
    ("debut", 0.5),
    ("assist", 0.4),
];

const DEFAULT_PRIORITY_CLUBS: &[&str] = &[
    "Arsenal",
    "Chelsea",
    "Liverpool",
    "Manchester City",
    "Manchester United",
    "Tottenham",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecencyConfig {
    pub window_hours: f64,
    pub half_life_hours: f64,
    pub floor: f64,
    pub neutral: f64,
}

impl Default for RecencyConfig {
    fn default() -> Self {
        Self {
            window_hours: 48.0,
            half_life_hours: 24.0,
            floor: 0.1,
            neutral: 0.7,
        }
    }
}

/// Everything the extractor, scorer and selector read during one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub source_weights: BTreeMap<String, f64>,
    pub default_source_weight: f64,
    pub event_keywords: BTreeMap<String, f64>,
    pub recency: RecencyConfig,
    pub candidate_recency: RecencyModel,
    pub priority_clubs: Vec<String>,
    pub min_minutes: u32,
    pub language: Option<String>,
    pub whitelist_boost: f64,
    pub eligible_nationalities: Vec<String>,
    pub stats_source_weight: f64,
    pub extra_stopwords: Vec<String>,
    pub non_person_phrases: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            source_weights: DEFAULT_SOURCE_WEIGHTS
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            default_source_weight: 0.5,
            event_keywords: DEFAULT_EVENT_KEYWORDS
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            recency: RecencyConfig::default(),
            candidate_recency: RecencyModel::Bucketed,
            priority_clubs: DEFAULT_PRIORITY_CLUBS.iter().map(|c| c.to_string()).collect(),
            min_minutes: 30,
            language: Some("en".to_string()),
            whitelist_boost: 0.0,
            eligible_nationalities: Vec::new(),
            stats_source_weight: 1.0,
            extra_stopwords: Vec::new(),
            non_person_phrases: Vec::new(),
        }
    }
}

/// On-disk shape. Every field is optional; maps merge over the defaults,
/// scalars and lists replace them.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    source_weights: BTreeMap<String, f64>,
    default_source_weight: Option<f64>,
    #[serde(default)]
    event_keywords: BTreeMap<String, f64>,
    recency: Option<RecencyFile>,
    candidate_recency: Option<RecencyModel>,
    priority_clubs: Option<Vec<String>>,
    min_minutes: Option<u32>,
    language: Option<String>,
    whitelist_boost: Option<f64>,
    eligible_nationalities: Option<Vec<String>>,
    stats_source_weight: Option<f64>,
    #[serde(default)]
    extra_stopwords: Vec<String>,
    #[serde(default)]
    non_person_phrases: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecencyFile {
    window_hours: Option<f64>,
    half_life_hours: Option<f64>,
    floor: Option<f64>,
    neutral: Option<f64>,
}

impl ScoringConfig {
    /// Loads overrides from `path` on top of the built-in defaults.
    ///
    /// No path, or a path that does not exist, yields the defaults. A file
    /// that exists but does not parse or validate is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using built-in defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw, path)?;
        debug!(
            path = %path.display(),
            sources = config.source_weights.len(),
            keywords = config.event_keywords.len(),
            "loaded scoring config"
        );
        Ok(config)
    }

    fn from_yaml(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::default().merged(file);
        config.validate()?;
        Ok(config)
    }

    fn merged(mut self, file: ConfigFile) -> Self {
        for (source, weight) in file.source_weights {
            self.source_weights.insert(source.trim().to_lowercase(), weight);
        }
        for (keyword, weight) in file.event_keywords {
            self.event_keywords.insert(keyword.trim().to_lowercase(), weight);
        }
        if let Some(value) = file.default_source_weight {
            self.default_source_weight = value;
        }
        if let Some(recency) = file.recency {
            if let Some(value) = recency.window_hours {
                self.recency.window_hours = value;
            }
            if let Some(value) = recency.half_life_hours {
                self.recency.half_life_hours = value;
            }
            if let Some(value) = recency.floor {
                self.recency.floor = value;
            }
            if let Some(value) = recency.neutral {
                self.recency.neutral = value;
            }
        }
        if let Some(model) = file.candidate_recency {
            self.candidate_recency = model;
        }
        if let Some(clubs) = file.priority_clubs {
            self.priority_clubs = clubs;
        }
        if let Some(value) = file.min_minutes {
            self.min_minutes = value;
        }
        if let Some(language) = file.language {
            let language = language.trim().to_lowercase();
            self.language = if language.is_empty() { None } else { Some(language) };
        }
        if let Some(value) = file.whitelist_boost {
            self.whitelist_boost = value;
        }
        if let Some(nationalities) = file.eligible_nationalities {
            self.eligible_nationalities = nationalities;
        }
        if let Some(value) = file.stats_source_weight {
            self.stats_source_weight = value;
        }
        self.extra_stopwords.extend(file.extra_stopwords);
        self.non_person_phrases.extend(file.non_person_phrases);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (source, weight) in &self.source_weights {
            check_unit(&format!("source_weights.{source}"), *weight)?;
        }
        for (keyword, weight) in &self.event_keywords {
            check_unit(&format!("event_keywords.{keyword}"), *weight)?;
        }
        check_unit("default_source_weight", self.default_source_weight)?;
        check_unit("stats_source_weight", self.stats_source_weight)?;
        check_unit("recency.floor", self.recency.floor)?;
        check_unit("recency.neutral", self.recency.neutral)?;
        check_positive("recency.window_hours", self.recency.window_hours)?;
        check_positive("recency.half_life_hours", self.recency.half_life_hours)?;
        if !self.whitelist_boost.is_finite() || self.whitelist_boost < 0.0 {
            return Err(ConfigError::Invalid {
                name: "whitelist_boost".to_string(),
                reason: format!("expected a non-negative number, got {}", self.whitelist_boost),
            });
        }
        Ok(())
    }

    pub fn is_priority_club(&self, club: Option<&str>) -> bool {
        let Some(club) = club else {
            return false;
        };
        let club = club.trim().to_lowercase();
        if club.is_empty() {
            return false;
        }
        self.priority_clubs
            .iter()
            .map(|c| c.trim().to_lowercase())
            .any(|c| !c.is_empty() && club.contains(&c))
    }

    pub fn nationality_allowed(&self, nationality: Option<&str>) -> bool {
        if self.eligible_nationalities.is_empty() {
            return true;
        }
        let Some(nationality) = nationality else {
            return false;
        };
        self.eligible_nationalities
            .iter()
            .any(|n| n.trim().eq_ignore_ascii_case(nationality.trim()))
    }
}

fn check_unit(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            name: name.to_string(),
            reason: format!("expected a weight in [0, 1], got {value}"),
        })
    }
}

fn check_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            name: name.to_string(),
            reason: format!("expected a positive number of hours, got {value}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn from_inline_yaml(raw: &str) -> Result<ScoringConfig, ConfigError> {
        ScoringConfig::from_yaml(raw, Path::new("inline.yaml"))
    }

    #[test]
    fn overrides_merge_over_defaults() {
        let config = from_inline_yaml(
            r#"
source_weights:
  Africa Football Daily: 0.75
  bbc: 0.9
event_keywords:
  penalty save: 0.6
recency:
  half_life_hours: 12
"#,
        )
        .expect("config parses");

        assert_eq!(config.source_weights["africa football daily"], 0.75);
        assert_eq!(config.source_weights["bbc"], 0.9);
        assert_eq!(config.source_weights["guardian"], 1.0);
        assert_eq!(config.event_keywords["penalty save"], 0.6);
        assert_eq!(config.event_keywords["hat-trick"], 1.0);
        assert_eq!(config.recency.half_life_hours, 12.0);
        assert_eq!(config.recency.window_hours, 48.0);
    }

    #[test]
    fn out_of_range_weight_is_rejected() {
        let err = from_inline_yaml("source_weights:\n  espn: 1.5\n")
            .expect_err("weight above one must fail");
        assert!(matches!(err, ConfigError::Invalid { ref name, .. } if name == "source_weights.espn"));
    }

    #[test]
    fn unknown_field_is_a_parse_error() {
        let err = from_inline_yaml("sourc_weights: {}\n").expect_err("typo must fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ScoringConfig::load(Some(Path::new("/definitely/not/here.yaml")))
            .expect("missing file is not an error");
        assert_eq!(config, ScoringConfig::default());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "min_minutes: 45\ncandidate_recency: half_life").expect("write");
        let config = ScoringConfig::load(Some(file.path())).expect("config loads");
        assert_eq!(config.min_minutes, 45);
        assert_eq!(config.candidate_recency, RecencyModel::HalfLife);
    }

    #[test]
    fn priority_club_matches_case_insensitively() {
        let config = ScoringConfig::default();
        assert!(config.is_priority_club(Some("Tottenham Hotspur")));
        assert!(config.is_priority_club(Some("arsenal")));
        assert!(!config.is_priority_club(Some("Brentford")));
        assert!(!config.is_priority_club(None));
    }

    #[test]
    fn nationality_filter_is_open_when_unconfigured() {
        let mut config = ScoringConfig::default();
        assert!(config.nationality_allowed(None));
        config.eligible_nationalities = vec!["Ghana".to_string(), "Egypt".to_string()];
        assert!(config.nationality_allowed(Some("egypt")));
        assert!(!config.nationality_allowed(Some("France")));
        assert!(!config.nationality_allowed(None));
    }
}
