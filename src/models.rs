use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
    pub link: Option<String>,
    pub language: Option<String>,
    pub extracted_players: Vec<String>,
}

impl NewsItem {
    /// Title and summary joined, the text every keyword scan runs over.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: Option<String>,
    pub name: String,
    pub club: Option<String>,
    pub nationality: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Alias,
    ClubOnly,
}

impl MatchKind {
    pub fn direct_mention_score(self) -> f64 {
        match self {
            MatchKind::Exact => 1.0,
            MatchKind::Alias => 0.7,
            MatchKind::ClubOnly => 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub item_id: String,
    pub title: String,
    pub source: String,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub player: Player,
    pub match_kind: MatchKind,
    pub direct_mention_score: f64,
    pub event_importance: f64,
    pub source_authority: f64,
    pub recency_score: f64,
    pub novelty_score: f64,
    pub language_match: f64,
    pub score: f64,
}

/// One occurrence of a player name in one item or stat line.
#[derive(Debug, Clone, Serialize)]
pub struct Mention {
    /// Canonical roster name when resolved, otherwise the name as found.
    pub name: String,
    pub matched_name: String,
    pub player_id: Option<String>,
    pub club: Option<String>,
    pub item_id: String,
    pub title: String,
    pub source: String,
    pub link: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedEntityScore {
    pub name: String,
    pub player_id: Option<String>,
    pub club: Option<String>,
    pub score: f64,
    pub mention_count: usize,
    pub distinct_source_count: usize,
    pub sample_headline: Option<String>,
    pub contributing_item_ids: Vec<String>,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedEntity {
    pub rank: usize,
    pub name: String,
    pub club: Option<String>,
    pub score: f64,
    pub mention_count: usize,
    pub distinct_source_count: usize,
    pub sample_headline: Option<String>,
    pub item_ids: Vec<String>,
    pub links: Vec<String>,
}

/// Result of a selection. `Empty` is a normal outcome ("no news today"),
/// not a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "entries", rename_all = "snake_case")]
pub enum Selection {
    Empty,
    Ranked(Vec<SelectedEntity>),
}

impl Selection {
    pub fn from_entries(entries: Vec<SelectedEntity>) -> Self {
        if entries.is_empty() {
            Selection::Empty
        } else {
            Selection::Ranked(entries)
        }
    }

    pub fn entries(&self) -> &[SelectedEntity] {
        match self {
            Selection::Empty => &[],
            Selection::Ranked(entries) => entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Empty)
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: uuid::Uuid,
    pub mode: String,
    pub reference_time: DateTime<Utc>,
    pub item_count: i32,
    pub selected_count: i64,
    pub created_at: DateTime<Utc>,
}
