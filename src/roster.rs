use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::extract::{normalize_name, Lexicon};
use crate::models::{MatchKind, Player};

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("failed to read roster {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse roster {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse roster csv {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RosterFile {
    List(Vec<RawPlayer>),
    Wrapped { players: Vec<RawPlayer> },
}

#[derive(Deserialize)]
struct RawPlayer {
    #[serde(default)]
    id: Option<serde_json::Value>,
    name: String,
    #[serde(default)]
    club: Option<String>,
    #[serde(default, alias = "country")]
    nationality: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

impl RawPlayer {
    fn into_player(self) -> Player {
        let id = match self.id {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Player {
            id,
            name: self.name.trim().to_string(),
            club: non_empty(self.club),
            nationality: non_empty(self.nationality),
            aliases: self.aliases,
        }
    }
}

/// The master list of tracked players, indexed by canonical name, alias and id.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    players: Vec<Player>,
    by_name: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl Roster {
    pub fn new(players: Vec<Player>) -> Self {
        let mut roster = Roster::default();
        for player in players {
            let key = normalize_name(&player.name);
            if key.is_empty() {
                warn!("skipping roster entry without a name");
                continue;
            }
            if roster.by_name.contains_key(&key) {
                warn!(name = %player.name, "duplicate roster name, keeping the first entry");
                continue;
            }
            let index = roster.players.len();
            roster.by_name.insert(key, index);
            for alias in &player.aliases {
                let alias = normalize_name(alias);
                if !alias.is_empty() {
                    roster.by_alias.entry(alias).or_insert(index);
                }
            }
            if let Some(id) = &player.id {
                roster.by_id.entry(id.clone()).or_insert(index);
            }
            roster.players.push(player);
        }
        roster
    }

    /// Loads a roster from JSON (a list, or an object with `players`) or,
    /// for `.csv` paths, from CSV with `name,id,club,nationality,aliases`
    /// columns where aliases are `|`-separated.
    pub fn load(path: &Path) -> Result<Self, RosterError> {
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let players = if is_csv {
            load_csv(path)?
        } else {
            let raw = std::fs::read_to_string(path).map_err(|source| RosterError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let file: RosterFile = serde_json::from_str(&raw).map_err(|source| RosterError::Json {
                path: path.to_path_buf(),
                source,
            })?;
            let raw_players = match file {
                RosterFile::List(players) | RosterFile::Wrapped { players } => players,
            };
            raw_players.into_iter().map(RawPlayer::into_player).collect()
        };
        let roster = Self::new(players);
        debug!(path = %path.display(), players = roster.len(), "loaded roster");
        Ok(roster)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn by_id(&self, id: &str) -> Option<&Player> {
        self.by_id.get(id).map(|&i| &self.players[i])
    }

    /// Resolves a free-form name to a roster player by canonical name first,
    /// then by alias.
    pub fn resolve(&self, name: &str) -> Option<(&Player, MatchKind)> {
        let key = normalize_name(name);
        if let Some(&i) = self.by_name.get(&key) {
            return Some((&self.players[i], MatchKind::Exact));
        }
        self.by_alias
            .get(&key)
            .map(|&i| (&self.players[i], MatchKind::Alias))
    }

    /// Every player whose name or an alias appears in `text` as whole words,
    /// in roster order.
    pub fn mentioned_in(&self, text: &str) -> Vec<(&Player, MatchKind)> {
        let haystack = normalize_name(text);
        self.players
            .iter()
            .filter_map(|player| {
                if contains_phrase(&haystack, &normalize_name(&player.name)) {
                    Some((player, MatchKind::Exact))
                } else if player
                    .aliases
                    .iter()
                    .any(|alias| contains_phrase(&haystack, &normalize_name(alias)))
                {
                    Some((player, MatchKind::Alias))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Players whose club is named in `text`.
    pub fn club_mentioned_in(&self, text: &str) -> Vec<&Player> {
        let haystack = normalize_name(text);
        self.players
            .iter()
            .filter(|player| {
                player
                    .club
                    .as_deref()
                    .is_some_and(|club| contains_phrase(&haystack, &normalize_name(club)))
            })
            .collect()
    }

    /// Canonical names and aliases, usable as an extractor whitelist.
    pub fn lexicon(&self) -> Lexicon {
        Lexicon::new(
            self.players
                .iter()
                .flat_map(|p| std::iter::once(p.name.as_str()).chain(p.aliases.iter().map(String::as_str))),
        )
    }
}

fn load_csv(path: &Path) -> Result<Vec<Player>, RosterError> {
    #[derive(Deserialize)]
    struct CsvRow {
        name: String,
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        club: Option<String>,
        #[serde(default)]
        nationality: Option<String>,
        #[serde(default)]
        aliases: Option<String>,
    }

    let csv_error = |source: csv::Error| RosterError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    let mut players = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result.map_err(csv_error)?;
        players.push(Player {
            id: non_empty(row.id),
            name: row.name.trim().to_string(),
            club: non_empty(row.club),
            nationality: non_empty(row.nationality),
            aliases: row
                .aliases
                .unwrap_or_default()
                .split('|')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from)
                .collect(),
        });
    }

    Ok(players)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Whole-word containment on already-normalized text.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let before_ok = haystack[..begin]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = begin + haystack[begin..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn player(name: &str, club: Option<&str>, aliases: &[&str]) -> Player {
        Player {
            id: None,
            name: name.to_string(),
            club: club.map(String::from),
            nationality: None,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn roster() -> Roster {
        Roster::new(vec![
            player("Mohamed Salah", Some("Liverpool"), &["Mo Salah"]),
            player("Thomas Partey", Some("Arsenal"), &[]),
            player("Mohammed Kudus", Some("West Ham United"), &["Kudus"]),
        ])
    }

    #[test]
    fn resolves_exact_before_alias() {
        let roster = roster();
        let (p, kind) = roster.resolve("  mohamed   SALAH ").expect("resolves");
        assert_eq!(p.name, "Mohamed Salah");
        assert_eq!(kind, MatchKind::Exact);
        let (p, kind) = roster.resolve("Mo Salah").expect("resolves");
        assert_eq!(p.name, "Mohamed Salah");
        assert_eq!(kind, MatchKind::Alias);
        assert!(roster.resolve("Bukayo Saka").is_none());
    }

    #[test]
    fn finds_whole_word_mentions() {
        let roster = roster();
        let found = roster.mentioned_in("Kudus fires West Ham level; Salah rested");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.name, "Mohammed Kudus");
        assert_eq!(found[0].1, MatchKind::Alias);
        assert!(roster.mentioned_in("Kudusz is not a player").is_empty());
    }

    #[test]
    fn finds_club_mentions() {
        let roster = roster();
        let found = roster.club_mentioned_in("Arsenal held at home");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Thomas Partey");
    }

    #[test]
    fn duplicate_names_keep_first() {
        let roster = Roster::new(vec![
            player("Sadio Mane", Some("Al Nassr"), &[]),
            player("sadio mane", Some("Liverpool"), &[]),
        ]);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.players[0].club.as_deref(), Some("Al Nassr"));
    }

    #[test]
    fn loads_json_with_numeric_ids() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().expect("temp file");
        write!(
            file,
            r#"{{"players": [{{"id": 306, "name": "Mohamed Salah", "club": "Liverpool", "country": "Egypt", "aliases": ["Mo Salah"]}},
                             {{"name": "Thomas Partey", "club": ""}}]}}"#
        )
        .expect("write");
        let roster = Roster::load(file.path()).expect("loads");
        assert_eq!(roster.len(), 2);
        let salah = roster.by_id("306").expect("by id");
        assert_eq!(salah.nationality.as_deref(), Some("Egypt"));
        assert_eq!(roster.players[1].club, None);
    }

    #[test]
    fn loads_csv_with_pipe_aliases() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().expect("temp file");
        writeln!(file, "name,id,club,nationality,aliases").expect("write");
        writeln!(file, "Victor Osimhen,9,Galatasaray,Nigeria,Osimhen|Victor O.").expect("write");
        writeln!(file, "Achraf Hakimi,,PSG,Morocco,").expect("write");
        let roster = Roster::load(file.path()).expect("loads");
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.players[0].aliases, vec!["Osimhen", "Victor O."]);
        assert_eq!(roster.players[1].id, None);
        assert!(roster.lexicon().contains("osimhen"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().expect("temp file");
        write!(file, "{{not json").expect("write");
        assert!(matches!(Roster::load(file.path()), Err(RosterError::Json { .. })));
    }

    #[test]
    fn phrase_match_respects_word_boundaries() {
        assert!(contains_phrase("salah scores again", "salah"));
        assert!(!contains_phrase("salahs", "salah"));
        assert!(contains_phrase("x salahs, salah!", "salah"));
        assert!(!contains_phrase("anything", ""));
    }
}
