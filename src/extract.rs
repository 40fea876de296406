use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::ScoringConfig;

const STOPWORDS: &[&str] = &[
    // clubs and club words
    "arsenal", "chelsea", "liverpool", "manchester", "city", "united", "tottenham", "spurs",
    "hotspur", "everton", "newcastle", "villa", "aston", "west", "ham", "brighton", "brentford",
    "fulham", "wolves", "wolverhampton", "wanderers", "crystal", "palace", "bournemouth",
    "nottingham", "forest", "leicester", "southampton", "ipswich", "leeds", "burnley", "sunderland",
    "barcelona", "madrid", "real", "atletico", "bayern", "munich", "dortmund", "juventus", "inter",
    "milan", "napoli", "roma", "lazio", "psg", "paris", "saint-germain", "marseille", "lyon",
    "monaco", "ajax", "porto", "benfica", "sporting", "celtic", "rangers", "galatasaray",
    "fenerbahce", "al", "nassr", "hilal", "ittihad",
    // competitions and bodies
    "premier", "league", "champions", "europa", "conference", "cup", "fa", "efl", "carabao",
    "la", "liga", "serie", "bundesliga", "ligue", "eredivisie", "uefa", "fifa", "caf", "africa",
    "african", "nations", "afcon", "world", "super", "club", "international", "championship",
    // football vocabulary
    "goal", "goals", "hat-trick", "brace", "assist", "assists", "penalty", "match", "matchday",
    "derby", "final", "semi-final", "quarter-final", "kick-off", "stadium", "coach", "manager",
    "boss", "striker", "midfielder", "defender", "goalkeeper", "keeper", "captain", "star",
    "player", "players", "transfer", "transfers", "injury", "news", "report", "preview", "review",
    "highlights", "live", "watch", "video", "gallery", "ratings", "team", "squad", "lineup",
    "football", "soccer", "sport", "sports", "motm", "debut", "win", "wins", "draw", "draws",
    "loss", "beat", "beats", "scores", "scored", "score", "clean", "sheet", "season",
    // common words that open headlines
    "the", "a", "an", "and", "or", "but", "of", "in", "on", "at", "to", "for", "from", "with",
    "by", "as", "vs", "v", "after", "before", "how", "why", "what", "who", "when", "where",
    "is", "are", "was", "were", "be", "new", "old", "late", "early", "first", "last", "top",
    "big", "best", "more", "his", "her", "their", "this", "that", "it", "its", "we", "you",
    "he", "she", "they", "i", "my", "our", "says", "said", "will", "can", "could", "should",
    "breaking", "exclusive", "official", "confirmed", "update", "updates",
    // calendar
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

const NON_PERSON_PHRASES: &[&str] = &[
    "var review",
    "golden boot",
    "ballon d'or",
    "player of the month",
    "team of the week",
    "boxing day",
    "deadline day",
];

/// How a configured name list constrains the raw candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhitelistMode {
    /// Keep whitelisted names when any are present, otherwise keep everything.
    Prefer,
    /// Keep only whitelisted names, with no fallback.
    Enforce,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lexicon {
    names: HashSet<String>,
}

impl Lexicon {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| normalize_name(n.as_ref()))
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    /// Loads a whitelist file: a JSON array of names, or plain text with one
    /// name per line and `#` comments. A missing file yields `None` so the
    /// caller runs in pattern-only mode.
    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            info!(path = %path.display(), "no whitelist file, extracting by pattern only");
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read whitelist {}", path.display()))?;
        let lexicon = if raw.trim_start().starts_with('[') {
            let names: Vec<String> = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse whitelist {}", path.display()))?;
            Self::new(names)
        } else {
            Self::new(
                raw.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#')),
            )
        };
        if lexicon.is_empty() {
            warn!(path = %path.display(), "whitelist file lists no names");
        }
        debug!(path = %path.display(), names = lexicon.len(), "loaded whitelist");
        Ok(Some(lexicon))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone)]
pub struct EntityExtractor {
    token: Regex,
    stopwords: HashSet<String>,
    non_person: HashSet<String>,
    whitelist: Option<Lexicon>,
    mode: WhitelistMode,
}

impl EntityExtractor {
    pub fn new(config: &ScoringConfig, whitelist: Option<Lexicon>, mode: WhitelistMode) -> Self {
        let stopwords = STOPWORDS
            .iter()
            .map(|s| s.to_string())
            .chain(config.extra_stopwords.iter().map(|s| s.trim().to_lowercase()))
            .collect();
        let non_person = NON_PERSON_PHRASES
            .iter()
            .map(|s| s.to_string())
            .chain(config.non_person_phrases.iter().map(|s| normalize_name(s)))
            .collect();
        Self {
            // A word: letters with inner hyphens or apostrophes.
            token: Regex::new(r"\p{L}[\p{L}'’\-]*").expect("token pattern is valid"),
            stopwords,
            non_person,
            whitelist,
            mode,
        }
    }

    pub fn whitelist(&self) -> Option<&Lexicon> {
        self.whitelist.as_ref()
    }

    pub fn mode(&self) -> WhitelistMode {
        self.mode
    }

    /// Ordered, deduplicated person-name candidates for `text`.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let raw = self.raw_candidates(text);
        match (&self.whitelist, self.mode) {
            (None, _) => raw,
            (Some(lexicon), WhitelistMode::Enforce) => {
                raw.into_iter().filter(|name| lexicon.contains(name)).collect()
            }
            (Some(lexicon), WhitelistMode::Prefer) => {
                let known: Vec<String> =
                    raw.iter().filter(|name| lexicon.contains(name)).cloned().collect();
                if known.is_empty() { raw } else { known }
            }
        }
    }

    fn raw_candidates(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for run in self.capitalized_runs(text) {
            for segment in run.split(|token| self.is_stopword(token)) {
                if let Some(name) = self.accept_segment(segment) {
                    if seen.insert(normalize_name(&name)) {
                        out.push(name);
                    }
                }
            }
        }
        out
    }

    fn capitalized_runs(&self, text: &str) -> Vec<Vec<String>> {
        let mut runs = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut last_end = 0;

        for m in self.token.find_iter(text) {
            let gap = &text[last_end..m.start()];
            let joined = gap.chars().all(|c| c == ' ' || c == '\t');
            if !joined && !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
            let word = strip_possessive(m.as_str());
            if word.chars().next().is_some_and(char::is_uppercase) {
                current.push(word.to_string());
            } else if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
            // A possessive closes the run: "Arsenal's Bukayo Saka".
            if word.len() != m.as_str().len() && !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
            last_end = m.end();
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }

    fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(&token.to_lowercase())
    }

    /// A segment too long to be a name can still carry a whitelisted one:
    /// "Victor Osimhen Nets Winner" yields "Victor Osimhen" when it is listed.
    fn accept_segment(&self, segment: &[String]) -> Option<String> {
        if segment.len() >= 3 {
            if let Some(name) = self.known_window(segment) {
                return Some(name);
            }
        }
        self.accept(segment)
    }

    fn known_window(&self, segment: &[String]) -> Option<String> {
        let lexicon = self.whitelist.as_ref()?;
        [3, 2]
            .into_iter()
            .filter(|width| *width <= segment.len())
            .find_map(|width| {
                segment
                    .windows(width)
                    .filter_map(|window| self.accept(window))
                    .find(|name| lexicon.contains(name))
            })
    }

    fn accept(&self, segment: &[String]) -> Option<String> {
        if !(2..=3).contains(&segment.len()) {
            return None;
        }
        let last = segment.last()?;
        if is_club_suffix(last) {
            return None;
        }
        if !segment.iter().all(|token| is_name_shaped(token)) {
            return None;
        }
        let name = segment.join(" ");
        if self.non_person.contains(&normalize_name(&name)) {
            return None;
        }
        Some(name)
    }
}

fn strip_possessive(word: &str) -> &str {
    word.strip_suffix("'s")
        .or_else(|| word.strip_suffix("’s"))
        .or_else(|| word.strip_suffix('\''))
        .unwrap_or(word)
}

fn is_club_suffix(token: &str) -> bool {
    let len = token.chars().count();
    (2..=3).contains(&len) && token.chars().all(|c| c.is_uppercase())
}

/// Each hyphen part starts uppercase and continues lowercase
/// ("Alexander-Arnold", not "McTominay" or "hat-trick").
fn is_name_shaped(token: &str) -> bool {
    token.split('-').all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(first) if first.is_uppercase() => {
                chars.all(|c| c.is_lowercase() || c == '\'' || c == '’')
            }
            _ => false,
        }
    })
}
