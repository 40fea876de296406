use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::candidates::{build_mentions, CandidateBuilder, MatchPolicy};
use crate::config::ScoringConfig;
use crate::extract::{EntityExtractor, Lexicon, WhitelistMode};
use crate::models::{Candidate, Mention, NewsItem, Selection};
use crate::normalize::Normalizer;
use crate::roster::Roster;
use crate::scoring::Scorer;
use crate::select;
use crate::stats::{stat_mentions, StatLine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Roster candidates, composite score, one entry per player.
    Candidates,
    /// Name mentions, additive score, aggregated per player.
    Mentions,
    /// As `mentions`, restricted to whitelisted names.
    Whitelist,
    /// Player match stat lines, aggregated per player.
    Stats,
}

impl PipelineMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineMode::Candidates => "candidates",
            PipelineMode::Mentions => "mentions",
            PipelineMode::Whitelist => "whitelist",
            PipelineMode::Stats => "stats",
        }
    }

    fn whitelist_mode(self) -> WhitelistMode {
        match self {
            PipelineMode::Whitelist => WhitelistMode::Enforce,
            _ => WhitelistMode::Prefer,
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a run reads. Built once by the caller and borrowed by the run.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub config: ScoringConfig,
    pub now: DateTime<Utc>,
    pub top_n: usize,
    pub roster: Roster,
    pub whitelist: Option<Lexicon>,
    /// Drop club-only and non-whitelisted candidates in `candidates` mode.
    pub enforce_whitelist: bool,
    pub records: Vec<Value>,
    pub stats: Vec<StatLine>,
}

impl RunInputs {
    pub fn new(config: ScoringConfig, now: DateTime<Utc>, top_n: usize) -> Self {
        Self {
            config,
            now,
            top_n,
            roster: Roster::default(),
            whitelist: None,
            enforce_whitelist: false,
            records: Vec::new(),
            stats: Vec::new(),
        }
    }

    /// Normalizes the raw records with an extractor set up for `mode`.
    /// Candidates mode without a whitelist prefers names on the roster.
    pub fn news_items(&self, mode: PipelineMode) -> Vec<NewsItem> {
        let whitelist = match (mode, &self.whitelist) {
            (PipelineMode::Candidates, None) if !self.roster.is_empty() => Some(self.roster.lexicon()),
            _ => self.whitelist.clone(),
        };
        let extractor = EntityExtractor::new(&self.config, whitelist, mode.whitelist_mode());
        Normalizer::new(&extractor).normalize_all(self.records.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub items: usize,
    pub stat_lines: usize,
    pub considered: usize,
    pub eligible: usize,
}

/// Result of one run plus the scored material behind it, kept for audit.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub mode: PipelineMode,
    pub reference_time: DateTime<Utc>,
    pub top_n: usize,
    pub counts: RunCounts,
    pub selection: Selection,
    pub candidates: Vec<Candidate>,
    pub mentions: Vec<Mention>,
}

pub fn run(mode: PipelineMode, inputs: &RunInputs) -> RunOutcome {
    let outcome = match mode {
        PipelineMode::Candidates => run_candidates(inputs),
        PipelineMode::Mentions => run_mentions(inputs),
        PipelineMode::Whitelist => run_whitelist(inputs),
        PipelineMode::Stats => run_stats(inputs),
    };
    info!(
        mode = %mode,
        items = outcome.counts.items,
        stat_lines = outcome.counts.stat_lines,
        considered = outcome.counts.considered,
        eligible = outcome.counts.eligible,
        selected = outcome.selection.entries().len(),
        empty = outcome.selection.is_empty(),
        "run finished"
    );
    outcome
}

fn run_candidates(inputs: &RunInputs) -> RunOutcome {
    let items = inputs.news_items(PipelineMode::Candidates);
    let scorer = Scorer::new(&inputs.config, inputs.now);
    let policy = if inputs.enforce_whitelist {
        MatchPolicy::WhitelistEnforced
    } else {
        MatchPolicy::Permissive
    };
    let builder = CandidateBuilder::new(&inputs.roster, &scorer, policy, inputs.whitelist.as_ref());

    let candidates = builder.build_all(&items);
    let considered = candidates.len();
    let eligible = select::eligible_candidates(candidates, &inputs.config);
    let selection = select::select_diverse(&eligible, inputs.top_n);

    RunOutcome {
        mode: PipelineMode::Candidates,
        reference_time: inputs.now,
        top_n: inputs.top_n,
        counts: RunCounts {
            items: items.len(),
            stat_lines: 0,
            considered,
            eligible: eligible.len(),
        },
        selection,
        candidates: eligible,
        mentions: Vec::new(),
    }
}

fn run_mentions(inputs: &RunInputs) -> RunOutcome {
    let items = inputs.news_items(PipelineMode::Mentions);
    let scorer = Scorer::new(&inputs.config, inputs.now);
    let mentions = build_mentions(&items, &inputs.roster, &scorer, inputs.whitelist.as_ref());
    aggregated_outcome(PipelineMode::Mentions, inputs, items.len(), 0, mentions.len(), mentions)
}

fn run_whitelist(inputs: &RunInputs) -> RunOutcome {
    let items = inputs.news_items(PipelineMode::Whitelist);
    let scorer = Scorer::new(&inputs.config, inputs.now);
    let mentions = build_mentions(&items, &inputs.roster, &scorer, inputs.whitelist.as_ref());
    let considered = mentions.len();
    let eligible = select::whitelisted_mentions(mentions, inputs.whitelist.as_ref());
    aggregated_outcome(PipelineMode::Whitelist, inputs, items.len(), 0, considered, eligible)
}

fn run_stats(inputs: &RunInputs) -> RunOutcome {
    let scorer = Scorer::new(&inputs.config, inputs.now);
    let lines = select::eligible_stat_lines(inputs.stats.clone(), &inputs.config);
    let mentions = stat_mentions(&lines, &inputs.roster, &scorer);
    aggregated_outcome(PipelineMode::Stats, inputs, 0, inputs.stats.len(), inputs.stats.len(), mentions)
}

fn aggregated_outcome(
    mode: PipelineMode,
    inputs: &RunInputs,
    items: usize,
    stat_lines: usize,
    considered: usize,
    mentions: Vec<Mention>,
) -> RunOutcome {
    let selection = select::select_aggregated(&mentions, &inputs.config, inputs.top_n);
    RunOutcome {
        mode,
        reference_time: inputs.now,
        top_n: inputs.top_n,
        counts: RunCounts {
            items,
            stat_lines,
            considered,
            eligible: mentions.len(),
        },
        selection,
        candidates: Vec::new(),
        mentions,
    }
}
