use std::collections::HashSet;

use tracing::debug;

use crate::extract::{normalize_name, Lexicon};
use crate::models::{Candidate, MatchKind, Mention, NewsItem, Player};
use crate::roster::Roster;
use crate::scoring::{mention_score, RecencyModel, Scorer, DEFAULT_NOVELTY};

/// How loosely an item may be tied to a roster player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Name, alias, and (for items naming no rostered player at all) club-only matches.
    Permissive,
    /// Name and alias matches only, and the player must be on the whitelist when one is set.
    WhitelistEnforced,
}

/// Pairs news items with roster players and scores each pairing.
pub struct CandidateBuilder<'a> {
    roster: &'a Roster,
    scorer: &'a Scorer<'a>,
    policy: MatchPolicy,
    whitelist: Option<&'a Lexicon>,
}

impl<'a> CandidateBuilder<'a> {
    pub fn new(
        roster: &'a Roster,
        scorer: &'a Scorer<'a>,
        policy: MatchPolicy,
        whitelist: Option<&'a Lexicon>,
    ) -> Self {
        Self {
            roster,
            scorer,
            policy,
            whitelist,
        }
    }

    pub fn build_all(&self, items: &[NewsItem]) -> Vec<Candidate> {
        let candidates: Vec<Candidate> = items.iter().flat_map(|item| self.build(item)).collect();
        debug!(
            items = items.len(),
            candidates = candidates.len(),
            policy = ?self.policy,
            "built candidates"
        );
        candidates
    }

    /// Candidates for one item, at most one per player, in first-seen order.
    pub fn build(&self, item: &NewsItem) -> Vec<Candidate> {
        let text = item.text();
        let mut matches: Vec<(&Player, MatchKind)> = Vec::new();

        for name in &item.extracted_players {
            match self.roster.resolve(name) {
                Some(found) => push_best(&mut matches, found),
                None => debug!(item = %item.id, name = %name, "name not on roster, dropped"),
            }
        }
        for found in self.roster.mentioned_in(&text) {
            push_best(&mut matches, found);
        }
        if matches.is_empty() && self.policy == MatchPolicy::Permissive {
            for player in self.roster.club_mentioned_in(&text) {
                push_best(&mut matches, (player, MatchKind::ClubOnly));
            }
        }

        matches
            .into_iter()
            .filter(|(player, kind)| self.allowed(player, *kind))
            .map(|(player, kind)| self.candidate(item, &text, player, kind))
            .collect()
    }

    fn allowed(&self, player: &Player, kind: MatchKind) -> bool {
        match self.policy {
            MatchPolicy::Permissive => true,
            MatchPolicy::WhitelistEnforced => {
                kind != MatchKind::ClubOnly
                    && self.whitelist.map_or(true, |lexicon| {
                        lexicon.contains(&player.name)
                            || player.aliases.iter().any(|alias| lexicon.contains(alias))
                    })
            }
        }
    }

    fn candidate(&self, item: &NewsItem, text: &str, player: &Player, kind: MatchKind) -> Candidate {
        let config = self.scorer.config();
        let mut candidate = Candidate {
            item_id: item.id.clone(),
            title: item.title.clone(),
            source: item.source.clone(),
            link: item.link.clone(),
            published_at: item.published_at,
            player: player.clone(),
            match_kind: kind,
            direct_mention_score: kind.direct_mention_score(),
            event_importance: self.scorer.event_boost(text),
            source_authority: self.scorer.source_weight(&item.source),
            recency_score: self
                .scorer
                .recency_weight(item.published_at, config.candidate_recency),
            novelty_score: DEFAULT_NOVELTY,
            language_match: self.scorer.language_match(item.language.as_deref()),
            score: 0.0,
        };
        self.scorer.score_candidate(&mut candidate);
        candidate
    }
}

/// Name mentions for the aggregation path: one per distinct name per item.
/// Names resolve to the roster when possible and are kept as found otherwise.
/// Whitelisted names get the configured additive boost.
pub fn build_mentions(
    items: &[NewsItem],
    roster: &Roster,
    scorer: &Scorer<'_>,
    whitelist: Option<&Lexicon>,
) -> Vec<Mention> {
    let config = scorer.config();
    let mut mentions = Vec::new();

    for item in items {
        let text = item.text();
        let event = scorer.event_boost(&text);
        let source = scorer.source_weight(&item.source);
        let recency = scorer.recency_weight(item.published_at, RecencyModel::HalfLife);
        let mut seen = HashSet::new();

        for found in &item.extracted_players {
            let resolved = roster.resolve(found).map(|(player, _)| player);
            let name = resolved.map_or_else(|| found.trim().to_string(), |p| p.name.clone());
            let key = resolved
                .and_then(|p| p.id.clone())
                .unwrap_or_else(|| normalize_name(&name));
            if name.is_empty() || !seen.insert(key) {
                continue;
            }
            let boost = match whitelist {
                Some(lexicon) if lexicon.contains(found) || lexicon.contains(&name) => {
                    config.whitelist_boost
                }
                _ => 0.0,
            };
            mentions.push(Mention {
                name,
                matched_name: found.trim().to_string(),
                player_id: resolved.and_then(|p| p.id.clone()),
                club: resolved.and_then(|p| p.club.clone()),
                item_id: item.id.clone(),
                title: item.title.clone(),
                source: item.source.clone(),
                link: item.link.clone(),
                score: mention_score(source, recency, event, boost),
            });
        }
    }

    debug!(items = items.len(), mentions = mentions.len(), "built name mentions");
    mentions
}

fn push_best<'p>(matches: &mut Vec<(&'p Player, MatchKind)>, found: (&'p Player, MatchKind)) {
    let (player, kind) = found;
    match matches.iter_mut().find(|(p, _)| p.name == player.name) {
        Some(existing) => {
            if kind.direct_mention_score() > existing.1.direct_mention_score() {
                existing.1 = kind;
            }
        }
        None => matches.push((player, kind)),
    }
}
