use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::config::ScoringConfig;
use crate::extract::{normalize_name, Lexicon};
use crate::models::{AggregatedEntityScore, Candidate, Mention, SelectedEntity, Selection};
use crate::scoring::round_to;
use crate::stats::StatLine;

/// Grouping identity: the roster id when known, otherwise the normalized name.
fn entity_key(player_id: Option<&str>, name: &str) -> String {
    match player_id {
        Some(id) => format!("id:{id}"),
        None => format!("name:{}", normalize_name(name)),
    }
}

/// Keeps mentions whose matched name is on the whitelist. With no whitelist
/// configured nothing is eligible: this path has no fallback.
pub fn whitelisted_mentions(mentions: Vec<Mention>, whitelist: Option<&Lexicon>) -> Vec<Mention> {
    let Some(whitelist) = whitelist else {
        debug!(dropped = mentions.len(), "no whitelist configured, every mention is ineligible");
        return Vec::new();
    };
    let before = mentions.len();
    let kept: Vec<Mention> = mentions
        .into_iter()
        .filter(|m| whitelist.contains(&m.matched_name) || whitelist.contains(&m.name))
        .collect();
    debug!(before, kept = kept.len(), "applied whitelist eligibility");
    kept
}

pub fn eligible_candidates(candidates: Vec<Candidate>, config: &ScoringConfig) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| config.nationality_allowed(c.player.nationality.as_deref()))
        .collect()
}

/// Minimum minutes played plus the nationality restriction.
pub fn eligible_stat_lines(lines: Vec<StatLine>, config: &ScoringConfig) -> Vec<StatLine> {
    let before = lines.len();
    let kept: Vec<StatLine> = lines
        .into_iter()
        .filter(|line| line.minutes >= config.min_minutes)
        .filter(|line| config.nationality_allowed(line.nationality.as_deref()))
        .collect();
    debug!(before, kept = kept.len(), min_minutes = config.min_minutes, "applied stat eligibility");
    kept
}

/// One entry per entity, in first-seen order. Scores are summed, sources
/// counted as a set, the first non-empty club and headline win.
pub fn aggregate(mentions: &[Mention]) -> Vec<AggregatedEntityScore> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<AggregatedEntityScore> = Vec::new();
    let mut sources: Vec<BTreeSet<String>> = Vec::new();

    for mention in mentions {
        let key = entity_key(mention.player_id.as_deref(), &mention.name);
        let slot = *index.entry(key).or_insert_with(|| {
            entries.push(AggregatedEntityScore {
                name: mention.name.clone(),
                player_id: mention.player_id.clone(),
                club: None,
                score: 0.0,
                mention_count: 0,
                distinct_source_count: 0,
                sample_headline: None,
                contributing_item_ids: Vec::new(),
                links: Vec::new(),
            });
            sources.push(BTreeSet::new());
            entries.len() - 1
        });

        let entry = &mut entries[slot];
        entry.score += mention.score;
        entry.mention_count += 1;
        sources[slot].insert(mention.source.trim().to_lowercase());
        entry.distinct_source_count = sources[slot].len();
        if entry.club.is_none() {
            entry.club = mention.club.clone().filter(|c| !c.trim().is_empty());
        }
        if entry.sample_headline.is_none() && !mention.title.trim().is_empty() {
            entry.sample_headline = Some(mention.title.clone());
        }
        entry.contributing_item_ids.push(mention.item_id.clone());
        if let Some(link) = &mention.link {
            if !entry.links.contains(link) {
                entry.links.push(link.clone());
            }
        }
    }

    entries
}

/// Descending score (rounded to 6 places), then more distinct sources,
/// then priority clubs, then name.
pub fn ranking_order(a: &AggregatedEntityScore, b: &AggregatedEntityScore, config: &ScoringConfig) -> Ordering {
    round_to(b.score, 6)
        .total_cmp(&round_to(a.score, 6))
        .then_with(|| b.distinct_source_count.cmp(&a.distinct_source_count))
        .then_with(|| {
            config
                .is_priority_club(b.club.as_deref())
                .cmp(&config.is_priority_club(a.club.as_deref()))
        })
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.player_id.cmp(&b.player_id))
}

pub fn rank(mut entries: Vec<AggregatedEntityScore>, config: &ScoringConfig) -> Vec<AggregatedEntityScore> {
    entries.sort_by(|a, b| ranking_order(a, b, config));
    entries
}

/// Fully aggregated top-N.
pub fn select_aggregated(mentions: &[Mention], config: &ScoringConfig, top_n: usize) -> Selection {
    let ranked = rank(aggregate(mentions), config);
    let entries = ranked
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, entry)| SelectedEntity {
            rank: i + 1,
            name: entry.name,
            club: entry.club,
            score: round_to(entry.score, 6),
            mention_count: entry.mention_count,
            distinct_source_count: entry.distinct_source_count,
            sample_headline: entry.sample_headline,
            item_ids: entry.contributing_item_ids,
            links: entry.links,
        })
        .collect();
    Selection::from_entries(entries)
}

/// Raw top-N with diversity: candidates sorted by score, the first one seen
/// for each player is kept until `top_n` players are collected.
pub fn select_diverse(candidates: &[Candidate], top_n: usize) -> Selection {
    let mut sorted: Vec<&Candidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.player.name.to_lowercase().cmp(&b.player.name.to_lowercase()))
            .then_with(|| a.item_id.cmp(&b.item_id))
    });

    let mut per_entity: HashMap<String, Vec<&Candidate>> = HashMap::new();
    for &candidate in &sorted {
        per_entity
            .entry(entity_key(candidate.player.id.as_deref(), &candidate.player.name))
            .or_default()
            .push(candidate);
    }

    let mut seen = BTreeSet::new();
    let mut entries = Vec::new();
    for candidate in &sorted {
        if entries.len() >= top_n {
            break;
        }
        let key = entity_key(candidate.player.id.as_deref(), &candidate.player.name);
        if !seen.insert(key.clone()) {
            continue;
        }
        let group = &per_entity[&key];
        let sources: BTreeSet<String> = group.iter().map(|c| c.source.trim().to_lowercase()).collect();
        let mut links: Vec<String> = Vec::new();
        for link in group.iter().filter_map(|c| c.link.clone()) {
            if !links.contains(&link) {
                links.push(link);
            }
        }
        entries.push(SelectedEntity {
            rank: entries.len() + 1,
            name: candidate.player.name.clone(),
            club: candidate.player.club.clone(),
            score: candidate.score,
            mention_count: group.len(),
            distinct_source_count: sources.len(),
            sample_headline: group
                .iter()
                .map(|c| c.title.trim())
                .find(|t| !t.is_empty())
                .map(String::from),
            item_ids: group.iter().map(|c| c.item_id.clone()).collect(),
            links,
        });
    }

    Selection::from_entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchKind, Player};

    fn mention(name: &str, source: &str, item: &str, score: f64) -> Mention {
        Mention {
            name: name.to_string(),
            matched_name: name.to_string(),
            player_id: None,
            club: None,
            item_id: item.to_string(),
            title: format!("{name} headline"),
            source: source.to_string(),
            link: Some(format!("https://example.com/{item}")),
            score,
        }
    }

    fn candidate(name: &str, item: &str, source: &str, score: f64) -> Candidate {
        Candidate {
            item_id: item.to_string(),
            title: format!("{name} in {item}"),
            source: source.to_string(),
            link: None,
            published_at: None,
            player: Player {
                id: None,
                name: name.to_string(),
                club: None,
                nationality: None,
                aliases: vec![],
            },
            match_kind: MatchKind::Exact,
            direct_mention_score: 1.0,
            event_importance: 0.0,
            source_authority: 0.5,
            recency_score: 0.7,
            novelty_score: 1.0,
            language_match: 1.0,
            score,
        }
    }

    #[test]
    fn mentions_of_same_player_merge() {
        let mentions = vec![
            mention("Thomas Partey", "guardian", "i1", 1.6),
            mention("thomas partey ", "bbc", "i2", 1.45),
        ];
        let aggregated = aggregate(&mentions);
        assert_eq!(aggregated.len(), 1);
        let partey = &aggregated[0];
        assert_eq!(partey.name, "Thomas Partey");
        assert_eq!(partey.mention_count, 2);
        assert_eq!(partey.distinct_source_count, 2);
        assert!((partey.score - 3.05).abs() < 1e-9);
        assert_eq!(partey.contributing_item_ids, vec!["i1", "i2"]);
        assert_eq!(partey.sample_headline.as_deref(), Some("Thomas Partey headline"));
    }

    #[test]
    fn distinct_sources_are_a_set() {
        let mentions = vec![
            mention("Sadio Mane", "ESPN", "i1", 1.2),
            mention("Sadio Mane", "espn", "i2", 1.2),
            mention("Sadio Mane", "espn", "i3", 1.2),
        ];
        let aggregated = aggregate(&mentions);
        assert_eq!(aggregated[0].mention_count, 3);
        assert_eq!(aggregated[0].distinct_source_count, 1);
    }

    #[test]
    fn first_non_empty_club_and_headline_win() {
        let mut a = mention("Sadio Mane", "espn", "i1", 1.0);
        a.title = "  ".to_string();
        let mut b = mention("Sadio Mane", "bbc", "i2", 1.0);
        b.club = Some("Al Nassr".to_string());
        b.title = "Mane scores".to_string();
        let mut c = mention("Sadio Mane", "sky", "i3", 1.0);
        c.club = Some("Liverpool".to_string());
        let aggregated = aggregate(&[a, b, c]);
        assert_eq!(aggregated[0].club.as_deref(), Some("Al Nassr"));
        assert_eq!(aggregated[0].sample_headline.as_deref(), Some("Mane scores"));
    }

    #[test]
    fn ties_break_alphabetically_regardless_of_input_order() {
        let config = ScoringConfig::default();
        let forward = vec![
            mention("Yves Bissouma", "bbc", "i1", 1.5),
            mention("Andre Onana", "bbc", "i2", 1.5),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        for mentions in [forward, backward] {
            let selection = select_aggregated(&mentions, &config, 3);
            let names: Vec<&str> = selection.entries().iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, vec!["Andre Onana", "Yves Bissouma"]);
        }
    }

    #[test]
    fn more_sources_beat_fewer_on_equal_score() {
        let config = ScoringConfig::default();
        let mentions = vec![
            mention("Andre Onana", "bbc", "i1", 2.0),
            mention("Yves Bissouma", "bbc", "i2", 1.0),
            mention("Yves Bissouma", "sky", "i3", 1.0),
        ];
        let selection = select_aggregated(&mentions, &config, 3);
        assert_eq!(selection.entries()[0].name, "Yves Bissouma");
    }

    #[test]
    fn priority_club_breaks_remaining_ties() {
        let config = ScoringConfig::default();
        let mut a = mention("Andre Onana", "bbc", "i1", 1.5);
        a.club = Some("Aston Villa".to_string());
        let mut b = mention("Yves Bissouma", "bbc", "i2", 1.5);
        b.club = Some("Tottenham Hotspur".to_string());
        let selection = select_aggregated(&[a, b], &config, 3);
        assert_eq!(selection.entries()[0].name, "Yves Bissouma");
    }

    #[test]
    fn float_noise_does_not_reorder() {
        let config = ScoringConfig::default();
        let mentions = vec![
            mention("Yves Bissouma", "bbc", "i1", 0.1 + 0.2),
            mention("Andre Onana", "bbc", "i2", 0.3),
        ];
        let selection = select_aggregated(&mentions, &config, 2);
        assert_eq!(selection.entries()[0].name, "Andre Onana");
    }

    #[test]
    fn top_three_of_ten_is_strictly_descending() {
        let config = ScoringConfig::default();
        let mentions: Vec<Mention> = (0..10)
            .map(|i| mention(&format!("Player Number{i}"), "bbc", &format!("i{i}"), 1.0 + i as f64 / 10.0))
            .collect();
        let selection = select_aggregated(&mentions, &config, 3);
        let entries = selection.entries();
        assert_eq!(entries.len(), 3);
        assert!(entries.windows(2).all(|w| w[0].score > w[1].score));
        assert_eq!(entries[0].name, "Player Number9");
        assert_eq!(entries.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn fewer_entities_than_requested_returns_all() {
        let config = ScoringConfig::default();
        let mentions = vec![
            mention("Andre Onana", "bbc", "i1", 1.2),
            mention("Yves Bissouma", "bbc", "i2", 1.9),
        ];
        let selection = select_aggregated(&mentions, &config, 5);
        assert_eq!(selection.entries().len(), 2);
        assert_eq!(selection.entries()[0].name, "Yves Bissouma");
    }

    #[test]
    fn empty_input_is_an_empty_selection() {
        let config = ScoringConfig::default();
        assert_eq!(select_aggregated(&[], &config, 3), Selection::Empty);
        assert_eq!(select_diverse(&[], 3), Selection::Empty);
    }

    #[test]
    fn aggregated_score_grows_with_each_mention() {
        let config = ScoringConfig::default();
        let mut mentions = Vec::new();
        let mut previous = 0.0;
        for i in 0..5 {
            mentions.push(mention("Mohammed Kudus", "bbc", &format!("i{i}"), 1.0));
            let selection = select_aggregated(&mentions, &config, 1);
            let score = selection.entries()[0].score;
            assert!(score > previous);
            previous = score;
        }
    }

    #[test]
    fn diverse_selection_keeps_first_per_player() {
        let candidates = vec![
            candidate("Mohamed Salah", "i1", "bbc", 0.9),
            candidate("Mohamed Salah", "i2", "sky", 0.85),
            candidate("Thomas Partey", "i3", "bbc", 0.6),
            candidate("Sadio Mane", "i4", "espn", 0.7),
        ];
        let selection = select_diverse(&candidates, 2);
        let entries = selection.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Mohamed Salah");
        assert_eq!(entries[0].score, 0.9);
        assert_eq!(entries[0].mention_count, 2);
        assert_eq!(entries[0].distinct_source_count, 2);
        assert_eq!(entries[0].item_ids, vec!["i1", "i2"]);
        assert_eq!(entries[1].name, "Sadio Mane");
    }

    #[test]
    fn diverse_selection_is_order_independent() {
        let mut candidates = vec![
            candidate("Yves Bissouma", "i1", "bbc", 0.5),
            candidate("Andre Onana", "i2", "bbc", 0.5),
            candidate("Andre Onana", "i3", "bbc", 0.4),
        ];
        let first = select_diverse(&candidates, 3);
        candidates.reverse();
        assert_eq!(select_diverse(&candidates, 3), first);
        assert_eq!(first.entries()[0].name, "Andre Onana");
    }

    #[test]
    fn whitelist_path_has_no_fallback() {
        let mentions = vec![mention("Declan Rice", "bbc", "i1", 1.3)];
        assert!(whitelisted_mentions(mentions.clone(), None).is_empty());
        let whitelist = Lexicon::new(["Thomas Partey"]);
        assert!(whitelisted_mentions(mentions.clone(), Some(&whitelist)).is_empty());
        let whitelist = Lexicon::new(["declan rice"]);
        assert_eq!(whitelisted_mentions(mentions, Some(&whitelist)).len(), 1);
    }

    #[test]
    fn nationality_restriction_filters_candidates() {
        let mut config = ScoringConfig::default();
        config.eligible_nationalities = vec!["Ghana".to_string()];
        let mut partey = candidate("Thomas Partey", "i1", "bbc", 0.8);
        partey.player.nationality = Some("Ghana".to_string());
        let rice = candidate("Declan Rice", "i2", "bbc", 0.9);
        let kept = eligible_candidates(vec![partey, rice], &config);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].player.name, "Thomas Partey");
    }
}
