use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::Selection;
use crate::pipeline::{RunCounts, RunOutcome};

pub const NO_SPOTLIGHT: &str = "No spotlight today. No player had enough coverage to feature.";

/// The ranked result handed to the script writer, without audit detail.
#[derive(Debug, Serialize)]
pub struct ResultFile<'a> {
    pub run_id: Option<Uuid>,
    pub mode: &'a str,
    pub reference_time: DateTime<Utc>,
    pub counts: &'a RunCounts,
    pub selection: &'a Selection,
}

pub fn result_json(outcome: &RunOutcome, run_id: Option<Uuid>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ResultFile {
        run_id,
        mode: outcome.mode.as_str(),
        reference_time: outcome.reference_time,
        counts: &outcome.counts,
        selection: &outcome.selection,
    })
}

/// One line per selected player for the terminal.
pub fn summary_lines(selection: &Selection) -> Vec<String> {
    match selection {
        Selection::Empty => vec![NO_SPOTLIGHT.to_string()],
        Selection::Ranked(entries) => entries
            .iter()
            .map(|entry| {
                format!(
                    "{}. {}{} score {:.3} across {} mentions from {} sources",
                    entry.rank,
                    entry.name,
                    entry
                        .club
                        .as_deref()
                        .map(|club| format!(" ({club})"))
                        .unwrap_or_default(),
                    entry.score,
                    entry.mention_count,
                    entry.distinct_source_count
                )
            })
            .collect(),
    }
}

pub fn build_report(
    mode: &str,
    reference_time: DateTime<Utc>,
    run_id: Option<Uuid>,
    selection: &Selection,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Player Spotlight");
    let _ = writeln!(
        output,
        "Generated {} ({} mode)",
        reference_time.format("%Y-%m-%d %H:%M UTC"),
        mode
    );
    if let Some(run_id) = run_id {
        let _ = writeln!(output, "Run {run_id}");
    }
    let _ = writeln!(output);

    let entries = match selection {
        Selection::Empty => {
            let _ = writeln!(output, "{NO_SPOTLIGHT}");
            return output;
        }
        Selection::Ranked(entries) => entries,
    };

    let _ = writeln!(output, "## Featured Players");
    for entry in entries {
        let _ = writeln!(output);
        match &entry.club {
            Some(club) => {
                let _ = writeln!(output, "### {}. {} ({})", entry.rank, entry.name, club);
            }
            None => {
                let _ = writeln!(output, "### {}. {}", entry.rank, entry.name);
            }
        }
        let _ = writeln!(
            output,
            "- Score {:.3} from {} mentions across {} sources",
            entry.score, entry.mention_count, entry.distinct_source_count
        );
        if let Some(headline) = &entry.sample_headline {
            let _ = writeln!(output, "- Headline: {headline}");
        }
        for link in entry.links.iter().take(5) {
            let _ = writeln!(output, "- <{link}>");
        }
    }

    output
}
