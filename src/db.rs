use anyhow::Context;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Candidate, Mention, RunSummary, SelectedEntity, Selection};
use crate::pipeline::RunOutcome;

#[derive(Serialize)]
struct Audit<'a> {
    candidates: &'a [Candidate],
    mentions: &'a [Mention],
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn as_i32(value: usize, what: &str) -> anyhow::Result<i32> {
    i32::try_from(value).with_context(|| format!("{what} does not fit in a column: {value}"))
}

fn stored_count(value: i32, what: &str) -> anyhow::Result<usize> {
    usize::try_from(value).with_context(|| format!("negative {what} in stored selection: {value}"))
}

/// Stores the run, its audit material and its ranked selection in one
/// transaction. Returns the new run id.
pub async fn save_run(pool: &PgPool, outcome: &RunOutcome) -> anyhow::Result<Uuid> {
    let run_id = Uuid::new_v4();
    let audit = serde_json::to_value(Audit {
        candidates: &outcome.candidates,
        mentions: &outcome.mentions,
    })
    .context("failed to serialize run audit")?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO spotlight.runs
        (id, mode, reference_time, top_n, item_count, stat_line_count,
         considered_count, eligible_count, audit)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(run_id)
    .bind(outcome.mode.as_str())
    .bind(outcome.reference_time)
    .bind(as_i32(outcome.top_n, "top_n")?)
    .bind(as_i32(outcome.counts.items, "item count")?)
    .bind(as_i32(outcome.counts.stat_lines, "stat line count")?)
    .bind(as_i32(outcome.counts.considered, "considered count")?)
    .bind(as_i32(outcome.counts.eligible, "eligible count")?)
    .bind(Json(audit))
    .execute(&mut *tx)
    .await?;

    for entry in outcome.selection.entries() {
        sqlx::query(
            r#"
            INSERT INTO spotlight.selections
            (run_id, rank, name, club, score, mention_count, distinct_source_count,
             sample_headline, item_ids, links)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(run_id)
        .bind(as_i32(entry.rank, "rank")?)
        .bind(&entry.name)
        .bind(&entry.club)
        .bind(entry.score)
        .bind(as_i32(entry.mention_count, "mention count")?)
        .bind(as_i32(entry.distinct_source_count, "source count")?)
        .bind(&entry.sample_headline)
        .bind(Json(&entry.item_ids))
        .bind(Json(&entry.links))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(run_id)
}

pub async fn fetch_recent_runs(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<RunSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT r.id, r.mode, r.reference_time, r.item_count, r.created_at,
               COUNT(s.rank) AS selected_count
        FROM spotlight.runs r
        LEFT JOIN spotlight.selections s ON s.run_id = r.id
        GROUP BY r.id
        ORDER BY r.created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut runs = Vec::new();
    for row in rows {
        runs.push(RunSummary {
            run_id: row.get("id"),
            mode: row.get("mode"),
            reference_time: row.get("reference_time"),
            item_count: row.get("item_count"),
            selected_count: row.get("selected_count"),
            created_at: row.get("created_at"),
        });
    }

    Ok(runs)
}

/// The stored summary and selection for `run_id`, or `None` if no such run.
pub async fn fetch_run(pool: &PgPool, run_id: Uuid) -> anyhow::Result<Option<(RunSummary, Selection)>> {
    let Some(summary) = fetch_run_summary(pool, run_id).await? else {
        return Ok(None);
    };

    let rows = sqlx::query(
        r#"
        SELECT rank, name, club, score, mention_count, distinct_source_count,
               sample_headline, item_ids, links
        FROM spotlight.selections
        WHERE run_id = $1
        ORDER BY rank
        "#,
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::new();
    for row in rows {
        let Json(item_ids): Json<Vec<String>> = row.get("item_ids");
        let Json(links): Json<Vec<String>> = row.get("links");
        entries.push(SelectedEntity {
            rank: stored_count(row.get("rank"), "rank")?,
            name: row.get("name"),
            club: row.get("club"),
            score: row.get("score"),
            mention_count: stored_count(row.get("mention_count"), "mention count")?,
            distinct_source_count: stored_count(row.get("distinct_source_count"), "source count")?,
            sample_headline: row.get("sample_headline"),
            item_ids,
            links,
        });
    }

    Ok(Some((summary, Selection::from_entries(entries))))
}

async fn fetch_run_summary(pool: &PgPool, run_id: Uuid) -> anyhow::Result<Option<RunSummary>> {
    let row = sqlx::query(
        r#"
        SELECT r.id, r.mode, r.reference_time, r.item_count, r.created_at,
               COUNT(s.rank) AS selected_count
        FROM spotlight.runs r
        LEFT JOIN spotlight.selections s ON s.run_id = r.id
        WHERE r.id = $1
        GROUP BY r.id
        "#,
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| RunSummary {
        run_id: row.get("id"),
        mode: row.get("mode"),
        reference_time: row.get("reference_time"),
        item_count: row.get("item_count"),
        selected_count: row.get("selected_count"),
        created_at: row.get("created_at"),
    }))
}
