//! Full-text search with a per-word `LIKE` fallback.

use rusqlite::Connection;

use super::{LEARNING_COLUMNS, collect_learnings};
use crate::error::Result;
use crate::types::{Category, Learning};

/// Build an FTS5 match expression: whitespace-separated words joined with OR.
pub(crate) fn match_expression(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" OR ")
}

/// Ranked FTS5 search. Fails on an empty or syntactically invalid query, in
/// which case the caller falls back to [`like_fallback`].
pub(crate) fn full_text(
    conn: &Connection,
    query: &str,
    category: Option<Category>,
    limit: usize,
) -> Result<Vec<Learning>> {
    let columns = LEARNING_COLUMNS
        .split(", ")
        .map(|c| format!("l.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        r#"
        SELECT {columns}
        FROM learnings l
        JOIN learnings_fts f ON l.id = f.rowid
        WHERE learnings_fts MATCH ?"#
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(match_expression(query))];
    if let Some(category) = category {
        sql.push_str(" AND l.category = ?");
        args.push(Box::new(category.as_str()));
    }
    sql.push_str(" ORDER BY rank, l.confidence DESC, l.id ASC LIMIT ?");
    args.push(Box::new(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
    let rows = stmt.query(refs.as_slice())?;
    collect_learnings(rows)
}

/// Substring scan: any word in content or tags, AND the category filter,
/// ordered by confidence then use count (id breaks remaining ties).
pub(crate) fn like_fallback(
    conn: &Connection,
    query: &str,
    category: Option<Category>,
    limit: usize,
) -> Result<Vec<Learning>> {
    let mut clauses = Vec::new();
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    for word in query.split_whitespace() {
        let pattern = format!("%{word}%");
        clauses.push("(content LIKE ? OR tags LIKE ?)");
        args.push(Box::new(pattern.clone()));
        args.push(Box::new(pattern));
    }
    if clauses.is_empty() {
        clauses.push("1=1");
    }

    let mut sql = format!(
        "SELECT {LEARNING_COLUMNS} FROM learnings WHERE ({})",
        clauses.join(" OR ")
    );
    if let Some(category) = category {
        sql.push_str(" AND category = ?");
        args.push(Box::new(category.as_str()));
    }
    sql.push_str(" ORDER BY confidence DESC, use_count DESC, id ASC LIMIT ?");
    args.push(Box::new(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
    let rows = stmt.query(refs.as_slice())?;
    collect_learnings(rows)
}
