mod messages;
mod notifications;
mod threads;

use anyhow::Result;
use rusqlite::{Connection, params_from_iter};

/// Most ids bound into one `IN (...)` list. SQLite rejects statements with
/// more than 32766 parameters (999 on older builds).
const MAX_BOUND_IDS: usize = 900;

/// `?1, ?2, ... ?n` for an `IN (...)` clause.
fn placeholders(n: usize, offset: usize) -> String {
    (1..=n)
        .map(|i| format!("?{}", i + offset))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Batch-fetch `(key, value)` pairs from a side table for a set of parent ids.
/// `select` must produce exactly two TEXT columns and end in `WHERE <col> IN`.
/// Ids are sent in chunks; `order_by` holds within each parent id.
fn query_pairs(
    conn: &Connection,
    select: &str,
    order_by: &str,
    ids: &[String],
) -> Result<Vec<(String, String)>> {
    let mut rows = Vec::new();
    for chunk in ids.chunks(MAX_BOUND_IDS) {
        let sql = format!("{} ({}) ORDER BY {}", select, placeholders(chunk.len(), 0), order_by);
        let mut stmt = conn.prepare(&sql)?;
        let fetched = stmt
            .query_map(params_from_iter(chunk.iter()), |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.extend(fetched);
    }
    Ok(rows)
}
