use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};

use crate::database::tables::*;
use crate::errors::SyncError;
use crate::types::{Column, ColumnKind, Status, VideoRecord};

fn to_sql_value(column: Column, value: &Value) -> Result<SqlValue, SyncError> {
    let bad = || SyncError::Parse(format!("unexpected value {value} for column {}", column.as_str()));
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    let v = match column.kind() {
        ColumnKind::Text => match value {
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        },
        ColumnKind::Integer => SqlValue::Integer(
            value
                .as_i64()
                .or_else(|| value.as_f64().map(|f| f.round() as i64))
                .ok_or_else(bad)?,
        ),
        ColumnKind::Real => SqlValue::Real(value.as_f64().ok_or_else(bad)?),
        ColumnKind::Flag => match value {
            Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Value::Number(n) => SqlValue::Integer(i64::from(n.as_i64().ok_or_else(bad)? != 0)),
            _ => return Err(bad()),
        },
    };
    Ok(v)
}

fn from_sql_value(column: Column, value: ValueRef<'_>) -> Option<Value> {
    match (column.kind(), value) {
        (_, ValueRef::Null) => None,
        (ColumnKind::Flag, ValueRef::Integer(i)) => Some(Value::Bool(i != 0)),
        (ColumnKind::Real, ValueRef::Integer(i)) => Some(Value::from(i as f64)),
        (ColumnKind::Integer, ValueRef::Real(f)) => Some(Value::from(f.round() as i64)),
        (_, ValueRef::Integer(i)) => Some(Value::from(i)),
        (_, ValueRef::Real(f)) => Some(Value::from(f)),
        (_, ValueRef::Text(t)) => {
            let s = String::from_utf8_lossy(t);
            if s.is_empty() {
                None
            } else {
                Some(Value::String(s.into_owned()))
            }
        }
        (_, ValueRef::Blob(_)) => None,
    }
}

fn video_columns_sql() -> String {
    Column::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
}

fn map_video_row(row: &Row<'_>) -> rusqlite::Result<Map<String, Value>> {
    let mut map = Map::new();
    map.insert("video_id".to_string(), Value::String(row.get(0)?));
    for (i, column) in Column::ALL.iter().enumerate() {
        if let Some(v) = from_sql_value(*column, row.get_ref(i + 1)?) {
            map.insert(column.as_str().to_string(), v);
        }
    }
    Ok(map)
}

pub fn video_exists(conn: &Connection, video_id: &str) -> Result<bool, SyncError> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {DB_VIDEOS_NAME} WHERE video_id = ?1"),
        params![video_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Insert a bare video row, ignored when the id already exists
pub fn insert_video_row(conn: &Connection, video_id: &str, date_added: f64) -> Result<usize, SyncError> {
    let rows = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {DB_VIDEOS_NAME} (video_id, date_added, date_modified) VALUES (?1, ?2, ?2)"
        ),
        params![video_id, date_added],
    )?;
    Ok(rows)
}

/// Set the given scalar columns of a video and stamp `date_modified`
pub fn update_video_columns(
    conn: &Connection,
    video_id: &str,
    fields: &[(Column, Value)],
    date_modified: f64,
) -> Result<usize, SyncError> {
    let mut assignments = Vec::with_capacity(fields.len() + 1);
    let mut values = Vec::with_capacity(fields.len() + 2);
    for (column, value) in fields {
        assignments.push(format!("{} = ?{}", column.as_str(), values.len() + 1));
        values.push(to_sql_value(*column, value)?);
    }
    assignments.push(format!("date_modified = ?{}", values.len() + 1));
    values.push(SqlValue::Real(date_modified));
    values.push(SqlValue::Text(video_id.to_string()));

    let rows = conn.execute(
        &format!(
            "UPDATE {DB_VIDEOS_NAME} SET {} WHERE video_id = ?{}",
            assignments.join(", "),
            values.len()
        ),
        params_from_iter(values),
    )?;
    Ok(rows)
}

pub fn replace_segments(conn: &Connection, video_id: &str, skips: &[(f64, f64)]) -> Result<(), SyncError> {
    conn.execute(
        &format!("DELETE FROM {DB_REMOVED_SEGMENTS_NAME} WHERE video_id = ?1"),
        params![video_id],
    )?;
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {DB_REMOVED_SEGMENTS_NAME} (video_id, segment_start, segment_end) VALUES (?1, ?2, ?3)"
    ))?;
    for (start, end) in skips {
        stmt.execute(params![video_id, start, end])?;
    }
    Ok(())
}

pub fn replace_tags(conn: &Connection, video_id: &str, tags: &[String]) -> Result<(), SyncError> {
    conn.execute(
        &format!("DELETE FROM {DB_VIDEO_TAGS_NAME} WHERE video_id = ?1"),
        params![video_id],
    )?;
    for tag in tags {
        conn.execute(
            &format!("INSERT OR IGNORE INTO {DB_TAGS_NAME} (tag) VALUES (?1)"),
            params![tag],
        )?;
        let tag_id: i64 = conn.query_row(
            &format!("SELECT tag_id FROM {DB_TAGS_NAME} WHERE tag = ?1"),
            params![tag],
            |row| row.get(0),
        )?;
        conn.execute(
            &format!("INSERT OR IGNORE INTO {DB_VIDEO_TAGS_NAME} (video_id, tag_id) VALUES (?1, ?2)"),
            params![video_id, tag_id],
        )?;
    }
    Ok(())
}

pub fn select_segments(conn: &Connection, video_id: &str) -> Result<Vec<(f64, f64)>, SyncError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT segment_start, segment_end FROM {DB_REMOVED_SEGMENTS_NAME}
         WHERE video_id = ?1 ORDER BY segment_start ASC"
    ))?;
    let segments = stmt
        .query_map(params![video_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(segments)
}

pub fn select_tags(conn: &Connection, video_id: &str) -> Result<Vec<String>, SyncError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT t.tag FROM {DB_VIDEO_TAGS_NAME} vt
         JOIN {DB_TAGS_NAME} t ON t.tag_id = vt.tag_id
         WHERE vt.video_id = ?1 ORDER BY t.tag ASC"
    ))?;
    let tags = stmt
        .query_map(params![video_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(tags)
}

/// The stored record of a video with only its known fields set
pub fn select_video(conn: &Connection, video_id: &str) -> Result<Option<VideoRecord>, SyncError> {
    let map = conn
        .query_row(
            &format!("SELECT video_id, {} FROM {DB_VIDEOS_NAME} WHERE video_id = ?1", video_columns_sql()),
            params![video_id],
            map_video_row,
        )
        .optional()?;
    let Some(map) = map else {
        return Ok(None);
    };

    let mut record: VideoRecord = serde_json::from_value(Value::Object(map))?;
    let skips = select_segments(conn, video_id)?;
    if !skips.is_empty() {
        record.skips = Some(skips);
    }
    let tags = select_tags(conn, video_id)?;
    if !tags.is_empty() {
        record.tags = Some(tags);
    }
    Ok(Some(record))
}

/// Ids of every video when `include_non_downloaded`, newest first.
/// Otherwise only Downloaded and Unknown ones, oldest first.
pub fn select_tracked_ids(conn: &Connection, include_non_downloaded: bool) -> Result<Vec<String>, SyncError> {
    let sql = if include_non_downloaded {
        format!("SELECT video_id FROM {DB_VIDEOS_NAME} ORDER BY date_added DESC")
    } else {
        format!(
            "SELECT video_id FROM {DB_VIDEOS_NAME} WHERE status IN ({}, {}) ORDER BY date_added ASC",
            u8::from(Status::Downloaded),
            u8::from(Status::Unknown)
        )
    };
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub fn delete_video(conn: &Connection, video_id: &str) -> Result<usize, SyncError> {
    let rows = conn.execute(
        &format!("DELETE FROM {DB_VIDEOS_NAME} WHERE video_id = ?1"),
        params![video_id],
    )?;
    Ok(rows)
}

pub fn select_titles(conn: &Connection) -> Result<Vec<(String, String)>, SyncError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT video_id, title FROM {DB_VIDEOS_NAME} WHERE title IS NOT NULL AND title != '' ORDER BY date_added ASC"
    ))?;
    let titles = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(titles)
}

pub fn select_status_counts(conn: &Connection) -> Result<Vec<(Status, usize)>, SyncError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT COALESCE(status, 3), COUNT(*) FROM {DB_VIDEOS_NAME} GROUP BY COALESCE(status, 3) ORDER BY 1"
    ))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut counts = Vec::with_capacity(rows.len());
    for (code, count) in rows {
        let status = u8::try_from(code)
            .map_err(|_| SyncError::Parse(format!("invalid status code {code}")))
            .and_then(Status::try_from)?;
        counts.push((status, count as usize));
    }
    Ok(counts)
}
