use rusqlite::Connection;
use tracing::info;

use crate::errors::SyncError;

use super::tables::DB_VIDEOS_NAME;

/// Migrates the database schema to add new columns to existing tables
/// This function is idempotent and can be called multiple times safely
pub fn migrate_schema(conn: &Connection) -> Result<(), SyncError> {
    migrate_remix_columns(conn)?;
    migrate_lyrics_query_column(conn)?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> bool {
    conn.prepare(&format!("SELECT {column} FROM {table} LIMIT 1")).is_ok()
}

/// Databases created before remix detection only had a free-text `remix_of`
fn migrate_remix_columns(conn: &Connection) -> Result<(), SyncError> {
    if !has_column(conn, DB_VIDEOS_NAME, "recompute_remix_of") {
        info!("[Migration] Adding remix detection columns");
        conn.execute(
            &format!("ALTER TABLE {DB_VIDEOS_NAME} ADD COLUMN recompute_remix_of INTEGER DEFAULT 0 CHECK (recompute_remix_of IN (0, 1))"),
            [],
        )?;
    }
    if !has_column(conn, DB_VIDEOS_NAME, "remix_confidence") {
        conn.execute(
            &format!("ALTER TABLE {DB_VIDEOS_NAME} ADD COLUMN remix_confidence REAL"),
            [],
        )?;
    }
    Ok(())
}

fn migrate_lyrics_query_column(conn: &Connection) -> Result<(), SyncError> {
    if !has_column(conn, DB_VIDEOS_NAME, "syncedlyrics_query") {
        info!("[Migration] Adding syncedlyrics_query column");
        conn.execute(
            &format!("ALTER TABLE {DB_VIDEOS_NAME} ADD COLUMN syncedlyrics_query TEXT"),
            [],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_adds_columns_once() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE videos (video_id TEXT PRIMARY KEY, remix_of TEXT, date_added REAL, date_modified REAL)",
            [],
        )
        .unwrap();
        migrate_schema(&conn).unwrap();
        migrate_schema(&conn).unwrap();
        assert!(has_column(&conn, "videos", "recompute_remix_of"));
        assert!(has_column(&conn, "videos", "remix_confidence"));
        assert!(has_column(&conn, "videos", "syncedlyrics_query"));
    }
}
