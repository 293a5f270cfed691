use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS records (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            table_name  TEXT NOT NULL,
            id          TEXT NOT NULL,
            body        TEXT NOT NULL,
            UNIQUE(table_name, id)
        );

        CREATE INDEX IF NOT EXISTS idx_records_table
            ON records(table_name, seq);

        CREATE TABLE IF NOT EXISTS objects (
            bucket          TEXT NOT NULL,
            path            TEXT NOT NULL,
            content_type    TEXT NOT NULL,
            data            BLOB NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (bucket, path)
        );

        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
