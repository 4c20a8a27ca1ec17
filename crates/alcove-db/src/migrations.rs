use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            content     TEXT NOT NULL,
            time_sent   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS conversations (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            recipient_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            message_id      INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_sender
            ON conversations(sender_id, recipient_id);

        CREATE INDEX IF NOT EXISTS idx_conversations_recipient
            ON conversations(recipient_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
