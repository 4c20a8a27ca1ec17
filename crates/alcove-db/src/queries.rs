use crate::Database;
use crate::models::{ConversationRow, UserRow};
use alcove_types::OpaqueBody;
use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::Connection;

/// Timestamps are stored as ISO-8601 text. Microsecond precision keeps the
/// lexicographic order of the column identical to chronological order.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

fn parse_time_sent(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password) VALUES (?1, ?2, ?3)",
                (username, email, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn lookup_id_by_username(&self, username: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT id FROM users WHERE username = ?1", [username], |row| {
                row.get(0)
            })
            .optional()
        })
    }

    pub fn lookup_id_by_email(&self, email: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT id FROM users WHERE email = ?1", [email], |row| row.get(0))
                .optional()
        })
    }

    /// Username/email pairs for every account. Not scalable, but the
    /// directory is unfiltered until add-friend lands.
    pub fn name_email_pairs(&self) -> Result<Vec<(String, String)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT username, email FROM users ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    /// Insert the message and its directed link in one transaction, so a
    /// reader can never observe one without the other.
    pub fn create_message(
        &self,
        sender_id: i64,
        recipient_id: i64,
        content: &OpaqueBody,
        time_sent: NaiveDateTime,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO messages (content, time_sent) VALUES (?1, ?2)",
                (content.as_str(), time_sent.format(TIME_FORMAT).to_string()),
            )?;
            let message_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO conversations (sender_id, recipient_id, message_id) VALUES (?1, ?2, ?3)",
                (sender_id, recipient_id, message_id),
            )?;

            tx.commit()?;
            Ok(message_id)
        })
    }

    /// All links sent from `sender_id` to `recipient_id`, in insertion order.
    /// One direction only — the transcript assembler composes the union.
    pub fn links_between(&self, sender_id: i64, recipient_id: i64) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.sender_id, c.recipient_id, s.username, r.username, m.content, m.time_sent
                 FROM conversations c
                 JOIN users s ON c.sender_id = s.id
                 JOIN users r ON c.recipient_id = r.id
                 JOIN messages m ON c.message_id = m.id
                 WHERE c.sender_id = ?1 AND c.recipient_id = ?2
                 ORDER BY c.id",
            )?;
            let rows = stmt
                .query_map((sender_id, recipient_id), map_conversation_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every link the viewer did not author, in insertion order. Feeds the
    /// preview aggregation, which only considers what others sent.
    pub fn links_received(&self, viewer_id: i64) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.sender_id, c.recipient_id, s.username, r.username, m.content, m.time_sent
                 FROM conversations c
                 JOIN users s ON c.sender_id = s.id
                 JOIN users r ON c.recipient_id = r.id
                 JOIN messages m ON c.message_id = m.id
                 WHERE c.sender_id != ?1
                 ORDER BY c.id",
            )?;
            let rows = stmt
                .query_map([viewer_id], map_conversation_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_conversation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    let raw_time: String = row.get(6)?;
    Ok(ConversationRow {
        link_id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        sender: row.get(3)?,
        recipient: row.get(4)?,
        content: OpaqueBody::new(row.get::<_, String>(5)?),
        time_sent: parse_time_sent(6, &raw_time)?,
    })
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, email, password, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 6, 18).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    fn seed_users(db: &Database) -> (i64, i64) {
        let mia = db.create_user("mia", "mia@example.com", "hash-a").unwrap();
        let dash = db.create_user("dash", "dash@example.com", "hash-b").unwrap();
        (mia, dash)
    }

    #[test]
    fn user_lookup_by_username_and_email() {
        let db = Database::open_in_memory().unwrap();
        let (mia, _) = seed_users(&db);

        let by_name = db.get_user_by_username("mia").unwrap().unwrap();
        assert_eq!(by_name.id, mia);
        assert_eq!(by_name.email, "mia@example.com");

        assert_eq!(db.lookup_id_by_email("dash@example.com").unwrap(), Some(mia + 1));
        assert_eq!(db.lookup_id_by_username("nobody").unwrap(), None);
        assert_eq!(db.lookup_id_by_email("nobody@example.com").unwrap(), None);
    }

    #[test]
    fn duplicate_username_or_email_rejected() {
        let db = Database::open_in_memory().unwrap();
        seed_users(&db);

        assert!(db.create_user("mia", "other@example.com", "h").is_err());
        assert!(db.create_user("other", "mia@example.com", "h").is_err());
    }

    #[test]
    fn message_and_link_created_together() {
        let db = Database::open_in_memory().unwrap();
        let (mia, dash) = seed_users(&db);

        db.create_message(mia, dash, &OpaqueBody::new("sealed"), t(11, 11, 11)).unwrap();

        let rows = db.links_between(mia, dash).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sender, "mia");
        assert_eq!(rows[0].recipient, "dash");
        assert_eq!(rows[0].content.as_str(), "sealed");
        assert_eq!(rows[0].time_sent, t(11, 11, 11));

        // No orphan rows in either table.
        let (messages, links) = db
            .with_conn(|conn| {
                let m: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?;
                let c: i64 =
                    conn.query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))?;
                Ok((m, c))
            })
            .unwrap();
        assert_eq!(messages, 1);
        assert_eq!(links, 1);
    }

    #[test]
    fn create_message_rejects_unknown_recipient() {
        let db = Database::open_in_memory().unwrap();
        let (mia, _) = seed_users(&db);

        assert!(db.create_message(mia, 999, &OpaqueBody::new("x"), t(1, 0, 0)).is_err());

        // The failed link insert must not leave a dangling message behind.
        let messages: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(messages, 0);
    }

    #[test]
    fn links_between_is_directional() {
        let db = Database::open_in_memory().unwrap();
        let (mia, dash) = seed_users(&db);

        db.create_message(mia, dash, &OpaqueBody::new("a"), t(1, 0, 0)).unwrap();
        db.create_message(dash, mia, &OpaqueBody::new("b"), t(2, 0, 0)).unwrap();

        let sent = db.links_between(mia, dash).unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content.as_str(), "a");

        let received = db.links_between(dash, mia).unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].content.as_str(), "b");
    }

    #[test]
    fn links_received_excludes_viewer_authored() {
        let db = Database::open_in_memory().unwrap();
        let (mia, dash) = seed_users(&db);

        db.create_message(mia, dash, &OpaqueBody::new("from mia"), t(1, 0, 0)).unwrap();
        db.create_message(dash, mia, &OpaqueBody::new("from dash"), t(2, 0, 0)).unwrap();

        let rows = db.links_received(mia).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sender, "dash");
    }

    #[test]
    fn rows_come_back_in_insertion_order() {
        let db = Database::open_in_memory().unwrap();
        let (mia, dash) = seed_users(&db);

        // Identical timestamps: only insertion order can distinguish them.
        for body in ["first", "second", "third"] {
            db.create_message(dash, mia, &OpaqueBody::new(body), t(3, 3, 3)).unwrap();
        }

        let rows = db.links_between(dash, mia).unwrap();
        let bodies: Vec<&str> = rows.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(bodies, ["first", "second", "third"]);
    }
}
