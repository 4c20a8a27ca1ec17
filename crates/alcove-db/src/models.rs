/// Database row types — these map directly to SQLite rows.
/// Distinct from alcove-types API models to keep the DB layer independent.
use alcove_types::OpaqueBody;
use chrono::NaiveDateTime;

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

/// One directed link joined to the usernames on both ends and its message.
/// Queries return these in link-id order, which is insertion order — the
/// conversation logic relies on that for stable tie-breaking.
pub struct ConversationRow {
    pub link_id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub sender: String,
    pub recipient: String,
    pub content: OpaqueBody,
    pub time_sent: NaiveDateTime,
}
