//! Transcript assembly and preview aggregation over the directed-message log.
//!
//! Both entry points read through the store's two primitive link queries and
//! do the interesting work (union, grouping, ordering, truncation) in plain
//! code, where it is easy to unit-test.

use anyhow::Result;

use alcove_db::Database;
use alcove_db::models::ConversationRow;
use alcove_types::OpaqueBody;
use alcove_types::api::ConversationMessage;

/// A preview keeps at most this many characters of content before the
/// ellipsis is appended.
const PREVIEW_HEAD: usize = 20;

/// All correspondence between `reader_id` and `friend_id`, oldest first.
///
/// The union is built from two one-directional queries rather than a single
/// OR-predicate: each half is trivially testable on its own, and reading your
/// own thread (`reader_id == friend_id`) simply skips the reverse query, so a
/// self-sent message can never appear twice.
pub fn transcript(
    db: &Database,
    reader_id: i64,
    friend_id: i64,
) -> Result<Vec<ConversationMessage>> {
    let sent = db.links_between(reader_id, friend_id)?;

    let received = if reader_id == friend_id {
        Vec::new()
    } else {
        db.links_between(friend_id, reader_id)?
    };

    Ok(merge_and_sort(sent, received))
}

/// The most recent message from every correspondent, oldest first, with the
/// content cut down to a preview.
///
/// Grouping is by *sender*, over links the viewer did not author. A
/// correspondent the viewer has only ever sent to therefore never surfaces
/// here — the entry exists once they send something back.
pub fn previews(db: &Database, reader_id: i64) -> Result<Vec<ConversationMessage>> {
    let rows = db.links_received(reader_id)?;

    let mut entries: Vec<ConversationMessage> =
        most_recent_per_sender(rows).into_iter().map(map_row).collect();
    entries.sort_by_key(|m| m.time_sent);

    Ok(entries.into_iter().map(truncate_preview).collect())
}

fn map_row(row: ConversationRow) -> ConversationMessage {
    ConversationMessage {
        sender: row.sender,
        recipient: row.recipient,
        content: row.content,
        time_sent: row.time_sent,
    }
}

fn merge_and_sort(
    sent: Vec<ConversationRow>,
    received: Vec<ConversationRow>,
) -> Vec<ConversationMessage> {
    let mut messages: Vec<ConversationMessage> =
        sent.into_iter().chain(received).map(map_row).collect();

    // Stable: equal timestamps keep their insertion order.
    messages.sort_by_key(|m| m.time_sent);
    messages
}

/// Reduce rows (already in insertion order) to one per sender, keeping the
/// link with the greatest `time_sent`. On a timestamp tie the earlier link
/// wins — replacement happens only on a strictly newer message.
fn most_recent_per_sender(rows: Vec<ConversationRow>) -> Vec<ConversationRow> {
    let mut latest: Vec<ConversationRow> = Vec::new();

    for row in rows {
        match latest.iter_mut().find(|r| r.sender_id == row.sender_id) {
            Some(existing) => {
                if row.time_sent > existing.time_sent {
                    *existing = row;
                }
            }
            None => latest.push(row),
        }
    }

    latest
}

fn truncate_preview(mut message: ConversationMessage) -> ConversationMessage {
    let content = message.content.as_str();
    if content.chars().count() > PREVIEW_HEAD - 1 {
        let head: String = content.chars().take(PREVIEW_HEAD).collect();
        message.content = OpaqueBody::new(format!("{}...", head));
    }
    message
}
