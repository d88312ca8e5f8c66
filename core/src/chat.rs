//! Conversations between matched users. Clients poll; there is no push channel.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use crate::{
    db::{now, uuid_col},
    model::{ChatRoom, Counterpart, Match, MatchSummary, Message, ThreadMessage, UserId},
    Error, Result,
};

const MESSAGE_COLUMNS: &str =
    "msg.id, msg.match_id, msg.sender_id, msg.receiver_id, msg.content, msg.created_at, msg.is_read";

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: uuid_col(row, 0)?,
        match_id: uuid_col(row, 1)?,
        sender_id: uuid_col(row, 2)?,
        receiver_id: uuid_col(row, 3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
        is_read: row.get::<_, i64>(6)? != 0,
    })
}

pub fn get_match(conn: &Connection, match_id: Uuid) -> Result<Match> {
    conn.query_row(
        "SELECT id, user_a, user_b, event_id, created_at FROM matches WHERE id = ?1",
        [match_id.to_string()],
        |row| {
            Ok(Match {
                id: uuid_col(row, 0)?,
                user_a: uuid_col(row, 1)?,
                user_b: uuid_col(row, 2)?,
                event_id: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or(Error::NotFound("match"))
}

/// The match, provided `user_id` is one of its two participants.
fn participant_match(conn: &Connection, match_id: Uuid, user_id: UserId) -> Result<Match> {
    let m = get_match(conn, match_id)?;
    if !m.involves(user_id) {
        return Err(Error::not_participant());
    }
    Ok(m)
}

pub fn chat_room_for(conn: &Connection, match_id: Uuid) -> Result<Option<ChatRoom>> {
    let room = conn
        .query_row(
            "SELECT id, match_id, created_at FROM chat_rooms WHERE match_id = ?1",
            [match_id.to_string()],
            |row| {
                Ok(ChatRoom {
                    id: uuid_col(row, 0)?,
                    match_id: uuid_col(row, 1)?,
                    created_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(room)
}

fn last_message(conn: &Connection, match_id: Uuid) -> Result<Option<Message>> {
    let msg = conn
        .query_row(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages msg WHERE msg.match_id = ?1 \
                 ORDER BY msg.created_at DESC, msg.rowid DESC LIMIT 1"
            ),
            [match_id.to_string()],
            row_to_message,
        )
        .optional()?;
    Ok(msg)
}

/// Every match of `user_id`, newest first, with the other side's public fields
/// and the number of messages they sent that are still unread.
pub fn list_matches(conn: &Connection, user_id: UserId) -> Result<Vec<MatchSummary>> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.event_id, m.created_at, u.id, u.username, u.profile_picture_url, c.id, \
                (SELECT COUNT(*) FROM messages msg \
                 WHERE msg.match_id = m.id AND msg.sender_id <> ?1 AND msg.is_read = 0) \
         FROM matches m \
         JOIN users u ON u.id = CASE WHEN m.user_a = ?1 THEN m.user_b ELSE m.user_a END \
         LEFT JOIN chat_rooms c ON c.match_id = m.id \
         WHERE m.user_a = ?1 OR m.user_b = ?1 \
         ORDER BY m.created_at DESC, m.id",
    )?;
    let rows = stmt
        .query_map([user_id.to_string()], |row| {
            let chat_room_id = row
                .get::<_, Option<String>>(6)?
                .and_then(|s| Uuid::parse_str(&s).ok());
            Ok(MatchSummary {
                match_id: uuid_col(row, 0)?,
                chat_room_id,
                event_id: row.get(1)?,
                other_user: Counterpart {
                    id: uuid_col(row, 3)?,
                    username: row.get(4)?,
                    profile_picture: row.get(5)?,
                },
                unread_messages: row.get(7)?,
                last_message: None,
                created_at: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut summaries = Vec::with_capacity(rows.len());
    for mut summary in rows {
        summary.last_message = last_message(conn, summary.match_id)?;
        summaries.push(summary);
    }
    Ok(summaries)
}

/// The whole conversation, oldest first. Messages addressed to `user_id` are
/// marked read before they are returned.
pub fn list_messages(conn: &Connection, match_id: Uuid, user_id: UserId) -> Result<Vec<ThreadMessage>> {
    participant_match(conn, match_id, user_id)?;
    let marked = conn.execute(
        "UPDATE messages SET is_read = 1 WHERE match_id = ?1 AND receiver_id = ?2 AND is_read = 0",
        params![match_id.to_string(), user_id.to_string()],
    )?;
    if marked > 0 {
        debug!(%match_id, reader = %user_id, marked, "messages marked read");
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS}, u.username, u.profile_picture_url \
         FROM messages msg JOIN users u ON u.id = msg.sender_id \
         WHERE msg.match_id = ?1 ORDER BY msg.created_at, msg.rowid"
    ))?;
    let thread = stmt
        .query_map([match_id.to_string()], |row| {
            Ok(ThreadMessage {
                message: row_to_message(row)?,
                sender_username: row.get(7)?,
                sender_picture: row.get(8)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(thread)
}

/// Append a message from `user_id` to the other participant of the match.
pub fn send_message(conn: &Connection, match_id: Uuid, user_id: UserId, content: &str) -> Result<Message> {
    let m = participant_match(conn, match_id, user_id)?;
    if content.trim().is_empty() {
        return Err(Error::validation("message content is required"));
    }
    let receiver_id = m.other(user_id).ok_or_else(Error::not_participant)?;
    let msg = Message {
        id: Uuid::new_v4(),
        match_id,
        sender_id: user_id,
        receiver_id,
        content: content.to_owned(),
        created_at: now(),
        is_read: false,
    };
    conn.execute(
        "INSERT INTO messages (id, match_id, sender_id, receiver_id, content, created_at, is_read) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
        params![
            msg.id.to_string(),
            match_id.to_string(),
            user_id.to_string(),
            receiver_id.to_string(),
            msg.content,
            msg.created_at
        ],
    )?;
    Ok(msg)
}

/// Unread messages addressed to `user_id` across all matches.
pub fn unread_total(conn: &Connection, user_id: UserId) -> Result<u32> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND is_read = 0",
        [user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}
