use rusqlite::{Connection, Row};
use std::{path::Path, time::Duration};
use uuid::Uuid;

use crate::Result;

/// Open (or create) the database at `path` and apply the schema.
pub fn init_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path)?;
    prepare(&conn)?;
    Ok(conn)
}

/// Per-connection pragmas. Pooled connections run this on checkout creation.
pub fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_secs(5))
}

/// Connection setup plus idempotent schema creation.
pub fn prepare(conn: &Connection) -> Result<()> {
    configure(conn)?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id TEXT PRIMARY KEY,
  username TEXT NOT NULL UNIQUE COLLATE NOCASE,
  email TEXT NOT NULL UNIQUE COLLATE NOCASE,
  password_hash TEXT NOT NULL,
  bio TEXT,
  interests TEXT,
  favourite_artist TEXT,
  gender TEXT,
  date_of_birth TEXT NOT NULL,
  profile_picture_url TEXT,
  rating REAL,
  created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  venue TEXT,
  starts_at TEXT,
  location TEXT,
  ticket_url TEXT,
  image_url TEXT,
  fetched_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS pool_entries (
  id TEXT PRIMARY KEY,
  user_id TEXT NOT NULL REFERENCES users(id),
  event_id TEXT NOT NULL REFERENCES events(id),
  joined_at INTEGER NOT NULL,
  UNIQUE(user_id, event_id)
);

CREATE TABLE IF NOT EXISTS swipe_actions (
  id TEXT PRIMARY KEY,
  swiper_id TEXT NOT NULL REFERENCES users(id),
  target_id TEXT NOT NULL REFERENCES users(id),
  pool_id TEXT REFERENCES pool_entries(id) ON DELETE SET NULL,
  event_id TEXT NOT NULL REFERENCES events(id),
  direction TEXT NOT NULL CHECK (direction IN ('left', 'right')),
  created_at INTEGER NOT NULL,
  UNIQUE(swiper_id, target_id, event_id)
);

CREATE TABLE IF NOT EXISTS matches (
  id TEXT PRIMARY KEY,
  user_a TEXT NOT NULL REFERENCES users(id),
  user_b TEXT NOT NULL REFERENCES users(id),
  event_id TEXT NOT NULL REFERENCES events(id),
  created_at INTEGER NOT NULL,
  CHECK (user_a < user_b),
  UNIQUE(user_a, user_b, event_id)
);

CREATE TABLE IF NOT EXISTS chat_rooms (
  id TEXT PRIMARY KEY,
  match_id TEXT NOT NULL UNIQUE REFERENCES matches(id),
  user_a TEXT NOT NULL,
  user_b TEXT NOT NULL,
  event_id TEXT NOT NULL,
  created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
  id TEXT PRIMARY KEY,
  match_id TEXT NOT NULL REFERENCES matches(id),
  sender_id TEXT NOT NULL REFERENCES users(id),
  receiver_id TEXT NOT NULL REFERENCES users(id),
  content TEXT NOT NULL,
  created_at INTEGER NOT NULL,
  is_read INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS pool_entries_event ON pool_entries(event_id, joined_at);
CREATE INDEX IF NOT EXISTS swipe_actions_target ON swipe_actions(target_id, swiper_id, event_id);
CREATE INDEX IF NOT EXISTS messages_match ON messages(match_id, created_at);
"#;

/// Read a TEXT column holding a UUID.
pub(crate) fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::users::{self, NewUser};

    pub fn conn() -> Connection {
        init_db(":memory:").unwrap()
    }

    pub fn user(conn: &Connection, name: &str) -> Uuid {
        users::create_user(
            conn,
            NewUser {
                username: name.into(),
                email: format!("{name}@example.com"),
                password_hash: "x".into(),
                date_of_birth: "1998-04-02".into(),
            },
        )
        .unwrap()
        .id
    }

    pub fn event(id: &str) -> crate::model::Event {
        crate::model::Event {
            id: id.into(),
            name: format!("Show {id}"),
            venue: Some("The Roxy".into()),
            starts_at: Some("2026-11-20T20:00:00Z".into()),
            location: Some("Los Angeles, CA".into()),
            ticket_url: None,
            image_url: None,
        }
    }
}
