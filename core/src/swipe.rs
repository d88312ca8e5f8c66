//! Swipe recording and mutual-match detection.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::info;
use uuid::Uuid;

use crate::{
    db::{now, uuid_col},
    error::{is_unique_violation, Conflict},
    model::{canonical_pair, Direction, Match, SwipeAction, SwipeOutcome, UserId},
    pool, Error, Result,
};

/// Record `swiper`'s decision about `target` in the pool for `event_id`.
///
/// The swipe, and on a mutual right swipe the match and its chat room, are
/// written in a single immediate transaction. Concurrent reciprocal swipes are
/// serialized by the database write lock, so a pair never gets two matches.
pub fn record_swipe(
    conn: &mut Connection,
    swiper: UserId,
    target: UserId,
    event_id: &str,
    direction: Direction,
) -> Result<SwipeOutcome> {
    if swiper == target {
        return Err(Error::validation("cannot swipe on yourself"));
    }
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let entry = pool::require_entry(&tx, swiper, event_id)?;
    if pool::get_entry(&tx, target, event_id)?.is_none() {
        return Err(Error::NotFound("candidate"));
    }

    let swipe = SwipeAction {
        id: Uuid::new_v4(),
        swiper_id: swiper,
        target_id: target,
        pool_id: entry.id,
        event_id: event_id.to_owned(),
        direction,
        created_at: now(),
    };
    insert_swipe(&tx, &swipe)?;

    let outcome = if direction == Direction::Right && liked(&tx, target, swiper, event_id)? {
        let matched = create_match(&tx, swiper, target, event_id)?;
        SwipeOutcome {
            matched: true,
            match_id: Some(matched.id),
        }
    } else {
        SwipeOutcome {
            matched: false,
            match_id: None,
        }
    };
    tx.commit()?;

    match outcome.match_id {
        Some(id) => info!(%swiper, %target, event = event_id, match_id = %id, "mutual match"),
        None => info!(%swiper, %target, event = event_id, %direction, "swipe recorded"),
    }
    Ok(outcome)
}

fn insert_swipe(conn: &Connection, swipe: &SwipeAction) -> Result<()> {
    conn.execute(
        "INSERT INTO swipe_actions (id, swiper_id, target_id, pool_id, event_id, direction, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            swipe.id.to_string(),
            swipe.swiper_id.to_string(),
            swipe.target_id.to_string(),
            swipe.pool_id.to_string(),
            swipe.event_id,
            swipe.direction.as_str(),
            swipe.created_at
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::from(Conflict::AlreadySwiped)
        } else {
            e.into()
        }
    })?;
    Ok(())
}

/// Whether `from` has swiped right on `to` for the event.
fn liked(conn: &Connection, from: UserId, to: UserId, event_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM swipe_actions \
             WHERE swiper_id = ?1 AND target_id = ?2 AND event_id = ?3 AND direction = 'right'",
            params![from.to_string(), to.to_string(), event_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// The match between two users for an event, in either slot order.
pub fn find_match(conn: &Connection, a: UserId, b: UserId, event_id: &str) -> Result<Option<Match>> {
    let (user_a, user_b) = canonical_pair(a, b);
    let found = conn
        .query_row(
            "SELECT id, user_a, user_b, event_id, created_at FROM matches \
             WHERE user_a = ?1 AND user_b = ?2 AND event_id = ?3",
            params![user_a.to_string(), user_b.to_string(), event_id],
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
        .optional()?;
    Ok(found)
}

/// Create the match and its chat room, or return the existing match.
///
/// Callers run this inside a transaction.
fn create_match(conn: &Connection, a: UserId, b: UserId, event_id: &str) -> Result<Match> {
    if let Some(existing) = find_match(conn, a, b, event_id)? {
        ensure_chat_room(conn, &existing)?;
        return Ok(existing);
    }
    let (user_a, user_b) = canonical_pair(a, b);
    let created = Match {
        id: Uuid::new_v4(),
        user_a,
        user_b,
        event_id: event_id.to_owned(),
        created_at: now(),
    };
    conn.execute(
        "INSERT INTO matches (id, user_a, user_b, event_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            created.id.to_string(),
            user_a.to_string(),
            user_b.to_string(),
            created.event_id,
            created.created_at
        ],
    )?;
    ensure_chat_room(conn, &created)?;
    Ok(created)
}

fn ensure_chat_room(conn: &Connection, m: &Match) -> Result<()> {
    conn.execute(
        "INSERT INTO chat_rooms (id, match_id, user_a, user_b, event_id, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON CONFLICT(match_id) DO NOTHING",
        params![
            Uuid::new_v4().to_string(),
            m.id.to_string(),
            m.user_a.to_string(),
            m.user_b.to_string(),
            m.event_id,
            now()
        ],
    )?;
    Ok(())
}
