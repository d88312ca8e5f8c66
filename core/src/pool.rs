//! Matchmaking pools: which users opted into matchmaking for which event.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::info;
use uuid::Uuid;

use crate::{
    db::{now, uuid_col},
    error::{is_unique_violation, Conflict},
    events::{self, row_to_event, EVENT_COLUMNS},
    model::{Candidate, Event, Membership, PoolEntry, UserId},
    users, Error, Result,
};

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<PoolEntry> {
    Ok(PoolEntry {
        id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        event_id: row.get(2)?,
        joined_at: row.get(3)?,
    })
}

/// Put `user_id` into the pool for `event`, caching the event first.
///
/// Both writes share one transaction. A second join for the same pair fails
/// with [`Conflict::AlreadyInPool`] and writes nothing.
pub fn join_pool(conn: &mut Connection, user_id: UserId, event: &Event) -> Result<PoolEntry> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let cached = events::upsert_event(&tx, event)?;

    let known_user: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM users WHERE id = ?1",
            [user_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    if known_user.is_none() {
        return Err(Error::NotFound("user"));
    }
    if get_entry(&tx, user_id, &event.id)?.is_some() {
        return Err(Conflict::AlreadyInPool.into());
    }

    let entry = PoolEntry {
        id: Uuid::new_v4(),
        user_id,
        event_id: event.id.clone(),
        joined_at: now(),
    };
    tx.execute(
        "INSERT INTO pool_entries (id, user_id, event_id, joined_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            entry.id.to_string(),
            user_id.to_string(),
            entry.event_id,
            entry.joined_at
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::from(Conflict::AlreadyInPool)
        } else {
            e.into()
        }
    })?;
    tx.commit()?;

    info!(user = %user_id, event = %entry.event_id, new_event = cached, "joined pool");
    Ok(entry)
}

/// The caller's pool entry for an event, if any.
pub fn get_entry(conn: &Connection, user_id: UserId, event_id: &str) -> Result<Option<PoolEntry>> {
    let entry = conn
        .query_row(
            "SELECT id, user_id, event_id, joined_at FROM pool_entries WHERE user_id = ?1 AND event_id = ?2",
            params![user_id.to_string(), event_id],
            row_to_entry,
        )
        .optional()?;
    Ok(entry)
}

/// Like [`get_entry`] but a missing entry is an error.
pub fn require_entry(conn: &Connection, user_id: UserId, event_id: &str) -> Result<PoolEntry> {
    get_entry(conn, user_id, event_id)?.ok_or_else(Error::not_in_pool)
}

/// Pool members for `event_id` the caller has not swiped on yet, oldest joins first.
pub fn list_candidates(conn: &Connection, user_id: UserId, event_id: &str) -> Result<Vec<Candidate>> {
    require_entry(conn, user_id, event_id)?;
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.profile_picture_url, u.favourite_artist, u.gender, \
                u.date_of_birth, u.bio, u.rating, p.joined_at \
         FROM pool_entries p JOIN users u ON u.id = p.user_id \
         WHERE p.event_id = ?1 AND p.user_id <> ?2 \
           AND p.user_id NOT IN ( \
             SELECT target_id FROM swipe_actions WHERE swiper_id = ?2 AND event_id = ?1) \
         ORDER BY p.joined_at, p.id",
    )?;
    let candidates = stmt
        .query_map(params![event_id, user_id.to_string()], |row| {
            let date_of_birth: String = row.get(5)?;
            Ok(Candidate {
                user_id: uuid_col(row, 0)?,
                username: row.get(1)?,
                profile_picture: row.get(2)?,
                favourite_artist: row.get(3)?,
                gender: row.get(4)?,
                age: users::age_from_stored(&date_of_birth),
                about_me: row.get(6)?,
                rating: row.get(7)?,
                joined_at: row.get(8)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(candidates)
}

/// Leave a pool. Swipes made from it are kept, so rejoining does not reopen them.
pub fn leave_pool(conn: &Connection, user_id: UserId, event_id: &str) -> Result<()> {
    let removed = conn.execute(
        "DELETE FROM pool_entries WHERE user_id = ?1 AND event_id = ?2",
        params![user_id.to_string(), event_id],
    )?;
    if removed == 0 {
        return Err(Error::not_in_pool());
    }
    info!(user = %user_id, event = event_id, "left pool");
    Ok(())
}

/// Every pool the user is in, most recent join first.
pub fn list_pools(conn: &Connection, user_id: UserId) -> Result<Vec<Membership>> {
    let columns = EVENT_COLUMNS
        .split(", ")
        .map(|c| format!("e.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {columns}, p.joined_at FROM pool_entries p JOIN events e ON e.id = p.event_id \
         WHERE p.user_id = ?1 ORDER BY p.joined_at DESC, p.id"
    ))?;
    let pools = stmt
        .query_map([user_id.to_string()], |row| {
            Ok(Membership {
                event: row_to_event(row)?,
                joined_at: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(pools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::testing, events::get_event, model::Direction, swipe};

    #[test]
    fn second_join_is_a_conflict() {
        let mut conn = testing::conn();
        let alice = testing::user(&conn, "alice");
        let event = testing::event("E100");
        join_pool(&mut conn, alice, &event).unwrap();
        let err = join_pool(&mut conn, alice, &event).unwrap_err();
        assert!(matches!(err, Error::Conflict(Conflict::AlreadyInPool)));
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM pool_entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn failed_join_leaves_no_event_behind() {
        let mut conn = testing::conn();
        let err = join_pool(&mut conn, Uuid::new_v4(), &testing::event("E7")).unwrap_err();
        assert!(matches!(err, Error::NotFound("user")));
        assert_eq!(get_event(&conn, "E7").unwrap(), None);
    }

    #[test]
    fn candidates_exclude_self_and_swiped() {
        let mut conn = testing::conn();
        let event = testing::event("E100");
        let alice = testing::user(&conn, "alice");
        let bob = testing::user(&conn, "bob");
        let carol = testing::user(&conn, "carol");
        for u in [alice, bob, carol] {
            join_pool(&mut conn, u, &event).unwrap();
        }

        let ids: Vec<_> = list_candidates(&conn, alice, "E100")
            .unwrap()
            .into_iter()
            .map(|c| c.user_id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&alice));

        swipe::record_swipe(&mut conn, alice, bob, "E100", Direction::Left).unwrap();
        let ids: Vec<_> = list_candidates(&conn, alice, "E100")
            .unwrap()
            .into_iter()
            .map(|c| c.user_id)
            .collect();
        assert_eq!(ids, vec![carol]);

        // bob's view is unaffected by alice's swipe
        assert_eq!(list_candidates(&conn, bob, "E100").unwrap().len(), 2);
    }

    #[test]
    fn candidates_require_membership() {
        let conn = testing::conn();
        let alice = testing::user(&conn, "alice");
        assert!(matches!(
            list_candidates(&conn, alice, "E100"),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn candidate_profile_fields() {
        let mut conn = testing::conn();
        let event = testing::event("E100");
        let alice = testing::user(&conn, "alice");
        let bob = testing::user(&conn, "bob");
        users::update_profile(
            &conn,
            bob,
            &users::ProfileUpdate {
                bio: Some("front row or nothing".into()),
                gender: Some("m".into()),
                ..Default::default()
            },
        )
        .unwrap();
        join_pool(&mut conn, alice, &event).unwrap();
        join_pool(&mut conn, bob, &event).unwrap();

        let candidates = list_candidates(&conn, alice, "E100").unwrap();
        let bob_card = &candidates[0];
        assert_eq!(bob_card.username, "bob");
        assert_eq!(bob_card.about_me.as_deref(), Some("front row or nothing"));
        assert_eq!(bob_card.gender.as_deref(), Some("m"));
        assert!(bob_card.age.unwrap() >= 28);
    }

    #[test]
    fn leave_and_list_pools() {
        let mut conn = testing::conn();
        let alice = testing::user(&conn, "alice");
        let bob = testing::user(&conn, "bob");
        join_pool(&mut conn, alice, &testing::event("E1")).unwrap();
        join_pool(&mut conn, alice, &testing::event("E2")).unwrap();
        join_pool(&mut conn, bob, &testing::event("E1")).unwrap();
        swipe::record_swipe(&mut conn, alice, bob, "E1", Direction::Left).unwrap();

        assert_eq!(list_pools(&conn, alice).unwrap().len(), 2);
        leave_pool(&conn, alice, "E1").unwrap();
        let pools = list_pools(&conn, alice).unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].event.id, "E2");

        let orphaned: Option<String> = conn
            .query_row("SELECT pool_id FROM swipe_actions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphaned, None);
        assert!(matches!(leave_pool(&conn, alice, "E1"), Err(Error::Forbidden(_))));
    }

    #[test]
    fn rejoining_does_not_reopen_swipes() {
        let mut conn = testing::conn();
        let event = testing::event("E100");
        let alice = testing::user(&conn, "alice");
        let bob = testing::user(&conn, "bob");
        join_pool(&mut conn, alice, &event).unwrap();
        join_pool(&mut conn, bob, &event).unwrap();
        swipe::record_swipe(&mut conn, bob, alice, "E100", Direction::Right).unwrap();
        swipe::record_swipe(&mut conn, alice, bob, "E100", Direction::Left).unwrap();

        leave_pool(&conn, alice, "E100").unwrap();
        join_pool(&mut conn, alice, &event).unwrap();

        assert!(list_candidates(&conn, alice, "E100").unwrap().is_empty());
        let err = swipe::record_swipe(&mut conn, alice, bob, "E100", Direction::Right).unwrap_err();
        assert!(matches!(err, Error::Conflict(Conflict::AlreadySwiped)));
        assert!(swipe::find_match(&conn, alice, bob, "E100").unwrap().is_none());
    }
}
