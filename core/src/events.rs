use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{db::now, model::Event, Result};

pub(crate) const EVENT_COLUMNS: &str =
    "id, name, venue, starts_at, location, ticket_url, image_url";

pub(crate) fn row_to_event(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        name: row.get(1)?,
        venue: row.get(2)?,
        starts_at: row.get(3)?,
        location: row.get(4)?,
        ticket_url: row.get(5)?,
        image_url: row.get(6)?,
    })
}

/// Look up a cached event by its catalog id.
pub fn get_event(conn: &Connection, id: &str) -> Result<Option<Event>> {
    let event = conn
        .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
            [id],
            row_to_event,
        )
        .optional()?;
    Ok(event)
}

/// Cache an event. A row that already exists is left as it was.
///
/// Returns true when a new row was written.
pub fn upsert_event(conn: &Connection, event: &Event) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO events (id, name, venue, starts_at, location, ticket_url, image_url, fetched_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) ON CONFLICT(id) DO NOTHING",
        params![
            event.id,
            event.name,
            event.venue,
            event.starts_at,
            event.location,
            event.ticket_url,
            event.image_url,
            now()
        ],
    )?;
    Ok(inserted == 1)
}
