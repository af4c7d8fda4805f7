//! Group event log operations for the SQLite store.
//!
//! Events are stored in the `group_events` table with JSON-encoded event
//! data. The variant name is kept in its own column for querying.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use simtani_core::{GroupId, RegistryError};

use super::usize_to_i64_limit;
use crate::events::{GroupEvent, GroupEventType};

pub(super) fn append_event_sync(
    conn: &Connection,
    group_id: &GroupId,
    event: &GroupEventType,
    recorded_at: DateTime<Utc>,
) -> Result<(), RegistryError> {
    let event_json = serde_json::to_string(event)
        .map_err(|e| RegistryError::storage("append event serialize", e.to_string()))?;

    conn.execute(
        "INSERT INTO group_events (group_id, event_type, event_data, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![group_id.as_str(), event.name(), event_json, recorded_at],
    )
    .map_err(|e| RegistryError::storage("append event", e.to_string()))?;

    Ok(())
}

pub(super) fn group_events_sync(
    conn: &Connection,
    group_id: &GroupId,
    limit: usize,
) -> Result<Vec<GroupEvent>, RegistryError> {
    let limit_i64 = usize_to_i64_limit(limit, "get group events")?;

    let mut stmt = conn
        .prepare(
            "SELECT id, group_id, event_data, recorded_at
             FROM group_events
             WHERE group_id = ?1
             ORDER BY recorded_at DESC, id DESC
             LIMIT ?2",
        )
        .map_err(|e| RegistryError::storage("get group events", e.to_string()))?;

    let rows = stmt
        .query_map(params![group_id.as_str(), limit_i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, DateTime<Utc>>(3)?,
            ))
        })
        .map_err(|e| RegistryError::storage("get group events", e.to_string()))?;

    let mut events = Vec::new();
    for row in rows {
        let (id, group_id, event_data, recorded_at) =
            row.map_err(|e| RegistryError::storage("get group events row", e.to_string()))?;

        let event: GroupEventType = serde_json::from_str(&event_data)
            .map_err(|_| RegistryError::corruption("event_data JSON"))?;

        events.push(GroupEvent {
            id,
            group_id: GroupId::from(group_id),
            event,
            recorded_at,
        });
    }

    Ok(events)
}
