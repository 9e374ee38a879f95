//! Charge point persistence.
//!
//! Raw SQL over the shared [`Database`]. Rows come back in insertion order
//! (SQLite rowid) so list pages are stable.

use std::sync::Arc;

use rusqlite::OptionalExtension;
use tracing::debug;
use uuid::Uuid;

use chargemap_core::error::ChargemapError;
use chargemap_core::types::{ChargePoint, ChargePointPatch, NewChargePoint};

use crate::db::{sql_err, Database};

const SELECT_COLUMNS: &str = "SELECT id, latitude, longitude, location FROM charge_points";

/// Repository for charge point records.
#[derive(Clone)]
pub struct ChargePointRepository {
    db: Arc<Database>,
}

impl ChargePointRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new charge point under a fresh v4 id.
    pub fn create(&self, new: &NewChargePoint) -> Result<ChargePoint, ChargemapError> {
        let point = ChargePoint {
            id: Uuid::new_v4(),
            lat: new.lat,
            lng: new.lng,
            location: new.location.clone(),
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO charge_points (id, latitude, longitude, location)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![point.id.to_string(), point.lat, point.lng, point.location],
            )
            .map_err(|e| ChargemapError::Storage(format!("Failed to save charge point: {}", e)))?;
            Ok(())
        })?;

        debug!(id = %point.id, "Charge point created");
        Ok(point)
    }

    /// Find a charge point by ID.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<ChargePoint>, ChargemapError> {
        self.db.with_conn(|conn| find_in(conn, id))
    }

    /// One page of charge points.
    pub fn list(&self, skip: u64, limit: u64) -> Result<Vec<ChargePoint>, ChargemapError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("{} ORDER BY rowid LIMIT ?1 OFFSET ?2", SELECT_COLUMNS))
                .map_err(sql_err)?;

            let rows = stmt
                .query_map(rusqlite::params![limit as i64, skip as i64], row_to_charge_point)
                .map_err(sql_err)?;

            collect_rows(rows)
        })
    }

    /// Every charge point. Used by the nearest lookup, which scans them all.
    pub fn all(&self) -> Result<Vec<ChargePoint>, ChargemapError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("{} ORDER BY rowid", SELECT_COLUMNS))
                .map_err(sql_err)?;
            let rows = stmt.query_map([], row_to_charge_point).map_err(sql_err)?;
            collect_rows(rows)
        })
    }

    /// Apply a partial update. Returns `None` when the id does not exist.
    pub fn update(
        &self,
        id: Uuid,
        patch: &ChargePointPatch,
    ) -> Result<Option<ChargePoint>, ChargemapError> {
        self.db.with_conn(|conn| {
            let Some(current) = find_in(conn, id)? else {
                return Ok(None);
            };
            let updated = patch.apply(&current);

            conn.execute(
                "UPDATE charge_points
                 SET latitude = ?2, longitude = ?3, location = ?4,
                     updated_at = strftime('%s', 'now')
                 WHERE id = ?1",
                rusqlite::params![id.to_string(), updated.lat, updated.lng, updated.location],
            )
            .map_err(|e| {
                ChargemapError::Storage(format!("Failed to update charge point: {}", e))
            })?;

            debug!(id = %id, "Charge point updated");
            Ok(Some(updated))
        })
    }

    /// Delete a charge point, returning the removed record.
    pub fn delete(&self, id: Uuid) -> Result<Option<ChargePoint>, ChargemapError> {
        self.db.with_conn(|conn| {
            let Some(existing) = find_in(conn, id)? else {
                return Ok(None);
            };

            conn.execute(
                "DELETE FROM charge_points WHERE id = ?1",
                rusqlite::params![id.to_string()],
            )
            .map_err(|e| {
                ChargemapError::Storage(format!("Failed to delete charge point: {}", e))
            })?;

            debug!(id = %id, "Charge point deleted");
            Ok(Some(existing))
        })
    }

    /// Count stored charge points.
    pub fn count(&self) -> Result<u64, ChargemapError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM charge_points", [], |row| row.get(0))
                .map_err(sql_err)?;
            Ok(count as u64)
        })
    }
}

fn find_in(
    conn: &rusqlite::Connection,
    id: Uuid,
) -> Result<Option<ChargePoint>, ChargemapError> {
    conn.query_row(
        &format!("{} WHERE id = ?1", SELECT_COLUMNS),
        rusqlite::params![id.to_string()],
        row_to_charge_point,
    )
    .optional()
    .map_err(sql_err)
}

fn collect_rows<I>(rows: I) -> Result<Vec<ChargePoint>, ChargemapError>
where
    I: Iterator<Item = rusqlite::Result<ChargePoint>>,
{
    rows.map(|row| row.map_err(sql_err)).collect()
}

fn row_to_charge_point(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChargePoint> {
    let id_str: String = row.get(0)?;
    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ChargePoint {
        id,
        lat: row.get(1)?,
        lng: row.get(2)?,
        location: row.get(3)?,
    })
}
