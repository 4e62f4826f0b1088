pub mod queries;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use geo::Point;
use rusqlite::{Connection, Transaction, params};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct LocationRow {
    pub id: i64,
    pub longitude: f64,
    pub latitude: f64,
    pub timestamp: NaiveDateTime,
    #[serde(rename = "type")]
    pub point_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimestampRange {
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
}

/// A row ready for insertion. `geometry` is x = longitude, y = latitude.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedPoint {
    pub geometry: Point<f64>,
    pub timestamp: NaiveDateTime,
    pub point_type: String,
}

impl PersistedPoint {
    pub fn ewkt(&self) -> String {
        format!(
            "SRID={};POINT({} {})",
            queries::SRID,
            self.geometry.x(),
            self.geometry.y()
        )
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    pub fn location_count(&self) -> Result<i64> {
        self.conn
            .query_row(queries::COUNT_LOCATIONS, [], |row| row.get(0))
            .context("Failed to count locations")
    }

    /// Latest committed timestamp, `None` for an empty store.
    pub fn cursor(&self) -> Result<Option<NaiveDateTime>> {
        if self.location_count()? == 0 {
            return Ok(None);
        }

        self.conn
            .query_row(queries::MAX_TIMESTAMP, [], |row| row.get(0))
            .context("Failed to read latest location timestamp")
    }

    pub fn timestamp_range(&self) -> Result<TimestampRange> {
        self.conn
            .query_row(queries::TIMESTAMP_RANGE, [], |row| {
                Ok(TimestampRange {
                    first_timestamp: row.get(0)?,
                    last_timestamp: row.get(1)?,
                })
            })
            .context("Failed to read location timestamp range")
    }

    pub fn locations_page(&self, limit: usize, offset: usize) -> Result<Vec<LocationRow>> {
        let mut statement = self.conn.prepare(queries::LOCATIONS_PAGE)?;

        let rows = statement
            .query_map(params![to_sql_count(limit), to_sql_count(offset)], |row| {
                Ok(LocationRow {
                    id: row.get(0)?,
                    longitude: row.get(1)?,
                    latitude: row.get(2)?,
                    timestamp: row.get(3)?,
                    point_type: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query locations")?;

        Ok(rows)
    }

    /// Opens the single transaction a run writes into. Dropping the session
    /// without `commit` rolls every insert back.
    pub fn begin_ingest(&mut self) -> Result<IngestSession<'_>> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start ingestion transaction")?;

        Ok(IngestSession {
            transaction,
            inserted: 0,
        })
    }
}

// Saturating: SQLite reads a negative OFFSET as zero.
fn to_sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub struct IngestSession<'conn> {
    transaction: Transaction<'conn>,
    inserted: u64,
}

impl IngestSession<'_> {
    pub fn insert_point(&mut self, point: &PersistedPoint) -> Result<()> {
        self.transaction
            .execute(
                queries::INSERT_LOCATION,
                params![
                    point.ewkt(),
                    point.geometry.x(),
                    point.geometry.y(),
                    point.timestamp,
                    &point.point_type
                ],
            )
            .context("Failed to insert location")?;
        self.inserted += 1;

        Ok(())
    }

    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    pub fn commit(self) -> Result<u64> {
        let inserted = self.inserted;
        self.transaction
            .commit()
            .context("Failed to commit ingested locations")?;

        Ok(inserted)
    }
}
