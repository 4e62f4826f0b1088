use crate::db::{IngestSession, PersistedPoint};
use crate::ingest::dedup::EmittedPoint;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime};
use geo::Point;
use tracing::info;

const NAIVE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub inserted: u64,
    pub filtered: u64,
}

/// Streams emitted points into one ingestion session and commits once.
pub struct IngestionWriter<'conn> {
    session: IngestSession<'conn>,
    point_floor: Option<NaiveDateTime>,
    progress_interval: u64,
    filtered: u64,
}

impl<'conn> IngestionWriter<'conn> {
    /// Points at or before `point_floor` are dropped instead of inserted.
    pub fn new(
        session: IngestSession<'conn>,
        point_floor: Option<NaiveDateTime>,
        progress_interval: u64,
    ) -> Self {
        Self {
            session,
            point_floor,
            progress_interval: progress_interval.max(1),
            filtered: 0,
        }
    }

    pub fn inserted(&self) -> u64 {
        self.session.inserted()
    }

    pub fn write(&mut self, point: &EmittedPoint) -> Result<bool> {
        let persisted = to_persisted(point)?;

        if self
            .point_floor
            .is_some_and(|floor| persisted.timestamp <= floor)
        {
            self.filtered += 1;
            return Ok(false);
        }

        self.session.insert_point(&persisted)?;

        let inserted = self.session.inserted();
        if inserted % self.progress_interval == 0 {
            info!(inserted, "locations written");
        }

        Ok(true)
    }

    pub fn finish(self) -> Result<WriteSummary> {
        let filtered = self.filtered;
        let inserted = self.session.commit()?;

        Ok(WriteSummary { inserted, filtered })
    }
}

pub fn to_persisted(point: &EmittedPoint) -> Result<PersistedPoint> {
    let latitude = parse_degrees(&point.latitude, "latitude")?;
    let longitude = parse_degrees(&point.longitude, "longitude")?;

    Ok(PersistedPoint {
        geometry: Point::new(longitude, latitude),
        timestamp: parse_point_time(&point.time)?,
        point_type: point.sport.clone(),
    })
}

fn parse_degrees(raw: &str, axis: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .with_context(|| format!("Invalid {axis} value: {raw}"))
}

/// Offsets are dropped and the wall-clock time is kept as written.
pub fn parse_point_time(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.naive_local());
    }

    NAIVE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .with_context(|| format!("Invalid trackpoint time: {raw}"))
}
