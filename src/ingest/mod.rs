pub mod dedup;
pub mod parser;
pub mod scanner;
pub mod writer;

use crate::config::CursorFilter;
use crate::db::Database;
use crate::ingest::dedup::PointDeduplicator;
use crate::ingest::writer::IngestionWriter;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub cursor_filter: CursorFilter,
    pub progress_interval: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub starting_count: i64,
    pub cursor: Option<NaiveDateTime>,
    pub files_skipped: usize,
    pub files_processed: usize,
    pub points_emitted: u64,
    pub points_inserted: u64,
    pub points_filtered: u64,
    pub final_count: i64,
}

/// One incremental run: read the cursor, scan the archive, then parse,
/// dedup and insert file by file inside a single transaction. Any error
/// returns before the commit and leaves the store untouched.
pub fn run_ingest(
    database: &mut Database,
    archive_dir: &Path,
    options: &IngestOptions,
) -> Result<IngestSummary> {
    let starting_count = database.location_count()?;
    let cursor = database.cursor()?;

    match cursor {
        Some(cursor) => info!(starting_count, %cursor, "resuming from stored cursor"),
        None => info!("no previous locations found, starting from scratch"),
    }

    let (file_cursor, point_floor) = match options.cursor_filter {
        CursorFilter::FileName => (cursor, None),
        CursorFilter::Point => (None, cursor),
    };

    let scan = scanner::scan_archive(archive_dir, file_cursor)?;
    info!(
        candidates = scan.candidates.len(),
        skipped = scan.skipped,
        archive = %archive_dir.display(),
        "archive scanned"
    );

    let mut dedup = PointDeduplicator::default();
    let mut writer = IngestionWriter::new(
        database.begin_ingest()?,
        point_floor,
        options.progress_interval,
    );
    let mut points_emitted = 0_u64;

    for file in &scan.candidates {
        let xml = fs::read_to_string(&file.path)
            .with_context(|| format!("Failed to read archive file: {}", file.path.display()))?;
        let activities = parser::parse_activities(&xml)
            .with_context(|| format!("Failed to parse archive file: {}", file.path.display()))?;

        let points = dedup.emit_file(&activities);
        points.iter().try_for_each(|point| {
            writer
                .write(point)
                .map(|_| ())
                .with_context(|| format!("Failed to store point from: {}", file.path.display()))
        })?;

        points_emitted += points.len() as u64;
        debug!(
            file = %file.name,
            activities = activities.len(),
            points = points.len(),
            inserted = writer.inserted(),
            "archive file processed"
        );
    }

    let written = writer.finish()?;
    let final_count = database.location_count()?;

    info!(
        inserted = written.inserted,
        filtered = written.filtered,
        final_count,
        last_emitted = ?dedup.previous_timestamp(),
        "ingestion committed"
    );

    Ok(IngestSummary {
        starting_count,
        cursor,
        files_skipped: scan.skipped,
        files_processed: scan.candidates.len(),
        points_emitted,
        points_inserted: written.inserted,
        points_filtered: written.filtered,
        final_count,
    })
}
