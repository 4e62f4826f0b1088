use crate::ingest::parser::{Activity, TrackpointRecord};

/// A completed record that passed the timestamp check, still in text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedPoint {
    pub latitude: String,
    pub longitude: String,
    pub time: String,
    pub sport: String,
}

/// Holds the time of the last emitted point for the whole run. It is never
/// reset between files, so the last time of one file can suppress an equal
/// first time in the next.
#[derive(Debug, Clone, Default)]
pub struct PointDeduplicator {
    previous_timestamp: Option<String>,
}

impl PointDeduplicator {
    pub fn previous_timestamp(&self) -> Option<&str> {
        self.previous_timestamp.as_deref()
    }

    /// Records `time` and returns true unless it equals the previous emission.
    pub fn admit(&mut self, time: &str) -> bool {
        if self.previous_timestamp.as_deref() == Some(time) {
            return false;
        }

        self.previous_timestamp = Some(time.to_string());
        true
    }

    /// Walks one file's activities with a fresh record, checking for an
    /// emission after every field a trackpoint child contributes.
    pub fn emit_file(&mut self, activities: &[Activity]) -> Vec<EmittedPoint> {
        let mut record = TrackpointRecord::default();
        let mut emitted = Vec::new();

        for activity in activities {
            for field in activity
                .trackpoints
                .iter()
                .flat_map(|trackpoint| trackpoint.fields.iter())
            {
                record.apply(field);

                let Some(complete) = record.complete() else {
                    continue;
                };
                if self.admit(complete.time) {
                    emitted.push(EmittedPoint {
                        latitude: complete.latitude.to_string(),
                        longitude: complete.longitude.to_string(),
                        time: complete.time.to_string(),
                        sport: activity.sport.clone(),
                    });
                }
            }
        }

        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::PointDeduplicator;
    use crate::ingest::parser::{Activity, Trackpoint, TrackpointField};

    fn position(lat: &str, lng: &str) -> TrackpointField {
        TrackpointField::Position {
            latitude: Some(lat.to_string()),
            longitude: Some(lng.to_string()),
        }
    }

    fn time(raw: &str) -> TrackpointField {
        TrackpointField::Time(Some(raw.to_string()))
    }

    fn activity(sport: &str, trackpoints: Vec<Vec<TrackpointField>>) -> Activity {
        Activity {
            sport: sport.to_string(),
            trackpoints: trackpoints
                .into_iter()
                .map(|fields| Trackpoint { fields })
                .collect(),
        }
    }

    #[test]
    fn time_only_trackpoint_reuses_earlier_position() {
        let mut dedup = PointDeduplicator::default();
        let points = dedup.emit_file(&[activity(
            "Running",
            vec![
                vec![position("1.0", "2.0"), time("2024-01-01T10:00:00Z")],
                vec![time("2024-01-01T10:00:05Z")],
            ],
        )]);

        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|point| point.latitude == "1.0"));
        assert!(points.iter().all(|point| point.longitude == "2.0"));
        assert_eq!(points[1].time, "2024-01-01T10:00:05Z");
        assert_eq!(points[1].sport, "Running");
    }

    #[test]
    fn position_only_trackpoint_then_time_only_trackpoint_emits() {
        let mut dedup = PointDeduplicator::default();
        let points = dedup.emit_file(&[activity(
            "Running",
            vec![
                vec![time("t1"), position("1.0", "2.0")],
                vec![position("3.0", "4.0")],
                vec![time("t2")],
            ],
        )]);

        assert_eq!(points.len(), 2);
        assert_eq!(points[1].latitude, "3.0");
        assert_eq!(points[1].time, "t2");
    }

    #[test]
    fn identical_consecutive_times_emit_once() {
        let mut dedup = PointDeduplicator::default();
        let points = dedup.emit_file(&[activity(
            "Running",
            vec![
                vec![time("t1"), position("1.0", "2.0")],
                vec![time("t1"), position("1.0", "2.0")],
            ],
        )]);

        assert_eq!(points.len(), 1);
    }

    #[test]
    fn record_carries_across_activities_in_a_file() {
        let mut dedup = PointDeduplicator::default();
        let points = dedup.emit_file(&[
            activity("Running", vec![vec![position("1.0", "2.0"), time("t1")]]),
            activity("Walking", vec![vec![time("t2")]]),
        ]);

        assert_eq!(points.len(), 2);
        assert_eq!(points[1].sport, "Walking");
        assert_eq!(points[1].latitude, "1.0");
    }

    #[test]
    fn window_spans_files() {
        let mut dedup = PointDeduplicator::default();
        let first = dedup.emit_file(&[activity(
            "Running",
            vec![vec![position("1.0", "2.0"), time("t1")]],
        )]);
        let second = dedup.emit_file(&[activity(
            "Running",
            vec![
                vec![position("5.0", "6.0"), time("t1")],
                vec![time("t2")],
            ],
        )]);

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].time, "t2");
        assert_eq!(second[0].latitude, "5.0");
        assert_eq!(dedup.previous_timestamp(), Some("t2"));
    }

    #[test]
    fn incomplete_record_never_emits() {
        let mut dedup = PointDeduplicator::default();
        let points = dedup.emit_file(&[activity(
            "Running",
            vec![vec![time("t1")], vec![time("t2")]],
        )]);

        assert!(points.is_empty());
        assert_eq!(dedup.previous_timestamp(), None);
    }
}
