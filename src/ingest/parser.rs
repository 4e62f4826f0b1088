use anyhow::{Context, Result};
use roxmltree::{Document, Node};

pub const TCX_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";
pub const UNKNOWN_SPORT: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub sport: String,
    pub trackpoints: Vec<Trackpoint>,
}

/// The fields one `Trackpoint` contributes, in child order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trackpoint {
    pub fields: Vec<TrackpointField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackpointField {
    Position {
        latitude: Option<String>,
        longitude: Option<String>,
    },
    Time(Option<String>),
}

/// Latitude, longitude and time as last seen in the document. Values carry
/// forward across trackpoints and activities of the same file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackpointRecord {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompleteRecord<'a> {
    pub latitude: &'a str,
    pub longitude: &'a str,
    pub time: &'a str,
}

impl TrackpointRecord {
    pub fn apply(&mut self, field: &TrackpointField) {
        match field {
            TrackpointField::Position {
                latitude,
                longitude,
            } => {
                self.latitude = latitude.clone();
                self.longitude = longitude.clone();
            }
            TrackpointField::Time(time) => {
                self.time = time.clone();
            }
        }
    }

    pub fn complete(&self) -> Option<CompleteRecord<'_>> {
        Some(CompleteRecord {
            latitude: self.latitude.as_deref()?,
            longitude: self.longitude.as_deref()?,
            time: self.time.as_deref()?,
        })
    }
}

pub fn parse_activities(xml: &str) -> Result<Vec<Activity>> {
    let document = Document::parse(xml.trim_start_matches('\u{feff}'))
        .context("Malformed activity XML")?;

    let activities = document
        .root()
        .descendants()
        .filter(|node| is_tcx_element(node, "Activity"))
        .map(|activity| Activity {
            sport: activity
                .attribute("Sport")
                .unwrap_or(UNKNOWN_SPORT)
                .to_string(),
            trackpoints: activity
                .descendants()
                .filter(|node| is_tcx_element(node, "Trackpoint"))
                .map(read_trackpoint)
                .collect(),
        })
        .collect();

    Ok(activities)
}

fn read_trackpoint(trackpoint: Node<'_, '_>) -> Trackpoint {
    let fields = trackpoint
        .children()
        .filter(Node::is_element)
        .filter_map(|child| match child.tag_name().name() {
            "Position" => read_position(trackpoint),
            "Time" => Some(TrackpointField::Time(child.text().map(ToOwned::to_owned))),
            _ => None,
        })
        .collect();

    Trackpoint { fields }
}

// Degrees are looked up anywhere under the trackpoint, not only under Position.
fn read_position(trackpoint: Node<'_, '_>) -> Option<TrackpointField> {
    let latitude = first_descendant(trackpoint, "LatitudeDegrees")?;
    let longitude = first_descendant(trackpoint, "LongitudeDegrees")?;

    Some(TrackpointField::Position {
        latitude: latitude.text().map(ToOwned::to_owned),
        longitude: longitude.text().map(ToOwned::to_owned),
    })
}

fn first_descendant<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.descendants()
        .skip(1)
        .find(|candidate| is_tcx_element(candidate, name))
}

fn is_tcx_element(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node
            .tag_name()
            .namespace()
            .is_none_or(|namespace| namespace == TCX_NAMESPACE)
}

#[cfg(test)]
mod tests {
    use super::{TrackpointField, TrackpointRecord, parse_activities};
    use crate::ingest::dedup::{EmittedPoint, PointDeduplicator};

    const NESTED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2">
  <Activities>
    <Activity Sport="Biking">
      <Lap StartTime="2024-01-01T10:00:00Z">
        <Track>
          <Trackpoint>
            <Time>2024-01-01T10:00:00Z</Time>
            <Position>
              <LatitudeDegrees>47.1</LatitudeDegrees>
              <LongitudeDegrees>8.2</LongitudeDegrees>
            </Position>
            <HeartRateBpm><Value>120</Value></HeartRateBpm>
          </Trackpoint>
        </Track>
      </Lap>
      <Lap StartTime="2024-01-01T10:10:00Z">
        <Track>
          <Trackpoint>
            <Time>2024-01-01T10:10:00Z</Time>
          </Trackpoint>
        </Track>
      </Lap>
    </Activity>
    <Activity>
      <Lap><Track><Trackpoint><Time>2024-01-01T11:00:00Z</Time></Trackpoint></Track></Lap>
    </Activity>
  </Activities>
</TrainingCenterDatabase>"#;

    #[test]
    fn flattens_laps_and_keeps_child_order() {
        let activities = parse_activities(NESTED).expect("parsed");

        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0].sport, "Biking");
        assert_eq!(activities[0].trackpoints.len(), 2);
        assert_eq!(
            activities[0].trackpoints[0].fields,
            vec![
                TrackpointField::Time(Some("2024-01-01T10:00:00Z".to_string())),
                TrackpointField::Position {
                    latitude: Some("47.1".to_string()),
                    longitude: Some("8.2".to_string()),
                },
            ]
        );
        assert_eq!(
            activities[0].trackpoints[1].fields,
            vec![TrackpointField::Time(Some(
                "2024-01-01T10:10:00Z".to_string()
            ))]
        );
    }

    #[test]
    fn missing_sport_defaults_to_unknown() {
        let activities = parse_activities(NESTED).expect("parsed");
        assert_eq!(activities[1].sport, "Unknown");
    }

    #[test]
    fn position_without_both_degrees_contributes_nothing() {
        let xml = r#"<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2">
  <Activities><Activity Sport="Running"><Lap><Track>
    <Trackpoint>
      <Position><LatitudeDegrees>1.0</LatitudeDegrees></Position>
      <Time>2024-01-01T10:00:00Z</Time>
    </Trackpoint>
  </Track></Lap></Activity></Activities>
</TrainingCenterDatabase>"#;

        let activities = parse_activities(xml).expect("parsed");
        assert_eq!(
            activities[0].trackpoints[0].fields,
            vec![TrackpointField::Time(Some(
                "2024-01-01T10:00:00Z".to_string()
            ))]
        );
    }

    #[test]
    fn position_reads_degrees_anywhere_under_trackpoint() {
        let xml = r#"<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2">
  <Activities><Activity Sport="Running"><Lap><Track>
    <Trackpoint>
      <Time>t1</Time>
      <Position/>
      <Extra>
        <LatitudeDegrees>1.0</LatitudeDegrees>
        <LongitudeDegrees>2.0</LongitudeDegrees>
      </Extra>
    </Trackpoint>
  </Track></Lap></Activity></Activities>
</TrainingCenterDatabase>"#;

        let activities = parse_activities(xml).expect("parsed");
        assert_eq!(
            activities[0].trackpoints[0].fields,
            vec![
                TrackpointField::Time(Some("t1".to_string())),
                TrackpointField::Position {
                    latitude: Some("1.0".to_string()),
                    longitude: Some("2.0".to_string()),
                },
            ]
        );

        let points = PointDeduplicator::default().emit_file(&activities);
        assert_eq!(
            points,
            vec![EmittedPoint {
                latitude: "1.0".to_string(),
                longitude: "2.0".to_string(),
                time: "t1".to_string(),
                sport: "Running".to_string(),
            }]
        );
    }

    #[test]
    fn document_without_namespace_is_read() {
        let xml = r#"<TrainingCenterDatabase>
  <Activities><Activity Sport="Hiking"><Lap><Track>
    <Trackpoint>
      <Time>2024-01-01T10:00:00Z</Time>
      <Position>
        <LatitudeDegrees>46.5</LatitudeDegrees>
        <LongitudeDegrees>7.9</LongitudeDegrees>
      </Position>
    </Trackpoint>
  </Track></Lap></Activity></Activities>
</TrainingCenterDatabase>"#;

        let activities = parse_activities(xml).expect("parsed");
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].sport, "Hiking");

        let points = PointDeduplicator::default().emit_file(&activities);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].latitude, "46.5");
        assert_eq!(points[0].longitude, "7.9");
    }

    #[test]
    fn elements_in_a_foreign_namespace_are_ignored() {
        let xml = r#"<TrainingCenterDatabase xmlns="http://example.com/other">
  <Activities><Activity Sport="Running"><Lap><Track>
    <Trackpoint><Time>t1</Time></Trackpoint>
  </Track></Lap></Activity></Activities>
</TrainingCenterDatabase>"#;

        assert!(parse_activities(xml).expect("parsed").is_empty());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_activities("<TrainingCenterDatabase><Activities>").is_err());
    }

    #[test]
    fn record_completes_only_with_all_three_fields() {
        let mut record = TrackpointRecord::default();
        record.apply(&TrackpointField::Time(Some("t1".to_string())));
        assert!(record.complete().is_none());

        record.apply(&TrackpointField::Position {
            latitude: Some("1.0".to_string()),
            longitude: Some("2.0".to_string()),
        });
        let complete = record.complete().expect("complete");
        assert_eq!(complete.latitude, "1.0");
        assert_eq!(complete.longitude, "2.0");
        assert_eq!(complete.time, "t1");

        record.apply(&TrackpointField::Time(None));
        assert!(record.complete().is_none());
    }
}
