pub const SRID: i32 = 4326;

pub const CREATE_LOCATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS locations (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  geom       TEXT NOT NULL,
  longitude  REAL NOT NULL,
  latitude   REAL NOT NULL,
  timestamp  TEXT NOT NULL,
  type       TEXT NOT NULL DEFAULT 'Unknown'
);
"#;

pub const INDEX_LOCATIONS_TIMESTAMP: &str =
    "CREATE INDEX IF NOT EXISTS idx_locations_timestamp ON locations(timestamp);";

pub const COUNT_LOCATIONS: &str = "SELECT COUNT(id) FROM locations";

pub const MAX_TIMESTAMP: &str = "SELECT MAX(timestamp) FROM locations";

pub const TIMESTAMP_RANGE: &str = "SELECT MIN(timestamp), MAX(timestamp) FROM locations";

pub const INSERT_LOCATION: &str = "INSERT INTO locations (geom, longitude, latitude, timestamp, type) VALUES (?1, ?2, ?3, ?4, ?5)";

pub const LOCATIONS_PAGE: &str = r#"
SELECT id, longitude, latitude, timestamp, type
FROM locations
ORDER BY timestamp ASC, id ASC
LIMIT ?1 OFFSET ?2
"#;

pub fn schema_statements() -> Vec<&'static str> {
    vec![CREATE_LOCATIONS, INDEX_LOCATIONS_TIMESTAMP]
}
