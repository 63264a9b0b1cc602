//! ClickHouse table schemas.
//!
//! Statements are templates over the database name: `{db}` is replaced
//! with the configured database before execution.

/// Table readings are written to.
pub const READINGS_TABLE: &str = "sensor_readings";

/// SQL for creating the database.
pub const CREATE_DATABASE: &str = "CREATE DATABASE IF NOT EXISTS {db}";

/// SQL for creating the readings table.
///
/// `id` is generated by the worker. The data-skipping indexes back the
/// query API's filters by sensor and by sensor type.
pub const CREATE_SENSOR_READINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS {db}.sensor_readings (
    id String,
    sensor_id String,
    sensor_type LowCardinality(String),
    location String,
    value Float64,

    -- Original device text, kept verbatim
    timestamp String,

    quality LowCardinality(String),
    battery_level Float64,

    created_at DateTime DEFAULT now(),

    INDEX idx_sensor_id sensor_id TYPE bloom_filter GRANULARITY 4,
    INDEX idx_sensor_type sensor_type TYPE set(16) GRANULARITY 4
)
ENGINE = MergeTree()
ORDER BY (sensor_type, sensor_id, created_at)
SETTINGS index_granularity = 8192
"#;

/// Table consumer positions are saved to.
pub const OFFSETS_TABLE: &str = "queue_offsets";

/// SQL for creating the consumer offsets table.
///
/// Rows are only ever appended; merges keep the highest offset per
/// partition.
pub const CREATE_QUEUE_OFFSETS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS {db}.queue_offsets (
    topic String,
    partition_id Int32,
    next_offset Int64,
    updated_at DateTime DEFAULT now()
)
ENGINE = ReplacingMergeTree(next_offset)
ORDER BY (topic, partition_id)
"#;

/// Returns all DDL statements for `database`, in execution order.
pub fn all_statements(database: &str) -> Vec<String> {
    [
        CREATE_DATABASE,
        CREATE_SENSOR_READINGS_TABLE,
        CREATE_QUEUE_OFFSETS_TABLE,
    ]
        .iter()
        .map(|ddl| ddl.replace("{db}", database))
        .collect()
}
