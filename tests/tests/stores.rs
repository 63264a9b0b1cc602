//! Store adapters against real servers.
//!
//! Requires Docker. Run with `--ignored`.

use chrono::Utc;
use clickhouse_client::health::{check_connection, init_schema};
use clickhouse_client::{count_readings, query_readings, ClickHouseClient, ClickHouseConfig};
use integration_tests::containers::{ClickHouseContainer, MongoContainer};
use mongo_client::{MongoConfig, MongoStore};
use pipeline_core::{
    evaluate_alerts, validate_reading, DocumentStore, EnrichedReading, ReadingStatus,
    StructuredStore, WeatherCondition,
};

fn enriched(sensor_id: &str, value: f64) -> EnrichedReading {
    let data = integration_tests::fixtures::reading(sensor_id, "temperature", value);
    EnrichedReading {
        reading: validate_reading(&data).expect("fixture is valid"),
        processed_at: Utc::now(),
        status: ReadingStatus::Processed,
        weather_condition: WeatherCondition::Cloudy,
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_clickhouse_round_trip() {
    let server = ClickHouseContainer::start().await;
    let client = ClickHouseClient::new(ClickHouseConfig {
        url: server.url.clone(),
        username: Some("default".into()),
        ..Default::default()
    });

    check_connection(&client).await.expect("ClickHouse reachable");
    init_schema(&client).await.expect("schema created");
    // Idempotent
    init_schema(&client).await.expect("schema re-created");

    client
        .insert_reading(&enriched("CH-T1", 21.5))
        .await
        .expect("insert succeeds");

    assert_eq!(count_readings(&client, "CH-T1").await.unwrap(), 1);

    let rows = query_readings(&client, "CH-T1", 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sensor_type, "temperature");
    assert_eq!(rows[0].location, "north-field");
    assert_eq!(rows[0].quality, "good");
    assert_eq!(rows[0].timestamp, "2024-01-01T00:00:00Z");
    assert_eq!(rows[0].value, 21.5);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_clickhouse_unreachable_is_connection_error() {
    let client = ClickHouseClient::new(ClickHouseConfig {
        url: "http://127.0.0.1:1".into(),
        ..Default::default()
    });

    let err = check_connection(&client).await.unwrap_err();
    assert!(err.is_connection());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_mongo_round_trip() {
    let server = MongoContainer::start().await;
    let store = MongoStore::connect(MongoConfig {
        uri: server.uri.clone(),
        ..Default::default()
    })
    .await
    .expect("MongoDB reachable");
    store.ensure_indexes().await;

    let reading = enriched("MG-T1", 41.0);
    store.insert_reading(&reading).await.expect("reading stored");

    let alerts = evaluate_alerts(&reading, Utc::now());
    assert_eq!(alerts.len(), 1);
    store.insert_alert(&alerts[0]).await.expect("alert stored");

    assert_eq!(store.count_readings("MG-T1").await.unwrap(), 1);
    assert_eq!(store.count_alerts("MG-T1").await.unwrap(), 1);

    let indexes = store
        .database()
        .collection::<mongodb::bson::Document>("sensor_logs")
        .list_index_names()
        .await
        .unwrap();
    assert!(indexes.iter().any(|name| name.starts_with("sensor_id")));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_mongo_unreachable_is_connection_error() {
    let err = MongoStore::connect(MongoConfig {
        uri: "mongodb://127.0.0.1:1".into(),
        server_selection_timeout_ms: 500,
        ..Default::default()
    })
    .await
    .err()
    .expect("connect fails");

    assert!(err.is_connection());
}
