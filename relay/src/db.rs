use crate::config::DbConfig;
use crate::errors::Result;
use crate::metrics::{DB_FAILURES_TOTAL, DB_LATENCY_SECONDS};
use crate::model::SensorReading;
use crate::store::{ReadingStore, RecordId};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

pub async fn make_pool(config: &DbConfig) -> Result<PgPool> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.url)
        .await?;

    info!("Database connection established");
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

/// Postgres-backed reading store. Cloning shares the underlying pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn insert(&self, reading: &SensorReading) -> Result<RecordId> {
        let start = Instant::now();

        let result = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO sensor_readings (device_id, temperature, ts)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&reading.device_id)
        .bind(reading.temperature)
        .bind(reading.timestamp)
        .fetch_one(&self.pool)
        .await;

        let id = observe("insert", start, result)?;
        debug!("Inserted reading {} for {}", id, reading.device_id);

        Ok(id)
    }

    async fn find_latest(&self, device_id: &str) -> Result<Option<SensorReading>> {
        let start = Instant::now();

        let result = sqlx::query_as::<_, SensorReading>(
            r#"
            SELECT device_id, temperature, ts AS timestamp
            FROM sensor_readings
            WHERE device_id = $1
            ORDER BY ts DESC
            LIMIT 1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await;

        observe("find_latest", start, result)
    }
}

/// Records latency for every database operation, failed ones included.
fn observe<T>(op: &str, start: Instant, result: sqlx::Result<T>) -> Result<T> {
    DB_LATENCY_SECONDS
        .with_label_values(&[op])
        .observe(start.elapsed().as_secs_f64());
    if result.is_err() {
        DB_FAILURES_TOTAL.inc();
    }
    result.map_err(Into::into)
}
