use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Serialize, Serializer};

/// A single temperature reading reported by a device
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SensorReading {
    pub device_id: String,
    pub temperature: f64,
    pub timestamp: DateTime<Utc>,
}

impl SensorReading {
    /// Creates a reading stamped with the current time.
    pub fn new(device_id: impl Into<String>, temperature: f64) -> Self {
        // Postgres keeps microseconds, so truncate up front to read back what was written.
        Self::at(device_id, temperature, Utc::now().trunc_subsecs(6))
    }

    pub fn at(device_id: impl Into<String>, temperature: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            temperature,
            timestamp,
        }
    }
}

/// Body of a successful latest-query. The row id and device id stay internal.
#[derive(Debug, Serialize)]
pub struct LatestReading {
    pub temperature: f64,
    #[serde(serialize_with = "serialize_iso8601")]
    pub timestamp: DateTime<Utc>,
}

impl From<SensorReading> for LatestReading {
    fn from(reading: SensorReading) -> Self {
        Self {
            temperature: reading.temperature,
            timestamp: reading.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn serialize_iso8601<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}
