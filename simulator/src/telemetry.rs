use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/data/save`
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub device_id: String,
    pub temperature: f64,
}

/// Body of a successful `GET /api/v1/data/latest`
#[derive(Debug, Clone, Deserialize)]
pub struct LatestReading {
    pub temperature: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
