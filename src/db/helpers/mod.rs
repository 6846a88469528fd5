use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::models::{Coordinates, Severity};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_severity(value: &str) -> Result<Severity> {
    Severity::parse(value).context("failed to parse severity")
}

pub fn coordinates_from_columns(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Option<Coordinates> {
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)),
        _ => None,
    }
}
