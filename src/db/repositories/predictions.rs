use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::{
    db::{
        helpers::{coordinates_from_columns, parse_datetime, parse_severity},
        Database,
    },
    models::PredictionRecord,
};

fn row_to_prediction(row: &Row) -> Result<PredictionRecord> {
    let severity: String = row.get("severity")?;
    let created_at: String = row.get("created_at")?;

    Ok(PredictionRecord {
        id: row.get("id")?,
        is_healthy: row.get("is_healthy")?,
        disease_type: row.get("disease_type")?,
        severity: parse_severity(&severity)?,
        confidence: row.get("confidence")?,
        treatment: row.get("treatment")?,
        coordinates: coordinates_from_columns(row.get("latitude")?, row.get("longitude")?),
        place_name: row.get("place_name")?,
        user_id: row.get("user_id")?,
        image_url: row.get("image_url")?,
        timestamp: row.get("display_timestamp")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Insert or refresh an archived prediction.
    pub async fn upsert_prediction(&self, record: &PredictionRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO predictions (id, is_healthy, disease_type, severity, confidence, treatment,
                                          latitude, longitude, place_name, user_id, image_url,
                                          display_timestamp, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                     treatment = excluded.treatment,
                     place_name = excluded.place_name",
                params![
                    record.id,
                    record.is_healthy,
                    record.disease_type,
                    record.severity.as_str(),
                    record.confidence,
                    record.treatment,
                    record.coordinates.map(|c| c.latitude),
                    record.coordinates.map(|c| c.longitude),
                    record.place_name,
                    record.user_id,
                    record.image_url,
                    record.timestamp,
                    record.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to archive prediction")?;
            Ok(())
        })
        .await
    }

    /// Archived predictions, newest first.
    pub async fn list_predictions(&self, limit: usize) -> Result<Vec<PredictionRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, is_healthy, disease_type, severity, confidence, treatment,
                        latitude, longitude, place_name, user_id, image_url,
                        display_timestamp, created_at
                 FROM predictions
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_prediction(row)?);
            }

            Ok(records)
        })
        .await
    }
}
