//! Prediction records and the classification shape shared by all backends.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Disease label reported when the backend could not identify the condition.
pub const UNKNOWN_DISEASE: &str = "Unknown";
/// Disease label some backends report for a clean leaf.
pub const NO_DISEASE_DETECTED: &str = "No Disease Detected";
/// Place name shown until reverse geocoding succeeds.
pub const PLACE_NAME_UNAVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Mild => "Mild",
            Severity::Moderate => "Moderate",
            Severity::Severe => "Severe",
            Severity::NotApplicable => "N/A",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "Mild" | "mild" => Ok(Severity::Mild),
            "Moderate" | "moderate" => Ok(Severity::Moderate),
            "Severe" | "severe" => Ok(Severity::Severe),
            "N/A" | "n/a" => Ok(Severity::NotApplicable),
            other => Err(anyhow!("unknown severity '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Backend-agnostic result of classifying one image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub is_healthy: bool,
    pub disease_type: String,
    pub severity: Severity,
    pub confidence: f64,
}

impl Classification {
    /// Enforces the severity/health pairing and clamps confidence into `[0, 1]`.
    pub fn normalized(mut self) -> Self {
        self.severity = match (self.is_healthy, self.severity) {
            (true, _) => Severity::NotApplicable,
            (false, Severity::NotApplicable) => Severity::Mild,
            (false, severity) => severity,
        };
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if self.disease_type.trim().is_empty() {
            self.disease_type = UNKNOWN_DISEASE.to_string();
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub id: String,
    pub is_healthy: bool,
    pub disease_type: String,
    pub severity: Severity,
    pub confidence: f64,
    pub treatment: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub place_name: String,
    pub user_id: Option<String>,
    pub image_url: String,
    /// Locale-formatted creation time for display.
    pub timestamp: String,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn new(
        classification: Classification,
        coordinates: Option<Coordinates>,
        image_url: String,
        user_id: Option<String>,
    ) -> Self {
        let classification = classification.normalized();
        let created_at = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            is_healthy: classification.is_healthy,
            disease_type: classification.disease_type,
            severity: classification.severity,
            confidence: classification.confidence,
            treatment: None,
            coordinates,
            place_name: PLACE_NAME_UNAVAILABLE.to_string(),
            user_id,
            image_url,
            timestamp: created_at
                .with_timezone(&Local)
                .format("%-m/%-d/%Y, %-I:%M:%S %p")
                .to_string(),
            created_at,
        }
    }

    /// Treatment is looked up during submission only for unhealthy, identified diseases.
    pub fn wants_initial_treatment(&self) -> bool {
        !self.is_healthy && self.disease_type != UNKNOWN_DISEASE
    }

    /// Language changes refresh treatment only for records that carry a real disease label.
    pub fn accepts_treatment_refresh(&self) -> bool {
        !self.is_healthy
            && self.disease_type != UNKNOWN_DISEASE
            && self.disease_type != NO_DISEASE_DETECTED
    }

    pub fn needs_expert_referral(&self) -> bool {
        !self.is_healthy
            && (self.severity == Severity::Severe || self.disease_type == UNKNOWN_DISEASE)
    }

    pub fn disease_context(&self) -> String {
        format!(
            "Disease: {}, Severity: {}",
            self.disease_type,
            self.severity.as_str()
        )
    }

    pub fn has_place_name(&self) -> bool {
        self.place_name != PLACE_NAME_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification(is_healthy: bool, disease: &str, severity: Severity) -> Classification {
        Classification {
            is_healthy,
            disease_type: disease.to_string(),
            severity,
            confidence: 0.8,
        }
    }

    #[test]
    fn healthy_classification_always_has_no_severity() {
        let normalized = classification(true, "Healthy", Severity::Severe).normalized();
        assert_eq!(normalized.severity, Severity::NotApplicable);
    }

    #[test]
    fn unhealthy_classification_never_keeps_not_applicable() {
        let normalized = classification(false, "Bud Rot", Severity::NotApplicable).normalized();
        assert_eq!(normalized.severity, Severity::Mild);

        let severe = classification(false, "Bud Rot", Severity::Severe).normalized();
        assert_eq!(severe.severity, Severity::Severe);
    }

    #[test]
    fn confidence_is_clamped() {
        let mut c = classification(false, "Leaf Spot", Severity::Mild);
        c.confidence = 1.7;
        assert_eq!(c.clone().normalized().confidence, 1.0);
        c.confidence = f64::NAN;
        assert_eq!(c.normalized().confidence, 0.0);
    }

    #[test]
    fn blank_disease_label_becomes_unknown() {
        let normalized = classification(false, "  ", Severity::Mild).normalized();
        assert_eq!(normalized.disease_type, UNKNOWN_DISEASE);
    }

    #[test]
    fn new_record_starts_without_enrichment() {
        let record = PredictionRecord::new(
            classification(false, "Bud Rot", Severity::Moderate),
            None,
            "file:///tmp/leaf.jpg".into(),
            None,
        );
        assert!(record.treatment.is_none());
        assert_eq!(record.place_name, PLACE_NAME_UNAVAILABLE);
        assert!(!record.has_place_name());
        assert!(!record.id.is_empty());
    }

    #[test]
    fn treatment_gates_follow_sentinels() {
        let unknown = PredictionRecord::new(
            classification(false, UNKNOWN_DISEASE, Severity::Mild),
            None,
            String::new(),
            None,
        );
        assert!(!unknown.wants_initial_treatment());
        assert!(!unknown.accepts_treatment_refresh());
        assert!(unknown.needs_expert_referral());

        let none_detected = PredictionRecord::new(
            classification(false, NO_DISEASE_DETECTED, Severity::Mild),
            None,
            String::new(),
            None,
        );
        assert!(none_detected.wants_initial_treatment());
        assert!(!none_detected.accepts_treatment_refresh());

        let healthy = PredictionRecord::new(
            classification(true, "Healthy", Severity::NotApplicable),
            None,
            String::new(),
            None,
        );
        assert!(!healthy.wants_initial_treatment());
        assert!(!healthy.needs_expert_referral());
    }

    #[test]
    fn serializes_with_camel_case_and_severity_label() {
        let record = PredictionRecord::new(
            classification(true, "Healthy", Severity::NotApplicable),
            Some(Coordinates::new(12.97, 77.59)),
            "blob:leaf".into(),
            Some("user-1".into()),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["isHealthy"], true);
        assert_eq!(json["severity"], "N/A");
        assert_eq!(json["placeName"], "N/A");
        assert_eq!(json["coordinates"]["latitude"], 12.97);
        assert_eq!(json["userId"], "user-1");
    }

    #[test]
    fn disease_context_mentions_label_and_severity() {
        let record = PredictionRecord::new(
            classification(false, "Bud Rot", Severity::Severe),
            None,
            String::new(),
            None,
        );
        assert_eq!(record.disease_context(), "Disease: Bud Rot, Severity: Severe");
        assert!(record.needs_expert_referral());
    }
}
