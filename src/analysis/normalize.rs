//! Turns a custom model's free-form label into a [`Classification`].

use serde::Deserialize;

use crate::models::{Classification, Severity};

const HEALTHY_INDICATORS: [&str; 3] = ["healthy", "no disease", "no disease detected"];

/// Raw custom model answer: `{prediction, confidence}` with an optional severity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPrediction {
    pub prediction: String,
    pub confidence: f64,
    #[serde(default)]
    pub severity: Option<String>,
}

pub fn is_healthy_label(label: &str) -> bool {
    let lowered = label.to_lowercase();
    HEALTHY_INDICATORS
        .iter()
        .any(|indicator| lowered.contains(indicator))
}

/// Healthy labels get `N/A`; anything else keeps a parsable backend severity or
/// defaults to `Mild` since the model gives no other signal.
pub fn normalize_custom_prediction(raw: RawPrediction) -> Classification {
    let is_healthy = is_healthy_label(&raw.prediction);
    let severity = if is_healthy {
        Severity::NotApplicable
    } else {
        raw.severity
            .as_deref()
            .and_then(|value| Severity::parse(value).ok())
            .unwrap_or(Severity::Mild)
    };

    Classification {
        is_healthy,
        disease_type: raw.prediction,
        severity,
        confidence: raw.confidence,
    }
    .normalized()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(label: &str) -> RawPrediction {
        RawPrediction {
            prediction: label.to_string(),
            confidence: 0.87,
            severity: None,
        }
    }

    #[test]
    fn healthy_leaf_is_healthy_without_severity() {
        let result = normalize_custom_prediction(raw("Healthy Leaf"));
        assert!(result.is_healthy);
        assert_eq!(result.severity, Severity::NotApplicable);
        assert_eq!(result.disease_type, "Healthy Leaf");
    }

    #[test]
    fn leaf_spot_defaults_to_mild() {
        let result = normalize_custom_prediction(raw("Leaf Spot"));
        assert!(!result.is_healthy);
        assert_eq!(result.severity, Severity::Mild);
        assert_eq!(result.confidence, 0.87);
    }

    #[test]
    fn no_disease_labels_are_healthy() {
        assert!(is_healthy_label("No Disease Detected"));
        assert!(is_healthy_label("no disease"));
        assert!(!is_healthy_label("Stem Bleeding"));
    }

    #[test]
    fn explicit_severity_is_kept_for_unhealthy_labels() {
        let mut input = raw("Bud Rot");
        input.severity = Some("Severe".into());
        assert_eq!(normalize_custom_prediction(input).severity, Severity::Severe);

        let mut garbage = raw("Bud Rot");
        garbage.severity = Some("catastrophic".into());
        assert_eq!(normalize_custom_prediction(garbage).severity, Severity::Mild);
    }

    #[test]
    fn severity_ignored_for_healthy_labels() {
        let mut input = raw("healthy");
        input.severity = Some("Severe".into());
        assert_eq!(
            normalize_custom_prediction(input).severity,
            Severity::NotApplicable
        );
    }
}
