use thiserror::Error;

use crate::location::LocationError;

/// Everything the pipeline reports to its caller.
///
/// `NoImageSelected`, `AnalysisFailed` and `SubmissionInProgress` end a
/// submission without a record. `LocationError` and `TreatmentFetchFailed`
/// travel alongside a record as warnings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Please select an image to analyze.")]
    NoImageSelected,

    #[error(transparent)]
    LocationError(#[from] LocationError),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Failed to fetch treatment recommendation: {0}")]
    TreatmentFetchFailed(String),

    #[error("An analysis is already in progress.")]
    SubmissionInProgress,
}

impl PipelineError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::NoImageSelected
                | PipelineError::AnalysisFailed(_)
                | PipelineError::SubmissionInProgress
        )
    }

    /// Text suitable for the UI. Analysis failures hide backend details.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::AnalysisFailed(_) => {
                "Failed to analyze the image. Please try again.".to_string()
            }
            PipelineError::TreatmentFetchFailed(_) => {
                "Could not load the treatment recommendation.".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_fatal_and_degrading() {
        assert!(PipelineError::NoImageSelected.is_fatal());
        assert!(PipelineError::AnalysisFailed("boom".into()).is_fatal());
        assert!(PipelineError::SubmissionInProgress.is_fatal());
        assert!(!PipelineError::LocationError(LocationError::PermissionDenied).is_fatal());
        assert!(!PipelineError::TreatmentFetchFailed("503".into()).is_fatal());
    }

    #[test]
    fn location_message_is_actionable() {
        let err = PipelineError::from(LocationError::PermissionDenied);
        assert!(err.user_message().contains("enable location services"));
    }

    #[test]
    fn analysis_message_is_generic() {
        let err = PipelineError::AnalysisFailed("HTTP 500 from model host".into());
        assert!(!err.user_message().contains("500"));
        assert!(err.to_string().contains("500"));
    }
}
