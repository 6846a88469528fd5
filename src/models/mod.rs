pub mod language;
pub mod prediction;

pub use language::Language;
pub use prediction::{
    Classification, Coordinates, PredictionRecord, Severity, NO_DISEASE_DETECTED,
    PLACE_NAME_UNAVAILABLE, UNKNOWN_DISEASE,
};
