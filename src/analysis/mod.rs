mod backend;
mod custom_model;
pub mod normalize;
mod remote_vision;

pub use backend::{AnalysisBackend, BackendKind, BackendOutput, BackendSet, ImageSubmission};
pub use custom_model::CustomModelBackend;
pub use normalize::{normalize_custom_prediction, RawPrediction};
pub use remote_vision::RemoteVisionBackend;
