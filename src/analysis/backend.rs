use std::{fmt, path::Path, sync::Arc};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Classification;

use super::normalize::{normalize_custom_prediction, RawPrediction};

/// An image the user picked for analysis.
#[derive(Debug, Clone)]
pub struct ImageSubmission {
    pub bytes: Vec<u8>,
    pub media_type: String,
    pub file_name: String,
    /// Display reference; never used for re-analysis.
    pub image_url: String,
}

impl ImageSubmission {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>, image_url: impl Into<String>) -> Self {
        let media_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());

        Self {
            bytes,
            media_type,
            file_name: file_name.into(),
            image_url: image_url.into(),
        }
    }

    /// Reads an image from disk. An empty file counts as no image picked.
    pub async fn from_path(path: &Path) -> Result<Option<Self>> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read image {}", path.display()))?;
        if bytes.is_empty() {
            return Ok(None);
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let absolute = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());

        Ok(Some(Self::new(
            bytes,
            file_name,
            format!("file://{}", absolute.display()),
        )))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    RemoteVision,
    CustomModel,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::RemoteVision => "remote-vision",
            BackendKind::CustomModel => "custom-model",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "remote-vision" | "remote" | "gemini" => Some(BackendKind::RemoteVision),
            "custom-model" | "custom" => Some(BackendKind::CustomModel),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a backend hands back before the orchestrator normalizes it.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOutput {
    Classified(Classification),
    Raw(RawPrediction),
}

impl BackendOutput {
    pub fn into_classification(self) -> Classification {
        match self {
            BackendOutput::Classified(classification) => classification.normalized(),
            BackendOutput::Raw(raw) => normalize_custom_prediction(raw),
        }
    }
}

#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn classify(&self, image: &ImageSubmission) -> Result<BackendOutput>;
}

/// Both backend variants, selectable per submission.
#[derive(Clone)]
pub struct BackendSet {
    remote_vision: Arc<dyn AnalysisBackend>,
    custom_model: Arc<dyn AnalysisBackend>,
}

impl BackendSet {
    /// Fails if either backend reports a kind other than its slot.
    pub fn new(
        remote_vision: Arc<dyn AnalysisBackend>,
        custom_model: Arc<dyn AnalysisBackend>,
    ) -> Result<Self> {
        for (slot, backend) in [
            (BackendKind::RemoteVision, &remote_vision),
            (BackendKind::CustomModel, &custom_model),
        ] {
            if backend.kind() != slot {
                bail!("{} backend registered as {slot}", backend.kind());
            }
        }

        Ok(Self {
            remote_vision,
            custom_model,
        })
    }

    pub fn get(&self, kind: BackendKind) -> Arc<dyn AnalysisBackend> {
        match kind {
            BackendKind::RemoteVision => Arc::clone(&self.remote_vision),
            BackendKind::CustomModel => Arc::clone(&self.custom_model),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn detects_media_type_from_bytes() {
        let png = ImageSubmission::new(PNG_MAGIC.to_vec(), "leaf.png", "blob:1");
        assert_eq!(png.media_type, "image/png");

        let unknown = ImageSubmission::new(b"not an image".to_vec(), "notes.txt", "blob:2");
        assert_eq!(unknown.media_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn from_path_reads_file_and_builds_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.png");
        std::fs::write(&path, PNG_MAGIC).unwrap();

        let image = ImageSubmission::from_path(&path).await.unwrap().unwrap();
        assert_eq!(image.file_name, "leaf.png");
        assert_eq!(image.media_type, "image/png");
        assert!(image.image_url.starts_with("file://"));
    }

    #[tokio::test]
    async fn from_path_treats_empty_file_as_no_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jpg");
        std::fs::write(&path, b"").unwrap();
        assert!(ImageSubmission::from_path(&path).await.unwrap().is_none());
        assert!(ImageSubmission::from_path(&dir.path().join("missing.jpg"))
            .await
            .is_err());
    }

    #[test]
    fn backend_kind_parsing() {
        assert_eq!(BackendKind::parse("custom"), Some(BackendKind::CustomModel));
        assert_eq!(BackendKind::parse("Remote-Vision"), Some(BackendKind::RemoteVision));
        assert_eq!(BackendKind::parse("yolo"), None);
    }

    struct NamedBackend(BackendKind);

    #[async_trait]
    impl AnalysisBackend for NamedBackend {
        fn kind(&self) -> BackendKind {
            self.0
        }

        async fn classify(&self, _image: &ImageSubmission) -> Result<BackendOutput> {
            bail!("not used")
        }
    }

    #[test]
    fn backend_set_checks_slots() {
        let remote = Arc::new(NamedBackend(BackendKind::RemoteVision));
        let custom = Arc::new(NamedBackend(BackendKind::CustomModel));

        let set = BackendSet::new(remote.clone(), custom.clone()).unwrap();
        assert_eq!(set.get(BackendKind::CustomModel).kind(), BackendKind::CustomModel);

        assert!(BackendSet::new(custom, remote).is_err());
    }

    #[test]
    fn classified_output_is_normalized() {
        let output = BackendOutput::Classified(Classification {
            is_healthy: false,
            disease_type: "Bud Rot".into(),
            severity: Severity::NotApplicable,
            confidence: 0.92,
        });
        assert_eq!(output.into_classification().severity, Severity::Mild);
    }
}
