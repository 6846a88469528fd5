use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};

use super::{normalize::RawPrediction, AnalysisBackend, BackendKind, BackendOutput, ImageSubmission};

/// Self-hosted model server taking a multipart upload and answering
/// `{prediction, confidence}`.
pub struct CustomModelBackend {
    client: Client,
    url: String,
}

impl CustomModelBackend {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl AnalysisBackend for CustomModelBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::CustomModel
    }

    async fn classify(&self, image: &ImageSubmission) -> Result<BackendOutput> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.media_type)
            .context("invalid image media type")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .context("custom model request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("custom model returned {status}: {body}"));
        }

        let raw: RawPrediction = response
            .json()
            .await
            .context("custom model response was not valid JSON")?;

        Ok(BackendOutput::Raw(raw))
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;
    use crate::models::Severity;

    fn image() -> ImageSubmission {
        ImageSubmission {
            bytes: b"fake-jpeg".to_vec(),
            media_type: "image/jpeg".into(),
            file_name: "frond.jpg".into(),
            image_url: "blob:frond".into(),
        }
    }

    #[tokio::test]
    async fn uploads_file_and_returns_raw_prediction() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict")
            .match_header(
                "content-type",
                Matcher::Regex("multipart/form-data.*".into()),
            )
            .match_body(Matcher::Regex(r#"name="file"; filename="frond.jpg""#.into()))
            .with_status(200)
            .with_body(r#"{"prediction": "Leaf Spot", "confidence": 0.71}"#)
            .create_async()
            .await;

        let backend = CustomModelBackend::new(Client::new(), format!("{}/predict", server.url()));
        let output = backend.classify(&image()).await.unwrap();
        mock.assert_async().await;

        assert_eq!(
            output,
            BackendOutput::Raw(RawPrediction {
                prediction: "Leaf Spot".into(),
                confidence: 0.71,
                severity: None,
            })
        );
        let classification = output.into_classification();
        assert!(!classification.is_healthy);
        assert_eq!(classification.severity, Severity::Mild);
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predict")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let backend = CustomModelBackend::new(Client::new(), format!("{}/predict", server.url()));
        assert!(backend.classify(&image()).await.is_err());
    }
}
