use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ExtendedColorType, ImageFormat};
use log::debug;
use std::io::Cursor;

use super::{FrameClassifier, ValidationResult, labels};
use crate::capture::Frame;
use crate::error::{Error, Result};

/// Classifier backed by a remote labelling service.
///
/// Each frame is posted as `{"image": "<base64 png>"}`; the response is read
/// as a label list.
#[derive(Clone)]
pub struct HttpClassifier {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Config(format!("http client: {}", e)))?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// PNG-encode a frame.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>> {
    let mut png = Cursor::new(Vec::new());
    image::write_buffer_with_format(
        &mut png,
        frame.data(),
        frame.width(),
        frame.height(),
        ExtendedColorType::Rgba8,
        ImageFormat::Png,
    )
    .map_err(|e| Error::ClassifierFailure(format!("png encoding: {}", e)))?;
    Ok(png.into_inner())
}

#[async_trait]
impl FrameClassifier for HttpClassifier {
    async fn analyze(&self, frame: &Frame) -> Result<ValidationResult> {
        let body = serde_json::json!({ "image": STANDARD.encode(encode_png(frame)?) });
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ClassifierFailure(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::ClassifierFailure(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::ClassifierFailure(format!(
                "status={} body={:?}",
                status, text
            )));
        }
        debug!("HttpClassifier: {} byte response", text.len());
        labels::interpret_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Timestamp;

    #[test]
    fn test_png_payload_round_trips() {
        let frame = Frame::solid(3, 3, [255, 255, 255], Timestamp::default());
        let png = encode_png(&frame).unwrap();
        let img = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .unwrap()
            .to_rgba8();
        assert_eq!(img.dimensions(), (3, 3));
        assert!(!STANDARD.encode(&png).is_empty());
    }

    #[test]
    fn test_endpoint_is_normalized() {
        let classifier = HttpClassifier::new("http://localhost:9000/classify/").unwrap();
        assert_eq!(classifier.endpoint(), "http://localhost:9000/classify");
    }
}
