//! Interpretation of scene-classification labels.
//!
//! The service answers with `{"labels": [{"name": "...", "score": 0.0..1.0}]}`.
//! A label counts when its score reaches [`LABEL_THRESHOLD`].

use serde::Deserialize;

use super::ValidationResult;
use crate::error::{Error, Result};

pub const LABEL_THRESHOLD: f32 = 0.5;

const FACE: &[&str] = &["face", "human face", "person"];
const FACING: &[&str] = &["frontal face", "facing camera", "looking at camera"];
const GLASSES: &[&str] = &["glasses", "eyeglasses", "sunglasses", "eyewear"];
const HEADWEAR: &[&str] = &["hat", "cap", "headwear", "helmet", "hood"];

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
    pub score: f32,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    #[serde(default)]
    labels: Vec<Label>,
}

fn best_score(labels: &[Label], names: &[&str]) -> f32 {
    labels
        .iter()
        .filter(|l| {
            let name = l.name.trim().to_ascii_lowercase().replace(['_', '-'], " ");
            names.contains(&name.as_str())
        })
        .map(|l| l.score)
        .fold(0.0, f32::max)
}

/// Turn a label list into a verdict. Confidence is the face score.
pub fn interpret(labels: &[Label]) -> ValidationResult {
    let face = best_score(labels, FACE);
    let facing = best_score(labels, FACING);
    let has_face = face >= LABEL_THRESHOLD;
    let is_facing_camera = has_face && facing >= LABEL_THRESHOLD;

    let result = ValidationResult::new(
        has_face,
        is_facing_camera,
        best_score(labels, GLASSES) >= LABEL_THRESHOLD,
        best_score(labels, HEADWEAR) >= LABEL_THRESHOLD,
        face,
    );
    match (has_face, is_facing_camera) {
        (false, _) => result.with_reason("no face detected"),
        (true, false) => result.with_reason("face not facing the camera"),
        _ => result,
    }
}

/// Parse a raw response body and interpret it.
pub fn interpret_json(body: &str) -> Result<ValidationResult> {
    let response: LabelResponse = serde_json::from_str(body)
        .map_err(|e| Error::ClassifierFailure(format!("malformed label response: {}", e)))?;
    Ok(interpret(&response.labels))
}
