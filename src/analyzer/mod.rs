use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::moderation::{ModerationResult, SafetyCategory, Severity};

mod vit;

pub use vit::VitClassifier;

/// Model input side length (pixels).
pub const IMAGE_SIZE: usize = 224;

/// Labels below this probability are dropped from the verdict.
const INCLUSION_THRESHOLD: f64 = 0.1;
const MEDIUM_THRESHOLD: f64 = 0.5;
const HIGH_THRESHOLD: f64 = 0.7;

/// Labels that escalate to high severity when the model is confident.
const HIGH_RISK_LABELS: [&str; 3] = ["porn", "hentai", "sexy"];

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("model invocation failed: {0}")]
    Inference(String),
}

/// Black-box classifier: given a scaled RGB8 buffer, return the label
/// probability distribution.
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, rgb: &[u8]) -> Result<Vec<(String, f32)>, AnalysisError>;
}

/// Converts raw image bytes into a moderation verdict via a pretrained
/// classifier. The classifier is loaded once and shared across requests.
#[derive(Clone)]
pub struct ImageAnalyzer {
    classifier: Arc<dyn ImageClassifier>,
}

impl ImageAnalyzer {
    pub fn new(classifier: Arc<dyn ImageClassifier>) -> Self {
        Self { classifier }
    }

    /// Decode, classify and shape the verdict on a blocking worker thread.
    pub async fn analyze(&self, bytes: Vec<u8>) -> Result<ModerationResult, AnalysisError> {
        let analyzer = self.clone();
        tokio::task::spawn_blocking(move || analyzer.analyze_blocking(&bytes))
            .await
            .map_err(|e| AnalysisError::Inference(format!("analysis task panicked: {}", e)))?
    }

    fn analyze_blocking(&self, bytes: &[u8]) -> Result<ModerationResult, AnalysisError> {
        let img = image::load_from_memory(bytes)?;
        let rgb = img.to_rgb8();

        // Hash of the decoded pixel buffer, not the container bytes, so the
        // same image re-encoded still tracks to the same hash.
        let image_hash = hex::encode(Sha256::digest(rgb.as_raw()));

        let scaled = image::imageops::resize(
            &rgb,
            IMAGE_SIZE as u32,
            IMAGE_SIZE as u32,
            image::imageops::FilterType::Triangle,
        );

        let distribution = self.classifier.classify(scaled.as_raw())?;

        let mut categories = Vec::new();
        for (label, prob) in distribution {
            // Thresholds apply to the raw probability; rounding is for
            // display only.
            let confidence = prob as f64;
            if confidence > INCLUSION_THRESHOLD {
                categories.push(SafetyCategory {
                    severity: label_severity(&label, confidence),
                    category: label,
                    confidence: round3(confidence),
                });
            }
        }

        Ok(ModerationResult::from_categories(
            categories,
            Some(image_hash),
        ))
    }
}

/// Severity policy: high only for explicit-content labels the model is
/// confident about, medium for any confident label, low otherwise.
fn label_severity(label: &str, confidence: f64) -> Severity {
    if HIGH_RISK_LABELS.contains(&label) && confidence > HIGH_THRESHOLD {
        Severity::High
    } else if confidence > MEDIUM_THRESHOLD {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubClassifier {
        distribution: Vec<(String, f32)>,
    }

    impl ImageClassifier for StubClassifier {
        fn classify(&self, _rgb: &[u8]) -> Result<Vec<(String, f32)>, AnalysisError> {
            Ok(self.distribution.clone())
        }
    }

    fn analyzer(distribution: Vec<(&str, f32)>) -> ImageAnalyzer {
        ImageAnalyzer::new(Arc::new(StubClassifier {
            distribution: distribution
                .into_iter()
                .map(|(l, p)| (l.to_string(), p))
                .collect(),
        }))
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([120, 30, 200]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_low_probability_labels_are_dropped() {
        let result = analyzer(vec![("neutral", 0.92), ("porn", 0.04), ("sexy", 0.04)])
            .analyze(png_bytes())
            .await
            .unwrap();

        assert_eq!(result.categories.len(), 1);
        assert_eq!(result.categories[0].category, "neutral");
    }

    #[tokio::test]
    async fn test_confident_explicit_label_is_high_and_unsafe() {
        let result = analyzer(vec![("porn", 0.85), ("neutral", 0.15)])
            .analyze(png_bytes())
            .await
            .unwrap();

        assert!(!result.is_safe);
        let porn = result
            .categories
            .iter()
            .find(|c| c.category == "porn")
            .unwrap();
        assert_eq!(porn.severity, Severity::High);
    }

    #[tokio::test]
    async fn test_confident_benign_label_caps_at_medium() {
        let result = analyzer(vec![("neutral", 0.95)])
            .analyze(png_bytes())
            .await
            .unwrap();

        assert!(result.is_safe);
        assert_eq!(result.categories[0].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn test_overall_confidence_matches_mean_of_emitted() {
        let result = analyzer(vec![("neutral", 0.6), ("drawings", 0.3), ("sexy", 0.05)])
            .analyze(png_bytes())
            .await
            .unwrap();

        assert_eq!(result.categories.len(), 2);
        assert!((result.overall_confidence - 0.45).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_image_hash_is_stable_for_same_pixels() {
        let a = analyzer(vec![("neutral", 0.9)]);
        let r1 = a.analyze(png_bytes()).await.unwrap();
        let r2 = a.analyze(png_bytes()).await.unwrap();
        assert_eq!(r1.image_hash, r2.image_hash);
        assert!(r1.image_hash.is_some());
    }

    #[tokio::test]
    async fn test_undecodable_bytes_fail_with_decode_error() {
        let err = analyzer(vec![])
            .analyze(b"definitely not an image".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)));
    }

    #[tokio::test]
    async fn test_severity_uses_raw_probability_not_rounded() {
        // 0.7004 rounds to 0.7 for display but is above the high threshold
        let result = analyzer(vec![("porn", 0.7004)])
            .analyze(png_bytes())
            .await
            .unwrap();

        let porn = &result.categories[0];
        assert_eq!(porn.severity, Severity::High);
        assert_eq!(porn.confidence, 0.7);
        assert!(!result.is_safe);
    }

    #[test]
    fn test_severity_policy_boundaries() {
        // 0.7 is not strictly above the high threshold
        assert_eq!(label_severity("porn", 0.7), Severity::Medium);
        assert_eq!(label_severity("porn", 0.71), Severity::High);
        // benign labels never escalate past medium
        assert_eq!(label_severity("neutral", 0.99), Severity::Medium);
        assert_eq!(label_severity("hentai", 0.4), Severity::Low);
    }
}
