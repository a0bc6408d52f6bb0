//! Matcher backed by sidecar annotation files.
//!
//! For an image `C:/spool/0x00010A2B.bmp` the recognizer writes
//! `C:/spool/0x00010A2B.bmp.detections.json`, a JSON array of detections:
//!
//! ```json
//! [{"label":"item","confidence":0.93,"bbox":{"x":410,"y":288,"width":24,"height":24}}]
//! ```
//!
//! The image itself must exist.  A missing annotation file means the
//! recognizer found nothing (or has not processed the image yet), so it
//! yields no candidates rather than an error.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use mwp_core::Detection;
use tracing::debug;

use crate::application::{ServerError, TargetMatcher};

pub const DEFAULT_SUFFIX: &str = ".detections.json";

#[derive(Debug, Clone)]
pub struct AnnotationMatcher {
    suffix: String,
}

impl AnnotationMatcher {
    pub fn new() -> Self {
        Self::with_suffix(DEFAULT_SUFFIX)
    }

    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self { suffix: suffix.into() }
    }

    pub fn annotation_path(&self, image_ref: &str) -> PathBuf {
        PathBuf::from(format!("{image_ref}{}", self.suffix))
    }
}

impl Default for AnnotationMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TargetMatcher for AnnotationMatcher {
    fn is_ready(&self) -> bool {
        true
    }

    async fn candidates(&self, image_ref: &str) -> Result<Vec<Detection>, ServerError> {
        if !tokio::fs::try_exists(image_ref).await.unwrap_or(false) {
            return Err(ServerError::ImageNotFound(image_ref.to_string()));
        }

        let path = self.annotation_path(image_ref);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no annotations for image");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(ServerError::Annotation {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let detections: Vec<Detection> =
            serde_json::from_slice(&bytes).map_err(|e| ServerError::Annotation {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        // Files come from another program; enforce the confidence range here.
        Ok(detections
            .into_iter()
            .map(|d| Detection::new(d.label, d.confidence, d.bbox))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mwp_core::Rect;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mwp-annotations-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_reads_sidecar_and_clamps_confidence() {
        // Arrange
        let dir = scratch_dir("read");
        let image = dir.join("frame.bmp");
        std::fs::write(&image, b"BM").unwrap();
        let image_ref = image.to_string_lossy().to_string();
        let matcher = AnnotationMatcher::new();
        std::fs::write(
            matcher.annotation_path(&image_ref),
            r#"[{"label":"item","confidence":1.4,"bbox":{"x":1,"y":2,"width":3,"height":4}},
                {"label":"enemy","confidence":0.5,"bbox":{"x":5,"y":6,"width":7,"height":8}}]"#,
        )
        .unwrap();

        // Act
        let found = matcher.candidates(&image_ref).await.unwrap();

        // Assert
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].label, "item");
        assert!((found[0].confidence - 1.0).abs() < f32::EPSILON);
        assert_eq!(found[1].bbox, Rect::new(5, 6, 7, 8));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_missing_sidecar_yields_no_candidates() {
        let dir = scratch_dir("empty");
        let image = dir.join("frame.bmp");
        std::fs::write(&image, b"BM").unwrap();

        let found = AnnotationMatcher::new()
            .candidates(&image.to_string_lossy())
            .await
            .unwrap();

        assert!(found.is_empty());
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_missing_image_is_an_error() {
        let dir = scratch_dir("missing");
        let image = dir.join("gone.bmp");

        let result = AnnotationMatcher::new().candidates(&image.to_string_lossy()).await;

        assert!(matches!(result, Err(ServerError::ImageNotFound(_))));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_corrupt_sidecar_is_an_annotation_error() {
        let dir = scratch_dir("corrupt");
        let image = dir.join("frame.bmp");
        std::fs::write(&image, b"BM").unwrap();
        let image_ref = image.to_string_lossy().to_string();
        let matcher = AnnotationMatcher::with_suffix(".json");
        std::fs::write(matcher.annotation_path(&image_ref), "{ nope").unwrap();

        let result = matcher.candidates(&image_ref).await;

        assert!(matches!(result, Err(ServerError::Annotation { .. })));
        std::fs::remove_dir_all(dir).ok();
    }
}
