//! The remote system of record, as seen by the annotation store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::annotation::{Segment, SegmentId, Video};
use crate::error::Result;

/// Tuning passed to the speaker identification job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyOptions {
    pub denoise: bool,
    pub denoise_proportion: f64,
    pub verification_threshold: f64,
}

impl Default for IdentifyOptions {
    fn default() -> Self {
        Self {
            denoise: false,
            denoise_proportion: 0.1,
            verification_threshold: 0.2,
        }
    }
}

impl IdentifyOptions {
    pub fn validate(&self) -> std::result::Result<(), String> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(self.denoise_proportion) {
            return Err(format!(
                "Denoise proportion must be between 0 and 1, got {}",
                self.denoise_proportion
            ));
        }
        if !in_unit(self.verification_threshold) {
            return Err(format!(
                "Verification threshold must be between 0 and 1, got {}",
                self.verification_threshold
            ));
        }
        Ok(())
    }
}

/// A segments file picked by the user for upload.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadPayload {
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("segments.json")
            .to_string();
        Ok(Self {
            file_name,
            content_type: None,
            bytes,
        })
    }

    pub fn is_json(&self) -> bool {
        let typed = self
            .content_type
            .as_deref()
            .map_or(false, |t| t.trim().eq_ignore_ascii_case("application/json"));
        typed || self.file_name.to_ascii_lowercase().ends_with(".json")
    }
}

/// One request/response per remote capability. Implementations never retry.
#[async_trait]
pub trait AnnotationBackend: Send + Sync {
    async fn load_video(&self, path: &str) -> Result<Video>;

    /// Returns how many segments the server reported; they are fetched separately.
    async fn transcribe(&self) -> Result<usize>;

    async fn identify_speakers(&self, options: IdentifyOptions) -> Result<()>;

    async fn fetch_segments(&self) -> Result<Vec<Segment>>;

    async fn update_segment_text(&self, id: SegmentId, text: &str) -> Result<()>;

    async fn update_segment_speaker(&self, id: SegmentId, speaker: &str) -> Result<()>;

    /// Returns the number of segments the server accepted.
    async fn upload_segments_file(&self, payload: UploadPayload) -> Result<usize>;

    async fn fetch_export(&self) -> Result<serde_json::Value>;
}
