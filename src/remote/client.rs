//! HTTP client for the labeling server.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use super::backend::{AnnotationBackend, IdentifyOptions, UploadPayload};
use super::wire::{
    decode_envelope, payload, IdentifyRequest, LoadVideoRequest, LoadVideoResponse,
    TranscribeResponse, UpdateSpeakerRequest, UpdateTextRequest, UploadResponse,
};
use crate::annotation::{Segment, SegmentId, Video};
use crate::error::{Result, SyncError};

/// Connection settings for the labeling server.
#[derive(Debug, Clone)]
pub struct RemoteSyncConfig {
    pub base_url: String,
    pub request_timeout: Option<Duration>,
}

impl RemoteSyncConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            request_timeout: None,
        }
    }
}

pub struct RemoteSyncClient {
    config: RemoteSyncConfig,
    http: reqwest::Client,
}

impl RemoteSyncClient {
    pub fn new(config: RemoteSyncConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Server-relative links (`/serve_video/x.mp4`) become absolute.
    fn resolve(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else if link.starts_with('/') {
            self.url(link)
        } else {
            format!("{}/{}", self.config.base_url, link)
        }
    }

    async fn send(&self, op: &str, req: reqwest::RequestBuilder) -> Result<Value> {
        let response = req
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        debug!("[remote] {}: status={} body_len={}", op, status, body.len());
        decode_envelope(status, &body)
    }
}

#[async_trait]
impl AnnotationBackend for RemoteSyncClient {
    async fn load_video(&self, path: &str) -> Result<Video> {
        let req = self
            .http
            .post(self.url("/load_video"))
            .json(&LoadVideoRequest { video_path: path });
        let loaded: LoadVideoResponse = payload(self.send("load_video", req).await?)?;
        Ok(Video {
            path: loaded.filepath,
            url: self.resolve(&loaded.video_url),
            filename: loaded.filename,
        })
    }

    async fn transcribe(&self) -> Result<usize> {
        let req = self
            .http
            .post(self.url("/whisper_transcribe"))
            .json(&serde_json::json!({}));
        let done: TranscribeResponse = payload(self.send("transcribe", req).await?)?;
        Ok(done.segment_count())
    }

    async fn identify_speakers(&self, options: IdentifyOptions) -> Result<()> {
        let req = self
            .http
            .post(self.url("/speaker_identification"))
            .json(&IdentifyRequest {
                denoise: options.denoise,
                denoise_prop: options.denoise_proportion,
                verification_threshold: options.verification_threshold,
            });
        self.send("identify_speakers", req).await?;
        Ok(())
    }

    async fn fetch_segments(&self) -> Result<Vec<Segment>> {
        let req = self.http.get(self.url("/get_segments"));
        payload(self.send("fetch_segments", req).await?)
    }

    async fn update_segment_text(&self, id: SegmentId, text: &str) -> Result<()> {
        let req = self
            .http
            .post(self.url("/update_segment_text"))
            .json(&UpdateTextRequest {
                segment_id: id,
                text,
            });
        self.send("update_segment_text", req).await?;
        Ok(())
    }

    async fn update_segment_speaker(&self, id: SegmentId, speaker: &str) -> Result<()> {
        let req = self
            .http
            .post(self.url("/update_segment_speaker"))
            .json(&UpdateSpeakerRequest {
                segment_id: id,
                speaker,
            });
        self.send("update_segment_speaker", req).await?;
        Ok(())
    }

    async fn upload_segments_file(&self, upload: UploadPayload) -> Result<usize> {
        let mime = upload
            .content_type
            .clone()
            .unwrap_or_else(|| "application/json".to_string());
        let part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&mime)
            .map_err(|e| SyncError::validation(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let req = self.http.post(self.url("/upload_segments")).multipart(form);
        let uploaded: UploadResponse = payload(self.send("upload_segments", req).await?)?;
        Ok(uploaded.segments_count)
    }

    async fn fetch_export(&self) -> Result<Value> {
        let req = self.http.get(self.url("/export_labels"));
        self.send("fetch_export", req).await
    }
}
