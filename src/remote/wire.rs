//! Request bodies and response envelopes of the labeling server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::annotation::SegmentId;
use crate::error::{Result, SyncError};

#[derive(Debug, Serialize)]
pub struct LoadVideoRequest<'a> {
    pub video_path: &'a str,
}

#[derive(Debug, Serialize)]
pub struct IdentifyRequest {
    pub denoise: bool,
    pub denoise_prop: f64,
    pub verification_threshold: f64,
}

#[derive(Debug, Serialize)]
pub struct UpdateTextRequest<'a> {
    pub segment_id: SegmentId,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct UpdateSpeakerRequest<'a> {
    pub segment_id: SegmentId,
    pub speaker: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoadVideoResponse {
    pub filename: String,
    pub filepath: String,
    pub video_url: String,
}

#[derive(Debug, Deserialize)]
pub struct TranscribeResponse {
    #[serde(default)]
    pub result: Value,
}

impl TranscribeResponse {
    /// Segments in `result`, either a bare list or an object with a `segments` list.
    pub fn segment_count(&self) -> usize {
        match &self.result {
            Value::Array(items) => items.len(),
            Value::Object(map) => map
                .get("segments")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
            _ => 0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub segments_count: usize,
}

fn error_field(json: &Value) -> Option<String> {
    json.get("error").map(|e| match e.as_str() {
        Some(s) => s.to_string(),
        None => e.to_string(),
    })
}

/// Split a raw response into success JSON or one of the typed failures.
///
/// Non-2xx is a `Status` error carrying the server's `error` text when present,
/// marked unreadable when the body is not JSON.
/// A 2xx body with `success: false` or an `error` field is an `Application` error.
pub fn decode_envelope(status: u16, body: &str) -> Result<Value> {
    if !(200..300).contains(&status) {
        let json = serde_json::from_str::<Value>(body).ok();
        let readable = json.is_some();
        let message = json
            .as_ref()
            .and_then(error_field)
            .unwrap_or_else(|| body.trim().to_string());
        return Err(SyncError::Status {
            status,
            message,
            readable,
        });
    }

    let json: Value =
        serde_json::from_str(body).map_err(|e| SyncError::Decode(e.to_string()))?;

    let failed = json.get("success").and_then(Value::as_bool) == Some(false);
    if let Some(message) = error_field(&json) {
        return Err(SyncError::Application(message));
    }
    if failed {
        return Err(SyncError::Application("request failed".to_string()));
    }
    Ok(json)
}

/// Decode a typed payload out of an accepted envelope.
pub fn payload<T: serde::de::DeserializeOwned>(json: Value) -> Result<T> {
    serde_json::from_value(json).map_err(|e| SyncError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Segment;

    #[test]
    fn success_envelope_passes_through() {
        let json = decode_envelope(200, r#"{"success":true,"segments_count":4}"#).unwrap();
        let upload: UploadResponse = payload(json).unwrap();
        assert_eq!(upload.segments_count, 4);
    }

    #[test]
    fn error_field_on_2xx_is_application_error() {
        let err = decode_envelope(200, r#"{"error":"No transcription results available"}"#)
            .unwrap_err();
        assert!(matches!(err, SyncError::Application(ref m) if m == "No transcription results available"));

        let err = decode_envelope(200, r#"{"success":false}"#).unwrap_err();
        assert!(matches!(err, SyncError::Application(_)));
    }

    #[test]
    fn non_2xx_keeps_server_message() {
        let err = decode_envelope(400, r#"{"error":"Video file not found"}"#).unwrap_err();
        match err {
            SyncError::Status {
                status,
                message,
                readable,
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Video file not found");
                assert!(readable);
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = decode_envelope(502, "Bad Gateway").unwrap_err();
        assert!(matches!(
            err,
            SyncError::Status { status: 502, ref message, readable: false } if message == "Bad Gateway"
        ));
        assert!(err.is_network_layer());
    }

    #[test]
    fn transcription_result_counts_segments() {
        let json = decode_envelope(
            200,
            r#"{"success":true,"result":{"text":"hi there","segments":[{"id":0},{"id":1}]}}"#,
        )
        .unwrap();
        let done: TranscribeResponse = payload(json).unwrap();
        assert_eq!(done.segment_count(), 2);

        let json = decode_envelope(200, r#"{"success":true,"result":[{"id":0}]}"#).unwrap();
        assert_eq!(payload::<TranscribeResponse>(json).unwrap().segment_count(), 1);

        let json = decode_envelope(200, r#"{"success":true}"#).unwrap();
        assert_eq!(payload::<TranscribeResponse>(json).unwrap().segment_count(), 0);
    }

    #[test]
    fn unreadable_body_is_decode_error() {
        let err = decode_envelope(200, "<html>").unwrap_err();
        assert!(err.is_network_layer());
    }

    #[test]
    fn segment_arrays_decode() {
        let json = decode_envelope(
            200,
            r#"[{"id":0,"start":0.0,"end":2.04,"text":"hi","speaker":""},
                {"id":1,"start":2.04,"end":2.68,"text":"there","speaker":"Nurse"}]"#,
        )
        .unwrap();
        let segments: Vec<Segment> = payload(json).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].speaker, "Nurse");
    }
}
