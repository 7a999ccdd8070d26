//! Video, segment and speaker records held by the annotation store.

use serde::{Deserialize, Serialize};

pub type SegmentId = u64;

/// A video the server has accepted for processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub path: String,
    pub url: String,
    pub filename: String,
}

/// A timed span of transcribed text with an optional speaker label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub text: String,
    /// Empty when unlabeled.
    #[serde(default)]
    pub speaker: String,
}

impl Segment {
    pub fn is_labeled(&self) -> bool {
        !self.speaker.is_empty()
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speaker {
    pub name: String,
    pub description: String,
}

impl Speaker {
    pub fn custom(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("Custom speaker: {}", name),
        }
    }
}

/// Format seconds as `MM:SS` for segment headers and the playback clock.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_time_pads_minutes_and_seconds() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(9.54), "00:09");
        assert_eq!(format_time(61.2), "01:01");
        assert_eq!(format_time(3600.0), "60:00");
        assert_eq!(format_time(-3.0), "00:00");
    }

    #[test]
    fn segment_without_speaker_field_is_unlabeled() {
        let seg: Segment =
            serde_json::from_str(r#"{"id":2,"start":4.12,"end":4.72,"text":" Patient's here."}"#)
                .unwrap();
        assert!(!seg.is_labeled());
        assert!((seg.duration() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn custom_speaker_description() {
        assert_eq!(Speaker::custom("Nurse").description, "Custom speaker: Nurse");
    }
}
