//! Derived views over the segment collection.

use serde::{Deserialize, Serialize};

use super::types::Segment;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    All,
    Labeled,
    Unlabeled,
}

impl FilterMode {
    pub fn matches(self, segment: &Segment) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Labeled => segment.is_labeled(),
            FilterMode::Unlabeled => !segment.is_labeled(),
        }
    }
}

impl std::str::FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FilterMode::All),
            "labeled" => Ok(FilterMode::Labeled),
            "unlabeled" => Ok(FilterMode::Unlabeled),
            other => Err(format!("Unknown filter: {}", other)),
        }
    }
}

/// Visible subset of `segments` under `mode`, in input order.
pub fn project(segments: &[Segment], mode: FilterMode) -> Vec<Segment> {
    segments
        .iter()
        .filter(|s| mode.matches(s))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(id: u64, speaker: &str) -> Segment {
        Segment {
            id,
            start: id as f64,
            end: id as f64 + 1.0,
            text: format!("segment {}", id),
            speaker: speaker.to_string(),
        }
    }

    fn mixed() -> Vec<Segment> {
        vec![
            seg(0, ""),
            seg(1, "Nurse"),
            seg(2, ""),
            seg(3, "Dr. A"),
            seg(4, "Nurse"),
        ]
    }

    #[test]
    fn all_is_identity() {
        let segments = mixed();
        assert_eq!(project(&segments, FilterMode::All), segments);
        assert!(project(&[], FilterMode::All).is_empty());
    }

    #[test]
    fn labeled_and_unlabeled_partition_the_input() {
        let segments = mixed();
        let labeled = project(&segments, FilterMode::Labeled);
        let unlabeled = project(&segments, FilterMode::Unlabeled);

        assert_eq!(labeled.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 3, 4]);
        assert_eq!(unlabeled.iter().map(|s| s.id).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(labeled.len() + unlabeled.len(), segments.len());
        assert!(labeled.iter().all(|l| unlabeled.iter().all(|u| u.id != l.id)));
    }

    #[test]
    fn projection_is_idempotent() {
        let segments = mixed();
        for mode in [FilterMode::All, FilterMode::Labeled, FilterMode::Unlabeled] {
            let once = project(&segments, mode);
            assert_eq!(project(&once, mode), once);
        }
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!("Labeled".parse::<FilterMode>(), Ok(FilterMode::Labeled));
        assert_eq!(" unlabeled ".parse::<FilterMode>(), Ok(FilterMode::Unlabeled));
        assert!("speakers".parse::<FilterMode>().is_err());
    }
}
