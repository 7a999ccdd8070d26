//! Save the server's label export as a JSON file.

use std::path::{Path, PathBuf};

use crate::error::Result;

pub const EXPORT_FILE_NAME: &str = "speaker_labels.json";

/// Write `document` pretty-printed to `<dir>/speaker_labels.json`, replacing any earlier export.
pub fn write_export(dir: &Path, document: &serde_json::Value) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(EXPORT_FILE_NAME);
    let json = serde_json::to_string_pretty(document)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_fixed_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let doc = json!([{ "speaker": "Nurse", "start": 2.04, "end": 2.68, "text": "hi" }]);

        let path = write_export(dir.path(), &doc).unwrap();
        assert_eq!(path, dir.path().join("speaker_labels.json"));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, doc);
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("exports").join("today");
        let path = write_export(&nested, &json!({})).unwrap();
        assert!(path.exists());
    }
}
