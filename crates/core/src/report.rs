//! Report bundles returned for a model's initial report.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReportFile {
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

/// Response of `/model/{model}-{version}/initial_report`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportBundle {
    #[serde(default)]
    pub files: Vec<RawReportFile>,
}

/// A report file decoded by type.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportFile {
    Json {
        filename: String,
        content: serde_json::Value,
    },
    Png {
        filename: String,
        bytes: Vec<u8>,
    },
    Unsupported {
        filename: String,
        kind: String,
    },
}

impl ReportFile {
    pub fn filename(&self) -> &str {
        match self {
            ReportFile::Json { filename, .. }
            | ReportFile::Png { filename, .. }
            | ReportFile::Unsupported { filename, .. } => filename,
        }
    }

    /// Lines shown inline: pretty JSON, or a one-line summary for images.
    pub fn render(&self) -> Vec<String> {
        match self {
            ReportFile::Json { content, .. } => serde_json::to_string_pretty(content)
                .unwrap_or_else(|_| content.to_string())
                .lines()
                .map(str::to_string)
                .collect(),
            ReportFile::Png { bytes, .. } => {
                vec![format!("[PNG image, {} bytes]", bytes.len())]
            }
            ReportFile::Unsupported { .. } => Vec::new(),
        }
    }
}

impl RawReportFile {
    pub fn decode(&self) -> Result<ReportFile> {
        match self.kind.as_str() {
            "json" => Ok(ReportFile::Json {
                filename: self.filename.clone(),
                content: self.content.clone(),
            }),
            "png" => {
                let encoded = self.content.as_str().ok_or_else(|| {
                    Error::validation(format!("{}: image content is not a string", self.filename))
                })?;
                let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
                    Error::validation(format!("{}: invalid base64 image: {}", self.filename, e))
                })?;
                Ok(ReportFile::Png {
                    filename: self.filename.clone(),
                    bytes,
                })
            }
            other => Ok(ReportFile::Unsupported {
                filename: self.filename.clone(),
                kind: other.to_string(),
            }),
        }
    }
}

impl ReportBundle {
    /// Decode every file; files that fail to decode are logged and skipped.
    pub fn decode(&self) -> Vec<ReportFile> {
        self.files
            .iter()
            .filter_map(|file| match file.decode() {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    tracing::warn!("Skipping report file: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_json_and_png_files() {
        let bundle: ReportBundle = serde_json::from_value(json!({
            "files": [
                {"filename": "summary.json", "type": "json", "content": {"rows": 10}},
                {"filename": "drift.png", "type": "png", "content": STANDARD.encode([0x89, b'P', b'N', b'G'])},
                {"filename": "notes.txt", "type": "txt", "content": "hello"},
                {"filename": "broken.png", "type": "png", "content": "***"}
            ]
        }))
        .unwrap();

        let files = bundle.decode();
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].render(), vec!["{", "  \"rows\": 10", "}"]);
        assert_eq!(
            files[1],
            ReportFile::Png {
                filename: "drift.png".into(),
                bytes: vec![0x89, b'P', b'N', b'G']
            }
        );
        assert_eq!(files[1].render(), vec!["[PNG image, 4 bytes]"]);
        assert!(files[2].render().is_empty());
        assert_eq!(files[2].filename(), "notes.txt");
    }

    #[test]
    fn missing_files_means_empty_bundle() {
        let bundle: ReportBundle = serde_json::from_str("{}").unwrap();
        assert!(bundle.decode().is_empty());
    }
}
