//! Writes downloaded byte streams to local files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::ModelVersion;

pub fn dataset_filename(model: &str, version: &ModelVersion) -> String {
    format!("{}-{}-dataset.csv", model, version)
}

pub fn initial_report_filename(model: &str, version: &ModelVersion) -> String {
    format!("{}-{}-initial-report.zip", model, version)
}

pub fn degradation_report_filename(key: &str) -> String {
    format!("{}-degradation-report.zip", key)
}

pub fn result_filename(model: &str, version: &ModelVersion) -> String {
    format!("{}-{}-result.json", model, version)
}

/// Target directory for saved downloads.
#[derive(Debug, Clone)]
pub struct DownloadSink {
    dir: PathBuf,
}

impl DownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` to `<dir>/<filename>`, replacing any existing file.
    ///
    /// Only the final path component of `filename` is used.
    pub fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "download".into());

        fs::create_dir_all(&self.dir)?;
        let dest = self.dir.join(name);
        fs::write(&dest, bytes)?;

        tracing::info!("Saved {} bytes to {}", bytes.len(), dest.display());
        Ok(dest)
    }

    /// Save to an explicit path when given, otherwise into the sink directory.
    pub fn save_as(&self, output: Option<&Path>, default_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        match output {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, bytes)?;
                tracing::info!("Saved {} bytes to {}", bytes.len(), path.display());
                Ok(path.to_path_buf())
            }
            None => self.save(default_name, bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn filenames_follow_model_and_version() {
        let v = ModelVersion::from(3);
        assert_eq!(dataset_filename("fraud", &v), "fraud-3-dataset.csv");
        assert_eq!(initial_report_filename("fraud", &v), "fraud-3-initial-report.zip");
        assert_eq!(degradation_report_filename("fraud-3"), "fraud-3-degradation-report.zip");
        assert_eq!(result_filename("fraud", &v), "fraud-3-result.json");
    }

    #[test]
    fn save_writes_into_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dir = temp_dir.path().join("downloads");
        let sink = DownloadSink::new(&dir);

        let path = sink.save("../escape/data.csv", b"a,b\n1,2\n").unwrap();
        assert_eq!(path, dir.join("data.csv"));
        assert_eq!(fs::read(&path).unwrap(), b"a,b\n1,2\n");

        let explicit = dir.join("nested").join("out.zip");
        let saved = sink.save_as(Some(&explicit), "ignored.zip", b"PK").unwrap();
        assert_eq!(saved, explicit);
        assert_eq!(fs::read(&explicit).unwrap(), b"PK");
    }
}
