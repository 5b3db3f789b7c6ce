use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Version label of a registered model.
///
/// The registry reports versions either as JSON numbers or as strings; both
/// are kept as their textual form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ModelVersion(String);

impl ModelVersion {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelVersion {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<u32> for ModelVersion {
    fn from(n: u32) -> Self {
        Self::new(n.to_string())
    }
}

impl<'de> Deserialize<'de> for ModelVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
            Float(f64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => ModelVersion(s),
            Raw::Int(n) => ModelVersion(n.to_string()),
            Raw::Float(f) => ModelVersion(f.to_string()),
        })
    }
}

/// One running (model, version) instance as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployedModel {
    pub model_name: String,
    pub version: ModelVersion,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_uuid: Option<String>,
}

impl DeployedModel {
    /// Every entry the backend lists is serving; stopped instances are removed.
    pub fn status(&self) -> &'static str {
        "Running"
    }

    pub fn label(&self) -> String {
        format!("{} v{}", self.model_name, self.version)
    }
}

/// Totals shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub models: usize,
    pub deployed: usize,
    pub free_ports: u64,
}

/// Deployment key → deployed instance, in the order the backend listed them.
pub type DeployedModels = IndexMap<String, DeployedModel>;

/// Acknowledgement returned by deploy and undeploy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    #[serde(default)]
    pub message: String,
}

/// Identifies a model version on the serving side (`{model}-{version}`).
pub fn model_key(model: &str, version: &ModelVersion) -> String {
    format!("{}-{}", model, version)
}
