//! HTTP client for the model registry / serving backend.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::metrics::{MetricsSnapshot, SnapshotFiles};
use crate::models::{model_key, Confirmation, DashboardStats, DeployedModels, ModelVersion};
use crate::report::ReportBundle;
use crate::signature::{ModelSignature, TypeMapping};

/// Body of a metrics update: test instances and their expected results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMetrics {
    instances: Vec<Value>,
    results: Vec<Value>,
    timestamp: f64,
}

impl NewMetrics {
    /// Both `instances` and `results` must be non-empty JSON arrays. The
    /// timestamp defaults to now, in epoch seconds, and must be finite.
    pub fn new(instances: Value, results: Value, timestamp: Option<f64>) -> Result<Self> {
        let instances = non_empty_array("instances", instances)?;
        let results = non_empty_array("results", results)?;
        let timestamp = match timestamp {
            Some(secs) if !secs.is_finite() => {
                return Err(Error::validation("timestamp must be a finite number"))
            }
            Some(secs) => secs,
            None => Utc::now().timestamp_millis() as f64 / 1000.0,
        };
        Ok(Self {
            instances,
            results,
            timestamp,
        })
    }

    pub fn instances(&self) -> &[Value] {
        &self.instances
    }

    pub fn results(&self) -> &[Value] {
        &self.results
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

fn non_empty_array(field: &str, value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) if !items.is_empty() => Ok(items),
        Value::Array(_) => Err(Error::validation(format!("{} must not be empty", field))),
        _ => Err(Error::validation(format!("{} must be a JSON array", field))),
    }
}

/// Optional bounds for the dataset download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Build a range from user-entered bounds; blank bounds are open.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let bound = |text: Option<&str>| -> Result<Option<DateTime<Utc>>> {
            match text.map(str::trim).filter(|t| !t.is_empty()) {
                Some(text) => parse_date(text).map(Some),
                None => Ok(None),
            }
        };
        let range = Self {
            start: bound(start)?,
            end: bound(end)?,
        };
        if let (Some(start), Some(end)) = (range.start, range.end) {
            if start > end {
                return Err(Error::validation("Start date must not be after end date"));
            }
        }
        Ok(range)
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let iso = |d: &DateTime<Utc>| d.to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut query = Vec::new();
        if let Some(start) = &self.start {
            query.push(("start_date", iso(start)));
        }
        if let Some(end) = &self.end {
            query.push(("end_date", iso(end)));
        }
        query
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| {
            Error::validation(format!(
                "Invalid date '{}': expected YYYY-MM-DD or an RFC 3339 timestamp",
                text
            ))
        })
}

/// Every backend capability the dashboard uses, one method per endpoint.
#[async_trait]
pub trait ModelApi: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>>;

    async fn list_versions(&self, model: &str) -> Result<Vec<ModelVersion>>;

    async fn deploy(
        &self,
        model: &str,
        version: &ModelVersion,
        num_classes: Option<u32>,
    ) -> Result<Confirmation>;

    async fn undeploy(&self, key: &str) -> Result<Confirmation>;

    async fn deployed_models(&self) -> Result<DeployedModels>;

    async fn free_ports(&self) -> Result<u64>;

    async fn signature(&self, model: &str, version: &ModelVersion) -> Result<ModelSignature>;

    async fn type_mapping(&self) -> Result<TypeMapping>;

    async fn invoke(&self, model: &str, version: &ModelVersion, payload: &Value) -> Result<Value>;

    async fn initial_report(&self, model: &str, version: &ModelVersion) -> Result<ReportBundle>;

    async fn download_initial_report(&self, model: &str, version: &ModelVersion) -> Result<Vec<u8>>;

    async fn current_metrics(&self, model: &str, version: &ModelVersion) -> Result<MetricsSnapshot>;

    async fn submit_metrics(
        &self,
        model: &str,
        version: &ModelVersion,
        metrics: &NewMetrics,
    ) -> Result<MetricsSnapshot>;

    async fn snapshot_names(&self, model: &str, version: &ModelVersion) -> Result<Vec<String>>;

    async fn snapshot(
        &self,
        model: &str,
        version: &ModelVersion,
        filename: &str,
    ) -> Result<MetricsSnapshot>;

    async fn download_dataset(
        &self,
        model: &str,
        version: &ModelVersion,
        range: &DateRange,
    ) -> Result<Vec<u8>>;

    async fn download_degradation_report(
        &self,
        model: &str,
        version: &ModelVersion,
    ) -> Result<Vec<u8>>;
}

/// Fetch the model list, the deployed models and the free-port count
/// concurrently. Any failure fails the whole summary.
pub async fn load_dashboard(api: &dyn ModelApi) -> Result<DashboardStats> {
    let (models, deployed, free_ports) = tokio::try_join!(
        api.list_models(),
        api.deployed_models(),
        api.free_ports()
    )?;
    Ok(DashboardStats {
        models: models.len(),
        deployed: deployed.len(),
        free_ports,
    })
}

/// [`ModelApi`] over HTTP. Holds no state across calls.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: Url,
    progress: bool,
}

impl RegistryClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(&ApiConfig {
            base_url: base_url.to_string(),
            ..ApiConfig::default()
        })
    }

    pub fn with_config(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            Error::Config(format!("Invalid API base URL '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Invalid API base URL '{}'",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .user_agent(concat!("modeldeck/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            progress: false,
        })
    }

    /// Show a progress bar on stderr while binary downloads stream in.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append percent-encoded path segments to the base URL.
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn model_url(&self, model: &str, version: &ModelVersion, rest: &[&str]) -> Url {
        let key = model_key(model, version);
        let mut segments = vec!["model", key.as_str()];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = request.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!("{} {}", method, url);

        let response = self.client.execute(request).await.map_err(|e| {
            tracing::warn!("{} {} failed: {}", method, url, e);
            Error::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status.as_u16(), &body);
        tracing::warn!("{} {} failed: {}", method, url, message);
        Err(Error::request_failed(message))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.send(self.client.get(url)).await?;
        Ok(response.json().await?)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: Option<&B>,
    ) -> Result<T> {
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    async fn get_bytes(&self, request: RequestBuilder) -> Result<Vec<u8>> {
        let response = self.send(request).await?;
        let total = response.content_length();

        let pb = self.progress.then(|| {
            let pb = ProgressBar::new(total.unwrap_or(0));
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        });

        let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            bytes.extend_from_slice(&chunk);
            if let Some(pb) = &pb {
                pb.set_position(bytes.len() as u64);
            }
        }

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        Ok(bytes)
    }
}

/// Message for a non-2xx response: the backend's `detail` when present.
fn error_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned())
        .map(|d| match d {
            Value::String(s) => s,
            other => other.to_string(),
        });

    match detail {
        Some(detail) => detail,
        None if body.trim().is_empty() => format!("Request failed with status code {}", status),
        None => format!("Request failed with status code {}: {}", status, body.trim()),
    }
}

#[async_trait]
impl ModelApi for RegistryClient {
    async fn list_models(&self) -> Result<Vec<String>> {
        self.get_json(self.url(&["get_model_list"])).await
    }

    async fn list_versions(&self, model: &str) -> Result<Vec<ModelVersion>> {
        self.get_json(self.url(&["get_model_version_list", model])).await
    }

    async fn deploy(
        &self,
        model: &str,
        version: &ModelVersion,
        num_classes: Option<u32>,
    ) -> Result<Confirmation> {
        let mut url = self.url(&["deploy", model, version.as_str()]);
        if let Some(n) = num_classes {
            url.query_pairs_mut().append_pair("num_classes", &n.to_string());
        }
        tracing::info!("Deploying {} version {}", model, version);
        self.post_json::<_, Value>(url, None).await
    }

    async fn undeploy(&self, key: &str) -> Result<Confirmation> {
        tracing::info!("Undeploying {}", key);
        self.post_json::<_, Value>(self.url(&["undeploy", key]), None)
            .await
    }

    async fn deployed_models(&self) -> Result<DeployedModels> {
        self.get_json(self.url(&["get_deployed_models"])).await
    }

    async fn free_ports(&self) -> Result<u64> {
        self.get_json(self.url(&["get_number_free_ports"])).await
    }

    async fn signature(&self, model: &str, version: &ModelVersion) -> Result<ModelSignature> {
        self.get_json(self.model_url(model, version, &["signature"]))
            .await
    }

    async fn type_mapping(&self) -> Result<TypeMapping> {
        self.get_json(self.url(&["type_mapping"])).await
    }

    async fn invoke(&self, model: &str, version: &ModelVersion, payload: &Value) -> Result<Value> {
        self.post_json(self.model_url(model, version, &[]), Some(payload))
            .await
    }

    async fn initial_report(&self, model: &str, version: &ModelVersion) -> Result<ReportBundle> {
        self.get_json(self.model_url(model, version, &["initial_report"]))
            .await
    }

    async fn download_initial_report(&self, model: &str, version: &ModelVersion) -> Result<Vec<u8>> {
        let url = self.model_url(model, version, &["initial_report", "download"]);
        self.get_bytes(self.client.get(url)).await
    }

    async fn current_metrics(&self, model: &str, version: &ModelVersion) -> Result<MetricsSnapshot> {
        self.get_json(self.model_url(model, version, &["metrics"]))
            .await
    }

    async fn submit_metrics(
        &self,
        model: &str,
        version: &ModelVersion,
        metrics: &NewMetrics,
    ) -> Result<MetricsSnapshot> {
        self.post_json(
            self.model_url(model, version, &["set_new_metrics"]),
            Some(metrics),
        )
        .await
    }

    async fn snapshot_names(&self, model: &str, version: &ModelVersion) -> Result<Vec<String>> {
        let listing: SnapshotFiles = self
            .get_json(self.model_url(model, version, &["new_metrics_file_name"]))
            .await?;
        Ok(listing.files)
    }

    async fn snapshot(
        &self,
        model: &str,
        version: &ModelVersion,
        filename: &str,
    ) -> Result<MetricsSnapshot> {
        self.get_json(self.model_url(model, version, &["new_metrics", filename]))
            .await
    }

    async fn download_dataset(
        &self,
        model: &str,
        version: &ModelVersion,
        range: &DateRange,
    ) -> Result<Vec<u8>> {
        let url = self.model_url(model, version, &["dataset"]);
        self.get_bytes(self.client.get(url).query(&range.query()))
            .await
    }

    async fn download_degradation_report(
        &self,
        model: &str,
        version: &ModelVersion,
    ) -> Result<Vec<u8>> {
        let url = self.model_url(model, version, &["degradation_report"]);
        self.get_bytes(self.client.get(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn urls_append_encoded_segments() {
        let client = RegistryClient::new("http://registry.local/api/").unwrap();
        assert_eq!(
            client.url(&["get_model_list"]).as_str(),
            "http://registry.local/api/get_model_list"
        );
        assert_eq!(
            client
                .model_url("fraud detector", &"3".into(), &["new_metrics", "metrics_at_1.json"])
                .as_str(),
            "http://registry.local/api/model/fraud%20detector-3/new_metrics/metrics_at_1.json"
        );
        assert_eq!(
            client.model_url("m", &"1".into(), &[]).as_str(),
            "http://registry.local/api/model/m-1"
        );
    }

    #[test]
    fn relative_base_url_is_rejected() {
        assert!(matches!(RegistryClient::new("/api"), Err(Error::Config(_))));
    }

    #[test]
    fn new_metrics_requires_non_empty_arrays() {
        assert!(NewMetrics::new(json!([]), json!([1]), None).is_err());
        assert!(NewMetrics::new(json!([{"a": 1}]), json!([]), None).is_err());
        assert!(NewMetrics::new(json!({"a": 1}), json!([1]), None).is_err());

        let body = NewMetrics::new(json!([{"a": 1}]), json!([0]), Some(1_700_000_000.0)).unwrap();
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"instances": [{"a": 1}], "results": [0], "timestamp": 1_700_000_000.0})
        );

        let now = NewMetrics::new(json!([1]), json!([1]), None).unwrap();
        assert!(now.timestamp() > 1_700_000_000.0);
    }

    #[test]
    fn new_metrics_rejects_non_finite_timestamps() {
        for secs in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = NewMetrics::new(json!([1]), json!([1]), Some(secs)).unwrap_err();
            assert_eq!(err.to_string(), "timestamp must be a finite number");
        }
    }

    #[test]
    fn date_range_renders_iso_bounds() {
        let range = DateRange {
            start: Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()),
            end: None,
        };
        assert_eq!(
            range.query(),
            vec![("start_date", "2024-01-02T00:00:00.000Z".to_string())]
        );
        assert!(DateRange::default().query().is_empty());
    }

    #[test]
    fn date_range_parses_user_input() {
        let range = DateRange::parse(Some("2024-01-02"), Some("2024-01-03T12:00:00+02:00")).unwrap();
        assert_eq!(range.start, Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()));
        assert_eq!(range.end, Some(Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap()));

        assert_eq!(DateRange::parse(Some("  "), None).unwrap(), DateRange::default());
        assert!(DateRange::parse(Some("yesterday"), None).is_err());
        assert!(DateRange::parse(Some("2024-02-01"), Some("2024-01-01")).is_err());
    }

    #[test]
    fn error_messages_prefer_backend_detail() {
        assert_eq!(error_message(404, r#"{"detail": "Model m-1 not found"}"#), "Model m-1 not found");
        assert_eq!(error_message(500, ""), "Request failed with status code 500");
        assert_eq!(
            error_message(502, "bad gateway"),
            "Request failed with status code 502: bad gateway"
        );
        assert_eq!(
            error_message(422, r#"{"detail": [{"msg": "field required"}]}"#),
            r#"[{"msg":"field required"}]"#
        );
    }
}
