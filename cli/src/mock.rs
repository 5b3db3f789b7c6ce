//! In-memory `ModelApi` used by command and dashboard tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use modeldeck_core::models::{model_key, Confirmation};
use modeldeck_core::report::ReportBundle;
use modeldeck_core::signature::{ModelSignature, TypeMapping};
use modeldeck_core::{
    DateRange, DeployedModel, DeployedModels, Error, MetricsSnapshot, ModelApi, ModelVersion,
    NewMetrics, Result,
};

#[derive(Default)]
struct State {
    models: Vec<String>,
    versions: HashMap<String, Vec<ModelVersion>>,
    deployed: DeployedModels,
    signature: ModelSignature,
    mapping: TypeMapping,
    metrics: MetricsSnapshot,
    snapshot_names: Vec<String>,
    snapshots: BTreeMap<String, MetricsSnapshot>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct MockApi {
    state: Mutex<State>,
}

fn snapshot(value: Value) -> MetricsSnapshot {
    serde_json::from_value(value).unwrap()
}

impl MockApi {
    /// Registry with `fraud-detector` (v1-3, v3 deployed) and `churn` (v1).
    pub fn with_fraud_detector() -> Self {
        let mut state = State {
            models: vec!["fraud-detector".into(), "churn".into()],
            ..State::default()
        };
        state.versions.insert(
            "fraud-detector".into(),
            vec![1.into(), 2.into(), 3.into()],
        );
        state.versions.insert("churn".into(), vec!["1".into()]);
        state.deployed.insert(
            "fraud-detector-3".into(),
            DeployedModel {
                model_name: "fraud-detector".into(),
                version: 3.into(),
                port: 8001,
                run_uuid: None,
            },
        );
        state.signature = serde_json::from_value(json!({
            "signature": {
                "inputs": [
                    { "name": "amount", "type": "double" },
                    { "name": "country", "type": "string" }
                ],
                "outputs": [{ "name": "score", "type": "double" }]
            }
        }))
        .unwrap();
        state.mapping = serde_json::from_value(json!({
            "python_to_mlflow_types": {
                "double": { "example": 1.5, "notes": "64-bit float" },
                "string": { "example": "text", "notes": "UTF-8 string" }
            }
        }))
        .unwrap();
        state.metrics = snapshot(json!({ "accuracy": 0.92, "latency_ms": 45 }));
        state.snapshot_names = vec![
            "metrics_at_1600000000.json".into(),
            "metrics_at_1700000000.json".into(),
            "metrics_at_1650000000.json".into(),
        ];
        state.snapshots.insert(
            "metrics_at_1700000000.json".into(),
            snapshot(json!({ "accuracy": 0.89, "latency_ms": 50 })),
        );
        state.snapshots.insert(
            "metrics_at_1600000000.json".into(),
            snapshot(json!({ "accuracy": 0.85, "latency_ms": 60 })),
        );

        Self {
            state: Mutex::new(state),
        }
    }

    /// Make every call of `operation` fail.
    pub fn fail(&self, operation: &str) {
        self.state.lock().unwrap().failing.insert(operation.to_string());
    }

    /// Delay calls whose log entry equals `call`.
    pub fn slow(&self, call: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(call.to_string(), delay);
    }

    /// Every call made so far, as `"<operation> <args>"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    async fn record(&self, operation: &str, args: &str) -> Result<()> {
        let call = if args.is_empty() {
            operation.to_string()
        } else {
            format!("{} {}", operation, args)
        };
        let (delay, failing) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call.clone());
            (state.delays.get(&call).copied(), state.failing.contains(operation))
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(Error::request_failed(format!("{} unavailable", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl ModelApi for MockApi {
    async fn list_models(&self) -> Result<Vec<String>> {
        self.record("list_models", "").await?;
        Ok(self.state.lock().unwrap().models.clone())
    }

    async fn list_versions(&self, model: &str) -> Result<Vec<ModelVersion>> {
        self.record("list_versions", model).await?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .versions
            .get(model)
            .cloned()
            .unwrap_or_default())
    }

    async fn deploy(
        &self,
        model: &str,
        version: &ModelVersion,
        _num_classes: Option<u32>,
    ) -> Result<Confirmation> {
        let key = model_key(model, version);
        self.record("deploy", &key).await?;
        let mut state = self.state.lock().unwrap();
        let port = 8001 + state.deployed.len() as u16;
        state.deployed.insert(
            key,
            DeployedModel {
                model_name: model.to_string(),
                version: version.clone(),
                port,
                run_uuid: None,
            },
        );
        Ok(Confirmation {
            message: format!("Model {} version {} deployed on port {}", model, version, port),
        })
    }

    async fn undeploy(&self, key: &str) -> Result<Confirmation> {
        self.record("undeploy", key).await?;
        match self.state.lock().unwrap().deployed.shift_remove(key) {
            Some(_) => Ok(Confirmation {
                message: format!("Model {} undeployed", key),
            }),
            None => Err(Error::request_failed(format!("Model {} not found", key))),
        }
    }

    async fn deployed_models(&self) -> Result<DeployedModels> {
        self.record("deployed_models", "").await?;
        Ok(self.state.lock().unwrap().deployed.clone())
    }

    async fn free_ports(&self) -> Result<u64> {
        self.record("free_ports", "").await?;
        Ok(100 - self.state.lock().unwrap().deployed.len() as u64)
    }

    async fn signature(&self, model: &str, version: &ModelVersion) -> Result<ModelSignature> {
        self.record("signature", &model_key(model, version)).await?;
        Ok(self.state.lock().unwrap().signature.clone())
    }

    async fn type_mapping(&self) -> Result<TypeMapping> {
        self.record("type_mapping", "").await?;
        Ok(self.state.lock().unwrap().mapping.clone())
    }

    async fn invoke(&self, model: &str, version: &ModelVersion, payload: &Value) -> Result<Value> {
        self.record("invoke", &model_key(model, version)).await?;
        Ok(json!({ "predictions": [0.12], "echo": payload }))
    }

    async fn initial_report(&self, model: &str, version: &ModelVersion) -> Result<ReportBundle> {
        self.record("initial_report", &model_key(model, version)).await?;
        Ok(serde_json::from_value(json!({
            "files": [{ "filename": "summary.json", "type": "json", "content": { "rows": 10 } }]
        }))
        .unwrap())
    }

    async fn download_initial_report(&self, model: &str, version: &ModelVersion) -> Result<Vec<u8>> {
        self.record("download_initial_report", &model_key(model, version))
            .await?;
        Ok(b"PK-initial".to_vec())
    }

    async fn current_metrics(&self, model: &str, version: &ModelVersion) -> Result<MetricsSnapshot> {
        self.record("current_metrics", &model_key(model, version)).await?;
        Ok(self.state.lock().unwrap().metrics.clone())
    }

    async fn submit_metrics(
        &self,
        model: &str,
        version: &ModelVersion,
        metrics: &NewMetrics,
    ) -> Result<MetricsSnapshot> {
        self.record("submit_metrics", &model_key(model, version)).await?;
        let mut state = self.state.lock().unwrap();
        let name = format!("metrics_at_{}.json", metrics.timestamp());
        let updated = snapshot(json!({ "accuracy": 0.95, "latency_ms": 40 }));
        state.snapshot_names.push(name.clone());
        state.snapshots.insert(name, updated.clone());
        state.metrics = updated.clone();
        Ok(updated)
    }

    async fn snapshot_names(&self, model: &str, version: &ModelVersion) -> Result<Vec<String>> {
        self.record("snapshot_names", &model_key(model, version)).await?;
        Ok(self.state.lock().unwrap().snapshot_names.clone())
    }

    async fn snapshot(
        &self,
        model: &str,
        version: &ModelVersion,
        filename: &str,
    ) -> Result<MetricsSnapshot> {
        self.record("snapshot", &format!("{} {}", model_key(model, version), filename))
            .await?;
        self.state
            .lock()
            .unwrap()
            .snapshots
            .get(filename)
            .cloned()
            .ok_or_else(|| Error::request_failed(format!("{} not found", filename)))
    }

    async fn download_dataset(
        &self,
        model: &str,
        version: &ModelVersion,
        _range: &DateRange,
    ) -> Result<Vec<u8>> {
        self.record("download_dataset", &model_key(model, version)).await?;
        Ok(b"amount,score\n10.0,0.1\n".to_vec())
    }

    async fn download_degradation_report(
        &self,
        model: &str,
        version: &ModelVersion,
    ) -> Result<Vec<u8>> {
        self.record("download_degradation_report", &model_key(model, version))
            .await?;
        Ok(b"PK-degradation".to_vec())
    }
}
