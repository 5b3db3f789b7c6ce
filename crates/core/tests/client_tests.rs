//! RegistryClient against an in-process stub of the registry backend.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use modeldeck_core::metrics::{compare_snapshots, sort_snapshot_names};
use modeldeck_core::{
    load_dashboard, DashboardStats, DateRange, DeployedModel, Error, ModelApi, ModelVersion,
    NewMetrics, RegistryClient, Trend,
};

#[derive(Default)]
struct Stub {
    deployed: IndexMap<String, DeployedModel>,
    queries: Vec<(String, HashMap<String, String>)>,
    submitted: Vec<Value>,
}

type Shared = Arc<Mutex<Stub>>;

fn not_found(detail: String) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
}

async fn model_list() -> Json<Value> {
    Json(json!(["fraud-detector", "churn"]))
}

async fn version_list(Path(model): Path<String>) -> Response {
    match model.as_str() {
        "fraud-detector" => Json(json!([1, 2, 3])).into_response(),
        "churn" => Json(json!(["1"])).into_response(),
        other => not_found(format!("Model {} not found", other)),
    }
}

async fn deploy(
    State(state): State<Shared>,
    Path((model, version)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let mut stub = state.lock().unwrap();
    let port = 8001 + stub.deployed.len() as u16;
    stub.queries.push((format!("deploy/{}/{}", model, version), query));
    stub.deployed.insert(
        format!("{}-{}", model, version),
        DeployedModel {
            model_name: model.clone(),
            version: ModelVersion::new(version.clone()),
            port,
            run_uuid: Some("run-1".into()),
        },
    );
    Json(json!({ "message": format!("Model {} version {} deployed on port {}", model, version, port) }))
}

async fn undeploy(State(state): State<Shared>, Path(key): Path<String>) -> Response {
    let mut stub = state.lock().unwrap();
    match stub.deployed.shift_remove(&key) {
        Some(_) => Json(json!({ "message": format!("Model {} undeployed", key) })).into_response(),
        None => not_found(format!("Model {} not found", key)),
    }
}

async fn deployed(State(state): State<Shared>) -> Response {
    let stub = state.lock().unwrap();
    // Straight to text: a `Value` round trip would sort the keys.
    let body = serde_json::to_string(&stub.deployed).unwrap();
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn free_ports(State(state): State<Shared>) -> Json<Value> {
    let stub = state.lock().unwrap();
    Json(json!(100 - stub.deployed.len()))
}

async fn type_mapping() -> Json<Value> {
    Json(json!({
        "python_to_mlflow_types": {
            "double": { "example": 1.5, "notes": "64-bit float" }
        }
    }))
}

fn model_resource(key: &str, resource: &str) -> Response {
    if key != "fraud-detector-3" {
        return not_found(format!("Model {} not deployed", key));
    }
    match resource {
        "signature" => Json(json!({
            "signature": {
                "inputs": [{ "name": "amount", "type": "double" }],
                "outputs": [{ "name": "score", "type": "double" }]
            }
        }))
        .into_response(),
        "metrics" => Json(json!({ "accuracy": 0.92, "latency_ms": 45 })).into_response(),
        "new_metrics_file_name" => Json(json!({
            "files": ["metrics_at_1600000000.json", "metrics_at_1700000000.json"]
        }))
        .into_response(),
        "initial_report" => Json(json!({
            "files": [{ "filename": "summary.json", "type": "json", "content": { "rows": 10 } }]
        }))
        .into_response(),
        "degradation_report" => Bytes::from_static(b"PK\x03\x04degradation").into_response(),
        other => not_found(format!("Unknown path {}", other)),
    }
}

async fn snapshot(Path((key, filename)): Path<(String, String)>) -> Response {
    match (key.as_str(), filename.as_str()) {
        ("fraud-detector-3", "metrics_at_1700000000.json") => {
            Json(json!({ "accuracy": 0.89, "latency_ms": 50 })).into_response()
        }
        _ => not_found(format!("{} not found", filename)),
    }
}

async fn initial_report_download(Path(key): Path<String>) -> Response {
    Bytes::from(format!("PK-initial-{}", key)).into_response()
}

async fn dataset(
    State(state): State<Shared>,
    Path(key): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state
        .lock()
        .unwrap()
        .queries
        .push((format!("dataset/{}", key), query));
    Bytes::from_static(b"amount,score\n10.0,0.1\n").into_response()
}

async fn invoke(Path(key): Path<String>, Json(payload): Json<Value>) -> Json<Value> {
    Json(json!({ "model": key, "echo": payload, "predictions": [0.1] }))
}

async fn set_new_metrics(
    State(state): State<Shared>,
    Path(_key): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.lock().unwrap().submitted.push(body);
    Json(json!({ "accuracy": 0.95, "latency_ms": 40 }))
}

async fn start_stub() -> (RegistryClient, Shared) {
    let state: Shared = Arc::new(Mutex::new(Stub::default()));

    let api = Router::new()
        .route("/get_model_list", get(model_list))
        .route("/get_model_version_list/:model", get(version_list))
        .route("/deploy/:model/:version", post(deploy))
        .route("/undeploy/:key", post(undeploy))
        .route("/get_deployed_models", get(deployed))
        .route("/get_number_free_ports", get(free_ports))
        .route("/type_mapping", get(type_mapping))
        .route("/model/:key", post(invoke))
        .route("/model/:key/initial_report/download", get(initial_report_download))
        .route("/model/:key/dataset", get(dataset))
        .route("/model/:key/set_new_metrics", post(set_new_metrics))
        .route("/model/:key/new_metrics/:filename", get(snapshot))
        .route("/model/:key/signature", get(|Path(key): Path<String>| async move { model_resource(&key, "signature") }))
        .route("/model/:key/metrics", get(|Path(key): Path<String>| async move { model_resource(&key, "metrics") }))
        .route(
            "/model/:key/new_metrics_file_name",
            get(|Path(key): Path<String>| async move { model_resource(&key, "new_metrics_file_name") }),
        )
        .route("/model/:key/initial_report", get(|Path(key): Path<String>| async move { model_resource(&key, "initial_report") }))
        .route(
            "/model/:key/degradation_report",
            get(|Path(key): Path<String>| async move { model_resource(&key, "degradation_report") }),
        )
        .with_state(state.clone());
    let app = Router::new().nest("/api", api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = RegistryClient::new(&format!("http://{}/api", addr)).unwrap();
    (client, state)
}

#[tokio::test]
async fn lists_models_and_versions() {
    let (client, _) = start_stub().await;

    assert_eq!(client.list_models().await.unwrap(), vec!["fraud-detector", "churn"]);

    let versions = client.list_versions("fraud-detector").await.unwrap();
    let labels: Vec<String> = versions.iter().map(ToString::to_string).collect();
    assert_eq!(labels, vec!["1", "2", "3"]);

    assert_eq!(client.list_versions("churn").await.unwrap(), vec![ModelVersion::from("1")]);
}

#[tokio::test]
async fn deploy_then_undeploy_is_reflected_in_listing() {
    let (client, state) = start_stub().await;
    assert!(client.deployed_models().await.unwrap().is_empty());
    assert_eq!(client.free_ports().await.unwrap(), 100);

    let version = ModelVersion::from(3);
    let confirmation = client.deploy("fraud-detector", &version, None).await.unwrap();
    assert!(confirmation.message.contains("deployed on port 8001"));

    let listing = client.deployed_models().await.unwrap();
    let entry = &listing["fraud-detector-3"];
    assert_eq!(entry.model_name, "fraud-detector");
    assert_eq!(entry.version, version);
    assert_eq!(entry.port, 8001);
    assert_eq!(client.free_ports().await.unwrap(), 99);

    client.undeploy("fraud-detector-3").await.unwrap();
    assert!(client.deployed_models().await.unwrap().is_empty());

    let queries = &state.lock().unwrap().queries;
    assert_eq!(queries[0].0, "deploy/fraud-detector/3");
    assert!(queries[0].1.is_empty());
}

#[tokio::test]
async fn deployed_listing_keeps_backend_order() {
    let (client, _state) = start_stub().await;
    client.deploy("fraud-detector", &ModelVersion::from(3), None).await.unwrap();
    client.deploy("churn", &ModelVersion::from("1"), None).await.unwrap();

    let listing = client.deployed_models().await.unwrap();
    let keys: Vec<_> = listing.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["fraud-detector-3", "churn-1"]);
    assert_eq!(listing["churn-1"].port, 8002);
}

#[tokio::test]
async fn deploy_forwards_class_count() {
    let (client, state) = start_stub().await;
    client
        .deploy("churn", &ModelVersion::from("1"), Some(4))
        .await
        .unwrap();

    let stub = state.lock().unwrap();
    assert_eq!(stub.queries[0].1.get("num_classes").map(String::as_str), Some("4"));
}

#[tokio::test]
async fn http_errors_surface_backend_detail() {
    let (client, _) = start_stub().await;

    let err = client.undeploy("ghost-1").await.unwrap_err();
    assert!(matches!(err, Error::RequestFailed { .. }));
    assert_eq!(err.to_string(), "Model ghost-1 not found");

    let err = client
        .current_metrics("ghost", &ModelVersion::from(1))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Model ghost-1 not deployed");
}

#[tokio::test]
async fn unreachable_backend_is_a_request_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RegistryClient::new(&format!("http://{}/api", addr)).unwrap();
    let err = client.list_models().await.unwrap_err();
    assert!(matches!(err, Error::RequestFailed { .. }));
}

#[tokio::test]
async fn signature_and_type_mapping() {
    let (client, _) = start_stub().await;
    let version = ModelVersion::from(3);

    let signature = client.signature("fraud-detector", &version).await.unwrap();
    assert_eq!(signature.signature.inputs[0].name, "amount");
    assert!(signature.signature.params.is_empty());

    let mapping = client.type_mapping().await.unwrap();
    assert_eq!(mapping.lookup("double").notes, "64-bit float");
}

#[tokio::test]
async fn invoke_posts_payload() {
    let (client, _) = start_stub().await;
    let payload = json!({ "amount": 12.5 });
    let result = client
        .invoke("fraud-detector", &ModelVersion::from(3), &payload)
        .await
        .unwrap();
    assert_eq!(result["model"], "fraud-detector-3");
    assert_eq!(result["echo"], payload);
}

#[tokio::test]
async fn historical_snapshot_comparison_end_to_end() {
    let (client, _) = start_stub().await;
    let version = ModelVersion::from(3);

    let names = client.snapshot_names("fraud-detector", &version).await.unwrap();
    let sorted = sort_snapshot_names(&names);
    assert_eq!(sorted[0].filename, "metrics_at_1700000000.json");
    assert_eq!(sorted[0].timestamp, 1_700_000_000.0);

    let current = client.current_metrics("fraud-detector", &version).await.unwrap();
    let historical = client
        .snapshot("fraud-detector", &version, &sorted[0].filename)
        .await
        .unwrap();

    let rows = compare_snapshots(&current, &historical);
    assert_eq!(
        (rows[0].diff_text(), rows[0].percentage_text(), rows[0].trend),
        ("0.0300".to_string(), "3.37".to_string(), Trend::Up)
    );
    assert_eq!(
        (rows[1].diff_text(), rows[1].percentage_text(), rows[1].trend),
        ("-5.0000".to_string(), "-10.00".to_string(), Trend::Down)
    );

    assert!(client
        .snapshot("fraud-detector", &version, "metrics_at_1600000000.json")
        .await
        .is_err());
}

#[tokio::test]
async fn submit_metrics_sends_instances_results_and_timestamp() {
    let (client, state) = start_stub().await;
    let body = NewMetrics::new(json!([{ "amount": 1.0 }]), json!([0]), Some(1_700_000_100.0)).unwrap();

    let updated = client
        .submit_metrics("fraud-detector", &ModelVersion::from(3), &body)
        .await
        .unwrap();
    assert_eq!(updated.get("accuracy").and_then(|v| v.as_f64()), Some(0.95));

    let stub = state.lock().unwrap();
    assert_eq!(
        stub.submitted,
        vec![json!({ "instances": [{ "amount": 1.0 }], "results": [0], "timestamp": 1_700_000_100.0 })]
    );
}

#[tokio::test]
async fn binary_downloads_return_raw_bytes() {
    let (client, state) = start_stub().await;
    let version = ModelVersion::from(3);

    let range = DateRange {
        start: Some("2024-01-01T00:00:00Z".parse().unwrap()),
        end: Some("2024-02-01T00:00:00Z".parse().unwrap()),
    };
    let csv = client
        .download_dataset("fraud-detector", &version, &range)
        .await
        .unwrap();
    assert_eq!(csv, b"amount,score\n10.0,0.1\n");

    let report = client
        .download_initial_report("fraud-detector", &version)
        .await
        .unwrap();
    assert_eq!(report, b"PK-initial-fraud-detector-3");

    let degradation = client
        .download_degradation_report("fraud-detector", &version)
        .await
        .unwrap();
    assert!(degradation.starts_with(b"PK"));

    let bundle = client.initial_report("fraud-detector", &version).await.unwrap();
    assert_eq!(bundle.decode().len(), 1);

    let stub = state.lock().unwrap();
    let (path, query) = &stub.queries[0];
    assert_eq!(path, "dataset/fraud-detector-3");
    assert_eq!(query["start_date"], "2024-01-01T00:00:00.000Z");
    assert_eq!(query["end_date"], "2024-02-01T00:00:00.000Z");
}

#[tokio::test]
async fn dashboard_summary_counts_everything() {
    let (client, _) = start_stub().await;
    client
        .deploy("churn", &ModelVersion::from("1"), None)
        .await
        .unwrap();

    let stats = load_dashboard(&client).await.unwrap();
    assert_eq!(
        stats,
        DashboardStats {
            models: 2,
            deployed: 1,
            free_ports: 99
        }
    );
}
