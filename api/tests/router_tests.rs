//! End-to-end router behaviour against a scripted invoker

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use dbtserve_api::{router, with_middleware, ApiState, ServiceConfig};
use dbtserve_core::{
    DbtPaths, FailureKind, NodeDescriptor, RawPayload, RawResult, RunOutcome, ToolFailure,
};
use dbtserve_tools::ScriptedInvoker;

fn config() -> ServiceConfig {
    ServiceConfig::new(DbtPaths::new("/srv/profiles", "/srv/project"), "dev")
}

fn app_with(invoker: Arc<ScriptedInvoker>) -> Router {
    router(Arc::new(ApiState::ready(invoker, config())))
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn outcome(unique_id: &str, status: &str) -> RunOutcome {
    let segments: Vec<&str> = unique_id.split('.').collect();
    RunOutcome {
        node: NodeDescriptor {
            unique_id: unique_id.to_string(),
            name: segments[2].to_string(),
            resource_type: segments[0].to_string(),
            fqn: vec![segments[1].to_string(), segments[2].to_string()],
            depends_on: vec![],
            original_file_path: Some(format!("models/{}.sql", segments[2])),
        },
        status: status.to_string(),
        message: Some(format!("{} message", status)),
        failures: Some(2),
        execution_time: Some(0.1),
    }
}

#[tokio::test]
async fn test_health_and_root() {
    let app = app_with(Arc::new(ScriptedInvoker::returning(RawResult::failed(None, None))));

    let (status, body) = send(app.clone(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "dbtserve");
}

#[tokio::test]
async fn test_commands_rejected_until_ready() {
    let invoker = Arc::new(ScriptedInvoker::returning(RawResult::succeeded(
        RawPayload::Execution(vec![]),
    )));
    let state = Arc::new(ApiState::new(invoker.clone()));
    let app = router(state.clone());

    let (status, body) = send(app.clone(), "POST", "/dbt/run", Some(json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "ServiceUnavailable");

    let (status, _) = send(app.clone(), "GET", "/readiness", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(invoker.call_count(), 0);

    state.mark_ready(config());
    let (status, _) = send(app, "POST", "/dbt/run", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoker.call_count(), 1);
}

#[tokio::test]
async fn test_readiness_checks_files() {
    let dir = TempDir::new().unwrap();
    let paths = DbtPaths::new(dir.path(), dir.path());
    let invoker = Arc::new(ScriptedInvoker::returning(RawResult::failed(None, None)));
    let state = Arc::new(ApiState::ready(invoker, ServiceConfig::new(paths, "dev")));

    let (status, body) = send(router(state.clone()), "GET", "/readiness", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"].as_str().unwrap().contains("profiles.yml"));

    fs::write(dir.path().join("profiles.yml"), "shop: {}\n").unwrap();
    fs::write(dir.path().join("dbt_project.yml"), "name: shop\n").unwrap();
    let (status, body) = send(router(state), "GET", "/readiness", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_run_success_reports_nodes_and_metadata() {
    let invoker = Arc::new(ScriptedInvoker::returning(RawResult::succeeded(
        RawPayload::Execution(vec![outcome("model.shop.orders", "success")]),
    )));
    let app = app_with(invoker.clone());

    let (status, body) = send(
        app,
        "POST",
        "/dbt/run",
        Some(json!({"select_args": "orders", "full_refresh": true})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["nodes"][0]["unique_id"], "model.shop.orders");
    assert_eq!(body["nodes"][0]["fqn"], "shop.orders");
    assert_eq!(body["metadata"]["command"], "run");
    assert_eq!(body["metadata"]["target"], "dev");
    assert_eq!(body["metadata"]["nodes_processed"], 1);
    assert_eq!(body["metadata"]["selection_criteria"], "select_args: orders");
    assert!(body["metadata"]["dbt_command"]
        .as_str()
        .unwrap()
        .ends_with("--target dev"));
    assert!(body.get("test_summary").is_none());

    let calls = invoker.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1.as_slice().contains(&"--full-refresh".to_string()));
}

#[tokio::test]
async fn test_unknown_target_is_400() {
    let failure = ToolFailure::new(
        FailureKind::Runtime,
        "Runtime Error\n  The profile 'shop' does not have a target named 'bad'. The valid target names for this profile are:\n - dev\n- prod",
    );
    let app = app_with(Arc::new(ScriptedInvoker::returning(RawResult::failed(
        Some(failure),
        None,
    ))));

    let (status, body) = send(app, "POST", "/dbt/run", Some(json!({"target": "bad"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "TargetError");
    assert_eq!(body["provided_target"], "bad");
    assert_eq!(body["valid_targets"], json!(["dev", "prod"]));
}

#[tokio::test]
async fn test_list_preserves_dependencies() {
    let records = vec![
        r#"{"unique_id":"model.shop.stg_orders","resource_type":"model","name":"stg_orders","depends_on":{"nodes":[]}}"#.to_string(),
        r#"{"unique_id":"model.shop.orders","resource_type":"model","name":"orders","depends_on":{"nodes":["model.shop.stg_orders"]}}"#.to_string(),
    ];
    let invoker = Arc::new(ScriptedInvoker::returning(RawResult::succeeded(
        RawPayload::FlatList(records),
    )));
    let app = app_with(invoker.clone());

    let (status, body) = send(app, "POST", "/dbt/list", Some(json!({"resource_type": "model"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(body["nodes"][1]["depends_on"], json!(["model.shop.stg_orders"]));

    let args = invoker.calls()[0].1.command_line();
    assert!(args.contains("--output json --resource-type model"));
}

#[tokio::test]
async fn test_test_summary_and_strict_mode() {
    let result = RawResult::failed(
        None,
        Some(RawPayload::Execution(vec![
            outcome("test.shop.unique_orders_id", "pass"),
            outcome("test.shop.not_null_orders_id", "fail"),
            outcome("test.shop.accepted_values_status", "error"),
        ])),
    );
    let invoker = Arc::new(ScriptedInvoker::returning(result));

    let (status, body) = send(app_with(invoker.clone()), "POST", "/dbt/test", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["test_summary"],
        json!({"total": 3, "passed": 1, "warned": 0, "failed": 1, "errored": 1, "skipped": 0})
    );
    assert_eq!(body["metadata"]["has_test_failures"], true);
    assert_eq!(body["metadata"]["has_test_errors"], true);

    let (status, body) = send(
        app_with(invoker),
        "POST",
        "/dbt/test",
        Some(json!({"strict": true})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["failed_tests"].as_array().unwrap().len(), 2);
    assert_eq!(body["passed_tests"].as_array().unwrap().len(), 1);
    assert_eq!(body["test_summary"]["total"], 3);
}

#[tokio::test]
async fn test_node_errors_are_compilation_errors() {
    let mut failing = outcome("model.shop.revenue", "error");
    failing.message = Some("Database Error in model revenue\n  Syntax error: unexpected 'FORM'".to_string());
    let app = app_with(Arc::new(ScriptedInvoker::returning(RawResult::failed(
        None,
        Some(RawPayload::Execution(vec![failing])),
    ))));

    let (status, body) = send(app, "POST", "/dbt/compile", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "CompilationError");
    assert_eq!(body["failed_models"][0]["name"], "revenue");
    assert_eq!(
        body["failed_models"][0]["syntax_error"],
        "Syntax error: unexpected 'FORM'"
    );
}

#[tokio::test]
async fn test_generic_failure_is_500_with_command() {
    let app = app_with(Arc::new(ScriptedInvoker::returning(RawResult::failed(
        None, None,
    ))));

    let (status, body) = send(app, "POST", "/dbt/build", Some(json!({"target": "prod"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "ExecutionError");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("build --project-dir /srv/project"));
    assert!(message.ends_with("--target prod"));
}

#[tokio::test]
async fn test_invalid_requests_never_invoke() {
    let invoker = Arc::new(ScriptedInvoker::returning(RawResult::succeeded(
        RawPayload::Execution(vec![]),
    )));

    let cases = [
        ("/dbt/run", json!({"select_args": "orders", "selector_args": "nightly"})),
        ("/dbt/run", json!({"strict": true})),
        ("/dbt/compile", json!({"target": "dev; rm -rf /"})),
        ("/dbt/list", json!({"resource_type": "widget"})),
        ("/dbt/run", json!({"unexpected": 1})),
        ("/dbt/unsafe", json!({"unsafe_dbt_cli_command": "dbt run; rm -rf /"})),
        ("/dbt/unsafe", json!({"unsafe_dbt_cli_command": "dbt run dbt"})),
    ];
    for (uri, body) in cases {
        let (status, response) = send(app_with(invoker.clone()), "POST", uri, Some(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", uri, body);
        assert_eq!(response["error"], "ValidationError", "{} {}", uri, body);
    }
    assert_eq!(invoker.call_count(), 0);
}

#[tokio::test]
async fn test_unsafe_command_passes_argv() {
    let invoker = Arc::new(ScriptedInvoker::returning(
        RawResult::succeeded(RawPayload::Execution(vec![outcome(
            "model.shop.orders",
            "success",
        )]))
        .with_output("Completed successfully"),
    ));

    let (status, body) = send(
        app_with(invoker.clone()),
        "POST",
        "/dbt/unsafe",
        Some(json!({"unsafe_dbt_cli_command": "dbt run --select 'orders' --target prod"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["output"], "Completed successfully");
    assert_eq!(body["nodes"][0]["unique_id"], "model.shop.orders");
    assert_eq!(body["nodes"][0]["resource_type"], "model");
    assert_eq!(body["metadata"]["dbt_command"], "dbt run --select orders --target prod");
    assert_eq!(
        invoker.calls()[0].1.as_slice(),
        ["run", "--select", "orders", "--target", "prod"]
    );
}

#[tokio::test]
async fn test_selector_requires_selectors_file() {
    let invoker = Arc::new(ScriptedInvoker::returning(RawResult::succeeded(
        RawPayload::Execution(vec![]),
    )));

    let (status, body) = send(
        app_with(invoker.clone()),
        "POST",
        "/dbt/run",
        Some(json!({"selector_args": "nightly"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ConfigurationError");
    assert_eq!(body["config_type"], "selectors-file");
    assert_eq!(invoker.call_count(), 0);

    let project = TempDir::new().unwrap();
    fs::write(project.path().join("selectors.yml"), "selectors: []\n").unwrap();
    let config = ServiceConfig::new(DbtPaths::new("/srv/profiles", project.path()), "dev");
    let app = router(Arc::new(ApiState::ready(invoker.clone(), config)));

    let (status, _) = send(app, "POST", "/dbt/run", Some(json!({"selector_args": "nightly"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoker.call_count(), 1);
}

async fn exploding_handler() -> &'static str {
    panic!("handler failed")
}

#[tokio::test]
async fn test_handler_panic_is_internal_error_body() {
    let app = with_middleware(Router::new().route("/explode", get(exploding_handler)));

    let (status, body) = send(app, "GET", "/explode", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "InternalError");
    assert!(!body["message"].as_str().unwrap().contains("handler failed"));
}
