//! Vendor MCP endpoints: sessions, tool listing and tool calls

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use common::{ALLOWED_IP, build_app, start_app, tool_payload};
use mock_mcp_server::config::Config;

const FENCED_LOGS: &str = "Here are the logs:\n```json\n{\"logs\": [{\"service\": \"checkout-service\", \"status\": \"error\"}], \"total\": 1}\n```";

fn call(id: i64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
}

#[tokio::test]
async fn initialize_reports_vendor_identity_and_session() {
    let app = start_app(&Config::default(), "{}").await;

    let response = app
        .rpc(
            "/datadog/mcp",
            None,
            &json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {"protocolVersion": "2025-03-26", "capabilities": {}}
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.header("mcp-session-id").is_some());
    let body = response.json();
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["protocolVersion"], "2025-03-26");
    assert_eq!(body["result"]["serverInfo"]["name"], "datadog-mock");
    assert_eq!(body["result"]["capabilities"]["tools"]["listChanged"], false);
}

#[tokio::test]
async fn tools_list_returns_vendor_catalog() {
    let app = start_app(&Config::default(), "{}").await;
    let session = app.initialize("/newrelic/mcp").await;

    let response = app
        .rpc(
            "/newrelic/mcp",
            Some(session.as_str()),
            &json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("mcp-session-id"), Some(session.as_str()));

    let tools = response.json()["result"]["tools"].as_array().unwrap().clone();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec!["get_newrelic_entity", "execute_nrql_query", "list_newrelic_error_groups"]
    );

    let nrql = &tools[1]["inputSchema"];
    assert_eq!(nrql["properties"]["account_id"]["type"], "integer");
    assert_eq!(nrql["required"], json!(["query", "account_id", "port_context"]));
    assert_eq!(
        tools[2]["inputSchema"]["properties"]["time_window"]["default"],
        "1h"
    );
}

#[tokio::test]
async fn search_logs_returns_backend_json_unwrapped() {
    let app = start_app(&Config::default(), FENCED_LOGS).await;
    let session = app.initialize("/datadog/mcp").await;

    let response = app
        .rpc(
            "/datadog/mcp",
            Some(session.as_str()),
            &call(
                3,
                "search_datadog_logs",
                json!({
                    "query": "checkout-service",
                    "port_context": {"entity": {"identifier": "checkout-service"}}
                }),
            ),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    let result = &body["result"];
    assert_eq!(result["isError"], false);
    assert_eq!(result["content"][0]["type"], "text");
    assert_eq!(
        tool_payload(result),
        json!({"logs": [{"service": "checkout-service", "status": "error"}], "total": 1})
    );
    assert_eq!(app.backend.calls(), 1);
}

#[tokio::test]
async fn prose_reply_becomes_in_band_parse_error() {
    let app = start_app(&Config::default(), "No logs today, sorry.").await;
    let session = app.initialize("/aws").await;

    let response = app
        .rpc(
            "/aws",
            Some(session.as_str()),
            &call(4, "get_cloudwatch_logs", json!({"log_group": "/ecs/api", "port_context": {}})),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let payload = tool_payload(&response.json()["result"]);
    assert_eq!(payload["error"], "Failed to parse response");
    assert_eq!(payload["raw"], "No logs today, sorry.");
}

#[tokio::test]
async fn invalid_arguments_are_reported_without_calling_backend() {
    let app = start_app(&Config::default(), "{}").await;
    let session = app.initialize("/github/mcp").await;

    let response = app
        .rpc(
            "/github/mcp",
            Some(session.as_str()),
            &call(5, "list_pull_requests", json!({"owner": "acme", "repo": "payments"})),
        )
        .await;

    let body = response.json();
    let result = &body["result"];
    assert_eq!(result["isError"], true);
    assert_eq!(
        tool_payload(result)["error"],
        "Invalid arguments for list_pull_requests: missing required parameter 'port_context'"
    );
    assert_eq!(app.backend.calls(), 0);
}

#[tokio::test]
async fn unknown_tool_is_in_band_error() {
    let app = start_app(&Config::default(), "{}").await;
    let session = app.initialize("/github/mcp").await;

    let response = app
        .rpc("/github/mcp", Some(session.as_str()), &call(6, "delete_repo", json!({"port_context": {}})))
        .await;

    let body = response.json();
    let result = &body["result"];
    assert_eq!(result["isError"], true);
    assert_eq!(tool_payload(result)["error"], "Unknown tool: delete_repo");
}

#[tokio::test]
async fn unknown_method_is_json_rpc_error() {
    let app = start_app(&Config::default(), "{}").await;
    let session = app.initialize("/github/mcp").await;

    let response = app
        .rpc(
            "/github/mcp",
            Some(session.as_str()),
            &json!({"jsonrpc": "2.0", "id": 7, "method": "resources/list"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["error"]["code"], -32601);
}

#[tokio::test]
async fn ping_and_notifications() {
    let app = start_app(&Config::default(), "{}").await;
    let session = app.initialize("/datadog").await;

    let response = app
        .rpc(
            "/datadog",
            Some(session.as_str()),
            &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert!(response.body.is_empty());

    let response = app
        .rpc("/datadog", Some(session.as_str()), &json!({"jsonrpc": "2.0", "id": "p", "method": "ping"}))
        .await;
    assert_eq!(response.json(), json!({"jsonrpc": "2.0", "id": "p", "result": {}}));
}

#[tokio::test]
async fn session_id_is_required_and_checked() {
    let app = start_app(&Config::default(), "{}").await;
    let list = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});

    let missing = app.rpc("/datadog/mcp", None, &list).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let unknown = app.rpc("/datadog/mcp", Some("not-a-session"), &list).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    // sessions are per vendor
    let github_session = app.initialize("/github/mcp").await;
    let foreign = app.rpc("/datadog/mcp", Some(github_session.as_str()), &list).await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_terminates_session() {
    let app = start_app(&Config::default(), "{}").await;
    let session = app.initialize("/aws/mcp").await;

    let delete = |session: Option<&str>| {
        let mut builder = Request::builder()
            .method("DELETE")
            .uri("/aws/mcp")
            .header("x-forwarded-for", ALLOWED_IP);
        if let Some(session) = session {
            builder = builder.header("mcp-session-id", session);
        }
        builder.body(Body::empty()).unwrap()
    };

    assert_eq!(app.send(delete(Some(session.as_str()))).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.send(delete(Some(session.as_str()))).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.send(delete(None)).await.status, StatusCode::BAD_REQUEST);

    let response = app
        .rpc("/aws/mcp", Some(session.as_str()), &json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let app = start_app(&Config::default(), "{}").await;

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/github/mcp")
                .header("x-forwarded-for", ALLOWED_IP)
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = response.json();
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);

    let response = app
        .rpc("/github/mcp", None, &json!({"jsonrpc": "1.0", "id": 1, "method": "initialize"}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"]["code"], -32600);
}

#[tokio::test]
async fn get_is_not_allowed_and_unknown_vendor_is_not_found() {
    let app = start_app(&Config::default(), "{}").await;

    let response = app.get("/github/mcp", ALLOWED_IP).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.header("allow"), Some("POST, DELETE"));

    assert_eq!(app.get("/pagerduty/mcp", ALLOWED_IP).await.status, StatusCode::NOT_FOUND);
    let response = app
        .rpc("/pagerduty", None, &json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/datadog/mcp/extra", ALLOWED_IP).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_tracks_lifecycle() {
    let app = build_app(&Config::default(), "{}");

    let response = app.get("/health", ALLOWED_IP).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);

    app.state.lifecycle.start_all().await.unwrap();
    let response = app.get("/health", ALLOWED_IP).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({"status": "healthy", "service": "mock-mcp-server"})
    );

    app.state.lifecycle.stop_all().await;
    assert_eq!(
        app.get("/health", ALLOWED_IP).await.status,
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn requests_before_startup_are_unavailable() {
    let app = build_app(&Config::default(), "{}");
    let response = app
        .rpc("/datadog/mcp", None, &json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}))
        .await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn stopping_drops_open_sessions() {
    let app = start_app(&Config::default(), "{}").await;
    let session = app.initialize("/github/mcp").await;

    app.state.lifecycle.stop_all().await;
    app.state.lifecycle.start_all().await.unwrap();

    let response = app
        .rpc("/github/mcp", Some(session.as_str()), &json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
