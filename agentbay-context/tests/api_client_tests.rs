use agentbay_context::api_client::{ApiEnvelope, HttpTransport, Transport};
use agentbay_context::{AgentBay, AgentBayConfig, ContextError};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{any, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> AgentBayConfig {
    AgentBayConfig::default()
        .with_endpoint(server.uri())
        .with_api_key("ak-test")
}

fn transport(server: &MockServer) -> HttpTransport {
    HttpTransport::new(config(server)).unwrap()
}

// --- Authentication ---

#[tokio::test]
async fn missing_key_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(AgentBayConfig::default().with_endpoint(server.uri())).unwrap();
    let err = transport.call("GetContext", json!({})).await.unwrap_err();
    assert!(matches!(err, ContextError::AuthenticationMissing));
}

#[tokio::test]
async fn blank_key_counts_as_missing() {
    let server = MockServer::start().await;
    let transport = HttpTransport::new(
        AgentBayConfig::default()
            .with_endpoint(server.uri())
            .with_api_key("  "),
    )
    .unwrap();
    let err = transport.call("GetContext", json!({})).await.unwrap_err();
    assert!(matches!(err, ContextError::AuthenticationMissing));
}

#[tokio::test]
async fn client_built_without_key_fails_on_first_call() {
    let server = MockServer::start().await;
    let agentbay = AgentBay::new(AgentBayConfig::default().with_endpoint(server.uri())).unwrap();
    let err = agentbay.contexts().get("anything", false).await.unwrap_err();
    assert!(matches!(err, ContextError::AuthenticationMissing));
}

#[tokio::test]
async fn sends_bearer_key_and_json_params() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/GetContext"))
        .and(header("authorization", "Bearer ak-test"))
        .and(body_json(json!({ "Name": "my-data", "AllowCreate": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Success": true,
            "RequestId": "req-1",
            "Data": { "Id": "ctx-1", "Name": "my-data", "State": "available" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let envelope = transport(&server)
        .call("GetContext", json!({ "Name": "my-data", "AllowCreate": false }))
        .await
        .unwrap();
    assert!(envelope.success);
    assert_eq!(envelope.request_id, "req-1");
    assert_eq!(envelope.data["Id"], "ctx-1");
}

// --- Envelope mapping ---

#[tokio::test]
async fn extra_fields_are_kept_as_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ListContexts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Success": true,
            "RequestId": "req-2",
            "Data": [],
            "NextToken": "tok",
            "MaxResults": 10
        })))
        .mount(&server)
        .await;

    let envelope = transport(&server).call("ListContexts", json!({})).await.unwrap();
    assert_eq!(envelope.metadata.get("NextToken"), Some(&json!("tok")));
    assert_eq!(envelope.metadata.get("MaxResults"), Some(&json!(10)));
}

#[tokio::test]
async fn failure_carries_code_message_and_request_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Success": false,
            "RequestId": "req-3",
            "Code": "InvalidApiKey",
            "Message": "api key is invalid"
        })))
        .mount(&server)
        .await;

    let envelope = transport(&server).call("GetContext", json!({})).await.unwrap();
    assert!(!envelope.success);
    assert_eq!(envelope.code.as_deref(), Some("InvalidApiKey"));
    assert_eq!(envelope.message(), "api key is invalid");

    let err = envelope.into_error();
    assert_eq!(err.request_id(), Some("req-3"));
    assert_eq!(
        err.to_string(),
        "API call failed [InvalidApiKey]: api key is invalid (request req-3)"
    );
}

#[tokio::test]
async fn failure_without_message_falls_back_to_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Success": false,
            "RequestId": "req-4",
            "Code": "Forbidden.RAM"
        })))
        .mount(&server)
        .await;

    let envelope = transport(&server).call("DeleteContext", json!({})).await.unwrap();
    assert_eq!(envelope.message(), "Forbidden.RAM");
}

#[tokio::test]
async fn http_error_with_unparseable_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let envelope = transport(&server).call("SyncContext", json!({})).await.unwrap();
    assert!(!envelope.success);
    assert_eq!(envelope.code.as_deref(), Some("502"));
    assert!(envelope.message().contains("SyncContext"));
    assert!(!envelope.message().is_empty());
}

#[tokio::test]
async fn http_error_with_envelope_keeps_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "RequestId": "req-5",
            "Message": "missing parameter SessionId"
        })))
        .mount(&server)
        .await;

    let envelope = transport(&server).call("GetSession", json!({})).await.unwrap();
    assert!(!envelope.success);
    assert_eq!(envelope.request_id, "req-5");
    assert_eq!(envelope.code.as_deref(), Some("400"));
    assert_eq!(envelope.message(), "missing parameter SessionId");
}

#[tokio::test]
async fn trailing_slash_in_endpoint_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/GetSession"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Success": true,
            "RequestId": "req-6",
            "Data": { "Status": "RUNNING" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(
        AgentBayConfig::default()
            .with_endpoint(format!("{}/", server.uri()))
            .with_api_key("ak-test"),
    )
    .unwrap();
    let envelope = transport.call("GetSession", json!({})).await.unwrap();
    assert!(envelope.success);
}

// --- Envelope helpers ---

#[test]
fn failed_envelope_always_has_a_message() {
    let envelope = ApiEnvelope::failed("req", None, Some("   ".into()));
    assert!(!envelope.message().is_empty());
    assert_eq!(envelope.into_error().to_string(), "API call failed [Unknown]: request failed without an error message (request req)");
}

#[test]
fn string_encoded_data_is_decoded() {
    let envelope = ApiEnvelope::ok("req", json!(r#"{"SessionId":"s-1"}"#));
    assert_eq!(envelope.data_object().unwrap()["SessionId"], "s-1");
    assert_eq!(ApiEnvelope::ok("req", json!("")).data_object().unwrap(), serde_json::Value::Null);
}

#[test]
fn into_data_on_failure_is_api_error() {
    let err = ApiEnvelope::failed("req-x", Some("Code".into()), Some("msg".into()))
        .into_data()
        .unwrap_err();
    assert!(matches!(err, ContextError::Api { .. }));
}
