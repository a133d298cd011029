use agentbay_context::ContextError;
use agentbay_context::error::PathFailure;
use std::time::Duration;

fn failure(path: &str, message: &str) -> PathFailure {
    PathFailure {
        context_id: "ctx-1".into(),
        path: path.into(),
        message: message.into(),
    }
}

#[test]
fn invalid_policy_display() {
    let err = ContextError::InvalidPolicy("period must be positive".into());
    assert_eq!(err.to_string(), "invalid policy: period must be positive");
}

#[test]
fn operation_rejected_display() {
    let err = ContextError::OperationRejected {
        message: "session not found".into(),
        request_id: "req-1".into(),
    };
    assert_eq!(err.to_string(), "operation rejected: session not found (request req-1)");
}

#[test]
fn operation_timeout_display() {
    let err = ContextError::OperationTimeout {
        last_status: "PAUSING".into(),
        request_id: "req-7".into(),
        elapsed: Duration::from_millis(30_400),
    };
    assert_eq!(
        err.to_string(),
        "operation timed out after 30.4s, last status PAUSING (request req-7)"
    );
    assert!(err.is_timeout());
}

#[test]
fn partial_sync_failure_lists_failed_paths() {
    let err = ContextError::PartialSyncFailure {
        failures: vec![failure("/b", "disk full"), failure("/c", "denied")],
        total: 3,
        request_id: "req-2".into(),
    };
    assert_eq!(
        err.to_string(),
        "sync failed for 2 of 3 paths: /b (ctx-1): disk full; /c (ctx-1): denied (request req-2)"
    );
    assert_eq!(err.failures().len(), 2);
}

#[test]
fn sync_failed_display() {
    let err = ContextError::SyncFailed {
        failures: vec![failure("/a", "quota")],
        request_id: "req-3".into(),
    };
    assert_eq!(err.to_string(), "sync failed for every path: /a (ctx-1): quota (request req-3)");
}

#[test]
fn url_acquisition_display() {
    let err = ContextError::UrlAcquisitionFailed {
        message: "no access".into(),
        request_id: "req-4".into(),
    };
    assert_eq!(err.to_string(), "could not acquire presigned URL: no access (request req-4)");
}

#[test]
fn transfer_failed_display() {
    let err = ContextError::TransferFailed {
        status: 403,
        message: "forbidden".into(),
    };
    assert_eq!(err.to_string(), "transfer failed with HTTP 403: forbidden");
    assert_eq!(err.request_id(), None);
}

#[test]
fn authentication_missing_names_the_variable() {
    assert!(ContextError::AuthenticationMissing.to_string().contains("AGENTBAY_API_KEY"));
}

#[test]
fn api_error_display() {
    let err = ContextError::Api {
        code: "Throttling".into(),
        message: "slow down".into(),
        request_id: "req-5".into(),
    };
    assert_eq!(err.to_string(), "API call failed [Throttling]: slow down (request req-5)");
    assert_eq!(err.request_id(), Some("req-5"));
}

#[test]
fn not_found_display() {
    let err = ContextError::NotFound("context my-data".into());
    assert_eq!(err.to_string(), "not found: context my-data");
}

#[test]
fn config_error_display() {
    let err = ContextError::Config("endpoint is empty".into());
    assert_eq!(err.to_string(), "invalid configuration: endpoint is empty");
}

#[test]
fn empty_request_id_is_treated_as_absent() {
    let err = ContextError::Api {
        code: "500".into(),
        message: "unparseable".into(),
        request_id: String::new(),
    };
    assert_eq!(err.request_id(), None);
}

#[test]
fn failures_empty_for_other_kinds() {
    assert!(ContextError::AuthenticationMissing.failures().is_empty());
    assert!(!ContextError::AuthenticationMissing.is_timeout());
}

#[test]
fn from_serde_json_error() {
    let json_err = serde_json::from_str::<serde_json::Value>("not valid json").unwrap_err();
    let err: ContextError = json_err.into();
    assert!(err.to_string().contains("serialization error"));
}

#[test]
fn from_io_error() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.txt");
    let err: ContextError = io_err.into();
    assert_eq!(err.to_string(), "I/O error: missing.txt");
}
