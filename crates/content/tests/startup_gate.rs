use peerdex_content::{ensure_available, ContentError, StubContentService};
use std::time::Duration;

const WAIT: Duration = Duration::from_millis(50);
const POLL: Duration = Duration::from_millis(10);

#[tokio::test]
async fn running_daemon_is_left_alone() {
    let stub = StubContentService::new();
    ensure_available(&stub, WAIT, POLL).await.expect("available");
    assert_eq!(stub.calls(), vec!["id"]);
}

#[tokio::test]
async fn missing_binary_is_fatal() {
    let stub = StubContentService::new().with_installed(false);
    let err = ensure_available(&stub, WAIT, POLL).await.unwrap_err();
    assert!(matches!(err, ContentError::NotInstalled));
    assert!(err.is_service_unavailable());
    assert!(stub.calls().is_empty());
}

#[tokio::test]
async fn stopped_daemon_is_started() {
    let stub = StubContentService::new().with_stopped_daemon(true);
    ensure_available(&stub, WAIT, POLL).await.expect("started");
    assert!(stub.is_daemon_running());
    assert_eq!(stub.calls(), vec!["id", "daemon --init"]);
}

#[tokio::test]
async fn daemon_that_never_answers_is_fatal() {
    let stub = StubContentService::new().with_stopped_daemon(false);
    let err = ensure_available(&stub, WAIT, POLL).await.unwrap_err();
    assert!(matches!(err, ContentError::DaemonStartup(wait) if wait == WAIT));
    assert!(err.is_service_unavailable());
}
