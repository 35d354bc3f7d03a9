//! Integration tests for the Fabric client against a mock HTTP server.

use std::time::Duration;

use assert_matches::assert_matches;
use branchout_core::config::SyncSettings;
use branchout_core::operation::OperationStatus;
use branchout_core::secret::Secret;
use branchout_fabric::connections::ConnectionOutcome;
use branchout_fabric::git::{GitBranchTarget, SyncOutcome, SyncStage};
use branchout_fabric::lro::{OperationHandle, PollOutcome};
use branchout_fabric::{FabricClient, FabricError};
use mockito::{Matcher, Server};
use serde_json::json;
use tokio_util::sync::CancellationToken;

const TOKEN: &str = "fabric-token";
const CONNECTION_NAME: &str = "GitHub PAT - contoso/analytics";

fn client(server: &Server) -> FabricClient {
    FabricClient::new(server.url(), server.url(), Secret::new(TOKEN))
}

fn fast_sync() -> SyncSettings {
    SyncSettings {
        initial_delay: Duration::from_millis(5),
        poll_interval: Duration::from_millis(5),
        timeout: Duration::from_secs(5),
    }
}

fn handle(server: &Server, path: &str) -> OperationHandle {
    OperationHandle {
        location: format!("{}{}", server.url(), path),
        retry_after: Duration::from_millis(5),
    }
}

// ---------------------------------------------------------------------------
// Workspaces
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_workspace_returns_id() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/workspaces")
        .match_header("authorization", format!("Bearer {TOKEN}").as_str())
        .match_body(Matcher::Json(json!({
            "displayName": "Sales Dev",
            "capacityId": "cap-1",
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "ws-1", "displayName": "Sales Dev"}"#)
        .expect(1)
        .create_async()
        .await;

    let id = client(&server)
        .create_workspace("Sales Dev", "cap-1")
        .await
        .unwrap();

    assert_eq!(id, "ws-1");
    mock.assert_async().await;
}

#[tokio::test]
async fn second_create_with_same_name_is_a_conflict() {
    let mut server = Server::new_async().await;
    let created = server
        .mock("POST", "/workspaces")
        .with_status(201)
        .with_body(r#"{"id": "ws-1"}"#)
        .expect(1)
        .create_async()
        .await;
    let conflict = server
        .mock("POST", "/workspaces")
        .with_status(409)
        .with_body(r#"{"errorCode": "WorkspaceNameAlreadyExists"}"#)
        .expect(1)
        .create_async()
        .await;

    let fabric = client(&server);
    fabric.create_workspace("Sales Dev", "cap-1").await.unwrap();
    let err = fabric
        .create_workspace("Sales Dev", "cap-1")
        .await
        .unwrap_err();

    assert_matches!(err, FabricError::WorkspaceExists(name) if name == "Sales Dev");
    created.assert_async().await;
    conflict.assert_async().await;
}

#[tokio::test]
async fn create_workspace_server_error_is_not_created() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/workspaces")
        .with_status(403)
        .with_body("InsufficientPrivileges")
        .create_async()
        .await;

    let err = client(&server)
        .create_workspace("Sales Dev", "cap-1")
        .await
        .unwrap_err();

    assert_matches!(err, FabricError::ApiError { status: 403, body } if body == "InsufficientPrivileges");
}

#[tokio::test]
async fn add_admin_posts_to_admin_api() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/admin/groups/ws-1/users")
        .match_body(Matcher::Json(json!({
            "emailAddress": "dev@contoso.com",
            "groupUserAccessRight": "Admin",
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    client(&server)
        .add_workspace_admin("ws-1", "dev@contoso.com")
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn add_admin_failure_is_reported() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/admin/groups/ws-1/users")
        .with_status(401)
        .create_async()
        .await;

    let err = client(&server)
        .add_workspace_admin("ws-1", "dev@contoso.com")
        .await
        .unwrap_err();
    assert_matches!(err, FabricError::ApiError { status: 401, .. });
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wrapped_listing_reuses_existing_connection() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/connections")
        .with_status(200)
        .with_body(
            json!({
                "value": [
                    {"id": "c-other", "displayName": "Something else"},
                    {"id": "c-1", "displayName": CONNECTION_NAME},
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;
    let create = server
        .mock("POST", "/connections")
        .expect(0)
        .create_async()
        .await;

    let outcome = client(&server)
        .get_or_create_connection(CONNECTION_NAME, &Secret::new("ghp_x"))
        .await
        .unwrap();

    assert_eq!(outcome, ConnectionOutcome::Reused("c-1".into()));
    create.assert_async().await;
}

#[tokio::test]
async fn bare_listing_reuses_existing_connection() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/connections")
        .with_status(200)
        .with_body(json!([{"id": "c-9", "displayName": CONNECTION_NAME}]).to_string())
        .create_async()
        .await;

    let outcome = client(&server)
        .get_or_create_connection(CONNECTION_NAME, &Secret::new("ghp_x"))
        .await
        .unwrap();

    assert_eq!(outcome.id(), "c-9");
}

#[tokio::test]
async fn missing_connection_is_created_with_key_credential() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/connections")
        .with_status(200)
        .with_body(r#"{"value": []}"#)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/connections")
        .match_body(Matcher::PartialJson(json!({
            "connectivityType": "ShareableCloud",
            "displayName": CONNECTION_NAME,
            "connectionDetails": {"type": "GitHubSourceControl"},
            "credentialDetails": {"credentials": {"credentialType": "Key", "key": "ghp_x"}},
        })))
        .with_status(201)
        .with_body(r#"{"id": "c-new"}"#)
        .expect(1)
        .create_async()
        .await;

    let outcome = client(&server)
        .get_or_create_connection(CONNECTION_NAME, &Secret::new("ghp_x"))
        .await
        .unwrap();

    assert_eq!(outcome, ConnectionOutcome::Created("c-new".into()));
    create.assert_async().await;
}

#[tokio::test]
async fn resolving_twice_creates_only_once() {
    let mut server = Server::new_async().await;
    let empty_listing = server
        .mock("GET", "/connections")
        .with_status(200)
        .with_body(r#"{"value": []}"#)
        .expect(1)
        .create_async()
        .await;
    let listing_after_create = server
        .mock("GET", "/connections")
        .with_status(200)
        .with_body(json!({"value": [{"id": "c-new", "displayName": CONNECTION_NAME}]}).to_string())
        .expect(1)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/connections")
        .with_status(201)
        .with_body(r#"{"id": "c-new"}"#)
        .expect(1)
        .create_async()
        .await;

    let fabric = client(&server);
    let secret = Secret::new("ghp_x");
    let first = fabric
        .get_or_create_connection(CONNECTION_NAME, &secret)
        .await
        .unwrap();
    let second = fabric
        .get_or_create_connection(CONNECTION_NAME, &secret)
        .await
        .unwrap();

    assert_eq!(first.id(), second.id());
    assert_matches!(second, ConnectionOutcome::Reused(_));
    empty_listing.assert_async().await;
    listing_after_create.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn listing_follows_continuation_uri() {
    let mut server = Server::new_async().await;
    let next = format!("{}/connections-page-2", server.url());
    server
        .mock("GET", "/connections")
        .with_status(200)
        .with_body(json!({"value": [{"id": "c-1", "displayName": "a"}], "continuationUri": next}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/connections-page-2")
        .with_status(200)
        .with_body(json!({"value": [{"id": "c-2", "displayName": "b"}]}).to_string())
        .create_async()
        .await;

    let connections = client(&server).list_connections().await.unwrap();
    let ids: Vec<_> = connections.iter().filter_map(|c| c.id.as_deref()).collect();
    assert_eq!(ids, vec!["c-1", "c-2"]);
}

#[tokio::test]
async fn empty_secret_fails_without_requests() {
    let mut server = Server::new_async().await;
    let listing = server
        .mock("GET", "/connections")
        .expect(0)
        .create_async()
        .await;

    let err = client(&server)
        .get_or_create_connection(CONNECTION_NAME, &Secret::new(""))
        .await
        .unwrap_err();

    assert_matches!(err, FabricError::MissingSecret);
    listing.assert_async().await;
}

#[tokio::test]
async fn failed_creation_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/connections")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    server
        .mock("POST", "/connections")
        .with_status(400)
        .with_body("bad credential")
        .create_async()
        .await;

    let err = client(&server)
        .get_or_create_connection(CONNECTION_NAME, &Secret::new("ghp_x"))
        .await
        .unwrap_err();
    assert_matches!(err, FabricError::ApiError { status: 400, .. });
}

// ---------------------------------------------------------------------------
// Git connect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_sends_normalized_directory() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/workspaces/ws-1/git/connect")
        .match_body(Matcher::Json(json!({
            "gitProviderDetails": {
                "ownerName": "contoso",
                "gitProviderType": "GitHub",
                "repositoryName": "analytics",
                "branchName": "feature/sales",
                "directoryName": "fabric/items",
            },
            "myGitCredentials": {
                "source": "ConfiguredConnection",
                "connectionId": "c-1",
            },
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let target = GitBranchTarget {
        owner: "contoso",
        repo: "analytics",
        branch: "feature/sales",
        folder: "fabric/items/",
    };
    client(&server)
        .connect_branch("ws-1", target, "c-1")
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn connect_failure_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/workspaces/ws-1/git/connect")
        .with_status(400)
        .with_body("WorkspaceAlreadyConnectedToGit")
        .create_async()
        .await;

    let target = GitBranchTarget {
        owner: "contoso",
        repo: "analytics",
        branch: "feature/sales",
        folder: "/",
    };
    let err = client(&server)
        .connect_branch("ws-1", target, "c-1")
        .await
        .unwrap_err();
    assert_matches!(err, FabricError::ApiError { status: 400, .. });
}

// ---------------------------------------------------------------------------
// Long running operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn poll_stops_after_three_fetches_on_success() {
    let mut server = Server::new_async().await;
    let running = server
        .mock("GET", "/operations/op-1")
        .match_header("authorization", format!("Bearer {TOKEN}").as_str())
        .with_status(200)
        .with_body(r#"{"status": "Running", "percentComplete": 40}"#)
        .expect(2)
        .create_async()
        .await;
    let succeeded = server
        .mock("GET", "/operations/op-1")
        .with_status(200)
        .with_body(r#"{"status": "Succeeded", "percentComplete": 100}"#)
        .expect(1)
        .create_async()
        .await;

    let outcome = client(&server)
        .poll_operation(
            &handle(&server, "/operations/op-1"),
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome, PollOutcome::Completed(OperationStatus::Succeeded));
    running.assert_async().await;
    succeeded.assert_async().await;
}

#[tokio::test]
async fn poll_reports_failure_payload_without_raising() {
    let mut server = Server::new_async().await;
    let running = server
        .mock("GET", "/operations/op-2")
        .with_status(200)
        .with_body(r#"{"status": "Running"}"#)
        .expect(1)
        .create_async()
        .await;
    let failed = server
        .mock("GET", "/operations/op-2")
        .with_status(200)
        .with_body(r#"{"status": "Failed", "error": {"errorCode": "GitSyncFailed", "message": "conflict"}}"#)
        .expect(1)
        .create_async()
        .await;

    let outcome = client(&server)
        .poll_operation(
            &handle(&server, "/operations/op-2"),
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await;

    assert_matches!(outcome, PollOutcome::Failed { error } if error["errorCode"] == "GitSyncFailed");
    running.assert_async().await;
    failed.assert_async().await;
}

#[tokio::test]
async fn poll_keeps_going_after_a_failed_fetch() {
    let mut server = Server::new_async().await;
    let unavailable = server
        .mock("GET", "/operations/op-3")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    let succeeded = server
        .mock("GET", "/operations/op-3")
        .with_status(200)
        .with_body(r#"{"status": "Succeeded"}"#)
        .expect(1)
        .create_async()
        .await;

    let outcome = client(&server)
        .poll_operation(
            &handle(&server, "/operations/op-3"),
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome, PollOutcome::Completed(OperationStatus::Succeeded));
    unavailable.assert_async().await;
    succeeded.assert_async().await;
}

#[tokio::test]
async fn poll_times_out_when_operation_never_finishes() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/operations/op-4")
        .with_status(200)
        .with_body(r#"{"status": "Running"}"#)
        .expect_at_least(1)
        .create_async()
        .await;

    let outcome = client(&server)
        .poll_operation(
            &handle(&server, "/operations/op-4"),
            Duration::from_millis(50),
            &CancellationToken::new(),
        )
        .await;

    assert_matches!(outcome, PollOutcome::TimedOut { attempts } if attempts >= 1);
}

#[tokio::test]
async fn poll_accepts_timeout_beyond_instant_range() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/operations/op-5")
        .with_status(200)
        .with_body(r#"{"status": "Succeeded"}"#)
        .create_async()
        .await;

    let outcome = client(&server)
        .poll_operation(
            &handle(&server, "/operations/op-5"),
            Duration::from_secs(u64::MAX),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome, PollOutcome::Completed(OperationStatus::Succeeded));
}

/// A status URL whose server accepts connections but never answers.
async fn silent_handle() -> (tokio::net::TcpListener, OperationHandle) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = OperationHandle {
        location: format!("http://{addr}/operations/op-hung"),
        retry_after: Duration::from_millis(5),
    };
    (listener, handle)
}

#[tokio::test]
async fn cancel_interrupts_a_hung_status_request() {
    let (_listener, handle) = silent_handle().await;
    let fabric = FabricClient::new("http://unused", "http://unused", Secret::new(TOKEN));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        fabric.poll_operation(&handle, Duration::from_secs(600), &cancel),
    )
    .await
    .expect("poll should stop when cancelled");

    assert_eq!(outcome, PollOutcome::Cancelled);
}

#[tokio::test]
async fn deadline_interrupts_a_hung_status_request() {
    let (_listener, handle) = silent_handle().await;
    let fabric = FabricClient::new("http://unused", "http://unused", Secret::new(TOKEN));

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        fabric.poll_operation(&handle, Duration::from_millis(50), &CancellationToken::new()),
    )
    .await
    .expect("poll should stop at the deadline");

    assert_eq!(outcome, PollOutcome::TimedOut { attempts: 1 });
}

// ---------------------------------------------------------------------------
// Git initialize / update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn synchronous_update_is_complete() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/workspaces/ws-1/git/initializeConnection")
        .with_status(200)
        .with_body(r#"{"requiredAction": "UpdateFromGit", "workspaceHead": null, "remoteCommitHash": "abc123"}"#)
        .create_async()
        .await;
    let update = server
        .mock("POST", "/workspaces/ws-1/git/updateFromGit")
        .match_body(Matcher::PartialJson(json!({
            "remoteCommitHash": "abc123",
            "options": {"allowOverrideItems": true, "conflictResolution": "RemoteSync"},
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let outcome = client(&server)
        .initialize_from_git("ws-1", &fast_sync(), &CancellationToken::new())
        .await;

    assert_eq!(outcome, SyncOutcome::Updated);
    update.assert_async().await;
}

#[tokio::test]
async fn accepted_update_is_polled_to_completion() {
    let mut server = Server::new_async().await;
    let location = format!("{}/operations/op-sync", server.url());
    server
        .mock("POST", "/workspaces/ws-1/git/initializeConnection")
        .with_status(200)
        .with_body(r#"{"requiredAction": "UpdateFromGit", "remoteCommitHash": "abc123"}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/workspaces/ws-1/git/updateFromGit")
        .with_status(202)
        .with_header("location", &location)
        .create_async()
        .await;
    let status = server
        .mock("GET", "/operations/op-sync")
        .with_status(200)
        .with_body(r#"{"status": "Succeeded"}"#)
        .expect(1)
        .create_async()
        .await;

    let outcome = client(&server)
        .initialize_from_git("ws-1", &fast_sync(), &CancellationToken::new())
        .await;

    assert_eq!(
        outcome,
        SyncOutcome::Polled(PollOutcome::Completed(OperationStatus::Succeeded))
    );
    status.assert_async().await;
}

#[tokio::test]
async fn accepted_initialization_is_pending() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/workspaces/ws-1/git/initializeConnection")
        .with_status(202)
        .create_async()
        .await;
    let update = server
        .mock("POST", "/workspaces/ws-1/git/updateFromGit")
        .expect(0)
        .create_async()
        .await;

    let outcome = client(&server)
        .initialize_from_git("ws-1", &fast_sync(), &CancellationToken::new())
        .await;

    assert_eq!(outcome, SyncOutcome::InitializationPending);
    assert!(outcome.is_in_progress());
    update.assert_async().await;
}

#[tokio::test]
async fn nothing_to_update_skips_update_call() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/workspaces/ws-1/git/initializeConnection")
        .with_status(200)
        .with_body(r#"{"requiredAction": "None"}"#)
        .create_async()
        .await;
    let update = server
        .mock("POST", "/workspaces/ws-1/git/updateFromGit")
        .expect(0)
        .create_async()
        .await;

    let outcome = client(&server)
        .initialize_from_git("ws-1", &fast_sync(), &CancellationToken::new())
        .await;

    assert_eq!(outcome, SyncOutcome::UpToDate);
    update.assert_async().await;
}

#[tokio::test]
async fn unexpected_update_status_is_rejected_not_raised() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/workspaces/ws-1/git/initializeConnection")
        .with_status(200)
        .with_body(r#"{"requiredAction": "UpdateFromGit", "remoteCommitHash": "abc123"}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/workspaces/ws-1/git/updateFromGit")
        .with_status(409)
        .with_body("conflict")
        .create_async()
        .await;

    let outcome = client(&server)
        .initialize_from_git("ws-1", &fast_sync(), &CancellationToken::new())
        .await;

    assert_matches!(
        outcome,
        SyncOutcome::Rejected { stage: SyncStage::Update, status: 409, .. }
    );
}

#[tokio::test]
async fn update_without_content_counts_as_updated() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/workspaces/ws-1/git/initializeConnection")
        .with_status(200)
        .with_body(r#"{"requiredAction": "UpdateFromGit", "remoteCommitHash": "abc123"}"#)
        .create_async()
        .await;
    let update = server
        .mock("POST", "/workspaces/ws-1/git/updateFromGit")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let outcome = client(&server)
        .initialize_from_git("ws-1", &fast_sync(), &CancellationToken::new())
        .await;

    assert_eq!(outcome, SyncOutcome::Updated);
    update.assert_async().await;
}

#[tokio::test]
async fn transport_failure_is_captured() {
    // Nothing listens on port 9 (discard), so the request fails to connect.
    let fabric = FabricClient::new("http://127.0.0.1:9", "http://127.0.0.1:9", Secret::new(TOKEN));

    let outcome = fabric
        .initialize_from_git("ws-1", &fast_sync(), &CancellationToken::new())
        .await;

    assert_matches!(outcome, SyncOutcome::Failed(_));
}
