//! End-to-end scenario tests against the in-process stub server.

use std::time::Duration;

use feedprobe_activity::{pool_path, ActivityMessage};
use feedprobe_client::{SessionClient, User};
use feedprobe_runner::scenarios;
use feedprobe_verifier::{await_convergence, ConvergencePolicy, VerifyError};

use crate::harness::StubServer;

fn fast_policy() -> ConvergencePolicy {
    ConvergencePolicy::polling(Duration::from_millis(25), Duration::from_secs(5))
}

fn admin_client(server: &StubServer) -> SessionClient {
    SessionClient::new(&server.base_url(), User::admin()).unwrap()
}

#[tokio::test]
async fn test_content_activity_scenario() {
    let server = StubServer::start(Duration::from_millis(150)).await.unwrap();
    let mut client = admin_client(&server);

    scenarios::content_activity(&mut client, &fast_policy())
        .await
        .unwrap();

    server.shutdown().await;
}

#[tokio::test]
async fn test_content_update_and_comment_scenario() {
    let server = StubServer::start(Duration::from_millis(150)).await.unwrap();
    let mut client = admin_client(&server);

    scenarios::content_update_and_comment(&mut client, &fast_policy())
        .await
        .unwrap();

    server.shutdown().await;
}

/// Scenarios own their users and content, so they can run concurrently
/// against the same server without interfering.
#[tokio::test]
async fn test_scenarios_are_independent() {
    let server = StubServer::start(Duration::from_millis(100)).await.unwrap();
    let mut client_a = admin_client(&server);
    let mut client_b = admin_client(&server);

    let policy = fast_policy();
    let (a, b) = tokio::join!(
        scenarios::content_activity(&mut client_a, &policy),
        scenarios::content_update_and_comment(&mut client_b, &policy),
    );
    a.unwrap();
    b.unwrap();

    server.shutdown().await;
}

/// A comment's activity accrues under the comment's own id only; the
/// parent content feed must not grow.
#[tokio::test]
async fn test_comment_activity_stays_off_parent_feed() {
    let server = StubServer::start(Duration::from_millis(100)).await.unwrap();
    let client = admin_client(&server);

    let upload = client
        .upload_pooled_file("notes.txt", "Plain content", "text/plain", None)
        .await
        .unwrap();
    let path = pool_path(&upload.pool_id);

    let comment_id = client.create_comment(&path, "test1").await.unwrap();
    assert_eq!(server.comment_text(&comment_id).as_deref(), Some("test1"));
    let comment_path = pool_path(&comment_id);

    let comment_feed = await_convergence(&client, &comment_path, 1, &fast_policy())
        .await
        .unwrap();
    comment_feed
        .expect_head(&ActivityMessage::CreatedComment)
        .unwrap();

    let parent = await_convergence(&client, &path, 1, &fast_policy())
        .await
        .unwrap();
    parent.expect_head(&ActivityMessage::CreatedFile).unwrap();

    server.shutdown().await;
}

/// A failed mutation aborts the scenario immediately, and the failure
/// names the stage it died at.
#[tokio::test]
async fn test_mutation_failure_aborts_at_named_stage() {
    let server = StubServer::start(Duration::from_millis(50)).await.unwrap();
    let mut client =
        SessionClient::new(&server.base_url(), User::new("nobody", "wrong")).unwrap();

    let err = scenarios::content_activity(&mut client, &fast_policy())
        .await
        .unwrap_err();
    // First mutation (user create) fails before any stage is reached.
    assert_eq!(err.stage, "init");
    assert!(matches!(err.source, VerifyError::Mutation(_)), "got: {err}");

    server.shutdown().await;
}

#[tokio::test]
async fn test_metadata_write_and_readback() {
    let server = StubServer::start(Duration::from_millis(50)).await.unwrap();
    let client = admin_client(&server);

    let upload = client
        .upload_pooled_file("meta.txt", "Plain content", "text/plain", None)
        .await
        .unwrap();
    let path = pool_path(&upload.pool_id);

    client
        .set_metadata(&path, &[("testing", "testvalue")])
        .await
        .unwrap();
    let meta = client.read_metadata(&path).await.unwrap();
    assert_eq!(
        meta.get("testing").and_then(|v| v.as_str()),
        Some("testvalue")
    );
    assert_eq!(
        meta.get("sakai:pooled-content-file-name")
            .and_then(|v| v.as_str()),
        Some("meta.txt")
    );

    server.shutdown().await;
}

/// Updating a pool id that does not exist is a hard failure, not a
/// silent create.
#[tokio::test]
async fn test_update_unknown_pool_id_is_fatal() {
    let server = StubServer::start(Duration::from_millis(50)).await.unwrap();
    let client = admin_client(&server);

    let err = client
        .upload_pooled_file("ghost.txt", "Plain content", "text/plain", Some("pool-999999"))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            feedprobe_client::ClientError::UnexpectedStatus { status: 404, .. }
        ),
        "got: {err}"
    );

    server.shutdown().await;
}

/// The feed endpoint honours the `items` page-size parameter while still
/// reporting the full total.
#[tokio::test]
async fn test_feed_items_parameter_limits_results() {
    let server = StubServer::start(Duration::ZERO).await.unwrap();
    let client = admin_client(&server);

    let upload = client
        .upload_pooled_file("paged.txt", "Plain content", "text/plain", None)
        .await
        .unwrap();
    client
        .upload_pooled_file("paged.txt", "More content", "text/plain", Some(&upload.pool_id))
        .await
        .unwrap();
    let path = pool_path(&upload.pool_id);

    let feed = client.activity_feed(&path, Some(1)).await.unwrap();
    assert_eq!(feed.total, 2);
    assert_eq!(feed.results.len(), 1);
    assert_eq!(feed.results[0].message, ActivityMessage::UpdatedFile);

    server.shutdown().await;
}
