//! The black-box scenarios feedprobe runs against a content server.
//!
//! Every scenario creates its own user and content item, so concurrently
//! running scenarios share no mutable state. Mutations go through the
//! session client and are never retried; every feed read that depends on
//! the indexer sits behind the convergence wait.

use feedprobe_activity::{pool_path, ActivityMessage, FeedSource};
use feedprobe_client::{uniqueness, SessionClient, User};
use feedprobe_verifier::{
    await_convergence, confirm_stable, ConvergencePolicy, Scenario, ScenarioFailure, Stage,
    VerifyError,
};

/// Scenario names, in run order.
pub const SCENARIOS: &[&str] = &["content-activity", "content-update-and-comment"];

/// Metadata property written to every provisioned item.
const TEST_PROPERTY: (&str, &str) = ("testing", "testvalue");

/// Create a manager user, upload a fresh pooled file as admin, then write
/// and read back a metadata property. Returns the new item's pool id.
async fn provision_content(
    sc: &mut Scenario,
    client: &mut SessionClient,
    marker: &str,
) -> Result<String, ScenarioFailure> {
    client
        .create_user(&format!("user-manager-{marker}"), "testuser")
        .await
        .map_err(|e| sc.failure(e.into()))?;
    client.switch_user(User::admin());

    let upload = client
        .upload_pooled_file(
            &format!("random-{marker}.txt"),
            "Plain content",
            "text/plain",
            None,
        )
        .await
        .map_err(|e| sc.failure(e.into()))?;
    sc.advance(Stage::Uploaded);

    let path = pool_path(&upload.pool_id);
    let (key, value) = TEST_PROPERTY;
    client
        .set_metadata(&path, &[(key, value)])
        .await
        .map_err(|e| sc.failure(e.into()))?;
    let meta = client
        .read_metadata(&path)
        .await
        .map_err(|e| sc.failure(e.into()))?;
    let actual = meta.get(key).and_then(|v| v.as_str()).unwrap_or("");
    if actual != value {
        return Err(sc.failure(VerifyError::MetadataMismatch {
            path,
            key: key.into(),
            expected: value.into(),
            actual: actual.into(),
        }));
    }
    sc.advance(Stage::MetadataWritten);

    Ok(upload.pool_id)
}

/// Upload one pooled file and verify the feed converges to a single
/// CREATED_FILE entry, then stays put on repeated reads.
pub async fn content_activity(
    client: &mut SessionClient,
    policy: &ConvergencePolicy,
) -> Result<(), ScenarioFailure> {
    let mut sc = Scenario::new("content-activity");
    let marker = uniqueness();

    let pool_id = provision_content(&mut sc, client, &marker).await?;
    let path = pool_path(&pool_id);

    let feed = await_convergence(client, &path, 1, policy)
        .await
        .map_err(|e| sc.failure(e))?;
    feed.expect_head(&ActivityMessage::CreatedFile)
        .map_err(|e| sc.failure(e.into()))?;
    sc.advance(Stage::IndexConverged(1));

    // A converged feed must not grow on repeated reads.
    confirm_stable(client, &path, &feed, 3)
        .await
        .map_err(|e| sc.failure(e))?;

    sc.advance(Stage::Done);
    tracing::info!(scenario = sc.name(), pool_id, "scenario complete");
    Ok(())
}

/// The full lifecycle: create, update in place, then comment. The content
/// feed must grow newest-first, and the comment's activity must accrue
/// under the comment's own id without leaking into the parent's feed.
pub async fn content_update_and_comment(
    client: &mut SessionClient,
    policy: &ConvergencePolicy,
) -> Result<(), ScenarioFailure> {
    let mut sc = Scenario::new("content-update-and-comment");
    let marker = uniqueness();

    let pool_id = provision_content(&mut sc, client, &marker).await?;
    let path = pool_path(&pool_id);

    let feed = await_convergence(client, &path, 1, policy)
        .await
        .map_err(|e| sc.failure(e))?;
    feed.expect_head(&ActivityMessage::CreatedFile)
        .map_err(|e| sc.failure(e.into()))?;
    sc.advance(Stage::IndexConverged(1));

    // Re-upload against the same pool id: an in-place update.
    client
        .upload_pooled_file(
            &format!("random-{marker}.txt"),
            "Plain content",
            "text/plain",
            Some(&pool_id),
        )
        .await
        .map_err(|e| sc.failure(e.into()))?;
    sc.advance(Stage::Updated);

    let feed = await_convergence(client, &path, 2, policy)
        .await
        .map_err(|e| sc.failure(e))?;
    feed.expect_order(&[ActivityMessage::UpdatedFile, ActivityMessage::CreatedFile])
        .map_err(|e| sc.failure(e.into()))?;
    sc.advance(Stage::IndexConverged(2));

    let comment_id = client
        .create_comment(&path, "test1")
        .await
        .map_err(|e| sc.failure(e.into()))?;
    sc.advance(Stage::Commented);

    let comment_path = pool_path(&comment_id);
    let comment_feed = await_convergence(client, &comment_path, 1, policy)
        .await
        .map_err(|e| sc.failure(e))?;
    comment_feed
        .expect_head(&ActivityMessage::CreatedComment)
        .map_err(|e| sc.failure(e.into()))?;

    // The comment's activity must not have leaked into the parent's feed.
    let parent = client
        .fetch_feed(&path)
        .await
        .map_err(|e| sc.failure(e.into()))?;
    parent.expect_total(2).map_err(|e| sc.failure(e.into()))?;
    sc.advance(Stage::CommentFeedConverged);

    sc.advance(Stage::Done);
    tracing::info!(scenario = sc.name(), pool_id, comment_id, "scenario complete");
    Ok(())
}
