//! Feedprobe activity model -- feed entries, parsing, ordering assertions.
//!
//! The server under test appends one activity per mutation and serves them
//! newest-first from the pooled-content feed endpoint. This crate knows the
//! wire shape of that feed and nothing about HTTP; fetching lives behind the
//! [`FeedSource`] trait so the verifier can poll anything that yields feeds.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wire property carrying the activity message on each feed entry.
pub const PARAM_ACTIVITY_MESSAGE: &str = "sakai:activityMessage";

/// Wire property carrying the authorizable that generated the activity.
pub const PARAM_ACTOR_ID: &str = "sakai:activity-actor";

/// Wire property carrying the application id.
pub const PARAM_APPLICATION_ID: &str = "sakai:activity-appid";

/// Feed endpoint for pooled-content activities, queried with `p=<path>`.
pub const POOLED_CONTENT_FEED_PATH: &str = "/var/search/activity/pooledcontent.tidy.json";

/// Content path for a pooled item, as the feed endpoint expects it.
pub fn pool_path(pool_id: &str) -> String {
    format!("/p/{pool_id}")
}

/// Semantic activity message attached to a feed entry.
///
/// The server defines more message kinds than the probe asserts on;
/// anything unrecognised is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityMessage {
    CreatedFile,
    UpdatedFile,
    CreatedComment,
    Other(String),
}

impl ActivityMessage {
    pub fn as_wire(&self) -> &str {
        match self {
            ActivityMessage::CreatedFile => "CREATED_FILE",
            ActivityMessage::UpdatedFile => "UPDATED_FILE",
            ActivityMessage::CreatedComment => "CREATED_COMMENT",
            ActivityMessage::Other(s) => s,
        }
    }

    pub fn from_wire(s: &str) -> Self {
        match s {
            "CREATED_FILE" => ActivityMessage::CreatedFile,
            "UPDATED_FILE" => ActivityMessage::UpdatedFile,
            "CREATED_COMMENT" => ActivityMessage::CreatedComment,
            other => ActivityMessage::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ActivityMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl Serialize for ActivityMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for ActivityMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ActivityMessage::from_wire(&s))
    }
}

/// One feed entry. Immutable once produced by the server.
///
/// Tidy JSON carries more properties than the probe asserts on; unknown
/// ones are preserved in `extra` so mismatch diagnostics can show the
/// entry as the server sent it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(rename = "sakai:activityMessage")]
    pub message: ActivityMessage,
    #[serde(
        rename = "sakai:activity-actor",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub actor: Option<String>,
    #[serde(
        rename = "sakai:activity-appid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub app_id: Option<String>,
    /// Server-side creation timestamp, epoch millis.
    #[serde(rename = "_created", default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ActivityEntry {
    /// Creation time as a UTC datetime, if the server sent `_created`.
    pub fn created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.created.and_then(chrono::DateTime::from_timestamp_millis)
    }

    pub fn new(message: ActivityMessage) -> Self {
        Self {
            message,
            actor: None,
            app_id: None,
            created: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Queryable feed view for one target path: a count plus entries ordered
/// most-recent-first. Eventually consistent; may run behind writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityFeed {
    pub total: u64,
    #[serde(default)]
    pub results: Vec<ActivityEntry>,
}

impl ActivityFeed {
    pub fn head(&self) -> Option<&ActivityEntry> {
        self.results.first()
    }

    /// Messages in feed order (newest first).
    pub fn messages(&self) -> Vec<&ActivityMessage> {
        self.results.iter().map(|e| &e.message).collect()
    }

    fn as_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "(unserialisable feed)".into())
    }

    /// Assert the feed holds exactly `expected` entries.
    pub fn expect_total(&self, expected: u64) -> Result<(), FeedMismatch> {
        if self.total == expected {
            Ok(())
        } else {
            Err(FeedMismatch::Total {
                expected,
                actual: self.total,
                feed: self.as_json(),
            })
        }
    }

    /// Assert the newest entry carries `expected`. Encodes the ordering
    /// invariant: the most recent activity is always `results[0]`.
    pub fn expect_head(&self, expected: &ActivityMessage) -> Result<(), FeedMismatch> {
        match self.head() {
            None => Err(FeedMismatch::Empty {
                expected: expected.clone(),
                feed: self.as_json(),
            }),
            Some(entry) if entry.message == *expected => Ok(()),
            Some(entry) => Err(FeedMismatch::Head {
                expected: expected.clone(),
                actual: entry.message.clone(),
                feed: self.as_json(),
            }),
        }
    }

    /// Assert the full reverse-chronological sequence of messages.
    pub fn expect_order(&self, expected: &[ActivityMessage]) -> Result<(), FeedMismatch> {
        let actual: Vec<&ActivityMessage> = self.messages();
        if actual.len() == expected.len() && actual.iter().zip(expected).all(|(a, e)| *a == e) {
            Ok(())
        } else {
            Err(FeedMismatch::Order {
                expected: expected.iter().map(|m| m.as_wire().to_string()).collect(),
                actual: actual.iter().map(|m| m.as_wire().to_string()).collect(),
                feed: self.as_json(),
            })
        }
    }
}

/// A feed whose content is present but semantically wrong. Each variant
/// carries the offending feed JSON for the failure report.
#[derive(Debug, thiserror::Error)]
pub enum FeedMismatch {
    #[error("feed total is {actual}, expected {expected}. feed: {feed}")]
    Total {
        expected: u64,
        actual: u64,
        feed: String,
    },
    #[error("feed head is {actual}, expected {expected}. feed: {feed}")]
    Head {
        expected: ActivityMessage,
        actual: ActivityMessage,
        feed: String,
    },
    #[error("feed is empty, expected head {expected}. feed: {feed}")]
    Empty {
        expected: ActivityMessage,
        feed: String,
    },
    #[error("feed order is {actual:?}, expected {expected:?}. feed: {feed}")]
    Order {
        expected: Vec<String>,
        actual: Vec<String>,
        feed: String,
    },
}

/// Error fetching or decoding a feed. Read-path only; mutation failures
/// are the session client's concern.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("feed transport error: {0}")]
    Transport(String),
    #[error("feed request returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("feed response was not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Anything that can produce the activity feed for a target path.
///
/// Implemented by the session client against a live server and by
/// scripted sources in verifier tests.
pub trait FeedSource {
    fn fetch_feed(
        &self,
        target: &str,
    ) -> impl Future<Output = Result<ActivityFeed, FeedError>> + Send;
}
