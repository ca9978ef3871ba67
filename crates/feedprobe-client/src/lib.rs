//! Feedprobe client -- authenticated HTTP sessions against a Sling-style
//! content server.
//!
//! Credentials ride on every request (basic auth); there is no server-side
//! session to manage. Mutating calls treat any unexpected status as fatal.
//! Nothing here retries: convergence polling on the read path belongs to
//! feedprobe-verifier.

use std::future::Future;
use std::time::Duration;

use feedprobe_activity::{ActivityFeed, FeedError, FeedSource, POOLED_CONTENT_FEED_PATH};

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoint for creating users through the user manager.
const USER_CREATE_PATH: &str = "/system/userManager/user.create.html";

/// Endpoint for creating (and, with an id selector, updating) pooled content.
const POOL_CREATE_PATH: &str = "/system/pool/createfile";

/// A server account the client can act as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub password: String,
}

impl User {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
        }
    }

    /// The server's built-in administrator.
    pub fn admin() -> Self {
        Self::new("admin", "admin")
    }
}

/// Raw response from a generic GET/POST: status code plus body text.
#[derive(Debug, Clone)]
pub struct SlingResponse {
    pub status: u16,
    pub body: String,
}

impl SlingResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<serde_json::Value, ClientError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Result of a pooled-content upload. `status` distinguishes create (201)
/// from update (200); `pool_id` addresses the item from then on.
#[derive(Debug, Clone)]
pub struct PooledUpload {
    pub pool_id: String,
    pub status: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{context} returned {status}: {body}")]
    UnexpectedStatus {
        context: &'static str,
        status: u16,
        body: String,
    },
    #[error("{context} response missing '{field}': {body}")]
    MissingField {
        context: &'static str,
        field: &'static str,
        body: String,
    },
    #[error("response was not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Unique suffix for user and file names so concurrent scenarios never
/// collide on server-side resources.
pub fn uniqueness() -> String {
    format!("{:08x}", rand::random::<u32>())
}

/// An authenticated HTTP session against one server.
///
/// One client per scenario; clients are not shared across concurrently
/// running scenarios.
#[derive(Debug, Clone)]
pub struct SessionClient {
    base_url: String,
    http: reqwest::Client,
    user: User,
}

impl SessionClient {
    pub fn new(base_url: &str, user: User) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, user, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        user: User,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            user,
        })
    }

    /// Act as a different user from the next request on.
    pub fn switch_user(&mut self, user: User) {
        tracing::debug!(from = %self.user.name, to = %user.name, "switching user");
        self.user = user;
    }

    pub fn current_user(&self) -> &User {
        &self.user
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` with query parameters. Status is returned, not enforced.
    pub async fn execute_get(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<SlingResponse, ClientError> {
        let resp = self
            .http
            .get(self.url_for(path))
            .basic_auth(&self.user.name, Some(&self.user.password))
            .query(params)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        tracing::debug!(path, status, "GET");
        Ok(SlingResponse { status, body })
    }

    /// POST `path` with form fields. Status is returned, not enforced.
    pub async fn execute_post(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<SlingResponse, ClientError> {
        let resp = self
            .http
            .post(self.url_for(path))
            .basic_auth(&self.user.name, Some(&self.user.password))
            .form(form)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        tracing::debug!(path, status, "POST");
        Ok(SlingResponse { status, body })
    }

    /// Confirm the current credentials against the server. Returns the
    /// server's idea of who we are.
    pub async fn whoami(&self) -> Result<String, ClientError> {
        let resp = self.execute_get("/system/me", &[]).await?;
        if !resp.is_success() {
            return Err(ClientError::UnexpectedStatus {
                context: "whoami",
                status: resp.status,
                body: resp.body,
            });
        }
        let v = resp.json()?;
        v.get("userid")
            .and_then(|u| u.as_str())
            .map(str::to_string)
            .ok_or(ClientError::MissingField {
                context: "whoami",
                field: "userid",
                body: resp.body,
            })
    }

    /// Create a user through the user manager. The acting user must be
    /// allowed to do so (typically admin).
    pub async fn create_user(&self, name: &str, password: &str) -> Result<User, ClientError> {
        let resp = self
            .execute_post(
                USER_CREATE_PATH,
                &[(":name", name), ("pwd", password), ("pwdConfirm", password)],
            )
            .await?;
        if !resp.is_success() {
            return Err(ClientError::UnexpectedStatus {
                context: "user create",
                status: resp.status,
                body: resp.body,
            });
        }
        tracing::info!(user = name, "created user");
        Ok(User::new(name, password))
    }

    /// Upload pooled content. Without `existing` this creates a new item
    /// (server replies 201 with a fresh pool id); with `existing` it
    /// updates that item in place (server replies 200).
    pub async fn upload_pooled_file(
        &self,
        name: &str,
        content: &str,
        media_type: &str,
        existing: Option<&str>,
    ) -> Result<PooledUpload, ClientError> {
        let path = match existing {
            None => POOL_CREATE_PATH.to_string(),
            Some(id) => format!("{POOL_CREATE_PATH}.{id}"),
        };
        let part = reqwest::multipart::Part::text(content.to_string())
            .file_name(name.to_string())
            .mime_str(media_type)?;
        let form = reqwest::multipart::Form::new().part(name.to_string(), part);

        let resp = self
            .http
            .post(self.url_for(&path))
            .basic_auth(&self.user.name, Some(&self.user.password))
            .multipart(form)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;

        let expected = if existing.is_none() { 201 } else { 200 };
        if status != expected {
            return Err(ClientError::UnexpectedStatus {
                context: "pooled upload",
                status,
                body,
            });
        }

        let pool_id = match existing {
            Some(id) => id.to_string(),
            None => parse_pool_id(&body, name)?,
        };
        tracing::info!(file = name, pool_id, status, "pooled content uploaded");
        Ok(PooledUpload { pool_id, status })
    }

    /// Write metadata properties on a pooled item via its `.html` selector.
    pub async fn set_metadata(
        &self,
        pool_path: &str,
        props: &[(&str, &str)],
    ) -> Result<(), ClientError> {
        let resp = self
            .execute_post(&format!("{pool_path}.html"), props)
            .await?;
        if resp.status != 200 {
            return Err(ClientError::UnexpectedStatus {
                context: "metadata write",
                status: resp.status,
                body: resp.body,
            });
        }
        tracing::info!(path = pool_path, props = props.len(), "metadata written");
        Ok(())
    }

    /// Read a pooled item's metadata back as tidy JSON.
    pub async fn read_metadata(&self, pool_path: &str) -> Result<serde_json::Value, ClientError> {
        let resp = self
            .execute_get(&format!("{pool_path}.tidy.json"), &[])
            .await?;
        if resp.status != 200 {
            return Err(ClientError::UnexpectedStatus {
                context: "metadata read",
                status: resp.status,
                body: resp.body,
            });
        }
        resp.json()
    }

    /// Post a comment under a pooled item. Returns the comment id; the
    /// comment's activity accrues under that id, not the parent's.
    pub async fn create_comment(
        &self,
        pool_path: &str,
        comment: &str,
    ) -> Result<String, ClientError> {
        let resp = self
            .execute_post(&format!("{pool_path}.comments"), &[("comment", comment)])
            .await?;
        if resp.status != 201 {
            return Err(ClientError::UnexpectedStatus {
                context: "comment create",
                status: resp.status,
                body: resp.body,
            });
        }
        let v = resp.json()?;
        let comment_id = v
            .get("commentId")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or(ClientError::MissingField {
                context: "comment create",
                field: "commentId",
                body: resp.body.clone(),
            })?;
        tracing::info!(path = pool_path, comment_id, "comment created");
        Ok(comment_id)
    }

    /// Fetch the pooled-content activity feed for a target path, optionally
    /// capping the page size with the `items` parameter.
    pub async fn activity_feed(
        &self,
        target: &str,
        items: Option<u32>,
    ) -> Result<ActivityFeed, ClientError> {
        let items_str;
        let mut params: Vec<(&str, &str)> = vec![("p", target)];
        if let Some(n) = items {
            items_str = n.to_string();
            params.push(("items", &items_str));
        }
        let resp = self.execute_get(POOLED_CONTENT_FEED_PATH, &params).await?;
        if resp.status != 200 {
            return Err(ClientError::UnexpectedStatus {
                context: "activity feed",
                status: resp.status,
                body: resp.body,
            });
        }
        Ok(serde_json::from_str(&resp.body)?)
    }
}

impl FeedSource for SessionClient {
    fn fetch_feed(
        &self,
        target: &str,
    ) -> impl Future<Output = Result<ActivityFeed, FeedError>> + Send {
        async move {
            self.activity_feed(target, None).await.map_err(|e| match e {
                ClientError::UnexpectedStatus { status, body, .. } => {
                    FeedError::Status { status, body }
                }
                ClientError::Parse(e) => FeedError::Parse(e),
                other => FeedError::Transport(other.to_string()),
            })
        }
    }
}

/// Pull the pool id out of an upload response. The body is keyed by the
/// uploaded file's name: `{"<name>": {"poolId": "..."}}`.
fn parse_pool_id(body: &str, filename: &str) -> Result<String, ClientError> {
    let v: serde_json::Value = serde_json::from_str(body)?;
    v.get(filename)
        .and_then(|entry| entry.get("poolId"))
        .and_then(|id| id.as_str())
        .map(str::to_string)
        .ok_or(ClientError::MissingField {
            context: "pooled upload",
            field: "poolId",
            body: body.to_string(),
        })
}
