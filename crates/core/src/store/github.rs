//! GitHub-backed store implementation.
//!
//! Decks are plain JSON files in a GitHub repository, manipulated through the
//! REST contents API. Conditional writes map onto the API's `sha` field: a
//! write carrying a stale blob sha is rejected by GitHub, which this client
//! surfaces as [`StoreError::Conflict`].

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::errors::{NotFoundKind, StoreError};
use crate::models::{Branch, Commit, CommitActor};

use super::{DeckStore, StoredFile, WriteReceipt};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    content: String,
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    content: PutContentsBlob,
    commit: WireCommitDetail,
}

#[derive(Debug, Deserialize)]
struct PutContentsBlob {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct WireCommit {
    sha: String,
    commit: WireCommitBody,
    parents: Vec<WireParent>,
}

#[derive(Debug, Deserialize)]
struct WireCommitDetail {
    sha: String,
    message: Option<String>,
    author: Option<WireActor>,
    committer: Option<WireActor>,
    parents: Vec<WireParent>,
}

#[derive(Debug, Deserialize)]
struct WireCommitBody {
    message: String,
    author: WireActor,
    committer: WireActor,
}

#[derive(Debug, Deserialize)]
struct WireActor {
    name: String,
    email: String,
    date: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
struct WireParent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct WireBranch {
    name: String,
    commit: WireParent,
}

#[derive(Debug, Deserialize)]
struct WireRef {
    object: WireParent,
}

impl From<WireActor> for CommitActor {
    fn from(w: WireActor) -> Self {
        Self {
            name: w.name,
            email: w.email,
            date: w.date,
        }
    }
}

impl From<WireCommit> for Commit {
    fn from(w: WireCommit) -> Self {
        Commit::new(
            w.sha,
            w.commit.message,
            w.commit.author.into(),
            w.commit.committer.into(),
            w.parents.into_iter().map(|p| p.sha).collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Asynchronous GitHub REST client scoped to a single repository.
#[derive(Clone)]
pub struct GitHubStore {
    http: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    token: String,
}

impl GitHubStore {
    pub fn new(
        api_url: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("deckvault/0.1"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .expect("failed to build reqwest client");
        let owner = owner.into();
        let repo = repo.into();
        info!(api_url = %api_url, owner = %owner, repo = %repo, "created GitHubStore");
        Self {
            http,
            api_url,
            owner,
            repo,
            token: token.into(),
        }
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url, self.owner, self.repo, tail
        )
    }

    /// Classify a non-success status into a store error.
    fn classify(status: u16, body: String, kind: NotFoundKind, name: &str) -> StoreError {
        match status {
            401 | 403 => StoreError::Auth { status },
            404 => StoreError::NotFound {
                kind,
                name: name.to_string(),
            },
            s if s >= 500 => StoreError::Server { status, body },
            _ => StoreError::Server { status, body },
        }
    }

    fn map_transport(e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(e.to_string())
        } else {
            StoreError::Network(e)
        }
    }

    async fn failure(
        resp: reqwest::Response,
        kind: NotFoundKind,
        name: &str,
    ) -> StoreError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Self::classify(status, body, kind, name)
    }

    fn decode_content(raw: &ContentsResponse, path: &str) -> Result<Vec<u8>, StoreError> {
        if raw.encoding != "base64" {
            return Err(StoreError::Parse(format!(
                "unexpected encoding '{}' for '{path}'",
                raw.encoding
            )));
        }
        // The contents API inserts newlines into the base64 payload.
        let compact: String = raw.content.chars().filter(|c| !c.is_whitespace()).collect();
        BASE64
            .decode(compact.as_bytes())
            .map_err(|e| StoreError::Parse(format!("invalid base64 for '{path}': {e}")))
    }
}

#[async_trait]
impl DeckStore for GitHubStore {
    #[instrument(skip(self))]
    async fn get_file(&self, path: &str, rev: &str) -> Result<StoredFile, StoreError> {
        let url = self.repo_url(&format!("contents/{path}"));
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("ref", rev)])
            .send()
            .await
            .map_err(Self::map_transport)?;
        if !resp.status().is_success() {
            return Err(Self::failure(resp, NotFoundKind::File, path).await);
        }
        let raw: ContentsResponse = resp.json().await.map_err(Self::map_transport)?;
        let content = Self::decode_content(&raw, path)?;
        debug!(path, rev, bytes = content.len(), "fetched file");
        Ok(StoredFile {
            content,
            content_hash: raw.sha,
        })
    }

    #[instrument(skip(self, content, message))]
    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        branch: &str,
        expected_hash: Option<&str>,
    ) -> Result<WriteReceipt, StoreError> {
        let url = self.repo_url(&format!("contents/{path}"));
        let mut payload = serde_json::json!({
            "message": message,
            "content": BASE64.encode(content),
            "branch": branch,
        });
        if let Some(sha) = expected_hash {
            payload["sha"] = serde_json::Value::String(sha.to_string());
        }
        let resp = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(Self::map_transport)?;

        let status = resp.status().as_u16();
        // GitHub rejects a stale or missing sha with 409 or 422.
        if status == 409 || status == 422 {
            return Err(StoreError::Conflict {
                path: path.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(Self::failure(resp, NotFoundKind::Branch, branch).await);
        }
        let raw: PutContentsResponse = resp.json().await.map_err(Self::map_transport)?;
        let commit = Commit::new(
            raw.commit.sha,
            raw.commit.message.unwrap_or_else(|| message.to_string()),
            raw.commit.author.map(Into::into).unwrap_or_default(),
            raw.commit.committer.map(Into::into).unwrap_or_default(),
            raw.commit.parents.into_iter().map(|p| p.sha).collect(),
        );
        info!(path, branch, sha = %commit.sha, "wrote file");
        Ok(WriteReceipt {
            commit,
            content_hash: raw.content.sha,
        })
    }

    #[instrument(skip(self))]
    async fn list_commits(
        &self,
        branch: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Commit>, StoreError> {
        let url = self.repo_url("commits");
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("sha", branch)])
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await
            .map_err(Self::map_transport)?;
        if !resp.status().is_success() {
            return Err(Self::failure(resp, NotFoundKind::Branch, branch).await);
        }
        let raw: Vec<WireCommit> = resp.json().await.map_err(Self::map_transport)?;
        debug!(branch, page, count = raw.len(), "fetched commits");
        Ok(raw.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn list_branches(&self) -> Result<Vec<Branch>, StoreError> {
        let url = self.repo_url("branches");
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("per_page", "100")])
            .send()
            .await
            .map_err(Self::map_transport)?;
        if !resp.status().is_success() {
            return Err(Self::failure(resp, NotFoundKind::Repo, &self.repo).await);
        }
        let raw: Vec<WireBranch> = resp.json().await.map_err(Self::map_transport)?;
        debug!(count = raw.len(), "fetched branches");
        Ok(raw
            .into_iter()
            .map(|b| Branch {
                name: b.name,
                head_sha: b.commit.sha,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn create_branch(&self, name: &str, from_branch: &str) -> Result<Branch, StoreError> {
        // Resolve the source branch head, then create the ref.
        let url = self.repo_url(&format!("git/ref/heads/{from_branch}"));
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(Self::map_transport)?;
        if !resp.status().is_success() {
            return Err(Self::failure(resp, NotFoundKind::Branch, from_branch).await);
        }
        let head: WireRef = resp.json().await.map_err(Self::map_transport)?;

        let url = self.repo_url("git/refs");
        let payload = serde_json::json!({
            "ref": format!("refs/heads/{name}"),
            "sha": head.object.sha,
        });
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(Self::map_transport)?;
        if !resp.status().is_success() {
            return Err(Self::failure(resp, NotFoundKind::Branch, name).await);
        }
        info!(name, from = from_branch, sha = %head.object.sha, "created branch");
        Ok(Branch {
            name: name.to_string(),
            head_sha: head.object.sha,
        })
    }
}
