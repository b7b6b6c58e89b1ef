//! Abstract interface to a version-controlled object store.
//!
//! The orchestrator talks to the store exclusively through [`DeckStore`], so
//! a different hosting backend (or an in-memory test double) plugs in without
//! touching the versioning logic. [`GitHubStore`] is the production
//! implementation.

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::models::{Branch, Commit};

pub mod github;

pub use github::GitHubStore;

/// A file read from the store, with the content-hash used for conditional
/// writes.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub content: Vec<u8>,
    /// Store-assigned hash of the current content. Passing it back on the
    /// next write makes the write conditional on the file being unchanged.
    pub content_hash: String,
}

/// The result of a successful write: the commit that recorded it.
#[derive(Debug, Clone)]
pub struct WriteReceipt {
    pub commit: Commit,
    /// Content-hash of the newly written file.
    pub content_hash: String,
}

/// Version-controlled object store operations.
///
/// `rev` parameters accept anything the store resolves to a revision: a
/// branch name or a commit identifier.
#[async_trait]
pub trait DeckStore: Send + Sync {
    /// Fetch a file's content and content-hash at a revision.
    async fn get_file(&self, path: &str, rev: &str) -> Result<StoredFile, StoreError>;

    /// Write a file on a branch with a commit message.
    ///
    /// `expected_hash` carries the hash from the last read; `None` means the
    /// file is being created. A stale hash fails with
    /// [`StoreError::Conflict`] instead of overwriting a concurrent edit.
    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        branch: &str,
        expected_hash: Option<&str>,
    ) -> Result<WriteReceipt, StoreError>;

    /// List commits on a branch, newest first, one page at a time.
    async fn list_commits(
        &self,
        branch: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Commit>, StoreError>;

    /// List the repository's branches.
    async fn list_branches(&self) -> Result<Vec<Branch>, StoreError>;

    /// Create a branch pointing at the head of `from_branch`.
    async fn create_branch(&self, name: &str, from_branch: &str) -> Result<Branch, StoreError>;
}
