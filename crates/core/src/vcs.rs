//! Version-control orchestrator.
//!
//! [`DeckVersionControl`] ties the subsystems together: it reads and writes
//! deck files through a [`DeckStore`], offloads large diffs to the background
//! worker, embeds per-card annotations in commit messages, caches immutable
//! snapshots, and drives the branch/merge workflow. Store calls go through a
//! bounded retry loop with exponential backoff; only transient failures are
//! retried.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::annotation::{
    annotations_from_diff, append_annotations, AUTOSAVE_PREFIX,
};
use crate::cache::{SnapshotKey, VersionCache};
use crate::config::EngineConfig;
use crate::conflict::{apply_diff, detect_conflicts};
use crate::diff::{DeckDiff, DiffWorker};
use crate::errors::{StoreError, VcsError};
use crate::models::{AnnotatedCommit, Branch, CardChangeAnnotation, Deck};
use crate::store::DeckStore;

/// Commit pages examined per branch when hunting for a merge base.
const MERGE_BASE_PAGE_SIZE: u32 = 50;
const MERGE_BASE_MAX_PAGES: u32 = 4;

// ---------------------------------------------------------------------------
// Policy and repository identity
// ---------------------------------------------------------------------------

/// Identifies the repository and the deck file within it.
#[derive(Debug, Clone)]
pub struct RepoCoordinates {
    pub owner: String,
    pub repo: String,
    /// Path of the deck JSON file inside the repository.
    pub deck_path: String,
}

impl RepoCoordinates {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        deck_path: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            deck_path: deck_path.into(),
        }
    }
}

/// Retry policy for store operations: `max_attempts` total tries with the
/// delay doubling after each failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge workflow types
// ---------------------------------------------------------------------------

/// Where the orchestrator stands in the merge workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePhase {
    Idle,
    /// A merge attempt hit conflicts and awaits a resolved deck.
    AwaitingResolution,
}

impl std::fmt::Display for MergePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingResolution => write!(f, "awaiting resolution"),
        }
    }
}

/// Everything a user needs to review before merging.
#[derive(Debug, Clone)]
pub struct MergePreview {
    pub source_deck: Deck,
    pub target_deck: Deck,
    /// Full difference between target and source decks.
    pub diff: DeckDiff,
    /// Overlapping changes relative to the common base.
    pub conflicts: DeckDiff,
}

/// Outcome of a merge attempt.
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    /// The merge applied cleanly and was committed to the target branch.
    Merged(AnnotatedCommit),
    /// Conflicting changes were found; nothing was written.
    Conflicts(DeckDiff),
}

struct PendingMerge {
    source_branch: String,
}

struct MergeAnalysis {
    source_deck: Deck,
    target_deck: Deck,
    base_deck: Deck,
    conflicts: DeckDiff,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Orchestrates deck versioning against a single repository.
///
/// Tracks the active branch and the content-hash of the last deck read or
/// written on it, so every write is conditional on the file being unchanged
/// since then.
pub struct DeckVersionControl {
    store: Arc<dyn DeckStore>,
    repo: RepoCoordinates,
    retry: RetryPolicy,
    diff_worker: DiffWorker,
    cache: VersionCache,
    current_branch: String,
    last_hash: Option<String>,
    pending_merge: Option<PendingMerge>,
}

impl DeckVersionControl {
    pub fn new(store: Arc<dyn DeckStore>, repo: RepoCoordinates) -> Self {
        Self::with_policy(store, repo, RetryPolicy::default())
    }

    pub fn with_policy(
        store: Arc<dyn DeckStore>,
        repo: RepoCoordinates,
        retry: RetryPolicy,
    ) -> Self {
        Self::assemble(store, repo, retry, DiffWorker::spawn(), VersionCache::new())
    }

    /// Build the orchestrator from loaded configuration, wiring the retry
    /// policy, diff offload limits, and cache capacity it specifies.
    pub fn from_config(config: &EngineConfig, store: Arc<dyn DeckStore>) -> Self {
        Self::assemble(
            store,
            config.repo_coordinates(),
            config.retry_policy(),
            DiffWorker::with_limits(
                config.diff.offload_threshold,
                Duration::from_secs(config.diff.offload_timeout_secs),
            ),
            VersionCache::with_capacity(config.cache.capacity),
        )
    }

    fn assemble(
        store: Arc<dyn DeckStore>,
        repo: RepoCoordinates,
        retry: RetryPolicy,
        diff_worker: DiffWorker,
        cache: VersionCache,
    ) -> Self {
        Self {
            store,
            repo,
            retry,
            diff_worker,
            cache,
            current_branch: "main".to_string(),
            last_hash: None,
            pending_merge: None,
        }
    }

    pub fn current_branch(&self) -> &str {
        &self.current_branch
    }

    pub fn merge_phase(&self) -> MergePhase {
        if self.pending_merge.is_some() {
            MergePhase::AwaitingResolution
        } else {
            MergePhase::Idle
        }
    }

    // -- Branch operations --------------------------------------------------

    /// Switch the active branch and load its deck.
    ///
    /// Fails with `NotFound` when the branch does not exist or carries no
    /// deck file; the orchestrator's state is untouched on failure.
    #[instrument(skip(self))]
    pub async fn switch_branch(&mut self, name: &str) -> Result<Deck, VcsError> {
        let branches = self.list_branches().await?;
        if !branches.iter().any(|b| b.name == name) {
            return Err(StoreError::NotFound {
                kind: crate::errors::NotFoundKind::Branch,
                name: name.to_string(),
            }
            .into());
        }

        let (deck, hash) = self.read_deck(name).await?;
        self.current_branch = name.to_string();
        self.last_hash = Some(hash);
        self.pending_merge = None;
        info!(branch = name, "switched branch");
        Ok(deck)
    }

    pub async fn list_branches(&self) -> Result<Vec<Branch>, VcsError> {
        let store = self.store.clone();
        let branches = self
            .with_retry("list_branches", move || {
                let store = store.clone();
                async move { store.list_branches().await }
            })
            .await?;
        Ok(branches)
    }

    #[instrument(skip(self))]
    pub async fn create_branch(
        &self,
        name: &str,
        from_branch: &str,
    ) -> Result<Branch, VcsError> {
        let store = self.store.clone();
        let name = name.to_string();
        let from = from_branch.to_string();
        let branch = self
            .with_retry("create_branch", move || {
                let store = store.clone();
                let name = name.clone();
                let from = from.clone();
                async move { store.create_branch(&name, &from).await }
            })
            .await?;
        Ok(branch)
    }

    // -- Commit and history -------------------------------------------------

    /// Commit a deck to the active branch with per-card annotations embedded
    /// in the message.
    #[instrument(skip(self, deck, annotations), fields(branch = %self.current_branch))]
    pub async fn commit_deck(
        &mut self,
        deck: &Deck,
        message: &str,
        annotations: &[CardChangeAnnotation],
    ) -> Result<AnnotatedCommit, VcsError> {
        let content =
            serde_json::to_vec_pretty(deck).map_err(|source| VcsError::DeckEncode {
                name: deck.name.clone(),
                source,
            })?;
        let full_message = append_annotations(message, annotations);

        // With no tracked hash, fetch the current one so the write stays
        // conditional; an absent file means this commit creates it.
        let expected = match &self.last_hash {
            Some(hash) => Some(hash.clone()),
            None => match self.read_deck(&self.current_branch).await {
                Ok((_, hash)) => Some(hash),
                Err(VcsError::Store(StoreError::NotFound { .. })) => None,
                Err(e) => return Err(e),
            },
        };

        let store = self.store.clone();
        let path = self.repo.deck_path.clone();
        let branch = self.current_branch.clone();
        let receipt = self
            .with_retry("put_file", move || {
                let store = store.clone();
                let path = path.clone();
                let branch = branch.clone();
                let expected = expected.clone();
                let content = content.clone();
                let message = full_message.clone();
                async move {
                    store
                        .put_file(&path, &content, &message, &branch, expected.as_deref())
                        .await
                }
            })
            .await?;

        self.last_hash = Some(receipt.content_hash);
        info!(sha = %receipt.commit.sha, "committed deck");
        Ok(AnnotatedCommit::from_commit(receipt.commit))
    }

    /// Commit the deck with an algorithmically generated message describing
    /// the changes since the stored version.
    ///
    /// Returns `None` without writing when the deck is identical to what is
    /// already stored.
    #[instrument(skip(self, deck), fields(branch = %self.current_branch))]
    pub async fn auto_save(&mut self, deck: &Deck) -> Result<Option<AnnotatedCommit>, VcsError> {
        let branch = self.current_branch.clone();
        let (message, annotations) = match self.read_deck(&branch).await {
            Ok((stored, hash)) => {
                self.last_hash = Some(hash);
                let diff = self.diff_worker.compute_diff_async(&stored, deck).await?;
                if diff.is_empty() {
                    debug!("auto-save skipped, no changes");
                    return Ok(None);
                }
                (
                    format!("{AUTOSAVE_PREFIX}{}", diff.summary()),
                    annotations_from_diff(&diff),
                )
            }
            Err(VcsError::Store(StoreError::NotFound { .. })) => {
                self.last_hash = None;
                (format!("{AUTOSAVE_PREFIX}initial version"), Vec::new())
            }
            Err(e) => return Err(e),
        };

        let commit = self.commit_deck(deck, &message, &annotations).await?;
        Ok(Some(commit))
    }

    /// Load the deck as of a specific commit. Snapshots are immutable, so
    /// results are served from the LRU cache when possible.
    #[instrument(skip(self))]
    pub async fn restore_deck_version(&mut self, sha: &str) -> Result<Deck, VcsError> {
        let key = SnapshotKey::new(
            &self.repo.owner,
            &self.repo.repo,
            sha,
            &self.repo.deck_path,
        );
        if let Some(deck) = self.cache.get(&key) {
            debug!(sha, "snapshot cache hit");
            return Ok(deck);
        }

        let (deck, _) = self.read_deck(sha).await?;
        self.cache.insert(key, deck.clone());
        Ok(deck)
    }

    /// List the active branch's history, newest first, with annotations
    /// recovered from each commit message.
    #[instrument(skip(self), fields(branch = %self.current_branch))]
    pub async fn list_history(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<AnnotatedCommit>, VcsError> {
        let commits = self.list_commits(&self.current_branch, page, per_page).await?;
        Ok(commits
            .into_iter()
            .map(AnnotatedCommit::from_commit)
            .collect())
    }

    // -- Merge workflow -----------------------------------------------------

    /// Analyze a merge from `source_branch` into the active branch without
    /// writing anything.
    #[instrument(skip(self), fields(target = %self.current_branch))]
    pub async fn preview_merge(&mut self, source_branch: &str) -> Result<MergePreview, VcsError> {
        let analysis = self.analyze_merge(source_branch).await?;
        let diff = self
            .diff_worker
            .compute_diff_async(&analysis.target_deck, &analysis.source_deck)
            .await?;
        Ok(MergePreview {
            source_deck: analysis.source_deck,
            target_deck: analysis.target_deck,
            diff,
            conflicts: analysis.conflicts,
        })
    }

    /// Merge `source_branch` into the active branch.
    ///
    /// With no conflicts, the source's changes relative to the common base
    /// are applied to the target deck and committed. With conflicts, nothing
    /// is written and the orchestrator awaits
    /// [`complete_merge`](Self::complete_merge).
    #[instrument(skip(self), fields(target = %self.current_branch))]
    pub async fn merge_branch(
        &mut self,
        source_branch: &str,
        message: &str,
    ) -> Result<MergeOutcome, VcsError> {
        let analysis = self.analyze_merge(source_branch).await?;
        if !analysis.conflicts.is_empty() {
            warn!(
                source = source_branch,
                conflicts = analysis.conflicts.len(),
                "merge blocked by conflicts"
            );
            self.pending_merge = Some(PendingMerge {
                source_branch: source_branch.to_string(),
            });
            return Ok(MergeOutcome::Conflicts(analysis.conflicts));
        }

        let incoming = self
            .diff_worker
            .compute_diff_async(&analysis.base_deck, &analysis.source_deck)
            .await?;
        let merged = apply_diff(&analysis.target_deck, &incoming);
        let annotations = annotations_from_diff(&incoming);
        let commit = self.commit_deck(&merged, message, &annotations).await?;
        info!(source = source_branch, sha = %commit.commit.sha, "merged branch");
        Ok(MergeOutcome::Merged(commit))
    }

    /// Commit a manually resolved deck, concluding a conflicted merge.
    #[instrument(skip(self, resolved_deck), fields(target = %self.current_branch))]
    pub async fn complete_merge(
        &mut self,
        resolved_deck: &Deck,
        message: &str,
    ) -> Result<AnnotatedCommit, VcsError> {
        let pending = self.pending_merge.take().ok_or(VcsError::NoPendingMerge)?;

        // Annotate the resolution with the changes it makes to the target.
        let branch = self.current_branch.clone();
        let annotations = match self.read_deck(&branch).await {
            Ok((target, hash)) => {
                self.last_hash = Some(hash);
                let diff = self
                    .diff_worker
                    .compute_diff_async(&target, resolved_deck)
                    .await?;
                annotations_from_diff(&diff)
            }
            Err(VcsError::Store(StoreError::NotFound { .. })) => Vec::new(),
            Err(e) => {
                self.pending_merge = Some(pending);
                return Err(e);
            }
        };

        match self.commit_deck(resolved_deck, message, &annotations).await {
            Ok(commit) => {
                info!(source = %pending.source_branch, sha = %commit.commit.sha, "merge resolved");
                Ok(commit)
            }
            Err(e) => {
                self.pending_merge = Some(pending);
                Err(e)
            }
        }
    }

    // -- Maintenance --------------------------------------------------------

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Number of diffs routed through the background worker so far.
    pub fn offloaded_diffs(&self) -> u64 {
        self.diff_worker.offloaded_requests()
    }

    /// Tear down the background diff worker.
    pub async fn shutdown(self) {
        self.diff_worker.shutdown().await;
    }

    // -- Internals ----------------------------------------------------------

    async fn analyze_merge(&mut self, source_branch: &str) -> Result<MergeAnalysis, VcsError> {
        let (source_deck, _) = self.read_deck(source_branch).await?;
        let branch = self.current_branch.clone();
        let (target_deck, hash) = self.read_deck(&branch).await?;
        self.last_hash = Some(hash);

        let base_deck = self
            .resolve_merge_base(source_branch, &target_deck)
            .await?;
        let conflicts = detect_conflicts(&base_deck, &source_deck, &target_deck);
        Ok(MergeAnalysis {
            source_deck,
            target_deck,
            base_deck,
            conflicts,
        })
    }

    /// Find the deck at the most recent commit shared by the source and
    /// target branches.
    ///
    /// The store interface exposes no merge-base query, so recent history of
    /// both branches is walked (bounded) for the first common identifier.
    /// When no shared commit is found within the window, or the deck file
    /// does not exist at the shared commit, the target's current deck stands
    /// in as the base.
    async fn resolve_merge_base(
        &mut self,
        source_branch: &str,
        target_deck: &Deck,
    ) -> Result<Deck, VcsError> {
        let branch = self.current_branch.clone();
        let target_shas = self.collect_shas(&branch).await?;

        let mut base_sha = None;
        'outer: for page in 1..=MERGE_BASE_MAX_PAGES {
            let commits = self
                .list_commits(source_branch, page, MERGE_BASE_PAGE_SIZE)
                .await?;
            let short_page = (commits.len() as u32) < MERGE_BASE_PAGE_SIZE;
            for commit in &commits {
                if target_shas.contains(&commit.sha) {
                    base_sha = Some(commit.sha.clone());
                    break 'outer;
                }
            }
            if short_page {
                break;
            }
        }

        let Some(sha) = base_sha else {
            warn!(
                source = source_branch,
                "no shared commit within window, using target deck as merge base"
            );
            return Ok(target_deck.clone());
        };

        debug!(sha = %sha, "resolved merge base");
        match self.restore_deck_version(&sha).await {
            Ok(deck) => Ok(deck),
            Err(VcsError::Store(StoreError::NotFound { .. })) => Ok(target_deck.clone()),
            Err(e) => Err(e),
        }
    }

    async fn collect_shas(
        &self,
        branch: &str,
    ) -> Result<std::collections::HashSet<String>, VcsError> {
        let mut shas = std::collections::HashSet::new();
        for page in 1..=MERGE_BASE_MAX_PAGES {
            let commits = self
                .list_commits(branch, page, MERGE_BASE_PAGE_SIZE)
                .await?;
            let short_page = (commits.len() as u32) < MERGE_BASE_PAGE_SIZE;
            shas.extend(commits.into_iter().map(|c| c.sha));
            if short_page {
                break;
            }
        }
        Ok(shas)
    }

    async fn list_commits(
        &self,
        branch: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<crate::models::Commit>, VcsError> {
        let store = self.store.clone();
        let branch = branch.to_string();
        let commits = self
            .with_retry("list_commits", move || {
                let store = store.clone();
                let branch = branch.clone();
                async move { store.list_commits(&branch, page, per_page).await }
            })
            .await?;
        Ok(commits)
    }

    /// Read and decode the deck file at a revision, with retry.
    async fn read_deck(&self, rev: &str) -> Result<(Deck, String), VcsError> {
        let store = self.store.clone();
        let path = self.repo.deck_path.clone();
        let rev_owned = rev.to_string();
        let file = self
            .with_retry("get_file", move || {
                let store = store.clone();
                let path = path.clone();
                let rev = rev_owned.clone();
                async move { store.get_file(&path, &rev).await }
            })
            .await?;
        let deck = serde_json::from_slice(&file.content).map_err(|source| {
            VcsError::DeckDecode {
                path: self.repo.deck_path.clone(),
                source,
            }
        })?;
        Ok((deck, file.content_hash))
    }

    /// Run a store call with bounded exponential-backoff retry.
    ///
    /// Only failures classified retryable are retried; everything else, a
    /// stale-write conflict included, surfaces immediately.
    async fn with_retry<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut delay = self.retry.base_delay;
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    warn!(
                        op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "store operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Commit, CommitActor, DeckCard};
    use crate::store::{StoredFile, WriteReceipt};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn deck(cards: &[(&str, u32)]) -> Deck {
        let mut deck = Deck::new("Test", "mtg", "modern", "alice");
        for (id, count) in cards {
            deck.cards
                .push(DeckCard::new(*id, format!("Card {id}"), *count));
        }
        deck
    }

    fn stored(deck: &Deck, hash: &str) -> StoredFile {
        StoredFile {
            content: serde_json::to_vec_pretty(deck).unwrap(),
            content_hash: hash.to_string(),
        }
    }

    fn commit(sha: &str, message: &str) -> Commit {
        Commit::new(
            sha,
            message,
            CommitActor::default(),
            CommitActor::default(),
            vec![],
        )
    }

    fn receipt(sha: &str, hash: &str) -> WriteReceipt {
        WriteReceipt {
            commit: commit(sha, "m"),
            content_hash: hash.to_string(),
        }
    }

    /// Store double fed a script of responses per operation, recording call
    /// counts and timestamps.
    #[derive(Default)]
    struct ScriptedStore {
        gets: Mutex<VecDeque<Result<StoredFile, StoreError>>>,
        puts: Mutex<VecDeque<Result<WriteReceipt, StoreError>>>,
        put_calls: AtomicU32,
        put_times: Mutex<Vec<tokio::time::Instant>>,
    }

    impl ScriptedStore {
        fn script_get(&self, result: Result<StoredFile, StoreError>) {
            self.gets.lock().unwrap().push_back(result);
        }

        fn script_put(&self, result: Result<WriteReceipt, StoreError>) {
            self.puts.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl DeckStore for ScriptedStore {
        async fn get_file(&self, path: &str, _rev: &str) -> Result<StoredFile, StoreError> {
            self.gets.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(StoreError::NotFound {
                    kind: crate::errors::NotFoundKind::File,
                    name: path.to_string(),
                })
            })
        }

        async fn put_file(
            &self,
            path: &str,
            _content: &[u8],
            message: &str,
            _branch: &str,
            _expected_hash: Option<&str>,
        ) -> Result<WriteReceipt, StoreError> {
            self.put_calls.fetch_add(1, Ordering::SeqCst);
            self.put_times
                .lock()
                .unwrap()
                .push(tokio::time::Instant::now());
            let result = self.puts.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(StoreError::NotFound {
                    kind: crate::errors::NotFoundKind::File,
                    name: path.to_string(),
                })
            });
            // Echo the message back, the way a real store records it.
            result.map(|r| WriteReceipt {
                commit: commit(&r.commit.sha, message),
                content_hash: r.content_hash,
            })
        }

        async fn list_commits(
            &self,
            _branch: &str,
            _page: u32,
            _per_page: u32,
        ) -> Result<Vec<Commit>, StoreError> {
            Ok(vec![])
        }

        async fn list_branches(&self) -> Result<Vec<Branch>, StoreError> {
            Ok(vec![Branch {
                name: "main".into(),
                head_sha: "h".into(),
            }])
        }

        async fn create_branch(&self, name: &str, _from: &str) -> Result<Branch, StoreError> {
            Ok(Branch {
                name: name.to_string(),
                head_sha: "h".into(),
            })
        }
    }

    fn vcs(store: Arc<ScriptedStore>) -> DeckVersionControl {
        DeckVersionControl::new(
            store,
            RepoCoordinates::new("alice", "decks", "decks/test.json"),
        )
    }

    #[tokio::test]
    async fn test_stale_write_conflict_is_not_retried() {
        let store = Arc::new(ScriptedStore::default());
        store.script_put(Err(StoreError::Conflict {
            path: "decks/test.json".into(),
        }));

        let mut vcs = vcs(store.clone());
        let err = vcs
            .commit_deck(&deck(&[("a", 2)]), "update", &[])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            VcsError::Store(StoreError::Conflict { .. })
        ));
        // A stale hash fails the same way every time, so exactly one attempt.
        assert_eq!(store.put_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retry_with_doubling_delay() {
        let store = Arc::new(ScriptedStore::default());
        store.script_put(Err(StoreError::Server {
            status: 503,
            body: "unavailable".into(),
        }));
        store.script_put(Err(StoreError::Timeout("connect".into())));
        store.script_put(Ok(receipt("sha1", "blob1")));

        let mut vcs = vcs(store.clone());
        let committed = vcs
            .commit_deck(&deck(&[("a", 2)]), "update", &[])
            .await
            .unwrap();

        assert_eq!(committed.commit.sha, "sha1");
        assert_eq!(store.put_calls.load(Ordering::SeqCst), 3);

        let times = store.put_times.lock().unwrap();
        let base = RetryPolicy::default().base_delay;
        assert_eq!(times[1] - times[0], base);
        assert_eq!(times[2] - times[1], base * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhaust_after_max_attempts() {
        let store = Arc::new(ScriptedStore::default());
        for _ in 0..3 {
            store.script_put(Err(StoreError::Server {
                status: 500,
                body: "boom".into(),
            }));
        }

        let mut vcs = vcs(store.clone());
        let err = vcs
            .commit_deck(&deck(&[("a", 2)]), "update", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, VcsError::Store(StoreError::Server { .. })));
        assert_eq!(store.put_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auto_save_skips_identical_deck() {
        let store = Arc::new(ScriptedStore::default());
        let current = deck(&[("a", 4)]);
        store.script_get(Ok(stored(&current, "blob1")));

        let mut vcs = vcs(store.clone());
        let result = vcs.auto_save(&current).await.unwrap();

        assert!(result.is_none());
        assert_eq!(store.put_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auto_save_message_describes_changes() {
        let store = Arc::new(ScriptedStore::default());
        let current = deck(&[("a", 4)]);
        let mut edited = current.clone();
        edited.set_count("a", 3);
        edited.cards.push(DeckCard::new("b", "Card b", 2));

        store.script_get(Ok(stored(&current, "blob1")));
        store.script_put(Ok(receipt("sha2", "blob2")));

        let mut vcs = vcs(store.clone());
        let committed = vcs.auto_save(&edited).await.unwrap().unwrap();

        assert!(committed.commit.message.starts_with(AUTOSAVE_PREFIX));
        assert_eq!(committed.commit.sha, "sha2");
    }

    #[tokio::test]
    async fn test_auto_save_initial_version_when_file_absent() {
        let store = Arc::new(ScriptedStore::default());
        store.script_get(Err(StoreError::NotFound {
            kind: crate::errors::NotFoundKind::File,
            name: "decks/test.json".into(),
        }));
        store.script_put(Ok(receipt("sha1", "blob1")));

        let mut vcs = vcs(store.clone());
        let committed = vcs.auto_save(&deck(&[("a", 1)])).await.unwrap().unwrap();
        assert!(committed.commit.is_auto_save);
    }

    #[tokio::test]
    async fn test_restore_serves_repeat_reads_from_cache() {
        let store = Arc::new(ScriptedStore::default());
        let snapshot = deck(&[("a", 2)]);
        // Only one get is scripted; the second read must not hit the store.
        store.script_get(Ok(stored(&snapshot, "blob1")));

        let mut vcs = vcs(store.clone());
        let first = vcs.restore_deck_version("sha1").await.unwrap();
        let second = vcs.restore_deck_version("sha1").await.unwrap();

        assert_eq!(first.cards, snapshot.cards);
        assert_eq!(second.cards, snapshot.cards);
        assert!(store.gets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_merge_requires_pending_conflicts() {
        let store = Arc::new(ScriptedStore::default());
        let mut vcs = vcs(store);
        let err = vcs
            .complete_merge(&deck(&[("a", 1)]), "resolve")
            .await
            .unwrap_err();
        assert!(matches!(err, VcsError::NoPendingMerge));
    }

    #[tokio::test]
    async fn test_switch_branch_rejects_unknown_branch() {
        let store = Arc::new(ScriptedStore::default());
        let mut vcs = vcs(store);
        let err = vcs.switch_branch("nope").await.unwrap_err();
        assert!(matches!(
            err,
            VcsError::Store(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_from_config_wires_engine_knobs() {
        use crate::config::{CacheConfig, DiffConfig, RetryConfig, StoreConfig};

        let store = Arc::new(ScriptedStore::default());
        let config = EngineConfig {
            store: StoreConfig {
                api_url: "https://api.github.com".into(),
                owner: "alice".into(),
                repo: "decks".into(),
                deck_path: "decks/test.json".into(),
                token_env: "DECKVAULT_TOKEN".into(),
            },
            retry: RetryConfig {
                max_attempts: 1,
                base_delay_ms: 10,
            },
            diff: DiffConfig {
                offload_threshold: 5,
                offload_timeout_secs: 30,
            },
            cache: CacheConfig { capacity: 1 },
        };
        let mut vcs = DeckVersionControl::from_config(&config, store.clone());

        // The configured threshold routes even a small deck through the
        // worker; the default threshold would diff it inline.
        let current = deck(&[("a", 4), ("b", 4)]);
        let mut edited = current.clone();
        edited.set_count("a", 3);
        store.script_get(Ok(stored(&current, "blob1")));
        store.script_put(Ok(receipt("sha1", "blob2")));
        vcs.auto_save(&edited).await.unwrap().unwrap();
        assert_eq!(vcs.offloaded_diffs(), 1);

        // Capacity 1: the second snapshot evicts the first, so re-reading it
        // consumes the third scripted get.
        store.script_get(Ok(stored(&current, "blob1")));
        store.script_get(Ok(stored(&edited, "blob2")));
        store.script_get(Ok(stored(&current, "blob1")));
        vcs.restore_deck_version("r1").await.unwrap();
        vcs.restore_deck_version("r2").await.unwrap();
        vcs.restore_deck_version("r1").await.unwrap();
        assert!(store.gets.lock().unwrap().is_empty());

        // max_attempts 1: a retryable failure surfaces without a second try.
        store.script_put(Err(StoreError::Server {
            status: 503,
            body: "unavailable".into(),
        }));
        let err = vcs
            .commit_deck(&edited, "update", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, VcsError::Store(StoreError::Server { .. })));
        assert_eq!(store.put_calls.load(Ordering::SeqCst), 2);

        vcs.shutdown().await;
    }
}
