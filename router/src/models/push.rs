//! Push notification payload
//!
//! Only the fields used for routing are modelled; everything else in the
//! payload is ignored.

use serde::Deserialize;

/// Prefix stripped from `ref` to obtain the branch name
pub const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Event type header
pub const EVENT_HEADER: &str = "x-github-event";

/// Event type that triggers deployments
pub const PUSH_EVENT: &str = "push";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushPayload {
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,

    #[serde(default)]
    pub after: Option<String>,

    #[serde(default)]
    pub head_commit: Option<HeadCommit>,

    #[serde(default)]
    pub repository: Option<Repository>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeadCommit {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub clone_url: Option<String>,

    #[serde(default)]
    pub html_url: Option<String>,
}

impl PushPayload {
    /// Branch named by `ref`; refs outside `refs/heads/` are returned whole
    pub fn branch(&self) -> &str {
        let git_ref = self.git_ref.as_deref().unwrap_or_default();
        git_ref.strip_prefix(BRANCH_REF_PREFIX).unwrap_or(git_ref)
    }

    pub fn commit_hash(&self) -> &str {
        self.after.as_deref().unwrap_or("unknown")
    }

    pub fn commit_message(&self) -> &str {
        self.head_commit
            .as_ref()
            .and_then(|c| c.message.as_deref())
            .unwrap_or_default()
    }

    /// Repository URL, preferring the clone URL
    pub fn repository_url(&self) -> Option<&str> {
        let repo = self.repository.as_ref()?;
        [repo.clone_url.as_deref(), repo.html_url.as_deref()]
            .into_iter()
            .flatten()
            .find(|url| !url.is_empty())
    }
}

/// Derive a project name from a repository URL: drop a trailing `.git` and
/// take the last path segment. Handles `https://host/owner/name(.git)` and
/// `git@host:owner/name.git`.
pub fn project_name_from_repo_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let name = trimmed.rsplit(['/', ':']).next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
