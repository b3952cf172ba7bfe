/// Diff text and source branch of one pull request.
/// Produced once per PR by a `PullRequestSource` and not modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDiff {
    /// `head.ref` of the pull request (e.g., "feature/ABC-123_DEBUG")
    pub source_branch: String,
    /// Unified diff as returned by the diff media type
    pub raw_diff: String,
}

/// Represents the parsed components of a GitHub PR URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrUrl {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
}

/// Base URL of the public GitHub REST API.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

impl PrUrl {
    /// Path of the REST resource serving both the JSON metadata and the diff.
    pub fn api_path(&self) -> String {
        format!("/repos/{}/{}/pulls/{}", self.owner, self.repo, self.pr_number)
    }
}

impl std::fmt::Display for PrUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "https://github.com/{}/{}/pull/{}", self.owner, self.repo, self.pr_number)
    }
}
