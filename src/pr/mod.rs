pub mod diff;
pub mod types;

pub use types::{PrUrl, PullRequestDiff, GITHUB_API_BASE};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::http::{self, RemoteError, Service};

const GITHUB_PREFIX: &str = "https://github.com/";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";

#[derive(Debug, Error)]
pub enum PrError {
    #[error("Invalid PR URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid GitHub pull request URLs provided: {0:?}")]
    NoPullRequestUrls(String),
}

/// Parse a GitHub PR URL into its component parts.
/// Expected format: https://github.com/{owner}/{repo}/pull/{number}
pub fn parse_pr_url(url: &str) -> Result<PrUrl, PrError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| PrError::InvalidUrl(url.to_string()))?;

    if parsed.host_str() != Some("github.com") {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let segments: Vec<_> = parsed
        .path_segments()
        .ok_or_else(|| PrError::InvalidUrl(url.to_string()))?
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() != 4 || segments[2] != "pull" {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let pr_number = segments[3]
        .parse::<u64>()
        .map_err(|_| PrError::InvalidUrl(url.to_string()))?;

    Ok(PrUrl {
        owner: segments[0].to_string(),
        repo: segments[1].to_string(),
        pr_number,
    })
}

/// Find every GitHub pull request URL embedded in free text.
///
/// The text may be a comma or whitespace separated list, or a Jira field
/// with wiki markup around the links. Trailing path segments such as
/// `/files` are ignored. Order of first appearance is kept and duplicates
/// are dropped.
pub fn find_pr_urls(text: &str) -> Result<Vec<PrUrl>, PrError> {
    let mut urls: Vec<PrUrl> = Vec::new();

    for (start, _) in text.match_indices(GITHUB_PREFIX) {
        let candidate: &str = {
            let rest = &text[start..];
            let end = rest
                .char_indices()
                .skip(GITHUB_PREFIX.len())
                .find(|(_, c)| !is_url_path_char(*c))
                .map_or(rest.len(), |(i, _)| i);
            &rest[..end]
        };

        let Some(trimmed) = truncate_to_pull(candidate) else {
            debug!(candidate, "skipping non pull request GitHub link");
            continue;
        };

        match parse_pr_url(&trimmed) {
            Ok(url) if !urls.contains(&url) => urls.push(url),
            Ok(_) => {}
            Err(e) => debug!(candidate, error = %e, "skipping unparseable GitHub link"),
        }
    }

    if urls.is_empty() {
        return Err(PrError::NoPullRequestUrls(text.trim().to_string()));
    }
    Ok(urls)
}

fn is_url_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.')
}

/// Cut `https://github.com/o/r/pull/12abc/files` down to `https://github.com/o/r/pull/12`.
fn truncate_to_pull(candidate: &str) -> Option<String> {
    let path = candidate.strip_prefix(GITHUB_PREFIX)?;
    let mut segments = path.split('/');
    let owner = segments.next().filter(|s| !s.is_empty())?;
    let repo = segments.next().filter(|s| !s.is_empty())?;
    if segments.next()? != "pull" {
        return None;
    }
    let number_segment = segments.next()?;
    let digits_end = number_segment
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(number_segment.len());
    if digits_end == 0 {
        return None;
    }
    Some(format!(
        "{GITHUB_PREFIX}{owner}/{repo}/pull/{}",
        &number_segment[..digits_end]
    ))
}

/// Retrieves the diff and source branch of a pull request.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    async fn fetch(&self, pr: &PrUrl) -> Result<PullRequestDiff, RemoteError>;
}

/// `PullRequestSource` backed by the GitHub REST API.
pub struct GitHubClient {
    client: reqwest::Client,
    token: String,
    api_base: String,
}

impl GitHubClient {
    pub fn new(client: reqwest::Client, token: impl Into<String>) -> Self {
        Self::with_api_base(client, token, GITHUB_API_BASE)
    }

    /// Point the client at another API root, e.g. a GitHub Enterprise host.
    pub fn with_api_base(client: reqwest::Client, token: impl Into<String>, api_base: &str) -> Self {
        Self {
            client,
            token: token.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    /// Two requests against the same endpoint: JSON for `head.ref`, then the
    /// diff media type for the patch body.
    #[instrument(skip(self), fields(owner = %pr.owner, repo = %pr.repo, pr = pr.pr_number))]
    async fn fetch(&self, pr: &PrUrl) -> Result<PullRequestDiff, RemoteError> {
        let endpoint = format!("{}{}", self.api_base, pr.api_path());
        let resource = format!("pull request {}", pr);

        debug!("fetching PR metadata from GitHub API");
        let request = self
            .client
            .get(&endpoint)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, JSON_MEDIA_TYPE);
        let metadata = http::send_json(Service::GitHub, request, &resource).await?;
        let source_branch = head_ref(&metadata);
        debug!(branch = %source_branch, "received PR metadata");

        debug!("fetching PR diff from GitHub API");
        let request = self
            .client
            .get(&endpoint)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, DIFF_MEDIA_TYPE);
        let response = http::send(Service::GitHub, request, &resource).await?;
        let status = response.status();
        let raw_diff = response
            .text()
            .await
            .map_err(|e| RemoteError::transport(Service::GitHub, e))?;
        if raw_diff.is_empty() {
            return Err(RemoteError::empty_body(Service::GitHub, status, &resource));
        }
        debug!(diff_bytes = raw_diff.len(), "received PR diff");

        Ok(PullRequestDiff {
            source_branch,
            raw_diff,
        })
    }
}

/// `head.ref` of a pull request payload, empty when absent.
fn head_ref(metadata: &serde_json::Value) -> String {
    metadata
        .pointer("/head/ref")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr(owner: &str, repo: &str, pr_number: u64) -> PrUrl {
        PrUrl {
            owner: owner.to_string(),
            repo: repo.to_string(),
            pr_number,
        }
    }

    #[test]
    fn test_parse_valid_pr_url() {
        let url = parse_pr_url("https://github.com/org/repo/pull/42").unwrap();
        assert_eq!(url, pr("org", "repo", 42));
    }

    #[test]
    fn test_parse_invalid_pr_url() {
        assert!(parse_pr_url("https://example.com").is_err());
        assert!(parse_pr_url("not-a-url").is_err());
        assert!(parse_pr_url("https://github.com/org/repo/pulls/42").is_err());
    }

    #[test]
    fn test_find_comma_separated_urls() {
        let urls = find_pr_urls(
            "https://github.com/acme/shop/pull/12, https://github.com/acme/theme/pull/7",
        )
        .unwrap();
        assert_eq!(urls, vec![pr("acme", "shop", 12), pr("acme", "theme", 7)]);
        assert_eq!(urls[0].api_path(), "/repos/acme/shop/pulls/12");
    }

    #[test]
    fn test_find_urls_in_wiki_markup() {
        let field = "[PR|https://github.com/acme/shop/pull/12/files] and\n[https://github.com/acme/shop/pull/13#discussion]";
        let urls = find_pr_urls(field).unwrap();
        assert_eq!(urls, vec![pr("acme", "shop", 12), pr("acme", "shop", 13)]);
    }

    #[test]
    fn test_find_urls_dedupes_and_skips_other_links() {
        let text = "https://github.com/acme/shop/issues/3 https://github.com/acme/shop/pull/12 https://github.com/acme/shop/pull/12";
        let urls = find_pr_urls(text).unwrap();
        assert_eq!(urls, vec![pr("acme", "shop", 12)]);
    }

    #[test]
    fn test_find_urls_rejects_text_without_prs() {
        assert!(matches!(
            find_pr_urls("see https://example.com/pull/1"),
            Err(PrError::NoPullRequestUrls(_))
        ));
        assert!(find_pr_urls("").is_err());
    }

    #[test]
    fn test_head_ref() {
        let metadata = serde_json::json!({ "head": { "ref": "feature/ABC-123_DEBUG" } });
        assert_eq!(head_ref(&metadata), "feature/ABC-123_DEBUG");
        assert_eq!(head_ref(&serde_json::json!({})), "");
    }

    fn client_for(server_url: &str) -> GitHubClient {
        let client = http::build_client(std::time::Duration::from_secs(5)).unwrap();
        GitHubClient::with_api_base(client, "tok", server_url)
    }

    #[tokio::test]
    async fn test_fetch_requests_metadata_then_diff() {
        let server = http::test_server::serve(vec![
            (200, r#"{"head":{"ref":"feature/ABC-1_DEBUG"}}"#),
            (200, "diff --git a/x b/x\n+x\n"),
        ])
        .await;

        let fetched = client_for(&server.base_url)
            .fetch(&pr("acme", "shop", 12))
            .await
            .unwrap();

        assert_eq!(
            fetched,
            PullRequestDiff {
                source_branch: "feature/ABC-1_DEBUG".to_string(),
                raw_diff: "diff --git a/x b/x\n+x\n".to_string(),
            }
        );

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert!(request.request_line.starts_with("GET /repos/acme/shop/pulls/12 "));
            assert_eq!(request.header("authorization"), Some("Bearer tok"));
        }
        assert_eq!(requests[0].header("accept"), Some(JSON_MEDIA_TYPE));
        assert_eq!(requests[1].header("accept"), Some(DIFF_MEDIA_TYPE));
    }

    #[tokio::test]
    async fn test_fetch_rejects_empty_diff() {
        let server = http::test_server::serve(vec![(200, r#"{"head":{"ref":"main"}}"#), (200, "")]).await;

        let err = client_for(&server.base_url)
            .fetch(&pr("acme", "shop", 12))
            .await
            .unwrap_err();

        assert!(matches!(err, RemoteError::Upstream { status: 200, .. }));
        assert!(err.to_string().contains("empty body"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_metadata() {
        let server = http::test_server::serve(vec![(200, "<html>sign in</html>")]).await;

        let err = client_for(&server.base_url)
            .fetch(&pr("acme", "shop", 12))
            .await
            .unwrap_err();

        assert!(matches!(err, RemoteError::Parse { service: Service::GitHub, .. }));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_reports_bad_token() {
        let server = http::test_server::serve(vec![(401, r#"{"message":"Bad credentials"}"#)]).await;

        let err = client_for(&server.base_url)
            .fetch(&pr("acme", "shop", 12))
            .await
            .unwrap_err();

        assert!(matches!(err, RemoteError::Auth { status: 401, .. }));
        assert!(err.to_string().contains("GIT_TOKEN"));
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_upstream() {
        let server = http::test_server::serve(vec![(502, "bad gateway")]).await;

        let err = client_for(&server.base_url)
            .fetch(&pr("acme", "shop", 12))
            .await
            .unwrap_err();

        assert!(matches!(err, RemoteError::Upstream { status: 502, .. }));
    }
}
