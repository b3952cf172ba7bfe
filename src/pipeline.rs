use colored::Colorize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::http::RemoteError;
use crate::jira::TicketTracker;
use crate::patch::{derive_filenames, ConvertError, PatchConverter};
use crate::pr::diff::{filter_diff, ExclusionSet};
use crate::pr::{self, PrError, PullRequestSource};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("No pull request URLs found in ticket {0}. Use -g to specify git PRs.")]
    NoPullRequests(String),

    #[error(transparent)]
    PullRequestUrls(#[from] PrError),

    #[error(transparent)]
    Conversion(#[from] ConvertError),

    #[error("Failed to write patch file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Inputs of a single run, as collected by the CLI.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub ticket_id: String,
    /// Explicit PR URLs; when absent they are read from the ticket.
    pub pull_requests: Option<String>,
    /// Raw `--patch-version` value, normalized by the run.
    pub patch_version: String,
    pub exclusions: ExclusionSet,
    /// Keep every diff section regardless of `exclusions`.
    pub include_everything: bool,
    pub output_dir: PathBuf,
}

/// Files produced by a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutput {
    pub git: PathBuf,
    pub composer: PathBuf,
}

/// Receives user-facing notices raised while a run is in progress.
pub type NoticeSink<'a> = Box<dyn Fn(&str) + Send + Sync + 'a>;

/// State accumulated over one run. Lives as long as the generator.
#[derive(Debug)]
struct RunContext {
    ticket_id: String,
    pull_requests: Option<String>,
    patch_version: String,
    exclusions: ExclusionSet,
    branch_names: Vec<String>,
    contents: Vec<String>,
}

impl RunContext {
    fn new(options: &RunOptions) -> Self {
        Self {
            ticket_id: options.ticket_id.trim().to_string(),
            pull_requests: options
                .pull_requests
                .as_deref()
                .map(str::trim)
                .filter(|prs| !prs.is_empty())
                .map(str::to_string),
            patch_version: crate::patch::naming::normalize_patch_version(&options.patch_version),
            exclusions: if options.include_everything {
                ExclusionSet::default()
            } else {
                options.exclusions.clone()
            },
            branch_names: Vec::new(),
            contents: Vec::new(),
        }
    }
}

/// Builds the git and composer patch files for one ticket.
///
/// Steps: verify Jira credentials, load the ticket, resolve PR URLs, fetch
/// and filter each PR in order, write the concatenated git patch, convert it
/// to composer format, then regenerate the git patch from the composer file
/// so both use the same path layout.
///
/// PRs are fetched one after another on purpose. The output order must
/// follow the input order, and file names depend on every branch name.
pub struct PatchGenerator<'a> {
    tracker: &'a dyn TicketTracker,
    source: &'a dyn PullRequestSource,
    converter: &'a dyn PatchConverter,
    output_dir: PathBuf,
    context: RunContext,
    notice: NoticeSink<'a>,
    written: Option<PatchOutput>,
}

impl<'a> PatchGenerator<'a> {
    pub fn new(
        options: &RunOptions,
        tracker: &'a dyn TicketTracker,
        source: &'a dyn PullRequestSource,
        converter: &'a dyn PatchConverter,
    ) -> Self {
        Self {
            tracker,
            source,
            converter,
            output_dir: options.output_dir.clone(),
            context: RunContext::new(options),
            notice: Box::new(|message| println!("{}", message.yellow())),
            written: None,
        }
    }

    /// Replace the default stdout notice printer.
    pub fn with_notices(mut self, notice: impl Fn(&str) + Send + Sync + 'a) -> Self {
        self.notice = Box::new(notice);
        self
    }

    /// Run the pipeline. On failure, any output file of this run is removed
    /// before the error is returned.
    #[instrument(skip(self), fields(ticket = %self.context.ticket_id))]
    pub async fn generate(&mut self) -> Result<PatchOutput, GenerateError> {
        match self.run().await {
            Ok(output) => Ok(output),
            Err(err) => {
                self.cleanup();
                Err(err)
            }
        }
    }

    async fn run(&mut self) -> Result<PatchOutput, GenerateError> {
        self.tracker.verify_identity().await?;
        let ticket = self.tracker.fetch_ticket(&self.context.ticket_id).await?;

        let release_version = ticket.release_version.clone().unwrap_or_default();
        if release_version.is_empty() {
            warn!(ticket = %self.context.ticket_id, "release version not found in the ticket");
            (self.notice)(&format!(
                "Warning: Release version not found in ticket {}",
                self.context.ticket_id
            ));
        }

        let pr_text = match self.context.pull_requests.clone() {
            Some(explicit) => explicit,
            None => {
                let from_ticket = ticket.pull_requests.trim();
                if from_ticket.is_empty() {
                    return Err(GenerateError::NoPullRequests(self.context.ticket_id.clone()));
                }
                info!(pull_requests = %from_ticket, "collected PRs from ticket");
                from_ticket.to_string()
            }
        };
        let pr_urls = pr::find_pr_urls(&pr_text)?;

        for pr_url in &pr_urls {
            let fetched = self.source.fetch(pr_url).await?;
            let content = filter_diff(&fetched.raw_diff, &self.context.exclusions).into_owned();
            debug!(
                pr = %pr_url,
                branch = %fetched.source_branch,
                fetched_bytes = fetched.raw_diff.len(),
                kept_bytes = content.len(),
                "collected PR diff"
            );
            self.context.branch_names.push(fetched.source_branch);
            self.context.contents.push(content);
        }

        let (git_name, composer_name) = derive_filenames(
            &self.context.ticket_id,
            &release_version,
            &self.context.patch_version,
            &self.context.branch_names,
        );
        let output = PatchOutput {
            git: self.output_dir.join(git_name),
            composer: self.output_dir.join(composer_name),
        };
        self.written = Some(output.clone());

        let content = concatenate_patches(&self.context.contents);
        write_file(&output.git, content.as_bytes()).await?;
        info!(path = %output.git.display(), bytes = content.len(), "wrote git patch");

        self.converter.convert_forward(&output.git, &output.composer).await?;
        info!(path = %output.composer.display(), "created composer patch");

        tokio::fs::remove_file(&output.git)
            .await
            .map_err(|source| GenerateError::Io {
                path: output.git.clone(),
                source,
            })?;
        self.converter.convert_reverse(&output.composer, &output.git).await?;
        info!(path = %output.git.display(), "regenerated git patch from composer patch");

        Ok(output)
    }

    fn cleanup(&mut self) {
        let Some(output) = self.written.take() else {
            return;
        };
        for path in [&output.git, &output.composer] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed partial patch file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial patch file"),
            }
        }
    }
}

/// Join PR diffs with a single newline and end with exactly one newline.
pub fn concatenate_patches<S: AsRef<str>>(contents: &[S]) -> String {
    let mut joined = contents
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = joined.trim_end_matches('\n').len();
    joined.truncate(trimmed);
    joined.push('\n');
    joined
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), GenerateError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| GenerateError::Io {
            path: path.to_path_buf(),
            source,
        })
}
