use std::borrow::Cow;
use tracing::debug;

const SECTION_PREFIX: &str = "diff --git a/";

/// Path substrings whose diff sections are dropped from a patch.
///
/// Matching is plain case-sensitive substring containment against the
/// `a/` side of each `diff --git` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet(Vec<String>);

impl ExclusionSet {
    /// Build from arbitrary entries, trimming each and dropping empty ones.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            entries
                .into_iter()
                .map(|entry| entry.as_ref().trim().to_string())
                .filter(|entry| !entry.is_empty())
                .collect(),
        )
    }

    /// Parse a comma-separated list such as `"Test/,tests/"`.
    pub fn parse(csv: &str) -> Self {
        Self::new(csv.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn matches(&self, path: &str) -> bool {
        self.0.iter().any(|excluded| path.contains(excluded.as_str()))
    }
}

/// Extract the `a/` path from a `diff --git a/<path> b/<path>` header line.
///
/// Returns `None` for anything that is not a well-formed section header.
pub fn section_path(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(SECTION_PREFIX)?;
    let end = rest.find(" b/")?;
    Some(&rest[..end])
}

/// Remove every per-file section whose path matches `exclusions`.
///
/// The diff is scanned line by line. A section starts at its `diff --git`
/// header and runs until the next recognised header or the end of input.
/// Lines before the first header are always kept, and unrecognised headers
/// keep the inclusion state of the section they appear in. Retained lines
/// are emitted byte-for-byte, carriage returns included.
pub fn filter_diff<'a>(diff: &'a str, exclusions: &ExclusionSet) -> Cow<'a, str> {
    if exclusions.is_empty() {
        return Cow::Borrowed(diff);
    }

    let mut kept: Vec<&str> = Vec::new();
    let mut excluding = false;
    let mut dropped_sections = 0usize;

    for line in diff.split('\n') {
        if let Some(path) = section_path(line) {
            excluding = exclusions.matches(path);
            if excluding {
                dropped_sections += 1;
                debug!(path, "excluding diff section");
            }
        }

        if !excluding {
            kept.push(line);
        }
    }

    if dropped_sections == 0 {
        return Cow::Borrowed(diff);
    }

    Cow::Owned(kept.join("\n"))
}
