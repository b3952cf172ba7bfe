/// Extension of the git (native diff) patch file.
pub const GIT_PATCH_EXTENSION: &str = ".git.patch";
/// Extension of the composer patch file.
pub const COMPOSER_PATCH_EXTENSION: &str = ".patch";

const DEBUG_MARKER: &str = "_DEBUG";
const CUSTOM_MARKER: &str = "_CUSTOM";

/// Normalize a user supplied patch version.
///
/// Whitespace is trimmed and any leading run of `v`/`_` is stripped.
/// Version `1` is implicit and becomes the empty string.
pub fn normalize_patch_version(raw: &str) -> String {
    let version = raw.trim().trim_start_matches(['v', '_']);
    if version == "1" {
        String::new()
    } else {
        version.to_string()
    }
}

/// `_DEBUG` / `_CUSTOM` markers found in pull request branch names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BranchMarkers {
    pub debug: bool,
    pub custom: bool,
}

impl BranchMarkers {
    /// Case-insensitive scan over every branch name of the run.
    pub fn scan<I, S>(branch_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        branch_names
            .into_iter()
            .fold(Self::default(), |markers, branch| {
                let branch = branch.as_ref().to_ascii_uppercase();
                Self {
                    debug: markers.debug || branch.contains(DEBUG_MARKER),
                    custom: markers.custom || branch.contains(CUSTOM_MARKER),
                }
            })
    }
}

/// Everything that determines the output file names of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchArtifact {
    pub ticket_id: String,
    pub release_version: String,
    /// Already normalized with [`normalize_patch_version`]
    pub patch_version: String,
    pub is_debug: bool,
    pub is_custom: bool,
}

impl PatchArtifact {
    pub fn new(ticket_id: &str, release_version: &str, patch_version: &str, markers: BranchMarkers) -> Self {
        Self {
            ticket_id: ticket_id.to_string(),
            release_version: release_version.trim().to_string(),
            patch_version: normalize_patch_version(patch_version),
            is_debug: markers.debug,
            is_custom: markers.custom,
        }
    }

    /// `<ticket>[_<release>][_DEBUG][_CUSTOM][_v<patch>]<extension>`
    pub fn file_name(&self, extension: &str) -> String {
        let mut name = self.ticket_id.clone();
        if !self.release_version.is_empty() {
            name.push('_');
            name.push_str(&self.release_version);
        }
        if self.is_debug {
            name.push_str(DEBUG_MARKER);
        }
        if self.is_custom {
            name.push_str(CUSTOM_MARKER);
        }
        if !self.patch_version.is_empty() {
            name.push_str("_v");
            name.push_str(&self.patch_version);
        }
        name.push_str(extension);
        name
    }

    pub fn git_file_name(&self) -> String {
        self.file_name(GIT_PATCH_EXTENSION)
    }

    pub fn composer_file_name(&self) -> String {
        self.file_name(COMPOSER_PATCH_EXTENSION)
    }
}

/// Derive the `(git, composer)` file names for a run.
pub fn derive_filenames<S: AsRef<str>>(
    ticket_id: &str,
    release_version: &str,
    patch_version: &str,
    branch_names: &[S],
) -> (String, String) {
    let artifact = PatchArtifact::new(
        ticket_id,
        release_version,
        patch_version,
        BranchMarkers::scan(branch_names),
    );
    (artifact.git_file_name(), artifact.composer_file_name())
}
