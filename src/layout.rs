//! Directory layout under the remote root.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Subdirectory holding deployed applications.
pub const APPS_DIR: &str = "apps";
/// Subdirectory holding job directories.
pub const JOBS_DIR: &str = "jobs";
/// Subdirectory holding helper scripts.
pub const SCRIPTS_DIR: &str = "scripts";
/// Subdirectory receiving removed jobs.
pub const TRASH_DIR: &str = "trash";

/// Resolved remote directories used by the job manager.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteLayout {
    root: Utf8PathBuf,
}

impl RemoteLayout {
    /// Creates a layout rooted at an absolute, already expanded path.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Remote root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Applications directory.
    #[must_use]
    pub fn apps_dir(&self) -> Utf8PathBuf {
        self.root.join(APPS_DIR)
    }

    /// Jobs directory.
    #[must_use]
    pub fn jobs_dir(&self) -> Utf8PathBuf {
        self.root.join(JOBS_DIR)
    }

    /// Scripts directory.
    #[must_use]
    pub fn scripts_dir(&self) -> Utf8PathBuf {
        self.root.join(SCRIPTS_DIR)
    }

    /// Trash directory.
    #[must_use]
    pub fn trash_dir(&self) -> Utf8PathBuf {
        self.root.join(TRASH_DIR)
    }

    /// Directory of one deployed application.
    #[must_use]
    pub fn app_dir(&self, app_id: &str) -> Utf8PathBuf {
        self.apps_dir().join(app_id)
    }

    /// Hidden sibling an application is uploaded into before it replaces
    /// [`RemoteLayout::app_dir`].
    #[must_use]
    pub fn app_staging_dir(&self, app_id: &str) -> Utf8PathBuf {
        self.apps_dir().join(format!(".{app_id}.new"))
    }

    /// Hidden sibling holding the previous deployment while a replacement
    /// is swapped in.
    #[must_use]
    pub fn app_retired_dir(&self, app_id: &str) -> Utf8PathBuf {
        self.apps_dir().join(format!(".{app_id}.old"))
    }

    /// Directory of one job.
    #[must_use]
    pub fn job_dir(&self, job_id: &str) -> Utf8PathBuf {
        self.jobs_dir().join(job_id)
    }

    /// Trash destination for `path`: every `/` becomes `___`, so distinct
    /// sources never collide.
    #[must_use]
    pub fn trash_path_for(&self, path: &Utf8Path) -> Utf8PathBuf {
        let flattened = path.as_str().trim_start_matches('/').replace('/', "___");
        self.trash_dir().join(flattened)
    }
}

/// Returns `true` when `name` is a single, non-special path component.
#[must_use]
pub fn is_single_component(name: &str) -> bool {
    !name.trim().is_empty()
        && !name.contains('/')
        && name != "."
        && name != ".."
        && !name.chars().any(char::is_control)
}

/// Returns `true` for relative paths that never climb out of their base.
#[must_use]
pub fn is_contained_relative(path: &Utf8Path) -> bool {
    path.components()
        .all(|component| matches!(component, Utf8Component::Normal(_) | Utf8Component::CurDir))
}

/// Returns `true` when a remote root is safe to expand with `echo`:
/// no `..` segments and no shell metacharacters beyond `$`, `{`, `}` and `~`.
#[must_use]
pub fn is_expandable_root(root: &str) -> bool {
    let allowed = |c: char| c.is_ascii_alphanumeric() || "/._-$~{}".contains(c);
    !root.trim().is_empty()
        && root.chars().all(allowed)
        && !Utf8Path::new(root)
            .components()
            .any(|component| component == Utf8Component::ParentDir)
}

#[cfg(test)]
mod tests {
    //! Unit tests for remote layout paths.

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn directories_hang_off_root() {
        let layout = RemoteLayout::new("/scratch/alice/taccjm");
        assert_eq!(layout.apps_dir(), "/scratch/alice/taccjm/apps");
        assert_eq!(layout.job_dir("j1"), "/scratch/alice/taccjm/jobs/j1");
        assert_eq!(
            layout.app_staging_dir("demo--1.0"),
            "/scratch/alice/taccjm/apps/.demo--1.0.new"
        );
        assert_eq!(layout.scripts_dir(), "/scratch/alice/taccjm/scripts");
    }

    #[rstest]
    fn trash_path_flattens_separators() {
        let layout = RemoteLayout::new("/r");
        assert_eq!(
            layout.trash_path_for(Utf8Path::new("/r/jobs/j1")),
            "/r/trash/r___jobs___j1"
        );
    }

    #[rstest]
    #[case("job_1", true)]
    #[case("", false)]
    #[case("..", false)]
    #[case("a/b", false)]
    fn single_component_check(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_single_component(name), expected);
    }

    #[rstest]
    #[case("outputs/result.txt", true)]
    #[case("", true)]
    #[case("../escape", false)]
    #[case("a/../../b", false)]
    #[case("/etc/passwd", false)]
    fn contained_relative_check(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(is_contained_relative(Utf8Path::new(path)), expected);
    }

    #[rstest]
    #[case("$SCRATCH/taccjm", true)]
    #[case("/work/alice/jm", true)]
    #[case("$SCRATCH/../etc", false)]
    #[case("/tmp; rm -rf ~", false)]
    fn expandable_root_check(#[case] root: &str, #[case] expected: bool) {
        assert_eq!(is_expandable_root(root), expected);
    }
}
