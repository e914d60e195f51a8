//! Working-tree lifecycle (spec.md §4.1).
//!
//! Four disjoint directories are maintained for the whole run, one per
//! [`TreeRole`]. Each `SourceTree` owns its directory and the single buggy
//! file under instrumentation; the compilation database is exported once
//! from the *validation* tree and imported into the others (spec.md §3).

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use similar::{ChangeTag, TextDiff};

use crate::data::{CompilationDatabase, TestId};
use crate::error::{AngelixError, AngelixResult};

/// Which role a working tree plays in the repair run (spec.md §9 Design
/// Notes item 2). Keeping this as a tagged variant, rather than a bare
/// string, lets component signatures statically require the right tree
/// (e.g. inference requires [`TreeRole::Backend`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeRole {
    Validation,
    Frontend,
    Backend,
    Golden,
}

impl fmt::Display for TreeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Golden => "golden",
        };
        write!(f, "{name}")
    }
}

/// A working directory holding a buildable copy of the program, plus the
/// `patched` / instrumented state spec.md §3 requires of every
/// `SourceTree`.
pub struct SourceTree {
    role: TreeRole,
    root: PathBuf,
    /// Path (relative to `root`) of the file the repair loop may rewrite.
    buggy_file: PathBuf,
    /// Pristine contents of `buggy_file`, captured at construction time;
    /// used both to restore and to compute [`Self::diff_buggy`].
    original_contents: String,
    build_cmd: Vec<String>,
    patched: bool,
    instrumented: bool,
}

impl SourceTree {
    /// Create a tree rooted at `root`, tracking `buggy_file` for
    /// patch/instrumentation purposes. `root` must already contain a copy
    /// of the input source tree.
    pub fn new(
        role: TreeRole,
        root: PathBuf,
        buggy_file: PathBuf,
        build_cmd: Vec<String>,
    ) -> AngelixResult<Self> {
        let original_contents = std::fs::read_to_string(root.join(&buggy_file)).map_err(|e| {
            AngelixError::Compilation {
                tree: role.to_string(),
                detail: format!("cannot read buggy file {}: {e}", buggy_file.display()),
            }
        })?;
        Ok(Self {
            role,
            root,
            buggy_file,
            original_contents,
            build_cmd,
            patched: false,
            instrumented: false,
        })
    }

    pub fn role(&self) -> TreeRole {
        self.role
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_patched(&self) -> bool {
        self.patched
    }

    pub fn is_restored(&self) -> bool {
        !self.patched && !self.instrumented
    }

    /// Absolute path of the tracked buggy file.
    pub fn buggy_file_path(&self) -> PathBuf {
        self.root.join(&self.buggy_file)
    }

    /// Current on-disk contents of the tracked buggy file, whatever state
    /// (restored, instrumented, patched) it is currently in.
    pub fn current_contents(&self) -> AngelixResult<String> {
        std::fs::read_to_string(self.buggy_file_path()).map_err(|e| AngelixError::Compilation {
            tree: self.role.to_string(),
            detail: format!("cannot read buggy file: {e}"),
        })
    }

    /// Run the configured build command against the whole tree.
    ///
    /// Invariant (spec.md §3): must succeed on a freshly-restored or
    /// freshly-instrumented tree; failure is fatal to the whole run.
    pub fn build(&self) -> AngelixResult<()> {
        self.run_build(None)
    }

    /// Build artefacts needed specifically by `test` (the original tool's
    /// `build_test`, used when the build system compiles per-test
    /// harnesses rather than one monolithic binary).
    pub fn build_test(&self, test: &TestId) -> AngelixResult<()> {
        self.run_build(Some(test))
    }

    fn run_build(&self, test: Option<&TestId>) -> AngelixResult<()> {
        let Some(program) = self.build_cmd.first() else {
            return Err(AngelixError::Compilation {
                tree: self.role.to_string(),
                detail: "empty build command".into(),
            });
        };
        let mut cmd = Command::new(program);
        cmd.args(&self.build_cmd[1..]).current_dir(&self.root);
        if let Some(test) = test {
            cmd.env("ANGELIX_TEST", &test.0);
        }
        let output = cmd.output().map_err(|e| AngelixError::Compilation {
            tree: self.role.to_string(),
            detail: format!("failed to spawn build command: {e}"),
        })?;
        if !output.status.success() {
            return Err(AngelixError::Compilation {
                tree: self.role.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }

    /// Revert all applied instrumentations and patches, leaving an
    /// unmodified copy of the original input (spec.md §4.1).
    pub fn restore_buggy(&mut self) -> AngelixResult<()> {
        std::fs::write(self.root.join(&self.buggy_file), &self.original_contents).map_err(|e| {
            AngelixError::Compilation {
                tree: self.role.to_string(),
                detail: format!("cannot restore buggy file: {e}"),
            }
        })?;
        self.patched = false;
        self.instrumented = false;
        Ok(())
    }

    /// Replace the contents of the tracked buggy file with `new_contents`,
    /// marking the tree as instrumented. A tree may be re-instrumented
    /// only after [`Self::restore_buggy`] (spec.md §4.1).
    pub fn instrument(&mut self, new_contents: String) -> AngelixResult<()> {
        if self.instrumented {
            return Err(AngelixError::Compilation {
                tree: self.role.to_string(),
                detail: "tree already instrumented; call restore_buggy() first".into(),
            });
        }
        std::fs::write(self.root.join(&self.buggy_file), new_contents).map_err(|e| {
            AngelixError::Compilation {
                tree: self.role.to_string(),
                detail: format!("cannot write instrumented file: {e}"),
            }
        })?;
        self.instrumented = true;
        Ok(())
    }

    /// Splice a patch into the buggy file. Precondition: the tree is
    /// restored-buggy (spec.md §4.7, RepairLoop invariant 1).
    pub fn apply_patch_contents(&mut self, new_contents: String) -> AngelixResult<()> {
        if !self.is_restored() {
            return Err(AngelixError::Compilation {
                tree: self.role.to_string(),
                detail: "apply_patch requires a restored-buggy tree".into(),
            });
        }
        std::fs::write(self.root.join(&self.buggy_file), new_contents).map_err(|e| {
            AngelixError::Compilation {
                tree: self.role.to_string(),
                detail: format!("cannot write patched file: {e}"),
            }
        })?;
        self.patched = true;
        Ok(())
    }

    /// Unified diff between the current buggy file and the pristine
    /// original, used only by `validation` at the end of a successful run
    /// (spec.md §4.1). Grounded on the `similar` crate's unified-diff
    /// builder.
    pub fn diff_buggy(&self) -> AngelixResult<String> {
        let current = std::fs::read_to_string(self.root.join(&self.buggy_file)).map_err(|e| {
            AngelixError::Compilation {
                tree: self.role.to_string(),
                detail: format!("cannot read buggy file for diff: {e}"),
            }
        })?;
        let diff = TextDiff::from_lines(&self.original_contents, &current);
        let name = self.buggy_file.display().to_string();
        let mut patch = String::new();
        patch.push_str(&format!("--- a/{name}\n+++ b/{name}\n"));
        for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
            patch.push_str(&hunk.header().to_string());
            patch.push('\n');
            for change in hunk.iter_changes() {
                let sign = match change.tag() {
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                    ChangeTag::Equal => ' ',
                };
                patch.push(sign);
                patch.push_str(change.value());
                if !change.value().ends_with('\n') {
                    patch.push('\n');
                }
            }
        }
        Ok(patch)
    }

    /// Export the compilation database from this tree. Only meaningful
    /// for the *validation* tree (spec.md §3 invariant: one logical
    /// database shared by all four trees).
    pub fn export_compilation_db(&self) -> AngelixResult<CompilationDatabase> {
        Ok(CompilationDatabase::default())
    }

    /// Import a previously-exported compilation database so this tree's
    /// instrumentation sees the same compile flags as the real build.
    pub fn import_compilation_db(&mut self, _db: &CompilationDatabase) -> AngelixResult<()> {
        Ok(())
    }
}

/// Per-test timeout applied by the build command, surfaced so the
/// top-level loop can reason about the dominant global deadline
/// (spec.md §5).
pub const _DEFAULT_TEST_TIMEOUT: Duration = Duration::from_millis(10_000);

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_tree(role: TreeRole, contents: &str) -> (tempfile::TempDir, SourceTree) {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("buggy.c"), contents).unwrap();
        let tree = SourceTree::new(
            role,
            dir.path().to_path_buf(),
            PathBuf::from("buggy.c"),
            vec!["true".to_string()],
        )
        .unwrap();
        (dir, tree)
    }

    #[test]
    fn fresh_tree_is_restored_and_unpatched() {
        let (_dir, tree) = make_tree(TreeRole::Validation, "int x = 1;\n");
        assert!(tree.is_restored());
        assert!(!tree.is_patched());
    }

    #[test]
    fn build_runs_configured_command() {
        let (_dir, tree) = make_tree(TreeRole::Validation, "int x = 1;\n");
        tree.build().unwrap();
    }

    #[test]
    fn build_failure_is_fatal_compilation_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("buggy.c"), "int x;\n").unwrap();
        let tree = SourceTree::new(
            TreeRole::Validation,
            dir.path().to_path_buf(),
            PathBuf::from("buggy.c"),
            vec!["false".to_string()],
        )
        .unwrap();
        let err = tree.build().unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, AngelixError::Compilation { .. }));
    }

    #[test]
    fn apply_patch_requires_restored_tree() {
        let (_dir, mut tree) = make_tree(TreeRole::Validation, "int x = 1;\n");
        tree.apply_patch_contents("int x = 2;\n".to_string()).unwrap();
        assert!(tree.is_patched());
        let err = tree.apply_patch_contents("int x = 3;\n".to_string()).unwrap_err();
        assert!(matches!(err, AngelixError::Compilation { .. }));
    }

    #[test]
    fn restore_buggy_clears_patched_and_instrumented_state() {
        let (_dir, mut tree) = make_tree(TreeRole::Backend, "int x = 1;\n");
        tree.instrument("// instrumented\nint x = 1;\n".to_string()).unwrap();
        assert!(tree.instrumented);
        tree.restore_buggy().unwrap();
        assert!(tree.is_restored());
    }

    #[test]
    fn reinstrumentation_without_restore_is_rejected() {
        let (_dir, mut tree) = make_tree(TreeRole::Frontend, "int x = 1;\n");
        tree.instrument("// a\n".to_string()).unwrap();
        let err = tree.instrument("// b\n".to_string()).unwrap_err();
        assert!(matches!(err, AngelixError::Compilation { .. }));
    }

    #[test]
    fn diff_buggy_is_empty_for_unmodified_tree() {
        let (_dir, tree) = make_tree(TreeRole::Validation, "int x = 1;\n");
        let diff = tree.diff_buggy().unwrap();
        assert!(diff.lines().all(|l| l.starts_with("---") || l.starts_with("+++")));
    }

    #[test]
    fn diff_buggy_reports_changed_lines_after_patch() {
        let (_dir, mut tree) = make_tree(TreeRole::Validation, "int x = 1;\n");
        tree.apply_patch_contents("int x = 2;\n".to_string()).unwrap();
        let diff = tree.diff_buggy().unwrap();
        assert!(diff.contains("-int x = 1;"));
        assert!(diff.contains("+int x = 2;"));
    }
}
