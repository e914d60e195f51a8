//! Oracle-driven test execution (spec.md §4.2).
//!
//! The tester itself is a black-box collaborator (spec.md §1): it is the
//! oracle script supplied on the command line. The core only needs a
//! narrow trait so the repair loop can call it uniformly across the four
//! [`SourceTree`] roles, and a default implementation that shells out.

use std::process::{Command, Stdio};
use std::time::Duration;

use crate::data::TestId;
use crate::dump::DumpHandle;
use crate::error::{AngelixError, AngelixResult};
use crate::source_tree::SourceTree;
use crate::trace::TraceHandle;

/// Runs a named test against a tree's built artefact and reports whether
/// the oracle accepted the result.
///
/// Optional `dump`/`trace` handles direct side-output of the
/// instrumentation straight into the corresponding store, matching
/// spec.md §4.2's `(tree, test, dump?, trace?)` signature.
pub trait Tester {
    fn run(
        &self,
        tree: &SourceTree,
        test: &TestId,
        dump: Option<&DumpHandle>,
        trace: Option<&TraceHandle>,
    ) -> AngelixResult<bool>;
}

/// Default [`Tester`] that invokes the oracle script as a child process
/// with a per-test timeout, matching the teacher's subprocess-invocation
/// conventions in `cargo_first::EphemeralWorkspace::check`.
pub struct ShellTester {
    oracle: std::path::PathBuf,
    timeout: Duration,
}

impl ShellTester {
    pub fn new(oracle: std::path::PathBuf, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }
}

impl Tester for ShellTester {
    fn run(
        &self,
        tree: &SourceTree,
        test: &TestId,
        dump: Option<&DumpHandle>,
        trace: Option<&TraceHandle>,
    ) -> AngelixResult<bool> {
        let mut cmd = Command::new(&self.oracle);
        cmd.arg(&test.0)
            .current_dir(tree.root())
            .env("ANGELIX_TREE_ROLE", tree.role().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(trace) = trace {
            cmd.env("ANGELIX_TRACE_FILE", trace.path());
        }
        if let Some(dump) = dump {
            cmd.env("ANGELIX_DUMP_FILE", dump.path());
        }

        let mut child = cmd.spawn().map_err(|e| AngelixError::Compilation {
            tree: tree.role().to_string(),
            detail: format!("failed to spawn oracle for test {test}: {e}"),
        })?;

        let accepted = wait_with_timeout(&mut child, self.timeout).map_err(|e| {
            AngelixError::Compilation {
                tree: tree.role().to_string(),
                detail: format!("oracle timed out or failed for test {test}: {e}"),
            }
        })?;

        Ok(accepted)
    }
}

/// Poll the child for exit status up to `timeout`, killing it if it
/// overruns. Returns whether the process exited successfully.
fn wait_with_timeout(child: &mut std::process::Child, timeout: Duration) -> anyhow::Result<bool> {
    let start = std::time::Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status.success());
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            anyhow::bail!("test exceeded {:?} timeout", timeout);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// Deterministic [`Tester`] double for orchestration tests (spec.md §8):
/// accepts a fixed set of test ids regardless of which tree ran them.
#[cfg(any(test, feature = "test-support"))]
pub struct ScriptedTester {
    pub passing: std::collections::BTreeSet<TestId>,
}

#[cfg(any(test, feature = "test-support"))]
impl Tester for ScriptedTester {
    fn run(
        &self,
        _tree: &SourceTree,
        test: &TestId,
        dump: Option<&DumpHandle>,
        _trace: Option<&TraceHandle>,
    ) -> AngelixResult<bool> {
        if let Some(dump) = dump {
            dump.write("expected-output").ok();
        }
        Ok(self.passing.contains(test))
    }
}
