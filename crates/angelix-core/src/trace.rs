//! Execution-trace store (spec.md §3 `Trace[t]`).
//!
//! Ordered sequence of repair-point identifiers visited during execution
//! of a test on the *frontend* build. Generated on demand; persistent on
//! disk keyed by [`TestId`]; unlike [`crate::dump::Dump`], re-running a
//! test on the frontend fully overwrites its trace (RepairLoop invariant 3).

use std::path::{Path, PathBuf};

use crate::data::TestId;
use crate::error::{AngelixError, AngelixResult};

/// A single dynamic occurrence: which repair point fired, and at what
/// ordinal position within the execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub repair_point: String,
}

/// A handle to a single test's trace file, passed to the tester so the
/// frontend instrumentation can append repair-point ids as it executes.
pub struct TraceHandle {
    path: PathBuf,
}

impl TraceHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Used by test doubles to simulate the frontend build recording a
    /// trace; overwrites any previous content for this test.
    pub fn write_events(&self, points: &[&str]) -> AngelixResult<()> {
        let body = points.join("\n");
        std::fs::write(&self.path, body).map_err(|e| AngelixError::Compilation {
            tree: "trace".into(),
            detail: format!("cannot write trace: {e}"),
        })
    }
}

/// Store of per-test execution traces.
pub struct Trace {
    dir: PathBuf,
}

impl Trace {
    pub fn new(working_dir: &Path) -> AngelixResult<Self> {
        let dir = working_dir.join("traces");
        std::fs::create_dir_all(&dir).map_err(|e| AngelixError::Compilation {
            tree: "trace".into(),
            detail: format!("cannot create trace directory: {e}"),
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, test: &TestId) -> PathBuf {
        self.dir.join(format!("{}.trace", sanitize(&test.0)))
    }

    /// Hand out a handle for `test`, truncating any prior trace (a
    /// frontend re-run always fully overwrites, per spec.md's invariant).
    pub fn handle_for(&self, test: &TestId) -> AngelixResult<TraceHandle> {
        let path = self.path_for(test);
        std::fs::write(&path, "").map_err(|e| AngelixError::Compilation {
            tree: "trace".into(),
            detail: format!("cannot create trace file: {e}"),
        })?;
        Ok(TraceHandle { path })
    }

    /// Parse the persisted trace for `test` into an ordered event
    /// sequence.
    pub fn parse(&self, test: &TestId) -> AngelixResult<Vec<TraceEvent>> {
        let path = self.path_for(test);
        let contents = std::fs::read_to_string(&path).map_err(|e| AngelixError::Compilation {
            tree: "trace".into(),
            detail: format!("cannot read trace for {test}: {e}"),
        })?;
        Ok(contents
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| TraceEvent { repair_point: l.to_string() })
            .collect())
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
