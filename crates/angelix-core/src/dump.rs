//! Expected-output store (spec.md §3 `Dump[t]`).
//!
//! Persistent, keyed by [`TestId`]. Invariant: once `Dump[t]` exists it is
//! never rewritten in a single run (RepairLoop invariant 2, testable
//! property 3).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::data::TestId;
use crate::error::{AngelixError, AngelixResult};

/// A handle to a single test's dump file, passed to [`crate::tester::Tester`]
/// so the instrumentation can write its captured output directly.
pub struct DumpHandle {
    path: PathBuf,
}

impl DumpHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Used by test doubles to simulate the instrumentation writing a
    /// captured dump.
    pub fn write(&self, bytes: &str) -> AngelixResult<()> {
        std::fs::write(&self.path, bytes).map_err(|e| AngelixError::Compilation {
            tree: "dump".into(),
            detail: format!("cannot write dump: {e}"),
        })
    }
}

/// Canonical expected-output store, one entry per test, written at most
/// once (spec.md §3 invariant, §8 property 3).
pub struct Dump {
    dir: PathBuf,
    written: BTreeMap<TestId, PathBuf>,
}

impl Dump {
    pub fn new(working_dir: &Path) -> AngelixResult<Self> {
        let dir = working_dir.join("dumps");
        std::fs::create_dir_all(&dir).map_err(|e| AngelixError::Compilation {
            tree: "dump".into(),
            detail: format!("cannot create dump directory: {e}"),
        })?;
        Ok(Self { dir, written: BTreeMap::new() })
    }

    pub fn contains(&self, test: &TestId) -> bool {
        self.written.contains_key(test)
    }

    /// Reserve (and, if not present, create empty) storage for `test`,
    /// returning a handle the tester can write through. Calling this a
    /// second time for the same test returns the *same* path without
    /// truncating it, preserving the write-once invariant.
    pub fn handle_for(&mut self, test: &TestId) -> AngelixResult<DumpHandle> {
        let path = self
            .written
            .entry(test.clone())
            .or_insert_with(|| self.dir.join(format!("{}.dump", sanitize(&test.0))))
            .clone();
        if !path.exists() {
            std::fs::write(&path, "").map_err(|e| AngelixError::Compilation {
                tree: "dump".into(),
                detail: format!("cannot create dump file: {e}"),
            })?;
        }
        Ok(DumpHandle { path })
    }

    /// Read the bytes previously captured for `test`.
    pub fn read(&self, test: &TestId) -> AngelixResult<String> {
        let path = self.written.get(test).ok_or_else(|| AngelixError::MissingGolden {
            test: test.clone(),
        })?;
        std::fs::read_to_string(path).map_err(|e| AngelixError::Compilation {
            tree: "dump".into(),
            detail: format!("cannot read dump: {e}"),
        })
    }

    /// Seed a dump directly from an inline value (the optional output
    /// dumps file of spec.md §6), bypassing the golden tree entirely.
    pub fn seed(&mut self, test: &TestId, bytes: &str) -> AngelixResult<()> {
        let handle = self.handle_for(test)?;
        handle.write(bytes)
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
